use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::error::Result;

/// Per-job output directories: `audio/`, `midi/`, `musicxml/` and `notes/`
/// under one root.
#[derive(Clone, Debug)]
pub struct OutputLayout {
    root: PathBuf,
    audio: PathBuf,
    midi: PathBuf,
    musicxml: PathBuf,
    notes: PathBuf,
}

impl OutputLayout {
    pub fn create<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let layout = Self {
            audio: root.join("audio"),
            midi: root.join("midi"),
            musicxml: root.join("musicxml"),
            notes: root.join("notes"),
            root,
        };
        for dir in [&layout.audio, &layout.midi, &layout.musicxml, &layout.notes] {
            fs::create_dir_all(dir)?;
        }
        Ok(layout)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn audio_path(&self, slug: &str) -> PathBuf {
        self.audio.join(format!("{slug}.wav"))
    }

    pub fn midi_path(&self, slug: &str) -> PathBuf {
        self.midi.join(format!("{slug}.mid"))
    }

    pub fn musicxml_path(&self, slug: &str) -> PathBuf {
        self.musicxml.join(format!("{slug}.musicxml"))
    }

    pub fn notes_path(&self, slug: &str) -> PathBuf {
        self.notes.join(format!("{slug}.json"))
    }

    /// `path` relative to the root, `/`-separated.
    pub fn relative(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}
