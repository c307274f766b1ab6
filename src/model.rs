//! Seams to the external models: source separation, pitch transcription and
//! score conversion. Production bindings live in the submodules; tests bind
//! deterministic implementations of the same traits.

pub mod basic_pitch;
pub mod midi;
pub mod score;
pub mod separator;

use std::path::{Path, PathBuf};

use crate::{config::TranscriptionConfig, error::Result, types::Stem};

pub use self::score::Score;

/// Expected stem locations. A stem that was not produced has no file at its path.
#[derive(Clone, Debug, PartialEq)]
pub struct StemPaths {
    pub vocals: PathBuf,
    pub piano: PathBuf,
    pub bass: PathBuf,
    pub drums: PathBuf,
    pub other: PathBuf,
}

impl StemPaths {
    /// `<dir>/<stem>.wav` for every stem.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            vocals: dir.join("vocals.wav"),
            piano: dir.join("piano.wav"),
            bass: dir.join("bass.wav"),
            drums: dir.join("drums.wav"),
            other: dir.join("other.wav"),
        }
    }

    pub fn get(&self, stem: Stem) -> &Path {
        match stem {
            Stem::Vocals => &self.vocals,
            Stem::Piano => &self.piano,
            Stem::Bass => &self.bass,
            Stem::Drums => &self.drums,
            Stem::Other => &self.other,
        }
    }
}

/// A note as reported by the transcription model, before rounding/clamping.
#[derive(Clone, Debug, PartialEq)]
pub struct RawNote {
    pub start: f64,
    pub end: f64,
    pub pitch: u8,
    pub amplitude: f64,
}

/// Model output for one audio file.
#[derive(Clone, Debug, Default)]
pub struct Prediction {
    /// Standard MIDI file bytes.
    pub midi: Vec<u8>,
    pub notes: Vec<RawNote>,
}

pub trait StemSeparator {
    fn separate(&self, input: &Path, output_dir: &Path) -> Result<StemPaths>;
}

pub trait PitchModel {
    fn predict(&self, audio: &Path, config: &TranscriptionConfig) -> Result<Prediction>;
}

pub trait ScoreConverter {
    fn parse(&self, midi: &Path) -> Result<Score>;
    fn export_musicxml(&self, score: &Score, path: &Path) -> Result<()>;
}
