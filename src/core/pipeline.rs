use std::{
    fs,
    path::{Path, PathBuf},
};

use tempfile::{Builder, TempDir};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    config::PipelineConfig,
    core::{
        audio::{ensure_stereo, write_audio},
        deriver::{derive_from_file, DerivedTracks},
        transcriber::Transcriber,
    },
    error::{PipelineError, Result},
    io::{
        layout::OutputLayout,
        progress::{emit_progress, PipelineProgress},
    },
    model::{
        basic_pitch::BasicPitchCli, score::MusicXmlConverter, separator::SpleeterSeparator,
        PitchModel, ScoreConverter, StemSeparator,
    },
    types::{AudioData, JobResult, Stem, TrackIdentity, TrackResult, UNRECOGNIZED_INSTRUMENT},
};

/// Per-run scratch storage. Removed when dropped; removal failures are logged
/// and never propagated.
struct Scratch {
    dir: Option<TempDir>,
}

impl Scratch {
    fn create(root: &Path) -> Result<Self> {
        let dir = Builder::new().prefix("staging-").tempdir_in(root)?;
        debug!(path = %dir.path().display(), "created scratch dir");
        Ok(Self { dir: Some(dir) })
    }

    fn path(&self) -> &Path {
        self.dir.as_ref().map(TempDir::path).unwrap_or(Path::new("."))
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                warn!(path = %path.display(), "failed to remove scratch dir: {e}");
            }
        }
    }
}

fn remove_temp_file(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), "failed to remove temporary file: {e}");
        }
    }
}

/// A stem counts as produced when its file exists and is non-empty.
fn stem_available(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_file() && m.len() > 0).unwrap_or(false)
}

pub struct Pipeline {
    config: PipelineConfig,
    separator: Box<dyn StemSeparator>,
    pitch_model: Box<dyn PitchModel>,
    converter: Box<dyn ScoreConverter>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        separator: Box<dyn StemSeparator>,
        pitch_model: Box<dyn PitchModel>,
        converter: Box<dyn ScoreConverter>,
    ) -> Self {
        Self {
            config,
            separator,
            pitch_model,
            converter,
        }
    }

    /// Spleeter for separation, basic-pitch for transcription, the native
    /// MusicXML writer for scores.
    pub fn with_default_models(config: PipelineConfig) -> Self {
        Self::new(
            config,
            Box::new(SpleeterSeparator::new()),
            Box::new(BasicPitchCli::new()),
            Box::new(MusicXmlConverter),
        )
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Separate `input`, transcribe every track into `output_root` and
    /// assemble the job result. Any track failure aborts the job; scratch
    /// storage is removed on every exit path.
    pub fn run(
        &self,
        input: &Path,
        output_root: &Path,
        job_id: Option<String>,
    ) -> Result<JobResult> {
        self.config.validate()?;
        fs::metadata(input).map_err(|e| PipelineError::decode(input, e))?;
        fs::create_dir_all(output_root)?;

        let layout = OutputLayout::create(output_root)?;
        let scratch = Scratch::create(output_root)?;
        let transcriber = Transcriber::new(
            &layout,
            self.pitch_model.as_ref(),
            self.converter.as_ref(),
            &self.config,
        );

        emit_progress(PipelineProgress::Stage("separate"));
        let stems = self.separator.separate(input, &scratch.path().join("stems"))?;
        info!("stem separation finished");

        let total = TrackIdentity::ALL.len();
        let mut tracks = Vec::with_capacity(total);

        for (i, stem) in Stem::DIRECT.into_iter().enumerate() {
            let identity = stem.identity();
            let path = stems.get(stem);
            if stem_available(path) {
                let manifest = transcriber.transcribe(path, &identity)?;
                tracks.push(TrackResult::Present(manifest));
            } else {
                info!(track = identity.slug, "stem not produced, omitting");
            }
            emit_progress(PipelineProgress::Track {
                slug: identity.slug,
                done: i + 1,
                total,
            });
        }

        // One decomposition feeds both the guitar and the other slot.
        emit_progress(PipelineProgress::Stage("derive"));
        let other_available = stem_available(&stems.other);
        let derived = if other_available {
            derive_from_file(&stems.other, &self.config)?
        } else {
            DerivedTracks::default()
        };
        let guitar_file = persist(
            derived.harmonic.as_ref(),
            &scratch.path().join("temp_guitar.wav"),
        )?;
        let residual_file = persist(
            derived.percussive.as_ref(),
            &scratch.path().join("temp_other.wav"),
        )?;

        let guitar = match guitar_file {
            Some(path) => {
                let manifest = transcriber.transcribe(&path, &TrackIdentity::GUITAR);
                remove_temp_file(&path);
                TrackResult::Present(manifest?)
            }
            None => TrackResult::Absent {
                identity: TrackIdentity::GUITAR,
                status: Some(UNRECOGNIZED_INSTRUMENT),
            },
        };
        tracks.push(guitar);
        emit_progress(PipelineProgress::Track {
            slug: TrackIdentity::GUITAR.slug,
            done: total - 1,
            total,
        });

        let other = match residual_file {
            Some(path) => {
                let manifest = transcriber.transcribe(&path, &TrackIdentity::OTHER);
                remove_temp_file(&path);
                TrackResult::Present(manifest?)
            }
            None if other_available => {
                TrackResult::Present(transcriber.transcribe(&stems.other, &TrackIdentity::OTHER)?)
            }
            None => TrackResult::Absent {
                identity: TrackIdentity::OTHER,
                status: None,
            },
        };
        tracks.push(other);
        emit_progress(PipelineProgress::Track {
            slug: TrackIdentity::OTHER.slug,
            done: total,
            total,
        });

        emit_progress(PipelineProgress::Stage("assemble"));
        let job_id = job_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        drop(scratch);

        info!(
            job_id = %job_id,
            tracks = tracks.len(),
            present = tracks.iter().filter(|t| t.is_present()).count(),
            "job finished"
        );
        emit_progress(PipelineProgress::Finished);

        Ok(JobResult { job_id, tracks })
    }
}

/// Write a derived signal as stereo WAV; `None` in, `None` out.
fn persist(signal: Option<&AudioData>, path: &Path) -> Result<Option<PathBuf>> {
    match signal {
        Some(audio) => {
            write_audio(path, &ensure_stereo(audio))?;
            Ok(Some(path.to_path_buf()))
        }
        None => Ok(None),
    }
}
