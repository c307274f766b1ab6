use std::{fs, path::Path, process::Command};

use anyhow::{anyhow, Context};
use tempfile::tempdir;
use tracing::{debug, info};

use crate::{
    config::TranscriptionConfig,
    error::Result,
    model::{PitchModel, Prediction, RawNote},
    utils::basic_pitch_command,
};

/// Pitch transcription through the `basic-pitch` command line tool.
pub struct BasicPitchCli {
    command: String,
}

impl BasicPitchCli {
    pub fn new() -> Self {
        Self {
            command: basic_pitch_command(),
        }
    }

    pub fn with_command(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    fn args(config: &TranscriptionConfig) -> Vec<String> {
        let mut args = vec![
            "--save-note-events".to_string(),
            "--onset-threshold".to_string(),
            config.onset_threshold.to_string(),
            "--frame-threshold".to_string(),
            config.frame_threshold.to_string(),
            "--minimum-note-length".to_string(),
            config.minimum_note_length_ms.to_string(),
            "--midi-tempo".to_string(),
            config.midi_tempo.to_string(),
        ];
        if let Some(f) = config.minimum_frequency {
            args.extend(["--minimum-frequency".to_string(), f.to_string()]);
        }
        if let Some(f) = config.maximum_frequency {
            args.extend(["--maximum-frequency".to_string(), f.to_string()]);
        }
        if config.multiple_pitch_bends {
            args.push("--multiple-pitch-bends".to_string());
        }
        if !config.melodia_trick {
            args.push("--no-melodia".to_string());
        }
        args
    }
}

impl Default for BasicPitchCli {
    fn default() -> Self {
        Self::new()
    }
}

impl PitchModel for BasicPitchCli {
    fn predict(&self, audio: &Path, config: &TranscriptionConfig) -> Result<Prediction> {
        let work = tempdir()?;
        let file_stem = audio
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| anyhow!("audio path has no file name: {}", audio.display()))?;

        info!(audio = %audio.display(), "running pitch transcription");

        let output = Command::new(&self.command)
            .args(Self::args(config))
            .arg(work.path())
            .arg(audio)
            .output()
            .with_context(|| format!("failed to run `{}`", self.command))?;

        if !output.status.success() {
            return Err(anyhow!(
                "`{}` exited with {}: {}",
                self.command,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )
            .into());
        }

        let midi_path = work.path().join(format!("{file_stem}_basic_pitch.mid"));
        let csv_path = work.path().join(format!("{file_stem}_basic_pitch.csv"));

        let midi = fs::read(&midi_path)
            .with_context(|| format!("model wrote no MIDI at {}", midi_path.display()))?;
        let csv = fs::read_to_string(&csv_path)
            .with_context(|| format!("model wrote no note events at {}", csv_path.display()))?;

        let notes = parse_note_events(&csv)?;
        debug!(notes = notes.len(), "parsed note events");

        Ok(Prediction { midi, notes })
    }
}

/// Parse the note-event CSV (`start_time_s,end_time_s,pitch_midi,velocity[,bends...]`).
/// Velocities are written on the MIDI 0-127 scale as `round(127 * amplitude)` and
/// mapped back as `v / 127`, so amplitudes come back quantized to 1/127 steps.
pub fn parse_note_events(csv: &str) -> Result<Vec<RawNote>> {
    let mut notes = Vec::new();

    for (line_no, line) in csv.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("start_time") {
            continue;
        }

        let mut fields = line.split(',').map(str::trim);
        let mut next = |name: &str| {
            fields
                .next()
                .ok_or_else(|| anyhow!("line {}: missing {name}", line_no + 1))
        };

        let start: f64 = next("start_time_s")?
            .parse()
            .with_context(|| format!("line {}: bad start time", line_no + 1))?;
        let end: f64 = next("end_time_s")?
            .parse()
            .with_context(|| format!("line {}: bad end time", line_no + 1))?;
        let pitch: u8 = next("pitch_midi")?
            .parse()
            .with_context(|| format!("line {}: bad pitch", line_no + 1))?;
        let velocity: f64 = next("velocity")?
            .parse()
            .with_context(|| format!("line {}: bad velocity", line_no + 1))?;

        if pitch > 127 {
            return Err(anyhow!("line {}: pitch {pitch} out of MIDI range", line_no + 1).into());
        }

        notes.push(RawNote {
            start,
            end,
            pitch,
            amplitude: velocity / 127.0,
        });
    }

    Ok(notes)
}
