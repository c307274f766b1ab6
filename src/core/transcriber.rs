//! Per-track transcription: audio → note events, MIDI, MusicXML and a notes
//! summary, all written under the job's output layout.

use std::{fs, path::Path};

use serde::Serialize;
use tracing::{debug, info};

use crate::{
    config::PipelineConfig,
    error::{PipelineError, Result},
    io::layout::OutputLayout,
    model::{score::spell, PitchModel, RawNote, ScoreConverter},
    types::{NoteEvent, TrackIdentity, TrackManifest},
};

#[derive(Serialize)]
struct NotesSummary<'a> {
    track: &'a str,
    tempo: f64,
    notes: &'a [NoteEvent],
}

pub struct Transcriber<'a> {
    layout: &'a OutputLayout,
    model: &'a dyn PitchModel,
    converter: &'a dyn ScoreConverter,
    config: &'a PipelineConfig,
}

impl<'a> Transcriber<'a> {
    pub fn new(
        layout: &'a OutputLayout,
        model: &'a dyn PitchModel,
        converter: &'a dyn ScoreConverter,
        config: &'a PipelineConfig,
    ) -> Self {
        Self {
            layout,
            model,
            converter,
            config,
        }
    }

    /// Transcribe the audio file at `source` as track `identity`. Every error
    /// is attributed to the track's slug.
    pub fn transcribe(&self, source: &Path, identity: &TrackIdentity) -> Result<TrackManifest> {
        self.run(source, identity)
            .map_err(|e| e.for_track(identity.slug))
    }

    fn run(&self, source: &Path, identity: &TrackIdentity) -> Result<TrackManifest> {
        let slug = identity.slug;
        info!(track = slug, source = %source.display(), "transcribing track");

        let audio_path = self.layout.audio_path(slug);
        if !same_file(source, &audio_path) {
            fs::copy(source, &audio_path)?;
        }

        let prediction = self
            .model
            .predict(&audio_path, &self.config.transcription)
            .map_err(|e| model_error(slug, e))?;

        let midi_path = self.layout.midi_path(slug);
        fs::write(&midi_path, &prediction.midi)?;

        // The score is built from the MIDI on disk so both artifacts agree.
        let musicxml_path = self.layout.musicxml_path(slug);
        let score = self
            .converter
            .parse(&midi_path)
            .map_err(|e| export_error(slug, e))?;
        self.converter
            .export_musicxml(&score, &musicxml_path)
            .map_err(|e| export_error(slug, e))?;

        let tempo = estimate_tempo(&score.tempo_markings(), self.config.default_tempo_bpm);
        let notes = build_note_events(&prediction.notes);
        debug!(track = slug, tempo, notes = notes.len(), "built note events");

        let notes_path = self.layout.notes_path(slug);
        let summary = NotesSummary {
            track: identity.label,
            tempo,
            notes: &notes,
        };
        fs::write(&notes_path, serde_json::to_vec(&summary)?)?;

        Ok(TrackManifest {
            id: slug.to_string(),
            label: identity.label.to_string(),
            audio: Some(self.layout.relative(&audio_path)),
            midi: Some(self.layout.relative(&midi_path)),
            musicxml: Some(self.layout.relative(&musicxml_path)),
            notes: Some(self.layout.relative(&notes_path)),
            note_events: notes,
            status: None,
        })
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn model_error(slug: &str, e: PipelineError) -> PipelineError {
    match e {
        PipelineError::Transcription { .. } => e,
        other => PipelineError::Transcription {
            slug: slug.to_string(),
            message: other.to_string(),
        },
    }
}

fn export_error(slug: &str, e: PipelineError) -> PipelineError {
    match e {
        PipelineError::Export { .. } => e,
        other => PipelineError::Export {
            slug: slug.to_string(),
            message: other.to_string(),
        },
    }
}

/// Round to 6 decimal places, half away from zero.
pub fn round6(x: f64) -> f64 {
    (x * 1e6).round() / 1e6
}

/// Scientific pitch name with sharps, middle C (60) = `C4`.
pub fn pitch_name(midi: u8) -> String {
    let (step, alter, octave) = spell(midi);
    let accidental = if alter > 0 { "#" } else { "" };
    format!("{step}{accidental}{octave}")
}

/// Median of the positive, finite tempo markings; `default` when there are none.
pub fn estimate_tempo(markings: &[f64], default: f64) -> f64 {
    let mut marks: Vec<f64> = markings
        .iter()
        .copied()
        .filter(|t| t.is_finite() && *t > 0.0)
        .collect();
    if marks.is_empty() {
        return default;
    }
    marks.sort_by(|a, b| a.total_cmp(b));

    let mid = marks.len() / 2;
    if marks.len() % 2 == 0 {
        (marks[mid - 1] + marks[mid]) / 2.0
    } else {
        marks[mid]
    }
}

/// Model notes in model order, rounded, with durations clamped at zero.
pub fn build_note_events(raw: &[RawNote]) -> Vec<NoteEvent> {
    raw.iter()
        .map(|n| NoteEvent {
            start: round6(n.start.max(0.0)),
            duration: round6((n.end - n.start).max(0.0)),
            pitch_midi: n.pitch,
            pitch_name: pitch_name(n.pitch),
            velocity: n.amplitude,
        })
        .collect()
}
