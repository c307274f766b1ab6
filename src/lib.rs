//! # stem-transcriber-core
//!
//! Splits a mixed recording into stems, derives guitar-like and residual
//! tracks from the "other" stem, and transcribes every track into note
//! events, MIDI, MusicXML and a JSON note summary.

pub mod config;
pub mod core;
pub mod error;
pub mod io;
pub mod model;
pub mod types;
mod utils;

pub use crate::{
    config::{load_config, HpssConfig, PipelineConfig, TranscriptionConfig},
    core::{
        audio::{downmix_to_mono, ensure_stereo, read_audio, write_audio},
        deriver::{derive, derive_from_file, DerivedTracks},
        pipeline::Pipeline,
        transcriber::Transcriber,
    },
    error::{PipelineError, Result},
    io::{
        layout::OutputLayout,
        progress::{set_progress_callback, PipelineProgress},
    },
    model::{
        basic_pitch::BasicPitchCli, midi::render_midi, score::MusicXmlConverter,
        separator::SpleeterSeparator, PitchModel, Prediction, RawNote, Score, ScoreConverter,
        StemPaths, StemSeparator,
    },
    types::{
        AudioData, JobResult, NoteEvent, Stem, TrackIdentity, TrackManifest, TrackResult,
        UNRECOGNIZED_INSTRUMENT,
    },
};
