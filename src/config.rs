//! Configuration for the derivation and transcription pipeline.
//!
//! Every policy constant lives here with its default so callers (and tests)
//! can move the thresholds without touching the pipeline code.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{PipelineError, Result};

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// A derived component is present iff its RMS energy is strictly above this.
    pub presence_threshold: f64,
    pub hpss: HpssConfig,
    pub transcription: TranscriptionConfig,
    /// Tempo reported when the converted score carries no tempo marking.
    pub default_tempo_bpm: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            presence_threshold: 1e-4,
            hpss: HpssConfig::default(),
            transcription: TranscriptionConfig::default(),
            default_tempo_bpm: 120.0,
        }
    }
}

/// HPSS (Harmonic/Percussive Source Separation) configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HpssConfig {
    pub n_fft: usize,
    pub hop_length: usize,
    /// Median kernel along time, in frames.
    pub harmonic_kernel: usize,
    /// Median kernel along frequency, in bins.
    pub percussive_kernel: usize,
    /// Soft-mask exponent.
    pub power: f32,
}

impl Default for HpssConfig {
    fn default() -> Self {
        Self {
            n_fft: 2048,
            hop_length: 512,
            harmonic_kernel: 31,
            percussive_kernel: 31,
            power: 2.0,
        }
    }
}

/// Fixed settings handed to the pitch-transcription model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub onset_threshold: f32,
    pub frame_threshold: f32,
    pub minimum_note_length_ms: f32,
    pub minimum_frequency: Option<f32>,
    pub maximum_frequency: Option<f32>,
    pub multiple_pitch_bends: bool,
    pub melodia_trick: bool,
    pub midi_tempo: f32,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            onset_threshold: 0.5,
            frame_threshold: 0.3,
            minimum_note_length_ms: 90.0,
            minimum_frequency: None,
            maximum_frequency: None,
            multiple_pitch_bends: false,
            melodia_trick: true,
            midi_tempo: 120.0,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.presence_threshold.is_finite() || self.presence_threshold < 0.0 {
            return Err(PipelineError::Config(format!(
                "presence_threshold must be a finite, non-negative number (got {})",
                self.presence_threshold
            )));
        }
        if !self.default_tempo_bpm.is_finite() || self.default_tempo_bpm <= 0.0 {
            return Err(PipelineError::Config(format!(
                "default_tempo_bpm must be positive (got {})",
                self.default_tempo_bpm
            )));
        }
        self.hpss.validate()?;
        self.transcription.validate()
    }
}

impl HpssConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_fft < 2 {
            return Err(PipelineError::Config("hpss.n_fft must be at least 2".into()));
        }
        if self.hop_length == 0 || self.hop_length > self.n_fft {
            return Err(PipelineError::Config(format!(
                "hpss.hop_length must be in 1..={} (got {})",
                self.n_fft, self.hop_length
            )));
        }
        for (name, k) in [
            ("harmonic_kernel", self.harmonic_kernel),
            ("percussive_kernel", self.percussive_kernel),
        ] {
            if k == 0 || k % 2 == 0 {
                return Err(PipelineError::Config(format!(
                    "hpss.{name} must be odd and non-zero (got {k})"
                )));
            }
        }
        if !self.power.is_finite() || self.power <= 0.0 {
            return Err(PipelineError::Config(format!(
                "hpss.power must be positive (got {})",
                self.power
            )));
        }
        Ok(())
    }
}

impl TranscriptionConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, v) in [
            ("onset_threshold", self.onset_threshold),
            ("frame_threshold", self.frame_threshold),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(PipelineError::Config(format!(
                    "transcription.{name} must be within [0, 1] (got {v})"
                )));
            }
        }
        if !self.minimum_note_length_ms.is_finite() || self.minimum_note_length_ms < 0.0 {
            return Err(PipelineError::Config(
                "transcription.minimum_note_length_ms must be non-negative".into(),
            ));
        }
        if let (Some(lo), Some(hi)) = (self.minimum_frequency, self.maximum_frequency) {
            if lo >= hi {
                return Err(PipelineError::Config(format!(
                    "transcription.minimum_frequency ({lo}) must be below maximum_frequency ({hi})"
                )));
            }
        }
        if !self.midi_tempo.is_finite() || self.midi_tempo <= 0.0 {
            return Err(PipelineError::Config(
                "transcription.midi_tempo must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Load and validate a JSON configuration file. Missing fields keep their defaults.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PipelineConfig> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|e| {
        PipelineError::Config(format!("cannot read {}: {e}", path.display()))
    })?;
    let config: PipelineConfig = serde_json::from_str(&raw).map_err(|e| {
        PipelineError::Config(format!("cannot parse {}: {e}", path.display()))
    })?;
    config.validate()?;
    Ok(config)
}
