//! Harmonic/percussive track derivation.
//!
//! Splits one stem into its tonal and transient parts and keeps each part
//! only when its RMS energy clears the configured presence threshold.

use std::path::Path;

use tracing::{debug, info};

use crate::{
    config::PipelineConfig,
    core::{
        audio::{downmix_to_mono, read_audio},
        dsp::{hpss, rms},
    },
    error::Result,
    types::AudioData,
};

/// Components kept after decomposition. Absent parts are `None`, never silence.
#[derive(Clone, Debug, Default)]
pub struct DerivedTracks {
    pub harmonic: Option<AudioData>,
    pub percussive: Option<AudioData>,
    pub harmonic_energy: f64,
    pub percussive_energy: f64,
}

impl DerivedTracks {
    pub fn harmonic_present(&self) -> bool {
        self.harmonic.is_some()
    }

    pub fn percussive_present(&self) -> bool {
        self.percussive.is_some()
    }
}

/// NaN and infinite energies never count as present.
pub fn is_present(energy: f64, threshold: f64) -> bool {
    energy.is_finite() && energy > threshold
}

pub fn derive(signal: &AudioData, config: &PipelineConfig) -> DerivedTracks {
    let mono = downmix_to_mono(&signal.samples, signal.channels);
    if mono.is_empty() {
        debug!("empty signal, nothing to derive");
        return DerivedTracks::default();
    }

    let (harmonic, percussive) = hpss(&mono, &config.hpss);
    let harmonic_energy = rms(&harmonic);
    let percussive_energy = rms(&percussive);

    let threshold = config.presence_threshold;
    let harmonic_present = is_present(harmonic_energy, threshold);
    let percussive_present = is_present(percussive_energy, threshold);

    info!(
        harmonic_energy,
        percussive_energy,
        threshold,
        harmonic_present,
        percussive_present,
        "harmonic/percussive decomposition"
    );

    DerivedTracks {
        harmonic: harmonic_present.then(|| AudioData::mono(harmonic, signal.sample_rate)),
        percussive: percussive_present.then(|| AudioData::mono(percussive, signal.sample_rate)),
        harmonic_energy,
        percussive_energy,
    }
}

/// Decode `path` and derive its components.
pub fn derive_from_file<P: AsRef<Path>>(path: P, config: &PipelineConfig) -> Result<DerivedTracks> {
    let audio = read_audio(path)?;
    Ok(derive(&audio, config))
}
