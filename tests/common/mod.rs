#![allow(dead_code)]

use std::{
    f64::consts::PI,
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use rand::{rngs::StdRng, Rng, SeedableRng};
use stem_transcriber_core::{
    ensure_stereo, read_audio, render_midi, write_audio, AudioData, PipelineError, PitchModel,
    Prediction, RawNote, Result, Stem, StemPaths, StemSeparator, TranscriptionConfig,
};

pub const SR: u32 = 8_000;

/// Sine at amplitude 0.3 with raised-cosine fades at both ends.
pub fn sine(secs: f64, freq: f64, fade_secs: f64) -> Vec<f32> {
    let n = (secs * SR as f64) as usize;
    let fade = (fade_secs * SR as f64) as usize;
    (0..n)
        .map(|i| {
            let gain = if fade > 0 && i < fade {
                0.5 - 0.5 * (PI * i as f64 / fade as f64).cos()
            } else if fade > 0 && i >= n - fade {
                0.5 - 0.5 * (PI * (n - 1 - i) as f64 / fade as f64).cos()
            } else {
                1.0
            };
            (0.3 * gain * (2.0 * PI * freq * i as f64 / SR as f64).sin()) as f32
        })
        .collect()
}

/// Silence with 64-sample white-noise bursts centred on `at` (seconds).
pub fn noise_bursts(secs: f32, at: &[f32], seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = vec![0.0f32; (secs * SR as f32) as usize];
    for &t in at {
        let start = (t * SR as f32) as usize;
        for s in out.iter_mut().skip(start).take(64) {
            *s = rng.gen_range(-0.5..0.5);
        }
    }
    out
}

/// The harmonic-only stem used across the pipeline tests. The fades matter: the
/// abrupt start and end of an unfaded tone are broadband transients that
/// leave a percussive residual well above the presence threshold.
pub fn tonal_stem() -> Vec<f32> {
    sine(2.0, 440.0, 0.25)
}

/// The percussive-only stem used across the pipeline tests.
pub fn percussive_stem() -> Vec<f32> {
    noise_bursts(4.5, &[0.75, 2.25, 3.75], 7)
}

/// Write a mono signal as a stereo 16-bit WAV.
pub fn write_wav(path: &Path, samples: &[f32]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    write_audio(path, &ensure_stereo(&AudioData::mono(samples.to_vec(), SR)))
}

/// Entries of `root` whose name starts with `staging-`.
pub fn leftover_scratch(root: &Path) -> Vec<PathBuf> {
    fs::read_dir(root)
        .map(|rd| {
            rd.filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| {
                    p.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with("staging-"))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Writes the configured stems into the requested directory.
#[derive(Default)]
pub struct StubSeparator {
    stems: Vec<(Stem, Vec<f32>)>,
    empty: Vec<Stem>,
    seen_dir: Arc<Mutex<Option<PathBuf>>>,
}

impl StubSeparator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stem(mut self, stem: Stem, samples: Vec<f32>) -> Self {
        self.stems.push((stem, samples));
        self
    }

    /// The stem file is created but left zero-length.
    pub fn with_empty_stem(mut self, stem: Stem) -> Self {
        self.empty.push(stem);
        self
    }

    /// Shared handle to the directory the pipeline asked for.
    pub fn seen_dir(&self) -> Arc<Mutex<Option<PathBuf>>> {
        Arc::clone(&self.seen_dir)
    }
}

impl StemSeparator for StubSeparator {
    fn separate(&self, _input: &Path, output_dir: &Path) -> Result<StemPaths> {
        fs::create_dir_all(output_dir)?;
        let paths = StemPaths::in_dir(output_dir);
        for (stem, samples) in &self.stems {
            write_wav(paths.get(*stem), samples)?;
        }
        for stem in &self.empty {
            fs::write(paths.get(*stem), b"")?;
        }
        *self.seen_dir.lock().unwrap() = Some(output_dir.to_path_buf());
        Ok(paths)
    }
}

/// Leaves a partial file behind and then fails.
pub struct FailingSeparator;

impl StemSeparator for FailingSeparator {
    fn separate(&self, _input: &Path, output_dir: &Path) -> Result<StemPaths> {
        fs::create_dir_all(output_dir)?;
        fs::write(output_dir.join("vocals.wav"), b"partial")?;
        Err(PipelineError::Separation("model crashed".into()))
    }
}

/// Deterministic pitch model: two notes per track, MIDI rendered at a fixed tempo.
pub struct StubPitchModel {
    /// `None` renders MIDI without any tempo marking.
    pub tempo_bpm: Option<f64>,
    /// File stem (the track slug) on which prediction fails.
    pub fail_on: Option<&'static str>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl StubPitchModel {
    pub fn new() -> Self {
        Self {
            tempo_bpm: Some(100.0),
            fail_on: None,
            calls: Arc::default(),
        }
    }

    pub fn without_tempo() -> Self {
        Self {
            tempo_bpm: None,
            ..Self::new()
        }
    }

    pub fn failing_on(slug: &'static str) -> Self {
        Self {
            fail_on: Some(slug),
            ..Self::new()
        }
    }

    /// Shared handle to the slugs predicted so far, in call order.
    pub fn calls(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.calls)
    }

    pub fn notes() -> Vec<RawNote> {
        vec![
            RawNote {
                start: 0.1234567,
                end: 0.6,
                pitch: 60,
                amplitude: 0.8,
            },
            RawNote {
                start: 0.5,
                end: 1.0,
                pitch: 61,
                amplitude: 0.5,
            },
        ]
    }
}

impl PitchModel for StubPitchModel {
    fn predict(&self, audio: &Path, _config: &TranscriptionConfig) -> Result<Prediction> {
        let slug = audio
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        self.calls.lock().unwrap().push(slug.clone());

        if self.fail_on == Some(slug.as_str()) {
            return Err(anyhow::anyhow!("inference failed").into());
        }

        // The track audio must be decodable.
        read_audio(audio)?;

        let notes = Self::notes();
        let midi = match self.tempo_bpm {
            Some(bpm) => render_midi(&notes, bpm)?,
            None => midi_without_tempo(),
        };
        Ok(Prediction { midi, notes })
    }
}

/// A one-note SMF with no tempo meta event.
pub fn midi_without_tempo() -> Vec<u8> {
    use midly::num::{u15, u28, u4, u7};
    use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};

    let note = |delta: u32, message| TrackEvent {
        delta: u28::from(delta),
        kind: TrackEventKind::Midi {
            channel: u4::from(0),
            message,
        },
    };
    let track = vec![
        note(
            0,
            MidiMessage::NoteOn {
                key: u7::from(67),
                vel: u7::from(100),
            },
        ),
        note(
            480,
            MidiMessage::NoteOff {
                key: u7::from(67),
                vel: u7::from(0),
            },
        ),
        TrackEvent {
            delta: u28::from(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        },
    ];
    let smf = Smf {
        header: Header {
            format: Format::SingleTrack,
            timing: Timing::Metrical(u15::from(480)),
        },
        tracks: vec![track],
    };
    let mut bytes = Vec::new();
    smf.write_std(&mut bytes).unwrap();
    bytes
}
