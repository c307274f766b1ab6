use serde::{Deserialize, Serialize};

/// Status carried by the guitar placeholder when no harmonic part was found.
pub const UNRECOGNIZED_INSTRUMENT: &str = "unrecognized instrument";

#[derive(Clone, Debug, PartialEq)]
pub struct AudioData {
    /// Interleaved samples.
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioData {
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
            channels: 1,
        }
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Stable key plus display name of one logical track slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TrackIdentity {
    pub slug: &'static str,
    pub label: &'static str,
}

impl TrackIdentity {
    pub const VOCALS: TrackIdentity = TrackIdentity {
        slug: "vocals",
        label: "Vocals",
    };
    pub const PIANO: TrackIdentity = TrackIdentity {
        slug: "piano",
        label: "Piano / Keys",
    };
    pub const BASS: TrackIdentity = TrackIdentity {
        slug: "bass",
        label: "Bass",
    };
    pub const DRUMS: TrackIdentity = TrackIdentity {
        slug: "drums",
        label: "Drums / Percussion",
    };
    pub const GUITAR: TrackIdentity = TrackIdentity {
        slug: "guitar",
        label: "Guitar",
    };
    pub const OTHER: TrackIdentity = TrackIdentity {
        slug: "other",
        label: "Other instruments",
    };

    /// Every slot in job-result order.
    pub const ALL: [TrackIdentity; 6] = [
        Self::VOCALS,
        Self::PIANO,
        Self::BASS,
        Self::DRUMS,
        Self::GUITAR,
        Self::OTHER,
    ];
}

/// Stems produced by source separation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stem {
    Vocals,
    Piano,
    Bass,
    Drums,
    Other,
}

impl Stem {
    /// Stems transcribed as-is, in result order.
    pub const DIRECT: [Stem; 4] = [Stem::Vocals, Stem::Piano, Stem::Bass, Stem::Drums];

    pub fn name(self) -> &'static str {
        match self {
            Stem::Vocals => "vocals",
            Stem::Piano => "piano",
            Stem::Bass => "bass",
            Stem::Drums => "drums",
            Stem::Other => "other",
        }
    }

    pub fn identity(self) -> TrackIdentity {
        match self {
            Stem::Vocals => TrackIdentity::VOCALS,
            Stem::Piano => TrackIdentity::PIANO,
            Stem::Bass => TrackIdentity::BASS,
            Stem::Drums => TrackIdentity::DRUMS,
            Stem::Other => TrackIdentity::OTHER,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteEvent {
    pub start: f64,
    pub duration: f64,
    pub pitch_midi: u8,
    pub pitch_name: String,
    pub velocity: f64,
}

/// Uniform, serialized description of one track's artifacts. Paths are
/// relative to the job output root.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackManifest {
    pub id: String,
    pub label: String,
    pub audio: Option<String>,
    pub midi: Option<String>,
    pub musicxml: Option<String>,
    pub notes: Option<String>,
    pub note_events: Vec<NoteEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl TrackManifest {
    pub fn is_placeholder(&self) -> bool {
        self.audio.is_none()
    }
}

/// Outcome for one slot. Flattened to a [`TrackManifest`] when serialized.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(into = "TrackManifest")]
pub enum TrackResult {
    Present(TrackManifest),
    Absent {
        identity: TrackIdentity,
        status: Option<&'static str>,
    },
}

impl TrackResult {
    pub fn slug(&self) -> &str {
        match self {
            TrackResult::Present(m) => &m.id,
            TrackResult::Absent { identity, .. } => identity.slug,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, TrackResult::Present(_))
    }

    pub fn manifest(&self) -> TrackManifest {
        self.clone().into()
    }
}

impl From<TrackResult> for TrackManifest {
    fn from(result: TrackResult) -> Self {
        match result {
            TrackResult::Present(manifest) => manifest,
            TrackResult::Absent { identity, status } => TrackManifest {
                id: identity.slug.to_string(),
                label: identity.label.to_string(),
                audio: None,
                midi: None,
                musicxml: None,
                notes: None,
                note_events: Vec::new(),
                status: status.map(str::to_string),
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    pub job_id: String,
    pub tracks: Vec<TrackResult>,
}

impl JobResult {
    pub fn track(&self, slug: &str) -> Option<&TrackResult> {
        self.tracks.iter().find(|t| t.slug() == slug)
    }

    pub fn to_json_line(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
