use thiserror::Error;

/// Central error type for the stem-transcriber-core crate.
#[derive(Debug, Error)]
pub enum PipelineError {
    // Generic fallback (wraps anyhow)
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),

    // Domain-specific variants
    #[error("Cannot decode audio {path}: {message}")]
    Decode { path: String, message: String },

    #[error("Stem separation failed: {0}")]
    Separation(String),

    #[error("Transcription failed for track `{slug}`: {message}")]
    Transcription { slug: String, message: String },

    #[error("Score export failed for track `{slug}`: {message}")]
    Export { slug: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error for track `{slug}`: {source}")]
    TrackIo {
        slug: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn decode(path: impl AsRef<std::path::Path>, message: impl ToString) -> Self {
        PipelineError::Decode {
            path: path.as_ref().display().to_string(),
            message: message.to_string(),
        }
    }

    /// Slug of the track this error belongs to, if any.
    pub fn slug(&self) -> Option<&str> {
        match self {
            PipelineError::Transcription { slug, .. }
            | PipelineError::Export { slug, .. }
            | PipelineError::TrackIo { slug, .. } => Some(slug),
            _ => None,
        }
    }

    /// Attribute an unattributed error to `slug`. Errors that already name a
    /// track, or that are not track-level (decode, separation, config), are
    /// returned unchanged.
    pub fn for_track(self, slug: &str) -> Self {
        match self {
            PipelineError::Io(source) => PipelineError::TrackIo {
                slug: slug.to_string(),
                source,
            },
            PipelineError::Anyhow(e) => PipelineError::Transcription {
                slug: slug.to_string(),
                message: format!("{e:#}"),
            },
            other => other,
        }
    }
}

// --- Implement From conversions for common errors ---
impl From<serde_json::Error> for PipelineError {
    fn from(e: serde_json::Error) -> Self {
        PipelineError::Anyhow(e.into())
    }
}

impl From<midly::Error> for PipelineError {
    fn from(e: midly::Error) -> Self {
        PipelineError::Anyhow(anyhow::anyhow!("MIDI error: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
