use std::fmt;
use std::io;
use std::path::PathBuf;

/// Errors raised while building the track list for a region.
///
/// `Configuration`, `AnnotationLoad` and `Render` abort a run. `AlignmentLoad`
/// and `Naming` are scoped to a single alignment file and are collected next
/// to the successfully loaded tracks.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackError {
    Configuration { field: String, reason: String },
    AnnotationLoad { path: PathBuf, reason: String },
    AlignmentLoad { path: PathBuf, reason: String },
    Naming { path: PathBuf },
    Render(String),
}

impl TrackError {
    pub fn configuration(field: &str, reason: impl Into<String>) -> Self {
        TrackError::Configuration {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn annotation_load(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        TrackError::AnnotationLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn alignment_load(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        TrackError::AlignmentLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for TrackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackError::Configuration { field, reason } => {
                write!(f, "Invalid configuration field '{}': {}", field, reason)
            }
            TrackError::AnnotationLoad { path, reason } => {
                write!(f, "Failed to load annotation '{}': {}", path.display(), reason)
            }
            TrackError::AlignmentLoad { path, reason } => {
                write!(f, "Failed to load alignments '{}': {}", path.display(), reason)
            }
            TrackError::Naming { path } => write!(
                f,
                "Cannot derive a track name from '{}': empty prefix before the first '.'",
                path.display()
            ),
            TrackError::Render(msg) => write!(f, "Rendering failed: {}", msg),
        }
    }
}

impl std::error::Error for TrackError {}

impl From<TrackError> for io::Error {
    fn from(e: TrackError) -> Self {
        let kind = match e {
            TrackError::Configuration { .. } => io::ErrorKind::InvalidInput,
            TrackError::AnnotationLoad { .. } | TrackError::AlignmentLoad { .. } => {
                io::ErrorKind::InvalidData
            }
            TrackError::Naming { .. } => io::ErrorKind::InvalidInput,
            TrackError::Render(_) => io::ErrorKind::Other,
        };
        io::Error::new(kind, e.to_string())
    }
}
