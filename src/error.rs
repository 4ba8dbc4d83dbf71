//! Error taxonomy for training, inference and artifact handling

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SegmentError>;

#[derive(Error, Debug)]
pub enum SegmentError {
    /// Record shape disagrees with the feature schema.
    #[error("schema mismatch: {0}")]
    Schema(String),

    /// Training data cannot support the requested cluster count.
    #[error("cannot form {requested} clusters from {distinct} distinct feature vectors")]
    DegenerateInput { requested: usize, distinct: usize },

    /// A single field failed to parse or validate.
    #[error("invalid value for field `{field}`: {reason}")]
    InputValidation { field: String, reason: String },

    /// Bundle missing or corrupt.
    #[error("failed to load artifact bundle from {}: {reason}", .path.display())]
    ArtifactLoad { path: PathBuf, reason: String },

    #[error("feature vector has {actual} dimensions, model expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("cluster id {id} is out of range for {n_clusters} clusters")]
    UnknownCluster { id: usize, n_clusters: usize },

    #[error("clustering failed: {0}")]
    Clustering(String),

    #[error("chart rendering failed: {0}")]
    Render(String),

    #[error("data error: {0}")]
    Data(#[from] polars::prelude::PolarsError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SegmentError {
    pub(crate) fn input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InputValidation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Message shown to the person who submitted a request.
    pub fn user_message(&self) -> String {
        match self {
            Self::InputValidation { .. } => {
                format!("Input error: {self}. Please check the numeric values.")
            }
            Self::Schema(_) => format!("Input error: {self}."),
            _ => format!("An unexpected error occurred during prediction: {self}"),
        }
    }

    /// True when the caller can fix the problem by re-submitting input.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::InputValidation { .. } | Self::Schema(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_validation_message_names_field() {
        let err = SegmentError::input("tenure", "expected an integer, got \"abc\"");
        let message = err.user_message();

        assert!(message.contains("tenure"));
        assert!(message.contains("abc"));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_artifact_load_is_not_recoverable() {
        let err = SegmentError::ArtifactLoad {
            path: PathBuf::from("bundle.json"),
            reason: "missing".to_string(),
        };

        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("bundle.json"));
    }
}
