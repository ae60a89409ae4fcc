//! Request model and error taxonomy for the analysis orchestrator.

use std::time::Duration;
use thiserror::Error;

use crate::backend::BackendError;
use crate::extraction::{ArtifactRef, ExtractionResult, ExtractionStatus, Kind, Payload};
use crate::storage::StorageError;

/// Errors surfaced to callers of the analysis operations.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Content could not be derived from the artifact's bytes.
    #[error("failed to extract {kind} content: {reason}")]
    Extraction {
        /// Kind the registry attempted.
        kind: Kind,
        /// Failure reason reported by the strategy.
        reason: String,
    },
    /// The store has no artifact under the key.
    #[error("artifact not found: {0}")]
    ArtifactNotFound(String),
    /// The store failed while reading the artifact.
    #[error("failed to load artifact: {0}")]
    Storage(String),
    /// The backend is not connected and could not be brought up.
    #[error("analysis backend is unavailable")]
    BackendUnavailable,
    /// The backend call exceeded its deadline.
    #[error("analysis backend timed out after {0:?}")]
    BackendTimeout(Duration),
    /// The backend answered with an application-level error.
    #[error("analysis backend call failed: {detail}")]
    BackendCallFailed {
        /// Provider diagnostic, preserved verbatim.
        detail: String,
    },
    /// A batch was requested without any files.
    #[error("at least one file is required")]
    EmptyBatch,
}

impl From<BackendError> for AnalysisError {
    fn from(error: BackendError) -> Self {
        match error {
            BackendError::Unavailable | BackendError::Launch(_) => Self::BackendUnavailable,
            BackendError::Timeout(after) => Self::BackendTimeout(after),
            BackendError::CallFailed { detail } => Self::BackendCallFailed { detail },
        }
    }
}

impl From<StorageError> for AnalysisError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::NotFound(key) => Self::ArtifactNotFound(key),
            other @ StorageError::Io { .. } => Self::Storage(other.to_string()),
        }
    }
}

/// Content contributed by one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryContent {
    /// Extracted (possibly truncated) text.
    Payload(String),
    /// Stand-in for a file that could not be extracted.
    Placeholder {
        /// Why extraction failed.
        reason: String,
    },
}

/// One file inside an [`AnalysisRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisEntry {
    /// File name shown to the model.
    pub display_name: String,
    /// Kind of the file; placeholders are `Unsupported`.
    pub kind: Kind,
    /// Payload or placeholder.
    pub content: EntryContent,
}

impl AnalysisEntry {
    /// Text entry for an extracted payload.
    pub fn payload(artifact: &ArtifactRef, kind: Kind, text: impl Into<String>) -> Self {
        Self {
            display_name: artifact.display_name.clone(),
            kind,
            content: EntryContent::Payload(text.into()),
        }
    }

    /// Placeholder entry naming the failure.
    pub fn placeholder(artifact: &ArtifactRef, reason: impl Into<String>) -> Self {
        Self {
            display_name: artifact.display_name.clone(),
            kind: Kind::Unsupported,
            content: EntryContent::Placeholder {
                reason: reason.into(),
            },
        }
    }

    /// Convert an extraction into a batch entry. Failures become placeholders and images are
    /// referenced by name instead of being inlined.
    pub fn from_extraction(result: ExtractionResult) -> Self {
        let ExtractionResult {
            source,
            kind,
            status,
        } = result;
        match status {
            ExtractionStatus::Ok(Payload::Text(text)) => Self::payload(&source, kind, text),
            ExtractionStatus::Ok(Payload::Image { .. }) => {
                let reference = format!("[Image: {}]", source.display_name);
                Self::payload(&source, kind, reference)
            }
            ExtractionStatus::Failed(reason) => Self::placeholder(&source, reason),
        }
    }

    /// Whether this entry stands in for a failed file.
    pub fn is_placeholder(&self) -> bool {
        matches!(self.content, EntryContent::Placeholder { .. })
    }

    /// Label rendered next to the file name.
    pub fn label(&self) -> &'static str {
        if self.is_placeholder() {
            "error"
        } else {
            self.kind.label()
        }
    }

    /// Text rendered as the entry's content.
    pub fn text(&self) -> String {
        match &self.content {
            EntryContent::Payload(text) => text.clone(),
            EntryContent::Placeholder { reason } => {
                format!("[Error processing file {}: {reason}]", self.display_name)
            }
        }
    }
}

/// Ordered files plus the user's question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    /// One entry per requested artifact, in caller order.
    pub entries: Vec<AnalysisEntry>,
    /// Free-text question.
    pub query: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_extraction_becomes_named_placeholder() {
        let artifact = ArtifactRef::from_key("u/b.pdf");
        let entry = AnalysisEntry::from_extraction(ExtractionResult {
            source: artifact,
            kind: Kind::Pdf,
            status: ExtractionStatus::Failed("bad xref".into()),
        });
        assert!(entry.is_placeholder());
        assert_eq!(entry.kind, Kind::Unsupported);
        assert_eq!(entry.label(), "error");
        assert_eq!(entry.text(), "[Error processing file b.pdf: bad xref]");
    }

    #[test]
    fn images_are_referenced_by_name() {
        let artifact = ArtifactRef::from_key("u/cat.png");
        let entry = AnalysisEntry::from_extraction(ExtractionResult {
            source: artifact,
            kind: Kind::Image,
            status: ExtractionStatus::Ok(Payload::Image {
                base64: "AAAA".into(),
                mime_type: "image/png",
            }),
        });
        assert_eq!(entry.label(), "image");
        assert_eq!(entry.text(), "[Image: cat.png]");
    }

    #[test]
    fn backend_errors_map_to_taxonomy() {
        assert!(matches!(
            AnalysisError::from(BackendError::Launch("npx".into())),
            AnalysisError::BackendUnavailable
        ));
        assert!(matches!(
            AnalysisError::from(BackendError::Timeout(Duration::from_secs(1))),
            AnalysisError::BackendTimeout(_)
        ));
        let error = AnalysisError::from(BackendError::CallFailed {
            detail: "quota".into(),
        });
        assert!(matches!(error, AnalysisError::BackendCallFailed { ref detail } if detail == "quota"));
    }
}
