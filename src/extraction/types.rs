//! Artifact identity, document kinds, and extraction outcomes.

use std::fmt;
use thiserror::Error;

/// Closed set of document kinds the registry knows how to handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Raster or vector image routed to the vision request path.
    Image,
    /// Portable Document Format.
    Pdf,
    /// UTF-8 (or near UTF-8) text file.
    PlainText,
    /// Comma-separated tabular data.
    Csv,
    /// Word processing document (`.docx`, `.doc`).
    RichDocument,
    /// Anything the registry does not recognise.
    Unsupported,
}

impl Kind {
    /// Short label used when rendering files inside prompts.
    pub fn label(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Pdf => "pdf",
            Self::PlainText => "text",
            Self::Csv => "csv",
            Self::RichDocument => "docx",
            Self::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Reference to an artifact held by the storage collaborator.
///
/// Keys are owner-scoped (`<owner>/<file name>`); the display name is the final path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    /// Opaque, globally unique storage key.
    pub key: String,
    /// File name shown to users and embedded in prompts.
    pub display_name: String,
    /// Kind derived from the display name suffix.
    pub kind: Kind,
    /// Size in bytes when the store reported one.
    pub size: Option<u64>,
}

impl ArtifactRef {
    /// Build a reference from a storage key, deriving the display name and kind.
    pub fn from_key(key: impl Into<String>) -> Self {
        let key = key.into();
        let display_name = key.rsplit('/').next().unwrap_or(&key).to_string();
        let kind = super::classify(&display_name);
        Self {
            key,
            display_name,
            kind,
            size: None,
        }
    }

    /// Attach the byte length reported by the store.
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Owner prefix of the key, if the key is scoped.
    pub fn owner(&self) -> Option<&str> {
        self.key
            .split_once('/')
            .map(|(owner, _)| owner)
            .filter(|owner| !owner.is_empty())
    }
}

/// Analyzable content produced by an extraction strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Plain text ready to be embedded in a prompt.
    Text(String),
    /// Base64-encoded image bytes destined for a vision request.
    Image {
        /// Standard base64 encoding of the raw bytes.
        base64: String,
        /// MIME type derived from the file suffix.
        mime_type: &'static str,
    },
}

impl Payload {
    /// Text content, if this payload is textual.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Image { .. } => None,
        }
    }
}

/// Outcome of a single extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionStatus {
    /// Extraction succeeded.
    Ok(Payload),
    /// Extraction failed; the string is a human-readable reason.
    Failed(String),
}

/// Transient result of running the registry over one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionResult {
    /// Artifact the bytes came from.
    pub source: ArtifactRef,
    /// Kind used to select the strategy.
    pub kind: Kind,
    /// Payload or failure reason.
    pub status: ExtractionStatus,
}

impl ExtractionResult {
    /// Whether the extraction produced a payload.
    pub fn is_ok(&self) -> bool {
        matches!(self.status, ExtractionStatus::Ok(_))
    }
}

/// Errors raised by individual extraction strategies.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// No strategy exists for the kind.
    #[error("unsupported file type")]
    Unsupported,
    /// PDF parser rejected the input.
    #[error("failed to extract PDF text: {0}")]
    Pdf(String),
    /// Word document could not be opened or parsed.
    #[error("failed to extract document text: {0}")]
    Document(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_ref_derives_display_name_and_owner() {
        let artifact = ArtifactRef::from_key("user-1/reports/Q3.PDF");
        assert_eq!(artifact.display_name, "Q3.PDF");
        assert_eq!(artifact.kind, Kind::Pdf);
        assert_eq!(artifact.owner(), Some("user-1"));
        assert_eq!(artifact.size, None);
    }

    #[test]
    fn unscoped_key_has_no_owner() {
        let artifact = ArtifactRef::from_key("notes.txt").with_size(11);
        assert_eq!(artifact.display_name, "notes.txt");
        assert_eq!(artifact.owner(), None);
        assert_eq!(artifact.size, Some(11));
    }
}
