//! Extractor registry: maps file names to document kinds and kinds to extraction strategies.
//!
//! Everything in this module is synchronous and CPU-bound. Async callers should run
//! [`extract`] on a blocking thread.

mod document;
mod strategies;
mod tabular;
pub mod types;

pub use types::{ArtifactRef, ExtractError, ExtractionResult, ExtractionStatus, Kind, Payload};

/// Classify a file name by its suffix (case-insensitive).
pub fn classify(display_name: &str) -> Kind {
    match suffix(display_name).as_deref() {
        Some("jpg" | "jpeg" | "png" | "gif" | "webp" | "svg") => Kind::Image,
        Some("pdf") => Kind::Pdf,
        Some("txt") => Kind::PlainText,
        Some("csv") => Kind::Csv,
        Some("docx" | "doc") => Kind::RichDocument,
        _ => Kind::Unsupported,
    }
}

/// MIME type advertised for a file name, used when embedding images in requests.
pub fn mime_type(display_name: &str) -> &'static str {
    match suffix(display_name).as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain",
        Some("csv") => "text/csv",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("doc") => "application/msword",
        _ => "application/octet-stream",
    }
}

fn suffix(display_name: &str) -> Option<String> {
    display_name
        .rsplit_once('.')
        .map(|(_, extension)| extension.to_ascii_lowercase())
}

/// Run the strategy registered for `kind` over `bytes`.
///
/// `display_name` only matters for images, where it selects the MIME type.
pub fn extract_payload(
    kind: Kind,
    display_name: &str,
    bytes: &[u8],
) -> Result<Payload, ExtractError> {
    match kind {
        Kind::Image => Ok(strategies::extract_image(bytes, mime_type(display_name))),
        Kind::Pdf => strategies::extract_pdf(bytes),
        Kind::PlainText => Ok(strategies::extract_plain_text(bytes)),
        Kind::Csv => Ok(tabular::extract_csv(bytes)),
        Kind::RichDocument => document::extract_document(bytes),
        Kind::Unsupported => Err(ExtractError::Unsupported),
    }
}

/// Extract an artifact's bytes into an [`ExtractionResult`]. Never panics or errors; failures
/// are reported through [`ExtractionStatus::Failed`].
pub fn extract(source: &ArtifactRef, bytes: &[u8]) -> ExtractionResult {
    let kind = source.kind;
    let status = match extract_payload(kind, &source.display_name, bytes) {
        Ok(payload) => ExtractionStatus::Ok(payload),
        Err(error) => {
            tracing::warn!(
                artifact = %source.key,
                kind = %kind,
                error = %error,
                "Extraction failed"
            );
            ExtractionStatus::Failed(error.to_string())
        }
    };
    ExtractionResult {
        source: source.clone(),
        kind,
        status,
    }
}
