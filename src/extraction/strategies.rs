//! Byte-to-payload strategies for images, PDFs, and plain text.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use std::panic::{AssertUnwindSafe, catch_unwind};

use super::types::{ExtractError, Payload};

/// Encode image bytes for the vision request path. Never fails.
pub(crate) fn extract_image(bytes: &[u8], mime_type: &'static str) -> Payload {
    Payload::Image {
        base64: STANDARD.encode(bytes),
        mime_type,
    }
}

/// Decode text as UTF-8, substituting U+FFFD for invalid sequences. Never fails.
pub(crate) fn extract_plain_text(bytes: &[u8]) -> Payload {
    Payload::Text(String::from_utf8_lossy(bytes).into_owned())
}

/// Concatenate the text of every page into one string.
///
/// The parser panics on some malformed inputs; those panics are reported as failures so a
/// corrupt upload cannot take down the worker.
pub(crate) fn extract_pdf(bytes: &[u8]) -> Result<Payload, ExtractError> {
    match catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(bytes))) {
        Ok(Ok(text)) => Ok(Payload::Text(text)),
        Ok(Err(error)) => Err(ExtractError::Pdf(error.to_string())),
        Err(_) => Err(ExtractError::Pdf("parser aborted on malformed input".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_verbatim() {
        assert_eq!(
            extract_plain_text(b"hello world"),
            Payload::Text("hello world".into())
        );
    }

    #[test]
    fn invalid_utf8_is_replaced_not_rejected() {
        let payload = extract_plain_text(&[b'o', b'k', 0xff, b'!']);
        assert_eq!(payload, Payload::Text("ok\u{fffd}!".into()));
    }

    #[test]
    fn image_bytes_are_base64_encoded() {
        let payload = extract_image(&[0x89, b'P', b'N', b'G'], "image/png");
        assert_eq!(
            payload,
            Payload::Image {
                base64: "iVBORw==".into(),
                mime_type: "image/png",
            }
        );
    }

    #[test]
    fn corrupt_pdf_fails() {
        let error = extract_pdf(b"definitely not a pdf").unwrap_err();
        assert!(matches!(error, ExtractError::Pdf(_)));
    }
}
