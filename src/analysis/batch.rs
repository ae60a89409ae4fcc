//! Multi-file request assembly: per-file truncation and prompt layout.

use std::borrow::Cow;
use std::fmt::Write as _;

use super::types::{AnalysisEntry, AnalysisRequest, EntryContent};

/// Appended to any content cut at the per-file budget.
pub const TRUNCATION_MARKER: &str = "\n... [Content truncated due to length]";

/// Budget applied to each file in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    /// Maximum characters kept per file before the truncation marker.
    pub max_content_chars: usize,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            max_content_chars: 8_000,
        }
    }
}

/// Cut `content` to `limit` characters (not bytes) and append [`TRUNCATION_MARKER`].
/// Content at or under the limit is returned untouched.
pub fn truncate_content(content: &str, limit: usize) -> Cow<'_, str> {
    match content.char_indices().nth(limit) {
        Some((cut, _)) => Cow::Owned(format!("{}{TRUNCATION_MARKER}", &content[..cut])),
        None => Cow::Borrowed(content),
    }
}

impl AnalysisRequest {
    /// Build a batch request, truncating each payload to the per-file budget. Entry count and
    /// order are preserved.
    pub fn batch(entries: Vec<AnalysisEntry>, query: impl Into<String>, limits: BatchLimits) -> Self {
        let entries = entries
            .into_iter()
            .map(|mut entry| {
                if let EntryContent::Payload(text) = &entry.content {
                    if let Cow::Owned(cut) = truncate_content(text, limits.max_content_chars) {
                        entry.content = EntryContent::Payload(cut);
                    }
                }
                entry
            })
            .collect();
        Self {
            entries,
            query: query.into(),
        }
    }
}

/// Render the combined user message for a batch.
pub fn render_batch_prompt(request: &AnalysisRequest) -> String {
    let mut prompt = format!("I have {} files to analyze:\n\n", request.entries.len());
    for (index, entry) in request.entries.iter().enumerate() {
        let _ = write!(
            prompt,
            "File {}: {} ({})\nContent: {}\n\n---\n\n",
            index + 1,
            entry.display_name,
            entry.label(),
            entry.text()
        );
    }
    prompt.push_str("Question: ");
    prompt.push_str(&request.query);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::{ArtifactRef, Kind};

    #[test]
    fn content_within_limit_is_unchanged() {
        assert!(matches!(truncate_content("hello", 5), Cow::Borrowed("hello")));
        assert!(matches!(truncate_content("", 0), Cow::Borrowed("")));
    }

    #[test]
    fn content_over_limit_is_cut_exactly() {
        let long = "x".repeat(20_000);
        let cut = truncate_content(&long, 8_000);
        assert_eq!(cut.len(), 8_000 + TRUNCATION_MARKER.len());
        assert!(cut.starts_with(&"x".repeat(8_000)));
        assert!(cut.ends_with(TRUNCATION_MARKER));
        assert_eq!(cut, truncate_content(&long, 8_000));
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let cut = truncate_content("héllo wörld", 4);
        assert_eq!(cut, format!("héll{TRUNCATION_MARKER}"));
    }

    #[test]
    fn batch_layout_matches_prompt_format() {
        let a = ArtifactRef::from_key("u/a.csv");
        let b = ArtifactRef::from_key("u/b.pdf");
        let request = AnalysisRequest::batch(
            vec![
                AnalysisEntry::payload(&a, Kind::Csv, "[]"),
                AnalysisEntry::placeholder(&b, "broken"),
            ],
            "compare",
            BatchLimits::default(),
        );
        assert_eq!(
            render_batch_prompt(&request),
            "I have 2 files to analyze:\n\n\
             File 1: a.csv (csv)\nContent: []\n\n---\n\n\
             File 2: b.pdf (error)\nContent: [Error processing file b.pdf: broken]\n\n---\n\n\
             Question: compare"
        );
    }

    #[test]
    fn batch_truncates_each_payload_independently() {
        let a = ArtifactRef::from_key("u/a.txt");
        let b = ArtifactRef::from_key("u/b.txt");
        let request = AnalysisRequest::batch(
            vec![
                AnalysisEntry::payload(&a, Kind::PlainText, "abcdef"),
                AnalysisEntry::payload(&b, Kind::PlainText, "abc"),
            ],
            "q",
            BatchLimits {
                max_content_chars: 3,
            },
        );
        assert_eq!(
            request.entries[0].content,
            EntryContent::Payload(format!("abc{TRUNCATION_MARKER}"))
        );
        assert_eq!(request.entries[1].content, EntryContent::Payload("abc".into()));
    }
}
