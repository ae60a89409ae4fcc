//! Completion request builders for every analysis path.

use crate::backend::{ChatMessage, CompletionRequest, ContentPart, ImageUrl, MessageContent, Role};
use crate::extraction::Kind;

use super::batch::render_batch_prompt;
use super::types::AnalysisRequest;

/// Sampling temperature shared by all analysis calls.
pub const TEMPERATURE: f32 = 0.7;
/// Token budget for single-file analysis and summaries.
pub const SINGLE_MAX_TOKENS: u32 = 1_500;
/// Token budget for multi-file analysis.
pub const BATCH_MAX_TOKENS: u32 = 3_000;
/// Token budget for image analysis.
pub const VISION_MAX_TOKENS: u32 = 1_000;

/// Question used when an image is analyzed without one.
pub const DEFAULT_IMAGE_QUESTION: &str = "Please analyze this image and provide a detailed description.";
/// Question used to summarize an image.
pub const IMAGE_SUMMARY_QUESTION: &str = "Please provide a comprehensive summary of this image.";

const BATCH_INSTRUCTION: &str = "You are an AI assistant that analyzes multiple files together. \
Compare, contrast, and provide insights across all the provided files. When referencing specific \
files, mention them by name. Focus on actionable insights and key findings.";

const GENERIC_INSTRUCTION: &str = "You are an AI assistant that analyzes files. Provide helpful \
information and answer questions about the file content.";

/// System instruction for analyzing a single file of `kind`.
pub fn system_instruction(kind: Kind) -> &'static str {
    match kind {
        Kind::Image => {
            "You are an AI assistant that analyzes images. Provide detailed, accurate descriptions \
             and answer questions about visual content."
        }
        Kind::Pdf => {
            "You are an AI assistant that analyzes PDF documents. Provide summaries, extract key \
             information, and answer questions about the document content."
        }
        Kind::PlainText => {
            "You are an AI assistant that analyzes text files. Provide summaries, analyze content, \
             and answer questions about the text."
        }
        Kind::Csv => {
            "You are an AI assistant that analyzes CSV data. Provide data insights, statistics, \
             and answer questions about the dataset."
        }
        Kind::RichDocument => {
            "You are an AI assistant that analyzes Word documents. Provide summaries, extract key \
             information, and answer questions about the document content."
        }
        Kind::Unsupported => GENERIC_INSTRUCTION,
    }
}

/// Single-file text analysis: kind-specific instruction plus the file, content, and question.
pub fn text_request(display_name: &str, kind: Kind, content: &str, query: &str) -> CompletionRequest {
    CompletionRequest {
        messages: vec![
            ChatMessage::system(system_instruction(kind)),
            ChatMessage::user(format!(
                "File: {display_name}\nContent: {content}\n\nQuestion: {query}"
            )),
        ],
        max_tokens: SINGLE_MAX_TOKENS,
        temperature: TEMPERATURE,
    }
}

/// Vision request embedding the image as a `data:` URL. A blank question falls back to
/// [`DEFAULT_IMAGE_QUESTION`].
pub fn vision_request(base64: &str, mime_type: &str, query: &str) -> CompletionRequest {
    let question = if query.trim().is_empty() {
        DEFAULT_IMAGE_QUESTION
    } else {
        query
    };
    CompletionRequest {
        messages: vec![ChatMessage {
            role: Role::User,
            content: MessageContent::Parts(vec![
                ContentPart::Text {
                    text: question.to_owned(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: format!("data:{mime_type};base64,{base64}"),
                    },
                },
            ]),
        }],
        max_tokens: VISION_MAX_TOKENS,
        temperature: TEMPERATURE,
    }
}

/// One combined request covering every entry of a batch.
pub fn batch_request(request: &AnalysisRequest) -> CompletionRequest {
    CompletionRequest {
        messages: vec![
            ChatMessage::system(BATCH_INSTRUCTION),
            ChatMessage::user(render_batch_prompt(request)),
        ],
        max_tokens: BATCH_MAX_TOKENS,
        temperature: TEMPERATURE,
    }
}

/// Summary of textual content of `kind`.
pub fn summary_request(kind: Kind, content: &str) -> CompletionRequest {
    CompletionRequest {
        messages: vec![
            ChatMessage::system(format!(
                "You are an AI assistant that creates concise summaries. Focus on the main points, \
                 key information, and important details from {kind} content."
            )),
            ChatMessage::user(format!(
                "Please provide a comprehensive summary of the following content:\n\n{content}"
            )),
        ],
        max_tokens: SINGLE_MAX_TOKENS,
        temperature: TEMPERATURE,
    }
}
