//! Chat-completions client for the Azure OpenAI analysis endpoint.
//!
//! Requests are plain HTTP calls against the deployment's `chat/completions` route. The client
//! itself applies no deadline; [`crate::backend::AnalysisBackend`] bounds every call.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::BackendError;

/// Role attached to a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instruction framing the model's behavior.
    System,
    /// End-user content.
    User,
}

/// Body of a chat message: either a plain string or multimodal parts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text content.
    Text(String),
    /// Ordered text and image parts for vision requests.
    Parts(Vec<ContentPart>),
}

/// One part of a multimodal message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Text fragment.
    Text {
        /// Fragment contents.
        text: String,
    },
    /// Inline image reference.
    ImageUrl {
        /// Image location, typically a `data:` URL.
        image_url: ImageUrl,
    },
}

/// Image location wrapper matching the API's wire shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageUrl {
    /// `data:<mime>;base64,<payload>` or a remote URL.
    pub url: String,
}

/// Single chat message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    /// Author role.
    pub role: Role,
    /// Message body.
    pub content: MessageContent,
}

impl ChatMessage {
    /// System instruction message.
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: MessageContent::Text(text.into()),
        }
    }

    /// Plain-text user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    /// Text content of the message, if it is plain text.
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text(text) => Some(text),
            MessageContent::Parts(_) => None,
        }
    }
}

/// Payload sent to the completion endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    /// Conversation to complete.
    pub messages: Vec<ChatMessage>,
    /// Response token budget.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

/// Interface implemented by completion providers.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Return the model's reply to `request`.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, BackendError>;
}

/// Connection settings for an Azure OpenAI deployment.
#[derive(Debug, Clone)]
pub struct AzureOpenAiSettings {
    /// Resource base URL, e.g. `https://example.openai.azure.com`.
    pub endpoint: String,
    /// Key sent in the `api-key` header.
    pub api_key: String,
    /// Value of the `api-version` query parameter.
    pub api_version: String,
    /// Deployment name addressed by the request path.
    pub deployment: String,
}

/// HTTP client for Azure OpenAI chat completions.
pub struct AzureOpenAiClient {
    http: Client,
    settings: AzureOpenAiSettings,
}

impl AzureOpenAiClient {
    /// Construct a client for the given deployment.
    pub fn new(settings: AzureOpenAiSettings) -> Result<Self, BackendError> {
        let http = Client::builder()
            .user_agent("docquery/0.1")
            .build()
            .map_err(|error| BackendError::CallFailed {
                detail: format!("failed to construct HTTP client: {error}"),
            })?;
        tracing::debug!(
            endpoint = %settings.endpoint,
            deployment = %settings.deployment,
            api_version = %settings.api_version,
            "Initialized Azure OpenAI client"
        );
        Ok(Self { http, settings })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions",
            self.settings.endpoint.trim_end_matches('/'),
            self.settings.deployment
        )
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[async_trait]
impl CompletionClient for AzureOpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, BackendError> {
        let response = self
            .http
            .post(self.endpoint())
            .query(&[("api-version", self.settings.api_version.as_str())])
            .header("api-key", &self.settings.api_key)
            .json(request)
            .send()
            .await
            .map_err(|error| BackendError::CallFailed {
                detail: format!("failed to reach {}: {error}", self.settings.endpoint),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::CallFailed {
                detail: format!("Azure OpenAI returned {status}: {body}"),
            });
        }

        let body: CompletionResponse =
            response.json().await.map_err(|error| BackendError::CallFailed {
                detail: format!("malformed completion response: {error}"),
            })?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| BackendError::CallFailed {
                detail: "completion response contained no message content".into(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    fn client_for(server: &MockServer) -> AzureOpenAiClient {
        AzureOpenAiClient::new(AzureOpenAiSettings {
            endpoint: server.base_url(),
            api_key: "secret".into(),
            api_version: "2024-02-01".into(),
            deployment: "gpt-test".into(),
        })
        .expect("client")
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            messages: vec![ChatMessage::system("be brief"), ChatMessage::user("hi")],
            max_tokens: 10,
            temperature: 0.7,
        }
    }

    #[test]
    fn vision_parts_serialize_to_wire_shape() {
        let message = ChatMessage {
            role: Role::User,
            content: MessageContent::Parts(vec![
                ContentPart::Text {
                    text: "what is this?".into(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: "data:image/png;base64,AAAA".into(),
                    },
                },
            ]),
        };
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({
                "role": "user",
                "content": [
                    { "type": "text", "text": "what is this?" },
                    { "type": "image_url", "image_url": { "url": "data:image/png;base64,AAAA" } }
                ]
            })
        );
    }

    #[tokio::test]
    async fn returns_first_choice_content() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/openai/deployments/gpt-test/chat/completions")
                    .query_param("api-version", "2024-02-01")
                    .header("api-key", "secret")
                    .json_body_partial(r#"{"max_tokens": 10}"#);
                then.status(200).json_body(json!({
                    "choices": [{ "message": { "role": "assistant", "content": "Hello!" } }]
                }));
            })
            .await;

        let reply = client_for(&server).complete(&request()).await.expect("reply");
        mock.assert_async().await;
        assert_eq!(reply, "Hello!");
    }

    #[tokio::test]
    async fn error_status_preserves_detail() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(429).body("quota exceeded");
            })
            .await;

        let error = client_for(&server).complete(&request()).await.unwrap_err();
        match error {
            BackendError::CallFailed { detail } => {
                assert!(detail.contains("429"), "{detail}");
                assert!(detail.contains("quota exceeded"), "{detail}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_choices_are_call_failures() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200).json_body(json!({ "choices": [] }));
            })
            .await;

        let error = client_for(&server).complete(&request()).await.unwrap_err();
        assert!(matches!(error, BackendError::CallFailed { .. }));
    }
}
