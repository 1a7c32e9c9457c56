//! Answer synthesis via the chat-completion API.
//!
//! The query handler stuffs the retrieved passages into the prompt and issues
//! one non-streaming completion call; there is no retry on transient failure.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

/// Sampling temperature applied to every answer request.
pub const ANSWER_TEMPERATURE: f32 = 0.5;

/// Errors surfaced while generating an answer.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Provider responded with an unexpected status code.
    #[error("Unexpected chat response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the provider.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Provider response carried no completion choices.
    #[error("Chat provider returned no choices")]
    EmptyResponse,
}

/// Retrieved passages plus the question they should answer.
#[derive(Debug, Clone)]
pub struct AnswerRequest {
    /// Matched passages supplied as context, in retrieval order.
    pub context: Vec<String>,
    /// The user's original query.
    pub question: String,
}

/// Interface implemented by answer-generation backends.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Synthesize an answer to the question from the supplied context.
    async fn generate_answer(&self, request: AnswerRequest) -> Result<String, GenerationError>;
}

/// Client for an OpenAI-style `/v1/chat/completions` endpoint.
pub struct HttpChatClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl HttpChatClient {
    /// Construct a client authenticated with `api_key` against `base_url`.
    pub fn new(base_url: String, api_key: String, model: String) -> Self {
        let client = Client::builder()
            .user_agent("docuhub/0.1")
            .build()
            .expect("Failed to construct reqwest::Client for chat");
        Self {
            client,
            base_url,
            api_key,
            model,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.base_url.trim_end_matches('/')
        )
    }
}

/// Build the system prompt that stuffs the retrieved passages into context.
fn stuff_prompt(context: &[String]) -> String {
    let mut prompt = String::from(
        "Use the following passages to answer the question. \
         If the passages do not contain the answer, say that you don't know.\n",
    );
    for passage in context {
        prompt.push('\n');
        prompt.push_str(passage);
        prompt.push('\n');
    }
    prompt
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[async_trait]
impl ChatClient for HttpChatClient {
    async fn generate_answer(&self, request: AnswerRequest) -> Result<String, GenerationError> {
        tracing::debug!(
            model = %self.model,
            passages = request.context.len(),
            "Generating answer"
        );
        let payload = json!({
            "model": self.model,
            "temperature": ANSWER_TEMPERATURE,
            "messages": [
                { "role": "system", "content": stuff_prompt(&request.context) },
                { "role": "user", "content": request.question },
            ],
        });

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = GenerationError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Chat request failed");
            return Err(error);
        }

        let mut body: ChatResponse = response.json().await?;
        match body.choices.pop() {
            Some(choice) => Ok(choice.message.content.trim().to_string()),
            None => Err(GenerationError::EmptyResponse),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    fn client_for(server: &MockServer) -> HttpChatClient {
        HttpChatClient::new(server.base_url(), "sk-test".into(), "gpt-4".into())
    }

    #[test]
    fn stuff_prompt_includes_every_passage() {
        let prompt = stuff_prompt(&["alpha passage".into(), "beta passage".into()]);
        assert!(prompt.contains("alpha passage"));
        assert!(prompt.contains("beta passage"));
        assert!(prompt.starts_with("Use the following passages"));
    }

    #[tokio::test]
    async fn generate_answer_sends_model_and_temperature() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/chat/completions")
                    .header("authorization", "Bearer sk-test")
                    .json_body_partial(
                        json!({
                            "model": "gpt-4",
                            "temperature": 0.5
                        })
                        .to_string(),
                    );
                then.status(200).json_body(json!({
                    "choices": [
                        { "message": { "role": "assistant", "content": " The total is 42. " } }
                    ]
                }));
            })
            .await;

        let answer = client_for(&server)
            .generate_answer(AnswerRequest {
                context: vec!["Total: 42".into()],
                question: "What is the total?".into(),
            })
            .await
            .expect("answer");

        mock.assert();
        assert_eq!(answer, "The total is 42.");
    }

    #[tokio::test]
    async fn generate_answer_surfaces_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(500).body("boom");
            })
            .await;

        let error = client_for(&server)
            .generate_answer(AnswerRequest {
                context: vec![],
                question: "q".into(),
            })
            .await
            .expect_err("error response");

        assert!(
            matches!(&error, GenerationError::UnexpectedStatus { status, .. } if status.as_u16() == 500)
        );
    }

    #[tokio::test]
    async fn empty_choices_is_an_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(200).json_body(json!({ "choices": [] }));
            })
            .await;

        let error = client_for(&server)
            .generate_answer(AnswerRequest {
                context: vec![],
                question: "q".into(),
            })
            .await
            .expect_err("empty response");

        assert!(matches!(error, GenerationError::EmptyResponse));
    }
}
