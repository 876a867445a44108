use std::future::Future;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::models::{ConversationId, ConversationReply, ConversationRequest};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

#[derive(Serialize)]
struct PromptBody<'a> {
    prompt: &'a str,
    conversation_id: ConversationId,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: serde_json::Value,
}

#[derive(Deserialize)]
struct HealthResponse {
    status: String,
}

#[derive(Clone)]
pub struct ConversationClient {
    client: Client,
    base_url: String,
}

impl ConversationClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send the last message of `request` as the prompt.
    ///
    /// Returns the raw response on a 2xx status. Any other status is turned
    /// into [`ApiError::Status`] carrying the serialized `error` field of the
    /// body. Cancelling `cancel` drops the in-flight request and yields
    /// [`ApiError::Aborted`].
    pub async fn call_conversation_api(
        &self,
        request: &ConversationRequest,
        cancel: &CancellationToken,
    ) -> Result<Response, ApiError> {
        let prompt = request.prompt().ok_or(ApiError::EmptyRequest)?;
        let url = format!("{}/conversation", self.base_url);

        let body = PromptBody {
            prompt,
            conversation_id: request.id,
        };

        debug!(conversation_id = %request.id, "posting conversation turn");

        let response = cancellable(
            cancel,
            self.client
                .post(&url)
                .header(CONTENT_TYPE, "application/json")
                .header(ACCEPT, "application/json")
                .json(&body)
                .send(),
        )
        .await??;

        let status = response.status();
        if !status.is_success() {
            let bytes = cancellable(cancel, response.bytes()).await??;
            let body: ErrorBody = serde_json::from_slice(&bytes)?;
            let error = serde_json::to_string(&body.error)?;
            warn!(conversation_id = %request.id, %status, %error, "conversation request rejected");
            return Err(ApiError::Status { status, error });
        }

        debug!(conversation_id = %request.id, %status, "conversation response received");
        Ok(response)
    }

    /// Parse the body of a successful conversation response
    pub async fn read_reply(
        &self,
        response: Response,
        cancel: &CancellationToken,
    ) -> Result<ConversationReply, ApiError> {
        let bytes = cancellable(cancel, response.bytes()).await??;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub async fn converse(
        &self,
        request: &ConversationRequest,
        cancel: &CancellationToken,
    ) -> Result<ConversationReply, ApiError> {
        let response = self.call_conversation_api(request, cancel).await?;
        self.read_reply(response, cancel).await
    }

    pub async fn health(&self) -> Result<bool, ApiError> {
        let url = format!("{}/health", self.base_url);

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "health check failed");
            return Ok(false);
        }

        let bytes = response.bytes().await?;
        let health: HealthResponse = serde_json::from_slice(&bytes)?;
        Ok(health.status.eq_ignore_ascii_case("ok"))
    }
}

/// Race `fut` against `cancel`. Cancellation wins ties.
async fn cancellable<F, T>(cancel: &CancellationToken, fut: F) -> Result<T, ApiError>
where
    F: Future<Output = T>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ApiError::Aborted),
        out = fut => Ok(out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChatMessage;

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = ConversationClient::new("http://localhost:8000/");
        assert_eq!(client.base_url(), "http://localhost:8000");
    }

    #[test]
    fn test_prompt_body_shape() {
        let id = ConversationId::new();
        let body = PromptBody { prompt: "What is 2+2?", conversation_id: id };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "prompt": "What is 2+2?", "conversation_id": id.to_string() })
        );
    }

    #[tokio::test]
    async fn test_empty_request_is_rejected_before_sending() {
        let client = ConversationClient::new("http://127.0.0.1:9");
        let request = ConversationRequest { id: ConversationId::new(), messages: Vec::new() };
        let err = client
            .call_conversation_api(&request, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::EmptyRequest));
    }

    #[tokio::test]
    async fn test_cancelled_token_aborts_without_network() {
        let client = ConversationClient::new("http://127.0.0.1:9");
        let request = ConversationRequest {
            id: ConversationId::new(),
            messages: vec![ChatMessage::user("hola")],
        };
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = client.converse(&request, &cancel).await.unwrap_err();
        assert!(err.is_aborted());
    }
}
