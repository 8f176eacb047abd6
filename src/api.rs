use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Request body shared by the chat and edit endpoints.
#[derive(Serialize)]
struct AiRequest {
    message: String,
    context: String,
}

/// Response envelope shared by the chat and edit endpoints.
#[derive(Deserialize)]
struct AiEnvelope {
    success: bool,
    response: Option<String>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct ConfigEnvelope {
    success: bool,
    #[allow(dead_code)]
    config: Option<serde_json::Value>,
    error: Option<String>,
}

/// Failures below the application success/failure layer: HTTP status,
/// content type, body decoding, or the network itself. `Rejected` is the
/// probe-only case of a reachable server that reports itself unhealthy.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("server returned HTTP {0}")]
    Status(StatusCode),
    #[error("server returned a non-JSON response")]
    NotJson,
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("request task was interrupted")]
    Interrupted,
    #[error("server reported: {0}")]
    Rejected(String),
}

/// How a single AI request settled. Transport problems are folded in here
/// rather than surfaced as errors: every request settles, none reject.
#[derive(Debug)]
pub enum AiOutcome {
    /// `success: true`, with the response text.
    Reply(String),
    /// `success: false`, with the server-reported error text.
    Refused(String),
    /// The request never produced a well-formed envelope.
    Failed(TransportError),
}

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Conversational endpoint.
    pub async fn chat(&self, message: &str, context: &str) -> AiOutcome {
        self.post_ai("/api/chat", message, context).await
    }

    /// Edit-instruction endpoint. The reply is the full proposed document
    /// text, not a diff.
    pub async fn edit(&self, message: &str, context: &str) -> AiOutcome {
        self.post_ai("/api/edit", message, context).await
    }

    /// Connectivity probe against the config endpoint.
    pub async fn probe(&self) -> Result<(), TransportError> {
        let url = format!("{}/api/config", self.base_url);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(TransportError::Status(response.status()));
        }
        let envelope: ConfigEnvelope = response.json().await?;
        if envelope.success {
            Ok(())
        } else {
            Err(TransportError::Rejected(
                envelope
                    .error
                    .unwrap_or_else(|| "unspecified server error".to_string()),
            ))
        }
    }

    async fn post_ai(&self, path: &str, message: &str, context: &str) -> AiOutcome {
        match self.try_post(path, message, context).await {
            Ok(outcome) => outcome,
            Err(err) => AiOutcome::Failed(err),
        }
    }

    async fn try_post(
        &self,
        path: &str,
        message: &str,
        context: &str,
    ) -> Result<AiOutcome, TransportError> {
        let url = format!("{}{}", self.base_url, path);
        let request = AiRequest {
            message: message.to_string(),
            context: context.to_string(),
        };

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            return Err(TransportError::Status(response.status()));
        }

        // A non-JSON body here is usually an HTML error page from a proxy.
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.contains("application/json"))
            .unwrap_or(false);
        if !is_json {
            return Err(TransportError::NotJson);
        }

        let envelope: AiEnvelope = response.json().await?;
        if envelope.success {
            Ok(AiOutcome::Reply(envelope.response.unwrap_or_default()))
        } else {
            Ok(AiOutcome::Refused(
                envelope
                    .error
                    .unwrap_or_else(|| "unspecified server error".to_string()),
            ))
        }
    }
}
