use reqwest::StatusCode;

/// Thin client for the LINE Messaging API: one-shot replies keyed by a
/// reply token and unsolicited pushes keyed by a user id.
#[derive(Debug, Clone)]
pub struct LineClient {
    client: reqwest::Client,
    access_token: String,
    base_url: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    #[error("failed to reach the LINE API: {0}")]
    Network(#[from] reqwest::Error),
    #[error("LINE API returned {status}: {body}")]
    Api { status: StatusCode, body: String },
}

impl LineClient {
    pub fn new(access_token: &str, api_server: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            access_token: access_token.to_owned(),
            base_url: api_server.trim_end_matches('/').to_owned(),
        }
    }

    #[tracing::instrument(skip(self, text))]
    pub async fn reply_text(&self, reply_token: &str, text: &str) -> Result<(), MessagingError> {
        let body = serde_json::json!({
            "replyToken": reply_token,
            "messages": [{ "type": "text", "text": text }],
        });

        self.post("/v2/bot/message/reply", &body).await
    }

    #[tracing::instrument(skip(self, text))]
    pub async fn push_text(&self, to: &str, text: &str) -> Result<(), MessagingError> {
        let body = serde_json::json!({
            "to": to,
            "messages": [{ "type": "text", "text": text }],
        });

        self.post("/v2/bot/message/push", &body).await
    }

    async fn post(&self, api_path: &str, body: &serde_json::Value) -> Result<(), MessagingError> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, api_path))
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", self.access_token),
            )
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(MessagingError::Api { status, body })
    }
}
