//! Telegram Bot API notifier (`sendMessage` / `editMessageText`).

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::Notifier;
use crate::domain::MessageHandle;
use crate::error::RadarError;

const API_BASE: &str = "https://api.telegram.org";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Posts HTML alerts to one chat.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    client: reqwest::Client,
    base_url: String,
    chat_id: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramNotifier {
    /// Creates a notifier for `chat_id` using `bot_token`.
    ///
    /// # Errors
    ///
    /// Returns [`RadarError::Notify`] if the HTTP client cannot be built.
    pub fn new(bot_token: &str, chat_id: impl Into<String>) -> Result<Self, RadarError> {
        Self::with_base_url(API_BASE, bot_token, chat_id)
    }

    /// Same as [`TelegramNotifier::new`] against a custom API host.
    ///
    /// # Errors
    ///
    /// Returns [`RadarError::Notify`] if the HTTP client cannot be built.
    pub fn with_base_url(
        api_base: &str,
        bot_token: &str,
        chat_id: impl Into<String>,
    ) -> Result<Self, RadarError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RadarError::Notify(format!("http client: {e}")))?;
        Ok(Self {
            client,
            base_url: format!("{}/bot{bot_token}", api_base.trim_end_matches('/')),
            chat_id: chat_id.into(),
        })
    }

    async fn post(&self, method: &str, body: serde_json::Value) -> Result<ApiResponse, RadarError> {
        let response = self
            .client
            .post(format!("{}/{method}", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| RadarError::Notify(e.to_string()))?;
        // Telegram reports failures in the body with `ok: false`, so the
        // body is decoded regardless of status.
        response
            .json::<ApiResponse>()
            .await
            .map_err(|e| RadarError::Notify(e.to_string()))
    }
}

fn message_id(result: Option<&serde_json::Value>) -> Option<i64> {
    result?.get("message_id")?.as_i64()
}

/// Errors meaning the edit target is gone or uneditable, which the
/// dispatcher answers with a fresh send.
fn is_missing_target(description: &str) -> bool {
    let lower = description.to_ascii_lowercase();
    lower.contains("message to edit not found")
        || lower.contains("message can't be edited")
        || lower.contains("message_id_invalid")
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, content: &str) -> Result<MessageHandle, RadarError> {
        let response = self
            .post(
                "sendMessage",
                json!({
                    "chat_id": self.chat_id,
                    "text": content,
                    "parse_mode": "HTML",
                    "disable_web_page_preview": true,
                }),
            )
            .await?;
        if !response.ok {
            return Err(RadarError::Notify(
                response
                    .description
                    .unwrap_or_else(|| "sendMessage rejected".to_string()),
            ));
        }
        message_id(response.result.as_ref())
            .map(|id| MessageHandle::new(id.to_string()))
            .ok_or_else(|| RadarError::Notify("sendMessage returned no message_id".to_string()))
    }

    async fn edit(&self, handle: &MessageHandle, content: &str) -> Result<bool, RadarError> {
        let Ok(message_id) = handle.as_str().parse::<i64>() else {
            return Ok(false);
        };
        let response = self
            .post(
                "editMessageText",
                json!({
                    "chat_id": self.chat_id,
                    "message_id": message_id,
                    "text": content,
                    "parse_mode": "HTML",
                    "disable_web_page_preview": true,
                }),
            )
            .await?;
        if response.ok {
            return Ok(true);
        }
        let description = response.description.unwrap_or_default();
        if description.contains("message is not modified") {
            return Ok(true);
        }
        if is_missing_target(&description) {
            tracing::debug!(%handle, %description, "edit target gone");
            return Ok(false);
        }
        Err(RadarError::Notify(description))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn extracts_message_id() {
        let result = json!({ "message_id": 42, "chat": { "id": -100 } });
        assert_eq!(message_id(Some(&result)), Some(42));
        assert_eq!(message_id(None), None);
    }

    #[test]
    fn recognizes_missing_edit_target() {
        assert!(is_missing_target("Bad Request: message to edit not found"));
        assert!(is_missing_target("Bad Request: MESSAGE_ID_INVALID"));
        assert!(!is_missing_target("Too Many Requests: retry after 5"));
    }

    #[test]
    fn base_url_embeds_token() {
        let Ok(notifier) = TelegramNotifier::with_base_url("http://localhost:9/", "123:abc", "-1")
        else {
            panic!("client should build");
        };
        assert_eq!(notifier.base_url, "http://localhost:9/bot123:abc");
    }

    #[tokio::test]
    async fn non_numeric_handle_is_not_editable() {
        let Ok(notifier) = TelegramNotifier::with_base_url("http://localhost:9", "t", "-1") else {
            panic!("client should build");
        };
        let result = notifier.edit(&MessageHandle::new("log-1"), "x").await;
        assert!(matches!(result, Ok(false)));
    }
}
