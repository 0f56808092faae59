//! HTTP client for the Claude conversation API.
//!
//! Implements [`ConversationSource`] on top of `reqwest`. Requests are made
//! once; non-success statuses become [`AppError::Transport`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, COOKIE};
use serde::de::DeserializeOwned;

use crate::domain::{
    ApiConfig, AppError, ConversationRecord, ConversationSource, ConversationSummary, Result,
};

/// Longest response-body excerpt kept in error messages.
const ERROR_BODY_LIMIT: usize = 200;

/// Conversation API client.
#[derive(Debug, Clone)]
pub struct ClaudeClient {
    client: reqwest::Client,
    base_url: String,
}

impl ClaudeClient {
    /// Creates a client from API settings.
    ///
    /// # Errors
    /// Returns error if the session key is not a valid header value or the
    /// HTTP client cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        if let Some(key) = config.session_key.as_deref().filter(|k| !k.is_empty()) {
            let cookie = HeaderValue::from_str(&format!("sessionKey={key}")).map_err(|e| {
                AppError::Config {
                    message: format!("invalid session key: {e}"),
                }
            })?;
            headers.insert(COOKIE, cookie);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("claude-chat-export/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(AppError::request)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn conversations_url(&self, org_id: &str) -> Result<String> {
        Ok(format!(
            "{}/api/organizations/{}/chat_conversations",
            self.base_url,
            path_segment(org_id, "organization ID")?
        ))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(AppError::request)?;

        let status = response.status();
        tracing::debug!(%status, url, "Response received");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let excerpt: String = body.chars().take(ERROR_BODY_LIMIT).collect();
            let message = if excerpt.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string()
            } else {
                excerpt
            };
            return Err(AppError::status(status.as_u16(), message));
        }

        let bytes = response.bytes().await.map_err(AppError::request)?;
        serde_json::from_slice(&bytes).map_err(AppError::json_parse)
    }
}

/// Identifiers are interpolated into the URL path verbatim.
fn path_segment<'a>(value: &'a str, what: &str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() || value.contains(['/', '?', '#']) {
        return Err(AppError::InvalidData {
            message: format!("invalid {what}: {value:?}"),
        });
    }
    Ok(value)
}

#[async_trait]
impl ConversationSource for ClaudeClient {
    async fn list_conversations(&self, org_id: &str) -> Result<Vec<ConversationSummary>> {
        let conversations: Vec<ConversationSummary> =
            self.get_json(&self.conversations_url(org_id)?, &[]).await?;
        tracing::info!(count = conversations.len(), "Listed conversations");
        Ok(conversations)
    }

    async fn get_conversation(
        &self,
        org_id: &str,
        conversation_id: &str,
    ) -> Result<ConversationRecord> {
        let url = format!(
            "{}/{}",
            self.conversations_url(org_id)?,
            path_segment(conversation_id, "conversation ID")?
        );
        self.get_json(
            &url,
            &[
                ("tree", "True"),
                ("rendering_mode", "messages"),
                ("render_all_tools", "true"),
            ],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn test_client(base_url: &str) -> ClaudeClient {
        ClaudeClient::new(&ApiConfig {
            base_url: base_url.to_string(),
            organization_id: Some("org-1".into()),
            session_key: Some("sk-test".into()),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn list_conversations_success() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/organizations/org-1/chat_conversations"))
            .and(header("cookie", "sessionKey=sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"uuid": "c1", "name": "First", "model": null,
                 "created_at": "2024-01-01T00:00:00Z", "updated_at": "2024-01-02T00:00:00Z"},
                {"uuid": "c2", "name": "Second", "model": "claude-3-opus-20240229"}
            ])))
            .mount(&server)
            .await;

        let list = test_client(&server.uri())
            .list_conversations("org-1")
            .await
            .unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name, "First");
        assert!(list[0].model.is_none());
        assert_eq!(list[1].declared_model(), Some("claude-3-opus-20240229"));
    }

    #[tokio::test]
    async fn get_conversation_requests_tree() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/organizations/org-1/chat_conversations/c1"))
            .and(query_param("tree", "True"))
            .and(query_param("rendering_mode", "messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "uuid": "c1",
                "name": "First",
                "current_leaf_message_uuid": "m1",
                "chat_messages": [{"uuid": "m1", "sender": "human", "text": "hi"}]
            })))
            .mount(&server)
            .await;

        let record = test_client(&server.uri())
            .get_conversation("org-1", "c1")
            .await
            .unwrap();
        assert_eq!(record.chat_messages.len(), 1);
        assert_eq!(record.current_leaf_message_uuid.as_deref(), Some("m1"));
    }

    #[tokio::test]
    async fn non_success_status_is_transport_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(403)
                    .set_body_json(json!({"error": {"message": "permission_error"}})),
            )
            .mount(&server)
            .await;

        let err = test_client(&server.uri())
            .get_conversation("org-1", "c1")
            .await
            .unwrap_err();
        match err {
            AppError::Transport {
                status, message, ..
            } => {
                assert_eq!(status, Some(403));
                assert!(message.contains("permission_error"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn empty_error_body_uses_reason() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = test_client(&server.uri())
            .list_conversations("org-1")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Request failed (404): Not Found");
    }

    #[tokio::test]
    async fn unreachable_server_is_transport_error() {
        let err = test_client("http://127.0.0.1:9")
            .list_conversations("org-1")
            .await
            .unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn malformed_ids_are_rejected_before_sending() {
        let client = test_client("http://127.0.0.1:9");
        let err = client.get_conversation("org-1", "../c1").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidData { .. }));

        let err = client.list_conversations("  ").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidData { .. }));
    }

    #[test]
    fn invalid_session_key_is_config_error() {
        let result = ClaudeClient::new(&ApiConfig {
            session_key: Some("bad\nkey".into()),
            ..ApiConfig::default()
        });
        assert!(matches!(result, Err(AppError::Config { .. })));
    }
}
