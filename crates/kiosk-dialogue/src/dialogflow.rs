//! Dialogflow ES `detectIntent` client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use kiosk_core::config::DialogueConfig;

use crate::auth::TokenSource;
use crate::{DialogueError, IntentDetector, IntentReply};

pub struct DialogflowClient {
    client: reqwest::Client,
    endpoint: String,
    project_id: String,
    language: String,
    tokens: Arc<dyn TokenSource>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetectIntentResponse {
    #[serde(default)]
    query_result: Option<QueryResult>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResult {
    #[serde(default)]
    fulfillment_text: Option<String>,
    #[serde(default)]
    intent: Option<Intent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Intent {
    #[serde(default)]
    display_name: Option<String>,
}

/// `projects/<project>/agent/sessions/<session>`
pub fn session_path(project_id: &str, session_id: &str) -> String {
    format!("projects/{project_id}/agent/sessions/{session_id}")
}

impl DialogflowClient {
    pub fn new(
        config: &DialogueConfig,
        tokens: Arc<dyn TokenSource>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            project_id: config.project_id.clone(),
            language: config.language.clone(),
            tokens,
        })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Full `detectIntent` URL with each path segment percent-encoded.
    fn detect_intent_url(&self, session_id: &str) -> Result<reqwest::Url, DialogueError> {
        let mut url = reqwest::Url::parse(&self.endpoint)
            .map_err(|e| DialogueError::Request(format!("bad Dialogflow endpoint: {e}")))?;
        let method = format!("{session_id}:detectIntent");
        url.path_segments_mut()
            .map_err(|_| DialogueError::Request("bad Dialogflow endpoint".into()))?
            .pop_if_empty()
            .extend([
                "v2",
                "projects",
                self.project_id.as_str(),
                "agent",
                "sessions",
                method.as_str(),
            ]);
        Ok(url)
    }
}

#[async_trait]
impl IntentDetector for DialogflowClient {
    async fn detect_intent(&self, session_id: &str, text: &str) -> Result<IntentReply, DialogueError> {
        let token = self.tokens.access_token().await?;
        let url = self.detect_intent_url(session_id)?;

        debug!(
            session = %session_path(&self.project_id, session_id),
            text_len = text.len(),
            "Sending text to Dialogflow"
        );

        let resp = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&json!({
                "queryInput": {
                    "text": { "text": text, "languageCode": self.language }
                }
            }))
            .send()
            .await
            .map_err(|e| DialogueError::Request(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(DialogueError::Request(format!("Dialogflow API error {status}: {body}")));
        }

        let parsed: DetectIntentResponse = resp
            .json()
            .await
            .map_err(|e| DialogueError::Request(format!("bad detectIntent response: {e}")))?;

        let result = parsed.query_result.unwrap_or_default();
        let reply = IntentReply {
            fulfillment_text: result.fulfillment_text.filter(|t| !t.trim().is_empty()),
            intent: result.intent.and_then(|i| i.display_name),
        };
        debug!(intent = ?reply.intent, has_text = reply.fulfillment_text.is_some(), "Dialogflow replied");
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::{
        extract::{OriginalUri, Path},
        http::{HeaderMap, StatusCode},
        routing::post,
        Json,
        Router,
    };

    use crate::auth::{AuthError, StaticTokenSource};

    struct BrokenTokens;

    #[async_trait]
    impl TokenSource for BrokenTokens {
        async fn access_token(&self) -> Result<String, AuthError> {
            Err(AuthError::Credentials("no key".into()))
        }
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn client(endpoint: String, tokens: Arc<dyn TokenSource>) -> DialogflowClient {
        let config = DialogueConfig {
            endpoint,
            ..DialogueConfig::default()
        };
        DialogflowClient::new(&config, tokens, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_session_path() {
        assert_eq!(
            session_path("kioskdialouge", "abc-123"),
            "projects/kioskdialouge/agent/sessions/abc-123"
        );
    }

    #[test]
    fn test_detect_intent_url_encodes_session() {
        let c = client(
            "https://dialogflow.googleapis.com/".into(),
            Arc::new(StaticTokenSource::new("t")),
        );
        let url = c.detect_intent_url("a b/c").unwrap();
        assert_eq!(
            url.as_str(),
            "https://dialogflow.googleapis.com/v2/projects/kioskdialouge/agent/sessions/a%20b%2Fc:detectIntent"
        );
    }

    #[tokio::test]
    async fn test_detect_intent_roundtrip() {
        let app = Router::new().route(
            "/v2/{*rest}",
            post(
                |Path(rest): Path<String>,
                 headers: HeaderMap,
                 Json(body): Json<serde_json::Value>| async move {
                    assert_eq!(rest, "projects/kioskdialouge/agent/sessions/s-1:detectIntent");
                    assert_eq!(headers["authorization"], "Bearer ya29.test");
                    assert_eq!(body["queryInput"]["text"]["languageCode"], "ko-KR");
                    assert_eq!(body["queryInput"]["text"]["text"], "샌드위치 주문할게요");
                    Json(json!({
                        "responseId": "r-1",
                        "queryResult": {
                            "fulfillmentText": "빵을 골라주세요",
                            "intent": { "displayName": "order.start" }
                        }
                    }))
                },
            ),
        );
        let c = client(serve(app).await, Arc::new(StaticTokenSource::new("ya29.test")));
        let reply = c.detect_intent("s-1", "샌드위치 주문할게요").await.unwrap();
        assert_eq!(reply.fulfillment_text.as_deref(), Some("빵을 골라주세요"));
        assert_eq!(reply.intent.as_deref(), Some("order.start"));
    }

    #[tokio::test]
    async fn test_empty_fulfillment_is_none() {
        let app = Router::new().route(
            "/v2/{*rest}",
            post(|| async { Json(json!({ "queryResult": { "fulfillmentText": "" } })) }),
        );
        let c = client(serve(app).await, Arc::new(StaticTokenSource::new("t")));
        let reply = c.detect_intent("s", "음").await.unwrap();
        assert_eq!(reply, IntentReply::default());
    }

    #[tokio::test]
    async fn test_upstream_error_is_request_error() {
        let app = Router::new().route(
            "/v2/{*rest}",
            post(|OriginalUri(uri): OriginalUri| async move {
                (StatusCode::FORBIDDEN, format!("denied {}", uri.path()))
            }),
        );
        let c = client(serve(app).await, Arc::new(StaticTokenSource::new("t")));
        let err = c.detect_intent("s", "hi").await.unwrap_err();
        assert!(matches!(err, DialogueError::Request(ref m) if m.contains("403")));
    }

    #[tokio::test]
    async fn test_auth_failure_skips_request() {
        let c = client("http://127.0.0.1:9".into(), Arc::new(BrokenTokens));
        let err = c.detect_intent("s", "hi").await.unwrap_err();
        assert!(matches!(err, DialogueError::Auth(_)));
    }
}
