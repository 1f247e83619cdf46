use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Response, Url};

use crate::core::nomi::nomi_models::{RecentMessagesResponse, ReplyRequest, ReplyResponse};
use crate::core::nomi::{NomiApi, NomiError, NomiMessage, NomiSession, ReplyMessage};

/// reqwest-backed Nomi API client. Stateless apart from the connection pool;
/// credentials come in with every call.
pub struct NomiApiClient {
    client: Client,
    base_url: Url,
}

impl NomiApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, NomiError> {
        let base_url = Url::parse(base_url).map_err(|e| NomiError::InvalidUrl(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(NomiError::InvalidUrl(format!("{base_url} cannot be a base URL")));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "User-Agent",
            HeaderValue::from_static("NomiDiscordBridge/0.1"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| NomiError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
        })
    }

    /// `{base}/v1/rooms/{room_id}/{action}` with the room id kept as one
    /// percent-encoded path segment.
    fn room_url(&self, room_id: &str, action: &str) -> Result<Url, NomiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| NomiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["v1", "rooms", room_id, action]);
        Ok(url)
    }

    fn auth_header(session: &NomiSession) -> Result<HeaderValue, NomiError> {
        HeaderValue::from_str(&session.api_key)
            .map_err(|e| NomiError::InvalidCredentials(e.to_string()))
    }

    /// Read the body, turning non-2xx into [`NomiError::HttpStatus`] with the raw text.
    async fn success_body(response: Response) -> Result<String, NomiError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| NomiError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(NomiError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl NomiApi for NomiApiClient {
    async fn fetch_recent_messages(
        &self,
        session: &NomiSession,
        room_id: &str,
    ) -> Result<Vec<NomiMessage>, NomiError> {
        let url = self.room_url(room_id, "messages")?;

        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, Self::auth_header(session)?)
            .send()
            .await
            .map_err(|e| NomiError::Transport(e.to_string()))?;
        let body = Self::success_body(response).await?;
        tracing::debug!(room_id, bytes = body.len(), "Fetched recent Nomi messages");

        let parsed: RecentMessagesResponse =
            serde_json::from_str(&body).map_err(|e| NomiError::Parse(e.to_string()))?;
        Ok(parsed.messages)
    }

    async fn request_reply(
        &self,
        session: &NomiSession,
        room_id: &str,
    ) -> Result<ReplyMessage, NomiError> {
        let url = self.room_url(room_id, "reply")?;
        let payload = ReplyRequest {
            companion_id: &session.companion_id,
        };

        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, Self::auth_header(session)?)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NomiError::Transport(e.to_string()))?;
        let body = Self::success_body(response).await?;

        let parsed: ReplyResponse =
            serde_json::from_str(&body).map_err(|e| NomiError::Parse(e.to_string()))?;
        Ok(parsed.reply_message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn session() -> NomiSession {
        NomiSession::new("secret-key", "abc")
    }

    fn client(server: &MockServer) -> NomiApiClient {
        NomiApiClient::new(&server.uri(), Duration::from_secs(5)).expect("client")
    }

    #[tokio::test]
    async fn test_fetch_sends_auth_and_parses_messages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/rooms/room-1/messages"))
            .and(header("Authorization", "secret-key"))
            .and(header("Content-Type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "messages": [
                    {"id": "1", "text": "hello", "imageUrl": "", "timestamp": "2024-05-01T12:00:00Z"},
                    {"id": "2", "text": "pic", "imageUrl": "https://cdn/2.webp", "unknown": true}
                ]
            })))
            .mount(&server)
            .await;

        let messages = client(&server)
            .fetch_recent_messages(&session(), "room-1")
            .await
            .unwrap();

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].text, "hello");
        assert!(messages[0].image().is_none());
        assert_eq!(messages[1].image(), Some("https://cdn/2.webp"));
        assert_eq!(messages[1].timestamp, "");
    }

    #[tokio::test]
    async fn test_fetch_non_2xx_carries_status_and_raw_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string(r#"{"error":"not found"}"#))
            .mount(&server)
            .await;

        let err = client(&server)
            .fetch_recent_messages(&session(), "missing")
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(404));
        assert!(err.to_string().contains("404"));
        assert!(err.to_string().contains(r#"{"error":"not found"}"#));
    }

    #[tokio::test]
    async fn test_fetch_malformed_body_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = client(&server)
            .fetch_recent_messages(&session(), "room-1")
            .await
            .unwrap_err();

        assert!(matches!(err, NomiError::Parse(_)));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let client = NomiApiClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();

        let err = client
            .fetch_recent_messages(&session(), "room-1")
            .await
            .unwrap_err();

        assert!(matches!(err, NomiError::Transport(_)));
    }

    #[tokio::test]
    async fn test_reply_posts_companion_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/rooms/room-1/reply"))
            .and(body_json(serde_json::json!({"companionId": "abc"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "replyMessage": {"text": "hi", "imageUrl": ""}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = client(&server)
            .request_reply(&session(), "room-1")
            .await
            .unwrap();

        assert_eq!(reply.text, "hi");
        assert_eq!(reply.combined(), "hi");
    }

    #[tokio::test]
    async fn test_room_id_stays_a_single_path_segment() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/rooms/x%2Fnomis%2Fother%2Fchat%3F/reply"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "replyMessage": {"text": "hi", "imageUrl": ""}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = client(&server)
            .request_reply(&session(), "x/nomis/other/chat?")
            .await
            .unwrap();
        assert_eq!(reply.text, "hi");

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].url.query().is_none());
    }

    #[tokio::test]
    async fn test_base_url_with_path_prefix_is_kept() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/proxy/v1/rooms/room-1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "messages": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            NomiApiClient::new(&format!("{}/proxy/", server.uri()), Duration::from_secs(5))
                .unwrap();
        let messages = client
            .fetch_recent_messages(&session(), "room-1")
            .await
            .unwrap();
        assert!(messages.is_empty());
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        assert!(matches!(
            NomiApiClient::new("not a url", Duration::from_secs(1)),
            Err(NomiError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_reply_error_mirrors_fetch_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = client(&server)
            .request_reply(&session(), "room-1")
            .await
            .unwrap_err();

        assert!(matches!(err, NomiError::HttpStatus { status: 500, ref body } if body == "boom"));
    }
}
