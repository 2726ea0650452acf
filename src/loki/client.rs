use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use tracing::{debug, info};

use super::{PUSH_PATH, Pusher, build_push_request};
use crate::error::{ConfigError, SendError};
use crate::fetch::auth::BasicAuth;
use crate::fetch::{BasicClient, HttpClient};
use crate::types::ParsedBusData;

pub struct LokiClient {
    client: Box<dyn HttpClient>,
    push_url: String,
}

impl LokiClient {
    /// Client for the Loki instance at `base_url`. Basic auth is applied only
    /// when both `username` and `password` are non-empty.
    pub fn new(base_url: &str, username: &str, password: &str) -> Result<Self, ConfigError> {
        let basic = BasicClient::new().map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        if username.is_empty() || password.is_empty() {
            return Ok(Self::with_client(basic, base_url));
        }

        let authed =
            BasicAuth::new(basic, username, password).map_err(|_| ConfigError::InvalidCredentials)?;
        Ok(Self::with_client(authed, base_url))
    }

    pub fn with_client(client: impl HttpClient + 'static, base_url: &str) -> Self {
        Self {
            client: Box::new(client),
            push_url: format!("{}{}", base_url.trim_end_matches('/'), PUSH_PATH),
        }
    }

    pub fn push_url(&self) -> &str {
        &self.push_url
    }
}

#[async_trait]
impl Pusher for LokiClient {
    #[tracing::instrument(
        name = "loki_push",
        skip_all,
        fields(line_ref = %data.line_ref, vehicles = data.vehicles.len())
    )]
    async fn push(&self, data: &ParsedBusData) -> Result<(), SendError> {
        let start = Instant::now();

        let body = serde_json::to_vec(&build_push_request(data, Utc::now())?)?;
        let body_size = body.len();

        let url =
            reqwest::Url::parse(&self.push_url).map_err(|e| SendError::InvalidUrl(e.to_string()))?;
        let mut req = reqwest::Request::new(reqwest::Method::POST, url);
        req.headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        *req.body_mut() = Some(body.into());

        let resp = self.client.execute(req).await.map_err(SendError::Network)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        debug!(
            body_size,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Loki push accepted"
        );
        info!(
            vehicles = data.vehicles.len(),
            line_ref = %data.line_ref,
            "Sent vehicle log lines to Loki"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loki::PushRequest;
    use crate::test_support::spawn_server;
    use crate::types::VehicleActivity;
    use axum::Router;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Received {
        bodies: Vec<Vec<u8>>,
        auth: Vec<Option<String>>,
        content_type: Vec<Option<String>>,
    }

    type Shared = Arc<Mutex<Received>>;

    async fn spawn_loki(status: StatusCode) -> (String, Shared) {
        let received = Shared::default();
        let router = Router::new()
            .route(
                "/loki/api/v1/push",
                post(
                    move |State(received): State<Shared>, headers: HeaderMap, body: axum::body::Bytes| async move {
                        let header = |name: &str| {
                            headers
                                .get(name)
                                .and_then(|v| v.to_str().ok())
                                .map(str::to_string)
                        };
                        let mut r = received.lock().unwrap();
                        r.bodies.push(body.to_vec());
                        r.auth.push(header("authorization"));
                        r.content_type.push(header("content-type"));
                        (status, "push response")
                    },
                ),
            )
            .with_state(received.clone());
        (spawn_server(router).await, received)
    }

    fn batch(vehicles: usize) -> ParsedBusData {
        ParsedBusData {
            line_ref: "1".to_string(),
            timestamp: "2024-01-15T10:30:00.000Z".to_string(),
            vehicles: (0..vehicles)
                .map(|i| VehicleActivity {
                    vehicle_ref: format!("TEST-{i:03}"),
                    longitude: -2.5,
                    latitude: 51.4,
                    ..Default::default()
                })
                .collect(),
        }
    }

    #[test]
    fn test_push_url_tolerates_trailing_slash() {
        let a = LokiClient::new("http://localhost:3100", "", "").unwrap();
        let b = LokiClient::new("http://localhost:3100/", "", "").unwrap();
        assert_eq!(a.push_url(), "http://localhost:3100/loki/api/v1/push");
        assert_eq!(a.push_url(), b.push_url());
    }

    #[tokio::test]
    async fn test_push_sends_one_stream() {
        let (url, received) = spawn_loki(StatusCode::NO_CONTENT).await;
        let client = LokiClient::new(&url, "", "").unwrap();

        client.push(&batch(3)).await.unwrap();

        let r = received.lock().unwrap();
        assert_eq!(r.bodies.len(), 1);
        assert_eq!(r.content_type[0].as_deref(), Some("application/json"));
        assert_eq!(r.auth[0], None);

        let req: PushRequest = serde_json::from_slice(&r.bodies[0]).unwrap();
        assert_eq!(req.streams.len(), 1);
        assert_eq!(req.streams[0].stream["line_ref"], "1");
        assert_eq!(req.streams[0].values.len(), 3);
    }

    #[tokio::test]
    async fn test_push_with_basic_auth() {
        let (url, received) = spawn_loki(StatusCode::NO_CONTENT).await;
        let client = LokiClient::new(&url, "123456", "glc_token").unwrap();

        client.push(&batch(1)).await.unwrap();

        let r = received.lock().unwrap();
        let auth = r.auth[0].as_deref().unwrap();
        assert!(auth.starts_with("Basic "));
    }

    #[tokio::test]
    async fn test_no_auth_when_password_missing() {
        let (url, received) = spawn_loki(StatusCode::NO_CONTENT).await;
        let client = LokiClient::new(&url, "123456", "").unwrap();

        client.push(&batch(1)).await.unwrap();

        assert_eq!(received.lock().unwrap().auth[0], None);
    }

    #[tokio::test]
    async fn test_any_2xx_is_success() {
        for status in [StatusCode::OK, StatusCode::NO_CONTENT] {
            let (url, _) = spawn_loki(status).await;
            let client = LokiClient::new(&url, "", "").unwrap();
            assert!(client.push(&batch(1)).await.is_ok(), "{status}");
        }
    }

    #[tokio::test]
    async fn test_non_2xx_is_error() {
        for status in [
            StatusCode::BAD_REQUEST,
            StatusCode::UNAUTHORIZED,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::INTERNAL_SERVER_ERROR,
        ] {
            let (url, _) = spawn_loki(status).await;
            let client = LokiClient::new(&url, "", "").unwrap();
            match client.push(&batch(1)).await {
                Err(SendError::Status { status: got, body }) => {
                    assert_eq!(got, status.as_u16());
                    assert_eq!(body, "push response");
                }
                other => panic!("expected status error for {status}, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_empty_batch_still_pushes() {
        let (url, received) = spawn_loki(StatusCode::NO_CONTENT).await;
        let client = LokiClient::new(&url, "", "").unwrap();

        client.push(&batch(0)).await.unwrap();

        let r = received.lock().unwrap();
        let req: PushRequest = serde_json::from_slice(&r.bodies[0]).unwrap();
        assert!(req.streams[0].values.is_empty());
    }

    #[tokio::test]
    async fn test_server_unavailable() {
        let client = LokiClient::new("http://127.0.0.1:1", "", "").unwrap();
        assert!(matches!(
            client.push(&batch(1)).await,
            Err(SendError::Network(_))
        ));
    }
}
