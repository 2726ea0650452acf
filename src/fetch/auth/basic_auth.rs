use crate::fetch::client::HttpClient;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{AUTHORIZATION, HeaderValue, InvalidHeaderValue};

/// An [`HttpClient`] wrapper that sends HTTP basic credentials on every
/// request (Grafana Cloud style `user:token`).
pub struct BasicAuth<C> {
    inner: C,
    header: HeaderValue,
}

impl<C> BasicAuth<C> {
    pub fn new(inner: C, username: &str, password: &str) -> Result<Self, InvalidHeaderValue> {
        let encoded = STANDARD.encode(format!("{username}:{password}"));
        let mut header = HeaderValue::from_str(&format!("Basic {encoded}"))?;
        header.set_sensitive(true);
        Ok(Self { inner, header })
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for BasicAuth<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        req.headers_mut().insert(AUTHORIZATION, self.header.clone());
        self.inner.execute(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_encodes_credentials() {
        let auth = BasicAuth::new((), "123456", "glc_token").unwrap();
        let expected = format!("Basic {}", STANDARD.encode("123456:glc_token"));
        assert_eq!(auth.header.to_str().unwrap(), expected);
        assert!(auth.header.is_sensitive());
    }
}
