use super::client::HttpClient;
use async_trait::async_trait;
use std::time::Duration;

pub const USER_AGENT: &str = concat!("bods2loki/", env!("CARGO_PKG_VERSION"));
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct BasicClient(reqwest::Client);

impl BasicClient {
    /// Client with the crate user agent and a 30 s overall request timeout.
    pub fn new() -> reqwest::Result<Self> {
        Self::with_timeout(REQUEST_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self(client))
    }
}

#[async_trait]
impl HttpClient for BasicClient {
    async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        self.0.execute(req).await
    }
}
