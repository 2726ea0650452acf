use async_trait::async_trait;
use reqwest::{Request, Response};

/// Transport seam shared by the BODS and Loki clients. Wrappers in
/// [`auth`](super::auth) layer credentials on top of a base client.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
