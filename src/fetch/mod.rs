mod basic;
mod bods;
mod client;
pub mod auth;

pub use basic::{BasicClient, REQUEST_TIMEOUT, USER_AGENT};
pub use bods::{BASE_URL_TEMPLATE, BodsClient};
pub use client::HttpClient;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;

use crate::error::FetchError;
use crate::types::BusData;

/// Upstream source of raw SIRI-VM payloads, one line at a time.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch_bus_data(&self, line_ref: &str) -> Result<BusData, FetchError>;
}

/// GETs `url` and returns the body of a `200 OK` response.
///
/// Any other status is an error carrying the status and the response body.
pub async fn fetch_bytes<C: HttpClient + ?Sized>(
    client: &C,
    url: &str,
) -> Result<Bytes, FetchError> {
    let url = reqwest::Url::parse(url).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
    let mut req = reqwest::Request::new(reqwest::Method::GET, url);
    req.headers_mut()
        .insert(reqwest::header::ACCEPT, reqwest::header::HeaderValue::from_static("*/*"));

    let resp = client.execute(req).await.map_err(FetchError::Network)?;

    let status = resp.status();
    if status != StatusCode::OK {
        let body = resp.text().await.unwrap_or_default();
        return Err(FetchError::Status {
            status: status.as_u16(),
            body,
        });
    }

    resp.bytes().await.map_err(FetchError::Body)
}
