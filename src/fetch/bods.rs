//! Client for the Bus Open Data Service SIRI-VM datafeed.

use std::time::Instant;

use async_trait::async_trait;
use tracing::debug;

use super::auth::UrlParam;
use super::{BasicClient, Fetcher, HttpClient, fetch_bytes};
use crate::error::FetchError;
use crate::types::BusData;

pub const BASE_URL_TEMPLATE: &str = "https://data.bus-data.dft.gov.uk/api/v1/datafeed/{dataset_id}/";

pub struct BodsClient {
    client: Box<dyn HttpClient>,
    base_url: String,
}

impl BodsClient {
    /// Production client for `dataset_id`, authenticating with `api_key`.
    pub fn new(api_key: &str, dataset_id: &str) -> reqwest::Result<Self> {
        let client = UrlParam::api_key(BasicClient::new()?, api_key);
        Ok(Self::with_base_url(
            client,
            BASE_URL_TEMPLATE.replace("{dataset_id}", dataset_id),
        ))
    }

    /// Client against an arbitrary datafeed URL. Credentials, if any, are
    /// expected to be layered into `client`.
    pub fn with_base_url(client: impl HttpClient + 'static, base_url: impl Into<String>) -> Self {
        Self {
            client: Box::new(client),
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request_url(&self, line_ref: &str) -> Result<reqwest::Url, FetchError> {
        let mut url =
            reqwest::Url::parse(&self.base_url).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
        url.query_pairs_mut().append_pair("lineRef", line_ref);
        Ok(url)
    }
}

#[async_trait]
impl Fetcher for BodsClient {
    #[tracing::instrument(name = "bods_fetch", skip(self))]
    async fn fetch_bus_data(&self, line_ref: &str) -> Result<BusData, FetchError> {
        let start = Instant::now();
        let url = self.request_url(line_ref)?;

        let xml = fetch_bytes(self.client.as_ref(), url.as_str()).await?;

        debug!(
            bytes = xml.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "BODS payload received"
        );
        Ok(BusData::new(line_ref, xml))
    }
}
