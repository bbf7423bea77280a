use reqwest::{Client, ClientBuilder};
use std::time::Duration;
use url::Url;

use concord_common::error::ConcordError;

/// HTTP client bound to one collaborator base URL with a hard request timeout.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base: Url,
}

impl HttpClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ConcordError> {
        let base = Url::parse(base_url)
            .map_err(|e| ConcordError::Config(format!("invalid base URL '{base_url}': {e}")))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ConcordError::Config(format!(
                "unsupported URL scheme '{}' in {base_url}",
                base.scheme()
            )));
        }

        let client = ClientBuilder::new()
            .timeout(timeout)
            .build()
            .map_err(|e| ConcordError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, base })
    }

    /// Join path segments onto the base URL, percent-encoding each one.
    pub fn url(&self, segments: &[&str]) -> Result<Url, ConcordError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ConcordError::Config(format!("base URL {} cannot be a base", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub fn get(&self, url: Url) -> reqwest::RequestBuilder {
        self.client.get(url)
    }

    pub fn post(&self, url: Url) -> reqwest::RequestBuilder {
        self.client.post(url)
    }
}
