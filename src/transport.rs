//! HTTP transport used by the acquisition pipeline
//!
//! The pipeline is generic over [`Transport`] so that tests can replace the
//! network with canned responses.

use std::future::Future;

use serde_json::Value;

use crate::error::{Error, Result};

/// Fetches a JSON document from a URL
pub trait Transport: Send + Sync {
    /// # Errors
    ///
    /// * `Error::Network` - connection failure or non-2xx status
    /// * `Error::MalformedResponse` - body is not JSON
    fn get_json(&self, url: &str) -> impl Future<Output = Result<Value>> + Send;
}

/// `reqwest`-backed transport
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for HttpTransport {
    async fn get_json(&self, url: &str) -> Result<Value> {
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::http_status(status.as_u16()));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| Error::MalformedResponse(e.to_string()))
    }
}
