use std::time::Duration;

use async_trait::async_trait;
use relay_core::Enrichment;
use serde_json::{Map, Value};

use crate::errors::EnrichError;

/// Longest error body (in chars) kept in [`EnrichError::Status`].
const MAX_ERROR_BODY: usize = 512;

/// Request/response contract of the anomaly classification service.
#[async_trait]
pub trait Classifier: Send + Sync {
    fn name(&self) -> &str;

    async fn classify(&self, payload: &Map<String, Value>) -> Result<Enrichment, EnrichError>;
}

/// Classifier reached with `POST <url>` and a JSON body.
pub struct HttpClassifier {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpClassifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, EnrichError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EnrichError::Network(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
            timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    fn name(&self) -> &str {
        "http"
    }

    async fn classify(&self, payload: &Map<String, Value>) -> Result<Enrichment, EnrichError> {
        let resp = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| EnrichError::from_reqwest(&e, self.timeout))?;

        let status = resp.status();
        let body = resp
            .bytes()
            .await
            .map_err(|e| EnrichError::from_reqwest(&e, self.timeout))?;

        if !status.is_success() {
            let text: String = String::from_utf8_lossy(&body)
                .chars()
                .take(MAX_ERROR_BODY)
                .collect();
            return Err(EnrichError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_slice(&body).map_err(|e| EnrichError::Malformed(e.to_string()))
    }
}
