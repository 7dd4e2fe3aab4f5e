//! Vehicle taxonomy client
//!
//! Talks to an NHTSA vPIC compatible service. One call is one attempt;
//! retrying is the caller's job (see [`super::RetryPolicy`]).

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{BrandId, Make, Model};

/// Failure of a single upstream attempt
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("upstream returned status {0}")]
    Status(u16),

    #[error("malformed upstream response: {0}")]
    Decode(String),
}

impl UpstreamError {
    /// Only transport failures and 5xx responses are worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            UpstreamError::Transport(_) => true,
            UpstreamError::Status(code) => (500..600).contains(code),
            UpstreamError::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        UpstreamError::Transport(e.to_string())
    }
}

/// Source of truth for brands and models
#[async_trait]
pub trait TaxonomyClient: Send + Sync + 'static {
    async fn fetch_makes(&self) -> Result<Vec<Make>, UpstreamError>;

    async fn fetch_models(&self, brand_id: &BrandId) -> Result<Vec<Model>, UpstreamError>;
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(rename = "Results")]
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct MakeRecord {
    #[serde(rename = "Make_ID")]
    make_id: i64,
    #[serde(rename = "Make_Name")]
    make_name: String,
}

#[derive(Debug, Deserialize)]
struct ModelRecord {
    #[serde(rename = "Make_ID")]
    make_id: i64,
    #[serde(rename = "Model_ID")]
    model_id: i64,
    #[serde(rename = "Model_Name")]
    model_name: String,
}

/// reqwest-backed [`TaxonomyClient`]
#[derive(Debug, Clone)]
pub struct HttpTaxonomyClient {
    client: Client,
    base_url: String,
}

impl HttpTaxonomyClient {
    const USER_AGENT: &'static str = concat!("marketplace-ledger/", env!("CARGO_PKG_VERSION"));

    /// `timeout` bounds each individual attempt
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(Self::USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn get_results<T>(&self, url: &str) -> Result<Vec<T>, UpstreamError>
    where
        T: for<'de> Deserialize<'de>,
    {
        debug!(url, "Calling taxonomy service");

        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let envelope: Envelope<T> =
            serde_json::from_slice(&body).map_err(|e| UpstreamError::Decode(e.to_string()))?;
        Ok(envelope.results)
    }
}

#[async_trait]
impl TaxonomyClient for HttpTaxonomyClient {
    async fn fetch_makes(&self) -> Result<Vec<Make>, UpstreamError> {
        let url = format!("{}/getallmakes?format=json", self.base_url);
        let records: Vec<MakeRecord> = self.get_results(&url).await?;

        Ok(records
            .into_iter()
            .map(|r| Make {
                brand_id: r.make_id.to_string(),
                name: r.make_name,
            })
            .collect())
    }

    async fn fetch_models(&self, brand_id: &BrandId) -> Result<Vec<Model>, UpstreamError> {
        let url = format!(
            "{}/GetModelsForMakeId/{}?format=json",
            self.base_url, brand_id
        );
        let records: Vec<ModelRecord> = self.get_results(&url).await?;

        Ok(records
            .into_iter()
            .map(|r| Model {
                model_id: r.model_id.to_string(),
                brand_id: r.make_id.to_string(),
                name: r.model_name,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(UpstreamError::Transport("reset".to_string()).is_retryable());
        assert!(UpstreamError::Status(500).is_retryable());
        assert!(UpstreamError::Status(503).is_retryable());
        assert!(!UpstreamError::Status(404).is_retryable());
        assert!(!UpstreamError::Status(429).is_retryable());
        assert!(!UpstreamError::Decode("eof".to_string()).is_retryable());
    }

    #[test]
    fn test_decode_models_envelope() {
        let body = r#"{
            "Count": 2,
            "Message": "Response returned successfully",
            "Results": [
                {"Make_ID": 474, "Make_Name": "HONDA", "Model_ID": 1861, "Model_Name": "Accord"},
                {"Make_ID": 474, "Make_Name": "HONDA", "Model_ID": 1863, "Model_Name": "Civic"}
            ]
        }"#;

        let envelope: Envelope<ModelRecord> = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.results.len(), 2);
        assert_eq!(envelope.results[1].model_name, "Civic");
        assert_eq!(envelope.results[1].make_id, 474);
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client =
            HttpTaxonomyClient::new("http://localhost:9/api/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url, "http://localhost:9/api");
    }
}
