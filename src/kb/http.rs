use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

use super::{Fact, KbService, KbType, SearchParams, SearchSpace};
use crate::config::KbConfig;
use crate::error::{ConvflowError, Result};

/// Client for a CLOCQ-style KB service exposing JSON endpoints
///
/// Every lookup is a POST with a JSON body; transient failures (network,
/// 429, 5xx) are retried with exponential back-off.
pub struct HttpKb {
    client: Client,
    base_url: Url,
    max_retries: usize,
}

/// `/types` answers with a list, `null`, or the string `"None"`.
#[derive(Deserialize)]
#[serde(untagged)]
enum TypesResponse {
    Types(Vec<Value>),
    Other(Value),
}

/// `/item_to_label` answers with one label or a list of labels.
#[derive(Deserialize)]
#[serde(untagged)]
enum LabelResponse {
    One(String),
    Many(Vec<String>),
}

impl HttpKb {
    /// Create a new KB client
    ///
    /// # Arguments
    ///
    /// * `base_url` - Root URL of the KB service (e.g. "http://localhost:7777")
    /// * `timeout` - Per-request timeout
    /// * `max_retries` - Retry attempts for transient failures
    pub fn new(base_url: &str, timeout: Duration, max_retries: usize) -> Result<Self> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| ConvflowError::Config(format!("Invalid KB base URL {}: {}", base_url, e)))?;
        // keep the last path segment when joining endpoints
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConvflowError::Kb(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            max_retries,
        })
    }

    pub fn from_config(config: &KbConfig) -> Result<Self> {
        Self::new(
            &config.base_url,
            Duration::from_secs(config.timeout_secs),
            config.max_retries,
        )
    }

    fn endpoint(&self, name: &str) -> Result<Url> {
        self.base_url
            .join(name)
            .map_err(|e| ConvflowError::Config(format!("Invalid KB endpoint {}: {}", name, e)))
    }

    /// Single request, no retry
    async fn post_once<T: DeserializeOwned>(&self, url: &Url, body: &Value) -> Result<T> {
        let response = self
            .client
            .post(url.clone())
            .json(body)
            .send()
            .await
            .map_err(|e| ConvflowError::Kb(format!("Network error: {}", e)))?;

        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            return Err(ConvflowError::Kb(format!("KB service error {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| ConvflowError::Kb(format!("Failed to parse response from {}: {}", url, e)))
    }

    /// Request with retry for transient failures
    async fn post<T: DeserializeOwned>(&self, endpoint: &str, body: Value) -> Result<T> {
        let url = self.endpoint(endpoint)?;
        let mut attempt = 0;
        let mut delay = Duration::from_millis(500);

        loop {
            match self.post_once(&url, &body).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_retries && is_retryable(&e) => {
                    log::warn!(
                        "Retry {}/{} for {} after error: {}",
                        attempt + 1,
                        self.max_retries,
                        endpoint,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn is_retryable(error: &ConvflowError) -> bool {
    let message = error.to_string();
    message.contains("Network error")
        || [
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::BAD_GATEWAY,
            StatusCode::SERVICE_UNAVAILABLE,
            StatusCode::GATEWAY_TIMEOUT,
        ]
        .iter()
        .any(|status| message.contains(&format!("KB service error {}", status)))
}

fn parse_types(response: TypesResponse) -> Vec<KbType> {
    match response {
        TypesResponse::Types(values) => values
            .into_iter()
            .filter_map(|value| serde_json::from_value::<KbType>(value).ok())
            .collect(),
        TypesResponse::Other(_) => Vec::new(),
    }
}

impl KbService for HttpKb {
    async fn search(&self, text: &str, params: &SearchParams) -> Result<SearchSpace> {
        self.post(
            "search_space",
            json!({ "question": text, "parameters": params, "include_labels": true }),
        )
        .await
    }

    async fn neighborhood(&self, item_id: &str, max_facts: usize) -> Result<Vec<Fact>> {
        self.post(
            "neighborhood",
            json!({ "item": item_id, "p": max_facts, "include_labels": true }),
        )
        .await
    }

    async fn frequency(&self, item_id: &str) -> Result<(u64, u64)> {
        self.post("frequency", json!({ "item": item_id })).await
    }

    async fn types(&self, item_id: &str) -> Result<Vec<KbType>> {
        let response: TypesResponse = self.post("types", json!({ "item": item_id })).await?;
        Ok(parse_types(response))
    }

    async fn label(&self, item_id: &str) -> Result<String> {
        let response: LabelResponse = self.post("item_to_label", json!({ "item": item_id })).await?;
        let label = match response {
            LabelResponse::One(label) => label,
            LabelResponse::Many(labels) => labels.into_iter().next().unwrap_or_default(),
        };
        if label.is_empty() {
            return Ok(item_id.to_string());
        }
        Ok(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_kb_endpoint_join() {
        let kb = HttpKb::new("http://localhost:7777/api", Duration::from_secs(5), 2).unwrap();
        assert_eq!(
            kb.endpoint("neighborhood").unwrap().as_str(),
            "http://localhost:7777/api/neighborhood"
        );
    }

    #[test]
    fn test_http_kb_invalid_url() {
        let result = HttpKb::new("not a url", Duration::from_secs(5), 2);
        assert!(matches!(result, Err(ConvflowError::Config(_))));
    }

    #[test]
    fn test_retryable_errors() {
        assert!(is_retryable(&ConvflowError::Kb(
            "KB service error 503 Service Unavailable: down".to_string()
        )));
        assert!(is_retryable(&ConvflowError::Kb("Network error: reset".to_string())));
        assert!(!is_retryable(&ConvflowError::Kb(
            "KB service error 404 Not Found: nope".to_string()
        )));
        assert!(!is_retryable(&ConvflowError::Parse("bad".to_string())));
    }

    #[test]
    fn test_parse_types_variants() {
        let types: TypesResponse =
            serde_json::from_str(r#"[{"id": "Q6256", "label": "country"}, "None"]"#).unwrap();
        let parsed = parse_types(types);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].id, "Q6256");

        let none: TypesResponse = serde_json::from_str(r#""None""#).unwrap();
        assert!(parse_types(none).is_empty());
        let null: TypesResponse = serde_json::from_str("null").unwrap();
        assert!(parse_types(null).is_empty());
    }
}
