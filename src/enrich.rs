use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://search.censys.io/api/v2";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the external host-intelligence lookup (Censys search API).
///
/// Strictly a post-scan collaborator: lookup failures are surfaced to the
/// caller as errors to be logged as warnings, and never invalidate an
/// already-computed scan report.
#[derive(Debug, Clone)]
pub struct EnrichClient {
    http: reqwest::Client,
    api_id: String,
    api_secret: String,
    base_url: String,
}

/// Auxiliary metadata for one host, keyed by IP.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct HostIntel {
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub location: Location,
    #[serde(default)]
    pub services: Vec<ServiceIntel>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceIntel {
    pub port: u16,
    #[serde(default)]
    pub service_name: Option<String>,
    #[serde(default)]
    pub transport_protocol: Option<String>,
}

#[derive(Deserialize, Default)]
struct SearchResponse {
    #[serde(default)]
    result: SearchResult,
}

#[derive(Deserialize, Default)]
struct SearchResult {
    #[serde(default)]
    hits: Vec<HostIntel>,
}

impl EnrichClient {
    pub fn new(api_id: impl Into<String>, api_secret: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build enrichment HTTP client")?;
        Ok(Self {
            http,
            api_id: api_id.into(),
            api_secret: api_secret.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Override the API base URL (tests point this at a local stub).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Look up intelligence for one IP. Returns the first hit, or an error
    /// when the service is unreachable, rejects the credentials, or has no
    /// data for the address.
    pub async fn lookup(&self, ip: IpAddr) -> Result<HostIntel> {
        let url = format!("{}/hosts/search", self.base_url);
        let resp = self
            .http
            .get(&url)
            .basic_auth(&self.api_id, Some(&self.api_secret))
            .query(&[("q", format!("ip: {ip}")), ("per_page", "1".to_string())])
            .send()
            .await
            .with_context(|| format!("enrichment request for {ip} failed"))?;

        if !resp.status().is_success() {
            bail!("enrichment service returned {}", resp.status());
        }

        let body: SearchResponse = resp
            .json()
            .await
            .context("enrichment response was not valid JSON")?;
        body.result
            .hits
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("no intelligence found for {ip}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, Json, Router};

    async fn spawn_stub(body: serde_json::Value) -> String {
        let app = Router::new().route(
            "/hosts/search",
            get(move || {
                let body = body.clone();
                async move { Json(body) }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn lookup_parses_first_hit() {
        let base = spawn_stub(serde_json::json!({
            "result": {
                "hits": [{
                    "ip": "1.2.3.4",
                    "location": { "city": "Reykjavik", "country": "IS" },
                    "services": [
                        { "port": 22, "service_name": "SSH", "transport_protocol": "TCP" }
                    ]
                }]
            }
        }))
        .await;

        let client = EnrichClient::new("id", "secret").unwrap().with_base_url(base);
        let intel = client.lookup("1.2.3.4".parse().unwrap()).await.unwrap();
        assert_eq!(intel.ip, "1.2.3.4");
        assert_eq!(intel.location.city.as_deref(), Some("Reykjavik"));
        assert_eq!(intel.services.len(), 1);
        assert_eq!(intel.services[0].port, 22);
    }

    #[tokio::test]
    async fn empty_hits_is_an_error_not_a_panic() {
        let base = spawn_stub(serde_json::json!({ "result": { "hits": [] } })).await;
        let client = EnrichClient::new("id", "secret").unwrap().with_base_url(base);
        let err = client.lookup("9.9.9.9".parse().unwrap()).await;
        assert!(err.is_err());
    }
}
