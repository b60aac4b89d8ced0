use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// A source of spot FX rates.
#[async_trait]
pub trait RateProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Units of `target` bought by one unit of `base`.
    async fn fetch_rate(&self, base: &str, target: &str) -> Result<f64>;
}

#[derive(Debug, Deserialize)]
struct RatesResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    rates: HashMap<String, f64>,
}

impl RatesResponse {
    fn rate(&self, target: &str) -> Result<f64> {
        if let Some(result) = &self.result {
            if result != "success" {
                return Err(anyhow!("provider reported result '{}'", result));
            }
        }
        self.rates
            .get(target)
            .copied()
            .ok_or_else(|| anyhow!("response has no rate for {}", target))
    }
}

fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent("trading-ledger/0.1")
        .build()
        .context("Failed to build HTTP client")
}

async fn get_rates(http: &Client, url: &str) -> Result<RatesResponse> {
    http.get(url)
        .send()
        .await
        .with_context(|| format!("GET {url} failed"))?
        .error_for_status()
        .with_context(|| format!("GET {url} returned non-success status"))?
        .json()
        .await
        .with_context(|| format!("Failed to parse JSON response from {url}"))
}

/// `GET {base_url}/latest?from=USD&to=EUR`
pub struct FrankfurterProvider {
    http: Client,
    base_url: String,
}

impl FrankfurterProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: build_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl RateProvider for FrankfurterProvider {
    fn name(&self) -> &str {
        "frankfurter"
    }

    async fn fetch_rate(&self, base: &str, target: &str) -> Result<f64> {
        let url = format!("{}/latest?from={}&to={}", self.base_url, base, target);
        get_rates(&self.http, &url).await?.rate(target)
    }
}

/// `GET {base_url}/v6/latest/USD`
pub struct OpenErApiProvider {
    http: Client,
    base_url: String,
}

impl OpenErApiProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: build_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl RateProvider for OpenErApiProvider {
    fn name(&self) -> &str {
        "open-er-api"
    }

    async fn fetch_rate(&self, base: &str, target: &str) -> Result<f64> {
        let url = format!("{}/v6/latest/{}", self.base_url, base);
        get_rates(&self.http, &url).await?.rate(target)
    }
}

/// Frankfurter first, open.er-api as the fallback.
pub fn provider_chain(
    frankfurter_url: &str,
    open_er_api_url: &str,
    timeout: Duration,
) -> Result<Vec<Box<dyn RateProvider>>> {
    Ok(vec![
        Box::new(FrankfurterProvider::new(frankfurter_url, timeout)?),
        Box::new(OpenErApiProvider::new(open_er_api_url, timeout)?),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frankfurter_shape() {
        let r: RatesResponse =
            serde_json::from_str(r#"{"amount":1.0,"base":"USD","date":"2024-01-05","rates":{"EUR":0.915}}"#).unwrap();
        assert_eq!(r.rate("EUR").unwrap(), 0.915);
        assert!(r.rate("GBP").is_err());
    }

    #[test]
    fn open_er_api_shape() {
        let ok: RatesResponse =
            serde_json::from_str(r#"{"result":"success","base_code":"USD","rates":{"USD":1,"EUR":0.92}}"#).unwrap();
        assert_eq!(ok.rate("EUR").unwrap(), 0.92);

        let failed: RatesResponse =
            serde_json::from_str(r#"{"result":"error","error-type":"unsupported-code"}"#).unwrap();
        assert!(failed.rate("EUR").is_err());
    }
}
