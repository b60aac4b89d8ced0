pub mod conversion;
pub mod providers;

use anyhow::Result;
use chrono::Utc;
use models::{FxQuote, Settings};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::RwLock;

pub use conversion::ConversionState;
pub use providers::{provider_chain, FrankfurterProvider, OpenErApiProvider, RateProvider};

/// Result of a refresh attempt. Failures are states, not errors.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FxStatus {
    Fresh { quote: FxQuote },
    /// Every provider failed; the previously cached quote is still in use.
    Stale { quote: FxQuote, reason: String },
    /// Every provider failed and nothing is cached.
    Unavailable { reason: String },
}

/// Rate acquisition with a single cached quote.
///
/// The cache is reused until `refresh` is called explicitly. Providers are
/// queried without holding the cache lock.
pub struct FxService {
    base: String,
    target: String,
    providers: Vec<Box<dyn RateProvider>>,
    cache: RwLock<Option<FxQuote>>,
}

impl FxService {
    pub fn new(base: &str, target: &str, providers: Vec<Box<dyn RateProvider>>) -> Self {
        Self {
            base: base.to_uppercase(),
            target: target.to_uppercase(),
            providers,
            cache: RwLock::new(None),
        }
    }

    /// Seeds the cache from persisted state. Quotes for another pair are ignored.
    pub fn with_cached(mut self, quote: Option<FxQuote>) -> Self {
        let quote = quote.filter(|q| {
            q.base.eq_ignore_ascii_case(&self.base) && q.target.eq_ignore_ascii_case(&self.target)
        });
        *self.cache.get_mut() = quote;
        self
    }

    pub async fn cached(&self) -> Option<FxQuote> {
        self.cache.read().await.clone()
    }

    /// Tries each provider in order; the first finite positive rate wins and
    /// replaces the cache. On total failure the cache is left untouched.
    pub async fn refresh(&self) -> FxStatus {
        let mut failures = Vec::new();

        for provider in &self.providers {
            match provider.fetch_rate(&self.base, &self.target).await {
                Ok(rate) if rate.is_finite() && rate > 0.0 => {
                    let quote = FxQuote {
                        base: self.base.clone(),
                        target: self.target.clone(),
                        rate,
                        as_of: Utc::now(),
                        provider: provider.name().to_string(),
                    };
                    tracing::info!(provider = provider.name(), rate, "fx rate refreshed");
                    *self.cache.write().await = Some(quote.clone());
                    return FxStatus::Fresh { quote };
                }
                Ok(rate) => {
                    tracing::warn!(provider = provider.name(), rate, "fx provider returned unusable rate");
                    failures.push(format!("{}: unusable rate {}", provider.name(), rate));
                }
                Err(e) => {
                    tracing::warn!(provider = provider.name(), error = %format!("{:#}", e), "fx provider failed");
                    failures.push(format!("{}: {:#}", provider.name(), e));
                }
            }
        }

        let reason = if failures.is_empty() {
            "no fx providers configured".to_string()
        } else {
            failures.join("; ")
        };

        match self.cached().await {
            Some(quote) => FxStatus::Stale { quote, reason },
            None => FxStatus::Unavailable { reason },
        }
    }

    /// Conversion context for the current cache.
    pub async fn conversion(&self) -> ConversionState {
        ConversionState::new(&self.base, &self.target, self.cached().await)
    }
}

/// Service for the configured pair, using the configured provider endpoints
/// in their default priority order.
pub fn service_from_settings(settings: &Settings) -> Result<FxService> {
    let timeout = Duration::from_secs(settings.http_timeout_secs);
    let providers = provider_chain(&settings.frankfurter_url, &settings.open_er_api_url, timeout)?;
    Ok(FxService::new(&settings.base_currency, &settings.display_currency, providers))
}
