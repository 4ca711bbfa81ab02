//! Best-effort coin logo resolution.
//!
//! Logos are keyed by [`logo_key`]: a digest of the record's own logo URL
//! when it has one, else the coin id. Order of attempts for a key:
//!
//! 1. the on-disk [`LogoCache`] entry, if it decodes;
//! 2. one HTTP GET against the record's own logo URL, or the configured
//!    per-coin template, bounded by a timeout;
//! 3. on success the image is downscaled, re-encoded as PNG and written
//!    back to the cache.
//!
//! Logos are cosmetic: every failure becomes [`LogoOutcome::Unavailable`]
//! carrying a [`LogoUnavailable`] reason, never an error.

use futures::future::join_all;
use image::imageops::FilterType;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

use crate::api::logs::{log_info, log_success, log_warning};
use crate::cache::LogoCache;
use crate::config::{AppConfig, COIN_PLACEHOLDER, DEFAULT_LOGO_TIMEOUT, DEFAULT_LOGO_URL};
use crate::models::WalletRecord;
use crate::qr::{encode_png, png_data_uri};

/// Largest side of a stored logo, in pixels.
pub const MAX_LOGO_PX: u32 = 128;

/// Why a logo is not shown. A normal outcome, not a failure of the run.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "camelCase")]
pub enum LogoUnavailable {
    #[error("logos are disabled")]
    Disabled,

    #[error("record has no coin and no logo URL")]
    NoCoin,

    #[error("logo request timed out")]
    Timeout,

    #[error("logo request failed: {0}")]
    Network(String),

    #[error("logo host answered HTTP {0}")]
    Status(u16),

    #[error("logo is not a readable image: {0}")]
    Decode(String),
}

/// Where an available logo came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogoSource {
    Cache,
    Remote,
}

/// A logo ready for display, always PNG encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoAsset {
    /// Empty when the logo came from a URL on a record without a coin.
    pub coin_id: String,
    pub png: Vec<u8>,
    pub source: LogoSource,
}

impl LogoAsset {
    pub fn data_uri(&self) -> String {
        png_data_uri(&self.png)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogoOutcome {
    Available(LogoAsset),
    Unavailable(LogoUnavailable),
}

impl LogoOutcome {
    pub fn asset(&self) -> Option<&LogoAsset> {
        match self {
            LogoOutcome::Available(asset) => Some(asset),
            LogoOutcome::Unavailable(_) => None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.asset().is_some()
    }
}

/// One logo to resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoRequest {
    /// May be empty when `url` is set.
    pub coin_id: String,
    /// Explicit URL from the upload, preferred over the template.
    pub url: Option<String>,
}

impl LogoRequest {
    /// Request for a record's logo, `None` when it has neither a coin nor a URL.
    pub fn for_record(record: &WalletRecord) -> Option<Self> {
        let request = Self {
            coin_id: record.coin_id().unwrap_or_default(),
            url: record.logo_url().map(String::from),
        };
        request.key().map(|_| request)
    }

    pub fn key(&self) -> Option<String> {
        logo_key(&self.coin_id, self.url.as_deref())
    }
}

/// Resolved logos keyed by [`logo_key`].
pub type LogoBook = HashMap<String, LogoOutcome>;

/// Book and cache key of a logo.
///
/// An explicit URL is keyed by its SHA-256 prefix, so two URLs for the same
/// coin never share an entry and a custom URL never stands in for the coin's
/// template logo. Without a URL the key is the coin id.
pub fn logo_key(coin_id: &str, url: Option<&str>) -> Option<String> {
    match url {
        Some(url) => {
            let hash = Sha256::digest(url.as_bytes());
            Some(format!("url-{}", &format!("{:x}", hash)[..16]))
        }
        None if coin_id.is_empty() => None,
        None => Some(coin_id.to_string()),
    }
}

/// The book entry for a record. Records missing from the book were never
/// looked up, which only happens when logos are off.
pub fn logo_for(record: &WalletRecord, logos: &LogoBook) -> LogoOutcome {
    match LogoRequest::for_record(record).and_then(|r| r.key()) {
        Some(key) => logos
            .get(&key)
            .cloned()
            .unwrap_or(LogoOutcome::Unavailable(LogoUnavailable::Disabled)),
        None => LogoOutcome::Unavailable(LogoUnavailable::NoCoin),
    }
}

/// Resolves coin logos through the cache and a remote source.
#[derive(Debug, Clone)]
pub struct LogoResolver {
    cache: Option<LogoCache>,
    client: reqwest::Client,
    url_template: String,
    timeout: Duration,
    enabled: bool,
}

impl LogoResolver {
    /// Resolver backed by `cache`, fetching from `url_template`.
    pub fn new(cache: Option<LogoCache>, url_template: impl Into<String>) -> Self {
        Self {
            cache,
            client: reqwest::Client::new(),
            url_template: url_template.into(),
            timeout: DEFAULT_LOGO_TIMEOUT,
            enabled: true,
        }
    }

    /// Resolver configured from the environment. A cache directory that
    /// cannot be created leaves the resolver uncached.
    pub fn from_config(config: &AppConfig) -> Self {
        let cache = match LogoCache::open(&config.logo_cache_dir) {
            Ok(cache) => Some(cache),
            Err(e) => {
                log_warning(format!(
                    "Logo cache {} unavailable ({}), logos will not be cached",
                    config.logo_cache_dir.display(),
                    e
                ));
                None
            }
        };

        Self::new(cache, config.logo_url_template.clone())
            .with_timeout(config.logo_timeout)
            .with_enabled(config.logos_enabled)
    }

    /// Resolver that never shows logos.
    pub fn disabled() -> Self {
        Self::new(None, DEFAULT_LOGO_URL).with_enabled(false)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn cache(&self) -> Option<&LogoCache> {
        self.cache.as_ref()
    }

    /// Resolve one logo from the coin id, or from `url` when given.
    pub async fn resolve(&self, coin_id: &str, url: Option<&str>) -> LogoOutcome {
        if !self.enabled {
            return LogoOutcome::Unavailable(LogoUnavailable::Disabled);
        }
        let Some(key) = logo_key(coin_id, url) else {
            return LogoOutcome::Unavailable(LogoUnavailable::NoCoin);
        };
        let label = if coin_id.is_empty() { url.unwrap_or_default() } else { coin_id };

        if let Some(png) = self.cache.as_ref().and_then(|c| c.load(&key)) {
            if image::load_from_memory(&png).is_ok() {
                return LogoOutcome::Available(LogoAsset {
                    coin_id: coin_id.to_string(),
                    png,
                    source: LogoSource::Cache,
                });
            }
            log_warning(format!("Cached logo for '{}' is unreadable, fetching again", label));
        }

        let url = url
            .map(String::from)
            .unwrap_or_else(|| self.url_template.replace(COIN_PLACEHOLDER, coin_id));

        match self.fetch(&url).await {
            Ok(png) => {
                if let Some(cache) = &self.cache {
                    if let Err(e) = cache.store(&key, &png) {
                        log_warning(format!("Could not cache logo for '{}': {}", label, e));
                    }
                }
                LogoOutcome::Available(LogoAsset {
                    coin_id: coin_id.to_string(),
                    png,
                    source: LogoSource::Remote,
                })
            }
            Err(reason) => {
                log_info(format!("No logo for '{}': {}", label, reason));
                LogoOutcome::Unavailable(reason)
            }
        }
    }

    /// Resolve many logos concurrently, one lookup per distinct key.
    ///
    /// The result is keyed by [`logo_key`], so callers read it back in their
    /// own order regardless of which fetch finished first.
    pub async fn resolve_many<I>(&self, requests: I) -> LogoBook
    where
        I: IntoIterator<Item = LogoRequest>,
    {
        let mut unique: Vec<(String, LogoRequest)> = Vec::new();
        for request in requests {
            let Some(key) = request.key() else { continue };
            if !unique.iter().any(|(k, _)| *k == key) {
                unique.push((key, request));
            }
        }
        if unique.is_empty() {
            return LogoBook::new();
        }

        if self.enabled {
            log_info(format!("🪙 Resolving {} logo(s)...", unique.len()));
        }
        let lookups = unique.into_iter().map(|(key, request)| async move {
            let outcome = self.resolve(&request.coin_id, request.url.as_deref()).await;
            (key, outcome)
        });
        let book: LogoBook = join_all(lookups).await.into_iter().collect();

        if self.enabled {
            let available = book.values().filter(|o| o.is_available()).count();
            log_success(format!("{}/{} logos available", available, book.len()));
        }
        book
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, LogoUnavailable> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(request_failure)?;

        let status = response.status();
        if !status.is_success() {
            return Err(LogoUnavailable::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(request_failure)?;
        normalize_logo(&body)
    }
}

fn request_failure(err: reqwest::Error) -> LogoUnavailable {
    if err.is_timeout() {
        LogoUnavailable::Timeout
    } else {
        LogoUnavailable::Network(err.to_string())
    }
}

/// Decode any supported image, shrink it to [`MAX_LOGO_PX`] and re-encode as PNG.
pub fn normalize_logo(bytes: &[u8]) -> Result<Vec<u8>, LogoUnavailable> {
    let mut img = image::load_from_memory(bytes).map_err(|e| LogoUnavailable::Decode(e.to_string()))?;
    if img.width() > MAX_LOGO_PX || img.height() > MAX_LOGO_PX {
        img = img.resize(MAX_LOGO_PX, MAX_LOGO_PX, FilterType::Triangle);
    }
    encode_png(img).map_err(|e| LogoUnavailable::Decode(e.to_string()))
}
