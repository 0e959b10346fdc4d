//! Exchange-rate cache — local snapshot file plus network refresh.
//!
//! Startup policy: a cache file younger than the freshness window is
//! used as-is and the network is skipped. An absent, unreadable, or
//! stale cache triggers a fetch; fetch success overwrites the cache,
//! fetch failure falls back to whatever stale snapshot was readable —
//! stale rates beat no conversion capability.
//!
//! The fetch is blocking I/O and runs on the blocking pool via
//! [`spawn_refresh`]; the resulting snapshot is delivered over a
//! channel to the dispatcher loop, which owns the alias-table swap.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Rates relative to a reference currency, plus two timestamps: when
/// the upstream source refreshed the rates and when this cache wrote
/// them. Serialized to the cache file; must round-trip exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSnapshot {
    /// Reference currency the rates are expressed against.
    pub base: String,
    /// Currency code (lowercase) → rate relative to `base`.
    pub rates: BTreeMap<String, f64>,
    /// Unix seconds of the upstream refresh.
    pub source_refreshed_at: i64,
    /// Unix seconds when the cache file was written.
    pub cached_at: i64,
}

impl RateSnapshot {
    /// Age of the cached copy relative to `now_secs`.
    pub fn cache_age(&self, now_secs: i64) -> Duration {
        Duration::from_secs(now_secs.saturating_sub(self.cached_at).max(0) as u64)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RateError {
    #[error("cache file {path}: {source}")]
    CacheRead {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cache file {path}: {source}")]
    CacheWrite {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cache parse: {0}")]
    CacheParse(#[from] serde_json::Error),
    #[error("rate fetch returned status {0}")]
    FetchStatus(u16),
    #[error("rate fetch failed: {0}")]
    Fetch(String),
    #[error("rate feed malformed: {0}")]
    FeedParse(String),
    #[error("no rate data available (no cache, fetch failed)")]
    Unavailable,
}

/// Raw HTTP response handed back by a fetcher.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

/// Network collaborator. Any non-2xx status is treated as failure by
/// the cache; implementations only surface transport errors.
pub trait RateFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<FetchResponse, RateError>;
}

/// Blocking `reqwest` fetcher. Runs on the blocking pool only.
pub struct HttpRateFetcher {
    client: reqwest::blocking::Client,
}

impl HttpRateFetcher {
    pub fn new() -> Result<Self, RateError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .map_err(|e| RateError::Fetch(e.to_string()))?;
        Ok(Self { client })
    }
}

impl RateFetcher for HttpRateFetcher {
    fn fetch(&self, url: &str) -> Result<FetchResponse, RateError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| RateError::Fetch(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| RateError::Fetch(e.to_string()))?;
        Ok(FetchResponse { status, body })
    }
}

/// Local rate cache with a staleness policy and network fallback.
pub struct ExchangeRateCache {
    path: PathBuf,
    url: String,
    freshness: Duration,
    fetcher: Arc<dyn RateFetcher>,
}

impl ExchangeRateCache {
    pub fn new(
        path: PathBuf,
        url: String,
        freshness: Duration,
        fetcher: Arc<dyn RateFetcher>,
    ) -> Self {
        Self {
            path,
            url,
            freshness,
            fetcher,
        }
    }

    /// Read the local cache file. Synchronous; called once at startup.
    pub fn read_local(&self) -> Result<RateSnapshot, RateError> {
        let text = std::fs::read_to_string(&self.path).map_err(|source| RateError::CacheRead {
            path: self.path.clone(),
            source,
        })?;
        let snapshot: RateSnapshot = serde_json::from_str(&text)?;
        tracing::debug!(
            source_refreshed_at = snapshot.source_refreshed_at,
            cached_at = snapshot.cached_at,
            currencies = snapshot.rates.len(),
            "read rate cache"
        );
        Ok(snapshot)
    }

    pub fn is_fresh(&self, snapshot: &RateSnapshot, now_secs: i64) -> bool {
        snapshot.cache_age(now_secs) <= self.freshness
    }

    /// Fetch fresh rates and overwrite the local cache.
    pub fn refresh(&self, now_secs: i64) -> Result<RateSnapshot, RateError> {
        let response = self.fetcher.fetch(&self.url)?;
        if !(200..300).contains(&response.status) {
            return Err(RateError::FetchStatus(response.status));
        }
        let snapshot = parse_feed(&response.body, now_secs)?;
        self.write_local(&snapshot)?;
        tracing::info!(
            base = %snapshot.base,
            currencies = snapshot.rates.len(),
            source_refreshed_at = snapshot.source_refreshed_at,
            cached_at = snapshot.cached_at,
            "fetched fresh exchange rates"
        );
        Ok(snapshot)
    }

    /// Full startup policy: fresh cache, else fetch, else stale cache.
    pub fn obtain(&self, now_secs: i64) -> Result<RateSnapshot, RateError> {
        let cached = match self.read_local() {
            Ok(snapshot) => {
                if self.is_fresh(&snapshot, now_secs) {
                    tracing::info!(
                        age_secs = snapshot.cache_age(now_secs).as_secs(),
                        source_refreshed_at = snapshot.source_refreshed_at,
                        cached_at = snapshot.cached_at,
                        "using fresh rate cache, skipping fetch"
                    );
                    return Ok(snapshot);
                }
                Some(snapshot)
            }
            Err(e) => {
                tracing::debug!(error = %e, "rate cache not usable");
                None
            }
        };

        match self.refresh(now_secs) {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => match cached {
                // A stale snapshot is strictly better than nothing.
                Some(stale) => {
                    tracing::warn!(
                        error = %e,
                        age_secs = stale.cache_age(now_secs).as_secs(),
                        "rate fetch failed, falling back to stale cache"
                    );
                    Ok(stale)
                }
                None => {
                    tracing::warn!(error = %e, "rate fetch failed and no cache exists");
                    Err(RateError::Unavailable)
                }
            },
        }
    }

    fn write_local(&self, snapshot: &RateSnapshot) -> Result<(), RateError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| RateError::CacheWrite {
                path: self.path.clone(),
                source,
            })?;
        }
        let text = serde_json::to_string_pretty(snapshot)?;
        std::fs::write(&self.path, text).map_err(|source| RateError::CacheWrite {
            path: self.path.clone(),
            source,
        })
    }
}

/// Parse the upstream feed body (open.er-api.com shape: `base_code`,
/// `time_last_update_unix`, `rates`). Codes are lowercased.
fn parse_feed(body: &str, now_secs: i64) -> Result<RateSnapshot, RateError> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| RateError::FeedParse(e.to_string()))?;

    let base = value
        .get("base_code")
        .and_then(|v| v.as_str())
        .ok_or_else(|| RateError::FeedParse("missing base_code".into()))?
        .to_lowercase();
    let source_refreshed_at = value
        .get("time_last_update_unix")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| RateError::FeedParse("missing time_last_update_unix".into()))?;
    let rates_obj = value
        .get("rates")
        .and_then(|v| v.as_object())
        .ok_or_else(|| RateError::FeedParse("missing rates object".into()))?;

    let mut rates = BTreeMap::new();
    for (code, rate) in rates_obj {
        let rate = rate
            .as_f64()
            .ok_or_else(|| RateError::FeedParse(format!("non-numeric rate for {code}")))?;
        rates.insert(code.to_lowercase(), rate);
    }
    if rates.is_empty() {
        return Err(RateError::FeedParse("empty rates object".into()));
    }

    Ok(RateSnapshot {
        base,
        rates,
        source_refreshed_at,
        cached_at: now_secs,
    })
}

/// Run the startup policy off the dispatcher stream and deliver the
/// snapshot over a channel. A failed obtain is logged inside the task;
/// the channel simply never yields and the dispatcher stays without
/// currency conversion until the next start.
pub fn spawn_refresh(cache: ExchangeRateCache, now_secs: i64) -> mpsc::Receiver<RateSnapshot> {
    let (tx, rx) = mpsc::channel(1);
    tokio::task::spawn_blocking(move || {
        match cache.obtain(now_secs) {
            Ok(snapshot) => {
                if tx.blocking_send(snapshot).is_err() {
                    tracing::debug!("rate snapshot receiver dropped");
                }
            }
            Err(e) => {
                // Non-fatal; no immediate retry.
                tracing::warn!(error = %e, "exchange rates unavailable");
            }
        }
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    struct FakeFetcher {
        response: Result<FetchResponse, &'static str>,
    }

    impl RateFetcher for FakeFetcher {
        fn fetch(&self, _url: &str) -> Result<FetchResponse, RateError> {
            match &self.response {
                Ok(r) => Ok(r.clone()),
                Err(msg) => Err(RateError::Fetch(msg.to_string())),
            }
        }
    }

    fn feed_body() -> String {
        format!(
            r#"{{"result":"success","base_code":"EUR","time_last_update_unix":{},"rates":{{"EUR":1.0,"USD":1.1,"GBP":0.85}}}}"#,
            NOW - 3600
        )
    }

    fn cache_with(
        dir: &tempfile::TempDir,
        response: Result<FetchResponse, &'static str>,
    ) -> ExchangeRateCache {
        ExchangeRateCache::new(
            dir.path().join("rates.json"),
            "http://rates.test/latest".into(),
            Duration::from_secs(4 * 3600),
            Arc::new(FakeFetcher { response }),
        )
    }

    fn ok_response() -> Result<FetchResponse, &'static str> {
        Ok(FetchResponse {
            status: 200,
            body: feed_body(),
        })
    }

    fn snapshot(cached_at: i64) -> RateSnapshot {
        RateSnapshot {
            base: "eur".into(),
            rates: BTreeMap::from([("eur".into(), 1.0), ("usd".into(), 1.1)]),
            source_refreshed_at: cached_at - 100,
            cached_at,
        }
    }

    // -- Snapshot round-trip --

    #[test]
    fn cache_file_round_trips_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_with(&dir, Err("unused"));
        let original = snapshot(NOW - 50);

        cache.write_local(&original).unwrap();
        let reread = cache.read_local().unwrap();
        assert_eq!(reread, original);
    }

    // -- Feed parsing --

    #[test]
    fn feed_parses_and_lowercases_codes() {
        let snap = parse_feed(&feed_body(), NOW).unwrap();
        assert_eq!(snap.base, "eur");
        assert_eq!(snap.rates["usd"], 1.1);
        assert_eq!(snap.source_refreshed_at, NOW - 3600);
        assert_eq!(snap.cached_at, NOW);
    }

    #[test]
    fn malformed_feed_rejected() {
        assert!(parse_feed("not json", NOW).is_err());
        assert!(parse_feed(r#"{"rates":{}}"#, NOW).is_err());
        assert!(parse_feed(r#"{"base_code":"EUR","time_last_update_unix":1}"#, NOW).is_err());
    }

    // -- Startup policy --

    #[test]
    fn fresh_cache_skips_fetch() {
        let dir = tempfile::tempdir().unwrap();
        // Fetch would fail if attempted.
        let cache = cache_with(&dir, Err("network down"));
        cache.write_local(&snapshot(NOW - 60)).unwrap();

        let snap = cache.obtain(NOW).unwrap();
        assert_eq!(snap.cached_at, NOW - 60);
    }

    #[test]
    fn stale_cache_triggers_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_with(&dir, ok_response());
        cache.write_local(&snapshot(NOW - 100_000)).unwrap();

        let snap = cache.obtain(NOW).unwrap();
        // Fresh fetch result, not the stale snapshot.
        assert_eq!(snap.cached_at, NOW);
        assert_eq!(snap.rates["gbp"], 0.85);
    }

    #[test]
    fn missing_cache_triggers_fetch_and_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_with(&dir, ok_response());

        let snap = cache.obtain(NOW).unwrap();
        assert_eq!(snap.rates["usd"], 1.1);
        // Cache file was written and round-trips.
        assert_eq!(cache.read_local().unwrap(), snap);
    }

    #[test]
    fn fetch_failure_falls_back_to_stale_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_with(&dir, Err("network down"));
        cache.write_local(&snapshot(NOW - 100_000)).unwrap();

        let snap = cache.obtain(NOW).unwrap();
        assert_eq!(snap.cached_at, NOW - 100_000);
    }

    #[test]
    fn fetch_failure_without_cache_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_with(&dir, Err("network down"));

        let err = cache.obtain(NOW).unwrap_err();
        assert!(matches!(err, RateError::Unavailable));
    }

    #[test]
    fn non_2xx_status_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_with(
            &dir,
            Ok(FetchResponse {
                status: 503,
                body: String::new(),
            }),
        );
        cache.write_local(&snapshot(NOW - 100_000)).unwrap();

        // Falls back to the stale cache.
        let snap = cache.obtain(NOW).unwrap();
        assert_eq!(snap.cached_at, NOW - 100_000);
    }

    #[test]
    fn corrupt_cache_is_treated_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_with(&dir, ok_response());
        std::fs::write(dir.path().join("rates.json"), "{ not json").unwrap();

        let snap = cache.obtain(NOW).unwrap();
        assert_eq!(snap.cached_at, NOW);
    }

    // -- Refresh task --

    #[tokio::test]
    async fn spawn_refresh_delivers_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_with(&dir, ok_response());

        let mut rx = spawn_refresh(cache, NOW);
        let snap = rx.recv().await.expect("snapshot delivered");
        assert_eq!(snap.base, "eur");
    }

    #[tokio::test]
    async fn spawn_refresh_failure_closes_channel() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_with(&dir, Err("network down"));

        let mut rx = spawn_refresh(cache, NOW);
        assert!(rx.recv().await.is_none());
    }
}
