//! Watcher daemon — clipboard polling, conversion dispatch, rate
//! refresh, shutdown.
//!
//! Architecture: single loop owning all mutable state. The clipboard
//! is polled on an interval; content changes feed the dispatcher. The
//! exchange-rate refresh runs on the blocking pool and delivers its
//! snapshot over a channel back into the same loop, so the alias-table
//! swap happens on the loop's thread with no locking.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::mpsc;

use crate::clipboard::{ClipboardError, ClipboardSource, SystemClipboard};
use crate::config::{AppConfig, ConfigError};
use crate::convert::currency::CurrencyConverter;
use crate::convert::measure::MeasureConverter;
use crate::convert::temperature::TemperatureConverter;
use crate::convert::timestamp::TimestampConverter;
use crate::convert::{ConversionOutcome, DomainConverter, EngineError, UnitEngine};
use crate::dispatch::sink::{StdoutSink, TracingSink};
use crate::dispatch::{ConversionDispatcher, Matcher};
use crate::rates::{
    ExchangeRateCache, HttpRateFetcher, RateError, RateSnapshot, spawn_refresh,
};

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Clipboard(#[from] ClipboardError),
    #[error(transparent)]
    Rate(#[from] RateError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run the watcher until SIGTERM or SIGINT.
pub async fn run(mut config: AppConfig, config_path: Option<PathBuf>) -> Result<(), WatchError> {
    let mut clipboard = SystemClipboard::new()?;
    let mut dispatcher = build_dispatcher(&config)?;
    dispatcher.register_sink(Box::new(TracingSink));
    dispatcher.register_sink(Box::new(StdoutSink::new()));

    // Rate startup policy: a fresh cache is adopted synchronously and
    // the network skipped; otherwise the fetch runs in the background
    // and the snapshot arrives over the channel.
    let mut rates_rx: Option<mpsc::Receiver<RateSnapshot>> = None;
    if config.converters.currency {
        let cache = rate_cache(&config)?;
        let now_secs = Utc::now().timestamp();
        match cache.read_local() {
            Ok(snapshot) if cache.is_fresh(&snapshot, now_secs) => {
                adopt(&mut dispatcher, &mut config, config_path.as_deref(), snapshot);
            }
            _ => rates_rx = Some(spawn_refresh(cache, now_secs)),
        }
    }

    let mut poll = tokio::time::interval(Duration::from_millis(config.poll_interval_ms.max(50)));
    let mut timeout_tick = tokio::time::interval(Duration::from_secs(1));
    let mut last_content: Option<Option<String>> = None;

    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?;

    tracing::info!(
        poll_ms = config.poll_interval_ms,
        clear_on_change = config.clear_on_change,
        clear_timeout_secs = config.clear_timeout_secs,
        "watcher started"
    );

    loop {
        tokio::select! {
            // -- Clipboard poll --
            _ = poll.tick() => {
                match clipboard.read_text() {
                    Ok(content) => {
                        let content = normalize_content(content);
                        // Only content changes reach the dispatcher.
                        if last_content.as_ref() != Some(&content) {
                            dispatcher.on_clipboard(content.as_deref(), Instant::now());
                            last_content = Some(content);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "clipboard read failed");
                    }
                }
            }

            // -- Clear-timeout check --
            _ = timeout_tick.tick() => {
                dispatcher.on_tick(Instant::now());
            }

            // -- Rate snapshot from the refresh task --
            result = recv_rates(&mut rates_rx) => {
                match result {
                    Some(snapshot) => {
                        adopt(&mut dispatcher, &mut config, config_path.as_deref(), snapshot);
                    }
                    // Fetch failed; the task already logged it.
                    None => rates_rx = None,
                }
            }

            // -- Shutdown signals --
            _ = sigterm.recv() => {
                tracing::info!("received SIGTERM, shutting down");
                break;
            }
            _ = sigint.recv() => {
                tracing::info!("received SIGINT, shutting down");
                break;
            }
        }
    }

    tracing::info!("watcher stopped");
    Ok(())
}

/// One-shot conversion for the `convert` subcommand. Rates are loaded
/// synchronously; a failed load just leaves currency unavailable.
pub fn convert_once(config: &AppConfig, text: &str) -> Result<Option<ConversionOutcome>, WatchError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    let mut matchers = build_matchers(config)?;

    if config.converters.currency {
        let cache = rate_cache(config)?;
        match cache.obtain(Utc::now().timestamp()) {
            Ok(snapshot) => {
                for matcher in &mut matchers {
                    if let Matcher::Units(engine) = matcher {
                        if let Err(e) = engine.adopt_rates(snapshot) {
                            tracing::warn!(error = %e, "could not adopt exchange rates");
                        }
                        break;
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "exchange rates unavailable");
            }
        }
    }

    Ok(matchers.iter().find_map(|m| m.try_match(text)))
}

/// Force-fetch fresh rates, bypassing the freshness window, and update
/// the cache file.
pub fn refresh_rates(config: &AppConfig) -> Result<RateSnapshot, WatchError> {
    let cache = rate_cache(config)?;
    Ok(cache.refresh(Utc::now().timestamp())?)
}

/// Matchers in priority order: a bare digit string is ambiguous, and
/// the timestamp reading wins over the unit grammar.
pub fn build_matchers(config: &AppConfig) -> Result<Vec<Matcher>, WatchError> {
    let mut matchers = Vec::new();

    if config.converters.timestamp {
        matchers.push(Matcher::Timestamp(TimestampConverter::new(
            config.timestamp_icon_formats.clone(),
            config.timestamp_menu_template.clone(),
        )));
    }

    let system = config.primary_system;
    let engine = UnitEngine::new(vec![
        DomainConverter::Measure(MeasureConverter::distance(system, config.converters.distance)),
        DomainConverter::Measure(MeasureConverter::weight(system, config.converters.weight)),
        DomainConverter::Measure(MeasureConverter::volume(system, config.converters.volume)),
        DomainConverter::Temperature(TemperatureConverter::new(
            system,
            config.converters.temperature,
        )),
        DomainConverter::Currency(CurrencyConverter::new(
            &config.primary_currency,
            config.converters.currency,
        )),
    ])?;
    matchers.push(Matcher::Units(engine));

    Ok(matchers)
}

fn build_dispatcher(config: &AppConfig) -> Result<ConversionDispatcher, WatchError> {
    Ok(ConversionDispatcher::new(
        build_matchers(config)?,
        config.clear_on_change,
        config.clear_timeout(),
    ))
}

fn rate_cache(config: &AppConfig) -> Result<ExchangeRateCache, WatchError> {
    let fetcher = HttpRateFetcher::new()?;
    Ok(ExchangeRateCache::new(
        config.rate_cache_path()?,
        config.rates.url.clone(),
        Duration::from_secs(config.rates.freshness_secs),
        Arc::new(fetcher),
    ))
}

/// Install a snapshot and persist the primary currency if the
/// configured one was missing from the rate set.
fn adopt(
    dispatcher: &mut ConversionDispatcher,
    config: &mut AppConfig,
    config_path: Option<&Path>,
    snapshot: RateSnapshot,
) {
    match dispatcher.adopt_rates(snapshot) {
        Ok(installed) => {
            if installed.fell_back {
                if let Err(e) =
                    config.persist_primary_currency(config_path, &installed.effective_primary)
                {
                    tracing::warn!(error = %e, "could not persist corrected primary currency");
                }
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "could not adopt exchange rates");
        }
    }
}

/// Strip surrounding whitespace before dispatch; the converters match
/// whole strings, so a copied line's trailing newline must not defeat
/// them. Whitespace-only content is the explicit no-content signal.
fn normalize_content(content: Option<String>) -> Option<String> {
    content.and_then(|text| {
        let trimmed = text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

/// Receive from the rate channel, or park forever once it is gone so
/// the select arm never fires again.
async fn recv_rates(rx: &mut Option<mpsc::Receiver<RateSnapshot>>) -> Option<RateSnapshot> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
