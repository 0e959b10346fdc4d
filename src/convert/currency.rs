//! Currency conversion with delayed, rate-driven unit tables.
//!
//! The converter starts in `Loading` and contributes no aliases until
//! a [`RateSnapshot`] is installed; the unit engine then adopts its
//! units into a fresh alias table. Enumerating units before the rates
//! arrive is an error — the engine skips delayed converters at build
//! time instead.

use crate::parse::alias::UnitDefinition;
use crate::rates::RateSnapshot;

use super::{Conversion, format_rounded};

/// Fallback when the configured primary currency disappears from a
/// freshly loaded rate set.
pub const DEFAULT_PRIMARY: &str = "eur";

/// Prefix symbols and spelled-out suffix aliases for well-known codes.
/// Every other code is reachable by its ISO code alone.
const KNOWN_ALIASES: &[(&str, &[&str], &[&str])] = &[
    ("usd", &["$", "us$"], &["$", "dollar", "dollars"]),
    ("eur", &["€"], &["€", "euro", "euros"]),
    ("gbp", &["£"], &["£"]),
    ("jpy", &["¥"], &["¥", "yen"]),
    ("inr", &["₹"], &["₹"]),
    ("rub", &["₽"], &["₽"]),
    ("krw", &["₩"], &["₩"]),
];

#[derive(Debug, thiserror::Error)]
pub enum CurrencyError {
    #[error("currency rates are not loaded yet")]
    NotReady,
}

/// Outcome of installing a rate snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledRates {
    /// Primary currency actually in effect after the install.
    pub effective_primary: String,
    /// Whether the configured primary was missing from the rate set
    /// and the hardcoded default took over. The host persists the
    /// corrected choice so the primary never points at a ghost unit.
    pub fell_back: bool,
}

#[derive(Debug, Clone)]
enum State {
    Loading,
    Ready(RateSnapshot),
}

#[derive(Debug, Clone)]
pub struct CurrencyConverter {
    primary: String,
    enabled: bool,
    state: State,
}

impl CurrencyConverter {
    pub fn new(primary: &str, enabled: bool) -> Self {
        Self {
            primary: primary.to_lowercase(),
            enabled,
            state: State::Loading,
        }
    }

    pub fn name(&self) -> &'static str {
        "currency"
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, State::Ready(_))
    }

    pub fn primary(&self) -> &str {
        &self.primary
    }

    /// Install freshly loaded rates, replacing any previous set, and
    /// resolve the primary currency against them.
    pub fn install(&mut self, snapshot: RateSnapshot) -> InstalledRates {
        let fell_back = if snapshot.rates.contains_key(&self.primary) {
            false
        } else {
            // Configured primary vanished upstream. Fall back to the
            // default, or to the snapshot's own base as a last resort.
            let replacement = if snapshot.rates.contains_key(DEFAULT_PRIMARY) {
                DEFAULT_PRIMARY.to_string()
            } else {
                snapshot.base.clone()
            };
            tracing::warn!(
                configured = %self.primary,
                replacement = %replacement,
                "primary currency missing from rate set, falling back"
            );
            self.primary = replacement;
            true
        };
        self.state = State::Ready(snapshot);
        InstalledRates {
            effective_primary: self.primary.clone(),
            fell_back,
        }
    }

    /// Unit definitions for every currency in the installed rate set.
    ///
    /// Errors until rates are installed; the alias table must never
    /// see a half-initialized currency unit set.
    pub fn definitions(&self) -> Result<Vec<UnitDefinition>, CurrencyError> {
        let snapshot = self.rates()?;
        Ok(snapshot
            .rates
            .keys()
            .map(|code| {
                match KNOWN_ALIASES.iter().find(|(c, _, _)| c == code) {
                    Some((_, prefix, suffix)) => UnitDefinition::new(code.clone(), prefix, suffix),
                    None => UnitDefinition::new(code.clone(), &[], &[]),
                }
            })
            .collect())
    }

    /// Convert `amount` of `unit_id` into the primary currency:
    /// `(amount / rate_from) × rate_to`, rates relative to the
    /// snapshot's reference currency.
    pub fn convert(&self, amount: f64, unit_id: &str) -> Option<Conversion> {
        let snapshot = match self.rates() {
            Ok(s) => s,
            Err(e) => {
                // Unreachable through the alias table (no aliases are
                // registered before install), but guarded anyway.
                tracing::debug!(error = %e, "currency convert before rates loaded");
                return None;
            }
        };

        if unit_id == self.primary {
            return None;
        }
        let rate_from = *snapshot.rates.get(unit_id)?;
        let rate_to = *snapshot.rates.get(&self.primary)?;
        if rate_from <= 0.0 {
            return None;
        }

        let converted = (amount / rate_from) * rate_to;
        Some(Conversion {
            original: format!("{} {}", format_rounded(amount), unit_id),
            converted: format!("{} {}", format_rounded(converted), self.primary),
        })
    }

    fn rates(&self) -> Result<&RateSnapshot, CurrencyError> {
        match &self.state {
            State::Ready(snapshot) => Ok(snapshot),
            State::Loading => Err(CurrencyError::NotReady),
        }
    }
}
