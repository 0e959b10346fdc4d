//! Conversion domains and the unit engine.
//!
//! Each domain converter is one variant of the closed [`DomainConverter`]
//! set; all share the same capability surface (name, enabled flag,
//! unit definitions, convert). The [`UnitEngine`] owns the alias table
//! built from the enabled converters and routes parsed candidates to
//! the owning domain.

pub mod currency;
pub mod measure;
pub mod temperature;
pub mod timestamp;

use crate::parse::alias::{AliasError, AliasTable, UnitDefinition};
use crate::parse::text::UnitTextParser;
use crate::rates::RateSnapshot;

use currency::{CurrencyConverter, CurrencyError, InstalledRates};
use measure::MeasureConverter;
use temperature::TemperatureConverter;

/// A successful domain conversion: original and converted values,
/// independently formatted and unit-suffixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    pub original: String,
    pub converted: String,
}

/// What the display sink receives on success. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionOutcome {
    /// Short text for the status icon.
    pub icon_text: String,
    pub original: String,
    pub converted: String,
    /// Name of the converter that produced the result.
    pub converter: &'static str,
}

/// Startup-time engine construction errors. Fatal: continuing with a
/// broken alias table would silently misroute conversions.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Alias(#[from] AliasError),
    #[error(transparent)]
    Currency(#[from] CurrencyError),
}

/// Closed set of alias-table-backed conversion domains.
#[derive(Debug, Clone)]
pub enum DomainConverter {
    Measure(MeasureConverter),
    Temperature(TemperatureConverter),
    Currency(CurrencyConverter),
}

impl DomainConverter {
    pub fn name(&self) -> &'static str {
        match self {
            DomainConverter::Measure(c) => c.name(),
            DomainConverter::Temperature(c) => c.name(),
            DomainConverter::Currency(c) => c.name(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        match self {
            DomainConverter::Measure(c) => c.is_enabled(),
            DomainConverter::Temperature(c) => c.is_enabled(),
            DomainConverter::Currency(c) => c.is_enabled(),
        }
    }

    /// Whether the unit set is unknown until an asynchronous load
    /// completes. Delayed converters contribute no aliases at build.
    pub fn delayed(&self) -> bool {
        match self {
            DomainConverter::Currency(c) => !c.is_ready(),
            _ => false,
        }
    }

    pub fn definitions(&self) -> Result<Vec<UnitDefinition>, CurrencyError> {
        match self {
            DomainConverter::Measure(c) => Ok(c.definitions()),
            DomainConverter::Temperature(c) => Ok(c.definitions()),
            DomainConverter::Currency(c) => c.definitions(),
        }
    }

    pub fn convert(&self, value: f64, unit_id: &str) -> Option<Conversion> {
        match self {
            DomainConverter::Measure(c) => c.convert(value, unit_id),
            DomainConverter::Temperature(c) => c.convert(value, unit_id),
            DomainConverter::Currency(c) => c.convert(value, unit_id),
        }
    }
}

/// Text parser + alias table + domain converters.
///
/// The table is rebuilt off to the side and published with a single
/// assignment whenever the delayed currency units arrive, so a lookup
/// never observes a partially rebuilt table.
pub struct UnitEngine {
    parser: UnitTextParser,
    table: AliasTable,
    converters: Vec<DomainConverter>,
}

impl UnitEngine {
    /// Build the engine from enabled converters. Disabled converters
    /// are dropped; delayed ones are kept but contribute no aliases
    /// yet. Alias collisions abort construction.
    pub fn new(converters: Vec<DomainConverter>) -> Result<Self, EngineError> {
        let converters: Vec<DomainConverter> =
            converters.into_iter().filter(|c| c.is_enabled()).collect();

        let mut sets = Vec::new();
        for conv in converters.iter().filter(|c| !c.delayed()) {
            sets.push((conv.name(), conv.definitions()?));
        }
        let table = AliasTable::build(&sets)?;

        Ok(Self {
            parser: UnitTextParser::new(),
            table,
            converters,
        })
    }

    /// Try to convert clipboard text. `None` for anything that is not
    /// recognizable unit text — the expected common case.
    pub fn try_match(&self, text: &str) -> Option<ConversionOutcome> {
        let candidate = self.parser.parse(text, &self.table)?;
        let converter = self
            .converters
            .iter()
            .find(|c| c.name() == candidate.converter)?;
        let conversion = converter.convert(candidate.value, &candidate.unit_id)?;
        Some(ConversionOutcome {
            icon_text: conversion.converted.clone(),
            original: conversion.original,
            converted: conversion.converted,
            converter: converter.name(),
        })
    }

    /// Install a rate snapshot into the currency converter and adopt
    /// its units into a fresh alias table.
    ///
    /// On an adoption collision the previous table stays in effect and
    /// the error is returned for logging; the engine keeps working
    /// without currency units.
    pub fn adopt_rates(&mut self, snapshot: RateSnapshot) -> Result<InstalledRates, EngineError> {
        let currency = self
            .converters
            .iter_mut()
            .find_map(|c| match c {
                DomainConverter::Currency(c) => Some(c),
                _ => None,
            })
            .ok_or(CurrencyError::NotReady)?;

        let installed = currency.install(snapshot);
        let defs = currency.definitions()?;
        // Build aside, publish with one assignment.
        self.table = self.table.adopt("currency", &defs)?;
        tracing::info!(
            currencies = defs.len(),
            primary = %installed.effective_primary,
            "adopted currency units into alias table"
        );
        Ok(installed)
    }
}

/// Round to one decimal and drop a trailing `.0`.
pub(crate) fn format_rounded(value: f64) -> String {
    let rounded = (value * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{rounded:.0}")
    } else {
        format!("{rounded:.1}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use measure::System;

    fn engine_with_currency() -> UnitEngine {
        UnitEngine::new(vec![
            DomainConverter::Measure(MeasureConverter::distance(System::Metric, true)),
            DomainConverter::Measure(MeasureConverter::weight(System::Metric, true)),
            DomainConverter::Temperature(TemperatureConverter::new(System::Metric, true)),
            DomainConverter::Currency(CurrencyConverter::new("eur", true)),
        ])
        .unwrap()
    }

    fn snapshot() -> RateSnapshot {
        RateSnapshot {
            base: "eur".into(),
            rates: [("eur".into(), 1.0), ("usd".into(), 1.1)].into(),
            source_refreshed_at: 1_700_000_000,
            cached_at: 1_700_000_100,
        }
    }

    // -- Formatting --

    #[test]
    fn format_rounded_trims_whole_numbers() {
        assert_eq!(format_rounded(999.0001), "999");
        assert_eq!(format_rounded(7.62), "7.6");
        assert_eq!(format_rounded(-3.25), "-3.3");
        assert_eq!(format_rounded(0.0), "0");
    }

    // -- Engine construction --

    #[test]
    fn disabled_converters_are_dropped() {
        let engine = UnitEngine::new(vec![
            DomainConverter::Measure(MeasureConverter::distance(System::Metric, false)),
            DomainConverter::Measure(MeasureConverter::weight(System::Metric, true)),
        ])
        .unwrap();
        assert!(engine.try_match("5 lb").is_some());
        assert!(engine.try_match("5 ft").is_none());
    }

    #[test]
    fn delayed_currency_contributes_no_aliases_at_build() {
        let engine = engine_with_currency();
        assert!(engine.try_match("$5").is_none());
        assert!(engine.try_match("10 usd").is_none());
    }

    // -- Matching --

    #[test]
    fn routes_to_the_owning_converter() {
        let engine = engine_with_currency();
        let out = engine.try_match("0.3 in").unwrap();
        assert_eq!(out.converter, "distance");
        assert_eq!(out.original, "0.3 in");
        assert_eq!(out.converted, "7.6 mm");
        assert_eq!(out.icon_text, "7.6 mm");

        let out = engine.try_match("72 °F").unwrap();
        assert_eq!(out.converter, "temperature");
        assert_eq!(out.converted, "22°C");
    }

    #[test]
    fn prose_is_quietly_declined() {
        let engine = engine_with_currency();
        assert!(engine.try_match("meeting at noon").is_none());
        assert!(engine.try_match("42").is_none());
    }

    // -- Rate adoption --

    #[test]
    fn adopt_rates_enables_currency_matching() {
        let mut engine = engine_with_currency();
        let installed = engine.adopt_rates(snapshot()).unwrap();
        assert!(!installed.fell_back);

        let out = engine.try_match("10 usd").unwrap();
        assert_eq!(out.converter, "currency");
        assert_eq!(out.converted, "9.1 eur");

        let out = engine.try_match("$10").unwrap();
        assert_eq!(out.converted, "9.1 eur");

        // Symbol after the number resolves through the suffix group.
        let out = engine.try_match("10$").unwrap();
        assert_eq!(out.converted, "9.1 eur");
    }

    #[test]
    fn adopt_rates_twice_replaces_units() {
        let mut engine = engine_with_currency();
        engine.adopt_rates(snapshot()).unwrap();

        let mut second = snapshot();
        second.rates.remove("usd");
        second.rates.insert("gbp".into(), 0.85);
        engine.adopt_rates(second).unwrap();

        assert!(engine.try_match("10 usd").is_none());
        assert!(engine.try_match("10 gbp").is_some());
    }

    #[test]
    fn adopt_rates_without_currency_converter_errors() {
        let mut engine = UnitEngine::new(vec![DomainConverter::Measure(
            MeasureConverter::distance(System::Metric, true),
        )])
        .unwrap();
        assert!(engine.adopt_rates(snapshot()).is_err());
    }
}
