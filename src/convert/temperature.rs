//! Temperature conversion — Celsius/Fahrenheit.
//!
//! A two-unit specialization of the measure family: direct affine
//! formulas instead of a magnitude ladder, whole-number rounding, and
//! its own plausibility bound.

use crate::parse::alias::UnitDefinition;

use super::Conversion;
use super::measure::System;

/// Nothing is colder than absolute zero; values far above any weather
/// or cooking reading are treated as prose numbers.
const MIN_CELSIUS: f64 = -273.15;
const MAX_CELSIUS: f64 = 10_000.0;

#[derive(Debug, Clone)]
pub struct TemperatureConverter {
    primary: System,
    enabled: bool,
}

impl TemperatureConverter {
    pub fn new(primary: System, enabled: bool) -> Self {
        Self { primary, enabled }
    }

    pub fn name(&self) -> &'static str {
        "temperature"
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn definitions(&self) -> Vec<UnitDefinition> {
        vec![
            UnitDefinition::new("c", &[], &["°c", "celsius"]),
            UnitDefinition::new("f", &[], &["°f", "fahrenheit"]),
        ]
    }

    /// Convert between the two scales, declining same-system input.
    pub fn convert(&self, value: f64, unit_id: &str) -> Option<Conversion> {
        let (celsius, fahrenheit, to_celsius) = match unit_id {
            // Metric primary converts incoming Fahrenheit.
            "f" if self.primary == System::Metric => {
                let c = (value - 32.0) / 1.8;
                (c, value, true)
            }
            // Imperial primary converts incoming Celsius.
            "c" if self.primary == System::Imperial => {
                let f = value * 1.8 + 32.0;
                (value, f, false)
            }
            _ => return None,
        };

        if celsius < MIN_CELSIUS || celsius > MAX_CELSIUS {
            return None;
        }

        let (original, converted) = if to_celsius {
            (format_degrees(fahrenheit, "F"), format_degrees(celsius, "C"))
        } else {
            (format_degrees(celsius, "C"), format_degrees(fahrenheit, "F"))
        };
        Some(Conversion {
            original,
            converted,
        })
    }
}

/// Whole-number rounding; temperatures never show decimals.
fn format_degrees(value: f64, scale: &str) -> String {
    format!("{:.0}°{scale}", value)
}
