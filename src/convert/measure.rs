//! Metric/imperial conversion family — distance, weight, volume.
//!
//! One shared algorithm parameterized by a unit table. Each unit
//! carries a factor to the family's base unit, a convert-to-this flag,
//! and a ceiling: if the converted magnitude would meet or exceed the
//! ceiling in a candidate unit, the scan moves on to the next larger
//! unit. Tables are ordered by increasing magnitude within each
//! system, so the first unit that survives the ceiling check is the
//! most natural display unit.

use serde::{Deserialize, Serialize};

use crate::parse::alias::UnitDefinition;

use super::{Conversion, format_rounded};

/// Measurement system a unit belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum System {
    Metric,
    Imperial,
}

/// One unit in a measure table. Immutable after construction.
#[derive(Debug, Clone)]
pub struct MeasureUnit {
    pub id: &'static str,
    /// Display template; `{}` is replaced by the formatted number.
    pub display: &'static str,
    pub system: System,
    /// Multiplier to the family base unit (meter, kilogram, liter).
    pub factor: f64,
    /// Whether this unit may be chosen as a conversion target.
    pub convertible: bool,
    /// Skip this unit when the converted magnitude reaches this value.
    pub ceiling: f64,
    /// Aliases accepted after the number (canonical id is implicit).
    pub aliases: &'static [&'static str],
}

/// A distance/weight/volume converter instance.
#[derive(Debug, Clone)]
pub struct MeasureConverter {
    name: &'static str,
    units: Vec<MeasureUnit>,
    /// Plausible base-unit magnitude range; values outside are
    /// declined so prose numbers don't misfire.
    min_base: f64,
    max_base: f64,
    primary: System,
    enabled: bool,
}

impl MeasureConverter {
    /// Distance table. Base unit: meter.
    pub fn distance(primary: System, enabled: bool) -> Self {
        Self {
            name: "distance",
            units: vec![
                MeasureUnit {
                    id: "mm",
                    display: "{} mm",
                    system: System::Metric,
                    factor: 0.001,
                    convertible: true,
                    ceiling: 10.0,
                    aliases: &["millimeter", "millimeters", "millimetre", "millimetres"],
                },
                MeasureUnit {
                    id: "cm",
                    display: "{} cm",
                    system: System::Metric,
                    factor: 0.01,
                    convertible: true,
                    ceiling: 100.0,
                    aliases: &["centimeter", "centimeters", "centimetre", "centimetres"],
                },
                MeasureUnit {
                    id: "m",
                    display: "{} m",
                    system: System::Metric,
                    factor: 1.0,
                    convertible: true,
                    ceiling: 1000.0,
                    aliases: &["meter", "meters", "metre", "metres"],
                },
                MeasureUnit {
                    id: "km",
                    display: "{} km",
                    system: System::Metric,
                    factor: 1000.0,
                    convertible: true,
                    ceiling: f64::INFINITY,
                    aliases: &["kilometer", "kilometers", "kilometre", "kilometres"],
                },
                MeasureUnit {
                    id: "in",
                    display: "{} in",
                    system: System::Imperial,
                    factor: 0.0254,
                    convertible: true,
                    ceiling: 12.0,
                    aliases: &["inch", "inches", "″", "\""],
                },
                MeasureUnit {
                    id: "ft",
                    display: "{} ft",
                    system: System::Imperial,
                    factor: 0.3048,
                    convertible: true,
                    ceiling: 1000.0,
                    aliases: &["foot", "feet", "′", "'"],
                },
                MeasureUnit {
                    id: "yd",
                    display: "{} yd",
                    system: System::Imperial,
                    factor: 0.9144,
                    // Recognized on input, never chosen as a target.
                    convertible: false,
                    ceiling: 1760.0,
                    aliases: &["yard", "yards"],
                },
                MeasureUnit {
                    id: "mi",
                    display: "{} mi",
                    system: System::Imperial,
                    factor: 1609.344,
                    convertible: true,
                    ceiling: f64::INFINITY,
                    aliases: &["mile", "miles"],
                },
            ],
            min_base: 0.001,
            max_base: 1.0e7,
            primary,
            enabled,
        }
    }

    /// Weight table. Base unit: kilogram.
    pub fn weight(primary: System, enabled: bool) -> Self {
        Self {
            name: "weight",
            units: vec![
                MeasureUnit {
                    id: "mg",
                    display: "{} mg",
                    system: System::Metric,
                    factor: 1.0e-6,
                    convertible: true,
                    ceiling: 1000.0,
                    aliases: &["milligram", "milligrams"],
                },
                MeasureUnit {
                    id: "g",
                    display: "{} g",
                    system: System::Metric,
                    factor: 0.001,
                    convertible: true,
                    ceiling: 1000.0,
                    aliases: &["gram", "grams"],
                },
                MeasureUnit {
                    id: "kg",
                    display: "{} kg",
                    system: System::Metric,
                    factor: 1.0,
                    convertible: true,
                    ceiling: 1000.0,
                    aliases: &["kilogram", "kilograms", "kilo", "kilos"],
                },
                MeasureUnit {
                    id: "t",
                    display: "{} t",
                    system: System::Metric,
                    factor: 1000.0,
                    convertible: true,
                    ceiling: f64::INFINITY,
                    aliases: &["tonne", "tonnes"],
                },
                MeasureUnit {
                    id: "oz",
                    display: "{} oz",
                    system: System::Imperial,
                    factor: 0.028_349_523_125,
                    convertible: true,
                    ceiling: 16.0,
                    aliases: &["ounce", "ounces"],
                },
                MeasureUnit {
                    id: "lb",
                    display: "{} lb",
                    system: System::Imperial,
                    factor: 0.453_592_37,
                    convertible: true,
                    ceiling: f64::INFINITY,
                    aliases: &["lbs", "pound", "pounds"],
                },
            ],
            min_base: 1.0e-6,
            max_base: 1.0e6,
            primary,
            enabled,
        }
    }

    /// Volume table. Base unit: liter.
    pub fn volume(primary: System, enabled: bool) -> Self {
        Self {
            name: "volume",
            units: vec![
                MeasureUnit {
                    id: "ml",
                    display: "{} ml",
                    system: System::Metric,
                    factor: 0.001,
                    convertible: true,
                    ceiling: 1000.0,
                    aliases: &["milliliter", "milliliters", "millilitre", "millilitres"],
                },
                MeasureUnit {
                    id: "l",
                    display: "{} l",
                    system: System::Metric,
                    factor: 1.0,
                    convertible: true,
                    ceiling: f64::INFINITY,
                    aliases: &["liter", "liters", "litre", "litres"],
                },
                MeasureUnit {
                    id: "floz",
                    display: "{} fl oz",
                    system: System::Imperial,
                    factor: 0.029_573_529_562_5,
                    convertible: true,
                    ceiling: 8.0,
                    aliases: &["fl oz", "fl.oz", "fl.oz.", "fluid ounce", "fluid ounces"],
                },
                MeasureUnit {
                    id: "cup",
                    display: "{} cups",
                    system: System::Imperial,
                    factor: 0.236_588_236_5,
                    convertible: false,
                    ceiling: 4.0,
                    aliases: &["cups"],
                },
                MeasureUnit {
                    id: "pt",
                    display: "{} pt",
                    system: System::Imperial,
                    factor: 0.473_176_473,
                    convertible: true,
                    ceiling: 2.0,
                    aliases: &["pint", "pints"],
                },
                MeasureUnit {
                    id: "qt",
                    display: "{} qt",
                    system: System::Imperial,
                    factor: 0.946_352_946,
                    convertible: false,
                    ceiling: 4.0,
                    aliases: &["quart", "quarts"],
                },
                MeasureUnit {
                    id: "gal",
                    display: "{} gal",
                    system: System::Imperial,
                    factor: 3.785_411_784,
                    convertible: true,
                    ceiling: f64::INFINITY,
                    aliases: &["gallon", "gallons"],
                },
            ],
            min_base: 0.001,
            max_base: 1.0e5,
            primary,
            enabled,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn definitions(&self) -> Vec<UnitDefinition> {
        self.units
            .iter()
            .map(|u| UnitDefinition::new(u.id, &[], u.aliases))
            .collect()
    }

    /// Convert `value` of `unit_id` into the primary system.
    ///
    /// Declines when the input unit is already in the primary system,
    /// the unit is unknown, or the base magnitude is implausible.
    pub fn convert(&self, value: f64, unit_id: &str) -> Option<Conversion> {
        let input = self.units.iter().find(|u| u.id == unit_id)?;
        if input.system == self.primary {
            return None;
        }

        let base = value * input.factor;
        if base.abs() < self.min_base || base.abs() > self.max_base {
            return None;
        }

        let target = self.pick_target(base)?;
        let converted = base / target.factor;

        Some(Conversion {
            original: input.display.replace("{}", &format_rounded(value)),
            converted: target.display.replace("{}", &format_rounded(converted)),
        })
    }

    /// Scan the primary system's units in increasing magnitude order;
    /// the first convertible unit whose ceiling is not reached wins.
    /// Falls back to the largest convertible unit (its ceiling is
    /// infinite by table construction).
    fn pick_target(&self, base: f64) -> Option<&MeasureUnit> {
        let mut fallback = None;
        for unit in self
            .units
            .iter()
            .filter(|u| u.system == self.primary && u.convertible)
        {
            if (base / unit.factor).abs() < unit.ceiling {
                return Some(unit);
            }
            fallback = Some(unit);
        }
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric_distance() -> MeasureConverter {
        MeasureConverter::distance(System::Metric, true)
    }

    // -- Ceiling ladder --

    #[test]
    fn small_inches_land_in_millimeters() {
        let c = metric_distance().convert(0.3, "in").unwrap();
        assert_eq!(c.original, "0.3 in");
        assert_eq!(c.converted, "7.6 mm");
    }

    #[test]
    fn ceiling_skip_keeps_meters_below_one_kilometer() {
        // 3277.56 ft = 999.0 m — meters, not 1 km.
        let c = metric_distance().convert(3277.56, "ft").unwrap();
        assert_eq!(c.converted, "999 m");
    }

    #[test]
    fn large_values_fall_through_to_kilometers() {
        let c = metric_distance().convert(10.0, "mi").unwrap();
        assert_eq!(c.converted, "16.1 km");
    }

    #[test]
    fn imperial_primary_uses_imperial_ladder() {
        let conv = MeasureConverter::distance(System::Imperial, true);
        let c = conv.convert(100.0, "km").unwrap();
        assert_eq!(c.original, "100 km");
        assert_eq!(c.converted, "62.1 mi");
    }

    #[test]
    fn non_convertible_units_are_skipped_as_targets() {
        let conv = MeasureConverter::distance(System::Imperial, true);
        // 2 m = 2.19 yd, but yards are not a target; 6.6 ft instead.
        let c = conv.convert(2.0, "m").unwrap();
        assert_eq!(c.converted, "6.6 ft");
    }

    #[test]
    fn non_convertible_units_still_accepted_as_input() {
        let c = metric_distance().convert(100.0, "yd").unwrap();
        assert_eq!(c.converted, "91.4 m");
    }

    // -- Self-conversion and plausibility --

    #[test]
    fn primary_system_input_declined() {
        assert!(metric_distance().convert(5.0, "m").is_none());
        assert!(metric_distance().convert(5.0, "km").is_none());
    }

    #[test]
    fn implausibly_small_declined() {
        // 0.001 in = 0.0000254 m, below the 1 mm floor.
        assert!(metric_distance().convert(0.001, "in").is_none());
    }

    #[test]
    fn implausibly_large_declined() {
        assert!(metric_distance().convert(1.0e7, "mi").is_none());
    }

    #[test]
    fn unknown_unit_declined() {
        assert!(metric_distance().convert(5.0, "furlong").is_none());
    }

    // -- Other families --

    #[test]
    fn pounds_to_kilograms() {
        let conv = MeasureConverter::weight(System::Metric, true);
        let c = conv.convert(5.0, "lb").unwrap();
        assert_eq!(c.original, "5 lb");
        assert_eq!(c.converted, "2.3 kg");
    }

    #[test]
    fn grams_to_ounces() {
        let conv = MeasureConverter::weight(System::Imperial, true);
        let c = conv.convert(100.0, "g").unwrap();
        assert_eq!(c.converted, "3.5 oz");
    }

    #[test]
    fn gallons_to_liters() {
        let conv = MeasureConverter::volume(System::Metric, true);
        let c = conv.convert(2.0, "gal").unwrap();
        assert_eq!(c.converted, "7.6 l");
    }

    #[test]
    fn liters_to_gallons_skipping_small_units() {
        let conv = MeasureConverter::volume(System::Imperial, true);
        let c = conv.convert(10.0, "l").unwrap();
        assert_eq!(c.converted, "2.6 gal");
    }

    // -- Definitions --

    #[test]
    fn definitions_cover_every_unit() {
        let defs = metric_distance().definitions();
        assert_eq!(defs.len(), 8);
        assert!(defs.iter().any(|d| d.unit_id == "mm"));
        assert!(defs.iter().all(|d| d.prefix_aliases.is_empty()));
    }
}
