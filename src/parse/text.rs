//! Unit text grammar — splits clipboard text into number and unit
//! tokens and resolves the unit against the alias table.
//!
//! All whitespace anywhere in the input is removed before matching, so
//! copied text like `"5 . 5   k g"` parses the same as `"5.5kg"`. The
//! grammar accepts a unit token *either* before or after the number,
//! never both and never neither.

use regex::Regex;

use super::alias::{AliasTable, PositionGroup};
use super::number::parse_ambiguous;

/// Result of a successful parse: the numeric value plus the resolved
/// unit and its owning converter. Lives for one conversion attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCandidate {
    pub value: f64,
    pub unit_id: String,
    pub converter: &'static str,
}

/// Position-aware unit/number splitter.
pub struct UnitTextParser {
    grammar: Regex,
}

impl UnitTextParser {
    pub fn new() -> Self {
        // Prefix: letters and currency symbols. Suffix: letters,
        // currency symbols (`5.99€`), plus the symbols units are
        // written with — degree sign, prime and double-prime
        // (feet/inches), quotes, `/`, `*`, `.`, and the digit 3 for
        // cubic units. Applied after whitespace removal and
        // lowercasing.
        let grammar = Regex::new(
            r#"^(?P<prefix>[\p{L}€$£¥₹₽₩]+)?(?P<number>[+-]?[0-9.,]+)(?P<suffix>[\p{L}€$£¥₹₽₩°′″'"/*.3]+)?$"#,
        )
        .unwrap();
        Self { grammar }
    }

    /// Try to parse `text` (already trimmed by the caller) into a
    /// [`ParsedCandidate`].
    ///
    /// `None` is the expected common case — most clipboard content is
    /// not a measurement — and covers unknown aliases, unparseable
    /// numbers, and inputs with both or neither unit token.
    pub fn parse(&self, text: &str, table: &AliasTable) -> Option<ParsedCandidate> {
        let compact: String = text
            .chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect();
        if compact.is_empty() {
            return None;
        }

        let caps = self.grammar.captures(&compact)?;
        let number = caps.name("number")?.as_str();
        // The number class admits bare separators; require a digit.
        if !number.contains(|c: char| c.is_ascii_digit()) {
            return None;
        }

        let (group, unit_token) = match (caps.name("prefix"), caps.name("suffix")) {
            (Some(p), None) => (PositionGroup::Prefix, p.as_str()),
            (None, Some(s)) => (PositionGroup::Suffix, s.as_str()),
            // Both or neither present: not unit text.
            _ => return None,
        };

        let target = table.resolve(group, unit_token)?;
        let value = parse_ambiguous(number)?;

        Some(ParsedCandidate {
            value,
            unit_id: target.unit_id.clone(),
            converter: target.converter,
        })
    }
}

impl Default for UnitTextParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::alias::UnitDefinition;

    fn table() -> AliasTable {
        AliasTable::build(&[
            (
                "weight",
                vec![UnitDefinition::new("kg", &[], &["kilogram", "kilograms"])],
            ),
            (
                "distance",
                vec![
                    UnitDefinition::new("in", &[], &["inch", "inches", "″", "\""]),
                    UnitDefinition::new("m", &[], &["meter", "meters"]),
                ],
            ),
            (
                "currency",
                vec![
                    UnitDefinition::new("usd", &["$"], &["dollar", "dollars"]),
                    UnitDefinition::new("eur", &["€"], &["€", "euro"]),
                ],
            ),
        ])
        .unwrap()
    }

    fn parse(text: &str) -> Option<ParsedCandidate> {
        UnitTextParser::new().parse(text, &table())
    }

    // -- Suffix units --

    #[test]
    fn number_then_unit() {
        let c = parse("5.5kg").unwrap();
        assert_eq!(c.value, 5.5);
        assert_eq!(c.unit_id, "kg");
        assert_eq!(c.converter, "weight");
    }

    #[test]
    fn internal_whitespace_is_ignored() {
        let c = parse("5 . 5   k g").unwrap();
        assert_eq!(c.value, 5.5);
        assert_eq!(c.unit_id, "kg");
    }

    #[test]
    fn long_alias_resolves() {
        let c = parse("12 kilograms").unwrap();
        assert_eq!(c.value, 12.0);
        assert_eq!(c.unit_id, "kg");
    }

    #[test]
    fn symbol_suffix_resolves() {
        let c = parse("0.3″").unwrap();
        assert_eq!(c.unit_id, "in");
        let c = parse("0.3\"").unwrap();
        assert_eq!(c.unit_id, "in");
    }

    // -- Prefix units --

    #[test]
    fn unit_then_number() {
        let c = parse("$5.99").unwrap();
        assert_eq!(c.value, 5.99);
        assert_eq!(c.unit_id, "usd");
        assert_eq!(c.converter, "currency");
    }

    #[test]
    fn prefix_alias_not_valid_as_suffix() {
        assert!(parse("5.99$").is_none());
    }

    #[test]
    fn currency_symbol_registered_as_suffix_resolves() {
        let c = parse("5.99€").unwrap();
        assert_eq!(c.value, 5.99);
        assert_eq!(c.unit_id, "eur");
    }

    // -- Grammar rejections --

    #[test]
    fn both_prefix_and_suffix_rejected() {
        assert!(parse("$5kg").is_none());
    }

    #[test]
    fn bare_number_rejected() {
        assert!(parse("42").is_none());
        assert!(parse("5.5").is_none());
    }

    #[test]
    fn bare_unit_rejected() {
        assert!(parse("kg").is_none());
    }

    #[test]
    fn unknown_alias_rejected() {
        assert!(parse("5 parsecs").is_none());
    }

    #[test]
    fn ordinary_prose_rejected() {
        assert!(parse("hello world").is_none());
        assert!(parse("call me at 5").is_none());
        assert!(parse("").is_none());
    }

    #[test]
    fn unparseable_number_rejected() {
        assert!(parse("1,234.567,890 kg").is_none());
    }

    // -- Separator handling flows through --

    #[test]
    fn thousands_number_with_unit() {
        let c = parse("1.234 m").unwrap();
        assert_eq!(c.value, 1234.0);
    }

    #[test]
    fn negative_value_with_unit() {
        let c = parse("-12,5 kg").unwrap();
        assert_eq!(c.value, -12.5);
    }

    #[test]
    fn uppercase_input_normalized() {
        let c = parse("5 KG").unwrap();
        assert_eq!(c.unit_id, "kg");
    }
}
