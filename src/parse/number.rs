//! Separator-ambiguous number parsing.
//!
//! Clipboard numbers arrive with `.` and `,` used interchangeably as
//! thousands or decimal separators depending on the writer's locale.
//! [`parse_ambiguous`] resolves the ambiguity with a fixed rule
//! precedence; the first rule that matches wins.
//!
//! The inherently ambiguous case — a single separator followed by
//! exactly three digits (`"100.000"`) — resolves as a thousands
//! separator. Downstream formatting relies on this exact policy, so it
//! must not be "corrected" to a decimal reading.

use std::sync::OnceLock;

use regex::Regex;

struct NumberPatterns {
    /// 1–3 digits, `.`, exactly 3 digits, nothing else: `.` is thousands.
    thousands_dot: Regex,
    /// Mirror of `thousands_dot` with `,`.
    thousands_comma: Regex,
    /// `,`-thousands grouping with optional `.`-decimal tail, or a
    /// plain separator-free number.
    comma_grouped: Regex,
    /// `.`-thousands grouping with optional `,`-decimal tail, or a
    /// plain separator-free number.
    dot_grouped: Regex,
}

fn patterns() -> &'static NumberPatterns {
    static PATTERNS: OnceLock<NumberPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| NumberPatterns {
        thousands_dot: Regex::new(r"^\d{1,3}\.\d{3}$").unwrap(),
        thousands_comma: Regex::new(r"^\d{1,3},\d{3}$").unwrap(),
        comma_grouped: Regex::new(r"^(?:\d+|\d{1,3}(?:,\d{3})+)(?:\.\d+)?$").unwrap(),
        dot_grouped: Regex::new(r"^(?:\d+|\d{1,3}(?:\.\d{3})+)(?:,\d+)?$").unwrap(),
    })
}

/// Parse a numeric-looking token into a value, resolving separator
/// ambiguity.
///
/// Returns `None` when the token fits none of the recognized separator
/// conventions (e.g. `"1,234.567,890"`). A leading `+`/`-` sign is
/// preserved through every branch. No magnitude-based correction is
/// applied to the thousands reading.
pub fn parse_ambiguous(token: &str) -> Option<f64> {
    let (negative, unsigned) = split_sign(token)?;
    let digits = strip_leading_zeros(unsigned);
    if digits.is_empty() {
        return None;
    }

    let p = patterns();
    let magnitude = if p.thousands_dot.is_match(digits) || p.thousands_comma.is_match(digits) {
        // Single separator, exactly three trailing digits: thousands wins.
        let joined: String = digits.chars().filter(|c| c.is_ascii_digit()).collect();
        joined.parse::<f64>().ok()?
    } else if p.comma_grouped.is_match(digits) {
        let stripped: String = digits.chars().filter(|c| *c != ',').collect();
        stripped.parse::<f64>().ok()?
    } else if p.dot_grouped.is_match(digits) {
        let swapped: String = digits
            .chars()
            .filter(|c| *c != '.')
            .map(|c| if c == ',' { '.' } else { c })
            .collect();
        swapped.parse::<f64>().ok()?
    } else {
        return None;
    };

    Some(if negative { -magnitude } else { magnitude })
}

/// Split an optional leading sign off the token.
///
/// Returns `None` for an empty token or a bare sign.
fn split_sign(token: &str) -> Option<(bool, &str)> {
    let rest = token.strip_prefix(['+', '-']).unwrap_or(token);
    if rest.is_empty() {
        return None;
    }
    Some((token.starts_with('-'), rest))
}

/// Strip leading zeros while the remainder still starts with a digit.
///
/// `"007"` → `"7"`, `"000.5"` → `"0.5"`, a lone `"0"` is preserved.
fn strip_leading_zeros(token: &str) -> &str {
    let mut s = token;
    while let Some(rest) = s.strip_prefix('0') {
        if rest.starts_with(|c: char| c.is_ascii_digit()) {
            s = rest;
        } else {
            break;
        }
    }
    s
}
