//! Unix timestamp conversion — digit-string matching, millisecond
//! disambiguation, and relative/calendar formatting.
//!
//! Unlike the unit grammar, the whole trimmed clipboard text must be
//! 1–14 decimal digits. 12–14 digits are read as seconds plus a
//! 3-digit millisecond tail; anything shorter is plain seconds. A
//! fixed plausibility range (roughly 1973–2286) keeps phone numbers
//! and database IDs from misfiring.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ConversionOutcome;

/// Plausible seconds range: ~1973-03-03 to ~2286-11-20.
const MIN_SECONDS: i64 = 100_000_000;
const MAX_SECONDS: i64 = 9_999_999_999;

/// Relative-time buckets: strict upper bound in seconds, divisor, and
/// unit label. Checked in order; the last entry catches everything.
const BUCKETS: &[(u64, u64, &str)] = &[
    (60, 1, "s"),
    (3_600, 60, "min"),
    (86_400, 3_600, "h"),
    (2_678_400, 86_400, "d"),
    (31_536_000, 2_629_800, "mo"),
    (u64::MAX, 31_557_600, "y"),
];

/// One entry of the icon-format selection table: the first rule whose
/// threshold the absolute time difference is strictly below wins. A
/// rule without a threshold is the default sentinel and always
/// matches; validation guarantees one terminates the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IconFormatRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub less_than_secs: Option<u64>,
    pub template: String,
}

/// Built-in icon table: bare relative phrase for fresh timestamps,
/// clock time within a day, date beyond.
pub fn default_icon_formats() -> Vec<IconFormatRule> {
    vec![
        IconFormatRule {
            less_than_secs: Some(60),
            template: "{rel}".into(),
        },
        IconFormatRule {
            less_than_secs: Some(86_400),
            template: "%H:%M".into(),
        },
        IconFormatRule {
            less_than_secs: None,
            template: "%Y-%m-%d".into(),
        },
    ]
}

pub fn default_menu_template() -> String {
    "%Y-%m-%d %H:%M:%S UTC ({rel})".into()
}

#[derive(Debug, Clone)]
pub struct TimestampConverter {
    icon_formats: Vec<IconFormatRule>,
    menu_template: String,
}

impl TimestampConverter {
    pub fn new(icon_formats: Vec<IconFormatRule>, menu_template: String) -> Self {
        Self {
            icon_formats,
            menu_template,
        }
    }

    pub fn name(&self) -> &'static str {
        "timestamp"
    }

    /// Match against the current wall clock.
    pub fn try_match(&self, text: &str) -> Option<ConversionOutcome> {
        self.match_at(text, Utc::now().timestamp())
    }

    /// Match with an injected "now" for deterministic formatting.
    pub fn match_at(&self, text: &str, now_secs: i64) -> Option<ConversionOutcome> {
        let (seconds, millis) = split_timestamp(text)?;
        let datetime = DateTime::<Utc>::from_timestamp(seconds, millis * 1_000_000)?;

        let diff = now_secs - seconds;
        let icon_text = self.icon_text(diff, &datetime);
        let converted = render_template(&self.menu_template, diff, &datetime);

        Some(ConversionOutcome {
            icon_text,
            original: text.to_string(),
            converted,
            converter: self.name(),
        })
    }

    /// Select and render the first icon-format rule whose threshold
    /// the difference is strictly below.
    fn icon_text(&self, diff_secs: i64, datetime: &DateTime<Utc>) -> String {
        let abs = diff_secs.unsigned_abs();
        let rule = self
            .icon_formats
            .iter()
            .find(|r| r.less_than_secs.is_none_or(|t| abs < t));
        match rule {
            Some(rule) => render_template(&rule.template, diff_secs, datetime),
            // Table without a default sentinel; validation prevents
            // this, but render something sensible anyway.
            None => render_template("%Y-%m-%d", diff_secs, datetime),
        }
    }
}

/// Split a digit string into `(seconds, milliseconds)`.
///
/// 12–14 digits: last 3 digits are milliseconds. 1–11 digits: plain
/// seconds. Rejects non-digits, lengths outside 1–14, and seconds
/// outside the plausibility range.
pub(crate) fn split_timestamp(text: &str) -> Option<(i64, u32)> {
    if text.is_empty() || text.len() > 14 || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let (seconds, millis) = if text.len() >= 12 {
        let (sec_part, ms_part) = text.split_at(text.len() - 3);
        (sec_part.parse::<i64>().ok()?, ms_part.parse::<u32>().ok()?)
    } else {
        (text.parse::<i64>().ok()?, 0)
    };

    if !(MIN_SECONDS..=MAX_SECONDS).contains(&seconds) {
        return None;
    }
    Some((seconds, millis))
}

/// Bucket an absolute difference into a relative value and unit.
fn relative_parts(abs_diff_secs: u64) -> (f64, &'static str) {
    for &(limit, divisor, unit) in BUCKETS {
        if abs_diff_secs < limit {
            return (abs_diff_secs as f64 / divisor as f64, unit);
        }
    }
    // Unreachable: the last bucket's limit is u64::MAX.
    let (_, divisor, unit) = BUCKETS[BUCKETS.len() - 1];
    (abs_diff_secs as f64 / divisor as f64, unit)
}

/// Wrap a formatted value in the past/future phrase.
fn phrase(value: String, unit: &str, past: bool) -> String {
    if past {
        format!("{value} {unit} ago")
    } else {
        format!("in {value} {unit}")
    }
}

/// Expand `{rel}` (integer) and `{rel1}` (one-decimal) relative
/// placeholders, then any chrono strftime specifiers, in one template.
fn render_template(template: &str, diff_secs: i64, datetime: &DateTime<Utc>) -> String {
    let past = diff_secs >= 0;
    let (value, unit) = relative_parts(diff_secs.unsigned_abs());

    let expanded = template
        .replace("{rel1}", &phrase(format!("{value:.1}"), unit, past))
        .replace("{rel}", &phrase(format!("{value:.0}"), unit, past));

    if !expanded.contains('%') {
        return expanded;
    }
    // An invalid strftime specifier would make chrono's formatter
    // error mid-write; check the items up front and fall back to the
    // unexpanded text instead.
    use chrono::format::{Item, StrftimeItems};
    let items: Vec<Item<'_>> = StrftimeItems::new(&expanded).collect();
    if items.iter().any(|i| matches!(i, Item::Error)) {
        tracing::warn!(template = %expanded, "invalid calendar placeholder in template");
        return expanded;
    }
    datetime.format_with_items(items.into_iter()).to_string()
}
