//! Conversion dispatch — ordered matcher list and clear-state machine.
//!
//! The dispatcher owns the only mutable engine-wide state: the
//! timestamp of the last successful conversion. Clipboard events and
//! periodic ticks arrive serialized on one stream, so no locking is
//! needed; the rate-refresh task communicates by sending a snapshot
//! to this stream's owner instead of touching shared structures.
//!
//! Matcher order defines priority and is stable: the timestamp
//! converter runs before the unit engine because a bare digit string
//! is ambiguous between both readings. The first success suppresses
//! every later matcher.

pub mod sink;

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::{Duration, Instant};

use crate::convert::currency::InstalledRates;
use crate::convert::timestamp::TimestampConverter;
use crate::convert::{ConversionOutcome, EngineError, UnitEngine};
use crate::rates::RateSnapshot;

/// Why a previously shown conversion was cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearReason {
    /// New clipboard content arrived that did not convert.
    ContentChanged,
    /// The auto-clear timeout elapsed.
    Timeout,
    /// Explicit clear from the host (e.g. a menu action).
    UserRequested,
}

impl fmt::Display for ClearReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClearReason::ContentChanged => write!(f, "content_changed"),
            ClearReason::Timeout => write!(f, "timeout"),
            ClearReason::UserRequested => write!(f, "user_requested"),
        }
    }
}

/// Receives outcomes and clear signals. Sinks are registered
/// explicitly on the dispatcher; there is no ambient event bus.
pub trait DisplaySink {
    fn show(&mut self, outcome: &ConversionOutcome);
    fn clear(&mut self, reason: ClearReason);
}

/// Closed set of top-level matchers the dispatcher tries in order.
pub enum Matcher {
    Timestamp(TimestampConverter),
    Units(UnitEngine),
    /// Test-only matcher that panics, for the isolation path.
    #[cfg(test)]
    Panicking,
}

impl Matcher {
    pub fn name(&self) -> &'static str {
        match self {
            Matcher::Timestamp(c) => c.name(),
            Matcher::Units(_) => "units",
            #[cfg(test)]
            Matcher::Panicking => "panicking",
        }
    }

    pub fn try_match(&self, text: &str) -> Option<ConversionOutcome> {
        match self {
            Matcher::Timestamp(c) => c.try_match(text),
            Matcher::Units(e) => e.try_match(text),
            #[cfg(test)]
            Matcher::Panicking => panic!("intentional test panic"),
        }
    }
}

/// Sequences converters over clipboard events and manages the
/// clear-on-change / clear-after-timeout policies.
pub struct ConversionDispatcher {
    matchers: Vec<Matcher>,
    sinks: Vec<Box<dyn DisplaySink>>,
    /// When the last successful conversion happened. `None` while
    /// nothing is shown. Single writer: this dispatcher.
    last_success: Option<Instant>,
    clear_on_change: bool,
    clear_timeout: Option<Duration>,
}

impl ConversionDispatcher {
    pub fn new(
        matchers: Vec<Matcher>,
        clear_on_change: bool,
        clear_timeout: Option<Duration>,
    ) -> Self {
        Self {
            matchers,
            sinks: Vec::new(),
            last_success: None,
            clear_on_change,
            clear_timeout,
        }
    }

    pub fn register_sink(&mut self, sink: Box<dyn DisplaySink>) {
        self.sinks.push(sink);
    }

    /// Handle new clipboard content (`None` = explicitly no content).
    ///
    /// Tries matchers in order; the first success wins. A matcher that
    /// panics is logged and treated as a decline — the rest still run.
    /// Total failure applies the clear-on-change policy.
    pub fn on_clipboard(&mut self, text: Option<&str>, now: Instant) {
        let Some(text) = text.filter(|t| !t.is_empty()) else {
            self.clear_if_shown(ClearReason::ContentChanged);
            return;
        };

        for i in 0..self.matchers.len() {
            let matcher = &self.matchers[i];
            let name = matcher.name();
            match catch_unwind(AssertUnwindSafe(|| matcher.try_match(text))) {
                Ok(Some(outcome)) => {
                    tracing::debug!(
                        converter = outcome.converter,
                        icon = %outcome.icon_text,
                        "conversion matched"
                    );
                    self.last_success = Some(now);
                    for s in &mut self.sinks {
                        s.show(&outcome);
                    }
                    return;
                }
                Ok(None) => {}
                Err(panic) => {
                    let msg = panic_message(panic.as_ref());
                    tracing::error!(converter = name, panic = %msg, "converter panicked, skipping");
                }
            }
        }

        self.clear_if_shown(ClearReason::ContentChanged);
    }

    /// Periodic timeout check. Clears at most once per conversion:
    /// clearing resets the state, so a later tick is a no-op until the
    /// next success.
    pub fn on_tick(&mut self, now: Instant) {
        let (Some(last), Some(timeout)) = (self.last_success, self.clear_timeout) else {
            return;
        };
        if now.duration_since(last) >= timeout {
            self.emit_clear(ClearReason::Timeout);
        }
    }

    /// Explicit host-triggered clear.
    pub fn clear(&mut self) {
        if self.last_success.is_some() {
            self.emit_clear(ClearReason::UserRequested);
        }
    }

    /// Route a rate snapshot to the unit engine for the atomic
    /// alias-table swap.
    pub fn adopt_rates(&mut self, snapshot: RateSnapshot) -> Result<InstalledRates, EngineError> {
        for matcher in &mut self.matchers {
            if let Matcher::Units(engine) = matcher {
                return engine.adopt_rates(snapshot);
            }
        }
        Err(EngineError::Currency(
            crate::convert::currency::CurrencyError::NotReady,
        ))
    }

    fn clear_if_shown(&mut self, reason: ClearReason) {
        if self.clear_on_change && self.last_success.is_some() {
            self.emit_clear(reason);
        }
    }

    fn emit_clear(&mut self, reason: ClearReason) {
        tracing::debug!(%reason, "clearing conversion");
        self.last_success = None;
        for s in &mut self.sinks {
            s.clear(reason);
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::convert::measure::{MeasureConverter, System};
    use crate::convert::timestamp::{
        TimestampConverter, default_icon_formats, default_menu_template,
    };
    use crate::convert::{DomainConverter, UnitEngine};

    #[derive(Debug, PartialEq)]
    enum Event {
        Shown(&'static str, String),
        Cleared(ClearReason),
    }

    struct RecordingSink(Rc<RefCell<Vec<Event>>>);

    impl DisplaySink for RecordingSink {
        fn show(&mut self, outcome: &ConversionOutcome) {
            self.0
                .borrow_mut()
                .push(Event::Shown(outcome.converter, outcome.converted.clone()));
        }
        fn clear(&mut self, reason: ClearReason) {
            self.0.borrow_mut().push(Event::Cleared(reason));
        }
    }

    fn units_matcher() -> Matcher {
        Matcher::Units(
            UnitEngine::new(vec![DomainConverter::Measure(MeasureConverter::distance(
                System::Metric,
                true,
            ))])
            .unwrap(),
        )
    }

    fn timestamp_matcher() -> Matcher {
        Matcher::Timestamp(TimestampConverter::new(
            default_icon_formats(),
            default_menu_template(),
        ))
    }

    fn dispatcher_with(
        matchers: Vec<Matcher>,
        clear_on_change: bool,
        timeout: Option<Duration>,
    ) -> (ConversionDispatcher, Rc<RefCell<Vec<Event>>>) {
        let events = Rc::new(RefCell::new(Vec::new()));
        let mut d = ConversionDispatcher::new(matchers, clear_on_change, timeout);
        d.register_sink(Box::new(RecordingSink(events.clone())));
        (d, events)
    }

    // -- Priority --

    #[test]
    fn first_matcher_success_suppresses_the_rest() {
        // A ten-digit string is a plausible timestamp; the timestamp
        // matcher sits first, so the unit engine never sees it.
        let (mut d, events) = dispatcher_with(
            vec![timestamp_matcher(), units_matcher()],
            true,
            None,
        );
        d.on_clipboard(Some("1555522011"), Instant::now());

        let events = events.borrow();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Event::Shown("timestamp", _)));
    }

    #[test]
    fn later_matcher_runs_when_earlier_declines() {
        let (mut d, events) = dispatcher_with(
            vec![timestamp_matcher(), units_matcher()],
            true,
            None,
        );
        d.on_clipboard(Some("0.3 in"), Instant::now());

        let events = events.borrow();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0], Event::Shown("distance", "7.6 mm".into()));
    }

    // -- Clear on change --

    #[test]
    fn non_matching_content_clears_active_conversion() {
        let (mut d, events) = dispatcher_with(vec![units_matcher()], true, None);
        let now = Instant::now();
        d.on_clipboard(Some("0.3 in"), now);
        d.on_clipboard(Some("just some prose"), now);

        let events = events.borrow();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], Event::Cleared(ClearReason::ContentChanged));
    }

    #[test]
    fn absent_content_clears_active_conversion() {
        let (mut d, events) = dispatcher_with(vec![units_matcher()], true, None);
        let now = Instant::now();
        d.on_clipboard(Some("0.3 in"), now);
        d.on_clipboard(None, now);

        assert_eq!(
            events.borrow().last(),
            Some(&Event::Cleared(ClearReason::ContentChanged))
        );
    }

    #[test]
    fn no_clear_when_nothing_is_shown() {
        let (mut d, events) = dispatcher_with(vec![units_matcher()], true, None);
        d.on_clipboard(Some("just some prose"), Instant::now());
        assert!(events.borrow().is_empty());
    }

    #[test]
    fn clear_on_change_disabled_keeps_conversion() {
        let (mut d, events) = dispatcher_with(vec![units_matcher()], false, None);
        let now = Instant::now();
        d.on_clipboard(Some("0.3 in"), now);
        d.on_clipboard(Some("just some prose"), now);

        let events = events.borrow();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Event::Shown(..)));
    }

    // -- Clear after timeout --

    #[test]
    fn tick_before_timeout_does_not_clear() {
        let timeout = Duration::from_secs(60);
        let (mut d, events) = dispatcher_with(vec![units_matcher()], true, Some(timeout));
        let t0 = Instant::now();
        d.on_clipboard(Some("0.3 in"), t0);
        d.on_tick(t0 + timeout - Duration::from_secs(1));

        assert_eq!(events.borrow().len(), 1);
    }

    #[test]
    fn tick_at_timeout_clears_exactly_once() {
        let timeout = Duration::from_secs(60);
        let (mut d, events) = dispatcher_with(vec![units_matcher()], true, Some(timeout));
        let t0 = Instant::now();
        d.on_clipboard(Some("0.3 in"), t0);
        d.on_tick(t0 + timeout);
        // Further ticks must not clear again.
        d.on_tick(t0 + timeout + Duration::from_secs(30));
        d.on_tick(t0 + timeout + Duration::from_secs(60));

        let events = events.borrow();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], Event::Cleared(ClearReason::Timeout));
    }

    #[test]
    fn new_success_rearms_the_timeout() {
        let timeout = Duration::from_secs(60);
        let (mut d, events) = dispatcher_with(vec![units_matcher()], true, Some(timeout));
        let t0 = Instant::now();
        d.on_clipboard(Some("0.3 in"), t0);
        d.on_clipboard(Some("5 ft"), t0 + Duration::from_secs(30));
        // Old deadline passed, new one not yet.
        d.on_tick(t0 + timeout);
        assert_eq!(events.borrow().len(), 2); // two shows, no clear

        d.on_tick(t0 + timeout + Duration::from_secs(30));
        assert_eq!(
            events.borrow().last(),
            Some(&Event::Cleared(ClearReason::Timeout))
        );
    }

    #[test]
    fn no_timeout_configured_never_clears() {
        let (mut d, events) = dispatcher_with(vec![units_matcher()], true, None);
        let t0 = Instant::now();
        d.on_clipboard(Some("0.3 in"), t0);
        d.on_tick(t0 + Duration::from_secs(100_000));
        assert_eq!(events.borrow().len(), 1);
    }

    // -- Explicit clear --

    #[test]
    fn user_clear_uses_distinct_reason() {
        let (mut d, events) = dispatcher_with(vec![units_matcher()], true, None);
        d.on_clipboard(Some("0.3 in"), Instant::now());
        d.clear();

        assert_eq!(
            events.borrow().last(),
            Some(&Event::Cleared(ClearReason::UserRequested))
        );
    }

    #[test]
    fn user_clear_without_conversion_is_noop() {
        let (mut d, events) = dispatcher_with(vec![units_matcher()], true, None);
        d.clear();
        assert!(events.borrow().is_empty());
    }

    // -- Panic isolation --

    #[test]
    fn panicking_matcher_does_not_abort_dispatch() {
        let (mut d, events) = dispatcher_with(
            vec![Matcher::Panicking, units_matcher()],
            true,
            None,
        );
        d.on_clipboard(Some("0.3 in"), Instant::now());

        let events = events.borrow();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0], Event::Shown("distance", "7.6 mm".into()));
    }
}
