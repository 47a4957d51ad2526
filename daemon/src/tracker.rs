/// Elapsed-time tracking for one kind of recurring event.
///
/// An [`EventTracker`] remembers when its event last happened and maps the
/// time elapsed since then onto a [`Severity`]. Changes are edge-triggered:
/// [`EventTracker::poll`] compares against what the previous poll saw and
/// reports only what moved, leaving dispatch to the caller.
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::clock::Clock;
use crate::error::{MonitorError, Result};
use crate::severity::Severity;

/// Shown instead of an elapsed time when the clock reads earlier than the last event.
pub const UNKNOWN_DISPLAY: &str = "--:--";

/// Warning and overdue limits, in seconds since the last event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    warning_secs: u64,
    overdue_secs: u64,
}

impl Thresholds {
    /// Fails when `warning_secs > overdue_secs`. Equal values are accepted;
    /// the tracker then goes straight from normal to overdue.
    pub fn new(warning_secs: u64, overdue_secs: u64) -> Result<Self> {
        if warning_secs > overdue_secs {
            return Err(MonitorError::InvalidConfiguration(format!(
                "warning threshold ({warning_secs}s) exceeds overdue threshold ({overdue_secs}s)"
            )));
        }
        Ok(Self { warning_secs, overdue_secs })
    }

    pub fn warning_secs(&self) -> u64 {
        self.warning_secs
    }

    pub fn overdue_secs(&self) -> u64 {
        self.overdue_secs
    }

    /// Severity for a signed elapsed time.
    pub fn classify(&self, elapsed_secs: i64) -> Severity {
        let Ok(elapsed) = u64::try_from(elapsed_secs) else {
            return Severity::Unknown;
        };
        if elapsed < self.warning_secs {
            Severity::Normal
        } else if elapsed < self.overdue_secs {
            Severity::Warning
        } else {
            Severity::Overdue
        }
    }
}

/// What changed between two consecutive [`EventTracker::poll`] calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOutcome {
    pub severity_changed: bool,
    pub severity: Severity,
    pub display_changed: bool,
    pub display: String,
}

impl PollOutcome {
    pub fn any_changed(&self) -> bool {
        self.severity_changed || self.display_changed
    }
}

pub struct EventTracker {
    clock: Arc<dyn Clock>,
    thresholds: Thresholds,
    last_occurred: DateTime<Utc>,
    last_observed_severity: Severity,
    /// `None` until the first poll, so that poll always reports the display.
    last_observed_display: Option<String>,
}

impl EventTracker {
    /// Creates a tracker whose event last happened at the clock's current time.
    pub fn new(thresholds: Thresholds, clock: Arc<dyn Clock>) -> Self {
        let last_occurred = clock.now();
        Self {
            clock,
            thresholds,
            last_occurred,
            last_observed_severity: Severity::Unknown,
            last_observed_display: None,
        }
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    pub fn last_occurred(&self) -> DateTime<Utc> {
        self.last_occurred
    }

    /// Marks the event as having happened at `new_time`, or now when omitted.
    ///
    /// Without `force` the timestamp only moves forward; an earlier or equal
    /// time is silently ignored. Returns whether the timestamp changed.
    pub fn reset(&mut self, new_time: Option<DateTime<Utc>>, force: bool) -> bool {
        let new_time = new_time.unwrap_or_else(|| self.clock.now());
        if !force && new_time <= self.last_occurred {
            return false;
        }
        self.last_occurred = new_time;
        true
    }

    /// Whole seconds since the last event, rounded down. Negative only under clock skew.
    pub fn seconds_elapsed(&self) -> i64 {
        let elapsed = self.clock.now() - self.last_occurred;
        elapsed.num_milliseconds().div_euclid(1000)
    }

    /// Elapsed time as `H:MM`; hours are unbounded and unpadded.
    pub fn display_string(&self) -> String {
        format_elapsed(self.seconds_elapsed())
    }

    pub fn severity(&self) -> Severity {
        self.thresholds.classify(self.seconds_elapsed())
    }

    /// Re-evaluates severity and display string and reports which of them
    /// differ from the previous poll.
    pub fn poll(&mut self) -> PollOutcome {
        // One clock read keeps severity and display consistent with each other.
        let elapsed = self.seconds_elapsed();
        let severity = self.thresholds.classify(elapsed);
        let display = format_elapsed(elapsed);

        let severity_changed = severity != self.last_observed_severity;
        let display_changed = self.last_observed_display.as_deref() != Some(display.as_str());

        self.last_observed_severity = severity;
        if display_changed {
            self.last_observed_display = Some(display.clone());
        }

        PollOutcome { severity_changed, severity, display_changed, display }
    }
}

/// Formats a signed elapsed time as `H:MM`, or [`UNKNOWN_DISPLAY`] when negative.
pub fn format_elapsed(elapsed_secs: i64) -> String {
    if elapsed_secs < 0 {
        return UNKNOWN_DISPLAY.to_string();
    }
    let hours = elapsed_secs / 3600;
    let minutes = (elapsed_secs % 3600) / 60;
    format!("{hours}:{minutes:02}")
}
