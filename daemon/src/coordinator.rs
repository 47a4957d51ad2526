/// Aggregation of several [`EventTracker`]s into one household status.
///
/// The coordinator owns the trackers, the event log and the publisher. Its
/// state is rebuilt from the event log on [`StatusCoordinator::load`]; nothing
/// in memory outlives the process.
///
/// Every mutation (`record_event`, `tick`) goes through `&mut self`; callers
/// on different tasks share it as a [`SharedCoordinator`].
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, SubsecRound, Utc};
use serde::Serialize;

use crate::clock::Clock;
use crate::config::{Config, TrackerConfig};
use crate::error::{MonitorError, Result};
use crate::event_log::{validate_kind, EventLog, LogRecord};
use crate::publish::Publisher;
use crate::severity::{Highlight, Severity};
use crate::tracker::{format_elapsed, EventTracker, PollOutcome, Thresholds};

pub type SharedCoordinator = Arc<Mutex<StatusCoordinator>>;

/// Locks the shared coordinator. A panic on another task does not leave the
/// trackers half-updated, so a poisoned lock is taken over.
pub fn lock(shared: &SharedCoordinator) -> MutexGuard<'_, StatusCoordinator> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

struct TrackedKind {
    kind: String,
    label: String,
    aliases: Vec<String>,
    tracker: EventTracker,
}

impl TrackedKind {
    fn answers_to(&self, name: &str) -> bool {
        self.kind == name || self.aliases.iter().any(|a| a == name)
    }
}

/// A tracker whose severity or display string changed during a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerChange {
    pub kind: String,
    pub outcome: PollOutcome,
}

/// Result of one evaluation cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub changes: Vec<TrackerChange>,
    pub aggregate: Severity,
    /// `None` if the aggregate matched the last published value, otherwise
    /// whether the publish attempt succeeded.
    pub published: Option<bool>,
}

impl TickReport {
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }
}

/// Point-in-time view of one tracker for presentation.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TrackerSnapshot {
    pub kind: String,
    pub label: String,
    pub display: String,
    pub severity: Severity,
    pub highlight: Highlight,
    /// RFC 3339 UTC timestamp of the last occurrence.
    pub last_occurred: String,
    pub elapsed_secs: i64,
}

/// Point-in-time view of every tracker, taken under the coordinator lock.
/// Severities are evaluated at snapshot time, not copied from the last cycle.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatusSnapshot {
    pub version: String,
    pub subject: String,
    pub aggregate: Severity,
    pub trackers: Vec<TrackerSnapshot>,
}

pub struct StatusCoordinator {
    subject: String,
    topic: String,
    clock: Arc<dyn Clock>,
    trackers: Vec<TrackedKind>,
    event_log: Box<dyn EventLog>,
    publisher: Box<dyn Publisher>,
    aggregate: Severity,
    last_published: Option<Severity>,
}

impl StatusCoordinator {
    /// Builds one tracker per configured kind, each starting at the clock's
    /// current time. Call [`load`](Self::load) to seed them from the log.
    pub fn new(
        config: &Config,
        clock: Arc<dyn Clock>,
        event_log: Box<dyn EventLog>,
        publisher: Box<dyn Publisher>,
    ) -> Result<Self> {
        if config.trackers.is_empty() {
            return Err(MonitorError::InvalidConfiguration(
                "at least one tracker must be configured".to_string(),
            ));
        }

        let mut trackers: Vec<TrackedKind> = Vec::with_capacity(config.trackers.len());
        for entry in &config.trackers {
            let tracked = build_tracker(entry, &clock)?;
            let names = std::iter::once(&tracked.kind).chain(&tracked.aliases);
            for name in names {
                if trackers.iter().any(|t| t.answers_to(name)) {
                    return Err(MonitorError::InvalidConfiguration(format!(
                        "event kind {name:?} is claimed by more than one tracker"
                    )));
                }
            }
            trackers.push(tracked);
        }

        let subject = config.global.subject.clone();
        Ok(Self {
            topic: config.publisher.effective_topic(&subject),
            subject,
            clock,
            trackers,
            event_log,
            publisher,
            aggregate: Severity::Unknown,
            last_published: None,
        })
    }

    /// Seeds every tracker from the event log. For each kind the record that
    /// appears last in the log wins, since later entries are later facts even
    /// when back-dated. Unknown kinds and malformed lines are skipped.
    ///
    /// Returns the number of records that matched a tracker.
    pub fn load(&mut self) -> Result<usize> {
        let mut latest: Vec<Option<DateTime<Utc>>> = vec![None; self.trackers.len()];
        let mut matched = 0;
        for record in self.event_log.read_all()? {
            match self.position(&record.kind) {
                Some(idx) => {
                    latest[idx] = Some(record.at);
                    matched += 1;
                }
                None => log::debug!("[coordinator] Ignoring logged kind {:?}", record.kind),
            }
        }

        for (tracked, at) in self.trackers.iter_mut().zip(latest) {
            if let Some(at) = at {
                tracked.tracker.reset(Some(at), true);
                log::debug!("[coordinator] {} last happened at {at}", tracked.kind);
            }
        }
        log::info!("[coordinator] Loaded {matched} event(s) from the log");
        Ok(matched)
    }

    /// Records that `kind` happened at `when` (or now): appends it to the log,
    /// moves the tracker to that time unconditionally, then runs a cycle.
    ///
    /// Aliases are accepted and logged under the canonical kind. If the log
    /// write fails the tracker is left untouched.
    pub fn record_event(&mut self, kind: &str, when: Option<DateTime<Utc>>) -> Result<TickReport> {
        let idx = self
            .position(kind)
            .ok_or_else(|| MonitorError::UnknownKind(kind.to_string()))?;
        // Whole seconds, so the in-memory time matches what a reload reads back.
        let at = when.unwrap_or_else(|| self.clock.now()).trunc_subsecs(0);

        let tracked = &mut self.trackers[idx];
        self.event_log.append(&LogRecord::new(at, tracked.kind.clone()))?;
        tracked.tracker.reset(Some(at), true);
        log::info!("[coordinator] Recorded {} at {at}", tracked.kind);

        Ok(self.cycle())
    }

    /// Polls every tracker and publishes the aggregate if it differs from the
    /// last value published successfully.
    pub fn tick(&mut self) -> TickReport {
        self.cycle()
    }

    fn cycle(&mut self) -> TickReport {
        let mut changes = Vec::new();
        let mut severities = Vec::with_capacity(self.trackers.len());
        for tracked in &mut self.trackers {
            let outcome = tracked.tracker.poll();
            severities.push(outcome.severity);
            if outcome.severity_changed {
                log::info!(
                    "[coordinator] {} is now {} ({})",
                    tracked.kind,
                    outcome.severity,
                    outcome.display
                );
            }
            if outcome.any_changed() {
                changes.push(TrackerChange { kind: tracked.kind.clone(), outcome });
            }
        }

        let aggregate = Severity::aggregate(severities);
        if aggregate != self.aggregate {
            log::debug!("[coordinator] Aggregate {} -> {aggregate}", self.aggregate);
            self.aggregate = aggregate;
        }

        let published = if self.last_published != Some(aggregate) {
            Some(self.publish(aggregate))
        } else {
            None
        };

        TickReport { changes, aggregate, published }
    }

    /// One reconnect and one publish attempt; failures are left for the next cycle.
    fn publish(&mut self, aggregate: Severity) -> bool {
        if let Err(e) = self.publisher.reconnect() {
            log::warn!("[publish] Reconnect failed, will retry: {e}");
            return false;
        }
        match self.publisher.publish(&self.topic, aggregate.name()) {
            Ok(()) => {
                log::debug!("[publish] {} = {aggregate}", self.topic);
                self.last_published = Some(aggregate);
                true
            }
            Err(e) => {
                log::warn!("[publish] Message not published, will retry: {e}");
                false
            }
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.trackers.iter().position(|t| t.answers_to(name))
    }

    fn tracked(&self, kind: &str) -> Option<&TrackedKind> {
        self.position(kind).map(|idx| &self.trackers[idx])
    }

    // ── Read-only accessors ───────────────────────────────────────────────────

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Canonical kinds in configuration order.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.trackers.iter().map(|t| t.kind.as_str())
    }

    /// Aggregate computed by the most recent cycle.
    pub fn aggregate(&self) -> Severity {
        self.aggregate
    }

    pub fn last_published(&self) -> Option<Severity> {
        self.last_published
    }

    pub fn severity_of(&self, kind: &str) -> Option<Severity> {
        self.tracked(kind).map(|t| t.tracker.severity())
    }

    pub fn display_of(&self, kind: &str) -> Option<String> {
        self.tracked(kind).map(|t| t.tracker.display_string())
    }

    pub fn last_occurred_of(&self, kind: &str) -> Option<DateTime<Utc>> {
        self.tracked(kind).map(|t| t.tracker.last_occurred())
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let trackers: Vec<TrackerSnapshot> = self
            .trackers
            .iter()
            .map(|t| {
                let elapsed_secs = t.tracker.seconds_elapsed();
                let severity = t.tracker.thresholds().classify(elapsed_secs);
                TrackerSnapshot {
                    kind: t.kind.clone(),
                    label: t.label.clone(),
                    display: format_elapsed(elapsed_secs),
                    severity,
                    highlight: severity.highlight(),
                    last_occurred: t.tracker.last_occurred().to_rfc3339(),
                    elapsed_secs,
                }
            })
            .collect();
        StatusSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            subject: self.subject.clone(),
            aggregate: Severity::aggregate(trackers.iter().map(|t| t.severity)),
            trackers,
        }
    }
}

fn build_tracker(entry: &TrackerConfig, clock: &Arc<dyn Clock>) -> Result<TrackedKind> {
    validate_kind(&entry.kind)?;
    // Aliases are matched against kinds parsed back from the log.
    for alias in &entry.aliases {
        validate_kind(alias)?;
    }
    let thresholds =
        Thresholds::new(entry.warning_secs, entry.overdue_secs).map_err(|e| match e {
            MonitorError::InvalidConfiguration(msg) => {
                MonitorError::InvalidConfiguration(format!("tracker {:?}: {msg}", entry.kind))
            }
            other => other,
        })?;
    Ok(TrackedKind {
        kind: entry.kind.clone(),
        label: entry.effective_label().to_string(),
        aliases: entry.aliases.clone(),
        tracker: EventTracker::new(thresholds, Arc::clone(clock)),
    })
}
