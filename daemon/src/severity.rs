use serde::{Deserialize, Serialize};

/// Status level derived from the time elapsed since an event last happened.
///
/// Variants are declared in ascending order, so the derived `Ord` is the
/// severity order and the worst of several states is their `max()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Elapsed time is negative (clock skew) or nothing has been evaluated yet.
    Unknown = 0,
    /// The event happened recently enough.
    Normal = 1,
    /// The warning threshold has passed.
    Warning = 2,
    /// The overdue threshold has passed.
    Overdue = 3,
}

impl Severity {
    /// Upper-case name used as the publish payload.
    pub fn name(self) -> &'static str {
        match self {
            Severity::Unknown => "UNKNOWN",
            Severity::Normal => "NORMAL",
            Severity::Warning => "WARNING",
            Severity::Overdue => "OVERDUE",
        }
    }

    /// Worst severity of `levels`, or `Unknown` when there are none.
    pub fn aggregate<I>(levels: I) -> Severity
    where
        I: IntoIterator<Item = Severity>,
    {
        levels.into_iter().max().unwrap_or(Severity::Unknown)
    }

    pub fn highlight(self) -> Highlight {
        match self {
            Severity::Unknown | Severity::Normal => Highlight::Plain,
            Severity::Warning => Highlight::Steady,
            Severity::Overdue => Highlight::Flashing,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// How a presentation layer should emphasise a tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Highlight {
    Plain,
    /// Highlighted without blinking.
    Steady,
    /// Alternates between the highlight and the plain style.
    Flashing,
}
