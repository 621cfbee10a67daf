use chrono::{DateTime, FixedOffset};
use std::fmt;
use tracing::{error, info, warn};

/// What happened to one vacation-day meeting
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Update sent and accepted
    Rescheduled {
        event_id: String,
        title: String,
        from: DateTime<FixedOffset>,
        to: DateTime<FixedOffset>,
    },
    /// Dry run, nothing changed
    Proposed {
        event_id: String,
        title: String,
        from: DateTime<FixedOffset>,
        to: DateTime<FixedOffset>,
    },
    /// No acceptable date had room
    NoSlot { event_id: String, title: String },
    /// A slot was found but the update was rejected
    UpdateFailed {
        event_id: String,
        title: String,
        to: DateTime<FixedOffset>,
        reason: String,
    },
}

impl Outcome {
    pub fn event_id(&self) -> &str {
        match self {
            Outcome::Rescheduled { event_id, .. }
            | Outcome::Proposed { event_id, .. }
            | Outcome::NoSlot { event_id, .. }
            | Outcome::UpdateFailed { event_id, .. } => event_id,
        }
    }

    /// New start time, if a slot was found
    pub fn new_start(&self) -> Option<DateTime<FixedOffset>> {
        match self {
            Outcome::Rescheduled { to, .. }
            | Outcome::Proposed { to, .. }
            | Outcome::UpdateFailed { to, .. } => Some(*to),
            Outcome::NoSlot { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Info => write!(f, "INFO"),
            Level::Warning => write!(f, "WARNING"),
            Level::Error => write!(f, "ERROR"),
        }
    }
}

/// Result of a run: per-meeting outcomes plus the user-facing message log
#[derive(Debug, Clone, Default)]
pub struct RescheduleReport {
    pub outcomes: Vec<Outcome>,
    pub messages: Vec<(Level, String)>,
}

impl RescheduleReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!("{}", message);
        self.messages.push((Level::Info, message));
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}", message);
        self.messages.push((Level::Warning, message));
    }

    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        error!("{}", message);
        self.messages.push((Level::Error, message));
    }

    pub fn record(&mut self, outcome: Outcome) {
        self.outcomes.push(outcome);
    }

    pub fn outcome_for(&self, event_id: &str) -> Option<&Outcome> {
        self.outcomes.iter().find(|o| o.event_id() == event_id)
    }

    pub fn has_errors(&self) -> bool {
        self.messages.iter().any(|(level, _)| *level == Level::Error)
    }
}

impl fmt::Display for RescheduleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (level, message)) in self.messages.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}: {}", level, message)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_lines() {
        let mut report = RescheduleReport::new();
        report.info("Using calendar timezone: UTC");
        report.warn("No meetings found to reschedule on 2024-03-04.");
        assert!(!report.has_errors());

        report.error("Failed to update event");
        assert!(report.has_errors());
        assert_eq!(
            report.to_string(),
            "INFO: Using calendar timezone: UTC\n\
             WARNING: No meetings found to reschedule on 2024-03-04.\n\
             ERROR: Failed to update event"
        );
    }

    #[test]
    fn test_outcome_lookup() {
        let mut report = RescheduleReport::new();
        report.record(Outcome::NoSlot {
            event_id: "a".to_string(),
            title: "Sync".to_string(),
        });

        let outcome = report.outcome_for("a").unwrap();
        assert_eq!(outcome.new_start(), None);
        assert!(report.outcome_for("b").is_none());
    }
}
