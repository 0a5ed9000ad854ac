//! Observability for attribute storage
//!
//! - Structured logging (JSON lines)
//! - Counter metrics
//! - Typed lifecycle events
//!
//! Observability is read-only: it never influences attribute behavior.
//!
//! # Usage
//!
//! ```ignore
//! use aerodb_attribute::observability::{log_event_with_fields, Event, Logger, Severity};
//!
//! log_event_with_fields(Event::SaveComplete, &[("docs", "10")]);
//! Logger::set_min_severity(Severity::Trace);
//! ```

mod events;
mod logger;
mod metrics;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};

/// Log a lifecycle event at its default severity
pub fn log_event(event: Event) {
    log_event_with_fields(event, &[]);
}

/// Log a lifecycle event with fields at its default severity
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    let severity = event.severity();
    if severity >= Severity::Error {
        Logger::log_stderr(severity, event.as_str(), fields);
    } else {
        Logger::log(severity, event.as_str(), fields);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event() {
        // Only verifies no panic
        log_event(Event::AttributeCreated);
        log_event(Event::Commit);
    }

    #[test]
    fn test_log_event_with_fields() {
        log_event_with_fields(Event::SaveComplete, &[("docs", "10"), ("bytes", "6")]);
        log_event_with_fields(Event::DataCorruption, &[("reason", "truncated payload")]);
    }
}
