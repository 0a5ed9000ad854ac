//! Observable attribute events
//!
//! Events are explicit and typed. Each maps to one stable upper-case name
//! and a default severity.

use std::fmt;

use super::logger::Severity;

/// Observable events in the attribute lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Lifecycle
    /// Attribute constructed
    AttributeCreated,
    /// Attribute torn down, hold lists released
    AttributeDestroyed,
    /// Configuration file loaded and validated
    ConfigLoaded,

    // Writer path
    /// Pending changes applied and committed limit published
    Commit,
    /// Storage reallocated to a larger buffer
    StorageGrown,
    /// Retired buffers released by the hold list
    BuffersReclaimed,
    /// Committed and uncommitted limits lowered
    LidSpaceCompacted,
    /// Storage truncated to the committed limit
    LidSpaceShrunk,

    // Persistence
    /// Save began
    SaveBegin,
    /// Save finished
    SaveComplete,
    /// Load began
    LoadBegin,
    /// Load finished with data
    LoadComplete,
    /// Load found no data
    LoadNoData,
    /// Persisted payload failed validation (FATAL)
    DataCorruption,

    // Read path
    /// Search context constructed for an unrecognized term
    InvalidSearchTerm,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::AttributeCreated => "ATTRIBUTE_CREATED",
            Event::AttributeDestroyed => "ATTRIBUTE_DESTROYED",
            Event::ConfigLoaded => "CONFIG_LOADED",

            Event::Commit => "ATTRIBUTE_COMMIT",
            Event::StorageGrown => "ATTRIBUTE_STORAGE_GROWN",
            Event::BuffersReclaimed => "ATTRIBUTE_BUFFERS_RECLAIMED",
            Event::LidSpaceCompacted => "ATTRIBUTE_LID_SPACE_COMPACTED",
            Event::LidSpaceShrunk => "ATTRIBUTE_LID_SPACE_SHRUNK",

            Event::SaveBegin => "ATTRIBUTE_SAVE_BEGIN",
            Event::SaveComplete => "ATTRIBUTE_SAVE_COMPLETE",
            Event::LoadBegin => "ATTRIBUTE_LOAD_BEGIN",
            Event::LoadComplete => "ATTRIBUTE_LOAD_COMPLETE",
            Event::LoadNoData => "ATTRIBUTE_LOAD_NO_DATA",
            Event::DataCorruption => "ATTRIBUTE_DATA_CORRUPTION",

            Event::InvalidSearchTerm => "ATTRIBUTE_INVALID_SEARCH_TERM",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::Commit | Event::BuffersReclaimed | Event::InvalidSearchTerm => Severity::Trace,
            Event::LoadNoData => Severity::Warn,
            Event::DataCorruption => Severity::Fatal,
            _ => Severity::Info,
        }
    }

    /// Returns true if this event indicates a fatal condition
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
