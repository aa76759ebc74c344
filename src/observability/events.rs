//! Observable events
//!
//! Events are explicit and typed. Each carries its own severity so call sites
//! never choose one ad hoc.

use std::fmt;

use super::logger::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Construction
    /// A struct block finished assembling its child registry
    RegistryBuilt,
    /// A static declaration was evaluated
    DeclaredBlocksBuilt,
    /// A default mapping named an unknown child
    DefaultKeyRejected,

    // Values
    /// One or more children failed to clean
    StructCleanFailed,
    /// Redisplay received something other than one aggregate error
    RedisplayContractViolation,

    // Startup
    ConfigLoaded,
    /// Declaration documents read from disk
    DeclarationsLoaded,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::RegistryBuilt => "STRUCT_REGISTRY_BUILT",
            Event::DeclaredBlocksBuilt => "DECLARED_BLOCKS_BUILT",
            Event::DefaultKeyRejected => "STRUCT_DEFAULT_KEY_REJECTED",
            Event::StructCleanFailed => "STRUCT_CLEAN_FAILED",
            Event::RedisplayContractViolation => "STRUCT_REDISPLAY_CONTRACT_VIOLATION",
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::DeclarationsLoaded => "DECLARATIONS_LOADED",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Event::RegistryBuilt | Event::DeclaredBlocksBuilt => Severity::Trace,
            Event::ConfigLoaded | Event::DeclarationsLoaded => Severity::Info,
            Event::StructCleanFailed => Severity::Warn,
            Event::DefaultKeyRejected | Event::RedisplayContractViolation => Severity::Error,
        }
    }

    /// Returns true if this event is logged at ERROR or above
    pub fn is_error(&self) -> bool {
        self.severity() >= Severity::Error
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Event; 7] = [
        Event::RegistryBuilt,
        Event::DeclaredBlocksBuilt,
        Event::DefaultKeyRejected,
        Event::StructCleanFailed,
        Event::RedisplayContractViolation,
        Event::ConfigLoaded,
        Event::DeclarationsLoaded,
    ];

    #[test]
    fn test_all_events_have_string_representation() {
        for event in ALL {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_error_events() {
        assert!(Event::RedisplayContractViolation.is_error());
        assert!(Event::DefaultKeyRejected.is_error());
        assert!(!Event::StructCleanFailed.is_error());
        assert!(!Event::RegistryBuilt.is_error());

        // no event is logged as FATAL
        for event in ALL {
            assert!(event.severity() < Severity::Fatal);
            assert_eq!(event.is_error(), event.severity() == Severity::Error);
        }
    }

    #[test]
    fn test_event_display() {
        assert_eq!(format!("{}", Event::StructCleanFailed), "STRUCT_CLEAN_FAILED");
    }
}
