//! Shared types for logsaw
//!
//! This crate contains the log event model and the column catalogue used by
//! the event container, the rule engine and the receivers.

mod column;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub use column::{BUILTIN_COLUMNS, Column, resolve_field};

/// Property key under which the container records the synthetic row id
pub const ID_PROPERTY_KEY: &str = "log4jid";

// ============================================================================
// Levels
// ============================================================================

/// Log severity level, declared from least to most verbose
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Off,
    Fatal,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
    All,
}

impl Level {
    /// Every level, least verbose first
    pub const ALL_LEVELS: [Level; 8] = [
        Level::Off,
        Level::Fatal,
        Level::Error,
        Level::Warn,
        Level::Info,
        Level::Debug,
        Level::Trace,
        Level::All,
    ];

    /// Numeric severity rank; a higher rank is more severe
    pub fn severity(&self) -> i32 {
        match self {
            Self::Off => i32::MAX,
            Self::Fatal => 50_000,
            Self::Error => 40_000,
            Self::Warn => 30_000,
            Self::Info => 20_000,
            Self::Debug => 10_000,
            Self::Trace => 5_000,
            Self::All => i32::MIN,
        }
    }

    /// Canonical upper-case name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Fatal => "FATAL",
            Self::Error => "ERROR",
            Self::Warn => "WARN",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
            Self::Trace => "TRACE",
            Self::All => "ALL",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a level name is not recognised
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseLevelError(pub String);

impl fmt::Display for ParseLevelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown level '{}'", self.0)
    }
}

impl std::error::Error for ParseLevelError {}

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "fatal" | "critical" | "crit" | "panic" => Ok(Self::Fatal),
            "error" | "err" | "severe" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" | "information" => Ok(Self::Info),
            "debug" | "fine" => Ok(Self::Debug),
            "trace" | "finest" => Ok(Self::Trace),
            "all" => Ok(Self::All),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

// ============================================================================
// Log Events
// ============================================================================

/// Source location of a logging call
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LocationInfo {
    pub class_name: String,
    pub method_name: String,
    pub file_name: String,
    pub line_number: String,
}

impl LocationInfo {
    pub fn new(
        class_name: impl Into<String>,
        method_name: impl Into<String>,
        file_name: impl Into<String>,
        line_number: impl Into<String>,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            method_name: method_name.into(),
            file_name: file_name.into(),
            line_number: line_number.into(),
        }
    }
}

/// A single log event
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,

    pub level: Level,

    /// Dot-separated hierarchical logger name
    pub logger_name: String,

    #[serde(default)]
    pub thread_name: String,

    #[serde(default)]
    pub message: String,

    /// Nested diagnostic context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ndc: Option<String>,

    /// Rendered stack frames, outermost first
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throwable: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationInfo>,

    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl LogEvent {
    /// Create an event with the required fields; everything else is empty
    pub fn new(logger_name: impl Into<String>, level: Level, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now().timestamp_millis(),
            level,
            logger_name: logger_name.into(),
            thread_name: String::new(),
            message: message.into(),
            ndc: None,
            throwable: None,
            location: None,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_thread(mut self, thread_name: impl Into<String>) -> Self {
        self.thread_name = thread_name.into();
        self
    }

    pub fn with_ndc(mut self, ndc: impl Into<String>) -> Self {
        self.ndc = Some(ndc.into());
        self
    }

    pub fn with_throwable<I, S>(mut self, frames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.throwable = Some(frames.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_location(mut self, location: LocationInfo) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Look up a property value
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Synthetic id assigned by the container, if the event has been stored
    pub fn id(&self) -> Option<u64> {
        self.property(ID_PROPERTY_KEY).and_then(|v| v.parse().ok())
    }

    /// Timestamp as a UTC date-time (None if out of range)
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp).single()
    }

    /// Stack frames joined into a single block of text
    pub fn throwable_text(&self) -> Option<String> {
        self.throwable.as_ref().map(|frames| frames.join("\n"))
    }

    /// Properties rendered as `key=value` pairs, excluding the synthetic id
    pub fn properties_text(&self) -> String {
        self.properties
            .iter()
            .filter(|(k, _)| k.as_str() != ID_PROPERTY_KEY)
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parse_is_case_insensitive() {
        assert_eq!("warn".parse::<Level>().unwrap(), Level::Warn);
        assert_eq!("Warning".parse::<Level>().unwrap(), Level::Warn);
        assert_eq!("FATAL".parse::<Level>().unwrap(), Level::Fatal);
        assert!("loud".parse::<Level>().is_err());
    }

    #[test]
    fn test_level_order_and_severity() {
        assert!(Level::Off < Level::Fatal);
        assert!(Level::Debug < Level::All);
        assert!(Level::Fatal.severity() > Level::Error.severity());
        assert!(Level::Info.severity() > Level::Debug.severity());
    }

    #[test]
    fn test_event_builder_and_id() {
        let event = LogEvent::new("a.b", Level::Info, "hello")
            .with_timestamp(42)
            .with_property(ID_PROPERTY_KEY, "7")
            .with_property("user", "bob");

        assert_eq!(event.timestamp, 42);
        assert_eq!(event.id(), Some(7));
        assert_eq!(event.property("user"), Some("bob"));
        assert_eq!(event.properties_text(), "user=bob");
    }

    #[test]
    fn test_event_json_defaults() {
        let json = r#"{"timestamp":1,"level":"ERROR","logger_name":"x"}"#;
        let event: LogEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.level, Level::Error);
        assert!(event.ndc.is_none());
        assert!(event.properties.is_empty());
    }
}
