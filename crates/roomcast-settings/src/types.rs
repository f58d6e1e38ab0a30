//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and `#[serde(default)]`,
//! so a settings file only needs the keys it overrides.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::SettingsError;

/// Root settings type for the roomcast daemon.
///
/// ```json
/// {
///   "server": { "port": 9000 },
///   "hub": { "outboundQueueCapacity": 64 },
///   "logging": { "level": "debug", "format": "json" }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoomcastSettings {
    /// Listener settings.
    pub server: ServerSettings,
    /// Hub tuning.
    pub hub: HubSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl RoomcastSettings {
    /// Reject values the hub cannot run with.
    pub fn validate(&self) -> crate::Result<()> {
        if self.server.host.trim().is_empty() {
            return Err(SettingsError::Invalid("server.host must not be empty".into()));
        }
        if self.server.max_message_size == 0 {
            return Err(SettingsError::Invalid(
                "server.maxMessageSize must be at least 1".into(),
            ));
        }
        if self.hub.outbound_queue_capacity == 0 {
            return Err(SettingsError::Invalid(
                "hub.outboundQueueCapacity must be at least 1".into(),
            ));
        }
        if self.hub.keepalive_interval_ms == 0 {
            return Err(SettingsError::Invalid(
                "hub.keepaliveIntervalMs must be at least 1".into(),
            ));
        }
        if self.hub.command_buffer == 0 {
            return Err(SettingsError::Invalid(
                "hub.commandBuffer must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Listener settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port. `0` picks a free port.
    pub port: u16,
    /// Largest inbound websocket message accepted, in bytes.
    pub max_message_size: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_message_size: 1024 * 1024,
        }
    }
}

/// Hub tuning.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HubSettings {
    /// Payloads a connection may have pending before it is evicted.
    pub outbound_queue_capacity: usize,
    /// Keepalive ping period in milliseconds.
    pub keepalive_interval_ms: u64,
    /// Dispatcher command channel capacity.
    pub command_buffer: usize,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            outbound_queue_capacity: 256,
            keepalive_interval_ms: 54_000,
            command_buffer: 1024,
        }
    }
}

/// Log verbosity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace-level (most verbose).
    Trace,
    /// Debug-level.
    Debug,
    /// Info-level (default).
    #[default]
    Info,
    /// Warning-level.
    Warn,
    /// Error-level (least verbose).
    Error,
}

impl LogLevel {
    /// Convert to a tracing filter string.
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_filter_str())
    }
}

impl FromStr for LogLevel {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(SettingsError::Invalid(format!("unknown log level '{other}'"))),
        }
    }
}

/// Log line layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable single line.
    #[default]
    Compact,
    /// One JSON object per line.
    Json,
}

impl FromStr for LogFormat {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(SettingsError::Invalid(format!("unknown log format '{other}'"))),
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level when `RUST_LOG` is unset.
    pub level: LogLevel,
    /// Output layout.
    pub format: LogFormat,
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn defaults() {
        let s = RoomcastSettings::default();
        assert_eq!(s.server.host, "0.0.0.0");
        assert_eq!(s.server.port, 8080);
        assert_eq!(s.server.max_message_size, 1_048_576);
        assert_eq!(s.hub.outbound_queue_capacity, 256);
        assert_eq!(s.hub.keepalive_interval_ms, 54_000);
        assert_eq!(s.hub.command_buffer, 1024);
        assert_eq!(s.logging.level, LogLevel::Info);
        assert_eq!(s.logging.format, LogFormat::Compact);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(RoomcastSettings::default()).unwrap();
        assert_eq!(json["server"]["maxMessageSize"], 1_048_576);
        assert_eq!(json["hub"]["outboundQueueCapacity"], 256);
        assert_eq!(json["hub"]["keepaliveIntervalMs"], 54_000);
        assert_eq!(json["logging"]["level"], "info");
        assert_eq!(json["logging"]["format"], "compact");
    }

    #[test]
    fn partial_json_fills_defaults() {
        let s: RoomcastSettings =
            serde_json::from_str(r#"{"hub": {"outboundQueueCapacity": 4}}"#).unwrap();
        assert_eq!(s.hub.outbound_queue_capacity, 4);
        assert_eq!(s.hub.keepalive_interval_ms, 54_000);
        assert_eq!(s.server.port, 8080);
    }

    #[test]
    fn log_level_filter_strings() {
        assert_eq!(LogLevel::Trace.as_filter_str(), "trace");
        assert_eq!(LogLevel::Warn.as_filter_str(), "warn");
        assert_eq!(LogLevel::Error.to_string(), "error");
    }

    #[test]
    fn log_level_from_str() {
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_matches!("loud".parse::<LogLevel>(), Err(SettingsError::Invalid(_)));
    }

    #[test]
    fn log_format_from_str() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("Compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert!("pretty".parse::<LogFormat>().is_err());
    }

    #[test]
    fn validate_rejects_zero_capacity() {
        let mut s = RoomcastSettings::default();
        s.hub.outbound_queue_capacity = 0;
        assert_matches!(s.validate(), Err(SettingsError::Invalid(msg)) if msg.contains("outboundQueueCapacity"));
    }

    #[test]
    fn validate_rejects_zero_keepalive() {
        let mut s = RoomcastSettings::default();
        s.hub.keepalive_interval_ms = 0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn validate_rejects_blank_host() {
        let mut s = RoomcastSettings::default();
        s.server.host = "  ".into();
        assert!(s.validate().is_err());
    }
}
