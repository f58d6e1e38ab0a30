//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`RoomcastSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply `ROOMCAST_*` environment overrides (highest priority)
//! 4. Validate
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::{LogFormat, LogLevel, RoomcastSettings};

/// Resolve the path to the settings file (`~/.roomcast/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".roomcast").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<RoomcastSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields the defaults. Invalid JSON or a value that fails
/// validation is an error.
pub fn load_settings_from_path(path: &Path) -> Result<RoomcastSettings> {
    load_with_env(path, |name| std::env::var(name).ok())
}

fn load_with_env(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> Result<RoomcastSettings> {
    let defaults =
        serde_json::to_value(RoomcastSettings::default()).map_err(SettingsError::Defaults)?;
    let malformed = |source: serde_json::Error| SettingsError::Malformed {
        path: path.to_path_buf(),
        source,
    };

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let user: Value = serde_json::from_str(&content).map_err(malformed)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: RoomcastSettings = serde_json::from_value(merged).map_err(malformed)?;
    apply_overrides(&mut settings, env);
    settings.validate()?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `ROOMCAST_*` overrides read through `env`.
///
/// Invalid values are ignored with a warning and the file/default value is kept.
fn apply_overrides(settings: &mut RoomcastSettings, env: impl Fn(&str) -> Option<String>) {
    let read = |name: &str| env(name).filter(|v| !v.is_empty());

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = read("ROOMCAST_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = parsed(&read, "ROOMCAST_PORT", |v| parse_u16_range(v, 1, 65535)) {
        settings.server.port = v;
    }
    if let Some(v) = parsed(&read, "ROOMCAST_MAX_MESSAGE_SIZE", |v| {
        parse_usize_range(v, 1024, 64 * 1024 * 1024)
    }) {
        settings.server.max_message_size = v;
    }

    // ── Hub ─────────────────────────────────────────────────────────
    if let Some(v) = parsed(&read, "ROOMCAST_QUEUE_CAPACITY", |v| {
        parse_usize_range(v, 1, 1_000_000)
    }) {
        settings.hub.outbound_queue_capacity = v;
    }
    if let Some(v) = parsed(&read, "ROOMCAST_KEEPALIVE_MS", |v| {
        parse_u64_range(v, 1000, 3_600_000)
    }) {
        settings.hub.keepalive_interval_ms = v;
    }
    if let Some(v) = parsed(&read, "ROOMCAST_COMMAND_BUFFER", |v| {
        parse_usize_range(v, 1, 1_000_000)
    }) {
        settings.hub.command_buffer = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = parsed(&read, "ROOMCAST_LOG_LEVEL", |v| v.parse::<LogLevel>().ok()) {
        settings.logging.level = v;
    }
    if let Some(v) = parsed(&read, "ROOMCAST_LOG_FORMAT", |v| v.parse::<LogFormat>().ok()) {
        settings.logging.format = v;
    }
}

fn parsed<T>(
    read: &dyn Fn(&str) -> Option<String>,
    name: &str,
    parse: impl FnOnce(&str) -> Option<T>,
) -> Option<T> {
    let val = read(name)?;
    let result = parse(&val);
    if result.is_none() {
        warn!(key = name, value = %val, "invalid env var, ignoring");
    }
    result
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"server": {"port": 8080, "host": "localhost"}});
        let source = serde_json::json!({"server": {"port": 9090}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["server"]["port"], 9090);
        assert_eq!(merged["server"]["host"], "localhost");
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"items": [1, 2, 3]});
        let source = serde_json::json!({"items": [4]});
        assert_eq!(deep_merge(target, source)["items"], serde_json::json!([4]));
    }

    #[test]
    fn merge_new_keys_added() {
        let merged = deep_merge(serde_json::json!({"a": 1}), serde_json::json!({"b": 2}));
        assert_eq!(merged, serde_json::json!({"a": 1, "b": 2}));
    }

    #[test]
    fn merge_primitive_replaces_object() {
        let target = serde_json::json!({"a": {"nested": true}});
        let source = serde_json::json!({"a": 42});
        assert_eq!(deep_merge(target, source)["a"], 42);
    }

    // ── loading ─────────────────────────────────────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let settings = load_with_env(Path::new("/nonexistent/settings.json"), no_env).unwrap();
        assert_eq!(settings, RoomcastSettings::default());
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"server": {"port": 9090}, "hub": {"outboundQueueCapacity": 4}, "logging": {"format": "json"}}"#,
        )
        .unwrap();

        let settings = load_with_env(&path, no_env).unwrap();
        assert_eq!(settings.server.port, 9090);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.hub.outbound_queue_capacity, 4);
        assert_eq!(settings.hub.keepalive_interval_ms, 54_000);
        assert_eq!(settings.logging.format, LogFormat::Json);
        assert_eq!(settings.logging.level, LogLevel::Info);
    }

    #[test]
    fn load_null_keeps_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server": {"host": null}}"#).unwrap();
        let settings = load_with_env(&path, no_env).unwrap();
        assert_eq!(settings.server.host, "0.0.0.0");
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();
        assert_matches!(
            load_with_env(&path, no_env),
            Err(SettingsError::Malformed { path: p, .. }) if p == path
        );
    }

    #[test]
    fn load_wrong_type_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server": {"port": "eighty"}}"#).unwrap();
        let err = load_with_env(&path, no_env).unwrap_err();
        assert_matches!(err, SettingsError::Malformed { .. });
        assert!(err.to_string().contains("settings.json"), "{err}");
    }

    #[test]
    fn load_zero_capacity_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"hub": {"outboundQueueCapacity": 0}}"#).unwrap();
        assert_matches!(load_with_env(&path, no_env), Err(SettingsError::Invalid(_)));
    }

    #[test]
    fn env_beats_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server": {"port": 9090}}"#).unwrap();
        let env = env_of(&[("ROOMCAST_PORT", "7000"), ("ROOMCAST_LOG_LEVEL", "debug")]);
        let settings = load_with_env(&path, env).unwrap();
        assert_eq!(settings.server.port, 7000);
        assert_eq!(settings.logging.level, LogLevel::Debug);
    }

    #[test]
    fn load_unreadable_path_reports_it() {
        // A directory exists but cannot be read as a file.
        let dir = tempfile::tempdir().unwrap();
        assert_matches!(
            load_with_env(dir.path(), no_env),
            Err(SettingsError::Read { path, .. }) if path == dir.path()
        );
    }

    // ── env overrides ───────────────────────────────────────────────

    #[test]
    fn overrides_every_section() {
        let mut settings = RoomcastSettings::default();
        apply_overrides(
            &mut settings,
            env_of(&[
                ("ROOMCAST_HOST", "127.0.0.1"),
                ("ROOMCAST_PORT", "9000"),
                ("ROOMCAST_MAX_MESSAGE_SIZE", "4096"),
                ("ROOMCAST_QUEUE_CAPACITY", "16"),
                ("ROOMCAST_KEEPALIVE_MS", "30000"),
                ("ROOMCAST_COMMAND_BUFFER", "64"),
                ("ROOMCAST_LOG_LEVEL", "warn"),
                ("ROOMCAST_LOG_FORMAT", "json"),
            ]),
        );
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.server.max_message_size, 4096);
        assert_eq!(settings.hub.outbound_queue_capacity, 16);
        assert_eq!(settings.hub.keepalive_interval_ms, 30_000);
        assert_eq!(settings.hub.command_buffer, 64);
        assert_eq!(settings.logging.level, LogLevel::Warn);
        assert_eq!(settings.logging.format, LogFormat::Json);
    }

    #[test]
    fn invalid_overrides_are_ignored() {
        let mut settings = RoomcastSettings::default();
        apply_overrides(
            &mut settings,
            env_of(&[
                ("ROOMCAST_HOST", ""),
                ("ROOMCAST_PORT", "0"),
                ("ROOMCAST_QUEUE_CAPACITY", "lots"),
                ("ROOMCAST_KEEPALIVE_MS", "10"),
                ("ROOMCAST_LOG_LEVEL", "shouty"),
                ("ROOMCAST_LOG_FORMAT", "pretty"),
            ]),
        );
        assert_eq!(settings, RoomcastSettings::default());
    }

    // ── parse_*_range ───────────────────────────────────────────────

    #[test]
    fn parse_u16_bounds() {
        assert_eq!(parse_u16_range("9090", 1, 65535), Some(9090));
        assert_eq!(parse_u16_range("65535", 1, 65535), Some(65535));
        assert_eq!(parse_u16_range("0", 1, 65535), None);
        assert_eq!(parse_u16_range("99999", 1, 65535), None);
        assert_eq!(parse_u16_range("", 1, 65535), None);
    }

    #[test]
    fn parse_u64_bounds() {
        assert_eq!(parse_u64_range("54000", 1000, 3_600_000), Some(54_000));
        assert_eq!(parse_u64_range("500", 1000, 3_600_000), None);
        assert_eq!(parse_u64_range("abc", 1000, 3_600_000), None);
    }

    #[test]
    fn parse_usize_bounds() {
        assert_eq!(parse_usize_range("256", 1, 1_000_000), Some(256));
        assert_eq!(parse_usize_range("0", 1, 1_000_000), None);
    }
}
