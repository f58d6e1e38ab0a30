//! # roomcast-settings
//!
//! Layered configuration for the roomcast daemon.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`RoomcastSettings::default()`]
//! 2. **Settings file**: `~/.roomcast/settings.json` or an explicit path
//!    (deep-merged over defaults)
//! 3. **Environment variables**: `ROOMCAST_*` overrides (highest priority)
//!
//! Command-line flags are applied on top by the binary.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_exports_work() {
        let _settings = RoomcastSettings::default();
        assert!(settings_path().ends_with(".roomcast/settings.json"));
    }

    #[test]
    fn deep_merge_re_exported() {
        let merged = deep_merge(serde_json::json!({"x": 1}), serde_json::json!({"y": 2}));
        assert_eq!(merged, serde_json::json!({"x": 1, "y": 2}));
    }
}
