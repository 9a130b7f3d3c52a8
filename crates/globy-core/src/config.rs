// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bridge configuration.
//
// The host shell may pass a JSON document at initialisation time; any field
// it leaves out falls back to the default below.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{GlobyError, Result};

/// Android only accepts permission request codes in the lower 16 bits.
pub const MAX_REQUEST_CODE: i32 = 0xFFFF;

/// Number of consecutive request codes the permission broker cycles through.
pub const REQUEST_CODE_WINDOW: i32 = 256;

/// Runtime settings for the device bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Name of the host method channel the bridge answers on.
    pub channel_name: String,
    /// First request code used for interactive permission requests.
    pub permission_request_code: i32,
    /// How long a permission check waits for the user's decision.
    pub permission_timeout_ms: u64,
    /// Ask for every bridge permission once, when the bridge starts.
    pub request_permissions_on_start: bool,
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` wins when set.
    pub log_filter: Option<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            channel_name: "samples.flutter.dev/main_channel".into(),
            permission_request_code: 2,
            permission_timeout_ms: 30_000,
            request_permissions_on_start: true,
            log_filter: None,
        }
    }
}

impl BridgeConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON configuration file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "loading bridge config");
        Self::from_json_str(&data)
    }

    pub fn permission_timeout(&self) -> Duration {
        Duration::from_millis(self.permission_timeout_ms)
    }

    /// Reject settings the bridge cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.channel_name.trim().is_empty() {
            return Err(GlobyError::Config("channel_name must not be empty".into()));
        }
        let highest_base = MAX_REQUEST_CODE - REQUEST_CODE_WINDOW + 1;
        if !(0..=highest_base).contains(&self.permission_request_code) {
            return Err(GlobyError::Config(format!(
                "permission_request_code must lie in 0..={highest_base}"
            )));
        }
        if self.permission_timeout_ms == 0 {
            return Err(GlobyError::Config(
                "permission_timeout_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = BridgeConfig::default();
        config.validate().expect("default config validates");
        assert_eq!(config.permission_request_code, 2);
        assert_eq!(config.permission_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config =
            BridgeConfig::from_json_str(r#"{"permission_timeout_ms": 500}"#).expect("parse");
        assert_eq!(config.permission_timeout_ms, 500);
        assert_eq!(config.channel_name, "samples.flutter.dev/main_channel");
        assert!(config.request_permissions_on_start);
    }

    #[test]
    fn out_of_range_request_code_is_rejected() {
        let err = BridgeConfig::from_json_str(r#"{"permission_request_code": 65535}"#)
            .expect_err("code window exceeds 16 bits");
        assert!(matches!(err, GlobyError::Config(_)));
    }

    #[test]
    fn extreme_request_codes_are_rejected() {
        for code in [i32::MAX, i32::MIN, -1] {
            let err = BridgeConfig::from_json_str(&format!(r#"{{"permission_request_code": {code}}}"#))
                .expect_err("request code outside the 16-bit window");
            assert!(matches!(err, GlobyError::Config(_)), "code {code}");
        }
    }

    #[test]
    fn highest_request_code_base_is_accepted() {
        let base = MAX_REQUEST_CODE - REQUEST_CODE_WINDOW + 1;
        let config = BridgeConfig::from_json_str(&format!(r#"{{"permission_request_code": {base}}}"#))
            .expect("last base whose window still fits");
        assert_eq!(config.permission_request_code, base);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = BridgeConfig::from_json_str(r#"{"permission_timeout_ms": 0}"#)
            .expect_err("zero timeout");
        assert!(matches!(err, GlobyError::Config(_)));
    }

    #[test]
    fn malformed_json_is_a_serialization_error() {
        let err = BridgeConfig::from_json_str("{not json").expect_err("malformed");
        assert!(matches!(err, GlobyError::Serialization(_)));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{"channel_name": "globy/test", "request_permissions_on_start": false}}"#
        )
        .expect("write config");

        let config = BridgeConfig::load(file.path()).expect("load");
        assert_eq!(config.channel_name, "globy/test");
        assert!(!config.request_permissions_on_start);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = BridgeConfig::load(&dir.path().join("absent.json")).expect_err("missing");
        assert!(matches!(err, GlobyError::Io(_)));
    }
}
