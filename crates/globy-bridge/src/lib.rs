// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! Globy: native device bridge.
//!
//! The `traits` module describes the handset surfaces the channel needs
//! (battery, SMS, dialer, contacts, runtime permissions). `channel` serves
//! method-channel requests against any implementation of them: the JNI
//! bridge on Android, a stub elsewhere, or `simulated` in tests.

pub mod capabilities;
pub mod channel;
pub mod permissions;
pub mod simulated;
pub mod traits;

#[cfg(target_os = "android")]
pub mod android;

#[cfg(not(target_os = "android"))]
pub mod stub;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

pub use capabilities::{BatteryStrategy, Capabilities, SmsManagerSource};
pub use channel::ChannelHandler;
pub use permissions::{GrantResult, PermissionBroker};
pub use traits::DeviceBridge;

/// Fallback log filter when neither `RUST_LOG` nor the config sets one.
const DEFAULT_LOG_FILTER: &str = "info";

/// The bridge implementation for the target operating system.
pub fn platform_bridge() -> Arc<dyn DeviceBridge> {
    #[cfg(target_os = "android")]
    {
        Arc::new(android::AndroidBridge::new())
    }
    #[cfg(not(target_os = "android"))]
    {
        Arc::new(stub::StubBridge)
    }
}

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins over `config_filter`. On Android events go to logcat
/// under the `globy` tag, elsewhere to stdout. Calling this twice is
/// harmless: the second install is refused and logged at debug level.
pub fn init_tracing(config_filter: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config_filter.unwrap_or(DEFAULT_LOG_FILTER)));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    #[cfg(target_os = "android")]
    let installed = builder
        .with_writer(android::logcat::Logcat)
        .with_ansi(false)
        .without_time()
        .try_init();
    #[cfg(not(target_os = "android"))]
    let installed = builder.try_init();

    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_build_uses_stub_bridge() {
        let bridge = platform_bridge();
        assert_eq!(bridge.platform_name(), "Desktop (stub)");
        assert!(bridge.sdk_level().is_err());
    }

    #[test]
    fn init_tracing_twice_does_not_panic() {
        init_tracing(Some("debug"));
        init_tracing(None);
    }
}
