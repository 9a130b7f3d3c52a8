// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stub bridge for desktop/CI builds where native mobile APIs are unavailable.
//
// Every trait method returns `PlatformUnavailable`; the real implementation
// lives in the `android` module.

use globy_core::error::{GlobyError, Result};
use globy_core::types::{BatterySnapshot, Contact, Permission};

use crate::capabilities::SmsManagerSource;
use crate::traits::*;

/// No-op bridge returned on non-mobile platforms.
pub struct StubBridge;

impl DeviceBridge for StubBridge {
    fn platform_name(&self) -> &str {
        "Desktop (stub)"
    }

    fn sdk_level(&self) -> Result<u32> {
        Err(GlobyError::PlatformUnavailable)
    }
}

impl NativeBattery for StubBridge {
    fn battery_capacity(&self) -> Result<i32> {
        tracing::warn!("NativeBattery::battery_capacity called on stub bridge");
        Err(GlobyError::PlatformUnavailable)
    }

    fn battery_snapshot(&self) -> Result<BatterySnapshot> {
        tracing::warn!("NativeBattery::battery_snapshot called on stub bridge");
        Err(GlobyError::PlatformUnavailable)
    }
}

impl NativeSms for StubBridge {
    fn divide_message(&self, _source: SmsManagerSource, text: &str) -> Result<Vec<String>> {
        Ok(globy_core::sms::divide_message(text))
    }

    fn send_multipart_text(
        &self,
        _source: SmsManagerSource,
        _destination: &str,
        _parts: &[String],
    ) -> Result<()> {
        tracing::warn!("NativeSms::send_multipart_text called on stub bridge");
        Err(GlobyError::PlatformUnavailable)
    }
}

impl NativeDialer for StubBridge {
    fn launch_call(&self, _phone: &str) -> Result<()> {
        tracing::warn!("NativeDialer::launch_call called on stub bridge");
        Err(GlobyError::PlatformUnavailable)
    }
}

impl NativeContacts for StubBridge {
    fn query_phone_contacts(&self) -> Result<Vec<Contact>> {
        Err(GlobyError::PlatformUnavailable)
    }
}

impl NativePermissions for StubBridge {
    fn is_granted(&self, _permission: Permission) -> Result<bool> {
        Err(GlobyError::PlatformUnavailable)
    }

    fn should_show_rationale(&self, _permission: Permission) -> Result<bool> {
        Err(GlobyError::PlatformUnavailable)
    }

    fn request_permissions(&self, _permissions: &[Permission], _request_code: i32) -> Result<()> {
        Err(GlobyError::PlatformUnavailable)
    }
}
