// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OS-version capability detection.
//
// The API level is read once when the channel handler is built and turned
// into the strategies below, so individual calls never branch on versions.

use tracing::{info, warn};

use crate::traits::DeviceBridge;

/// `Build.VERSION_CODES.LOLLIPOP`: first level with `BATTERY_PROPERTY_CAPACITY`.
pub const BATTERY_PROPERTY_MIN_SDK: u32 = 21;

/// `Build.VERSION_CODES.S`: first level where `SmsManager` is a system service.
pub const SMS_SYSTEM_SERVICE_MIN_SDK: u32 = 31;

/// How the battery level is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryStrategy {
    /// `BatteryManager.getIntProperty(BATTERY_PROPERTY_CAPACITY)`.
    CapacityProperty,
    /// `level * 100 / scale` from the sticky `ACTION_BATTERY_CHANGED` intent.
    ChangedBroadcast,
}

/// Where the SMS manager comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmsManagerSource {
    /// `Context.getSystemService(SmsManager.class)`.
    SystemService,
    /// `SmsManager.getDefault()` (deprecated from API 31).
    LegacyDefault,
}

/// Strategies resolved for the running device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// `None` when the platform could not report an API level.
    pub sdk_level: Option<u32>,
    pub battery: BatteryStrategy,
    pub sms_manager: SmsManagerSource,
}

impl Capabilities {
    /// Resolve strategies for a known API level.
    pub fn for_sdk(sdk_level: u32) -> Self {
        let battery = if sdk_level >= BATTERY_PROPERTY_MIN_SDK {
            BatteryStrategy::CapacityProperty
        } else {
            BatteryStrategy::ChangedBroadcast
        };
        let sms_manager = if sdk_level >= SMS_SYSTEM_SERVICE_MIN_SDK {
            SmsManagerSource::SystemService
        } else {
            SmsManagerSource::LegacyDefault
        };
        Self {
            sdk_level: Some(sdk_level),
            battery,
            sms_manager,
        }
    }

    /// Query the device once. An unknown level selects the current APIs.
    pub fn detect(device: &dyn DeviceBridge) -> Self {
        match device.sdk_level() {
            Ok(level) => {
                let caps = Self::for_sdk(level);
                info!(
                    platform = device.platform_name(),
                    sdk = level,
                    battery = ?caps.battery,
                    sms_manager = ?caps.sms_manager,
                    "device capabilities detected"
                );
                caps
            }
            Err(e) => {
                warn!(platform = device.platform_name(), error = %e, "API level unknown, assuming current APIs");
                Self {
                    sdk_level: None,
                    battery: BatteryStrategy::CapacityProperty,
                    sms_manager: SmsManagerSource::SystemService,
                }
            }
        }
    }
}
