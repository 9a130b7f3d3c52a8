// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic trait definitions for native capabilities.
//
// Each trait is one OS surface the channel handler talks to. Implementations
// make a single OS call per method and report failures as `GlobyError`;
// deciding what the host sees is the handler's job, not theirs.

use globy_core::error::Result;
use globy_core::types::{BatterySnapshot, Contact, Permission};

use crate::capabilities::SmsManagerSource;

/// Unified bridge that groups all native capabilities.
pub trait DeviceBridge:
    NativeBattery + NativeSms + NativeDialer + NativeContacts + NativePermissions + Send + Sync
{
    /// Human-readable platform name (e.g. "Android").
    fn platform_name(&self) -> &str;

    /// OS API level (`Build.VERSION.SDK_INT` on Android, 0 where there is none).
    fn sdk_level(&self) -> Result<u32>;
}

/// Battery charge readings.
pub trait NativeBattery {
    /// Read `BATTERY_PROPERTY_CAPACITY` from the battery service (API 21+).
    fn battery_capacity(&self) -> Result<i32>;

    /// Read the level/scale extras of the sticky battery-changed broadcast.
    fn battery_snapshot(&self) -> Result<BatterySnapshot>;
}

/// Outgoing text messages.
pub trait NativeSms {
    /// Split a message the way the platform SMS manager will transmit it.
    fn divide_message(&self, source: SmsManagerSource, text: &str) -> Result<Vec<String>>;

    /// Send all parts to `destination` as one multipart message.
    fn send_multipart_text(
        &self,
        source: SmsManagerSource,
        destination: &str,
        parts: &[String],
    ) -> Result<()>;
}

/// Outgoing phone calls.
pub trait NativeDialer {
    /// Launch the system call action for `phone`. Returns once the intent
    /// has been dispatched; the call itself is not awaited.
    fn launch_call(&self, phone: &str) -> Result<()>;
}

/// Device contact store.
pub trait NativeContacts {
    /// Every phone-number row, in cursor order. An absent cursor is an
    /// empty list, not an error.
    fn query_phone_contacts(&self) -> Result<Vec<Contact>>;
}

/// Runtime permission state and prompts.
pub trait NativePermissions {
    /// Whether `permission` is currently granted to this app.
    fn is_granted(&self, permission: Permission) -> Result<bool>;

    /// Whether the OS allows showing a rationale, i.e. the user has not
    /// permanently denied `permission`.
    fn should_show_rationale(&self, permission: Permission) -> Result<bool>;

    /// Show the system permission prompt. The user's answer arrives later
    /// through the grant-result notification carrying `request_code`.
    fn request_permissions(&self, permissions: &[Permission], request_code: i32) -> Result<()>;
}
