// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory device for host-side development and tests.
//
// Every OS surface is backed by plain state that tests can set up and
// inspect afterwards: which numbers were dialled, which SMS parts were sent,
// which permission prompts were shown.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use globy_core::error::{GlobyError, Result};
use globy_core::sms;
use globy_core::types::{BatterySnapshot, Contact, Permission};

use crate::capabilities::SmsManagerSource;
use crate::traits::*;

/// A multipart SMS the simulated device accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentSms {
    pub destination: String,
    pub parts: Vec<String>,
    pub source: SmsManagerSource,
}

/// A permission prompt the simulated device was asked to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionPrompt {
    pub permissions: Vec<Permission>,
    pub request_code: i32,
}

#[derive(Debug)]
struct DeviceState {
    sdk_level: u32,
    battery_capacity: i32,
    battery_snapshot: BatterySnapshot,
    granted: HashSet<Permission>,
    rationale: HashSet<Permission>,
    /// `None` models a null cursor.
    contacts: Option<Vec<Contact>>,
    contacts_fail: bool,
    sms_fail: bool,
    dial_fail: bool,
    sent: Vec<SentSms>,
    dialed: Vec<String>,
    prompts: Vec<PermissionPrompt>,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            sdk_level: 34,
            battery_capacity: 85,
            battery_snapshot: BatterySnapshot {
                level: Some(85),
                scale: Some(100),
            },
            granted: HashSet::new(),
            rationale: HashSet::new(),
            contacts: Some(Vec::new()),
            contacts_fail: false,
            sms_fail: false,
            dial_fail: false,
            sent: Vec::new(),
            dialed: Vec::new(),
            prompts: Vec::new(),
        }
    }
}

/// Scriptable stand-in for a handset.
#[derive(Debug, Default)]
pub struct SimulatedDevice {
    state: Mutex<DeviceState>,
}

impl SimulatedDevice {
    /// A device on API 34 with 85% battery, no contacts and nothing granted.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -- Setup --------------------------------------------------------------

    pub fn set_sdk_level(&self, level: u32) {
        self.state().sdk_level = level;
    }

    /// Raw `BATTERY_PROPERTY_CAPACITY` reading; -1 models "unknown".
    pub fn set_battery_capacity(&self, capacity: i32) {
        self.state().battery_capacity = capacity;
    }

    pub fn set_battery_snapshot(&self, snapshot: BatterySnapshot) {
        self.state().battery_snapshot = snapshot;
    }

    pub fn grant(&self, permission: Permission) {
        self.state().granted.insert(permission);
    }

    /// Whether the OS would allow a rationale for `permission`.
    pub fn set_rationale(&self, permission: Permission, showable: bool) {
        let mut state = self.state();
        if showable {
            state.rationale.insert(permission);
        } else {
            state.rationale.remove(&permission);
        }
    }

    pub fn set_contacts(&self, contacts: Vec<Contact>) {
        self.state().contacts = Some(contacts);
    }

    /// Make the contacts query return a null cursor.
    pub fn set_contacts_cursor_null(&self) {
        self.state().contacts = None;
    }

    pub fn fail_contacts_query(&self, fail: bool) {
        self.state().contacts_fail = fail;
    }

    pub fn fail_sms(&self, fail: bool) {
        self.state().sms_fail = fail;
    }

    pub fn fail_dial(&self, fail: bool) {
        self.state().dial_fail = fail;
    }

    // -- Inspection ---------------------------------------------------------

    pub fn sent_messages(&self) -> Vec<SentSms> {
        self.state().sent.clone()
    }

    pub fn dialed_numbers(&self) -> Vec<String> {
        self.state().dialed.clone()
    }

    pub fn permission_prompts(&self) -> Vec<PermissionPrompt> {
        self.state().prompts.clone()
    }
}

impl DeviceBridge for SimulatedDevice {
    fn platform_name(&self) -> &str {
        "Simulated"
    }

    fn sdk_level(&self) -> Result<u32> {
        Ok(self.state().sdk_level)
    }
}

impl NativeBattery for SimulatedDevice {
    fn battery_capacity(&self) -> Result<i32> {
        Ok(self.state().battery_capacity)
    }

    fn battery_snapshot(&self) -> Result<BatterySnapshot> {
        Ok(self.state().battery_snapshot)
    }
}

impl NativeSms for SimulatedDevice {
    fn divide_message(&self, _source: SmsManagerSource, text: &str) -> Result<Vec<String>> {
        Ok(sms::divide_message(text))
    }

    fn send_multipart_text(
        &self,
        source: SmsManagerSource,
        destination: &str,
        parts: &[String],
    ) -> Result<()> {
        let mut state = self.state();
        if state.sms_fail {
            return Err(GlobyError::OperationFailed(
                "simulated SmsManager rejected the message".into(),
            ));
        }
        state.sent.push(SentSms {
            destination: destination.to_string(),
            parts: parts.to_vec(),
            source,
        });
        Ok(())
    }
}

impl NativeDialer for SimulatedDevice {
    fn launch_call(&self, phone: &str) -> Result<()> {
        let mut state = self.state();
        if state.dial_fail {
            return Err(GlobyError::OperationFailed(
                "simulated ACTION_CALL rejected".into(),
            ));
        }
        state.dialed.push(phone.to_string());
        Ok(())
    }
}

impl NativeContacts for SimulatedDevice {
    fn query_phone_contacts(&self) -> Result<Vec<Contact>> {
        let state = self.state();
        if state.contacts_fail {
            return Err(GlobyError::Bridge("simulated contacts query failure".into()));
        }
        Ok(state.contacts.clone().unwrap_or_default())
    }
}

impl NativePermissions for SimulatedDevice {
    fn is_granted(&self, permission: Permission) -> Result<bool> {
        Ok(self.state().granted.contains(&permission))
    }

    fn should_show_rationale(&self, permission: Permission) -> Result<bool> {
        Ok(self.state().rationale.contains(&permission))
    }

    fn request_permissions(&self, permissions: &[Permission], request_code: i32) -> Result<()> {
        self.state().prompts.push(PermissionPrompt {
            permissions: permissions.to_vec(),
            request_code,
        });
        Ok(())
    }
}
