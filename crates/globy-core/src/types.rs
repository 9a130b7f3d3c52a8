// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Globy device bridge.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{GlobyError, Result};
use crate::signal::ErrorSignal;

// ---------------------------------------------------------------------------
// Permissions
// ---------------------------------------------------------------------------

/// A single Android runtime permission the bridge depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    CallPhone,
    SendSms,
    ReadSms,
    ReceiveSms,
    ReadContacts,
}

impl Permission {
    /// Every permission the bridge uses, in the order it asks for them at startup.
    pub const ALL: [Permission; 5] = [
        Permission::SendSms,
        Permission::ReadSms,
        Permission::ReceiveSms,
        Permission::CallPhone,
        Permission::ReadContacts,
    ];

    /// The `android.Manifest.permission` identifier.
    pub fn android_name(self) -> &'static str {
        match self {
            Permission::CallPhone => "android.permission.CALL_PHONE",
            Permission::SendSms => "android.permission.SEND_SMS",
            Permission::ReadSms => "android.permission.READ_SMS",
            Permission::ReceiveSms => "android.permission.RECEIVE_SMS",
            Permission::ReadContacts => "android.permission.READ_CONTACTS",
        }
    }

    pub fn from_android_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.android_name() == name)
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.android_name())
    }
}

/// The permission groups a host may ask about through `check_permission`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PermissionType {
    CallPhone,
    SendSms,
    ReadSms,
    ReceiveSms,
    ReadContacts,
    /// Send, read and receive SMS together.
    AllSms,
}

impl PermissionType {
    /// Parse the wire tag sent by the host. Unknown tags yield `None`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "call_phone" => Some(Self::CallPhone),
            "send_sms" => Some(Self::SendSms),
            "read_sms" => Some(Self::ReadSms),
            "receive_sms" => Some(Self::ReceiveSms),
            "contact" | "read_contacts" => Some(Self::ReadContacts),
            "all_sms" => Some(Self::AllSms),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Self::CallPhone => "call_phone",
            Self::SendSms => "send_sms",
            Self::ReadSms => "read_sms",
            Self::ReceiveSms => "receive_sms",
            Self::ReadContacts => "contact",
            Self::AllSms => "all_sms",
        }
    }

    /// The OS permissions that must all be granted for this type.
    pub fn permissions(self) -> &'static [Permission] {
        match self {
            Self::CallPhone => &[Permission::CallPhone],
            Self::SendSms => &[Permission::SendSms],
            Self::ReadSms => &[Permission::ReadSms],
            Self::ReceiveSms => &[Permission::ReceiveSms],
            Self::ReadContacts => &[Permission::ReadContacts],
            Self::AllSms => &[
                Permission::SendSms,
                Permission::ReadSms,
                Permission::ReceiveSms,
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// Device values
// ---------------------------------------------------------------------------

/// One row of the phone-number contacts table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub raw_contact_id: String,
    pub display_name: String,
    pub number: String,
}

/// Battery charge as a percentage, always within 0..=100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BatteryLevel(u8);

impl BatteryLevel {
    /// Accept a raw capacity reading. Negative values (the OS reports -1 or
    /// `Integer.MIN_VALUE` when it cannot tell) and readings above 100 yield `None`.
    pub fn from_capacity(capacity: i32) -> Option<Self> {
        u8::try_from(capacity)
            .ok()
            .filter(|pct| *pct <= 100)
            .map(Self)
    }

    pub fn percent(self) -> u8 {
        self.0
    }
}

/// Extras read from the sticky `ACTION_BATTERY_CHANGED` broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatterySnapshot {
    pub level: Option<i32>,
    pub scale: Option<i32>,
}

impl BatterySnapshot {
    /// `level * 100 / scale`, or `None` if either extra is missing or the
    /// scale cannot be divided by.
    pub fn battery_level(&self) -> Option<BatteryLevel> {
        let level = self.level.filter(|l| *l >= 0)?;
        let scale = self.scale.filter(|s| *s > 0)?;
        let pct = i64::from(level) * 100 / i64::from(scale);
        BatteryLevel::from_capacity(i32::try_from(pct).ok()?)
    }
}

// ---------------------------------------------------------------------------
// Channel requests
// ---------------------------------------------------------------------------

/// A request from the host shell, decoded from its method name and arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodCall {
    GetBatteryLevel,
    SendSms { phone: String, message: String },
    CallPhone { phone: String },
    GetContacts,
    /// `None` when the host sent a type tag the bridge does not know.
    CheckPermission { permission: Option<PermissionType> },
    CanStartReceiveSms,
}

impl MethodCall {
    /// Decode a named method call. Unknown method names fail with
    /// [`GlobyError::UnknownMethod`]; missing required arguments with
    /// [`GlobyError::MissingArgument`].
    pub fn decode(method: &str, args: &Map<String, Value>) -> Result<Self> {
        match method {
            "get_battery_level" => Ok(Self::GetBatteryLevel),
            "send_sms" => Ok(Self::SendSms {
                phone: phone_arg(args)?,
                message: string_arg(args, "msg")
                    .or_else(|| string_arg(args, "message"))
                    .ok_or(GlobyError::MissingArgument("msg"))?,
            }),
            "call_phone" => Ok(Self::CallPhone {
                phone: phone_arg(args)?,
            }),
            "get_contacts" => Ok(Self::GetContacts),
            "check_permission" => Ok(Self::CheckPermission {
                permission: string_arg(args, "type")
                    .as_deref()
                    .and_then(PermissionType::from_tag),
            }),
            "can_start_receive_sms" => Ok(Self::CanStartReceiveSms),
            other => Err(GlobyError::UnknownMethod(other.to_string())),
        }
    }

    /// Decode from the JSON argument document the Android host forwards.
    /// An empty or `null` document is treated as no arguments.
    pub fn decode_json(method: &str, args_json: &str) -> Result<Self> {
        let args = match args_json.trim() {
            "" | "null" => Map::new(),
            json => match serde_json::from_str::<Value>(json)? {
                Value::Object(map) => map,
                Value::Null => Map::new(),
                _ => return Err(GlobyError::MissingArgument("arguments")),
            },
        };
        Self::decode(method, &args)
    }

    /// Wire name of the method, used in logs and error details.
    pub fn method_name(&self) -> &'static str {
        match self {
            Self::GetBatteryLevel => "get_battery_level",
            Self::SendSms { .. } => "send_sms",
            Self::CallPhone { .. } => "call_phone",
            Self::GetContacts => "get_contacts",
            Self::CheckPermission { .. } => "check_permission",
            Self::CanStartReceiveSms => "can_start_receive_sms",
        }
    }
}

fn string_arg(args: &Map<String, Value>, key: &str) -> Option<String> {
    match args.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn phone_arg(args: &Map<String, Value>) -> Result<String> {
    string_arg(args, "phone")
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .ok_or(GlobyError::MissingArgument("phone"))
}

// ---------------------------------------------------------------------------
// Channel responses
// ---------------------------------------------------------------------------

/// A successful result value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChannelValue {
    Int(i64),
    Bool(bool),
    Text(String),
    Contacts(Vec<Contact>),
}

/// The single reply sent back to the host for every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "payload", rename_all = "snake_case")]
pub enum ChannelResponse {
    Success(ChannelValue),
    Error(ErrorSignal),
    NotImplemented,
}

impl ChannelResponse {
    pub fn success(value: ChannelValue) -> Self {
        Self::Success(value)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
