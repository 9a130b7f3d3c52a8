// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Method-channel dispatcher.
//
// One request in, at most one OS action, one response out. Every failure is
// converted here into an error signal or a safe default, so nothing a device
// implementation raises ever reaches the host as a fault.

use std::sync::Arc;

use globy_core::config::BridgeConfig;
use globy_core::error::{GlobyError, Result};
use globy_core::signal::ErrorSignal;
use globy_core::types::{
    BatteryLevel, ChannelResponse, ChannelValue, Contact, MethodCall, Permission, PermissionType,
};
use serde_json::{Map, Value};
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::capabilities::{BatteryStrategy, Capabilities};
use crate::permissions::{GrantResult, PermissionBroker};
use crate::traits::DeviceBridge;

/// Serves host requests against one device.
pub struct ChannelHandler {
    device: Arc<dyn DeviceBridge>,
    capabilities: Capabilities,
    permissions: PermissionBroker,
    config: BridgeConfig,
}

impl ChannelHandler {
    /// Build a handler, detecting the device's capabilities once.
    pub fn new(device: Arc<dyn DeviceBridge>, config: BridgeConfig) -> Self {
        let capabilities = Capabilities::detect(device.as_ref());
        let permissions = PermissionBroker::from_config(&config);
        info!(
            channel = %config.channel_name,
            platform = device.platform_name(),
            "channel handler ready"
        );
        Self {
            device,
            capabilities,
            permissions,
            config,
        }
    }

    /// Ask for every bridge permission at once, without waiting for the
    /// answer. Returns the request code, or `None` if disabled or refused.
    pub fn request_startup_permissions(&self) -> Option<i32> {
        if !self.config.request_permissions_on_start {
            return None;
        }
        match self
            .permissions
            .request_without_waiting(self.device.as_ref(), &Permission::ALL)
        {
            Ok(code) => Some(code),
            Err(e) => {
                warn!(error = %e, "startup permission request failed");
                None
            }
        }
    }

    /// Forward `onRequestPermissionsResult` to whichever check is waiting.
    pub fn on_permissions_result(
        &self,
        request_code: i32,
        permissions: &[String],
        grant_results: &[i32],
    ) -> bool {
        self.permissions.complete(
            request_code,
            GrantResult::from_platform(permissions, grant_results),
        )
    }

    /// Decode and serve a named request.
    pub async fn handle_raw(&self, method: &str, args: &Map<String, Value>) -> ChannelResponse {
        match MethodCall::decode(method, args) {
            Ok(call) => self.handle(call).await,
            Err(e) => decode_failure(method, &e),
        }
    }

    /// Decode and serve a request whose arguments arrive as a JSON document.
    pub async fn handle_json(&self, method: &str, args_json: &str) -> ChannelResponse {
        match MethodCall::decode_json(method, args_json) {
            Ok(call) => self.handle(call).await,
            Err(e) => decode_failure(method, &e),
        }
    }

    /// Serve one typed request.
    pub async fn handle(&self, call: MethodCall) -> ChannelResponse {
        let span = info_span!("channel_call", call_id = %Uuid::new_v4(), method = call.method_name());
        async move {
            let result = match &call {
                MethodCall::GetBatteryLevel => self
                    .battery_level()
                    .map(|level| ChannelValue::Int(i64::from(level.percent()))),
                MethodCall::SendSms { phone, message } => {
                    self.send_sms(phone, message).map(ChannelValue::Text)
                }
                MethodCall::CallPhone { phone } => {
                    self.call_phone(phone).map(|()| ChannelValue::Int(0))
                }
                MethodCall::GetContacts => Ok(ChannelValue::Contacts(self.contacts())),
                MethodCall::CheckPermission { permission } => {
                    Ok(ChannelValue::Bool(self.check_permission(*permission).await))
                }
                MethodCall::CanStartReceiveSms => {
                    Ok(ChannelValue::Bool(self.can_start_receive_sms()))
                }
            };

            match result {
                Ok(value) => {
                    debug!("request served");
                    ChannelResponse::success(value)
                }
                Err(e) => {
                    warn!(error = %e, "request failed");
                    ChannelResponse::Error(ErrorSignal::for_call(&call, &e))
                }
            }
        }
        .instrument(span)
        .await
    }

    // -- Operations ---------------------------------------------------------

    fn battery_level(&self) -> Result<BatteryLevel> {
        let reading = match self.capabilities.battery {
            BatteryStrategy::CapacityProperty => self
                .device
                .battery_capacity()
                .map(BatteryLevel::from_capacity),
            BatteryStrategy::ChangedBroadcast => self
                .device
                .battery_snapshot()
                .map(|snapshot| snapshot.battery_level()),
        };
        match reading {
            Ok(Some(level)) => Ok(level),
            Ok(None) => Err(GlobyError::Unavailable("battery level".into())),
            Err(e) => {
                warn!(error = %e, strategy = ?self.capabilities.battery, "battery query failed");
                Err(GlobyError::Unavailable("battery level".into()))
            }
        }
    }

    fn send_sms(&self, phone: &str, message: &str) -> Result<String> {
        let source = self.capabilities.sms_manager;
        let parts = self.device.divide_message(source, message)?;
        self.device.send_multipart_text(source, phone, &parts)?;
        info!(parts = parts.len(), ?source, "multipart SMS sent");
        Ok(format!("SMS sent to {phone}"))
    }

    fn call_phone(&self, phone: &str) -> Result<()> {
        self.device.launch_call(phone)?;
        info!("call intent dispatched");
        Ok(())
    }

    fn contacts(&self) -> Vec<Contact> {
        match self.device.query_phone_contacts() {
            Ok(contacts) => {
                debug!(count = contacts.len(), "contacts read");
                contacts
            }
            Err(e) => {
                warn!(error = %e, "contacts query failed, returning empty list");
                Vec::new()
            }
        }
    }

    async fn check_permission(&self, permission: Option<PermissionType>) -> bool {
        match permission {
            Some(permission_type) => {
                self.permissions
                    .verify(self.device.as_ref(), permission_type)
                    .await
            }
            None => {
                debug!("unrecognised permission type");
                false
            }
        }
    }

    fn can_start_receive_sms(&self) -> bool {
        self.device
            .is_granted(Permission::ReceiveSms)
            .unwrap_or_else(|e| {
                warn!(error = %e, "RECEIVE_SMS status query failed");
                false
            })
    }
}

fn decode_failure(method: &str, err: &GlobyError) -> ChannelResponse {
    match err {
        GlobyError::UnknownMethod(_) => {
            debug!(method, "method not implemented");
            ChannelResponse::NotImplemented
        }
        _ => {
            warn!(method, error = %err, "request could not be decoded");
            ChannelResponse::Error(ErrorSignal::for_request(method, err))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use globy_core::types::BatterySnapshot;
    use serde_json::json;

    use super::*;
    use crate::capabilities::SmsManagerSource;
    use crate::simulated::SimulatedDevice;
    use crate::stub::StubBridge;

    fn config() -> BridgeConfig {
        BridgeConfig {
            permission_timeout_ms: 100,
            ..BridgeConfig::default()
        }
    }

    fn handler(device: &Arc<SimulatedDevice>) -> ChannelHandler {
        ChannelHandler::new(device.clone(), config())
    }

    fn args(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("test arguments must be an object"),
        }
    }

    fn error_code(response: &ChannelResponse) -> &str {
        match response {
            ChannelResponse::Error(signal) => &signal.code,
            other => panic!("expected an error response, got {other:?}"),
        }
    }

    fn check(tag: &str) -> MethodCall {
        MethodCall::CheckPermission {
            permission: PermissionType::from_tag(tag),
        }
    }

    // -- Battery --------------------------------------------------------------

    #[tokio::test]
    async fn battery_level_reports_capacity() {
        let device = Arc::new(SimulatedDevice::new());
        let handler = handler(&device);

        for pct in [0, 1, 57, 100] {
            device.set_battery_capacity(pct);
            assert_eq!(
                handler.handle(MethodCall::GetBatteryLevel).await,
                ChannelResponse::Success(ChannelValue::Int(i64::from(pct)))
            );
        }
    }

    #[tokio::test]
    async fn negative_capacity_is_unavailable() {
        let device = Arc::new(SimulatedDevice::new());
        device.set_battery_capacity(-1);

        let response = handler(&device).handle(MethodCall::GetBatteryLevel).await;
        assert_eq!(error_code(&response), "UNAVAILABLE");
    }

    #[tokio::test]
    async fn old_devices_use_the_battery_broadcast() {
        let device = Arc::new(SimulatedDevice::new());
        device.set_sdk_level(19);
        device.set_battery_capacity(-1);
        device.set_battery_snapshot(BatterySnapshot {
            level: Some(50),
            scale: Some(200),
        });
        let handler = handler(&device);

        assert_eq!(
            handler.handle(MethodCall::GetBatteryLevel).await,
            ChannelResponse::Success(ChannelValue::Int(25))
        );

        device.set_battery_snapshot(BatterySnapshot {
            level: Some(50),
            scale: Some(0),
        });
        let response = handler.handle(MethodCall::GetBatteryLevel).await;
        assert_eq!(error_code(&response), "UNAVAILABLE");
    }

    // -- SMS ----------------------------------------------------------------

    #[tokio::test]
    async fn long_sms_is_sent_as_one_multipart_message() {
        let device = Arc::new(SimulatedDevice::new());
        let text = "x".repeat(400);

        let response = handler(&device)
            .handle(MethodCall::SendSms {
                phone: "555-0100".into(),
                message: text.clone(),
            })
            .await;

        assert_eq!(
            response,
            ChannelResponse::Success(ChannelValue::Text("SMS sent to 555-0100".into()))
        );
        let sent = device.sent_messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].destination, "555-0100");
        assert_eq!(sent[0].parts.len(), 3);
        assert_eq!(sent[0].parts.concat(), text);
        assert_eq!(sent[0].source, SmsManagerSource::SystemService);
    }

    #[tokio::test]
    async fn sms_manager_source_follows_api_level() {
        let device = Arc::new(SimulatedDevice::new());
        device.set_sdk_level(30);

        handler(&device)
            .handle(MethodCall::SendSms {
                phone: "555".into(),
                message: "hi".into(),
            })
            .await;

        assert_eq!(device.sent_messages()[0].source, SmsManagerSource::LegacyDefault);
    }

    #[tokio::test]
    async fn failed_send_is_an_error_response() {
        let device = Arc::new(SimulatedDevice::new());
        device.fail_sms(true);

        let response = handler(&device)
            .handle(MethodCall::SendSms {
                phone: "555".into(),
                message: "hi".into(),
            })
            .await;

        match response {
            ChannelResponse::Error(signal) => {
                assert_eq!(signal.code, "OPERATION_FAILED");
                assert_eq!(signal.message, "SMS not sent.");
            }
            other => panic!("expected error, got {other:?}"),
        }
        assert!(device.sent_messages().is_empty());
    }

    #[tokio::test]
    async fn missing_phone_is_rejected_before_the_device() {
        let device = Arc::new(SimulatedDevice::new());

        let response = handler(&device)
            .handle_raw("send_sms", &args(json!({"msg": "hi"})))
            .await;

        assert_eq!(error_code(&response), "INVALID_ARGUMENT");
        assert!(device.sent_messages().is_empty());
    }

    // -- Calls --------------------------------------------------------------

    #[tokio::test]
    async fn call_phone_dials_once_and_returns_zero() {
        let device = Arc::new(SimulatedDevice::new());

        let response = handler(&device)
            .handle_raw("call_phone", &args(json!({"phone": "555-1234"})))
            .await;

        assert_eq!(response, ChannelResponse::Success(ChannelValue::Int(0)));
        assert_eq!(device.dialed_numbers(), vec!["555-1234".to_string()]);
    }

    #[tokio::test]
    async fn rejected_call_launch_is_reported() {
        let device = Arc::new(SimulatedDevice::new());
        device.fail_dial(true);

        let response = handler(&device)
            .handle(MethodCall::CallPhone {
                phone: "555-1234".into(),
            })
            .await;

        assert_eq!(error_code(&response), "OPERATION_FAILED");
    }

    // -- Contacts -------------------------------------------------------------

    #[tokio::test]
    async fn empty_contact_store_is_an_empty_list() {
        let device = Arc::new(SimulatedDevice::new());
        let handler = handler(&device);

        assert_eq!(
            handler.handle(MethodCall::GetContacts).await,
            ChannelResponse::Success(ChannelValue::Contacts(Vec::new()))
        );

        device.set_contacts_cursor_null();
        assert_eq!(
            handler.handle(MethodCall::GetContacts).await,
            ChannelResponse::Success(ChannelValue::Contacts(Vec::new()))
        );

        device.fail_contacts_query(true);
        assert_eq!(
            handler.handle(MethodCall::GetContacts).await,
            ChannelResponse::Success(ChannelValue::Contacts(Vec::new()))
        );
    }

    #[tokio::test]
    async fn contacts_keep_order_and_commas() {
        let device = Arc::new(SimulatedDevice::new());
        let contacts = vec![
            Contact {
                raw_contact_id: "3".into(),
                display_name: "Doe, Jane".into(),
                number: "555-0100".into(),
            },
            Contact {
                raw_contact_id: "1".into(),
                display_name: "Alan".into(),
                number: "555-0199".into(),
            },
        ];
        device.set_contacts(contacts.clone());

        assert_eq!(
            handler(&device).handle(MethodCall::GetContacts).await,
            ChannelResponse::Success(ChannelValue::Contacts(contacts))
        );
    }

    // -- Permissions ----------------------------------------------------------

    #[tokio::test]
    async fn every_permission_type_answers_a_boolean() {
        let device = Arc::new(SimulatedDevice::new());
        device.grant(Permission::CallPhone);
        device.grant(Permission::ReadContacts);
        let handler = handler(&device);

        let expectations = [
            ("call_phone", true),
            ("send_sms", false),
            ("read_sms", false),
            ("receive_sms", false),
            ("contact", true),
            ("all_sms", false),
        ];
        for (tag, expected) in expectations {
            assert_eq!(
                handler.handle(check(tag)).await,
                ChannelResponse::Success(ChannelValue::Bool(expected)),
                "permission type {tag}"
            );
        }
    }

    #[tokio::test]
    async fn unknown_permission_type_is_false() {
        let device = Arc::new(SimulatedDevice::new());
        for permission in Permission::ALL {
            device.grant(permission);
        }

        let response = handler(&device)
            .handle_raw("check_permission", &args(json!({"type": "camera"})))
            .await;
        assert_eq!(response, ChannelResponse::Success(ChannelValue::Bool(false)));

        let response = handler(&device)
            .handle_raw("check_permission", &Map::new())
            .await;
        assert_eq!(response, ChannelResponse::Success(ChannelValue::Bool(false)));
    }

    #[tokio::test]
    async fn all_sms_with_one_missing_is_false() {
        let handler_for = |missing: Permission| {
            let device = Arc::new(SimulatedDevice::new());
            for permission in PermissionType::AllSms.permissions() {
                if *permission != missing {
                    device.grant(*permission);
                }
            }
            handler(&device)
        };

        for missing in PermissionType::AllSms.permissions() {
            assert_eq!(
                handler_for(*missing).handle(check("all_sms")).await,
                ChannelResponse::Success(ChannelValue::Bool(false)),
                "missing {missing}"
            );
        }
    }

    #[tokio::test]
    async fn permission_check_awaits_the_grant_result() {
        let device = Arc::new(SimulatedDevice::new());
        device.set_rationale(Permission::ReadContacts, true);
        let handler = Arc::new(ChannelHandler::new(
            device.clone(),
            BridgeConfig {
                permission_timeout_ms: 5_000,
                ..BridgeConfig::default()
            },
        ));

        let task = {
            let handler = Arc::clone(&handler);
            tokio::spawn(async move { handler.handle(check("contact")).await })
        };

        let mut prompt = None;
        for _ in 0..400 {
            prompt = device.permission_prompts().pop();
            if prompt.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let prompt = prompt.expect("permission prompt shown");

        device.grant(Permission::ReadContacts);
        assert!(handler.on_permissions_result(
            prompt.request_code,
            &["android.permission.READ_CONTACTS".to_string()],
            &[0],
        ));

        assert_eq!(
            task.await.expect("handler task"),
            ChannelResponse::Success(ChannelValue::Bool(true))
        );
    }

    #[tokio::test]
    async fn unanswered_prompt_defaults_to_false() {
        let device = Arc::new(SimulatedDevice::new());
        device.set_rationale(Permission::CallPhone, true);

        let response = handler(&device).handle(check("call_phone")).await;
        assert_eq!(response, ChannelResponse::Success(ChannelValue::Bool(false)));
        assert_eq!(device.permission_prompts().len(), 1);
    }

    #[tokio::test]
    async fn can_start_receive_sms_reflects_grant() {
        let device = Arc::new(SimulatedDevice::new());
        let handler = handler(&device);

        assert_eq!(
            handler.handle(MethodCall::CanStartReceiveSms).await,
            ChannelResponse::Success(ChannelValue::Bool(false))
        );
        device.grant(Permission::ReceiveSms);
        assert_eq!(
            handler.handle(MethodCall::CanStartReceiveSms).await,
            ChannelResponse::Success(ChannelValue::Bool(true))
        );
    }

    #[test]
    fn startup_requests_every_permission() {
        let device = Arc::new(SimulatedDevice::new());
        let code = handler(&device).request_startup_permissions();

        assert_eq!(code, Some(2));
        let prompts = device.permission_prompts();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].permissions, Permission::ALL.to_vec());
    }

    #[test]
    fn startup_request_can_be_disabled() {
        let device = Arc::new(SimulatedDevice::new());
        let handler = ChannelHandler::new(
            device.clone(),
            BridgeConfig {
                request_permissions_on_start: false,
                ..BridgeConfig::default()
            },
        );

        assert_eq!(handler.request_startup_permissions(), None);
        assert!(device.permission_prompts().is_empty());
    }

    // -- Dispatch -------------------------------------------------------------

    #[tokio::test]
    async fn unknown_method_is_not_implemented() {
        let device = Arc::new(SimulatedDevice::new());

        assert_eq!(
            handler(&device).handle_json("get_wifi_ssid", "{}").await,
            ChannelResponse::NotImplemented
        );
    }

    #[tokio::test]
    async fn malformed_arguments_are_an_invalid_argument_signal() {
        let device = Arc::new(SimulatedDevice::new());
        let handler = handler(&device);

        for args_json in ["{\"phone\": ", "[1, 2]"] {
            let response = handler.handle_json("call_phone", args_json).await;
            assert_eq!(error_code(&response), "INVALID_ARGUMENT", "args {args_json}");
        }
        assert!(device.dialed_numbers().is_empty());
    }

    #[tokio::test]
    async fn stub_platform_degrades_safely() {
        let handler = ChannelHandler::new(Arc::new(StubBridge), config());

        let battery = handler.handle(MethodCall::GetBatteryLevel).await;
        assert_eq!(error_code(&battery), "UNAVAILABLE");
        assert_eq!(
            handler.handle(MethodCall::GetContacts).await,
            ChannelResponse::Success(ChannelValue::Contacts(Vec::new()))
        );
        assert_eq!(
            handler.handle(check("send_sms")).await,
            ChannelResponse::Success(ChannelValue::Bool(false))
        );
        assert_eq!(handler.request_startup_permissions(), None);
    }
}
