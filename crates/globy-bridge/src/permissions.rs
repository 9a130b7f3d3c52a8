// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Runtime permission verification.
//
// A permission prompt is answered on the OS's schedule: the Activity later
// receives `onRequestPermissionsResult(requestCode, ...)`. The broker hands
// every prompt a request code, parks a one-shot sender under that code, and
// the verifying task awaits it (bounded by the configured timeout) before
// re-reading the grant status.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use globy_core::config::{BridgeConfig, REQUEST_CODE_WINDOW};
use globy_core::error::{GlobyError, Result};
use globy_core::types::{Permission, PermissionType};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::traits::NativePermissions;

/// `PackageManager.PERMISSION_GRANTED`.
pub const PERMISSION_GRANTED: i32 = 0;

/// Payload of a grant-result notification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantResult {
    /// Permission identifier and whether the user granted it.
    pub grants: Vec<(String, bool)>,
}

impl GrantResult {
    /// Pair the arrays delivered to `onRequestPermissionsResult`.
    pub fn from_platform(permissions: &[String], grant_results: &[i32]) -> Self {
        Self {
            grants: permissions
                .iter()
                .zip(grant_results)
                .map(|(name, result)| (name.clone(), *result == PERMISSION_GRANTED))
                .collect(),
        }
    }

    /// Android delivers empty arrays when the prompt was dismissed.
    pub fn is_cancelled(&self) -> bool {
        self.grants.is_empty()
    }
}

/// Correlates permission prompts with their asynchronous results.
pub struct PermissionBroker {
    base_code: i32,
    issued: AtomicU32,
    timeout: Duration,
    pending: Mutex<HashMap<i32, oneshot::Sender<GrantResult>>>,
}

impl PermissionBroker {
    pub fn new(base_code: i32, timeout: Duration) -> Self {
        Self {
            base_code,
            issued: AtomicU32::new(0),
            timeout,
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(config.permission_request_code, config.permission_timeout())
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<i32, oneshot::Sender<GrantResult>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Next request code, cycling through the configured window.
    fn next_code(&self) -> i32 {
        let n = self.issued.fetch_add(1, Ordering::Relaxed);
        // REQUEST_CODE_WINDOW is a small positive constant, so the remainder fits.
        self.base_code
            .saturating_add((n % REQUEST_CODE_WINDOW as u32) as i32)
    }

    /// Next request code that no waiting check holds.
    fn free_code(&self, pending: &HashMap<i32, oneshot::Sender<GrantResult>>) -> Result<i32> {
        for _ in 0..REQUEST_CODE_WINDOW {
            let code = self.next_code();
            if !pending.contains_key(&code) {
                return Ok(code);
            }
        }
        Err(GlobyError::OperationFailed(
            "every permission request code is awaiting a result".into(),
        ))
    }

    /// Park a waiter under a fresh code. A code stays exclusive to its
    /// waiter until `complete` or `forget` removes it.
    fn register(&self) -> Result<(i32, oneshot::Receiver<GrantResult>)> {
        let mut pending = self.pending();
        let code = self.free_code(&pending)?;
        let (tx, rx) = oneshot::channel();
        pending.insert(code, tx);
        Ok((code, rx))
    }

    fn forget(&self, request_code: i32) {
        self.pending().remove(&request_code);
    }

    /// Number of prompts still waiting for a result.
    pub fn pending_count(&self) -> usize {
        self.pending().len()
    }

    /// Decide whether `permission_type` is granted, prompting the user when
    /// the OS allows it and awaiting their answer.
    ///
    /// Any OS failure along the way yields `false`.
    pub async fn verify<P>(&self, device: &P, permission_type: PermissionType) -> bool
    where
        P: NativePermissions + Sync + ?Sized,
    {
        let permissions = permission_type.permissions();
        let tag = permission_type.tag();

        match all_granted(device, permissions) {
            Ok(true) => {
                debug!(permission = tag, "already granted");
                return true;
            }
            Ok(false) => {}
            Err(e) => {
                warn!(permission = tag, error = %e, "grant status query failed");
                return false;
            }
        }

        // Prompt only when every member is rationale-showable; for the SMS
        // bundle that means all three at once.
        let showable = permissions.iter().all(|p| {
            device.should_show_rationale(*p).unwrap_or_else(|e| {
                warn!(permission = %p, error = %e, "rationale query failed");
                false
            })
        });
        if !showable {
            debug!(permission = tag, "not rationale-showable, not prompting");
            return false;
        }

        let (code, rx) = match self.register() {
            Ok(registered) => registered,
            Err(e) => {
                warn!(permission = tag, error = %e, "no request code available");
                return false;
            }
        };
        if let Err(e) = device.request_permissions(permissions, code) {
            self.forget(code);
            warn!(permission = tag, request_code = code, error = %e, "permission request failed");
            return false;
        }
        info!(permission = tag, request_code = code, "permission prompt shown, awaiting result");

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(result)) => {
                debug!(
                    permission = tag,
                    request_code = code,
                    cancelled = result.is_cancelled(),
                    "grant result received"
                );
            }
            Ok(Err(_)) => {
                warn!(permission = tag, request_code = code, "permission waiter dropped");
                return false;
            }
            Err(_) => {
                self.forget(code);
                warn!(
                    permission = tag,
                    request_code = code,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "permission prompt timed out"
                );
                return false;
            }
        }

        all_granted(device, permissions).unwrap_or_else(|e| {
            warn!(permission = tag, error = %e, "grant status re-check failed");
            false
        })
    }

    /// Show a prompt without waiting for its answer. Returns the request code.
    pub fn request_without_waiting<P>(&self, device: &P, permissions: &[Permission]) -> Result<i32>
    where
        P: NativePermissions + ?Sized,
    {
        let code = self.free_code(&self.pending())?;
        device.request_permissions(permissions, code)?;
        info!(request_code = code, count = permissions.len(), "permission prompt shown");
        Ok(code)
    }

    /// Deliver a grant-result notification. Returns `true` when a verifying
    /// task was waiting for `request_code`.
    pub fn complete(&self, request_code: i32, result: GrantResult) -> bool {
        let waiter = self.pending().remove(&request_code);
        match waiter {
            Some(tx) => {
                if tx.send(result).is_err() {
                    debug!(request_code, "permission waiter dropped before result");
                }
                true
            }
            None => {
                debug!(request_code, "grant result with no waiter");
                false
            }
        }
    }
}

fn all_granted<P>(device: &P, permissions: &[Permission]) -> Result<bool>
where
    P: NativePermissions + ?Sized,
{
    for permission in permissions {
        if !device.is_granted(*permission)? {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::simulated::{PermissionPrompt, SimulatedDevice};

    fn broker() -> PermissionBroker {
        PermissionBroker::new(2, Duration::from_secs(5))
    }

    async fn wait_for_prompt(device: &SimulatedDevice) -> PermissionPrompt {
        for _ in 0..400 {
            if let Some(prompt) = device.permission_prompts().pop() {
                return prompt;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("no permission prompt was shown");
    }

    fn granted_result(permissions: &[Permission], granted: bool) -> GrantResult {
        let names: Vec<String> = permissions.iter().map(|p| p.android_name().into()).collect();
        let codes = vec![if granted { PERMISSION_GRANTED } else { -1 }; names.len()];
        GrantResult::from_platform(&names, &codes)
    }

    #[tokio::test]
    async fn granted_permission_returns_true_without_prompt() {
        let device = SimulatedDevice::new();
        device.grant(Permission::CallPhone);

        assert!(broker().verify(&device, PermissionType::CallPhone).await);
        assert!(device.permission_prompts().is_empty());
    }

    #[tokio::test]
    async fn permanently_denied_permission_is_not_prompted() {
        let device = SimulatedDevice::new();

        assert!(!broker().verify(&device, PermissionType::ReadContacts).await);
        assert!(device.permission_prompts().is_empty());
    }

    #[tokio::test]
    async fn all_sms_requires_every_member() {
        let device = SimulatedDevice::new();
        device.grant(Permission::SendSms);
        device.grant(Permission::ReadSms);

        assert!(!broker().verify(&device, PermissionType::AllSms).await);

        device.grant(Permission::ReceiveSms);
        assert!(broker().verify(&device, PermissionType::AllSms).await);
    }

    #[tokio::test]
    async fn all_sms_prompts_only_when_all_rationale_showable() {
        let device = SimulatedDevice::new();
        device.set_rationale(Permission::SendSms, true);
        device.set_rationale(Permission::ReadSms, true);

        assert!(!broker().verify(&device, PermissionType::AllSms).await);
        assert!(device.permission_prompts().is_empty());
    }

    #[tokio::test]
    async fn prompt_resolves_when_user_grants() {
        let device = Arc::new(SimulatedDevice::new());
        device.set_rationale(Permission::SendSms, true);
        let broker = Arc::new(broker());

        let task = {
            let device = Arc::clone(&device);
            let broker = Arc::clone(&broker);
            tokio::spawn(async move { broker.verify(device.as_ref(), PermissionType::SendSms).await })
        };

        let prompt = wait_for_prompt(&device).await;
        assert_eq!(prompt.permissions, vec![Permission::SendSms]);
        assert_eq!(broker.pending_count(), 1);

        device.grant(Permission::SendSms);
        assert!(broker.complete(
            prompt.request_code,
            granted_result(&prompt.permissions, true)
        ));

        assert!(task.await.expect("verify task"));
        assert_eq!(broker.pending_count(), 0);
    }

    #[tokio::test]
    async fn all_sms_prompts_once_for_the_whole_bundle() {
        let device = Arc::new(SimulatedDevice::new());
        for permission in [Permission::SendSms, Permission::ReadSms, Permission::ReceiveSms] {
            device.set_rationale(permission, true);
        }
        let broker = Arc::new(broker());

        let task = {
            let device = Arc::clone(&device);
            let broker = Arc::clone(&broker);
            tokio::spawn(async move { broker.verify(device.as_ref(), PermissionType::AllSms).await })
        };

        let prompt = wait_for_prompt(&device).await;
        assert_eq!(
            prompt.permissions,
            vec![Permission::SendSms, Permission::ReadSms, Permission::ReceiveSms]
        );

        for permission in &prompt.permissions {
            device.grant(*permission);
        }
        assert!(broker.complete(
            prompt.request_code,
            granted_result(&prompt.permissions, true)
        ));

        assert!(task.await.expect("verify task"));
        assert_eq!(device.permission_prompts().len(), 1);
    }

    #[tokio::test]
    async fn prompt_resolves_false_when_user_denies() {
        let device = Arc::new(SimulatedDevice::new());
        device.set_rationale(Permission::CallPhone, true);
        let broker = Arc::new(broker());

        let task = {
            let device = Arc::clone(&device);
            let broker = Arc::clone(&broker);
            tokio::spawn(async move { broker.verify(device.as_ref(), PermissionType::CallPhone).await })
        };

        let prompt = wait_for_prompt(&device).await;
        broker.complete(prompt.request_code, granted_result(&prompt.permissions, false));

        assert!(!task.await.expect("verify task"));
    }

    #[tokio::test]
    async fn unanswered_prompt_times_out_to_false() {
        let device = SimulatedDevice::new();
        device.set_rationale(Permission::ReadSms, true);
        let broker = PermissionBroker::new(2, Duration::from_millis(50));

        assert!(!broker.verify(&device, PermissionType::ReadSms).await);
        assert_eq!(device.permission_prompts().len(), 1);
        assert_eq!(broker.pending_count(), 0);
    }

    #[test]
    fn result_without_waiter_is_dropped() {
        assert!(!broker().complete(99, GrantResult::default()));
    }

    #[test]
    fn request_codes_cycle_within_window() {
        let broker = PermissionBroker::new(10, Duration::from_secs(1));
        let device = SimulatedDevice::new();

        let first = broker
            .request_without_waiting(&device, &Permission::ALL)
            .expect("request");
        assert_eq!(first, 10);
        for _ in 1..REQUEST_CODE_WINDOW {
            broker
                .request_without_waiting(&device, &[Permission::CallPhone])
                .expect("request");
        }
        let wrapped = broker
            .request_without_waiting(&device, &[Permission::CallPhone])
            .expect("request");
        assert_eq!(wrapped, 10);
        assert_eq!(broker.pending_count(), 0);
    }

    #[test]
    fn pending_codes_are_not_reissued() {
        let broker = broker();
        let device = SimulatedDevice::new();
        let (held, _rx) = broker.register().expect("register");
        assert_eq!(held, 2);

        for _ in 0..REQUEST_CODE_WINDOW * 2 {
            let code = broker
                .request_without_waiting(&device, &[Permission::CallPhone])
                .expect("request");
            assert_ne!(code, held);
        }
        assert_eq!(broker.pending_count(), 1);
    }

    #[tokio::test]
    async fn timed_out_waiter_leaves_other_waiters_alone() {
        let device = SimulatedDevice::new();
        device.set_rationale(Permission::ReadSms, true);
        let broker = PermissionBroker::new(2, Duration::from_millis(50));
        let (other, _rx) = broker.register().expect("register");

        assert!(!broker.verify(&device, PermissionType::ReadSms).await);
        let prompt = device.permission_prompts().pop().expect("prompt shown");
        assert_ne!(prompt.request_code, other);
        assert_eq!(broker.pending_count(), 1);
        assert!(broker.complete(other, GrantResult::default()));
    }

    #[test]
    fn exhausted_code_window_refuses_new_waiters() {
        let broker = broker();
        let waiters: Vec<_> = (0..REQUEST_CODE_WINDOW)
            .map(|_| broker.register().expect("register"))
            .collect();

        assert!(matches!(
            broker.register(),
            Err(GlobyError::OperationFailed(_))
        ));
        assert_eq!(broker.pending_count(), waiters.len());
    }

    #[test]
    fn grant_result_pairs_arrays() {
        let result = GrantResult::from_platform(
            &[
                "android.permission.SEND_SMS".to_string(),
                "android.permission.READ_SMS".to_string(),
            ],
            &[PERMISSION_GRANTED, -1],
        );
        assert_eq!(
            result.grants,
            vec![
                ("android.permission.SEND_SMS".to_string(), true),
                ("android.permission.READ_SMS".to_string(), false),
            ]
        );
        assert!(!result.is_cancelled());
        assert!(GrantResult::from_platform(&[], &[]).is_cancelled());
    }
}
