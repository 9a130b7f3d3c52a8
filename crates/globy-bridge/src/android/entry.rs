// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// JNI exports called by `com.example.globy.MainActivity`.
//
// The Kotlin side forwards each method-channel call to `nativeHandle` with a
// call id, and receives the JSON reply through `onBridgeReply(long, String)`.
// Replies arrive on a bridge worker thread; the Activity must post them to
// the main looper before completing the Flutter `Result`.

use std::sync::{Mutex, OnceLock, PoisonError};

use jni::JNIEnv;
use jni::objects::{GlobalRef, JIntArray, JObject, JObjectArray, JString, JValue};
use jni::sys::{JNI_FALSE, JNI_TRUE, jboolean, jint, jlong};
use tokio::runtime::Runtime;

use globy_core::config::BridgeConfig;
use globy_core::error::{GlobyError, Result};
use globy_core::signal::{ErrorKind, ErrorSignal};
use globy_core::types::ChannelResponse;

use super::{clear_exception, java_string, jni_err, with_activity};
use crate::channel::ChannelHandler;

static HANDLER: OnceLock<ChannelHandler> = OnceLock::new();
static RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// Global reference to the Activity currently registered in `ndk_context`.
static ACTIVITY: Mutex<Option<GlobalRef>> = Mutex::new(None);

/// Sent when a response cannot be serialised.
const ENCODE_FAILURE_REPLY: &str = r#"{"status":"error","payload":{"code":"OPERATION_FAILED","message":"Response could not be encoded.","details":null}}"#;

// ---------------------------------------------------------------------------
// Exports
// ---------------------------------------------------------------------------

/// `external fun nativeInit(configJson: String?): Boolean`
///
/// Registers the Activity with `ndk_context`, installs tracing and builds the
/// channel handler. Called again after the Activity is recreated, it swaps in
/// the new Activity and keeps the existing handler.
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_example_globy_MainActivity_nativeInit<'local>(
    mut env: JNIEnv<'local>,
    activity: JObject<'local>,
    config_json: JString<'local>,
) -> jboolean {
    match init(&mut env, &activity, &config_json) {
        Ok(()) => JNI_TRUE,
        Err(e) => {
            clear_exception(&mut env);
            tracing::error!(error = %e, "nativeInit failed");
            JNI_FALSE
        }
    }
}

/// `external fun nativeHandle(method: String, argsJson: String?, callId: Long)`
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_example_globy_MainActivity_nativeHandle<'local>(
    mut env: JNIEnv<'local>,
    activity: JObject<'local>,
    method: JString<'local>,
    args_json: JString<'local>,
    call_id: jlong,
) {
    let request = read_request(&mut env, &method, &args_json);
    let (method, args_json) = match request {
        Ok(request) => request,
        Err(e) => {
            clear_exception(&mut env);
            let reply = ChannelResponse::Error(
                ErrorSignal::new(ErrorKind::InvalidArgument, "Malformed channel request.")
                    .with_details(e.to_string()),
            );
            reply_now(&mut env, &activity, call_id, &reply);
            return;
        }
    };

    let (Some(handler), Some(runtime)) = (HANDLER.get(), RUNTIME.get()) else {
        tracing::warn!(method = %method, "nativeHandle called before nativeInit");
        let reply = ChannelResponse::Error(ErrorSignal::new(
            ErrorKind::Unavailable,
            "Bridge not initialised.",
        ));
        reply_now(&mut env, &activity, call_id, &reply);
        return;
    };

    runtime.spawn(async move {
        let response = handler.handle_json(&method, &args_json).await;
        let json = encode(&response);
        if let Err(e) = with_activity(|env, activity| send_reply(env, activity, call_id, &json)) {
            tracing::error!(call_id, error = %e, "failed to deliver channel reply");
        }
    });
}

/// `external fun nativeOnRequestPermissionsResult(requestCode: Int,
/// permissions: Array<String>, grantResults: IntArray)`
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_example_globy_MainActivity_nativeOnRequestPermissionsResult<
    'local,
>(
    mut env: JNIEnv<'local>,
    _activity: JObject<'local>,
    request_code: jint,
    permissions: JObjectArray<'local>,
    grant_results: JIntArray<'local>,
) {
    let Some(handler) = HANDLER.get() else {
        tracing::warn!(request_code, "permission result before nativeInit");
        return;
    };

    match read_grant_arrays(&mut env, &permissions, &grant_results) {
        Ok((names, results)) => {
            if !handler.on_permissions_result(request_code, &names, &results) {
                tracing::debug!(request_code, "permission result had no waiting check");
            }
        }
        Err(e) => {
            clear_exception(&mut env);
            tracing::warn!(request_code, error = %e, "unreadable permission result");
        }
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn init(env: &mut JNIEnv<'_>, activity: &JObject<'_>, config_json: &JString<'_>) -> Result<()> {
    let config = match java_string(env, config_json)? {
        Some(json) if !json.trim().is_empty() => BridgeConfig::from_json_str(&json)?,
        _ => BridgeConfig::default(),
    };
    crate::init_tracing(config.log_filter.as_deref());

    attach_activity(env, activity)?;

    if HANDLER.get().is_some() {
        tracing::info!("Activity re-attached to existing bridge");
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("globy-bridge")
        .enable_all()
        .build()?;
    let _ = RUNTIME.set(runtime);

    let handler = HANDLER.get_or_init(|| ChannelHandler::new(crate::platform_bridge(), config));
    handler.request_startup_permissions();
    Ok(())
}

/// Point `ndk_context` at `activity`, replacing any earlier Activity.
fn attach_activity(env: &mut JNIEnv<'_>, activity: &JObject<'_>) -> Result<()> {
    let global = env
        .new_global_ref(activity)
        .map_err(|e| jni_err("new_global_ref(activity)", e))?;
    let vm = env.get_java_vm().map_err(|e| jni_err("get_java_vm", e))?;

    let mut slot = ACTIVITY.lock().unwrap_or_else(PoisonError::into_inner);
    // SAFETY: the VM pointer is valid for the process lifetime and the
    // Activity pointer is a global reference kept alive in `ACTIVITY` until
    // the context is released again.
    unsafe {
        if slot.is_some() {
            ndk_context::release_android_context();
        }
        ndk_context::initialize_android_context(
            vm.get_java_vm_pointer().cast(),
            global.as_obj().as_raw().cast(),
        );
    }
    *slot = Some(global);
    Ok(())
}

fn read_request(
    env: &mut JNIEnv<'_>,
    method: &JString<'_>,
    args_json: &JString<'_>,
) -> Result<(String, String)> {
    let method = java_string(env, method)?
        .ok_or_else(|| GlobyError::Bridge("method name is null".into()))?;
    let args_json = java_string(env, args_json)?.unwrap_or_default();
    Ok((method, args_json))
}

fn read_grant_arrays(
    env: &mut JNIEnv<'_>,
    permissions: &JObjectArray<'_>,
    grant_results: &JIntArray<'_>,
) -> Result<(Vec<String>, Vec<i32>)> {
    let count = env
        .get_array_length(permissions)
        .map_err(|e| jni_err("get_array_length(permissions)", e))?;
    let mut names = Vec::with_capacity(count.max(0) as usize);
    for i in 0..count {
        let element = env
            .get_object_array_element(permissions, i)
            .map_err(|e| jni_err("get_object_array_element", e))?;
        names.push(java_string(env, &element)?.unwrap_or_default());
        env.delete_local_ref(element)
            .map_err(|e| jni_err("delete_local_ref(permission)", e))?;
    }

    let count = env
        .get_array_length(grant_results)
        .map_err(|e| jni_err("get_array_length(grantResults)", e))?;
    let mut results = vec![0; count.max(0) as usize];
    env.get_int_array_region(grant_results, 0, &mut results)
        .map_err(|e| jni_err("get_int_array_region", e))?;

    Ok((names, results))
}

fn encode(response: &ChannelResponse) -> String {
    response.to_json().unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to encode channel response");
        ENCODE_FAILURE_REPLY.to_string()
    })
}

/// Reply on the calling JNI thread.
fn reply_now(env: &mut JNIEnv<'_>, activity: &JObject<'_>, call_id: jlong, response: &ChannelResponse) {
    if let Err(e) = send_reply(env, activity, call_id, &encode(response)) {
        clear_exception(env);
        tracing::error!(call_id, error = %e, "failed to deliver channel reply");
    }
}

/// `activity.onBridgeReply(callId, json)`.
fn send_reply(env: &mut JNIEnv<'_>, activity: &JObject<'_>, call_id: jlong, json: &str) -> Result<()> {
    let j_json: JString = env
        .new_string(json)
        .map_err(|e| jni_err("new_string(reply)", e))?;

    env.call_method(
        activity,
        "onBridgeReply",
        "(JLjava/lang/String;)V",
        &[JValue::Long(call_id), JValue::Object(&j_json)],
    )
    .map_err(|e| jni_err("onBridgeReply", e))?;
    Ok(())
}
