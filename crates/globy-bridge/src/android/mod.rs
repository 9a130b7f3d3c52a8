// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Android device bridge via JNI.
//
// Requires the Android NDK and targets `aarch64-linux-android` or
// `armv7-linux-androideabi`. Each trait method performs one Android API call
// through JNI against the hosting Activity registered in `ndk_context` by
// `entry::nativeInit`.
//
// ## Architecture notes
//
// Every call here is synchronous. Permission prompts are the exception on
// the Java side: `requestPermissions` returns at once and the answer comes
// back through `onRequestPermissionsResult`, which the host Activity must
// forward to `nativeOnRequestPermissionsResult` (see `entry`).
//
// Only framework classes are looked up by name. Calls may run on tokio
// worker threads, where `FindClass` cannot see the application class loader.

#![cfg(target_os = "android")]

pub mod entry;
pub mod logcat;

use jni::objects::{JObject, JString, JValue};
use jni::sys::jsize;
use jni::{JNIEnv, JavaVM};

use globy_core::error::{GlobyError, Result};
use globy_core::types::{BatterySnapshot, Contact, Permission};

use crate::capabilities::SmsManagerSource;
use crate::permissions::PERMISSION_GRANTED;
use crate::traits::*;

// ---------------------------------------------------------------------------
// Android constants
// ---------------------------------------------------------------------------

/// `Context.BATTERY_SERVICE`.
const BATTERY_SERVICE: &str = "batterymanager";

/// `BatteryManager.BATTERY_PROPERTY_CAPACITY`.
const BATTERY_PROPERTY_CAPACITY: i32 = 4;

/// `Intent.ACTION_BATTERY_CHANGED`.
const ACTION_BATTERY_CHANGED: &str = "android.intent.action.BATTERY_CHANGED";

/// `BatteryManager.EXTRA_LEVEL` / `EXTRA_SCALE`.
const EXTRA_LEVEL: &str = "level";
const EXTRA_SCALE: &str = "scale";

/// `Intent.ACTION_CALL`.
const ACTION_CALL: &str = "android.intent.action.CALL";

/// `ContactsContract.CommonDataKinds.Phone` and the columns read from it.
const PHONE_CONTRACT: &str = "android/provider/ContactsContract$CommonDataKinds$Phone";
const COLUMN_RAW_CONTACT_ID: &str = "name_raw_contact_id";
const COLUMN_DISPLAY_NAME: &str = "display_name";
const COLUMN_NUMBER: &str = "data1";

// ---------------------------------------------------------------------------
// JNI bootstrap helpers
// ---------------------------------------------------------------------------

/// Run `f` with a [`JNIEnv`] for the current thread and the hosting Activity.
///
/// The `JavaVM*` and Activity come from `ndk_context`. The thread is
/// attached for the duration of the call if it was not already. When `f`
/// fails with a Java exception pending, the exception is logged through
/// `ExceptionDescribe` and cleared so the JVM stays usable.
pub(crate) fn with_activity<R>(
    f: impl FnOnce(&mut JNIEnv<'_>, &JObject<'_>) -> Result<R>,
) -> Result<R> {
    let ctx = ndk_context::android_context();
    // SAFETY: `ctx.vm()` is the `JavaVM*` registered by `entry::nativeInit`,
    // valid for the lifetime of the process.
    let vm = unsafe { JavaVM::from_raw(ctx.vm().cast()) }
        .map_err(|e| GlobyError::Bridge(format!("failed to obtain JavaVM: {e}")))?;
    let mut env = vm
        .attach_current_thread()
        .map_err(|e| GlobyError::Bridge(format!("failed to attach JNI thread: {e}")))?;

    let ptr = ctx.context();
    if ptr.is_null() {
        return Err(GlobyError::Bridge(
            "Android context is null, bridge not initialised".into(),
        ));
    }
    // SAFETY: the pointer is the global reference held by `entry`, which
    // stays alive until a newer Activity replaces it.
    let activity = unsafe { JObject::from_raw(ptr.cast()) };

    let result = f(&mut env, &activity);
    if result.is_err() {
        clear_exception(&mut env);
    }
    result
}

/// Describe and clear a pending Java exception, if any.
pub(crate) fn clear_exception(env: &mut JNIEnv<'_>) {
    if env.exception_check().unwrap_or(false) {
        let _ = env.exception_describe();
        let _ = env.exception_clear();
    }
}

/// Convenience: map any `jni::errors::Error` into `GlobyError::Bridge`.
pub(crate) fn jni_err(context: &str, e: jni::errors::Error) -> GlobyError {
    GlobyError::Bridge(format!("{context}: {e}"))
}

/// Copy a `java.lang.String` into Rust. `null` yields `None`.
pub(crate) fn java_string(env: &mut JNIEnv<'_>, obj: &JObject<'_>) -> Result<Option<String>> {
    if obj.is_null() {
        return Ok(None);
    }
    let j_str = <&JString>::from(obj);
    let value: String = env
        .get_string(j_str)
        .map_err(|e| jni_err("get_string", e))?
        .into();
    Ok(Some(value))
}

// ---------------------------------------------------------------------------
// Bridge struct
// ---------------------------------------------------------------------------

/// Android implementation of the device bridge.
///
/// The struct is zero-sized; all state lives on the Java side.
pub struct AndroidBridge;

impl AndroidBridge {
    /// Create a new Android bridge.
    ///
    /// This does **not** touch JNI. The first JNI call happens lazily when
    /// a trait method is invoked.
    pub fn new() -> Self {
        Self
    }
}

impl Default for AndroidBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceBridge for AndroidBridge {
    fn platform_name(&self) -> &str {
        "Android"
    }

    fn sdk_level(&self) -> Result<u32> {
        with_activity(|env, _activity| {
            let level = env
                .get_static_field("android/os/Build$VERSION", "SDK_INT", "I")
                .map_err(|e| jni_err("Build.VERSION.SDK_INT", e))?
                .i()
                .map_err(|e| jni_err("SDK_INT->i", e))?;
            u32::try_from(level)
                .map_err(|_| GlobyError::Bridge(format!("negative SDK_INT: {level}")))
        })
    }
}

// ---------------------------------------------------------------------------
// NativeBattery — android.os.BatteryManager
// ---------------------------------------------------------------------------

impl NativeBattery for AndroidBridge {
    /// `getSystemService(BATTERY_SERVICE).getIntProperty(BATTERY_PROPERTY_CAPACITY)`.
    fn battery_capacity(&self) -> Result<i32> {
        with_activity(|env, activity| {
            let manager = system_service(env, activity, BATTERY_SERVICE)?;
            if manager.is_null() {
                return Err(GlobyError::Unavailable("battery service".into()));
            }

            let capacity = env
                .call_method(
                    &manager,
                    "getIntProperty",
                    "(I)I",
                    &[JValue::Int(BATTERY_PROPERTY_CAPACITY)],
                )
                .map_err(|e| jni_err("BatteryManager.getIntProperty", e))?
                .i()
                .map_err(|e| jni_err("getIntProperty->i", e))?;

            tracing::debug!(capacity, "Android: battery capacity read");
            Ok(capacity)
        })
    }

    /// Read the sticky `ACTION_BATTERY_CHANGED` intent by registering a
    /// `null` receiver, then its level and scale extras.
    fn battery_snapshot(&self) -> Result<BatterySnapshot> {
        with_activity(|env, activity| {
            let j_action: JString = env
                .new_string(ACTION_BATTERY_CHANGED)
                .map_err(|e| jni_err("new_string(ACTION_BATTERY_CHANGED)", e))?;

            let filter: JObject = env
                .new_object(
                    "android/content/IntentFilter",
                    "(Ljava/lang/String;)V",
                    &[JValue::Object(&j_action)],
                )
                .map_err(|e| jni_err("new IntentFilter", e))?;

            let intent: JObject = env
                .call_method(
                    activity,
                    "registerReceiver",
                    "(Landroid/content/BroadcastReceiver;Landroid/content/IntentFilter;)Landroid/content/Intent;",
                    &[JValue::Object(&JObject::null()), JValue::Object(&filter)],
                )
                .map_err(|e| jni_err("registerReceiver(null)", e))?
                .l()
                .map_err(|e| jni_err("registerReceiver->l", e))?;

            if intent.is_null() {
                tracing::debug!("Android: no sticky battery broadcast");
                return Ok(BatterySnapshot::default());
            }

            Ok(BatterySnapshot {
                level: int_extra(env, &intent, EXTRA_LEVEL)?,
                scale: int_extra(env, &intent, EXTRA_SCALE)?,
            })
        })
    }
}

// ---------------------------------------------------------------------------
// NativeSms — android.telephony.SmsManager
// ---------------------------------------------------------------------------

impl NativeSms for AndroidBridge {
    fn divide_message(&self, source: SmsManagerSource, text: &str) -> Result<Vec<String>> {
        with_activity(|env, activity| {
            let manager = sms_manager(env, activity, source)?;
            let j_text: JString = env
                .new_string(text)
                .map_err(|e| jni_err("new_string(message)", e))?;

            let parts: JObject = env
                .call_method(
                    &manager,
                    "divideMessage",
                    "(Ljava/lang/String;)Ljava/util/ArrayList;",
                    &[JValue::Object(&j_text)],
                )
                .map_err(|e| jni_err("SmsManager.divideMessage", e))?
                .l()
                .map_err(|e| jni_err("divideMessage->l", e))?;

            read_string_list(env, &parts)
        })
    }

    /// `sendMultipartTextMessage(dest, null, parts, null, null)`.
    fn send_multipart_text(
        &self,
        source: SmsManagerSource,
        destination: &str,
        parts: &[String],
    ) -> Result<()> {
        with_activity(|env, activity| {
            let manager = sms_manager(env, activity, source)?;
            let j_destination: JString = env
                .new_string(destination)
                .map_err(|e| jni_err("new_string(destination)", e))?;
            let j_parts = new_string_list(env, parts)?;
            let null = JObject::null();

            env.call_method(
                &manager,
                "sendMultipartTextMessage",
                "(Ljava/lang/String;Ljava/lang/String;Ljava/util/ArrayList;Ljava/util/ArrayList;Ljava/util/ArrayList;)V",
                &[
                    JValue::Object(&j_destination),
                    JValue::Object(&null),
                    JValue::Object(&j_parts),
                    JValue::Object(&null),
                    JValue::Object(&null),
                ],
            )
            .map_err(|e| jni_err("SmsManager.sendMultipartTextMessage", e))?;

            tracing::info!(parts = parts.len(), "Android: multipart SMS handed to SmsManager");
            Ok(())
        })
    }
}

// ---------------------------------------------------------------------------
// NativeDialer — Intent ACTION_CALL
// ---------------------------------------------------------------------------

impl NativeDialer for AndroidBridge {
    fn launch_call(&self, phone: &str) -> Result<()> {
        with_activity(|env, activity| {
            let j_uri: JString = env
                .new_string(format!("tel:{phone}"))
                .map_err(|e| jni_err("new_string(tel uri)", e))?;

            let uri: JObject = env
                .call_static_method(
                    "android/net/Uri",
                    "parse",
                    "(Ljava/lang/String;)Landroid/net/Uri;",
                    &[JValue::Object(&j_uri)],
                )
                .map_err(|e| jni_err("Uri.parse", e))?
                .l()
                .map_err(|e| jni_err("Uri.parse->l", e))?;

            let j_action: JString = env
                .new_string(ACTION_CALL)
                .map_err(|e| jni_err("new_string(ACTION_CALL)", e))?;

            let intent: JObject = env
                .new_object(
                    "android/content/Intent",
                    "(Ljava/lang/String;Landroid/net/Uri;)V",
                    &[JValue::Object(&j_action), JValue::Object(&uri)],
                )
                .map_err(|e| jni_err("new Intent(ACTION_CALL)", e))?;

            env.call_method(
                activity,
                "startActivity",
                "(Landroid/content/Intent;)V",
                &[JValue::Object(&intent)],
            )
            .map_err(|e| jni_err("startActivity(call)", e))?;

            tracing::info!("Android: ACTION_CALL intent dispatched");
            Ok(())
        })
    }
}

// ---------------------------------------------------------------------------
// NativeContacts — ContentResolver over CommonDataKinds.Phone
// ---------------------------------------------------------------------------

impl NativeContacts for AndroidBridge {
    /// Query every phone row. The cursor is closed on every path, including
    /// when reading a row throws.
    fn query_phone_contacts(&self) -> Result<Vec<Contact>> {
        with_activity(|env, activity| {
            let resolver: JObject = env
                .call_method(
                    activity,
                    "getContentResolver",
                    "()Landroid/content/ContentResolver;",
                    &[],
                )
                .map_err(|e| jni_err("getContentResolver", e))?
                .l()
                .map_err(|e| jni_err("getContentResolver->l", e))?;

            let uri: JObject = env
                .get_static_field(PHONE_CONTRACT, "CONTENT_URI", "Landroid/net/Uri;")
                .map_err(|e| jni_err("Phone.CONTENT_URI", e))?
                .l()
                .map_err(|e| jni_err("CONTENT_URI->l", e))?;

            let null = JObject::null();
            let cursor: JObject = env
                .call_method(
                    &resolver,
                    "query",
                    "(Landroid/net/Uri;[Ljava/lang/String;Ljava/lang/String;[Ljava/lang/String;Ljava/lang/String;)Landroid/database/Cursor;",
                    &[
                        JValue::Object(&uri),
                        JValue::Object(&null),
                        JValue::Object(&null),
                        JValue::Object(&null),
                        JValue::Object(&null),
                    ],
                )
                .map_err(|e| jni_err("ContentResolver.query", e))?
                .l()
                .map_err(|e| jni_err("query->l", e))?;

            if cursor.is_null() {
                tracing::debug!("Android: contacts query returned a null cursor");
                return Ok(Vec::new());
            }

            let rows = read_contacts(env, &cursor);
            if rows.is_err() {
                clear_exception(env);
            }
            let closed = env
                .call_method(&cursor, "close", "()V", &[])
                .map_err(|e| jni_err("Cursor.close", e));

            let contacts = rows?;
            closed?;
            tracing::info!(count = contacts.len(), "Android: contacts read");
            Ok(contacts)
        })
    }
}

// ---------------------------------------------------------------------------
// NativePermissions — Activity runtime permissions (API 23+)
// ---------------------------------------------------------------------------

impl NativePermissions for AndroidBridge {
    fn is_granted(&self, permission: Permission) -> Result<bool> {
        with_activity(|env, activity| {
            let j_name: JString = env
                .new_string(permission.android_name())
                .map_err(|e| jni_err("new_string(permission)", e))?;

            let status = env
                .call_method(
                    activity,
                    "checkCallingOrSelfPermission",
                    "(Ljava/lang/String;)I",
                    &[JValue::Object(&j_name)],
                )
                .map_err(|e| jni_err("checkCallingOrSelfPermission", e))?
                .i()
                .map_err(|e| jni_err("checkCallingOrSelfPermission->i", e))?;

            Ok(status == PERMISSION_GRANTED)
        })
    }

    fn should_show_rationale(&self, permission: Permission) -> Result<bool> {
        with_activity(|env, activity| {
            let j_name: JString = env
                .new_string(permission.android_name())
                .map_err(|e| jni_err("new_string(permission)", e))?;

            env.call_method(
                activity,
                "shouldShowRequestPermissionRationale",
                "(Ljava/lang/String;)Z",
                &[JValue::Object(&j_name)],
            )
            .map_err(|e| jni_err("shouldShowRequestPermissionRationale", e))?
            .z()
            .map_err(|e| jni_err("shouldShowRequestPermissionRationale->z", e))
        })
    }

    fn request_permissions(&self, permissions: &[Permission], request_code: i32) -> Result<()> {
        with_activity(|env, activity| {
            let names = env
                .new_object_array(
                    permissions.len() as jsize,
                    "java/lang/String",
                    &JObject::null(),
                )
                .map_err(|e| jni_err("new_object_array(permissions)", e))?;

            for (i, permission) in permissions.iter().enumerate() {
                let j_name: JString = env
                    .new_string(permission.android_name())
                    .map_err(|e| jni_err("new_string(permission[i])", e))?;
                env.set_object_array_element(&names, i as jsize, j_name)
                    .map_err(|e| jni_err("set_object_array_element", e))?;
            }

            env.call_method(
                activity,
                "requestPermissions",
                "([Ljava/lang/String;I)V",
                &[JValue::Object(&names), JValue::Int(request_code)],
            )
            .map_err(|e| jni_err("requestPermissions", e))?;

            tracing::info!(
                request_code,
                count = permissions.len(),
                "Android: permission prompt requested"
            );
            Ok(())
        })
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// `activity.getSystemService(name)`.
fn system_service<'local>(
    env: &mut JNIEnv<'local>,
    activity: &JObject<'_>,
    name: &str,
) -> Result<JObject<'local>> {
    let j_name: JString = env
        .new_string(name)
        .map_err(|e| jni_err("new_string(service)", e))?;

    env.call_method(
        activity,
        "getSystemService",
        "(Ljava/lang/String;)Ljava/lang/Object;",
        &[JValue::Object(&j_name)],
    )
    .map_err(|e| jni_err("getSystemService", e))?
    .l()
    .map_err(|e| jni_err("getSystemService->l", e))
}

/// Acquire the SMS manager the way the detected API level expects.
fn sms_manager<'local>(
    env: &mut JNIEnv<'local>,
    activity: &JObject<'_>,
    source: SmsManagerSource,
) -> Result<JObject<'local>> {
    let manager: JObject = match source {
        SmsManagerSource::SystemService => {
            let class = env
                .find_class("android/telephony/SmsManager")
                .map_err(|e| jni_err("find_class(SmsManager)", e))?;
            env.call_method(
                activity,
                "getSystemService",
                "(Ljava/lang/Class;)Ljava/lang/Object;",
                &[JValue::Object(&class)],
            )
            .map_err(|e| jni_err("getSystemService(SmsManager.class)", e))?
            .l()
            .map_err(|e| jni_err("getSystemService->l", e))?
        }
        SmsManagerSource::LegacyDefault => env
            .call_static_method(
                "android/telephony/SmsManager",
                "getDefault",
                "()Landroid/telephony/SmsManager;",
                &[],
            )
            .map_err(|e| jni_err("SmsManager.getDefault", e))?
            .l()
            .map_err(|e| jni_err("getDefault->l", e))?,
    };

    if manager.is_null() {
        return Err(GlobyError::OperationFailed("SmsManager unavailable".into()));
    }
    Ok(manager)
}

/// `intent.getIntExtra(name, -1)`, with -1 read as "missing".
fn int_extra(env: &mut JNIEnv<'_>, intent: &JObject<'_>, name: &str) -> Result<Option<i32>> {
    let j_name: JString = env
        .new_string(name)
        .map_err(|e| jni_err("new_string(extra)", e))?;

    let value = env
        .call_method(
            intent,
            "getIntExtra",
            "(Ljava/lang/String;I)I",
            &[JValue::Object(&j_name), JValue::Int(-1)],
        )
        .map_err(|e| jni_err("Intent.getIntExtra", e))?
        .i()
        .map_err(|e| jni_err("getIntExtra->i", e))?;

    Ok((value != -1).then_some(value))
}

/// Copy a `java.util.List<String>` into a `Vec`. `null` elements become "".
fn read_string_list(env: &mut JNIEnv<'_>, list: &JObject<'_>) -> Result<Vec<String>> {
    if list.is_null() {
        return Ok(Vec::new());
    }
    let size = env
        .call_method(list, "size", "()I", &[])
        .map_err(|e| jni_err("List.size", e))?
        .i()
        .map_err(|e| jni_err("size->i", e))?;

    let mut items = Vec::with_capacity(size.max(0) as usize);
    for i in 0..size {
        let item: JObject = env
            .call_method(list, "get", "(I)Ljava/lang/Object;", &[JValue::Int(i)])
            .map_err(|e| jni_err("List.get", e))?
            .l()
            .map_err(|e| jni_err("get->l", e))?;
        items.push(java_string(env, &item)?.unwrap_or_default());
        env.delete_local_ref(item)
            .map_err(|e| jni_err("delete_local_ref(item)", e))?;
    }
    Ok(items)
}

/// Build a `java.util.ArrayList<String>` from `items`.
fn new_string_list<'local>(env: &mut JNIEnv<'local>, items: &[String]) -> Result<JObject<'local>> {
    let list: JObject = env
        .new_object("java/util/ArrayList", "()V", &[])
        .map_err(|e| jni_err("new ArrayList", e))?;

    for item in items {
        let j_item: JString = env
            .new_string(item)
            .map_err(|e| jni_err("new_string(item)", e))?;
        env.call_method(
            &list,
            "add",
            "(Ljava/lang/Object;)Z",
            &[JValue::Object(&j_item)],
        )
        .map_err(|e| jni_err("ArrayList.add", e))?;
        env.delete_local_ref(j_item)
            .map_err(|e| jni_err("delete_local_ref(item)", e))?;
    }
    Ok(list)
}

/// `cursor.getColumnIndex(name)`; -1 when the column is absent.
fn column_index(env: &mut JNIEnv<'_>, cursor: &JObject<'_>, name: &str) -> Result<i32> {
    let j_name: JString = env
        .new_string(name)
        .map_err(|e| jni_err("new_string(column)", e))?;

    env.call_method(
        cursor,
        "getColumnIndex",
        "(Ljava/lang/String;)I",
        &[JValue::Object(&j_name)],
    )
    .map_err(|e| jni_err("Cursor.getColumnIndex", e))?
    .i()
    .map_err(|e| jni_err("getColumnIndex->i", e))
}

/// `cursor.getString(column)`; absent columns and `null` values become "".
fn cursor_string(env: &mut JNIEnv<'_>, cursor: &JObject<'_>, column: i32) -> Result<String> {
    if column < 0 {
        return Ok(String::new());
    }
    let value: JObject = env
        .call_method(
            cursor,
            "getString",
            "(I)Ljava/lang/String;",
            &[JValue::Int(column)],
        )
        .map_err(|e| jni_err("Cursor.getString", e))?
        .l()
        .map_err(|e| jni_err("getString->l", e))?;

    let text = java_string(env, &value)?.unwrap_or_default();
    env.delete_local_ref(value)
        .map_err(|e| jni_err("delete_local_ref(value)", e))?;
    Ok(text)
}

fn read_contacts(env: &mut JNIEnv<'_>, cursor: &JObject<'_>) -> Result<Vec<Contact>> {
    let id_column = column_index(env, cursor, COLUMN_RAW_CONTACT_ID)?;
    let name_column = column_index(env, cursor, COLUMN_DISPLAY_NAME)?;
    let number_column = column_index(env, cursor, COLUMN_NUMBER)?;

    let mut contacts = Vec::new();
    loop {
        let has_row = env
            .call_method(cursor, "moveToNext", "()Z", &[])
            .map_err(|e| jni_err("Cursor.moveToNext", e))?
            .z()
            .map_err(|e| jni_err("moveToNext->z", e))?;
        if !has_row {
            break;
        }
        contacts.push(Contact {
            raw_contact_id: cursor_string(env, cursor, id_column)?,
            display_name: cursor_string(env, cursor, name_column)?,
            number: cursor_string(env, cursor, number_column)?,
        });
    }
    Ok(contacts)
}
