// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Error signals returned to the host shell.
//
// The host cannot act on a raw OS exception, so every error that escapes a
// bridge operation is reduced to a short code plus a sentence it can show.

use serde::{Deserialize, Serialize};

use crate::error::GlobyError;
use crate::types::MethodCall;

/// Error taxonomy visible to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// A requested system value cannot be determined.
    Unavailable,
    /// An OS action threw or was rejected.
    OperationFailed,
    /// The request itself was malformed.
    InvalidArgument,
    /// The method name is not one the bridge serves.
    NotImplemented,
}

impl ErrorKind {
    /// Wire code carried in [`ErrorSignal::code`].
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Unavailable => "UNAVAILABLE",
            ErrorKind::OperationFailed => "OPERATION_FAILED",
            ErrorKind::InvalidArgument => "INVALID_ARGUMENT",
            ErrorKind::NotImplemented => "NOT_IMPLEMENTED",
        }
    }
}

/// Classify a `GlobyError` for the host.
pub fn classify(err: &GlobyError) -> ErrorKind {
    match err {
        GlobyError::Unavailable(_) | GlobyError::PlatformUnavailable => ErrorKind::Unavailable,
        GlobyError::MissingArgument(_) | GlobyError::Serialization(_) => {
            ErrorKind::InvalidArgument
        }
        GlobyError::UnknownMethod(_) => ErrorKind::NotImplemented,
        GlobyError::Bridge(_)
        | GlobyError::OperationFailed(_)
        | GlobyError::Config(_)
        | GlobyError::Io(_) => ErrorKind::OperationFailed,
    }
}

/// The error half of a channel response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSignal {
    /// Short kind tag, see [`ErrorKind::code`].
    pub code: String,
    /// Sentence the host may show as-is.
    pub message: String,
    /// Technical detail for logs; never needed to act on the error.
    pub details: Option<String>,
}

impl ErrorSignal {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            code: kind.code().to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Build the signal for an error raised while serving `call`.
    pub fn for_call(call: &MethodCall, err: &GlobyError) -> Self {
        let kind = classify(err);
        let message = match (call, kind) {
            (_, ErrorKind::InvalidArgument) => invalid_argument_message(err),
            (MethodCall::GetBatteryLevel, _) => "Battery level not available.".to_string(),
            (MethodCall::SendSms { .. }, _) => "SMS not sent.".to_string(),
            (MethodCall::CallPhone { .. }, _) => "Could not start the call.".to_string(),
            (_, ErrorKind::Unavailable) => "Not available on this device.".to_string(),
            _ => "The device rejected the request.".to_string(),
        };
        Self::new(kind, message).with_details(err.to_string())
    }

    /// Build the signal for a request that could not be decoded.
    pub fn for_request(method: &str, err: &GlobyError) -> Self {
        let kind = classify(err);
        let message = match kind {
            ErrorKind::InvalidArgument => invalid_argument_message(err),
            _ => format!("Request {method} could not be handled."),
        };
        Self::new(kind, message).with_details(err.to_string())
    }
}

fn invalid_argument_message(err: &GlobyError) -> String {
    match err {
        GlobyError::MissingArgument(name) => format!("Argument '{name}' is required."),
        _ => "The request arguments could not be read.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn battery_failure_is_unavailable() {
        let signal = ErrorSignal::for_call(
            &MethodCall::GetBatteryLevel,
            &GlobyError::Unavailable("battery level".into()),
        );
        assert_eq!(signal.code, "UNAVAILABLE");
        assert_eq!(signal.message, "Battery level not available.");
        assert_eq!(signal.details.as_deref(), Some("battery level not available"));
    }

    #[test]
    fn sms_failure_is_operation_failed() {
        let call = MethodCall::SendSms {
            phone: "555".into(),
            message: "hi".into(),
        };
        let signal = ErrorSignal::for_call(&call, &GlobyError::Bridge("radio off".into()));
        assert_eq!(signal.code, "OPERATION_FAILED");
        assert_eq!(signal.message, "SMS not sent.");
    }

    #[test]
    fn missing_argument_names_the_argument() {
        let signal = ErrorSignal::for_request("send_sms", &GlobyError::MissingArgument("phone"));
        assert_eq!(signal.code, "INVALID_ARGUMENT");
        assert_eq!(signal.message, "Argument 'phone' is required.");
    }

    #[test]
    fn stub_platform_is_unavailable() {
        assert_eq!(classify(&GlobyError::PlatformUnavailable), ErrorKind::Unavailable);
        assert_eq!(
            classify(&GlobyError::UnknownMethod("x".into())),
            ErrorKind::NotImplemented
        );
    }
}
