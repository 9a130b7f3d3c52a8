// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Globy: core types and error definitions shared by the device bridge.

pub mod config;
pub mod error;
pub mod signal;
pub mod sms;
pub mod types;

pub use config::BridgeConfig;
pub use error::GlobyError;
pub use signal::{ErrorKind, ErrorSignal};
pub use types::*;
