// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `tracing-subscriber` writer that forwards formatted events to logcat.
//
// An Android app's stdout goes nowhere, so `init_tracing` plugs this writer
// into the fmt layer. Each event becomes one `__android_log_write` call at
// the priority matching its level.

use std::ffi::{CString, c_char, c_int};
use std::io;

use tracing::{Level, Metadata};
use tracing_subscriber::fmt::MakeWriter;

/// Logcat tag for every bridge message.
const TAG: &std::ffi::CStr = c"globy";

// `android/log.h` priorities.
const ANDROID_LOG_VERBOSE: c_int = 2;
const ANDROID_LOG_DEBUG: c_int = 3;
const ANDROID_LOG_INFO: c_int = 4;
const ANDROID_LOG_WARN: c_int = 5;
const ANDROID_LOG_ERROR: c_int = 6;

#[link(name = "log")]
unsafe extern "C" {
    fn __android_log_write(prio: c_int, tag: *const c_char, text: *const c_char) -> c_int;
}

/// Hands the fmt layer one [`LogcatWriter`] per event.
pub struct Logcat;

impl<'a> MakeWriter<'a> for Logcat {
    type Writer = LogcatWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogcatWriter::new(ANDROID_LOG_INFO)
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        LogcatWriter::new(priority(meta.level()))
    }
}

fn priority(level: &Level) -> c_int {
    match *level {
        Level::TRACE => ANDROID_LOG_VERBOSE,
        Level::DEBUG => ANDROID_LOG_DEBUG,
        Level::INFO => ANDROID_LOG_INFO,
        Level::WARN => ANDROID_LOG_WARN,
        Level::ERROR => ANDROID_LOG_ERROR,
    }
}

/// Buffers one formatted event and writes it to logcat when dropped.
pub struct LogcatWriter {
    priority: c_int,
    buf: Vec<u8>,
}

impl LogcatWriter {
    fn new(priority: c_int) -> Self {
        Self {
            priority,
            buf: Vec::new(),
        }
    }
}

impl io::Write for LogcatWriter {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for LogcatWriter {
    fn drop(&mut self) {
        let Some(text) = event_text(std::mem::take(&mut self.buf)) else {
            return;
        };
        // SAFETY: both pointers are NUL-terminated and outlive the call.
        unsafe {
            __android_log_write(self.priority, TAG.as_ptr(), text.as_ptr());
        }
    }
}

/// One logcat line: interior NULs and trailing newlines dropped, `None`
/// when nothing is left.
fn event_text(mut bytes: Vec<u8>) -> Option<CString> {
    bytes.retain(|b| *b != 0);
    while bytes.last() == Some(&b'\n') {
        bytes.pop();
    }
    if bytes.is_empty() {
        return None;
    }
    CString::new(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_map_to_logcat_priorities() {
        assert_eq!(priority(&Level::TRACE), ANDROID_LOG_VERBOSE);
        assert_eq!(priority(&Level::INFO), ANDROID_LOG_INFO);
        assert_eq!(priority(&Level::ERROR), ANDROID_LOG_ERROR);
    }

    #[test]
    fn event_text_trims_newlines_and_nuls() {
        let text = event_text(b"INFO globy: ready\0\n".to_vec()).expect("text");
        assert_eq!(text.to_str().expect("utf-8"), "INFO globy: ready");
        assert!(event_text(b"\n\n".to_vec()).is_none());
    }
}
