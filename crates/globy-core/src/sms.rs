// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// SMS segmentation.
//
// Mirrors what `SmsManager.divideMessage` does on the handset so desktop and
// simulated devices split messages the same way. Text that fits the GSM 03.38
// default alphabet is counted in septets; anything else is sent as UCS-2 and
// counted in UTF-16 code units. Multipart messages lose room to the
// concatenation header, and no character is ever split across parts.

/// Septets in a single-part GSM 7-bit message.
pub const GSM7_SINGLE_PART: usize = 160;
/// Septets per part once a GSM 7-bit message needs concatenation.
pub const GSM7_MULTI_PART: usize = 153;
/// UTF-16 code units in a single-part UCS-2 message.
pub const UCS2_SINGLE_PART: usize = 70;
/// UTF-16 code units per part once a UCS-2 message needs concatenation.
pub const UCS2_MULTI_PART: usize = 67;

const GSM7_BASIC: &str = "@£$¥èéùìòÇ\nØø\rÅåΔ_ΦΓΛΩΠΨΣΘΞÆæßÉ !\"#¤%&'()*+,-./0123456789:;<=>?\
¡ABCDEFGHIJKLMNOPQRSTUVWXYZÄÖÑÜ§¿abcdefghijklmnopqrstuvwxyzäöñüà";

/// Characters reached through the escape table; each costs two septets.
const GSM7_EXTENSION: &str = "\x0C^{}\\[~]|€";

/// Character set a message will be transmitted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmsEncoding {
    Gsm7,
    Ucs2,
}

impl SmsEncoding {
    /// Pick the narrowest encoding that can carry `text`.
    pub fn detect(text: &str) -> Self {
        if text.chars().all(|c| gsm7_septets(c).is_some()) {
            SmsEncoding::Gsm7
        } else {
            SmsEncoding::Ucs2
        }
    }

    fn limits(self) -> (usize, usize) {
        match self {
            SmsEncoding::Gsm7 => (GSM7_SINGLE_PART, GSM7_MULTI_PART),
            SmsEncoding::Ucs2 => (UCS2_SINGLE_PART, UCS2_MULTI_PART),
        }
    }

    fn cost(self, c: char) -> usize {
        match self {
            SmsEncoding::Gsm7 => gsm7_septets(c).unwrap_or(2),
            SmsEncoding::Ucs2 => c.len_utf16(),
        }
    }
}

fn gsm7_septets(c: char) -> Option<usize> {
    if GSM7_BASIC.contains(c) {
        Some(1)
    } else if GSM7_EXTENSION.contains(c) {
        Some(2)
    } else {
        None
    }
}

/// Split `text` into the parts a multipart send transmits.
///
/// Always returns at least one part; an empty message is one empty part.
pub fn divide_message(text: &str) -> Vec<String> {
    let encoding = SmsEncoding::detect(text);
    let (single, multi) = encoding.limits();

    let total: usize = text.chars().map(|c| encoding.cost(c)).sum();
    if total <= single {
        return vec![text.to_string()];
    }

    let mut parts = Vec::with_capacity(total.div_ceil(multi));
    let mut current = String::new();
    let mut used = 0;
    for c in text.chars() {
        let cost = encoding.cost(c);
        if used + cost > multi {
            parts.push(std::mem::take(&mut current));
            used = 0;
        }
        current.push(c);
        used += cost;
    }
    if !current.is_empty() {
        parts.push(current);
    }

    tracing::debug!(?encoding, total, parts = parts.len(), "divided SMS");
    parts
}
