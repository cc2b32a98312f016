/*
** This file is a part of xmpp-session (XMPP client session engine)
** Copyright (C) 2000-2025 Gurer Ozen
**
** xmpp-session is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::borrow::Cow;

pub mod predefined {
    pub const LT: &str = "&lt;";
    pub const GT: &str = "&gt;";
    pub const AMP: &str = "&amp;";
    pub const APOS: &str = "&apos;";
    pub const QUOT: &str = "&quot;";
}

fn reference(c: char) -> Option<&'static str> {
    match c {
        '<' => Some(predefined::LT),
        '>' => Some(predefined::GT),
        '&' => Some(predefined::AMP),
        '\'' => Some(predefined::APOS),
        '"' => Some(predefined::QUOT),
        _ => None,
    }
}

/// Size of the text after the [escape()] call.
pub fn escaped_size(s: &str) -> usize {
    s.chars()
        .map(|c| reference(c).map_or(c.len_utf8(), |r| r.len()))
        .sum()
}

/// Replaces the XML special characters with predefined entity references.
///
/// Borrows the input when there is nothing to replace.
pub fn escape(s: &str) -> Cow<'_, str> {
    if !s.chars().any(|c| reference(c).is_some()) {
        return Cow::Borrowed(s);
    }
    let mut escaped = String::with_capacity(escaped_size(s));
    for c in s.chars() {
        match reference(c) {
            Some(r) => escaped.push_str(r),
            None => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

/// Writes the escaped text into a formatter without an intermediate string.
pub fn escape_fmt(s: &str, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let mut start = 0;
    for (i, c) in s.char_indices() {
        if let Some(r) = reference(c) {
            f.write_str(&s[start..i])?;
            f.write_str(r)?;
            start = i + c.len_utf8();
        }
    }
    f.write_str(&s[start..])
}
