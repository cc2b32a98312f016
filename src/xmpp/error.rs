/*
** This file is a part of xmpp-session (XMPP client session engine)
** Copyright (C) 2000-2025 Gurer Ozen
**
** xmpp-session is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use thiserror::Error;

use crate::Location;
use crate::SaxError;

use super::jid::BadJid;

/// Errors of the stanza decoder.
#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum DecodeError {
    /// Parser could not allocate the memory needed for parsing buffers.
    #[error("not enough memory")]
    NoMemory,

    /// The server sent malformed XML.
    #[error("invalid XML syntax: {description} ({location})")]
    BadXml {
        description: &'static str,
        location: Location,
    },

    /// The XML is well-formed but a known element is not what the protocol requires.
    #[error("invalid stream protocol: {0}")]
    BadStream(&'static str),

    /// A top-level element with no decoder. The argument is `{namespace}local`.
    #[error("unexpected element {0}")]
    UnexpectedElement(String),

    /// The input ended inside an element.
    #[error("unexpected end of stream")]
    UnexpectedEof,
}

impl DecodeError {
    pub(crate) fn from_sax(err: SaxError, location: Location) -> Self {
        match err {
            SaxError::NoMemory => DecodeError::NoMemory,
            SaxError::BadXml(description) => DecodeError::BadXml {
                description,
                location,
            },
        }
    }
}

fn optional_text(text: &Option<String>) -> String {
    match text {
        Some(text) => format!(" ({text})"),
        None => String::new(),
    }
}

/// All the ways a session can fail.
#[derive(Debug, Error)]
pub enum XmppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Address resolution, connection or proxy tunnel failure.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("TLS error: {0}")]
    Tls(String),

    /// The server did something the negotiation does not allow.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// No usable mechanism, or the server rejected the credentials.
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("cannot decode stream: {0}")]
    Decode(#[from] DecodeError),

    /// The server closed the stream with a `<stream:error>`.
    #[error("stream error: {condition}{}", optional_text(.text))]
    Stream {
        condition: String,
        text: Option<String>,
    },

    #[error(transparent)]
    BadJid(#[from] BadJid),
}

pub(super) mod description {
    pub(in super::super) const UNBOUND_PREFIX: &str = "namespace prefix is not declared";
    pub(in super::super) const END_TAG_MISMATCH: &str = "end tag does not match the start tag";
    pub(in super::super) const IQ_TYPE: &str = "iq type must be get, set, result or error";
    pub(in super::super) const SASL_BASE64: &str = "SASL data is not valid base64";
}
