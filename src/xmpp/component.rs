/*
** This file is a part of xmpp-session (XMPP client session engine)
** Copyright (C) 2000-2025 Gurer Ozen
**
** xmpp-session is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::io::Write;
use std::time::Duration;

use sha1::Digest;
use sha1::Sha1;
use tracing::debug;
use tracing::trace;

use super::client::XmppClient;
use super::constants::COMPONENT_PORT;
use super::constants::ns;
use super::error::XmppError;
use super::jid::Jid;
use super::keepalive::KeepaliveConfig;
use super::parser::StanzaReader;
use super::protocol::expect_stanza;
use super::protocol::read_header;
use super::protocol::stream_header;
use super::stanza::Stanza;
use super::stanza::StreamFeatures;
use super::tls::TlsMode;
use super::transport;
use super::transport::Transport;

/// Digest proving the shared secret (XEP-0114).
pub fn handshake_digest(stream_id: &str, secret: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(stream_id.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Connects as an external component instead of a client.
pub struct ComponentBuilder {
    host: String,
    name: String,
    secret: String,
    connection_timeout: Duration,
}

impl ComponentBuilder {
    pub fn new(host: &str, name: &str, secret: &str) -> Self {
        ComponentBuilder {
            host: host.to_string(),
            name: name.to_string(),
            secret: secret.to_string(),
            connection_timeout: Duration::from_secs(30),
        }
    }

    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    pub fn connect(self) -> Result<XmppClient, XmppError> {
        let (stream, _) = transport::connect(
            &self.host,
            COMPONENT_PORT,
            self.connection_timeout,
            TlsMode::Disabled,
            false,
        )?;
        self.connect_with(stream)
    }

    pub fn connect_with<T: Transport>(self, transport: T) -> Result<XmppClient, XmppError> {
        let jid = Jid::new(&self.name)?;
        let mut reader = StanzaReader::new(transport);
        let header = stream_header(&self.name, ns::COMPONENT, true);
        trace!("Sending bytes: {header}");
        reader.get_mut().write_all(header.as_bytes())?;
        reader.get_mut().flush()?;

        let header = read_header(&mut reader)?;
        let stream_id = header
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| XmppError::Protocol("component stream has no id".into()))?;
        let handshake = format!(
            "<handshake>{}</handshake>",
            handshake_digest(&stream_id, &self.secret)
        );
        trace!("Sending bytes: {handshake}");
        reader.get_mut().write_all(handshake.as_bytes())?;
        reader.get_mut().flush()?;

        match expect_stanza(&mut reader, "handshake") {
            Ok(Stanza::Handshake) => (),
            Err(XmppError::Stream { condition, text }) => {
                return Err(XmppError::Auth(match text {
                    Some(text) => format!("handshake rejected: {condition} ({text})"),
                    None => format!("handshake rejected: {condition}"),
                }));
            }
            Err(err) => return Err(err),
            Ok(other) => {
                return Err(XmppError::Protocol(format!(
                    "expected handshake, got {}",
                    other.kind()
                )));
            }
        }
        debug!("Component {} accepted", self.name);
        let domain = jid.domainpart().to_string();
        XmppClient::establish(
            reader,
            jid,
            domain,
            StreamFeatures::default(),
            KeepaliveConfig::default(),
        )
    }
}
