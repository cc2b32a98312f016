/*
** This file is a part of xmpp-session (XMPP client session engine)
** Copyright (C) 2000-2025 Gurer Ozen
**
** xmpp-session is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::io::Read;
use std::time::Duration;

use tracing::debug;

use super::constants::CLIENT_PORT;
use super::error::XmppError;
use super::events;
use super::events::Event;
use super::jid::Jid;
use super::keepalive::KeepaliveConfig;
use super::keepalive::LivenessMonitor;
use super::outgoing::OutgoingStanza;
use super::parser::StanzaReader;
use super::protocol::SessionConfig;
use super::protocol::StreamNegotiator;
use super::stanza::StreamFeatures;
use super::tls::TlsMode;
use super::transport;
use super::transport::TlsSettings;
use super::transport::Transport;
use super::writer::StanzaWriter;

pub struct XmppClientBuilder {
    jid: Jid,
    password: String,
    host: Option<String>,
    resource: Option<String>,
    tls_mode: TlsMode,
    skip_verify: bool,
    legacy_session: bool,
    show: String,
    status: String,
    keepalive: KeepaliveConfig,
    connection_timeout: Duration,
}

impl XmppClientBuilder {
    pub fn new(jid: Jid) -> Self {
        XmppClientBuilder {
            jid,
            password: String::new(),
            host: None,
            resource: None,
            tls_mode: TlsMode::StartTls,
            skip_verify: false,
            legacy_session: false,
            show: String::new(),
            status: String::new(),
            keepalive: KeepaliveConfig::default(),
            connection_timeout: Duration::from_secs(30),
        }
    }

    pub fn password(mut self, password: &str) -> Self {
        self.password = password.to_string();
        self
    }

    /// Server address as `host` or `host:port`, the account domain if not given.
    pub fn host(mut self, host: Option<String>) -> Self {
        self.host = host;
        self
    }

    pub fn resource(mut self, resource: Option<String>) -> Self {
        self.resource = resource;
        self
    }

    pub fn tls(mut self, mode: TlsMode) -> Self {
        self.tls_mode = mode;
        self
    }

    /// Accepts any server certificate.
    pub fn skip_verify(mut self, skip_verify: bool) -> Self {
        self.skip_verify = skip_verify;
        self
    }

    pub fn legacy_session(mut self, legacy_session: bool) -> Self {
        self.legacy_session = legacy_session;
        self
    }

    /// Initial presence sent when the session is ready.
    pub fn presence(mut self, show: &str, status: &str) -> Self {
        self.show = show.to_string();
        self.status = status.to_string();
        self
    }

    pub fn keepalive(mut self, period: Duration, timeout: Duration) -> Self {
        self.keepalive = KeepaliveConfig {
            enabled: true,
            period,
            timeout,
        };
        self
    }

    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Connects to the server and establishes the session.
    pub fn connect(self) -> Result<XmppClient, XmppError> {
        let host = match &self.host {
            Some(host) if !host.is_empty() => host.clone(),
            _ => self.jid.domainpart().to_string(),
        };
        let (stream, server_name) = transport::connect(
            &host,
            CLIENT_PORT,
            self.connection_timeout,
            self.tls_mode,
            self.skip_verify,
        )?;
        let tls = TlsSettings {
            mode: self.tls_mode,
            skip_verify: self.skip_verify,
            server_name,
        };
        self.connect_with(stream, tls)
    }

    /// Establishes the session over an already connected transport.
    pub fn connect_with<T: Transport>(
        self,
        transport: T,
        tls: TlsSettings,
    ) -> Result<XmppClient, XmppError> {
        let config = SessionConfig {
            jid: self.jid,
            password: self.password,
            resource: self.resource,
            tls,
            legacy_session: self.legacy_session,
        };
        let negotiated = StreamNegotiator::new(transport, &config).negotiate()?;
        let domain = config.jid.domainpart().to_string();
        let client = XmppClient::establish(
            negotiated.reader,
            negotiated.jid,
            domain,
            negotiated.features,
            self.keepalive,
        )?;
        client.send(&OutgoingStanza::presence(&self.show, &self.status))?;
        Ok(client)
    }
}

/// An established session.
pub struct XmppClient {
    reader: StanzaReader<Box<dyn Read + Send>>,
    writer: StanzaWriter,
    jid: Jid,
    domain: String,
    features: StreamFeatures,
    monitor: Option<LivenessMonitor>,
}

impl XmppClient {
    pub fn build(jid: Jid) -> XmppClientBuilder {
        XmppClientBuilder::new(jid)
    }

    /// Splits the negotiated transport and starts the keepalive.
    pub(crate) fn establish<T: Transport>(
        reader: StanzaReader<T>,
        jid: Jid,
        domain: String,
        features: StreamFeatures,
        keepalive: KeepaliveConfig,
    ) -> Result<XmppClient, XmppError> {
        let (transport, decoder) = reader.into_parts();
        let (read_half, write_half, shutdown) = transport.split()?;
        let read_half: Box<dyn Read + Send> = Box::new(read_half);
        let writer = StanzaWriter::new(Box::new(write_half), shutdown);
        let monitor = if keepalive.enabled {
            Some(LivenessMonitor::start(
                writer.clone(),
                jid.full().to_string(),
                domain.clone(),
                keepalive,
            )?)
        } else {
            None
        };
        debug!("Session ready as {jid}");
        Ok(XmppClient {
            reader: StanzaReader::from_parts(read_half, decoder),
            writer,
            jid,
            domain,
            features,
            monitor,
        })
    }

    /// Waits for the next event.
    ///
    /// Returns None at the end of the stream, which is also what a closed
    /// session reports.
    pub fn recv(&mut self) -> Result<Option<Event>, XmppError> {
        let stanza = match self.reader.next_stanza() {
            Ok(Some(stanza)) => stanza,
            Ok(None) => return Ok(None),
            Err(err) if self.writer.is_closed() => {
                debug!("Read failed after the session was closed: {err}");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        let monitor = self.monitor.as_ref();
        events::dispatch(stanza, |id| {
            monitor.is_some_and(|monitor| monitor.acknowledge(id))
        })
        .map(Some)
    }

    /// Handle for sending from other threads.
    pub fn writer(&self) -> StanzaWriter {
        self.writer.clone()
    }

    pub fn send(&self, stanza: &OutgoingStanza) -> Result<(), XmppError> {
        self.writer.send(stanza)
    }

    pub fn send_raw(&self, xml: &str) -> Result<(), XmppError> {
        self.writer.send_raw(xml)
    }

    /// The full address assigned by the server.
    pub fn jid(&self) -> &Jid {
        &self.jid
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn features(&self) -> &StreamFeatures {
        &self.features
    }

    /// True if the session was closed because the server stopped answering pings.
    pub fn keepalive_timed_out(&self) -> bool {
        self.monitor
            .as_ref()
            .is_some_and(|monitor| monitor.timed_out())
    }

    /// Stops the keepalive and ends the stream.
    pub fn close(&mut self) -> Result<(), XmppError> {
        // Shut the socket first so a ping stuck in a write cannot block the join.
        let result = self.writer.close();
        if let Some(monitor) = self.monitor.as_mut() {
            monitor.stop();
        }
        result
    }
}
