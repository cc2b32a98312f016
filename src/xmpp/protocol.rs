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
use std::io::Write;

use tracing::debug;
use tracing::trace;

use crate::entities::escape;

use super::constants::XML_DECLARATION;
use super::constants::ns;
use super::error::XmppError;
use super::jid::Jid;
use super::parser::StanzaReader;
use super::parser::StreamElement;
use super::payload::IqPayload;
use super::sasl;
use super::sasl::Credentials;
use super::stanza;
use super::stanza::IqType;
use super::stanza::Stanza;
use super::stanza::StreamFeatures;
use super::stanza::StreamHeader;
use super::tls::TlsMode;
use super::transport::TlsSettings;
use super::transport::Transport;

const BIND_ID: &str = "bind_1";
const SESSION_ID: &str = "session_1";

/// Opening tag of a stream addressed to `to`.
pub fn stream_header(to: &str, namespace: &str, declaration: bool) -> String {
    format!(
        "{}<stream:stream to='{}' xmlns='{namespace}' xmlns:stream='{}' version='1.0'>",
        if declaration { XML_DECLARATION } else { "" },
        escape(to),
        ns::STREAM,
    )
}

/// Steps of the session establishment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    Connected,
    StreamOpen,
    FeaturesKnown,
    Authenticated,
    StreamReopened,
    Bound,
    Ready,
}

/// What the negotiation needs to know about the account.
#[derive(Clone)]
pub struct SessionConfig {
    pub jid: Jid,
    pub password: String,
    /// None lets the server pick a resource.
    pub resource: Option<String>,
    pub tls: TlsSettings,
    /// Establish a legacy session if the server offers it.
    pub legacy_session: bool,
}

/// Result of a successful negotiation, still on the unsplit transport.
pub struct Negotiated<T> {
    pub reader: StanzaReader<T>,
    pub jid: Jid,
    pub header: StreamHeader,
    pub features: StreamFeatures,
}

/// Drives a client stream from the TCP connection to a bound resource.
pub struct StreamNegotiator<'a, T> {
    reader: StanzaReader<T>,
    config: &'a SessionConfig,
    state: NegotiationState,
}

fn write_to<W: Write>(stream: &mut W, xml: &str) -> Result<(), XmppError> {
    trace!("Sending bytes: {xml}");
    stream.write_all(xml.as_bytes())?;
    stream.flush()?;
    Ok(())
}

/// Reads the `<stream:stream>` header the server must answer with.
pub fn read_header<R: Read>(reader: &mut StanzaReader<R>) -> Result<StreamHeader, XmppError> {
    match reader.next_element()? {
        Some(StreamElement::Header(element)) => Ok(StreamHeader::from_element(&element)),
        Some(StreamElement::Element(element)) => match stanza::decode(element) {
            Ok(Stanza::StreamError { condition, text }) => Err(XmppError::Stream { condition, text }),
            Ok(other) => Err(XmppError::Protocol(format!(
                "expected stream header, got {}",
                other.kind()
            ))),
            Err(err) => Err(XmppError::Protocol(format!(
                "expected stream header, got {err}"
            ))),
        },
        Some(StreamElement::End) | None => Err(XmppError::Protocol(
            "stream closed before the header".into(),
        )),
    }
}

/// Reads the next stanza, treating the end of the stream as a failure.
pub fn expect_stanza<R: Read>(
    reader: &mut StanzaReader<R>,
    expected: &str,
) -> Result<Stanza, XmppError> {
    match reader.next_stanza()? {
        Some(Stanza::StreamError { condition, text }) => Err(XmppError::Stream { condition, text }),
        Some(stanza) => Ok(stanza),
        None => Err(XmppError::Protocol(format!(
            "stream closed while waiting for {expected}"
        ))),
    }
}

impl<'a, T: Transport> StreamNegotiator<'a, T> {
    pub fn new(transport: T, config: &'a SessionConfig) -> Self {
        StreamNegotiator {
            reader: StanzaReader::new(transport),
            config,
            state: NegotiationState::Connected,
        }
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    fn transition(&mut self, state: NegotiationState) {
        debug!("Negotiation: {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    fn send(&mut self, xml: &str) -> Result<(), XmppError> {
        write_to(self.reader.get_mut(), xml)
    }

    fn domain(&self) -> &str {
        self.config.jid.domainpart()
    }

    /// Runs every step up to the bound resource.
    ///
    /// Any failure drops the transport, which closes the connection.
    pub fn negotiate(mut self) -> Result<Negotiated<T>, XmppError> {
        let mut features = self.open_stream()?;
        if self.needs_starttls(&features)? {
            self = self.starttls()?;
            features = self.open_stream()?;
        }
        self.authenticate(&features)?;
        let (header, features) = self.reopen_stream()?;
        if !features.bind {
            debug!("Server did not announce resource binding, trying anyway");
        }
        let jid = self.bind()?;
        if self.config.legacy_session && features.session {
            self.establish_session()?;
        }
        self.transition(NegotiationState::Ready);
        Ok(Negotiated {
            reader: self.reader,
            jid,
            header,
            features,
        })
    }

    fn open_stream(&mut self) -> Result<StreamFeatures, XmppError> {
        let header = stream_header(self.domain(), ns::CLIENT, true);
        self.send(&header)?;
        let header = read_header(&mut self.reader)?;
        debug!("Stream opened, id {:?}", header.id);
        self.transition(NegotiationState::StreamOpen);
        match expect_stanza(&mut self.reader, "stream features")? {
            Stanza::Features(features) => {
                self.transition(NegotiationState::FeaturesKnown);
                Ok(features)
            }
            other => Err(XmppError::Protocol(format!(
                "expected stream features, got {}",
                other.kind()
            ))),
        }
    }

    fn needs_starttls(&self, features: &StreamFeatures) -> Result<bool, XmppError> {
        match self.config.tls.mode {
            TlsMode::StartTls if !features.starttls => Err(XmppError::Tls(
                "server does not offer STARTTLS".into(),
            )),
            TlsMode::StartTls => Ok(true),
            TlsMode::Disabled if features.starttls_required => Err(XmppError::Protocol(
                "server requires STARTTLS but TLS is disabled".into(),
            )),
            TlsMode::Disabled | TlsMode::Direct => Ok(false),
        }
    }

    fn starttls(mut self) -> Result<Self, XmppError> {
        self.send(&format!("<starttls xmlns='{}'/>", ns::TLS))?;
        match expect_stanza(&mut self.reader, "STARTTLS answer")? {
            Stanza::TlsProceed => (),
            Stanza::TlsFailure => {
                return Err(XmppError::Tls("server refused STARTTLS".into()));
            }
            other => {
                return Err(XmppError::Protocol(format!(
                    "expected STARTTLS proceed, got {}",
                    other.kind()
                )));
            }
        }
        let (transport, _) = self.reader.into_parts();
        let transport = transport.upgrade(&self.config.tls)?;
        debug!("Stream is encrypted");
        let mut negotiator = StreamNegotiator {
            reader: StanzaReader::new(transport),
            config: self.config,
            state: self.state,
        };
        negotiator.transition(NegotiationState::Connected);
        Ok(negotiator)
    }

    fn authenticate(&mut self, features: &StreamFeatures) -> Result<(), XmppError> {
        let username = self
            .config
            .jid
            .localpart()
            .ok_or_else(|| XmppError::Auth("account address has no local part".into()))?;
        let credentials = Credentials {
            username: username.to_string(),
            password: self.config.password.clone(),
            domain: self.domain().to_string(),
        };
        let mut mechanism = sasl::select(&features.mechanisms, &credentials)?;
        debug!("Authenticating with {}", mechanism.name());
        let initial = mechanism.initial_response()?;
        self.send(&sasl::auth_element(mechanism.name(), initial.as_deref()))?;
        loop {
            match expect_stanza(&mut self.reader, "SASL answer")? {
                Stanza::SaslChallenge(data) => {
                    let response = mechanism.respond(&sasl::decode(&data)?)?;
                    self.send(&sasl::response_element(&response))?;
                }
                Stanza::SaslSuccess(data) => {
                    mechanism.verify_success(&sasl::decode(&data)?)?;
                    self.transition(NegotiationState::Authenticated);
                    return Ok(());
                }
                Stanza::SaslFailure { condition, text } => {
                    return Err(XmppError::Auth(match text {
                        Some(text) => format!("{condition} ({text})"),
                        None => condition,
                    }));
                }
                other => {
                    return Err(XmppError::Protocol(format!(
                        "expected SASL success or failure, got {}",
                        other.kind()
                    )));
                }
            }
        }
    }

    fn reopen_stream(&mut self) -> Result<(StreamHeader, StreamFeatures), XmppError> {
        self.reader.restart();
        let header = stream_header(self.domain(), ns::CLIENT, false);
        self.send(&header)?;
        let header = read_header(&mut self.reader)?;
        // Some servers skip or garble the features after an abbreviated restart.
        let features = match self.reader.next_stanza() {
            Ok(Some(Stanza::Features(features))) => features,
            Ok(Some(Stanza::StreamError { condition, text })) => {
                return Err(XmppError::Stream { condition, text });
            }
            Ok(Some(other)) => {
                return Err(XmppError::Protocol(format!(
                    "expected stream features, got {}",
                    other.kind()
                )));
            }
            Ok(None) => {
                return Err(XmppError::Protocol(
                    "stream closed while waiting for stream features".into(),
                ));
            }
            Err(XmppError::Decode(err)) => {
                debug!("Ignoring bad stream features after restart: {err}");
                StreamFeatures::default()
            }
            Err(err) => return Err(err),
        };
        self.transition(NegotiationState::StreamReopened);
        Ok((header, features))
    }

    fn bind(&mut self) -> Result<Jid, XmppError> {
        let resource = match &self.config.resource {
            Some(resource) if !resource.is_empty() => {
                format!("<resource>{}</resource>", escape(resource))
            }
            _ => String::new(),
        };
        let request = format!(
            "<iq type='set' id='{BIND_ID}'><bind xmlns='{}'>{resource}</bind></iq>",
            ns::BIND
        );
        self.send(&request)?;
        let iq = match expect_stanza(&mut self.reader, "bind result")? {
            Stanza::Iq(iq) => iq,
            other => {
                return Err(XmppError::Protocol(format!(
                    "expected bind result, got {}",
                    other.kind()
                )));
            }
        };
        if iq.kind == IqType::Error {
            let condition = iq
                .error
                .map(|error| error.to_string())
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(XmppError::Protocol(format!(
                "resource binding failed: {condition}"
            )));
        }
        let jid = match iq.payload {
            Some(IqPayload::Bind(bind)) => bind.jid.filter(|jid| !jid.is_empty()).ok_or_else(|| {
                XmppError::Protocol("bind result has no jid".into())
            })?,
            _ => {
                return Err(XmppError::Protocol(
                    "bind result is missing the bind payload".into(),
                ));
            }
        };
        let jid = Jid::new(&jid)?;
        debug!("Bound as {jid}");
        self.transition(NegotiationState::Bound);
        Ok(jid)
    }

    fn establish_session(&mut self) -> Result<(), XmppError> {
        let request = format!(
            "<iq type='set' id='{SESSION_ID}'><session xmlns='{}'/></iq>",
            ns::SESSION
        );
        self.send(&request)?;
        match expect_stanza(&mut self.reader, "session result")? {
            Stanza::Iq(iq) if iq.kind == IqType::Result => Ok(()),
            Stanza::Iq(iq) => {
                let condition = iq
                    .error
                    .map(|error| error.to_string())
                    .unwrap_or_else(|| iq.kind.to_string());
                Err(XmppError::Protocol(format!(
                    "session establishment failed: {condition}"
                )))
            }
            other => Err(XmppError::Protocol(format!(
                "expected session result, got {}",
                other.kind()
            ))),
        }
    }
}
