/*
** This file is a part of xmpp-session (XMPP client session engine)
** Copyright (C) 2000-2025 Gurer Ozen
**
** xmpp-session is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::fmt::Display;
use std::str::FromStr;

use super::constants::ns;
use super::element::Element;
use super::element::ExtensionElement;
use super::error::DecodeError;
use super::error::description;
use super::payload;
use super::payload::IqPayload;

/// Attributes of the `<stream:stream>` header.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StreamHeader {
    pub id: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub version: Option<String>,
    pub lang: Option<String>,
}

impl StreamHeader {
    pub fn from_element(element: &Element) -> Self {
        let attr = |name: &str| element.attr(name).map(str::to_string);
        StreamHeader {
            id: attr("id"),
            from: attr("from"),
            to: attr("to"),
            version: attr("version"),
            lang: attr("xml:lang"),
        }
    }
}

/// What the server offers after a stream is opened.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StreamFeatures {
    pub starttls: bool,
    pub starttls_required: bool,
    /// SASL mechanisms in the advertised order.
    pub mechanisms: Vec<String>,
    pub bind: bool,
    /// Legacy session establishment (RFC 3921).
    pub session: bool,
    pub session_optional: bool,
    pub extensions: Vec<ExtensionElement>,
}

/// The `<error>` child of a stanza.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StanzaError {
    pub kind: Option<String>,
    pub code: Option<String>,
    pub condition: String,
    pub text: Option<String>,
}

impl StanzaError {
    pub fn from_element(element: &Element) -> Self {
        let condition = element
            .elements()
            .find(|child| child.name.namespace == ns::STANZAS && child.name.local != "text")
            .map(|child| child.name.local.clone())
            .unwrap_or_default();
        StanzaError {
            kind: element.attr("type").map(str::to_string),
            code: element.attr("code").map(str::to_string),
            condition,
            text: element
                .child_text(ns::STANZAS, "text")
                .map(|text| text.trim().to_string()),
        }
    }
}

impl Display for StanzaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.condition)?;
        if let Some(text) = &self.text {
            write!(f, " ({text})")?;
        }
        Ok(())
    }
}

/// Out of band data reference (XEP-0066).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Oob {
    pub url: String,
    pub desc: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    pub from: Option<String>,
    pub to: Option<String>,
    pub id: Option<String>,
    /// chat, error, groupchat, headline, or normal
    pub kind: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub thread: Option<String>,
    pub error: Option<StanzaError>,
    pub oob: Option<Oob>,
    pub extensions: Vec<ExtensionElement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Presence {
    pub from: Option<String>,
    pub to: Option<String>,
    pub id: Option<String>,
    /// error, probe, subscribe, subscribed, unavailable, unsubscribe, unsubscribed
    pub kind: Option<String>,
    /// away, chat, dnd, xa
    pub show: Option<String>,
    pub status: Option<String>,
    pub priority: Option<i8>,
    pub error: Option<StanzaError>,
    pub extensions: Vec<ExtensionElement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IqType {
    Get,
    Set,
    Result,
    Error,
}

impl IqType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IqType::Get => "get",
            IqType::Set => "set",
            IqType::Result => "result",
            IqType::Error => "error",
        }
    }
}

impl FromStr for IqType {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "get" => Ok(IqType::Get),
            "set" => Ok(IqType::Set),
            "result" => Ok(IqType::Result),
            "error" => Ok(IqType::Error),
            _ => Err(DecodeError::BadStream(description::IQ_TYPE)),
        }
    }
}

impl Display for IqType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Iq {
    pub from: Option<String>,
    pub to: Option<String>,
    pub id: Option<String>,
    pub kind: IqType,
    pub payload: Option<IqPayload>,
    pub error: Option<StanzaError>,
    pub extensions: Vec<ExtensionElement>,
}

/// Every top-level element the decoder knows about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stanza {
    Header(StreamHeader),
    Features(StreamFeatures),
    StreamError {
        condition: String,
        text: Option<String>,
    },
    TlsProceed,
    TlsFailure,
    SaslChallenge(String),
    SaslSuccess(String),
    SaslFailure {
        condition: String,
        text: Option<String>,
    },
    Handshake,
    Message(Message),
    Presence(Presence),
    Iq(Iq),
}

impl Stanza {
    /// Short name for log lines and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Stanza::Header(_) => "stream header",
            Stanza::Features(_) => "stream features",
            Stanza::StreamError { .. } => "stream error",
            Stanza::TlsProceed => "TLS proceed",
            Stanza::TlsFailure => "TLS failure",
            Stanza::SaslChallenge(_) => "SASL challenge",
            Stanza::SaslSuccess(_) => "SASL success",
            Stanza::SaslFailure { .. } => "SASL failure",
            Stanza::Handshake => "component handshake",
            Stanza::Message(_) => "message",
            Stanza::Presence(_) => "presence",
            Stanza::Iq(_) => "iq",
        }
    }
}

type DecodeFn = fn(Element) -> Result<Stanza, DecodeError>;

const REGISTRY: &[(&str, &str, DecodeFn)] = &[
    (ns::STREAM, "features", decode_features),
    (ns::STREAM, "error", decode_stream_error),
    (ns::TLS, "proceed", decode_tls_proceed),
    (ns::TLS, "failure", decode_tls_failure),
    (ns::SASL, "challenge", decode_sasl_challenge),
    (ns::SASL, "success", decode_sasl_success),
    (ns::SASL, "failure", decode_sasl_failure),
    (ns::COMPONENT, "handshake", decode_handshake),
    (ns::CLIENT, "message", decode_message),
    (ns::CLIENT, "presence", decode_presence),
    (ns::CLIENT, "iq", decode_iq),
    (ns::COMPONENT, "message", decode_message),
    (ns::COMPONENT, "presence", decode_presence),
    (ns::COMPONENT, "iq", decode_iq),
];

/// Decodes a complete top-level element.
pub fn decode(element: Element) -> Result<Stanza, DecodeError> {
    match REGISTRY
        .iter()
        .find(|(namespace, local, _)| element.is(namespace, local))
    {
        Some((_, _, decode_fn)) => decode_fn(element),
        None => Err(DecodeError::UnexpectedElement(element.name.to_string())),
    }
}

fn attr(element: &Element, name: &str) -> Option<String> {
    element.attr(name).map(str::to_string)
}

/// First child element name in the given namespace and the optional text child.
fn condition(element: &Element, namespace: &str) -> (String, Option<String>) {
    let condition = element
        .elements()
        .find(|child| child.name.namespace == namespace && child.name.local != "text")
        .map(|child| child.name.local.clone())
        .unwrap_or_default();
    let text = element
        .child_text(namespace, "text")
        .map(|text| text.trim().to_string());
    (condition, text)
}

fn decode_features(element: Element) -> Result<Stanza, DecodeError> {
    let mut features = StreamFeatures::default();
    for child in element.into_elements() {
        if child.is(ns::TLS, "starttls") {
            features.starttls = true;
            features.starttls_required = child.child(ns::TLS, "required").is_some();
        } else if child.is(ns::SASL, "mechanisms") {
            features.mechanisms = child
                .elements()
                .filter(|mechanism| mechanism.is(ns::SASL, "mechanism"))
                .map(|mechanism| mechanism.text().trim().to_string())
                .collect();
        } else if child.is(ns::BIND, "bind") {
            features.bind = true;
        } else if child.is(ns::SESSION, "session") {
            features.session = true;
            features.session_optional = child.child(ns::SESSION, "optional").is_some();
        } else {
            features.extensions.push(child.into());
        }
    }
    Ok(Stanza::Features(features))
}

fn decode_stream_error(element: Element) -> Result<Stanza, DecodeError> {
    let (condition, text) = condition(&element, ns::STREAM_ERRORS);
    Ok(Stanza::StreamError { condition, text })
}

fn decode_tls_proceed(_element: Element) -> Result<Stanza, DecodeError> {
    Ok(Stanza::TlsProceed)
}

fn decode_tls_failure(_element: Element) -> Result<Stanza, DecodeError> {
    Ok(Stanza::TlsFailure)
}

fn decode_sasl_challenge(element: Element) -> Result<Stanza, DecodeError> {
    Ok(Stanza::SaslChallenge(element.text().trim().to_string()))
}

fn decode_sasl_success(element: Element) -> Result<Stanza, DecodeError> {
    Ok(Stanza::SaslSuccess(element.text().trim().to_string()))
}

fn decode_sasl_failure(element: Element) -> Result<Stanza, DecodeError> {
    let (condition, text) = condition(&element, ns::SASL);
    Ok(Stanza::SaslFailure { condition, text })
}

fn decode_handshake(_element: Element) -> Result<Stanza, DecodeError> {
    Ok(Stanza::Handshake)
}

fn decode_message(element: Element) -> Result<Stanza, DecodeError> {
    let mut message = Message {
        from: attr(&element, "from"),
        to: attr(&element, "to"),
        id: attr(&element, "id"),
        kind: attr(&element, "type"),
        ..Default::default()
    };
    let content_ns = element.name.namespace.clone();
    for child in element.into_elements() {
        if child.name.namespace == content_ns {
            let field = match child.name.local.as_str() {
                "subject" => Some(&mut message.subject),
                "body" => Some(&mut message.body),
                "thread" => Some(&mut message.thread),
                _ => None,
            };
            if let Some(field) = field.filter(|field| field.is_none()) {
                *field = Some(child.text());
                continue;
            }
            if child.name.local == "error" && message.error.is_none() {
                message.error = Some(StanzaError::from_element(&child));
            }
        } else if child.is(ns::OOB, "x") && message.oob.is_none() {
            message.oob = Some(Oob {
                url: child
                    .child_text(ns::OOB, "url")
                    .map(|url| url.trim().to_string())
                    .unwrap_or_default(),
                desc: child.child_text(ns::OOB, "desc"),
            });
        }
        message.extensions.push(child.into());
    }
    Ok(Stanza::Message(message))
}

fn decode_presence(element: Element) -> Result<Stanza, DecodeError> {
    let mut presence = Presence {
        from: attr(&element, "from"),
        to: attr(&element, "to"),
        id: attr(&element, "id"),
        kind: attr(&element, "type"),
        ..Default::default()
    };
    let content_ns = element.name.namespace.clone();
    for child in element.into_elements() {
        if child.name.namespace == content_ns {
            match child.name.local.as_str() {
                "show" if presence.show.is_none() => {
                    presence.show = Some(child.text().trim().to_string());
                    continue;
                }
                "status" if presence.status.is_none() => {
                    presence.status = Some(child.text());
                    continue;
                }
                "priority" if presence.priority.is_none() => {
                    // An unparsable value stays in the extensions.
                    if let Ok(priority) = child.text().trim().parse() {
                        presence.priority = Some(priority);
                        continue;
                    }
                }
                "error" if presence.error.is_none() => {
                    presence.error = Some(StanzaError::from_element(&child));
                }
                _ => (),
            }
        }
        presence.extensions.push(child.into());
    }
    Ok(Stanza::Presence(presence))
}

fn decode_iq(element: Element) -> Result<Stanza, DecodeError> {
    let kind: IqType = element.attr("type").unwrap_or_default().parse()?;
    let mut iq = Iq {
        from: attr(&element, "from"),
        to: attr(&element, "to"),
        id: attr(&element, "id"),
        kind,
        payload: None,
        error: None,
        extensions: Vec::new(),
    };
    let content_ns = element.name.namespace.clone();
    for child in element.into_elements() {
        if child.name.namespace == content_ns && child.name.local == "error" {
            if iq.error.is_none() {
                iq.error = Some(StanzaError::from_element(&child));
            }
        } else if iq.payload.is_none() {
            if let Some(payload) = payload::decode(&child)? {
                iq.payload = Some(payload);
                continue;
            }
        }
        iq.extensions.push(child.into());
    }
    Ok(Stanza::Iq(iq))
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::xmpp::parser::StreamElement;
    use crate::xmpp::parser::StreamParser;
    use crate::xmpp::payload::Identity;
    use crate::xmpp::payload::LastActivity;
    use crate::xmpp::payload::UploadSlot;

    fn decode_text(text: &str) -> Result<Stanza, DecodeError> {
        let mut parser = StreamParser::new();
        parser.push_bytes(text.as_bytes());
        match parser.next_element() {
            Ok(Some(StreamElement::Element(element))) => decode(element),
            other => panic!("no element: {other:?}"),
        }
    }

    fn decode_iq_payload(text: &str) -> Option<IqPayload> {
        match decode_text(text) {
            Ok(Stanza::Iq(iq)) => iq.payload,
            other => panic!("no iq: {other:?}"),
        }
    }

    #[test]
    fn features() {
        let stanza = decode_text(
            "<stream:features xmlns:stream='http://etherx.jabber.org/streams'>\
             <starttls xmlns='urn:ietf:params:xml:ns:xmpp-tls'><required/></starttls>\
             <mechanisms xmlns='urn:ietf:params:xml:ns:xmpp-sasl'>\
             <mechanism> SCRAM-SHA-1 </mechanism><mechanism>PLAIN</mechanism></mechanisms>\
             <bind xmlns='urn:ietf:params:xml:ns:xmpp-bind'/>\
             <session xmlns='urn:ietf:params:xml:ns:xmpp-session'><optional/></session>\
             <sm xmlns='urn:xmpp:sm:3'/></stream:features>",
        );
        let Ok(Stanza::Features(features)) = stanza else {
            panic!("no features");
        };
        assert!(features.starttls && features.starttls_required);
        assert_eq!(features.mechanisms, ["SCRAM-SHA-1", "PLAIN"]);
        assert!(features.bind);
        assert!(features.session && features.session_optional);
        assert_eq!(features.extensions.len(), 1);
        assert!(features.extensions[0].name.is("urn:xmpp:sm:3", "sm"));
    }

    #[test]
    fn stream_error() {
        let stanza = decode_text(
            "<stream:error xmlns:stream='http://etherx.jabber.org/streams'>\
             <see-other-host xmlns='urn:ietf:params:xml:ns:xmpp-streams'>other.example.com</see-other-host>\
             <text xmlns='urn:ietf:params:xml:ns:xmpp-streams'> moved </text></stream:error>",
        );
        assert_eq!(
            stanza,
            Ok(Stanza::StreamError {
                condition: "see-other-host".to_string(),
                text: Some("moved".to_string()),
            })
        );
    }

    #[test]
    fn presence() {
        let stanza = decode_text(
            "<presence xmlns='jabber:client' from='romeo@example.net/orchard'>\
             <show>dnd</show><status>busy</status><priority>-5</priority>\
             <c xmlns='http://jabber.org/protocol/caps' node='urn:x' ver='abc'/></presence>",
        );
        let Ok(Stanza::Presence(presence)) = stanza else {
            panic!("no presence");
        };
        assert_eq!(presence.from.as_deref(), Some("romeo@example.net/orchard"));
        assert_eq!(presence.show.as_deref(), Some("dnd"));
        assert_eq!(presence.status.as_deref(), Some("busy"));
        assert_eq!(presence.priority, Some(-5));
        assert_eq!(presence.extensions.len(), 1);
        assert_eq!(presence.extensions[0].attr("ver"), Some("abc"));

        let stanza = decode_text(
            "<presence xmlns='jabber:client' from='mallory@evil.example/x'>\
             <priority>high</priority><priority>300</priority></presence>",
        );
        let Ok(Stanza::Presence(presence)) = stanza else {
            panic!("no presence");
        };
        assert_eq!(presence.priority, None);
        assert_eq!(presence.extensions.len(), 2);
        assert_eq!(presence.extensions[0].name.local, "priority");
        assert_eq!(presence.extensions[0].inner_xml, "high");
        assert_eq!(presence.extensions[1].inner_xml, "300");
    }

    #[test]
    fn iq_payloads() {
        assert_eq!(
            decode_iq_payload(
                "<iq xmlns='jabber:client' type='result' id='u1'>\
                 <slot xmlns='urn:xmpp:http:upload:0'>\
                 <put url='https://upload.example.com/put'>\
                 <header name='Authorization'>Basic Zm9v</header></put>\
                 <get url='https://upload.example.com/get'/></slot></iq>"
            ),
            Some(IqPayload::UploadSlot(UploadSlot {
                put_url: "https://upload.example.com/put".to_string(),
                put_headers: vec![("Authorization".to_string(), "Basic Zm9v".to_string())],
                get_url: "https://upload.example.com/get".to_string(),
            }))
        );

        assert_eq!(
            decode_iq_payload(
                "<iq xmlns='jabber:client' type='result' id='l1'>\
                 <query xmlns='jabber:iq:last' seconds='903'>Heading home</query></iq>"
            ),
            Some(IqPayload::LastActivity(LastActivity {
                seconds: Some(903),
                text: "Heading home".to_string(),
            }))
        );

        let Some(IqPayload::DiscoInfo(info)) = decode_iq_payload(
            "<iq xmlns='jabber:client' type='result' id='d1'>\
             <query xmlns='http://jabber.org/protocol/disco#info'>\
             <identity category='server' type='im' name='Prosody'/>\
             <feature var='urn:xmpp:ping'/><feature var='jabber:iq:version'/>\
             <x xmlns='jabber:x:data' type='result'><field var='FORM_TYPE' type='hidden'>\
             <value>http://jabber.org/network/serverinfo</value></field></x>\
             </query></iq>",
        ) else {
            panic!("no disco info");
        };
        assert_eq!(
            info.identities,
            [Identity {
                category: "server".to_string(),
                kind: "im".to_string(),
                name: Some("Prosody".to_string()),
            }]
        );
        assert_eq!(info.features, ["urn:xmpp:ping", "jabber:iq:version"]);
        assert_eq!(info.forms.len(), 1);
        assert_eq!(
            info.forms[0].fields[0].values,
            ["http://jabber.org/network/serverinfo"]
        );

        assert_eq!(
            decode_iq_payload(
                "<iq xmlns='jabber:client' type='get' id='p1'><ping xmlns='urn:xmpp:ping'/></iq>"
            ),
            Some(IqPayload::Ping)
        );
    }

    #[test]
    fn iq_errors() {
        let Ok(Stanza::Iq(iq)) = decode_text(
            "<iq xmlns='jabber:client' type='error' id='e1'>\
             <ping xmlns='urn:xmpp:ping'/>\
             <error type='cancel' code='501'>\
             <service-unavailable xmlns='urn:ietf:params:xml:ns:xmpp-stanzas'/>\
             <text xmlns='urn:ietf:params:xml:ns:xmpp-stanzas'>no pings</text></error></iq>",
        ) else {
            panic!("no iq");
        };
        assert_eq!(iq.kind, IqType::Error);
        let error = iq.error.unwrap();
        assert_eq!(error.to_string(), "service-unavailable (no pings)");
        assert_eq!(error.code.as_deref(), Some("501"));

        assert_eq!(
            decode_text("<iq xmlns='jabber:client' type='push'/>"),
            Err(DecodeError::BadStream(description::IQ_TYPE))
        );
    }

    #[test]
    fn unknown_element() {
        assert_eq!(
            decode_text("<foo xmlns='urn:x'/>"),
            Err(DecodeError::UnexpectedElement("{urn:x}foo".to_string()))
        );
        assert_eq!(
            decode_text("<message/>"),
            Err(DecodeError::UnexpectedElement("message".to_string()))
        );
    }
}
