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

use crate::entities::escape;
use crate::entities::escape_fmt;

use super::constants::ns;
use super::stanza::IqType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StanzaKind {
    Message,
    Presence,
    Iq,
}

impl StanzaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StanzaKind::Message => "message",
            StanzaKind::Presence => "presence",
            StanzaKind::Iq => "iq",
        }
    }
}

/// A stanza ready to be written.
///
/// Attribute values are escaped on output, the payload is inserted as is
/// and must already be well-formed XML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingStanza {
    pub kind: StanzaKind,
    pub from: Option<String>,
    pub to: Option<String>,
    pub id: Option<String>,
    pub stanza_type: Option<String>,
    pub payload: String,
}

/// Builds a text element with escaped content, nothing if the text is empty.
fn text_element(name: &str, text: &str) -> String {
    if text.is_empty() {
        String::new()
    } else {
        format!("<{name}>{}</{name}>", escape(text))
    }
}

impl OutgoingStanza {
    pub fn new(kind: StanzaKind) -> Self {
        OutgoingStanza {
            kind,
            from: None,
            to: None,
            id: None,
            stanza_type: None,
            payload: String::new(),
        }
    }

    pub fn from(mut self, from: &str) -> Self {
        self.from = Some(from.to_string());
        self
    }

    pub fn to(mut self, to: &str) -> Self {
        self.to = Some(to.to_string());
        self
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn stanza_type(mut self, stanza_type: &str) -> Self {
        self.stanza_type = Some(stanza_type.to_string());
        self
    }

    pub fn payload(mut self, payload: &str) -> Self {
        self.payload = payload.to_string();
        self
    }

    /// Chat message with a body.
    pub fn chat(to: &str, message_type: &str, text: &str) -> Self {
        OutgoingStanza::new(StanzaKind::Message)
            .to(to)
            .stanza_type(message_type)
            .payload(&text_element("body", text))
    }

    /// Changes the subject of a conversation or a room.
    pub fn subject(to: &str, message_type: &str, subject: &str) -> Self {
        OutgoingStanza::new(StanzaKind::Message)
            .to(to)
            .stanza_type(message_type)
            .payload(&format!("<subject>{}</subject>", escape(subject)))
    }

    /// Broadcast presence with optional show and status.
    pub fn presence(show: &str, status: &str) -> Self {
        let mut payload = text_element("show", show);
        payload.push_str(&text_element("status", status));
        OutgoingStanza::new(StanzaKind::Presence).payload(&payload)
    }

    /// subscribe, subscribed, unsubscribe or unsubscribed.
    pub fn subscription(to: &str, subscription_type: &str) -> Self {
        OutgoingStanza::new(StanzaKind::Presence)
            .to(to)
            .stanza_type(subscription_type)
    }

    /// Joins a multi-user chat room without asking for history.
    pub fn join_muc(room: &str, nick: &str) -> Self {
        OutgoingStanza::new(StanzaKind::Presence)
            .to(&format!("{room}/{nick}"))
            .payload(&format!(
                "<x xmlns='{}'><history maxchars='0'/></x>",
                ns::MUC
            ))
    }

    pub fn leave_muc(from: &str, room: &str) -> Self {
        OutgoingStanza::new(StanzaKind::Presence)
            .from(from)
            .to(room)
            .stanza_type("unavailable")
    }

    /// Iq with a single query child.
    pub fn iq_query(iq_type: IqType, to: &str, id: &str, namespace: &str, content: &str) -> Self {
        let query = if content.is_empty() {
            format!("<query xmlns='{}'/>", escape(namespace))
        } else {
            format!("<query xmlns='{}'>{content}</query>", escape(namespace))
        };
        OutgoingStanza::new(StanzaKind::Iq)
            .to(to)
            .id(id)
            .stanza_type(iq_type.as_str())
            .payload(&query)
    }

    pub fn ping(from: &str, to: &str, id: &str) -> Self {
        OutgoingStanza::new(StanzaKind::Iq)
            .from(from)
            .to(to)
            .id(id)
            .stanza_type(IqType::Get.as_str())
            .payload(&format!("<ping xmlns='{}'/>", ns::PING))
    }

    /// Answer to a server or peer ping.
    pub fn pong(from: &str, to: &str, id: &str) -> Self {
        OutgoingStanza::new(StanzaKind::Iq)
            .from(from)
            .to(to)
            .id(id)
            .stanza_type(IqType::Result.as_str())
    }

    pub fn disco_info(to: &str, id: &str) -> Self {
        Self::iq_query(IqType::Get, to, id, ns::DISCO_INFO, "")
    }

    pub fn disco_items(to: &str, id: &str) -> Self {
        Self::iq_query(IqType::Get, to, id, ns::DISCO_ITEMS, "")
    }

    pub fn roster_get(id: &str) -> Self {
        OutgoingStanza::new(StanzaKind::Iq)
            .id(id)
            .stanza_type(IqType::Get.as_str())
            .payload(&format!("<query xmlns='{}'/>", ns::ROSTER))
    }

    pub fn version_result(to: &str, id: &str, name: &str, version: &str, os: &str) -> Self {
        let mut content = text_element("name", name);
        content.push_str(&text_element("version", version));
        content.push_str(&text_element("os", os));
        Self::iq_query(IqType::Result, to, id, ns::VERSION, &content)
    }

    /// Answer to a last activity request.
    pub fn last_activity(to: &str, id: &str, seconds: u64) -> Self {
        OutgoingStanza::new(StanzaKind::Iq)
            .to(to)
            .id(id)
            .stanza_type(IqType::Result.as_str())
            .payload(&format!("<query xmlns='{}' seconds='{seconds}'/>", ns::LAST))
    }

    /// User directory search with a free text field.
    pub fn search(to: &str, id: &str, field: &str, value: &str) -> Self {
        Self::iq_query(IqType::Set, to, id, ns::SEARCH, &text_element(field, value))
    }

    /// Requests an HTTP upload slot (XEP-0363).
    pub fn upload_slot_request(
        to: &str,
        id: &str,
        filename: &str,
        size: u64,
        content_type: Option<&str>,
    ) -> Self {
        let mut request = format!(
            "<request xmlns='{}' filename='{}' size='{size}'",
            ns::HTTP_UPLOAD,
            escape(filename)
        );
        if let Some(content_type) = content_type {
            request.push_str(&format!(" content-type='{}'", escape(content_type)));
        }
        request.push_str("/>");
        OutgoingStanza::new(StanzaKind::Iq)
            .to(to)
            .id(id)
            .stanza_type(IqType::Get.as_str())
            .payload(&request)
    }
}

impl Display for OutgoingStanza {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = self.kind.as_str();
        write!(f, "<{tag}")?;
        let attributes = [
            ("from", &self.from),
            ("to", &self.to),
            ("id", &self.id),
            ("type", &self.stanza_type),
        ];
        for (name, value) in attributes {
            if let Some(value) = value {
                write!(f, " {name}='")?;
                escape_fmt(value, f)?;
                f.write_str("'")?;
            }
        }
        if self.payload.is_empty() {
            f.write_str("/>")
        } else {
            write!(f, ">{}</{tag}>", self.payload)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_escaping() {
        let stanza = OutgoingStanza::chat("a&b@example.com", "chat", "1 < 2 & \"3\"")
            .id("x'y");
        assert_eq!(
            stanza.to_string(),
            "<message to='a&amp;b@example.com' id='x&apos;y' type='chat'>\
             <body>1 &lt; 2 &amp; &quot;3&quot;</body></message>"
        );
    }

    #[test]
    fn builders() {
        assert_eq!(
            OutgoingStanza::ping("me@example.com/r", "example.com", "p1").to_string(),
            "<iq from='me@example.com/r' to='example.com' id='p1' type='get'>\
             <ping xmlns='urn:xmpp:ping'/></iq>"
        );
        assert_eq!(
            OutgoingStanza::pong("me@example.com/r", "example.com", "s1").to_string(),
            "<iq from='me@example.com/r' to='example.com' id='s1' type='result'/>"
        );
        assert_eq!(
            OutgoingStanza::presence("", "").to_string(),
            "<presence/>"
        );
        assert_eq!(
            OutgoingStanza::presence("xa", "gone").to_string(),
            "<presence><show>xa</show><status>gone</status></presence>"
        );
        assert_eq!(
            OutgoingStanza::subscription("friend@example.com", "subscribed").to_string(),
            "<presence to='friend@example.com' type='subscribed'/>"
        );
        assert_eq!(
            OutgoingStanza::join_muc("room@muc.example.com", "nick").to_string(),
            "<presence to='room@muc.example.com/nick'>\
             <x xmlns='http://jabber.org/protocol/muc'><history maxchars='0'/></x></presence>"
        );
        assert_eq!(
            OutgoingStanza::leave_muc("me@example.com/r", "room@muc.example.com").to_string(),
            "<presence from='me@example.com/r' to='room@muc.example.com' type='unavailable'/>"
        );
        assert_eq!(
            OutgoingStanza::roster_get("r1").to_string(),
            "<iq id='r1' type='get'><query xmlns='jabber:iq:roster'/></iq>"
        );
        assert_eq!(
            OutgoingStanza::disco_info("example.com", "d1").to_string(),
            "<iq to='example.com' id='d1' type='get'>\
             <query xmlns='http://jabber.org/protocol/disco#info'/></iq>"
        );
        assert_eq!(
            OutgoingStanza::version_result("peer@example.com/x", "v1", "xmppchat", "0.1", "")
                .to_string(),
            "<iq to='peer@example.com/x' id='v1' type='result'><query xmlns='jabber:iq:version'>\
             <name>xmppchat</name><version>0.1</version></query></iq>"
        );
        assert_eq!(
            OutgoingStanza::last_activity("peer@example.com", "l1", 42).to_string(),
            "<iq to='peer@example.com' id='l1' type='result'>\
             <query xmlns='jabber:iq:last' seconds='42'/></iq>"
        );
        assert_eq!(
            OutgoingStanza::search("search.example.com", "s2", "nick", "rom").to_string(),
            "<iq to='search.example.com' id='s2' type='set'>\
             <query xmlns='jabber:iq:search'><nick>rom</nick></query></iq>"
        );
        assert_eq!(
            OutgoingStanza::upload_slot_request(
                "upload.example.com",
                "u1",
                "a&b.jpg",
                1024,
                Some("image/jpeg")
            )
            .to_string(),
            "<iq to='upload.example.com' id='u1' type='get'>\
             <request xmlns='urn:xmpp:http:upload:0' filename='a&amp;b.jpg' size='1024' \
             content-type='image/jpeg'/></iq>"
        );
    }
}
