/*
** This file is a part of xmpp-session (XMPP client session engine)
** Copyright (C) 2000-2025 Gurer Ozen
**
** xmpp-session is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use super::element::ExtensionElement;
use super::error::XmppError;
use super::payload::Bind;
use super::payload::DiscoInfo;
use super::payload::DiscoItems;
use super::payload::IqPayload;
use super::payload::LastActivity;
use super::payload::Roster;
use super::payload::SearchResult;
use super::payload::UploadSlot;
use super::stanza::Iq;
use super::stanza::IqType;
use super::stanza::Message;
use super::stanza::Oob;
use super::stanza::Presence;
use super::stanza::Stanza;
use super::stanza::StanzaError;

/// A received message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Chat {
    /// Sender address.
    pub remote: String,
    pub to: Option<String>,
    pub id: Option<String>,
    /// Message type, `normal` when the sender did not give one.
    pub kind: String,
    /// Body text.
    pub text: String,
    pub subject: Option<String>,
    pub thread: Option<String>,
    pub oob: Option<Oob>,
    pub error: Option<StanzaError>,
    /// Children without a field above, in document order.
    pub extensions: Vec<ExtensionElement>,
}

impl From<Message> for Chat {
    fn from(message: Message) -> Self {
        Chat {
            remote: message.from.unwrap_or_default(),
            to: message.to,
            id: message.id,
            kind: message.kind.unwrap_or_else(|| "normal".to_string()),
            text: message.body.unwrap_or_default(),
            subject: message.subject,
            thread: message.thread,
            oob: message.oob,
            error: message.error,
            extensions: message.extensions,
        }
    }
}

/// An iq whose payload has a dedicated event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IqEvent<T> {
    pub from: Option<String>,
    pub to: Option<String>,
    pub id: Option<String>,
    pub kind: IqType,
    pub data: T,
    pub extensions: Vec<ExtensionElement>,
}

impl<T> IqEvent<T> {
    fn new(iq: Iq, data: T) -> Self {
        IqEvent {
            from: iq.from,
            to: iq.to,
            id: iq.id,
            kind: iq.kind,
            data,
            extensions: iq.extensions,
        }
    }
}

/// Everything a session reports to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Chat(Chat),
    Presence(Presence),
    Bind(IqEvent<Bind>),
    /// Roster result or roster push.
    Roster(IqEvent<Roster>),
    SearchResult(IqEvent<SearchResult>),
    /// Answer to the keepalive ping.
    PingResult { from: Option<String>, id: String },
    UploadSlot(IqEvent<UploadSlot>),
    LastActivity(IqEvent<LastActivity>),
    DiscoInfo(IqEvent<DiscoInfo>),
    DiscoItems(IqEvent<DiscoItems>),
    /// Requests, errors and iqs without a dedicated event.
    Iq(Iq),
}

/// Classifies a stanza received on an established session.
///
/// `acknowledge` is asked whether an iq id answers the outstanding
/// keepalive ping.
pub fn dispatch<F>(stanza: Stanza, acknowledge: F) -> Result<Event, XmppError>
where
    F: FnOnce(&str) -> bool,
{
    match stanza {
        Stanza::Message(message) => Ok(Event::Chat(message.into())),
        Stanza::Presence(presence) => Ok(Event::Presence(presence)),
        Stanza::Iq(iq) => Ok(dispatch_iq(iq, acknowledge)),
        Stanza::StreamError { condition, text } => Err(XmppError::Stream { condition, text }),
        other => Err(XmppError::Protocol(format!(
            "unexpected {} in an established session",
            other.kind()
        ))),
    }
}

fn dispatch_iq<F>(mut iq: Iq, acknowledge: F) -> Event
where
    F: FnOnce(&str) -> bool,
{
    if matches!(iq.kind, IqType::Result | IqType::Error) {
        if let Some(id) = &iq.id {
            if acknowledge(id) {
                return Event::PingResult {
                    from: iq.from,
                    id: id.clone(),
                };
            }
        }
    }
    if matches!(iq.kind, IqType::Get | IqType::Error) {
        return Event::Iq(iq);
    }
    match iq.payload.take() {
        Some(IqPayload::Bind(bind)) => Event::Bind(IqEvent::new(iq, bind)),
        Some(IqPayload::Roster(roster)) => Event::Roster(IqEvent::new(iq, roster)),
        Some(IqPayload::Search(result)) => Event::SearchResult(IqEvent::new(iq, result)),
        Some(IqPayload::UploadSlot(slot)) => Event::UploadSlot(IqEvent::new(iq, slot)),
        Some(IqPayload::LastActivity(last)) => Event::LastActivity(IqEvent::new(iq, last)),
        Some(IqPayload::DiscoInfo(info)) => Event::DiscoInfo(IqEvent::new(iq, info)),
        Some(IqPayload::DiscoItems(items)) => Event::DiscoItems(IqEvent::new(iq, items)),
        payload => {
            iq.payload = payload;
            Event::Iq(iq)
        }
    }
}
