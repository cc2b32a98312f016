/*
** This file is a part of xmpp-session (XMPP client session engine)
** Copyright (C) 2000-2025 Gurer Ozen
**
** xmpp-session is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

mod client;
mod component;
pub mod constants;
mod element;
mod error;
mod events;
mod jid;
mod keepalive;
mod outgoing;
mod parser;
mod payload;
mod protocol;
pub mod sasl;
mod stanza;
mod tls;
mod transport;
mod writer;

pub use client::XmppClient;
pub use client::XmppClientBuilder;
pub use component::ComponentBuilder;
pub use element::Element;
pub use element::ExtensionElement;
pub use element::Node;
pub use element::QName;
pub use error::DecodeError;
pub use error::XmppError;
pub use events::Chat;
pub use events::Event;
pub use events::IqEvent;
pub use jid::BadJid;
pub use jid::Jid;
pub use keepalive::KeepaliveConfig;
pub use keepalive::LivenessMonitor;
pub use outgoing::OutgoingStanza;
pub use outgoing::StanzaKind;
pub use parser::StanzaReader;
pub use parser::StreamElement;
pub use parser::StreamParser;
pub use payload::Bind;
pub use payload::DataForm;
pub use payload::DiscoInfo;
pub use payload::DiscoItem;
pub use payload::DiscoItems;
pub use payload::FormField;
pub use payload::Identity;
pub use payload::IqPayload;
pub use payload::LastActivity;
pub use payload::Roster;
pub use payload::RosterItem;
pub use payload::SearchItem;
pub use payload::SearchResult;
pub use payload::UploadSlot;
pub use protocol::NegotiationState;
pub use protocol::SessionConfig;
pub use protocol::StreamNegotiator;
pub use stanza::Iq;
pub use stanza::IqType;
pub use stanza::Message;
pub use stanza::Oob;
pub use stanza::Presence;
pub use stanza::Stanza;
pub use stanza::StanzaError;
pub use stanza::StreamFeatures;
pub use stanza::StreamHeader;
pub use tls::TlsMode;
pub use transport::NetStream;
pub use transport::ShutdownHandle;
pub use transport::TlsSettings;
pub use transport::Transport;
pub use writer::StanzaWriter;
