/*
** This file is a part of xmpp-session (XMPP client session engine)
** Copyright (C) 2000-2025 Gurer Ozen
**
** xmpp-session is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

pub const CLIENT_PORT: u16 = 5222;

pub const COMPONENT_PORT: u16 = 5347;

pub const STREAM_END: &str = "</stream:stream>";

pub const XML_DECLARATION: &str = "<?xml version='1.0'?>";

pub mod ns {
    pub const XML: &str = "http://www.w3.org/XML/1998/namespace";
    pub const STREAM: &str = "http://etherx.jabber.org/streams";
    pub const CLIENT: &str = "jabber:client";
    pub const COMPONENT: &str = "jabber:component:accept";
    pub const STREAM_ERRORS: &str = "urn:ietf:params:xml:ns:xmpp-streams";
    pub const STANZAS: &str = "urn:ietf:params:xml:ns:xmpp-stanzas";
    pub const TLS: &str = "urn:ietf:params:xml:ns:xmpp-tls";
    pub const SASL: &str = "urn:ietf:params:xml:ns:xmpp-sasl";
    pub const BIND: &str = "urn:ietf:params:xml:ns:xmpp-bind";
    pub const SESSION: &str = "urn:ietf:params:xml:ns:xmpp-session";
    pub const PING: &str = "urn:xmpp:ping";
    pub const OOB: &str = "jabber:x:oob";
    pub const HTTP_UPLOAD: &str = "urn:xmpp:http:upload:0";
    pub const ROSTER: &str = "jabber:iq:roster";
    pub const SEARCH: &str = "jabber:iq:search";
    pub const LAST: &str = "jabber:iq:last";
    pub const VERSION: &str = "jabber:iq:version";
    pub const DISCO_INFO: &str = "http://jabber.org/protocol/disco#info";
    pub const DISCO_ITEMS: &str = "http://jabber.org/protocol/disco#items";
    pub const MUC: &str = "http://jabber.org/protocol/muc";
}
