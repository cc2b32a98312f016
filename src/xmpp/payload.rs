/*
** This file is a part of xmpp-session (XMPP client session engine)
** Copyright (C) 2000-2025 Gurer Ozen
**
** xmpp-session is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use super::constants::ns;
use super::element::Element;
use super::error::DecodeError;

/// Resource binding result.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Bind {
    pub jid: Option<String>,
    pub resource: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RosterItem {
    pub jid: String,
    pub name: Option<String>,
    pub subscription: Option<String>,
    pub ask: Option<String>,
    pub groups: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Roster {
    pub ver: Option<String>,
    pub items: Vec<RosterItem>,
}

/// HTTP upload slot (XEP-0363).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UploadSlot {
    pub put_url: String,
    pub put_headers: Vec<(String, String)>,
    pub get_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchItem {
    pub jid: String,
    pub first: Option<String>,
    pub last: Option<String>,
    pub nick: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchResult {
    pub items: Vec<SearchItem>,
}

/// Last activity (XEP-0012). Requests carry no seconds.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LastActivity {
    pub seconds: Option<u64>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Identity {
    pub category: String,
    pub kind: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FormField {
    pub var: Option<String>,
    pub kind: Option<String>,
    pub values: Vec<String>,
}

/// Extended service discovery form (XEP-0128).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DataForm {
    pub kind: Option<String>,
    pub fields: Vec<FormField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DiscoInfo {
    pub node: Option<String>,
    pub identities: Vec<Identity>,
    pub features: Vec<String>,
    pub forms: Vec<DataForm>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DiscoItem {
    pub jid: String,
    pub node: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DiscoItems {
    pub node: Option<String>,
    pub items: Vec<DiscoItem>,
}

/// Typed content of an iq stanza.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IqPayload {
    Bind(Bind),
    Roster(Roster),
    UploadSlot(UploadSlot),
    Search(SearchResult),
    LastActivity(LastActivity),
    DiscoInfo(DiscoInfo),
    DiscoItems(DiscoItems),
    Ping,
    Session,
}

const DATA_FORMS: &str = "jabber:x:data";

type PayloadFn = fn(&Element) -> Result<IqPayload, DecodeError>;

const PAYLOADS: &[(&str, &str, PayloadFn)] = &[
    (ns::BIND, "bind", decode_bind),
    (ns::ROSTER, "query", decode_roster),
    (ns::HTTP_UPLOAD, "slot", decode_slot),
    (ns::SEARCH, "query", decode_search),
    (ns::LAST, "query", decode_last),
    (ns::DISCO_INFO, "query", decode_disco_info),
    (ns::DISCO_ITEMS, "query", decode_disco_items),
    (ns::PING, "ping", decode_ping),
    (ns::SESSION, "session", decode_session),
];

/// Decodes an iq child element, None if there is no typed form for it.
pub fn decode(element: &Element) -> Result<Option<IqPayload>, DecodeError> {
    match PAYLOADS
        .iter()
        .find(|(namespace, local, _)| element.is(namespace, local))
    {
        Some((_, _, decode_fn)) => decode_fn(element).map(Some),
        None => Ok(None),
    }
}

fn attr(element: &Element, name: &str) -> Option<String> {
    element.attr(name).map(str::to_string)
}

fn decode_bind(element: &Element) -> Result<IqPayload, DecodeError> {
    Ok(IqPayload::Bind(Bind {
        jid: element.child_text(ns::BIND, "jid").map(|s| s.trim().to_string()),
        resource: element.child_text(ns::BIND, "resource"),
    }))
}

fn decode_roster(element: &Element) -> Result<IqPayload, DecodeError> {
    let items = element
        .elements()
        .filter(|item| item.is(ns::ROSTER, "item"))
        .map(|item| RosterItem {
            jid: item.attr("jid").unwrap_or_default().to_string(),
            name: attr(item, "name"),
            subscription: attr(item, "subscription"),
            ask: attr(item, "ask"),
            groups: item
                .elements()
                .filter(|group| group.is(ns::ROSTER, "group"))
                .map(|group| group.text())
                .collect(),
        })
        .collect();
    Ok(IqPayload::Roster(Roster {
        ver: attr(element, "ver"),
        items,
    }))
}

fn decode_slot(element: &Element) -> Result<IqPayload, DecodeError> {
    let mut slot = UploadSlot::default();
    if let Some(put) = element.child(ns::HTTP_UPLOAD, "put") {
        slot.put_url = put.attr("url").unwrap_or_default().to_string();
        slot.put_headers = put
            .elements()
            .filter(|header| header.is(ns::HTTP_UPLOAD, "header"))
            .map(|header| {
                (
                    header.attr("name").unwrap_or_default().to_string(),
                    header.text(),
                )
            })
            .collect();
    }
    if let Some(get) = element.child(ns::HTTP_UPLOAD, "get") {
        slot.get_url = get.attr("url").unwrap_or_default().to_string();
    }
    Ok(IqPayload::UploadSlot(slot))
}

fn decode_search(element: &Element) -> Result<IqPayload, DecodeError> {
    let items = element
        .elements()
        .filter(|item| item.is(ns::SEARCH, "item"))
        .map(|item| SearchItem {
            jid: item.attr("jid").unwrap_or_default().to_string(),
            first: item.child_text(ns::SEARCH, "first"),
            last: item.child_text(ns::SEARCH, "last"),
            nick: item.child_text(ns::SEARCH, "nick"),
            email: item.child_text(ns::SEARCH, "email"),
        })
        .collect();
    Ok(IqPayload::Search(SearchResult { items }))
}

fn decode_last(element: &Element) -> Result<IqPayload, DecodeError> {
    let seconds = element
        .attr("seconds")
        .and_then(|seconds| seconds.trim().parse().ok());
    Ok(IqPayload::LastActivity(LastActivity {
        seconds,
        text: element.text(),
    }))
}

fn decode_form(element: &Element) -> DataForm {
    DataForm {
        kind: attr(element, "type"),
        fields: element
            .elements()
            .filter(|field| field.is(DATA_FORMS, "field"))
            .map(|field| FormField {
                var: attr(field, "var"),
                kind: attr(field, "type"),
                values: field
                    .elements()
                    .filter(|value| value.is(DATA_FORMS, "value"))
                    .map(|value| value.text())
                    .collect(),
            })
            .collect(),
    }
}

fn decode_disco_info(element: &Element) -> Result<IqPayload, DecodeError> {
    let mut info = DiscoInfo {
        node: attr(element, "node"),
        ..Default::default()
    };
    for child in element.elements() {
        if child.is(ns::DISCO_INFO, "identity") {
            info.identities.push(Identity {
                category: child.attr("category").unwrap_or_default().to_string(),
                kind: child.attr("type").unwrap_or_default().to_string(),
                name: attr(child, "name"),
            });
        } else if child.is(ns::DISCO_INFO, "feature") {
            if let Some(var) = child.attr("var") {
                info.features.push(var.to_string());
            }
        } else if child.is(DATA_FORMS, "x") {
            info.forms.push(decode_form(child));
        }
    }
    Ok(IqPayload::DiscoInfo(info))
}

fn decode_disco_items(element: &Element) -> Result<IqPayload, DecodeError> {
    let items = element
        .elements()
        .filter(|item| item.is(ns::DISCO_ITEMS, "item"))
        .map(|item| DiscoItem {
            jid: item.attr("jid").unwrap_or_default().to_string(),
            node: attr(item, "node"),
            name: attr(item, "name"),
        })
        .collect();
    Ok(IqPayload::DiscoItems(DiscoItems {
        node: attr(element, "node"),
        items,
    }))
}

fn decode_ping(_element: &Element) -> Result<IqPayload, DecodeError> {
    Ok(IqPayload::Ping)
}

fn decode_session(_element: &Element) -> Result<IqPayload, DecodeError> {
    Ok(IqPayload::Session)
}
