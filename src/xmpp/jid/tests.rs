/*
** This file is a part of xmpp-session (XMPP client session engine)
** Copyright (C) 2000-2025 Gurer Ozen
**
** xmpp-session is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use super::error::description;
use super::*;

fn check_jid(
    jid: Jid,
    full: &str,
    bare: &str,
    local: Option<&str>,
    domain: &str,
    resource: Option<&str>,
) {
    assert_eq!(jid.full(), full);
    assert_eq!(jid.bare(), bare);
    assert_eq!(jid.localpart(), local);
    assert_eq!(jid.domainpart(), domain);
    assert_eq!(jid.resourcepart(), resource);
    assert_eq!(jid.is_bare(), resource.is_none());
    assert_eq!(jid.to_string(), full);
}

#[test]
fn good_jids() {
    check_jid(
        Jid::new("juliet@example.com").unwrap(),
        "juliet@example.com",
        "juliet@example.com",
        Some("juliet"),
        "example.com",
        None,
    );
    check_jid(
        Jid::new("juliet@example.com/balcony").unwrap(),
        "juliet@example.com/balcony",
        "juliet@example.com",
        Some("juliet"),
        "example.com",
        Some("balcony"),
    );
    check_jid(
        Jid::new("room@conference.example.com/nick@home/2").unwrap(),
        "room@conference.example.com/nick@home/2",
        "room@conference.example.com",
        Some("room"),
        "conference.example.com",
        Some("nick@home/2"),
    );
    check_jid(
        "upload.example.com".parse().unwrap(),
        "upload.example.com",
        "upload.example.com",
        None,
        "upload.example.com",
        None,
    );
    check_jid(
        Jid::new("a.example.com/b@example.net").unwrap(),
        "a.example.com/b@example.net",
        "a.example.com",
        None,
        "a.example.com",
        Some("b@example.net"),
    );
    check_jid(
        Jid::new("romeo@example.net./orchard").unwrap(),
        "romeo@example.net/orchard",
        "romeo@example.net",
        Some("romeo"),
        "example.net",
        Some("orchard"),
    );
}

#[test]
fn resource_change() {
    let jid = Jid::new("juliet@example.com/balcony").unwrap();
    check_jid(
        jid.with_resource("orchard").unwrap(),
        "juliet@example.com/orchard",
        "juliet@example.com",
        Some("juliet"),
        "example.com",
        Some("orchard"),
    );
    check_jid(
        jid.to_bare(),
        "juliet@example.com",
        "juliet@example.com",
        Some("juliet"),
        "example.com",
        None,
    );

    let jid = Jid::new("example.com").unwrap();
    check_jid(
        jid.with_resource("street").unwrap(),
        "example.com/street",
        "example.com",
        None,
        "example.com",
        Some("street"),
    );
    assert_eq!(
        jid.with_resource(""),
        Err(BadJid(description::RESOURCE_EMPTY))
    );
}

#[test]
fn bad_jids() {
    assert_eq!(Jid::new(""), Err(BadJid(description::DOMAIN_EMPTY)));
    assert_eq!(Jid::new("."), Err(BadJid(description::DOMAIN_EMPTY)));
    assert_eq!(
        Jid::new("/resource"),
        Err(BadJid(description::DOMAIN_EMPTY))
    );
    assert_eq!(
        Jid::new("local@/resource"),
        Err(BadJid(description::DOMAIN_EMPTY))
    );
    assert_eq!(Jid::new("local@"), Err(BadJid(description::DOMAIN_EMPTY)));
    assert_eq!(
        Jid::new("@example.com"),
        Err(BadJid(description::LOCAL_EMPTY))
    );
    assert_eq!(
        Jid::new("example.com/"),
        Err(BadJid(description::RESOURCE_EMPTY))
    );

    let long = "x".repeat(1024);
    assert_eq!(
        Jid::new(&format!("{long}@example.com")),
        Err(BadJid(description::LOCAL_TOO_LONG))
    );
    assert_eq!(Jid::new(&long), Err(BadJid(description::DOMAIN_TOO_LONG)));
    assert_eq!(
        Jid::new(&format!("example.com/{long}")),
        Err(BadJid(description::RESOURCE_TOO_LONG))
    );
}

#[test]
fn ordering() {
    let a: Jid = "a@example.com".parse().unwrap();
    let b: Jid = "b@example.com".parse().unwrap();
    assert!(a < b);
    assert_eq!(a, Jid::new("a@example.com.").unwrap());
}
