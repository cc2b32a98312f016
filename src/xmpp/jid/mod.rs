/*
** This file is a part of xmpp-session (XMPP client session engine)
** Copyright (C) 2000-2025 Gurer Ozen
**
** xmpp-session is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

mod error;

use std::fmt::Display;
use std::str::FromStr;

pub use error::BadJid;
use error::description;

const MAX_PART: usize = 1023;

fn check_resource(resource: &str) -> Result<(), BadJid> {
    if resource.is_empty() {
        return Err(BadJid(description::RESOURCE_EMPTY));
    }
    if resource.len() > MAX_PART {
        return Err(BadJid(description::RESOURCE_TOO_LONG));
    }
    Ok(())
}

/// The address of an entity in the XMPP protocol.
///
/// Each JID has three parts:
/// - Local part: Optionally identifies an account or a room on the domain.
/// - Domain part: Identifies an XMPP server or a component.
/// - Resource part: Optionally identifies a connected session of an account.
///
/// The session engine uses a bare JID for the account it logs in with, and
/// receives the full JID of the session from the server at the resource
/// binding step.
///
/// More details can be found in [RFC7622](https://datatracker.ietf.org/doc/rfc7622/)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Jid {
    full: String,
    at_pos: Option<usize>,
    slash_pos: Option<usize>,
}

impl Jid {
    /// Parses a JID from a string.
    pub fn new(jid: &str) -> Result<Self, BadJid> {
        // The resource can contain any character, so only the part
        // before the first slash is searched for the local part separator.
        let (bare, resource) = match jid.split_once('/') {
            Some((bare, resource)) => (bare, Some(resource)),
            None => (jid, None),
        };
        let (local, mut domain) = match bare.split_once('@') {
            Some((local, domain)) => (Some(local), domain),
            None => (None, bare),
        };
        if let Some(local) = local {
            if local.is_empty() {
                return Err(BadJid(description::LOCAL_EMPTY));
            }
            if local.len() > MAX_PART {
                return Err(BadJid(description::LOCAL_TOO_LONG));
            }
        }
        // Remove final dot as per RFC 7622 section 3.2
        if let Some(stripped) = domain.strip_suffix('.') {
            domain = stripped;
        }
        if domain.is_empty() {
            return Err(BadJid(description::DOMAIN_EMPTY));
        }
        if domain.len() > MAX_PART {
            return Err(BadJid(description::DOMAIN_TOO_LONG));
        }
        if let Some(resource) = resource {
            check_resource(resource)?;
        }

        let mut full = String::with_capacity(jid.len());
        let mut at_pos = None;
        if let Some(local) = local {
            full.push_str(local);
            at_pos = Some(full.len());
            full.push('@');
        }
        full.push_str(domain);
        let mut slash_pos = None;
        if let Some(resource) = resource {
            slash_pos = Some(full.len());
            full.push('/');
            full.push_str(resource);
        }

        Ok(Jid {
            full,
            at_pos,
            slash_pos,
        })
    }

    /// Full form of the JID with all the components.
    pub fn full(&self) -> &str {
        &self.full
    }

    /// Bare form of the JID without the resource part.
    pub fn bare(&self) -> &str {
        match self.slash_pos {
            Some(pos) => &self.full[..pos],
            None => &self.full,
        }
    }

    /// Only the local part of the JID.
    pub fn localpart(&self) -> Option<&str> {
        self.at_pos.map(|pos| &self.full[..pos])
    }

    /// Only the domain part of the JID.
    pub fn domainpart(&self) -> &str {
        let start = self.at_pos.map_or(0, |pos| pos + 1);
        let end = self.slash_pos.unwrap_or(self.full.len());
        &self.full[start..end]
    }

    /// Only the resource part of the JID.
    pub fn resourcepart(&self) -> Option<&str> {
        self.slash_pos.map(|pos| &self.full[pos + 1..])
    }

    /// True if the JID does not contain a resource part.
    pub fn is_bare(&self) -> bool {
        self.slash_pos.is_none()
    }

    /// Creates a copy of the JID without the resource part.
    pub fn to_bare(&self) -> Jid {
        Jid {
            full: self.bare().to_string(),
            at_pos: self.at_pos,
            slash_pos: None,
        }
    }

    /// Creates another JID by overriding the resource part.
    pub fn with_resource(&self, resource: &str) -> Result<Jid, BadJid> {
        check_resource(resource)?;
        let bare = self.bare();
        let mut full = String::with_capacity(bare.len() + 1 + resource.len());
        full.push_str(bare);
        full.push('/');
        full.push_str(resource);
        Ok(Jid {
            full,
            at_pos: self.at_pos,
            slash_pos: Some(bare.len()),
        })
    }
}

impl FromStr for Jid {
    type Err = BadJid;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Jid::new(s)
    }
}

impl Display for Jid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.full)
    }
}

#[cfg(test)]
mod tests;
