/*
** This file is a part of xmpp-session (XMPP client session engine)
** Copyright (C) 2000-2025 Gurer Ozen
**
** xmpp-session is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::Hmac;
use hmac::Mac;
use md5::Digest;
use md5::Md5;
use sha1::Sha1;
use sha2::Sha256;

use super::constants::ns;
use super::error::DecodeError;
use super::error::XmppError;
use super::error::description;

/// Account secrets for one authentication attempt.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    /// Service domain, used in the DIGEST-MD5 digest-uri.
    pub domain: String,
}

/// One side of a SASL exchange.
pub trait SaslMechanism: Send {
    fn name(&self) -> &'static str;

    /// Data sent within `<auth>`. None sends an empty element.
    fn initial_response(&mut self) -> Result<Option<Vec<u8>>, XmppError>;

    /// Answers a server challenge.
    fn respond(&mut self, challenge: &[u8]) -> Result<Vec<u8>, XmppError>;

    /// Checks the additional data of `<success>`.
    fn verify_success(&mut self, data: &[u8]) -> Result<(), XmppError>;
}

/// Implemented mechanisms, strongest first.
pub const MECHANISMS: &[&str] = &["SCRAM-SHA-256", "SCRAM-SHA-1", "DIGEST-MD5", "PLAIN"];

/// Picks the strongest implemented mechanism the server offers.
pub fn select(
    offered: &[String],
    credentials: &Credentials,
) -> Result<Box<dyn SaslMechanism>, XmppError> {
    let name = MECHANISMS
        .iter()
        .find(|name| offered.iter().any(|offer| offer == *name))
        .ok_or_else(|| {
            XmppError::Auth(format!(
                "no supported mechanism in [{}]",
                offered.join(", ")
            ))
        })?;
    let credentials = credentials.clone();
    let mechanism: Box<dyn SaslMechanism> = match *name {
        "SCRAM-SHA-256" => Box::new(Scram::new(ScramHash::Sha256, credentials)),
        "SCRAM-SHA-1" => Box::new(Scram::new(ScramHash::Sha1, credentials)),
        "DIGEST-MD5" => Box::new(DigestMd5::new(credentials)),
        _ => Box::new(Plain::new(credentials)),
    };
    Ok(mechanism)
}

pub fn auth_element(mechanism: &str, data: Option<&[u8]>) -> String {
    match data {
        Some(data) => format!(
            "<auth xmlns='{}' mechanism='{mechanism}'>{}</auth>",
            ns::SASL,
            encode(data)
        ),
        None => format!("<auth xmlns='{}' mechanism='{mechanism}'/>", ns::SASL),
    }
}

pub fn response_element(data: &[u8]) -> String {
    if data.is_empty() {
        format!("<response xmlns='{}'/>", ns::SASL)
    } else {
        format!("<response xmlns='{}'>{}</response>", ns::SASL, encode(data))
    }
}

/// Base64 for the wire, `=` stands for an empty but present value.
fn encode(data: &[u8]) -> String {
    if data.is_empty() {
        "=".to_string()
    } else {
        BASE64.encode(data)
    }
}

pub fn decode(text: &str) -> Result<Vec<u8>, XmppError> {
    let text = text.trim();
    if text.is_empty() || text == "=" {
        return Ok(Vec::new());
    }
    BASE64
        .decode(text)
        .map_err(|_| DecodeError::BadStream(description::SASL_BASE64).into())
}

pub struct Plain {
    credentials: Credentials,
}

impl Plain {
    pub fn new(credentials: Credentials) -> Self {
        Plain { credentials }
    }
}

impl SaslMechanism for Plain {
    fn name(&self) -> &'static str {
        "PLAIN"
    }

    fn initial_response(&mut self) -> Result<Option<Vec<u8>>, XmppError> {
        let mut data = Vec::new();
        data.push(0);
        data.extend_from_slice(self.credentials.username.as_bytes());
        data.push(0);
        data.extend_from_slice(self.credentials.password.as_bytes());
        Ok(Some(data))
    }

    fn respond(&mut self, _challenge: &[u8]) -> Result<Vec<u8>, XmppError> {
        Err(XmppError::Protocol(
            "unexpected challenge for PLAIN".into(),
        ))
    }

    fn verify_success(&mut self, _data: &[u8]) -> Result<(), XmppError> {
        Ok(())
    }
}

/// Splits a DIGEST-MD5 challenge into its `key=value` pairs.
///
/// Values may be quoted, commas inside quotes do not separate tokens.
pub fn parse_challenge(challenge: &str) -> Vec<(String, String)> {
    let mut tokens = Vec::new();
    let mut rest = challenge.trim();
    while !rest.is_empty() {
        let Some(eq_pos) = rest.find('=') else {
            break;
        };
        let key = rest[..eq_pos].trim().to_string();
        rest = rest[eq_pos + 1..].trim_start();
        let value;
        if let Some(quoted) = rest.strip_prefix('"') {
            let mut unquoted = String::new();
            let mut chars = quoted.char_indices();
            let mut end = quoted.len();
            while let Some((i, c)) = chars.next() {
                match c {
                    '\\' => {
                        if let Some((_, escaped)) = chars.next() {
                            unquoted.push(escaped);
                        }
                    }
                    '"' => {
                        end = i + 1;
                        break;
                    }
                    c => unquoted.push(c),
                }
            }
            value = unquoted;
            rest = &quoted[end..];
            rest = match rest.find(',') {
                Some(comma) => &rest[comma + 1..],
                None => "",
            };
        } else {
            let end = rest.find(',').unwrap_or(rest.len());
            value = rest[..end].trim().to_string();
            rest = if end < rest.len() { &rest[end + 1..] } else { "" };
        }
        rest = rest.trim_start();
        if !key.is_empty() {
            tokens.push((key, value));
        }
    }
    tokens
}

/// Quoted string of RFC 2831, the inverse of what `parse_challenge` unquotes.
fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

fn md5(data: &[u8]) -> Vec<u8> {
    Md5::digest(data).to_vec()
}

/// Response value of RFC 2831 for the `AUTHENTICATE` method.
pub fn digest_response(
    username: &str,
    realm: &str,
    password: &str,
    nonce: &str,
    cnonce: &str,
    digest_uri: &str,
    nonce_count: &str,
) -> String {
    let mut a1 = md5(format!("{username}:{realm}:{password}").as_bytes());
    a1.extend_from_slice(format!(":{nonce}:{cnonce}").as_bytes());
    let a2 = format!("AUTHENTICATE:{digest_uri}");
    let kd = format!(
        "{}:{nonce}:{nonce_count}:{cnonce}:auth:{}",
        hex::encode(md5(&a1)),
        hex::encode(md5(a2.as_bytes()))
    );
    hex::encode(md5(kd.as_bytes()))
}

enum DigestStep {
    Challenge,
    ResponseAuth,
    Done,
}

pub struct DigestMd5 {
    credentials: Credentials,
    cnonce: String,
    step: DigestStep,
}

impl DigestMd5 {
    pub fn new(credentials: Credentials) -> Self {
        let cnonce = format!("{:016x}", rand::random::<u64>());
        Self::with_cnonce(credentials, cnonce)
    }

    pub fn with_cnonce(credentials: Credentials, cnonce: String) -> Self {
        DigestMd5 {
            credentials,
            cnonce,
            step: DigestStep::Challenge,
        }
    }

    fn answer(&self, challenge: &str) -> Result<String, XmppError> {
        let tokens = parse_challenge(challenge);
        let token = |name: &str| {
            tokens
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str())
        };
        let nonce = token("nonce")
            .ok_or_else(|| XmppError::Auth("DIGEST-MD5 challenge has no nonce".into()))?;
        let realm = token("realm").unwrap_or(&self.credentials.domain);
        if let Some(qop) = token("qop") {
            if !qop.split(',').any(|option| option.trim() == "auth") {
                return Err(XmppError::Auth(format!(
                    "DIGEST-MD5 qop {qop} does not allow auth"
                )));
            }
        }
        let charset = token("charset").unwrap_or("utf-8");
        let digest_uri = format!("xmpp/{}", self.credentials.domain);
        let nonce_count = format!("{:08x}", 1);
        let response = digest_response(
            &self.credentials.username,
            realm,
            &self.credentials.password,
            nonce,
            &self.cnonce,
            &digest_uri,
            &nonce_count,
        );
        Ok(format!(
            "username={},realm={},nonce={},cnonce={},nc={nonce_count},\
             qop=auth,digest-uri={},response={response},charset={charset}",
            quote(&self.credentials.username),
            quote(realm),
            quote(nonce),
            quote(&self.cnonce),
            quote(&digest_uri),
        ))
    }
}

impl SaslMechanism for DigestMd5 {
    fn name(&self) -> &'static str {
        "DIGEST-MD5"
    }

    fn initial_response(&mut self) -> Result<Option<Vec<u8>>, XmppError> {
        Ok(None)
    }

    fn respond(&mut self, challenge: &[u8]) -> Result<Vec<u8>, XmppError> {
        let challenge = String::from_utf8_lossy(challenge);
        match self.step {
            DigestStep::Challenge => {
                let answer = self.answer(&challenge)?;
                self.step = DigestStep::ResponseAuth;
                Ok(answer.into_bytes())
            }
            DigestStep::ResponseAuth => {
                if !challenge.contains("rspauth=") {
                    return Err(XmppError::Auth(
                        "DIGEST-MD5 server did not confirm the response".into(),
                    ));
                }
                self.step = DigestStep::Done;
                Ok(Vec::new())
            }
            DigestStep::Done => Err(XmppError::Protocol(
                "unexpected DIGEST-MD5 challenge".into(),
            )),
        }
    }

    fn verify_success(&mut self, _data: &[u8]) -> Result<(), XmppError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScramHash {
    Sha1,
    Sha256,
}

fn hmac_of<M: Mac + hmac::digest::KeyInit>(key: &[u8], data: &[u8]) -> Result<Vec<u8>, XmppError> {
    let mut mac = <M as hmac::digest::KeyInit>::new_from_slice(key)
        .map_err(|err| XmppError::Auth(format!("HMAC key: {err}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

impl ScramHash {
    fn hmac(self, key: &[u8], data: &[u8]) -> Result<Vec<u8>, XmppError> {
        match self {
            ScramHash::Sha1 => hmac_of::<Hmac<Sha1>>(key, data),
            ScramHash::Sha256 => hmac_of::<Hmac<Sha256>>(key, data),
        }
    }

    fn hash(self, data: &[u8]) -> Vec<u8> {
        match self {
            ScramHash::Sha1 => Sha1::digest(data).to_vec(),
            ScramHash::Sha256 => Sha256::digest(data).to_vec(),
        }
    }

    fn salted_password(self, password: &[u8], salt: &[u8], iterations: u32) -> Vec<u8> {
        match self {
            ScramHash::Sha1 => {
                let mut salted = [0u8; 20];
                pbkdf2::pbkdf2_hmac::<Sha1>(password, salt, iterations, &mut salted);
                salted.to_vec()
            }
            ScramHash::Sha256 => {
                let mut salted = [0u8; 32];
                pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut salted);
                salted.to_vec()
            }
        }
    }
}

fn scram_name(username: &str) -> String {
    username.replace('=', "=3D").replace(',', "=2C")
}

fn scram_attribute<'a>(message: &'a str, name: char) -> Option<&'a str> {
    message.split(',').find_map(|part| {
        let mut chars = part.chars();
        match (chars.next(), chars.next()) {
            (Some(key), Some('=')) if key == name => Some(&part[2..]),
            _ => None,
        }
    })
}

/// SCRAM without channel binding (RFC 5802, RFC 7677).
pub struct Scram {
    hash: ScramHash,
    credentials: Credentials,
    cnonce: String,
    client_first_bare: String,
    server_signature: Option<Vec<u8>>,
    verified: bool,
}

impl Scram {
    pub fn new(hash: ScramHash, credentials: Credentials) -> Self {
        let cnonce = BASE64.encode(rand::random::<[u8; 18]>());
        Self::with_cnonce(hash, credentials, cnonce)
    }

    pub fn with_cnonce(hash: ScramHash, credentials: Credentials, cnonce: String) -> Self {
        Scram {
            hash,
            credentials,
            cnonce,
            client_first_bare: String::new(),
            server_signature: None,
            verified: false,
        }
    }

    fn client_final(&mut self, server_first: &str) -> Result<String, XmppError> {
        let bad = |what: &str| XmppError::Auth(format!("bad SCRAM server-first-message: {what}"));
        let nonce = scram_attribute(server_first, 'r').ok_or_else(|| bad("no nonce"))?;
        if !nonce.starts_with(&self.cnonce) || nonce.len() <= self.cnonce.len() {
            return Err(bad("nonce does not extend ours"));
        }
        let salt = scram_attribute(server_first, 's')
            .and_then(|salt| BASE64.decode(salt).ok())
            .ok_or_else(|| bad("no salt"))?;
        let iterations: u32 = scram_attribute(server_first, 'i')
            .and_then(|i| i.parse().ok())
            .filter(|i| *i > 0)
            .ok_or_else(|| bad("no iteration count"))?;

        let salted = self
            .hash
            .salted_password(self.credentials.password.as_bytes(), &salt, iterations);
        let client_key = self.hash.hmac(&salted, b"Client Key")?;
        let stored_key = self.hash.hash(&client_key);
        let without_proof = format!("c=biws,r={nonce}");
        let auth_message = format!("{},{server_first},{without_proof}", self.client_first_bare);
        let client_signature = self.hash.hmac(&stored_key, auth_message.as_bytes())?;
        let proof: Vec<u8> = client_key
            .iter()
            .zip(&client_signature)
            .map(|(key, signature)| key ^ signature)
            .collect();
        let server_key = self.hash.hmac(&salted, b"Server Key")?;
        self.server_signature = Some(self.hash.hmac(&server_key, auth_message.as_bytes())?);
        Ok(format!("{without_proof},p={}", BASE64.encode(proof)))
    }

    fn verify(&mut self, server_final: &str) -> Result<(), XmppError> {
        if let Some(error) = scram_attribute(server_final, 'e') {
            return Err(XmppError::Auth(format!("SCRAM server error: {error}")));
        }
        let signature = scram_attribute(server_final, 'v')
            .and_then(|v| BASE64.decode(v).ok())
            .ok_or_else(|| XmppError::Auth("SCRAM server signature is missing".into()))?;
        if self.server_signature.as_deref() != Some(signature.as_slice()) {
            return Err(XmppError::Auth("SCRAM server signature mismatch".into()));
        }
        self.verified = true;
        Ok(())
    }
}

impl SaslMechanism for Scram {
    fn name(&self) -> &'static str {
        match self.hash {
            ScramHash::Sha1 => "SCRAM-SHA-1",
            ScramHash::Sha256 => "SCRAM-SHA-256",
        }
    }

    fn initial_response(&mut self) -> Result<Option<Vec<u8>>, XmppError> {
        self.client_first_bare = format!(
            "n={},r={}",
            scram_name(&self.credentials.username),
            self.cnonce
        );
        Ok(Some(format!("n,,{}", self.client_first_bare).into_bytes()))
    }

    fn respond(&mut self, challenge: &[u8]) -> Result<Vec<u8>, XmppError> {
        let challenge = String::from_utf8_lossy(challenge);
        if self.server_signature.is_none() {
            Ok(self.client_final(&challenge)?.into_bytes())
        } else {
            // Some servers send the server-final-message as a challenge.
            self.verify(&challenge)?;
            Ok(Vec::new())
        }
    }

    fn verify_success(&mut self, data: &[u8]) -> Result<(), XmppError> {
        if data.is_empty() {
            if self.verified {
                return Ok(());
            }
            return Err(XmppError::Auth(
                "SCRAM success without server signature".into(),
            ));
        }
        self.verify(&String::from_utf8_lossy(data))
    }
}
