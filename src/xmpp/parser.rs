/*
** This file is a part of xmpp-session (XMPP client session engine)
** Copyright (C) 2000-2025 Gurer Ozen
**
** xmpp-session is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::io::ErrorKind;
use std::io::Read;

use tracing::trace;

use crate::SaxElement;
use crate::SaxError;
use crate::SaxHandler;
use crate::SaxParser;

use super::constants::ns;
use super::element::Element;
use super::element::Node;
use super::element::QName;
use super::error::DecodeError;
use super::error::XmppError;
use super::error::description;
use super::stanza::Stanza;
use super::stanza::StreamHeader;

const READ_CHUNK_SIZE: usize = 4096;

/// A complete unit of the incoming stream.
#[derive(Debug, PartialEq, Eq)]
pub enum StreamElement {
    /// The `<stream:stream>` start tag. It has no children.
    Header(Element),
    /// A complete top-level element.
    Element(Element),
    /// The `</stream:stream>` end tag.
    End,
}

struct PendingTag {
    raw_name: String,
    attributes: Vec<(String, String)>,
}

struct OpenElement {
    raw_name: String,
    element: Element,
    content_start: usize,
}

struct TreeBuilder {
    scopes: Vec<Vec<(String, String)>>,
    pending: Option<PendingTag>,
    stack: Vec<OpenElement>,
    stream_name: Option<String>,
    captures: Vec<(usize, usize)>,
    ready: Option<StreamElement>,
}

fn bad_xml(description: &'static str) -> SaxError {
    SaxError::BadXml(description)
}

impl TreeBuilder {
    fn new() -> Self {
        TreeBuilder {
            scopes: Vec::new(),
            pending: None,
            stack: Vec::new(),
            stream_name: None,
            captures: Vec::new(),
            ready: None,
        }
    }

    fn reset(&mut self) {
        self.scopes.clear();
        self.pending = None;
        self.stack.clear();
        self.stream_name = None;
        self.captures.clear();
        self.ready = None;
    }

    fn resolve(&self, prefix: &str) -> Option<&str> {
        if prefix == "xml" {
            return Some(ns::XML);
        }
        self.scopes
            .iter()
            .rev()
            .flat_map(|scope| scope.iter())
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
    }

    fn open(&mut self, is_empty: bool, offset: usize) -> Result<(), SaxError> {
        let Some(tag) = self.pending.take() else {
            return Err(bad_xml(description::END_TAG_MISMATCH));
        };

        let mut scope = Vec::new();
        let mut attributes = Vec::with_capacity(tag.attributes.len());
        for (name, value) in tag.attributes {
            if name == "xmlns" {
                scope.push((String::new(), value));
            } else if let Some(prefix) = name.strip_prefix("xmlns:") {
                scope.push((prefix.to_string(), value));
            } else {
                attributes.push((name, value));
            }
        }
        self.scopes.push(scope);

        let (prefix, local) = match tag.raw_name.split_once(':') {
            Some((prefix, local)) => (prefix, local),
            None => ("", tag.raw_name.as_str()),
        };
        let namespace = match self.resolve(prefix) {
            Some(namespace) => namespace.to_string(),
            None if prefix.is_empty() => String::new(),
            None => return Err(bad_xml(description::UNBOUND_PREFIX)),
        };
        let mut element = Element::new(QName {
            namespace,
            local: local.to_string(),
        });
        element.attributes = attributes;

        if self.stack.is_empty() && self.stream_name.is_none() && element.is(ns::STREAM, "stream")
        {
            self.ready = Some(if is_empty {
                self.scopes.pop();
                StreamElement::End
            } else {
                self.stream_name = Some(tag.raw_name);
                StreamElement::Header(element)
            });
            return Ok(());
        }

        if is_empty {
            self.scopes.pop();
            if self.stack.len() == 1 {
                element.inner_xml = Some(String::new());
                self.captures.push((offset, offset));
            }
            self.close(element);
        } else {
            self.stack.push(OpenElement {
                raw_name: tag.raw_name,
                element,
                content_start: offset,
            });
        }
        Ok(())
    }

    fn close(&mut self, element: Element) {
        match self.stack.last_mut() {
            Some(parent) => parent.element.children.push(Node::Element(element)),
            None => self.ready = Some(StreamElement::Element(element)),
        }
    }

    fn end(&mut self, name: &str, offset: usize) -> Result<(), SaxError> {
        match self.stack.pop() {
            Some(open) => {
                if open.raw_name != name {
                    return Err(bad_xml(description::END_TAG_MISMATCH));
                }
                self.scopes.pop();
                if self.stack.len() == 1 {
                    // Filled with the raw text when the top-level element completes
                    self.captures.push((open.content_start, offset));
                }
                self.close(open.element);
            }
            None => {
                if self.stream_name.as_deref() != Some(name) {
                    return Err(bad_xml(description::END_TAG_MISMATCH));
                }
                self.scopes.pop();
                self.stream_name = None;
                self.ready = Some(StreamElement::End);
            }
        }
        Ok(())
    }
}

impl SaxHandler for TreeBuilder {
    fn handle_element(&mut self, element: &SaxElement, offset: usize) -> Result<(), SaxError> {
        match element {
            SaxElement::StartTag(name) => {
                self.pending = Some(PendingTag {
                    raw_name: name.to_string(),
                    attributes: Vec::new(),
                });
            }
            SaxElement::Attribute(name, value) => {
                if let Some(tag) = self.pending.as_mut() {
                    tag.attributes.push((name.to_string(), value.to_string()));
                }
            }
            SaxElement::StartTagContent => self.open(false, offset)?,
            SaxElement::StartTagEmpty => self.open(true, offset)?,
            SaxElement::EndTag(name) => self.end(name, offset)?,
            SaxElement::CData(s) => {
                // Whitespace between the top-level elements is not kept
                if let Some(open) = self.stack.last_mut() {
                    match open.element.children.last_mut() {
                        Some(Node::Text(text)) => text.push_str(s),
                        _ => open.element.children.push(Node::Text(s.to_string())),
                    }
                }
            }
        }
        Ok(())
    }

    fn is_paused(&self) -> bool {
        self.ready.is_some()
    }
}

/// Sans-IO stream decoder.
///
/// Bytes pushed into the decoder are parsed only as far as needed to
/// produce the next [StreamElement]. Anything after that stays buffered
/// for the next call, so the decoder can be restarted for a new stream
/// (after STARTTLS or SASL) without losing input.
pub struct StreamParser {
    parser: SaxParser,
    builder: TreeBuilder,
    input: Vec<u8>,
    raw: Vec<u8>,
    raw_base: usize,
}

impl StreamParser {
    pub fn new() -> Self {
        StreamParser {
            parser: SaxParser::new(),
            builder: TreeBuilder::new(),
            input: Vec::new(),
            raw: Vec::new(),
            raw_base: 0,
        }
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.input.extend_from_slice(bytes);
    }

    /// Returns the next complete element, or None if more input is needed.
    pub fn next_element(&mut self) -> Result<Option<StreamElement>, DecodeError> {
        if self.input.is_empty() {
            return Ok(None);
        }
        let consumed = self
            .parser
            .parse_bytes(&mut self.builder, &self.input)
            .map_err(|err| DecodeError::from_sax(err, self.parser.location()))?;
        self.raw.extend_from_slice(&self.input[..consumed]);
        self.input.drain(..consumed);

        let Some(mut ready) = self.builder.ready.take() else {
            return Ok(None);
        };
        if let StreamElement::Element(element) = &mut ready {
            let captures = std::mem::take(&mut self.builder.captures);
            let children = element.children.iter_mut().filter_map(|node| match node {
                Node::Element(child) => Some(child),
                Node::Text(_) => None,
            });
            for (child, (start, end)) in children.zip(captures) {
                let raw = &self.raw[start - self.raw_base..end - self.raw_base];
                child.inner_xml = Some(String::from_utf8_lossy(raw).into_owned());
            }
        }
        self.raw.clear();
        self.raw_base = self.parser.location().bytes;
        Ok(Some(ready))
    }

    /// Checks that the input did not stop in the middle of an element.
    pub fn finish(&self) -> Result<(), DecodeError> {
        if !self.builder.stack.is_empty()
            || self.builder.pending.is_some()
            || self.parser.is_inside_markup()
            || !self.input.is_empty()
        {
            return Err(DecodeError::UnexpectedEof);
        }
        Ok(())
    }

    /// Prepares for a new stream on the same connection.
    ///
    /// Parser and tree state are dropped, unconsumed input is kept.
    pub fn restart(&mut self) {
        self.parser.reset();
        self.builder.reset();
        self.raw.clear();
        self.raw_base = 0;
    }
}

impl Default for StreamParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Blocking stanza decoder over a byte source.
pub struct StanzaReader<R> {
    inner: R,
    decoder: StreamParser,
}

impl<R: Read> StanzaReader<R> {
    pub fn new(inner: R) -> Self {
        StanzaReader {
            inner,
            decoder: StreamParser::new(),
        }
    }

    pub fn from_parts(inner: R, decoder: StreamParser) -> Self {
        StanzaReader { inner, decoder }
    }

    pub fn into_parts(self) -> (R, StreamParser) {
        (self.inner, self.decoder)
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    pub fn restart(&mut self) {
        self.decoder.restart();
    }

    /// Reads until a complete element is decoded.
    ///
    /// Returns None when the input ends cleanly between elements.
    pub fn next_element(&mut self) -> Result<Option<StreamElement>, XmppError> {
        let mut buf = [0u8; READ_CHUNK_SIZE];
        loop {
            if let Some(element) = self.decoder.next_element()? {
                return Ok(Some(element));
            }
            let nr_read = match self.inner.read(&mut buf) {
                Ok(nr_read) => nr_read,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            };
            if nr_read == 0 {
                self.decoder.finish()?;
                return Ok(None);
            }
            trace!(
                "Received bytes: {}",
                String::from_utf8_lossy(&buf[..nr_read])
            );
            self.decoder.push_bytes(&buf[..nr_read]);
        }
    }

    /// Decodes the next top-level element into a typed stanza.
    ///
    /// Returns None at the end of input or at the `</stream:stream>` tag.
    pub fn next_stanza(&mut self) -> Result<Option<Stanza>, XmppError> {
        match self.next_element()? {
            None | Some(StreamElement::End) => Ok(None),
            Some(StreamElement::Header(element)) => {
                Ok(Some(Stanza::Header(StreamHeader::from_element(&element))))
            }
            Some(StreamElement::Element(element)) => Ok(Some(super::stanza::decode(element)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn elements(text: &str) -> Vec<StreamElement> {
        let mut parser = StreamParser::new();
        parser.push_bytes(text.as_bytes());
        let mut elements = Vec::new();
        while let Some(element) = parser.next_element().unwrap() {
            elements.push(element);
        }
        parser.finish().unwrap();
        elements
    }

    #[test]
    fn stream_elements() {
        let elements = elements(
            "<stream:stream xmlns:stream='http://etherx.jabber.org/streams' \
                xmlns='jabber:client' version='1.0' from='example.com'>\
            <message to='user@example.com'><body>Hello!</body></message>\
            </stream:stream>",
        );
        assert_eq!(elements.len(), 3);
        let StreamElement::Header(header) = &elements[0] else {
            panic!("no header");
        };
        assert!(header.is(ns::STREAM, "stream"));
        assert_eq!(header.attr("version"), Some("1.0"));
        assert_eq!(header.attr("xmlns"), None);
        let StreamElement::Element(message) = &elements[1] else {
            panic!("no message");
        };
        assert!(message.is(ns::CLIENT, "message"));
        assert_eq!(message.child_text(ns::CLIENT, "body").as_deref(), Some("Hello!"));
        assert_eq!(
            message.to_string(),
            "<message xmlns=\"jabber:client\" to=\"user@example.com\"><body>Hello!</body></message>"
        );
        assert_eq!(elements[2], StreamElement::End);
    }

    #[test]
    fn namespaces() {
        let elements = elements(
            "<stream:stream xmlns:stream='http://etherx.jabber.org/streams' xmlns='jabber:client'>\
            <stream:features><mechanisms xmlns='urn:ietf:params:xml:ns:xmpp-sasl'>\
            <mechanism>PLAIN</mechanism></mechanisms><x:y xmlns:x='urn:x' xml:lang='en'/>\
            </stream:features>",
        );
        let StreamElement::Element(features) = &elements[1] else {
            panic!("no features");
        };
        assert!(features.is(ns::STREAM, "features"));
        let mechanisms = features.child(ns::SASL, "mechanisms").unwrap();
        assert_eq!(mechanisms.child_text(ns::SASL, "mechanism").as_deref(), Some("PLAIN"));
        let y = features.child("urn:x", "y").unwrap();
        assert_eq!(y.attr("xml:lang"), Some("en"));
        assert_eq!(y.inner_xml.as_deref(), Some(""));
    }

    #[test]
    fn inner_xml() {
        let elements = elements(
            "<message xmlns='jabber:client'><x xmlns='urn:x'>a &amp; <b c='1'>d</b></x></message>",
        );
        let StreamElement::Element(message) = &elements[0] else {
            panic!("no message");
        };
        let x = message.child("urn:x", "x").unwrap();
        assert_eq!(x.inner_xml.as_deref(), Some("a &amp; <b c='1'>d</b>"));
        assert_eq!(x.text(), "a & ");
        assert_eq!(x.child("urn:x", "b").unwrap().inner_xml, None);
    }

    #[test]
    fn chunked_input() {
        let text = "<stream:stream xmlns:stream='http://etherx.jabber.org/streams' \
            xmlns='jabber:client'><message><body>Çağrı</body><x xmlns='urn:x'>ğ</x></message>";
        let mut parser = StreamParser::new();
        let mut elements = Vec::new();
        for b in text.as_bytes() {
            parser.push_bytes(&[*b]);
            while let Some(element) = parser.next_element().unwrap() {
                elements.push(element);
            }
        }
        assert_eq!(elements.len(), 2);
        let StreamElement::Element(message) = &elements[1] else {
            panic!("no message");
        };
        assert_eq!(message.child_text(ns::CLIENT, "body").as_deref(), Some("Çağrı"));
        assert_eq!(
            message.child("urn:x", "x").unwrap().inner_xml.as_deref(),
            Some("ğ")
        );
    }

    #[test]
    fn restart_keeps_input() {
        let mut parser = StreamParser::new();
        parser.push_bytes(
            b"<stream:stream xmlns:stream='http://etherx.jabber.org/streams' xmlns='jabber:client'>\
            <success xmlns='urn:ietf:params:xml:ns:xmpp-sasl'/>\
            <stream:stream xmlns:stream='http://etherx.jabber.org/streams' xmlns='jabber:client'>",
        );
        assert!(matches!(parser.next_element(), Ok(Some(StreamElement::Header(_)))));
        let Ok(Some(StreamElement::Element(success))) = parser.next_element() else {
            panic!("no success");
        };
        assert!(success.is(ns::SASL, "success"));
        parser.restart();
        assert!(matches!(parser.next_element(), Ok(Some(StreamElement::Header(_)))));
        assert_eq!(parser.next_element(), Ok(None));
        assert_eq!(parser.finish(), Ok(()));
    }

    #[test]
    fn bad_streams() {
        let mut parser = StreamParser::new();
        parser.push_bytes(b"<a><b></c></a>");
        assert_eq!(
            parser.next_element(),
            Err(DecodeError::BadXml {
                description: description::END_TAG_MISMATCH,
                location: crate::Location {
                    bytes: 9,
                    lines: 0,
                    column: 9
                },
            })
        );

        let mut parser = StreamParser::new();
        parser.push_bytes(b"<p:a/>");
        assert!(matches!(
            parser.next_element(),
            Err(DecodeError::BadXml {
                description: description::UNBOUND_PREFIX,
                ..
            })
        ));

        let mut parser = StreamParser::new();
        parser.push_bytes(b"<message xmlns='jabber:client'><body>hi");
        assert_eq!(parser.next_element(), Ok(None));
        assert_eq!(parser.finish(), Err(DecodeError::UnexpectedEof));
    }

    #[test]
    fn reader_eof() {
        let mut reader = StanzaReader::new(&b""[..]);
        assert!(matches!(reader.next_stanza(), Ok(None)));

        let mut reader = StanzaReader::new(&b"  \n"[..]);
        assert!(matches!(reader.next_element(), Ok(None)));

        let mut reader = StanzaReader::new(&b"<message xmlns='jabber:client'>"[..]);
        assert!(matches!(
            reader.next_stanza(),
            Err(XmppError::Decode(DecodeError::UnexpectedEof))
        ));
    }
}
