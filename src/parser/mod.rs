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
mod location;

pub use error::SaxError;
use error::description;
pub use location::Location;

/// An XML element returned from the parser.
#[derive(Debug, Eq, PartialEq)]
pub enum SaxElement<'a> {
    /// A start tag or empty element tag.
    ///
    /// The argument is the full name of the tag. This element is sent to the handler as soon as
    /// the name is parsed, attributes follow as separate elements.
    StartTag(&'a str),

    /// A tag attribute for the last StartTag.
    ///
    /// First argument is the attribute name and the second argument is the attribute value.
    /// All references in the attribute value are replaced with the actual characters.
    Attribute(&'a str, &'a str),

    /// The last StartTag is closed with `>` and its content follows.
    StartTagContent,

    /// The last StartTag was an empty element tag (`/>`) and will have no content.
    StartTagEmpty,

    /// An end tag element.
    ///
    /// The argument is the full name of the end tag. It is sent when the closing `>`
    /// is parsed.
    EndTag(&'a str),

    /// A character data element.
    ///
    /// The argument is the text content. Note that you might get this element several times
    /// with different parts of the content for a single continous block of text. When you parse
    /// the input in multiple parse calls, or when the parser encounters a reference to
    /// substitute, collected content is flushed.
    CData(&'a str),
}

/// Receiver of the parsed elements.
///
/// The `offset` argument is the absolute stream position of the markup boundary
/// related to the element:
/// - the opening `<` for [StartTag](SaxElement::StartTag), [Attribute](SaxElement::Attribute)
///   and [EndTag](SaxElement::EndTag),
/// - the first byte after the closing `>` for [StartTagContent](SaxElement::StartTagContent)
///   and [StartTagEmpty](SaxElement::StartTagEmpty),
/// - the first byte of the text for [CData](SaxElement::CData) coming from the input
///   directly, or the end of the reference for substituted characters.
///
/// Offsets between a StartTagContent and the matching EndTag delimit the raw
/// content of an element.
pub trait SaxHandler {
    fn handle_element(&mut self, element: &SaxElement, offset: usize) -> Result<(), SaxError>;

    /// Asks the parser to stop after the current byte.
    ///
    /// This is checked after every consumed byte, so a handler can make the parser return
    /// right after a complete element and leave the rest of the input untouched.
    fn is_paused(&self) -> bool {
        false
    }
}

/// SAX (Simple API for XML) based XML stream parser.
///
/// This struct implements a SAX parser which processes the incoming
/// bytes and invokes a handler function for each encountered
/// XML element. Unlike a document parser it accepts any number of
/// top level elements one after another, which is how an XMPP stream
/// looks from the outside when there is no stream header.
///
/// # Examples
///
/// ```
/// use xmpp_session::{SaxElement, SaxError, SaxHandler, SaxParser};
///
/// struct Handler { tags: usize }
/// impl SaxHandler for Handler {
///     fn handle_element(&mut self, element: &SaxElement, _offset: usize) -> Result<(), SaxError> {
///         if let SaxElement::StartTag(_) = element {
///             self.tags += 1;
///         }
///         Ok(())
///     }
/// }
///
/// let mut handler = Handler { tags: 0 };
/// let mut parser = SaxParser::new();
/// let bytes = b"<doc>example</doc><doc/>";
/// let consumed = parser.parse_bytes(&mut handler, bytes).unwrap();
/// assert_eq!(consumed, bytes.len());
/// assert_eq!(handler.tags, 2);
/// ```
pub struct SaxParser {
    state: State,
    uni_len: u32,
    uni_left: u32,
    uni_char: u32,
    depth: usize,
    is_end_tag: bool,
    is_quot_value: bool,
    seen_content: bool,
    value_pos: usize,
    buffer: Vec<u8>,
    ref_buffer: Vec<u8>,
    char_ref_value: u32,
    is_value_ref: bool,
    tag_offset: usize,
    location: Location,
}

#[derive(Eq, PartialEq)]
enum State {
    Prolog,
    TagStart,
    PI,
    PIEnd,
    Markup,
    CDataSectionC,
    CDataSectionCD,
    CDataSectionCDA,
    CDataSectionCDAT,
    CDataSectionCDATA,
    CDataSectionCDATAb,
    CDataSectionBody,
    CDataSectionMaybeEnd,
    CDataSectionMaybeEnd2,
    CommentStart,
    CommentBody,
    CommentMaybeEnd,
    CommentEnd,
    TagName,
    EndTagWhitespace,
    EmptyTagEnd,
    AttributeWhitespace,
    AttributeName,
    AttributeValueStart,
    AttributeValue,
    AttributeEq,
    CData,
    Reference,
    CharReference,
    CharReferenceBody,
    HexCharReference,
    Entity,
    Epilog,
}

const INITIAL_BUFFER_CAPACITY: usize = 128;

const REF_BUFFER_SIZE: usize = 8;

const MAX_CHAR: u32 = 0x10ffff;

macro_rules! whitespace {
    () => {
        b' ' | b'\t' | b'\r' | b'\n'
    };
}

fn is_valid_xml_char(c: u32) -> bool {
    matches!(
        c,
        0x09 | 0x0a | 0x0d | 0x20..=0xd7ff | 0xe000..=0xfffd | 0x10000..=0x10ffff
    )
}

/// Length of the longest prefix which does not end inside a UTF-8 sequence.
fn complete_utf8_len(bytes: &[u8]) -> usize {
    let len = bytes.len();
    for i in (len.saturating_sub(3)..len).rev() {
        let c = bytes[i];
        if c & 0xc0 != 0x80 {
            let need = if c & 0xe0 == 0xc0 {
                2
            } else if c & 0xf0 == 0xe0 {
                3
            } else if c & 0xf8 == 0xf0 {
                4
            } else {
                1
            };
            return if len - i < need { i } else { len };
        }
    }
    len
}

macro_rules! xml_error {
    ($a:ident) => {
        return Err(SaxError::BadXml(description::$a))
    };
}

impl SaxParser {
    /// Creates a new SAX parser instance.
    ///
    /// The instance can be reused for a new stream with the [reset()](SaxParser::reset) method.
    pub fn new() -> SaxParser {
        SaxParser {
            state: State::Prolog,
            uni_len: 0,
            uni_left: 0,
            uni_char: 0,
            depth: 0,
            is_end_tag: false,
            is_quot_value: false,
            seen_content: false,
            value_pos: 0,
            buffer: Vec::<u8>::with_capacity(INITIAL_BUFFER_CAPACITY),
            ref_buffer: Vec::<u8>::with_capacity(REF_BUFFER_SIZE),
            char_ref_value: 0,
            is_value_ref: false,
            tag_offset: 0,
            location: Location::new(),
        }
    }

    /// Resets the parser into a clean state.
    pub fn reset(&mut self) {
        self.state = State::Prolog;
        self.uni_len = 0;
        self.uni_left = 0;
        self.uni_char = 0;
        self.depth = 0;
        self.is_end_tag = false;
        self.is_quot_value = false;
        self.seen_content = false;
        self.value_pos = 0;
        self.buffer.clear();
        self.ref_buffer.clear();
        self.char_ref_value = 0;
        self.is_value_ref = false;
        self.tag_offset = 0;
        self.location = Location::new();
    }

    fn check_buffer(&mut self, need: usize) -> Result<(), SaxError> {
        if self.buffer.len() + need > self.buffer.capacity() {
            let diff = std::cmp::max(need, self.buffer.capacity());
            if self.buffer.try_reserve(diff).is_err() {
                return Err(SaxError::NoMemory);
            }
        }
        Ok(())
    }

    fn check_char(&mut self, c: u8) -> Result<(), SaxError> {
        if self.uni_left > 0 {
            if c & 0xc0 != 0x80 {
                xml_error!(UTF8_INVALID_CONT_BYTE);
            }
            self.uni_char <<= 6;
            self.uni_char += c as u32 & 0x3f;
            self.uni_left -= 1;
            if self.uni_left == 0 {
                // Sequences longer than the actual character codepoint
                // size are security hazards.
                if (self.uni_len == 2 && self.uni_char <= 0x7f)
                    || (self.uni_len == 3 && self.uni_char <= 0x7ff)
                    || (self.uni_len == 4 && self.uni_char <= 0xffff)
                {
                    xml_error!(UTF8_OVERLONG_SEQUENCE);
                }
                if !is_valid_xml_char(self.uni_char) {
                    xml_error!(CHAR_INVALID);
                }
            }
        } else if c & 0x80 == 0x80 {
            if c & 0x60 == 0x40 {
                self.uni_len = 2;
                self.uni_left = 1;
                self.uni_char = c as u32 & 0x1f;
            } else if c & 0x70 == 0x60 {
                self.uni_len = 3;
                self.uni_left = 2;
                self.uni_char = c as u32 & 0x0f;
            } else if c & 0x78 == 0x70 {
                self.uni_len = 4;
                self.uni_left = 3;
                self.uni_char = c as u32 & 0x07;
            } else {
                xml_error!(UTF8_INVALID_PREFIX_BYTE);
            }
        } else if c < 0x20 && (c != 0x09 && c != 0x0a && c != 0x0d) {
            xml_error!(CHAR_INVALID);
        }
        Ok(())
    }

    fn send_u32_cdata(
        &mut self,
        handler: &mut impl SaxHandler,
        value: u32,
        offset: usize,
    ) -> Result<(), SaxError> {
        let Some(c) = char::from_u32(value).filter(|_| is_valid_xml_char(value)) else {
            xml_error!(CHAR_INVALID);
        };
        let mut buf: [u8; 4] = [0; 4];
        let s = c.encode_utf8(&mut buf);
        if self.is_value_ref {
            self.check_buffer(s.len())?;
            self.buffer.extend_from_slice(s.as_bytes());
            Ok(())
        } else {
            handler.handle_element(&SaxElement::CData(s), offset)
        }
    }

    fn end_of_element(&mut self, pos: usize, back: &mut usize) -> Result<(), SaxError> {
        if self.depth == 0 {
            xml_error!(TAG_CLOSE_WITHOUT_OPEN);
        }
        self.depth -= 1;
        if self.depth == 0 {
            self.state = State::Epilog;
        } else {
            *back = pos + 1;
            self.state = State::CData;
        }
        Ok(())
    }

    /// Returns true if the parser stopped in the middle of a markup construct,
    /// such as a tag, a comment, or a reference.
    ///
    /// The stream decoder uses this to tell a clean end of input from a truncated one.
    pub fn is_inside_markup(&self) -> bool {
        !matches!(self.state, State::Prolog | State::Epilog | State::CData)
    }

    /// Number of currently open tags.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Parses given XML bytes.
    ///
    /// Returns the number of bytes consumed. This is less than the input size
    /// when the handler pauses the parser, or when the input ends inside a
    /// multi-byte UTF-8 sequence. Unconsumed bytes should be passed again, with
    /// whatever follows them, in the next call.
    pub fn parse_bytes(
        &mut self,
        handler: &mut impl SaxHandler,
        bytes: &[u8],
    ) -> Result<usize, SaxError> {
        let bytes = &bytes[..complete_utf8_len(bytes)];
        let mut pos: usize = 0;
        let mut back: usize = 0;
        let mut revisit = false;

        // Absolute stream position of a byte in the current input, only valid
        // for indexes which are not ahead of pos.
        macro_rules! offset {
            ($i:expr) => {
                self.location.bytes - (pos - $i)
            };
        }

        while pos < bytes.len() {
            let c = bytes[pos];
            if !revisit {
                self.check_char(c)?;
            }
            revisit = false;

            match self.state {
                State::Prolog => match c {
                    b'<' => {
                        self.tag_offset = offset!(pos);
                        self.state = State::TagStart;
                    }
                    whitespace!() => (),
                    _ => xml_error!(DOC_CDATA_WITHOUT_PARENT),
                },

                State::TagStart => match c {
                    b'!' => self.state = State::Markup,
                    b'?' => self.state = State::PI,
                    b'/' => {
                        if self.depth == 0 {
                            xml_error!(TAG_CLOSE_WITHOUT_OPEN);
                        }
                        back = pos + 1;
                        self.is_end_tag = true;
                        self.state = State::TagName;
                    }
                    whitespace!() => xml_error!(TAG_WHITESPACE_START),
                    b'>' => xml_error!(TAG_EMPTY_NAME),
                    _ => {
                        self.depth += 1;
                        back = pos;
                        self.is_end_tag = false;
                        self.seen_content = true;
                        self.state = State::TagName;
                    }
                },

                State::Markup => match c {
                    b'-' => self.state = State::CommentStart,
                    b'[' => {
                        if self.depth == 0 {
                            xml_error!(MARKUP_CDATA_SECTION_OUTSIDE_ROOT);
                        }
                        self.state = State::CDataSectionC;
                    }
                    _ => xml_error!(MARKUP_UNRECOGNIZED),
                },

                State::CDataSectionC => {
                    if c != b'C' {
                        xml_error!(MARKUP_CDATA_SECTION_BAD_START);
                    }
                    self.state = State::CDataSectionCD;
                }

                State::CDataSectionCD => {
                    if c != b'D' {
                        xml_error!(MARKUP_CDATA_SECTION_BAD_START);
                    }
                    self.state = State::CDataSectionCDA;
                }

                State::CDataSectionCDA => {
                    if c != b'A' {
                        xml_error!(MARKUP_CDATA_SECTION_BAD_START);
                    }
                    self.state = State::CDataSectionCDAT;
                }

                State::CDataSectionCDAT => {
                    if c != b'T' {
                        xml_error!(MARKUP_CDATA_SECTION_BAD_START);
                    }
                    self.state = State::CDataSectionCDATA;
                }

                State::CDataSectionCDATA => {
                    if c != b'A' {
                        xml_error!(MARKUP_CDATA_SECTION_BAD_START);
                    }
                    self.state = State::CDataSectionCDATAb;
                }

                State::CDataSectionCDATAb => {
                    if c != b'[' {
                        xml_error!(MARKUP_CDATA_SECTION_BAD_START);
                    }
                    back = pos + 1;
                    self.state = State::CDataSectionBody;
                }

                State::CDataSectionBody => {
                    if c == b']' {
                        if back < pos {
                            // SAFETY: check_char validated every byte and the
                            // input never ends inside a UTF-8 sequence.
                            let s = unsafe { std::str::from_utf8_unchecked(&bytes[back..pos]) };
                            handler.handle_element(&SaxElement::CData(s), offset!(back))?;
                        }
                        self.state = State::CDataSectionMaybeEnd;
                    }
                }

                State::CDataSectionMaybeEnd => match c {
                    b']' => self.state = State::CDataSectionMaybeEnd2,
                    _ => {
                        handler.handle_element(&SaxElement::CData("]"), offset!(pos))?;
                        back = pos;
                        self.state = State::CDataSectionBody;
                    }
                },

                State::CDataSectionMaybeEnd2 => match c {
                    b'>' => {
                        back = pos + 1;
                        self.state = State::CData;
                    }
                    b']' => {
                        handler.handle_element(&SaxElement::CData("]"), offset!(pos))?;
                    }
                    _ => {
                        handler.handle_element(&SaxElement::CData("]]"), offset!(pos))?;
                        back = pos;
                        self.state = State::CDataSectionBody;
                    }
                },

                State::CommentStart => {
                    if c != b'-' {
                        xml_error!(COMMENT_MISSING_DASH);
                    }
                    self.state = State::CommentBody;
                }

                State::CommentBody => {
                    if c == b'-' {
                        self.state = State::CommentMaybeEnd;
                    }
                }

                State::CommentMaybeEnd => match c {
                    b'-' => self.state = State::CommentEnd,
                    _ => self.state = State::CommentBody,
                },

                State::CommentEnd => {
                    if c != b'>' {
                        xml_error!(COMMENT_MISSING_END);
                    }
                    if self.depth > 0 {
                        back = pos + 1;
                        self.state = State::CData;
                    } else if self.seen_content {
                        self.state = State::Epilog;
                    } else {
                        self.state = State::Prolog;
                    }
                }

                State::PI => {
                    if c == b'?' {
                        self.state = State::PIEnd;
                    }
                }

                State::PIEnd => match c {
                    b'>' => {
                        if self.depth > 0 {
                            back = pos + 1;
                            self.state = State::CData;
                        } else if self.seen_content {
                            self.state = State::Epilog;
                        } else {
                            self.state = State::Prolog;
                        }
                    }
                    b'?' => (),
                    _ => self.state = State::PI,
                },

                State::TagName => match c {
                    b'/' | b'>' | whitespace!() => {
                        if back < pos {
                            self.check_buffer(pos - back)?;
                            self.buffer.extend_from_slice(&bytes[back..pos]);
                        }
                        if self.buffer.is_empty() {
                            xml_error!(TAG_EMPTY_NAME);
                        }
                        if self.is_end_tag {
                            match c {
                                b'/' => xml_error!(TAG_DOUBLE_END),
                                b'>' => {
                                    {
                                        // SAFETY: tag names are validated UTF-8.
                                        let s = unsafe { std::str::from_utf8_unchecked(&self.buffer) };
                                        handler.handle_element(&SaxElement::EndTag(s), self.tag_offset)?;
                                    }
                                    self.buffer.clear();
                                    self.end_of_element(pos, &mut back)?;
                                }
                                _ => self.state = State::EndTagWhitespace,
                            }
                        } else {
                            {
                                // SAFETY: tag names are validated UTF-8.
                                let s = unsafe { std::str::from_utf8_unchecked(&self.buffer) };
                                handler.handle_element(&SaxElement::StartTag(s), self.tag_offset)?;
                            }
                            self.buffer.clear();
                            match c {
                                b'/' => self.state = State::EmptyTagEnd,
                                b'>' => {
                                    handler.handle_element(
                                        &SaxElement::StartTagContent,
                                        offset!(pos) + 1,
                                    )?;
                                    back = pos + 1;
                                    self.state = State::CData;
                                }
                                _ => self.state = State::AttributeWhitespace,
                            }
                        }
                    }
                    _ => (),
                },

                State::EmptyTagEnd => match c {
                    b'>' => {
                        handler.handle_element(&SaxElement::StartTagEmpty, offset!(pos) + 1)?;
                        self.end_of_element(pos, &mut back)?;
                    }
                    _ => xml_error!(TAG_EMPTY_TAG_MISSING_END),
                },

                State::EndTagWhitespace => match c {
                    b'>' => {
                        {
                            // SAFETY: tag names are validated UTF-8.
                            let s = unsafe { std::str::from_utf8_unchecked(&self.buffer) };
                            handler.handle_element(&SaxElement::EndTag(s), self.tag_offset)?;
                        }
                        self.buffer.clear();
                        self.end_of_element(pos, &mut back)?;
                    }
                    whitespace!() => (),
                    _ => xml_error!(TAG_END_TAG_ATTRIBUTES),
                },

                State::AttributeWhitespace => match c {
                    whitespace!() => (),
                    b'/' => self.state = State::EmptyTagEnd,
                    b'>' => {
                        handler.handle_element(&SaxElement::StartTagContent, offset!(pos) + 1)?;
                        back = pos + 1;
                        self.state = State::CData;
                    }
                    _ => {
                        back = pos;
                        self.state = State::AttributeName;
                        revisit = true;
                    }
                },

                State::AttributeName => match c {
                    b'=' | whitespace!() => {
                        if back < pos {
                            self.check_buffer(pos - back)?;
                            self.buffer.extend_from_slice(&bytes[back..pos]);
                        }
                        if c == b'=' {
                            self.state = State::AttributeValueStart;
                        } else {
                            self.state = State::AttributeEq;
                        }
                    }
                    b'/' | b'>' | b'<' => xml_error!(TAG_ATTRIBUTE_BAD_NAME),
                    _ => (),
                },

                State::AttributeEq => match c {
                    b'=' => self.state = State::AttributeValueStart,
                    whitespace!() => (),
                    _ => xml_error!(TAG_ATTRIBUTE_WITHOUT_EQUAL),
                },

                State::AttributeValueStart => match c {
                    b'"' | b'\'' => {
                        self.is_quot_value = c == b'\'';
                        self.value_pos = self.buffer.len();
                        back = pos + 1;
                        self.state = State::AttributeValue;
                    }
                    whitespace!() => (),
                    _ => xml_error!(TAG_ATTRIBUTE_WITHOUT_QUOTE),
                },

                State::AttributeValue => {
                    if (self.is_quot_value && c == b'\'') || (!self.is_quot_value && c == b'"') {
                        if back < pos {
                            self.check_buffer(pos - back)?;
                            self.buffer.extend_from_slice(&bytes[back..pos]);
                        }
                        {
                            // SAFETY: name and value are validated UTF-8 and
                            // value_pos is at a character boundary.
                            let attr = unsafe {
                                std::str::from_utf8_unchecked(&self.buffer[0..self.value_pos])
                            };
                            let value = unsafe {
                                std::str::from_utf8_unchecked(&self.buffer[self.value_pos..])
                            };
                            handler.handle_element(
                                &SaxElement::Attribute(attr, value),
                                self.tag_offset,
                            )?;
                        }
                        self.buffer.clear();
                        self.state = State::AttributeWhitespace;
                    } else if c == b'&' {
                        if back < pos {
                            self.check_buffer(pos - back)?;
                            self.buffer.extend_from_slice(&bytes[back..pos]);
                        }
                        self.ref_buffer.clear();
                        self.is_value_ref = true;
                        self.state = State::Reference;
                    } else if c == b'<' {
                        xml_error!(TAG_ATTRIBUTE_BAD_VALUE);
                    }
                }

                State::CData => match c {
                    b'<' => {
                        if back < pos {
                            // SAFETY: validated UTF-8, see CDataSectionBody.
                            let s = unsafe { std::str::from_utf8_unchecked(&bytes[back..pos]) };
                            handler.handle_element(&SaxElement::CData(s), offset!(back))?;
                        }
                        self.tag_offset = offset!(pos);
                        back = pos + 1;
                        self.state = State::TagStart;
                    }
                    b'&' => {
                        if back < pos {
                            // SAFETY: validated UTF-8, see CDataSectionBody.
                            let s = unsafe { std::str::from_utf8_unchecked(&bytes[back..pos]) };
                            handler.handle_element(&SaxElement::CData(s), offset!(back))?;
                        }
                        self.ref_buffer.clear();
                        self.is_value_ref = false;
                        self.state = State::Reference;
                    }
                    _ => (),
                },

                State::Reference => match c {
                    b'#' => {
                        self.char_ref_value = 0;
                        self.state = State::CharReference;
                    }
                    b';' => xml_error!(REFERENCE_CUSTOM_ENTITY),
                    _ => {
                        self.ref_buffer.push(c);
                        self.state = State::Entity;
                    }
                },

                State::Entity => match c {
                    b';' => {
                        let ent = match self.ref_buffer.as_slice() {
                            b"amp" => "&",
                            b"lt" => "<",
                            b"gt" => ">",
                            b"quot" => "\"",
                            b"apos" => "'",
                            _ => xml_error!(REFERENCE_CUSTOM_ENTITY),
                        };
                        back = pos + 1;
                        if self.is_value_ref {
                            self.check_buffer(1)?;
                            self.buffer.push(ent.as_bytes()[0]);
                            self.state = State::AttributeValue;
                        } else {
                            self.state = State::CData;
                            handler.handle_element(&SaxElement::CData(ent), offset!(pos) + 1)?;
                        }
                    }
                    _ => {
                        if self.ref_buffer.len() >= REF_BUFFER_SIZE {
                            xml_error!(REFERENCE_CUSTOM_ENTITY);
                        }
                        self.ref_buffer.push(c);
                    }
                },

                State::CharReference => match c {
                    b'x' => self.state = State::HexCharReference,
                    b'0'..=b'9' => {
                        self.char_ref_value = (c - b'0').into();
                        self.state = State::CharReferenceBody;
                    }
                    _ => xml_error!(REFERENCE_INVALID_DECIMAL),
                },

                State::CharReferenceBody | State::HexCharReference => {
                    let radix = if self.state == State::HexCharReference {
                        16
                    } else {
                        10
                    };
                    if c == b';' {
                        self.send_u32_cdata(handler, self.char_ref_value, offset!(pos) + 1)?;
                        back = pos + 1;
                        if self.is_value_ref {
                            self.state = State::AttributeValue;
                        } else {
                            self.state = State::CData;
                        }
                    } else {
                        let Some(digit) = (c as char).to_digit(radix) else {
                            if radix == 16 {
                                xml_error!(REFERENCE_INVALID_HEX);
                            }
                            xml_error!(REFERENCE_INVALID_DECIMAL);
                        };
                        self.char_ref_value = self.char_ref_value * radix + digit;
                        if self.char_ref_value > MAX_CHAR {
                            xml_error!(CHAR_INVALID);
                        }
                    }
                }

                State::Epilog => match c {
                    b'<' => {
                        self.tag_offset = offset!(pos);
                        self.state = State::TagStart;
                    }
                    whitespace!() => (),
                    _ => xml_error!(DOC_CDATA_WITHOUT_PARENT),
                },
            }

            if revisit {
                continue;
            }
            pos += 1;
            self.location.advance(c);
            if handler.is_paused() {
                break;
            }
        }

        if back < pos {
            match self.state {
                State::TagName | State::AttributeName | State::AttributeValue => {
                    self.check_buffer(pos - back)?;
                    self.buffer.extend_from_slice(&bytes[back..pos])
                }
                State::CData | State::CDataSectionBody => {
                    // SAFETY: validated UTF-8 and the input was cut at a
                    // character boundary.
                    let s = unsafe { std::str::from_utf8_unchecked(&bytes[back..pos]) };
                    handler.handle_element(&SaxElement::CData(s), offset!(back))?;
                }
                _ => (),
            }
        }

        Ok(pos)
    }

    /// Position of the next byte to parse.
    pub fn location(&self) -> Location {
        self.location
    }
}

impl Default for SaxParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests;
