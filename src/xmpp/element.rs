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

use crate::entities::escape_fmt;

/// Namespace qualified element name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    pub namespace: String,
    pub local: String,
}

impl QName {
    pub fn new(namespace: &str, local: &str) -> Self {
        QName {
            namespace: namespace.to_string(),
            local: local.to_string(),
        }
    }

    pub fn is(&self, namespace: &str, local: &str) -> bool {
        self.local == local && self.namespace == namespace
    }
}

impl Display for QName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.namespace.is_empty() {
            f.write_str(&self.local)
        } else {
            write!(f, "{{{}}}{}", self.namespace, self.local)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// A decoded XML element.
///
/// Namespace declarations are resolved into the [QName] of the element and
/// are not kept in the attribute list. Other attributes keep their names
/// as written, prefixes included.
///
/// Children of a top-level element also carry their raw inner markup, which is
/// the exact text between their start and end tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: QName,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
    pub inner_xml: Option<String>,
}

impl Element {
    pub fn new(name: QName) -> Self {
        Element {
            name,
            attributes: Vec::new(),
            children: Vec::new(),
            inner_xml: None,
        }
    }

    pub fn is(&self, namespace: &str, local: &str) -> bool {
        self.name.is(namespace, local)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Iterates over the element children, skipping the text nodes.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    pub fn child(&self, namespace: &str, local: &str) -> Option<&Element> {
        self.elements().find(|element| element.is(namespace, local))
    }

    /// Concatenated text of the direct text children.
    pub fn text(&self) -> String {
        let mut text = String::new();
        for node in &self.children {
            if let Node::Text(s) = node {
                text.push_str(s);
            }
        }
        text
    }

    pub fn child_text(&self, namespace: &str, local: &str) -> Option<String> {
        self.child(namespace, local).map(|child| child.text())
    }

    pub(crate) fn into_elements(self) -> impl Iterator<Item = Element> {
        self.children.into_iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }
}

/// Serializes the element with a namespace declaration on every element
/// whose namespace differs from its parent.
impl Display for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn write_element(
            element: &Element,
            parent_ns: &str,
            f: &mut std::fmt::Formatter<'_>,
        ) -> std::fmt::Result {
            write!(f, "<{}", element.name.local)?;
            if element.name.namespace != parent_ns {
                f.write_str(" xmlns=\"")?;
                escape_fmt(&element.name.namespace, f)?;
                f.write_str("\"")?;
            }
            for (name, value) in &element.attributes {
                write!(f, " {name}=\"")?;
                escape_fmt(value, f)?;
                f.write_str("\"")?;
            }
            if element.children.is_empty() {
                return f.write_str("/>");
            }
            f.write_str(">")?;
            for node in &element.children {
                match node {
                    Node::Element(child) => write_element(child, &element.name.namespace, f)?,
                    Node::Text(text) => escape_fmt(text, f)?,
                }
            }
            write!(f, "</{}>", element.name.local)
        }

        write_element(self, "", f)
    }
}

/// A child element which has no typed representation.
///
/// Kept with its qualified name, attributes and the raw markup between its
/// start and end tags. Entity references in the raw markup are not decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionElement {
    pub name: QName,
    pub attributes: Vec<(String, String)>,
    pub inner_xml: String,
}

impl ExtensionElement {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

impl From<Element> for ExtensionElement {
    fn from(element: Element) -> Self {
        ExtensionElement {
            name: element.name,
            attributes: element.attributes,
            inner_xml: element.inner_xml.unwrap_or_default(),
        }
    }
}
