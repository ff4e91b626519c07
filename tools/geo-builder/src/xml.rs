//! Client XML documents
//!
//! The client ships XML either as text or in a compact binary encoding. Both
//! decode into the same [`XmlNode`] tree, which is all the level decoders
//! look at.
//!
//! # Binary Layout
//!
//! ```text
//! u8 0x80
//! packed  string table length, then that many bytes
//! node:   packed name, u8 flags (1 value, 2 attributes, 4 children),
//!         [packed value], [packed count, count x (packed key, packed value)],
//!         [packed count, count x node]
//! ```
//!
//! Strings are referenced by index: string `i` is the NUL-terminated UTF-16LE
//! text starting at byte `2 * i` of the table, and index 0 is the empty
//! string. Packed integers are 7-bit little-endian groups with the high bit
//! as continuation marker.

use crate::read::{ByteCursor, read_bytes, read_u8};
use std::io::{self, Cursor};
use thiserror::Error;

/// First byte of a binary document
pub const BINARY_XML_MAGIC: u8 = 0x80;

const FLAG_VALUE: u8 = 1;
const FLAG_ATTRIBUTES: u8 = 2;
const FLAG_CHILDREN: u8 = 4;

/// Nesting limit for binary documents
const MAX_DEPTH: usize = 256;

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("unexpected end of document")]
    UnexpectedEof,

    #[error("I/O error: {0}")]
    Io(io::Error),

    #[error("string index {index} outside of the {len} byte string table")]
    InvalidString { index: u32, len: usize },

    #[error("string at index {index} is not valid UTF-16")]
    InvalidUtf16 { index: u32 },

    #[error("packed integer does not fit in 32 bits")]
    PackedIntOverflow,

    #[error("document nested deeper than {MAX_DEPTH} levels")]
    TooDeep,

    #[error("text document is not UTF-8")]
    NotUtf8,

    #[error(transparent)]
    Text(#[from] roxmltree::Error),
}

impl From<io::Error> for XmlError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::UnexpectedEof => XmlError::UnexpectedEof,
            _ => XmlError::Io(e),
        }
    }
}

/// Element with attributes, an optional text value and child elements
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlNode {
    pub name: String,
    pub value: Option<String>,
    /// Attributes in document order
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// First child with the given name
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Text value, empty when absent
    pub fn text(&self) -> &str {
        self.value.as_deref().unwrap_or("")
    }

    /// Text of the first child with the given name
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(XmlNode::text)
    }
}

/// Decode a document, binary or text
pub fn parse(data: &[u8]) -> Result<XmlNode, XmlError> {
    if data.first() == Some(&BINARY_XML_MAGIC) {
        parse_binary(data)
    } else {
        parse_text(data)
    }
}

/// Decode a binary document
pub fn parse_binary(data: &[u8]) -> Result<XmlNode, XmlError> {
    let mut cursor = Cursor::new(data);
    if read_u8(&mut cursor)? != BINARY_XML_MAGIC {
        return Err(XmlError::UnexpectedEof);
    }
    let table_len = read_packed(&mut cursor)? as usize;
    let table = StringTable(read_bytes(&mut cursor, table_len)?);
    read_node(&mut cursor, &table, 0)
}

/// Decode a text document through roxmltree
pub fn parse_text(data: &[u8]) -> Result<XmlNode, XmlError> {
    let data = data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data);
    let text = std::str::from_utf8(data).map_err(|_| XmlError::NotUtf8)?;
    let document = roxmltree::Document::parse(text)?;
    Ok(convert(document.root_element()))
}

fn convert(element: roxmltree::Node) -> XmlNode {
    let value: String = element
        .children()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect();
    let value = value.trim();

    XmlNode {
        name: element.tag_name().name().to_string(),
        value: (!value.is_empty()).then(|| value.to_string()),
        attributes: element
            .attributes()
            .map(|a| (a.name().to_string(), a.value().to_string()))
            .collect(),
        children: element.children().filter(|n| n.is_element()).map(convert).collect(),
    }
}

struct StringTable(Vec<u8>);

impl StringTable {
    fn get(&self, index: u32) -> Result<String, XmlError> {
        if index == 0 {
            return Ok(String::new());
        }
        let start = index as usize * 2;
        if start > self.0.len() {
            return Err(XmlError::InvalidString {
                index,
                len: self.0.len(),
            });
        }
        let units: Vec<u16> = self.0[start..]
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .take_while(|&unit| unit != 0)
            .collect();
        String::from_utf16(&units).map_err(|_| XmlError::InvalidUtf16 { index })
    }

    fn read(&self, cursor: &mut ByteCursor) -> Result<String, XmlError> {
        self.get(read_packed(cursor)?)
    }
}

fn read_packed(cursor: &mut ByteCursor) -> Result<u32, XmlError> {
    let mut value = 0u32;
    let mut shift = 0u32;
    loop {
        let byte = read_u8(cursor)?;
        if shift > 28 || (shift == 28 && byte & 0x7F > 0x0F) {
            return Err(XmlError::PackedIntOverflow);
        }
        value |= u32::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
    }
}

fn read_node(cursor: &mut ByteCursor, table: &StringTable, depth: usize) -> Result<XmlNode, XmlError> {
    if depth > MAX_DEPTH {
        return Err(XmlError::TooDeep);
    }
    let mut node = XmlNode::new(table.read(cursor)?);
    let flags = read_u8(cursor)?;

    if flags & FLAG_VALUE != 0 {
        node.value = Some(table.read(cursor)?);
    }
    if flags & FLAG_ATTRIBUTES != 0 {
        let count = read_packed(cursor)?;
        for _ in 0..count {
            let key = table.read(cursor)?;
            let value = table.read(cursor)?;
            node.attributes.push((key, value));
        }
    }
    if flags & FLAG_CHILDREN != 0 {
        let count = read_packed(cursor)?;
        for _ in 0..count {
            node.children.push(read_node(cursor, table, depth + 1)?);
        }
    }
    Ok(node)
}
