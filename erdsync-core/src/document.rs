//! Diagram document model and streaming rewrite.
//!
//! Diagram files (`.dxml`) are XML with `TABLE` elements that contain
//! `COLUMN` elements somewhere below them:
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <ERD>
//!   <TABLE Tablename="USERS" Comments="" TableType="0">
//!     <COLUMNS>
//!       <COLUMN ColName="ID" Comments=""/>
//!     </COLUMNS>
//!   </TABLE>
//! </ERD>
//! ```
//!
//! [`rewrite_document`] streams the document through quick-xml, hands every
//! element to a visitor as an [`ErdNode`], and re-serializes only the start
//! tags the visitor actually changed. Everything else (whitespace,
//! comments, entity references, attribute quoting) is copied through as
//! read.

use encoding_rs::{Encoding, UTF_8};
use quick_xml::events::attributes::{AttrError, Attribute};
use quick_xml::events::{BytesDecl, BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::{Reader, Writer};
use std::borrow::Cow;
use std::sync::LazyLock;
use thiserror::Error;

/// Element holding one table.
pub const TABLE_ELEMENT: &str = "TABLE";
/// Element holding one column; nested anywhere inside a `TABLE`.
pub const COLUMN_ELEMENT: &str = "COLUMN";
/// Table identifier attribute.
pub const TABLE_NAME_ATTR: &str = "Tablename";
/// Column identifier attribute.
pub const COLUMN_NAME_ATTR: &str = "ColName";
/// Free-text description attribute on both tables and columns.
pub const COMMENTS_ATTR: &str = "Comments";
/// Storage engine code attribute on tables.
pub const TABLE_TYPE_ATTR: &str = "TableType";

static DECLARED_ENCODING: LazyLock<regex::bytes::Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    regex::bytes::Regex::new(r#"\A\s*<\?xml\s[^>]*?encoding\s*=\s*["']([A-Za-z0-9._:\-]+)["']"#)
        .expect("declaration pattern is valid")
});

/// Why a diagram document could not be read or rewritten.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The XML itself is not well-formed
    #[error("malformed XML at byte {position}: {source}")]
    Xml {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },

    /// An attribute is malformed or duplicated
    #[error("malformed attribute: {0}")]
    Attribute(#[from] AttrError),

    /// An attribute value or declaration field could not be decoded
    #[error("invalid character data: {0}")]
    Text(String),

    /// The declaration names an encoding we do not know
    #[error("unsupported document encoding '{0}'")]
    UnknownEncoding(String),

    /// The bytes are not valid in the document's encoding
    #[error("document is not valid {0} text")]
    Undecodable(&'static str),

    /// The document ends inside an element
    #[error("element <{0}> is never closed")]
    Unclosed(String),

    /// The document has no element at all
    #[error("document has no root element")]
    MissingRoot,

    /// Serializing the rewritten document failed
    #[error("failed to serialize document: {0}")]
    Write(String),
}

impl DocumentError {
    fn write(error: impl std::fmt::Display) -> Self {
        Self::Write(error.to_string())
    }

    fn text(error: impl std::fmt::Display) -> Self {
        Self::Text(error.to_string())
    }
}

/// Kinds of element the merger cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A `TABLE` element
    Table,
    /// A `COLUMN` element
    Column,
    /// Any other element
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct NodeAttribute {
    key: String,
    value: String,
    /// Escaped text as it appeared in the source; cleared on overwrite.
    raw: Option<String>,
}

/// One element with its attributes in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErdNode {
    name: String,
    attributes: Vec<NodeAttribute>,
    modified: bool,
}

impl ErdNode {
    /// Creates an element with no attributes.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            modified: false,
        }
    }

    /// Builder method adding an attribute as if it had been read from a file.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        self.attributes.push(NodeAttribute {
            key: key.into(),
            raw: Some(escape_attribute_value(&value)),
            value,
        });
        self
    }

    /// Element name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Element kind, by exact name.
    pub fn kind(&self) -> NodeKind {
        match self.name.as_str() {
            TABLE_ELEMENT => NodeKind::Table,
            COLUMN_ELEMENT => NodeKind::Column,
            _ => NodeKind::Other,
        }
    }

    /// Unescaped value of attribute `key`, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.key == key)
            .map(|attr| attr.value.as_str())
    }

    /// Sets attribute `key`, appending it when absent.
    ///
    /// Returns `true` when the node changed; writing the value an attribute
    /// already holds is a no-op.
    pub fn upsert(&mut self, key: &str, value: impl Into<String>) -> bool {
        let value = value.into();
        match self.attributes.iter_mut().find(|attr| attr.key == key) {
            Some(attr) if attr.value == value => false,
            Some(attr) => {
                attr.value = value;
                attr.raw = None;
                self.modified = true;
                true
            }
            None => {
                self.attributes.push(NodeAttribute {
                    key: key.to_string(),
                    value,
                    raw: None,
                });
                self.modified = true;
                true
            }
        }
    }

    /// Attributes in document order as `(key, unescaped value)`.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|attr| (attr.key.as_str(), attr.value.as_str()))
    }

    /// Whether any upsert changed this node.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    fn from_start(start: &BytesStart<'_>) -> Result<Self, DocumentError> {
        let mut node = Self::new(String::from_utf8_lossy(start.name().as_ref()));

        for attr in start.attributes() {
            let attr = attr?;
            let value = attr.unescape_value().map_err(DocumentError::text)?;
            node.attributes.push(NodeAttribute {
                key: String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
                value: value.into_owned(),
                raw: Some(String::from_utf8_lossy(&attr.value).into_owned()),
            });
        }

        Ok(node)
    }

    fn to_start(&self) -> BytesStart<'_> {
        let mut start = BytesStart::new(self.name.as_str());

        for attr in &self.attributes {
            // Raw text is always written between double quotes, so values
            // that came from single-quoted attributes may need re-escaping.
            let value = match attr.raw.as_deref() {
                Some(raw) if !raw.contains('"') => Cow::Borrowed(raw.as_bytes()),
                _ => Cow::Owned(escape_attribute_value(&attr.value).into_bytes()),
            };
            start.push_attribute(Attribute {
                key: QName(attr.key.as_bytes()),
                value,
            });
        }

        start
    }
}

/// Escapes a value for a double-quoted attribute, keeping line breaks and
/// tabs intact through attribute-value normalization.
pub fn escape_attribute_value(value: &str) -> String {
    quick_xml::escape::escape(value)
        .replace('\n', "&#10;")
        .replace('\r', "&#13;")
        .replace('\t', "&#9;")
}

/// Decodes raw file bytes into text.
///
/// A byte-order mark wins; otherwise the encoding named in the XML
/// declaration is used; otherwise the bytes must be UTF-8.
pub fn decode_document(bytes: &[u8]) -> Result<Cow<'_, str>, DocumentError> {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        return decode_with(encoding, bytes.get(bom_len..).unwrap_or_default());
    }

    let encoding = match declared_encoding(bytes) {
        Some(label) => Encoding::for_label(label.as_bytes())
            .ok_or(DocumentError::UnknownEncoding(label))?,
        None => UTF_8,
    };

    decode_with(encoding, bytes)
}

fn decode_with<'a>(
    encoding: &'static Encoding,
    bytes: &'a [u8],
) -> Result<Cow<'a, str>, DocumentError> {
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .ok_or(DocumentError::Undecodable(encoding.name()))
}

fn declared_encoding(bytes: &[u8]) -> Option<String> {
    DECLARED_ENCODING
        .captures(bytes)
        .and_then(|caps| caps.get(1))
        .map(|label| String::from_utf8_lossy(label.as_bytes()).into_owned())
}

/// Output is always UTF-8, so any other declared encoding is rewritten.
fn utf8_declaration(decl: BytesDecl<'_>) -> Result<BytesDecl<'_>, DocumentError> {
    let is_utf8 = match decl.encoding() {
        None => true,
        Some(Ok(label)) => Encoding::for_label(&label) == Some(UTF_8),
        Some(Err(_)) => false,
    };
    if is_utf8 {
        return Ok(decl);
    }

    let version = decl.version().map_err(DocumentError::text)?;
    let version = String::from_utf8_lossy(&version).into_owned();
    let standalone = match decl.standalone() {
        Some(Ok(value)) => Some(String::from_utf8_lossy(&value).into_owned()),
        _ => None,
    };

    Ok(BytesDecl::new(&version, Some("UTF-8"), standalone.as_deref()))
}

/// Streams `source` through `visit` and returns the re-serialized bytes.
///
/// `visit` is called once per element with a mutable copy of the element
/// and the enclosing elements as they were read (outermost first). A
/// declaration is prepended when the source has none.
///
/// # Errors
/// Any well-formedness problem, including elements left open at the end
/// of input and documents without a root element.
pub fn rewrite_document<F>(source: &str, mut visit: F) -> Result<Vec<u8>, DocumentError>
where
    F: FnMut(&mut ErdNode, &[ErdNode]),
{
    let mut reader = Reader::from_str(source);
    let mut writer = Writer::new(Vec::with_capacity(source.len().saturating_add(64)));
    let mut ancestors: Vec<ErdNode> = Vec::new();
    let mut first_event = true;
    let mut seen_root = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|source| DocumentError::Xml {
                position: u64::try_from(reader.error_position()).unwrap_or(u64::MAX),
                source,
            })?;

        if first_event {
            first_event = false;
            if !matches!(event, Event::Decl(_)) {
                writer
                    .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
                    .map_err(DocumentError::write)?;
                writer.get_mut().push(b'\n');
            }
        }

        match event {
            Event::Decl(decl) => {
                writer
                    .write_event(Event::Decl(utf8_declaration(decl)?))
                    .map_err(DocumentError::write)?;
            }
            Event::Start(start) => {
                seen_root = true;
                let original = ErdNode::from_start(&start)?;
                let mut node = original.clone();
                visit(&mut node, &ancestors);

                let written = if node.is_modified() {
                    Event::Start(node.to_start())
                } else {
                    Event::Start(start)
                };
                writer.write_event(written).map_err(DocumentError::write)?;
                ancestors.push(original);
            }
            Event::Empty(start) => {
                seen_root = true;
                let mut node = ErdNode::from_start(&start)?;
                visit(&mut node, &ancestors);

                let written = if node.is_modified() {
                    Event::Empty(node.to_start())
                } else {
                    Event::Empty(start)
                };
                writer.write_event(written).map_err(DocumentError::write)?;
            }
            Event::End(end) => {
                ancestors.pop();
                writer
                    .write_event(Event::End(end))
                    .map_err(DocumentError::write)?;
            }
            Event::Eof => break,
            other => {
                writer.write_event(other).map_err(DocumentError::write)?;
            }
        }
    }

    if let Some(open) = ancestors.last() {
        return Err(DocumentError::Unclosed(open.name.clone()));
    }

    if !seen_root {
        return Err(DocumentError::MissingRoot);
    }

    Ok(writer.into_inner())
}
