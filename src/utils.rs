use std::collections::HashMap;

use percent_encoding::percent_decode_str;
use encoding_rs::Encoding;
use quick_xml::{
    NsReader,
    escape::{resolve_html5_entity, unescape_with},
    events::Event,
};

use crate::error::EpubError;

/// Returns the directory component of an archive path, with a trailing slash
///
/// An entry that sits at the archive root has the empty string as its directory.
pub fn parent_dir(path: &str) -> String {
    match path.rfind('/') {
        Some(index) => path[..=index].to_string(),
        None => String::new(),
    }
}

/// Collapses `.` and `..` segments of a slash separated path
///
/// Returns the number of `..` segments that could not be collapsed
/// together with the remaining segments.
fn collapse_segments(path: &str) -> (usize, Vec<&str>) {
    let mut ups = 0;
    let mut segments = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                if segments.pop().is_none() {
                    ups += 1;
                }
            }
            _ => segments.push(segment),
        }
    }

    (ups, segments)
}

/// Normalizes a path relative to the archive root
///
/// ## Return
/// - `Some(String)`: The normalized path
/// - `None`: The path climbs above the archive root
pub fn normalize_path(path: &str) -> Option<String> {
    let (ups, segments) = collapse_segments(path);
    (ups == 0).then(|| segments.join("/"))
}

/// Resolves `href` against the directory `base_dir`
///
/// The result is still relative and keeps the `#fragment` of `href`. Leading
/// `..` segments that climb above `base_dir`'s own root are kept, since the
/// result may be joined with another prefix later on.
pub fn join_href(base_dir: &str, href: &str) -> String {
    let (path, fragment) = match href.split_once('#') {
        Some((path, fragment)) => (path, Some(fragment)),
        None => (href, None),
    };

    // A bare fragment points into the current document
    if path.is_empty() {
        return href.to_string();
    }

    let joined = format!("{}{}", base_dir, path);
    let (ups, segments) = collapse_segments(&joined);

    let mut result = "../".repeat(ups);
    result.push_str(&segments.join("/"));
    if let Some(fragment) = fragment {
        result.push('#');
        result.push_str(fragment);
    }

    result
}

/// Decodes percent-encoded characters of an href
pub fn percent_decode(href: &str) -> String {
    percent_decode_str(href).decode_utf8_lossy().to_string()
}

/// Replaces entity and character references in raw XML text
///
/// Named references are resolved against the HTML5 entity table, so `&eacute;`
/// becomes `é`. Text holding a reference that can not be resolved, or a bare
/// `&`, is kept verbatim.
pub fn unescape_xml(raw: &str) -> String {
    match unescape_with(raw, resolve_html5_entity) {
        Ok(text) => text.into_owned(),
        Err(_) => raw.to_string(),
    }
}

/// Decodes raw entry bytes into text
///
/// A UTF-8 or UTF-16 byte order mark selects the encoding. Without one, UTF-8
/// is tried first, then the encoding named by the XML declaration, then
/// big-endian UTF-16, and finally a lossy UTF-8 reading.
///
/// ## Notes
/// - Fewer than four bytes are rejected with [EpubError::EmptyDataError], no
///   markup document can be that short.
pub trait DecodeBytes {
    fn decode(&self) -> Result<String, EpubError>;
}

/// Looks up the `encoding` named by an XML declaration
fn declared_encoding(bytes: &[u8]) -> Option<&'static Encoding> {
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(256)]);
    let declaration = head.strip_prefix("<?xml")?.split("?>").next()?;

    let (_, rest) = declaration.split_once("encoding")?;
    let rest = rest.trim_start().strip_prefix('=')?.trim_start();
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let label = rest[1..].split(quote).next()?;

    Encoding::for_label(label.trim().as_bytes())
}

fn utf16_units(bytes: &[u8], from_bytes: fn([u8; 2]) -> u16) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|pair| from_bytes([pair[0], pair[1]]))
        .collect()
}

impl DecodeBytes for Vec<u8> {
    fn decode(&self) -> Result<String, EpubError> {
        if self.len() < 4 {
            return Err(EpubError::EmptyDataError);
        }

        match self.as_slice() {
            [0xEF, 0xBB, 0xBF, rest @ ..] => Ok(String::from_utf8(rest.to_vec())?),
            [0xFE, 0xFF, rest @ ..] => {
                Ok(String::from_utf16(&utf16_units(rest, u16::from_be_bytes))?)
            }
            [0xFF, 0xFE, rest @ ..] => {
                Ok(String::from_utf16(&utf16_units(rest, u16::from_le_bytes))?)
            }
            bytes => {
                if let Ok(text) = std::str::from_utf8(bytes) {
                    return Ok(text.to_string());
                }

                if let Some(encoding) = declared_encoding(bytes) {
                    let (text, _, malformed) = encoding.decode(bytes);
                    if !malformed {
                        return Ok(text.into_owned());
                    }
                }

                if bytes.len() % 2 == 0
                    && let Ok(text) = String::from_utf16(&utf16_units(bytes, u16::from_be_bytes))
                {
                    return Ok(text);
                }

                Ok(String::from_utf8_lossy(bytes).to_string())
            }
        }
    }
}

/// Provides functionality for normalizing whitespace characters
///
/// Sequences of whitespace characters (spaces, tabs, newlines, etc.)
/// are folded into a single space and leading and trailing whitespace
/// is removed.
pub trait NormalizeWhitespace {
    fn normalize_whitespace(&self) -> String;
}

impl NormalizeWhitespace for &str {
    fn normalize_whitespace(&self) -> String {
        self.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

impl NormalizeWhitespace for String {
    fn normalize_whitespace(&self) -> String {
        self.as_str().normalize_whitespace()
    }
}

/// Represents an element node in an XML document
#[derive(Debug)]
pub struct XmlElement {
    /// The local name of the element(excluding namespace prefix)
    pub name: String,

    /// The namespace prefix of the element
    pub prefix: Option<String>,

    /// The namespace of the element
    pub namespace: Option<String>,

    /// The attributes of the element
    ///
    /// The key is the qualified attribute name, the value is the unescaped attribute value
    pub attributes: HashMap<String, String>,

    /// The text and CDATA pieces of the element, in document order
    ///
    /// Each piece is paired with the number of child elements preceding it, so
    /// mixed content can be read back in order.
    pub texts: Vec<(usize, String)>,

    /// The children of the element
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn new(name: String) -> Self {
        Self {
            name,
            prefix: None,
            namespace: None,
            attributes: HashMap::new(),
            texts: Vec::new(),
            children: Vec::new(),
        }
    }

    /// The qualified name, `prefix:name` when the element has a prefix
    pub fn tag_name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.name),
            None => self.name.clone(),
        }
    }

    /// The text of the element and all of its descendants, trimmed
    pub fn text(&self) -> String {
        let mut result = String::new();
        self.collect_text(&mut result);
        result.trim().to_string()
    }

    fn collect_text(&self, buffer: &mut String) {
        let mut pieces = self.texts.iter().peekable();
        for (index, child) in self.children.iter().enumerate() {
            while let Some((_, text)) = pieces.next_if(|(position, _)| *position <= index) {
                buffer.push_str(text);
            }
            child.collect_text(buffer);
        }

        for (_, text) in pieces {
            buffer.push_str(text);
        }
    }

    pub fn get_attr(&self, name: &str) -> Option<String> {
        self.attributes.get(name).cloned()
    }

    /// Returns the attributes keyed by their local name
    ///
    /// `opf:role` becomes `role` and `xml:lang` becomes `lang`.
    pub fn local_attributes(&self) -> HashMap<String, String> {
        self.attributes
            .iter()
            .map(|(key, value)| {
                let local = key.rsplit_once(':').map_or(key.as_str(), |(_, local)| local);
                (local.to_string(), value.clone())
            })
            .collect()
    }

    /// Finds the element itself and its descendants with the given local name,
    /// in document order
    pub fn find_elements_by_name<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a XmlElement> {
        Descendants { stack: vec![self] }.filter(move |element| element.name == name)
    }

    /// Finds the direct children with the given local name
    pub fn find_children_by_name<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// Finds the direct children whose local name is one of `names`
    pub fn find_children_by_names<'a>(
        &'a self,
        names: &'a [&str],
    ) -> impl Iterator<Item = &'a XmlElement> {
        self.children
            .iter()
            .filter(move |child| names.contains(&child.name.as_str()))
    }

    pub fn children(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter()
    }

    fn push_text(&mut self, text: &str) {
        let position = self.children.len();

        if let Some((last, piece)) = self.texts.last_mut()
            && *last == position
        {
            piece.push_str(text);
        } else {
            self.texts.push((position, text.to_string()));
        }
    }
}

/// Pre-order walk over an element and its descendants
struct Descendants<'a> {
    stack: Vec<&'a XmlElement>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a XmlElement;

    fn next(&mut self) -> Option<Self::Item> {
        let element = self.stack.pop()?;
        self.stack.extend(element.children.iter().rev());
        Some(element)
    }
}

/// Builds [XmlElement] trees with `quick_xml`
pub struct XmlReader {}

impl XmlReader {
    /// Parses a whole document into its root element
    ///
    /// Entity and character references are resolved in text and attribute
    /// values, comments and processing instructions are dropped.
    ///
    /// ## Return
    /// - `Ok(XmlElement)`: The root element
    /// - `Err(EpubError)`: The document is empty, not well-formed, or ends
    ///   with unclosed elements
    pub fn parse(content: &str) -> Result<XmlElement, EpubError> {
        if content.is_empty() {
            return Err(EpubError::EmptyDataError);
        }

        // Create a XML reader with namespace support
        let mut reader = NsReader::from_str(content);

        let mut buf = Vec::new();
        let mut stack = Vec::<XmlElement>::new();
        let mut root = None;
        let mut namespace_map = HashMap::new();

        // Read XML events
        loop {
            match reader.read_event_into(&mut buf) {
                // End of file, stop the loop
                Ok(Event::Eof) => break,

                // Start of an element
                Ok(Event::Start(e)) => {
                    let element = Self::create_element(&e, &mut namespace_map);
                    stack.push(element);
                }

                // End of an element
                Ok(Event::End(_)) => {
                    if let Some(element) = stack.pop() {
                        // If the stack is empty,
                        // the current element is the root element
                        if stack.is_empty() {
                            root = Some(element);
                        } else if let Some(parent) = stack.last_mut() {
                            parent.children.push(element);
                        }
                    }
                }

                // Self-closing element
                Ok(Event::Empty(e)) => {
                    let element = Self::create_element(&e, &mut namespace_map);

                    match stack.last_mut() {
                        Some(parent) => parent.children.push(element),
                        None => root = Some(element),
                    }
                }

                // Text node
                Ok(Event::Text(e)) => {
                    if let Some(element) = stack.last_mut() {
                        element.push_text(&String::from_utf8_lossy(e.as_ref()));
                    }
                }

                // Entity and character references inside text
                Ok(Event::GeneralRef(e)) => {
                    if let Some(element) = stack.last_mut() {
                        let reference = format!("&{};", String::from_utf8_lossy(e.as_ref()));
                        element.push_text(&unescape_xml(&reference));
                    }
                }

                // CDATA node
                Ok(Event::CData(e)) => {
                    if let Some(element) = stack.last_mut() {
                        element.push_text(&String::from_utf8_lossy(e.as_ref()));
                    }
                }

                Err(err) => return Err(err.into()),

                // Ignore the following events (elements):
                // Comment, PI, Declaration, Doctype
                _ => {}
            }

            buf.clear();
        }

        if !stack.is_empty() {
            return Err(EpubError::EmptyDataError);
        }

        if let Some(element) = root.as_mut() {
            Self::assign_namespace(element, &namespace_map);
        }

        root.ok_or(EpubError::EmptyDataError)
    }

    fn create_element(
        e: &quick_xml::events::BytesStart,
        namespace_map: &mut HashMap<String, String>,
    ) -> XmlElement {
        let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
        let mut element = XmlElement::new(name);

        if let Some(prefix) = e.name().prefix() {
            element.prefix = Some(String::from_utf8_lossy(prefix.as_ref()).to_string());
        }

        for attr in e.attributes().flatten() {
            let attr_key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
            let attr_value = unescape_xml(&String::from_utf8_lossy(&attr.value));

            // Handle namespace attributes
            if attr_key == "xmlns" || attr_key.starts_with("xmlns:") {
                match attr_key.split_once(':') {
                    Some((_, prefix)) => namespace_map.insert(prefix.to_string(), attr_value),
                    None => namespace_map.insert(attr_key, attr_value),
                };

                continue;
            }

            element.attributes.insert(attr_key, attr_value);
        }

        element
    }

    /// Assign namespace to element recursively
    ///
    /// ## Parameters
    /// - `element`: The element to assign namespace
    /// - `namespace_map`: The prefix-namespace map
    fn assign_namespace(element: &mut XmlElement, namespace_map: &HashMap<String, String>) {
        if let Some(prefix) = &element.prefix {
            if let Some(namespace) = namespace_map.get(prefix) {
                element.namespace = Some(namespace.clone());
            }
        } else if let Some(namespace) = namespace_map.get("xmlns") {
            element.namespace = Some(namespace.clone());
        }

        for child in element.children.iter_mut() {
            Self::assign_namespace(child, namespace_map);
        }
    }
}
