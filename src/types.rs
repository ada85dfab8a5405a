//! Data model of a parsed EPUB package
//!
//! The structures in this module are produced by the package and navigation
//! document parsers and owned by [EpubDoc](crate::epub::EpubDoc).

use std::collections::HashMap;

/// The EPUB version declared (or implied) by the package document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpubVersion {
    Version2_0,
    Version3_0,
}

/// One value of a metadata field
///
/// A field name may appear several times in the package document
/// (e.g. several `creator` elements); each occurrence becomes its own item
/// and declaration order is preserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataItem {
    /// The `id` attribute of the element, if any
    pub id: Option<String>,

    /// The field name
    ///
    /// For Dublin Core elements this is the local element name (`title`,
    /// `creator`, ...). For `<meta>` elements it is the `name` (EPUB 2) or
    /// `property` (EPUB 3) attribute.
    pub property: String,

    /// The text content, with whitespace normalized
    pub value: String,

    /// The `xml:lang` attribute of the element, if any
    pub lang: Option<String>,

    /// Attributes of the element keyed by local name
    ///
    /// Refinements targeting this item are merged in as well, so that an
    /// EPUB 3 `role` refinement is found under the same `role` key an EPUB 2
    /// `opf:role` attribute uses.
    pub attributes: HashMap<String, String>,

    /// EPUB 3 `<meta refines="#id">` elements that refine this item
    pub refined: Vec<MetadataRefinement>,

    /// Whether the item was declared by a `<meta>` element
    pub from_meta: bool,
}

/// Supplementary information attached to a [MetadataItem]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRefinement {
    /// The id of the refined item, without the leading `#`
    pub refines: String,

    pub property: String,

    pub value: String,

    pub lang: Option<String>,

    pub scheme: Option<String>,
}

/// One resource declared in the manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestItem {
    /// Identifier, unique within the manifest
    pub id: String,

    /// Location of the resource, relative to the root path
    pub href: String,

    /// The media type declared for the resource
    pub mime: String,

    pub properties: Option<String>,

    pub fallback: Option<String>,

    /// Approximate count of visible characters
    ///
    /// `None` until the character count enrichment has run on this item.
    pub char_count: Option<usize>,
}

impl ManifestItem {
    /// Returns `true` if the `properties` attribute lists the given property
    pub fn has_property(&self, property: &str) -> bool {
        self.properties
            .as_ref()
            .is_some_and(|properties| properties.split_whitespace().any(|p| p == property))
    }
}

/// A reference, by manifest id, to a resource in reading order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpineItem {
    /// The id of the referenced manifest item
    pub idref: String,

    pub id: Option<String>,

    pub properties: Option<String>,

    /// `false` if the item is declared with `linear="no"`
    pub linear: bool,
}

/// One node of the table of contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavPoint {
    /// The label text
    pub label: String,

    /// Target of the navigation point relative to the root path,
    /// optionally followed by a `#fragment`
    pub content: Option<String>,

    /// Nesting level, the direct children of the navigation root are level 1
    pub level: usize,

    /// The NCX `playOrder` attribute, kept as-is
    pub play_order: Option<usize>,

    /// Character count attributed to this node by the enrichment pass
    pub content_count: Option<usize>,

    pub children: Vec<NavPoint>,
}

impl NavPoint {
    /// Creates a navigation point with no children and no level assigned yet
    pub fn new(label: impl Into<String>, content: Option<String>) -> Self {
        Self {
            label: label.into(),
            content,
            level: 0,
            play_order: None,
            content_count: None,
            children: vec![],
        }
    }

    /// The target without its fragment
    pub fn path(&self) -> Option<&str> {
        self.content
            .as_deref()
            .map(|content| content.split_once('#').map_or(content, |(path, _)| path))
            .filter(|path| !path.is_empty())
    }

    /// The fragment of the target, without `#`
    pub fn fragment(&self) -> Option<&str> {
        self.content
            .as_deref()
            .and_then(|content| content.split_once('#'))
            .map(|(_, fragment)| fragment)
    }

    /// Assigns nesting levels to this node and all of its descendants
    pub fn reset_level(&mut self, level: usize) {
        self.level = level;
        for child in self.children.iter_mut() {
            child.reset_level(level + 1);
        }
    }

    /// Annotates this node and all of its descendants, in pre-order,
    /// with the count returned by `get_count` for their target
    ///
    /// Nodes without a target are left untouched.
    pub fn set_content_count<F>(&mut self, get_count: &mut F)
    where
        F: FnMut(&str) -> Option<usize>,
    {
        if let Some(content) = &self.content {
            self.content_count = get_count(content);
        }

        for child in self.children.iter_mut() {
            child.set_content_count(get_count);
        }
    }

    /// The own count of this node plus the counts of all of its descendants
    pub fn total_content_length(&self) -> usize {
        self.content_count.unwrap_or(0)
            + self
                .children
                .iter()
                .map(NavPoint::total_content_length)
                .sum::<usize>()
    }

    /// The label indented by four spaces per level
    pub fn level_title(&self) -> String {
        format!("{}{}", " ".repeat(self.level * 4), self.label)
    }
}
