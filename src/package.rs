//! Package document parsing
//!
//! Turns the OPF package document into its metadata, manifest and spine,
//! and remembers which manifest item is the navigation document.

use std::collections::HashMap;

use indexmap::IndexMap;
use log::{debug, warn};

use crate::{
    error::EpubError,
    types::{EpubVersion, ManifestItem, MetadataItem, MetadataRefinement, SpineItem},
    utils::{NormalizeWhitespace, XmlElement, XmlReader},
};

const DC_NAMESPACE: &str = "http://purl.org/dc/elements/1.1/";

/// The decoded content of a package document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDocument {
    pub version: EpubVersion,

    /// The value of the identifier named by `package@unique-identifier`
    pub unique_identifier: Option<String>,

    /// Metadata items in declaration order
    pub metadata: Vec<MetadataItem>,

    /// Manifest items keyed by id, in declaration order
    pub manifest: IndexMap<String, ManifestItem>,

    /// Spine items in reading order
    pub spine: Vec<SpineItem>,

    /// The `toc` attribute of the spine, naming the NCX manifest item
    pub toc_id: Option<String>,
}

impl PackageDocument {
    /// Parses a package document
    ///
    /// An empty manifest or spine is accepted. Manifest items without `id` or
    /// `href` and spine items without `idref` make the document malformed.
    ///
    /// # Return
    /// - `Ok(PackageDocument)`: The decoded package
    /// - `Err(EpubError::MalformedPackageDocument)`: The document can not be decoded
    pub fn parse(content: &str) -> Result<Self, EpubError> {
        let package = XmlReader::parse(content).map_err(|err| malformed(err.to_string()))?;
        if package.name != "package" {
            return Err(malformed(format!(
                "expected a \"package\" root element, found \"{}\"",
                package.tag_name()
            )));
        }

        let metadata = match package.find_children_by_name("metadata").next() {
            Some(element) => parse_metadata(element),
            None => {
                warn!("The package document has no \"metadata\" element.");
                vec![]
            }
        };

        let manifest = match package.find_children_by_name("manifest").next() {
            Some(element) => parse_manifest(element)?,
            None => IndexMap::new(),
        };

        let spine_element = package.find_children_by_name("spine").next();
        let spine = match spine_element {
            Some(element) => parse_spine(element)?,
            None => vec![],
        };
        let toc_id = spine_element
            .and_then(|element| element.get_attr("toc"))
            .filter(|id| !id.is_empty());

        let version = determine_epub_version(&package, &manifest, toc_id.is_some());
        let unique_identifier = find_unique_identifier(&package, &metadata);

        Ok(Self {
            version,
            unique_identifier,
            metadata,
            manifest,
            spine,
            toc_id,
        })
    }

    /// The id of the manifest item holding the navigation document
    ///
    /// The NCX named by the spine is preferred; otherwise the manifest item
    /// carrying the `nav` property is used.
    pub fn navigation_id(&self) -> Option<&str> {
        if let Some(toc_id) = &self.toc_id {
            return Some(toc_id);
        }

        self.manifest
            .values()
            .find(|item| item.has_property("nav"))
            .map(|item| item.id.as_str())
    }

    /// Groups the metadata items by field name
    ///
    /// Fields appear in order of first declaration and the items of each field
    /// keep their declaration order. Items declared by `<meta>` elements are
    /// also collected under the field `meta`.
    pub fn metadata_by_field(&self) -> IndexMap<String, Vec<MetadataItem>> {
        let mut fields = IndexMap::<String, Vec<MetadataItem>>::new();
        for item in &self.metadata {
            fields
                .entry(item.property.clone())
                .or_default()
                .push(item.clone());

            if item.from_meta && item.property != "meta" {
                fields.entry("meta".to_string()).or_default().push(item.clone());
            }
        }

        fields
    }

    /// Returns the href of the manifest item with the given id
    pub fn file_path(&self, id: &str) -> Option<&str> {
        self.manifest.get(id).map(|item| item.href.as_str())
    }
}

#[inline]
fn malformed(reason: String) -> EpubError {
    EpubError::MalformedPackageDocument { reason }
}

/// Parses the `<metadata>` element
///
/// Dublin Core elements are keyed by their local name, `<meta>` elements by
/// their `property` (EPUB 3) or `name` (EPUB 2) attribute. EPUB 3 refinements
/// are attached to the item they refine.
fn parse_metadata(metadata_element: &XmlElement) -> Vec<MetadataItem> {
    let mut metadata = Vec::new();
    let mut refinements = HashMap::<String, Vec<MetadataRefinement>>::new();

    for element in metadata_element.children() {
        match element.name.as_str() {
            // OPF 1.x wraps its metadata in these two containers
            "dc-metadata" | "x-metadata" => {
                for child in element.children() {
                    parse_metadata_element(child, &mut metadata, &mut refinements);
                }
            }
            _ => parse_metadata_element(element, &mut metadata, &mut refinements),
        }
    }

    for item in metadata.iter_mut() {
        let Some(id) = &item.id else { continue };

        if let Some(refined) = refinements.remove(id) {
            for refinement in &refined {
                item.attributes
                    .entry(refinement.property.clone())
                    .or_insert_with(|| refinement.value.clone());
            }
            item.refined = refined;
        }
    }

    for id in refinements.keys() {
        debug!("Ignoring refinements of unknown metadata item \"{}\"", id);
    }

    metadata
}

#[inline]
fn parse_metadata_element(
    element: &XmlElement,
    metadata: &mut Vec<MetadataItem>,
    refinements: &mut HashMap<String, Vec<MetadataRefinement>>,
) {
    let is_dublin_core = element.namespace.as_deref() == Some(DC_NAMESPACE)
        || element.prefix.as_deref() == Some("dc");

    if is_dublin_core {
        metadata.push(MetadataItem {
            id: element.get_attr("id"),
            property: element.name.to_lowercase(),
            value: element.text().normalize_whitespace(),
            lang: element.get_attr("xml:lang"),
            attributes: element.local_attributes(),
            refined: vec![],
            from_meta: false,
        });
        return;
    }

    if element.name != "meta" {
        return;
    }

    let value = element.text().normalize_whitespace();
    let lang = element.get_attr("xml:lang");

    if let Some(refines) = element.get_attr("refines") {
        let id = refines.strip_prefix('#').unwrap_or(&refines).to_string();
        let Some(property) = element.get_attr("property") else {
            warn!("Ignoring a refinement of \"{}\" without \"property\".", id);
            return;
        };

        refinements
            .entry(id.clone())
            .or_default()
            .push(MetadataRefinement {
                refines: id,
                property,
                value,
                lang,
                scheme: element.get_attr("scheme"),
            });
    } else if let Some(property) = element.get_attr("property") {
        metadata.push(MetadataItem {
            id: element.get_attr("id"),
            property,
            value,
            lang,
            attributes: element.local_attributes(),
            refined: vec![],
            from_meta: true,
        });
    } else if let Some(name) = element.get_attr("name") {
        let value = element
            .get_attr("content")
            .map(|content| content.normalize_whitespace())
            .unwrap_or(value);

        metadata.push(MetadataItem {
            id: element.get_attr("id"),
            property: name,
            value,
            lang,
            attributes: element.local_attributes(),
            refined: vec![],
            from_meta: true,
        });
    } else {
        warn!("Ignoring a \"meta\" element without \"name\" or \"property\".");
    }
}

/// Parses the `<manifest>` element
fn parse_manifest(
    manifest_element: &XmlElement,
) -> Result<IndexMap<String, ManifestItem>, EpubError> {
    let mut resources = IndexMap::new();

    for element in manifest_element.find_children_by_name("item") {
        let id = required_attr(element, "id")?;
        let href = required_attr(element, "href")?;
        let mime = element.get_attr("media-type").unwrap_or_else(|| {
            warn!("The manifest item \"{}\" has no \"media-type\" attribute.", id);
            String::new()
        });

        if resources.contains_key(&id) {
            warn!("Duplicate manifest id \"{}\", keeping the first declaration.", id);
            continue;
        }

        resources.insert(
            id.clone(),
            ManifestItem {
                id,
                href,
                mime,
                properties: element.get_attr("properties"),
                fallback: element.get_attr("fallback"),
                char_count: None,
            },
        );
    }

    Ok(resources)
}

/// Parses the `<spine>` element
fn parse_spine(spine_element: &XmlElement) -> Result<Vec<SpineItem>, EpubError> {
    let mut spine = Vec::new();
    for element in spine_element.find_children_by_name("itemref") {
        let idref = required_attr(element, "idref")?;
        let linear = element
            .get_attr("linear")
            .map(|linear| linear != "no")
            .unwrap_or(true);

        spine.push(SpineItem {
            idref,
            id: element.get_attr("id"),
            properties: element.get_attr("properties"),
            linear,
        });
    }

    Ok(spine)
}

#[inline]
fn required_attr(element: &XmlElement, attribute: &str) -> Result<String, EpubError> {
    element
        .get_attr(attribute)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            malformed(format!(
                "the \"{}\" attribute is a must attribute for the \"{}\" element",
                attribute,
                element.tag_name()
            ))
        })
}

fn determine_epub_version(
    package: &XmlElement,
    manifest: &IndexMap<String, ManifestItem>,
    has_toc: bool,
) -> EpubVersion {
    // Check the explicit version attribute
    if let Some(version) = package.get_attr("version") {
        match version.trim().chars().next() {
            Some('3') => return EpubVersion::Version3_0,
            Some('1') | Some('2') => return EpubVersion::Version2_0,
            _ => {}
        }
    }

    // Look for EPUB 2.x and 3.x specific features
    if has_toc {
        return EpubVersion::Version2_0;
    }
    if manifest.values().any(|item| item.has_property("nav")) {
        return EpubVersion::Version3_0;
    }

    warn!("Unable to recognize the EPUB version, assuming EPUB 2.0.");
    EpubVersion::Version2_0
}

fn find_unique_identifier(package: &XmlElement, metadata: &[MetadataItem]) -> Option<String> {
    let mut identifiers = metadata.iter().filter(|item| item.property == "identifier");

    let identifier = match package.get_attr("unique-identifier") {
        Some(uid) => identifiers.find(|item| item.id.as_deref() == Some(uid.as_str())),
        None => identifiers.next(),
    };

    identifier.map(|item| item.value.clone())
}
