//! Navigation document parsing
//!
//! Both the EPUB 2 NCX and the EPUB 3 XHTML navigation document are turned
//! into the same tree of [NavPoint]s. Targets are rebased from the directory of
//! the navigation document onto the root path, so they can be compared with
//! manifest hrefs directly.

use log::warn;

use crate::{
    error::EpubError,
    types::NavPoint,
    utils::{NormalizeWhitespace, XmlElement, XmlReader, join_href},
};

const HEAD_TAGS: [&str; 6] = ["h1", "h2", "h3", "h4", "h5", "h6"];

/// The decoded content of a navigation document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationDocument {
    /// The `docTitle` of an NCX, or the heading of an XHTML `toc` nav
    pub title: Option<String>,

    /// The top level navigation points, levels already assigned
    pub points: Vec<NavPoint>,
}

impl NavigationDocument {
    /// Parses a navigation document
    ///
    /// The format is detected from the root element: `ncx` selects the NCX
    /// grammar, anything else is read as an XHTML navigation document.
    ///
    /// ## Parameters
    /// - `content`: The decoded navigation document
    /// - `base_dir`: The directory of the navigation document relative to the
    ///   root path, with a trailing slash
    ///
    /// ## Return
    /// - `Ok(NavigationDocument)`: The navigation tree
    /// - `Err(EpubError::MalformedNavigationDocument)`: The document can not be decoded
    pub fn parse(content: &str, base_dir: &str) -> Result<Self, EpubError> {
        let root = XmlReader::parse(content).map_err(|err| malformed(err.to_string()))?;

        let mut document = if root.name == "ncx" {
            parse_ncx(&root, base_dir)
        } else {
            parse_nav_xhtml(&root, base_dir)?
        };

        for point in document.points.iter_mut() {
            point.reset_level(1);
        }

        Ok(document)
    }
}

#[inline]
fn malformed(reason: String) -> EpubError {
    EpubError::MalformedNavigationDocument { reason }
}

fn parse_ncx(ncx: &XmlElement, base_dir: &str) -> NavigationDocument {
    let title = match ncx.find_elements_by_name("docTitle").next() {
        Some(element) => Some(element.text().normalize_whitespace()),
        None => {
            warn!("Expecting to get docTitle information from the ncx file, but it's missing.");
            None
        }
    };

    let points = match ncx.find_elements_by_name("navMap").next() {
        Some(nav_map) => parse_nav_points(nav_map, base_dir),
        None => {
            warn!("The ncx file has no \"navMap\" element.");
            vec![]
        }
    };

    NavigationDocument { title, points }
}

/// Recursively parses `navPoint` elements
///
/// Document order is kept, `playOrder` is recorded but never used for sorting.
fn parse_nav_points(parent_element: &XmlElement, base_dir: &str) -> Vec<NavPoint> {
    let mut nav_points = Vec::new();
    for nav_point in parent_element.find_children_by_name("navPoint") {
        let label = match nav_point.find_children_by_name("navLabel").next() {
            Some(element) => element.text().normalize_whitespace(),
            None => String::new(),
        };

        let content = nav_point
            .find_children_by_name("content")
            .next()
            .and_then(|element| element.get_attr("src"))
            .map(|src| join_href(base_dir, src.trim()));

        let mut point = NavPoint::new(label, content);
        point.play_order = nav_point
            .get_attr("playOrder")
            .and_then(|order| order.trim().parse::<usize>().ok());
        point.children = parse_nav_points(nav_point, base_dir);

        nav_points.push(point);
    }

    nav_points
}

fn parse_nav_xhtml(html: &XmlElement, base_dir: &str) -> Result<NavigationDocument, EpubError> {
    let mut navs = html.find_elements_by_name("nav");
    let nav = navs
        .find(|element| {
            element
                .get_attr("epub:type")
                .is_some_and(|types| types.split_whitespace().any(|t| t == "toc"))
        })
        .or_else(|| {
            warn!("No nav element is typed \"toc\", using the first nav element.");
            html.find_elements_by_name("nav").next()
        })
        .ok_or_else(|| malformed("the \"nav\" element was not found".to_string()))?;

    let title = nav
        .find_children_by_names(&HEAD_TAGS)
        .next()
        .map(|element| element.text().normalize_whitespace());

    let points = match nav.find_elements_by_name("ol").next() {
        Some(list) => parse_catalog_list(list, base_dir),
        None => {
            warn!("The toc nav element has no list.");
            vec![]
        }
    };

    Ok(NavigationDocument { title, points })
}

/// Recursively parses `<ol>` lists of a navigation document
///
/// An `li` is labelled by its `a` or `span` child; only `a` carries a target.
fn parse_catalog_list(element: &XmlElement, base_dir: &str) -> Vec<NavPoint> {
    let mut catalog = Vec::new();
    for item in element.find_children_by_name("li") {
        let Some(title_element) = item.find_children_by_names(&["a", "span"]).next() else {
            warn!("Skipping a list item without label.");
            continue;
        };

        let content = title_element
            .get_attr("href")
            .map(|href| join_href(base_dir, href.trim()));

        let mut point = NavPoint::new(title_element.text().normalize_whitespace(), content);
        if let Some(list) = item.find_children_by_name("ol").next() {
            point.children = parse_catalog_list(list, base_dir);
        }

        catalog.push(point);
    }

    catalog
}
