use std::{
    collections::HashMap,
    fs::File,
    io::{BufReader, Read, Seek},
    path::Path,
};

#[cfg(feature = "text-length")]
use std::collections::HashSet;

use indexmap::IndexMap;
use log::{debug, warn};

#[cfg(feature = "text-length")]
use crate::text_length::{is_text_content, visible_char_count};
use crate::{
    archive::EpubArchive,
    container::{resolve_package_path, root_path},
    error::EpubError,
    iter::{NavigationIter, SpineIter},
    navigation::NavigationDocument,
    package::PackageDocument,
    types::{EpubVersion, ManifestItem, MetadataItem, NavPoint, SpineItem},
    utils::{DecodeBytes, normalize_path, parent_dir, percent_decode},
};

/// Where the navigation of a publication stands after loading
#[derive(Debug, Clone, PartialEq, Eq)]
enum Navigation {
    /// The package does not declare a navigation document
    Absent,

    /// The declared navigation id is not in the manifest
    Dangling(String),

    Loaded {
        path: String,
        document: NavigationDocument,
    },
}

/// A loaded EPUB publication
///
/// `EpubDoc` owns the archive handle together with everything decoded from the
/// package: metadata grouped by field, the manifest, the spine and the
/// navigation tree. Loading either produces a fully navigable document or fails
/// with a single error; references that do not resolve are only reported when
/// they are traversed.
///
/// Every href stored in the manifest is relative to [root_path](EpubDoc::root_path),
/// so turning a resource into an archive entry is one join away.
///
/// Reading resources needs `&mut self` since the underlying reader is shared.
/// Documents of different publications are independent values.
pub struct EpubDoc<R: Read + Seek> {
    archive: EpubArchive<R>,

    /// The archive path of the package document
    pub package_path: String,

    /// The directory containing the package document, with a trailing slash,
    /// or the empty string for a package document at the archive root
    pub root_path: String,

    pub version: EpubVersion,

    /// The value of the identifier named by `package@unique-identifier`
    pub unique_identifier: Option<String>,

    metadata: IndexMap<String, Vec<MetadataItem>>,
    manifest: IndexMap<String, ManifestItem>,
    spine: Vec<SpineItem>,
    navigation: Navigation,
}

impl<R: Read + Seek> EpubDoc<R> {
    /// Loads a publication from a reader
    ///
    /// # Parameters
    /// - `reader`: The data source of the EPUB archive, usually a file or memory buffer
    ///
    /// # Return
    /// - `Ok(EpubDoc<R>)`: The loaded publication
    /// - `Err(EpubError)`: A format error (not an EPUB container) or a resolution
    ///   error (container, package or navigation document missing or malformed)
    pub fn from_reader(reader: R) -> Result<Self, EpubError> {
        // Loading process
        // 1. Check the mandatory entries and compression methods of the archive
        // 2. Locate the package document through `META-INF/container.xml`
        // 3. Parse metadata, manifest and spine from the package document
        // 4. Parse the navigation document, if one is declared

        let mut archive = EpubArchive::new(reader)?;

        let package_path = resolve_package_path(&mut archive)?;
        let root_path = root_path(&package_path);
        debug!("Root path is \"{}\"", root_path);

        let package = match archive.read(&package_path) {
            Ok(data) => data,
            Err(EpubError::ResourceNotFound { .. }) => {
                return Err(EpubError::PackageNotFound { path: package_path });
            }
            Err(err) => return Err(err),
        };
        let package = package
            .decode()
            .map_err(|err| EpubError::MalformedPackageDocument {
                reason: err.to_string(),
            })?;
        let package = PackageDocument::parse(&package)?;

        let navigation = load_navigation(&mut archive, &root_path, &package)?;
        let metadata = package.metadata_by_field();

        Ok(Self {
            archive,
            package_path,
            root_path,
            version: package.version,
            unique_identifier: package.unique_identifier,
            metadata,
            manifest: package.manifest,
            spine: package.spine,
            navigation,
        })
    }

    /// Lists the metadata field names, in order of first declaration
    pub fn metadata_fields(&self) -> Vec<&str> {
        self.metadata.keys().map(String::as_str).collect()
    }

    /// Retrieves all items of a metadata field, in declaration order
    ///
    /// # Return
    /// - `Ok(&[MetadataItem])`: At least one item
    /// - `Err(EpubError::MetadataFieldNotFound)`: The package does not declare the field
    pub fn get_metadata(&self, key: &str) -> Result<&[MetadataItem], EpubError> {
        self.metadata
            .get(key)
            .map(Vec::as_slice)
            .ok_or_else(|| EpubError::MetadataFieldNotFound {
                field: key.to_string(),
            })
    }

    /// Retrieves the values of a metadata field, in declaration order
    pub fn get_metadata_value(&self, key: &str) -> Result<Vec<String>, EpubError> {
        Ok(self
            .get_metadata(key)?
            .iter()
            .map(|item| item.value.clone())
            .collect())
    }

    /// Retrieves the attribute maps of a metadata field
    ///
    /// The maps line up with the values returned by [get_metadata_value](EpubDoc::get_metadata_value).
    pub fn get_metadata_attributes(
        &self,
        key: &str,
    ) -> Result<Vec<&HashMap<String, String>>, EpubError> {
        Ok(self
            .get_metadata(key)?
            .iter()
            .map(|item| &item.attributes)
            .collect())
    }

    /// Retrieves the titles of the publication
    pub fn get_title(&self) -> Result<Vec<String>, EpubError> {
        self.get_metadata_value("title")
    }

    /// Retrieves the languages of the publication
    pub fn get_language(&self) -> Result<Vec<String>, EpubError> {
        self.get_metadata_value("language")
    }

    /// Retrieves every identifier of the publication
    ///
    /// The one named by `package@unique-identifier` is also available as
    /// [unique_identifier](EpubDoc::unique_identifier).
    pub fn get_identifier(&self) -> Result<Vec<String>, EpubError> {
        self.get_metadata_value("identifier")
    }

    /// The manifest, in declaration order
    pub fn manifest(&self) -> &IndexMap<String, ManifestItem> {
        &self.manifest
    }

    /// Lists the hrefs of all manifest items, in declaration order
    pub fn manifest_hrefs(&self) -> Vec<&str> {
        self.manifest
            .values()
            .map(|item| item.href.as_str())
            .collect()
    }

    pub fn get_manifest_item(&self, id: &str) -> Option<&ManifestItem> {
        self.manifest.get(id)
    }

    /// Returns the root-relative href of the manifest item with the given id
    pub fn get_href_by_id(&self, id: &str) -> Option<&str> {
        self.manifest.get(id).map(|item| item.href.as_str())
    }

    /// Finds the manifest item an href points to
    ///
    /// Both sides are resolved against the root path before comparison, so
    /// `./a.xhtml`, `a%2Exhtml` and `a.xhtml#top` all find the item `a.xhtml`.
    pub fn find_manifest_item_by_href(&self, href: &str) -> Option<&ManifestItem> {
        let path = self.resolve_path(href).ok()?;
        self.manifest
            .values()
            .find(|item| self.resolve_path(&item.href).ok().as_ref() == Some(&path))
    }

    /// Resolves a root-relative href to an archive path
    ///
    /// The href is percent-decoded, its fragment dropped and its `.` and `..`
    /// segments collapsed. A leading `/` makes the href relative to the archive
    /// root instead.
    ///
    /// # Return
    /// - `Ok(String)`: The archive path
    /// - `Err(EpubError::RelativeLinkLeakage)`: The href climbs above the archive root
    pub fn resolve_path(&self, href: &str) -> Result<String, EpubError> {
        resolve_href(&self.root_path, href)
    }

    /// Lists the names of all archive entries, in archive order
    pub fn entries(&self) -> Vec<String> {
        self.archive.entries()
    }

    /// Opens a resource by its root-relative href
    ///
    /// The reader borrows the document and releases the entry when dropped.
    ///
    /// # Return
    /// - `Ok(impl Read)`: A reader over the decompressed resource
    /// - `Err(EpubError::ResourceNotFound)`: No archive entry matches the href
    pub fn open_file<'a>(&'a mut self, href: &str) -> Result<impl Read + use<'a, R>, EpubError> {
        let path = self.resolve_path(href)?;
        self.archive.open(&path)
    }

    /// Opens a resource by its manifest id
    ///
    /// # Return
    /// - `Ok(impl Read)`: A reader over the decompressed resource
    /// - `Err(EpubError::ResourceIdNotExist)`: The manifest does not declare the id
    /// - `Err(EpubError::ResourceNotFound)`: The declared resource is missing from the archive
    pub fn open_file_by_id<'a>(
        &'a mut self,
        id: &str,
    ) -> Result<impl Read + use<'a, R>, EpubError> {
        let href = self
            .get_href_by_id(id)
            .ok_or_else(|| EpubError::ResourceIdNotExist { id: id.to_string() })?
            .to_string();

        self.open_file(&href)
    }

    /// Reads a whole resource by its root-relative href
    pub fn read_file(&mut self, href: &str) -> Result<Vec<u8>, EpubError> {
        let mut data = Vec::new();
        self.open_file(href)?.read_to_end(&mut data)?;
        Ok(data)
    }

    /// Reads a whole resource by its manifest id
    pub fn read_file_by_id(&mut self, id: &str) -> Result<Vec<u8>, EpubError> {
        let mut data = Vec::new();
        self.open_file_by_id(id)?.read_to_end(&mut data)?;
        Ok(data)
    }

    /// The spine items, in reading order
    pub fn spine_items(&self) -> &[SpineItem] {
        &self.spine
    }

    /// Iterates the reading order
    ///
    /// Yields `(manifest id, root-relative href)` for every spine item; see
    /// [SpineIter] for how unknown ids are reported.
    pub fn spine(&self) -> SpineIter<'_> {
        SpineIter::new(&self.spine, &self.manifest)
    }

    /// Iterates the table of contents in pre-order
    ///
    /// # Return
    /// - `Ok(NavigationIter)`: The iterator, possibly over an empty tree
    /// - `Err(EpubError::NavigationUnavailable)`: The package declares no navigation document
    /// - `Err(EpubError::DanglingNavigationReference)`: The declared navigation
    ///   id is not in the manifest
    pub fn navigation(&self) -> Result<NavigationIter<'_>, EpubError> {
        Ok(NavigationIter::new(self.catalog()?))
    }

    /// The top level navigation points
    pub fn catalog(&self) -> Result<&[NavPoint], EpubError> {
        match &self.navigation {
            Navigation::Loaded { document, .. } => Ok(&document.points),
            Navigation::Absent => Err(EpubError::NavigationUnavailable),
            Navigation::Dangling(id) => Err(EpubError::DanglingNavigationReference {
                reference: id.clone(),
            }),
        }
    }

    /// The title of the navigation document, if it has one
    pub fn catalog_title(&self) -> Option<&str> {
        match &self.navigation {
            Navigation::Loaded { document, .. } => document.title.as_deref(),
            _ => None,
        }
    }

    /// The archive path of the loaded navigation document
    pub fn navigation_path(&self) -> Option<&str> {
        match &self.navigation {
            Navigation::Loaded { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Finds the manifest item a navigation point targets
    ///
    /// # Return
    /// - `Ok(&ManifestItem)`: The targeted resource
    /// - `Err(EpubError::DanglingNavigationReference)`: The point has no target,
    ///   or its target is not declared in the manifest
    pub fn resolve_nav_point(&self, point: &NavPoint) -> Result<&ManifestItem, EpubError> {
        point
            .path()
            .and_then(|path| self.find_manifest_item_by_href(path))
            .ok_or_else(|| EpubError::DanglingNavigationReference {
                reference: point.content.clone().unwrap_or_else(|| point.label.clone()),
            })
    }

    /// Counts the visible characters of every textual manifest item
    ///
    /// Counts are stored on the manifest items and then attributed to the
    /// navigation tree. A failing resource does not stop the pass: its error is
    /// logged and returned, and the counts of the other resources are kept.
    /// Running the pass again over an unchanged archive yields the same counts.
    ///
    /// # Return
    /// The manifest ids whose resource could not be counted, with the reason.
    #[cfg(feature = "text-length")]
    pub fn count_characters(&mut self) -> Vec<(String, EpubError)> {
        let targets = self
            .manifest
            .values()
            .filter(|item| is_text_content(&item.mime))
            .map(|item| (item.id.clone(), item.href.clone()))
            .collect::<Vec<_>>();

        let mut failures = Vec::new();
        for (id, href) in targets {
            match self.open_file(&href).and_then(visible_char_count) {
                Ok(count) => {
                    if let Some(item) = self.manifest.get_mut(&id) {
                        item.char_count = Some(count);
                    }
                }
                Err(err) => {
                    warn!("Unable to count the characters of \"{}\": {}", href, err);
                    failures.push((id, err));
                }
            }
        }

        self.annotate_navigation();
        failures
    }

    /// The character count recorded for a manifest item
    #[cfg(feature = "text-length")]
    pub fn char_count(&self, id: &str) -> Option<usize> {
        self.manifest.get(id).and_then(|item| item.char_count)
    }

    /// The sum of the counts attributed to the navigation tree
    #[cfg(feature = "text-length")]
    pub fn total_content_length(&self) -> usize {
        self.catalog()
            .map(|points| points.iter().map(NavPoint::total_content_length).sum())
            .unwrap_or(0)
    }

    /// Attributes each document count to the first navigation point targeting it
    #[cfg(feature = "text-length")]
    fn annotate_navigation(&mut self) {
        let counts = self
            .manifest
            .values()
            .filter_map(|item| Some((self.resolve_path(&item.href).ok()?, item.char_count?)))
            .collect::<HashMap<_, _>>();

        let Navigation::Loaded { document, .. } = &mut self.navigation else {
            return;
        };

        let root_path = &self.root_path;
        let mut counted = HashSet::new();
        let mut get_count = |target: &str| {
            let path = resolve_href(root_path, target).ok()?;
            let count = counts.get(&path).copied()?;
            Some(if counted.insert(path) { count } else { 0 })
        };

        for point in document.points.iter_mut() {
            point.set_content_count(&mut get_count);
        }
    }
}

impl EpubDoc<BufReader<File>> {
    /// Loads a publication from a file
    ///
    /// # Parameters
    /// - `path`: The path to the EPUB file
    ///
    /// # Return
    /// - `Ok(EpubDoc)`: The loaded publication
    /// - `Err(EpubError)`: The file can not be opened or is not a usable EPUB
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, EpubError> {
        let file = File::open(path).map_err(EpubError::from)?;
        Self::from_reader(BufReader::new(file))
    }
}

/// Resolves `href` against the root path
///
/// The fragment is split off before percent-decoding, so an encoded `%23`
/// stays part of the file name.
fn resolve_href(root_path: &str, href: &str) -> Result<String, EpubError> {
    let path = percent_decode(href.split_once('#').map_or(href, |(path, _)| path));

    let joined = match path.strip_prefix('/') {
        Some(path) => path.to_string(),
        None => format!("{}{}", root_path, path),
    };

    normalize_path(&joined).ok_or_else(|| EpubError::RelativeLinkLeakage { path })
}

/// Loads the navigation document declared by the package
///
/// A declared id the manifest does not know is recorded as dangling instead of
/// failing, so the rest of the publication stays usable.
fn load_navigation<R: Read + Seek>(
    archive: &mut EpubArchive<R>,
    root_path: &str,
    package: &PackageDocument,
) -> Result<Navigation, EpubError> {
    let Some(id) = package.navigation_id() else {
        debug!("The package does not declare a navigation document");
        return Ok(Navigation::Absent);
    };

    let Some(href) = package.file_path(id) else {
        warn!(
            "The navigation document \"{}\" is not declared in the manifest.",
            id
        );
        return Ok(Navigation::Dangling(id.to_string()));
    };

    let path = resolve_href(root_path, href)?;
    let data = match archive.read(&path) {
        Ok(data) => data,
        Err(EpubError::ResourceNotFound { .. }) => {
            return Err(EpubError::NavigationNotFound { path });
        }
        Err(err) => return Err(err),
    };

    let content = data
        .decode()
        .map_err(|err| EpubError::MalformedNavigationDocument {
            reason: err.to_string(),
        })?;
    let document = NavigationDocument::parse(&content, &parent_dir(href))?;
    debug!("Navigation document loaded from \"{}\"", path);

    Ok(Navigation::Loaded { path, document })
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Read};

    use crate::{
        epub::EpubDoc,
        error::{EpubError, ErrorKind},
        test_utils::{CONTAINER_XML, build_archive, open_doc, sample_doc, sample_entries},
        types::EpubVersion,
    };

    const EPUB3_OPF: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="uid">
    <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
        <dc:identifier id="uid">urn:uuid:0000</dc:identifier>
        <dc:title>Nested</dc:title>
        <dc:language>fr</dc:language>
    </metadata>
    <manifest>
        <item id="nav" href="nav/toc.xhtml" media-type="application/xhtml+xml" properties="nav"/>
        <item id="c1" href="text/one.xhtml" media-type="application/xhtml+xml"/>
        <item id="c2" href="text/two%20words.xhtml" media-type="application/xhtml+xml"/>
    </manifest>
    <spine>
        <itemref idref="c1"/>
        <itemref idref="c2"/>
    </spine>
</package>"#;

    const EPUB3_NAV: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<body>
    <nav epub:type="toc">
        <h1>Contents</h1>
        <ol>
            <li><a href="../text/one.xhtml">One</a></li>
            <li><a href="../text/two%20words.xhtml#end">Two</a></li>
        </ol>
    </nav>
</body>
</html>"#;

    fn epub3_entries() -> Vec<(&'static str, &'static str)> {
        vec![
            ("mimetype", "application/epub+zip"),
            ("META-INF/container.xml", CONTAINER_XML),
            ("OEBPS/content.opf", EPUB3_OPF),
            ("OEBPS/nav/toc.xhtml", EPUB3_NAV),
            ("OEBPS/text/one.xhtml", "<html><body><p>One</p></body></html>"),
            ("OEBPS/text/two words.xhtml", "<html><body><p>Two two</p></body></html>"),
        ]
    }

    /// Loading failures abort construction
    mod construction_tests {
        use std::io::Cursor;

        use crate::{
            epub::EpubDoc,
            error::{EpubError, ErrorKind},
            test_utils::{CONTAINER_XML, build_archive, sample_entries, sample_entries_with},
        };

        fn load(entries: &[(&str, &str)]) -> Result<(), EpubError> {
            EpubDoc::from_reader(Cursor::new(build_archive(entries))).map(|_| ())
        }

        #[test]
        fn test_missing_container() {
            let entries = sample_entries()
                .into_iter()
                .filter(|(name, _)| *name != "META-INF/container.xml")
                .collect::<Vec<_>>();

            let err = load(&entries).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Format);
            assert_eq!(
                err,
                EpubError::NonCanonicalEpub {
                    expected_file: "META-INF/container.xml".to_string()
                }
            );
        }

        #[test]
        fn test_malformed_container() {
            let entries = sample_entries_with("META-INF/container.xml", "<container><rootfiles>");
            let err = load(&entries).unwrap_err();
            assert!(matches!(err, EpubError::MalformedContainer { .. }));
        }

        #[test]
        fn test_missing_package() {
            let entries = sample_entries()
                .into_iter()
                .filter(|(name, _)| *name != "OEBPS/content.opf")
                .collect::<Vec<_>>();

            let err = load(&entries).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Resolution);
            assert_eq!(
                err,
                EpubError::PackageNotFound {
                    path: "OEBPS/content.opf".to_string()
                }
            );
        }

        #[test]
        fn test_malformed_package() {
            let entries = sample_entries_with("OEBPS/content.opf", "<package><manifest></package>");
            let err = load(&entries).unwrap_err();
            assert!(matches!(err, EpubError::MalformedPackageDocument { .. }));
        }

        #[test]
        fn test_missing_navigation_document() {
            let entries = sample_entries()
                .into_iter()
                .filter(|(name, _)| *name != "OEBPS/toc.ncx")
                .collect::<Vec<_>>();

            let err = load(&entries).unwrap_err();
            assert_eq!(
                err,
                EpubError::NavigationNotFound {
                    path: "OEBPS/toc.ncx".to_string()
                }
            );
        }

        #[test]
        fn test_malformed_navigation_document() {
            let entries = sample_entries_with("OEBPS/toc.ncx", "<ncx><navMap></ncx>");
            let err = load(&entries).unwrap_err();
            assert!(matches!(err, EpubError::MalformedNavigationDocument { .. }));
        }

        #[test]
        fn test_package_at_archive_root() {
            let container = concat!(
                r#"<container><rootfiles>"#,
                r#"<rootfile full-path="content.opf"/>"#,
                r#"</rootfiles></container>"#
            );
            let opf = concat!(
                r#"<package version="2.0"><manifest>"#,
                r#"<item id="c1" href="a.xhtml" media-type="application/xhtml+xml"/>"#,
                r#"</manifest><spine><itemref idref="c1"/></spine></package>"#
            );
            let entries = [
                ("mimetype", "application/epub+zip"),
                ("META-INF/container.xml", container),
                ("content.opf", opf),
                ("a.xhtml", "<html/>"),
            ];

            let mut doc = EpubDoc::from_reader(Cursor::new(build_archive(&entries))).unwrap();
            assert_eq!(doc.root_path, "");
            assert_eq!(doc.resolve_path("a.xhtml").unwrap(), "a.xhtml");
            assert_eq!(doc.read_file("a.xhtml").unwrap(), b"<html/>");
            assert_eq!(doc.get_title().unwrap_err().kind(), ErrorKind::LookupMiss);
        }

        #[test]
        fn test_unused_container_entries() {
            let container = r#"<container>
    <rootfiles>
        <rootfile full-path="OEBPS/content.opf"/>
        <rootfile full-path="OEBPS/other.opf"/>
    </rootfiles>
</container>"#;
            assert!(load(&sample_entries_with("META-INF/container.xml", container)).is_ok());
            assert!(load(&sample_entries_with("META-INF/container.xml", CONTAINER_XML)).is_ok());
        }
    }

    /// Metadata lookups
    mod metadata_tests {
        use crate::{
            error::{EpubError, ErrorKind},
            test_utils::{open_doc, sample_doc, sample_entries_with},
        };

        #[test]
        fn test_metadata_fields() {
            let doc = sample_doc();
            assert_eq!(
                doc.metadata_fields(),
                vec!["title", "creator", "language", "identifier", "cover", "meta"]
            );
            assert_eq!(doc.get_title().unwrap(), vec!["A Dog's Tale"]);
            assert_eq!(doc.get_language().unwrap(), vec!["en"]);
            assert_eq!(
                doc.get_identifier().unwrap(),
                vec!["http://www.gutenberg.org/3174"]
            );
        }

        #[test]
        fn test_metadata_values_align_with_attributes() {
            let doc = sample_doc();

            let values = doc.get_metadata_value("creator").unwrap();
            let attributes = doc.get_metadata_attributes("creator").unwrap();
            assert_eq!(values, vec!["Mark Twain", "Some Illustrator"]);
            assert_eq!(attributes.len(), values.len());
            assert_eq!(attributes[0].get("role").map(String::as_str), Some("aut"));
            assert_eq!(attributes[1].get("role").map(String::as_str), Some("ill"));
        }

        #[test]
        fn test_absent_field_is_lookup_miss() {
            let opf = r#"<package version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/">
    <metadata><dc:title>Anonymous</dc:title></metadata>
    <manifest/>
    <spine/>
</package>"#;
            let doc = open_doc(&sample_entries_with("OEBPS/content.opf", opf));

            let err = doc.get_metadata_value("creator").unwrap_err();
            assert!(err.is_lookup_miss());
            assert_eq!(
                err,
                EpubError::MetadataFieldNotFound {
                    field: "creator".to_string()
                }
            );
            assert_eq!(
                doc.get_metadata_attributes("creator").unwrap_err().kind(),
                ErrorKind::LookupMiss
            );
            assert!(doc.get_metadata("creator").is_err());
        }
    }

    /// Spine and navigation traversal
    mod traversal_tests {
        use crate::{
            error::{EpubError, ErrorKind},
            test_utils::{open_doc, sample_doc, sample_entries_with},
        };

        #[test]
        fn test_spine_order() {
            let doc = sample_doc();
            let spine = doc.spine().collect::<Result<Vec<_>, _>>().unwrap();
            assert_eq!(spine, vec![("c1", "a.xhtml"), ("c2", "b.xhtml")]);
        }

        #[test]
        fn test_spine_matches_manifest_lookup() {
            let doc = sample_doc();
            assert_eq!(doc.spine().len(), doc.spine_items().len());

            for step in doc.spine() {
                let (id, href) = step.unwrap();
                assert_eq!(doc.get_href_by_id(id), Some(href));
            }

            // A fresh iterator starts over
            assert_eq!(doc.spine().count(), 2);
        }

        #[test]
        fn test_spine_dangling_reference() {
            let opf = r#"<package version="2.0">
    <manifest><item id="c1" href="a.xhtml" media-type="application/xhtml+xml"/></manifest>
    <spine><itemref idref="c1"/><itemref idref="c3"/></spine>
</package>"#;
            let doc = open_doc(&sample_entries_with("OEBPS/content.opf", opf));

            let steps = doc.spine().collect::<Vec<_>>();
            assert_eq!(steps.len(), 2);
            assert_eq!(steps[0].as_ref().unwrap(), &("c1", "a.xhtml"));

            let err = steps[1].as_ref().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ReferentialIntegrity);
            assert_eq!(
                err,
                &EpubError::DanglingSpineReference {
                    idref: "c3".to_string()
                }
            );
        }

        #[test]
        fn test_navigation_order_and_levels() {
            let doc = sample_doc();

            let visited = doc
                .navigation()
                .unwrap()
                .map(|point| (point.label.as_str(), point.level))
                .collect::<Vec<_>>();
            assert_eq!(visited, vec![("Intro", 1), ("Ch1", 1), ("Ch1.1", 2)]);
            assert_eq!(doc.catalog_title(), Some("A Dog's Tale"));
            assert_eq!(doc.navigation_path(), Some("OEBPS/toc.ncx"));
        }

        #[test]
        fn test_navigation_children_follow_parent() {
            let doc = sample_doc();
            let points = doc.navigation().unwrap().collect::<Vec<_>>();

            for (index, point) in points.iter().enumerate() {
                if let Some(first_child) = point.children.first() {
                    assert_eq!(points[index + 1], first_child);
                    assert_eq!(first_child.level, point.level + 1);
                }
            }
        }

        #[test]
        fn test_navigation_unavailable() {
            let opf = r#"<package version="2.0">
    <manifest><item id="c1" href="a.xhtml" media-type="application/xhtml+xml"/></manifest>
    <spine><itemref idref="c1"/></spine>
</package>"#;
            let doc = open_doc(&sample_entries_with("OEBPS/content.opf", opf));

            let err = doc.navigation().err().unwrap();
            assert!(err.is_lookup_miss());
            assert_eq!(err, EpubError::NavigationUnavailable);
            assert_eq!(doc.catalog_title(), None);
        }

        #[test]
        fn test_navigation_dangling_id() {
            let opf = r#"<package version="2.0">
    <manifest><item id="c1" href="a.xhtml" media-type="application/xhtml+xml"/></manifest>
    <spine toc="missing"><itemref idref="c1"/></spine>
</package>"#;
            let doc = open_doc(&sample_entries_with("OEBPS/content.opf", opf));

            // The reading order stays usable
            assert_eq!(doc.spine().count(), 1);
            assert_eq!(
                doc.navigation().err().unwrap(),
                EpubError::DanglingNavigationReference {
                    reference: "missing".to_string()
                }
            );
        }

        #[test]
        fn test_resolve_nav_point() {
            let doc = sample_doc();
            let points = doc.navigation().unwrap().collect::<Vec<_>>();

            assert_eq!(doc.resolve_nav_point(points[0]).unwrap().id, "c1");
            assert_eq!(doc.resolve_nav_point(points[2]).unwrap().id, "c2");
        }

        #[test]
        fn test_resolve_nav_point_unknown_target() {
            let ncx = r#"<ncx><navMap>
    <navPoint><navLabel><text>Gone</text></navLabel><content src="gone.xhtml"/></navPoint>
</navMap></ncx>"#;
            let doc = open_doc(&sample_entries_with("OEBPS/toc.ncx", ncx));
            let point = doc.navigation().unwrap().next().unwrap();

            assert_eq!(
                doc.resolve_nav_point(point).unwrap_err(),
                EpubError::DanglingNavigationReference {
                    reference: "gone.xhtml".to_string()
                }
            );
        }
    }

    /// Resource access
    mod resource_tests {
        use std::io::Read;

        use crate::{
            error::EpubError,
            test_utils::{CHAPTER_A, sample_doc},
        };

        #[test]
        fn test_open_by_id_matches_open_by_href() {
            let mut doc = sample_doc();

            let by_id = doc.read_file_by_id("c1").unwrap();
            let by_href = doc.read_file("a.xhtml").unwrap();
            assert_eq!(by_id, by_href);
            assert_eq!(by_id, CHAPTER_A.as_bytes());
        }

        #[test]
        fn test_open_file_is_scoped() {
            let mut doc = sample_doc();

            let mut first = String::new();
            doc.open_file("b.xhtml")
                .unwrap()
                .read_to_string(&mut first)
                .unwrap();

            let mut second = String::new();
            doc.open_file_by_id("c2")
                .unwrap()
                .read_to_string(&mut second)
                .unwrap();

            assert_eq!(first, second);
        }

        #[test]
        fn test_open_file_case_insensitive() {
            let mut doc = sample_doc();
            assert_eq!(
                doc.read_file("IMAGES/Cover.PNG").unwrap(),
                doc.read_file("images/cover.png").unwrap()
            );
        }

        #[test]
        fn test_missing_resources() {
            let mut doc = sample_doc();

            let err = doc.read_file("missing.xhtml").unwrap_err();
            assert!(err.is_lookup_miss());
            assert_eq!(
                err,
                EpubError::ResourceNotFound {
                    resource: "OEBPS/missing.xhtml".to_string()
                }
            );

            let err = doc.read_file_by_id("missing").unwrap_err();
            assert!(err.is_lookup_miss());
            assert_eq!(
                err,
                EpubError::ResourceIdNotExist {
                    id: "missing".to_string()
                }
            );
        }

        #[test]
        fn test_resolve_path() {
            let doc = sample_doc();

            assert_eq!(doc.resolve_path("a.xhtml").unwrap(), "OEBPS/a.xhtml");
            assert_eq!(doc.resolve_path("./b.xhtml#s1").unwrap(), "OEBPS/b.xhtml");
            assert_eq!(
                doc.resolve_path("../META-INF/container.xml").unwrap(),
                "META-INF/container.xml"
            );
            assert_eq!(doc.resolve_path("/mimetype").unwrap(), "mimetype");
            assert_eq!(doc.resolve_path("notes%231.xhtml#n2").unwrap(), "OEBPS/notes#1.xhtml");
            assert_eq!(doc.resolve_path("two%20words.xhtml").unwrap(), "OEBPS/two words.xhtml");
            assert_eq!(
                doc.resolve_path("../../escape.xhtml").unwrap_err(),
                EpubError::RelativeLinkLeakage {
                    path: "../../escape.xhtml".to_string()
                }
            );
        }

        #[test]
        fn test_manifest_listing() {
            let doc = sample_doc();

            assert_eq!(
                doc.manifest_hrefs(),
                vec!["toc.ncx", "a.xhtml", "b.xhtml", "images/cover.png"]
            );
            assert_eq!(doc.get_href_by_id("cover-image"), Some("images/cover.png"));
            assert_eq!(doc.get_href_by_id("unknown"), None);
            assert_eq!(doc.get_manifest_item("c2").unwrap().mime, "application/xhtml+xml");
            assert_eq!(
                doc.find_manifest_item_by_href("./images/cover.png")
                    .map(|item| item.id.as_str()),
                Some("cover-image")
            );
            assert_eq!(doc.entries().len(), 7);
        }
    }

    #[cfg(feature = "text-length")]
    mod text_length_tests {
        use crate::{
            error::EpubError,
            test_utils::{open_doc, sample_doc, sample_entries_with},
        };

        #[test]
        fn test_count_characters() {
            let mut doc = sample_doc();
            assert_eq!(doc.char_count("c1"), None);

            let failures = doc.count_characters();
            assert!(failures.is_empty());

            assert_eq!(doc.char_count("c1"), Some(10));
            assert_eq!(doc.char_count("c2"), Some(25));
            assert_eq!(doc.char_count("ncx"), None);
            assert_eq!(doc.char_count("cover-image"), None);

            let counts = doc
                .navigation()
                .unwrap()
                .map(|point| point.content_count)
                .collect::<Vec<_>>();
            assert_eq!(counts, vec![Some(10), Some(25), Some(0)]);
            assert_eq!(doc.total_content_length(), 35);
        }

        #[test]
        fn test_count_characters_idempotent() {
            let mut doc = sample_doc();

            doc.count_characters();
            let manifest = doc.manifest().clone();
            let catalog = doc.catalog().unwrap().to_vec();

            doc.count_characters();
            assert_eq!(doc.manifest(), &manifest);
            assert_eq!(doc.catalog().unwrap(), catalog.as_slice());
        }

        #[test]
        fn test_count_characters_continues_after_failure() {
            let opf = r#"<package version="2.0">
    <manifest>
        <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
        <item id="c1" href="a.xhtml" media-type="application/xhtml+xml"/>
        <item id="lost" href="lost.xhtml" media-type="application/xhtml+xml"/>
        <item id="c2" href="b.xhtml" media-type="application/xhtml+xml"/>
    </manifest>
    <spine toc="ncx"><itemref idref="c1"/><itemref idref="c2"/></spine>
</package>"#;
            let mut doc = open_doc(&sample_entries_with("OEBPS/content.opf", opf));

            let failures = doc.count_characters();
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].0, "lost");
            assert_eq!(
                failures[0].1,
                EpubError::ResourceNotFound {
                    resource: "OEBPS/lost.xhtml".to_string()
                }
            );

            assert_eq!(doc.char_count("c1"), Some(10));
            assert_eq!(doc.char_count("lost"), None);
            assert_eq!(doc.char_count("c2"), Some(25));
        }
    }

    #[test]
    fn test_sample_document() {
        let doc = sample_doc();

        assert_eq!(doc.package_path, "OEBPS/content.opf");
        assert_eq!(doc.root_path, "OEBPS/");
        assert_eq!(doc.version, EpubVersion::Version2_0);
        assert_eq!(
            doc.unique_identifier.as_deref(),
            Some("http://www.gutenberg.org/3174")
        );
    }

    #[test]
    fn test_loading_twice_is_stable() {
        let data = build_archive(&sample_entries());
        let first = EpubDoc::from_reader(Cursor::new(data.clone())).unwrap();
        let second = EpubDoc::from_reader(Cursor::new(data)).unwrap();

        assert_eq!(first.package_path, second.package_path);
        assert_eq!(first.metadata, second.metadata);
        assert_eq!(first.manifest, second.manifest);
        assert_eq!(first.spine, second.spine);
        assert_eq!(first.navigation, second.navigation);
    }

    #[test]
    fn test_epub3_document() {
        let mut doc = open_doc(&epub3_entries());

        assert_eq!(doc.version, EpubVersion::Version3_0);
        assert_eq!(doc.unique_identifier.as_deref(), Some("urn:uuid:0000"));
        assert_eq!(doc.navigation_path(), Some("OEBPS/nav/toc.xhtml"));
        assert_eq!(doc.catalog_title(), Some("Contents"));

        let targets = doc
            .navigation()
            .unwrap()
            .map(|point| point.content.clone().unwrap_or_default())
            .collect::<Vec<_>>();
        assert_eq!(
            targets,
            vec!["text/one.xhtml", "text/two%20words.xhtml#end"]
        );

        let last = doc.catalog().unwrap()[1].clone();
        assert_eq!(doc.resolve_nav_point(&last).unwrap().id, "c2");

        let mut content = String::new();
        doc.open_file_by_id("c2")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert!(content.contains("Two two"));
    }

    #[test]
    fn test_epub3_missing_package_is_not_partial() {
        let entries = epub3_entries()
            .into_iter()
            .filter(|(name, _)| *name != "OEBPS/content.opf")
            .collect::<Vec<_>>();
        let result = EpubDoc::from_reader(Cursor::new(build_archive(&entries)));

        assert!(matches!(result, Err(EpubError::PackageNotFound { .. })));
        assert_eq!(result.err().map(|err| err.kind()), Some(ErrorKind::Resolution));
    }
}
