//! In-memory EPUB fixtures shared by the unit tests

use std::io::{Cursor, Write};

use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

use crate::epub::EpubDoc;

pub const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
    <rootfiles>
        <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
    </rootfiles>
</container>"#;

pub const PACKAGE_OPF: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0" unique-identifier="BookId">
    <metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">
        <dc:title>A Dog's Tale</dc:title>
        <dc:creator opf:role="aut" opf:file-as="Twain, Mark">Mark Twain</dc:creator>
        <dc:creator opf:role="ill">Some   Illustrator</dc:creator>
        <dc:language>en</dc:language>
        <dc:identifier id="BookId" opf:scheme="URI">http://www.gutenberg.org/3174</dc:identifier>
        <meta name="cover" content="cover-image"/>
    </metadata>
    <manifest>
        <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
        <item id="c1" href="a.xhtml" media-type="application/xhtml+xml"/>
        <item id="c2" href="b.xhtml" media-type="application/xhtml+xml"/>
        <item id="cover-image" href="images/cover.png" media-type="image/png"/>
    </manifest>
    <spine toc="ncx">
        <itemref idref="c1"/>
        <itemref idref="c2"/>
    </spine>
</package>"#;

pub const TOC_NCX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
    <head>
        <meta name="dtb:uid" content="http://www.gutenberg.org/3174"/>
    </head>
    <docTitle><text>A Dog's Tale</text></docTitle>
    <navMap>
        <navPoint id="np-1" playOrder="1">
            <navLabel><text>Intro</text></navLabel>
            <content src="a.xhtml"/>
        </navPoint>
        <navPoint id="np-2" playOrder="2">
            <navLabel><text>Ch1</text></navLabel>
            <content src="b.xhtml"/>
            <navPoint id="np-3" playOrder="3">
                <navLabel><text>Ch1.1</text></navLabel>
                <content src="b.xhtml#s1"/>
            </navPoint>
        </navPoint>
    </navMap>
</ncx>"#;

pub const CHAPTER_A: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><title>Intro</title><style>p { color: red; }</style></head>
<BODY>
<p>Hello<br/>World</p>
</BODY>
</html>"#;

pub const CHAPTER_B: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><title>Chapter 1</title></head>
<body>
<h1>Chapter 1</h1>
<script type="text/javascript">var hidden = "not counted";</script>
<p id="s1">Once upon a time</p>
</body>
</html>"#;

/// Builds a ZIP archive with the given entries, in order
pub fn build_archive(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    for (name, content) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }

    zip.finish().unwrap().into_inner()
}

/// The entries of a small but complete EPUB 2 publication
pub fn sample_entries() -> Vec<(&'static str, &'static str)> {
    vec![
        ("mimetype", "application/epub+zip"),
        ("META-INF/container.xml", CONTAINER_XML),
        ("OEBPS/content.opf", PACKAGE_OPF),
        ("OEBPS/toc.ncx", TOC_NCX),
        ("OEBPS/a.xhtml", CHAPTER_A),
        ("OEBPS/b.xhtml", CHAPTER_B),
        ("OEBPS/images/cover.png", "PNG"),
    ]
}

/// Opens a publication built from the given entries
pub fn open_doc(entries: &[(&str, &str)]) -> EpubDoc<Cursor<Vec<u8>>> {
    EpubDoc::from_reader(Cursor::new(build_archive(entries))).unwrap()
}

/// Opens the sample publication
pub fn sample_doc() -> EpubDoc<Cursor<Vec<u8>>> {
    open_doc(&sample_entries())
}

/// Replaces one entry of the sample publication
pub fn sample_entries_with(
    name: &'static str,
    content: &'static str,
) -> Vec<(&'static str, &'static str)> {
    let mut entries = sample_entries();
    match entries.iter_mut().find(|(entry, _)| *entry == name) {
        Some(entry) => entry.1 = content,
        None => entries.push((name, content)),
    }
    entries
}
