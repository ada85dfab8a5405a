//! Epub navigation library
//!
//! A Rust library for opening EPUB publications and walking their package:
//! metadata, manifest, reading order and table of contents.
//!
//! Opening a publication locates the package document through
//! `META-INF/container.xml`, parses it together with its navigation document
//! (an EPUB 2 NCX or an EPUB 3 XHTML navigation document) and keeps the archive
//! open for reading resources afterwards. Both EPUB 2 and EPUB 3 packages are
//! supported.
//!
//! ## Quick Start
//!
//! ```rust, ignore
//! # use epub_nav::epub::EpubDoc;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut doc = EpubDoc::new("path/to/epub/file.epub")?;
//!
//! // Metadata
//! println!("Title: {:?}", doc.get_title()?);
//! println!("Creator: {:?}", doc.get_metadata_value("creator")?);
//!
//! // Reading order
//! for step in doc.spine() {
//!     let (id, href) = step?;
//!     println!("{id}: {href}");
//! }
//!
//! // Table of contents
//! for point in doc.navigation()? {
//!     println!("{}", point.level_title());
//! }
//!
//! // Resources
//! let _chapter = doc.read_file_by_id("chapter-1")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature flags
//!
//! - `text-length` (enabled by default): Enables `epub_nav::text_length` and
//!   `EpubDoc::count_characters`, which approximate the number of visible
//!   characters of every textual resource and attribute them to the table of
//!   contents.

pub(crate) mod utils;

pub mod archive;
pub mod container;
pub mod epub;
pub mod error;
pub mod iter;
pub mod navigation;
pub mod package;
#[cfg(feature = "text-length")]
pub mod text_length;
pub mod types;

#[cfg(test)]
mod test_utils;

pub use epub::EpubDoc;
pub use error::{EpubError, ErrorKind};
pub use utils::DecodeBytes;
