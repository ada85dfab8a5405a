//! Archive access layer
//!
//! [EpubArchive] wraps a [ZipArchive] and offers the few operations the
//! navigation engine needs: a format sanity check on open, listing entry names,
//! and opening an entry by path with a case-insensitive fallback.

use std::io::{Read, Seek};

use log::debug;
use zip::{CompressionMethod, ZipArchive, result::ZipError};

use crate::error::EpubError;

/// Entries every EPUB container must carry
pub const MANDATORY_ENTRIES: [&str; 2] = ["mimetype", "META-INF/container.xml"];

/// Read-only view of the ZIP container of an EPUB publication
pub struct EpubArchive<R: Read + Seek> {
    archive: ZipArchive<R>,
}

impl<R: Read + Seek> EpubArchive<R> {
    /// Opens a ZIP archive and verifies it looks like an EPUB container
    ///
    /// # Return
    /// - `Ok(EpubArchive<R>)`: The archive passed the sanity check
    /// - `Err(EpubError)`: The data is not a ZIP archive, a mandatory entry is
    ///   missing, or an entry uses a compression method EPUB does not allow
    pub fn new(reader: R) -> Result<Self, EpubError> {
        let mut archive = Self {
            archive: ZipArchive::new(reader)?,
        };

        archive.check_mandatory_entries()?;
        archive.check_compression_method()?;

        Ok(archive)
    }

    /// Returns `true` if an entry with exactly this name exists
    pub fn contains(&self, name: &str) -> bool {
        self.archive.index_for_name(name).is_some()
    }

    /// Lists the names of all entries, in archive order
    pub fn entries(&self) -> Vec<String> {
        self.archive.file_names().map(str::to_string).collect()
    }

    /// The number of entries in the archive
    pub fn len(&self) -> usize {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.len() == 0
    }

    /// Opens an entry for reading
    ///
    /// The exact path is tried first; if no entry has that name, the first
    /// entry whose name matches case-insensitively is opened instead. The
    /// returned reader borrows the archive and is released when dropped.
    ///
    /// # Return
    /// - `Ok(impl Read)`: A reader over the decompressed entry
    /// - `Err(EpubError::ResourceNotFound)`: No entry matches `path`
    pub fn open<'a>(&'a mut self, path: &str) -> Result<impl Read + use<'a, R>, EpubError> {
        let name = self.resolve_name(path)?;

        match self.archive.by_name(&name) {
            Ok(file) => Ok(file),
            Err(ZipError::FileNotFound) => Err(EpubError::ResourceNotFound {
                resource: path.to_string(),
            }),
            Err(err) => Err(EpubError::from(err)),
        }
    }

    /// Reads an entry completely
    pub fn read(&mut self, path: &str) -> Result<Vec<u8>, EpubError> {
        let mut buffer = Vec::<u8>::new();
        self.open(path)?.read_to_end(&mut buffer)?;
        Ok(buffer)
    }

    fn resolve_name(&self, path: &str) -> Result<String, EpubError> {
        if self.contains(path) {
            return Ok(path.to_string());
        }

        let lowercase = path.to_lowercase();
        self.archive
            .file_names()
            .find(|name| name.to_lowercase() == lowercase)
            .map(|name| {
                debug!("Resolved \"{}\" case-insensitively to \"{}\"", path, name);
                name.to_string()
            })
            .ok_or_else(|| EpubError::ResourceNotFound {
                resource: path.to_string(),
            })
    }

    fn check_mandatory_entries(&self) -> Result<(), EpubError> {
        match MANDATORY_ENTRIES.iter().find(|entry| !self.contains(entry)) {
            Some(entry) => Err(EpubError::NonCanonicalEpub {
                expected_file: entry.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Checks if the compression method of all entries conforms to the OCF
    /// requirements
    ///
    /// EPUB files can only use either Stored (uncompressed) or Deflated.
    fn check_compression_method(&mut self) -> Result<(), EpubError> {
        for index in 0..self.archive.len() {
            let file = self.archive.by_index_raw(index)?;

            match file.compression() {
                CompressionMethod::Stored | CompressionMethod::Deflated => continue,
                method => {
                    return Err(EpubError::UnusableCompressionMethod {
                        file: file.name().to_string(),
                        method: method.to_string(),
                    });
                }
            };
        }

        Ok(())
    }
}
