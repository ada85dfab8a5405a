//! Error Type Definition Module
//!
//! This module defines the various error types that may be encountered while
//! opening an EPUB archive and navigating its package. All errors are uniformly
//! wrapped in the `EpubError` enumeration, and every variant belongs to exactly
//! one [ErrorKind] so callers can tell structural faults from ordinary misses.
//!
//! ## Error Kinds
//!
//! - [ErrorKind::Format] - The archive fails the mandatory-entry sanity check
//! - [ErrorKind::Resolution] - The container or a package/navigation document
//!   cannot be found or parsed
//! - [ErrorKind::ReferentialIntegrity] - A spine or navigation reference points
//!   to an unknown manifest identifier
//! - [ErrorKind::LookupMiss] - The requested field or resource is not present
//! - [ErrorKind::Read] - An archive entry cannot be opened, read or decoded

use thiserror::Error;

/// Classification of [EpubError] variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The archive is not a usable EPUB container
    Format,

    /// The container file or a package/navigation document cannot be resolved
    Resolution,

    /// A reference points to an identifier the manifest does not declare
    ReferentialIntegrity,

    /// A normal "not present" outcome
    LookupMiss,

    /// Low-level read or decode failure
    Read,
}

/// Types of errors that can occur during EPUB processing
#[derive(Debug, Error)]
pub enum EpubError {
    /// ZIP archive related errors
    ///
    /// Errors occur when processing the ZIP structure of EPUB files,
    /// such as file corruption, unreadability, etc.
    #[error("Archive error: {source}")]
    ArchiveError { source: zip::result::ZipError },

    /// The container file `META-INF/container.xml` is absent
    #[error("Container not found: The \"META-INF/container.xml\" file does not exist.")]
    ContainerNotFound,

    /// A spine item references an id that the manifest does not declare
    #[error("Dangling spine reference: The spine references unknown manifest id \"{idref}\".")]
    DanglingSpineReference { idref: String },

    /// A navigation reference points to something the manifest does not declare
    #[error(
        "Dangling navigation reference: \"{reference}\" does not match any manifest item."
    )]
    DanglingNavigationReference { reference: String },

    /// Data Decoding Error - Null data
    ///
    /// This error occurs when trying to decode an empty stream.
    #[error("Decode error: The data is empty.")]
    EmptyDataError,

    #[error("IO error: {source}")]
    IOError { source: std::io::Error },

    /// The container file exists but can not be decoded or lacks a root file path
    #[error("Malformed container: {reason}")]
    MalformedContainer { reason: String },

    /// The navigation document exists but can not be decoded
    #[error("Malformed navigation document: {reason}")]
    MalformedNavigationDocument { reason: String },

    /// The package document exists but can not be decoded
    #[error("Malformed package document: {reason}")]
    MalformedPackageDocument { reason: String },

    /// The requested metadata field is not declared by the package
    #[error("Metadata field not found: There is no \"{field}\" field in the metadata.")]
    MetadataFieldNotFound { field: String },

    /// The package declares a navigation document that is missing from the archive
    #[error("Navigation document not found: Unable to find \"{path}\" in the archive.")]
    NavigationNotFound { path: String },

    /// The package does not declare any navigation document
    #[error("Navigation unavailable: The package does not declare a navigation document.")]
    NavigationUnavailable,

    /// Non-canonical EPUB structure error
    ///
    /// This error occurs when an EPUB file lacks some files
    /// that the container format requires.
    #[error("Non-canonical epub: The \"{expected_file}\" file was not found.")]
    NonCanonicalEpub { expected_file: String },

    /// The container points to a package document that is missing from the archive
    #[error("Package document not found: Unable to find \"{path}\" in the archive.")]
    PackageNotFound { path: String },

    /// Relative link leak error
    ///
    /// This error occurs when a relative path link climbs above the root
    /// of the EPUB container.
    #[error("Relative link leakage: Path \"{path}\" is out of container range.")]
    RelativeLinkLeakage { path: String },

    /// Unable to find the resource id error
    ///
    /// This error occurs when trying to get a resource by id but that id doesn't exist in the manifest.
    #[error("Resource Id Not Exist: There is no resource item with id \"{id}\".")]
    ResourceIdNotExist { id: String },

    /// Unable to find the resource error
    ///
    /// This error occurs when an attempt is made to get a resource
    /// but it does not exist in the EPUB container.
    #[error("Resource not found: Unable to find resource from \"{resource}\".")]
    ResourceNotFound { resource: String },

    /// Unusable compression method error
    ///
    /// This error occurs when an EPUB file uses an unsupported compression method.
    #[error(
        "Unusable compression method: The \"{file}\" file uses the unsupported \"{method}\" compression method."
    )]
    UnusableCompressionMethod { file: String, method: String },

    /// UTF-8 decoding error
    #[error("Decode error: {source}")]
    Utf8DecodeError { source: std::string::FromUtf8Error },

    /// UTF-16 decoding error
    #[error("Decode error: {source}")]
    Utf16DecodeError { source: std::string::FromUtf16Error },

    /// QuickXml error
    ///
    /// This error occurs when parsing XML data using the QuickXml library.
    #[error("QuickXml error: {source}")]
    QuickXmlError { source: quick_xml::Error },
}

impl EpubError {
    /// Returns the category this error belongs to
    pub fn kind(&self) -> ErrorKind {
        match self {
            EpubError::NonCanonicalEpub { .. } | EpubError::UnusableCompressionMethod { .. } => {
                ErrorKind::Format
            }

            EpubError::ContainerNotFound
            | EpubError::MalformedContainer { .. }
            | EpubError::PackageNotFound { .. }
            | EpubError::MalformedPackageDocument { .. }
            | EpubError::NavigationNotFound { .. }
            | EpubError::MalformedNavigationDocument { .. }
            | EpubError::RelativeLinkLeakage { .. } => ErrorKind::Resolution,

            EpubError::DanglingSpineReference { .. }
            | EpubError::DanglingNavigationReference { .. } => ErrorKind::ReferentialIntegrity,

            EpubError::MetadataFieldNotFound { .. }
            | EpubError::ResourceIdNotExist { .. }
            | EpubError::ResourceNotFound { .. }
            | EpubError::NavigationUnavailable => ErrorKind::LookupMiss,

            EpubError::ArchiveError { .. }
            | EpubError::IOError { .. }
            | EpubError::EmptyDataError
            | EpubError::Utf8DecodeError { .. }
            | EpubError::Utf16DecodeError { .. }
            | EpubError::QuickXmlError { .. } => ErrorKind::Read,
        }
    }

    /// Returns `true` if this error only signals that something is not present
    pub fn is_lookup_miss(&self) -> bool {
        self.kind() == ErrorKind::LookupMiss
    }
}

impl From<zip::result::ZipError> for EpubError {
    fn from(value: zip::result::ZipError) -> Self {
        EpubError::ArchiveError { source: value }
    }
}

impl From<quick_xml::Error> for EpubError {
    fn from(value: quick_xml::Error) -> Self {
        EpubError::QuickXmlError { source: value }
    }
}

impl From<std::io::Error> for EpubError {
    fn from(value: std::io::Error) -> Self {
        EpubError::IOError { source: value }
    }
}

impl From<std::string::FromUtf8Error> for EpubError {
    fn from(value: std::string::FromUtf8Error) -> Self {
        EpubError::Utf8DecodeError { source: value }
    }
}

impl From<std::string::FromUtf16Error> for EpubError {
    fn from(value: std::string::FromUtf16Error) -> Self {
        EpubError::Utf16DecodeError { source: value }
    }
}

#[cfg(test)]
impl PartialEq for EpubError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::DanglingSpineReference { idref: l_idref },
                Self::DanglingSpineReference { idref: r_idref },
            ) => l_idref == r_idref,
            (
                Self::DanglingNavigationReference {
                    reference: l_reference,
                },
                Self::DanglingNavigationReference {
                    reference: r_reference,
                },
            ) => l_reference == r_reference,
            (
                Self::MetadataFieldNotFound { field: l_field },
                Self::MetadataFieldNotFound { field: r_field },
            ) => l_field == r_field,
            (
                Self::NavigationNotFound { path: l_path },
                Self::NavigationNotFound { path: r_path },
            ) => l_path == r_path,
            (
                Self::NonCanonicalEpub {
                    expected_file: l_expected_file,
                },
                Self::NonCanonicalEpub {
                    expected_file: r_expected_file,
                },
            ) => l_expected_file == r_expected_file,
            (Self::PackageNotFound { path: l_path }, Self::PackageNotFound { path: r_path }) => {
                l_path == r_path
            }
            (
                Self::RelativeLinkLeakage { path: l_path },
                Self::RelativeLinkLeakage { path: r_path },
            ) => l_path == r_path,
            (Self::ResourceIdNotExist { id: l_id }, Self::ResourceIdNotExist { id: r_id }) => {
                l_id == r_id
            }
            (
                Self::ResourceNotFound {
                    resource: l_resource,
                },
                Self::ResourceNotFound {
                    resource: r_resource,
                },
            ) => l_resource == r_resource,
            (
                Self::UnusableCompressionMethod {
                    file: l_file,
                    method: l_method,
                },
                Self::UnusableCompressionMethod {
                    file: r_file,
                    method: r_method,
                },
            ) => l_file == r_file && l_method == r_method,
            (
                Self::Utf8DecodeError { source: l_source },
                Self::Utf8DecodeError { source: r_source },
            ) => l_source == r_source,

            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}
