//! Container resolution
//!
//! Reads `META-INF/container.xml` and extracts the archive path of the
//! package document, from which the root path of the publication is derived.

use std::io::{Read, Seek};

use log::{debug, warn};

use crate::{
    archive::EpubArchive,
    error::EpubError,
    utils::{DecodeBytes, XmlReader, parent_dir},
};

/// The fixed location of the container file
pub const CONTAINER_PATH: &str = "META-INF/container.xml";

/// Locates the package document of an archive
///
/// # Return
/// - `Ok(String)`: The archive path of the package document
/// - `Err(EpubError::ContainerNotFound)`: The container file is absent
/// - `Err(EpubError::MalformedContainer)`: The container file can not be decoded
///   or does not name a package document
pub fn resolve_package_path<R: Read + Seek>(
    archive: &mut EpubArchive<R>,
) -> Result<String, EpubError> {
    let data = match archive.read(CONTAINER_PATH) {
        Ok(data) => data,
        Err(EpubError::ResourceNotFound { .. }) => return Err(EpubError::ContainerNotFound),
        Err(err) => return Err(err),
    };

    let content = data.decode().map_err(|err| EpubError::MalformedContainer {
        reason: err.to_string(),
    })?;

    let package_path = parse_container(&content)?;
    debug!("Package document located at \"{}\"", package_path);
    Ok(package_path)
}

/// Parses the content of the container file
///
/// Only the first `rootfile` element is used. A container listing more than
/// one root file is accepted and the others are ignored.
pub fn parse_container(content: &str) -> Result<String, EpubError> {
    let root = XmlReader::parse(content).map_err(|err| EpubError::MalformedContainer {
        reason: err.to_string(),
    })?;

    let mut rootfiles = root.find_elements_by_name("rootfile");
    let rootfile = rootfiles
        .next()
        .ok_or_else(|| EpubError::MalformedContainer {
            reason: "the \"rootfile\" element was not found".to_string(),
        })?;

    let ignored = rootfiles.count();
    if ignored > 0 {
        warn!(
            "The container declares {} additional root files, only the first one is used.",
            ignored
        );
    }

    let full_path = rootfile
        .get_attr("full-path")
        .map(|path| path.trim().to_string())
        .filter(|path| !path.is_empty())
        .ok_or_else(|| EpubError::MalformedContainer {
            reason: "the \"full-path\" attribute of \"rootfile\" is missing or empty".to_string(),
        })?;

    Ok(full_path.trim_start_matches('/').to_string())
}

/// The directory containing the package document, with a trailing slash,
/// or the empty string when the package document sits at the archive root
pub fn root_path(package_path: &str) -> String {
    parent_dir(package_path)
}
