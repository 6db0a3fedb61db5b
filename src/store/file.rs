//! Whole-file load and save of MHTML archives.

use std::path::Path;

use tracing::{debug, info};

use crate::error::{MhtmlError, Result};
use crate::model::archive::Archive;
use crate::parser::mhtml::parse_archive;

/// Read and parse an archive file.
///
/// With `only_header` the parts are not scanned.
pub fn load_archive(path: impl AsRef<Path>, only_header: bool) -> Result<Archive> {
    let path = path.as_ref();
    let content = std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => MhtmlError::FileNotFound(path.to_path_buf()),
        _ => MhtmlError::io(path, e),
    })?;
    debug!(path = %path.display(), size = content.len(), "Read archive");

    let archive = parse_archive(content, only_header)?;
    info!(
        path = %path.display(),
        resources = archive.resource_count(),
        "Loaded archive"
    );
    Ok(archive)
}

/// Write the archive bytes to `path`, replacing any existing file.
pub fn save_archive(archive: &Archive, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    std::fs::write(path, archive.content()).map_err(|e| MhtmlError::io(path, e))?;
    debug!(path = %path.display(), size = archive.content().len(), "Wrote archive");
    Ok(())
}
