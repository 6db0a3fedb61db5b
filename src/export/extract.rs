//! Extract resources from an archive into standalone files.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::MhtmlError;
use crate::model::archive::Archive;
use crate::model::resource::ResourceView;

use super::filename::{make_filename, make_uniq_filename, FilenameOptions};

/// Options for [`extract_all`].
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Decode the transfer encoding before writing.
    pub decode: bool,
    pub filename: FilenameOptions,
    /// Inserted before the counter of renamed duplicates.
    pub dup_prefix: String,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            decode: false,
            filename: FilenameOptions::default(),
            dup_prefix: "dup_".to_string(),
        }
    }
}

/// Bytes to write for a resource, falling back to the raw body when
/// decoding is not possible.
fn output_bytes<'a>(resource: &ResourceView<'a>, decode: bool) -> Option<Cow<'a, [u8]>> {
    if decode {
        if let Some(decoded) = resource.get_content(true) {
            return Some(decoded);
        }
        debug!(location = ?resource.location(), "Writing raw content instead");
    }
    resource.content().map(Cow::Borrowed)
}

/// Write every resource into `output_dir`, creating it if needed.
///
/// Names come from [`make_filename`]; existing files are never overwritten.
/// The progress callback receives `(current, total)`.
pub fn extract_all(
    archive: &Archive,
    output_dir: &Path,
    options: &ExtractOptions,
    progress: &dyn Fn(usize, usize),
) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir).map_err(|e| MhtmlError::io(output_dir, e))?;
    let total = archive.resource_count();
    let mut paths = Vec::with_capacity(total);

    for (i, resource) in archive.resources().enumerate() {
        progress(i, total);

        let Some(bytes) = output_bytes(&resource, options.decode) else {
            warn!(index = i, "Resource offsets outside archive, skipped");
            continue;
        };
        let name = make_filename(Some(resource.header()), Some(output_dir), &options.filename);
        let path = make_uniq_filename(&name, &options.dup_prefix);

        debug!(index = i, size = bytes.len(), path = %path.display(), "Writing resource");
        std::fs::write(&path, &bytes).map_err(|e| MhtmlError::io(&path, e))?;
        paths.push(path);
    }
    progress(total, total);

    info!(count = paths.len(), dir = %output_dir.display(), "Extracted resources");
    Ok(paths)
}

/// The resource holding the page the archive was saved from.
pub fn find_main_resource(archive: &Archive) -> Option<ResourceView<'_>> {
    let location = archive.location()?;
    archive.resources().find(|r| r.location() == Some(location))
}

/// Default output path of [`extract_main`]: the input with an `.html` extension.
pub fn default_main_output(input: &Path) -> PathBuf {
    input.with_extension("html")
}

/// Write the main page to `output`. Returns the number of bytes written.
pub fn extract_main(archive: &Archive, output: &Path, decode: bool) -> anyhow::Result<usize> {
    let Some(main) = find_main_resource(archive) else {
        anyhow::bail!(
            "no resource matches the archive location {:?}",
            archive.location().unwrap_or_default()
        );
    };
    let Some(bytes) = output_bytes(&main, decode) else {
        anyhow::bail!("main resource lies outside the archive buffer");
    };

    std::fs::write(output, &bytes).map_err(|e| MhtmlError::io(output, e))?;
    info!(size = bytes.len(), path = %output.display(), "Extracted main page");
    Ok(bytes.len())
}
