//! Merge the resources of several archives into one.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{MhtmlError, Result};
use crate::model::archive::Archive;
use crate::store::file::{load_archive, save_archive};

/// Statistics returned by a merge operation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MergeStats {
    pub input_files: usize,
    pub resources_before: usize,
    pub resources_added: usize,
    pub duplicates_skipped: usize,
    pub size_before: u64,
    pub output_size: u64,
}

/// Append the resources of `others` to `base`, skipping any whose location
/// is already present.
///
/// Resources without a location count as one shared location, so only the
/// first of them is ever kept.
pub fn merge_archives(base: &mut Archive, others: &[Archive]) -> Result<MergeStats> {
    if base.boundary().is_none() {
        return Err(MhtmlError::InvalidArchive(
            "merge target has no boundary".into(),
        ));
    }

    let mut known: HashSet<Option<String>> = base
        .resources()
        .map(|r| r.location().map(str::to_owned))
        .collect();
    let mut stats = MergeStats {
        input_files: others.len() + 1,
        resources_before: base.resource_count(),
        size_before: base.content().len() as u64,
        ..MergeStats::default()
    };

    for other in others {
        for resource in other.resources() {
            let location = resource.location().map(str::to_owned);
            if known.contains(&location) {
                debug!(location = ?location, "Known resource location");
                stats.duplicates_skipped += 1;
                continue;
            }
            if base.append_resource(&resource) {
                stats.resources_added += 1;
                known.insert(location);
            }
        }
    }

    stats.output_size = base.content().len() as u64;
    info!(
        added = stats.resources_added,
        skipped = stats.duplicates_skipped,
        size = stats.output_size,
        "Merged archives"
    );
    Ok(stats)
}

/// Load `inputs`, merge them into the first one and write the result.
///
/// The progress callback receives `(current_file, total_files, filename)`.
pub fn merge_files(
    inputs: &[PathBuf],
    output: &Path,
    progress: &dyn Fn(usize, usize, &str),
) -> anyhow::Result<MergeStats> {
    if inputs.len() < 2 {
        anyhow::bail!("at least two input archives are required, got {}", inputs.len());
    }

    let total = inputs.len();
    let mut archives = Vec::with_capacity(total);
    for (i, input) in inputs.iter().enumerate() {
        let filename = input
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| input.to_string_lossy().to_string());
        progress(i, total, &filename);
        archives.push(load_archive(input, false)?);
    }
    progress(total, total, "");

    let mut base = archives.remove(0);
    let stats = merge_archives(&mut base, &archives)?;
    save_archive(&base, output)?;
    Ok(stats)
}
