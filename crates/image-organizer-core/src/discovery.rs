use chrono::{DateTime, Utc};
use log::{info, warn};
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::checksum::compute_checksum;
use crate::error::{Error, Result};
use crate::logging::log_hash_error;
use crate::types::{FileRecord, ImageFormat};

/// Options for collecting local image files
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Descend into subdirectories
    pub recursive: bool,

    /// Skip files and folders whose name starts with a dot
    pub skip_hidden: bool,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            recursive: true,
            skip_hidden: true,
        }
    }
}

/// Find image files under `directories`, deduplicated, in discovery order
pub fn discover_images<P: AsRef<Path>>(
    directories: &[P],
    options: &DiscoveryOptions,
) -> Result<Vec<PathBuf>> {
    let mut seen = HashSet::new();
    let mut images = Vec::new();

    for directory in directories {
        for path in discover_images_in_directory(directory.as_ref(), options)? {
            if seen.insert(path.clone()) {
                images.push(path);
            }
        }
    }

    Ok(images)
}

/// Find image files in a single directory
fn discover_images_in_directory(directory: &Path, options: &DiscoveryOptions) -> Result<Vec<PathBuf>> {
    if !directory.is_dir() {
        return Err(Error::FileNotFound(directory.to_path_buf()));
    }

    let max_depth = if options.recursive { usize::MAX } else { 1 };
    let mut images = Vec::new();

    let walker = WalkDir::new(directory)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !(options.skip_hidden && is_hidden(e)));

    for entry in walker.filter_map(|e| e.ok()) {
        if entry.file_type().is_file() && is_image_path(entry.path()) {
            images.push(entry.into_path());
        }
    }

    Ok(images)
}

/// Build local file records for `paths`, computing checksums in parallel.
///
/// Files that cannot be read are logged and left out.
pub fn collect_local_records(paths: &[PathBuf]) -> Vec<FileRecord> {
    let records: Vec<FileRecord> = paths
        .par_iter()
        .filter_map(|path| match local_record(path) {
            Ok(record) => Some(record),
            Err(e) => {
                log_hash_error(path, &e);
                None
            }
        })
        .collect();

    if records.len() < paths.len() {
        warn!(
            "Could not read {} of {} local files",
            paths.len() - records.len(),
            paths.len()
        );
    }
    info!("Collected {} local records", records.len());
    records
}

fn local_record(path: &Path) -> Result<FileRecord> {
    let metadata = std::fs::metadata(path)?;
    let checksum = compute_checksum(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut record = FileRecord::local(
        path.to_string_lossy().into_owned(),
        name,
        metadata.len(),
        checksum,
    );
    if let Ok(modified) = metadata.modified() {
        record = record.with_modified_at(DateTime::<Utc>::from(modified));
    }
    Ok(record)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

/// Returns if the given path has a supported image extension
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ImageFormat::from_extension(ext).is_supported())
        .unwrap_or(false)
}

// -- Tests --
