//! Filesystem primitives shared by the staging area and the configuration store.

use serde::Serialize;
use std::ffi::OsStr;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[cfg(unix)]
const CROSS_DEVICE_CODE: Option<i32> = Some(18); // EXDEV
#[cfg(windows)]
const CROSS_DEVICE_CODE: Option<i32> = Some(17); // ERROR_NOT_SAME_DEVICE
#[cfg(not(any(unix, windows)))]
const CROSS_DEVICE_CODE: Option<i32> = None;

/// True if something (file, directory or dangling symlink) occupies `path`
pub fn path_occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Serialize `value` as pretty JSON and atomically replace `path` with it.
///
/// Readers observe either the previous content or the new one, never a
/// half-written file.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> io::Result<()> {
    let content = serde_json::to_vec_pretty(value)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "descriptor".to_string());
    let tmp_path = path.with_file_name(format!(".{}.{}.tmp", file_name, std::process::id()));

    let written = (|| {
        let mut file = File::create(&tmp_path)?;
        file.write_all(&content)?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)
    })();

    if written.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    written
}

/// Pick a free name for `file_name` inside `dir`.
///
/// Returns `dir/file_name` if free, otherwise `dir/<stem>_<n><.ext>` with the
/// smallest `n >= 1` that is free.
pub fn unique_path_in(dir: &Path, file_name: &OsStr) -> PathBuf {
    let candidate = dir.join(file_name);
    if !path_occupied(&candidate) {
        return candidate;
    }

    let name = Path::new(file_name);
    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = name
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut counter = 1u32;
    loop {
        let candidate = dir.join(format!("{}_{}{}", stem, counter, extension));
        if !path_occupied(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// Move a file, falling back to copy-then-remove across volumes.
///
/// The destination must not exist. On the fallback path the copy is fsynced
/// before the source is removed, and if the source cannot be removed the copy
/// is discarded, so the bytes end up in exactly one place.
pub fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device(&e) => copy_then_remove(from, to),
        Err(e) => Err(e),
    }
}

fn is_cross_device(error: &io::Error) -> bool {
    CROSS_DEVICE_CODE.is_some() && error.raw_os_error() == CROSS_DEVICE_CODE
}

fn copy_then_remove(from: &Path, to: &Path) -> io::Result<()> {
    let metadata = fs::metadata(from)?;
    let mut source = File::open(from)?;
    // create_new: an existing target is never clobbered or cleaned up by us
    let mut target = OpenOptions::new().write(true).create_new(true).open(to)?;

    let copied = copy_contents(&mut source, &mut target, from, to, &metadata);
    drop(target);
    if let Err(e) = copied {
        let _ = fs::remove_file(to);
        return Err(e);
    }

    if let Err(e) = fs::remove_file(from) {
        let _ = fs::remove_file(to);
        return Err(e);
    }
    Ok(())
}

fn copy_contents(
    source: &mut File,
    target: &mut File,
    from: &Path,
    to: &Path,
    metadata: &fs::Metadata,
) -> io::Result<()> {
    let copied = io::copy(source, target)?;
    if copied != metadata.len() {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!(
                "short copy of {}: {} of {} bytes",
                from.display(),
                copied,
                metadata.len()
            ),
        ));
    }

    target.sync_all()?;
    if let Ok(modified) = metadata.modified() {
        target.set_modified(modified)?;
    }
    fs::set_permissions(to, metadata.permissions())?;
    Ok(())
}

// -- Tests --
