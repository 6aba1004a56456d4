//! Hash-gated atomic writer.
//!
//! ## `render_and_save` — 5-step protocol
//!
//! 1. Ensure the target file's directory exists.
//! 2. SHA-256 hash the current file (absent file → no hash).
//! 3. Render the template and write it to `<path>.confd.tmp`.
//! 4. Rename over the final path (atomic on POSIX).
//! 5. Hash the new file; report whether the digest moved.
//!
//! Any failure at step 3 or 4 removes the `.tmp` sibling and leaves the
//! previous target content untouched.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use confd_core::address;
use confd_renderer::{DataSnapshot, RenderError, TemplateStore};

use crate::error::{io_err, SyncError};

/// Suffix appended to the target path for the in-flight temp file.
pub const TMP_SUFFIX: &str = ".confd.tmp";

/// Path of the file rendered for `address` inside `target_dir`.
pub fn target_path(target_dir: &Path, address: &str) -> PathBuf {
    let (_, key) = address::split(address);
    target_dir.join(key)
}

/// Render `address` into `target_dir/<key>` and report whether content changed.
pub fn render_and_save(
    templates: &TemplateStore,
    data: &DataSnapshot,
    address: &str,
    target_dir: &Path,
) -> Result<bool, SyncError> {
    let path = target_path(target_dir, address);
    write_rendered(&path, || templates.render(address, data))
}

/// SHA-256 hex digest of the file at `path`, or `None` if it does not exist.
pub fn file_digest(path: &Path) -> Result<Option<String>, SyncError> {
    match std::fs::read(path) {
        Ok(bytes) => {
            let mut h = Sha256::new();
            h.update(&bytes);
            Ok(Some(hex::encode(h.finalize())))
        }
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(io_err(path, err)),
    }
}

pub(crate) fn write_rendered<F>(path: &Path, render: F) -> Result<bool, SyncError>
where
    F: FnOnce() -> Result<String, RenderError>,
{
    let tmp = PathBuf::from(format!("{}{TMP_SUFFIX}", path.display()));
    write_rendered_with_tmp(path, &tmp, render)
}

fn write_rendered_with_tmp<F>(path: &Path, tmp: &Path, render: F) -> Result<bool, SyncError>
where
    F: FnOnce() -> Result<String, RenderError>,
{
    // Step 1: ensure the directory exists.
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| SyncError::Directory {
            path: dir.to_path_buf(),
            source: e,
        })?;
    }

    // Step 2: hash what is currently on disk.
    let before = file_digest(path)?;

    // Step 3: render, then write to .tmp.
    let content = render()?;
    if let Err(e) = std::fs::write(tmp, content.as_bytes()) {
        let _ = std::fs::remove_file(tmp);
        return Err(io_err(tmp, e));
    }

    // Step 4: atomic rename to final path.
    if let Err(e) = std::fs::rename(tmp, path) {
        let _ = std::fs::remove_file(tmp);
        return Err(io_err(path, e));
    }

    // Step 5: compare digests.
    let after = file_digest(path)?;
    let changed = before != after;
    tracing::debug!(path = %path.display(), changed, "rendered file");
    Ok(changed)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
