//! Crash-safe file writes for tracker state documents.
//!
//! State is written to a temporary sibling first and then renamed over the
//! destination, so a reader (or a restart after a crash mid-write) only ever
//! observes either the previous complete document or the new one.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Serialize;

use crate::time_utils::current_unix_timestamp;

/// Writes `content` to `path` atomically via a temp-file-then-rename step.
///
/// Creates missing parent directories. The temporary file lives in the same
/// directory as the destination so the final rename stays on one filesystem.
pub fn write_text_atomic(path: &Path, content: &str) -> Result<()> {
    if path.as_os_str().is_empty() {
        bail!("atomic write requires a non-empty destination path");
    }
    if path.is_dir() {
        bail!(
            "atomic write destination '{}' is a directory",
            path.display()
        );
    }

    let (parent_dir, temp_path) = temp_sibling_path(path);
    std::fs::create_dir_all(&parent_dir)
        .with_context(|| format!("failed to create state directory {}", parent_dir.display()))?;
    std::fs::write(&temp_path, content)
        .with_context(|| format!("failed to write temporary file {}", temp_path.display()))?;
    std::fs::rename(&temp_path, path).with_context(|| {
        format!(
            "failed to move {} into place at {}",
            temp_path.display(),
            path.display()
        )
    })?;
    Ok(())
}

/// Serializes `value` as pretty-printed JSON with a trailing newline and
/// writes it atomically.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut payload = serde_json::to_string_pretty(value)
        .with_context(|| format!("failed to serialize state for {}", path.display()))?;
    payload.push('\n');
    write_text_atomic(path, &payload)
}

fn temp_sibling_path(path: &Path) -> (PathBuf, PathBuf) {
    let parent_dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("argus-state");
    let temp_name = format!(
        ".{}.tmp-{}-{}",
        file_name,
        std::process::id(),
        current_unix_timestamp()
    );
    let temp_path = parent_dir.join(temp_name);
    (parent_dir, temp_path)
}
