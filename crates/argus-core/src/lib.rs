//! Foundational utilities shared across the argus crates.
//!
//! Keeps the lowest-level concerns in one place: atomic state-file writes and
//! Unix-time helpers. Everything here is synchronous and dependency-light so
//! the higher crates can lean on it from both async tasks and plain tests.

pub mod atomic_io;
pub mod time_utils;

pub use atomic_io::{write_json_atomic, write_text_atomic};
pub use time_utils::{current_unix_timestamp, current_unix_timestamp_ms};

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn unit_current_unix_timestamp_is_after_2024() {
        let seconds = current_unix_timestamp();
        assert!(seconds > 1_704_067_200, "unexpected timestamp: {seconds}");
    }

    #[test]
    fn unit_timestamp_ms_tracks_timestamp_seconds() {
        let seconds = current_unix_timestamp();
        let millis = current_unix_timestamp_ms();
        let diff = (millis / 1000).abs_diff(seconds);
        assert!(diff <= 1, "seconds={seconds} millis={millis}");
    }

    #[test]
    fn unit_write_text_atomic_writes_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.txt");

        write_text_atomic(&path, "hello").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello");
    }

    #[test]
    fn unit_write_text_atomic_creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/state/roster.json");

        write_text_atomic(&path, "[]").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");
    }

    #[test]
    fn unit_write_text_atomic_rejects_directory_destination() {
        let dir = tempfile::tempdir().unwrap();

        let error = write_text_atomic(dir.path(), "oops").unwrap_err();

        assert!(error.to_string().contains("is a directory"));
    }

    #[test]
    fn unit_write_text_atomic_replaces_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.json");

        write_text_atomic(&path, "[1]").unwrap();
        write_text_atomic(&path, "[1,2]").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[1,2]");
    }

    #[test]
    fn unit_write_text_atomic_leaves_no_temp_files_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.json");

        write_text_atomic(&path, "[]").unwrap();

        let names = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["roster.json".to_string()]);
    }

    #[test]
    fn unit_write_json_atomic_emits_pretty_json_with_trailing_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        let mut index = BTreeMap::new();
        index.insert("777".to_string(), 555_u64);

        write_json_atomic(&path, &index).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.ends_with('\n'), "missing trailing newline: {raw:?}");
        assert!(raw.contains("\"777\": 555"), "unexpected layout: {raw}");
        let reloaded: BTreeMap<String, u64> = serde_json::from_str(&raw).unwrap();
        assert_eq!(reloaded, index);
    }
}
