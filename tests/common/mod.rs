#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use report_normalizer::{data::RawRecord, io_utils};
use serde_json::Value as JsonValue;
use tempfile::{TempDir, tempdir};

/// Returns the absolute path to a fixture under `tests/data`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// Loads the JSON fixture used by most integration tests.
pub fn dq_fixture() -> Vec<RawRecord> {
    let file = File::open(fixture_path("dq_combined.json")).expect("open fixture");
    io_utils::read_json_records(file).expect("parse fixture")
}

/// Converts `json!` literals into raw records.
pub fn records(values: Vec<JsonValue>) -> Vec<RawRecord> {
    values
        .into_iter()
        .map(|value| value.as_object().cloned().expect("object literal"))
        .collect()
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}
