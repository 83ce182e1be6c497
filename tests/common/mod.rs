#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use synth_reconcile::{Column, ColumnType, Table, Value};
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
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

/// Reference sessions: one categorical label column, a string session id,
/// an integer and a float measurement.
pub fn reference_sessions() -> Table {
    Table::new(vec![
        Column::strings("acctsessionid", ["s-001", "s-002", "s-003"]),
        Column::strings("device", ["android", "ios", "web"]),
        Column::integers("age", [18, 25, 99]),
        Column::floats("duration", [0.5, 12.25, 3.0]),
    ])
    .expect("reference table")
}

pub fn float_column(name: &str, values: &[Option<f64>]) -> Column {
    Column::new(
        name,
        ColumnType::Float,
        values.iter().map(|v| v.map(Value::Float)).collect(),
    )
}

pub fn strings(column: &Column) -> Vec<Option<String>> {
    column
        .values
        .iter()
        .map(|cell| cell.as_ref().map(Value::as_display))
        .collect()
}
