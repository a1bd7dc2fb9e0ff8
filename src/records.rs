//! Capped append-only log for serialized car records.
//!
//! This is the data collaborator, not diagnostics: the bridge appends one
//! JSON record per exited car, and the file is kept from growing without
//! bound by trimming the oldest lines once the cap is exceeded.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_LINES: usize = 20_000;

#[derive(Debug, Clone)]
pub struct RecordLog {
    path: PathBuf,
    max_lines: usize,
}

impl RecordLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_lines: DEFAULT_MAX_LINES,
        }
    }

    pub fn with_max_lines(path: impl Into<PathBuf>, max_lines: usize) -> Self {
        Self {
            path: path.into(),
            max_lines,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(record.as_bytes())?;
        file.write_all(b"\n")?;
        drop(file);
        self.enforce_cap()
    }

    fn enforce_cap(&self) -> io::Result<()> {
        let contents = fs::read_to_string(&self.path)?;
        let lines: Vec<&str> = contents.lines().collect();
        if lines.len() <= self.max_lines {
            return Ok(());
        }
        let mut trimmed = lines[lines.len() - self.max_lines..].join("\n");
        if !trimmed.is_empty() {
            trimmed.push('\n');
        }
        fs::write(&self.path, trimmed)
    }
}
