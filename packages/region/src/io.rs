//! File reads, writes, and the staged output directory.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::RegionError;
use crate::round::round_numbers;

pub(crate) fn io_error(path: &Path, source: std::io::Error) -> RegionError {
    RegionError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Reads and deserializes a JSON file.
///
/// # Errors
///
/// Returns [`RegionError::MissingInput`] if the file does not exist,
/// [`RegionError::Io`] if it cannot be read, or [`RegionError::Json`] if it
/// does not parse as `T`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, RegionError> {
    let file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            RegionError::MissingInput {
                path: path.display().to_string(),
            }
        } else {
            io_error(path, e)
        }
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| RegionError::Json {
        path: path.display().to_string(),
        source,
    })
}

/// Serializes `data` as compact JSON, rounding non-integer numbers to
/// `decimals` places when set.
///
/// # Errors
///
/// Returns [`RegionError::Json`] if serialization fails or
/// [`RegionError::Io`] if the file cannot be written.
pub fn write_json<T: Serialize>(
    path: &Path,
    data: &T,
    decimals: Option<u32>,
) -> Result<(), RegionError> {
    let json_error = |source| RegionError::Json {
        path: path.display().to_string(),
        source,
    };

    let mut value: Value = serde_json::to_value(data).map_err(json_error)?;
    if let Some(decimals) = decimals {
        round_numbers(&mut value, decimals);
    }

    let file = File::create(path).map_err(|e| io_error(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, &value).map_err(json_error)?;
    writer.flush().map_err(|e| io_error(path, e))
}

/// A `<code>.tmp` directory that replaces `<code>` once every artifact
/// has been written.
#[derive(Debug)]
pub struct StagedDir {
    staging: PathBuf,
    target: PathBuf,
}

impl StagedDir {
    /// Creates an empty staging directory next to `target`, clearing any
    /// leftover from an earlier failed run.
    ///
    /// # Errors
    ///
    /// Returns [`RegionError::Io`] if the directory cannot be created.
    pub fn create(target: &Path) -> Result<Self, RegionError> {
        let mut name = target.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        let staging = target.with_file_name(name);

        if staging.exists() {
            std::fs::remove_dir_all(&staging).map_err(|e| io_error(&staging, e))?;
        }
        std::fs::create_dir_all(&staging).map_err(|e| io_error(&staging, e))?;

        Ok(Self {
            staging,
            target: target.to_path_buf(),
        })
    }

    /// Path of `file` inside the staging directory.
    #[must_use]
    pub fn path(&self, file: &str) -> PathBuf {
        self.staging.join(file)
    }

    /// Replaces the target directory with the staged one.
    ///
    /// # Errors
    ///
    /// Returns [`RegionError::Io`] if the old directory cannot be removed
    /// or the rename fails.
    pub fn commit(self) -> Result<PathBuf, RegionError> {
        if self.target.exists() {
            log::debug!("Removing previous output at {}", self.target.display());
            std::fs::remove_dir_all(&self.target).map_err(|e| io_error(&self.target, e))?;
        }
        std::fs::rename(&self.staging, &self.target).map_err(|e| io_error(&self.target, e))?;
        Ok(self.target)
    }

    /// Removes the staging directory, leaving the target untouched.
    pub fn discard(self) {
        if let Err(e) = std::fs::remove_dir_all(&self.staging) {
            log::warn!(
                "Failed to remove staging directory {}: {e}",
                self.staging.display()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_replaces_previous_output() {
        let tmp = std::env::temp_dir().join("transit_demand_staged_commit");
        let _ = std::fs::remove_dir_all(&tmp);
        let target = tmp.join("LJU");
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join("stale.json"), "{}").unwrap();

        let staged = StagedDir::create(&target).unwrap();
        assert!(tmp.join("LJU.tmp").is_dir());
        write_json(&staged.path("fresh.json"), &serde_json::json!({ "x": 1.23456 }), Some(2))
            .unwrap();
        staged.commit().unwrap();

        assert!(!target.join("stale.json").exists());
        assert!(!tmp.join("LJU.tmp").exists());
        let written = std::fs::read_to_string(target.join("fresh.json")).unwrap();
        assert_eq!(written, r#"{"x":1.23}"#);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn discard_keeps_previous_output() {
        let tmp = std::env::temp_dir().join("transit_demand_staged_discard");
        let _ = std::fs::remove_dir_all(&tmp);
        let target = tmp.join("ZAG");
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join("demand_data.json"), "{}").unwrap();

        let staged = StagedDir::create(&target).unwrap();
        staged.discard();

        assert!(target.join("demand_data.json").exists());
        assert!(!tmp.join("ZAG.tmp").exists());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_file_is_reported_as_missing_input() {
        let path = std::env::temp_dir().join("transit_demand_no_such_file.json");
        let result: Result<Value, _> = read_json(&path);
        assert!(matches!(result, Err(RegionError::MissingInput { .. })));
    }
}
