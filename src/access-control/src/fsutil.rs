//! Directory scanning and YAML decoding shared by the loader and validator

use crate::error::{LoadError, Result};
use serde::de::DeserializeOwned;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Read a file, mapping a missing path to `LoadError::NotFound`
pub fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| io_error(path, source))
}

/// Decode a YAML file into `T`
pub fn yaml_unmarshal<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data = read_file(path)?;
    serde_yaml::from_slice(&data).map_err(|source| LoadError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

/// Decode a YAML file into a JSON value, for schema validation
pub fn yaml_to_json(path: &Path) -> Result<serde_json::Value> {
    yaml_unmarshal(path)
}

/// Sorted paths of the sub-directories of `dir`
pub fn read_dir_names(dir: &Path) -> Result<Vec<PathBuf>> {
    read_names(dir, |file_type| file_type.is_dir())
}

/// Sorted paths of the regular files in `dir`
pub fn read_file_names(dir: &Path) -> Result<Vec<PathBuf>> {
    read_names(dir, |file_type| !file_type.is_dir())
}

fn read_names<F>(dir: &Path, keep: F) -> Result<Vec<PathBuf>>
where
    F: Fn(&std::fs::FileType) -> bool,
{
    let entries = std::fs::read_dir(dir).map_err(|source| io_error(dir, source))?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| io_error(dir, source))?;
        let file_type = entry.file_type().map_err(|source| io_error(&entry.path(), source))?;
        if keep(&file_type) {
            names.push(entry.path());
        }
    }

    // Scan order is otherwise platform-defined
    names.sort();
    Ok(names)
}

fn io_error(path: &Path, source: std::io::Error) -> LoadError {
    if source.kind() == ErrorKind::NotFound {
        LoadError::NotFound(path.to_path_buf())
    } else {
        LoadError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
