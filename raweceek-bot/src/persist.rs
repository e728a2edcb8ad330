//! Whole-file JSON persistence for the cache and state files.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;

use crate::{Error, Result};

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("data"));
    name.push(suffix);
    path.with_file_name(name)
}

/// Where a half-written file lives until it replaces `path`.
pub(crate) fn temp_path(path: &Path) -> PathBuf {
    sibling(path, ".tmp")
}

/// Where an unreadable file is moved so a fresh one can take its place.
pub(crate) fn corrupt_path(path: &Path) -> PathBuf {
    sibling(path, ".corrupt")
}

/// `None` when the file does not exist yet.
pub(crate) async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let raw = match fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(Error::File {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| Error::Json {
            path: path.to_path_buf(),
            source,
        })
}

/// Writes next to `path` and renames over it, so readers only ever see the
/// old or the new contents.
pub(crate) async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let temp = temp_path(path);
    fs::write(&temp, json).await.map_err(|source| Error::File {
        path: temp.clone(),
        source,
    })?;
    fs::rename(&temp, path).await.map_err(|source| Error::File {
        path: path.to_path_buf(),
        source,
    })
}

/// Moves an unreadable file out of the way and returns where it went.
pub(crate) async fn set_aside(path: &Path) -> Result<PathBuf> {
    let aside = corrupt_path(path);
    fs::rename(path, &aside).await.map_err(|source| Error::File {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(aside)
}
