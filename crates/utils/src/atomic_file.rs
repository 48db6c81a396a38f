//! Atomic file operations to prevent corrupted cache files
//!
//! A write is split into two steps: stage the bytes into a hidden temporary
//! file next to the target, then rename it over the target. A process that
//! dies between the two leaves only a stray `.tmp` file behind; the target
//! path holds either the previous content or nothing.

use ncli_core::{Error, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Suffix of staged temporary files
pub const TEMP_SUFFIX: &str = ".tmp";

/// True for files produced by [`stage_temp`] / [`stage_temp_async`]
pub fn is_temp_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.') && name.ends_with(TEMP_SUFFIX))
}

fn temp_path_for(path: &Path) -> Result<PathBuf> {
    let parent = path
        .parent()
        .ok_or_else(|| Error::configuration("Invalid file path: no parent directory"))?;
    Ok(parent.join(format!(".{}{TEMP_SUFFIX}", Uuid::new_v4())))
}

/// Write `content` to a fresh temporary file beside `path` and return its location
pub fn stage_temp(path: &Path, content: &[u8]) -> Result<PathBuf> {
    let temp_path = temp_path_for(path)?;
    if let Some(parent) = temp_path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| Error::file_system(parent, "create parent directory", e))?;
    }

    let result = (|| -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|e| Error::file_system(&temp_path, "create temporary file", e))?;

        file.write_all(content)
            .map_err(|e| Error::file_system(&temp_path, "write to temporary file", e))?;

        file.sync_all()
            .map_err(|e| Error::file_system(&temp_path, "sync temporary file", e))
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }
    Ok(temp_path)
}

/// Write data to a file atomically by writing to a temporary file and renaming
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let temp_path = stage_temp(path, content)?;
    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        Error::file_system(path, "atomic rename", e)
    })
}

/// Async counterpart of [`stage_temp`]
pub async fn stage_temp_async(path: &Path, content: &[u8]) -> Result<PathBuf> {
    use tokio::io::AsyncWriteExt;

    let temp_path = temp_path_for(path)?;
    if let Some(parent) = temp_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::file_system(parent, "create parent directory", e))?;
    }

    let mut file = match tokio::fs::File::create(&temp_path).await {
        Ok(file) => file,
        Err(e) => return Err(Error::file_system(&temp_path, "create temporary file", e)),
    };

    let written = match file.write_all(content).await {
        Ok(()) => file.sync_all().await,
        Err(e) => Err(e),
    };
    if let Err(e) = written {
        drop(file);
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(Error::file_system(&temp_path, "write to temporary file", e));
    }

    Ok(temp_path)
}

/// Async counterpart of [`write_atomic`]
pub async fn write_atomic_async(path: &Path, content: &[u8]) -> Result<()> {
    let temp_path = stage_temp_async(path, content).await?;
    match tokio::fs::rename(&temp_path, path).await {
        Ok(()) => Ok(()),
        Err(e) => {
            let _ = tokio::fs::remove_file(&temp_path).await;
            Err(Error::file_system(path, "atomic rename", e))
        }
    }
}
