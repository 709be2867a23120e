//! JSON snapshot files for store persistence

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

use hyperion_core::StoreError;

/// Read a snapshot; `Ok(None)` when the file does not exist yet
pub(crate) async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| StoreError::Serialization(format!("{}: {}", path.display(), e)))
}

/// Write a snapshot so a reader sees either the old file or the new one
pub(crate) async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec(value).map_err(|e| StoreError::Serialization(e.to_string()))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let tmp = temp_path(path);
    tokio::fs::write(&tmp, &bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let read: Option<Vec<u32>> = read_json(&dir.path().join("absent.json")).await.unwrap();
        assert!(read.is_none());
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("snap.json");

        write_json_atomic(&path, &vec![1u32, 2, 3]).await.unwrap();
        let read: Option<Vec<u32>> = read_json(&path).await.unwrap();
        assert_eq!(read, Some(vec![1, 2, 3]));
        assert!(!temp_path(&path).exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let read: Result<Option<Vec<u32>>, _> = read_json(&path).await;
        assert!(matches!(read, Err(StoreError::Serialization(_))));
    }
}
