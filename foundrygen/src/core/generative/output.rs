//! Output Delivery

use std::path::{Path, PathBuf};
use tracing::info;

use crate::core::CoreResult;

/// Result of a media operation: raw bytes, or the file they were written to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaOutput {
    Bytes(Vec<u8>),
    Saved(PathBuf),
}

impl MediaOutput {
    /// Writes `bytes` to `output` when given (creating parent directories),
    /// otherwise hands the bytes back.
    pub async fn deliver(bytes: Vec<u8>, output: Option<&Path>) -> CoreResult<Self> {
        let Some(path) = output else {
            return Ok(MediaOutput::Bytes(bytes));
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, &bytes).await?;
        info!("Saved {} bytes to {}", bytes.len(), path.display());

        Ok(MediaOutput::Saved(path.to_path_buf()))
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            MediaOutput::Bytes(bytes) => Some(bytes),
            MediaOutput::Saved(_) => None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            MediaOutput::Bytes(_) => None,
            MediaOutput::Saved(path) => Some(path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_returns_bytes_without_path() {
        let output = MediaOutput::deliver(vec![1, 2, 3], None).await.unwrap();
        assert_eq!(output.as_bytes(), Some(&[1u8, 2, 3][..]));
        assert!(output.path().is_none());
    }

    #[tokio::test]
    async fn test_writes_file_and_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("out").join("clip.mp4");

        let output = MediaOutput::deliver(b"VIDEO".to_vec(), Some(&path))
            .await
            .unwrap();

        assert_eq!(output, MediaOutput::Saved(path.clone()));
        assert_eq!(std::fs::read(&path).unwrap(), b"VIDEO");
    }
}
