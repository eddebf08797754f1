//! Storage for completion photos.
//!
//! Photos live outside the database; a completion row only keeps the id
//! returned by [`PhotoStore::save`].

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Local;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

const MAX_NAME_LEN: usize = 100;
const SAVE_ATTEMPTS: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum PhotoError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid photo name: {0:?}")]
    InvalidName(String),

    #[error("photo is empty")]
    Empty,
}

#[async_trait]
pub trait PhotoStore: Send + Sync {
    /// Persists `bytes` and returns the id to store with the completion.
    async fn save(&self, bytes: &[u8], suggested_name: &str) -> Result<String, PhotoError>;

    /// Returns the photo, or `None` when no photo has that id.
    async fn read(&self, id: &str) -> Result<Option<Vec<u8>>, PhotoError>;

    /// Removes a photo. Missing photos are not an error.
    async fn remove(&self, id: &str) -> Result<(), PhotoError>;
}

/// Keeps photos as plain files in one directory, named
/// `{YYYYmmdd_HHMMSS}_{original name}`.
#[derive(Debug, Clone)]
pub struct FsPhotoStore {
    root: PathBuf,
}

impl FsPhotoStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, PhotoError> {
        if !is_valid_id(id) {
            return Err(PhotoError::InvalidName(id.to_string()));
        }
        Ok(self.root.join(id))
    }
}

#[async_trait]
impl PhotoStore for FsPhotoStore {
    async fn save(&self, bytes: &[u8], suggested_name: &str) -> Result<String, PhotoError> {
        if bytes.is_empty() {
            return Err(PhotoError::Empty);
        }
        let name = sanitize_name(suggested_name)?;
        tokio::fs::create_dir_all(&self.root).await?;

        let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let mut id = format!("{}_{}", stamp, name);
        for _ in 0..SAVE_ATTEMPTS {
            let path = self.root.join(&id);
            let mut file = match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(f) => f,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    let suffix = uuid::Uuid::new_v4().simple().to_string();
                    id = format!("{}_{}_{}", stamp, &suffix[..8], name);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            let written = async {
                file.write_all(bytes).await?;
                file.sync_all().await
            }
            .await;
            if let Err(e) = written {
                // Never leave a truncated photo behind
                drop(file);
                if let Err(rm) = tokio::fs::remove_file(&path).await {
                    warn!(error = %rm, path = %path.display(), "failed to remove partial photo");
                }
                return Err(e.into());
            }
            debug!(id = %id, bytes = bytes.len(), "photo saved");
            return Ok(id);
        }
        Err(PhotoError::Io(std::io::Error::new(
            ErrorKind::AlreadyExists,
            "could not find a free photo name",
        )))
    }

    async fn read(&self, id: &str) -> Result<Option<Vec<u8>>, PhotoError> {
        let path = self.path_for(id)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove(&self, id: &str) -> Result<(), PhotoError> {
        let path = self.path_for(id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Reduces an uploaded file name to a safe final path component.
fn sanitize_name(raw: &str) -> Result<String, PhotoError> {
    let last = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let mut cleaned = String::with_capacity(last.len());
    for c in last.chars() {
        let c = if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            c
        } else {
            '_'
        };
        // Runs of dots collapse to one so the id never contains ".."
        if c == '.' && cleaned.ends_with('.') {
            continue;
        }
        cleaned.push(c);
    }
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        return Err(PhotoError::InvalidName(raw.to_string()));
    }
    // Keep the tail so the extension survives truncation
    let start = cleaned.len().saturating_sub(MAX_NAME_LEN);
    Ok(cleaned[start..].to_string())
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && !id.starts_with('.')
        && !id.contains("..")
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}
