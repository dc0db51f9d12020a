//! Bootcamp photo storage on the local filesystem.

use std::path::{Component, Path, PathBuf};

use anyhow::Context;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Rejected or failed upload.
#[derive(Debug, Error)]
pub enum PhotoError {
    #[error("Please upload an image file")]
    NotAnImage,

    #[error("Please upload an image less than {0}")]
    TooLarge(usize),

    #[error(transparent)]
    Io(#[from] anyhow::Error),
}

/// Uploaded photos kept under one directory.
#[derive(Debug, Clone)]
pub struct PhotoStore {
    base_path: PathBuf,
    max_size: usize,
}

/// Lowercase alphanumeric extension of `file_name`, if any.
fn extension(file_name: &str) -> Option<String> {
    let ext = Path::new(file_name).extension()?.to_str()?;
    (!ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .then(|| ext.to_ascii_lowercase())
}

impl PhotoStore {
    pub fn new(base_path: impl Into<PathBuf>, max_size: usize) -> Self {
        Self {
            base_path: base_path.into(),
            max_size,
        }
    }

    /// Check and store a photo for `bootcamp`, returning the stored name
    /// `photo_<id>.<ext>`. Both the declared type and the content must be
    /// an image.
    pub async fn save(
        &self,
        bootcamp: Uuid,
        file_name: Option<&str>,
        content_type: Option<&str>,
        data: &[u8],
    ) -> Result<String, PhotoError> {
        if !content_type.is_some_and(|ct| ct.starts_with("image/")) {
            return Err(PhotoError::NotAnImage);
        }
        if data.len() > self.max_size {
            return Err(PhotoError::TooLarge(self.max_size));
        }
        let Some(kind) = infer::get(data).filter(|k| k.matcher_type() == infer::MatcherType::Image)
        else {
            return Err(PhotoError::NotAnImage);
        };

        let ext = file_name
            .and_then(extension)
            .unwrap_or_else(|| kind.extension().to_string());
        let name = format!("photo_{bootcamp}.{ext}");
        let path = self.base_path.join(&name);

        fs::create_dir_all(&self.base_path)
            .await
            .context("failed to create upload directory")?;
        let mut file = fs::File::create(&path)
            .await
            .context("failed to create photo file")?;
        file.write_all(data)
            .await
            .context("failed to write photo file")?;
        file.flush().await.context("failed to flush photo file")?;

        tracing::debug!(path = %path.display(), size = data.len(), "photo stored");
        Ok(name)
    }

    /// Read a stored photo with its sniffed content type. `None` when the
    /// name is not a plain file name or nothing is stored under it.
    pub async fn read(&self, name: &str) -> Option<(Vec<u8>, &'static str)> {
        let mut components = Path::new(name).components();
        if !matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        ) {
            return None;
        }

        let data = match fs::read(self.base_path.join(name)).await {
            Ok(data) => data,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(%name, error = %e, "failed to read photo");
                }
                return None;
            }
        };
        let mime = infer::get(&data)
            .map(|k| k.mime_type())
            .unwrap_or("application/octet-stream");
        Some((data, mime))
    }
}
