//! Cover image storage

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// URL prefix under which stored images are served
pub const IMAGE_URL_PREFIX: &str = "images";

const ACCEPTED_CONTENT_TYPES: [&str; 3] = ["image/png", "image/jpg", "image/jpeg"];

/// An image file received with a create or update form
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Only PNG and JPEG covers are kept; anything else counts as no image
    pub fn is_accepted(&self) -> bool {
        ACCEPTED_CONTENT_TYPES.contains(&self.content_type.to_ascii_lowercase().as_str())
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Persist the upload and return the image reference stored on the book
    async fn save(&self, upload: &ImageUpload) -> AppResult<String>;

    /// Delete a previously stored image. Remote URLs are left alone.
    async fn remove(&self, image_url: &str) -> AppResult<()>;
}

/// Images kept as files in one directory
#[derive(Debug, Clone)]
pub struct DiskImageStore {
    root: PathBuf,
}

impl DiskImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File name inside `root` for a stored image reference, if it is one of ours
    fn local_file(&self, image_url: &str) -> Option<PathBuf> {
        let name = image_url
            .trim_start_matches('/')
            .strip_prefix(IMAGE_URL_PREFIX)?
            .strip_prefix('/')?;

        if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
            return None;
        }
        Some(self.root.join(name))
    }
}

fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.trim_matches('.').is_empty() {
        "image".to_string()
    } else {
        cleaned
    }
}

#[async_trait]
impl ImageStore for DiskImageStore {
    async fn save(&self, upload: &ImageUpload) -> AppResult<String> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| AppError::Internal(format!("Cannot create image directory: {}", e)))?;

        let name = format!("{}-{}", Uuid::new_v4(), sanitize_file_name(&upload.file_name));
        tokio::fs::write(self.root.join(&name), &upload.bytes)
            .await
            .map_err(|e| AppError::Internal(format!("Cannot store image {}: {}", name, e)))?;

        Ok(format!("{}/{}", IMAGE_URL_PREFIX, name))
    }

    async fn remove(&self, image_url: &str) -> AppResult<()> {
        let Some(path) = self.local_file(image_url) else {
            tracing::debug!("Not removing foreign image reference {}", image_url);
            return Ok(());
        };

        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| AppError::Internal(format!("Cannot remove image {}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(name: &str, content_type: &str) -> ImageUpload {
        ImageUpload {
            file_name: name.to_string(),
            content_type: content_type.to_string(),
            bytes: vec![0x89, b'P', b'N', b'G'],
        }
    }

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("library-images-{}", Uuid::new_v4()))
    }

    #[test]
    fn accepts_png_and_jpeg_only() {
        assert!(upload("a.png", "image/png").is_accepted());
        assert!(upload("a.jpg", "image/jpeg").is_accepted());
        assert!(upload("a.jpg", "IMAGE/JPG").is_accepted());
        assert!(!upload("a.gif", "image/gif").is_accepted());
        assert!(!upload("a.pdf", "application/pdf").is_accepted());
    }

    #[test]
    fn file_names_are_flattened() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("my cover (1).png"), "my_cover__1_.png");
        assert_eq!(sanitize_file_name(".."), "image");
    }

    #[tokio::test]
    async fn save_then_remove() {
        let store = DiskImageStore::new(scratch_dir());

        let url = store.save(&upload("cover.png", "image/png")).await.unwrap();
        assert!(url.starts_with("images/"));
        assert!(url.ends_with("-cover.png"));

        let path = store.local_file(&url).unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap(), vec![0x89, b'P', b'N', b'G']);

        store.remove(&url).await.unwrap();
        assert!(!path.exists());

        // Second removal fails: the file is gone
        assert!(store.remove(&url).await.is_err());

        let _ = tokio::fs::remove_dir_all(store.root()).await;
    }

    #[tokio::test]
    async fn foreign_references_are_ignored() {
        let store = DiskImageStore::new(scratch_dir());

        store.remove("https://picsum.photos/seed/x/300/400").await.unwrap();
        store.remove("images/../Cargo.toml").await.unwrap();
        store.remove("elsewhere/cover.png").await.unwrap();
    }
}
