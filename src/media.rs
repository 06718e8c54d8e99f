use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

/// Image extensions accepted for every upload
pub const ALLOWED_IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// URL prefix the router serves the media directory under
pub const MEDIA_URL_PREFIX: &str = "/media";

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("File extension '{0}' is not allowed. Allowed extensions are: jpg, jpeg, png")]
    UnsupportedExtension(String),

    #[error("Uploaded file has no file name")]
    MissingFileName,

    #[error("Uploaded file is empty")]
    Empty,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Sub-directory an upload is filed under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFolder {
    ProfilePictures,
    Payments,
    Products,
}

impl MediaFolder {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaFolder::ProfilePictures => "profile_pictures",
            MediaFolder::Payments => "payments",
            MediaFolder::Products => "products",
        }
    }
}

/// Check the extension of an uploaded file name and return it lower-cased.
pub fn image_extension(file_name: &str) -> Result<String, MediaError> {
    let name = file_name.trim();
    if name.is_empty() {
        return Err(MediaError::MissingFileName);
    }

    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    if ALLOWED_IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        Err(MediaError::UnsupportedExtension(ext))
    }
}

/// Public URL for a stored media key
pub fn media_url(key: &str) -> String {
    format!("{}/{}", MEDIA_URL_PREFIX, key)
}

/// Local filesystem store for uploaded images.
///
/// Keys look like `payments/<uuid>.png` and are relative to `root`.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Validate and write an image, returning its key.
    pub async fn save(&self, folder: MediaFolder, file_name: &str, data: &[u8]) -> Result<String, MediaError> {
        let ext = image_extension(file_name)?;
        if data.is_empty() {
            return Err(MediaError::Empty);
        }

        let key = format!("{}/{}.{}", folder.as_str(), Uuid::new_v4(), ext);
        let full_path = self.root.join(&key);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&full_path, data).await?;

        debug!("Stored {} bytes as {}", data.len(), key);
        Ok(key)
    }

    /// Remove a stored file. Missing files are not an error.
    pub async fn remove(&self, key: &str) -> Result<(), MediaError> {
        match fs::remove_file(self.root.join(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a file that has just been superseded; failures are only logged.
    pub async fn discard(&self, key: Option<&str>) {
        if let Some(key) = key {
            if let Err(e) = self.remove(key).await {
                warn!("Failed to remove replaced media file {}: {}", key, e);
            }
        }
    }

    pub async fn exists(&self, key: &str) -> bool {
        fs::try_exists(self.root.join(key)).await.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_store(dir: &TempDir) -> MediaStore {
        MediaStore::new(dir.path().join("media"))
    }

    #[test]
    fn test_allowed_extensions() {
        assert_eq!(image_extension("receipt.png").unwrap(), "png");
        assert_eq!(image_extension("photo.JPG").unwrap(), "jpg");
        assert_eq!(image_extension("scan.jpeg").unwrap(), "jpeg");
    }

    #[test]
    fn test_rejected_extensions() {
        assert!(matches!(
            image_extension("notes.pdf"),
            Err(MediaError::UnsupportedExtension(ext)) if ext == "pdf"
        ));
        assert!(matches!(image_extension("noextension"), Err(MediaError::UnsupportedExtension(_))));
        assert!(matches!(image_extension("  "), Err(MediaError::MissingFileName)));
    }

    #[test]
    fn test_media_url() {
        assert_eq!(media_url("payments/a.png"), "/media/payments/a.png");
    }

    #[tokio::test]
    async fn test_save_and_remove() {
        let dir = TempDir::new().unwrap();
        let store = temp_store(&dir);

        let key = store.save(MediaFolder::Payments, "receipt.PNG", b"fake-png").await.unwrap();
        assert!(key.starts_with("payments/"));
        assert!(key.ends_with(".png"));
        assert!(store.exists(&key).await);

        store.remove(&key).await.unwrap();
        assert!(!store.exists(&key).await);

        // Removing twice is fine
        store.remove(&key).await.unwrap();
    }

    #[tokio::test]
    async fn test_save_rejects_before_writing() {
        let dir = TempDir::new().unwrap();
        let store = temp_store(&dir);

        assert!(store.save(MediaFolder::Products, "script.sh", b"echo").await.is_err());
        assert!(matches!(
            store.save(MediaFolder::Products, "empty.png", b"").await,
            Err(MediaError::Empty)
        ));
        assert!(!store.root().exists());
    }
}
