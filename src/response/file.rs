//! File storage for generated images

use std::path::PathBuf;
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::error::{AppError, Result};

/// Handler for image file storage
pub struct FileStore {
    base_path: PathBuf,
}

impl FileStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Ensure the storage directory exists
    pub async fn ensure_dir(&self) -> Result<()> {
        if !self.base_path.exists() {
            fs::create_dir_all(&self.base_path)
                .await
                .map_err(AppError::Io)?;
            debug!(path = ?self.base_path, "Created storage directory");
        }
        Ok(())
    }

    /// Save encoded image bytes under a fresh UUID name, returning the filename
    pub async fn save(&self, data: &[u8]) -> Result<String> {
        self.ensure_dir().await?;

        let format = detect_image_format(data).unwrap_or("png");
        let filename = format!("{}.{}", Uuid::new_v4(), format);
        let file_path = self.base_path.join(&filename);

        fs::write(&file_path, data).await.map_err(AppError::Io)?;
        debug!(path = ?file_path, size = data.len(), "Saved image file");

        Ok(filename)
    }

    /// Delete stored images older than `max_age_secs`, returning the count
    pub async fn cleanup(&self, max_age_secs: u64) -> Result<usize> {
        let mut deleted = 0;
        let now = std::time::SystemTime::now();
        let max_age = std::time::Duration::from_secs(max_age_secs);

        let mut entries = fs::read_dir(&self.base_path).await.map_err(AppError::Io)?;

        while let Some(entry) = entries.next_entry().await.map_err(AppError::Io)? {
            if let Ok(metadata) = entry.metadata().await {
                if let Ok(modified) = metadata.modified() {
                    if let Ok(age) = now.duration_since(modified) {
                        if age > max_age && fs::remove_file(entry.path()).await.is_ok() {
                            deleted += 1;
                            debug!(path = ?entry.path(), "Deleted old image");
                        }
                    }
                }
            }
        }

        Ok(deleted)
    }
}

/// Detect image format from binary data using magic bytes
fn detect_image_format(data: &[u8]) -> Option<&'static str> {
    if data.len() < 8 {
        return None;
    }

    // PNG: 89 50 4E 47 0D 0A 1A 0A
    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some("png");
    }

    // JPEG: FF D8 FF
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("jpg");
    }

    // WebP: RIFF....WEBP
    if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
        return Some("webp");
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_png() {
        let png_header = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        assert_eq!(detect_image_format(&png_header), Some("png"));
    }

    #[test]
    fn test_detect_jpeg() {
        let jpeg_header = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46];
        assert_eq!(detect_image_format(&jpeg_header), Some("jpg"));
    }

    #[test]
    fn test_detect_unknown() {
        assert_eq!(detect_image_format(b"plain bytes"), None);
    }

    #[tokio::test]
    async fn test_save_uses_detected_extension() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00];
        let filename = store.save(&png).await.unwrap();
        assert!(filename.ends_with(".png"));
        assert!(dir.path().join(&filename).exists());
    }
}
