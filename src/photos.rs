//! Profile and book photos on the local filesystem.

use crate::config::StorageConfig;
use crate::error::{AppError, Result};
use image::ImageFormat;
use image::imageops::FilterType;
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// An uploaded file.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Client-side file name.
    pub file_name: Option<String>,
    /// Declared content type.
    pub content_type: Option<String>,
    /// File contents.
    pub data: Vec<u8>,
}

/// Map an accepted profile photo content type to its image format.
fn profile_format(content_type: Option<&str>) -> Result<ImageFormat> {
    match content_type {
        Some("image/jpeg") => Ok(ImageFormat::Jpeg),
        Some("image/png") => Ok(ImageFormat::Png),
        _ => Err(AppError::Validation(
            "Profile photo must be a JPEG or PNG image".to_string(),
        )),
    }
}

/// Scale an encoded image to `width` pixels wide, keeping its aspect ratio
/// and format.
pub fn shrink_to_width(data: &[u8], format: ImageFormat, width: u32) -> Result<Vec<u8>> {
    let img = image::load_from_memory_with_format(data, format)
        .map_err(|e| AppError::Validation(format!("Invalid image: {}", e)))?;

    let scale = width as f32 / img.width().max(1) as f32;
    let height = ((img.height() as f32 * scale).round() as u32).max(1);
    let resized = img.resize_exact(width, height, FilterType::Lanczos3);

    let mut out = Vec::new();
    resized.write_to(&mut Cursor::new(&mut out), format)?;
    Ok(out)
}

/// Content type for stored image bytes.
pub fn sniff_mime(data: &[u8]) -> &'static str {
    image::guess_format(data)
        .map(|f| f.to_mime_type())
        .unwrap_or("application/octet-stream")
}

/// Photo storage rooted at the configured directories.
#[derive(Debug, Clone)]
pub struct PhotoStore {
    books_dir: PathBuf,
    assets_dir: PathBuf,
    max_bytes: usize,
    resize_width: u32,
}

impl PhotoStore {
    /// Create a store from storage settings.
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            books_dir: config.books_dir.clone(),
            assets_dir: config.assets_dir.clone(),
            max_bytes: config.max_photo_bytes,
            resize_width: config.resize_width,
        }
    }

    /// Create the photo directories.
    pub async fn init(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.books_dir).await?;
        tokio::fs::create_dir_all(&self.assets_dir).await?;
        Ok(())
    }

    /// Where the profile photo of user `id` lives.
    pub fn profile_path(&self, user_id: i64) -> PathBuf {
        self.assets_dir.join(user_id.to_string())
    }

    /// Where the photo of book `id` lives.
    pub fn book_path(&self, book_id: i64) -> PathBuf {
        self.books_dir.join(book_id.to_string())
    }

    /// Store a profile photo, shrinking oversized ones.
    pub async fn save_profile(&self, user_id: i64, upload: Upload) -> Result<PathBuf> {
        let format = profile_format(upload.content_type.as_deref())?;
        tracing::debug!(
            user_id,
            file = upload.file_name.as_deref().unwrap_or("-"),
            bytes = upload.data.len(),
            "Received profile photo"
        );

        let data = if upload.data.len() > self.max_bytes {
            let width = self.resize_width;
            let original = upload.data;
            let size = original.len();
            let shrunk = tokio::task::spawn_blocking(move || {
                shrink_to_width(&original, format, width)
            })
            .await
            .map_err(|e| AppError::Internal(format!("Resize task failed: {}", e)))??;
            tracing::debug!(user_id, from = size, to = shrunk.len(), "Resized profile photo");
            shrunk
        } else {
            upload.data
        };

        let path = self.profile_path(user_id);
        self.write(&path, &data).await?;
        Ok(path)
    }

    /// Store a book photo. Oversized files are refused.
    pub async fn save_book(&self, book_id: i64, upload: Upload) -> Result<PathBuf> {
        tracing::debug!(
            book_id,
            file = upload.file_name.as_deref().unwrap_or("-"),
            bytes = upload.data.len(),
            "Received book photo"
        );
        if upload.data.len() > self.max_bytes {
            return Err(AppError::Validation(format!(
                "Book photo must not exceed {} bytes",
                self.max_bytes
            )));
        }

        let path = self.book_path(book_id);
        self.write(&path, &upload.data).await?;
        Ok(path)
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, data).await?;
        tracing::debug!(path = %path.display(), bytes = data.len(), "Stored photo");
        Ok(())
    }

    /// Read a stored photo with its content type.
    pub async fn read(&self, path: &Path) -> Result<(Vec<u8>, &'static str)> {
        match tokio::fs::read(path).await {
            Ok(data) => {
                let mime = sniff_mime(&data);
                Ok((data, mime))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AppError::NotFound("Photo not found".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a stored photo. A missing file is not an error.
    pub async fn remove(&self, path: &Path) -> Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
