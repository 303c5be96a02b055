//! Daily image lookup.

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use std::path::{Path, PathBuf};
use tracing::{error, warn};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Path of today's image, if there is one.
    async fn today_image(&self) -> Option<PathBuf>;
}

/// Images stored as `<root>/<YYYY-MM-DD>/<file>`.
///
/// The first png/jpg/jpeg entry in directory-listing order wins.
pub struct DatedFolderImageSource {
    root: PathBuf,
}

impl DatedFolderImageSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn folder_for(&self, date: NaiveDate) -> PathBuf {
        self.root.join(date.format("%Y-%m-%d").to_string())
    }

    pub async fn image_for(&self, date: NaiveDate) -> Option<PathBuf> {
        let folder = self.folder_for(date);
        let mut entries = match tokio::fs::read_dir(&folder).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Image folder not found: {}", folder.display());
                return None;
            }
            Err(e) => {
                error!("Failed to list image folder {}: {}", folder.display(), e);
                return None;
            }
        };

        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    let path = entry.path();
                    if has_image_extension(&path) {
                        return Some(path);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    error!("Failed to read image folder {}: {}", folder.display(), e);
                    return None;
                }
            }
        }

        warn!("No images found in: {}", folder.display());
        None
    }
}

#[async_trait]
impl ImageSource for DatedFolderImageSource {
    async fn today_image(&self) -> Option<PathBuf> {
        self.image_for(Local::now().date_naive()).await
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
    }

    #[test]
    fn test_extension_filter() {
        assert!(has_image_extension(Path::new("a.png")));
        assert!(has_image_extension(Path::new("a.JPG")));
        assert!(has_image_extension(Path::new("dir/a.Jpeg")));
        assert!(!has_image_extension(Path::new("a.gif")));
        assert!(!has_image_extension(Path::new("notes.txt")));
        assert!(!has_image_extension(Path::new("png")));
    }

    #[test]
    fn test_folder_layout() {
        let source = DatedFolderImageSource::new("/srv/images");
        assert_eq!(
            source.folder_for(date()),
            PathBuf::from("/srv/images/2025-03-14")
        );
    }

    #[tokio::test]
    async fn test_missing_folder_yields_none() {
        let root = TempDir::new().unwrap();
        let source = DatedFolderImageSource::new(root.path());
        assert!(source.image_for(date()).await.is_none());
    }

    #[tokio::test]
    async fn test_skips_non_images() {
        let root = TempDir::new().unwrap();
        let folder = root.path().join("2025-03-14");
        std::fs::create_dir_all(&folder).unwrap();
        std::fs::write(folder.join("notes.txt"), b"draft").unwrap();
        assert!(DatedFolderImageSource::new(root.path())
            .image_for(date())
            .await
            .is_none());

        std::fs::write(folder.join("cover.PNG"), b"png").unwrap();
        let image = DatedFolderImageSource::new(root.path())
            .image_for(date())
            .await
            .unwrap();
        assert_eq!(image, folder.join("cover.PNG"));
    }
}
