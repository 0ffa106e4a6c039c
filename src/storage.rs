// SPDX-License-Identifier: GPL-3.0-only

//! Storage utilities for saving and sharing photos

use crate::backends::camera::CapturedImage;
use crate::constants::DEFAULT_SAVE_FOLDER;
use crate::errors::PhotoError;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// What gets handed to the share sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareItems {
    pub text: String,
    pub image: PathBuf,
}

/// Image persistence and sharing service
pub trait ImageSink: Send + Sync {
    /// Persist the photo and return where it went
    fn save_to_library(&self, image: &CapturedImage) -> Result<PathBuf, PhotoError>;

    /// Offer text and a saved image to the user's share target
    fn present_share_sheet(&self, items: &ShareItems) -> Result<(), PhotoError>;
}

/// Default photo directory: `~/Pictures/ShakeCamera`
pub fn default_photo_dir() -> PathBuf {
    dirs::picture_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join(DEFAULT_SAVE_FOLDER)
}

/// Saves photos as timestamped files in a directory
#[derive(Debug, Clone)]
pub struct LibrarySink {
    dir: PathBuf,
    open_on_share: bool,
}

impl LibrarySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            open_on_share: true,
        }
    }

    /// Keep the share text file but don't launch the desktop handler
    pub fn without_opener(mut self) -> Self {
        self.open_on_share = false;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `IMG_<timestamp>.<ext>` for the first attempt, `IMG_<timestamp>_N.<ext>` after
    fn candidate_path(&self, image: &CapturedImage, n: u32) -> PathBuf {
        let stamp = image.captured_at.format("%Y%m%d_%H%M%S_%3f");
        let ext = image.format.extension();
        if n == 0 {
            self.dir.join(format!("IMG_{}.{}", stamp, ext))
        } else {
            self.dir.join(format!("IMG_{}_{}.{}", stamp, n, ext))
        }
    }

    /// Create the first free candidate path exclusively, so concurrent saves
    /// with the same timestamp never share a file
    fn create_unique(&self, image: &CapturedImage) -> Result<(PathBuf, File), PhotoError> {
        let mut n = 0;
        loop {
            let path = self.candidate_path(image, n);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => n += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl ImageSink for LibrarySink {
    fn save_to_library(&self, image: &CapturedImage) -> Result<PathBuf, PhotoError> {
        if image.is_empty() {
            return Err(PhotoError::NoImageData);
        }

        std::fs::create_dir_all(&self.dir)?;
        let (path, mut file) = self.create_unique(image)?;
        file.write_all(&image.data)?;

        info!(path = %path.display(), bytes = image.len(), "Photo saved");
        Ok(path)
    }

    fn present_share_sheet(&self, items: &ShareItems) -> Result<(), PhotoError> {
        if !items.image.exists() {
            return Err(PhotoError::ShareFailed(format!(
                "{} does not exist",
                items.image.display()
            )));
        }

        if !items.text.is_empty() {
            let note = items.image.with_extension("txt");
            std::fs::write(&note, &items.text)
                .map_err(|e| PhotoError::ShareFailed(e.to_string()))?;
            debug!(path = %note.display(), "Share text written");
        }

        if self.open_on_share {
            open::that(&items.image).map_err(|e| PhotoError::ShareFailed(e.to_string()))?;
        }
        info!(path = %items.image.display(), "Photo shared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::ImageFormat;
    use std::collections::HashSet;
    use std::sync::Barrier;

    fn temp_library() -> LibrarySink {
        let dir = std::env::temp_dir().join(format!("shake-camera-lib-{}", uuid::Uuid::new_v4()));
        LibrarySink::new(dir).without_opener()
    }

    fn jpeg(bytes: &[u8]) -> CapturedImage {
        CapturedImage::new(bytes.to_vec(), ImageFormat::Jpeg, 1, 1)
    }

    #[test]
    fn test_save_writes_bytes_with_timestamped_name() {
        let sink = temp_library();
        let path = sink.save_to_library(&jpeg(&[0xFF, 0xD8, 0xFF])).unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), vec![0xFF, 0xD8, 0xFF]);
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("IMG_") && name.ends_with(".jpg"), "{name}");
    }

    #[test]
    fn test_same_timestamp_does_not_overwrite() {
        let sink = temp_library();
        let image = jpeg(&[1]);
        let first = sink.save_to_library(&image).unwrap();
        let second = sink.save_to_library(&image).unwrap();
        assert_ne!(first, second);
        assert!(first.exists() && second.exists());
    }

    #[test]
    fn test_concurrent_saves_with_same_timestamp_get_distinct_files() {
        let sink = temp_library();
        let image = jpeg(&[7]);
        let barrier = Barrier::new(8);

        let paths: Vec<PathBuf> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        sink.save_to_library(&image).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let unique: HashSet<&PathBuf> = paths.iter().collect();
        assert_eq!(unique.len(), 8);
        assert_eq!(std::fs::read_dir(sink.dir()).unwrap().count(), 8);
    }

    #[test]
    fn test_empty_image_is_rejected() {
        let sink = temp_library();
        assert_eq!(
            sink.save_to_library(&jpeg(&[])).unwrap_err(),
            PhotoError::NoImageData
        );
    }

    #[test]
    fn test_share_writes_text_next_to_image() {
        let sink = temp_library();
        let image = sink.save_to_library(&jpeg(&[1, 2])).unwrap();
        let items = ShareItems {
            text: "look".to_string(),
            image: image.clone(),
        };
        sink.present_share_sheet(&items).unwrap();
        assert_eq!(
            std::fs::read_to_string(image.with_extension("txt")).unwrap(),
            "look"
        );
    }

    #[test]
    fn test_share_missing_image_fails() {
        let sink = temp_library();
        let items = ShareItems {
            text: String::new(),
            image: sink.dir().join("nope.jpg"),
        };
        assert!(matches!(
            sink.present_share_sheet(&items),
            Err(PhotoError::ShareFailed(_))
        ));
    }
}
