// ============================================================
// Image Folder Loader
// ============================================================
// Walks a directory of image files and decodes each one into a
// normalized `ImageSample` via the `image` crate. Every image is
// resized to the configured square side length and mapped from
// u8 RGB to [-1, 1] floats, channel-major, which is the range the
// generator's tanh output lives in.
//
// Files that fail to decode are skipped with a warning; one bad
// file should not kill a long training run before it starts.

use anyhow::{Context, Result};
use image::imageops::FilterType;
use std::path::{Path, PathBuf};

use crate::data::dataset::ImageSample;

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Loads every supported image file under a directory.
pub struct ImageFolderLoader {
    dir:    String,
    imsize: usize,
}

impl ImageFolderLoader {
    pub fn new(dir: impl Into<String>, imsize: usize) -> Self {
        Self {
            dir: dir.into(),
            imsize,
        }
    }

    /// Decode all images in the folder, sorted by filename so a
    /// seeded run always sees the same sample order.
    pub fn load_all(&self) -> Result<Vec<ImageSample>> {
        let dir = Path::new(&self.dir);

        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
            .with_context(|| format!("Cannot read image directory '{}'", self.dir))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        paths.sort();

        let mut samples = Vec::with_capacity(paths.len());
        for path in &paths {
            match self.load_single(path) {
                Ok(sample) => samples.push(sample),
                Err(e) => tracing::warn!("Skipping '{}': {}", path.display(), e),
            }
        }

        tracing::info!("Loaded {} images from '{}'", samples.len(), self.dir);
        Ok(samples)
    }

    fn load_single(&self, path: &Path) -> Result<ImageSample> {
        let image = image::open(path)
            .with_context(|| format!("Cannot decode '{}'", path.display()))?
            .resize_exact(self.imsize as u32, self.imsize as u32, FilterType::Triangle)
            .to_rgb8();

        // Interleaved RGB rows -> channel-major floats in [-1, 1].
        let channel_len = self.imsize * self.imsize;
        let raw = image.into_raw();
        let mut pixels = vec![0.0f32; 3 * channel_len];
        for (i, chunk) in raw.chunks_exact(3).enumerate() {
            for (channel, &value) in chunk.iter().enumerate() {
                pixels[channel * channel_len + i] = value as f32 / 127.5 - 1.0;
            }
        }

        let source = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        Ok(ImageSample {
            pixels,
            size: self.imsize,
            source,
        })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_resizes_and_normalizes_images() {
        let dir = tempfile::tempdir().unwrap();

        // One white 8x8 and one black 4x4; both should come out 2x2.
        image::RgbImage::from_pixel(8, 8, image::Rgb([255, 255, 255]))
            .save(dir.path().join("white.png"))
            .unwrap();
        image::RgbImage::from_pixel(4, 4, image::Rgb([0, 0, 0]))
            .save(dir.path().join("black.png"))
            .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let loader = ImageFolderLoader::new(dir.path().to_str().unwrap(), 2);
        let samples = loader.load_all().unwrap();

        assert_eq!(samples.len(), 2);
        // Sorted by filename: black first.
        assert_eq!(samples[0].source, "black.png");
        assert!(samples[0].pixels.iter().all(|&p| (p - -1.0).abs() < 1e-3));
        assert!(samples[1].pixels.iter().all(|&p| (p - 1.0).abs() < 1e-2));
        assert_eq!(samples[0].pixels.len(), 3 * 2 * 2);
    }

    #[test]
    fn corrupt_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.png"), b"not an image").unwrap();
        image::RgbImage::from_pixel(2, 2, image::Rgb([10, 20, 30]))
            .save(dir.path().join("fine.png"))
            .unwrap();

        let loader = ImageFolderLoader::new(dir.path().to_str().unwrap(), 2);
        let samples = loader.load_all().unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].source, "fine.png");
    }

    #[test]
    fn missing_directory_is_an_error() {
        let loader = ImageFolderLoader::new("/nonexistent/sagan-data", 64);
        assert!(loader.load_all().is_err());
    }
}
