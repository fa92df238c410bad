use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

/// One decoded training image: RGB pixels resized to the configured
/// side length and normalized to [-1, 1], stored channel-major
/// (`3 * size * size` values, all reds first).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSample {
    pub pixels: Vec<f32>,
    pub size:   usize,
    pub source: String,
}

pub struct ImageDataset {
    samples: Vec<ImageSample>,
}

impl ImageDataset {
    pub fn new(samples: Vec<ImageSample>) -> Self {
        Self { samples }
    }
}

impl Dataset<ImageSample> for ImageDataset {
    fn get(&self, index: usize) -> Option<ImageSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}
