// ============================================================
// Image Batcher and Batch Feed
// ============================================================
// `ImageBatcher` stacks decoded samples into one `[B, 3, H, W]`
// tensor on the session device. `ImageLoader` drives an epoch:
// it reshuffles the dataset with its seeded RNG and hands out
// full batches in order, dropping the trailing partial batch so
// every step sees the same batch shape.

use burn::{data::dataset::Dataset, prelude::*};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::data::dataset::ImageSample;

// ─── ImageBatcher ─────────────────────────────────────────────────────────────

/// Stacks samples into a single image tensor on a fixed device.
#[derive(Clone, Debug)]
pub struct ImageBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> ImageBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    /// `Vec<ImageSample>` -> `[B, 3, size, size]` in [-1, 1].
    ///
    /// Samples are already channel-major, so the whole batch is one
    /// flatten-and-reshape; no per-pixel shuffling happens here.
    pub fn batch(&self, items: Vec<ImageSample>) -> Tensor<B, 4> {
        let batch_size = items.len();
        let size = items[0].size;

        let flat: Vec<f32> = items.iter().flat_map(|s| s.pixels.iter().copied()).collect();

        Tensor::<B, 1>::from_floats(flat.as_slice(), &self.device)
            .reshape([batch_size, 3, size, size])
    }
}

// ─── ImageLoader ──────────────────────────────────────────────────────────────

/// Shuffled batch feed over a dataset. One `epoch()` call deals the
/// whole dataset out as full batches in a fresh seeded order.
pub struct ImageLoader<B: Backend, D: Dataset<ImageSample>> {
    dataset:    D,
    batcher:    ImageBatcher<B>,
    batch_size: usize,
    rng:        StdRng,
}

impl<B: Backend, D: Dataset<ImageSample>> ImageLoader<B, D> {
    pub fn new(dataset: D, batcher: ImageBatcher<B>, batch_size: usize, seed: u64) -> Self {
        Self {
            dataset,
            batcher,
            batch_size,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Full batches available per epoch (trailing remainder dropped).
    pub fn batches_per_epoch(&self) -> usize {
        self.dataset.len() / self.batch_size
    }

    pub fn epoch(&mut self) -> ImageBatchIter<'_, B, D> {
        let mut indices: Vec<usize> = (0..self.dataset.len()).collect();
        indices.shuffle(&mut self.rng);
        ImageBatchIter {
            loader: self,
            indices,
            cursor: 0,
        }
    }
}

pub struct ImageBatchIter<'a, B: Backend, D: Dataset<ImageSample>> {
    loader:  &'a ImageLoader<B, D>,
    indices: Vec<usize>,
    cursor:  usize,
}

impl<B: Backend, D: Dataset<ImageSample>> Iterator for ImageBatchIter<'_, B, D> {
    type Item = Tensor<B, 4>;

    fn next(&mut self) -> Option<Self::Item> {
        let batch_size = self.loader.batch_size;
        if self.cursor + batch_size > self.indices.len() {
            return None;
        }

        let items: Vec<ImageSample> = self.indices[self.cursor..self.cursor + batch_size]
            .iter()
            .map(|&i| {
                self.loader
                    .dataset
                    .get(i)
                    .expect("shuffled index within dataset bounds")
            })
            .collect();
        self.cursor += batch_size;

        Some(self.loader.batcher.batch(items))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::ImageDataset;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn sample(value: f32, size: usize, name: &str) -> ImageSample {
        ImageSample {
            pixels: vec![value; 3 * size * size],
            size,
            source: name.to_string(),
        }
    }

    #[test]
    fn batches_have_channel_major_image_shape() {
        let device = <TestBackend as Backend>::Device::default();
        let batcher = ImageBatcher::<TestBackend>::new(device);

        let batch = batcher.batch(vec![sample(0.5, 4, "a"), sample(-0.5, 4, "b")]);
        assert_eq!(batch.dims(), [2, 3, 4, 4]);

        let values: Vec<f32> = batch.into_data().to_vec().unwrap();
        assert!(values[..48].iter().all(|&v| v == 0.5));
        assert!(values[48..].iter().all(|&v| v == -0.5));
    }

    #[test]
    fn loader_deals_full_batches_and_drops_the_remainder() {
        let device = <TestBackend as Backend>::Device::default();
        let dataset = ImageDataset::new(
            (0..7).map(|i| sample(i as f32 / 10.0, 2, "x")).collect(),
        );
        let mut loader =
            ImageLoader::new(dataset, ImageBatcher::<TestBackend>::new(device), 3, 42);

        assert_eq!(loader.batches_per_epoch(), 2);
        let batches: Vec<_> = loader.epoch().collect();
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| b.dims() == [3, 3, 2, 2]));
    }

    #[test]
    fn same_seed_reproduces_the_same_epoch_order() {
        let device = <TestBackend as Backend>::Device::default();
        let build = |seed| {
            let dataset =
                ImageDataset::new((0..8).map(|i| sample(i as f32, 1, "x")).collect());
            ImageLoader::new(
                dataset,
                ImageBatcher::<TestBackend>::new(device.clone()),
                8,
                seed,
            )
        };

        let first: Vec<f32> = build(7).epoch().next().unwrap().into_data().to_vec().unwrap();
        let second: Vec<f32> = build(7).epoch().next().unwrap().into_data().to_vec().unwrap();
        assert_eq!(first, second);
    }
}
