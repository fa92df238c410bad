// ============================================================
// Sample Image Writer
// ============================================================
// Turns a generated image batch into one PNG grid for visual
// inspection: denormalize from the generator's [-1, 1] range,
// quantize to u8, tile into rows of eight with a 2px gutter.

use anyhow::{anyhow, bail, Context, Result};
use burn::prelude::*;
use image::{Rgb, RgbImage};
use std::{fs, path::PathBuf};

const GRID_COLUMNS: usize = 8;
const GRID_PADDING: usize = 2;

/// Map generator output back to image space: `(x + 1) / 2`, clamped.
pub fn denorm<B: Backend, const D: usize>(x: Tensor<B, D>) -> Tensor<B, D> {
    x.add_scalar(1.0).div_scalar(2.0).clamp(0.0, 1.0)
}

/// Writes sample grids into a fixed directory.
pub struct SampleWriter {
    dir: PathBuf,
}

impl SampleWriter {
    pub fn new(dir: impl Into<String>) -> Self {
        let dir = PathBuf::from(dir.into());
        fs::create_dir_all(&dir).ok();
        Self { dir }
    }

    /// Tile a `[B, 3, H, W]` batch in [-1, 1] into a grid PNG.
    /// Returns the path written.
    pub fn write_grid<B: Backend>(&self, images: Tensor<B, 4>, filename: &str) -> Result<PathBuf> {
        let [batch, channels, height, width] = images.dims();
        if channels != 3 {
            bail!("sample grids expect RGB batches with 3 channels, got {channels}");
        }

        let pixels: Vec<f32> = denorm(images)
            .into_data()
            .to_vec()
            .map_err(|e| anyhow!("Cannot read image tensor back from device: {e:?}"))?;

        let columns = GRID_COLUMNS.min(batch.max(1));
        let rows = batch.div_ceil(columns);
        let canvas_w = (columns * (width + GRID_PADDING) + GRID_PADDING) as u32;
        let canvas_h = (rows * (height + GRID_PADDING) + GRID_PADDING) as u32;
        let mut canvas = RgbImage::from_pixel(canvas_w, canvas_h, Rgb([0, 0, 0]));

        let channel_len = height * width;
        for index in 0..batch {
            let x0 = GRID_PADDING + (index % columns) * (width + GRID_PADDING);
            let y0 = GRID_PADDING + (index / columns) * (height + GRID_PADDING);
            let base = index * 3 * channel_len;

            for y in 0..height {
                for x in 0..width {
                    let offset = base + y * width + x;
                    let quantize = |c: usize| {
                        (pixels[offset + c * channel_len] * 255.0 + 0.5).clamp(0.0, 255.0) as u8
                    };
                    canvas.put_pixel(
                        (x0 + x) as u32,
                        (y0 + y) as u32,
                        Rgb([quantize(0), quantize(1), quantize(2)]),
                    );
                }
            }
        }

        let path = self.dir.join(filename);
        canvas
            .save(&path)
            .with_context(|| format!("Cannot write sample grid to '{}'", path.display()))?;
        Ok(path)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn denorm_maps_generator_range_into_unit_interval() {
        let device = <TestBackend as Backend>::Device::default();
        let x = Tensor::<TestBackend, 1>::from_floats([-1.0, 0.0, 1.0, 3.0].as_slice(), &device);
        let out: Vec<f32> = denorm(x).into_data().to_vec().unwrap();
        assert_eq!(out, vec![0.0, 0.5, 1.0, 1.0]);
    }

    #[test]
    fn grid_has_expected_canvas_size_and_pixels() {
        let device = <TestBackend as Backend>::Device::default();
        let dir = tempfile::tempdir().unwrap();
        let writer = SampleWriter::new(dir.path().to_str().unwrap());

        // Two solid 4x4 images: white (+1) and black (-1).
        let mut values = vec![1.0f32; 3 * 16];
        values.extend(vec![-1.0f32; 3 * 16]);
        let images = Tensor::<TestBackend, 1>::from_floats(values.as_slice(), &device)
            .reshape([2, 3, 4, 4]);

        let path = writer.write_grid(images, "grid.png").unwrap();
        let grid = image::open(&path).unwrap().to_rgb8();

        // Two columns of 4px plus three 2px gutters.
        assert_eq!(grid.dimensions(), (14, 8));
        assert_eq!(grid.get_pixel(2, 2), &Rgb([255, 255, 255]));
        assert_eq!(grid.get_pixel(8, 2), &Rgb([0, 0, 0]));
        // Gutter stays background black.
        assert_eq!(grid.get_pixel(0, 0), &Rgb([0, 0, 0]));
    }
}
