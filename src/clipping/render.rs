use image::imageops::{self, FilterType};
use image::RgbImage;
use rayon::prelude::*;

use crate::geometry::Point;

use super::data::Clipping;
use super::key::ClippingKey;
use super::magic::MIN_CROP_SIDE;
use super::transform::{adjust_bounds, clipping_box};

/// Renders the crop described by a key out of a packed RGB24 source frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClippingRender {
    source_w: u32,
    source_h: u32,
    target_w: u32,
    target_h: u32,
}

impl ClippingRender {
    pub fn new(source: (u32, u32), target: (u32, u32)) -> Self {
        Self {
            source_w: source.0,
            source_h: source.1,
            target_w: target.0,
            target_h: target.1,
        }
    }

    /// Renderer for the video and output sizes of `clipping`
    pub fn for_clipping(clipping: &Clipping) -> Self {
        Self::new(
            (clipping.video_w(), clipping.video_h()),
            (clipping.w(), clipping.h()),
        )
    }

    pub fn target_size(&self) -> (u32, u32) {
        (self.target_w, self.target_h)
    }

    /// Bytes of one output frame
    pub fn output_size(&self) -> usize {
        self.target_w as usize * self.target_h as usize * 3
    }

    /// Render `key` from `source` into `out`.
    ///
    /// The key is clamped with [`adjust_bounds`] first. With `transparent`
    /// the result is blended 50/50 over what `out` already holds.
    ///
    /// # Panics
    ///
    /// Panics if the buffers do not match the configured sizes, or if the
    /// clamped crop is smaller than 15x15 pixels or not inside the source.
    pub fn render(&self, key: &ClippingKey, source: &[u8], out: &mut [u8], transparent: bool) {
        assert_eq!(
            source.len(),
            self.source_w as usize * self.source_h as usize * 3,
            "source buffer does not match {}x{}",
            self.source_w,
            self.source_h
        );
        assert_eq!(out.len(), self.output_size(), "output buffer size mismatch");

        let key = adjust_bounds(
            *key,
            self.target_w,
            self.target_h,
            self.source_w,
            self.source_h,
        );
        let bbox = clipping_box(&key, self.target_w, self.target_h).occupied_area();
        let size = bbox.size();

        assert!(
            size.x >= MIN_CROP_SIDE && size.y >= MIN_CROP_SIDE,
            "crop too small: {}x{}",
            size.x,
            size.y
        );
        assert!(
            bbox[0].x >= 0.0
                && bbox[0].y >= 0.0
                && bbox[0].x + size.x < f64::from(self.source_w)
                && bbox[0].y + size.y < f64::from(self.source_h),
            "crop outside the source frame"
        );

        let region = if key.angle() == 0.0 {
            let (x, y) = (bbox[0].x as u32, bbox[0].y as u32);
            self.straight_region(source, x, y, size.x as u32, size.y as u32)
        } else {
            self.rotated_region(&key, source)
        };

        let resized = imageops::resize(&region, self.target_w, self.target_h, FilterType::Lanczos3);

        if transparent {
            out.iter_mut()
                .zip(resized.as_raw())
                .for_each(|(dst, src)| *dst = ((u16::from(*dst) + u16::from(*src)) / 2) as u8);
        } else {
            out.copy_from_slice(resized.as_raw());
        }
    }

    /// Copy the axis-aligned `w x h` block at `(x, y)` out of the source
    fn straight_region(&self, source: &[u8], x: u32, y: u32, w: u32, h: u32) -> RgbImage {
        let stride = self.source_w as usize * 3;
        let row_bytes = w as usize * 3;
        let mut region = RgbImage::new(w, h);

        region
            .chunks_exact_mut(row_bytes)
            .enumerate()
            .for_each(|(row, dst)| {
                let start = (y as usize + row) * stride + x as usize * 3;
                dst.copy_from_slice(&source[start..start + row_bytes]);
            });

        region
    }

    /// Sample the rotated crop into an upright `target * scale` image.
    ///
    /// Every output pixel is mapped back through the key rotation onto the
    /// source, so corners are never clipped the way an intermediate rotated
    /// buffer would clip them.
    fn rotated_region(&self, key: &ClippingKey, source: &[u8]) -> RgbImage {
        let width = ((f64::from(self.target_w) * key.scale) as u32).max(1);
        let height = ((f64::from(self.target_h) * key.scale) as u32).max(1);
        let (half_w, half_h) = (f64::from(width) / 2.0, f64::from(height) / 2.0);
        let angle = key.angle();

        let mut region = RgbImage::new(width, height);
        let row_bytes = width as usize * 3;

        region
            .par_chunks_mut(row_bytes)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, pixel) in row.chunks_exact_mut(3).enumerate() {
                    let offset = Point::new(x as f64 + 0.5 - half_w, y as f64 + 0.5 - half_h)
                        .rotate(angle);
                    let sample = self.sample_bilinear(
                        source,
                        key.px + offset.x - 0.5,
                        key.py + offset.y - 0.5,
                    );
                    pixel.copy_from_slice(&sample);
                }
            });

        region
    }

    fn sample_bilinear(&self, source: &[u8], fx: f64, fy: f64) -> [u8; 3] {
        let x0 = fx.floor() as i64;
        let y0 = fy.floor() as i64;
        let tx = fx - x0 as f64;
        let ty = fy - y0 as f64;

        let (w, h) = (i64::from(self.source_w), i64::from(self.source_h));
        let at = |x: i64, y: i64| {
            let i = (y.clamp(0, h - 1) * w + x.clamp(0, w - 1)) as usize * 3;
            [source[i], source[i + 1], source[i + 2]]
        };

        let p00 = at(x0, y0);
        let p10 = at(x0 + 1, y0);
        let p01 = at(x0, y0 + 1);
        let p11 = at(x0 + 1, y0 + 1);

        let lerp = |a: f64, b: f64, t: f64| a + (b - a) * t;

        std::array::from_fn(|c| {
            let top = lerp(f64::from(p00[c]), f64::from(p10[c]), tx);
            let bottom = lerp(f64::from(p01[c]), f64::from(p11[c]), tx);
            lerp(top, bottom, ty).round().clamp(0.0, 255.0) as u8
        })
    }
}
