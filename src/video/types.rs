use image::{ImageBuffer, RgbImage};
use serde::{Deserialize, Serialize};

/// A packed RGB24 picture.
///
/// Decoded frames, render targets and encoder inputs all share this layout:
/// `width * height * 3` bytes, rows tightly packed, no padding.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    buffer: RgbImage,
}

impl Frame {
    /// Create a frame from raw RGB bytes, `None` when the length does not match
    pub fn from_rgb_bytes(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        ImageBuffer::from_raw(width, height, data).map(|buffer| Self { buffer })
    }

    /// Save the frame as a PNG file
    pub fn save_png<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), image::ImageError> {
        self.buffer.save(path)
    }
}

/// Required size in bytes of a packed RGB24 buffer
pub fn rgb_buffer_size(width: u32, height: u32) -> usize {
    width as usize * height as usize * 3
}

/// Color layout the decoder converts pictures to.
///
/// Both modes produce RGB24 triplets; `Gray` replicates luminance across the
/// three channels so downstream code never branches on the mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelMode {
    #[default]
    Rgb,
    Gray,
}

/// Snapshot of a stream's cached properties
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub duration: f64,
    pub frame_count: i64,
    pub aspect_ratio: (i32, i32),
    pub time_base: (i32, i32),
    pub codec: String,
}

impl Default for StreamInfo {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            fps: 0.0,
            duration: 0.0,
            frame_count: 0,
            aspect_ratio: (1, 1),
            time_base: (1, 1),
            codec: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_from_bytes_and_png() {
        let data: Vec<u8> = [10, 20, 30].repeat(8);
        assert_eq!(data.len(), rgb_buffer_size(4, 2));
        assert!(Frame::from_rgb_bytes(4, 2, vec![0; 5]).is_none());

        let frame = Frame::from_rgb_bytes(4, 2, data).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        frame.save_png(&path).unwrap();

        let saved = image::open(&path).unwrap().to_rgb8();
        assert_eq!(saved.dimensions(), (4, 2));
        assert_eq!(saved.get_pixel(3, 1).0, [10, 20, 30]);
    }

    #[test]
    fn test_pixel_mode_serde() {
        let mode: PixelMode = serde_json::from_str("\"gray\"").unwrap();
        assert_eq!(mode, PixelMode::Gray);
        assert_eq!(PixelMode::default(), PixelMode::Rgb);
    }
}
