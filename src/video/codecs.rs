//! Logical codec names accepted by the encoder and their container mapping.

use std::fmt;
use std::str::FromStr;

use crate::error::EncodeError;

const VP9_CODEC: &str = "webm";
const X264_CODEC: &str = "mp4-x264";
const X265_CODEC: &str = "mp4-x265";
const AV1_CODEC: &str = "aom-av1";
const MJPEG_CODEC: &str = "mjpeg";

/// Camera motion estimate used by [`default_bitrate`], from 1 (static) to 4
const MOTION_RANK: f32 = 3.0;

/// Codecs the encoder can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VideoCodec {
    Vp9,
    X264,
    X265,
    /// Reserved, not offered through [`format_names`]
    Av1,
    Mjpeg,
}

impl VideoCodec {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Vp9 => VP9_CODEC,
            Self::X264 => X264_CODEC,
            Self::X265 => X265_CODEC,
            Self::Av1 => AV1_CODEC,
            Self::Mjpeg => MJPEG_CODEC,
        }
    }

    /// Muxer short name for the output container
    pub fn container(&self) -> &'static str {
        match self {
            Self::Mjpeg | Self::X264 | Self::X265 => "mp4",
            Self::Vp9 | Self::Av1 => "webm",
        }
    }

    /// Whether the codec may reorder frames (B-frames)
    pub fn uses_b_frames(&self) -> bool {
        !matches!(self, Self::Mjpeg)
    }

    fn bitrate_ratio(&self) -> f32 {
        match self {
            Self::Mjpeg => 3.0 / 5.5,
            Self::X264 => MOTION_RANK * 0.07,
            Self::X265 => MOTION_RANK * 0.04,
            Self::Vp9 => MOTION_RANK * 0.065,
            Self::Av1 => MOTION_RANK * 0.035,
        }
    }
}

impl FromStr for VideoCodec {
    type Err = EncodeError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            VP9_CODEC => Ok(Self::Vp9),
            X264_CODEC => Ok(Self::X264),
            X265_CODEC => Ok(Self::X265),
            AV1_CODEC => Ok(Self::Av1),
            MJPEG_CODEC => Ok(Self::Mjpeg),
            _ => Err(EncodeError::InvalidCodecName {
                name: name.to_string(),
            }),
        }
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Codec names offered to users
pub fn format_names() -> &'static [&'static str] {
    &[VP9_CODEC, X265_CODEC, MJPEG_CODEC, X264_CODEC]
}

/// Suggested bitrate in bits per second for a `w` x `h` stream at `fps`
pub fn default_bitrate(codec: VideoCodec, w: u32, h: u32, fps: f64) -> u64 {
    let raw_size = (fps * w as f64 * h as f64) as u64;
    (raw_size as f32 * codec.bitrate_ratio()) as u64
}
