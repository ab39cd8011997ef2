use std::path::Path;
use serde::{Deserialize, Serialize};

use crate::{
    clipping::conversion::{ConversionOptions, DEFAULT_MAX_MEMORY},
    error::{ConfigError, Result},
    video::{codecs::VideoCodec, PixelMode},
};

/// Main configuration for clip-cutter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Decoding settings
    pub decoder: DecoderConfig,

    /// Output encoding settings
    pub encoder: EncoderConfig,

    /// Clipping conversion settings
    pub conversion: ConversionConfig,

    /// Preview playback settings
    pub player: PlayerConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content)
            .map_err(|_| ConfigError::ParseFailed { path: path.display().to_string() })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::InvalidValue {
                key: "config".to_string(),
                value: e.to_string()
            })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.encoder.validate()?;
        self.conversion.validate()?;
        self.player.validate()?;
        Ok(())
    }
}

/// Decoder configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Color layout of decoded pictures (rgb, gray)
    pub pixel_mode: PixelMode,
}

/// Encoder configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Logical codec name (webm, mp4-x264, mp4-x265, mjpeg)
    pub codec: String,

    /// Bitrate in bits per second, derived from the output size when unset
    pub bitrate: Option<u64>,

    /// Output frame rate, the source frame rate when unset
    pub fps: Option<f64>,

    /// Output width, the clipping width when unset
    pub width: Option<u32>,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            codec: "mp4-x264".to_string(),
            bitrate: None,
            fps: None,
            width: None,
        }
    }
}

impl EncoderConfig {
    pub fn video_codec(&self) -> Result<VideoCodec> {
        Ok(self.codec.parse::<VideoCodec>()?)
    }

    fn validate(&self) -> Result<()> {
        if self.video_codec().is_err() {
            return Err(ConfigError::InvalidValue {
                key: "encoder.codec".to_string(),
                value: self.codec.clone()
            }.into());
        }

        if let Some(width) = self.width {
            if width == 0 || width % 2 != 0 {
                return Err(ConfigError::InvalidValue {
                    key: "encoder.width".to_string(),
                    value: width.to_string()
                }.into());
            }
        }

        if let Some(fps) = self.fps {
            if !fps.is_finite() || fps <= 0.0 {
                return Err(ConfigError::InvalidValue {
                    key: "encoder.fps".to_string(),
                    value: fps.to_string()
                }.into());
            }
        }

        Ok(())
    }
}

/// Clipping conversion configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Budget for rendered frames held in memory (bytes)
    pub max_memory: usize,

    /// Play the clipping from its first key to its last one
    pub from_start: bool,

    /// Follow the clip with its own reverse
    pub append_reverse: bool,

    /// Blend the first frame into the last one
    pub merge_frames: bool,

    /// Number of frames cross-faded at the loop point
    pub transition_frames: usize,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            max_memory: DEFAULT_MAX_MEMORY,
            from_start: true,
            append_reverse: false,
            merge_frames: false,
            transition_frames: 0,
        }
    }
}

impl ConversionConfig {
    pub fn options(&self) -> ConversionOptions {
        ConversionOptions {
            from_start: self.from_start,
            append_reverse: self.append_reverse,
            merge_frames: self.merge_frames,
            transition_frames: self.transition_frames,
            max_memory: self.max_memory,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.max_memory == 0 {
            return Err(ConfigError::InvalidValue {
                key: "conversion.max_memory".to_string(),
                value: self.max_memory.to_string()
            }.into());
        }

        if self.merge_frames && self.append_reverse {
            return Err(ConfigError::InvalidValue {
                key: "conversion.merge_frames".to_string(),
                value: "cannot be combined with append_reverse".to_string()
            }.into());
        }

        Ok(())
    }
}

/// Player configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Playback speed multiplier (0.2-5.0)
    pub speed: f64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self { speed: 1.0 }
    }
}

impl PlayerConfig {
    fn validate(&self) -> Result<()> {
        if !(0.2..=5.0).contains(&self.speed) {
            return Err(ConfigError::InvalidValue {
                key: "player.speed".to_string(),
                value: self.speed.to_string()
            }.into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.conversion.max_memory, 419_430_400);
        assert_eq!(config.encoder.codec, "mp4-x264");
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test_config.toml");

        let mut original_config = Config::default();
        original_config.decoder.pixel_mode = PixelMode::Gray;
        original_config.encoder.bitrate = Some(2_000_000);
        original_config.conversion.transition_frames = 6;

        original_config.save_to_file(&file_path).unwrap();
        let loaded_config = Config::from_file(&file_path).unwrap();

        assert_eq!(original_config, loaded_config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("partial.toml");
        std::fs::write(&file_path, "[encoder]\ncodec = \"webm\"\n").unwrap();

        let config = Config::from_file(&file_path).unwrap();
        assert_eq!(config.encoder.codec, "webm");
        assert_eq!(config.player.speed, 1.0);
        assert!(config.conversion.from_start);
    }

    #[test]
    fn test_missing_file() {
        let result = Config::from_file("/definitely/not/here.toml");
        assert!(matches!(
            result,
            Err(crate::error::CutterError::Config(ConfigError::FileNotFound { .. }))
        ));
    }

    #[test]
    fn test_invalid_codec() {
        let mut config = Config::default();
        config.encoder.codec = "divx".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_width() {
        let mut config = Config::default();
        config.encoder.width = Some(81);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_conversion() {
        let mut config = Config::default();
        config.conversion.max_memory = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.conversion.merge_frames = true;
        config.conversion.append_reverse = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_speed() {
        let mut config = Config::default();
        config.player.speed = 7.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_conversion_options() {
        let config = ConversionConfig {
            from_start: false,
            transition_frames: 3,
            ..ConversionConfig::default()
        };

        let options = config.options();
        assert!(!options.from_start);
        assert_eq!(options.transition_frames, 3);
        assert_eq!(options.max_memory, DEFAULT_MAX_MEMORY);
    }
}
