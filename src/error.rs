use thiserror::Error;

/// Main error type for the clip-cutter library
#[derive(Error, Debug)]
pub enum CutterError {
    #[error("Could not open video: {0}")]
    Open(#[from] OpenError),

    #[error("Video decoding error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Video encoding error: {0}")]
    Encode(#[from] EncodeError),

    #[error("Clipping error: {0}")]
    Clipping(#[from] ClippingError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Failures while opening a media file. The decoder is unusable afterwards.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OpenError {
    #[error("File not found: {path}")]
    NotFound { path: String },

    #[error("Could not parse container {path}: {reason}")]
    InvalidContainer { path: String, reason: String },

    #[error("No video stream in {path}")]
    NoVideoStream { path: String },

    #[error("Could not open codec for {path}: {reason}")]
    CodecOpenFailed { path: String, reason: String },

    #[error("Could not decode the first frame of {path}")]
    FirstFrameFailed { path: String },
}

/// Errors produced while materializing a decoded picture
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("The stream is not open")]
    NotOpen,

    #[error("Picture conversion failed: {reason}")]
    PictureFailed { reason: String },
}

/// Encoder errors. The configuration variants are sticky: an encoder that
/// reports one of them never reaches the opened state.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodeError {
    #[error("Invalid codec name: {name}")]
    InvalidCodecName { name: String },

    #[error("Could not find a supported codec")]
    CodecNotFound,

    #[error("The video width must be multiple of 2")]
    OddWidth { width: u32 },

    #[error("Could not allocate format context")]
    FormatContext,

    #[error("Could not allocate the video stream")]
    StreamAllocation,

    #[error("Could not allocate a context for the codec")]
    CodecContext,

    #[error("Could not open codec")]
    CodecOpen,

    #[error("Could not configure media stream")]
    StreamConfiguration,

    #[error("Could not allocate the frame image")]
    FrameAllocation,

    #[error("Could not allocate color conversion context")]
    ColorConversion,

    #[error("Could not open the output file")]
    OutputOpen,

    #[error("Could not write to the output file")]
    HeaderWrite,

    #[error("Encoder is not opened")]
    NotOpened,

    #[error("Error encoding frame")]
    EncodeFrame,

    #[error("Error writing frame")]
    WriteFrame,

    #[error("Invalid frame buffer: expected {expected} bytes, got {actual}")]
    InvalidBuffer { expected: usize, actual: usize },
}

impl EncodeError {
    /// Configuration failures leave the encoder permanently unopened
    pub fn is_configuration(&self) -> bool {
        !matches!(
            self,
            Self::NotOpened | Self::EncodeFrame | Self::WriteFrame | Self::InvalidBuffer { .. }
        )
    }
}

/// Clipping model errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClippingError {
    #[error("Failed to parse clipping: {reason}")]
    ParseFailed { reason: String },

    #[error("Invalid output dimensions: {w}x{h}")]
    InvalidDimensions { w: u32, h: u32 },

    #[error("The clipping has no video attached")]
    NoVideo,

    #[error("The frame range is empty")]
    EmptyRange,

    #[error("Operation canceled")]
    Canceled,
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}")]
    ParseFailed { path: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {key}")]
    MissingKey { key: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Convenience type alias for Results using CutterError
pub type Result<T> = std::result::Result<T, CutterError>;

impl CutterError {
    /// Create a generic error with a custom message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    /// Check if this error is recoverable (can be retried)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io(_) => true,
            Self::Open(OpenError::NotFound { .. }) => true,
            Self::Encode(EncodeError::OutputOpen) => true,
            Self::Clipping(ClippingError::Canceled) => true,
            _ => false,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Open(OpenError::NotFound { path }) => {
                format!("Could not open '{}'. Please check the file exists.", path)
            }
            Self::Open(OpenError::NoVideoStream { path }) => {
                format!("'{}' does not contain a video stream.", path)
            }
            Self::Encode(EncodeError::InvalidCodecName { name }) => {
                format!(
                    "Codec '{}' is not supported. Available codecs: {}",
                    name,
                    crate::video::codecs::format_names().join(", ")
                )
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_error_messages() {
        assert_eq!(
            EncodeError::OddWidth { width: 81 }.to_string(),
            "The video width must be multiple of 2"
        );
        assert_eq!(EncodeError::NotOpened.to_string(), "Encoder is not opened");
        assert_eq!(
            EncodeError::HeaderWrite.to_string(),
            "Could not write to the output file"
        );
    }

    #[test]
    fn test_configuration_classification() {
        assert!(EncodeError::CodecNotFound.is_configuration());
        assert!(EncodeError::OutputOpen.is_configuration());
        assert!(!EncodeError::WriteFrame.is_configuration());
        assert!(!EncodeError::NotOpened.is_configuration());
    }

    #[test]
    fn test_user_message_lists_codecs() {
        let err: CutterError = EncodeError::InvalidCodecName { name: "divx".into() }.into();
        let message = err.user_message();
        assert!(message.contains("divx"));
        assert!(message.contains("mp4-x264"));
        assert!(!err.is_recoverable());
    }
}
