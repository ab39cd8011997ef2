use ffmpeg_next as ffmpeg;
use ffmpeg::format::{context::Output, Pixel};
use ffmpeg::software::scaling::{context::Context as Scaler, flag::Flags};
use ffmpeg::util::frame::video::Video;
use ffmpeg::{codec, Packet, Rational};
use tracing::{debug, info, warn};

use crate::error::EncodeError;
use crate::video::codecs::{default_bitrate, VideoCodec};
use crate::video::traits::FrameSink;
use crate::video::types::rgb_buffer_size;

const KEY_FRAME_INTERVAL: u32 = 10;
const MAX_B_FRAMES: usize = 1;

fn codec_id(kind: VideoCodec) -> codec::Id {
    match kind {
        VideoCodec::Mjpeg => codec::Id::MJPEG,
        VideoCodec::X264 => codec::Id::H264,
        VideoCodec::X265 => codec::Id::HEVC,
        VideoCodec::Vp9 => codec::Id::VP9,
        VideoCodec::Av1 => codec::Id::AV1,
    }
}

/// Output parameters for an [`Encoder`].
///
/// The time base is `fps_num / fps_den` seconds per tick and one frame lasts
/// one tick, so 24 fps is expressed as `fps_num = 1000, fps_den = 24000`.
/// A zero `bitrate` selects [`default_bitrate`] for the codec.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderSettings {
    pub codec: String,
    pub path: String,
    pub width: u32,
    pub height: u32,
    pub fps_num: i32,
    pub fps_den: i32,
    pub bitrate: u64,
}

impl EncoderSettings {
    pub fn new(codec: &str, path: &str, width: u32, height: u32, fps: f64, bitrate: u64) -> Self {
        Self {
            codec: codec.to_string(),
            path: path.to_string(),
            width,
            height,
            fps_num: 1000,
            fps_den: (fps * 1000.0).round() as i32,
            bitrate,
        }
    }
}

/// Everything that exists only while the encoder is open
struct Session {
    output: Output,
    encoder: ffmpeg::codec::encoder::video::Encoder,
    scaler: Scaler,
    source: Video,
    frame: Video,
    encoder_tb: Rational,
    stream_tb: Rational,
}

impl Session {
    fn open(kind: VideoCodec, settings: &EncoderSettings) -> Result<Self, EncodeError> {
        let (width, height) = (settings.width, settings.height);

        if width % 2 != 0 {
            return Err(EncodeError::OddWidth { width });
        }

        ffmpeg::init().map_err(|_| EncodeError::FormatContext)?;

        let ffcodec = ffmpeg::encoder::find(codec_id(kind)).ok_or(EncodeError::CodecNotFound)?;

        let mut output = ffmpeg::format::output_as(&settings.path, kind.container())
            .map_err(|e| {
                warn!("Could not create {}: {}", settings.path, e);
                EncodeError::OutputOpen
            })?;

        let global_header = output
            .format()
            .flags()
            .contains(ffmpeg::format::Flags::GLOBAL_HEADER);

        let mut context = codec::context::Context::new_with_codec(ffcodec)
            .encoder()
            .video()
            .map_err(|_| EncodeError::CodecContext)?;

        let time_base = Rational::new(settings.fps_num, settings.fps_den);
        context.set_width(width);
        context.set_height(height);
        context.set_time_base(time_base);
        context.set_frame_rate(Some(time_base.invert()));

        if kind == VideoCodec::Mjpeg {
            context.set_format(Pixel::YUVJ422P);
        } else {
            context.set_format(Pixel::YUV420P);
            context.set_max_b_frames(MAX_B_FRAMES);
        }

        let bitrate = match settings.bitrate {
            0 => default_bitrate(kind, width, height, time_base.invert().into()),
            bitrate => bitrate,
        };

        context.set_gop(KEY_FRAME_INTERVAL);
        context.set_bit_rate(bitrate as usize);
        context.set_tolerance((bitrate as f64 * 0.05) as usize);

        if global_header {
            context.set_flags(codec::Flags::GLOBAL_HEADER);
        }

        let mut options = ffmpeg::Dictionary::new();
        match kind {
            VideoCodec::X264 | VideoCodec::X265 => options.set("preset", "slow"),
            VideoCodec::Vp9 => options.set("cpu-used", "1"),
            _ => {}
        }

        let encoder = context
            .open_as_with(ffcodec, options)
            .map_err(|_| EncodeError::CodecOpen)?;

        {
            let mut stream = output
                .add_stream(ffcodec)
                .map_err(|_| EncodeError::StreamAllocation)?;
            stream.set_parameters(&encoder);
            stream.set_time_base(time_base);
        }

        let scaler = Scaler::get(
            Pixel::RGB24,
            width,
            height,
            encoder.format(),
            width,
            height,
            Flags::BILINEAR,
        )
        .map_err(|_| EncodeError::ColorConversion)?;

        let source = Video::new(Pixel::RGB24, width, height);
        let frame = Video::new(encoder.format(), width, height);
        if source.is_empty() || frame.is_empty() {
            return Err(EncodeError::FrameAllocation);
        }

        output.write_header().map_err(|_| EncodeError::HeaderWrite)?;

        // The muxer may adjust the stream time base while writing the header
        let stream_tb = output
            .stream(0)
            .map(|stream| stream.time_base())
            .ok_or(EncodeError::StreamConfiguration)?;

        Ok(Self {
            output,
            encoder_tb: time_base,
            stream_tb,
            encoder,
            scaler,
            source,
            frame,
        })
    }

    fn submit(&mut self, rgb: &[u8], pts: i64) -> Result<(), EncodeError> {
        let row_bytes = self.source.width() as usize * 3;
        let stride = self.source.stride(0);
        let data = self.source.data_mut(0);

        for (y, row) in rgb.chunks_exact(row_bytes).enumerate() {
            data[y * stride..y * stride + row_bytes].copy_from_slice(row);
        }

        self.scaler
            .run(&self.source, &mut self.frame)
            .map_err(|_| EncodeError::EncodeFrame)?;
        self.frame.set_pts(Some(pts));

        self.encoder
            .send_frame(&self.frame)
            .map_err(|_| EncodeError::EncodeFrame)?;

        self.write_packets()
    }

    /// Move every packet the codec has ready into the container
    fn write_packets(&mut self) -> Result<(), EncodeError> {
        let mut packet = Packet::empty();

        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(0);
            packet.rescale_ts(self.encoder_tb, self.stream_tb);
            packet
                .write_interleaved(&mut self.output)
                .map_err(|_| EncodeError::WriteFrame)?;
        }

        Ok(())
    }

    fn finish(&mut self) -> Result<(), EncodeError> {
        self.encoder.send_eof().map_err(|_| EncodeError::EncodeFrame)?;
        self.write_packets()?;
        self.output
            .write_trailer()
            .map_err(|_| EncodeError::WriteFrame)
    }
}

enum EncoderState {
    Opened(Box<Session>),
    Finished,
    Failed(EncodeError),
}

/// Writes packed RGB24 frames into a compressed video file.
///
/// Any configuration failure leaves the encoder in a failed state: it never
/// opens and every later call reports the same error.
pub struct Encoder {
    codec: Option<VideoCodec>,
    settings: EncoderSettings,
    state: EncoderState,
    frame_pts: i64,
}

impl Encoder {
    /// Configure codec, stream and output file. Check [`Encoder::error`] for
    /// the outcome, or use [`Encoder::create`] to get a `Result` directly.
    pub fn configure(settings: EncoderSettings) -> Self {
        let opened = settings
            .codec
            .parse::<VideoCodec>()
            .and_then(|codec| Session::open(codec, &settings).map(|session| (codec, session)));

        let (codec, state) = match opened {
            Ok((codec, session)) => {
                info!(
                    "Encoding {} {}x{} into {} ({} bps)",
                    codec, settings.width, settings.height, settings.path, settings.bitrate
                );
                (Some(codec), EncoderState::Opened(Box::new(session)))
            }
            Err(e) => {
                warn!("Could not configure encoder for {}: {}", settings.path, e);
                (settings.codec.parse().ok(), EncoderState::Failed(e))
            }
        };

        Self {
            codec,
            settings,
            state,
            frame_pts: 0,
        }
    }

    pub fn create(settings: EncoderSettings) -> Result<Self, EncodeError> {
        let encoder = Self::configure(settings);
        match encoder.error() {
            Some(e) => Err(e.clone()),
            None => Ok(encoder),
        }
    }

    pub fn codec(&self) -> Option<VideoCodec> {
        self.codec
    }

    pub fn settings(&self) -> &EncoderSettings {
        &self.settings
    }

    pub fn is_opened(&self) -> bool {
        matches!(self.state, EncoderState::Opened(_))
    }

    /// Sticky configuration or runtime error
    pub fn error(&self) -> Option<&EncodeError> {
        match &self.state {
            EncoderState::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// Number of frames submitted so far
    pub fn frame_pts(&self) -> i64 {
        self.frame_pts
    }
}

impl FrameSink for Encoder {
    fn frame(&mut self, rgb: &[u8]) -> Result<(), EncodeError> {
        let session = match &mut self.state {
            EncoderState::Opened(session) => session,
            EncoderState::Finished => return Err(EncodeError::NotOpened),
            EncoderState::Failed(e) => return Err(e.clone()),
        };

        let expected = rgb_buffer_size(self.settings.width, self.settings.height);
        if rgb.len() != expected {
            return Err(EncodeError::InvalidBuffer {
                expected,
                actual: rgb.len(),
            });
        }

        let pts = self.frame_pts;
        self.frame_pts += 1;

        if let Err(e) = session.submit(rgb, pts) {
            warn!("Encoding frame {} failed: {}", pts, e);
            self.state = EncoderState::Failed(e.clone());
            return Err(e);
        }

        Ok(())
    }

    fn finish(&mut self) -> Result<(), EncodeError> {
        match std::mem::replace(&mut self.state, EncoderState::Finished) {
            EncoderState::Opened(mut session) => {
                let result = session.finish();
                match &result {
                    Ok(()) => info!("Finished {} after {} frames", self.settings.path, self.frame_pts),
                    Err(e) => self.state = EncoderState::Failed(e.clone()),
                }
                result
            }
            EncoderState::Finished => {
                debug!("Encoder for {} already finished", self.settings.path);
                Ok(())
            }
            EncoderState::Failed(e) => {
                self.state = EncoderState::Failed(e.clone());
                Err(e)
            }
        }
    }
}

impl Drop for Encoder {
    fn drop(&mut self) {
        if self.is_opened() {
            if let Err(e) = self.finish() {
                warn!("Could not finish {}: {}", self.settings.path, e);
            }
        }
    }
}
