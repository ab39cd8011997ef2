use std::path::Path;

use ffmpeg_next as ffmpeg;
use ffmpeg::format::{context::Input, Pixel};
use ffmpeg::software::scaling::{context::Context as Scaler, flag::Flags};
use ffmpeg::util::frame::video::Video;
use ffmpeg::{codec, media, Packet, Rational, Rescale};
use tracing::{debug, info, warn};

use crate::error::{DecodeError, OpenError};
use crate::video::traits::FrameSource;
use crate::video::types::{rgb_buffer_size, PixelMode, StreamInfo};

/// Below this a frame rate or duration is treated as missing
const DEGENERATE: f64 = 0.000025;

/// Back-off ceiling for the seek refinement loop
const MAX_SEEK_DELTA: i64 = (i32::MAX / 4) as i64;

fn r2d(r: Rational) -> f64 {
    if r.numerator() == 0 || r.denominator() == 0 {
        0.0
    } else {
        r.numerator() as f64 / r.denominator() as f64
    }
}

/// Timestamp of a decoded frame. A zero PTS counts as unset, like NOPTS, and
/// falls back to the DTS.
fn presentation_timestamp(pts: Option<i64>, dts: Option<i64>) -> i64 {
    match pts {
        Some(value) if value != 0 => value,
        _ => dts.unwrap_or(0),
    }
}

/// Lazily built conversion from the codec's native format to packed RGB24
struct PictureConverter {
    scaler: Scaler,
    converted: Video,
    source: (Pixel, u32, u32),
    rgb: Vec<u8>,
}

impl PictureConverter {
    fn new(mode: PixelMode, frame: &Video) -> Result<Self, DecodeError> {
        let target = match mode {
            PixelMode::Rgb => Pixel::RGB24,
            PixelMode::Gray => Pixel::GRAY8,
        };
        let scaler = Scaler::get(
            frame.format(),
            frame.width(),
            frame.height(),
            target,
            frame.width(),
            frame.height(),
            Flags::FAST_BILINEAR,
        )
        .map_err(|e| DecodeError::PictureFailed {
            reason: e.to_string(),
        })?;

        Ok(Self {
            scaler,
            converted: Video::empty(),
            source: (frame.format(), frame.width(), frame.height()),
            rgb: vec![0; rgb_buffer_size(frame.width(), frame.height())],
        })
    }

    fn matches(&self, frame: &Video) -> bool {
        self.source == (frame.format(), frame.width(), frame.height())
    }

    fn run(&mut self, mode: PixelMode, frame: &Video) -> Result<(), DecodeError> {
        self.scaler
            .run(frame, &mut self.converted)
            .map_err(|e| DecodeError::PictureFailed {
                reason: e.to_string(),
            })?;

        let width = frame.width() as usize;
        let stride = self.converted.stride(0);
        let data = self.converted.data(0);

        for (y, row) in self.rgb.chunks_exact_mut(width * 3).enumerate() {
            let line = &data[y * stride..];
            match mode {
                PixelMode::Rgb => row.copy_from_slice(&line[..width * 3]),
                PixelMode::Gray => {
                    for (pixel, luma) in row.chunks_exact_mut(3).zip(&line[..width]) {
                        pixel.fill(*luma);
                    }
                }
            }
        }

        Ok(())
    }
}

/// Frame-accurate reader for the best video stream of a media file.
///
/// Owns the demuxer, the codec context and the current decoded frame.
/// Positions are 1-based; see [`FrameSource`].
pub struct Decoder {
    path: String,
    input: Input,
    decoder: ffmpeg::decoder::Video,
    stream_index: usize,
    time_base: Rational,
    start_time: i64,
    stream_frames: i64,
    mode: PixelMode,
    frame: Video,
    converter: Option<PictureConverter>,
    dirty: bool,
    eof_sent: bool,
    width: u32,
    height: u32,
    fps: f64,
    duration: f64,
    first_frame: i64,
    frame_count: i64,
    frame_number: i64,
    frame_pts: i64,
    key_frame: bool,
    is_mjpeg: bool,
}

impl Decoder {
    /// Open `path` and decode its first frame as RGB
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, OpenError> {
        Self::open_with_mode(path, PixelMode::Rgb)
    }

    pub fn open_with_mode<P: AsRef<Path>>(path: P, mode: PixelMode) -> Result<Self, OpenError> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        if !path.exists() {
            return Err(OpenError::NotFound { path: path_str });
        }

        ffmpeg::init().map_err(|e| OpenError::InvalidContainer {
            path: path_str.clone(),
            reason: e.to_string(),
        })?;

        let input = ffmpeg::format::input(&path).map_err(|e| OpenError::InvalidContainer {
            path: path_str.clone(),
            reason: e.to_string(),
        })?;

        let (stream_index, time_base, start_time, stream_frames, duration, fps, parameters) = {
            let stream = input
                .streams()
                .best(media::Type::Video)
                .ok_or_else(|| OpenError::NoVideoStream {
                    path: path_str.clone(),
                })?;

            let time_base = stream.time_base();
            let start_time = match stream.start_time() {
                ffmpeg::ffi::AV_NOPTS_VALUE => 0,
                value => value,
            };
            let duration = if stream.duration() > 0 {
                stream.duration() as f64 * r2d(time_base)
            } else {
                0.0
            };

            let mut fps = r2d(stream.rate());
            if fps < DEGENERATE {
                fps = r2d(stream.avg_frame_rate());
            }

            (
                stream.index(),
                time_base,
                start_time,
                stream.frames(),
                duration,
                fps,
                stream.parameters(),
            )
        };

        let context = codec::context::Context::from_parameters(parameters).map_err(|e| {
            OpenError::CodecOpenFailed {
                path: path_str.clone(),
                reason: e.to_string(),
            }
        })?;
        let decoder = context
            .decoder()
            .video()
            .map_err(|e| OpenError::CodecOpenFailed {
                path: path_str.clone(),
                reason: e.to_string(),
            })?;

        let is_mjpeg = decoder.id() == codec::Id::MJPEG;

        let mut this = Self {
            path: path_str.clone(),
            width: decoder.width(),
            height: decoder.height(),
            input,
            decoder,
            stream_index,
            time_base,
            start_time,
            stream_frames,
            mode,
            frame: Video::empty(),
            converter: None,
            dirty: false,
            eof_sent: false,
            fps,
            duration,
            first_frame: 0,
            frame_count: 0,
            frame_number: 0,
            frame_pts: 0,
            key_frame: false,
            is_mjpeg: false,
        };

        if !this.next() {
            return Err(OpenError::FirstFrameFailed { path: path_str });
        }

        this.first_frame = this.frame_from_pts();
        this.is_mjpeg = is_mjpeg;
        this.frame_number = 1;

        info!(
            "Opened {}: {}x{} @ {:.3} fps, {} frames, {:.2}s",
            this.path, this.width, this.height, this.fps, this.frame_count, this.duration
        );

        Ok(this)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn pixel_mode(&self) -> PixelMode {
        self.mode
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Presentation timestamp of the current frame, in stream time base units
    pub fn frame_pts(&self) -> i64 {
        self.frame_pts
    }

    /// Seconds from the stream start to the current frame
    pub fn frame_time(&self) -> f64 {
        (self.frame_pts - self.start_time) as f64 * r2d(self.time_base)
    }

    /// Sample aspect ratio as `(numerator, denominator)`, `(1, 1)` when unset
    pub fn aspect_ratio(&self) -> (i32, i32) {
        let ratio = self.decoder.aspect_ratio();
        if ratio.numerator() == 0 || ratio.denominator() == 0 {
            (1, 1)
        } else {
            (ratio.numerator(), ratio.denominator())
        }
    }

    pub fn time_base(&self) -> (i32, i32) {
        (self.time_base.numerator(), self.time_base.denominator())
    }

    pub fn is_key_frame(&self) -> bool {
        self.key_frame
    }

    /// Codecs whose every frame is independently decodable (MJPEG)
    pub fn is_special_codec(&self) -> bool {
        self.is_mjpeg
    }

    pub fn info(&self) -> StreamInfo {
        StreamInfo {
            width: self.width,
            height: self.height,
            fps: self.fps,
            duration: self.duration,
            frame_count: self.frame_count,
            aspect_ratio: self.aspect_ratio(),
            time_base: self.time_base(),
            codec: self.decoder.id().name().to_string(),
        }
    }

    fn frame_from_pts(&self) -> i64 {
        (self.fps * self.frame_time() + 0.5) as i64
    }

    /// Seek the container to a stream timestamp at or before `timestamp`
    fn seek_container(&mut self, timestamp: i64) {
        let position = timestamp.rescale(self.time_base, ffmpeg::rescale::TIME_BASE);
        if let Err(e) = self.input.seek(position, ..position) {
            debug!("Seek to {} failed: {}", timestamp, e);
        }
        self.decoder.flush();
        self.eof_sent = false;
    }

    /// Pull the next decoded picture of the selected stream into `self.frame`
    fn decode_next(&mut self) -> Option<(Option<i64>, Option<i64>)> {
        loop {
            let mut packet = Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) => {}
                Err(ffmpeg::Error::Eof) => {
                    if !self.eof_sent {
                        self.eof_sent = true;
                        if let Err(e) = self.decoder.send_eof() {
                            debug!("Could not drain decoder: {}", e);
                        }
                    }
                    return match self.decoder.receive_frame(&mut self.frame) {
                        Ok(()) => Some((self.frame.pts(), None)),
                        Err(_) => {
                            debug!("End of stream reached in {}", self.path);
                            None
                        }
                    };
                }
                Err(e) => {
                    debug!("Packet read failed in {}: {}", self.path, e);
                    return None;
                }
            }

            if packet.stream() != self.stream_index {
                continue;
            }

            let timestamps = (packet.pts(), packet.dts());

            match self.decoder.send_packet(&packet) {
                Ok(()) => {}
                Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::util::error::EAGAIN => {
                    continue
                }
                Err(ffmpeg::Error::Eof) => return None,
                Err(e) => {
                    warn!("Decoding failed in {}: {}", self.path, e);
                    return None;
                }
            }

            match self.decoder.receive_frame(&mut self.frame) {
                Ok(()) => return Some(timestamps),
                Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::util::error::EAGAIN => {}
                Err(ffmpeg::Error::Eof) => {}
                Err(e) => {
                    warn!("Decoding failed in {}: {}", self.path, e);
                    return None;
                }
            }
        }
    }

    fn estimate_frame_count(&self) -> i64 {
        if self.stream_frames > 0 {
            return self.stream_frames;
        }

        let mut duration = self.input.duration() as f64 / ffmpeg::ffi::AV_TIME_BASE as f64;
        if duration < DEGENERATE {
            duration = self.duration;
        }

        (duration * self.fps + 0.5).floor() as i64
    }
}

impl FrameSource for Decoder {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn frame_count(&self) -> i64 {
        self.frame_count
    }

    fn frame_number(&self) -> i64 {
        self.frame_number
    }

    fn next(&mut self) -> bool {
        if self.frame_number + 1 == self.frame_count {
            return false;
        }

        let Some((pts, dts)) = self.decode_next() else {
            return false;
        };

        self.dirty = true;
        self.key_frame = self.frame.is_key();
        self.frame_count = self.estimate_frame_count();
        self.frame_pts = presentation_timestamp(pts, dts);
        self.frame_number += 1;

        true
    }

    fn seek_frame(&mut self, frame: i64) {
        let target = frame.min(self.frame_count);
        self.frame_number = 0;

        let mut delta: i64 = 16;

        loop {
            let approximate = (target - delta).max(0);
            let seconds = if self.fps > 0.0 {
                approximate as f64 / self.fps
            } else {
                0.0
            };
            let time_base = r2d(self.time_base);
            let offset = if time_base > 0.0 {
                (seconds / time_base + 0.5) as i64
            } else {
                0
            };

            self.seek_container(self.start_time + offset);

            if target <= 0 {
                self.frame_number = 0;
                break;
            }

            self.next();

            if target == 1 {
                self.frame_number = 1;
                break;
            }

            self.frame_number = self.frame_from_pts() - self.first_frame;

            if self.frame_number < 0 || self.frame_number > target - 1 {
                if approximate == 0 || delta >= MAX_SEEK_DELTA {
                    break;
                }
                delta = if delta < 16 { delta * 2 } else { delta * 3 / 2 };
                debug!("Seek to frame {} overshot, backing off {} frames", target, delta);
                continue;
            }

            while self.frame_number < target - 1 {
                if !self.next() {
                    break;
                }
            }
            self.frame_number += 1;
            break;
        }

        if frame == 0 {
            self.next();
        }
    }

    fn seek_time(&mut self, ms: i64) {
        if ms == 0 {
            self.frame_number = 0;
            self.seek_container(self.start_time);
            self.next();
            return;
        }

        let frame = ((ms as f64 / 1000.0) * self.fps + 0.5) as i64;
        self.seek_frame(frame);
    }

    fn picture(&mut self) -> Result<&[u8], DecodeError> {
        let stale = self
            .converter
            .as_ref()
            .map_or(true, |converter| !converter.matches(&self.frame));

        if stale {
            self.converter = Some(PictureConverter::new(self.mode, &self.frame)?);
            self.dirty = true;
        }

        let converter = self.converter.as_mut().ok_or(DecodeError::NotOpen)?;

        if self.dirty {
            converter.run(self.mode, &self.frame)?;
            self.dirty = false;
        }

        Ok(&converter.rgb)
    }
}
