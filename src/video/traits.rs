use crate::error::{DecodeError, EncodeError};

/// A seekable stream of decoded pictures.
///
/// Frame numbers are 1-based: after opening, the first picture is current and
/// `frame_number() == 1`. Seeking to 0 also lands on the first picture.
pub trait FrameSource {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    fn fps(&self) -> f64;

    /// Number of frames, possibly estimated from the container duration
    fn frame_count(&self) -> i64;

    /// Position of the current picture
    fn frame_number(&self) -> i64;

    /// Advance to the next picture. `false` means no more frames.
    fn next(&mut self) -> bool;

    fn seek_frame(&mut self, frame: i64);

    fn seek_time(&mut self, ms: i64);

    /// The current picture as packed RGB24, valid until the next move
    fn picture(&mut self) -> Result<&[u8], DecodeError>;

    /// Step one frame back
    fn prior(&mut self) {
        let position = self.frame_number();
        if position > 0 {
            self.seek_frame(position - 1);
        }
    }
}

/// Consumer of packed RGB24 pictures, in presentation order
pub trait FrameSink {
    fn frame(&mut self, rgb: &[u8]) -> Result<(), EncodeError>;

    /// Flush buffered output. Calling it again is a no-op.
    fn finish(&mut self) -> Result<(), EncodeError>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn width(&self) -> u32 {
        (**self).width()
    }

    fn height(&self) -> u32 {
        (**self).height()
    }

    fn fps(&self) -> f64 {
        (**self).fps()
    }

    fn frame_count(&self) -> i64 {
        (**self).frame_count()
    }

    fn frame_number(&self) -> i64 {
        (**self).frame_number()
    }

    fn next(&mut self) -> bool {
        (**self).next()
    }

    fn seek_frame(&mut self, frame: i64) {
        (**self).seek_frame(frame)
    }

    fn seek_time(&mut self, ms: i64) {
        (**self).seek_time(ms)
    }

    fn picture(&mut self) -> Result<&[u8], DecodeError> {
        (**self).picture()
    }
}
