use std::collections::VecDeque;

use tracing::{debug, info};

use crate::error::{ClippingError, EncodeError, Result};
use crate::video::traits::{FrameSink, FrameSource};

use super::data::Clipping;
use super::iterator::ClippingIterator;

/// Default rendered-frame budget for a conversion, in bytes
pub const DEFAULT_MAX_MEMORY: usize = 419_430_400;

/// Receives progress reports from a long running conversion and decides
/// whether it should go on.
pub trait ProgressHandler {
    fn set_progress(&mut self, position: usize, max: usize);

    /// Latest rendered frame, for previews
    fn set_buffer(&mut self, _frame: &[u8], _w: u32, _h: u32) {}

    /// Polled once per frame
    fn canceled(&self) -> bool {
        false
    }
}

/// Progress handler that ignores every report
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressHandler for NoProgress {
    fn set_progress(&mut self, _position: usize, _max: usize) {}
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversionOptions {
    /// Play from the first key to the last one, or backwards
    pub from_start: bool,
    /// Follow the range with its own reverse
    pub append_reverse: bool,
    /// Blend the first frame into the last one. Ignored with `append_reverse`.
    pub merge_frames: bool,
    /// Cross-fade the last frames into the first ones
    pub transition_frames: usize,
    pub max_memory: usize,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            from_start: true,
            append_reverse: false,
            merge_frames: false,
            transition_frames: 0,
            max_memory: DEFAULT_MAX_MEMORY,
        }
    }
}

/// Batch export of a clipping: every frame is rendered and handed to a sink,
/// usually an encoder.
pub struct ClippingConversion<'a> {
    clipping: &'a Clipping,
    options: ConversionOptions,
}

impl<'a> ClippingConversion<'a> {
    pub fn new(clipping: &'a Clipping, options: ConversionOptions) -> Self {
        Self { clipping, options }
    }

    pub fn options(&self) -> &ConversionOptions {
        &self.options
    }

    /// Frames rendered from the source
    fn rendered_count(&self) -> usize {
        ClippingIterator::new(self.clipping, self.options.max_memory)
            .output_count(self.options.append_reverse)
    }

    fn transition_frames(&self) -> usize {
        self.options.transition_frames.min(self.rendered_count() / 2)
    }

    /// Frames the sink receives
    pub fn output_count(&self) -> usize {
        self.rendered_count() - self.transition_frames()
    }

    /// Render the clipping from `source` into `sink` and finish the sink.
    ///
    /// Returns the number of frames written. A cancel request from
    /// `progress` aborts with [`ClippingError::Canceled`] and leaves the sink
    /// unfinished. A clipping whose video geometry was never attached, or
    /// does not match `source`, fails with [`ClippingError::NoVideo`].
    pub fn convert<S, K, P>(&self, source: &mut S, sink: &mut K, progress: &mut P) -> Result<usize>
    where
        S: FrameSource + ?Sized,
        K: FrameSink + ?Sized,
        P: ProgressHandler + ?Sized,
    {
        let (w, h) = (self.clipping.w(), self.clipping.h());
        if w == 0 || h == 0 {
            return Err(ClippingError::InvalidDimensions { w, h }.into());
        }

        if !self.clipping.matches_video(source.width(), source.height()) {
            return Err(ClippingError::NoVideo.into());
        }

        let total = self.rendered_count();
        if total == 0 {
            return Err(ClippingError::EmptyRange.into());
        }

        let merge = self.options.merge_frames && !self.options.append_reverse;
        let mut pipeline = FramePipeline::new(self.transition_frames(), merge);
        let mut iterator = ClippingIterator::new(self.clipping, self.options.max_memory);

        info!(
            "Converting {} frame(s) of {} at {}x{}",
            total,
            self.clipping.video_path(),
            w,
            h
        );

        let mut position = 0;
        let mut canceled = false;
        let mut failure: Option<EncodeError> = None;

        let completed = iterator.iterate(
            source,
            self.options.from_start,
            self.options.append_reverse,
            |frame| {
                position += 1;
                progress.set_progress(position, total);
                progress.set_buffer(frame, w, h);

                if progress.canceled() {
                    canceled = true;
                    return false;
                }

                match pipeline.push(frame, &mut *sink) {
                    Ok(()) => true,
                    Err(e) => {
                        failure = Some(e);
                        false
                    }
                }
            },
        )?;

        if let Some(e) = failure {
            return Err(e.into());
        }

        if canceled || !completed {
            info!("Conversion canceled at frame {} of {}", position, total);
            return Err(ClippingError::Canceled.into());
        }

        let written = pipeline.finish(&mut *sink)?;
        sink.finish()?;

        debug!("Conversion wrote {} frame(s)", written);
        Ok(written)
    }
}

/// Holds back the frames the loop effects still need to touch before they
/// reach the sink.
struct FramePipeline {
    transition: usize,
    merge: bool,
    head: Vec<Vec<u8>>,
    first: Option<Vec<u8>>,
    delayed: VecDeque<Vec<u8>>,
    written: usize,
}

impl FramePipeline {
    fn new(transition: usize, merge: bool) -> Self {
        Self {
            transition,
            merge,
            head: Vec::with_capacity(transition),
            first: None,
            delayed: VecDeque::new(),
            written: 0,
        }
    }

    /// Frames that must stay queued until the end is known
    fn lag(&self) -> usize {
        self.transition + usize::from(self.merge)
    }

    fn push<K: FrameSink + ?Sized>(
        &mut self,
        frame: &[u8],
        sink: &mut K,
    ) -> std::result::Result<(), EncodeError> {
        if self.merge && self.first.is_none() {
            self.first = Some(frame.to_vec());
        }

        if self.head.len() < self.transition {
            self.head.push(frame.to_vec());
            return Ok(());
        }

        if self.lag() == 0 {
            self.written += 1;
            return sink.frame(frame);
        }

        self.delayed.push_back(frame.to_vec());
        while self.delayed.len() > self.lag() {
            if let Some(front) = self.delayed.pop_front() {
                sink.frame(&front)?;
                self.written += 1;
            }
        }

        Ok(())
    }

    fn finish<K: FrameSink + ?Sized>(
        &mut self,
        sink: &mut K,
    ) -> std::result::Result<usize, EncodeError> {
        let mut tail: Vec<Vec<u8>> = self.delayed.drain(..).collect();

        let start = tail.len().saturating_sub(self.head.len());
        let steps = (self.head.len() + 1) as f64;
        for (i, (frame, head)) in tail[start..].iter_mut().zip(&self.head).enumerate() {
            blend(frame, head, (i + 1) as f64 / steps);
        }

        if let (Some(first), Some(last)) = (&self.first, tail.last_mut()) {
            blend(last, first, 0.5);
        }

        for frame in &tail {
            sink.frame(frame)?;
            self.written += 1;
        }

        Ok(self.written)
    }
}

/// Mix `src` into `dst`; `alpha` is the weight of `src`
fn blend(dst: &mut [u8], src: &[u8], alpha: f64) {
    for (d, s) in dst.iter_mut().zip(src) {
        let mixed = f64::from(*d) + (f64::from(*s) - f64::from(*d)) * alpha;
        *d = mixed.round().clamp(0.0, 255.0) as u8;
    }
}
