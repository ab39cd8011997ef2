use tracing::debug;

use crate::error::{ClippingError, DecodeError, Result};
use crate::video::traits::FrameSource;

use super::buffers::FrameStack;
use super::data::Clipping;
use super::render::ClippingRender;

/// Streams the rendered frames of a clipping through a callback while
/// keeping at most `max_memory` bytes of rendered frames around.
///
/// Forward playback needs a single render buffer. Reverse playback decodes
/// forward in chunks that fit the budget and replays each chunk backwards.
/// When the whole range fits, every frame is rendered once up front and
/// reported from memory.
pub struct ClippingIterator<'a> {
    clipping: &'a Clipping,
    render: ClippingRender,
    max_memory: usize,
    frame: Vec<u8>,
}

impl<'a> ClippingIterator<'a> {
    pub fn new(clipping: &'a Clipping, max_memory: usize) -> Self {
        let render = ClippingRender::for_clipping(clipping);
        Self {
            clipping,
            frame: vec![0; render.output_size()],
            render,
            max_memory,
        }
    }

    /// How many rendered frames of a `frame_count` range fit the budget
    pub fn buffer_count(&self, frame_count: usize) -> usize {
        let per_frame = self.render.output_size().max(1);
        (self.max_memory / per_frame).clamp(1, frame_count.max(1))
    }

    /// First and last frame to visit, in visiting order
    pub fn frame_range(&self, from_start: bool) -> (u32, u32) {
        let (first, last) = (self.clipping.first_frame(), self.clipping.last_frame());
        if from_start {
            (first, last)
        } else {
            (last, first)
        }
    }

    /// Number of frames [`ClippingIterator::iterate`] reports when run to
    /// completion
    pub fn output_count(&self, append_reverse: bool) -> usize {
        let (from, to) = self.frame_range(true);
        if to <= from {
            return 0;
        }

        let frames = (to - from + 1) as usize;
        if append_reverse {
            frames * 2 - 2
        } else {
            frames
        }
    }

    /// Render every frame of the clipping in order and hand it to `cb`.
    ///
    /// With `append_reverse` the range is followed by its own reverse without
    /// repeating either end frame. `cb` returns `false` to stop early, in
    /// which case `Ok(false)` is returned. Fails with
    /// [`ClippingError::NoVideo`] when the clipping has no video geometry or
    /// `source` has a different picture size.
    pub fn iterate<S, F>(
        &mut self,
        source: &mut S,
        from_start: bool,
        append_reverse: bool,
        mut cb: F,
    ) -> Result<bool>
    where
        S: FrameSource + ?Sized,
        F: FnMut(&[u8]) -> bool,
    {
        if !self.clipping.matches_video(source.width(), source.height()) {
            return Err(ClippingError::NoVideo.into());
        }

        let (from, to) = self.frame_range(from_start);
        let (low, high) = (from.min(to), from.max(to));

        if low == high {
            return Err(ClippingError::EmptyRange.into());
        }

        let forward = from <= to;
        let frames = (high - low + 1) as usize;
        let count = self.buffer_count(frames);

        debug!(
            "Iterating frames {}..={} ({}), {} frame(s) per chunk",
            from, to, frames, count
        );

        if (!forward || append_reverse) && count == frames {
            return self.grab_all(source, low, high, forward, append_reverse, &mut cb);
        }

        if forward {
            if !self.forward(source, low, high, &mut cb)? {
                return Ok(false);
            }
            if append_reverse && low + 2 <= high {
                return self.backward(source, low + 1, high - 1, count, &mut cb);
            }
        } else {
            if !self.backward(source, low, high, count, &mut cb)? {
                return Ok(false);
            }
            if append_reverse && low + 2 <= high {
                return self.forward(source, low + 1, high - 1, &mut cb);
            }
        }

        Ok(true)
    }

    fn render_current<S: FrameSource + ?Sized>(
        &mut self,
        source: &mut S,
    ) -> std::result::Result<(), DecodeError> {
        let position = u32::try_from(source.frame_number()).unwrap_or(0);
        let key = self.clipping.at(position);
        let picture = source.picture()?;
        self.render.render(&key, picture, &mut self.frame, false);
        Ok(())
    }

    fn forward<S, F>(&mut self, source: &mut S, low: u32, high: u32, cb: &mut F) -> Result<bool>
    where
        S: FrameSource + ?Sized,
        F: FnMut(&[u8]) -> bool,
    {
        source.seek_frame(i64::from(low));

        for _ in low..=high {
            self.render_current(source)?;
            if !cb(self.frame.as_slice()) {
                debug!("Iteration stopped at frame {}", source.frame_number());
                return Ok(false);
            }
            source.next();
        }

        Ok(true)
    }

    /// Report `high` down to `low`, decoding forward one chunk at a time
    fn backward<S, F>(
        &mut self,
        source: &mut S,
        low: u32,
        high: u32,
        count: usize,
        cb: &mut F,
    ) -> Result<bool>
    where
        S: FrameSource + ?Sized,
        F: FnMut(&[u8]) -> bool,
    {
        let mut stack = FrameStack::new(self.frame.len(), count);
        let mut end = i64::from(high);

        while end >= i64::from(low) {
            let start = (end + 1 - count as i64).max(i64::from(low));
            debug!("Reverse chunk {}..={}", start, end);

            source.seek_frame(start);
            for _ in start..=end {
                self.render_current(source)?;
                stack.push(&self.frame);
                source.next();
            }

            while let Some(frame) = stack.pop() {
                if !cb(frame) {
                    debug!("Iteration stopped inside chunk {}..={}", start, end);
                    return Ok(false);
                }
            }

            end = start - 1;
        }

        Ok(true)
    }

    fn grab_all<S, F>(
        &mut self,
        source: &mut S,
        low: u32,
        high: u32,
        forward: bool,
        append_reverse: bool,
        cb: &mut F,
    ) -> Result<bool>
    where
        S: FrameSource + ?Sized,
        F: FnMut(&[u8]) -> bool,
    {
        source.seek_frame(i64::from(low));

        let mut frames = Vec::with_capacity((high - low + 1) as usize);
        for _ in low..=high {
            self.render_current(source)?;
            frames.push(self.frame.clone());
            source.next();
        }

        if !forward {
            frames.reverse();
        }

        let last = frames.len() - 1;
        let tail = if append_reverse && last >= 2 {
            frames[1..last].iter().rev().collect::<Vec<_>>()
        } else {
            Vec::new()
        };

        for frame in frames.iter().chain(tail) {
            if !cb(frame.as_slice()) {
                return Ok(false);
            }
        }

        Ok(true)
    }
}
