/// Fixed-capacity stack of equally sized frame buffers.
///
/// All slots live in one allocation made up front, so a chunk of rendered
/// frames can be collected and replayed last-in first-out without further
/// allocation.
#[derive(Debug, Clone)]
pub struct FrameStack {
    frame_size: usize,
    capacity: usize,
    len: usize,
    data: Vec<u8>,
}

impl FrameStack {
    pub fn new(frame_size: usize, capacity: usize) -> Self {
        Self {
            frame_size,
            capacity,
            len: 0,
            data: vec![0; frame_size * capacity],
        }
    }

    /// Copy `frame` into the next free slot. Returns `false` when full.
    ///
    /// # Panics
    ///
    /// Panics if `frame` is not exactly `frame_size` bytes long.
    pub fn push(&mut self, frame: &[u8]) -> bool {
        if self.len == self.capacity {
            return false;
        }

        let start = self.len * self.frame_size;
        self.data[start..start + self.frame_size].copy_from_slice(frame);
        self.len += 1;
        true
    }

    /// The most recently pushed frame
    pub fn pop(&mut self) -> Option<&[u8]> {
        if self.len == 0 {
            return None;
        }

        self.len -= 1;
        let start = self.len * self.frame_size;
        Some(&self.data[start..start + self.frame_size])
    }

    pub fn count(&self) -> usize {
        self.len
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }
}
