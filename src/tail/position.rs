/// Byte offset already delivered for one open file handle.
///
/// Only moves forward, and only by what the most recent read consumed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PositionTracker {
    offset: u64,
}

impl PositionTracker {
    /// Tracker at offset 0: nothing delivered yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracker starting at an explicit offset (e.g. end of file at connect time).
    pub fn starting_at(offset: u64) -> Self {
        Self { offset }
    }

    pub fn current(&self) -> u64 {
        self.offset
    }

    /// Advance by exactly `n` consumed bytes.
    ///
    /// # Panics
    /// Panics if the offset would overflow `u64`.
    pub fn advance(&mut self, n: u64) {
        self.offset = self
            .offset
            .checked_add(n)
            .expect("file offset overflowed u64");
    }
}
