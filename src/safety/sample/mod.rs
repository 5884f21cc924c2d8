//! Fixed-depth rolling buffer of the most recent decoded values of one signal.
//! Used to debounce noisy measurements (driver torque, measured angle, speed)
//! and to answer "min/max over the last N samples" queries in O(N) with N fixed.

/// Default window depth.
pub const MAX_SAMPLE_VALS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SampleBuffer<const N: usize = MAX_SAMPLE_VALS> {
    values: [i32; N],
    /// Slot receiving the next value.
    head: usize,
    /// Number of valid entries (saturates at `N`).
    len: usize,
}

impl<const N: usize> Default for SampleBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> SampleBuffer<N> {
    pub const fn new() -> Self {
        assert!(N >= 2, "a sample window needs at least two slots");
        Self {
            values: [0; N],
            head: 0,
            len: 0,
        }
    }

    /// Record a value, overwriting the oldest one once full.
    #[inline]
    pub fn push(&mut self, value: i32) {
        self.values[self.head] = value;
        self.head = (self.head + 1) % N;
        self.len = (self.len + 1).min(N);
    }

    /// Most recent value.
    #[inline]
    pub fn latest(&self) -> Option<i32> {
        if self.len == 0 {
            None
        } else {
            Some(self.values[(self.head + N - 1) % N])
        }
    }

    /// Valid values, oldest first.
    pub fn window(&self) -> impl Iterator<Item = i32> + '_ {
        let start = (self.head + N - self.len) % N;
        (0..self.len).map(move |i| self.values[(start + i) % N])
    }

    pub fn min(&self) -> Option<i32> {
        self.window().min()
    }

    pub fn max(&self) -> Option<i32> {
        self.window().max()
    }

    /// True when at least one value of the window satisfies `predicate`.
    pub fn any(&self, predicate: impl Fn(i32) -> bool) -> bool {
        self.window().any(predicate)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Forget every sample.
    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
