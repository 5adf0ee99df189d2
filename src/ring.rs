/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Fixed-capacity multi-channel ring buffer.
//!
//! Backs the likelihood window of [`crate::gaussian::GaussianHmm`]. Capacity
//! is chosen at runtime; once full, the oldest frame is overwritten.

use crate::error::{HierarchyError, Result};

/// Ring buffer holding `capacity` frames of `channels` values each.
#[derive(Clone, Debug, PartialEq)]
pub struct RingBuffer<T> {
    data: Vec<Vec<T>>,
    capacity: usize,
    index: usize,
    full: bool,
}

impl<T: Copy + Default> RingBuffer<T> {
    /// Create an empty buffer. A zero `capacity` is raised to 1.
    pub fn new(channels: usize, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            data: (0..channels.max(1)).map(|_| vec![T::default(); capacity]).collect(),
            capacity,
            index: 0,
            full: false,
        }
    }

    /// Number of channels per frame.
    pub fn channels(&self) -> usize {
        self.data.len()
    }

    /// Maximum number of frames retained.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of frames currently held.
    pub fn len(&self) -> usize {
        if self.full {
            self.capacity
        } else {
            self.index
        }
    }

    /// `true` before the first push (or after [`Self::clear`]).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget all frames. Storage is kept.
    pub fn clear(&mut self) {
        self.index = 0;
        self.full = false;
    }

    /// Push a single value into a one-channel buffer.
    pub fn push_value(&mut self, value: T) -> Result<()> {
        if self.channels() != 1 {
            return Err(HierarchyError::InvalidParameter(format!(
                "push_value on a {}-channel buffer",
                self.channels()
            )));
        }
        self.push(&[value])
    }

    /// Push one frame. `frame.len()` must equal the channel count.
    pub fn push(&mut self, frame: &[T]) -> Result<()> {
        if frame.len() != self.channels() {
            return Err(HierarchyError::DimensionMismatch {
                expected: self.channels(),
                found: frame.len(),
            });
        }
        for (channel, &v) in self.data.iter_mut().zip(frame) {
            channel[self.index] = v;
        }
        self.index += 1;
        if self.index == self.capacity {
            self.full = true;
        }
        self.index %= self.capacity;
        Ok(())
    }

    /// Stored value at slot `i` of `channel`.
    ///
    /// Slots are storage positions, not ages: once the buffer wraps, slot 0
    /// holds whatever frame was written there last.
    pub fn get(&self, channel: usize, i: usize) -> Result<T> {
        let data = self.data.get(channel).ok_or(HierarchyError::OutOfRange {
            index: channel,
            len: self.channels(),
        })?;
        let len = self.len();
        if i >= len {
            return Err(HierarchyError::OutOfRange { index: i, len });
        }
        Ok(data[i])
    }

    /// Change the capacity, keeping the newest frames that fit.
    ///
    /// Kept frames are rewritten oldest-first from slot 0, so a grown buffer
    /// reports every frame it held and a shrunk one drops the oldest.
    pub fn resize(&mut self, capacity: usize) {
        let capacity = capacity.max(1);
        if capacity == self.capacity {
            return;
        }
        let len = self.len();
        let kept = len.min(capacity);
        // oldest frame sits at the write cursor once the buffer has wrapped
        let oldest = if self.full { self.index } else { 0 };
        let skip = len - kept;
        for channel in self.data.iter_mut() {
            let mut resized = vec![T::default(); capacity];
            for (slot, age) in (skip..len).enumerate() {
                resized[slot] = channel[(oldest + age) % self.capacity];
            }
            *channel = resized;
        }
        self.capacity = capacity;
        self.full = kept == capacity;
        self.index = kept % capacity;
    }
}

impl RingBuffer<f64> {
    /// Per-channel mean over the held frames. Zero for an empty buffer.
    pub fn mean(&self) -> Vec<f64> {
        let len = self.len();
        self.data
            .iter()
            .map(|channel| {
                if len == 0 {
                    0.0
                } else {
                    channel[..len].iter().sum::<f64>() / len as f64
                }
            })
            .collect()
    }
}
