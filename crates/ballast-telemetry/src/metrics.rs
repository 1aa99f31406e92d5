// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Rolling storage for recent samples.

/// A fixed-size circular buffer for storing numerical samples.
#[derive(Debug, Clone)]
pub struct RingBuffer<T, const N: usize> {
    data: [T; N],
    index: usize,
    count: usize,
}

impl<T: Default + Copy, const N: usize> RingBuffer<T, N> {
    /// Creates a new, empty ring buffer.
    pub fn new() -> Self {
        Self {
            data: [T::default(); N],
            index: 0,
            count: 0,
        }
    }

    /// Pushes a new value into the buffer, overwriting the oldest if full.
    pub fn push(&mut self, value: T) {
        self.data[self.index] = value;
        self.index = (self.index + 1) % N;
        if self.count < N {
            self.count += 1;
        }
    }

    /// Returns the number of elements currently in the buffer.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Returns `true` when nothing has been pushed since creation or the last clear.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Forgets every stored value.
    pub fn clear(&mut self) {
        self.index = 0;
        self.count = 0;
    }

    /// Returns the most recently pushed value.
    pub fn latest(&self) -> Option<T> {
        if self.count == 0 {
            return None;
        }
        Some(self.data[(self.index + N - 1) % N])
    }

    /// Returns an iterator over the values in chronological order (oldest to newest).
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        // Until the buffer wraps, the oldest value sits at slot 0.
        let oldest = if self.count < N { 0 } else { self.index };
        let (newer, older) = self.data.split_at(oldest);
        older.iter().chain(newer.iter()).take(self.count)
    }
}

impl<T: Default + Copy, const N: usize> Default for RingBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RingBuffer<f32, N> {
    /// Calculates the arithmetic mean of the values in the buffer.
    pub fn average(&self) -> f32 {
        if self.count == 0 {
            return 0.0;
        }
        self.iter().sum::<f32>() / self.count as f32
    }

    /// Difference between the mean of the newer half and the mean of the older half.
    /// Returns positive if increasing, negative if decreasing.
    pub fn trend(&self) -> f32 {
        if self.count < 2 {
            return 0.0;
        }
        let half = self.count / 2;
        let first_half_avg: f32 = self.iter().take(half).sum::<f32>() / half as f32;
        let last_half_avg: f32 = self.iter().skip(self.count - half).sum::<f32>() / half as f32;
        last_half_avg - first_half_avg
    }

    /// Returns the maximum value in the buffer, or `f32::MIN` if empty.
    pub fn max(&self) -> f32 {
        if self.count == 0 {
            return f32::MIN;
        }
        self.iter().copied().fold(f32::MIN, f32::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_buffer_push_and_iter() {
        let mut rb = RingBuffer::<f32, 3>::new();
        rb.push(1.0);
        rb.push(2.0);
        rb.push(3.0);
        rb.push(4.0); // Overwrites 1.0

        let values: Vec<f32> = rb.iter().copied().collect();
        assert_eq!(values, vec![2.0, 3.0, 4.0]);
        assert_eq!(rb.count(), 3);
        assert_eq!(rb.latest(), Some(4.0));
    }

    #[test]
    fn test_ring_buffer_partial_iter() {
        let mut rb = RingBuffer::<f32, 5>::new();
        rb.push(7.0);
        rb.push(8.0);
        let values: Vec<f32> = rb.iter().copied().collect();
        assert_eq!(values, vec![7.0, 8.0]);
    }

    #[test]
    fn test_ring_buffer_average() {
        let mut rb = RingBuffer::<f32, 4>::new();
        rb.push(10.0);
        rb.push(20.0);
        assert_eq!(rb.average(), 15.0);
    }

    #[test]
    fn test_ring_buffer_trend() {
        let mut rb = RingBuffer::<f32, 4>::new();
        rb.push(0.50);
        rb.push(0.52);
        rb.push(0.70);
        rb.push(0.72);
        // first half: 0.51, second half: 0.71
        assert!((rb.trend() - 0.2).abs() < 0.001);
    }

    #[test]
    fn test_ring_buffer_clear() {
        let mut rb = RingBuffer::<f32, 4>::new();
        rb.push(3.0);
        rb.push(9.0);
        assert_eq!(rb.max(), 9.0);
        rb.clear();
        assert!(rb.is_empty());
        assert_eq!(rb.latest(), None);
        assert_eq!(rb.average(), 0.0);
        assert_eq!(rb.trend(), 0.0);
    }

    #[test]
    fn test_ring_buffer_iter_after_wrap_and_clear() {
        let mut rb = RingBuffer::<f32, 3>::new();
        for v in 1..=7 {
            rb.push(v as f32);
        }
        assert_eq!(rb.iter().copied().collect::<Vec<_>>(), vec![5.0, 6.0, 7.0]);

        rb.clear();
        rb.push(11.0);
        assert_eq!(rb.iter().copied().collect::<Vec<_>>(), vec![11.0]);
    }
}
