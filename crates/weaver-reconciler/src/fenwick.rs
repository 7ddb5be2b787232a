//! Fenwick tree (binary indexed tree) over signed lengths.
//!
//! Positions are 0-indexed in the public API; the partial-sum array is
//! 1-indexed internally. Out-of-range updates are ignored and out-of-range
//! queries clamp, so hot paths never branch on bounds at the call site.

/// Prefix-sum tree with O(log n) point updates and queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FenwickTree {
    /// Partial sums, `tree[0]` unused.
    tree: Vec<i64>,
    /// Current value at each position, needed for `set` and `get`.
    values: Vec<i64>,
}

impl FenwickTree {
    /// Create a tree of `capacity` zeros. A capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            tree: vec![0; capacity + 1],
            values: vec![0; capacity],
        }
    }

    /// Build a tree from initial values in O(n).
    pub fn from_values<T: Copy + Into<i64>>(values: &[T]) -> Self {
        let mut ft = Self::new(values.len());
        for (i, v) in values.iter().enumerate() {
            ft.values[i] = (*v).into();
            ft.tree[i + 1] = ft.values[i];
        }
        ft.rebuild_partial_sums();
        ft
    }

    fn rebuild_partial_sums(&mut self) {
        let n = self.values.len();
        for i in 1..self.tree.len() {
            self.tree[i] = self.values[i - 1];
        }
        for i in 1..=n {
            let parent = i + lowbit(i);
            if parent <= n {
                self.tree[parent] += self.tree[i];
            }
        }
    }

    /// Number of addressable positions.
    pub fn capacity(&self) -> usize {
        self.values.len()
    }

    /// Add `delta` at `index`. No-op when out of range.
    pub fn update(&mut self, index: usize, delta: i64) {
        if index >= self.values.len() || delta == 0 {
            return;
        }
        self.values[index] += delta;
        let mut i = index + 1;
        while i < self.tree.len() {
            self.tree[i] += delta;
            i += lowbit(i);
        }
    }

    /// Replace the value at `index`. No-op when out of range.
    pub fn set(&mut self, index: usize, value: i64) {
        let Some(current) = self.values.get(index).copied() else {
            return;
        };
        self.update(index, value - current);
    }

    /// Value at `index`, 0 when out of range.
    pub fn get(&self, index: usize) -> i64 {
        self.values.get(index).copied().unwrap_or(0)
    }

    /// Sum of values at positions `0..=index`.
    ///
    /// Indices past the end clamp to the total.
    pub fn query(&self, index: usize) -> i64 {
        let mut i = (index + 1).min(self.values.len());
        let mut sum = 0;
        while i > 0 {
            sum += self.tree[i];
            i -= lowbit(i);
        }
        sum
    }

    /// Signed variant of [`query`](Self::query): negative indices sum to 0.
    pub fn prefix_sum(&self, index: isize) -> i64 {
        if index < 0 {
            0
        } else {
            self.query(index as usize)
        }
    }

    /// Sum of values at positions `from..=to`, 0 when `from > to`.
    pub fn query_range(&self, from: usize, to: usize) -> i64 {
        if from > to {
            return 0;
        }
        self.query(to) - self.prefix_sum(from as isize - 1)
    }

    /// Sum of all values.
    pub fn total(&self) -> i64 {
        self.query(self.values.len() - 1)
    }

    /// Smallest index whose prefix sum exceeds `target`.
    ///
    /// Requires every value to be non-negative. Returns `None` when the total
    /// does not exceed `target`.
    pub fn lower_bound(&self, target: i64) -> Option<usize> {
        let n = self.values.len();
        // Largest power of two not above n.
        let mut bit = 1usize << (usize::BITS - 1 - n.leading_zeros());
        let mut pos = 0usize;
        let mut remaining = target;
        while bit > 0 {
            let next = pos + bit;
            if next <= n && self.tree[next] <= remaining {
                pos = next;
                remaining -= self.tree[next];
            }
            bit >>= 1;
        }
        // `pos` values sum to at most `target`, so the answer is the next slot.
        (pos < n).then_some(pos)
    }

    /// Grow to `capacity`, keeping existing values. Never shrinks.
    pub fn grow(&mut self, capacity: usize) {
        if capacity <= self.values.len() {
            return;
        }
        self.values.resize(capacity, 0);
        self.tree.resize(capacity + 1, 0);
        self.rebuild_partial_sums();
    }

    /// Clear every value to 0, keeping the capacity.
    pub fn reset(&mut self) {
        self.tree.iter_mut().for_each(|v| *v = 0);
        self.values.iter_mut().for_each(|v| *v = 0);
    }
}

#[inline]
fn lowbit(i: usize) -> usize {
    i & i.wrapping_neg()
}
