//! Batched iteration helpers shared by the parser and the aggregator.
//!
//! Nothing here recurses or builds intermediate collections proportional to
//! the input; every loop over a large collection goes through [`batches`] or
//! a [`BatchTicker`] so batch boundaries are explicit.

/// Split `items` into consecutive batches of at most `size` elements,
/// yielding `(batch_index, batch)`. A `size` of zero is treated as one.
pub fn batches<T>(items: &[T], size: usize) -> impl Iterator<Item = (usize, &[T])> {
    items.chunks(size.max(1)).enumerate()
}

/// Counts work units and reports when a batch boundary is crossed.
#[derive(Debug, Clone)]
pub struct BatchTicker {
    size: u64,
    in_batch: u64,
    total: u64,
}

impl BatchTicker {
    pub fn new(size: usize) -> Self {
        Self {
            size: size.max(1) as u64,
            in_batch: 0,
            total: 0,
        }
    }

    /// Record one unit; returns `true` when this unit completes a batch.
    pub fn tick(&mut self) -> bool {
        self.total += 1;
        self.in_batch += 1;
        if self.in_batch >= self.size {
            self.in_batch = 0;
            true
        } else {
            false
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}

/// Neumaier-compensated running sum, so cost totals over hundreds of
/// thousands of rows match a per-record re-summation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CostSum {
    sum: f64,
    compensation: f64,
}

impl CostSum {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, value: f64) {
        let t = self.sum + value;
        if self.sum.abs() >= value.abs() {
            self.compensation += (self.sum - t) + value;
        } else {
            self.compensation += (value - t) + self.sum;
        }
        self.sum = t;
    }

    pub fn value(&self) -> f64 {
        self.sum + self.compensation
    }
}

impl Extend<f64> for CostSum {
    fn extend<I: IntoIterator<Item = f64>>(&mut self, iter: I) {
        for value in iter {
            self.add(value);
        }
    }
}

/// Batched sum over a slice.
pub fn batched_sum(values: &[f64], batch_size: usize) -> f64 {
    let mut total = CostSum::new();
    for (_, batch) in batches(values, batch_size) {
        total.extend(batch.iter().copied());
    }
    total.value()
}

/// Batched mean; `None` for an empty slice.
pub fn batched_mean(values: &[f64], batch_size: usize) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(batched_sum(values, batch_size) / values.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batches_cover_all_items() {
        let items: Vec<u32> = (0..10).collect();
        let sizes: Vec<usize> = batches(&items, 4).map(|(_, b)| b.len()).collect();
        assert_eq!(sizes, vec![4, 4, 2]);

        let indices: Vec<usize> = batches(&items, 4).map(|(i, _)| i).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_zero_batch_size_is_clamped() {
        let items = [1, 2, 3];
        assert_eq!(batches(&items, 0).count(), 3);
    }

    #[test]
    fn test_ticker_boundaries() {
        let mut ticker = BatchTicker::new(3);
        let boundaries: Vec<bool> = (0..7).map(|_| ticker.tick()).collect();
        assert_eq!(
            boundaries,
            vec![false, false, true, false, false, true, false]
        );
        assert_eq!(ticker.total(), 7);
    }

    #[test]
    fn test_compensated_sum() {
        let mut sum = CostSum::new();
        for _ in 0..10 {
            sum.add(0.1);
        }
        assert_eq!(sum.value(), 1.0);

        let mut mixed = CostSum::new();
        mixed.extend([1e16, 1.0, -1e16]);
        assert_eq!(mixed.value(), 1.0);
    }

    #[test]
    fn test_batched_mean() {
        assert_eq!(batched_mean(&[], 10), None);
        assert_eq!(batched_mean(&[2.0, 4.0, 6.0], 2), Some(4.0));
    }
}
