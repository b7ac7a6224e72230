use std::cmp::Ordering;

use rand::Rng;

use crate::error::QuantizeError;

/// One location's quantization error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorRecord {
    pub x: usize,
    pub y: usize,
    pub error: f64,
}

/// A multiset of (location, error) records with a running total, supporting
/// error-proportional roulette draws.
///
/// Records are kept ordered by `(error, y, x)` ascending so that the roulette
/// walk from the high-error end is deterministic for a fixed random stream.
/// This is the kmeans++ seeding distribution: the probability of drawing a
/// record is `record.error / total`.
#[derive(Debug, Clone, Default)]
pub struct ErrorSet {
    records: Vec<ErrorRecord>,
    total: f64,
    sorted: bool,
}

impl ErrorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record and fold its error into the running total.
    pub fn push(&mut self, x: usize, y: usize, error: f64) {
        debug_assert!(error >= 0.0);
        self.records.push(ErrorRecord { x, y, error });
        self.total += error;
        self.sorted = false;
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The records in their current order. Sorted ascending by
    /// `(error, y, x)` once a sample has forced the ordering.
    pub fn records(&self) -> &[ErrorRecord] {
        &self.records
    }

    fn ensure_sorted(&mut self) {
        if !self.sorted {
            self.records.sort_unstable_by(|a, b| {
                a.error
                    .partial_cmp(&b.error)
                    .unwrap_or(Ordering::Equal)
                    .then(a.y.cmp(&b.y))
                    .then(a.x.cmp(&b.x))
            });
            self.sorted = true;
        }
    }

    /// Roulette-select a location with probability proportional to its error.
    ///
    /// Draws a uniform value in [0, 1) and walks the records from highest
    /// error to lowest, accumulating `error / total` until the cumulative
    /// mass reaches the draw. With `remove_after`, the chosen record is
    /// deleted and the running total decremented by its error.
    ///
    /// Fails with [`QuantizeError::DegenerateErrorSet`] when the set is empty
    /// or the total error is not positive — callers fall back to uniform
    /// random reseeding rather than retrying.
    pub fn sample<R: Rng>(
        &mut self,
        rng: &mut R,
        remove_after: bool,
    ) -> Result<(usize, usize), QuantizeError> {
        if self.records.is_empty() || self.total <= 0.0 {
            return Err(QuantizeError::DegenerateErrorSet);
        }
        self.ensure_sorted();

        let draw = rng.gen::<f64>();
        let mut seen_so_far = 0.0;

        for idx in (0..self.records.len()).rev() {
            seen_so_far += self.records[idx].error / self.total;
            // The cumulative mass is exactly 1 in exact arithmetic; if
            // rounding leaves it short of the draw, the walk ends at the
            // lowest-error record and we take that one.
            if seen_so_far >= draw || idx == 0 {
                let record = self.records[idx];
                if remove_after {
                    self.total -= record.error;
                    self.records.remove(idx);
                }
                return Ok((record.x, record.y));
            }
        }
        unreachable!("roulette walk covers the full record list");
    }
}
