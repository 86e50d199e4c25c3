//! Balanced split of a 1-D range across compute units.

use core::ops::Range;

use crate::error::{BenchError, BenchResult};

/// How `total` elements are spread over `unit_count` units.
///
/// Counts differ by at most one. Head units get the larger count, so any
/// shortfall lands on the tail. Offsets tile `[0, total)` without gaps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionPlan {
    total: usize,
    counts: Vec<usize>,
    offsets: Vec<usize>,
}

impl PartitionPlan {
    pub fn new(total: usize, unit_count: usize) -> BenchResult<Self> {
        if total == 0 {
            return Err(BenchError::partition("nothing to partition"));
        }
        if unit_count == 0 {
            return Err(BenchError::partition("no compute units"));
        }

        let per_unit = total.div_ceil(unit_count);
        let short_units = per_unit * unit_count - total;

        let mut counts = Vec::with_capacity(unit_count);
        let mut offsets = Vec::with_capacity(unit_count);
        let mut offset = 0;
        for unit in 0..unit_count {
            let count = if unit >= unit_count - short_units {
                per_unit - 1
            } else {
                per_unit
            };
            offsets.push(offset);
            counts.push(count);
            offset += count;
        }

        Ok(Self {
            total,
            counts,
            offsets,
        })
    }

    /// Elements split across all units.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Units in the plan, including empty ones.
    pub fn unit_count(&self) -> usize {
        self.counts.len()
    }

    /// Elements assigned to `unit`.
    pub fn count(&self, unit: usize) -> usize {
        self.counts[unit]
    }

    /// First element of `unit`.
    pub fn offset(&self, unit: usize) -> usize {
        self.offsets[unit]
    }

    /// Per-unit element counts.
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    /// Per-unit first elements.
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Elements `[offset, offset + count)` of `unit`.
    pub fn range(&self, unit: usize) -> Range<usize> {
        self.offsets[unit]..self.offsets[unit] + self.counts[unit]
    }

    /// Units with at least one element, paired with their ranges.
    ///
    /// Zero-count units must never reach a dispatch call.
    pub fn active_units(&self) -> impl Iterator<Item = (usize, Range<usize>)> + '_ {
        (0..self.unit_count())
            .filter(|&unit| self.counts[unit] > 0)
            .map(|unit| (unit, self.range(unit)))
    }

    /// Largest per-unit count (buffer size needed on any unit).
    pub fn max_count(&self) -> usize {
        self.counts.iter().copied().max().unwrap_or(0)
    }
}
