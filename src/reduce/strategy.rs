//! Reduction strategies and the pass sequence each one needs.

use core::fmt;

use crate::error::{BenchError, BenchResult};
use crate::kernels::{KernelName, WorkShape};

/// How partial sums are combined on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReductionStrategy {
    /// In place, pass `n` adds `data[t*2n + n]` into `data[t*2n]`.
    StrideDoubling,
    /// Copy into group scratch, then halve.
    LocalCopy,
    /// First halving step fused into the load.
    FusedLoad,
    /// Each lane loads two elements one group apart; half the work-items.
    HalvedLaunch,
    /// Same as [`ReductionStrategy::HalvedLaunch`] with shift arithmetic.
    BitShift,
}

impl ReductionStrategy {
    pub const ALL: [ReductionStrategy; 5] = [
        ReductionStrategy::StrideDoubling,
        ReductionStrategy::LocalCopy,
        ReductionStrategy::FusedLoad,
        ReductionStrategy::HalvedLaunch,
        ReductionStrategy::BitShift,
    ];

    pub fn index(self) -> usize {
        match self {
            ReductionStrategy::StrideDoubling => 0,
            ReductionStrategy::LocalCopy => 1,
            ReductionStrategy::FusedLoad => 2,
            ReductionStrategy::HalvedLaunch => 3,
            ReductionStrategy::BitShift => 4,
        }
    }

    pub fn kernel(self) -> KernelName {
        match self {
            ReductionStrategy::StrideDoubling => KernelName::ReductionSum0,
            ReductionStrategy::LocalCopy => KernelName::ReductionSum1,
            ReductionStrategy::FusedLoad => KernelName::ReductionSum2,
            ReductionStrategy::HalvedLaunch => KernelName::ReductionSum3,
            ReductionStrategy::BitShift => KernelName::ReductionSum4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ReductionStrategy::StrideDoubling => "stride-doubling",
            ReductionStrategy::LocalCopy => "local-copy",
            ReductionStrategy::FusedLoad => "fused-load",
            ReductionStrategy::HalvedLaunch => "halved-launch",
            ReductionStrategy::BitShift => "bit-shift",
        }
    }

    /// Whether the strategy runs work-group tree passes with local scratch.
    pub fn is_tree(self) -> bool {
        !matches!(self, ReductionStrategy::StrideDoubling)
    }

    /// Elements each work-item folds on load.
    pub fn reduction_factor(self) -> usize {
        match self {
            ReductionStrategy::HalvedLaunch | ReductionStrategy::BitShift => 2,
            _ => 1,
        }
    }

    /// Smallest group that still shrinks the array every pass.
    fn min_work_group_size(self) -> usize {
        match self {
            ReductionStrategy::LocalCopy | ReductionStrategy::FusedLoad => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for ReductionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.kernel())
    }
}

/// Remaining size of a tree reduction, advanced one pass at a time.
///
/// Per pass: `global = ceil(target / factor / group) * group`, and the next
/// target is `global / group`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReductionState {
    pub target_size: usize,
    pub work_group_size: usize,
    factor: usize,
}

impl ReductionState {
    pub fn new(strategy: ReductionStrategy, target_size: usize, work_group_size: usize) -> Self {
        Self {
            target_size,
            work_group_size,
            factor: strategy.reduction_factor(),
        }
    }
}

impl Iterator for ReductionState {
    /// `(target, global)` of the next pass.
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        if self.target_size <= 1 {
            return None;
        }
        let group = self.work_group_size;
        let target = self.target_size;
        let global = target.div_ceil(self.factor * group) * group;
        self.target_size = global / group;
        Some((target, global))
    }
}

/// Where a pass reads from or writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// The array being reduced.
    Source,
    Ping,
    Pong,
}

/// One kernel launch of a reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReductionPass {
    /// Valid input elements.
    pub target: usize,
    pub shape: WorkShape,
    /// Pair distance; only meaningful for stride doubling.
    pub stride: usize,
    pub input: Slot,
    pub output: Slot,
}

/// Full pass sequence for reducing `count` elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReductionPlan {
    strategy: ReductionStrategy,
    count: usize,
    passes: Vec<ReductionPass>,
}

impl ReductionPlan {
    /// Plans the passes. `local` is ignored by stride doubling.
    ///
    /// An empty or single-element array needs no pass.
    pub fn new(strategy: ReductionStrategy, count: usize, local: usize) -> BenchResult<Self> {
        if u32::try_from(count).is_err() {
            return Err(BenchError::too_large(format!(
                "{count} elements exceed the 32-bit count argument"
            )));
        }

        let passes = if strategy.is_tree() {
            if !local.is_power_of_two() || local < strategy.min_work_group_size() {
                return Err(BenchError::work_shape(format!(
                    "{strategy} needs a power-of-two work-group of at least {}, got {local}",
                    strategy.min_work_group_size()
                )));
            }
            tree_passes(strategy, count, local)
        } else {
            stride_passes(count)
        };

        Ok(Self {
            strategy,
            count,
            passes,
        })
    }

    pub fn strategy(&self) -> ReductionStrategy {
        self.strategy
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn passes(&self) -> &[ReductionPass] {
        &self.passes
    }

    /// Slot whose element 0 holds the sum once every pass has run.
    pub fn result_slot(&self) -> Slot {
        self.passes.last().map_or(Slot::Source, |pass| pass.output)
    }

    /// Elements each ping-pong buffer must hold.
    pub fn scratch_len(&self) -> usize {
        self.passes
            .iter()
            .filter(|pass| pass.output != Slot::Source)
            .map(|pass| pass.shape.group_count())
            .max()
            .unwrap_or(0)
    }
}

fn stride_passes(count: usize) -> Vec<ReductionPass> {
    let mut passes = Vec::new();
    let mut stride = 1;
    while stride < count {
        passes.push(ReductionPass {
            target: count,
            shape: WorkShape::linear(count.div_ceil(2 * stride).max(1)),
            stride,
            input: Slot::Source,
            output: Slot::Source,
        });
        stride *= 2;
    }
    passes
}

fn tree_passes(strategy: ReductionStrategy, count: usize, local: usize) -> Vec<ReductionPass> {
    let mut input = Slot::Source;
    ReductionState::new(strategy, count, local)
        .enumerate()
        .map(|(i, (target, global))| {
            let output = if i % 2 == 0 { Slot::Ping } else { Slot::Pong };
            let pass = ReductionPass {
                target,
                shape: WorkShape::tiled(global, local),
                stride: 1,
                input,
                output,
            };
            input = output;
            pass
        })
        .collect()
}
