//! Configuration for benchmark runs.

use crate::backend::{Platform, Residency};
use crate::error::{BenchError, BenchResult};
use crate::kernels::KernelName;
use crate::numeric::Precision;
use crate::problem::BandSelector;
use crate::reduce::ReductionStrategy;
use crate::verify::Tolerance;

/// Kernel family a run measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BenchFamily {
    Addition,
    Dot,
    SparseMatvec,
}

impl BenchFamily {
    pub fn name(self) -> &'static str {
        match self {
            BenchFamily::Addition => "vector addition",
            BenchFamily::Dot => "vector dot",
            BenchFamily::SparseMatvec => "sparse matvec",
        }
    }
}

/// Where a measurement runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionPath {
    CpuSequential,
    CpuParallel,
    SingleDevice,
    MultiDevice,
}

impl ExecutionPath {
    pub const ALL: [ExecutionPath; 4] = [
        ExecutionPath::CpuSequential,
        ExecutionPath::CpuParallel,
        ExecutionPath::SingleDevice,
        ExecutionPath::MultiDevice,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ExecutionPath::CpuSequential => "single CPU",
            ExecutionPath::CpuParallel => "parallel CPU",
            ExecutionPath::SingleDevice => "single device",
            ExecutionPath::MultiDevice => "multi device",
        }
    }

    pub fn is_device(self) -> bool {
        matches!(self, ExecutionPath::SingleDevice | ExecutionPath::MultiDevice)
    }
}

/// Addition kernel variant: elements per work-item and vector loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddVariant {
    OneElement,
    /// `COUNT_PER_WORKITEM` consecutive elements per work-item.
    MoreElement,
    /// One `VECTOR_WIDTH`-lane vector per work-item.
    OneVector,
    /// `COUNT_PER_WORKITEM` vectors per work-item.
    MoreVector,
}

impl AddVariant {
    pub const ALL: [AddVariant; 4] = [
        AddVariant::OneElement,
        AddVariant::MoreElement,
        AddVariant::OneVector,
        AddVariant::MoreVector,
    ];

    pub fn kernel(self) -> KernelName {
        match self {
            AddVariant::OneElement => KernelName::AddOneElement,
            AddVariant::MoreElement => KernelName::AddMoreElement,
            AddVariant::OneVector => KernelName::AddOneVector,
            AddVariant::MoreVector => KernelName::AddMoreVector,
        }
    }
}

/// Which platform devices the multi-device path uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSelection {
    All,
    /// The first `n` devices.
    First(usize),
    Ids(Vec<usize>),
}

impl DeviceSelection {
    /// Resolves to device ids; unknown or repeated ids are rejected.
    pub fn resolve(&self, platform: &Platform) -> BenchResult<Vec<usize>> {
        let available = platform.devices().len();
        let ids: Vec<usize> = match self {
            DeviceSelection::All => (0..available).collect(),
            DeviceSelection::First(n) => (0..(*n).min(available)).collect(),
            DeviceSelection::Ids(ids) => ids.clone(),
        };

        if ids.is_empty() {
            return Err(BenchError::DeviceSelection {
                message: "selection is empty".to_string(),
            });
        }
        for (i, &id) in ids.iter().enumerate() {
            platform.device(id)?;
            if ids[..i].contains(&id) {
                return Err(BenchError::DeviceSelection {
                    message: format!("device {id} selected twice"),
                });
            }
        }
        Ok(ids)
    }
}

/// Configuration of one benchmark run.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    pub family: BenchFamily,
    pub precision: Precision,
    /// Vector length, or matrix row count for sparse matvec.
    pub element_count: usize,
    /// Slots per sparse row (`MAX_NONZERO_COUNT`).
    pub max_nonzero: usize,
    pub band: BandSelector,
    pub paths: Vec<ExecutionPath>,
    pub devices: DeviceSelection,
    /// Host threads for the parallel CPU path.
    pub task_count: usize,
    /// Work-group size for the tree reductions; clamped to the device limit.
    pub work_group_size: usize,
    pub strategies: Vec<ReductionStrategy>,
    pub add_variants: Vec<AddVariant>,
    pub count_per_work_item: usize,
    pub vector_width: usize,
    pub residencies: Vec<Residency>,
    /// Times each measurement group is run (first run is cold).
    pub repetitions: usize,
    /// Overrides the precision's default tolerance.
    pub tolerance: Option<Tolerance>,
    pub max_reported_mismatches: usize,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            family: BenchFamily::Dot,
            precision: Precision::Double,
            element_count: 1 << 20,
            max_nonzero: 30,
            band: BandSelector::AllOffDiagonal,
            paths: ExecutionPath::ALL.to_vec(),
            devices: DeviceSelection::All,
            task_count: rayon::current_num_threads(),
            work_group_size: 256,
            strategies: ReductionStrategy::ALL.to_vec(),
            add_variants: vec![AddVariant::OneElement],
            count_per_work_item: 16,
            vector_width: 16,
            residencies: vec![Residency::DevicePrivate],
            repetitions: 2,
            tolerance: None,
            max_reported_mismatches: 10,
        }
    }
}

impl BenchConfig {
    /// Dense addition with `left[i] = i / 10000`, `right[i] = 0`.
    pub fn addition(element_count: usize) -> Self {
        Self {
            family: BenchFamily::Addition,
            element_count,
            ..Self::default()
        }
    }

    /// Dot product of `left[i] = i / 10` with ones.
    pub fn dot(element_count: usize) -> Self {
        Self {
            family: BenchFamily::Dot,
            element_count,
            ..Self::default()
        }
    }

    /// Banded sparse matrix with `max_nonzero` slots per row.
    pub fn sparse_matvec(row_count: usize, max_nonzero: usize) -> Self {
        Self {
            family: BenchFamily::SparseMatvec,
            element_count: row_count,
            max_nonzero,
            ..Self::default()
        }
    }

    /// Sets the element precision.
    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    /// Sets the execution paths to measure, in order.
    pub fn with_paths(mut self, paths: &[ExecutionPath]) -> Self {
        self.paths = paths.to_vec();
        self
    }

    /// Sets which devices the accelerator paths use.
    pub fn with_devices(mut self, devices: DeviceSelection) -> Self {
        self.devices = devices;
        self
    }

    /// Sets the task count for the parallel CPU path.
    pub fn with_task_count(mut self, tasks: usize) -> Self {
        self.task_count = tasks;
        self
    }

    /// Sets the requested work-group size, clamped to the device maximum.
    pub fn with_work_group_size(mut self, size: usize) -> Self {
        self.work_group_size = size;
        self
    }

    /// Sets the dot-product reduction strategies.
    pub fn with_strategies(mut self, strategies: &[ReductionStrategy]) -> Self {
        self.strategies = strategies.to_vec();
        self
    }

    /// Sets the addition work-item variants.
    pub fn with_add_variants(mut self, variants: &[AddVariant]) -> Self {
        self.add_variants = variants.to_vec();
        self
    }

    /// Sets the elements per work-item and the vector width of the heavy addition variants.
    pub fn with_heavy_work_items(mut self, count_per_work_item: usize, vector_width: usize) -> Self {
        self.count_per_work_item = count_per_work_item;
        self.vector_width = vector_width;
        self
    }

    /// Sets the buffer residencies measured for addition.
    pub fn with_residencies(mut self, residencies: &[Residency]) -> Self {
        self.residencies = residencies.to_vec();
        self
    }

    /// Sets which off-diagonals the banded matrix keeps.
    pub fn with_band(mut self, band: BandSelector) -> Self {
        self.band = band;
        self
    }

    /// Sets how many times each measurement runs.
    pub fn with_repetitions(mut self, repetitions: usize) -> Self {
        self.repetitions = repetitions;
        self
    }

    /// Overrides the precision's default tolerance.
    pub fn with_tolerance(mut self, tolerance: Tolerance) -> Self {
        self.tolerance = Some(tolerance);
        self
    }

    /// Sets how many mismatches a measurement keeps.
    pub fn with_max_reported_mismatches(mut self, max: usize) -> Self {
        self.max_reported_mismatches = max;
        self
    }

    /// Tolerance in effect for this run.
    pub fn effective_tolerance(&self) -> Tolerance {
        self.tolerance
            .unwrap_or_else(|| Tolerance::for_precision(self.precision))
    }

    /// The fixed suite run by the benchmark entry point.
    pub fn default_suite() -> Vec<BenchConfig> {
        vec![
            BenchConfig::addition(1 << 20)
                .with_residencies(&[Residency::HostPointer, Residency::DevicePrivate]),
            BenchConfig::addition(1 << 20)
                .with_paths(&[ExecutionPath::SingleDevice])
                .with_add_variants(&AddVariant::ALL),
            BenchConfig::dot((1 << 20) + 3),
            BenchConfig::sparse_matvec(1 << 16, 30),
        ]
    }
}
