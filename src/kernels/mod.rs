//! Device code for the three kernel families, executed by the host backend.
//!
//! Contains implementations of:
//! - Element-wise operations (the four addition variants, multiply)
//! - Sparse fixed-width matrix-vector product
//! - Five tree-reduction strategies for summing a device array
//!
//! Every kernel has a fixed positional signature: output buffer, input
//! buffers, scalars, local scratch last. Arguments are validated once, at
//! bind time, and the resulting [`KernelLaunch`] is handed to a command queue.

mod args;
mod elementwise;
mod matvec;
mod reduction;

pub use args::{ArgKind, ArgList, KernelArg, KernelLaunch, WorkShape};

/// Stable kernel names, as exported by the built programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelName {
    AddOneElement,
    AddMoreElement,
    AddOneVector,
    AddMoreVector,
    MultiplyEachElement,
    MatrixXVector,
    ReductionSum0,
    ReductionSum1,
    ReductionSum2,
    ReductionSum3,
    ReductionSum4,
}

const ELEMENTWISE: &[ArgKind] = &[ArgKind::Output, ArgKind::Input, ArgKind::Input, ArgKind::Scalar];

const MATVEC: &[ArgKind] = &[
    ArgKind::Output,
    ArgKind::Input,
    ArgKind::Input,
    ArgKind::IndexInput,
    ArgKind::IndexInput,
    ArgKind::Scalar,
];

const IN_PLACE_REDUCTION: &[ArgKind] = &[ArgKind::InOut, ArgKind::Scalar, ArgKind::Scalar];

const TREE_REDUCTION: &[ArgKind] = &[ArgKind::Output, ArgKind::Input, ArgKind::Scalar, ArgKind::Local];

impl KernelName {
    pub fn as_str(self) -> &'static str {
        match self {
            KernelName::AddOneElement => "AddOneElement",
            KernelName::AddMoreElement => "AddMoreElement",
            KernelName::AddOneVector => "AddOneVector",
            KernelName::AddMoreVector => "AddMoreVector",
            KernelName::MultiplyEachElement => "MultiplyEachElement",
            KernelName::MatrixXVector => "Matrix_x_Vector",
            KernelName::ReductionSum0 => "ReductionSum0",
            KernelName::ReductionSum1 => "ReductionSum1",
            KernelName::ReductionSum2 => "ReductionSum2",
            KernelName::ReductionSum3 => "ReductionSum3",
            KernelName::ReductionSum4 => "ReductionSum4",
        }
    }

    /// Positional argument kinds the kernel expects.
    ///
    /// - element-wise: `(out, a, b, count)`
    /// - matvec: `(out, values, vector, column_indices, nonzero_counts, rows)`
    /// - `ReductionSum0`: `(data, count, stride)`
    /// - `ReductionSum1..4`: `(out, in, count, scratch)`
    pub fn signature(self) -> &'static [ArgKind] {
        match self {
            KernelName::AddOneElement
            | KernelName::AddMoreElement
            | KernelName::AddOneVector
            | KernelName::AddMoreVector
            | KernelName::MultiplyEachElement => ELEMENTWISE,
            KernelName::MatrixXVector => MATVEC,
            KernelName::ReductionSum0 => IN_PLACE_REDUCTION,
            KernelName::ReductionSum1
            | KernelName::ReductionSum2
            | KernelName::ReductionSum3
            | KernelName::ReductionSum4 => TREE_REDUCTION,
        }
    }
}

impl core::fmt::Display for KernelName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
