//! Element types the kernels are compiled for.

use core::fmt::Debug;
use core::ops::{Add, Mul};

use half::f16;
use num_traits::{FromPrimitive, ToPrimitive, Zero};

/// Floating-point width a program is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Precision {
    Half,
    Single,
    Double,
}

impl Precision {
    /// Device-side type name, as passed through the `REAL` build define.
    pub fn type_name(self) -> &'static str {
        match self {
            Precision::Half => "half",
            Precision::Single => "float",
            Precision::Double => "double",
        }
    }

    pub fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "half" => Some(Precision::Half),
            "float" => Some(Precision::Single),
            "double" => Some(Precision::Double),
            _ => None,
        }
    }

    pub fn size_in_bytes(self) -> usize {
        match self {
            Precision::Half => 2,
            Precision::Single => 4,
            Precision::Double => 8,
        }
    }

    /// Decimal digits a result is expected to agree on with the reference.
    pub fn significant_digits(self) -> i32 {
        match self {
            Precision::Half => 2,
            Precision::Single => 5,
            Precision::Double => 8,
        }
    }
}

/// Scalar element processed by every kernel family.
///
/// Reference answers are kept in `f64`; conversions go through `num_traits`.
pub trait Real:
    Copy
    + Default
    + Debug
    + PartialEq
    + Send
    + Sync
    + Add<Output = Self>
    + Mul<Output = Self>
    + Zero
    + FromPrimitive
    + ToPrimitive
    + 'static
{
    const PRECISION: Precision;

    /// `value` rounded to this type.
    fn from_reference(value: f64) -> Self {
        Self::from_f64(value).unwrap_or_else(Self::zero)
    }

    /// Widened to `f64`, NaN when no conversion exists.
    fn to_reference(self) -> f64 {
        self.to_f64().unwrap_or(f64::NAN)
    }
}

impl Real for f32 {
    const PRECISION: Precision = Precision::Single;
}

impl Real for f64 {
    const PRECISION: Precision = Precision::Double;
}

impl Real for f16 {
    const PRECISION: Precision = Precision::Half;
}
