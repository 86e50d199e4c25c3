use crate::numeric::Precision;

/// Relative-or-absolute agreement test.
///
/// `result` matches `expected` when `|result - expected| <= max(absolute,
/// relative * |expected|)`. NaN never matches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    pub relative: f64,
    pub absolute: f64,
}

impl Tolerance {
    pub fn new(relative: f64, absolute: f64) -> Self {
        Self { relative, absolute }
    }

    /// `10^-digits` for both bounds, `digits` being the precision's
    /// significant decimal digits.
    pub fn for_precision(precision: Precision) -> Self {
        let epsilon = 10f64.powi(-precision.significant_digits());
        Self::new(epsilon, epsilon)
    }

    pub fn within(&self, result: f64, expected: f64) -> bool {
        if result.is_nan() || expected.is_nan() {
            return false;
        }
        if result == expected {
            return true;
        }
        (result - expected).abs() <= self.absolute.max(self.relative * expected.abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_reference_uses_absolute_bound() {
        let tolerance = Tolerance::for_precision(Precision::Double);
        assert!(tolerance.within(1e-9, 0.0));
        assert!(!tolerance.within(1e-7, 0.0));
    }

    #[test]
    fn large_reference_uses_relative_bound() {
        let tolerance = Tolerance::for_precision(Precision::Single);
        assert!(tolerance.within(1_000_005.0, 1_000_000.0));
        assert!(!tolerance.within(1_000_020.0, 1_000_000.0));
        assert!(tolerance.within(-1_000_005.0, -1_000_000.0));
    }

    #[test]
    fn nan_never_matches() {
        let tolerance = Tolerance::new(1.0, 1.0);
        assert!(!tolerance.within(f64::NAN, 0.0));
        assert!(!tolerance.within(0.0, f64::NAN));
        assert!(tolerance.within(f64::INFINITY, f64::INFINITY));
    }
}
