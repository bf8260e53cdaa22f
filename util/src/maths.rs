//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Returns true if every element of the slice is finite.
pub fn all_finite<T>(values: &[T]) -> bool
where
    T: Float
{
    values.iter().all(|v| v.is_finite())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_all_finite() {
        assert!(all_finite(&[0f64, 1f64, -1e30f64]));
        assert!(!all_finite(&[0f64, std::f64::NAN]));
        assert!(!all_finite(&[std::f64::INFINITY]));
    }
}
