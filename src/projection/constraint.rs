use std::collections::BTreeSet;

use ndarray::{Array2, ArrayView2};

use crate::error::{PursuitError, Result};

/// Absolute value below which a projection coefficient counts as zero.
pub const ZERO_EPSILON: f64 = 1e-9;

/// A restriction on admissible projections, with a correction back toward validity.
///
/// Implementations must make `find_nearest_valid` idempotent and guarantee
/// `is_valid(find_nearest_valid(p))` for every `p`.
pub trait ProjectionConstraint: Send + Sync {
    fn is_valid(&self, projection: ArrayView2<f64>) -> bool;

    fn find_nearest_valid(&self, projection: ArrayView2<f64>) -> Array2<f64>;
}

/// Pins the rows of selected attributes to zero in every view column, removing their
/// influence on the layout.
#[derive(Debug, Clone, PartialEq)]
pub struct ZeroConstraint {
    attributes: BTreeSet<usize>,
    epsilon: f64,
}

impl ZeroConstraint {
    /// `n_dims` is the attribute count of the data the constraint will be applied to.
    pub fn new<I: IntoIterator<Item = usize>>(attributes: I, n_dims: usize) -> Result<Self> {
        let attributes: BTreeSet<usize> = attributes.into_iter().collect();
        if let Some(&bad) = attributes.iter().find(|&&a| a >= n_dims) {
            return Err(PursuitError::InvalidConstraint(format!(
                "attribute {} out of range for {} dimensions",
                bad, n_dims
            )));
        }
        Ok(ZeroConstraint {
            attributes,
            epsilon: ZERO_EPSILON,
        })
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon.abs();
        self
    }

    pub fn attributes(&self) -> impl Iterator<Item = usize> + '_ {
        self.attributes.iter().copied()
    }
}

impl ProjectionConstraint for ZeroConstraint {
    fn is_valid(&self, projection: ArrayView2<f64>) -> bool {
        self.attributes
            .iter()
            .filter(|&&a| a < projection.nrows())
            .all(|&a| projection.row(a).iter().all(|v| v.abs() < self.epsilon))
    }

    fn find_nearest_valid(&self, projection: ArrayView2<f64>) -> Array2<f64> {
        let mut corrected = projection.to_owned();
        let rows = corrected.nrows();
        for &a in self.attributes.iter().filter(|&&a| a < rows) {
            corrected.row_mut(a).fill(0.0);
        }
        corrected
    }
}

/// Constraints applied one after another in insertion order.
#[derive(Default)]
pub struct ConstraintSet {
    constraints: Vec<Box<dyn ProjectionConstraint>>,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<C: ProjectionConstraint + 'static>(mut self, constraint: C) -> Self {
        self.push(constraint);
        self
    }

    pub fn push<C: ProjectionConstraint + 'static>(&mut self, constraint: C) {
        self.constraints.push(Box::new(constraint));
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn apply(&self, projection: Array2<f64>) -> Array2<f64> {
        self.constraints
            .iter()
            .fold(projection, |p, c| c.find_nearest_valid(p.view()))
    }
}

impl ProjectionConstraint for ConstraintSet {
    fn is_valid(&self, projection: ArrayView2<f64>) -> bool {
        self.constraints.iter().all(|c| c.is_valid(projection))
    }

    fn find_nearest_valid(&self, projection: ArrayView2<f64>) -> Array2<f64> {
        self.apply(projection.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_zero_constraint_pins_rows() {
        let c = ZeroConstraint::new([1], 3).unwrap();
        let p = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]];
        assert!(!c.is_valid(p.view()));

        let fixed = c.find_nearest_valid(p.view());
        assert_eq!(fixed, array![[1.0, 2.0], [0.0, 0.0], [5.0, 6.0]]);
        assert!(c.is_valid(fixed.view()));
    }

    #[test]
    fn test_zero_constraint_is_idempotent() {
        let c = ZeroConstraint::new([0, 2], 3).unwrap();
        let p = array![[0.3, -0.2], [1.0, 1.0], [1e-3, 9.0]];
        let once = c.find_nearest_valid(p.view());
        let twice = c.find_nearest_valid(once.view());
        assert_eq!(once, twice);
        assert!(c.is_valid(twice.view()));
    }

    #[test]
    fn test_noise_below_epsilon_is_valid() {
        let c = ZeroConstraint::new([0], 2).unwrap();
        let p = array![[1e-12, -1e-12], [1.0, 1.0]];
        assert!(c.is_valid(p.view()));
    }

    #[test]
    fn test_rows_beyond_projection_are_skipped() {
        let c = ZeroConstraint::new([0, 2], 3).unwrap();
        let p = array![[1.0, 2.0], [3.0, 4.0]];
        let fixed = c.find_nearest_valid(p.view());
        assert_eq!(fixed, array![[0.0, 0.0], [3.0, 4.0]]);
        assert!(c.is_valid(fixed.view()));
    }

    #[test]
    fn test_out_of_range_attribute_fails_fast() {
        assert!(matches!(
            ZeroConstraint::new([4], 3),
            Err(PursuitError::InvalidConstraint(_))
        ));
    }

    #[test]
    fn test_constraint_set_applies_in_sequence() {
        let set = ConstraintSet::new()
            .with(ZeroConstraint::new([0], 3).unwrap())
            .with(ZeroConstraint::new([2], 3).unwrap());
        let p = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0]];
        let fixed = set.apply(p.clone());
        assert_eq!(fixed, array![[0.0, 0.0], [2.0, 2.0], [0.0, 0.0]]);
        assert!(set.is_valid(fixed.view()));
        assert!(!set.is_valid(p.view()));
        assert_eq!(set.len(), 2);
    }
}
