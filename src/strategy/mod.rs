//! # Perturbation strategies
//!
//! A strategy reads the current view and proposes the next target view. It never mutates the
//! data or the view; the returned target is the only new state. The solver then fits a
//! projection toward it.

use ndarray::{Array2, ArrayView2};

use crate::error::Result;

mod attraction;
mod separation;
mod smoothing;

pub use attraction::ConnectionAttraction;
pub use separation::ClassSeparation;
pub use smoothing::SeriesSmoothing;

/// Default fraction of the way an item moves per step.
pub const DEFAULT_STEP: f64 = 0.1;

pub trait PerturbationStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// Produces exactly one N×V target from an N×V view, or a `Precondition` error naming what
    /// the view failed to satisfy.
    fn next_target(&self, view: ArrayView2<f64>) -> Result<Array2<f64>>;
}
