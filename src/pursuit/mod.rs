//! # Projection pursuit
//!
//! One pursuit step reads the published view, asks a strategy for a target, fits a projection
//! toward it, corrects the projection with the active constraints and publishes the result.
//! [`Pursuit::step`] runs a single step on the caller's thread; [`PursuitScheduler`] runs steps
//! on a dedicated worker until it is stopped or a stop condition from [`PursuitConfig`] fires.

use std::sync::Arc;

use ndarray::ArrayView2;

use crate::error::{PursuitError, Result};
use crate::projection::{ConstraintSet, LeastSquaresSolver};
use crate::strategy::PerturbationStrategy;
use crate::utils::frobenius;

mod config;
mod model;
mod scheduler;

pub use config::{FailurePolicy, PursuitConfig, PursuitConfigBuilder};
pub use model::{ProjectionModel, ProjectionSnapshot};
pub use scheduler::{ExitReason, PursuitOutcome, PursuitScheduler, PursuitState};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepOutcome {
    Published {
        /// Residual of the constrained projection against the target.
        residual: f64,
        /// Frobenius norm of the projection change.
        change: f64,
    },
    /// The model's dataset changed since this pursuit started; nothing was published.
    Invalidated,
}

/// A pursuit bound to one model generation, with the solver for that generation's data.
pub struct Pursuit {
    model: Arc<ProjectionModel>,
    solver: LeastSquaresSolver,
    generation: u64,
    data_revision: u64,
}

impl Pursuit {
    pub fn new(model: Arc<ProjectionModel>) -> Result<Self> {
        let generation = model.generation();
        let dataset = model.dataset();
        let solver = LeastSquaresSolver::new(dataset.data())?;
        Ok(Pursuit {
            model,
            solver,
            generation,
            data_revision: dataset.revision(),
        })
    }

    pub fn model(&self) -> &Arc<ProjectionModel> {
        &self.model
    }

    pub fn is_current(&self) -> bool {
        self.model.generation() == self.generation
    }

    pub fn step(
        &self,
        strategy: &dyn PerturbationStrategy,
        constraints: &ConstraintSet,
    ) -> Result<StepOutcome> {
        if !self.is_current() {
            return Ok(StepOutcome::Invalidated);
        }
        let snapshot = self.model.snapshot();
        if snapshot.data_revision() != self.data_revision {
            return Ok(StepOutcome::Invalidated);
        }

        let view_dims = snapshot.projection().ncols();
        let target = strategy.next_target(snapshot.view())?;
        if target.ncols() != view_dims {
            return Err(PursuitError::mismatch("target columns", view_dims, target.ncols()));
        }

        let fit = self.solver.fit(target.view())?;
        let projection = constraints.apply(fit.projection);
        let residual = if constraints.is_empty() {
            fit.residual
        } else {
            self.solver.residual(projection.view(), target.view())?
        };
        let change = projection_change(snapshot.projection(), projection.view());

        if self.model.publish(self.generation, projection, residual)? {
            Ok(StepOutcome::Published { residual, change })
        } else {
            Ok(StepOutcome::Invalidated)
        }
    }
}

fn projection_change(before: ArrayView2<f64>, after: ArrayView2<f64>) -> f64 {
    if before.dim() != after.dim() {
        return f64::INFINITY;
    }
    frobenius((&after - &before).view())
}
