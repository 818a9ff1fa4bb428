//! # Linear projection solver
//!
//! A projection is a D×V matrix mapping each item's D numeric attributes onto V view axes:
//! `view = data · projection`. Pursuit runs the other direction: given a desired target view,
//! find the projection whose view is closest to it in the least-squares sense,
//! `projection = pinv(data) · target`.
//!
//! Constraints are not part of the fit. They are applied afterwards in a single corrective
//! pass (see [`constraint`]), so a constrained projection can carry a nonzero residual even
//! when the unconstrained fit was exact.

use log::debug;
use nalgebra::linalg::SVD;
use ndarray::{Array2, ArrayView2};

use crate::error::{PursuitError, Result};
use crate::utils::{ensure_finite, frobenius, from_dmatrix, to_dmatrix};

pub mod constraint;
pub mod initial;

pub use constraint::{ConstraintSet, ProjectionConstraint, ZeroConstraint};
pub use initial::{principal_components, random_projection};

/// Relative singular value cutoff for the pseudoinverse.
const RCOND: f64 = 1e-12;

/// Computes `data · projection`.
pub fn project(data: ArrayView2<f64>, projection: ArrayView2<f64>) -> Result<Array2<f64>> {
    if data.ncols() != projection.nrows() {
        return Err(PursuitError::mismatch(
            "projection rows",
            data.ncols(),
            projection.nrows(),
        ));
    }
    Ok(data.dot(&projection))
}

/// Frobenius norm of `data · projection - target`.
pub fn residual(
    data: ArrayView2<f64>,
    projection: ArrayView2<f64>,
    target: ArrayView2<f64>,
) -> Result<f64> {
    let view = project(data, projection)?;
    if view.dim() != target.dim() {
        return Err(PursuitError::mismatch("target rows", view.nrows(), target.nrows()));
    }
    Ok(frobenius((&view - &target).view()))
}

/// Result of a least-squares fit.
#[derive(Debug, Clone)]
pub struct Fit {
    pub projection: Array2<f64>,
    pub residual: f64,
}

/// One-shot least-squares fit of a projection to `target`.
///
/// `view_dims` is the view dimensionality the caller expects; it must agree with the number of
/// target columns.
pub fn pursue_target(
    data: ArrayView2<f64>,
    target: ArrayView2<f64>,
    view_dims: usize,
) -> Result<Fit> {
    if target.ncols() != view_dims {
        return Err(PursuitError::mismatch("target columns", view_dims, target.ncols()));
    }
    LeastSquaresSolver::new(data)?.fit(target)
}

/// Least-squares solver with the data pseudoinverse cached.
///
/// The data matrix is fixed for the lifetime of a pursuit, so the SVD is paid once and each
/// step costs a D×N by N×V multiply.
#[derive(Debug, Clone)]
pub struct LeastSquaresSolver {
    data: Array2<f64>,
    pinv: Array2<f64>,
}

impl LeastSquaresSolver {
    pub fn new(data: ArrayView2<f64>) -> Result<Self> {
        ensure_finite(data, "solver data")?;
        let (n, d) = data.dim();
        let pinv = if n == 0 || d == 0 {
            Array2::zeros((d, n))
        } else {
            let svd = SVD::new(to_dmatrix(data), true, true);
            let sigma_max = svd.singular_values.iter().cloned().fold(0.0_f64, f64::max);
            let cutoff = RCOND * n.max(d) as f64 * sigma_max;
            let rank = svd.rank(cutoff);
            debug!("Pseudoinverse of {}x{} data, numerical rank {}", n, d, rank);
            let pinv = svd
                .pseudo_inverse(cutoff)
                .map_err(|e| PursuitError::Numerical(e.to_string()))?;
            from_dmatrix(&pinv)
        };

        Ok(LeastSquaresSolver {
            data: data.to_owned(),
            pinv,
        })
    }

    pub fn n_items(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_dims(&self) -> usize {
        self.data.ncols()
    }

    pub fn data(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }

    pub fn fit(&self, target: ArrayView2<f64>) -> Result<Fit> {
        if target.nrows() != self.data.nrows() {
            return Err(PursuitError::mismatch(
                "target rows",
                self.data.nrows(),
                target.nrows(),
            ));
        }
        let projection = self.pinv.dot(&target);
        let residual = residual(self.data.view(), projection.view(), target)?;
        Ok(Fit {
            projection,
            residual,
        })
    }

    pub fn residual(&self, projection: ArrayView2<f64>, target: ArrayView2<f64>) -> Result<f64> {
        residual(self.data.view(), projection, target)
    }
}
