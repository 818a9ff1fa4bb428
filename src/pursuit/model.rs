use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::debug;
use ndarray::{Array2, ArrayView2};
use parking_lot::RwLock;

use crate::dataset::Dataset;
use crate::error::{PursuitError, Result};
use crate::projection::project;

/// An immutable projection/view pair. The view is always `data · projection` for the dataset
/// revision recorded alongside it.
#[derive(Debug, Clone)]
pub struct ProjectionSnapshot {
    projection: Array2<f64>,
    view: Array2<f64>,
    iteration: u64,
    residual: Option<f64>,
    data_revision: u64,
}

impl ProjectionSnapshot {
    pub fn projection(&self) -> ArrayView2<'_, f64> {
        self.projection.view()
    }

    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.view.view()
    }

    /// Number of pursuit steps published since the projection was last set by hand.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Residual of the least-squares fit that produced this projection, if any.
    pub fn residual(&self) -> Option<f64> {
        self.residual
    }

    pub fn data_revision(&self) -> u64 {
        self.data_revision
    }
}

struct Inner {
    dataset: Arc<Dataset>,
    snapshot: Arc<ProjectionSnapshot>,
}

/// Single owner of the current projection, shared between the pursuit worker and readers.
///
/// Every update builds a complete new snapshot and swaps it in under the write lock, so a
/// reader always sees a view that matches its projection. Replacing the dataset bumps the
/// generation; a worker holding an older generation can no longer publish.
pub struct ProjectionModel {
    inner: RwLock<Inner>,
    generation: AtomicU64,
}

impl ProjectionModel {
    pub fn new(dataset: Arc<Dataset>, projection: Array2<f64>) -> Result<Self> {
        let snapshot = Self::build_snapshot(&dataset, projection, 0, None)?;
        Ok(ProjectionModel {
            inner: RwLock::new(Inner {
                dataset,
                snapshot: Arc::new(snapshot),
            }),
            generation: AtomicU64::new(0),
        })
    }

    fn build_snapshot(
        dataset: &Dataset,
        projection: Array2<f64>,
        iteration: u64,
        residual: Option<f64>,
    ) -> Result<ProjectionSnapshot> {
        let view = project(dataset.data(), projection.view())?;
        Ok(ProjectionSnapshot {
            projection,
            view,
            iteration,
            residual,
            data_revision: dataset.revision(),
        })
    }

    pub fn snapshot(&self) -> Arc<ProjectionSnapshot> {
        Arc::clone(&self.inner.read().snapshot)
    }

    pub fn dataset(&self) -> Arc<Dataset> {
        Arc::clone(&self.inner.read().dataset)
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn view_dims(&self) -> usize {
        self.inner.read().snapshot.projection.ncols()
    }

    /// Replaces the projection by hand and re-projects immediately.
    pub fn set_projection(&self, projection: Array2<f64>) -> Result<()> {
        let mut inner = self.inner.write();
        let snapshot = Self::build_snapshot(&inner.dataset, projection, 0, None)?;
        inner.snapshot = Arc::new(snapshot);
        Ok(())
    }

    /// Edits a single projection coefficient and re-projects. No fit is performed.
    pub fn set_cell(&self, row: usize, col: usize, value: f64) -> Result<()> {
        let mut inner = self.inner.write();
        let (rows, cols) = inner.snapshot.projection.dim();
        if row >= rows {
            return Err(PursuitError::mismatch("projection row", rows, row));
        }
        if col >= cols {
            return Err(PursuitError::mismatch("projection column", cols, col));
        }
        let mut projection = inner.snapshot.projection.clone();
        projection[[row, col]] = value;
        let snapshot = Self::build_snapshot(&inner.dataset, projection, 0, None)?;
        inner.snapshot = Arc::new(snapshot);
        Ok(())
    }

    /// Swaps in a structurally different dataset with a matching projection. Any pursuit
    /// started against the old dataset is invalidated.
    pub fn replace_dataset(&self, dataset: Arc<Dataset>, projection: Array2<f64>) -> Result<()> {
        let snapshot = Self::build_snapshot(&dataset, projection, 0, None)?;
        let mut inner = self.inner.write();
        inner.dataset = dataset;
        inner.snapshot = Arc::new(snapshot);
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        debug!("Dataset replaced, model generation {}", generation);
        Ok(())
    }

    /// Publishes a fitted projection on behalf of a pursuit started at `generation`.
    /// Returns `false` without publishing when the model has moved on.
    pub(crate) fn publish(
        &self,
        generation: u64,
        projection: Array2<f64>,
        residual: f64,
    ) -> Result<bool> {
        let mut inner = self.inner.write();
        if self.generation() != generation {
            return Ok(false);
        }
        let iteration = inner.snapshot.iteration + 1;
        let snapshot = Self::build_snapshot(&inner.dataset, projection, iteration, Some(residual))?;
        inner.snapshot = Arc::new(snapshot);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn model() -> ProjectionModel {
        let ds = Arc::new(Dataset::from_matrix(array![[1.0, 2.0], [3.0, 4.0]]));
        ProjectionModel::new(ds, Array2::eye(2)).unwrap()
    }

    #[test]
    fn test_view_tracks_projection() {
        let m = model();
        assert_eq!(m.snapshot().view(), array![[1.0, 2.0], [3.0, 4.0]].view());

        m.set_cell(1, 0, 1.0).unwrap();
        let s = m.snapshot();
        assert_eq!(s.view(), array![[3.0, 2.0], [7.0, 4.0]].view());
        assert_eq!(s.iteration(), 0);
    }

    #[test]
    fn test_old_snapshots_are_unaffected() {
        let m = model();
        let before = m.snapshot();
        m.set_projection(Array2::zeros((2, 2))).unwrap();
        assert_eq!(before.view(), array![[1.0, 2.0], [3.0, 4.0]].view());
        assert!(m.snapshot().view().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_set_cell_out_of_range() {
        let m = model();
        assert!(m.set_cell(2, 0, 1.0).is_err());
        assert!(m.set_cell(0, 2, 1.0).is_err());
    }

    #[test]
    fn test_wrong_projection_shape_rejected() {
        let m = model();
        assert!(matches!(
            m.set_projection(Array2::zeros((3, 2))),
            Err(PursuitError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_publish_respects_generation() {
        let m = model();
        let gen = m.generation();
        assert!(m.publish(gen, Array2::eye(2) * 2.0, 0.5).unwrap());
        assert_eq!(m.snapshot().iteration(), 1);
        assert_eq!(m.snapshot().residual(), Some(0.5));

        let bigger = Arc::new(Dataset::from_matrix(array![[1.0, 0.0, 0.0]]));
        m.replace_dataset(bigger, Array2::zeros((3, 2))).unwrap();
        assert!(!m.publish(gen, Array2::eye(2), 0.0).unwrap());
        assert_eq!(m.snapshot().projection().dim(), (3, 2));
    }
}
