use std::collections::BTreeMap;

use ndarray::{Array1, Array2, ArrayView2};

use crate::error::{PursuitError, Result};
use crate::strategy::PerturbationStrategy;

/// Untangles series in a 2-D view: each item's target is the mean of its own position and the
/// positions of its previous and next items in the series, using whichever neighbours exist.
#[derive(Debug, Clone)]
pub struct SeriesSmoothing {
    series: Vec<Vec<usize>>,
}

impl SeriesSmoothing {
    /// A single series visiting items in the given order.
    pub fn new(order: Vec<usize>) -> Self {
        SeriesSmoothing {
            series: vec![order],
        }
    }

    /// Several independent series. Neighbours never cross series boundaries.
    pub fn from_series(series: Vec<Vec<usize>>) -> Self {
        SeriesSmoothing { series }
    }

    /// Series built from a categorical grouping and a numeric ordering key: items sharing a
    /// group value form one series, sorted by `key`. Items with no group are left out.
    pub fn grouped_by(groups: &[Option<usize>], key: &[f64]) -> Result<Self> {
        if groups.len() != key.len() {
            return Err(PursuitError::mismatch("series key length", groups.len(), key.len()));
        }
        let mut by_group: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (i, g) in groups.iter().enumerate() {
            if let Some(g) = g {
                by_group.entry(*g).or_default().push(i);
            }
        }
        let series = by_group
            .into_values()
            .map(|mut s| {
                s.sort_by(|&a, &b| key[a].partial_cmp(&key[b]).unwrap_or(std::cmp::Ordering::Equal));
                s
            })
            .collect();
        Ok(Self::from_series(series))
    }

    pub fn series(&self) -> &[Vec<usize>] {
        &self.series
    }
}

impl PerturbationStrategy for SeriesSmoothing {
    fn name(&self) -> &str {
        "series smoothing"
    }

    fn next_target(&self, view: ArrayView2<f64>) -> Result<Array2<f64>> {
        if view.ncols() != 2 {
            return Err(PursuitError::Precondition(format!(
                "series smoothing needs a 2-D view, got {} dimensions",
                view.ncols()
            )));
        }
        let n = view.nrows();
        if let Some(&bad) = self.series.iter().flatten().find(|&&i| i >= n) {
            return Err(PursuitError::Precondition(format!(
                "series item {} out of range for {} items",
                bad, n
            )));
        }

        let mut target = view.to_owned();
        for s in &self.series {
            for (k, &item) in s.iter().enumerate() {
                let prev = k.checked_sub(1).map(|p| s[p]);
                let next = s.get(k + 1).copied();
                if prev.is_none() && next.is_none() {
                    continue;
                }
                let mut acc: Array1<f64> = view.row(item).to_owned();
                let mut terms = 1.0;
                for neighbour in prev.into_iter().chain(next) {
                    acc += &view.row(neighbour);
                    terms += 1.0;
                }
                target.row_mut(item).assign(&(acc / terms));
            }
        }
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_three_point_series() {
        let view = array![[0.0, 0.0], [2.0, 0.0], [4.0, 0.0]];
        let target = SeriesSmoothing::new(vec![0, 1, 2])
            .next_target(view.view())
            .unwrap();
        let expected = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0]];
        for (a, b) in target.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_items_outside_series_keep_position() {
        let view = array![[0.0, 0.0], [5.0, 5.0], [2.0, 2.0]];
        let target = SeriesSmoothing::new(vec![0, 2])
            .next_target(view.view())
            .unwrap();
        assert_eq!(target.row(1), view.row(1));
        assert_abs_diff_eq!(target[[0, 0]], 1.0);
        assert_abs_diff_eq!(target[[2, 0]], 1.0);
    }

    #[test]
    fn test_singleton_series_unchanged() {
        let view = array![[3.0, 1.0]];
        let target = SeriesSmoothing::new(vec![0]).next_target(view.view()).unwrap();
        assert_eq!(target, view);
    }

    #[test]
    fn test_requires_two_dimensions() {
        let view = array![[0.0, 0.0, 0.0], [1.0, 1.0, 1.0]];
        assert!(matches!(
            SeriesSmoothing::new(vec![0, 1]).next_target(view.view()),
            Err(PursuitError::Precondition(_))
        ));
    }

    #[test]
    fn test_grouping_with_sparse_large_labels() {
        let groups = [Some(usize::MAX), Some(7), Some(usize::MAX), None];
        let key = [1.0, 0.0, 0.0, 5.0];
        let s = SeriesSmoothing::grouped_by(&groups, &key).unwrap();
        assert_eq!(s.series(), &[vec![1], vec![2, 0]]);
    }

    #[test]
    fn test_out_of_range_item() {
        let view = array![[0.0, 0.0]];
        assert!(SeriesSmoothing::new(vec![0, 3]).next_target(view.view()).is_err());
    }

    #[test]
    fn test_grouped_series_do_not_mix() {
        let groups = [Some(0), Some(1), Some(0), Some(1)];
        let key = [2.0, 1.0, 1.0, 2.0];
        let s = SeriesSmoothing::grouped_by(&groups, &key).unwrap();
        assert_eq!(s.series(), &[vec![2, 0], vec![1, 3]]);

        let view = array![[0.0, 0.0], [10.0, 0.0], [2.0, 0.0], [20.0, 0.0]];
        let target = s.next_target(view.view()).unwrap();
        assert_abs_diff_eq!(target[[0, 0]], 1.0);
        assert_abs_diff_eq!(target[[1, 0]], 15.0);
    }
}
