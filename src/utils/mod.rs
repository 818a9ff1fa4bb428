use nalgebra::DMatrix;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::error::{PursuitError, Result};

pub(crate) fn to_dmatrix(x: ArrayView2<f64>) -> DMatrix<f64> {
    let (rows, cols) = x.dim();
    DMatrix::from_fn(rows, cols, |i, j| x[[i, j]])
}

pub(crate) fn from_dmatrix(m: &DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn((m.nrows(), m.ncols()), |(i, j)| m[(i, j)])
}

/// Fails with `Numerical` when any value is NaN or infinite. The SVD panics on such input.
pub(crate) fn ensure_finite(x: ArrayView2<f64>, context: &str) -> Result<()> {
    match x.indexed_iter().find(|(_, v)| !v.is_finite()) {
        Some(((i, j), v)) => Err(PursuitError::Numerical(format!(
            "{} has non-finite value {} at ({}, {})",
            context, v, i, j
        ))),
        None => Ok(()),
    }
}

pub fn euclidean(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

pub fn frobenius(x: ArrayView2<f64>) -> f64 {
    x.iter().map(|&v| v * v).sum::<f64>().sqrt()
}

/// Mean of the given rows, or `None` when `rows` is empty.
pub fn mean_of_rows(x: ArrayView2<f64>, rows: &[usize]) -> Option<Array1<f64>> {
    if rows.is_empty() {
        return None;
    }
    let mut acc = Array1::<f64>::zeros(x.ncols());
    for &r in rows {
        acc += &x.row(r);
    }
    Some(acc / rows.len() as f64)
}

pub fn column_means(x: ArrayView2<f64>) -> Array1<f64> {
    x.mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(x.ncols()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_dmatrix_conversion_preserves_layout() {
        let a = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let m = to_dmatrix(a.view());
        assert_eq!(m.nrows(), 2);
        assert_eq!(m.ncols(), 3);
        assert_eq!(m[(1, 0)], 4.0);
        assert_eq!(from_dmatrix(&m), a);
    }

    #[test]
    fn test_mean_of_rows() {
        let a = array![[0.0, 0.0], [2.0, 4.0], [10.0, 10.0]];
        let m = mean_of_rows(a.view(), &[0, 1]).unwrap();
        assert_abs_diff_eq!(m[0], 1.0);
        assert_abs_diff_eq!(m[1], 2.0);
        assert!(mean_of_rows(a.view(), &[]).is_none());
    }

    #[test]
    fn test_ensure_finite() {
        assert!(ensure_finite(array![[1.0, 2.0]].view(), "data").is_ok());
        let err = ensure_finite(array![[1.0], [f64::NEG_INFINITY]].view(), "data").unwrap_err();
        assert!(matches!(err, PursuitError::Numerical(ref m) if m.contains("(1, 0)")));
    }

    #[test]
    fn test_euclidean() {
        let a = array![0.0, 0.0];
        let b = array![3.0, 4.0];
        assert_abs_diff_eq!(euclidean(a.view(), b.view()), 5.0);
    }
}
