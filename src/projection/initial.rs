//! Starting projections for a pursuit.

use nalgebra::linalg::SVD;
use ndarray::{Array2, ArrayView2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::Result;
use crate::utils::{column_means, ensure_finite, to_dmatrix};

const RANK_TOL: f64 = 1e-10;

/// Random D×V projection with coefficients drawn uniformly from [-1, 1) and each view column
/// scaled to unit length. Deterministic for a given seed.
pub fn random_projection(n_dims: usize, view_dims: usize, seed: u64) -> Array2<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut projection =
        Array2::from_shape_simple_fn((n_dims, view_dims), || rng.random_range(-1.0..1.0));

    for mut col in projection.axis_iter_mut(Axis(1)) {
        let norm = col.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > f64::EPSILON {
            col.mapv_inplace(|v| v / norm);
        }
    }
    projection
}

/// Projection onto the leading `view_dims` principal axes of the column-centred data.
///
/// When the data has fewer than `view_dims` non-degenerate directions the remaining columns are
/// left at zero.
pub fn principal_components(data: ArrayView2<f64>, view_dims: usize) -> Result<Array2<f64>> {
    ensure_finite(data, "principal component data")?;
    let (n, d) = data.dim();
    let mut projection = Array2::zeros((d, view_dims));
    if n == 0 || d == 0 {
        return Ok(projection);
    }

    let means = column_means(data);
    let centred = &data - &means;

    let svd = SVD::new(to_dmatrix(centred.view()), false, true);
    let v_t = match svd.v_t {
        Some(v_t) => v_t,
        None => return Ok(projection),
    };

    let mut order: Vec<usize> = (0..svd.singular_values.len()).collect();
    order.sort_by(|&a, &b| {
        svd.singular_values[b]
            .partial_cmp(&svd.singular_values[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let sigma_max = order
        .first()
        .map(|&i| svd.singular_values[i])
        .unwrap_or(0.0);
    for (axis, &k) in order.iter().take(view_dims).enumerate() {
        if svd.singular_values[k] <= RANK_TOL * sigma_max.max(1.0) {
            break;
        }
        for j in 0..d {
            projection[[j, axis]] = v_t[(k, j)];
        }
    }
    Ok(projection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_random_projection_is_seeded() {
        let a = random_projection(5, 2, 7);
        let b = random_projection(5, 2, 7);
        let c = random_projection(5, 2, 8);
        assert_eq!(a, b);
        assert_ne!(a, c);
        for col in a.axis_iter(Axis(1)) {
            let norm = col.iter().map(|v| v * v).sum::<f64>().sqrt();
            assert_abs_diff_eq!(norm, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_principal_axis_follows_spread() {
        // all variance along the first attribute
        let data = array![[-2.0, 1.0, 0.0], [0.0, 1.0, 0.0], [2.0, 1.0, 0.0], [4.0, 1.0, 0.0]];
        let p = principal_components(data.view(), 2).unwrap();
        assert_eq!(p.dim(), (3, 2));
        assert_abs_diff_eq!(p[[0, 0]].abs(), 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(p[[1, 0]], 0.0, epsilon = 1e-9);
        // rank one after centring, so the second axis stays empty
        assert!(p.column(1).iter().all(|v| v.abs() < 1e-9));
    }

    #[test]
    fn test_principal_components_reject_missing_values() {
        let data = array![[1.0, 2.0], [f64::NAN, 0.0], [3.0, 1.0]];
        assert!(matches!(
            principal_components(data.view(), 2),
            Err(crate::error::PursuitError::Numerical(_))
        ));
    }

    #[test]
    fn test_principal_components_of_empty_data() {
        let data = Array2::<f64>::zeros((0, 4));
        let p = principal_components(data.view(), 2).unwrap();
        assert_eq!(p.dim(), (4, 2));
    }
}
