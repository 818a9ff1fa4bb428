use anyhow::bail;
use ndarray::Array2;

/// Per-column rescaling applied before projecting, so that no attribute dominates
/// the view purely through its units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColumnScaling {
    /// Map each column onto [0, 1].
    MinMax,
    /// Subtract the column mean and divide by the (population) standard deviation.
    #[default]
    ZScore,
}

pub trait Normalize {
    /// Rescale every column in place. Constant columns become all zeros.
    fn scale_columns(&mut self, scaling: ColumnScaling) -> anyhow::Result<()>;
}

impl Normalize for Array2<f64> {
    fn scale_columns(&mut self, scaling: ColumnScaling) -> anyhow::Result<()> {
        if self.iter().any(|v| !v.is_finite()) {
            bail!("Cannot scale columns containing non-finite values");
        }
        let n = self.nrows();
        if n == 0 {
            return Ok(());
        }

        for mut col in self.columns_mut() {
            match scaling {
                ColumnScaling::MinMax => {
                    let min = col.iter().cloned().fold(f64::INFINITY, f64::min);
                    let max = col.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                    let range = max - min;
                    if range > f64::EPSILON {
                        col.mapv_inplace(|v| (v - min) / range);
                    } else {
                        col.fill(0.0);
                    }
                }
                ColumnScaling::ZScore => {
                    let mean = col.sum() / n as f64;
                    let var = col.iter().map(|&v| (v - mean) * (v - mean)).sum::<f64>() / n as f64;
                    let sd = var.sqrt();
                    if sd > f64::EPSILON {
                        col.mapv_inplace(|v| (v - mean) / sd);
                    } else {
                        col.fill(0.0);
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_min_max_scaling() {
        let mut arr = array![[0.0, 5.0], [5.0, 5.0], [10.0, 5.0]];
        arr.scale_columns(ColumnScaling::MinMax).unwrap();
        assert_relative_eq!(arr[[0, 0]], 0.0);
        assert_relative_eq!(arr[[1, 0]], 0.5);
        assert_relative_eq!(arr[[2, 0]], 1.0);
        // constant column collapses to zero
        assert!(arr.column(1).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_z_score_scaling() {
        let mut arr = array![[1.0], [2.0], [3.0]];
        arr.scale_columns(ColumnScaling::ZScore).unwrap();
        assert_relative_eq!(arr.column(0).sum(), 0.0, epsilon = 1e-12);
        let var = arr.column(0).iter().map(|v| v * v).sum::<f64>() / 3.0;
        assert_relative_eq!(var, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_scaling_rejects_nan() {
        let mut arr = array![[1.0], [f64::NAN]];
        assert!(arr.scale_columns(ColumnScaling::MinMax).is_err());
    }
}
