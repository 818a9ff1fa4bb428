/// Inter-cluster distance policy, expressed as a Lance–Williams update: given the distances from
/// clusters `a` and `b` to a third cluster `c`, return the distance from `a ∪ b` to `c`.
pub trait LinkagePolicy: Send + Sync {
    fn combine(&self, d_ac: f64, d_bc: f64, size_a: usize, size_b: usize) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Linkage {
    /// Minimum pairwise distance between members.
    #[default]
    Single,
    /// Maximum pairwise distance between members.
    Complete,
    /// Mean pairwise distance between members (UPGMA).
    Average,
}

impl LinkagePolicy for Linkage {
    fn combine(&self, d_ac: f64, d_bc: f64, size_a: usize, size_b: usize) -> f64 {
        match self {
            Linkage::Single => d_ac.min(d_bc),
            Linkage::Complete => d_ac.max(d_bc),
            Linkage::Average => {
                let (na, nb) = (size_a as f64, size_b as f64);
                (na * d_ac + nb * d_bc) / (na + nb)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_updates() {
        assert_relative_eq!(Linkage::Single.combine(2.0, 5.0, 1, 1), 2.0);
        assert_relative_eq!(Linkage::Complete.combine(2.0, 5.0, 1, 1), 5.0);
        assert_relative_eq!(Linkage::Average.combine(2.0, 5.0, 2, 1), 3.0);
    }
}
