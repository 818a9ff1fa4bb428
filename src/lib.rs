//! Targeted projection pursuit.
//!
//! Steers a linear low-dimensional projection of tabular data toward a desired arrangement by
//! repeatedly perturbing a target view and re-fitting the projection to it. Hierarchical
//! clustering and connection-graph metrics provide read-only side views over the same data.

pub mod clustering;
pub mod dataset;
pub mod dense;
pub mod error;
pub mod network;
pub mod projection;
pub mod pursuit;
pub mod strategy;
mod utils;

pub use error::{PursuitError, Result};
pub use utils::{euclidean, frobenius, mean_of_rows};
