//! # Connection graph
//!
//! Named edges between items, resolved to data rows, plus per-item degree statistics used for
//! graph-aware targets and edge rendering.

use petgraph::graph::DiGraph;

pub mod connection;
pub mod metrics;

pub use connection::{Connection, ConnectionGraph};
pub use metrics::GraphMetrics;

/// Directed item graph: one node per data row (weighted by its row index), one edge per
/// connection in insertion order.
pub type ItemGraph = DiGraph<usize, f64>;
