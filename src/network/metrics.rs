use petgraph::Direction::{Incoming, Outgoing};

use crate::network::ConnectionGraph;

/// Per-item degree statistics.
///
/// A self-loop counts once as incoming and once as outgoing, so `total[i] == incoming[i] +
/// outgoing[i]` holds for every item.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphMetrics {
    pub total: Vec<usize>,
    pub incoming: Vec<usize>,
    pub outgoing: Vec<usize>,
    /// Sum of incoming edge weights.
    pub strength_in: Vec<f64>,
    /// Sum of outgoing edge weights.
    pub strength_out: Vec<f64>,
}

impl GraphMetrics {
    pub fn compute(graph: &ConnectionGraph) -> Self {
        let g = graph.to_digraph();
        let n = g.node_count();
        let mut metrics = GraphMetrics {
            total: vec![0; n],
            incoming: vec![0; n],
            outgoing: vec![0; n],
            strength_in: vec![0.0; n],
            strength_out: vec![0.0; n],
        };

        for node in g.node_indices() {
            let i = node.index();
            for edge in g.edges_directed(node, Incoming) {
                metrics.incoming[i] += 1;
                metrics.strength_in[i] += *edge.weight();
            }
            for edge in g.edges_directed(node, Outgoing) {
                metrics.outgoing[i] += 1;
                metrics.strength_out[i] += *edge.weight();
            }
            metrics.total[i] = metrics.incoming[i] + metrics.outgoing[i];
        }
        metrics
    }

    pub fn n_items(&self) -> usize {
        self.total.len()
    }

    /// Largest total degree, 0 for an empty graph. Handy for normalising point sizes.
    pub fn max_total(&self) -> usize {
        self.total.iter().copied().max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::DatasetBuilder;

    #[test]
    fn test_degrees() {
        let ds = DatasetBuilder::new()
            .numeric("x", vec![0.0, 1.0, 2.0, 3.0])
            .identifiers(&["a", "b", "c", "d"])
            .build()
            .unwrap();
        let g = ConnectionGraph::from_edges(
            &ds,
            vec![("a", "b", 1.0), ("a", "c", 2.0), ("c", "b", 0.5), ("c", "c", 1.0)],
        )
        .unwrap();
        let m = GraphMetrics::compute(&g);

        assert_eq!(m.outgoing, vec![2, 0, 2, 0]);
        assert_eq!(m.incoming, vec![0, 2, 2, 0]);
        assert_eq!(m.total, vec![2, 2, 4, 0]);
        for i in 0..m.n_items() {
            assert_eq!(m.total[i], m.incoming[i] + m.outgoing[i]);
        }
        assert_eq!(m.strength_in[1], 1.5);
        assert_eq!(m.strength_out[0], 3.0);
        assert_eq!(m.max_total(), 4);
    }

    #[test]
    fn test_empty_graph() {
        let ds = DatasetBuilder::new()
            .numeric("x", vec![0.0, 1.0])
            .build()
            .unwrap();
        let m = GraphMetrics::compute(&ConnectionGraph::new(&ds));
        assert_eq!(m.total, vec![0, 0]);
        assert_eq!(m.max_total(), 0);
    }
}
