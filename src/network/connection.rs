use log::debug;
use petgraph::graph::NodeIndex;

use crate::dataset::Dataset;
use crate::error::{PursuitError, Result};
use crate::network::ItemGraph;

/// A weighted edge between two items, bound to row indices when it is built.
///
/// Rows are looked up by scanning the identifier column. If several rows share an identifier the
/// last one wins; whether upstream identifiers are meant to be unique is left open.
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    source_id: String,
    target_id: String,
    source: usize,
    target: usize,
    weight: f64,
}

impl Connection {
    pub fn new(dataset: &Dataset, source_id: &str, target_id: &str, weight: f64) -> Result<Self> {
        let source = dataset
            .row_of(source_id)
            .ok_or_else(|| PursuitError::UnresolvedIdentifier(source_id.to_string()))?;
        let target = dataset
            .row_of(target_id)
            .ok_or_else(|| PursuitError::UnresolvedIdentifier(target_id.to_string()))?;
        Ok(Connection {
            source_id: source_id.to_string(),
            target_id: target_id.to_string(),
            source,
            target,
            weight,
        })
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    pub fn source(&self) -> usize {
        self.source
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn touches(&self, id: &str) -> bool {
        self.source_id == id || self.target_id == id
    }
}

/// Ordered collection of connections resolved against one dataset revision.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionGraph {
    connections: Vec<Connection>,
    n_items: usize,
    revision: u64,
}

impl ConnectionGraph {
    pub fn new(dataset: &Dataset) -> Self {
        ConnectionGraph {
            connections: Vec::new(),
            n_items: dataset.n_items(),
            revision: dataset.revision(),
        }
    }

    /// Resolves every `(source, target, weight)` triple. The first unresolved identifier aborts
    /// construction.
    pub fn from_edges<I, S>(dataset: &Dataset, edges: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, S, f64)>,
        S: AsRef<str>,
    {
        let mut graph = ConnectionGraph::new(dataset);
        for (source, target, weight) in edges {
            graph.connect(dataset, source.as_ref(), target.as_ref(), weight)?;
        }
        debug!(
            "Resolved {} connections over {} items",
            graph.len(),
            graph.n_items
        );
        Ok(graph)
    }

    pub fn connect(&mut self, dataset: &Dataset, source: &str, target: &str, weight: f64) -> Result<()> {
        if self.is_stale(dataset) {
            return Err(PursuitError::Precondition(format!(
                "graph was resolved against dataset revision {}, got {}",
                self.revision,
                dataset.revision()
            )));
        }
        self.connections
            .push(Connection::new(dataset, source, target, weight)?);
        Ok(())
    }

    /// Resolves the same identifiers against a structurally changed dataset.
    pub fn resolve_against(&self, dataset: &Dataset) -> Result<Self> {
        Self::from_edges(
            dataset,
            self.connections
                .iter()
                .map(|c| (c.source_id.as_str(), c.target_id.as_str(), c.weight)),
        )
    }

    /// True when `dataset` is not the revision the indices were resolved against.
    pub fn is_stale(&self, dataset: &Dataset) -> bool {
        self.revision != dataset.revision()
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn n_items(&self) -> usize {
        self.n_items
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// All connections whose source or target is `id`, in insertion order.
    pub fn find_neighbours(&self, id: &str) -> Vec<&Connection> {
        self.connections.iter().filter(|c| c.touches(id)).collect()
    }

    /// Exports the graph for layout and rendering.
    pub fn to_digraph(&self) -> ItemGraph {
        let mut graph = ItemGraph::with_capacity(self.n_items, self.connections.len());
        for row in 0..self.n_items {
            graph.add_node(row);
        }
        for c in &self.connections {
            graph.add_edge(NodeIndex::new(c.source), NodeIndex::new(c.target), c.weight);
        }
        graph
    }
}
