//! # Clustering
//!
//! Hierarchical agglomerative clustering over item positions, either the raw data rows or the
//! current view. The resulting dendrogram feeds cluster-based targets and display.

pub(crate) mod hierarchical;
pub(crate) mod linkage;

pub use hierarchical::agglomerative_clustering;
pub use hierarchical::cut_tree;
pub use hierarchical::ClusterMember;
pub use hierarchical::Dendrogram;
pub use hierarchical::HierarchicalCluster;
pub use hierarchical::Merge;
pub use linkage::Linkage;
pub use linkage::LinkagePolicy;
