//! # Hierarchical agglomerative clustering
//!
//! Builds a dendrogram bottom-up: every item starts as its own leaf cluster and the two closest
//! active clusters are merged until a single root remains. Closeness between clusters is
//! defined by a [`LinkagePolicy`]; single linkage is the default.
//!
//! Pairwise item distances are computed once, in parallel, and cluster distances are then kept
//! up to date with Lance–Williams updates. Each merge step still scans all active pairs, so the
//! whole run is O(k³) for k items. That is fine for the interactive dataset sizes this engine
//! targets and not meant for large-scale clustering.

use log::debug;
use ndarray::{Array1, ArrayView2};
use rayon::prelude::*;

use crate::clustering::linkage::LinkagePolicy;
use crate::error::{PursuitError, Result};
use crate::utils::euclidean;

/// A child of a cluster node: either a single item or a nested cluster.
#[derive(Debug, Clone, PartialEq)]
pub enum ClusterMember {
    Item(usize),
    Cluster(Box<HierarchicalCluster>),
}

/// A node in the dendrogram.
///
/// The centroid is always the mean of the direct children's centroids, where an item's
/// centroid is its own position. It is recomputed whenever membership changes.
#[derive(Debug, Clone, PartialEq)]
pub struct HierarchicalCluster {
    children: Vec<ClusterMember>,
    centroid: Array1<f64>,
    height: f64,
    size: usize,
}

impl HierarchicalCluster {
    /// Leaf cluster holding exactly one item.
    pub fn leaf(item: usize, positions: ArrayView2<f64>) -> Result<Self> {
        Self::from_members(vec![ClusterMember::Item(item)], positions)
    }

    /// Cluster over an explicit member list. Fails on an empty list, an item index outside
    /// `positions`, or a nested cluster whose centroid has the wrong dimensionality.
    pub fn from_members(members: Vec<ClusterMember>, positions: ArrayView2<f64>) -> Result<Self> {
        if members.is_empty() {
            return Err(PursuitError::InvalidCluster(
                "a cluster needs at least one member".to_string(),
            ));
        }
        let mut cluster = HierarchicalCluster {
            children: Vec::with_capacity(members.len()),
            centroid: Array1::zeros(positions.ncols()),
            height: 0.0,
            size: 0,
        };
        for member in members {
            cluster.push_member(member, positions)?;
        }
        cluster.recompute_centroid(positions);
        Ok(cluster)
    }

    /// Joins two clusters under a new node at the given linkage height.
    pub fn merge(a: HierarchicalCluster, b: HierarchicalCluster, height: f64) -> Self {
        let centroid = (&a.centroid + &b.centroid) / 2.0;
        let size = a.size + b.size;
        HierarchicalCluster {
            children: vec![
                ClusterMember::Cluster(Box::new(a)),
                ClusterMember::Cluster(Box::new(b)),
            ],
            centroid,
            height,
            size,
        }
    }

    pub fn add_member(&mut self, member: ClusterMember, positions: ArrayView2<f64>) -> Result<()> {
        self.push_member(member, positions)?;
        self.recompute_centroid(positions);
        Ok(())
    }

    fn push_member(&mut self, member: ClusterMember, positions: ArrayView2<f64>) -> Result<()> {
        match &member {
            ClusterMember::Item(i) => {
                if *i >= positions.nrows() {
                    return Err(PursuitError::InvalidCluster(format!(
                        "item {} out of range for {} positions",
                        i,
                        positions.nrows()
                    )));
                }
                self.size += 1;
            }
            ClusterMember::Cluster(c) => {
                if c.centroid.len() != positions.ncols() {
                    return Err(PursuitError::InvalidCluster(format!(
                        "sub-cluster centroid has {} dimensions, expected {}",
                        c.centroid.len(),
                        positions.ncols()
                    )));
                }
                self.size += c.size;
                self.height = self.height.max(c.height);
            }
        }
        self.children.push(member);
        Ok(())
    }

    fn recompute_centroid(&mut self, positions: ArrayView2<f64>) {
        let mut acc = Array1::<f64>::zeros(positions.ncols());
        for child in &self.children {
            match child {
                ClusterMember::Item(i) => acc += &positions.row(*i),
                ClusterMember::Cluster(c) => acc += &c.centroid,
            }
        }
        self.centroid = acc / self.children.len() as f64;
    }

    pub fn children(&self) -> &[ClusterMember] {
        &self.children
    }

    pub fn centroid(&self) -> &Array1<f64> {
        &self.centroid
    }

    /// Linkage distance at which this node was formed; 0 for leaves.
    pub fn height(&self) -> f64 {
        self.height
    }

    /// Number of items under this node.
    pub fn size(&self) -> usize {
        self.size
    }

    /// True when the node has no nested clusters.
    pub fn is_leaf(&self) -> bool {
        self.children
            .iter()
            .all(|c| matches!(c, ClusterMember::Item(_)))
    }

    /// Item indices under this node, depth first.
    pub fn items(&self) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.size);
        self.collect_items(&mut out);
        out
    }

    fn collect_items(&self, out: &mut Vec<usize>) {
        for child in &self.children {
            match child {
                ClusterMember::Item(i) => out.push(*i),
                ClusterMember::Cluster(c) => c.collect_items(out),
            }
        }
    }

    /// Checks the centroid invariant recursively down to the leaves.
    pub fn is_consistent(&self, positions: ArrayView2<f64>, tolerance: f64) -> bool {
        let mut acc = Array1::<f64>::zeros(self.centroid.len());
        for child in &self.children {
            match child {
                ClusterMember::Item(i) => {
                    if *i >= positions.nrows() {
                        return false;
                    }
                    acc += &positions.row(*i);
                }
                ClusterMember::Cluster(c) => {
                    if !c.is_consistent(positions, tolerance) {
                        return false;
                    }
                    acc += &c.centroid;
                }
            }
        }
        let expected = acc / self.children.len() as f64;
        expected
            .iter()
            .zip(self.centroid.iter())
            .all(|(a, b)| (a - b).abs() <= tolerance)
    }
}

/// One merge step, in the order it happened.
#[derive(Debug, Clone, PartialEq)]
pub struct Merge {
    pub left: Vec<usize>,
    pub right: Vec<usize>,
    pub height: f64,
}

/// Result of a clustering run: the root node plus the merge history.
#[derive(Debug, Clone, PartialEq)]
pub struct Dendrogram {
    root: Option<HierarchicalCluster>,
    merges: Vec<Merge>,
}

impl Dendrogram {
    /// `None` only when clustering ran over zero items.
    pub fn root(&self) -> Option<&HierarchicalCluster> {
        self.root.as_ref()
    }

    pub fn into_root(self) -> Option<HierarchicalCluster> {
        self.root
    }

    pub fn merges(&self) -> &[Merge] {
        &self.merges
    }

    /// Cuts the tree into at most `k` groups by undoing the highest merges first.
    /// Returns one label per item; labels are numbered by each group's smallest item.
    pub fn cut(&self, k: usize) -> Vec<usize> {
        match &self.root {
            Some(root) => cut_tree(root, k),
            None => Vec::new(),
        }
    }
}

enum Group<'a> {
    Node(&'a HierarchicalCluster),
    Loose(Vec<usize>),
}

impl Group<'_> {
    fn items(&self) -> Vec<usize> {
        match self {
            Group::Node(node) => node.items(),
            Group::Loose(items) => items.clone(),
        }
    }

    fn splittable_height(&self) -> Option<f64> {
        match self {
            Group::Node(node) if !node.is_leaf() => Some(node.height),
            _ => None,
        }
    }
}

/// Labels from splitting the highest nodes of `root` until there are `k` groups or only leaves
/// remain.
pub fn cut_tree(root: &HierarchicalCluster, k: usize) -> Vec<usize> {
    let mut groups = vec![Group::Node(root)];
    while groups.len() < k {
        let candidate = groups
            .iter()
            .enumerate()
            .filter_map(|(idx, g)| g.splittable_height().map(|h| (idx, h)))
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(idx, _)| idx);
        let Some(idx) = candidate else { break };
        let Group::Node(node) = groups.swap_remove(idx) else {
            break;
        };

        let mut loose = Vec::new();
        for child in &node.children {
            match child {
                ClusterMember::Cluster(c) => groups.push(Group::Node(c.as_ref())),
                ClusterMember::Item(i) => loose.push(*i),
            }
        }
        if !loose.is_empty() {
            groups.push(Group::Loose(loose));
        }
    }

    let mut members: Vec<Vec<usize>> = groups.iter().map(Group::items).collect();
    members.sort_by_key(|m| m.iter().copied().min().unwrap_or(usize::MAX));

    let n = members.iter().flatten().copied().max().map_or(0, |m| m + 1);
    let mut labels = vec![0; n];
    for (label, group) in members.iter().enumerate() {
        for &item in group {
            labels[item] = label;
        }
    }
    labels
}

struct Slot {
    node: HierarchicalCluster,
    key: usize,
}

/// Agglomerative clustering over the rows of `positions`.
///
/// The globally closest pair of active clusters is merged at each step; ties go to the first
/// pair in active-list order. The merged node is appended to the end of the active list.
pub fn agglomerative_clustering<L: LinkagePolicy>(
    positions: ArrayView2<f64>,
    linkage: &L,
) -> Result<Dendrogram> {
    let k = positions.nrows();
    if positions.iter().any(|v| !v.is_finite()) {
        return Err(PursuitError::InvalidCluster(
            "positions contain non-finite values".to_string(),
        ));
    }

    let mut dist: Vec<Vec<f64>> = (0..k)
        .into_par_iter()
        .map(|i| {
            (0..k)
                .map(|j| euclidean(positions.row(i), positions.row(j)))
                .collect()
        })
        .collect();

    let mut active = Vec::with_capacity(k);
    for i in 0..k {
        active.push(Slot {
            node: HierarchicalCluster::leaf(i, positions)?,
            key: i,
        });
    }

    let mut merges = Vec::with_capacity(k.saturating_sub(1));
    while active.len() > 1 {
        let mut best: Option<(f64, usize, usize)> = None;
        for i in 0..active.len() {
            for j in (i + 1)..active.len() {
                let d = dist[active[i].key][active[j].key];
                if best.map_or(true, |(bd, _, _)| d < bd) {
                    best = Some((d, i, j));
                }
            }
        }
        let Some((height, i, j)) = best else { break };

        let b = active.remove(j);
        let a = active.remove(i);
        let (ka, kb) = (a.key, b.key);
        for slot in &active {
            let kc = slot.key;
            let d = linkage.combine(dist[ka][kc], dist[kb][kc], a.node.size, b.node.size);
            dist[ka][kc] = d;
            dist[kc][ka] = d;
        }

        merges.push(Merge {
            left: a.node.items(),
            right: b.node.items(),
            height,
        });
        active.push(Slot {
            node: HierarchicalCluster::merge(a.node, b.node, height),
            key: ka,
        });
    }

    debug!("Clustered {} items in {} merges", k, merges.len());
    Ok(Dendrogram {
        root: active.pop().map(|s| s.node),
        merges,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::Linkage;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2};

    fn line(xs: &[f64]) -> Array2<f64> {
        Array2::from_shape_fn((xs.len(), 1), |(i, _)| xs[i])
    }

    #[test]
    fn test_single_item() {
        let pos = array![[3.0, 4.0]];
        let d = agglomerative_clustering(pos.view(), &Linkage::Single).unwrap();
        let root = d.root().unwrap();
        assert_eq!(root.items(), vec![0]);
        assert!(root.is_leaf());
        assert_abs_diff_eq!(root.centroid()[1], 4.0);
        assert!(d.merges().is_empty());
    }

    #[test]
    fn test_no_items() {
        let pos = Array2::<f64>::zeros((0, 2));
        let d = agglomerative_clustering(pos.view(), &Linkage::Single).unwrap();
        assert!(d.root().is_none());
        assert!(d.cut(3).is_empty());
    }

    #[test]
    fn test_collinear_points_merge_near_pairs_first() {
        let pos = line(&[0.0, 1.0, 2.0, 10.0]);
        let d = agglomerative_clustering(pos.view(), &Linkage::Single).unwrap();
        let merges = d.merges();
        assert_eq!(merges.len(), 3);

        assert_eq!((merges[0].left.clone(), merges[0].right.clone()), (vec![0], vec![1]));
        assert_abs_diff_eq!(merges[0].height, 1.0);
        assert_abs_diff_eq!(merges[1].height, 1.0);
        assert_abs_diff_eq!(merges[2].height, 8.0);
        // the far point joins last
        assert!(merges[..2]
            .iter()
            .all(|m| !m.left.contains(&3) && !m.right.contains(&3)));
        assert_eq!(merges[2].left, vec![3]);
    }

    #[test]
    fn test_single_root_and_centroid_invariant() {
        let pos = array![[0.0, 0.0], [1.0, 0.0], [0.0, 5.0], [7.0, 7.0], [6.5, 7.5]];
        for linkage in [Linkage::Single, Linkage::Complete, Linkage::Average] {
            let d = agglomerative_clustering(pos.view(), &linkage).unwrap();
            let root = d.root().unwrap();
            assert_eq!(root.size(), 5);
            let mut items = root.items();
            items.sort();
            assert_eq!(items, vec![0, 1, 2, 3, 4]);
            assert!(root.is_consistent(pos.view(), 1e-12));
        }
    }

    #[test]
    fn test_complete_linkage_differs_from_single() {
        // chain: single linkage keeps absorbing the chain, complete prefers the compact pair
        let pos = line(&[0.0, 1.0, 2.1, 3.3, 10.0, 10.9]);
        let single = agglomerative_clustering(pos.view(), &Linkage::Single).unwrap();
        let complete = agglomerative_clustering(pos.view(), &Linkage::Complete).unwrap();
        let last_single = single.merges().last().unwrap().height;
        let last_complete = complete.merges().last().unwrap().height;
        assert_abs_diff_eq!(last_single, 10.0 - 3.3, epsilon = 1e-12);
        assert_abs_diff_eq!(last_complete, 10.9, epsilon = 1e-12);
    }

    #[test]
    fn test_cut_into_groups() {
        let pos = line(&[0.0, 0.5, 1.0, 20.0, 20.5, 40.0]);
        let d = agglomerative_clustering(pos.view(), &Linkage::Single).unwrap();
        assert_eq!(d.cut(1), vec![0; 6]);
        assert_eq!(d.cut(2), vec![0, 0, 0, 0, 0, 1]);
        assert_eq!(d.cut(3), vec![0, 0, 0, 1, 1, 2]);
        // asking for more groups than items stops at singletons
        let all = d.cut(10);
        let mut distinct = all.clone();
        distinct.sort();
        distinct.dedup();
        assert_eq!(distinct.len(), 6);
    }

    #[test]
    fn test_invalid_members_fail_fast() {
        let pos = array![[0.0], [1.0]];
        assert!(matches!(
            HierarchicalCluster::from_members(vec![], pos.view()),
            Err(PursuitError::InvalidCluster(_))
        ));
        assert!(matches!(
            HierarchicalCluster::leaf(5, pos.view()),
            Err(PursuitError::InvalidCluster(_))
        ));
    }

    #[test]
    fn test_add_member_recomputes_centroid() {
        let pos = array![[0.0, 0.0], [4.0, 2.0]];
        let mut c = HierarchicalCluster::leaf(0, pos.view()).unwrap();
        c.add_member(ClusterMember::Item(1), pos.view()).unwrap();
        assert_eq!(c.size(), 2);
        assert_abs_diff_eq!(c.centroid()[0], 2.0);
        assert_abs_diff_eq!(c.centroid()[1], 1.0);
        assert!(c.is_consistent(pos.view(), 1e-12));
    }

    #[test]
    fn test_non_finite_positions_rejected() {
        let pos = array![[0.0], [f64::NAN]];
        assert!(agglomerative_clustering(pos.view(), &Linkage::Single).is_err());
    }
}
