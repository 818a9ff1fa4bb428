use std::collections::BTreeMap;

use ndarray::{Array1, Array2, ArrayView2};

use crate::clustering::HierarchicalCluster;
use crate::dataset::Dataset;
use crate::error::{PursuitError, Result};
use crate::strategy::{PerturbationStrategy, DEFAULT_STEP};
use crate::utils::mean_of_rows;

/// Pulls each labelled item toward the centroid of its own class and pushes it away from the
/// centroid of all items in other classes. Unlabelled items keep their position.
#[derive(Debug, Clone)]
pub struct ClassSeparation {
    labels: Vec<Option<usize>>,
    step: f64,
    name: String,
}

impl ClassSeparation {
    pub fn from_labels(labels: Vec<Option<usize>>) -> Self {
        ClassSeparation {
            labels,
            step: DEFAULT_STEP,
            name: "class separation".to_string(),
        }
    }

    /// Labels taken from a categorical attribute of `dataset`.
    pub fn from_attribute(dataset: &Dataset, attribute: &str) -> Result<Self> {
        let column = dataset.categorical(attribute)?;
        let mut strategy = Self::from_labels(column.codes().to_vec());
        strategy.name = format!("separate by {}", attribute);
        Ok(strategy)
    }

    /// Labels from cutting a dendrogram into `k` groups.
    pub fn from_dendrogram(root: &HierarchicalCluster, k: usize) -> Self {
        let labels = crate::clustering::cut_tree(root, k)
            .into_iter()
            .map(Some)
            .collect();
        let mut strategy = Self::from_labels(labels);
        strategy.name = format!("separate {} clusters", k);
        strategy
    }

    pub fn with_step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }

    pub fn labels(&self) -> &[Option<usize>] {
        &self.labels
    }
}

impl PerturbationStrategy for ClassSeparation {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_target(&self, view: ArrayView2<f64>) -> Result<Array2<f64>> {
        if self.labels.len() != view.nrows() {
            return Err(PursuitError::Precondition(format!(
                "{} labels for a view of {} items",
                self.labels.len(),
                view.nrows()
            )));
        }

        let mut members: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (i, label) in self.labels.iter().enumerate() {
            if let Some(c) = label {
                members.entry(*c).or_default().push(i);
            }
        }

        let centroids: BTreeMap<usize, (Option<Array1<f64>>, Option<Array1<f64>>)> = members
            .iter()
            .map(|(&c, own)| {
                let rest: Vec<usize> = members
                    .iter()
                    .filter(|(k, _)| **k != c)
                    .flat_map(|(_, m)| m.iter().copied())
                    .collect();
                (c, (mean_of_rows(view, own), mean_of_rows(view, &rest)))
            })
            .collect();

        let mut target = view.to_owned();
        for (i, label) in self.labels.iter().enumerate() {
            let Some((own, others)) = label.and_then(|c| centroids.get(&c)) else {
                continue;
            };
            let pos = view.row(i);
            let mut row = target.row_mut(i);
            if let Some(centroid) = own {
                row.scaled_add(self.step, &(centroid - &pos));
            }
            if let Some(centroid) = others {
                row.scaled_add(self.step, &(&pos - centroid));
            }
        }
        Ok(target)
    }
}
