//! # Tabular dataset
//!
//! The engine consumes a table of items (rows) with numeric attributes, which form the data
//! matrix, categorical attributes, which strategies use as labels, and one identifier column
//! used to resolve graph connections.
//!
//! A [`Dataset`] is immutable. Anything that changes its structure builds a new one, and every
//! build receives a fresh [`Dataset::revision`], so pursuits and connection graphs bound to an
//! older revision can tell they are stale.

use std::sync::atomic::{AtomicU64, Ordering};

use ndarray::{Array2, ArrayView2};

use crate::dense::{ColumnScaling, Normalize};
use crate::error::{PursuitError, Result};

static NEXT_REVISION: AtomicU64 = AtomicU64::new(1);

fn next_revision() -> u64 {
    NEXT_REVISION.fetch_add(1, Ordering::Relaxed)
}

/// A categorical attribute: level names plus, for every item, the index of its level.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoricalColumn {
    name: String,
    levels: Vec<String>,
    codes: Vec<Option<usize>>,
}

impl CategoricalColumn {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn levels(&self) -> &[String] {
        &self.levels
    }

    /// Level index per item; `None` when the item has no value for this attribute.
    pub fn codes(&self) -> &[Option<usize>] {
        &self.codes
    }

    pub fn value(&self, item: usize) -> Option<&str> {
        self.codes
            .get(item)
            .copied()
            .flatten()
            .map(|c| self.levels[c].as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Dataset {
    numeric: Array2<f64>,
    numeric_names: Vec<String>,
    categorical: Vec<CategoricalColumn>,
    identifiers: Vec<String>,
    revision: u64,
}

impl Dataset {
    /// Wraps a bare numeric matrix. Columns are named `x0, x1, ...` and items are identified
    /// by their row index.
    pub fn from_matrix(numeric: Array2<f64>) -> Self {
        let numeric_names = (0..numeric.ncols()).map(|j| format!("x{}", j)).collect();
        let identifiers = (0..numeric.nrows()).map(|i| i.to_string()).collect();
        Dataset {
            numeric,
            numeric_names,
            categorical: Vec::new(),
            identifiers,
            revision: next_revision(),
        }
    }

    pub fn n_items(&self) -> usize {
        self.numeric.nrows()
    }

    pub fn n_dims(&self) -> usize {
        self.numeric.ncols()
    }

    pub fn data(&self) -> ArrayView2<'_, f64> {
        self.numeric.view()
    }

    pub fn numeric_names(&self) -> &[String] {
        &self.numeric_names
    }

    pub fn numeric_index(&self, name: &str) -> Option<usize> {
        self.numeric_names.iter().position(|n| n == name)
    }

    pub fn categorical_columns(&self) -> &[CategoricalColumn] {
        &self.categorical
    }

    pub fn categorical(&self, name: &str) -> Result<&CategoricalColumn> {
        self.categorical
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| PursuitError::UnknownAttribute(name.to_string()))
    }

    pub fn identifiers(&self) -> &[String] {
        &self.identifiers
    }

    /// Row bound to `id`. When several rows share the identifier the last one in row order wins.
    pub fn row_of(&self, id: &str) -> Option<usize> {
        let mut found = None;
        for (row, candidate) in self.identifiers.iter().enumerate() {
            if candidate == id {
                found = Some(row);
            }
        }
        found
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Copy of this dataset with rescaled numeric columns. The copy gets a new revision.
    pub fn scaled(&self, scaling: ColumnScaling) -> anyhow::Result<Dataset> {
        let mut numeric = self.numeric.clone();
        numeric.scale_columns(scaling)?;
        Ok(Dataset {
            numeric,
            numeric_names: self.numeric_names.clone(),
            categorical: self.categorical.clone(),
            identifiers: self.identifiers.clone(),
            revision: next_revision(),
        })
    }
}

/// Column-wise assembly of a [`Dataset`], the shape importers hand to the engine.
#[derive(Debug, Default)]
pub struct DatasetBuilder {
    numeric: Vec<(String, Vec<f64>)>,
    categorical: Vec<(String, Vec<Option<String>>)>,
    identifiers: Option<Vec<String>>,
}

impl DatasetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn numeric(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.numeric.push((name.into(), values));
        self
    }

    pub fn categorical<S: AsRef<str>>(mut self, name: impl Into<String>, values: &[Option<S>]) -> Self {
        let values = values
            .iter()
            .map(|v| v.as_ref().map(|s| s.as_ref().to_string()))
            .collect();
        self.categorical.push((name.into(), values));
        self
    }

    pub fn identifiers<S: AsRef<str>>(mut self, values: &[S]) -> Self {
        self.identifiers = Some(values.iter().map(|s| s.as_ref().to_string()).collect());
        self
    }

    fn item_count(&self) -> usize {
        self.numeric
            .first()
            .map(|(_, v)| v.len())
            .or_else(|| self.categorical.first().map(|(_, v)| v.len()))
            .or_else(|| self.identifiers.as_ref().map(|v| v.len()))
            .unwrap_or(0)
    }

    pub fn build(self) -> Result<Dataset> {
        let n = self.item_count();

        for (_, values) in &self.numeric {
            if values.len() != n {
                return Err(PursuitError::mismatch("numeric column length", n, values.len()));
            }
        }
        for (_, values) in &self.categorical {
            if values.len() != n {
                return Err(PursuitError::mismatch("categorical column length", n, values.len()));
            }
        }

        let d = self.numeric.len();
        let mut numeric = Array2::zeros((n, d));
        for (j, (_, values)) in self.numeric.iter().enumerate() {
            for (i, &v) in values.iter().enumerate() {
                numeric[[i, j]] = v;
            }
        }
        let numeric_names = self.numeric.into_iter().map(|(name, _)| name).collect();

        let categorical = self
            .categorical
            .into_iter()
            .map(|(name, values)| {
                let mut levels: Vec<String> = Vec::new();
                let codes = values
                    .into_iter()
                    .map(|v| {
                        v.map(|s| match levels.iter().position(|l| *l == s) {
                            Some(idx) => idx,
                            None => {
                                levels.push(s);
                                levels.len() - 1
                            }
                        })
                    })
                    .collect();
                CategoricalColumn { name, levels, codes }
            })
            .collect();

        let identifiers = match self.identifiers {
            Some(ids) => {
                if ids.len() != n {
                    return Err(PursuitError::mismatch("identifier column length", n, ids.len()));
                }
                ids
            }
            None => (0..n).map(|i| i.to_string()).collect(),
        };

        Ok(Dataset {
            numeric,
            numeric_names,
            categorical,
            identifiers,
            revision: next_revision(),
        })
    }
}
