use std::sync::Arc;

use ndarray::{Array1, Array2, ArrayView2};

use crate::error::{PursuitError, Result};
use crate::network::ConnectionGraph;
use crate::strategy::{PerturbationStrategy, DEFAULT_STEP};

/// Moves every connected item toward the weighted mean position of its neighbours, so the view
/// drifts toward a layout that keeps linked items close. Edges are used in both directions.
#[derive(Debug, Clone)]
pub struct ConnectionAttraction {
    graph: Arc<ConnectionGraph>,
    step: f64,
}

impl ConnectionAttraction {
    pub fn new(graph: Arc<ConnectionGraph>) -> Self {
        ConnectionAttraction {
            graph,
            step: DEFAULT_STEP,
        }
    }

    pub fn with_step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }
}

impl PerturbationStrategy for ConnectionAttraction {
    fn name(&self) -> &str {
        "connection attraction"
    }

    fn next_target(&self, view: ArrayView2<f64>) -> Result<Array2<f64>> {
        let n = view.nrows();
        if self.graph.n_items() != n {
            return Err(PursuitError::Precondition(format!(
                "graph resolved for {} items, view has {}",
                self.graph.n_items(),
                n
            )));
        }

        let mut pull = Array2::<f64>::zeros(view.dim());
        let mut weight = vec![0.0; n];
        for c in self.graph.connections() {
            let (s, t, w) = (c.source(), c.target(), c.weight().abs());
            if s == t {
                continue;
            }
            pull.row_mut(s).scaled_add(w, &view.row(t));
            pull.row_mut(t).scaled_add(w, &view.row(s));
            weight[s] += w;
            weight[t] += w;
        }

        let mut target = view.to_owned();
        for i in 0..n {
            if weight[i] <= 0.0 {
                continue;
            }
            let mean: Array1<f64> = pull.row(i).to_owned() / weight[i];
            let delta = &mean - &view.row(i);
            target.row_mut(i).scaled_add(self.step, &delta);
        }
        Ok(target)
    }
}
