use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use log::{debug, error, info, warn};
use parking_lot::RwLock;

use crate::error::{PursuitError, Result};
use crate::projection::ConstraintSet;
use crate::pursuit::{ProjectionModel, Pursuit, PursuitConfig, StepOutcome};
use crate::strategy::PerturbationStrategy;

const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const STOPPING: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PursuitState {
    Idle,
    Running,
    Stopping,
}

impl PursuitState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            RUNNING => PursuitState::Running,
            STOPPING => PursuitState::Stopping,
            _ => PursuitState::Idle,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExitReason {
    /// `stop()` was observed at an iteration boundary.
    Stopped,
    /// The projection change fell below the convergence threshold.
    Converged,
    MaxIterations,
    /// The model's dataset was replaced.
    Invalidated,
    /// The failure policy gave up on a persistently failing strategy.
    FailureLimit,
    /// A non-retryable error, e.g. a dimension mismatch.
    Fatal(PursuitError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PursuitOutcome {
    pub strategy: String,
    /// Iterations attempted, failed ones included.
    pub iterations: u64,
    pub failures: u64,
    pub exit: ExitReason,
}

struct Worker {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<PursuitOutcome>,
}

/// Runs one strategy at a time on a dedicated thread against a shared [`ProjectionModel`].
///
/// Cancellation is cooperative: [`stop`](Self::stop) raises a flag the worker checks at the top
/// of each iteration. [`start`](Self::start) stops and joins any running pursuit before
/// spawning the next, so two workers never race on the model.
pub struct PursuitScheduler {
    model: Arc<ProjectionModel>,
    constraints: Arc<RwLock<ConstraintSet>>,
    config: PursuitConfig,
    state: Arc<AtomicU8>,
    worker: Option<Worker>,
}

impl PursuitScheduler {
    pub fn new(model: Arc<ProjectionModel>, config: PursuitConfig) -> Self {
        PursuitScheduler {
            model,
            constraints: Arc::new(RwLock::new(ConstraintSet::new())),
            config,
            state: Arc::new(AtomicU8::new(IDLE)),
            worker: None,
        }
    }

    pub fn model(&self) -> &Arc<ProjectionModel> {
        &self.model
    }

    pub fn config(&self) -> &PursuitConfig {
        &self.config
    }

    /// Takes effect at the next `start()`; a running pursuit keeps the config it started with.
    pub fn set_config(&mut self, config: PursuitConfig) {
        self.config = config;
    }

    /// Replaces the active constraints. A running pursuit picks them up on its next iteration.
    pub fn set_constraints(&self, constraints: ConstraintSet) {
        *self.constraints.write() = constraints;
    }

    pub fn state(&self) -> PursuitState {
        PursuitState::from_raw(self.state.load(Ordering::Acquire))
    }

    pub fn is_running(&self) -> bool {
        self.state() == PursuitState::Running
    }

    /// Starts pursuing with `strategy`. A pursuit that is already running is stopped and joined
    /// first; its outcome is returned.
    pub fn start(
        &mut self,
        strategy: Arc<dyn PerturbationStrategy>,
    ) -> Result<Option<PursuitOutcome>> {
        let previous = if self.worker.is_some() {
            self.stop();
            self.wait()
        } else {
            None
        };

        let pursuit = Pursuit::new(Arc::clone(&self.model))?;
        let stop = Arc::new(AtomicBool::new(false));
        self.state.store(RUNNING, Ordering::Release);

        let ctx = LoopContext {
            pursuit,
            strategy,
            constraints: Arc::clone(&self.constraints),
            config: self.config.clone(),
            stop: Arc::clone(&stop),
            state: Arc::clone(&self.state),
        };
        let handle = thread::Builder::new()
            .name("pursuit-worker".to_string())
            .spawn(move || ctx.run())
            .map_err(|e| {
                self.state.store(IDLE, Ordering::Release);
                PursuitError::Worker(e.to_string())
            })?;

        self.worker = Some(Worker { stop, handle });
        Ok(previous)
    }

    /// Requests the running pursuit to stop at its next iteration boundary.
    pub fn stop(&self) {
        if let Some(worker) = &self.worker {
            worker.stop.store(true, Ordering::Release);
            let _ = self.state.compare_exchange(
                RUNNING,
                STOPPING,
                Ordering::AcqRel,
                Ordering::Acquire,
            );
        }
    }

    /// Blocks until the current pursuit exits and returns its outcome. Without a `stop()` and
    /// without a stop condition in the config this waits forever.
    pub fn wait(&mut self) -> Option<PursuitOutcome> {
        let worker = self.worker.take()?;
        let outcome = match worker.handle.join() {
            Ok(outcome) => outcome,
            Err(_) => PursuitOutcome {
                strategy: String::new(),
                iterations: 0,
                failures: 0,
                exit: ExitReason::Fatal(PursuitError::Worker("pursuit worker panicked".to_string())),
            },
        };
        self.state.store(IDLE, Ordering::Release);
        Some(outcome)
    }

    /// Stops the running pursuit, if any, and waits for it.
    pub fn shutdown(&mut self) -> Option<PursuitOutcome> {
        self.stop();
        self.wait()
    }
}

impl Drop for PursuitScheduler {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

struct LoopContext {
    pursuit: Pursuit,
    strategy: Arc<dyn PerturbationStrategy>,
    constraints: Arc<RwLock<ConstraintSet>>,
    config: PursuitConfig,
    stop: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
}

impl LoopContext {
    fn run(self) -> PursuitOutcome {
        let name = self.strategy.name().to_string();
        let policy = self.config.failure_policy;
        info!("Pursuit '{}' started", name);

        let mut iterations = 0u64;
        let mut failures = 0u64;
        let mut consecutive = 0u32;

        let exit = loop {
            if self.stop.load(Ordering::Acquire) {
                break ExitReason::Stopped;
            }
            if !self.pursuit.is_current() {
                break ExitReason::Invalidated;
            }
            if self
                .config
                .max_iterations
                .is_some_and(|max| iterations >= max)
            {
                break ExitReason::MaxIterations;
            }

            let tick = Instant::now();
            let result = {
                let constraints = self.constraints.read();
                self.pursuit.step(self.strategy.as_ref(), &constraints)
            };
            iterations += 1;

            match result {
                Ok(StepOutcome::Invalidated) => break ExitReason::Invalidated,
                Ok(StepOutcome::Published { residual, change }) => {
                    consecutive = 0;
                    debug!(
                        "Pursuit '{}' iteration {}: residual {:.6}, change {:.6}",
                        name, iterations, residual, change
                    );
                    if self
                        .config
                        .convergence_threshold
                        .is_some_and(|threshold| change < threshold)
                    {
                        break ExitReason::Converged;
                    }
                }
                Err(e) if e.is_transient() => {
                    failures += 1;
                    consecutive = consecutive.saturating_add(1);
                    warn!(
                        "Pursuit '{}' iteration {} failed ({} in a row): {}",
                        name, iterations, consecutive, e
                    );
                    if policy.exhausted(consecutive) {
                        break ExitReason::FailureLimit;
                    }
                    let delay = policy.delay(consecutive);
                    if !delay.is_zero() {
                        thread::sleep(delay);
                    }
                }
                Err(e) => {
                    error!("Pursuit '{}' aborted: {}", name, e);
                    break ExitReason::Fatal(e);
                }
            }

            let elapsed = tick.elapsed();
            if elapsed < self.config.min_tick {
                thread::sleep(self.config.min_tick - elapsed);
            }
        };

        info!(
            "Pursuit '{}' exited after {} iterations: {:?}",
            name, iterations, exit
        );
        self.state.store(IDLE, Ordering::Release);
        PursuitOutcome {
            strategy: name,
            iterations,
            failures,
            exit,
        }
    }
}
