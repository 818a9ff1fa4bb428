use std::time::Duration;

/// What the pursuit loop does after a strategy fails with a transient error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FailurePolicy {
    /// Log and retry on the next tick, forever.
    KeepTrying,
    /// Give up after this many consecutive failures.
    Bounded { max_consecutive: u32 },
    /// Sleep `initial`, doubling up to `max`, after each consecutive failure. Optionally give up
    /// after `max_consecutive` failures. A successful step resets the delay.
    Backoff {
        initial: Duration,
        max: Duration,
        max_consecutive: Option<u32>,
    },
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self::KeepTrying
    }
}

impl FailurePolicy {
    /// Whether `consecutive` failures in a row end the pursuit.
    pub fn exhausted(&self, consecutive: u32) -> bool {
        match *self {
            FailurePolicy::KeepTrying => false,
            FailurePolicy::Bounded { max_consecutive } => consecutive >= max_consecutive,
            FailurePolicy::Backoff {
                max_consecutive, ..
            } => max_consecutive.is_some_and(|m| consecutive >= m),
        }
    }

    /// Extra delay before the next attempt after `consecutive` failures.
    pub fn delay(&self, consecutive: u32) -> Duration {
        match *self {
            FailurePolicy::Backoff { initial, max, .. } if consecutive > 0 => {
                let factor = 1u32.checked_shl(consecutive - 1).unwrap_or(u32::MAX);
                initial.saturating_mul(factor).min(max)
            }
            _ => Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PursuitConfig {
    /// Minimum wall time per iteration. Zero lets the loop spin a full core.
    pub min_tick: Duration,
    pub max_iterations: Option<u64>,
    /// Stop once the Frobenius change of the projection between iterations drops below this.
    pub convergence_threshold: Option<f64>,
    pub failure_policy: FailurePolicy,
}

impl Default for PursuitConfig {
    fn default() -> Self {
        Self {
            min_tick: Duration::from_millis(5),
            max_iterations: None,
            convergence_threshold: None,
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl PursuitConfig {
    pub fn builder() -> PursuitConfigBuilder {
        PursuitConfigBuilder::new()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PursuitConfigBuilder {
    config: PursuitConfig,
}

impl PursuitConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min_tick(mut self, min_tick: Duration) -> Self {
        self.config.min_tick = min_tick;
        self
    }

    pub fn max_iterations(mut self, max_iterations: u64) -> Self {
        self.config.max_iterations = Some(max_iterations);
        self
    }

    pub fn convergence_threshold(mut self, threshold: f64) -> Self {
        self.config.convergence_threshold = Some(threshold);
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    pub fn build(self) -> PursuitConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = PursuitConfig::builder()
            .min_tick(Duration::ZERO)
            .max_iterations(10)
            .convergence_threshold(1e-6)
            .failure_policy(FailurePolicy::Bounded { max_consecutive: 3 })
            .build();
        assert_eq!(config.min_tick, Duration::ZERO);
        assert_eq!(config.max_iterations, Some(10));
        assert_eq!(config.convergence_threshold, Some(1e-6));
        assert!(config.failure_policy.exhausted(3));
        assert!(!config.failure_policy.exhausted(2));
    }

    #[test]
    fn test_keep_trying_never_exhausts() {
        assert!(!FailurePolicy::KeepTrying.exhausted(u32::MAX));
        assert_eq!(FailurePolicy::KeepTrying.delay(100), Duration::ZERO);
    }

    #[test]
    fn test_backoff_doubles_up_to_max() {
        let policy = FailurePolicy::Backoff {
            initial: Duration::from_millis(10),
            max: Duration::from_millis(50),
            max_consecutive: None,
        };
        assert_eq!(policy.delay(0), Duration::ZERO);
        assert_eq!(policy.delay(1), Duration::from_millis(10));
        assert_eq!(policy.delay(2), Duration::from_millis(20));
        assert_eq!(policy.delay(3), Duration::from_millis(40));
        assert_eq!(policy.delay(4), Duration::from_millis(50));
        assert_eq!(policy.delay(40), Duration::from_millis(50));
        assert!(!policy.exhausted(1000));
    }
}
