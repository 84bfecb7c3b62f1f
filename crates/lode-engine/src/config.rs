//! Engine configuration and validation.

use std::time::Duration;

use lode_core::ConfigError;

use crate::buffer::DEFAULT_CAPACITY;

/// Configuration for [`Engine`](crate::engine::Engine) construction.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Number of agent worker threads. `None` = auto-detect
    /// (`available_parallelism / 2`, clamped to `[2, 8]`).
    pub worker_count: Option<usize>,
    /// Execution budget for a single core or agent module call.
    /// A call exceeding the budget is abandoned with a timeout fault.
    /// Default: 250 ms.
    pub call_budget: Duration,
    /// Seed for engine-side randomness: the core's `random` callback
    /// and the router's publisher draw. Default: 0.
    pub seed: u64,
    /// Consumer-side read bound for the core transfer buffer, in
    /// bytes. Default: 1 MiB.
    pub buffer_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_count: None,
            call_budget: Duration::from_millis(250),
            seed: 0,
            buffer_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Check structural invariants.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for a zero worker count, zero call
    /// budget, or zero buffer capacity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == Some(0) {
            return Err(ConfigError::ZeroWorkerCount);
        }
        if self.call_budget.is_zero() {
            return Err(ConfigError::ZeroCallBudget);
        }
        if self.buffer_capacity == 0 {
            return Err(ConfigError::ZeroBufferCapacity);
        }
        Ok(())
    }

    /// Resolve the actual worker count, applying auto-detection if
    /// `None`. Explicit values are clamped to `[1, 64]`.
    pub fn resolved_worker_count(&self) -> usize {
        match self.worker_count {
            Some(n) => n.clamp(1, 64),
            None => {
                let cpus = std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(4);
                (cpus / 2).clamp(2, 8)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(EngineConfig::default().validate(), Ok(()));
    }

    #[test]
    fn zero_values_are_rejected() {
        let mut config = EngineConfig {
            worker_count: Some(0),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroWorkerCount));

        config.worker_count = Some(4);
        config.call_budget = Duration::ZERO;
        assert_eq!(config.validate(), Err(ConfigError::ZeroCallBudget));

        config.call_budget = Duration::from_millis(1);
        config.buffer_capacity = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroBufferCapacity));
    }

    #[test]
    fn explicit_worker_count_is_clamped() {
        let config = EngineConfig {
            worker_count: Some(1000),
            ..Default::default()
        };
        assert_eq!(config.resolved_worker_count(), 64);
    }

    #[test]
    fn auto_worker_count_stays_in_range() {
        let n = EngineConfig::default().resolved_worker_count();
        assert!((2..=8).contains(&n));
    }
}
