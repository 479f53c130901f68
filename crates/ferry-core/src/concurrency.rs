//! Worker and handle budgeting for a job's pipeline stages.

/// Environment variable overriding the derived connection count.
pub const CONCURRENCY_ENV: &str = "FERRY_CONCURRENCY_VALUE";

/// Connections granted per CPU when no override is present.
const CONNECTIONS_PER_CPU: usize = 16;

/// Upper bound on the derived (non-overridden) connection count.
const MAX_DERIVED_CONNECTIONS: usize = 300;

/// Handles held back for idle pooled connections, log files, and the plan
/// directory, regardless of how many transfers run.
const RESERVED_HANDLES: usize = 64;

/// Floor under the concurrent-file limit so tiny handle budgets still move.
const MIN_CONCURRENT_FILES: usize = 4;

/// Worker counts for one job, derived from the machine and one override
/// environment variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConcurrencySettings {
    /// Concurrent network connections the execution layer may open.
    pub connections: usize,
    /// Soft limit on open file handles for the whole process.
    pub handle_budget: usize,
    /// Whether `connections` came from the override env var.
    pub from_env: bool,
}

impl ConcurrencySettings {
    /// Derive settings from explicit inputs. The connection count is clamped
    /// so connections plus the reserved idle pool never exceed the handle
    /// budget.
    pub fn derive(cpus: usize, handle_budget: usize, env_override: Option<usize>) -> Self {
        let (requested, from_env) = match env_override {
            Some(n) if n > 0 => (n, true),
            _ => (
                (cpus.max(1) * CONNECTIONS_PER_CPU).min(MAX_DERIVED_CONNECTIONS),
                false,
            ),
        };
        let ceiling = handle_budget.saturating_sub(RESERVED_HANDLES).max(1);
        Self {
            connections: requested.min(ceiling),
            handle_budget,
            from_env,
        }
    }

    /// Detect settings from the running machine and process environment.
    pub fn detect(handle_budget: usize) -> Self {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let env_override = std::env::var(CONCURRENCY_ENV)
            .ok()
            .and_then(|v| v.parse::<usize>().ok());
        Self::derive(cpus, handle_budget, env_override)
    }

    /// How many local files may be open for transfer at once: whatever the
    /// handle budget leaves after connections and the reserved pool.
    pub fn compute_concurrent_files_limit(&self) -> usize {
        self.handle_budget
            .saturating_sub(self.connections + RESERVED_HANDLES)
            .max(MIN_CONCURRENT_FILES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_from_cpu_count() {
        let s = ConcurrencySettings::derive(4, 4096, None);
        assert_eq!(s.connections, 64);
        assert!(!s.from_env);
    }

    #[test]
    fn derived_count_is_capped() {
        let s = ConcurrencySettings::derive(64, 100_000, None);
        assert_eq!(s.connections, MAX_DERIVED_CONNECTIONS);
    }

    #[test]
    fn env_override_wins_but_respects_handle_budget() {
        let s = ConcurrencySettings::derive(4, 4096, Some(512));
        assert_eq!(s.connections, 512);
        assert!(s.from_env);

        let clamped = ConcurrencySettings::derive(4, 256, Some(512));
        assert_eq!(clamped.connections, 256 - RESERVED_HANDLES);
    }

    #[test]
    fn connections_plus_reserve_never_exceed_budget() {
        for budget in [128usize, 256, 1024, 8192] {
            for over in [None, Some(10), Some(100_000)] {
                let s = ConcurrencySettings::derive(8, budget, over);
                assert!(s.connections + RESERVED_HANDLES <= budget.max(RESERVED_HANDLES + 1));
            }
        }
    }

    #[test]
    fn file_limit_has_a_floor() {
        let s = ConcurrencySettings::derive(4, 96, None);
        assert_eq!(s.compute_concurrent_files_limit(), MIN_CONCURRENT_FILES);
        let roomy = ConcurrencySettings::derive(4, 4096, None);
        assert_eq!(
            roomy.compute_concurrent_files_limit(),
            4096 - roomy.connections - RESERVED_HANDLES
        );
    }
}
