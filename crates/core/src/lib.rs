pub mod capacity;
pub mod locks;
pub mod snapshot;
#[cfg(test)]
mod test_support;
pub mod validate;

pub use capacity::{analyze_capacity, CapacityReport};
pub use locks::{apply_locks, EffectiveProblem};
pub use snapshot::{Snapshot, SnapshotIndex};
pub use validate::{validate, ValidationReport};

use thiserror::Error;

/// Infrastructure faults that genuinely propagate, as opposed to domain
/// problems (validation failures, infeasibility) which are always returned as
/// typed conflicts, never as `Err` (SPEC_FULL.md §7).
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("program {0} not found")]
    ProgramNotFound(String),
    #[error("academic year {0} not found")]
    AcademicYearNotFound(String),
}

/// Implemented by the CP-SAT driver in `solver-cp`; kept in this crate so the
/// runtime engine depends only on `sched-core`, not on the solver backend
/// directly.
#[async_trait::async_trait]
pub trait Solver: Send + Sync + 'static {
    async fn solve(
        &self,
        snap: &Snapshot,
        run_id: types::RunId,
        options: &types::SolveOptions,
    ) -> anyhow::Result<types::SolveOutcome>;
}
