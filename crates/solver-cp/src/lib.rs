pub mod driver;
#[cfg(feature = "with-cpsat")]
pub mod model;
pub mod rooms;

use anyhow::anyhow;
use async_trait::async_trait;
use sched_core::{apply_locks, Snapshot, SnapshotIndex, Solver};
use thiserror::Error;
use tracing::info;
use types::{RunId, SolveOptions, SolveOutcome};

#[derive(Debug, Error)]
pub enum SolverError {
    #[error("run {0}: CP-SAT backend not compiled in (enable the with-cpsat feature)")]
    BackendUnavailable(RunId),
}

/// Solves against the real OR-Tools CP-SAT backend via the `cp_sat` crate.
/// With the `with-cpsat` feature off this always returns
/// [`SolverError::BackendUnavailable`] rather than an approximate fallback;
/// there is no heuristic substitute for the CP core.
#[derive(Default)]
pub struct CpSolver;

impl CpSolver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Solver for CpSolver {
    async fn solve(&self, snap: &Snapshot, run_id: RunId, options: &SolveOptions) -> anyhow::Result<SolveOutcome> {
        let idx = SnapshotIndex::build(snap);
        let problem = apply_locks(snap, &idx, run_id);
        let academic_year_id = snap
            .academic_years
            .iter()
            .find(|y| y.is_active)
            .or_else(|| snap.academic_years.first())
            .map(|y| y.id)
            .ok_or_else(|| anyhow!("snapshot has no academic year to scope entries to"))?;

        info!(run_id = %run_id, sections = snap.sections.len(), "starting CP-SAT solve");
        driver::solve(snap, &idx, &problem, run_id, academic_year_id, options).map_err(anyhow::Error::from)
    }
}
