use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use sched_core::{validate, Solver};
use thiserror::Error;
use tracing::{info, warn};
use types::*;

use crate::store::{Catalog, RunState, RunStore};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("run {0} not found")]
    RunNotFound(RunId),
    #[error("fixed entry {0} not found")]
    FixedEntryNotFound(FixedEntryId),
    #[error("special allotment {0} not found")]
    SpecialAllotmentNotFound(SpecialAllotmentId),
    #[error("lock violates {0} scheduling invariant(s)")]
    InvalidLock(usize, Vec<TimetableConflict>),
    #[error("solver backend failed: {0}")]
    Solver(#[from] anyhow::Error),
    #[error("solve task was cancelled before completion")]
    SolveCancelled,
}

pub struct GenerateRequest {
    pub program_id: ProgramId,
    pub academic_year_id: Option<AcademicYearId>,
    pub seed: Option<u64>,
    pub breaks: Vec<SectionBreak>,
}

pub struct SolveRequest {
    pub program_id: ProgramId,
    pub academic_year_id: Option<AcademicYearId>,
    pub breaks: Vec<SectionBreak>,
    pub options: SolveOptions,
}

fn now_unix() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

/// Transport-agnostic entry point for every operation in SPEC_FULL.md §6.
/// Owns the shared catalog and the run store; generic over the solver
/// backend the same way the teacher's `InMemJobs<S: Solver>` was, so this
/// crate never depends on `solver-cp` directly.
pub struct Engine<S: Solver> {
    catalog: parking_lot::RwLock<Catalog>,
    runs: RunStore,
    solver: Arc<S>,
}

impl<S: Solver> Engine<S> {
    pub fn new(catalog: Catalog, solver: S) -> Self {
        Self { catalog: parking_lot::RwLock::new(catalog), runs: RunStore::default(), solver: Arc::new(solver) }
    }

    pub fn catalog(&self) -> Catalog {
        self.catalog.read().clone()
    }

    /// C1 -> C2 -> C3: loads the snapshot, validates it, runs the capacity
    /// analyzer, and records a run row without touching the solver.
    pub async fn generate(&self, req: GenerateRequest) -> Result<GenerateResult, EngineError> {
        let run_id = RunId::new();
        let catalog = self.catalog.read().clone();
        let snap = catalog.snapshot(req.program_id, req.academic_year_id, req.breaks);

        let report = validate(&snap, run_id);
        let mut conflicts = report.conflicts;

        if !report_has_errors(&conflicts) {
            let capacity = sched_core::analyze_capacity(&snap, run_id);
            conflicts.extend(capacity.conflicts);
        }

        let status = if report_has_errors(&conflicts) { GenerateStatus::FailedValidation } else { GenerateStatus::ReadyForSolve };
        let run_status = if status == GenerateStatus::FailedValidation { RunStatus::ValidationFailed } else { RunStatus::Created };

        let run = TimetableRun {
            id: run_id,
            program_id: req.program_id,
            academic_year_id: req.academic_year_id,
            created_at_unix: now_unix(),
            status: run_status,
            seed: req.seed,
            solver_version: None,
            parameters: SolveOptions { seed: req.seed, ..Default::default() },
            notes: None,
        };
        info!(run_id = %run_id, status = ?run_status, "generated run");
        self.runs.insert(RunState { run, entries: Vec::new(), conflicts: conflicts.clone() });

        Ok(GenerateResult { run_id, status, conflicts })
    }

    /// C1 -> C2 -> C4 -> C5 -> C6 (C7 on failure). Dispatches the CP call
    /// onto `tokio::spawn` per SPEC_FULL.md §5, so the solve's CPU-heavy work
    /// doesn't pin the calling task, while still returning the full outcome
    /// once it completes.
    pub async fn solve(&self, req: SolveRequest) -> Result<SolveOutcome, EngineError> {
        let run_id = RunId::new();
        let catalog = self.catalog.read().clone();
        let snap = catalog.snapshot(req.program_id, req.academic_year_id, req.breaks);

        let report = validate(&snap, run_id);
        if report.has_errors() {
            let run = TimetableRun {
                id: run_id,
                program_id: req.program_id,
                academic_year_id: req.academic_year_id,
                created_at_unix: now_unix(),
                status: RunStatus::ValidationFailed,
                seed: req.options.seed,
                solver_version: None,
                parameters: req.options,
                notes: None,
            };
            let conflicts = report.conflicts;
            self.runs.insert(RunState { run, entries: Vec::new(), conflicts: conflicts.clone() });
            return Ok(SolveOutcome {
                run_id,
                status: RunStatus::ValidationFailed,
                entries_written: 0,
                entries: Vec::new(),
                conflicts,
                objective_score: None,
                warnings: Vec::new(),
                solver_stats: SolverStats::default(),
                diagnostics: Vec::new(),
                minimal_relaxation: Vec::new(),
            });
        }

        let solver = self.solver.clone();
        let options = req.options.clone();
        let outcome = tokio::spawn(async move { solver.solve(&snap, run_id, &options).await })
            .await
            .map_err(|_| EngineError::SolveCancelled)??;

        let run = TimetableRun {
            id: run_id,
            program_id: req.program_id,
            academic_year_id: req.academic_year_id,
            created_at_unix: now_unix(),
            status: outcome.status,
            seed: req.options.seed,
            solver_version: Some(env!("CARGO_PKG_VERSION").to_string()),
            parameters: req.options,
            notes: None,
        };

        warn_on_entry_count_mismatch(&outcome);

        // Each solve mints a fresh run id, so this insert is always a plain
        // write rather than a replace; a transport that reused run ids across
        // re-solves would rely on `RunStore::insert`'s overwrite-by-key
        // behavior to get spec.md's "delete existing entries, then insert".
        self.runs.insert(RunState { run, entries: outcome.entries.clone(), conflicts: outcome.conflicts.clone() });

        Ok(outcome)
    }

    pub fn list_runs(&self, program_id: Option<ProgramId>) -> Vec<RunSummary> {
        self.runs.list(program_id)
    }

    pub fn get_run_entries(&self, run_id: RunId, section_code: Option<&str>) -> Result<Vec<TimetableEntry>, EngineError> {
        let state = self.runs.get(run_id).ok_or(EngineError::RunNotFound(run_id))?;
        match section_code {
            None => Ok(state.entries),
            Some(code) => {
                let catalog = self.catalog.read();
                let wanted: std::collections::HashSet<SectionId> =
                    catalog.sections.iter().filter(|s| s.code == code).map(|s| s.id).collect();
                Ok(state.entries.into_iter().filter(|e| wanted.contains(&e.section_id)).collect())
            }
        }
    }

    pub fn get_run_conflicts(&self, run_id: RunId) -> Result<Vec<TimetableConflict>, EngineError> {
        Ok(self.runs.get(run_id).ok_or(EngineError::RunNotFound(run_id))?.conflicts)
    }

    /// Enforces every invariant SPEC_FULL.md §4.2(9) names for fixed entries,
    /// synchronously, by re-validating a trial catalog before committing.
    pub fn upsert_fixed_entry(
        &self,
        program_id: ProgramId,
        academic_year_id: Option<AcademicYearId>,
        mut entry: FixedTimetableEntry,
    ) -> Result<FixedEntryId, EngineError> {
        let mut catalog = self.catalog.write();
        let mut trial = catalog.clone();

        if let Some(pos) = trial.fixed_entries.iter().position(|f| f.section_id == entry.section_id && f.slot_id == entry.slot_id) {
            entry.id = trial.fixed_entries[pos].id;
            trial.fixed_entries[pos] = entry.clone();
        } else {
            trial.fixed_entries.push(entry.clone());
        }

        check_lock_invariants(&trial, program_id, academic_year_id, entry.section_id, FIXED_CONFLICT_TYPES)?;
        *catalog = trial;
        Ok(entry.id)
    }

    pub fn delete_fixed_entry(&self, id: FixedEntryId) -> Result<(), EngineError> {
        let mut catalog = self.catalog.write();
        let before = catalog.fixed_entries.len();
        catalog.fixed_entries.retain(|f| f.id != id);
        if catalog.fixed_entries.len() == before {
            return Err(EngineError::FixedEntryNotFound(id));
        }
        Ok(())
    }

    /// Mirror of `upsert_fixed_entry` for special-room locks (§4.2(10)).
    pub fn upsert_special_allotment(
        &self,
        program_id: ProgramId,
        academic_year_id: Option<AcademicYearId>,
        mut allotment: SpecialAllotment,
    ) -> Result<SpecialAllotmentId, EngineError> {
        let mut catalog = self.catalog.write();
        let mut trial = catalog.clone();

        if let Some(pos) = trial.special_allotments.iter().position(|s| s.section_id == allotment.section_id && s.slot_id == allotment.slot_id)
        {
            allotment.id = trial.special_allotments[pos].id;
            trial.special_allotments[pos] = allotment.clone();
        } else {
            trial.special_allotments.push(allotment.clone());
        }

        check_lock_invariants(&trial, program_id, academic_year_id, allotment.section_id, SPECIAL_CONFLICT_TYPES)?;
        *catalog = trial;
        Ok(allotment.id)
    }

    pub fn delete_special_allotment(&self, id: SpecialAllotmentId) -> Result<(), EngineError> {
        let mut catalog = self.catalog.write();
        let before = catalog.special_allotments.len();
        catalog.special_allotments.retain(|s| s.id != id);
        if catalog.special_allotments.len() == before {
            return Err(EngineError::SpecialAllotmentNotFound(id));
        }
        Ok(())
    }
}

fn report_has_errors(conflicts: &[TimetableConflict]) -> bool {
    conflicts.iter().any(|c| c.severity == Severity::Error)
}

fn warn_on_entry_count_mismatch(outcome: &SolveOutcome) {
    if outcome.status.is_terminal_success() && outcome.entries_written == 0 {
        warn!(run_id = %outcome.run_id, "solve reported success with zero entries written");
    }
}

const FIXED_CONFLICT_TYPES: &[ConflictType] = &[
    ConflictType::FixedSubjectNotFound,
    ConflictType::FixedTeacherNotFound,
    ConflictType::FixedRoomNotFound,
    ConflictType::FixedRoomIsSpecial,
    ConflictType::FixedSlotNotFound,
    ConflictType::FixedSlotOutsideSectionWindow,
    ConflictType::FixedSubjectNotAllowedForSection,
    ConflictType::FixedTeacherMismatchAssignment,
    ConflictType::FixedTeacherWeeklyOffDay,
    ConflictType::FixedTeacherNotEligible,
    ConflictType::FixedLabBlockDoesNotFit,
    ConflictType::FixedLabBlockSlotMissing,
    ConflictType::FixedTeacherOverlap,
];

const SPECIAL_CONFLICT_TYPES: &[ConflictType] = &[
    ConflictType::SpecialSubjectNotFound,
    ConflictType::SpecialTeacherNotFound,
    ConflictType::SpecialRoomMissing,
    ConflictType::SpecialRoomNotFound,
    ConflictType::SpecialRoomNotSpecial,
    ConflictType::SpecialSlotNotFound,
    ConflictType::SpecialSlotOutsideSectionWindow,
    ConflictType::SpecialSubjectNotAllowedForSection,
    ConflictType::SpecialTeacherMismatchAssignment,
    ConflictType::SpecialTeacherWeeklyOffDay,
    ConflictType::SpecialTeacherNotEligible,
    ConflictType::SpecialLabBlockDoesNotFit,
    ConflictType::SpecialLabBlockSlotMissing,
    ConflictType::SpecialTeacherOverlap,
    ConflictType::SpecialRoomOverlap,
    ConflictType::SpecialConflictsWithFixedEntry,
];

fn check_lock_invariants(
    trial: &Catalog,
    program_id: ProgramId,
    academic_year_id: Option<AcademicYearId>,
    touched_section: SectionId,
    watch: &[ConflictType],
) -> Result<(), EngineError> {
    let snap = trial.snapshot(program_id, academic_year_id, Vec::new());
    let report = validate(&snap, RunId::new());

    let blocking: Vec<TimetableConflict> = report
        .conflicts
        .into_iter()
        .filter(|c| c.severity == Severity::Error && watch.contains(&c.conflict_type) && c.section_id == Some(touched_section))
        .collect();

    if blocking.is_empty() {
        Ok(())
    } else {
        Err(EngineError::InvalidLock(blocking.len(), blocking))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Echoes back a canned outcome without touching the CP backend, so the
    /// engine's own orchestration (validation gate, run bookkeeping, lock
    /// re-validation) can be exercised without linking `cp_sat`.
    struct StubSolver {
        outcome: SolveOutcome,
    }

    #[async_trait::async_trait]
    impl Solver for StubSolver {
        async fn solve(&self, _snap: &Snapshot, run_id: RunId, _options: &SolveOptions) -> anyhow::Result<SolveOutcome> {
            let mut outcome = self.outcome.clone();
            outcome.run_id = run_id;
            for e in &mut outcome.entries {
                e.run_id = run_id;
            }
            Ok(outcome)
        }
    }

    fn s1_catalog() -> (Catalog, ProgramId, AcademicYearId, SectionId, SubjectId, TeacherId, RoomId) {
        let program_id = ProgramId::new();
        let year_id = AcademicYearId::new();
        let section_id = SectionId::new();
        let subject_id = SubjectId::new();
        let teacher_id = TeacherId::new();
        let room_id = RoomId::new();

        let mut slots = Vec::new();
        for day in [DayOfWeek::Mon, DayOfWeek::Tue] {
            for idx in 0..2 {
                slots.push(TimeSlot { id: SlotId::new(), day_of_week: day, slot_index: idx, start_time: (8, 0), end_time: (9, 0) });
            }
        }

        let catalog = Catalog {
            programs: vec![Program { id: program_id, code: "P".into(), name: "Program".into() }],
            academic_years: vec![AcademicYear { id: year_id, program_id, year_number: 1, is_active: true }],
            sections: vec![Section {
                id: section_id,
                program_id,
                academic_year_id: year_id,
                code: "A".into(),
                strength: 30,
                track: Track::Core,
                is_active: true,
            }],
            subjects: vec![Subject {
                id: subject_id,
                program_id,
                academic_year_id: year_id,
                code: "M".into(),
                subject_type: SubjectType::Theory,
                sessions_per_week: 2,
                max_per_day: 1,
                lab_block_size_slots: 1,
                is_active: true,
            }],
            teachers: vec![Teacher {
                id: teacher_id,
                code: "T".into(),
                weekly_off_day: None,
                max_per_day: 6,
                max_per_week: 30,
                max_continuous: 3,
                is_active: true,
            }],
            rooms: vec![Room { id: room_id, code: "R".into(), room_type: RoomType::Classroom, capacity: 40, is_active: true, is_special: false, special_note: None }],
            slots,
            windows: [DayOfWeek::Mon, DayOfWeek::Tue]
                .into_iter()
                .map(|day| SectionTimeWindow { section_id, day_of_week: day, start_slot_index: 0, end_slot_index: 1 })
                .collect(),
            section_subjects: vec![SectionSubject { section_id, subject_id }],
            teacher_subject_sections: vec![TeacherSubjectSection { teacher_id, subject_id, section_id, is_active: true }],
            ..Default::default()
        };
        (catalog, program_id, year_id, section_id, subject_id, teacher_id, room_id)
    }

    #[tokio::test]
    async fn generate_on_a_clean_snapshot_is_ready_for_solve() {
        let (catalog, program_id, year_id, ..) = s1_catalog();
        let engine = Engine::new(catalog, StubSolver { outcome: SolveOutcome { run_id: RunId::new(), status: RunStatus::Optimal, entries_written: 0, entries: Vec::new(), conflicts: Vec::new(), objective_score: Some(0), warnings: Vec::new(), solver_stats: SolverStats::default(), diagnostics: Vec::new(), minimal_relaxation: Vec::new() } });

        let result = engine.generate(GenerateRequest { program_id, academic_year_id: Some(year_id), seed: None, breaks: Vec::new() }).await.unwrap();
        assert_eq!(result.status, GenerateStatus::ReadyForSolve);
        assert!(result.conflicts.is_empty());
        assert_eq!(engine.list_runs(None).len(), 1);
    }

    #[tokio::test]
    async fn solve_writes_entries_and_they_are_retrievable_by_run_id() {
        let (catalog, program_id, year_id, section_id, subject_id, teacher_id, room_id) = s1_catalog();
        let slot_id = catalog.slots[0].id;
        let stub_entry = TimetableEntry {
            id: EntryId::new(),
            run_id: RunId::new(),
            academic_year_id: year_id,
            section_id,
            subject_id,
            teacher_id,
            room_id,
            slot_id,
            combined_class_id: None,
            elective_block_id: None,
        };
        let engine = Engine::new(catalog, StubSolver {
            outcome: SolveOutcome {
                run_id: RunId::new(),
                status: RunStatus::Optimal,
                entries_written: 1,
                entries: vec![stub_entry],
                conflicts: Vec::new(),
                objective_score: Some(0),
                warnings: Vec::new(),
                solver_stats: SolverStats::default(),
                diagnostics: Vec::new(),
                minimal_relaxation: Vec::new(),
            },
        });

        let outcome = engine
            .solve(SolveRequest { program_id, academic_year_id: Some(year_id), breaks: Vec::new(), options: SolveOptions::default() })
            .await
            .unwrap();
        assert_eq!(outcome.status, RunStatus::Optimal);
        assert_eq!(outcome.entries_written, 1);

        let entries = engine.get_run_entries(outcome.run_id, None).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].section_id, section_id);
    }

    #[tokio::test]
    async fn generate_on_a_broken_snapshot_fails_validation_before_reaching_the_solver() {
        let (mut catalog, program_id, year_id, ..) = s1_catalog();
        catalog.slots.clear();
        let engine = Engine::new(catalog, StubSolver { outcome: SolveOutcome { run_id: RunId::new(), status: RunStatus::Optimal, entries_written: 0, entries: Vec::new(), conflicts: Vec::new(), objective_score: None, warnings: Vec::new(), solver_stats: SolverStats::default(), diagnostics: Vec::new(), minimal_relaxation: Vec::new() } });

        let result = engine.generate(GenerateRequest { program_id, academic_year_id: Some(year_id), seed: None, breaks: Vec::new() }).await.unwrap();
        assert_eq!(result.status, GenerateStatus::FailedValidation);
        assert!(!result.conflicts.is_empty());
    }
}
