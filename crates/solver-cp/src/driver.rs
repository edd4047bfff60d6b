use sched_core::{EffectiveProblem, Snapshot, SnapshotIndex};
use types::*;

use crate::rooms::{self, Placement};
use crate::SolverError;

const NEAR_CAPACITY_WARN: f64 = 0.90;
const NEAR_CAPACITY_CRITICAL: f64 = 0.95;

/// Runs the CP model and hands the solved placements to the room packer
/// (C6). `snap`/`idx`/`problem` describe the already-validated, already-lock-
/// shrunk decision problem; this never re-validates anything.
pub fn solve(
    snap: &Snapshot,
    idx: &SnapshotIndex,
    problem: &EffectiveProblem,
    run_id: RunId,
    academic_year_id: AcademicYearId,
    options: &SolveOptions,
) -> Result<SolveOutcome, SolverError> {
    run_cpsat(snap, idx, problem, run_id, academic_year_id, options)
}

#[cfg(feature = "with-cpsat")]
fn run_cpsat(
    snap: &Snapshot,
    idx: &SnapshotIndex,
    problem: &EffectiveProblem,
    run_id: RunId,
    academic_year_id: AcademicYearId,
    options: &SolveOptions,
) -> Result<SolveOutcome, SolverError> {
    use cp_sat::proto::{CpSolverStatus, SatParameters};
    use std::time::Instant;

    if problem.over_locked {
        return Ok(infeasible_outcome(snap, idx, problem, run_id, "locked entries over-consume required sessions"));
    }

    let built = crate::model::build_model(snap, idx, problem, options);
    if built.trivially_infeasible {
        return Ok(infeasible_outcome(snap, idx, problem, run_id, "no feasible slot exists for one or more required sessions"));
    }

    let mut params = SatParameters::default();
    params.max_time_in_seconds = Some(options.max_time_seconds as f64);
    params.num_search_workers = Some(8);
    params.search_branching = Some(2);
    params.interleave_search = Some(true);
    params.randomize_search = Some(options.seed.is_none());
    if let Some(seed) = options.seed {
        params.random_seed = Some(seed as i64);
    }
    params.log_search_progress = Some(false);
    params.use_precedences_in_disjunctive_constraint = Some(true);
    params.use_overload_checker_in_cumulative_constraint = Some(true);
    params.use_timetable_edge_finding_in_cumulative_constraint = Some(true);
    params.use_disjunctive_constraint_in_cumulative_constraint = Some(true);

    let started = Instant::now();
    let response = built.model.solve_with_parameters(&params);
    let wall_time_seconds = started.elapsed().as_secs_f64();

    let status = response.status();
    let (run_status, mut warnings) = match status {
        CpSolverStatus::Optimal => (RunStatus::Optimal, Vec::new()),
        CpSolverStatus::Feasible if options.require_optimal => (
            RunStatus::Suboptimal,
            vec![TimetableConflict::new(run_id, Severity::Warn, ConflictType::Timeout, "solver stopped at a feasible but unproven-optimal solution")],
        ),
        CpSolverStatus::Feasible => (RunStatus::Feasible, Vec::new()),
        other => {
            let conflict_type = if wall_time_seconds >= options.max_time_seconds as f64 {
                ConflictType::Timeout
            } else {
                ConflictType::Infeasible
            };
            let _ = other;
            return Ok(SolveOutcome {
                run_id,
                status: RunStatus::Infeasible,
                entries_written: 0,
                entries: Vec::new(),
                conflicts: vec![TimetableConflict::new(run_id, Severity::Error, conflict_type, format!("CP-SAT returned {status:?}"))],
                objective_score: None,
                warnings: Vec::new(),
                solver_stats: SolverStats { wall_time_seconds, branches: 0, conflicts: 0, status_name: format!("{status:?}") },
                diagnostics: diagnostics::run(snap, idx, problem),
                minimal_relaxation: sched_core::analyze_capacity(snap, run_id).minimal_relaxation,
            });
        }
    };

    let mut placements = Vec::new();
    for (&(section_id, subject_id, slot_id), var) in &built.vars.x {
        if var.solution_value(&response) {
            let teacher_id = idx.strict_teacher(section_id, subject_id).first().map(|t| t.teacher_id).unwrap_or_default();
            placements.push(Placement {
                sections: vec![section_id],
                subject_id,
                teacher_id,
                slots: vec![slot_id],
                elective_block_id: None,
                combined_group_id: None,
            });
        }
    }
    for (&(section_id, subject_id, day, start), var) in &built.vars.lab_start {
        if !var.solution_value(&response) {
            continue;
        }
        let Some(subject) = idx.subject(subject_id) else { continue };
        let teacher_id = idx.strict_teacher(section_id, subject_id).first().map(|t| t.teacher_id).unwrap_or_default();
        let slots: Vec<SlotId> = (start..start + subject.lab_block_size_slots as u32).filter_map(|i| idx.slot_id_at(day, i)).collect();
        placements.push(Placement { sections: vec![section_id], subject_id, teacher_id, slots, elective_block_id: None, combined_group_id: None });
    }
    for (&(block_id, slot_id), var) in &built.vars.z {
        if !var.solution_value(&response) {
            continue;
        }
        let sections = idx.block_sections(block_id);
        let Some(bs) = idx.block_subjects(block_id).first().copied() else { continue };
        placements.push(Placement {
            sections,
            subject_id: bs.subject_id,
            teacher_id: bs.teacher_id,
            slots: vec![slot_id],
            elective_block_id: Some(block_id),
            combined_group_id: None,
        });
    }
    for (&(group_id, slot_id), var) in &built.vars.combined_x {
        if !var.solution_value(&response) {
            continue;
        }
        let sections = idx.group_sections(group_id);
        let Some(group) = snap.combined_groups.iter().find(|g| g.id == group_id) else { continue };
        let Some(teacher_id) = group.teacher_id else { continue };
        placements.push(Placement {
            sections,
            subject_id: group.subject_id,
            teacher_id,
            slots: vec![slot_id],
            elective_block_id: None,
            combined_group_id: Some(group_id),
        });
    }

    let assignment = rooms::assign_rooms(snap, idx, run_id, academic_year_id, placements);
    warnings.extend(assignment.warnings);

    let mut entries = problem.pre_entries.clone();
    entries.extend(assignment.entries);

    warnings.extend(utilization_warnings(snap, idx, run_id, &entries));

    Ok(SolveOutcome {
        run_id,
        status: run_status,
        entries_written: entries.len(),
        entries,
        conflicts: Vec::new(),
        objective_score: Some(objective_value(&built, &response)),
        warnings,
        solver_stats: SolverStats { wall_time_seconds, branches: 0, conflicts: 0, status_name: format!("{status:?}") },
        diagnostics: Vec::new(),
        minimal_relaxation: Vec::new(),
    })
}

#[cfg(feature = "with-cpsat")]
fn objective_value(built: &crate::model::BuiltModel, response: &cp_sat::proto::CpSolverResponse) -> i64 {
    built
        .vars
        .x
        .values()
        .chain(built.vars.lab_start.values())
        .chain(built.vars.z.values())
        .chain(built.vars.combined_x.values())
        .filter(|v| v.solution_value(response))
        .count() as i64
}

#[cfg(feature = "with-cpsat")]
fn utilization_warnings(snap: &Snapshot, idx: &SnapshotIndex, run_id: RunId, entries: &[TimetableEntry]) -> Vec<TimetableConflict> {
    use std::collections::HashMap;
    let mut per_teacher: HashMap<TeacherId, u32> = HashMap::new();
    for e in entries {
        *per_teacher.entry(e.teacher_id).or_default() += 1;
    }
    let mut out = Vec::new();
    for teacher in snap.teachers.iter().filter(|t| t.is_active) {
        let used = *per_teacher.get(&teacher.id).unwrap_or(&0) as f64;
        let cap = teacher.max_per_week as f64;
        if cap > 0.0 && used / cap >= NEAR_CAPACITY_WARN {
            let ratio = used / cap;
            out.push(
                TimetableConflict::new(run_id, Severity::Info, ConflictType::TeacherNearWeeklyLimit, format!(
                    "teacher {} at {:.0}% of weekly load", teacher.code, ratio * 100.0
                ))
                .with_teacher(teacher.id)
                .with_metadata(serde_json::json!({"critical": ratio >= NEAR_CAPACITY_CRITICAL})),
            );
        }
    }

    let total_slots = snap.slots.len() as f64;
    let mut per_room: HashMap<RoomId, u32> = HashMap::new();
    for e in entries {
        *per_room.entry(e.room_id).or_default() += 1;
    }
    for room in snap.rooms.iter().filter(|r| r.is_active && !r.is_special) {
        let used = *per_room.get(&room.id).unwrap_or(&0) as f64;
        if total_slots > 0.0 && used / total_slots >= NEAR_CAPACITY_CRITICAL {
            let ratio = used / total_slots;
            out.push(
                TimetableConflict::new(run_id, Severity::Info, ConflictType::RoomNearCapacity, format!(
                    "room {} occupied {:.0}% of the week's slots", room.code, ratio * 100.0
                ))
                .with_room(room.id)
                .with_metadata(serde_json::json!({"occupied_slots": used as u32, "total_slots": total_slots as u32})),
            );
        }
    }

    let _ = idx;
    out
}

#[cfg(feature = "with-cpsat")]
fn infeasible_outcome(snap: &Snapshot, idx: &SnapshotIndex, problem: &EffectiveProblem, run_id: RunId, reason: &str) -> SolveOutcome {
    SolveOutcome {
        run_id,
        status: RunStatus::Infeasible,
        entries_written: 0,
        entries: Vec::new(),
        conflicts: vec![TimetableConflict::new(run_id, Severity::Error, ConflictType::Infeasible, reason)],
        objective_score: None,
        warnings: Vec::new(),
        solver_stats: SolverStats::default(),
        diagnostics: diagnostics::run(snap, idx, problem),
        minimal_relaxation: sched_core::analyze_capacity(snap, run_id).minimal_relaxation,
    }
}

#[cfg(not(feature = "with-cpsat"))]
fn run_cpsat(
    _snap: &Snapshot,
    _idx: &SnapshotIndex,
    _problem: &EffectiveProblem,
    run_id: RunId,
    _academic_year_id: AcademicYearId,
    _options: &SolveOptions,
) -> Result<SolveOutcome, SolverError> {
    Err(SolverError::BackendUnavailable(run_id))
}
