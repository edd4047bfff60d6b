//! Post-mortem analysis for INFEASIBLE solves (C7). A pure function over the
//! same `Snapshot`/`EffectiveProblem` a failed solve used — no solver state is
//! inspected. Grounded on
//! `original_source/backend/solver/solver_diagnostics.py`'s
//! `run_infeasibility_analysis`: each check below is a deterministic,
//! explainable blocker; if none trigger we report `DIAGNOSTICS_INCONCLUSIVE`
//! rather than claiming certainty CP-SAT doesn't back up.

use std::collections::{HashMap, HashSet};

use sched_core::{EffectiveProblem, Snapshot, SnapshotIndex};
use types::*;

/// Runs every check in SPEC_FULL.md §4.7, in the order spec.md lists them,
/// and falls back to `DIAGNOSTICS_INCONCLUSIVE` when nothing fires.
pub fn run(snap: &Snapshot, idx: &SnapshotIndex, problem: &EffectiveProblem) -> Vec<Diagnostic> {
    let mut out = Vec::new();

    teacher_load_exceeds_limit(snap, idx, &mut out);
    teacher_daily_load_violation(snap, idx, &mut out);
    teacher_offday_conflict(snap, idx, &mut out);
    section_slot_deficit(snap, idx, &mut out);
    lab_block_unfit(snap, idx, problem, &mut out);
    special_allotment_deadlock(snap, idx, problem, &mut out);
    locked_sessions_exceed_requirement(snap, idx, problem, &mut out);
    room_capacity_shortage(snap, idx, &mut out);
    special_room_misuse(snap, idx, &mut out);
    combined_group_no_intersection(snap, idx, problem, &mut out);

    if out.is_empty() {
        out.push(Diagnostic {
            diagnostic_type: DiagnosticType::DiagnosticsInconclusive,
            explanation: "the solver reported INFEASIBLE, but the pre-solve diagnostic checks \
                could not pinpoint a single deterministic blocker; this usually means the \
                infeasibility comes from an interaction of several constraints rather than one \
                of them alone"
                .to_string(),
            payload: serde_json::json!({
                "sections": snap.sections.iter().filter(|s| s.is_active).count(),
                "fixed_entries": snap.fixed_entries.iter().filter(|f| f.is_active).count(),
                "special_allotments": snap.special_allotments.iter().filter(|s| s.is_active).count(),
                "combined_groups": snap.combined_groups.len(),
            }),
        });
    }

    out
}

fn diag(t: DiagnosticType, explanation: impl Into<String>, payload: serde_json::Value) -> Diagnostic {
    Diagnostic { diagnostic_type: t, explanation: explanation.into(), payload }
}

/// Per-teacher weekly slot-weighted demand, counting each combined group once
/// for its shared teacher. Mirrors `capacity::analyze_teacher_capacity`'s
/// accumulation but is kept local since diagnostics must stay a pure function
/// independent of the capacity analyzer's conflict-emission shape.
fn teacher_required_slots(snap: &Snapshot, idx: &SnapshotIndex) -> HashMap<TeacherId, u32> {
    let mut required: HashMap<TeacherId, u32> = HashMap::new();
    let mut counted_combined: HashSet<CombinedGroupId> = HashSet::new();

    for tss in snap.teacher_subject_sections.iter().filter(|t| t.is_active) {
        if let Some(subject) = idx.subject(tss.subject_id) {
            *required.entry(tss.teacher_id).or_default() += subject.weekly_slot_demand();
        }
    }
    for ebs in &snap.elective_block_subjects {
        if let Some(subject) = idx.subject(ebs.subject_id) {
            *required.entry(ebs.teacher_id).or_default() += subject.weekly_slot_demand();
        }
    }
    for group in &snap.combined_groups {
        let (Some(teacher_id), Some(subject)) = (group.teacher_id, idx.subject(group.subject_id)) else { continue };
        if counted_combined.insert(group.id) {
            *required.entry(teacher_id).or_default() += subject.weekly_slot_demand();
        }
    }
    required
}

fn teacher_load_exceeds_limit(snap: &Snapshot, idx: &SnapshotIndex, out: &mut Vec<Diagnostic>) {
    let required = teacher_required_slots(snap, idx);
    for teacher in snap.teachers.iter().filter(|t| t.is_active) {
        let req = *required.get(&teacher.id).unwrap_or(&0);
        if req > teacher.max_per_week as u32 {
            out.push(diag(
                DiagnosticType::TeacherLoadExceedsLimit,
                format!(
                    "teacher {} is assigned {} required slots but max_per_week is {}",
                    teacher.code, req, teacher.max_per_week
                ),
                serde_json::json!({"teacher_id": teacher.id, "teacher": teacher.code, "required_slots": req, "max_allowed": teacher.max_per_week}),
            ));
        }
    }
}

/// Locked occurrences per (teacher, day), counting every slot a LAB lock spans.
fn locked_slots_by_teacher_day(snap: &Snapshot, idx: &SnapshotIndex) -> HashMap<(TeacherId, DayOfWeek), u32> {
    let mut out: HashMap<(TeacherId, DayOfWeek), u32> = HashMap::new();
    for (teacher_id, subject_id, slot_id) in fixed_and_special_locks(snap) {
        let Some(subject) = idx.subject(subject_id) else { continue };
        let Some(slot) = idx.slot(slot_id) else { continue };
        let span = if subject.subject_type == SubjectType::Lab { subject.lab_block_size_slots } else { 1 };
        for offset in 0..span as u32 {
            if idx.slot_id_at(slot.day_of_week, slot.slot_index + offset).is_some() {
                *out.entry((teacher_id, slot.day_of_week)).or_default() += 1;
            }
        }
    }
    out
}

fn fixed_and_special_locks(snap: &Snapshot) -> Vec<(TeacherId, SubjectId, SlotId)> {
    snap.fixed_entries
        .iter()
        .filter(|f| f.is_active)
        .map(|f| (f.teacher_id, f.subject_id, f.slot_id))
        .chain(snap.special_allotments.iter().filter(|s| s.is_active).map(|s| (s.teacher_id, s.subject_id, s.slot_id)))
        .collect()
}

fn teacher_daily_load_violation(snap: &Snapshot, idx: &SnapshotIndex, out: &mut Vec<Diagnostic>) {
    let required = teacher_required_slots(snap, idx);
    let locked_by_day = locked_slots_by_teacher_day(snap, idx);

    for teacher in snap.teachers.iter().filter(|t| t.is_active) {
        if teacher.max_per_day == 0 {
            continue;
        }
        for &day in &DayOfWeek::ALL {
            let locked = *locked_by_day.get(&(teacher.id, day)).unwrap_or(&0);
            if locked > teacher.max_per_day as u32 {
                out.push(diag(
                    DiagnosticType::TeacherDailyLoadViolation,
                    format!(
                        "teacher {} has {} locked slots on {:?} but max_per_day is {}",
                        teacher.code, locked, day, teacher.max_per_day
                    ),
                    serde_json::json!({"teacher_id": teacher.id, "teacher": teacher.code, "day_of_week": day.index(), "locked_slots": locked, "max_allowed": teacher.max_per_day}),
                ));
            }
        }

        let available_days = teacher.available_day_count() as u32;
        if available_days == 0 {
            continue;
        }
        let req = *required.get(&teacher.id).unwrap_or(&0);
        let cap = teacher.max_per_day as u32 * available_days;
        if req > cap {
            out.push(diag(
                DiagnosticType::TeacherDailyLoadViolation,
                format!(
                    "teacher {} requires {} slots/week, but max_per_day {} over {} working days caps at {}",
                    teacher.code, req, teacher.max_per_day, available_days, cap
                ),
                serde_json::json!({"teacher_id": teacher.id, "teacher": teacher.code, "required_slots": req, "max_per_day": teacher.max_per_day, "available_days": available_days}),
            ));
        }
    }
}

fn teacher_offday_conflict(snap: &Snapshot, idx: &SnapshotIndex, out: &mut Vec<Diagnostic>) {
    for (teacher_id, subject_id, slot_id) in fixed_and_special_locks(snap) {
        let Some(teacher) = idx.teacher(teacher_id) else { continue };
        let Some(off) = teacher.weekly_off_day else { continue };
        let Some(slot) = idx.slot(slot_id) else { continue };
        if slot.day_of_week == off {
            out.push(diag(
                DiagnosticType::TeacherOffdayConflict,
                format!(
                    "teacher {} has weekly off day {:?} but a lock schedules them on {:?} slot #{}",
                    teacher.code, off, slot.day_of_week, slot.slot_index
                ),
                serde_json::json!({
                    "teacher_id": teacher.id, "teacher": teacher.code, "weekly_off_day": off.index(),
                    "day_of_week": slot.day_of_week.index(), "slot_index": slot.slot_index, "subject_id": subject_id,
                }),
            ));
        }
    }
}

fn section_slot_deficit(snap: &Snapshot, idx: &SnapshotIndex, out: &mut Vec<Diagnostic>) {
    for section in snap.sections.iter().filter(|s| s.is_active) {
        let demand: u32 = idx.required_subjects(section).iter().filter_map(|sid| idx.subject(*sid)).map(|s| s.weekly_slot_demand()).sum();
        let available: u32 = DayOfWeek::ALL.iter().filter_map(|d| idx.allowed_slots_by_section_day.get(&(section.id, *d))).map(|v| v.len() as u32).sum();
        if demand > available {
            out.push(diag(
                DiagnosticType::SectionSlotDeficit,
                format!("section {} requires {} slots but only {} are available in its time windows", section.code, demand, available),
                serde_json::json!({"section_id": section.id, "section": section.code, "required_slots": demand, "available_slots": available}),
            ));
        }
    }
}

fn contiguous_free_run_exists(sorted_indices: &[u32], block: u32) -> bool {
    if block <= 1 {
        return !sorted_indices.is_empty();
    }
    let mut run_len = 0u32;
    let mut prev: Option<u32> = None;
    for &idx in sorted_indices {
        run_len = match prev {
            Some(p) if idx == p + 1 => run_len + 1,
            _ => 1,
        };
        if run_len >= block {
            return true;
        }
        prev = Some(idx);
    }
    false
}

fn lab_block_unfit(snap: &Snapshot, idx: &SnapshotIndex, problem: &EffectiveProblem, out: &mut Vec<Diagnostic>) {
    for section in snap.sections.iter().filter(|s| s.is_active) {
        for subject_id in idx.required_subjects(section) {
            let Some(subject) = idx.subject(subject_id) else { continue };
            if subject.subject_type != SubjectType::Lab {
                continue;
            }
            let remaining = problem.remaining_required.get(&(section.id, subject_id)).copied().unwrap_or(0);
            if remaining <= 0 {
                continue;
            }
            let block = subject.lab_block_size_slots as u32;
            let any_fit = DayOfWeek::ALL.iter().any(|&day| {
                problem
                    .allowed_slots_by_section
                    .get(&section.id)
                    .and_then(|m| m.get(&day))
                    .map(|free| contiguous_free_run_exists(free, block))
                    .unwrap_or(false)
            });
            if !any_fit {
                out.push(diag(
                    DiagnosticType::LabBlockUnfit,
                    format!(
                        "subject {} requires {} contiguous slots, but no {} consecutive free slots remain for section {}",
                        subject.code, block, block, section.code
                    ),
                    serde_json::json!({"section_id": section.id, "section": section.code, "subject_id": subject.id, "subject": subject.code, "lab_block_size": block, "remaining_sessions": remaining}),
                ));
            }
        }
    }
}

fn special_allotment_deadlock(snap: &Snapshot, idx: &SnapshotIndex, problem: &EffectiveProblem, out: &mut Vec<Diagnostic>) {
    for section in snap.sections.iter().filter(|s| s.is_active) {
        for subject_id in idx.required_subjects(section) {
            let Some(subject) = idx.subject(subject_id) else { continue };
            if subject.subject_type != SubjectType::Theory {
                continue;
            }
            let remaining = problem.remaining_required.get(&(section.id, subject_id)).copied().unwrap_or(0);
            if remaining <= 0 {
                continue;
            }
            let teacher = idx.strict_teacher(section.id, subject_id).first().and_then(|tss| idx.teacher(tss.teacher_id));

            let mut day_cap_total: i64 = 0;
            for &day in &DayOfWeek::ALL {
                if teacher.map(|t| t.is_off(day)).unwrap_or(false) {
                    continue;
                }
                let Some(allowed) = problem.allowed_slots_by_section.get(&section.id).and_then(|m| m.get(&day)) else { continue };
                if allowed.is_empty() {
                    continue;
                }
                day_cap_total += subject.max_per_day as i64;
            }

            if day_cap_total < remaining as i64 {
                out.push(diag(
                    DiagnosticType::SpecialAllotmentDeadlock,
                    format!(
                        "after locks, {} remaining sessions of {} in section {} cannot fit under max_per_day={} across its remaining working days (capacity {})",
                        remaining, subject.code, section.code, subject.max_per_day, day_cap_total
                    ),
                    serde_json::json!({
                        "section_id": section.id, "section": section.code, "subject_id": subject.id, "subject": subject.code,
                        "remaining_sessions": remaining, "max_per_day": subject.max_per_day, "feasible_remaining_capacity": day_cap_total,
                    }),
                ));
            }
        }
    }
}

fn locked_sessions_exceed_requirement(_snap: &Snapshot, idx: &SnapshotIndex, problem: &EffectiveProblem, out: &mut Vec<Diagnostic>) {
    for (&(section_id, subject_id), &remaining) in &problem.remaining_required {
        if remaining >= 0 {
            continue;
        }
        let Some(section) = idx.section(section_id) else { continue };
        let Some(subject) = idx.subject(subject_id) else { continue };
        let locked = subject.weekly_slot_demand() as i64 - remaining as i64;
        out.push(diag(
            DiagnosticType::LockedSessionsExceedRequirement,
            format!(
                "locked sessions for {} in section {} ({}) exceed the {} required per week",
                subject.code, section.code, locked, subject.sessions_per_week
            ),
            serde_json::json!({
                "section_id": section.id, "section": section.code, "subject_id": subject.id, "subject": subject.code,
                "locked_sessions": locked, "required_sessions": subject.sessions_per_week,
            }),
        ));
    }
    for (&block_id, &remaining) in &problem.remaining_block_sessions {
        if remaining >= 0 {
            continue;
        }
        out.push(diag(
            DiagnosticType::LockedSessionsExceedRequirement,
            format!("elective block {block_id} has more locked occurrences than its weekly session count"),
            serde_json::json!({"elective_block_id": block_id, "remaining": remaining}),
        ));
    }
}

fn room_capacity_shortage(snap: &Snapshot, idx: &SnapshotIndex, out: &mut Vec<Diagnostic>) {
    let theory_capacity = snap.rooms.iter().filter(|r| r.is_active && !r.is_special && r.room_type.is_theory_capable()).count() as u32;
    let lab_capacity = snap.rooms.iter().filter(|r| r.is_active && !r.is_special && r.room_type == RoomType::Lab).count() as u32;

    let mut theory_by_slot: HashMap<SlotId, u32> = HashMap::new();
    let mut lab_by_slot: HashMap<SlotId, u32> = HashMap::new();

    let locks: Vec<(SubjectId, RoomId, SlotId)> = snap
        .fixed_entries
        .iter()
        .filter(|f| f.is_active)
        .map(|f| (f.subject_id, f.room_id, f.slot_id))
        .chain(snap.special_allotments.iter().filter(|s| s.is_active).map(|s| (s.subject_id, s.room_id, s.slot_id)))
        .collect();

    for (subject_id, room_id, slot_id) in locks {
        let Some(subject) = idx.subject(subject_id) else { continue };
        if idx.room(room_id).map(|r| r.is_special).unwrap_or(false) {
            continue;
        }
        let Some(slot) = idx.slot(slot_id) else { continue };
        let span = if subject.subject_type == SubjectType::Lab { subject.lab_block_size_slots } else { 1 };
        for offset in 0..span as u32 {
            let Some(sid) = idx.slot_id_at(slot.day_of_week, slot.slot_index + offset) else { continue };
            let bucket = if subject.subject_type == SubjectType::Lab { &mut lab_by_slot } else { &mut theory_by_slot };
            *bucket.entry(sid).or_default() += 1;
        }
    }

    for (slot_id, needed) in theory_by_slot {
        if needed > theory_capacity {
            push_room_shortage(idx, out, slot_id, needed, theory_capacity, "THEORY");
        }
    }
    for (slot_id, needed) in lab_by_slot {
        if needed > lab_capacity {
            push_room_shortage(idx, out, slot_id, needed, lab_capacity, "LAB");
        }
    }
}

fn push_room_shortage(idx: &SnapshotIndex, out: &mut Vec<Diagnostic>, slot_id: SlotId, needed: u32, available: u32, room_type: &str) {
    let Some(slot) = idx.slot(slot_id) else { return };
    out.push(diag(
        DiagnosticType::RoomCapacityShortage,
        format!(
            "{:?} slot #{} requires {} {room_type} rooms but only {} are available",
            slot.day_of_week, slot.slot_index, needed, available
        ),
        serde_json::json!({"slot_id": slot_id, "day_of_week": slot.day_of_week.index(), "slot_index": slot.slot_index, "required_rooms": needed, "available_rooms": available, "room_type": room_type}),
    ));
}

fn special_room_misuse(snap: &Snapshot, idx: &SnapshotIndex, out: &mut Vec<Diagnostic>) {
    for f in snap.fixed_entries.iter().filter(|f| f.is_active) {
        let Some(room) = idx.room(f.room_id) else { continue };
        if room.is_special {
            let section_code = idx.section(f.section_id).map(|s| s.code.clone());
            out.push(diag(
                DiagnosticType::SpecialRoomMisuse,
                format!("a fixed entry uses special room {}; special rooms can only be used via special allotments", room.code),
                serde_json::json!({"room_id": room.id, "room": room.code, "section_id": f.section_id, "section": section_code, "subject_id": f.subject_id}),
            ));
        }
    }
}

fn combined_group_no_intersection(snap: &Snapshot, idx: &SnapshotIndex, problem: &EffectiveProblem, out: &mut Vec<Diagnostic>) {
    for group in &snap.combined_groups {
        let Some(subject) = idx.subject(group.subject_id) else { continue };
        if subject.sessions_per_week == 0 {
            continue;
        }
        let members = idx.group_sections(group.id);
        if members.is_empty() {
            continue;
        }

        let mut intersection: Option<HashSet<(DayOfWeek, u32)>> = None;
        for &sec in &members {
            let mut free = HashSet::new();
            for &day in &DayOfWeek::ALL {
                if let Some(allowed) = problem.allowed_slots_by_section.get(&sec).and_then(|m| m.get(&day)) {
                    free.extend(allowed.iter().map(|&i| (day, i)));
                }
            }
            intersection = Some(match intersection {
                None => free,
                Some(acc) => acc.intersection(&free).copied().collect(),
            });
        }

        if intersection.map(|s| s.is_empty()).unwrap_or(true) {
            let section_codes: Vec<String> = members.iter().filter_map(|s| idx.section(*s)).map(|s| s.code.clone()).collect();
            out.push(diag(
                DiagnosticType::CombinedGroupNoIntersection,
                format!("combined group for subject {} has no common available slot across sections {}", subject.code, section_codes.join(", ")),
                serde_json::json!({"combined_group_id": group.id, "subject_id": subject.id, "subject": subject.code, "sections": section_codes}),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sched_core::apply_locks;

    fn s1_snapshot() -> (Snapshot, SectionId, SubjectId, TeacherId, RoomId) {
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
        let windows = [DayOfWeek::Mon, DayOfWeek::Tue]
            .into_iter()
            .map(|day| SectionTimeWindow { section_id, day_of_week: day, start_slot_index: 0, end_slot_index: 1 })
            .collect();

        let snap = Snapshot {
            program: Some(Program { id: program_id, code: "P".into(), name: "Program".into() }),
            academic_years: vec![AcademicYear { id: year_id, program_id, year_number: 1, is_active: true }],
            sections: vec![Section { id: section_id, program_id, academic_year_id: year_id, code: "A".into(), strength: 30, track: Track::Core, is_active: true }],
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
            teachers: vec![Teacher { id: teacher_id, code: "T".into(), weekly_off_day: None, max_per_day: 6, max_per_week: 30, max_continuous: 3, is_active: true }],
            rooms: vec![Room { id: room_id, code: "R".into(), room_type: RoomType::Classroom, capacity: 40, is_active: true, is_special: false, special_note: None }],
            slots,
            windows,
            section_subjects: vec![SectionSubject { section_id, subject_id }],
            teacher_subject_sections: vec![TeacherSubjectSection { teacher_id, subject_id, section_id, is_active: true }],
            ..Default::default()
        };
        (snap, section_id, subject_id, teacher_id, room_id)
    }

    #[test]
    fn clean_snapshot_is_inconclusive() {
        let (snap, ..) = s1_snapshot();
        let idx = SnapshotIndex::build(&snap);
        let problem = apply_locks(&snap, &idx, RunId::new());
        let diags = run(&snap, &idx, &problem);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].diagnostic_type, DiagnosticType::DiagnosticsInconclusive);
    }

    #[test]
    fn lab_block_that_cannot_fit_is_flagged() {
        let (mut snap, section_id, _subject_id, teacher_id, room_id) = s1_snapshot();
        snap.subjects.clear();
        snap.section_subjects.clear();
        snap.teacher_subject_sections.clear();

        let lab_subject = SubjectId::new();
        snap.subjects.push(Subject {
            id: lab_subject,
            program_id: snap.program.as_ref().unwrap().id,
            academic_year_id: snap.academic_years[0].id,
            code: "L".into(),
            subject_type: SubjectType::Lab,
            sessions_per_week: 1,
            max_per_day: 1,
            lab_block_size_slots: 2,
            is_active: true,
        });
        snap.section_subjects.push(SectionSubject { section_id, subject_id: lab_subject });
        snap.teacher_subject_sections.push(TeacherSubjectSection { teacher_id, subject_id: lab_subject, section_id, is_active: true });
        // only slot index 1 remains free on each day (index 0 broken), so no 2-slot run fits.
        for day in [DayOfWeek::Mon, DayOfWeek::Tue] {
            let slot_id = snap.slots.iter().find(|s| s.day_of_week == day && s.slot_index == 0).unwrap().id;
            snap.breaks.push(SectionBreak { section_id, slot_id });
        }
        let _ = room_id;

        let idx = SnapshotIndex::build(&snap);
        let problem = apply_locks(&snap, &idx, RunId::new());
        let diags = run(&snap, &idx, &problem);
        assert!(diags.iter().any(|d| d.diagnostic_type == DiagnosticType::LabBlockUnfit), "{diags:?}");
    }

    #[test]
    fn teacher_offday_lock_is_flagged() {
        let (mut snap, section_id, subject_id, teacher_id, room_id) = s1_snapshot();
        if let Some(t) = snap.teachers.iter_mut().find(|t| t.id == teacher_id) {
            t.weekly_off_day = Some(DayOfWeek::Mon);
        }
        let mon_slot = snap.slots.iter().find(|s| s.day_of_week == DayOfWeek::Mon && s.slot_index == 0).unwrap().id;
        snap.fixed_entries.push(FixedTimetableEntry {
            id: FixedEntryId::new(),
            section_id,
            subject_id,
            teacher_id,
            room_id,
            slot_id: mon_slot,
            is_active: true,
        });

        let idx = SnapshotIndex::build(&snap);
        let problem = apply_locks(&snap, &idx, RunId::new());
        let diags = run(&snap, &idx, &problem);
        assert!(diags.iter().any(|d| d.diagnostic_type == DiagnosticType::TeacherOffdayConflict), "{diags:?}");
    }

    #[test]
    fn special_room_misuse_is_flagged() {
        let (mut snap, section_id, subject_id, teacher_id, room_id) = s1_snapshot();
        if let Some(r) = snap.rooms.iter_mut().find(|r| r.id == room_id) {
            r.is_special = true;
        }
        let mon_slot = snap.slots.iter().find(|s| s.day_of_week == DayOfWeek::Mon && s.slot_index == 0).unwrap().id;
        snap.fixed_entries.push(FixedTimetableEntry {
            id: FixedEntryId::new(),
            section_id,
            subject_id,
            teacher_id,
            room_id,
            slot_id: mon_slot,
            is_active: true,
        });

        let idx = SnapshotIndex::build(&snap);
        let problem = apply_locks(&snap, &idx, RunId::new());
        let diags = run(&snap, &idx, &problem);
        assert!(diags.iter().any(|d| d.diagnostic_type == DiagnosticType::SpecialRoomMisuse), "{diags:?}");
    }
}
