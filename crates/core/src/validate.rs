use std::collections::{HashMap, HashSet};

use types::*;

use crate::snapshot::{Snapshot, SnapshotIndex};

pub struct ValidationReport {
    pub conflicts: Vec<TimetableConflict>,
    pub status: RunStatus,
}

impl ValidationReport {
    pub fn has_errors(&self) -> bool {
        self.conflicts.iter().any(|c| c.severity == Severity::Error)
    }
}

/// Runs every structural check from SPEC_FULL.md §4.2 and derives the
/// resulting run status. Never returns `Err` for a domain problem: every
/// check failure becomes a conflict row, not an exception.
pub fn validate(snap: &Snapshot, run_id: RunId) -> ValidationReport {
    let idx = SnapshotIndex::build(snap);
    let mut out = Vec::new();

    check_schema_presence(snap, run_id, &mut out);
    check_section_windows(snap, &idx, run_id, &mut out);
    check_breaks(snap, &idx, run_id, &mut out);
    check_curriculum_presence(snap, &idx, run_id, &mut out);
    check_elective_selection(snap, &idx, run_id, &mut out);
    check_strict_assignment(snap, &idx, run_id, &mut out);
    check_elective_blocks(snap, &idx, run_id, &mut out);
    check_teacher_weekly_load(snap, &idx, run_id, &mut out);
    check_locks(snap, &idx, run_id, &mut out, true);
    check_locks(snap, &idx, run_id, &mut out, false);
    check_combined_groups(snap, &idx, run_id, &mut out);
    check_section_capacity(snap, &idx, run_id, &mut out);

    let status = if out.iter().any(|c| c.severity == Severity::Error) {
        RunStatus::ValidationFailed
    } else {
        RunStatus::Created
    };

    ValidationReport { conflicts: out, status }
}

fn err(run_id: RunId, t: ConflictType, msg: impl Into<String>) -> TimetableConflict {
    TimetableConflict::new(run_id, Severity::Error, t, msg)
}

fn warn(run_id: RunId, t: ConflictType, msg: impl Into<String>) -> TimetableConflict {
    TimetableConflict::new(run_id, Severity::Warn, t, msg)
}

fn check_schema_presence(snap: &Snapshot, run_id: RunId, out: &mut Vec<TimetableConflict>) {
    if snap.slots.is_empty() {
        out.push(err(run_id, ConflictType::MissingTimeSlots, "no time slots configured"));
    }
    if snap.rooms.is_empty() {
        out.push(err(run_id, ConflictType::MissingRooms, "no rooms configured"));
    }
    if !snap.rooms.iter().any(|r| r.is_active && r.room_type.is_theory_capable() && !r.is_special) {
        out.push(err(
            run_id,
            ConflictType::MissingNonSpecialRooms,
            "no active non-special theory-capable rooms",
        ));
    }
}

fn check_section_windows(snap: &Snapshot, idx: &SnapshotIndex, run_id: RunId, out: &mut Vec<TimetableConflict>) {
    let active_days: HashSet<DayOfWeek> = snap.slots.iter().map(|s| s.day_of_week).collect();

    for section in snap.sections.iter().filter(|s| s.is_active) {
        let mut seen_days: HashSet<DayOfWeek> = HashSet::new();
        for w in snap.windows.iter().filter(|w| w.section_id == section.id) {
            if !seen_days.insert(w.day_of_week) {
                out.push(
                    err(run_id, ConflictType::DuplicateSectionTimeWindow, format!(
                        "section {} has duplicate window for day {:?}", section.code, w.day_of_week
                    ))
                    .with_section(section.id),
                );
            }
            let slot_exists = |idx_: u32| idx.slot_id_at(w.day_of_week, idx_).is_some();
            if w.end_slot_index < w.start_slot_index || !slot_exists(w.start_slot_index) || !slot_exists(w.end_slot_index) {
                out.push(
                    err(run_id, ConflictType::InvalidSectionTimeWindow, format!(
                        "section {} window on {:?} is invalid", section.code, w.day_of_week
                    ))
                    .with_section(section.id),
                );
            }
        }
        for &day in &active_days {
            if !seen_days.contains(&day) {
                out.push(
                    err(run_id, ConflictType::MissingSectionTimeWindow, format!(
                        "section {} has no time window for active day {:?}", section.code, day
                    ))
                    .with_section(section.id),
                );
            }
        }
    }
}

fn check_breaks(snap: &Snapshot, idx: &SnapshotIndex, run_id: RunId, out: &mut Vec<TimetableConflict>) {
    for b in &snap.breaks {
        let Some(section) = idx.section(b.section_id) else { continue };
        let Some(slot) = idx.slot(b.slot_id) else {
            out.push(err(run_id, ConflictType::InvalidSectionBreak, "break references unknown slot").with_section(section.id));
            continue;
        };
        match idx.window(section.id, slot.day_of_week) {
            Some(w) if slot.slot_index >= w.start_slot_index && slot.slot_index <= w.end_slot_index => {}
            _ => out.push(
                err(run_id, ConflictType::BreakOutsideSectionWindow, format!(
                    "break for section {} falls outside its window", section.code
                ))
                .with_section(section.id)
                .with_slot(slot.id),
            ),
        }
    }
}

fn check_curriculum_presence(snap: &Snapshot, idx: &SnapshotIndex, run_id: RunId, out: &mut Vec<TimetableConflict>) {
    for section in snap.sections.iter().filter(|s| s.is_active) {
        let has_override = snap.section_subjects.iter().any(|ss| ss.section_id == section.id);
        let has_curriculum = snap.track_subjects.iter().any(|ts| {
            ts.program_id == section.program_id && ts.academic_year_id == section.academic_year_id && ts.track == section.track
        });
        if !has_override && !has_curriculum {
            out.push(
                err(run_id, ConflictType::MissingTrackCurriculum, format!(
                    "no curriculum defined for track {:?}", section.track
                ))
                .with_section(section.id),
            );
            continue;
        }
        if idx.required_subjects(section).is_empty() {
            out.push(err(run_id, ConflictType::MissingSectionSubjects, format!(
                "section {} resolves to an empty subject list", section.code
            ))
            .with_section(section.id));
        }
    }
}

fn check_elective_selection(snap: &Snapshot, idx: &SnapshotIndex, run_id: RunId, out: &mut Vec<TimetableConflict>) {
    for section in snap.sections.iter().filter(|s| s.is_active) {
        let options = idx.elective_options(section);
        let selections: Vec<_> = snap.section_electives.iter().filter(|se| se.section_id == section.id).collect();
        let maps_blocks = snap.section_elective_blocks.iter().any(|seb| seb.section_id == section.id);

        if section.track != Track::Core {
            if !selections.is_empty() {
                out.push(err(run_id, ConflictType::NonCoreHasElectiveSelection, format!(
                    "non-CORE section {} has an elective selection", section.code
                ))
                .with_section(section.id));
            }
            continue;
        }
        if options.is_empty() {
            if !selections.is_empty() {
                out.push(err(run_id, ConflictType::UnexpectedElectiveSelection, format!(
                    "section {} selects an elective with no options defined", section.code
                ))
                .with_section(section.id));
            }
            continue;
        }
        if maps_blocks {
            // elective blocks take over for this section; a legacy single-pick is not required.
            continue;
        }
        if selections.is_empty() {
            out.push(err(run_id, ConflictType::MissingElectiveSelection, format!(
                "section {} has no elective selection", section.code
            ))
            .with_section(section.id));
        } else if selections.len() > 1 || !options.contains(&selections[0].subject_id) {
            out.push(err(run_id, ConflictType::InvalidElectiveSelection, format!(
                "section {} elective selection is invalid", section.code
            ))
            .with_section(section.id));
        }
    }
}

fn check_strict_assignment(snap: &Snapshot, idx: &SnapshotIndex, run_id: RunId, out: &mut Vec<TimetableConflict>) {
    for section in snap.sections.iter().filter(|s| s.is_active) {
        for subject_id in idx.required_subjects(section) {
            let matches = idx.strict_teacher(section.id, subject_id);
            match matches.len() {
                0 => out.push(
                    err(run_id, ConflictType::MissingTeacherAssignment, format!(
                        "section {} has no teacher for required subject", section.code
                    ))
                    .with_section(section.id)
                    .with_subject(subject_id),
                ),
                1 => {}
                _ => out.push(
                    err(run_id, ConflictType::DuplicateTeacherAssignment, format!(
                        "section {} has multiple teachers for the same subject", section.code
                    ))
                    .with_section(section.id)
                    .with_subject(subject_id),
                ),
            }
        }
    }
}

fn check_elective_blocks(snap: &Snapshot, idx: &SnapshotIndex, run_id: RunId, out: &mut Vec<TimetableConflict>) {
    for block in &snap.elective_blocks {
        if !block.is_active {
            out.push(err(run_id, ConflictType::ElectiveBlockInactive, format!("block {} is inactive", block.name)));
            continue;
        }
        let mapped_sections = idx.block_sections(block.id);
        if mapped_sections.iter().any(|s| idx.section(*s).is_none()) {
            out.push(err(run_id, ConflictType::ElectiveBlockOutOfScope, format!(
                "block {} maps a section outside solve scope", block.name
            )));
        }
        let subjects = idx.block_subjects(block.id);
        if subjects.is_empty() {
            out.push(err(run_id, ConflictType::ElectiveBlockEmpty, format!("block {} has no subjects", block.name)));
            continue;
        }
        let mut seen_teachers = HashSet::new();
        let mut sessions: HashSet<u8> = HashSet::new();
        for bs in &subjects {
            if !seen_teachers.insert(bs.teacher_id) {
                out.push(err(run_id, ConflictType::DuplicateTeacherInBlock, format!(
                    "block {} reuses a teacher across subjects", block.name
                )));
            }
            let Some(subject) = idx.subject(bs.subject_id) else {
                out.push(err(run_id, ConflictType::SubjectNotFound, format!("block {} references unknown subject", block.name)));
                continue;
            };
            if subject.subject_type != SubjectType::Theory {
                out.push(err(run_id, ConflictType::ElectiveBlockSubjectMustBeTheory, format!(
                    "block {} subject {} is not THEORY", block.name, subject.code
                )));
            }
            if subject.sessions_per_week == 0 {
                out.push(err(run_id, ConflictType::ElectiveBlockInvalidSessions, format!(
                    "block {} subject {} has zero sessions", block.name, subject.code
                )));
            }
            sessions.insert(subject.sessions_per_week);
            for &section in &mapped_sections {
                if idx.strict_teacher(section, bs.subject_id).is_empty()
                    && !snap.teacher_subject_sections.iter().any(|tss| {
                        tss.teacher_id == bs.teacher_id && tss.subject_id == bs.subject_id && tss.section_id == section && tss.is_active
                    })
                {
                    out.push(err(run_id, ConflictType::ElectiveBlockTeacherNotEligible, format!(
                        "block {} teacher not eligible for all mapped sections", block.name
                    )));
                }
            }
        }
        if sessions.len() > 1 {
            out.push(err(run_id, ConflictType::ElectiveBlockMismatchedSessions, format!(
                "block {} subjects disagree on sessions_per_week", block.name
            )));
        }
    }
}

fn check_teacher_weekly_load(snap: &Snapshot, idx: &SnapshotIndex, run_id: RunId, out: &mut Vec<TimetableConflict>) {
    let mut assigned: HashMap<TeacherId, u32> = HashMap::new();
    let mut counted_combined: HashSet<CombinedGroupId> = HashSet::new();

    for tss in snap.teacher_subject_sections.iter().filter(|t| t.is_active) {
        let Some(subject) = idx.subject(tss.subject_id) else { continue };
        *assigned.entry(tss.teacher_id).or_default() += subject.weekly_slot_demand();
    }
    for ebs in &snap.elective_block_subjects {
        let Some(subject) = idx.subject(ebs.subject_id) else { continue };
        *assigned.entry(ebs.teacher_id).or_default() += subject.weekly_slot_demand();
    }
    for group in &snap.combined_groups {
        let Some(teacher_id) = group.teacher_id else { continue };
        let Some(subject) = idx.subject(group.subject_id) else { continue };
        if counted_combined.insert(group.id) {
            *assigned.entry(teacher_id).or_default() += subject.weekly_slot_demand();
        }
    }

    for teacher in snap.teachers.iter().filter(|t| t.is_active) {
        let demand = *assigned.get(&teacher.id).unwrap_or(&0);
        if demand > teacher.max_per_week as u32 {
            out.push(
                err(run_id, ConflictType::TeacherLoadExceedsMaxPerWeek, format!(
                    "teacher {} weekly demand {} exceeds max_per_week {}", teacher.code, demand, teacher.max_per_week
                ))
                .with_teacher(teacher.id)
                .with_metadata(serde_json::json!({
                    "assigned_slots": demand,
                    "max_per_week": teacher.max_per_week,
                    "difference": demand.saturating_sub(teacher.max_per_week as u32),
                })),
            );
        }
    }
}

/// Checks categories (9) and (10): `fixed` selects FixedTimetableEntry when true,
/// SpecialAllotment when false. The two lock kinds mirror each other except for
/// the is_special room requirement and a few special-only overlap checks.
fn check_locks(snap: &Snapshot, idx: &SnapshotIndex, run_id: RunId, out: &mut Vec<TimetableConflict>, fixed: bool) {
    use ConflictType::*;
    let (subj_nf, teach_nf, room_nf, room_special, slot_nf, slot_oow, subj_na, teach_mismatch, teach_off, teach_elig, lab_fit, lab_slot) =
        if fixed {
            (
                FixedSubjectNotFound, FixedTeacherNotFound, FixedRoomNotFound, FixedRoomIsSpecial, FixedSlotNotFound,
                FixedSlotOutsideSectionWindow, FixedSubjectNotAllowedForSection, FixedTeacherMismatchAssignment,
                FixedTeacherWeeklyOffDay, FixedTeacherNotEligible, FixedLabBlockDoesNotFit, FixedLabBlockSlotMissing,
            )
        } else {
            (
                SpecialSubjectNotFound, SpecialTeacherNotFound, SpecialRoomNotFound, SpecialRoomNotSpecial, SpecialSlotNotFound,
                SpecialSlotOutsideSectionWindow, SpecialSubjectNotAllowedForSection, SpecialTeacherMismatchAssignment,
                SpecialTeacherWeeklyOffDay, SpecialTeacherNotEligible, SpecialLabBlockDoesNotFit, SpecialLabBlockSlotMissing,
            )
        };

    let mut teacher_slot_seen: HashMap<(TeacherId, SlotId), usize> = HashMap::new();
    let mut room_slot_seen: HashMap<(RoomId, SlotId), usize> = HashMap::new();

    // generic closures over the two lock kinds, read via small local structs
    struct LockView {
        section_id: SectionId,
        subject_id: SubjectId,
        teacher_id: TeacherId,
        room_id: RoomId,
        slot_id: SlotId,
        is_active: bool,
    }

    let views: Vec<LockView> = if fixed {
        snap.fixed_entries
            .iter()
            .map(|f| LockView {
                section_id: f.section_id,
                subject_id: f.subject_id,
                teacher_id: f.teacher_id,
                room_id: f.room_id,
                slot_id: f.slot_id,
                is_active: f.is_active,
            })
            .collect()
    } else {
        snap.special_allotments
            .iter()
            .map(|s| LockView {
                section_id: s.section_id,
                subject_id: s.subject_id,
                teacher_id: s.teacher_id,
                room_id: s.room_id,
                slot_id: s.slot_id,
                is_active: s.is_active,
            })
            .collect()
    };

    for v in views.iter().filter(|v| v.is_active) {
        let Some(section) = idx.section(v.section_id) else { continue };
        let subject = idx.subject(v.subject_id);
        if subject.is_none() {
            out.push(err(run_id, subj_nf, "lock references unknown subject").with_section(section.id));
        }
        let teacher = idx.teacher(v.teacher_id);
        if teacher.is_none() {
            out.push(err(run_id, teach_nf, "lock references unknown teacher").with_section(section.id));
        }
        let room = idx.room(v.room_id);
        match room {
            None => out.push(err(run_id, room_nf, "lock references unknown room").with_section(section.id)),
            Some(r) if fixed && r.is_special => {
                out.push(err(run_id, room_special, "fixed entry uses a special room").with_section(section.id).with_room(r.id))
            }
            Some(r) if !fixed && !r.is_special => {
                out.push(err(run_id, room_special, "special allotment uses a non-special room").with_section(section.id).with_room(r.id))
            }
            _ => {}
        }
        let slot = idx.slot(v.slot_id);
        let Some(slot) = slot else {
            out.push(err(run_id, slot_nf, "lock references unknown slot").with_section(section.id));
            continue;
        };
        match idx.window(section.id, slot.day_of_week) {
            Some(w) if slot.slot_index >= w.start_slot_index && slot.slot_index <= w.end_slot_index => {}
            _ => out.push(err(run_id, slot_oow, "lock slot falls outside section window").with_section(section.id).with_slot(slot.id)),
        }
        if !idx.required_subjects(section).contains(&v.subject_id) {
            out.push(err(run_id, subj_na, "lock subject is not in section curriculum").with_section(section.id).with_subject(v.subject_id));
        }
        if let Some(t) = teacher {
            let matches = idx.strict_teacher(section.id, v.subject_id);
            if !matches.is_empty() && !matches.iter().any(|m| m.teacher_id == t.id) {
                out.push(err(run_id, teach_mismatch, "lock teacher does not match strict assignment").with_section(section.id).with_teacher(t.id));
            }
            if t.is_off(slot.day_of_week) {
                out.push(err(run_id, teach_off, "lock schedules teacher on their weekly off day").with_section(section.id).with_teacher(t.id));
            }
        } else {
            out.push(err(run_id, teach_elig, "lock teacher not eligible"));
        }
        if let Some(subject) = subject {
            if subject.subject_type == SubjectType::Lab && subject.lab_block_size_slots > 1 {
                let mut fits = true;
                for offset in 0..subject.lab_block_size_slots as u32 {
                    if idx.slot_id_at(slot.day_of_week, slot.slot_index + offset).is_none() {
                        fits = false;
                        break;
                    }
                }
                if !fits {
                    out.push(err(run_id, lab_slot, "lab lock block runs past defined slots").with_section(section.id));
                }
                if let Some(w) = idx.window(section.id, slot.day_of_week) {
                    if slot.slot_index + subject.lab_block_size_slots as u32 - 1 > w.end_slot_index {
                        out.push(err(run_id, lab_fit, "lab lock block does not fit inside the section window").with_section(section.id));
                    }
                }
            }
        }

        let tkey = (v.teacher_id, v.slot_id);
        if teacher_slot_seen.insert(tkey, 0).is_some() {
            let t = if fixed { FixedTeacherOverlap } else { SpecialTeacherOverlap };
            out.push(err(run_id, t, "teacher is locked into two sections at the same slot").with_teacher(v.teacher_id).with_slot(v.slot_id));
        }
        if !fixed {
            let rkey = (v.room_id, v.slot_id);
            if room_slot_seen.insert(rkey, 0).is_some() {
                out.push(err(run_id, SpecialRoomOverlap, "special room double-booked").with_room(v.room_id).with_slot(v.slot_id));
            }
        }
    }

    if !fixed {
        for s in snap.special_allotments.iter().filter(|s| s.is_active) {
            if snap
                .fixed_entries
                .iter()
                .any(|f| f.is_active && f.teacher_id == s.teacher_id && f.slot_id == s.slot_id)
            {
                out.push(
                    err(run_id, SpecialConflictsWithFixedEntry, "special allotment conflicts with a fixed entry")
                        .with_teacher(s.teacher_id)
                        .with_slot(s.slot_id),
                );
            }
        }
    }
}

fn check_combined_groups(snap: &Snapshot, idx: &SnapshotIndex, run_id: RunId, out: &mut Vec<TimetableConflict>) {
    for group in &snap.combined_groups {
        let members = idx.group_sections(group.id);
        let in_scope: Vec<SectionId> = members.iter().copied().filter(|s| idx.section(*s).is_some()).collect();
        if in_scope.len() < 2 {
            out.push(err(run_id, ConflictType::CombinedGroupTooSmall, "combined group has fewer than two in-scope sections"));
            continue;
        }
        let Some(subject) = idx.subject(group.subject_id) else {
            out.push(err(run_id, ConflictType::CombinedGroupSubjectNotInSolveScope, "combined group subject out of scope"));
            continue;
        };
        if subject.subject_type != SubjectType::Theory {
            out.push(err(run_id, ConflictType::CombinedGroupSubjectNotTheory, "combined group subject is not THEORY"));
        }
        for &sec in &in_scope {
            let Some(section) = idx.section(sec) else { continue };
            if !idx.required_subjects(section).contains(&group.subject_id) {
                out.push(err(run_id, ConflictType::CombinedGroupSubjectNotInAllSections, "combined group subject missing from a member section").with_section(sec));
            }
        }
        if !snap.rooms.iter().any(|r| r.room_type == RoomType::Lt && r.is_active) {
            out.push(err(run_id, ConflictType::MissingLtRoomsForCombined, "no LT rooms available for combined group"));
        }

        let mut common: Option<HashSet<(DayOfWeek, u32)>> = None;
        for &sec in &in_scope {
            let mut slots = HashSet::new();
            for &day in &DayOfWeek::ALL {
                if let Some(allowed) = idx.allowed_slots_by_section_day.get(&(sec, day)) {
                    slots.extend(allowed.iter().map(|&i| (day, i)));
                }
            }
            common = Some(match common {
                None => slots,
                Some(acc) => acc.intersection(&slots).copied().collect(),
            });
        }
        if common.map(|c| c.is_empty()).unwrap_or(true) {
            out.push(err(run_id, ConflictType::CombinedGroupNoCommonSlots, "combined group members share no common slot"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::s1_snapshot;

    #[test]
    fn s1_validates_clean() {
        let (snap, ..) = s1_snapshot();
        let report = validate(&snap, RunId::new());
        assert!(!report.has_errors(), "unexpected errors: {:?}", report.conflicts);
        assert_eq!(report.status, RunStatus::Created);
    }

    #[test]
    fn missing_time_slots_is_fatal() {
        let (mut snap, ..) = s1_snapshot();
        snap.slots.clear();
        let report = validate(&snap, RunId::new());
        assert!(report.has_errors());
        assert!(report.conflicts.iter().any(|c| c.conflict_type == ConflictType::MissingTimeSlots));
    }

    #[test]
    fn duplicate_strict_assignment_is_flagged() {
        let (mut snap, section_id, subject_id, _teacher_id, _room_id) = s1_snapshot();
        let other = TeacherId::new();
        snap.teachers.push(Teacher {
            id: other,
            code: "T2".into(),
            weekly_off_day: None,
            max_per_day: 6,
            max_per_week: 30,
            max_continuous: 3,
            is_active: true,
        });
        snap.teacher_subject_sections.push(TeacherSubjectSection {
            teacher_id: other,
            subject_id,
            section_id,
            is_active: true,
        });
        let report = validate(&snap, RunId::new());
        assert!(report.conflicts.iter().any(|c| c.conflict_type == ConflictType::DuplicateTeacherAssignment));
    }
}

fn check_section_capacity(snap: &Snapshot, idx: &SnapshotIndex, run_id: RunId, out: &mut Vec<TimetableConflict>) {
    for section in snap.sections.iter().filter(|s| s.is_active) {
        let demand: u32 = idx
            .required_subjects(section)
            .iter()
            .filter_map(|sid| idx.subject(*sid))
            .map(|s| s.weekly_slot_demand())
            .sum();
        let capacity: u32 = DayOfWeek::ALL
            .iter()
            .filter_map(|d| idx.allowed_slots_by_section_day.get(&(section.id, *d)))
            .map(|v| v.len() as u32)
            .sum();
        if demand > capacity {
            out.push(
                err(run_id, ConflictType::SectionLoadExceedsWindowCapacity, format!(
                    "section {} demand {} exceeds window capacity {}", section.code, demand, capacity
                ))
                .with_section(section.id),
            );
        }
        if demand > 30 {
            out.push(warn(run_id, ConflictType::SectionWeeklyLoadGt30, format!(
                "section {} weekly load {} exceeds 30 slots", section.code, demand
            ))
            .with_section(section.id));
        }
    }
}
