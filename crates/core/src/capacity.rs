use std::collections::{HashMap, HashSet};

use types::*;

use crate::snapshot::{Snapshot, SnapshotIndex};

#[derive(Clone, Debug, Default)]
pub struct CapacityReport {
    pub conflicts: Vec<TimetableConflict>,
    pub minimal_relaxation: Vec<MinimalRelaxation>,
}

/// Computes required-vs-available slot budgets per teacher / room-type /
/// section / combined group, grounded on the four-dimension budget analysis
/// in `capacity_analyzer.py`'s `analyze_capacity`.
pub fn analyze_capacity(snap: &Snapshot, run_id: RunId) -> CapacityReport {
    let idx = SnapshotIndex::build(snap);
    let mut report = CapacityReport::default();

    analyze_teacher_capacity(snap, &idx, run_id, &mut report);
    analyze_room_type_capacity(snap, &idx, run_id, &mut report);
    analyze_section_capacity(snap, &idx, run_id, &mut report);
    analyze_combined_group_capacity(snap, &idx, run_id, &mut report);

    report
}

fn analyze_teacher_capacity(snap: &Snapshot, idx: &SnapshotIndex, run_id: RunId, report: &mut CapacityReport) {
    let mut required: HashMap<TeacherId, u32> = HashMap::new();
    let mut counted_combined: HashSet<CombinedGroupId> = HashSet::new();

    for tss in snap.teacher_subject_sections.iter().filter(|t| t.is_active) {
        if let Some(subject) = idx.subject(tss.subject_id) {
            *required.entry(tss.teacher_id).or_default() += subject.weekly_slot_demand();
        }
    }
    for group in &snap.combined_groups {
        let (Some(teacher_id), Some(subject)) = (group.teacher_id, idx.subject(group.subject_id)) else { continue };
        if counted_combined.insert(group.id) {
            *required.entry(teacher_id).or_default() += subject.weekly_slot_demand();
        }
    }

    for teacher in snap.teachers.iter().filter(|t| t.is_active) {
        let req = *required.get(&teacher.id).unwrap_or(&0);
        let available = teacher.max_per_day as u32 * teacher.available_day_count() as u32;
        if req > available {
            report.conflicts.push(
                TimetableConflict::new(run_id, Severity::Error, ConflictType::CapacityOverload, format!(
                    "teacher {} required {} exceeds available {}", teacher.code, req, available
                ))
                .with_teacher(teacher.id)
                .with_metadata(serde_json::json!({"required": req, "available": available})),
            );
            let days = teacher.available_day_count().max(1) as u32;
            let needed_mpd = req.div_ceil(days).min(u8::MAX as u32) as u8;
            if needed_mpd > teacher.max_per_day {
                report.minimal_relaxation.push(MinimalRelaxation {
                    teacher_id: teacher.id,
                    current_max_per_day: teacher.max_per_day,
                    suggested_max_per_day: needed_mpd,
                });
            }
        }
    }
}

fn analyze_room_type_capacity(snap: &Snapshot, idx: &SnapshotIndex, run_id: RunId, report: &mut CapacityReport) {
    let active_days = DayOfWeek::ALL.len() as u32;
    let slots_per_day = max_slots_per_day(snap);

    for (kind, predicate): (&str, fn(RoomType) -> bool) in
        [("THEORY", RoomType::is_theory_capable as fn(RoomType) -> bool), ("LAB", (|t: RoomType| t == RoomType::Lab) as fn(RoomType) -> bool)]
    {
        let room_count = snap.rooms.iter().filter(|r| r.is_active && !r.is_special && predicate(r.room_type)).count() as u32;
        let available = room_count * active_days * slots_per_day;
        let required: u32 = snap
            .sections
            .iter()
            .filter(|s| s.is_active)
            .flat_map(|s| idx.required_subjects(s))
            .filter_map(|sid| idx.subject(sid))
            .filter(|s| predicate(if s.subject_type == SubjectType::Lab { RoomType::Lab } else { RoomType::Classroom }))
            .map(|s| s.weekly_slot_demand())
            .sum();
        if required > available {
            report.conflicts.push(TimetableConflict::new(run_id, Severity::Error, ConflictType::RoomScarcity, format!(
                "{kind} room demand {required} exceeds available {available}"
            ))
            .with_metadata(serde_json::json!({"room_type": kind, "required": required, "available": available})));
        }
    }
}

fn max_slots_per_day(snap: &Snapshot) -> u32 {
    let mut per_day: HashMap<DayOfWeek, u32> = HashMap::new();
    for slot in &snap.slots {
        let e = per_day.entry(slot.day_of_week).or_default();
        *e = (*e).max(slot.slot_index + 1);
    }
    per_day.values().copied().max().unwrap_or(0)
}

fn analyze_section_capacity(snap: &Snapshot, idx: &SnapshotIndex, run_id: RunId, report: &mut CapacityReport) {
    for section in snap.sections.iter().filter(|s| s.is_active) {
        let required: u32 = idx
            .required_subjects(section)
            .iter()
            .filter_map(|sid| idx.subject(*sid))
            .map(|s| s.weekly_slot_demand())
            .sum();
        let available: u32 = DayOfWeek::ALL
            .iter()
            .filter_map(|d| idx.allowed_slots_by_section_day.get(&(section.id, *d)))
            .map(|v| v.len() as u32)
            .sum();
        if required > available {
            report.conflicts.push(
                TimetableConflict::new(run_id, Severity::Error, ConflictType::SectionSlotDeficit, format!(
                    "section {} required {} exceeds available {}", section.code, required, available
                ))
                .with_section(section.id)
                .with_metadata(serde_json::json!({"required": required, "available": available})),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::s1_snapshot;

    #[test]
    fn s1_has_no_capacity_overload() {
        let (snap, ..) = s1_snapshot();
        let report = analyze_capacity(&snap, RunId::new());
        assert!(report.conflicts.is_empty(), "{:?}", report.conflicts);
        assert!(report.minimal_relaxation.is_empty());
    }

    #[test]
    fn overloaded_teacher_is_reported_with_relaxation() {
        let (mut snap, section_id, subject_id, teacher_id, _room_id) = s1_snapshot();
        snap.subjects[0].sessions_per_week = 6;
        snap.subjects[0].max_per_day = 3;
        // only MON/TUE windows of length 2 exist, so demand (6) exceeds available (2*1=2 per day cap doesn't matter here, weekly off-day math does)
        if let Some(t) = snap.teachers.iter_mut().find(|t| t.id == teacher_id) {
            t.max_per_day = 1;
            t.max_per_week = 2;
        }
        let _ = section_id;
        let _ = subject_id;
        let report = analyze_capacity(&snap, RunId::new());
        assert!(report.conflicts.iter().any(|c| c.conflict_type == ConflictType::CapacityOverload));
        assert!(!report.minimal_relaxation.is_empty());
    }
}

fn analyze_combined_group_capacity(snap: &Snapshot, idx: &SnapshotIndex, run_id: RunId, report: &mut CapacityReport) {
    for group in &snap.combined_groups {
        let members = idx.group_sections(group.id);
        let Some(subject) = idx.subject(group.subject_id) else { continue };

        let mut common: Option<HashSet<(DayOfWeek, u32)>> = None;
        for sec in &members {
            let mut slots = HashSet::new();
            for &day in &DayOfWeek::ALL {
                if let Some(allowed) = idx.allowed_slots_by_section_day.get(&(*sec, day)) {
                    slots.extend(allowed.iter().map(|&i| (day, i)));
                }
            }
            common = Some(match common {
                None => slots,
                Some(acc) => acc.intersection(&slots).copied().collect(),
            });
        }
        let intersection_size = common.map(|c| c.len()).unwrap_or(0) as u32;
        if intersection_size < subject.sessions_per_week as u32 {
            report.conflicts.push(TimetableConflict::new(run_id, Severity::Error, ConflictType::CombinedDomainCollapse, format!(
                "combined group intersection {intersection_size} below required {}", subject.sessions_per_week
            )));
        }
    }
}
