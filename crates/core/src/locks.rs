use std::collections::{HashMap, HashSet};

use types::*;

use crate::snapshot::{Snapshot, SnapshotIndex};

/// The decision problem after shrinking for already-scheduled (locked) events.
/// Built by C4 and consumed directly by the C5 model builder.
#[derive(Clone, Debug, Default)]
pub struct EffectiveProblem {
    pub allowed_slots_by_section: HashMap<SectionId, HashMap<DayOfWeek, Vec<u32>>>,
    pub teacher_disallowed_slot: HashSet<(TeacherId, SlotId)>,
    /// THEORY: remaining individual sessions; LAB: remaining blocks. Negative
    /// values indicate over-locking, caught by `over_locked`.
    pub remaining_required: HashMap<(SectionId, SubjectId), i32>,
    pub remaining_block_sessions: HashMap<ElectiveBlockId, i32>,
    /// Rooms already used at (section, slot), reserved ahead of greedy assignment.
    pub reserved_rooms: HashMap<(SectionId, SlotId), RoomId>,
    pub pre_entries: Vec<TimetableEntry>,
    /// True when a lock over-consumes a subject's required sessions; the model
    /// builder must force an impossible constraint rather than silently drop it
    /// (the validator should already have caught this).
    pub over_locked: bool,
}

pub fn apply_locks(snap: &Snapshot, idx: &SnapshotIndex, run_id: RunId) -> EffectiveProblem {
    let mut problem = EffectiveProblem::default();

    for section in snap.sections.iter().filter(|s| s.is_active) {
        let mut by_day = HashMap::new();
        for &day in &DayOfWeek::ALL {
            if let Some(slots) = idx.allowed_slots_by_section_day.get(&(section.id, day)) {
                by_day.insert(day, slots.clone());
            }
        }
        problem.allowed_slots_by_section.insert(section.id, by_day);

        for subject_id in idx.required_subjects(section) {
            if let Some(subject) = idx.subject(subject_id) {
                let required = subject.sessions_per_week as i32;
                problem.remaining_required.insert((section.id, subject_id), required);
            }
        }
    }
    for block in &snap.elective_blocks {
        if let Some(bs) = idx.block_subjects(block.id).first() {
            if let Some(subject) = idx.subject(bs.subject_id) {
                problem.remaining_block_sessions.insert(block.id, subject.sessions_per_week as i32);
            }
        }
    }

    apply_lock_set(snap, idx, run_id, &mut problem, true);
    apply_lock_set(snap, idx, run_id, &mut problem, false);

    problem
}

fn remove_slot(problem: &mut EffectiveProblem, section: SectionId, day: DayOfWeek, slot_index: u32) {
    if let Some(days) = problem.allowed_slots_by_section.get_mut(&section) {
        if let Some(slots) = days.get_mut(&day) {
            slots.retain(|&s| s != slot_index);
        }
    }
}

fn apply_lock_set(snap: &Snapshot, idx: &SnapshotIndex, run_id: RunId, problem: &mut EffectiveProblem, fixed: bool) {
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
        let (Some(section), Some(subject), Some(slot)) = (idx.section(v.section_id), idx.subject(v.subject_id), idx.slot(v.slot_id)) else {
            continue;
        };

        let block = idx
            .blocks_for_section(section.id)
            .into_iter()
            .find(|b| idx.block_subjects(b.id).iter().any(|bs| bs.subject_id == subject.id));

        let span = if subject.subject_type == SubjectType::Lab { subject.lab_block_size_slots } else { 1 };
        for offset in 0..span as u32 {
            let Some(sid) = idx.slot_id_at(slot.day_of_week, slot.slot_index + offset) else { break };
            remove_slot(problem, section.id, slot.day_of_week, slot.slot_index + offset);
            problem.teacher_disallowed_slot.insert((v.teacher_id, sid));
            problem.reserved_rooms.insert((section.id, sid), v.room_id);
        }

        if let Some(block) = block {
            let remaining = problem.remaining_block_sessions.entry(block.id).or_insert(0);
            *remaining -= 1;
            if *remaining < 0 {
                problem.over_locked = true;
            }
            for bs in idx.block_subjects(block.id) {
                problem.teacher_disallowed_slot.insert((bs.teacher_id, slot.id));
            }
            for mapped in idx.block_sections(block.id) {
                remove_slot(problem, mapped, slot.day_of_week, slot.slot_index);
            }
        } else {
            let remaining = problem.remaining_required.entry((section.id, subject.id)).or_insert(0);
            *remaining -= 1;
            if *remaining < 0 {
                problem.over_locked = true;
            }
        }

        problem.pre_entries.push(TimetableEntry {
            id: EntryId::new(),
            run_id,
            academic_year_id: section.academic_year_id,
            section_id: section.id,
            subject_id: subject.id,
            teacher_id: v.teacher_id,
            room_id: v.room_id,
            slot_id: slot.id,
            combined_class_id: None,
            elective_block_id: block.map(|b| b.id),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::s1_snapshot;
    use proptest::prelude::*;

    #[test]
    fn s1_has_no_locked_entries() {
        let (snap, ..) = s1_snapshot();
        let idx = SnapshotIndex::build(&snap);
        let problem = apply_locks(&snap, &idx, RunId::new());
        assert!(problem.pre_entries.is_empty());
        assert!(!problem.over_locked);
    }

    proptest! {
        // remove_slot only ever deletes the target index, never touches the
        // rest of the day's ordering, and is a no-op if the index is absent.
        #[test]
        fn remove_slot_only_drops_the_target(mut slots in prop::collection::vec(0u32..24, 0..12), target in 0u32..24) {
            let section = SectionId::new();
            let mut problem = EffectiveProblem::default();
            let mut by_day = HashMap::new();
            by_day.insert(DayOfWeek::Mon, slots.clone());
            problem.allowed_slots_by_section.insert(section, by_day);

            remove_slot(&mut problem, section, DayOfWeek::Mon, target);

            let after = problem.allowed_slots_by_section[&section][&DayOfWeek::Mon].clone();
            slots.retain(|&s| s != target);
            prop_assert_eq!(after, slots);
        }
    }
}
