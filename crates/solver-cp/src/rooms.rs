use std::collections::HashMap;

use sched_core::{Snapshot, SnapshotIndex};
use types::*;

/// A session the CP model fixed to a (teacher, slot-span) but left roomless;
/// decision variables never carry a room dimension, so every solved and
/// locked session passes through here before entries are written.
pub struct Placement {
    pub sections: Vec<SectionId>,
    pub subject_id: SubjectId,
    pub teacher_id: TeacherId,
    pub slots: Vec<SlotId>,
    pub elective_block_id: Option<ElectiveBlockId>,
    pub combined_group_id: Option<CombinedGroupId>,
}

pub struct RoomAssignment {
    pub entries: Vec<TimetableEntry>,
    pub warnings: Vec<TimetableConflict>,
}

/// Greedy room packer (C6), grounded on the occupancy-map style of the
/// teacher's `solve_greedy`: reserve locked rooms first, then hand each
/// solved placement the first free room of a fitting type.
pub fn assign_rooms(
    snap: &Snapshot,
    idx: &SnapshotIndex,
    run_id: RunId,
    academic_year_id: AcademicYearId,
    placements: Vec<Placement>,
) -> RoomAssignment {
    let mut occ: HashMap<(RoomId, SlotId), ()> = HashMap::new();
    let mut entries = Vec::new();
    let mut warnings = Vec::new();

    seed_locked_rooms(snap, idx, run_id, &mut occ, &mut warnings);

    let theory_rooms: Vec<&Room> =
        snap.rooms.iter().filter(|r| r.is_active && !r.is_special && r.room_type.is_theory_capable()).collect();
    let lt_then_classroom: Vec<&Room> = snap
        .rooms
        .iter()
        .filter(|r| r.is_active && !r.is_special && r.room_type == RoomType::Lt)
        .chain(snap.rooms.iter().filter(|r| r.is_active && !r.is_special && r.room_type == RoomType::Classroom))
        .collect();
    let lab_rooms: Vec<&Room> =
        snap.rooms.iter().filter(|r| r.is_active && !r.is_special && r.room_type == RoomType::Lab).collect();
    let any_active: Option<RoomId> = snap.rooms.iter().find(|r| r.is_active).map(|r| r.id);
    let mut overbooked_marker: HashMap<(RoomId, SlotId), CombinedGroupId> = HashMap::new();

    for p in placements {
        let Some(subject) = idx.subject(p.subject_id) else { continue };
        let is_group_session = p.sections.len() > 1 || p.elective_block_id.is_some();

        let candidates: &[&Room] = if subject.subject_type == SubjectType::Lab {
            &lab_rooms
        } else if is_group_session {
            &lt_then_classroom
        } else {
            &theory_rooms
        };

        let free = candidates.iter().find(|r| p.slots.iter().all(|s| !occ.contains_key(&(r.id, *s))));

        let mut overbooked = false;
        let room_id = match free {
            Some(room) => {
                for &s in &p.slots {
                    occ.insert((room.id, s), ());
                }
                room.id
            }
            None => {
                overbooked = true;
                let conflict_type = if is_group_session { ConflictType::NoLtRoomAvailable } else { ConflictType::NoRoomAvailable };
                warnings.push(
                    TimetableConflict::new(
                        run_id,
                        Severity::Warn,
                        conflict_type,
                        format!("no free room for subject {} across {} slot(s); overbooking a shared room", subject.code, p.slots.len()),
                    )
                    .with_subject(p.subject_id)
                    .with_teacher(p.teacher_id)
                    .with_metadata(serde_json::json!({"sections": p.sections.len()})),
                );
                match any_active {
                    Some(id) => id,
                    None => continue,
                }
            }
        };

        // T3: entries that share a (room, slot) without a free room must carry
        // the same synthetic marker so downstream consumers can detect the
        // collision rather than mistake it for a genuine group co-occupancy.
        let combined_class_id = if overbooked {
            let marker = p
                .slots
                .iter()
                .find_map(|s| overbooked_marker.get(&(room_id, *s)).copied())
                .unwrap_or_else(CombinedGroupId::new);
            for &s in &p.slots {
                overbooked_marker.insert((room_id, s), marker);
            }
            Some(marker)
        } else {
            p.combined_group_id.or_else(|| is_group_session.then(CombinedGroupId::new))
        };
        for &section_id in &p.sections {
            for &slot_id in &p.slots {
                entries.push(TimetableEntry {
                    id: EntryId::new(),
                    run_id,
                    academic_year_id,
                    section_id,
                    subject_id: p.subject_id,
                    teacher_id: p.teacher_id,
                    room_id,
                    slot_id,
                    combined_class_id,
                    elective_block_id: p.elective_block_id,
                });
            }
        }
    }

    RoomAssignment { entries, warnings }
}

fn seed_locked_rooms(
    snap: &Snapshot,
    idx: &SnapshotIndex,
    run_id: RunId,
    occ: &mut HashMap<(RoomId, SlotId), ()>,
    warnings: &mut Vec<TimetableConflict>,
) {
    for f in snap.fixed_entries.iter().filter(|f| f.is_active) {
        if idx.room(f.room_id).is_none() {
            continue;
        }
        if occ.insert((f.room_id, f.slot_id), ()).is_some() {
            warnings.push(
                TimetableConflict::new(run_id, Severity::Warn, ConflictType::FixedRoomConflict, "room double-booked across locked entries")
                    .with_room(f.room_id)
                    .with_slot(f.slot_id),
            );
        }
    }
    for s in snap.special_allotments.iter().filter(|s| s.is_active) {
        if idx.room(s.room_id).is_none() {
            continue;
        }
        if occ.insert((s.room_id, s.slot_id), ()).is_some() {
            warnings.push(
                TimetableConflict::new(run_id, Severity::Warn, ConflictType::SpecialRoomConflict, "room double-booked across locked entries")
                    .with_room(s.room_id)
                    .with_slot(s.slot_id),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn theory_room(code: &str) -> Room {
        Room { id: RoomId::new(), code: code.into(), room_type: RoomType::Classroom, capacity: 40, is_active: true, is_special: false, special_note: None }
    }

    fn lab_room(code: &str) -> Room {
        Room { id: RoomId::new(), code: code.into(), room_type: RoomType::Lab, capacity: 24, is_active: true, is_special: false, special_note: None }
    }

    fn subject(subject_type: SubjectType, lab_block_size_slots: u32) -> Subject {
        Subject {
            id: SubjectId::new(),
            program_id: ProgramId::new(),
            academic_year_id: AcademicYearId::new(),
            code: "S".into(),
            subject_type,
            sessions_per_week: 1,
            max_per_day: 1,
            lab_block_size_slots,
            is_active: true,
        }
    }

    fn slot(day: DayOfWeek, index: u32) -> TimeSlot {
        TimeSlot { id: SlotId::new(), day_of_week: day, slot_index: index, start_time: (8, 0), end_time: (9, 0) }
    }

    #[test]
    fn assigns_the_first_free_theory_room_and_occupies_every_slot() {
        let room = theory_room("R1");
        let s = slot(DayOfWeek::Mon, 0);
        let subj = subject(SubjectType::Theory, 1);
        let snap =
            Snapshot { rooms: vec![room.clone()], subjects: vec![subj.clone()], slots: vec![s.clone()], ..Default::default() };
        let idx = SnapshotIndex::build(&snap);
        let run_id = RunId::new();

        let placement = Placement {
            sections: vec![SectionId::new()],
            subject_id: subj.id,
            teacher_id: TeacherId::new(),
            slots: vec![s.id],
            elective_block_id: None,
            combined_group_id: None,
        };
        let result = assign_rooms(&snap, &idx, run_id, AcademicYearId::new(), vec![placement]);

        assert_eq!(result.entries.len(), 1);
        assert_eq!(result.entries[0].room_id, room.id);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn lab_block_reserves_every_slot_in_the_span_and_writes_one_entry_per_slot() {
        let room = lab_room("L1");
        let slots = vec![slot(DayOfWeek::Mon, 0), slot(DayOfWeek::Mon, 1)];
        let subj = subject(SubjectType::Lab, 2);
        let snap = Snapshot { rooms: vec![room.clone()], subjects: vec![subj.clone()], slots: slots.clone(), ..Default::default() };
        let idx = SnapshotIndex::build(&snap);

        let placement = Placement {
            sections: vec![SectionId::new()],
            subject_id: subj.id,
            teacher_id: TeacherId::new(),
            slots: slots.iter().map(|s| s.id).collect(),
            elective_block_id: None,
            combined_group_id: None,
        };
        let result = assign_rooms(&snap, &idx, RunId::new(), AcademicYearId::new(), vec![placement]);

        assert_eq!(result.entries.len(), 2);
        assert!(result.entries.iter().all(|e| e.room_id == room.id));
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn no_free_room_falls_back_to_overbooking_with_a_warning() {
        let room = theory_room("R1");
        let s = slot(DayOfWeek::Mon, 0);
        let subj_a = subject(SubjectType::Theory, 1);
        let subj_b = subject(SubjectType::Theory, 1);
        let snap =
            Snapshot { rooms: vec![room.clone()], subjects: vec![subj_a.clone(), subj_b.clone()], slots: vec![s.clone()], ..Default::default() };
        let idx = SnapshotIndex::build(&snap);
        let run_id = RunId::new();

        let placements = vec![
            Placement {
                sections: vec![SectionId::new()],
                subject_id: subj_a.id,
                teacher_id: TeacherId::new(),
                slots: vec![s.id],
                elective_block_id: None,
                combined_group_id: None,
            },
            Placement {
                sections: vec![SectionId::new()],
                subject_id: subj_b.id,
                teacher_id: TeacherId::new(),
                slots: vec![s.id],
                elective_block_id: None,
                combined_group_id: None,
            },
        ];
        let result = assign_rooms(&snap, &idx, run_id, AcademicYearId::new(), placements);

        assert_eq!(result.entries.len(), 2);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].conflict_type, ConflictType::NoRoomAvailable);
        assert!(result.entries[0].combined_class_id.is_some());
        assert_eq!(result.entries[0].combined_class_id, result.entries[1].combined_class_id);
    }
}
