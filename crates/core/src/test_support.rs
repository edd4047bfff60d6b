#![cfg(test)]

use types::*;

use crate::snapshot::Snapshot;

/// Builds the S1 scenario from SPEC_FULL.md §8: one CORE section, one THEORY
/// subject (2 sessions/week), one teacher, one classroom, Mon/Tue with a
/// 2-slot window each.
pub fn s1_snapshot() -> (Snapshot, SectionId, SubjectId, TeacherId, RoomId) {
    let program_id = ProgramId::new();
    let year_id = AcademicYearId::new();
    let section_id = SectionId::new();
    let subject_id = SubjectId::new();
    let teacher_id = TeacherId::new();
    let room_id = RoomId::new();

    let mut slots = Vec::new();
    for day in [DayOfWeek::Mon, DayOfWeek::Tue] {
        for idx in 0..2 {
            slots.push(TimeSlot {
                id: SlotId::new(),
                day_of_week: day,
                slot_index: idx,
                start_time: (8, 0),
                end_time: (9, 0),
            });
        }
    }

    let windows = [DayOfWeek::Mon, DayOfWeek::Tue]
        .into_iter()
        .map(|day| SectionTimeWindow { section_id, day_of_week: day, start_slot_index: 0, end_slot_index: 1 })
        .collect();

    let snap = Snapshot {
        program: Some(Program { id: program_id, code: "P".into(), name: "Program".into() }),
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
        rooms: vec![Room {
            id: room_id,
            code: "R".into(),
            room_type: RoomType::Classroom,
            capacity: 40,
            is_active: true,
            is_special: false,
            special_note: None,
        }],
        slots,
        windows,
        section_subjects: vec![SectionSubject { section_id, subject_id }],
        teacher_subject_sections: vec![TeacherSubjectSection { teacher_id, subject_id, section_id, is_active: true }],
        ..Default::default()
    };

    (snap, section_id, subject_id, teacher_id, room_id)
}
