use std::collections::HashMap;

use types::*;

/// All scoped inputs for a single solve, loaded once and held read-only for
/// the lifetime of the request. Internal maps hold indices into the owned
/// vectors rather than references, so a `Snapshot` can be cloned cheaply for
/// what-if analysis (the diagnostics engine runs against the same snapshot a
/// failed solve used).
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    pub program: Option<Program>,
    pub academic_years: Vec<AcademicYear>,
    pub sections: Vec<Section>,
    pub subjects: Vec<Subject>,
    pub teachers: Vec<Teacher>,
    pub rooms: Vec<Room>,
    pub slots: Vec<TimeSlot>,
    pub windows: Vec<SectionTimeWindow>,
    pub breaks: Vec<SectionBreak>,
    pub section_subjects: Vec<SectionSubject>,
    pub track_subjects: Vec<TrackSubject>,
    pub section_electives: Vec<SectionElective>,
    pub teacher_subject_sections: Vec<TeacherSubjectSection>,
    pub elective_blocks: Vec<ElectiveBlock>,
    pub elective_block_subjects: Vec<ElectiveBlockSubject>,
    pub section_elective_blocks: Vec<SectionElectiveBlock>,
    pub combined_groups: Vec<CombinedGroup>,
    pub combined_group_sections: Vec<CombinedGroupSection>,
    pub fixed_entries: Vec<FixedTimetableEntry>,
    pub special_allotments: Vec<SpecialAllotment>,
}

/// Dense indexed views over a [`Snapshot`]: id -> entity, and
/// (section, day) -> ordered allowed slot indices, built once per solve.
pub struct SnapshotIndex<'s> {
    pub snap: &'s Snapshot,
    section_by_id: HashMap<SectionId, usize>,
    subject_by_id: HashMap<SubjectId, usize>,
    teacher_by_id: HashMap<TeacherId, usize>,
    room_by_id: HashMap<RoomId, usize>,
    slot_by_id: HashMap<SlotId, usize>,
    slot_by_day_index: HashMap<(DayOfWeek, u32), SlotId>,
    pub windows_by_section: HashMap<SectionId, HashMap<DayOfWeek, usize>>,
    pub allowed_slots_by_section_day: HashMap<(SectionId, DayOfWeek), Vec<u32>>,
}

impl<'s> SnapshotIndex<'s> {
    pub fn build(snap: &'s Snapshot) -> Self {
        let section_by_id = snap.sections.iter().enumerate().map(|(i, s)| (s.id, i)).collect();
        let subject_by_id = snap.subjects.iter().enumerate().map(|(i, s)| (s.id, i)).collect();
        let teacher_by_id = snap.teachers.iter().enumerate().map(|(i, t)| (t.id, i)).collect();
        let room_by_id = snap.rooms.iter().enumerate().map(|(i, r)| (r.id, i)).collect();
        let slot_by_id = snap.slots.iter().enumerate().map(|(i, s)| (s.id, i)).collect();
        let slot_by_day_index = snap
            .slots
            .iter()
            .map(|s| ((s.day_of_week, s.slot_index), s.id))
            .collect();

        let mut windows_by_section: HashMap<SectionId, HashMap<DayOfWeek, usize>> = HashMap::new();
        for (i, w) in snap.windows.iter().enumerate() {
            windows_by_section.entry(w.section_id).or_default().insert(w.day_of_week, i);
        }

        let broken: std::collections::HashSet<(SectionId, SlotId)> =
            snap.breaks.iter().map(|b| (b.section_id, b.slot_id)).collect();

        let mut allowed_slots_by_section_day: HashMap<(SectionId, DayOfWeek), Vec<u32>> = HashMap::new();
        for section in &snap.sections {
            if let Some(days) = windows_by_section.get(&section.id) {
                for (&day, &wi) in days {
                    let w = &snap.windows[wi];
                    let mut slots: Vec<u32> = (w.start_slot_index..=w.end_slot_index)
                        .filter(|&idx| {
                            slot_by_day_index
                                .get(&(day, idx))
                                .map(|sid| !broken.contains(&(section.id, *sid)))
                                .unwrap_or(false)
                        })
                        .collect();
                    slots.sort_unstable();
                    allowed_slots_by_section_day.insert((section.id, day), slots);
                }
            }
        }

        Self {
            snap,
            section_by_id,
            subject_by_id,
            teacher_by_id,
            room_by_id,
            slot_by_id,
            slot_by_day_index,
            windows_by_section,
            allowed_slots_by_section_day,
        }
    }

    pub fn section(&self, id: SectionId) -> Option<&'s Section> {
        self.section_by_id.get(&id).map(|&i| &self.snap.sections[i])
    }

    pub fn subject(&self, id: SubjectId) -> Option<&'s Subject> {
        self.subject_by_id.get(&id).map(|&i| &self.snap.subjects[i])
    }

    pub fn teacher(&self, id: TeacherId) -> Option<&'s Teacher> {
        self.teacher_by_id.get(&id).map(|&i| &self.snap.teachers[i])
    }

    pub fn room(&self, id: RoomId) -> Option<&'s Room> {
        self.room_by_id.get(&id).map(|&i| &self.snap.rooms[i])
    }

    pub fn slot(&self, id: SlotId) -> Option<&'s TimeSlot> {
        self.slot_by_id.get(&id).map(|&i| &self.snap.slots[i])
    }

    pub fn slot_id_at(&self, day: DayOfWeek, index: u32) -> Option<SlotId> {
        self.slot_by_day_index.get(&(day, index)).copied()
    }

    pub fn window(&self, section: SectionId, day: DayOfWeek) -> Option<&'s SectionTimeWindow> {
        self.windows_by_section
            .get(&section)
            .and_then(|m| m.get(&day))
            .map(|&i| &self.snap.windows[i])
    }

    /// Subjects required for a section: explicit `SectionSubject` override if
    /// present, else TrackSubject curriculum expansion (CORE adds its chosen
    /// SectionElective on top of the non-elective TrackSubjects).
    pub fn required_subjects(&self, section: &Section) -> Vec<SubjectId> {
        let explicit: Vec<SubjectId> = self
            .snap
            .section_subjects
            .iter()
            .filter(|ss| ss.section_id == section.id)
            .map(|ss| ss.subject_id)
            .collect();
        if !explicit.is_empty() {
            return explicit;
        }

        let mut out: Vec<SubjectId> = self
            .snap
            .track_subjects
            .iter()
            .filter(|ts| {
                ts.program_id == section.program_id
                    && ts.academic_year_id == section.academic_year_id
                    && ts.track == section.track
                    && !ts.is_elective
            })
            .map(|ts| ts.subject_id)
            .collect();

        if section.track == Track::Core && self.blocks_for_section(section.id).is_empty() {
            out.extend(
                self.snap
                    .section_electives
                    .iter()
                    .filter(|se| se.section_id == section.id)
                    .map(|se| se.subject_id),
            );
        }
        out
    }

    /// Every elective option available to a CORE section (is_elective TrackSubject rows).
    pub fn elective_options(&self, section: &Section) -> Vec<SubjectId> {
        self.snap
            .track_subjects
            .iter()
            .filter(|ts| {
                ts.program_id == section.program_id
                    && ts.academic_year_id == section.academic_year_id
                    && ts.track == section.track
                    && ts.is_elective
            })
            .map(|ts| ts.subject_id)
            .collect()
    }

    pub fn strict_teacher(&self, section: SectionId, subject: SubjectId) -> Vec<&'s TeacherSubjectSection> {
        self.snap
            .teacher_subject_sections
            .iter()
            .filter(|tss| tss.section_id == section && tss.subject_id == subject && tss.is_active)
            .collect()
    }

    pub fn blocks_for_section(&self, section: SectionId) -> Vec<&'s ElectiveBlock> {
        self.snap
            .section_elective_blocks
            .iter()
            .filter(|seb| seb.section_id == section)
            .filter_map(|seb| self.snap.elective_blocks.iter().find(|b| b.id == seb.block_id))
            .collect()
    }

    pub fn block_subjects(&self, block: ElectiveBlockId) -> Vec<&'s ElectiveBlockSubject> {
        self.snap.elective_block_subjects.iter().filter(|s| s.block_id == block).collect()
    }

    pub fn block_sections(&self, block: ElectiveBlockId) -> Vec<SectionId> {
        self.snap
            .section_elective_blocks
            .iter()
            .filter(|seb| seb.block_id == block)
            .map(|seb| seb.section_id)
            .collect()
    }

    pub fn group_sections(&self, group: CombinedGroupId) -> Vec<SectionId> {
        self.snap
            .combined_group_sections
            .iter()
            .filter(|cgs| cgs.group_id == group)
            .map(|cgs| cgs.section_id)
            .collect()
    }
}
