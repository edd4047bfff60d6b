use serde::{Deserialize, Serialize};

use crate::enums::{DayOfWeek, RoomType, SubjectType, Track};
use crate::ids::{
    AcademicYearId, CombinedGroupId, ElectiveBlockId, FixedEntryId, ProgramId, RoomId, SectionId,
    SlotId, SpecialAllotmentId, SubjectId, TeacherId,
};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Program {
    pub id: ProgramId,
    pub code: String,
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AcademicYear {
    pub id: AcademicYearId,
    pub program_id: ProgramId,
    pub year_number: u8,
    pub is_active: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    pub program_id: ProgramId,
    pub academic_year_id: AcademicYearId,
    pub code: String,
    pub strength: u32,
    pub track: Track,
    pub is_active: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Subject {
    pub id: SubjectId,
    pub program_id: ProgramId,
    pub academic_year_id: AcademicYearId,
    pub code: String,
    pub subject_type: SubjectType,
    pub sessions_per_week: u8,
    pub max_per_day: u8,
    pub lab_block_size_slots: u8,
    pub is_active: bool,
}

impl Subject {
    /// Slot-weighted weekly demand: THEORY counts sessions, LAB counts sessions * block size.
    pub fn weekly_slot_demand(&self) -> u32 {
        match self.subject_type {
            SubjectType::Theory => self.sessions_per_week as u32,
            SubjectType::Lab => self.sessions_per_week as u32 * self.lab_block_size_slots as u32,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Teacher {
    pub id: TeacherId,
    pub code: String,
    pub weekly_off_day: Option<DayOfWeek>,
    pub max_per_day: u8,
    pub max_per_week: u8,
    pub max_continuous: u8,
    pub is_active: bool,
}

impl Teacher {
    pub fn available_day_count(&self) -> u8 {
        match self.weekly_off_day {
            Some(_) => DayOfWeek::ALL.len() as u8 - 1,
            None => DayOfWeek::ALL.len() as u8,
        }
    }

    pub fn is_off(&self, day: DayOfWeek) -> bool {
        self.weekly_off_day == Some(day)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub code: String,
    pub room_type: RoomType,
    pub capacity: u32,
    pub is_active: bool,
    pub is_special: bool,
    pub special_note: Option<String>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TimeSlot {
    pub id: SlotId,
    pub day_of_week: DayOfWeek,
    pub slot_index: u32,
    pub start_time: (u8, u8),
    pub end_time: (u8, u8),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SectionTimeWindow {
    pub section_id: SectionId,
    pub day_of_week: DayOfWeek,
    pub start_slot_index: u32,
    pub end_slot_index: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SectionSubject {
    pub section_id: SectionId,
    pub subject_id: SubjectId,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrackSubject {
    pub program_id: ProgramId,
    pub academic_year_id: AcademicYearId,
    pub track: Track,
    pub subject_id: SubjectId,
    pub is_elective: bool,
    pub sessions_override: Option<u8>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SectionElective {
    pub section_id: SectionId,
    pub subject_id: SubjectId,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TeacherSubjectSection {
    pub teacher_id: TeacherId,
    pub subject_id: SubjectId,
    pub section_id: SectionId,
    pub is_active: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ElectiveBlock {
    pub id: ElectiveBlockId,
    pub program_id: ProgramId,
    pub academic_year_id: AcademicYearId,
    pub name: String,
    pub is_active: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ElectiveBlockSubject {
    pub block_id: ElectiveBlockId,
    pub subject_id: SubjectId,
    pub teacher_id: TeacherId,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SectionElectiveBlock {
    pub section_id: SectionId,
    pub block_id: ElectiveBlockId,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CombinedGroup {
    pub id: CombinedGroupId,
    pub academic_year_id: AcademicYearId,
    pub subject_id: SubjectId,
    pub teacher_id: Option<TeacherId>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CombinedGroupSection {
    pub group_id: CombinedGroupId,
    pub section_id: SectionId,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FixedTimetableEntry {
    pub id: FixedEntryId,
    pub section_id: SectionId,
    pub subject_id: SubjectId,
    pub teacher_id: TeacherId,
    pub room_id: RoomId,
    pub slot_id: SlotId,
    pub is_active: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpecialAllotment {
    pub id: SpecialAllotmentId,
    pub section_id: SectionId,
    pub subject_id: SubjectId,
    pub teacher_id: TeacherId,
    pub room_id: RoomId,
    pub slot_id: SlotId,
    pub is_active: bool,
    pub reason: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SectionBreak {
    pub section_id: SectionId,
    pub slot_id: SlotId,
}
