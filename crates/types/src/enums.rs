use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[repr(u8)]
pub enum DayOfWeek {
    Mon = 0,
    Tue = 1,
    Wed = 2,
    Thu = 3,
    Fri = 4,
    Sat = 5,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 6] = [
        DayOfWeek::Mon,
        DayOfWeek::Tue,
        DayOfWeek::Wed,
        DayOfWeek::Thu,
        DayOfWeek::Fri,
        DayOfWeek::Sat,
    ];

    pub fn from_index(i: u8) -> Option<Self> {
        Self::ALL.get(i as usize).copied()
    }

    pub fn index(self) -> u8 {
        self as u8
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Track {
    Core,
    Cyber,
    AiDs,
    AiMl,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubjectType {
    Theory,
    Lab,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomType {
    Classroom,
    Lt,
    Lab,
}

impl RoomType {
    pub fn is_theory_capable(self) -> bool {
        matches!(self, RoomType::Classroom | RoomType::Lt)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warn,
    Error,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Created,
    ValidationFailed,
    Infeasible,
    Feasible,
    Suboptimal,
    Optimal,
    Error,
}

impl RunStatus {
    pub fn is_terminal_success(self) -> bool {
        matches!(self, RunStatus::Feasible | RunStatus::Suboptimal | RunStatus::Optimal)
    }
}

/// Stable wire codes for every `TimetableConflict.conflict_type` the validator,
/// lock pre-application, and solver driver can emit. See SPEC_FULL.md §3.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictType {
    // schema presence
    MissingTimeSlots,
    MissingRooms,
    MissingNonSpecialRooms,
    // section windows
    MissingSectionTimeWindow,
    DuplicateSectionTimeWindow,
    InvalidSectionTimeWindow,
    // breaks
    InvalidSectionBreak,
    BreakOutsideSectionWindow,
    // curriculum
    MissingTrackCurriculum,
    MissingSectionSubjects,
    // electives
    NonCoreHasElectiveSelection,
    MissingElectiveSelection,
    InvalidElectiveSelection,
    UnexpectedElectiveSelection,
    SectionMappingConflict,
    // strict assignment
    MissingTeacherAssignment,
    DuplicateTeacherAssignment,
    // elective blocks
    ElectiveBlockNotFound,
    ElectiveBlockInactive,
    ElectiveBlockOutOfScope,
    ElectiveBlockEmpty,
    DuplicateTeacherInBlock,
    SubjectNotFound,
    ElectiveBlockSubjectMustBeTheory,
    ElectiveBlockTeacherNotEligible,
    ElectiveBlockInvalidSessions,
    ElectiveBlockMismatchedSessions,
    // teacher load
    TeacherLoadExceedsMaxPerWeek,
    // fixed entries
    FixedSubjectNotFound,
    FixedTeacherNotFound,
    FixedRoomNotFound,
    FixedRoomIsSpecial,
    FixedSlotNotFound,
    FixedSlotOutsideSectionWindow,
    FixedSubjectNotAllowedForSection,
    FixedTeacherMismatchAssignment,
    FixedTeacherWeeklyOffDay,
    FixedTeacherNotEligible,
    FixedLabBlockDoesNotFit,
    FixedLabBlockSlotMissing,
    FixedTeacherOverlap,
    // special allotments
    SpecialSubjectNotFound,
    SpecialTeacherNotFound,
    SpecialRoomMissing,
    SpecialRoomNotFound,
    SpecialRoomNotSpecial,
    SpecialSlotNotFound,
    SpecialSlotOutsideSectionWindow,
    SpecialSubjectNotAllowedForSection,
    SpecialTeacherMismatchAssignment,
    SpecialTeacherWeeklyOffDay,
    SpecialTeacherNotEligible,
    SpecialLabBlockDoesNotFit,
    SpecialLabBlockSlotMissing,
    SpecialTeacherOverlap,
    SpecialRoomOverlap,
    SpecialConflictsWithFixedEntry,
    // combined groups
    CombinedGroupSubjectNotInSolveScope,
    CombinedGroupSubjectNotTheory,
    CombinedGroupTooSmall,
    CombinedGroupNoCommonSlots,
    CombinedGroupSectionNotInSolve,
    CombinedGroupSubjectNotInAllSections,
    CombinedGroupSessionsMismatch,
    MissingLtRoomsForCombined,
    // section capacity
    SectionLoadExceedsWindowCapacity,
    // soft
    SectionWeeklyLoadGt30,
    // capacity analyzer
    CapacityOverload,
    RoomScarcity,
    SectionSlotDeficit,
    CombinedDomainCollapse,
    // solver-phase
    Infeasible,
    Timeout,
    ModelInvalid,
    SolverError,
    SpecialRoomConflict,
    FixedRoomConflict,
    NoRoomAvailable,
    NoLtRoomAvailable,
    // post-solve utilization warnings
    TeacherNearWeeklyLimit,
    RoomNearCapacity,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticType {
    TeacherLoadExceedsLimit,
    TeacherDailyLoadViolation,
    TeacherOffdayConflict,
    SectionSlotDeficit,
    LabBlockUnfit,
    SpecialAllotmentDeadlock,
    LockedSessionsExceedRequirement,
    RoomCapacityShortage,
    SpecialRoomMisuse,
    CombinedGroupNoIntersection,
    DiagnosticsInconclusive,
}
