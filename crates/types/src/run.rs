use serde::{Deserialize, Serialize};

use crate::enums::{ConflictType, DiagnosticType, RunStatus, Severity};
use crate::ids::{
    AcademicYearId, CombinedGroupId, ElectiveBlockId, EntryId, ProgramId, RoomId, RunId,
    SectionId, SlotId, SubjectId, TeacherId,
};

/// Replaces the "config object with many keyword arguments" pattern (SPEC_FULL.md §9).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SolveOptions {
    pub max_time_seconds: u32,
    pub seed: Option<u64>,
    pub relax_teacher_load_limits: bool,
    pub require_optimal: bool,
    pub debug_capacity_mode: bool,
    pub smart_relaxation: bool,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            max_time_seconds: 60,
            seed: None,
            relax_teacher_load_limits: false,
            require_optimal: false,
            debug_capacity_mode: false,
            smart_relaxation: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimetableRun {
    pub id: RunId,
    pub program_id: ProgramId,
    pub academic_year_id: Option<AcademicYearId>,
    pub created_at_unix: i64,
    pub status: RunStatus,
    pub seed: Option<u64>,
    pub solver_version: Option<String>,
    pub parameters: SolveOptions,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimetableEntry {
    pub id: EntryId,
    pub run_id: RunId,
    pub academic_year_id: AcademicYearId,
    pub section_id: SectionId,
    pub subject_id: SubjectId,
    pub teacher_id: TeacherId,
    pub room_id: RoomId,
    pub slot_id: SlotId,
    pub combined_class_id: Option<CombinedGroupId>,
    pub elective_block_id: Option<ElectiveBlockId>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimetableConflict {
    pub id: crate::ids::ConflictId,
    pub run_id: RunId,
    pub severity: Severity,
    pub conflict_type: ConflictType,
    pub message: String,
    pub section_id: Option<SectionId>,
    pub teacher_id: Option<TeacherId>,
    pub subject_id: Option<SubjectId>,
    pub room_id: Option<RoomId>,
    pub slot_id: Option<SlotId>,
    pub metadata: serde_json::Value,
}

impl TimetableConflict {
    pub fn new(run_id: RunId, severity: Severity, conflict_type: ConflictType, message: impl Into<String>) -> Self {
        Self {
            id: crate::ids::ConflictId::new(),
            run_id,
            severity,
            conflict_type,
            message: message.into(),
            section_id: None,
            teacher_id: None,
            subject_id: None,
            room_id: None,
            slot_id: None,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_section(mut self, id: SectionId) -> Self {
        self.section_id = Some(id);
        self
    }

    pub fn with_teacher(mut self, id: TeacherId) -> Self {
        self.teacher_id = Some(id);
        self
    }

    pub fn with_subject(mut self, id: SubjectId) -> Self {
        self.subject_id = Some(id);
        self
    }

    pub fn with_room(mut self, id: RoomId) -> Self {
        self.room_id = Some(id);
        self
    }

    pub fn with_slot(mut self, id: SlotId) -> Self {
        self.slot_id = Some(id);
        self
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Diagnostic {
    pub diagnostic_type: DiagnosticType,
    pub explanation: String,
    pub payload: serde_json::Value,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MinimalRelaxation {
    pub teacher_id: TeacherId,
    pub current_max_per_day: u8,
    pub suggested_max_per_day: u8,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SolverStats {
    pub wall_time_seconds: f64,
    pub branches: i64,
    pub conflicts: i64,
    pub status_name: String,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenerateStatus {
    FailedValidation,
    ReadyForSolve,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerateResult {
    pub run_id: RunId,
    pub status: GenerateStatus,
    pub conflicts: Vec<TimetableConflict>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SolveOutcome {
    pub run_id: RunId,
    pub status: RunStatus,
    pub entries_written: usize,
    pub entries: Vec<TimetableEntry>,
    pub conflicts: Vec<TimetableConflict>,
    pub objective_score: Option<i64>,
    pub warnings: Vec<TimetableConflict>,
    pub solver_stats: SolverStats,
    pub diagnostics: Vec<Diagnostic>,
    pub minimal_relaxation: Vec<MinimalRelaxation>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    pub id: RunId,
    pub created_at_unix: i64,
    pub status: RunStatus,
    pub seed: Option<u64>,
    pub parameters: SolveOptions,
    pub notes: Option<String>,
}
