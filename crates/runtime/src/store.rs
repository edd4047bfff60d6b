//! In-memory catalog and run storage. Generalizes the teacher's
//! `jobs::InMemJobs` (one `RwLock<HashMap<String, JobStatus>>`) from "one
//! queued job" to "one owned [`TimetableRun`] with its entries and
//! conflicts", plus a second map for the shared read-mostly catalog real
//! persistence would otherwise own.

use std::collections::HashMap;

use sched_core::Snapshot;
use types::*;

/// Shared catalog data a solve reads but never mutates, except through the
/// two lock operations (`upsert_fixed_entry`/`upsert_special_allotment`)
/// that §6 names explicitly.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    pub programs: Vec<Program>,
    pub academic_years: Vec<AcademicYear>,
    pub sections: Vec<Section>,
    pub subjects: Vec<Subject>,
    pub teachers: Vec<Teacher>,
    pub rooms: Vec<Room>,
    pub slots: Vec<TimeSlot>,
    pub windows: Vec<SectionTimeWindow>,
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

impl Catalog {
    /// Builds a C1 [`Snapshot`] scoped to one program and, optionally, one
    /// academic year within it. `breaks` are per-solve input, not persisted
    /// catalog state (a `SectionBreak` carries no run id of its own).
    pub fn snapshot(&self, program_id: ProgramId, academic_year_id: Option<AcademicYearId>, breaks: Vec<SectionBreak>) -> Snapshot {
        let program = self.programs.iter().find(|p| p.id == program_id).cloned();

        let academic_years: Vec<AcademicYear> = self
            .academic_years
            .iter()
            .filter(|y| y.program_id == program_id && academic_year_id.map(|id| id == y.id).unwrap_or(true))
            .cloned()
            .collect();
        let year_ids: std::collections::HashSet<AcademicYearId> = academic_years.iter().map(|y| y.id).collect();

        let sections: Vec<Section> = self
            .sections
            .iter()
            .filter(|s| s.is_active && s.program_id == program_id && year_ids.contains(&s.academic_year_id))
            .cloned()
            .collect();
        let section_ids: std::collections::HashSet<SectionId> = sections.iter().map(|s| s.id).collect();

        let subjects: Vec<Subject> = self
            .subjects
            .iter()
            .filter(|s| s.is_active && s.program_id == program_id && year_ids.contains(&s.academic_year_id))
            .cloned()
            .collect();

        let windows: Vec<SectionTimeWindow> = self.windows.iter().filter(|w| section_ids.contains(&w.section_id)).cloned().collect();

        let teacher_subject_sections: Vec<TeacherSubjectSection> =
            self.teacher_subject_sections.iter().filter(|t| section_ids.contains(&t.section_id)).cloned().collect();

        let fixed_entries: Vec<FixedTimetableEntry> =
            self.fixed_entries.iter().filter(|f| section_ids.contains(&f.section_id)).cloned().collect();
        let special_allotments: Vec<SpecialAllotment> =
            self.special_allotments.iter().filter(|s| section_ids.contains(&s.section_id)).cloned().collect();

        let section_elective_blocks: Vec<SectionElectiveBlock> =
            self.section_elective_blocks.iter().filter(|seb| section_ids.contains(&seb.section_id)).cloned().collect();
        let block_ids: std::collections::HashSet<ElectiveBlockId> = section_elective_blocks.iter().map(|seb| seb.block_id).collect();
        let elective_blocks: Vec<ElectiveBlock> = self.elective_blocks.iter().filter(|b| block_ids.contains(&b.id)).cloned().collect();
        let elective_block_subjects: Vec<ElectiveBlockSubject> =
            self.elective_block_subjects.iter().filter(|ebs| block_ids.contains(&ebs.block_id)).cloned().collect();

        let combined_group_sections: Vec<CombinedGroupSection> = {
            let mut by_group: HashMap<CombinedGroupId, u32> = HashMap::new();
            for cgs in &self.combined_group_sections {
                if section_ids.contains(&cgs.section_id) {
                    *by_group.entry(cgs.group_id).or_default() += 1;
                }
            }
            let in_scope: std::collections::HashSet<CombinedGroupId> =
                by_group.into_iter().filter(|&(_, n)| n >= 2).map(|(g, _)| g).collect();
            self.combined_group_sections.iter().filter(|cgs| in_scope.contains(&cgs.group_id)).cloned().collect()
        };
        let combined_group_ids: std::collections::HashSet<CombinedGroupId> = combined_group_sections.iter().map(|cgs| cgs.group_id).collect();
        let combined_groups: Vec<CombinedGroup> = self.combined_groups.iter().filter(|g| combined_group_ids.contains(&g.id)).cloned().collect();

        // Teachers in scope: strict assignments plus every teacher reachable
        // only through an in-scope elective block or combined group (neither
        // of which is required to also carry a `teacher_subject_sections` row).
        let mut teacher_ids: std::collections::HashSet<TeacherId> =
            teacher_subject_sections.iter().map(|t| t.teacher_id).collect();
        teacher_ids.extend(elective_block_subjects.iter().map(|ebs| ebs.teacher_id));
        teacher_ids.extend(combined_groups.iter().filter_map(|g| g.teacher_id));

        Snapshot {
            program,
            academic_years,
            sections,
            subjects,
            teachers: self.teachers.iter().filter(|t| t.is_active && teacher_ids.contains(&t.id)).cloned().collect(),
            rooms: self.rooms.iter().filter(|r| r.is_active).cloned().collect(),
            slots: self.slots.clone(),
            windows,
            breaks,
            section_subjects: self.section_subjects.iter().filter(|ss| section_ids.contains(&ss.section_id)).cloned().collect(),
            track_subjects: self.track_subjects.clone(),
            section_electives: self.section_electives.iter().filter(|se| section_ids.contains(&se.section_id)).cloned().collect(),
            teacher_subject_sections,
            elective_blocks,
            elective_block_subjects,
            section_elective_blocks,
            combined_groups,
            combined_group_sections,
            fixed_entries,
            special_allotments,
        }
    }
}

/// A run together with the entries and conflicts it exclusively owns. Re-
/// solving replaces `entries`/`conflicts` wholesale (delete-then-insert, per
/// spec.md's "Restarting a solve for the same run re-initializes by deleting
/// existing entries before writing new ones").
#[derive(Clone, Debug)]
pub struct RunState {
    pub run: TimetableRun,
    pub entries: Vec<TimetableEntry>,
    pub conflicts: Vec<TimetableConflict>,
}

#[derive(Default)]
pub struct RunStore {
    runs: parking_lot::RwLock<HashMap<RunId, RunState>>,
}

impl RunStore {
    pub fn insert(&self, state: RunState) {
        self.runs.write().insert(state.run.id, state);
    }

    pub fn get(&self, run_id: RunId) -> Option<RunState> {
        self.runs.read().get(&run_id).cloned()
    }

    pub fn list(&self, program_id: Option<ProgramId>) -> Vec<RunSummary> {
        self.runs
            .read()
            .values()
            .filter(|s| program_id.map(|p| s.run.program_id == p).unwrap_or(true))
            .map(|s| RunSummary {
                id: s.run.id,
                created_at_unix: s.run.created_at_unix,
                status: s.run.status,
                seed: s.run.seed,
                parameters: s.run.parameters.clone(),
                notes: s.run.notes.clone(),
            })
            .collect()
    }
}
