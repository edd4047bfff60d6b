//! CP model builder (C5). Gated behind `with-cpsat` because it links the
//! real OR-Tools CP-SAT solver through the `cp_sat` crate; with the feature
//! off there is no approximate fallback, matching the stated Non-goal that no
//! heuristic substitutes for the CP core.
#![cfg(feature = "with-cpsat")]

use std::collections::HashMap;

use cp_sat::builder::{BoolVar, CpModelBuilder, LinearExpr};
use sched_core::{EffectiveProblem, Snapshot, SnapshotIndex};
use types::*;

const PRIMARY_WEIGHT: i64 = 1000;
const MAX_GAP: u32 = 3;

#[derive(Default)]
pub struct ModelVars {
    pub x: HashMap<(SectionId, SubjectId, SlotId), BoolVar>,
    pub lab_start: HashMap<(SectionId, SubjectId, DayOfWeek, u32), BoolVar>,
    pub z: HashMap<(ElectiveBlockId, SlotId), BoolVar>,
    pub combined_x: HashMap<(CombinedGroupId, SlotId), BoolVar>,
}

pub struct BuiltModel {
    pub model: CpModelBuilder,
    pub vars: ModelVars,
    /// Set when a requirement has no feasible variable to satisfy it; the
    /// caller should report INFEASIBLE without even calling the solver.
    pub trivially_infeasible: bool,
}

fn expr_sum(terms: &[(i64, BoolVar)]) -> LinearExpr {
    terms.iter().cloned().collect()
}

fn teacher_available(
    idx: &SnapshotIndex,
    problem: &EffectiveProblem,
    teacher_id: TeacherId,
    slot: &TimeSlot,
) -> bool {
    match idx.teacher(teacher_id) {
        Some(t) if t.is_active && !t.is_off(slot.day_of_week) => {
            !problem.teacher_disallowed_slot.contains(&(teacher_id, slot.id))
        }
        _ => false,
    }
}

fn locked_occurrence_count(problem: &EffectiveProblem, section: SectionId, subject: SubjectId, day: Option<DayOfWeek>, idx: &SnapshotIndex) -> u32 {
    problem
        .pre_entries
        .iter()
        .filter(|e| e.section_id == section && e.subject_id == subject)
        .filter(|e| day.map(|d| idx.slot(e.slot_id).map(|s| s.day_of_week) == Some(d)).unwrap_or(true))
        .count() as u32
}

fn locked_theory_count_at(problem: &EffectiveProblem, idx: &SnapshotIndex, slot: SlotId) -> i64 {
    problem
        .pre_entries
        .iter()
        .filter(|e| e.slot_id == slot)
        .filter_map(|e| idx.subject(e.subject_id))
        .filter(|s| s.subject_type == SubjectType::Theory)
        .count() as i64
}

fn locked_lab_count_at(problem: &EffectiveProblem, idx: &SnapshotIndex, slot: SlotId) -> i64 {
    problem
        .pre_entries
        .iter()
        .filter(|e| e.slot_id == slot)
        .filter_map(|e| idx.subject(e.subject_id))
        .filter(|s| s.subject_type == SubjectType::Lab)
        .count() as i64
}

/// Builds the full decision-variable and hard-constraint set from
/// SPEC_FULL.md §4.5, then sets the lexicographic two-tier objective.
pub fn build_model(
    snap: &Snapshot,
    idx: &SnapshotIndex,
    problem: &EffectiveProblem,
    options: &SolveOptions,
) -> BuiltModel {
    let mut model = CpModelBuilder::default();
    let mut vars = ModelVars::default();
    let mut trivially_infeasible = problem.over_locked;

    let mut section_slot_terms: HashMap<(SectionId, SlotId), Vec<(i64, BoolVar)>> = HashMap::new();
    let mut teacher_slot_terms: HashMap<(TeacherId, SlotId), Vec<(i64, BoolVar)>> = HashMap::new();
    let mut theory_slot_terms: HashMap<SlotId, Vec<(i64, BoolVar)>> = HashMap::new();
    let mut lab_slot_terms: HashMap<SlotId, Vec<(i64, BoolVar)>> = HashMap::new();
    let mut objective_primary: Vec<(i64, BoolVar)> = Vec::new();

    // --- THEORY x[section, subject, slot] and constraint 1 + contributions to 5,7,9,13 ---
    for section in snap.sections.iter().filter(|s| s.is_active) {
        for subject_id in idx.required_subjects(section) {
            let Some(subject) = idx.subject(subject_id) else { continue };
            if subject.subject_type != SubjectType::Theory {
                continue;
            }
            let Some(&remaining) = problem.remaining_required.get(&(section.id, subject_id)) else { continue };
            if remaining <= 0 {
                continue;
            }
            let teacher_id = idx.strict_teacher(section.id, subject_id).first().map(|t| t.teacher_id);
            let Some(teacher_id) = teacher_id else { continue };

            let mut session_terms = Vec::new();
            let mut per_day_terms: HashMap<DayOfWeek, Vec<(i64, BoolVar)>> = HashMap::new();

            for &day in &DayOfWeek::ALL {
                let Some(allowed) = problem.allowed_slots_by_section.get(&section.id).and_then(|m| m.get(&day)) else { continue };
                for &slot_index in allowed {
                    let Some(slot_id) = idx.slot_id_at(day, slot_index) else { continue };
                    let slot = idx.slot(slot_id).unwrap();
                    if !teacher_available(idx, problem, teacher_id, slot) {
                        continue;
                    }
                    let var = model.new_bool_var();
                    vars.x.insert((section.id, subject_id, slot_id), var.clone());
                    session_terms.push((1, var.clone()));
                    per_day_terms.entry(day).or_default().push((1, var.clone()));
                    section_slot_terms.entry((section.id, slot_id)).or_default().push((1, var.clone()));
                    teacher_slot_terms.entry((teacher_id, slot_id)).or_default().push((1, var.clone()));
                    theory_slot_terms.entry(slot_id).or_default().push((1, var.clone()));
                    objective_primary.push((PRIMARY_WEIGHT * slot_index as i64, var));
                }
            }

            if session_terms.is_empty() {
                trivially_infeasible = true;
                continue;
            }
            model.add_eq(expr_sum(&session_terms), LinearExpr::from(remaining));

            for (day, terms) in &per_day_terms {
                let locked_on_day = locked_occurrence_count(problem, section.id, subject_id, Some(*day), idx) as i64;
                let cap = subject.max_per_day as i64 - locked_on_day;
                model.add_le(expr_sum(terms), LinearExpr::from(cap.max(0)));
            }
        }
    }

    // --- LAB lab_start[section, subject, day, start] and constraints 2, 8 ---
    for section in snap.sections.iter().filter(|s| s.is_active) {
        for subject_id in idx.required_subjects(section) {
            let Some(subject) = idx.subject(subject_id) else { continue };
            if subject.subject_type != SubjectType::Lab {
                continue;
            }
            let Some(&remaining) = problem.remaining_required.get(&(section.id, subject_id)) else { continue };
            if remaining <= 0 {
                continue;
            }
            let teacher_id = idx.strict_teacher(section.id, subject_id).first().map(|t| t.teacher_id);
            let Some(teacher_id) = teacher_id else { continue };

            let block_size = subject.lab_block_size_slots as u32;
            let mut block_terms = Vec::new();

            for &day in &DayOfWeek::ALL {
                let Some(allowed) = problem.allowed_slots_by_section.get(&section.id).and_then(|m| m.get(&day)) else { continue };
                let allowed_set: std::collections::HashSet<u32> = allowed.iter().copied().collect();
                for &start in allowed {
                    let run: Vec<u32> = (start..start + block_size).collect();
                    if !run.iter().all(|i| allowed_set.contains(i)) {
                        continue;
                    }
                    let slot_ids: Option<Vec<SlotId>> = run.iter().map(|&i| idx.slot_id_at(day, i)).collect();
                    let Some(slot_ids) = slot_ids else { continue };
                    if !slot_ids.iter().all(|sid| teacher_available(idx, problem, teacher_id, idx.slot(*sid).unwrap())) {
                        continue;
                    }
                    let var = model.new_bool_var();
                    vars.lab_start.insert((section.id, subject_id, day, start), var.clone());
                    block_terms.push((1, var.clone()));
                    for &sid in &slot_ids {
                        section_slot_terms.entry((section.id, sid)).or_default().push((1, var.clone()));
                        teacher_slot_terms.entry((teacher_id, sid)).or_default().push((1, var.clone()));
                        lab_slot_terms.entry(sid).or_default().push((1, var.clone()));
                    }
                    objective_primary.push((PRIMARY_WEIGHT * start as i64, var));
                }
            }

            if block_terms.is_empty() {
                trivially_infeasible = true;
                continue;
            }
            model.add_eq(expr_sum(&block_terms), LinearExpr::from(remaining));
        }
    }

    // --- elective block z[block, slot] and constraints 3, 6 ---
    for block in snap.elective_blocks.iter().filter(|b| b.is_active) {
        let Some(&remaining) = problem.remaining_block_sessions.get(&block.id) else { continue };
        if remaining <= 0 {
            continue;
        }
        let mapped_sections = idx.block_sections(block.id);
        if mapped_sections.is_empty() {
            continue;
        }
        let subjects = idx.block_subjects(block.id);
        if subjects.is_empty() {
            continue;
        }
        let min_max_per_day = subjects
            .iter()
            .filter_map(|bs| idx.subject(bs.subject_id))
            .map(|s| s.max_per_day)
            .min()
            .unwrap_or(0);

        let mut session_terms = Vec::new();
        let mut per_day_terms: HashMap<DayOfWeek, Vec<(i64, BoolVar)>> = HashMap::new();

        for &day in &DayOfWeek::ALL {
            let mut common: Option<std::collections::HashSet<u32>> = None;
            for &sec in &mapped_sections {
                let allowed = problem.allowed_slots_by_section.get(&sec).and_then(|m| m.get(&day)).cloned().unwrap_or_default();
                let set: std::collections::HashSet<u32> = allowed.into_iter().collect();
                common = Some(match common {
                    None => set,
                    Some(acc) => acc.intersection(&set).copied().collect(),
                });
            }
            let Some(common) = common else { continue };
            for &slot_index in &common {
                let Some(slot_id) = idx.slot_id_at(day, slot_index) else { continue };
                let slot = idx.slot(slot_id).unwrap();
                if !subjects.iter().all(|bs| teacher_available(idx, problem, bs.teacher_id, slot)) {
                    continue;
                }
                let var = model.new_bool_var();
                vars.z.insert((block.id, slot_id), var.clone());
                session_terms.push((1, var.clone()));
                per_day_terms.entry(day).or_default().push((1, var.clone()));
                for &sec in &mapped_sections {
                    section_slot_terms.entry((sec, slot_id)).or_default().push((1, var.clone()));
                }
                for bs in &subjects {
                    teacher_slot_terms.entry((bs.teacher_id, slot_id)).or_default().push((1, var.clone()));
                }
                theory_slot_terms.entry(slot_id).or_default().push((subjects.len() as i64, var.clone()));
                objective_primary.push((PRIMARY_WEIGHT * slot_index as i64, var));
            }
        }

        if session_terms.is_empty() {
            trivially_infeasible = true;
            continue;
        }
        model.add_eq(expr_sum(&session_terms), LinearExpr::from(remaining));
        for terms in per_day_terms.values() {
            model.add_le(expr_sum(terms), LinearExpr::from(min_max_per_day as i64));
        }
    }

    // --- combined group combined_x[group, slot] and constraint 4 ---
    for group in &snap.combined_groups {
        let Some(subject) = idx.subject(group.subject_id) else { continue };
        let Some(teacher_id) = group.teacher_id else { continue };
        let members = idx.group_sections(group.id);
        if members.len() < 2 {
            continue;
        }

        let mut session_terms = Vec::new();
        for &day in &DayOfWeek::ALL {
            let mut common: Option<std::collections::HashSet<u32>> = None;
            for &sec in &members {
                let allowed = problem.allowed_slots_by_section.get(&sec).and_then(|m| m.get(&day)).cloned().unwrap_or_default();
                let set: std::collections::HashSet<u32> = allowed.into_iter().collect();
                common = Some(match common {
                    None => set,
                    Some(acc) => acc.intersection(&set).copied().collect(),
                });
            }
            let Some(common) = common else { continue };
            for &slot_index in &common {
                let Some(slot_id) = idx.slot_id_at(day, slot_index) else { continue };
                let slot = idx.slot(slot_id).unwrap();
                if !teacher_available(idx, problem, teacher_id, slot) {
                    continue;
                }
                let var = model.new_bool_var();
                vars.combined_x.insert((group.id, slot_id), var.clone());
                session_terms.push((1, var.clone()));
                for &sec in &members {
                    section_slot_terms.entry((sec, slot_id)).or_default().push((1, var.clone()));
                }
                teacher_slot_terms.entry((teacher_id, slot_id)).or_default().push((1, var.clone()));
                theory_slot_terms.entry(slot_id).or_default().push((1, var.clone()));
                objective_primary.push((PRIMARY_WEIGHT * slot_index as i64, var));
            }
        }

        if session_terms.is_empty() {
            trivially_infeasible = true;
            continue;
        }
        model.add_eq(expr_sum(&session_terms), LinearExpr::from(subject.sessions_per_week as i64));
    }

    // --- constraint 7: section at-most-one per (section, slot) ---
    for terms in section_slot_terms.values() {
        if terms.len() > 1 {
            model.add_le(expr_sum(terms), LinearExpr::from(1));
        }
    }

    // --- constraint 9: teacher at-most-one per (teacher, slot) ---
    for terms in teacher_slot_terms.values() {
        if terms.len() > 1 {
            model.add_le(expr_sum(terms), LinearExpr::from(1));
        }
    }

    // --- constraint 11: max_continuous sliding window per (teacher, day) ---
    for teacher in snap.teachers.iter().filter(|t| t.is_active) {
        for &day in &DayOfWeek::ALL {
            if teacher.is_off(day) {
                continue;
            }
            let mut day_slots: Vec<&TimeSlot> = snap.slots.iter().filter(|s| s.day_of_week == day).collect();
            day_slots.sort_by_key(|s| s.slot_index);
            let window = teacher.max_continuous as usize + 1;
            if day_slots.len() < window {
                continue;
            }
            for start in 0..=day_slots.len() - window {
                let mut terms = Vec::new();
                for slot in &day_slots[start..start + window] {
                    if let Some(t) = teacher_slot_terms.get(&(teacher.id, slot.id)) {
                        terms.extend(t.iter().cloned());
                    }
                }
                if !terms.is_empty() {
                    model.add_le(expr_sum(&terms), LinearExpr::from(teacher.max_continuous as i64));
                }
            }
        }
    }

    // --- constraint 12: optional teacher load caps ---
    if !options.relax_teacher_load_limits {
        for teacher in snap.teachers.iter().filter(|t| t.is_active) {
            let weekly_terms: Vec<(i64, BoolVar)> = teacher_slot_terms
                .iter()
                .filter(|((t, _), _)| *t == teacher.id)
                .flat_map(|(_, v)| v.iter().cloned())
                .collect();
            if !weekly_terms.is_empty() {
                model.add_le(expr_sum(&weekly_terms), LinearExpr::from(teacher.max_per_week as i64));
            }
            for &day in &DayOfWeek::ALL {
                let daily_terms: Vec<(i64, BoolVar)> = snap
                    .slots
                    .iter()
                    .filter(|s| s.day_of_week == day)
                    .filter_map(|s| teacher_slot_terms.get(&(teacher.id, s.id)))
                    .flat_map(|v| v.iter().cloned())
                    .collect();
                if !daily_terms.is_empty() {
                    model.add_le(expr_sum(&daily_terms), LinearExpr::from(teacher.max_per_day as i64));
                }
            }
        }
    }

    // --- constraint 13: room capacity per slot ---
    let theory_room_count = snap.rooms.iter().filter(|r| r.is_active && !r.is_special && r.room_type.is_theory_capable()).count() as i64;
    let lab_room_count = snap.rooms.iter().filter(|r| r.is_active && !r.is_special && r.room_type == RoomType::Lab).count() as i64;
    for slot in &snap.slots {
        if let Some(terms) = theory_slot_terms.get(&slot.id) {
            let locked = locked_theory_count_at(problem, idx, slot.id);
            model.add_le(expr_sum(terms), LinearExpr::from((theory_room_count - locked).max(0)));
        }
        if let Some(terms) = lab_slot_terms.get(&slot.id) {
            let locked = locked_lab_count_at(problem, idx, slot.id);
            model.add_le(expr_sum(terms), LinearExpr::from((lab_room_count - locked).max(0)));
        }
    }

    // --- constraints 14/15: section compactness (hard gap bound + soft gap penalty) ---
    let mut objective_soft: Vec<(i64, BoolVar)> = Vec::new();
    for section in snap.sections.iter().filter(|s| s.is_active) {
        for &day in &DayOfWeek::ALL {
            let mut day_slots: Vec<&TimeSlot> = snap.slots.iter().filter(|s| s.day_of_week == day).collect();
            day_slots.sort_by_key(|s| s.slot_index);
            if day_slots.is_empty() {
                continue;
            }
            let locked_at: HashMap<SlotId, bool> = day_slots
                .iter()
                .map(|s| (s.id, problem.pre_entries.iter().any(|e| e.section_id == section.id && e.slot_id == s.id)))
                .collect();
            let occ_expr = |slot: &TimeSlot| -> LinearExpr {
                let mut expr = LinearExpr::from(0);
                if let Some(terms) = section_slot_terms.get(&(section.id, slot.id)) {
                    expr = expr + expr_sum(terms);
                }
                if *locked_at.get(&slot.id).unwrap_or(&false) {
                    expr = expr + LinearExpr::from(1);
                }
                expr
            };

            let n = day_slots.len();
            // hard: no pair i<j with gap (j-i-1) > MAX_GAP may both be occupied
            // while everything strictly between them is empty.
            for i in 0..n {
                for j in (i + 1)..n {
                    if j - i - 1 <= MAX_GAP as usize {
                        continue;
                    }
                    let mut between = LinearExpr::from(0);
                    for k in (i + 1)..j {
                        between = between + occ_expr(day_slots[k]);
                    }
                    model.add_le(occ_expr(day_slots[i]) + occ_expr(day_slots[j]) - between, LinearExpr::from(1));
                }
            }

            // soft: boolean prefix/suffix OR-accumulators, then per-position gap indicator.
            let mut prefix: Vec<BoolVar> = Vec::with_capacity(n);
            for i in 0..n {
                let p = model.new_bool_var();
                let occ = occ_expr(day_slots[i]);
                if i == 0 {
                    model.add_eq(LinearExpr::from(p.clone()), occ);
                } else {
                    let prev = prefix[i - 1].clone();
                    model.add_ge(LinearExpr::from(p.clone()), LinearExpr::from(prev.clone()));
                    model.add_ge(LinearExpr::from(p.clone()), occ.clone());
                    model.add_le(LinearExpr::from(p.clone()), LinearExpr::from(prev) + occ);
                }
                prefix.push(p);
            }
            let mut suffix: Vec<BoolVar> = vec![prefix[0].clone(); n];
            for i in (0..n).rev() {
                let occ = occ_expr(day_slots[i]);
                if i == n - 1 {
                    let s = model.new_bool_var();
                    model.add_eq(LinearExpr::from(s.clone()), occ);
                    suffix[i] = s;
                } else {
                    let next = suffix[i + 1].clone();
                    let s = model.new_bool_var();
                    model.add_ge(LinearExpr::from(s.clone()), LinearExpr::from(next.clone()));
                    model.add_ge(LinearExpr::from(s.clone()), occ.clone());
                    model.add_le(LinearExpr::from(s.clone()), LinearExpr::from(next) + occ);
                    suffix[i] = s;
                }
            }

            for i in 1..n.saturating_sub(1) {
                let gv = model.new_bool_var();
                let occ_i = occ_expr(day_slots[i]);
                let p = prefix[i - 1].clone();
                let s = suffix[i + 1].clone();
                model.add_le(LinearExpr::from(gv.clone()), LinearExpr::from(p.clone()));
                model.add_le(LinearExpr::from(gv.clone()), LinearExpr::from(s.clone()));
                model.add_le(LinearExpr::from(gv.clone()) + occ_i.clone(), LinearExpr::from(1));
                model.add_ge(
                    LinearExpr::from(gv.clone()),
                    LinearExpr::from(p) + LinearExpr::from(s) - occ_i - LinearExpr::from(1),
                );
                objective_soft.push((1, gv));
            }
        }
    }

    let objective = expr_sum(&objective_primary) + expr_sum(&objective_soft);
    model.minimize(objective);

    BuiltModel { model, vars, trivially_infeasible }
}
