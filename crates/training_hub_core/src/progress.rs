//! crates/training_hub_core/src/progress.rs
//!
//! Completion metrics derived from assignment records. Every function here is
//! pure; callers scope the input to a trainee, instructor or module first.

use crate::domain::{Assignment, Module};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Completion totals for one aggregation key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressStats {
    pub total: usize,
    pub completed: usize,
    pub percentage: u8,
}

impl ProgressStats {
    pub fn from_counts(total: usize, completed: usize) -> Self {
        Self {
            total,
            completed,
            percentage: rounded_percentage(completed, total),
        }
    }

    fn record(&mut self, assignment: &Assignment) {
        self.total += 1;
        if assignment.is_completed() {
            self.completed += 1;
        }
        self.percentage = rounded_percentage(self.completed, self.total);
    }
}

/// `part / whole` as a whole percentage, rounding halves up. An empty `whole`
/// yields 0.
pub fn rounded_percentage(part: usize, whole: usize) -> u8 {
    if whole == 0 {
        return 0;
    }
    let part = part.min(whole) as u128;
    let whole = whole as u128;
    // floor((200 * part + whole) / (2 * whole)) == floor(100 * part / whole + 1/2)
    ((200 * part + whole) / (2 * whole)) as u8
}

/// Stats over every supplied assignment.
pub fn overall_progress(assignments: &[Assignment]) -> ProgressStats {
    let completed = assignments.iter().filter(|a| a.is_completed()).count();
    ProgressStats::from_counts(assignments.len(), completed)
}

/// Stats keyed by trainee id, with one entry per supplied trainee.
///
/// Trainees without assignments report zeros; assignments for trainees not in
/// `trainee_ids` are ignored.
pub fn progress_by_trainee(
    trainee_ids: &[Uuid],
    assignments: &[Assignment],
) -> BTreeMap<Uuid, ProgressStats> {
    let mut by_trainee: BTreeMap<Uuid, ProgressStats> = trainee_ids
        .iter()
        .map(|id| (*id, ProgressStats::default()))
        .collect();
    for assignment in assignments {
        if let Some(stats) = by_trainee.get_mut(&assignment.trainee_id) {
            stats.record(assignment);
        }
    }
    by_trainee
}

/// Stats keyed by module id, with one entry per supplied module.
///
/// Modules without assignments report zeros; assignments whose module is not in
/// `modules` are ignored.
pub fn progress_by_module(
    modules: &[Module],
    assignments: &[Assignment],
) -> BTreeMap<Uuid, ProgressStats> {
    let mut by_module: BTreeMap<Uuid, ProgressStats> = modules
        .iter()
        .map(|m| (m.id, ProgressStats::default()))
        .collect();
    for assignment in assignments {
        if let Some(stats) = by_module.get_mut(&assignment.module_id) {
            stats.record(assignment);
        }
    }
    by_module
}

/// Counts of assignments per completion state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusDistribution {
    pub completed: usize,
    pub not_started: usize,
}

/// Dashboard summary for a set of trainees, modules and assignments.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressOverview {
    pub overall: ProgressStats,
    pub distribution: StatusDistribution,
    pub total_trainees: usize,
    /// Trainees with at least one assignment.
    pub active_trainees: usize,
    pub total_modules: usize,
    /// Mean of the per-trainee percentages over every trainee, rounded half up.
    pub average_trainee_percentage: u8,
    /// Mean of recorded scores; `None` when nothing has been scored.
    pub average_score: Option<f64>,
}

pub fn progress_overview(
    trainee_ids: &[Uuid],
    modules: &[Module],
    assignments: &[Assignment],
) -> ProgressOverview {
    let overall = overall_progress(assignments);
    let by_trainee = progress_by_trainee(trainee_ids, assignments);

    let percentage_sum: usize = by_trainee.values().map(|s| usize::from(s.percentage)).sum();
    let active_trainees = by_trainee.values().filter(|s| s.total > 0).count();

    ProgressOverview {
        overall,
        distribution: StatusDistribution {
            completed: overall.completed,
            not_started: overall.total - overall.completed,
        },
        total_trainees: by_trainee.len(),
        active_trainees,
        total_modules: modules.len(),
        average_trainee_percentage: rounded_mean(percentage_sum, by_trainee.len()),
        average_score: average_score(assignments),
    }
}

/// Arithmetic mean of the recorded scores.
pub fn average_score(assignments: &[Assignment]) -> Option<f64> {
    let scores: Vec<i32> = assignments.iter().filter_map(|a| a.score).collect();
    if scores.is_empty() {
        return None;
    }
    let sum: i64 = scores.iter().map(|s| i64::from(*s)).sum();
    Some(sum as f64 / scores.len() as f64)
}

fn rounded_mean(sum: usize, count: usize) -> u8 {
    if count == 0 {
        return 0;
    }
    let (sum, count) = (sum as u128, count as u128);
    ((2 * sum + count) / (2 * count)) as u8
}
