//! Constraint definitions for the dance school timetable.
//!
//! Every constraint is a plain function from a [`Schedule`] to the score it
//! contributes, so each one can be evaluated and tested on its own.
//!
//! # Constraints
//!
//! - **Room conflict** (hard): group lessons fill a room, up to four private
//!   lessons may share one
//! - **Teacher conflict** (hard): a teacher teaches one lesson per timeslot
//! - **Teacher unavailability** (hard): no lessons in blocked slots
//! - **Minimize teacher gaps** (soft): idle minutes between a teacher's lessons
//! - **Reward prime time usage** (soft): lessons starting 16:00-21:00
//! - **Balance teacher workload** (soft): quadratic penalty per teacher
//!
//! Only fully assigned lessons (timeslot and room) take part in any
//! constraint. Unassigned lessons are reported through
//! [`Schedule::is_fully_assigned`] instead of the score.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::{Lesson, Schedule, Timeslot};
use crate::score::HardSoftScore;

/// Room capacity in occupancy units; see [`Lesson::occupancy_weight`].
pub const ROOM_CAPACITY_UNITS: i64 = 100;

/// Prime time starts at 16:00 (inclusive).
pub const PRIME_TIME_START_MINUTE: i64 = 16 * 60;

/// Prime time ends at 21:00 (exclusive).
pub const PRIME_TIME_END_MINUTE: i64 = 21 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintLevel {
    Hard,
    Soft,
}

/// Score contribution of one constraint on one schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConstraintMatchTotal {
    pub score: HardSoftScore,
    pub match_count: usize,
}

impl ConstraintMatchTotal {
    fn penalize_hard(&mut self, weight: i64) {
        self.score += HardSoftScore::of_hard(-weight);
        self.match_count += 1;
    }

    fn penalize_soft(&mut self, weight: i64) {
        self.score += HardSoftScore::of_soft(-weight);
        self.match_count += 1;
    }

    fn reward_soft(&mut self, weight: i64) {
        self.score += HardSoftScore::of_soft(weight);
        self.match_count += 1;
    }
}

/// A named, independently evaluable scoring term.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleConstraint {
    pub name: &'static str,
    pub level: ConstraintLevel,
    evaluate: fn(&Schedule) -> ConstraintMatchTotal,
}

impl ScheduleConstraint {
    pub fn evaluate(&self, schedule: &Schedule) -> ConstraintMatchTotal {
        (self.evaluate)(schedule)
    }
}

/// Returns every constraint of the timetable, hard ones first.
pub fn define_constraints() -> [ScheduleConstraint; 6] {
    [
        ScheduleConstraint {
            name: "Room conflict (Dual-Mode weighted)",
            level: ConstraintLevel::Hard,
            evaluate: room_conflict,
        },
        ScheduleConstraint {
            name: "Teacher conflict",
            level: ConstraintLevel::Hard,
            evaluate: teacher_conflict,
        },
        ScheduleConstraint {
            name: "Teacher unavailability",
            level: ConstraintLevel::Hard,
            evaluate: teacher_availability,
        },
        ScheduleConstraint {
            name: "Minimize teacher gaps",
            level: ConstraintLevel::Soft,
            evaluate: minimize_teacher_gaps,
        },
        ScheduleConstraint {
            name: "Reward prime time usage",
            level: ConstraintLevel::Soft,
            evaluate: reward_prime_time,
        },
        ScheduleConstraint {
            name: "Balance teacher workload",
            level: ConstraintLevel::Soft,
            evaluate: balance_teacher_load,
        },
    ]
}

/// Calculates the full score of a schedule.
///
/// # Examples
///
/// ```
/// use chrono::{NaiveTime, Weekday};
/// use dance_timetable::constraints::calculate_score;
/// use dance_timetable::domain::{Lesson, Room, Schedule, Teacher, Timeslot};
/// use dance_timetable::score::HardSoftScore;
///
/// let t = |h| NaiveTime::from_hms_opt(h, 0, 0).unwrap();
/// let schedule = Schedule::new(
///     1,
///     vec![Timeslot::new(1, Weekday::Mon, t(17), t(18))],
///     vec![Room::new(1, "Studio A", 20, false)],
///     vec![Teacher::new(1, "Anna")],
///     vec![Lesson::new(1, 0).assigned_at(0, 0)],
/// );
///
/// // +1 prime time, -1 workload for a single lesson
/// assert_eq!(calculate_score(&schedule), HardSoftScore::of(0, 0));
/// ```
pub fn calculate_score(schedule: &Schedule) -> HardSoftScore {
    define_constraints()
        .iter()
        .map(|c| c.evaluate(schedule).score)
        .sum()
}

/// Analysis of a single constraint's contribution to the score.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintAnalysis {
    pub name: String,
    pub level: ConstraintLevel,
    pub score: HardSoftScore,
    pub match_count: usize,
}

/// Result of analyzing a schedule's constraints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreAnalysis {
    pub score: HardSoftScore,
    pub constraints: Vec<ConstraintAnalysis>,
}

/// Breaks the score of a schedule down per constraint.
pub fn analyze(schedule: &Schedule) -> ScoreAnalysis {
    let constraints: Vec<ConstraintAnalysis> = define_constraints()
        .iter()
        .map(|c| {
            let total = c.evaluate(schedule);
            ConstraintAnalysis {
                name: c.name.to_string(),
                level: c.level,
                score: total.score,
                match_count: total.match_count,
            }
        })
        .collect();

    ScoreAnalysis {
        score: constraints.iter().map(|c| c.score).sum(),
        constraints,
    }
}

// ============================================================================
// Hard constraints
// ============================================================================

/// Penalizes every (room, timeslot) whose occupancy exceeds the room capacity
/// by the number of excess units.
pub fn room_conflict(schedule: &Schedule) -> ConstraintMatchTotal {
    let mut occupancy: HashMap<(usize, usize), i64> = HashMap::new();
    for lesson in assigned(schedule) {
        if let (Some(room), Some(timeslot)) = (lesson.room, lesson.timeslot) {
            *occupancy.entry((room, timeslot)).or_insert(0) += lesson.occupancy_weight();
        }
    }

    let mut total = ConstraintMatchTotal::default();
    for load in occupancy.into_values() {
        if load > ROOM_CAPACITY_UNITS {
            total.penalize_hard(load - ROOM_CAPACITY_UNITS);
        }
    }
    total
}

/// Penalizes each pair of lessons taught by the same teacher in the same timeslot.
pub fn teacher_conflict(schedule: &Schedule) -> ConstraintMatchTotal {
    let mut per_slot: HashMap<(usize, usize), usize> = HashMap::new();
    for lesson in assigned(schedule) {
        if let Some(timeslot) = lesson.timeslot {
            *per_slot.entry((lesson.teacher, timeslot)).or_insert(0) += 1;
        }
    }

    let mut total = ConstraintMatchTotal::default();
    for count in per_slot.into_values() {
        for _ in 0..pair_count(count) {
            total.penalize_hard(1);
        }
    }
    total
}

/// Penalizes each lesson placed in a slot its teacher marked as unavailable.
pub fn teacher_availability(schedule: &Schedule) -> ConstraintMatchTotal {
    let mut blocked: HashMap<(usize, usize), usize> = HashMap::new();
    for u in &schedule.unavailabilities {
        *blocked.entry((u.teacher, u.timeslot)).or_insert(0) += 1;
    }

    let mut total = ConstraintMatchTotal::default();
    if blocked.is_empty() {
        return total;
    }
    for lesson in assigned(schedule) {
        if let Some(timeslot) = lesson.timeslot {
            let matches = blocked.get(&(lesson.teacher, timeslot)).copied().unwrap_or(0);
            for _ in 0..matches {
                total.penalize_hard(1);
            }
        }
    }
    total
}

// ============================================================================
// Soft constraints
// ============================================================================

/// Penalizes the idle minutes between each pair of a teacher's lessons on the
/// same weekday.
///
/// The penalty is summed pairwise: three lessons at 09:00, 11:00 and 13:00
/// cost the 09-11 gap, the 11-13 gap and the 09-13 gap.
pub fn minimize_teacher_gaps(schedule: &Schedule) -> ConstraintMatchTotal {
    let mut total = ConstraintMatchTotal::default();
    for lessons in by_teacher(schedule).into_values() {
        let slots: Vec<&Timeslot> = lessons
            .iter()
            .filter_map(|l| schedule.timeslot_of(l))
            .collect();
        for (i, a) in slots.iter().enumerate() {
            for b in &slots[i + 1..] {
                if a.day_of_week != b.day_of_week {
                    continue;
                }
                if let Some(gap) = gap_minutes(a, b) {
                    total.penalize_soft(gap);
                }
            }
        }
    }
    total
}

/// Rewards every lesson starting in [16:00, 21:00).
pub fn reward_prime_time(schedule: &Schedule) -> ConstraintMatchTotal {
    let mut total = ConstraintMatchTotal::default();
    for lesson in assigned(schedule) {
        if let Some(ts) = schedule.timeslot_of(lesson) {
            if is_prime_time(ts) {
                total.reward_soft(1);
            }
        }
    }
    total
}

/// Penalizes each teacher by the square of their assigned lesson count.
pub fn balance_teacher_load(schedule: &Schedule) -> ConstraintMatchTotal {
    let mut total = ConstraintMatchTotal::default();
    for lessons in by_teacher(schedule).into_values() {
        let n = lessons.len() as i64;
        total.penalize_soft(n * n);
    }
    total
}

// ============================================================================
// Helper functions
// ============================================================================

#[inline]
fn assigned(schedule: &Schedule) -> impl Iterator<Item = &Lesson> {
    schedule.lessons.iter().filter(|l| l.is_fully_assigned())
}

fn by_teacher(schedule: &Schedule) -> HashMap<usize, Vec<&Lesson>> {
    let mut groups: HashMap<usize, Vec<&Lesson>> = HashMap::new();
    for lesson in assigned(schedule) {
        groups.entry(lesson.teacher).or_default().push(lesson);
    }
    groups
}

#[inline]
fn pair_count(n: usize) -> usize {
    n * n.saturating_sub(1) / 2
}

/// Minutes between the end of the earlier slot and the start of the later
/// one, or `None` when the slots touch or overlap.
#[inline]
pub fn gap_minutes(a: &Timeslot, b: &Timeslot) -> Option<i64> {
    if a.end_time < b.start_time {
        Some(b.start_minute() - a.end_minute())
    } else if b.end_time < a.start_time {
        Some(a.start_minute() - b.end_minute())
    } else {
        None
    }
}

#[inline]
pub fn is_prime_time(ts: &Timeslot) -> bool {
    (PRIME_TIME_START_MINUTE..PRIME_TIME_END_MINUTE).contains(&ts.start_minute())
}
