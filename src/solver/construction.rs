//! First-fit construction heuristic.

use std::sync::atomic::AtomicBool;

use tracing::debug;

use super::termination::{Termination, TerminationReason};
use crate::constraints::calculate_score;
use crate::domain::Schedule;
use crate::score::HardSoftScore;

/// Result of a construction run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Construction {
    pub score: HardSoftScore,
    /// Candidate placements scored.
    pub moves: u64,
    /// Lessons that received an assignment.
    pub assigned: usize,
    /// Set when cancellation or the time limit stopped construction before
    /// every lesson was placed.
    pub interrupted: Option<TerminationReason>,
}

impl Construction {
    pub fn is_complete(&self) -> bool {
        self.interrupted.is_none()
    }
}

/// Assigns every unassigned, non-pinned lesson in list order to the
/// (timeslot, room) with the best resulting score. Ties keep the first value.
///
/// Partially assigned lessons are treated as unassigned. Returns early,
/// leaving the remaining lessons untouched, once `terminate` is raised or the
/// time limit of `termination` is spent.
pub fn construction_heuristic(
    schedule: &mut Schedule,
    termination: &Termination,
    terminate: &AtomicBool,
) -> Construction {
    let timeslot_count = schedule.timeslots.len();
    let room_count = schedule.rooms.len();
    let mut moves = 0;
    let mut assigned = 0;

    let pending: Vec<usize> = schedule
        .lessons
        .iter()
        .enumerate()
        .filter(|(_, l)| !l.pinned && !l.is_fully_assigned())
        .map(|(i, _)| i)
        .collect();

    if pending.is_empty() || timeslot_count == 0 || room_count == 0 {
        debug!(pending = pending.len(), "Nothing to construct");
        return Construction {
            score: calculate_score(schedule),
            moves,
            assigned,
            interrupted: None,
        };
    }

    for lesson in pending {
        if let Some(reason) = termination.check_time(terminate) {
            debug!(assigned, %reason, "Construction heuristic interrupted");
            return Construction {
                score: calculate_score(schedule),
                moves,
                assigned,
                interrupted: Some(reason),
            };
        }

        let mut best: Option<(HardSoftScore, usize, usize)> = None;
        for timeslot in 0..timeslot_count {
            for room in 0..room_count {
                let l = &mut schedule.lessons[lesson];
                l.timeslot = Some(timeslot);
                l.room = Some(room);
                let score = calculate_score(schedule);
                moves += 1;
                if best.map_or(true, |(best_score, _, _)| score > best_score) {
                    best = Some((score, timeslot, room));
                }
            }
        }

        if let Some((_, timeslot, room)) = best {
            let l = &mut schedule.lessons[lesson];
            l.timeslot = Some(timeslot);
            l.room = Some(room);
            assigned += 1;
        }
    }

    Construction {
        score: calculate_score(schedule),
        moves,
        assigned,
        interrupted: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TerminationConfig;
    use crate::domain::{Lesson, Room, Teacher, Timeslot};
    use chrono::{NaiveTime, Weekday};

    fn unlimited() -> Termination {
        Termination::new(&TerminationConfig {
            seconds_spent_limit: None,
            ..TerminationConfig::default()
        })
    }

    fn schedule(lessons: Vec<Lesson>) -> Schedule {
        let t = |h| NaiveTime::from_hms_opt(h, 0, 0).unwrap();
        Schedule::new(
            1,
            vec![
                Timeslot::new(1, Weekday::Mon, t(10), t(11)),
                Timeslot::new(2, Weekday::Mon, t(17), t(18)),
            ],
            vec![Room::new(1, "A", 20, false), Room::new(2, "B", 20, true)],
            vec![Teacher::new(1, "Anna"), Teacher::new(2, "Ben")],
            lessons,
        )
    }

    #[test]
    fn test_assigns_every_lesson() {
        let mut s = schedule(vec![Lesson::new(1, 0), Lesson::new(2, 0), Lesson::new(3, 1)]);
        let flag = AtomicBool::new(false);
        let result = construction_heuristic(&mut s, &unlimited(), &flag);

        assert!(result.is_complete());
        assert_eq!(result.assigned, 3);
        assert_eq!(result.moves, 12);
        assert!(s.is_fully_assigned());
        assert_eq!(result.score, calculate_score(&s));
        assert!(result.score.is_feasible());
    }

    #[test]
    fn test_first_lesson_takes_prime_time_first_room() {
        let mut s = schedule(vec![Lesson::new(1, 0)]);
        construction_heuristic(&mut s, &unlimited(), &AtomicBool::new(false));
        // Prime time slot wins, tie between rooms keeps the first
        assert_eq!(s.lessons[0].timeslot, Some(1));
        assert_eq!(s.lessons[0].room, Some(0));
    }

    #[test]
    fn test_pinned_untouched() {
        let mut s = schedule(vec![Lesson::new(1, 0).pinned_at(0, 1), Lesson::new(2, 1)]);
        let result = construction_heuristic(&mut s, &unlimited(), &AtomicBool::new(false));
        assert_eq!(result.assigned, 1);
        assert_eq!(s.lessons[0].timeslot, Some(0));
        assert_eq!(s.lessons[0].room, Some(1));
    }

    #[test]
    fn test_cancelled_before_start() {
        let mut s = schedule(vec![Lesson::new(1, 0), Lesson::new(2, 1)]);
        let result = construction_heuristic(&mut s, &unlimited(), &AtomicBool::new(true));
        assert_eq!(result.interrupted, Some(TerminationReason::Cancelled));
        assert_eq!(result.assigned, 0);
        assert_eq!(s.assigned_count(), 0);
    }

    #[test]
    fn test_spent_time_limit_stops_construction() {
        let mut s = schedule(vec![Lesson::new(1, 0), Lesson::new(2, 1)]);
        let termination = Termination::new(&TerminationConfig {
            seconds_spent_limit: None,
            millis_spent_limit: Some(0),
            ..TerminationConfig::default()
        });
        let result = construction_heuristic(&mut s, &termination, &AtomicBool::new(false));
        assert_eq!(result.interrupted, Some(TerminationReason::TimeLimit));
        assert_eq!(result.moves, 0);
        assert_eq!(s.assigned_count(), 0);
    }

    #[test]
    fn test_no_rooms_leaves_lessons_unassigned() {
        let mut s = schedule(vec![Lesson::new(1, 0)]);
        s.rooms.clear();
        let result = construction_heuristic(&mut s, &unlimited(), &AtomicBool::new(false));
        assert!(result.is_complete());
        assert_eq!(result.assigned, 0);
        assert!(!s.is_fully_assigned());
    }
}
