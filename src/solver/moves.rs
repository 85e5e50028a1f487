//! Moves over lesson assignments and the selector that enumerates them.
//!
//! A [`LessonMove`] is applied in place and returns an [`Undo`] record, so a
//! candidate can be scored and reverted without cloning the schedule.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::domain::Schedule;

/// An atomic, reversible change to lesson assignments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LessonMove {
    /// Put one lesson in the given timeslot and room.
    Change {
        lesson: usize,
        timeslot: usize,
        room: usize,
    },
    /// Exchange the (timeslot, room) pairs of two lessons.
    Swap { left: usize, right: usize },
}

/// Restores the assignments a move overwrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Undo {
    Change {
        lesson: usize,
        timeslot: Option<usize>,
        room: Option<usize>,
    },
    Swap { left: usize, right: usize },
}

impl Undo {
    pub fn apply(self, schedule: &mut Schedule) {
        match self {
            Undo::Change {
                lesson,
                timeslot,
                room,
            } => {
                let l = &mut schedule.lessons[lesson];
                l.timeslot = timeslot;
                l.room = room;
            }
            Undo::Swap { left, right } => swap_assignments(schedule, left, right),
        }
    }
}

impl LessonMove {
    /// Returns true if the move references live, non-pinned lessons and
    /// existing facts, and would change at least one assignment.
    pub fn is_doable(&self, schedule: &Schedule) -> bool {
        match *self {
            LessonMove::Change {
                lesson,
                timeslot,
                room,
            } => {
                let Some(l) = schedule.lessons.get(lesson) else {
                    return false;
                };
                !l.pinned
                    && timeslot < schedule.timeslots.len()
                    && room < schedule.rooms.len()
                    && (l.timeslot, l.room) != (Some(timeslot), Some(room))
            }
            LessonMove::Swap { left, right } => {
                if left == right {
                    return false;
                }
                match (schedule.lessons.get(left), schedule.lessons.get(right)) {
                    (Some(a), Some(b)) => {
                        !a.pinned && !b.pinned && (a.timeslot, a.room) != (b.timeslot, b.room)
                    }
                    _ => false,
                }
            }
        }
    }

    /// Applies the move. Callers must check [`is_doable`](Self::is_doable) first.
    pub fn do_move(&self, schedule: &mut Schedule) -> Undo {
        match *self {
            LessonMove::Change {
                lesson,
                timeslot,
                room,
            } => {
                let l = &mut schedule.lessons[lesson];
                let undo = Undo::Change {
                    lesson,
                    timeslot: l.timeslot,
                    room: l.room,
                };
                l.timeslot = Some(timeslot);
                l.room = Some(room);
                undo
            }
            LessonMove::Swap { left, right } => {
                swap_assignments(schedule, left, right);
                Undo::Swap { left, right }
            }
        }
    }
}

fn swap_assignments(schedule: &mut Schedule, left: usize, right: usize) {
    let (ts, room) = {
        let l = &schedule.lessons[left];
        (l.timeslot, l.room)
    };
    let r = &schedule.lessons[right];
    let (other_ts, other_room) = (r.timeslot, r.room);

    schedule.lessons[left].timeslot = other_ts;
    schedule.lessons[left].room = other_room;
    schedule.lessons[right].timeslot = ts;
    schedule.lessons[right].room = room;
}

/// Produces randomized passes over the full move neighbourhood.
///
/// Each pass yields every change move (movable lesson × timeslot × room) and
/// every swap pair of movable lessons exactly once, so no assignment reachable
/// by a single move is ever skipped. Only the order is random.
#[derive(Debug)]
pub struct MoveSelector {
    rng: StdRng,
}

impl MoveSelector {
    pub fn new(rng: StdRng) -> Self {
        Self { rng }
    }

    /// Starts a new pass over the moves of `schedule`.
    pub fn pass(&mut self, schedule: &Schedule) -> MovePass {
        let mut lessons = schedule.movable_lessons();
        lessons.shuffle(&mut self.rng);

        let room_count = schedule.rooms.len();
        let value_count = schedule.timeslots.len() * room_count;
        let offsets = if value_count == 0 {
            vec![0; lessons.len()]
        } else {
            (0..lessons.len())
                .map(|_| self.rng.gen_range(0..value_count))
                .collect()
        };

        MovePass {
            lessons,
            offsets,
            room_count,
            value_count,
            change_step: 0,
            change_entity: 0,
            swap_left: 0,
            swap_right: 1,
            prefer_swap: false,
        }
    }
}

/// One lazy pass of moves, created by [`MoveSelector::pass`].
#[derive(Debug)]
pub struct MovePass {
    lessons: Vec<usize>,
    offsets: Vec<usize>,
    room_count: usize,
    value_count: usize,
    change_step: usize,
    change_entity: usize,
    swap_left: usize,
    swap_right: usize,
    prefer_swap: bool,
}

impl MovePass {
    /// Total number of moves this pass will yield.
    pub fn len(&self) -> usize {
        let n = self.lessons.len();
        n * self.value_count + n * n.saturating_sub(1) / 2
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn next_change(&mut self) -> Option<LessonMove> {
        if self.lessons.is_empty() || self.change_step >= self.value_count {
            return None;
        }
        let entity = self.change_entity;
        let value = (self.offsets[entity] + self.change_step) % self.value_count;

        // Walk every lesson at this step before advancing the value.
        self.change_entity += 1;
        if self.change_entity == self.lessons.len() {
            self.change_entity = 0;
            self.change_step += 1;
        }

        Some(LessonMove::Change {
            lesson: self.lessons[entity],
            timeslot: value / self.room_count,
            room: value % self.room_count,
        })
    }

    fn next_swap(&mut self) -> Option<LessonMove> {
        if self.swap_right >= self.lessons.len() {
            return None;
        }
        let mv = LessonMove::Swap {
            left: self.lessons[self.swap_left],
            right: self.lessons[self.swap_right],
        };
        self.swap_right += 1;
        if self.swap_right == self.lessons.len() {
            self.swap_left += 1;
            self.swap_right = self.swap_left + 1;
        }
        Some(mv)
    }
}

impl Iterator for MovePass {
    type Item = LessonMove;

    fn next(&mut self) -> Option<Self::Item> {
        self.prefer_swap = !self.prefer_swap;
        if self.prefer_swap {
            self.next_swap().or_else(|| self.next_change())
        } else {
            self.next_change().or_else(|| self.next_swap())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::calculate_score;
    use crate::domain::{Lesson, Room, Teacher, Timeslot};
    use chrono::{NaiveTime, Weekday};
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn schedule() -> Schedule {
        let t = |h| NaiveTime::from_hms_opt(h, 0, 0).unwrap();
        Schedule::new(
            1,
            vec![
                Timeslot::new(1, Weekday::Mon, t(9), t(10)),
                Timeslot::new(2, Weekday::Mon, t(12), t(13)),
                Timeslot::new(3, Weekday::Tue, t(17), t(18)),
            ],
            vec![Room::new(1, "A", 20, false), Room::new(2, "B", 10, true)],
            vec![Teacher::new(1, "Anna"), Teacher::new(2, "Ben")],
            vec![
                Lesson::new(1, 0).assigned_at(0, 0),
                Lesson::new(2, 0).assigned_at(1, 1),
                Lesson::new(3, 1).with_private(true).assigned_at(2, 1),
                Lesson::new(4, 1).pinned_at(0, 1),
            ],
        )
    }

    #[test]
    fn test_change_and_undo() {
        let mut s = schedule();
        let mv = LessonMove::Change {
            lesson: 0,
            timeslot: 2,
            room: 1,
        };
        assert!(mv.is_doable(&s));
        let undo = mv.do_move(&mut s);
        assert_eq!((s.lessons[0].timeslot, s.lessons[0].room), (Some(2), Some(1)));
        undo.apply(&mut s);
        assert_eq!((s.lessons[0].timeslot, s.lessons[0].room), (Some(0), Some(0)));
    }

    #[test]
    fn test_swap_round_trip_restores_score() {
        let mut s = schedule();
        let before = calculate_score(&s);
        let mv = LessonMove::Swap { left: 0, right: 2 };
        assert!(mv.is_doable(&s));

        mv.do_move(&mut s);
        assert_eq!(s.lessons[0].timeslot, Some(2));
        assert_eq!(s.lessons[2].timeslot, Some(0));
        mv.do_move(&mut s);

        assert_eq!(calculate_score(&s), before);
        assert_eq!(s.lessons, schedule().lessons);
    }

    #[test]
    fn test_pinned_and_stale_moves_not_doable() {
        let s = schedule();
        assert!(!LessonMove::Change { lesson: 3, timeslot: 2, room: 0 }.is_doable(&s));
        assert!(!LessonMove::Swap { left: 0, right: 3 }.is_doable(&s));
        assert!(!LessonMove::Change { lesson: 9, timeslot: 0, room: 0 }.is_doable(&s));
        assert!(!LessonMove::Change { lesson: 0, timeslot: 5, room: 0 }.is_doable(&s));
        assert!(!LessonMove::Change { lesson: 0, timeslot: 0, room: 4 }.is_doable(&s));
        assert!(!LessonMove::Swap { left: 1, right: 1 }.is_doable(&s));
        // No-op change
        assert!(!LessonMove::Change { lesson: 0, timeslot: 0, room: 0 }.is_doable(&s));
    }

    #[test]
    fn test_pass_covers_whole_neighbourhood_once() {
        let s = schedule();
        let mut selector = MoveSelector::new(StdRng::seed_from_u64(3));
        let pass = selector.pass(&s);
        // 3 movable lessons × 6 values + 3 swap pairs
        assert_eq!(pass.len(), 21);

        let moves: Vec<LessonMove> = pass.collect();
        assert_eq!(moves.len(), 21);
        let unique: HashSet<String> = moves.iter().map(|m| format!("{:?}", m)).collect();
        assert_eq!(unique.len(), 21);

        for lesson in 0..3 {
            for timeslot in 0..3 {
                for room in 0..2 {
                    assert!(moves.contains(&LessonMove::Change { lesson, timeslot, room }));
                }
            }
        }
        assert!(moves.iter().all(|m| match *m {
            LessonMove::Change { lesson, .. } => lesson != 3,
            LessonMove::Swap { left, right } => left != 3 && right != 3,
        }));
    }

    #[test]
    fn test_pass_order_is_randomized_per_pass() {
        let s = schedule();
        let mut selector = MoveSelector::new(StdRng::seed_from_u64(11));
        let first: Vec<LessonMove> = selector.pass(&s).collect();
        let passes: Vec<Vec<LessonMove>> = (0..5).map(|_| selector.pass(&s).collect()).collect();
        assert!(passes.iter().any(|p| *p != first));
    }

    #[test]
    fn test_empty_value_range_yields_only_swaps() {
        let mut s = schedule();
        s.rooms.clear();
        let mut selector = MoveSelector::new(StdRng::seed_from_u64(0));
        let moves: Vec<LessonMove> = selector.pass(&s).collect();
        assert_eq!(moves.len(), 3);
        assert!(moves.iter().all(|m| matches!(m, LessonMove::Swap { .. })));
    }
}
