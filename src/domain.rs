//! Domain model for the dance school timetable.
//!
//! Problem facts ([`Timeslot`], [`Room`], [`Teacher`], [`Unavailability`],
//! [`DanceStyle`], [`DanceGroup`]) are immutable during a solve. The single
//! planning entity is [`Lesson`], whose `timeslot` and `room` fields are
//! assigned by the solver.
//!
//! Inside a [`Schedule`] every reference is an index into the corresponding
//! fact list, so scoring never clones or hashes strings.

use chrono::{NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::score::HardSoftScore;

/// Identifier of a solving session, chosen by the caller.
pub type ProblemId = u64;

/// A weekly time slot, e.g. Monday 18:00-19:00.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeslot {
    pub id: u64,
    pub day_of_week: Weekday,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl PartialEq for Timeslot {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Timeslot {}

impl std::hash::Hash for Timeslot {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Timeslot {
    pub fn new(id: u64, day_of_week: Weekday, start_time: NaiveTime, end_time: NaiveTime) -> Self {
        Self {
            id,
            day_of_week,
            start_time,
            end_time,
        }
    }

    /// Minutes since midnight of the start time.
    pub fn start_minute(&self) -> i64 {
        i64::from(self.start_time.num_seconds_from_midnight() / 60)
    }

    /// Minutes since midnight of the end time.
    pub fn end_minute(&self) -> i64 {
        i64::from(self.end_time.num_seconds_from_midnight() / 60)
    }
}

impl fmt::Display for Timeslot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}-{}",
            self.day_of_week,
            self.start_time.format("%H:%M"),
            self.end_time.format("%H:%M")
        )
    }
}

/// A studio room.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: u64,
    pub name: String,
    pub capacity: u32,
    #[serde(default)]
    pub allows_parallel_private: bool,
}

impl Room {
    pub fn new(id: u64, name: impl Into<String>, capacity: u32, allows_parallel_private: bool) -> Self {
        Self {
            id,
            name: name.into(),
            capacity,
            allows_parallel_private,
        }
    }
}

/// A dance style a teacher can be qualified for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DanceStyle {
    pub id: u64,
    pub name: String,
}

impl DanceStyle {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// A teacher. Only the fields that matter for scheduling are modelled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: u64,
    pub full_name: String,
    pub max_daily_hours: u32,
    /// Ids of the dance styles this teacher is qualified for.
    #[serde(default)]
    pub dance_styles: BTreeSet<u64>,
    pub color_code: String,
}

impl Teacher {
    pub const DEFAULT_MAX_DAILY_HOURS: u32 = 8;

    pub fn new(id: u64, full_name: impl Into<String>) -> Self {
        Self {
            id,
            full_name: full_name.into(),
            max_daily_hours: Self::DEFAULT_MAX_DAILY_HOURS,
            dance_styles: BTreeSet::new(),
            color_code: "#000000".to_string(),
        }
    }

    pub fn with_styles(mut self, styles: impl IntoIterator<Item = u64>) -> Self {
        self.dance_styles.extend(styles);
        self
    }

    pub fn with_max_daily_hours(mut self, hours: u32) -> Self {
        self.max_daily_hours = hours;
        self
    }

    pub fn is_qualified_for(&self, style_id: u64) -> bool {
        self.dance_styles.contains(&style_id)
    }
}

/// A slot in which a teacher cannot teach.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unavailability {
    /// Index into `Schedule::teachers`.
    pub teacher: usize,
    /// Index into `Schedule::timeslots`.
    pub timeslot: usize,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DanceLevel {
    Beginner,
    Intermediate,
    Advanced,
    Open,
}

impl std::str::FromStr for DanceLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BEGINNER" => Ok(DanceLevel::Beginner),
            "INTERMEDIATE" => Ok(DanceLevel::Intermediate),
            "ADVANCED" => Ok(DanceLevel::Advanced),
            "OPEN" => Ok(DanceLevel::Open),
            _ => Err(()),
        }
    }
}

/// A group of students attending the same class.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DanceGroup {
    pub id: u64,
    pub name: String,
    /// Index into `Schedule::dance_styles`.
    pub style: Option<usize>,
    pub level: Option<DanceLevel>,
}

impl DanceGroup {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            style: None,
            level: None,
        }
    }
}

/// A recurring lesson that needs a timeslot and a room.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: u64,
    /// Index into `Schedule::teachers`. Fixed, never searched.
    pub teacher: usize,
    /// Index into `Schedule::dance_groups`. Fixed, never searched.
    pub group: Option<usize>,
    pub duration_minutes: u32,
    pub private: bool,
    pub pinned: bool,
    /// Index into `Schedule::timeslots`.
    pub timeslot: Option<usize>,
    /// Index into `Schedule::rooms`.
    pub room: Option<usize>,
}

impl Lesson {
    pub const MIN_DURATION_MINUTES: u32 = 15;
    pub const DEFAULT_DURATION_MINUTES: u32 = 60;

    pub fn new(id: u64, teacher: usize) -> Self {
        Self {
            id,
            teacher,
            group: None,
            duration_minutes: Self::DEFAULT_DURATION_MINUTES,
            private: false,
            pinned: false,
            timeslot: None,
            room: None,
        }
    }

    pub fn with_group(mut self, group: usize) -> Self {
        self.group = Some(group);
        self
    }

    pub fn with_private(mut self, private: bool) -> Self {
        self.private = private;
        self
    }

    pub fn with_duration(mut self, minutes: u32) -> Self {
        self.duration_minutes = minutes;
        self
    }

    /// Assigns the lesson and pins it in place.
    pub fn pinned_at(mut self, timeslot: usize, room: usize) -> Self {
        self.timeslot = Some(timeslot);
        self.room = Some(room);
        self.pinned = true;
        self
    }

    pub fn assigned_at(mut self, timeslot: usize, room: usize) -> Self {
        self.timeslot = Some(timeslot);
        self.room = Some(room);
        self
    }

    pub fn is_fully_assigned(&self) -> bool {
        self.timeslot.is_some() && self.room.is_some()
    }

    /// Two lessons are concurrent when they share a timeslot.
    pub fn is_concurrent_with(&self, other: &Lesson) -> bool {
        self.timeslot.is_some() && self.timeslot == other.timeslot
    }

    /// Capacity units this lesson occupies in its room.
    pub fn occupancy_weight(&self) -> i64 {
        if self.private {
            25
        } else {
            100
        }
    }
}

/// A referential integrity problem found by [`Schedule::validate`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntegrityViolation {
    pub lesson_id: Option<u64>,
    pub detail: String,
}

impl fmt::Display for IntegrityViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.lesson_id {
            Some(id) => write!(f, "lesson {}: {}", id, self.detail),
            None => f.write_str(&self.detail),
        }
    }
}

/// The planning solution: all facts plus the lessons to assign.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub id: ProblemId,
    pub timeslots: Vec<Timeslot>,
    pub rooms: Vec<Room>,
    pub teachers: Vec<Teacher>,
    #[serde(default)]
    pub unavailabilities: Vec<Unavailability>,
    #[serde(default)]
    pub dance_styles: Vec<DanceStyle>,
    #[serde(default)]
    pub dance_groups: Vec<DanceGroup>,
    pub lessons: Vec<Lesson>,
    #[serde(default)]
    pub score: Option<HardSoftScore>,
}

impl Schedule {
    pub fn new(
        id: ProblemId,
        timeslots: Vec<Timeslot>,
        rooms: Vec<Room>,
        teachers: Vec<Teacher>,
        lessons: Vec<Lesson>,
    ) -> Self {
        Self {
            id,
            timeslots,
            rooms,
            teachers,
            unavailabilities: Vec::new(),
            dance_styles: Vec::new(),
            dance_groups: Vec::new(),
            lessons,
            score: None,
        }
    }

    pub fn with_unavailabilities(mut self, unavailabilities: Vec<Unavailability>) -> Self {
        self.unavailabilities = unavailabilities;
        self
    }

    pub fn with_dance_groups(mut self, styles: Vec<DanceStyle>, groups: Vec<DanceGroup>) -> Self {
        self.dance_styles = styles;
        self.dance_groups = groups;
        self
    }

    /// Returns true when every lesson has both a timeslot and a room.
    pub fn is_fully_assigned(&self) -> bool {
        self.lessons.iter().all(Lesson::is_fully_assigned)
    }

    pub fn assigned_count(&self) -> usize {
        self.lessons.iter().filter(|l| l.is_fully_assigned()).count()
    }

    /// Indices of lessons the solver is allowed to move.
    pub fn movable_lessons(&self) -> Vec<usize> {
        self.lessons
            .iter()
            .enumerate()
            .filter(|(_, l)| !l.pinned)
            .map(|(i, _)| i)
            .collect()
    }

    /// Clears the planning variables of every non-pinned lesson.
    pub fn clear_unpinned(&mut self) {
        for lesson in self.lessons.iter_mut().filter(|l| !l.pinned) {
            lesson.timeslot = None;
            lesson.room = None;
        }
        self.score = None;
    }

    pub fn timeslot_of(&self, lesson: &Lesson) -> Option<&Timeslot> {
        lesson.timeslot.and_then(|idx| self.timeslots.get(idx))
    }

    pub fn room_of(&self, lesson: &Lesson) -> Option<&Room> {
        lesson.room.and_then(|idx| self.rooms.get(idx))
    }

    /// Checks that every index stored in the schedule points into its list.
    pub fn validate(&self) -> Result<(), IntegrityViolation> {
        for lesson in &self.lessons {
            let violation = |detail: String| IntegrityViolation {
                lesson_id: Some(lesson.id),
                detail,
            };
            if lesson.teacher >= self.teachers.len() {
                return Err(violation(format!("teacher index {} out of range", lesson.teacher)));
            }
            if let Some(group) = lesson.group {
                if group >= self.dance_groups.len() {
                    return Err(violation(format!("group index {} out of range", group)));
                }
            }
            if let Some(ts) = lesson.timeslot {
                if ts >= self.timeslots.len() {
                    return Err(violation(format!("timeslot index {} out of range", ts)));
                }
            }
            if let Some(room) = lesson.room {
                if room >= self.rooms.len() {
                    return Err(violation(format!("room index {} out of range", room)));
                }
            }
        }
        for (i, u) in self.unavailabilities.iter().enumerate() {
            if u.teacher >= self.teachers.len() || u.timeslot >= self.timeslots.len() {
                return Err(IntegrityViolation {
                    lesson_id: None,
                    detail: format!("unavailability {} references a missing fact", i),
                });
            }
        }
        Ok(())
    }
}
