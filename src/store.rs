//! Storage collaborator for the solver.
//!
//! The repository keeps timetable rows keyed by stable ids. Loading builds a
//! [`Schedule`] whose references are list positions; saving maps positions
//! back to ids.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::{
    DanceGroup, DanceLevel, DanceStyle, Lesson, ProblemId, Room, Schedule, Teacher, Timeslot,
    Unavailability,
};
use crate::solver::{LoadError, PersistError};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("invalid data: {0}")]
    Invalid(String),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: u64 },
}

impl From<StoreError> for LoadError {
    fn from(e: StoreError) -> Self {
        LoadError::Invalid(e.to_string())
    }
}

impl From<StoreError> for PersistError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { kind: "lesson", id } => PersistError::LessonNotFound(id),
            other => PersistError::Storage(other.to_string()),
        }
    }
}

/// Reads problems for the solver and writes its solutions back.
pub trait ScheduleRepository: Send + Sync {
    /// Builds the planning problem for `id` with every non-pinned lesson
    /// unassigned.
    fn load_problem(&self, id: ProblemId) -> Result<Schedule, StoreError>;

    /// Builds the schedule for `id` exactly as currently stored.
    fn current_snapshot(&self, id: ProblemId) -> Result<Schedule, StoreError>;

    /// Writes every lesson's timeslot and room back, keyed by lesson id.
    /// A schedule without a score is skipped.
    fn save_solution(&self, schedule: &Schedule) -> Result<(), StoreError>;
}

/// A stored unavailability, referencing facts by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnavailabilityRow {
    pub teacher_id: u64,
    pub timeslot_id: u64,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DanceGroupRow {
    pub id: u64,
    pub name: String,
    pub style_id: Option<u64>,
    pub level: Option<DanceLevel>,
}

/// A stored lesson, referencing facts by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonRow {
    pub id: u64,
    pub teacher_id: u64,
    pub group_id: Option<u64>,
    pub duration_minutes: u32,
    pub private: bool,
    pub pinned: bool,
    pub timeslot_id: Option<u64>,
    pub room_id: Option<u64>,
}

#[derive(Debug, Default)]
struct Tables {
    timeslots: BTreeMap<u64, Timeslot>,
    rooms: BTreeMap<u64, Room>,
    teachers: BTreeMap<u64, Teacher>,
    unavailabilities: Vec<UnavailabilityRow>,
    dance_styles: BTreeMap<u64, DanceStyle>,
    dance_groups: BTreeMap<u64, DanceGroupRow>,
    lessons: BTreeMap<u64, LessonRow>,
}

/// In-process repository. All problem ids share the same rows, so every
/// session plans the school's full lesson list.
///
/// # Examples
///
/// ```
/// use dance_timetable::demo_data::{generate, DemoData};
/// use dance_timetable::store::{InMemoryStore, ScheduleRepository};
///
/// let store = InMemoryStore::from_schedule(&generate(DemoData::Small)).unwrap();
/// let problem = store.load_problem(42).unwrap();
///
/// assert_eq!(problem.id, 42);
/// assert_eq!(problem.lessons.len(), 30);
/// assert_eq!(problem.assigned_count(), 0);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding the rows of `schedule`.
    pub fn from_schedule(schedule: &Schedule) -> Result<Self, StoreError> {
        let store = Self::new();
        store.replace_all(schedule)?;
        Ok(store)
    }

    /// Replaces every row with the contents of `schedule`.
    pub fn replace_all(&self, schedule: &Schedule) -> Result<(), StoreError> {
        schedule
            .validate()
            .map_err(|v| StoreError::Invalid(v.to_string()))?;

        let mut tables = Tables::default();
        for ts in &schedule.timeslots {
            if ts.end_time <= ts.start_time {
                return Err(StoreError::Invalid(format!(
                    "timeslot {} ends before it starts",
                    ts.id
                )));
            }
            insert_unique(&mut tables.timeslots, ts.id, ts.clone(), "timeslot")?;
        }
        for room in &schedule.rooms {
            if room.capacity == 0 {
                return Err(StoreError::Invalid(format!("room {} has no capacity", room.id)));
            }
            insert_unique(&mut tables.rooms, room.id, room.clone(), "room")?;
        }
        for teacher in &schedule.teachers {
            insert_unique(&mut tables.teachers, teacher.id, teacher.clone(), "teacher")?;
        }
        for style in &schedule.dance_styles {
            insert_unique(&mut tables.dance_styles, style.id, style.clone(), "dance style")?;
        }
        for group in &schedule.dance_groups {
            let row = DanceGroupRow {
                id: group.id,
                name: group.name.clone(),
                style_id: match group.style {
                    Some(idx) => Some(
                        schedule
                            .dance_styles
                            .get(idx)
                            .map(|s| s.id)
                            .ok_or_else(|| {
                                StoreError::Invalid(format!("group {} has a missing style", group.id))
                            })?,
                    ),
                    None => None,
                },
                level: group.level,
            };
            insert_unique(&mut tables.dance_groups, group.id, row, "dance group")?;
        }
        tables.unavailabilities = schedule
            .unavailabilities
            .iter()
            .map(|u| UnavailabilityRow {
                teacher_id: schedule.teachers[u.teacher].id,
                timeslot_id: schedule.timeslots[u.timeslot].id,
                reason: u.reason.clone(),
            })
            .collect();
        for lesson in &schedule.lessons {
            if lesson.duration_minutes < Lesson::MIN_DURATION_MINUTES {
                return Err(StoreError::Invalid(format!(
                    "lesson {} is shorter than {} minutes",
                    lesson.id,
                    Lesson::MIN_DURATION_MINUTES
                )));
            }
            let row = LessonRow {
                id: lesson.id,
                teacher_id: schedule.teachers[lesson.teacher].id,
                group_id: lesson.group.map(|g| schedule.dance_groups[g].id),
                duration_minutes: lesson.duration_minutes,
                private: lesson.private,
                pinned: lesson.pinned,
                timeslot_id: schedule.timeslot_of(lesson).map(|t| t.id),
                room_id: schedule.room_of(lesson).map(|r| r.id),
            };
            insert_unique(&mut tables.lessons, lesson.id, row, "lesson")?;
        }

        info!(
            timeslots = tables.timeslots.len(),
            rooms = tables.rooms.len(),
            teachers = tables.teachers.len(),
            lessons = tables.lessons.len(),
            "Store seeded"
        );
        *self.tables.write() = tables;
        Ok(())
    }

    pub fn lesson(&self, id: u64) -> Option<LessonRow> {
        self.tables.read().lessons.get(&id).cloned()
    }

    pub fn lessons(&self) -> Vec<LessonRow> {
        self.tables.read().lessons.values().cloned().collect()
    }

    pub fn remove_lesson(&self, id: u64) -> Option<LessonRow> {
        self.tables.write().lessons.remove(&id)
    }

    /// Pins a lesson to a timeslot and room, both given by id.
    pub fn pin_lesson(&self, id: u64, timeslot_id: u64, room_id: u64) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        if !tables.timeslots.contains_key(&timeslot_id) {
            return Err(StoreError::NotFound {
                kind: "timeslot",
                id: timeslot_id,
            });
        }
        if !tables.rooms.contains_key(&room_id) {
            return Err(StoreError::NotFound {
                kind: "room",
                id: room_id,
            });
        }
        let lesson = tables
            .lessons
            .get_mut(&id)
            .ok_or(StoreError::NotFound { kind: "lesson", id })?;
        lesson.pinned = true;
        lesson.timeslot_id = Some(timeslot_id);
        lesson.room_id = Some(room_id);
        Ok(())
    }

    fn build(&self, id: ProblemId, clear_unpinned: bool) -> Result<Schedule, StoreError> {
        let tables = self.tables.read();

        let timeslot_idx = index_of(&tables.timeslots);
        let room_idx = index_of(&tables.rooms);
        let teacher_idx = index_of(&tables.teachers);
        let style_idx = index_of(&tables.dance_styles);
        let group_idx = index_of(&tables.dance_groups);

        let resolve = |map: &HashMap<u64, usize>, kind: &'static str, key: u64| {
            map.get(&key).copied().ok_or(StoreError::NotFound { kind, id: key })
        };

        let dance_groups = tables
            .dance_groups
            .values()
            .map(|row| -> Result<DanceGroup, StoreError> {
                Ok(DanceGroup {
                    id: row.id,
                    name: row.name.clone(),
                    style: row
                        .style_id
                        .map(|s| resolve(&style_idx, "dance style", s))
                        .transpose()?,
                    level: row.level,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        let unavailabilities = tables
            .unavailabilities
            .iter()
            .map(|row| -> Result<Unavailability, StoreError> {
                Ok(Unavailability {
                    teacher: resolve(&teacher_idx, "teacher", row.teacher_id)?,
                    timeslot: resolve(&timeslot_idx, "timeslot", row.timeslot_id)?,
                    reason: row.reason.clone(),
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        let lessons = tables
            .lessons
            .values()
            .map(|row| -> Result<Lesson, StoreError> {
                let keep = row.pinned || !clear_unpinned;
                Ok(Lesson {
                    id: row.id,
                    teacher: resolve(&teacher_idx, "teacher", row.teacher_id)?,
                    group: row
                        .group_id
                        .map(|g| resolve(&group_idx, "dance group", g))
                        .transpose()?,
                    duration_minutes: row.duration_minutes,
                    private: row.private,
                    pinned: row.pinned,
                    timeslot: match row.timeslot_id {
                        Some(t) if keep => Some(resolve(&timeslot_idx, "timeslot", t)?),
                        _ => None,
                    },
                    room: match row.room_id {
                        Some(r) if keep => Some(resolve(&room_idx, "room", r)?),
                        _ => None,
                    },
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        let schedule = Schedule::new(
            id,
            tables.timeslots.values().cloned().collect(),
            tables.rooms.values().cloned().collect(),
            tables.teachers.values().cloned().collect(),
            lessons,
        )
        .with_unavailabilities(unavailabilities)
        .with_dance_groups(tables.dance_styles.values().cloned().collect(), dance_groups);

        Ok(schedule)
    }
}

impl ScheduleRepository for InMemoryStore {
    fn load_problem(&self, id: ProblemId) -> Result<Schedule, StoreError> {
        let schedule = self.build(id, true)?;
        info!(
            problem_id = id,
            timeslots = schedule.timeslots.len(),
            rooms = schedule.rooms.len(),
            teachers = schedule.teachers.len(),
            lessons = schedule.lessons.len(),
            "Loaded problem"
        );
        Ok(schedule)
    }

    fn current_snapshot(&self, id: ProblemId) -> Result<Schedule, StoreError> {
        self.build(id, false)
    }

    fn save_solution(&self, schedule: &Schedule) -> Result<(), StoreError> {
        let Some(score) = schedule.score else {
            warn!(problem_id = schedule.id, "Solution score is missing, skipping save");
            return Ok(());
        };

        let mut tables = self.tables.write();

        // Resolve everything first so a failed save writes nothing.
        let mut updates = Vec::with_capacity(schedule.lessons.len());
        for lesson in &schedule.lessons {
            if !tables.lessons.contains_key(&lesson.id) {
                return Err(StoreError::NotFound {
                    kind: "lesson",
                    id: lesson.id,
                });
            }
            let timeslot_id = match lesson.timeslot {
                Some(idx) => Some(
                    schedule
                        .timeslots
                        .get(idx)
                        .map(|t| t.id)
                        .filter(|id| tables.timeslots.contains_key(id))
                        .ok_or_else(|| {
                            StoreError::Invalid(format!("lesson {} has a stale timeslot", lesson.id))
                        })?,
                ),
                None => None,
            };
            let room_id = match lesson.room {
                Some(idx) => Some(
                    schedule
                        .rooms
                        .get(idx)
                        .map(|r| r.id)
                        .filter(|id| tables.rooms.contains_key(id))
                        .ok_or_else(|| {
                            StoreError::Invalid(format!("lesson {} has a stale room", lesson.id))
                        })?,
                ),
                None => None,
            };
            updates.push((lesson.id, timeslot_id, room_id));
        }

        for (id, timeslot_id, room_id) in updates {
            if let Some(row) = tables.lessons.get_mut(&id) {
                row.timeslot_id = timeslot_id;
                row.room_id = room_id;
            }
        }

        debug!(
            problem_id = schedule.id,
            score = %score,
            lessons = schedule.lessons.len(),
            "Saved solution"
        );
        Ok(())
    }
}

fn insert_unique<T>(
    table: &mut BTreeMap<u64, T>,
    id: u64,
    row: T,
    kind: &'static str,
) -> Result<(), StoreError> {
    if table.insert(id, row).is_some() {
        return Err(StoreError::Invalid(format!("duplicate {} id {}", kind, id)));
    }
    Ok(())
}

fn index_of<T>(table: &BTreeMap<u64, T>) -> HashMap<u64, usize> {
    table.keys().enumerate().map(|(i, id)| (*id, i)).collect()
}
