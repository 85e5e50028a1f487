//! Demo data generators for the dance school timetable.

use chrono::{NaiveTime, Weekday};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::domain::{
    DanceGroup, DanceLevel, DanceStyle, Lesson, Room, Schedule, Teacher, Timeslot, Unavailability,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoData {
    Small,
    Large,
}

impl std::str::FromStr for DemoData {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "SMALL" => Ok(DemoData::Small),
            "LARGE" => Ok(DemoData::Large),
            _ => Err(()),
        }
    }
}

impl DemoData {
    pub fn as_str(&self) -> &'static str {
        match self {
            DemoData::Small => "SMALL",
            DemoData::Large => "LARGE",
        }
    }

    fn parameters(&self) -> DemoDataParameters {
        match self {
            DemoData::Small => DemoDataParameters {
                days: &[Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri],
                first_hour: 15,
                last_hour: 21,
                room_count: 4,
                teacher_count: 6,
                style_count: 4,
                group_count: 12,
                lesson_count: 30,
                unavailability_distribution: &[(0, 2.0), (1, 2.0), (2, 1.0)],
            },
            DemoData::Large => DemoDataParameters {
                days: &[
                    Weekday::Mon,
                    Weekday::Tue,
                    Weekday::Wed,
                    Weekday::Thu,
                    Weekday::Fri,
                    Weekday::Sat,
                ],
                first_hour: 9,
                last_hour: 22,
                room_count: 8,
                teacher_count: 20,
                style_count: 8,
                group_count: 60,
                lesson_count: 150,
                unavailability_distribution: &[(0, 1.0), (2, 2.0), (4, 2.0), (6, 1.0)],
            },
        }
    }
}

struct DemoDataParameters {
    days: &'static [Weekday],
    /// Start hour of the first slot of the day.
    first_hour: u32,
    /// End hour of the last slot of the day.
    last_hour: u32,
    room_count: usize,
    teacher_count: usize,
    style_count: usize,
    group_count: usize,
    lesson_count: usize,
    unavailability_distribution: &'static [(usize, f64)],
}

/// List of available demo data sets.
pub fn list_demo_data() -> Vec<&'static str> {
    vec!["SMALL", "LARGE"]
}

/// Generates an unsolved demo schedule for the given size.
///
/// Generation is deterministic: the same `demo` always yields the same data.
pub fn generate(demo: DemoData) -> Schedule {
    let params = demo.parameters();
    let mut rng = StdRng::seed_from_u64(0);

    // Hourly weekday slots
    let mut timeslots = Vec::new();
    for &day in params.days {
        for hour in params.first_hour..params.last_hour {
            let id = timeslots.len() as u64 + 1;
            timeslots.push(Timeslot::new(id, day, time(hour, 0), time(hour + 1, 0)));
        }
    }

    // Every other room can host parallel private lessons
    let rooms: Vec<Room> = (0..params.room_count)
        .map(|i| {
            Room::new(
                i as u64 + 1,
                format!("Studio {}", ROOM_NAMES[i % ROOM_NAMES.len()]),
                [20, 25, 30, 15][i % 4],
                i % 2 == 0,
            )
        })
        .collect();

    let dance_styles: Vec<DanceStyle> = STYLE_NAMES
        .iter()
        .take(params.style_count)
        .enumerate()
        .map(|(i, name)| DanceStyle::new(i as u64 + 1, *name))
        .collect();

    let names = generate_name_permutations(&mut rng);
    let teachers: Vec<Teacher> = (0..params.teacher_count)
        .map(|i| {
            let style_count = rng.gen_range(1..=2).min(dance_styles.len());
            let styles: Vec<u64> = dance_styles
                .choose_multiple(&mut rng, style_count)
                .map(|s| s.id)
                .collect();
            let mut teacher = Teacher::new(i as u64 + 1, names[i % names.len()].clone())
                .with_styles(styles)
                .with_max_daily_hours(rng.gen_range(4..=8));
            teacher.color_code = COLORS[i % COLORS.len()].to_string();
            teacher
        })
        .collect();

    let levels = [
        DanceLevel::Beginner,
        DanceLevel::Intermediate,
        DanceLevel::Advanced,
        DanceLevel::Open,
    ];
    let dance_groups: Vec<DanceGroup> = (0..params.group_count)
        .map(|i| {
            let style = i % dance_styles.len().max(1);
            let level = levels[(i / dance_styles.len().max(1)) % levels.len()];
            let mut group = DanceGroup::new(
                i as u64 + 1,
                format!("{} {:?}", STYLE_NAMES[style % STYLE_NAMES.len()], level),
            );
            group.style = (!dance_styles.is_empty()).then_some(style);
            group.level = Some(level);
            group
        })
        .collect();

    // Every fifth lesson is private; group lessons go to a qualified teacher
    // where one exists.
    let mut lessons = Vec::with_capacity(params.lesson_count);
    for i in 0..params.lesson_count {
        let id = i as u64 + 1;
        if i % 5 == 0 {
            let teacher = i % teachers.len();
            lessons.push(Lesson::new(id, teacher).with_private(true).with_duration(45));
        } else {
            let group = i % dance_groups.len();
            let teacher = dance_groups[group]
                .style
                .and_then(|style| {
                    let style_id = dance_styles[style].id;
                    let qualified: Vec<usize> = (0..teachers.len())
                        .filter(|&t| teachers[t].is_qualified_for(style_id))
                        .collect();
                    qualified.choose(&mut rng).copied()
                })
                .unwrap_or(i % teachers.len());
            lessons.push(Lesson::new(id, teacher).with_group(group));
        }
    }

    let mut unavailabilities = Vec::new();
    for teacher in 0..teachers.len() {
        let count = pick_count(&mut rng, params.unavailability_distribution);
        let slots: Vec<usize> = (0..timeslots.len())
            .collect::<Vec<_>>()
            .choose_multiple(&mut rng, count.min(timeslots.len()))
            .copied()
            .collect();
        for timeslot in slots {
            unavailabilities.push(Unavailability {
                teacher,
                timeslot,
                reason: REASONS.choose(&mut rng).map(|r| r.to_string()),
            });
        }
    }

    Schedule::new(0, timeslots, rooms, teachers, lessons)
        .with_unavailabilities(unavailabilities)
        .with_dance_groups(dance_styles, dance_groups)
}

fn time(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

/// Pick a count based on weighted distribution.
fn pick_count(rng: &mut StdRng, distribution: &[(usize, f64)]) -> usize {
    let total_weight: f64 = distribution.iter().map(|(_, w)| w).sum();
    let mut choice = rng.gen::<f64>() * total_weight;

    for (count, weight) in distribution {
        if choice < *weight {
            return *count;
        }
        choice -= weight;
    }
    distribution.last().map(|(c, _)| *c).unwrap_or(0)
}

const ROOM_NAMES: &[&str] = &["A", "B", "C", "D", "E", "F", "G", "H"];

const STYLE_NAMES: &[&str] = &[
    "Salsa",
    "Bachata",
    "Tango",
    "Ballet",
    "Hip Hop",
    "Contemporary",
    "Jazz",
    "Kizomba",
];

const COLORS: &[&str] = &[
    "#E57373", "#64B5F6", "#81C784", "#FFB74D", "#BA68C8", "#4DB6AC", "#F06292", "#A1887F",
];

const REASONS: &[&str] = &["Rehearsal", "Other job", "Travel", "Personal"];

const FIRST_NAMES: &[&str] = &[
    "Ana", "Bruno", "Carla", "Diego", "Eva", "Felix", "Gina", "Hugo", "Iris", "Joel",
];
const LAST_NAMES: &[&str] = &[
    "Alves", "Baker", "Costa", "Duarte", "Evans", "Ferro", "Garcia", "Hill", "Ito", "Jansen",
];

fn generate_name_permutations(rng: &mut StdRng) -> Vec<String> {
    let mut names = Vec::with_capacity(FIRST_NAMES.len() * LAST_NAMES.len());
    for first in FIRST_NAMES {
        for last in LAST_NAMES {
            names.push(format!("{} {}", first, last));
        }
    }
    names.shuffle(rng);
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_small() {
        let schedule = generate(DemoData::Small);

        assert_eq!(schedule.timeslots.len(), 30);
        assert_eq!(schedule.rooms.len(), 4);
        assert_eq!(schedule.teachers.len(), 6);
        assert_eq!(schedule.lessons.len(), 30);
        assert!(schedule.validate().is_ok());

        // All lessons should be unassigned initially
        assert_eq!(schedule.assigned_count(), 0);
        assert!(schedule.lessons.iter().all(|l| !l.pinned));
    }

    #[test]
    fn test_generate_large() {
        let schedule = generate(DemoData::Large);

        assert_eq!(schedule.timeslots.len(), 78);
        assert_eq!(schedule.rooms.len(), 8);
        assert_eq!(schedule.teachers.len(), 20);
        assert_eq!(schedule.lessons.len(), 150);
        assert!(schedule.validate().is_ok());
    }

    #[test]
    fn test_generation_is_deterministic() {
        let a = generate(DemoData::Small);
        let b = generate(DemoData::Small);
        assert_eq!(a.lessons, b.lessons);
        assert_eq!(a.teachers, b.teachers);
        assert_eq!(a.unavailabilities, b.unavailabilities);
    }

    #[test]
    fn test_every_fifth_lesson_private() {
        let schedule = generate(DemoData::Small);
        for (i, lesson) in schedule.lessons.iter().enumerate() {
            assert_eq!(lesson.private, i % 5 == 0);
            assert_eq!(lesson.group.is_none(), lesson.private);
        }
    }

    #[test]
    fn test_rooms_alternate_parallel_private() {
        let schedule = generate(DemoData::Large);
        for (i, room) in schedule.rooms.iter().enumerate() {
            assert_eq!(room.allows_parallel_private, i % 2 == 0);
        }
    }

    #[test]
    fn test_group_lessons_prefer_qualified_teachers() {
        let schedule = generate(DemoData::Large);
        let qualified = schedule
            .lessons
            .iter()
            .filter_map(|l| l.group.map(|g| (l.teacher, g)))
            .filter(|&(t, g)| {
                let style = schedule.dance_groups[g].style.unwrap();
                schedule.teachers[t].is_qualified_for(schedule.dance_styles[style].id)
            })
            .count();
        let group_lessons = schedule.lessons.iter().filter(|l| !l.private).count();
        // Styles nobody teaches fall back to round robin
        assert!(qualified * 2 > group_lessons);
    }

    #[test]
    fn test_ids_unique() {
        let schedule = generate(DemoData::Large);
        let ids: HashSet<u64> = schedule.lessons.iter().map(|l| l.id).collect();
        assert_eq!(ids.len(), schedule.lessons.len());
        let ids: HashSet<u64> = schedule.timeslots.iter().map(|t| t.id).collect();
        assert_eq!(ids.len(), schedule.timeslots.len());
    }

    #[test]
    fn test_demo_data_from_str() {
        assert_eq!("SMALL".parse::<DemoData>(), Ok(DemoData::Small));
        assert_eq!("small".parse::<DemoData>(), Ok(DemoData::Small));
        assert_eq!("LARGE".parse::<DemoData>(), Ok(DemoData::Large));
        assert!("invalid".parse::<DemoData>().is_err());
        assert_eq!(list_demo_data(), vec!["SMALL", "LARGE"]);
    }
}
