//! DTOs for REST API responses.

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::constraints::{ConstraintLevel, ScoreAnalysis};
use crate::domain::{ProblemId, Schedule};
use crate::solver::SolverStatus;

/// Returned when a solve is accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveResponse {
    pub schedule_id: ProblemId,
    pub message: String,
    pub status_url: String,
}

impl SolveResponse {
    pub fn started(id: ProblemId) -> Self {
        Self {
            schedule_id: id,
            message: "Solving started".to_string(),
            status_url: format!("/api/solver/status/{}", id),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolverStatusResponse {
    pub schedule_id: ProblemId,
    pub status: SolverStatus,
    pub message: String,
    /// Best score of the last or current search, if any.
    pub score: Option<String>,
}

impl SolverStatusResponse {
    pub fn new(id: ProblemId, status: SolverStatus, score: Option<String>) -> Self {
        let message = match status {
            SolverStatus::NotSolving => "Solver is not currently running for this schedule",
            SolverStatus::SolvingScheduled => "Solving is scheduled but not yet started",
            SolverStatus::SolvingActive => "Solver is actively optimizing the schedule",
        };
        Self {
            schedule_id: id,
            status,
            message: message.to_string(),
            score,
        }
    }
}

/// A lesson flattened for display, with names instead of references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledLessonDto {
    pub lesson_id: u64,
    pub teacher_name: String,
    pub group_name: String,
    pub day_of_week: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub room_name: String,
    pub duration_minutes: u32,
    pub is_private: bool,
    pub is_pinned: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSolutionResponse {
    pub schedule_id: ProblemId,
    pub score: Option<String>,
    pub hard_score: Option<i64>,
    pub soft_score: Option<i64>,
    pub fully_assigned: bool,
    pub lessons: Vec<ScheduledLessonDto>,
}

impl ScheduleSolutionResponse {
    pub fn from_schedule(schedule: &Schedule) -> Self {
        let lessons = schedule
            .lessons
            .iter()
            .map(|lesson| {
                let timeslot = schedule.timeslot_of(lesson);
                ScheduledLessonDto {
                    lesson_id: lesson.id,
                    teacher_name: schedule
                        .teachers
                        .get(lesson.teacher)
                        .map(|t| t.full_name.clone())
                        .unwrap_or_else(|| "N/A".to_string()),
                    group_name: lesson
                        .group
                        .and_then(|g| schedule.dance_groups.get(g))
                        .map(|g| g.name.clone())
                        .unwrap_or_else(|| "N/A".to_string()),
                    day_of_week: timeslot.map(|t| day_name(t.day_of_week).to_string()),
                    start_time: timeslot.map(|t| t.start_time.format("%H:%M").to_string()),
                    end_time: timeslot.map(|t| t.end_time.format("%H:%M").to_string()),
                    room_name: schedule
                        .room_of(lesson)
                        .map(|r| r.name.clone())
                        .unwrap_or_else(|| "Unassigned".to_string()),
                    duration_minutes: lesson.duration_minutes,
                    is_private: lesson.private,
                    is_pinned: lesson.pinned,
                }
            })
            .collect();

        Self {
            schedule_id: schedule.id,
            score: schedule.score.map(|s| s.to_string()),
            hard_score: schedule.score.map(|s| s.hard()),
            soft_score: schedule.score.map(|s| s.soft()),
            fully_assigned: schedule.is_fully_assigned(),
            lessons,
        }
    }
}

fn day_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MONDAY",
        Weekday::Tue => "TUESDAY",
        Weekday::Wed => "WEDNESDAY",
        Weekday::Thu => "THURSDAY",
        Weekday::Fri => "FRIDAY",
        Weekday::Sat => "SATURDAY",
        Weekday::Sun => "SUNDAY",
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintAnalysisDto {
    pub name: String,
    #[serde(rename = "type")]
    pub constraint_type: ConstraintLevel,
    pub score: String,
    pub match_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    pub schedule_id: ProblemId,
    pub score: String,
    pub constraints: Vec<ConstraintAnalysisDto>,
}

impl AnalyzeResponse {
    pub fn new(id: ProblemId, analysis: &ScoreAnalysis) -> Self {
        Self {
            schedule_id: id,
            score: analysis.score.to_string(),
            constraints: analysis
                .constraints
                .iter()
                .map(|c| ConstraintAnalysisDto {
                    name: c.name.clone(),
                    constraint_type: c.level,
                    score: c.score.to_string(),
                    match_count: c.match_count,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub solver_engine: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::analyze;
    use crate::domain::{DanceGroup, Lesson, Room, Teacher, Timeslot};
    use crate::score::HardSoftScore;
    use chrono::NaiveTime;
    use serde_json::json;

    fn schedule() -> Schedule {
        let t = |h| NaiveTime::from_hms_opt(h, 0, 0).unwrap();
        let mut schedule = Schedule::new(
            9,
            vec![Timeslot::new(1, Weekday::Wed, t(18), t(19))],
            vec![Room::new(1, "Studio A", 20, true)],
            vec![Teacher::new(1, "Ana Costa")],
            vec![
                Lesson::new(10, 0).with_group(0).pinned_at(0, 0),
                Lesson::new(11, 0).with_private(true).with_duration(45),
            ],
        )
        .with_dance_groups(vec![], vec![DanceGroup::new(1, "Salsa Beginner")]);
        schedule.score = Some(HardSoftScore::of(0, -3));
        schedule
    }

    #[test]
    fn test_solution_response_shape() {
        let value = serde_json::to_value(ScheduleSolutionResponse::from_schedule(&schedule())).unwrap();

        assert_eq!(value["scheduleId"], 9);
        assert_eq!(value["score"], "0hard/-3soft");
        assert_eq!(value["hardScore"], 0);
        assert_eq!(value["softScore"], -3);
        assert_eq!(value["fullyAssigned"], false);
        assert_eq!(
            value["lessons"][0],
            json!({
                "lessonId": 10,
                "teacherName": "Ana Costa",
                "groupName": "Salsa Beginner",
                "dayOfWeek": "WEDNESDAY",
                "startTime": "18:00",
                "endTime": "19:00",
                "roomName": "Studio A",
                "durationMinutes": 60,
                "isPrivate": false,
                "isPinned": true
            })
        );
    }

    #[test]
    fn test_unassigned_lesson_placeholders() {
        let response = ScheduleSolutionResponse::from_schedule(&schedule());
        let lesson = &response.lessons[1];
        assert_eq!(lesson.group_name, "N/A");
        assert_eq!(lesson.room_name, "Unassigned");
        assert_eq!(lesson.day_of_week, None);
        assert!(lesson.is_private);
    }

    #[test]
    fn test_status_messages() {
        let value = serde_json::to_value(SolverStatusResponse::new(
            3,
            SolverStatus::SolvingActive,
            Some("0hard/0soft".into()),
        ))
        .unwrap();
        assert_eq!(value["status"], "SOLVING_ACTIVE");
        assert_eq!(value["message"], "Solver is actively optimizing the schedule");

        let idle = SolverStatusResponse::new(3, SolverStatus::NotSolving, None);
        assert_eq!(idle.message, "Solver is not currently running for this schedule");
    }

    #[test]
    fn test_solve_response_status_url() {
        let value = serde_json::to_value(SolveResponse::started(1700000000000)).unwrap();
        assert_eq!(value["statusUrl"], "/api/solver/status/1700000000000");
        assert_eq!(value["scheduleId"], 1700000000000u64);
    }

    #[test]
    fn test_analyze_response() {
        let analysis = analyze(&schedule());
        let value = serde_json::to_value(AnalyzeResponse::new(9, &analysis)).unwrap();
        assert_eq!(value["constraints"].as_array().unwrap().len(), 6);
        assert_eq!(value["constraints"][0]["type"], "hard");
        assert_eq!(value["constraints"][3]["type"], "soft");
    }
}
