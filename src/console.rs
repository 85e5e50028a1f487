//! Colourised console summaries of a solve.

use num_format::{Locale, ToFormattedString};
use owo_colors::OwoColorize;
use std::time::{Duration, Instant};

use crate::score::HardSoftScore;

/// Startup banner of the server binary.
pub fn print_banner() {
    let banner = r#"
  ___                       _____ _              _        _    _
 |   \ __ _ _ _  __ ___    |_   _(_)_ __  ___ __| |_ __ _| |__| |___
 | |) / _` | ' \/ _/ -_)     | | | | '  \/ -_) _|  _/ _` | '_ \ / -_)
 |___/\__,_|_||_\__\___|     |_| |_|_|_|_\___\__|\__\__,_|_.__/_\___|
"#;
    println!("{}", banner.magenta().bold());
    println!(
        "  {} {}\n",
        format!("v{}", env!("CARGO_PKG_VERSION")).bright_black(),
        "Dance School Timetable".bright_magenta()
    );
}

/// Prints the size of the timetable being served.
pub fn print_config(timeslots: usize, rooms: usize, teachers: usize, lessons: usize) {
    println!(
        "{} Problem: timeslots ({}), rooms ({}), teachers ({}), lessons ({})",
        prefix("Solver"),
        count(timeslots),
        count(rooms),
        count(teachers),
        count(lessons)
    );
}

/// Prints the state right after construction.
pub fn print_solving_started(elapsed: Duration, best_score: HardSoftScore, lessons: usize, values: usize) {
    println!(
        "{} time spent ({}), best score ({}), random ({})",
        prefix("Solver"),
        format_duration(elapsed).yellow(),
        format_score(best_score),
        "StdRng".white()
    );
    println!(
        "{} movable lessons ({}), timeslot-room pairs ({}), problem scale ({})",
        prefix("Solver"),
        count(lessons),
        count(values),
        problem_scale(lessons, values).bright_magenta()
    );
}

/// Prints the completion line and a summary box.
pub fn print_solving_ended(elapsed: Duration, total_moves: u64, phases: usize, best_score: HardSoftScore) {
    println!(
        "{} Solving ended: time spent ({}), best score ({}), move evaluation speed ({}/sec), phase total ({})",
        prefix("Solver"),
        format_duration(elapsed).yellow(),
        format_score(best_score),
        per_second(total_moves, elapsed)
            .to_formatted_string(&Locale::en)
            .bright_magenta()
            .bold(),
        phases.to_string().white()
    );

    let border = "═".repeat(58);
    println!();
    println!("{}", format!("╔{}╗", border).bright_magenta());

    let (status, feasible) = if best_score.is_feasible() {
        ("✓ FEASIBLE TIMETABLE FOUND", true)
    } else {
        ("✗ INFEASIBLE (hard constraints violated)", false)
    };
    let padding = 56 - status.chars().count();
    let coloured = if feasible {
        status.bright_green().bold().to_string()
    } else {
        status.bright_red().bold().to_string()
    };
    println!(
        "{}{}{}{}{}",
        "║".bright_magenta(),
        " ".repeat(padding / 2),
        coloured,
        " ".repeat(padding - padding / 2),
        "║".bright_magenta()
    );

    println!("{}", format!("╠{}╣", border).bright_magenta());
    let rows = [
        ("Final Score:", best_score.to_string()),
        ("Solving Time:", format!("{:.2}s", elapsed.as_secs_f64())),
        (
            "Move Speed:",
            format!("{}/sec", per_second(total_moves, elapsed).to_formatted_string(&Locale::en)),
        ),
    ];
    for (label, value) in rows {
        println!(
            "{}  {:<18}{:>36}  {}",
            "║".bright_magenta(),
            label,
            value,
            "║".bright_magenta()
        );
    }
    println!("{}", format!("╚{}╝", border).bright_magenta());
    println!();
}

fn print_phase_start(phase: &str, index: usize) {
    println!(
        "{} {} phase ({}) started",
        prefix(phase),
        phase.white().bold(),
        index.to_string().yellow()
    );
}

/// Tracks one solver phase and prints its summary when finished.
pub struct PhaseTimer {
    start: Instant,
    phase: &'static str,
    index: usize,
    steps_accepted: u64,
    moves_evaluated: u64,
    last_score: HardSoftScore,
}

impl PhaseTimer {
    pub fn start(phase: &'static str, index: usize) -> Self {
        print_phase_start(phase, index);
        Self {
            start: Instant::now(),
            phase,
            index,
            steps_accepted: 0,
            moves_evaluated: 0,
            last_score: HardSoftScore::ZERO,
        }
    }

    pub fn record_accepted(&mut self, score: HardSoftScore) {
        self.steps_accepted += 1;
        self.last_score = score;
    }

    pub fn record_move(&mut self) {
        self.moves_evaluated += 1;
    }

    pub fn finish(self) {
        let elapsed = self.start.elapsed();
        let acceptance = if self.moves_evaluated > 0 {
            self.steps_accepted as f64 / self.moves_evaluated as f64 * 100.0
        } else {
            0.0
        };
        println!(
            "{} {} phase ({}) ended: time spent ({}), best score ({}), move evaluation speed ({}/sec), step total ({}, {:.1}% accepted)",
            prefix(self.phase),
            self.phase.white().bold(),
            self.index.to_string().yellow(),
            format_duration(elapsed).yellow(),
            format_score(self.last_score),
            per_second(self.moves_evaluated, elapsed)
                .to_formatted_string(&Locale::en)
                .bright_magenta()
                .bold(),
            self.steps_accepted.to_formatted_string(&Locale::en).white(),
            acceptance
        );
    }
}

fn prefix(tag: &str) -> String {
    format!(
        "{} {} {}",
        timestamp().bright_black(),
        "INFO".bright_green(),
        format!("[{}]", tag).bright_cyan()
    )
}

fn count(n: usize) -> String {
    n.to_formatted_string(&Locale::en).bright_yellow().to_string()
}

fn per_second(count: u64, elapsed: Duration) -> u64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        (count as f64 / secs) as u64
    } else {
        0
    }
}

fn format_duration(d: Duration) -> String {
    let total_ms = d.as_millis();
    if total_ms < 1000 {
        format!("{}ms", total_ms)
    } else if total_ms < 60_000 {
        format!("{:.2}s", d.as_secs_f64())
    } else {
        format!("{}m {}s", total_ms / 60_000, (total_ms % 60_000) / 1000)
    }
}

/// Red hard part when infeasible, yellow soft part when negative.
fn format_score(score: HardSoftScore) -> String {
    let hard = format!("{}hard", score.hard());
    let soft = format!("{}soft", score.soft());
    let hard = if score.hard() < 0 {
        hard.bright_red().to_string()
    } else {
        hard.bright_green().to_string()
    };
    let soft = match score.soft() {
        s if s < 0 => soft.yellow().to_string(),
        0 => soft.white().to_string(),
        _ => soft.bright_green().to_string(),
    };
    format!("{}/{}", hard, soft)
}

fn timestamp() -> String {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| format!("{}.{:03}", d.as_secs(), d.subsec_millis()))
        .unwrap_or_else(|_| "0.000".to_string())
}

/// Size of the search space, values^lessons, as mantissa and exponent.
fn problem_scale(lessons: usize, values: usize) -> String {
    if lessons == 0 || values == 0 {
        return "0".to_string();
    }
    let log_scale = lessons as f64 * (values as f64).log10();
    let exponent = log_scale.floor();
    let mantissa = 10f64.powf(log_scale - exponent);
    format!("{:.3} × 10^{}", mantissa, exponent as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
    }

    #[test]
    fn test_problem_scale() {
        assert_eq!(problem_scale(0, 10), "0");
        assert_eq!(problem_scale(3, 10), "1.000 × 10^3");
    }

    #[test]
    fn test_per_second() {
        assert_eq!(per_second(500, Duration::from_millis(500)), 1000);
        assert_eq!(per_second(500, Duration::ZERO), 0);
    }
}
