//! Benchmark for score calculation throughput.
//!
//! Run with: cargo run --release --bin bench

use dance_timetable::constraints::calculate_score;
use dance_timetable::demo_data::{self, DemoData};
use dance_timetable::solver::moves::LessonMove;
use std::time::Instant;

fn main() {
    let mut schedule = demo_data::generate(DemoData::Large);
    let n_lessons = schedule.lessons.len();
    let n_timeslots = schedule.timeslots.len();
    let n_rooms = schedule.rooms.len();

    println!("Benchmark: Full Score Calculation");
    println!("  Lessons: {}", n_lessons);
    println!("  Timeslots: {}", n_timeslots);
    println!("  Rooms: {}", n_rooms);
    println!();

    // Spread lessons over the grid so every constraint has matches
    for (i, lesson) in schedule.lessons.iter_mut().enumerate() {
        lesson.timeslot = Some(i % n_timeslots);
        lesson.room = Some(i % n_rooms);
    }

    let init_start = Instant::now();
    let initial_score = calculate_score(&schedule);
    println!("Initial score: {} ({:?})", initial_score, init_start.elapsed());
    println!();

    // Deterministic do/undo cycle: each lesson to every timeslot of the next room
    let bench_start = Instant::now();
    let mut moves: u64 = 0;

    for lesson in 0..n_lessons {
        let room = (lesson + 1) % n_rooms;
        for timeslot in 0..n_timeslots {
            let mv = LessonMove::Change {
                lesson,
                timeslot,
                room,
            };
            let undo = mv.do_move(&mut schedule);
            let _ = calculate_score(&schedule);
            moves += 1;

            undo.apply(&mut schedule);
            let _ = calculate_score(&schedule);
            moves += 1;
        }
    }

    let elapsed = bench_start.elapsed();
    let moves_per_sec = moves as f64 / elapsed.as_secs_f64();

    println!("Results:");
    println!("  Moves: {}", moves);
    println!("  Time: {:.2?}", elapsed);
    println!("  Moves/sec: {:.0}", moves_per_sec);

    let final_score = calculate_score(&schedule);
    assert_eq!(initial_score, final_score, "Score corrupted!");
    println!("  Final score: {} (verified)", final_score);
}
