//! Dance school timetable optimization.
//!
//! Assigns lessons to weekly timeslots and studio rooms, respecting room
//! occupancy, teacher conflicts and unavailability while minimizing idle time
//! between a teacher's lessons and balancing workloads.
//!
//! # Domain Model
//!
//! - [`Lesson`](domain::Lesson): the planning entity, assigned a timeslot and a room
//! - [`Timeslot`](domain::Timeslot), [`Room`](domain::Room), [`Teacher`](domain::Teacher): problem facts
//! - [`Schedule`](domain::Schedule): the complete planning solution
//!
//! # Solving
//!
//! [`LocalSearchEngine`](solver::LocalSearchEngine) runs a construction
//! heuristic followed by local search. [`SessionManager`](solver::SessionManager)
//! runs one engine per problem id in the background and hands every improving
//! solution to a persister. [`SolverService`](service::SolverService) wires the
//! manager to a [`ScheduleRepository`](store::ScheduleRepository).

pub mod api;
pub mod config;
#[cfg(feature = "console")]
pub mod console;
pub mod constraints;
pub mod demo_data;
pub mod domain;
pub mod dto;
pub mod score;
pub mod service;
pub mod solver;
pub mod store;
