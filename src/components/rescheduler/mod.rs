//! Moves meetings off vacation days into the earliest free slot on an
//! acceptable date.

pub mod planner;
pub mod report;
pub mod slots;

pub use planner::{reschedule, Planner, PlannerSettings, RescheduleRequest};
pub use report::{Outcome, RescheduleReport};
pub use slots::TimeWindow;
