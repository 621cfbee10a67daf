pub mod google_calendar;
pub mod rescheduler;
