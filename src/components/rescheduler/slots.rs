use crate::components::google_calendar::models::CalendarEvent;
use crate::components::google_calendar::time::{event_instant, localize};
use crate::error::{input_error, RescheduleResult};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use tracing::warn;

/// Daily bound new meeting times must fall in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> RescheduleResult<Self> {
        if start >= end {
            return Err(input_error("Time slot start must be before time slot end."));
        }
        Ok(Self { start, end })
    }

    /// The window on a given date, in the calendar zone
    pub fn on(&self, tz: Tz, date: NaiveDate) -> RescheduleResult<Interval> {
        Ok(Interval::new(
            localize(tz, date, self.start)?.with_timezone(&Utc),
            localize(tz, date, self.end)?.with_timezone(&Utc),
        ))
    }
}

/// Half-open time range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Interval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && self.end > other.start
    }
}

/// Time span of an event. All-day events span whole days in the calendar zone.
pub fn event_interval(event: &CalendarEvent, tz: Tz) -> RescheduleResult<Option<Interval>> {
    match (event_instant(&event.start, tz)?, event_instant(&event.end, tz)?) {
        (Some(start), Some(end)) => Ok(Some(Interval::new(start, end))),
        _ => Ok(None),
    }
}

/// Start of a timed event as written by the API
pub fn meeting_start(event: &CalendarEvent) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(event.start.date_time.as_deref()?).ok()
}

/// Meeting length in whole minutes. `None` for all-day or malformed events.
pub fn meeting_duration(event: &CalendarEvent) -> Option<Duration> {
    let start = meeting_start(event)?;
    let end = DateTime::parse_from_rfc3339(event.end.date_time.as_deref()?).ok()?;
    let minutes = (end - start).num_minutes();
    (minutes > 0).then(|| Duration::minutes(minutes))
}

/// Intervals that block new meetings: everything except transparent,
/// cancelled and skipped events
pub fn busy_intervals(events: &[CalendarEvent], tz: Tz, skip_event_id: &str) -> Vec<Interval> {
    events
        .iter()
        .filter(|event| event.id != skip_event_id && !event.is_transparent() && !event.is_cancelled())
        .filter_map(|event| match event_interval(event, tz) {
            Ok(interval) => interval,
            Err(e) => {
                warn!("Ignoring event '{}' with unreadable time: {}", event.title(), e);
                None
            }
        })
        .collect()
}

/// Candidate slots of `duration` inside the window, starting every `step`
pub fn candidate_slots(
    tz: Tz,
    date: NaiveDate,
    window: &TimeWindow,
    duration: Duration,
    step: Duration,
) -> RescheduleResult<Vec<DateTime<Tz>>> {
    let window_start = localize(tz, date, window.start)?;
    let window_end = localize(tz, date, window.end)?;

    let mut slots = Vec::new();
    let mut current = window_start;
    while current + duration <= window_end {
        slots.push(current);
        current += step;
    }
    Ok(slots)
}
