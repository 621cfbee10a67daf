#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use vacation_rescheduler::components::google_calendar::models::{
    CalendarEvent, CalendarInfo, EventDateTime, FreeBusyCalendar, FreeBusyError, FreeBusyRequest,
    FreeBusyResponse, Person, TimePeriod,
};
use vacation_rescheduler::components::google_calendar::CalendarApi;
use vacation_rescheduler::error::{google_calendar_error, RescheduleResult};

pub const OWNER: &str = "me@example.com";

/// In-memory calendar standing in for the Google Calendar API
pub struct MockCalendar {
    info: CalendarInfo,
    events: Mutex<Vec<CalendarEvent>>,
    attendee_busy: HashMap<String, Vec<(DateTime<Utc>, DateTime<Utc>)>>,
    free_busy_errors: HashMap<String, String>,
    updates: Mutex<Vec<CalendarEvent>>,
    free_busy_queries: Mutex<Vec<FreeBusyRequest>>,
    fail_updates: bool,
    fail_listing: bool,
    fail_listing_on: Vec<NaiveDate>,
}

impl MockCalendar {
    /// Create a calendar owned by `OWNER` in the given zone
    pub fn new(time_zone: &str) -> Self {
        Self {
            info: CalendarInfo {
                id: OWNER.to_string(),
                summary: Some("Me".to_string()),
                time_zone: Some(time_zone.to_string()),
            },
            events: Mutex::new(Vec::new()),
            attendee_busy: HashMap::new(),
            free_busy_errors: HashMap::new(),
            updates: Mutex::new(Vec::new()),
            free_busy_queries: Mutex::new(Vec::new()),
            fail_updates: false,
            fail_listing: false,
            fail_listing_on: Vec::new(),
        }
    }

    pub fn with_event(self, event: CalendarEvent) -> Self {
        self.events.lock().unwrap().push(event);
        self
    }

    /// Mark an attendee busy between two RFC 3339 instants
    pub fn with_attendee_busy(mut self, email: &str, start: &str, end: &str) -> Self {
        self.attendee_busy
            .entry(email.to_string())
            .or_default()
            .push((parse(start), parse(end)));
        self
    }

    pub fn failing_updates(mut self) -> Self {
        self.fail_updates = true;
        self
    }

    pub fn failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    /// Fail listings whose range starts on the given date (YYYY-MM-DD)
    pub fn failing_listing_on(mut self, date: &str) -> Self {
        self.fail_listing_on
            .push(NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap());
        self
    }

    /// Answer free/busy queries for a calendar with an error instead of busy times
    pub fn with_free_busy_error(mut self, email: &str, reason: &str) -> Self {
        self.free_busy_errors.insert(email.to_string(), reason.to_string());
        self
    }

    pub fn updates(&self) -> Vec<CalendarEvent> {
        self.updates.lock().unwrap().clone()
    }

    pub fn free_busy_queries(&self) -> Vec<FreeBusyRequest> {
        self.free_busy_queries.lock().unwrap().clone()
    }

    pub fn event(&self, id: &str) -> Option<CalendarEvent> {
        self.events.lock().unwrap().iter().find(|e| e.id == id).cloned()
    }
}

pub fn parse(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value).unwrap().with_timezone(&Utc)
}

fn event_bounds(event: &CalendarEvent) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = event.start.date_time.as_deref()?;
    let end = event.end.date_time.as_deref()?;
    Some((parse(start), parse(end)))
}

#[async_trait]
impl CalendarApi for MockCalendar {
    async fn get_calendar(&self, _calendar_id: &str) -> RescheduleResult<CalendarInfo> {
        Ok(self.info.clone())
    }

    async fn list_events(
        &self,
        _calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> RescheduleResult<Vec<CalendarEvent>> {
        if self.fail_listing || self.fail_listing_on.contains(&time_min.date_naive()) {
            return Err(google_calendar_error("HTTP 500 - backend error"));
        }

        let mut events: Vec<CalendarEvent> = self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| match event_bounds(event) {
                Some((start, end)) => start < time_max && end > time_min,
                None => false,
            })
            .cloned()
            .collect();
        events.sort_by_key(|event| event_bounds(event).map(|(start, _)| start));
        Ok(events)
    }

    async fn query_free_busy(&self, request: &FreeBusyRequest) -> RescheduleResult<FreeBusyResponse> {
        self.free_busy_queries.lock().unwrap().push(request.clone());

        let time_min = parse(&request.time_min);
        let time_max = parse(&request.time_max);

        let calendars = request
            .items
            .iter()
            .map(|item| {
                let busy = self
                    .attendee_busy
                    .get(&item.id)
                    .map(|periods| {
                        periods
                            .iter()
                            .filter(|(start, end)| *start < time_max && *end > time_min)
                            .map(|(start, end)| TimePeriod {
                                start: start.to_rfc3339(),
                                end: end.to_rfc3339(),
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                let errors = self
                    .free_busy_errors
                    .get(&item.id)
                    .map(|reason| {
                        vec![FreeBusyError {
                            domain: Some("global".to_string()),
                            reason: Some(reason.clone()),
                        }]
                    })
                    .unwrap_or_default();
                (item.id.clone(), FreeBusyCalendar { busy, errors })
            })
            .collect();

        Ok(FreeBusyResponse { calendars })
    }

    async fn update_event(&self, _calendar_id: &str, event: &CalendarEvent) -> RescheduleResult<CalendarEvent> {
        if self.fail_updates {
            return Err(google_calendar_error("HTTP 403 - forbidden"));
        }

        self.updates.lock().unwrap().push(event.clone());
        let mut events = self.events.lock().unwrap();
        if let Some(existing) = events.iter_mut().find(|e| e.id == event.id) {
            *existing = event.clone();
        }
        Ok(event.clone())
    }
}

/// A default-type meeting organized by `OWNER`
pub fn meeting(id: &str, start: &str, end: &str, attendees: &[&str]) -> CalendarEvent {
    CalendarEvent {
        id: id.to_string(),
        summary: Some(format!("Meeting {}", id)),
        event_type: Some("default".to_string()),
        organizer: Some(Person::with_email(OWNER)),
        attendees: attendees.iter().map(|email| Person::with_email(email)).collect(),
        start: EventDateTime {
            date_time: Some(start.to_string()),
            ..Default::default()
        },
        end: EventDateTime {
            date_time: Some(end.to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}
