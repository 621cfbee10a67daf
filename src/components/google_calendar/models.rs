use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Start or end of an event. Timed events carry `dateTime`, all-day events `date`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

/// Organizer or attendee of an event
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Person {
    pub fn with_email(email: &str) -> Self {
        Self {
            email: Some(email.to_string()),
            ..Default::default()
        }
    }
}

/// Calendar event as returned by `events.list`. Fields not modelled here are
/// kept in `extra` so that an update writes the event back unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    #[serde(default)]
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transparency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organizer: Option<Person>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attendees: Vec<Person>,
    #[serde(default)]
    pub start: EventDateTime,
    #[serde(default)]
    pub end: EventDateTime,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CalendarEvent {
    /// Event title for logs and reports
    pub fn title(&self) -> &str {
        self.summary.as_deref().unwrap_or("No Summary")
    }

    /// Only regular meetings are moved, not focus time, out-of-office and the like
    pub fn is_default_type(&self) -> bool {
        self.event_type.as_deref() == Some("default")
    }

    /// Transparent events do not block time
    pub fn is_transparent(&self) -> bool {
        self.transparency.as_deref() == Some("transparent")
    }

    pub fn is_cancelled(&self) -> bool {
        self.status.as_deref() == Some("cancelled")
    }

    pub fn is_organized_by(&self, email: &str) -> bool {
        self.organizer
            .as_ref()
            .and_then(|o| o.email.as_deref())
            .is_some_and(|organizer| organizer.eq_ignore_ascii_case(email))
    }

    pub fn attendee_emails(&self) -> Vec<String> {
        self.attendees
            .iter()
            .filter_map(|attendee| attendee.email.clone())
            .collect()
    }
}

/// One page of `events.list`
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct EventList {
    #[serde(default)]
    pub items: Vec<CalendarEvent>,
    pub next_page_token: Option<String>,
}

/// Result of `calendars.get`. For a user's primary calendar the id is the owner's email.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalendarInfo {
    pub id: String,
    pub summary: Option<String>,
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FreeBusyItem {
    pub id: String,
}

/// Body of `freebusy.query`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FreeBusyRequest {
    pub time_min: String,
    pub time_max: String,
    pub items: Vec<FreeBusyItem>,
}

impl FreeBusyRequest {
    pub fn new(time_min: String, time_max: String, calendars: &[String]) -> Self {
        Self {
            time_min,
            time_max,
            items: calendars
                .iter()
                .map(|id| FreeBusyItem { id: id.clone() })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimePeriod {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FreeBusyError {
    pub domain: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct FreeBusyCalendar {
    #[serde(default)]
    pub busy: Vec<TimePeriod>,
    #[serde(default)]
    pub errors: Vec<FreeBusyError>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct FreeBusyResponse {
    #[serde(default)]
    pub calendars: HashMap<String, FreeBusyCalendar>,
}

impl FreeBusyResponse {
    /// Calendars that reported at least one busy period, sorted
    pub fn busy_calendars(&self) -> Vec<String> {
        let mut busy: Vec<String> = self
            .calendars
            .iter()
            .filter(|(_, calendar)| !calendar.busy.is_empty())
            .map(|(id, _)| id.clone())
            .collect();
        busy.sort();
        busy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_keeps_unknown_fields() {
        let raw = json!({
            "id": "evt1",
            "summary": "Planning",
            "eventType": "default",
            "organizer": {"email": "me@example.com", "self": true},
            "attendees": [
                {"email": "me@example.com", "responseStatus": "accepted"},
                {"email": "you@example.com"},
                {"displayName": "Room"}
            ],
            "start": {"dateTime": "2024-03-04T10:00:00+02:00", "timeZone": "Europe/Helsinki"},
            "end": {"dateTime": "2024-03-04T11:00:00+02:00", "timeZone": "Europe/Helsinki"},
            "conferenceData": {"entryPoints": []},
            "reminders": {"useDefault": true}
        });

        let event: CalendarEvent = serde_json::from_value(raw.clone()).unwrap();
        assert!(event.is_default_type());
        assert!(event.is_organized_by("ME@example.com"));
        assert_eq!(event.attendee_emails(), vec!["me@example.com", "you@example.com"]);

        let back = serde_json::to_value(&event).unwrap();
        assert_eq!(back, raw);
    }

    #[test]
    fn test_event_defaults() {
        let event: CalendarEvent = serde_json::from_value(json!({"id": "x"})).unwrap();
        assert_eq!(event.title(), "No Summary");
        assert!(!event.is_default_type());
        assert!(!event.is_transparent());
        assert!(!event.is_organized_by("me@example.com"));
        assert!(event.attendee_emails().is_empty());
    }

    #[test]
    fn test_free_busy_wire_shapes() {
        let request = FreeBusyRequest::new(
            "2024-03-05T09:00:00+00:00".to_string(),
            "2024-03-05T10:00:00+00:00".to_string(),
            &["a@example.com".to_string()],
        );
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "timeMin": "2024-03-05T09:00:00+00:00",
                "timeMax": "2024-03-05T10:00:00+00:00",
                "items": [{"id": "a@example.com"}]
            })
        );

        let response: FreeBusyResponse = serde_json::from_value(json!({
            "kind": "calendar#freeBusy",
            "calendars": {
                "b@example.com": {"busy": [{"start": "2024-03-05T09:00:00Z", "end": "2024-03-05T09:30:00Z"}]},
                "a@example.com": {"busy": []},
                "ext@other.org": {"errors": [{"domain": "global", "reason": "notFound"}]}
            }
        }))
        .unwrap();
        assert_eq!(response.busy_calendars(), vec!["b@example.com"]);
    }
}
