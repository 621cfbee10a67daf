use super::models::{CalendarEvent, CalendarInfo, EventList, FreeBusyRequest, FreeBusyResponse};
use crate::error::{google_calendar_error, RescheduleResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response};
use tracing::debug;
use url::Url;

/// Base URL of the Calendar API v3
pub const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3/";

/// The calendar operations the planner needs
#[async_trait]
pub trait CalendarApi: Send + Sync {
    /// Fetch calendar metadata (owner id and time zone)
    async fn get_calendar(&self, calendar_id: &str) -> RescheduleResult<CalendarInfo>;

    /// List single (expanded) events overlapping the range, ordered by start time
    async fn list_events(
        &self,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> RescheduleResult<Vec<CalendarEvent>>;

    /// Ask which of the given calendars are busy in a range
    async fn query_free_busy(&self, request: &FreeBusyRequest) -> RescheduleResult<FreeBusyResponse>;

    /// Replace an event with the given body
    async fn update_event(
        &self,
        calendar_id: &str,
        event: &CalendarEvent,
    ) -> RescheduleResult<CalendarEvent>;
}

/// Calendar API client authenticated with a bearer token
#[derive(Clone)]
pub struct GoogleCalendarClient {
    client: Client,
    access_token: String,
    base_url: Url,
}

impl GoogleCalendarClient {
    pub fn new(client: Client, access_token: String) -> RescheduleResult<Self> {
        Self::with_base_url(client, access_token, CALENDAR_API_BASE)
    }

    /// Point the client at another API root
    pub fn with_base_url(client: Client, access_token: String, base_url: &str) -> RescheduleResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| google_calendar_error(&format!("Failed to parse URL: {}", e)))?;
        Ok(Self {
            client,
            access_token,
            base_url,
        })
    }

    /// Build an endpoint URL, percent-encoding each segment
    fn endpoint(&self, segments: &[&str]) -> RescheduleResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| google_calendar_error("API base URL cannot have path segments"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn fetch_event_page(
        &self,
        calendar_id: &str,
        time_min: &str,
        time_max: &str,
        page_token: Option<&str>,
    ) -> RescheduleResult<EventList> {
        let mut url = self.endpoint(&["calendars", calendar_id, "events"])?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("timeMin", time_min);
            query.append_pair("timeMax", time_max);
            query.append_pair("singleEvents", "true");
            query.append_pair("orderBy", "startTime");
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
        }

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| google_calendar_error(&format!("Failed to fetch events: {}", e)))?;

        let response = ensure_success(response, "fetch events").await?;
        response
            .json()
            .await
            .map_err(|e| google_calendar_error(&format!("Failed to parse events response: {}", e)))
    }
}

/// Turn a non-2xx response into an error carrying the body
async fn ensure_success(response: Response, action: &str) -> RescheduleResult<Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let error_body = response
        .text()
        .await
        .unwrap_or_else(|_| "Could not read error response".to_string());
    Err(google_calendar_error(&format!(
        "Failed to {}: HTTP {} - {}",
        action, status, error_body
    )))
}

#[async_trait]
impl CalendarApi for GoogleCalendarClient {
    async fn get_calendar(&self, calendar_id: &str) -> RescheduleResult<CalendarInfo> {
        let url = self.endpoint(&["calendars", calendar_id])?;

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| google_calendar_error(&format!("Failed to fetch calendar: {}", e)))?;

        let response = ensure_success(response, "fetch calendar").await?;
        response
            .json()
            .await
            .map_err(|e| google_calendar_error(&format!("Failed to parse calendar response: {}", e)))
    }

    async fn list_events(
        &self,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> RescheduleResult<Vec<CalendarEvent>> {
        let time_min = time_min.to_rfc3339();
        let time_max = time_max.to_rfc3339();

        let mut events = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page = self
                .fetch_event_page(calendar_id, &time_min, &time_max, page_token.as_deref())
                .await?;
            events.extend(page.items);

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!("Listed {} events between {} and {}", events.len(), time_min, time_max);
        Ok(events)
    }

    async fn query_free_busy(&self, request: &FreeBusyRequest) -> RescheduleResult<FreeBusyResponse> {
        let url = self.endpoint(&["freeBusy"])?;

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(request)
            .send()
            .await
            .map_err(|e| google_calendar_error(&format!("Failed to query free/busy: {}", e)))?;

        let response = ensure_success(response, "query free/busy").await?;
        response
            .json()
            .await
            .map_err(|e| google_calendar_error(&format!("Failed to parse free/busy response: {}", e)))
    }

    async fn update_event(
        &self,
        calendar_id: &str,
        event: &CalendarEvent,
    ) -> RescheduleResult<CalendarEvent> {
        let url = self.endpoint(&["calendars", calendar_id, "events", &event.id])?;

        let response = self
            .client
            .put(url)
            .bearer_auth(&self.access_token)
            .json(event)
            .send()
            .await
            .map_err(|e| google_calendar_error(&format!("Failed to update event: {}", e)))?;

        let response = ensure_success(response, "update event").await?;
        response
            .json()
            .await
            .map_err(|e| google_calendar_error(&format!("Failed to parse updated event: {}", e)))
    }
}
