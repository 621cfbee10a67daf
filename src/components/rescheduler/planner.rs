use super::report::{Outcome, RescheduleReport};
use super::slots::{busy_intervals, candidate_slots, meeting_duration, meeting_start, Interval, TimeWindow};
use crate::components::google_calendar::client::CalendarApi;
use crate::components::google_calendar::models::{CalendarEvent, FreeBusyRequest};
use crate::components::google_calendar::time::{localize, parse_timezone, utc_day_bounds};
use crate::config::Config;
use crate::error::RescheduleResult;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, info};

/// What to move and where it may go
#[derive(Debug, Clone)]
pub struct RescheduleRequest {
    pub vacation_dates: Vec<NaiveDate>,
    pub acceptable_dates: Vec<NaiveDate>,
    pub window: TimeWindow,
    pub dry_run: bool,
}

/// Tunables taken from the configuration
#[derive(Debug, Clone)]
pub struct PlannerSettings {
    pub calendar_id: String,
    pub step: Duration,
    pub lunch_break: Option<(NaiveTime, NaiveTime)>,
}

impl From<&Config> for PlannerSettings {
    fn from(config: &Config) -> Self {
        Self {
            calendar_id: config.calendar_id.clone(),
            step: Duration::minutes(i64::from(config.step_minutes)),
            lunch_break: config.lunch_break,
        }
    }
}

/// Greedy first-fit planner: each meeting takes the earliest free slot
pub struct Planner<'a, A: CalendarApi + ?Sized> {
    api: &'a A,
    settings: PlannerSettings,
    tz: Tz,
    owner: String,
    /// Slots handed out during this run, dry run included
    reserved: Vec<Interval>,
    report: RescheduleReport,
}

/// Move every owned meeting off the vacation dates
pub async fn reschedule<A: CalendarApi + ?Sized>(
    api: &A,
    settings: PlannerSettings,
    request: &RescheduleRequest,
) -> RescheduleResult<RescheduleReport> {
    let mut planner = Planner::connect(api, settings).await?;
    planner.run(request).await;
    Ok(planner.into_report())
}

impl<'a, A: CalendarApi + ?Sized> Planner<'a, A> {
    /// Fetch the calendar's owner and time zone. Fails the run if unavailable.
    pub async fn connect(api: &'a A, settings: PlannerSettings) -> RescheduleResult<Self> {
        let calendar = api.get_calendar(&settings.calendar_id).await?;
        let zone_name = calendar.time_zone.as_deref().unwrap_or("UTC");
        let tz = parse_timezone(zone_name)?;

        let mut report = RescheduleReport::new();
        report.info(format!("Using calendar timezone: {}", zone_name));

        Ok(Self {
            api,
            settings,
            tz,
            owner: calendar.id,
            reserved: Vec::new(),
            report,
        })
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn into_report(self) -> RescheduleReport {
        self.report
    }

    /// Process each vacation date in order
    pub async fn run(&mut self, request: &RescheduleRequest) {
        for vacation_date in &request.vacation_dates {
            let meetings = match self.meetings_to_reschedule(*vacation_date).await {
                Ok(meetings) => meetings,
                Err(e) => {
                    self.report
                        .error(format!("Failed to list events on {}: {}", vacation_date, e));
                    continue;
                }
            };

            self.report.info(format!(
                "Meetings to reschedule on {}: {}",
                vacation_date,
                meetings.len()
            ));
            if meetings.is_empty() {
                self.report
                    .warn(format!("No meetings found to reschedule on {}.", vacation_date));
                continue;
            }

            for event in meetings {
                self.reschedule_event(event, request).await;
            }
        }
    }

    /// Timed default events on the date that the calendar owner organizes
    pub async fn meetings_to_reschedule(&self, date: NaiveDate) -> RescheduleResult<Vec<CalendarEvent>> {
        let (start_of_day, end_of_day) = utc_day_bounds(date);
        let events = self
            .api
            .list_events(&self.settings.calendar_id, start_of_day, end_of_day)
            .await?;

        info!("Found {} events on {}", events.len(), date);

        let mut meetings = Vec::new();
        for event in events {
            if !event.is_default_type() {
                debug!("Skipping non-default event: {}", event.title());
                continue;
            }
            if event.is_cancelled() {
                debug!("Skipping cancelled event: {}", event.title());
                continue;
            }
            if !event.is_organized_by(&self.owner) {
                debug!("Skipping event organized by someone else: {}", event.title());
                continue;
            }
            if meeting_duration(&event).is_none() {
                debug!("Skipping all-day or zero-length event: {}", event.title());
                continue;
            }
            debug!("Event '{}' added to reschedule list.", event.title());
            meetings.push(event);
        }

        Ok(meetings)
    }

    async fn reschedule_event(&mut self, event: CalendarEvent, request: &RescheduleRequest) {
        let (Some(original_start), Some(duration)) = (meeting_start(&event), meeting_duration(&event)) else {
            return;
        };
        let attendees = event.attendee_emails();
        debug!(
            "Attempting to find an available slot for meeting: '{}' with attendees: {}",
            event.title(),
            attendees.join(", ")
        );

        for new_date in &request.acceptable_dates {
            let slot = match self
                .find_available_slot(*new_date, &event, duration, &request.window, &attendees)
                .await
            {
                Ok(Some(slot)) => slot,
                Ok(None) => continue,
                Err(e) => {
                    self.report.error(format!(
                        "An error occurred while searching for available slots on {}: {}",
                        new_date, e
                    ));
                    continue;
                }
            };

            let slot_utc = slot.with_timezone(&Utc);
            self.reserved.push(Interval::new(slot_utc, slot_utc + duration));

            if request.dry_run {
                self.report.info(format!(
                    "Dry run: Meeting '{}' would be rescheduled to {}",
                    event.title(),
                    slot.fixed_offset()
                ));
                self.report.record(Outcome::Proposed {
                    event_id: event.id.clone(),
                    title: event.title().to_string(),
                    from: original_start,
                    to: slot.fixed_offset(),
                });
            } else {
                self.reschedule_meeting(event, original_start, slot, duration).await;
            }
            return;
        }

        self.report.warn(format!(
            "No available slot found for meeting: {} on any of the acceptable dates.",
            event.title()
        ));
        self.report.record(Outcome::NoSlot {
            event_id: event.id.clone(),
            title: event.title().to_string(),
        });
    }

    /// First slot on `date` where the owner and all attendees are free
    pub async fn find_available_slot(
        &self,
        date: NaiveDate,
        event: &CalendarEvent,
        duration: Duration,
        window: &TimeWindow,
        attendees: &[String],
    ) -> RescheduleResult<Option<DateTime<Tz>>> {
        let bounds = window.on(self.tz, date)?;
        debug!(
            "Searching for available slots on {} between {} and {}",
            date, bounds.start, bounds.end
        );
        debug!("Meeting duration: {} minutes", duration.num_minutes());

        let events = self
            .api
            .list_events(&self.settings.calendar_id, bounds.start, bounds.end)
            .await?;
        debug!("Found {} events in the time range.", events.len());
        let busy = busy_intervals(&events, self.tz, &event.id);

        let lunch = match self.settings.lunch_break {
            Some((start, end)) => Some(Interval::new(
                localize(self.tz, date, start)?.with_timezone(&Utc),
                localize(self.tz, date, end)?.with_timezone(&Utc),
            )),
            None => None,
        };

        for slot_start in candidate_slots(self.tz, date, window, duration, self.settings.step)? {
            let utc_start = slot_start.with_timezone(&Utc);
            let slot = Interval::new(utc_start, utc_start + duration);

            if lunch.is_some_and(|lunch| slot.overlaps(&lunch)) {
                debug!("Skipping slot during lunch time: {}", slot_start);
                continue;
            }

            if self.reserved.iter().any(|reserved| slot.overlaps(reserved)) {
                debug!("Skipping reserved slot: {}", slot_start);
                continue;
            }

            if busy.iter().any(|interval| slot.overlaps(interval)) {
                debug!("Conflict found with an existing event at {}", slot_start);
                continue;
            }

            if !attendees.is_empty() {
                let busy_attendees = self.busy_attendees(&slot, attendees).await?;
                if !busy_attendees.is_empty() {
                    debug!("Conflict found for attendees: {}", busy_attendees.join(", "));
                    continue;
                }
            }

            debug!("Available slot found: {}", slot_start);
            return Ok(Some(slot_start));
        }

        debug!("No available slot found on {}.", date);
        Ok(None)
    }

    async fn busy_attendees(&self, slot: &Interval, attendees: &[String]) -> RescheduleResult<Vec<String>> {
        let request = FreeBusyRequest::new(slot.start.to_rfc3339(), slot.end.to_rfc3339(), attendees);
        let response = self.api.query_free_busy(&request).await?;

        for (calendar, info) in &response.calendars {
            if !info.errors.is_empty() {
                debug!("Free/busy unavailable for {}, treating as free", calendar);
            }
        }
        Ok(response.busy_calendars())
    }

    async fn reschedule_meeting(
        &mut self,
        mut event: CalendarEvent,
        original_start: DateTime<FixedOffset>,
        new_start: DateTime<Tz>,
        duration: Duration,
    ) {
        let new_end = new_start + duration;

        self.report.info("Proposed change:");
        self.report.info(format!("  Meeting: {}", event.title()));
        self.report.info(format!(
            "  Original Time: {}",
            original_start.with_timezone(&self.tz).format("%Y-%m-%d %H:%M")
        ));
        self.report
            .info(format!("  New Time: {}", new_start.format("%Y-%m-%d %H:%M")));

        event.start.date_time = Some(new_start.to_rfc3339());
        event.end.date_time = Some(new_end.to_rfc3339());

        match self.api.update_event(&self.settings.calendar_id, &event).await {
            Ok(_) => {
                self.report.info(format!(
                    "Rescheduled meeting: {} to {}",
                    event.title(),
                    new_start.fixed_offset()
                ));
                self.report.record(Outcome::Rescheduled {
                    event_id: event.id.clone(),
                    title: event.title().to_string(),
                    from: original_start,
                    to: new_start.fixed_offset(),
                });
            }
            Err(e) => {
                self.report
                    .error(format!("Failed to reschedule '{}': {}", event.title(), e));
                self.report.record(Outcome::UpdateFailed {
                    event_id: event.id.clone(),
                    title: event.title().to_string(),
                    to: new_start.fixed_offset(),
                    reason: e.to_string(),
                });
            }
        }
    }
}
