use super::models::EventDateTime;
use crate::error::{google_calendar_error, input_error, RescheduleResult};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Parse time string in HH:MM format
pub fn parse_time(time_str: &str) -> Option<(u32, u32)> {
    let parts: Vec<&str> = time_str.trim().split(':').collect();
    if parts.len() != 2 {
        return None;
    }
    let hour = parts[0].parse::<u32>().ok()?;
    let minute = parts[1].parse::<u32>().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    Some((hour, minute))
}

/// Parse an HH:MM time of day
pub fn parse_time_of_day(time_str: &str) -> RescheduleResult<NaiveTime> {
    parse_time(time_str)
        .and_then(|(hour, minute)| NaiveTime::from_hms_opt(hour, minute, 0))
        .ok_or_else(|| input_error("Invalid time slot format. Use HH:MM."))
}

/// Parse a comma-separated list of YYYY-MM-DD dates
pub fn parse_date_list(dates: &str, kind: &str) -> RescheduleResult<Vec<NaiveDate>> {
    dates
        .split(',')
        .map(|date| {
            NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").map_err(|_| {
                input_error(&format!(
                    "Invalid {} dates format. Use a comma-separated list of YYYY-MM-DD.",
                    kind
                ))
            })
        })
        .collect()
}

/// Resolve an IANA time zone name such as `Europe/Helsinki`
pub fn parse_timezone(name: &str) -> RescheduleResult<Tz> {
    name.parse::<Tz>()
        .map_err(|_| google_calendar_error(&format!("Unknown calendar time zone: {}", name)))
}

/// Combine a date and a wall-clock time in the given zone
pub fn localize(tz: Tz, date: NaiveDate, time: NaiveTime) -> RescheduleResult<DateTime<Tz>> {
    let naive = date.and_time(time);
    match tz.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) => Ok(dt),
        // Repeated hour after a DST change, use the first occurrence
        chrono::LocalResult::Ambiguous(earliest, _) => Ok(earliest),
        chrono::LocalResult::None => Err(input_error(&format!(
            "{} does not exist in time zone {}",
            naive, tz
        ))),
    }
}

/// The whole UTC day, from midnight to the last microsecond
pub fn utc_day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN));
    let end = start + Duration::days(1) - Duration::microseconds(1);
    (start, end)
}

/// Parse an RFC 3339 timestamp as returned by the Calendar API
pub fn parse_rfc3339(value: &str) -> RescheduleResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| google_calendar_error(&format!("Failed to parse datetime '{}': {}", value, e)))
}

/// Resolve an event boundary to an instant. All-day boundaries resolve to
/// midnight in the calendar zone.
pub fn event_instant(boundary: &EventDateTime, tz: Tz) -> RescheduleResult<Option<DateTime<Utc>>> {
    if let Some(date_time) = &boundary.date_time {
        Ok(Some(parse_rfc3339(date_time)?))
    } else if let Some(date) = &boundary.date {
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|e| google_calendar_error(&format!("Failed to parse date: {}", e)))?;
        Ok(Some(localize(tz, date, NaiveTime::MIN)?.with_timezone(&Utc)))
    } else {
        Ok(None)
    }
}

/// Parse legacy naive expiry timestamps, which are UTC
pub fn parse_utc_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| Utc.from_utc_datetime(&naive))
        })
}
