use std::collections::BTreeMap;

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, Utc, Weekday,
};

use crate::error::AttendanceError;
use crate::models::{AttendanceEvent, AttendanceSummary, FormattedRecord};

/// Shown in record listings when a field has no value.
pub const NOT_APPLICABLE: &str = "N/A";

/// Calendar convention used to turn instants into calendar days.
///
/// Every day-bucketing operation goes through an explicit fixed UTC offset so
/// results never depend on the host clock's locale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calendar {
    offset: FixedOffset,
}

impl Calendar {
    pub fn utc() -> Self {
        Self {
            offset: Utc.fix(),
        }
    }

    pub fn with_offset(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Parses offsets such as `+05:30`, `-0800`, `+02` or `Z`.
    pub fn parse_offset(value: &str) -> Result<Self, AttendanceError> {
        let invalid = || AttendanceError::InvalidUtcOffset(value.to_string());
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case("z") || trimmed.eq_ignore_ascii_case("utc") {
            return Ok(Self::utc());
        }

        let (sign, rest) = match trimmed.chars().next() {
            Some('+') => (1, &trimmed[1..]),
            Some('-') => (-1, &trimmed[1..]),
            _ => return Err(invalid()),
        };
        let digits: String = rest.chars().filter(|c| *c != ':').collect();
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let (hours, minutes) = match digits.len() {
            2 => (&digits[..2], "0"),
            4 => (&digits[..2], &digits[2..]),
            _ => return Err(invalid()),
        };
        let hours: i32 = hours.parse().map_err(|_| invalid())?;
        let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
        if minutes >= 60 {
            return Err(invalid());
        }

        FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
            .map(Self::with_offset)
            .ok_or_else(invalid)
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Calendar day an instant falls on under this convention.
    pub fn date_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }

    /// The instant local midnight begins on `date`.
    pub fn start_of_day(&self, date: NaiveDate) -> DateTime<Utc> {
        let local_midnight = date.and_time(NaiveTime::MIN);
        (local_midnight - Duration::seconds(i64::from(self.offset.local_minus_utc()))).and_utc()
    }
}

impl Default for Calendar {
    fn default() -> Self {
        Self::utc()
    }
}

/// Reporting windows that run from the start of a calendar period up to now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    WeekToDate,
    MonthToDate,
    QuarterToDate,
}

impl Period {
    pub const ALL: [Period; 3] = [Period::WeekToDate, Period::MonthToDate, Period::QuarterToDate];

    pub fn label(&self) -> &'static str {
        match self {
            Period::WeekToDate => "Week to date",
            Period::MonthToDate => "Month to date",
            Period::QuarterToDate => "Quarter to date",
        }
    }

    /// First calendar day of the period containing `today`.
    pub fn start_date(&self, today: NaiveDate) -> NaiveDate {
        match self {
            Period::WeekToDate => {
                today - Duration::days(i64::from(today.weekday().num_days_from_monday()))
            }
            Period::MonthToDate => today.with_day(1).unwrap_or(today),
            Period::QuarterToDate => {
                let quarter_month = (today.month0() / 3) * 3 + 1;
                NaiveDate::from_ymd_opt(today.year(), quarter_month, 1).unwrap_or(today)
            }
        }
    }

    /// `(start, end)` where start is local midnight of the period's first day
    /// and end is `now` itself, so every window is a partial period.
    pub fn window(&self, now: DateTime<Utc>, calendar: &Calendar) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = self.start_date(calendar.date_of(now));
        (calendar.start_of_day(start), now)
    }
}

pub fn is_working_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Working days in `[start, end]`, both ends inclusive. Zero when start > end.
pub fn working_days_between(start: NaiveDate, end: NaiveDate) -> u32 {
    if start > end {
        return 0;
    }
    start
        .iter_days()
        .take_while(|day| *day <= end)
        .filter(|day| is_working_day(*day))
        .count() as u32
}

pub fn has_attendance_on(events: &[AttendanceEvent], date: NaiveDate, calendar: &Calendar) -> bool {
    events
        .iter()
        .any(|event| calendar.date_of(event.occurred_at) == date)
}

/// Attendance over the calendar days spanned by `[start, end]`.
///
/// A reversed window produces the all-zero summary instead of an error.
pub fn summarize(
    events: &[AttendanceEvent],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    calendar: &Calendar,
) -> AttendanceSummary {
    if start > end {
        return AttendanceSummary::empty();
    }

    let first = calendar.date_of(start);
    let last = calendar.date_of(end);

    let total_working_days = working_days_between(first, last);
    let days_present = first
        .iter_days()
        .take_while(|day| *day <= last)
        .filter(|day| is_working_day(*day) && has_attendance_on(events, *day, calendar))
        .count() as u32;

    AttendanceSummary {
        total_working_days,
        days_present,
        days_absent: total_working_days - days_present,
        attendance_percentage: percentage(days_present, total_working_days),
    }
}

pub fn summarize_period(
    events: &[AttendanceEvent],
    period: Period,
    now: DateTime<Utc>,
    calendar: &Calendar,
) -> AttendanceSummary {
    let (start, end) = period.window(now, calendar);
    summarize(events, start, end, calendar)
}

fn percentage(present: u32, total: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * f64::from(present) / f64::from(total)
    }
}

pub fn format_record(event: &AttendanceEvent, calendar: &Calendar) -> FormattedRecord {
    let local = event.occurred_at.with_timezone(&calendar.offset());

    FormattedRecord {
        date: local.format("%b %d, %Y").to_string(),
        time: local.format("%H:%M").to_string(),
        kind: event.kind.label().to_string(),
        location: event
            .coordinate
            .map(|coordinate| coordinate.to_string())
            .unwrap_or_else(|| NOT_APPLICABLE.to_string()),
        reason: event
            .reason
            .clone()
            .filter(|reason| !reason.is_empty())
            .unwrap_or_else(|| NOT_APPLICABLE.to_string()),
    }
}

/// Buckets events by `YYYY-MM-DD`. Within a day events keep the order they
/// were supplied in.
pub fn group_by_date<'a>(
    events: &'a [AttendanceEvent],
    calendar: &Calendar,
) -> BTreeMap<String, Vec<&'a AttendanceEvent>> {
    let mut groups: BTreeMap<String, Vec<&AttendanceEvent>> = BTreeMap::new();
    for event in events {
        let key = calendar.date_of(event.occurred_at).format("%Y-%m-%d").to_string();
        groups.entry(key).or_default().push(event);
    }
    groups
}
