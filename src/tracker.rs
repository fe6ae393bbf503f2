use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::geo;
use crate::models::{
    AttendanceEvent, AttendanceKind, AttendanceSummary, Coordinate, LocationStatus,
};
use crate::store::AttendanceStore;
use crate::summary::{self, Calendar, Period};

#[derive(Debug, Clone, PartialEq)]
pub enum CheckInOutcome {
    /// The location provider produced no coordinate; nothing was evaluated.
    NoLocation,
    OutsideZone { distance_meters: f64 },
    AlreadyMarked(AttendanceEvent),
    Marked(AttendanceEvent),
}

/// Evaluates the subject's position against the zone currently in the store
/// and records an auto-geofenced event when they are inside and have no
/// record for today yet.
pub async fn check_in<S: AttendanceStore>(
    store: &S,
    subject_id: &str,
    current: Option<Coordinate>,
    now: DateTime<Utc>,
    calendar: &Calendar,
) -> anyhow::Result<CheckInOutcome> {
    let zone = store
        .current_zone()
        .await
        .context("failed to load the authorized zone")?;

    let (coordinate, evaluation) = match geo::location_status(current, &zone)? {
        LocationStatus::Unavailable => {
            info!(subject = subject_id, "no location available, skipping check-in");
            return Ok(CheckInOutcome::NoLocation);
        }
        LocationStatus::Located {
            coordinate,
            evaluation,
        } => (coordinate, evaluation),
    };

    debug!(
        subject = subject_id,
        distance_m = evaluation.distance_meters,
        zone = %zone.label,
        "evaluated location"
    );

    if !evaluation.is_inside {
        return Ok(CheckInOutcome::OutsideZone {
            distance_meters: evaluation.distance_meters,
        });
    }

    if let Some(existing) = todays_record(store, subject_id, now, calendar).await? {
        return Ok(CheckInOutcome::AlreadyMarked(existing));
    }

    let event = AttendanceEvent::new(
        subject_id,
        now,
        AttendanceKind::AutoGeofenced,
        Some(coordinate),
        subject_id,
        None,
    );
    store
        .record_event(&event)
        .await
        .context("failed to record attendance")?;
    info!(subject = subject_id, event_id = %event.id, "attendance auto-marked");

    Ok(CheckInOutcome::Marked(event))
}

/// Records attendance on someone's behalf without any location check.
pub async fn mark_manual<S: AttendanceStore>(
    store: &S,
    subject_id: &str,
    recorded_by: &str,
    reason: Option<String>,
    now: DateTime<Utc>,
) -> anyhow::Result<AttendanceEvent> {
    let reason = reason
        .map(|reason| reason.trim().to_string())
        .filter(|reason| !reason.is_empty());
    let event = AttendanceEvent::new(
        subject_id,
        now,
        AttendanceKind::Manual,
        None,
        recorded_by,
        reason,
    );
    store
        .record_event(&event)
        .await
        .context("failed to record manual attendance")?;
    info!(
        subject = subject_id,
        recorded_by,
        event_id = %event.id,
        "manual attendance recorded"
    );
    Ok(event)
}

/// Most recent event for the subject on the calendar day containing `now`.
pub async fn todays_record<S: AttendanceStore>(
    store: &S,
    subject_id: &str,
    now: DateTime<Utc>,
    calendar: &Calendar,
) -> anyhow::Result<Option<AttendanceEvent>> {
    let today = calendar.date_of(now);
    let start = calendar.start_of_day(today);
    let end = calendar.start_of_day(today + Duration::days(1)) - Duration::nanoseconds(1);

    let events = store
        .events_for_subject(subject_id, start, end)
        .await
        .context("failed to load today's attendance")?;
    Ok(events.into_iter().max_by_key(|event| event.occurred_at))
}

/// Events from `since_days` calendar days ago up to `now`, newest first.
/// Without a subject every subject's events are returned.
pub async fn recent_records<S: AttendanceStore>(
    store: &S,
    subject_id: Option<&str>,
    since_days: i64,
    now: DateTime<Utc>,
    calendar: &Calendar,
) -> anyhow::Result<Vec<AttendanceEvent>> {
    let first_day = calendar.date_of(now) - Duration::days(since_days.max(0));
    let start = calendar.start_of_day(first_day);
    let events = match subject_id {
        Some(subject_id) => store.events_for_subject(subject_id, start, now).await,
        None => store.events_between(start, now).await,
    };
    events.context("failed to load attendance records")
}

/// Week-, month- and quarter-to-date summaries for a subject.
///
/// A single fetch from the start of the widest window (the quarter, or the
/// week when it straddles a quarter boundary) feeds all three.
pub async fn period_summaries<S: AttendanceStore>(
    store: &S,
    subject_id: &str,
    now: DateTime<Utc>,
    calendar: &Calendar,
) -> anyhow::Result<Vec<(Period, AttendanceSummary)>> {
    let earliest = Period::ALL
        .iter()
        .map(|period| period.window(now, calendar).0)
        .min()
        .unwrap_or(now);
    let events = store
        .events_for_subject(subject_id, earliest, now)
        .await
        .context("failed to load attendance for summaries")?;

    Ok(Period::ALL
        .iter()
        .map(|period| {
            (
                *period,
                summary::summarize_period(&events, *period, now, calendar),
            )
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AuthorizedZone;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, d, h, 0, 0).unwrap()
    }

    fn near_office() -> Coordinate {
        Coordinate::new(12.9340, 77.7035).unwrap()
    }

    #[tokio::test]
    async fn missing_location_is_reported_and_nothing_recorded() {
        let store = MemoryStore::new();
        let outcome = check_in(&store, "u1", None, at(12, 9), &Calendar::utc())
            .await
            .unwrap();
        assert_eq!(outcome, CheckInOutcome::NoLocation);
        assert!(store.events_between(at(1, 0), at(31, 0)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn outside_zone_reports_distance() {
        let store = MemoryStore::new();
        let far = Coordinate::new(13.0827, 80.2707).unwrap();
        let outcome = check_in(&store, "u1", Some(far), at(12, 9), &Calendar::utc())
            .await
            .unwrap();
        match outcome {
            CheckInOutcome::OutsideZone { distance_meters } => assert!(distance_meters > 2000.0),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn inside_zone_marks_once_per_day() {
        let store = MemoryStore::new();
        let calendar = Calendar::utc();

        let first = check_in(&store, "u1", Some(near_office()), at(12, 9), &calendar)
            .await
            .unwrap();
        let CheckInOutcome::Marked(event) = first else {
            panic!("expected a new record, got {first:?}");
        };
        assert_eq!(event.kind, AttendanceKind::AutoGeofenced);
        assert_eq!(event.coordinate, Some(near_office()));
        assert_eq!(event.recorded_by, "u1");

        let second = check_in(&store, "u1", Some(near_office()), at(12, 15), &calendar)
            .await
            .unwrap();
        assert_eq!(second, CheckInOutcome::AlreadyMarked(event));

        let next_day = check_in(&store, "u1", Some(near_office()), at(13, 9), &calendar)
            .await
            .unwrap();
        assert!(matches!(next_day, CheckInOutcome::Marked(_)));
    }

    #[tokio::test]
    async fn check_in_uses_the_zone_currently_stored() {
        let store = MemoryStore::new();
        let calendar = Calendar::utc();
        let elsewhere = Coordinate::new(48.8566, 2.3522).unwrap();

        let before = check_in(&store, "u1", Some(elsewhere), at(12, 9), &calendar)
            .await
            .unwrap();
        assert!(matches!(before, CheckInOutcome::OutsideZone { .. }));

        let paris = AuthorizedZone::new(elsewhere, 100.0, "Paris office").unwrap();
        store.set_zone(&paris).await.unwrap();
        let after = check_in(&store, "u1", Some(elsewhere), at(12, 10), &calendar)
            .await
            .unwrap();
        assert!(matches!(after, CheckInOutcome::Marked(_)));
    }

    #[tokio::test]
    async fn invalid_coordinate_is_rejected() {
        let store = MemoryStore::new();
        let bogus = Coordinate {
            latitude: 200.0,
            longitude: 0.0,
        };
        let result = check_in(&store, "u1", Some(bogus), at(12, 9), &Calendar::utc()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn manual_marks_skip_location_and_keep_reason() {
        let store = MemoryStore::new();
        let event = mark_manual(&store, "u1", "admin_user", Some("  Site visit ".into()), at(12, 11))
            .await
            .unwrap();
        assert_eq!(event.kind, AttendanceKind::Manual);
        assert_eq!(event.coordinate, None);
        assert_eq!(event.reason.as_deref(), Some("Site visit"));
        assert_eq!(event.recorded_by, "admin_user");

        let blank = mark_manual(&store, "u1", "admin_user", Some("   ".into()), at(13, 11))
            .await
            .unwrap();
        assert_eq!(blank.reason, None);
    }

    #[tokio::test]
    async fn todays_record_respects_calendar_offset() {
        let store = MemoryStore::new();
        // 20:00 UTC on the 12th is already the 13th at +05:30.
        mark_manual(&store, "u1", "admin", None, at(12, 20)).await.unwrap();

        let utc_today = todays_record(&store, "u1", at(12, 21), &Calendar::utc())
            .await
            .unwrap();
        assert!(utc_today.is_some());

        let india = Calendar::parse_offset("+05:30").unwrap();
        let india_today = todays_record(&store, "u1", at(12, 10), &india).await.unwrap();
        assert!(india_today.is_none());
    }

    #[tokio::test]
    async fn period_summaries_cover_week_month_and_quarter() {
        let store = MemoryStore::new();
        mark_manual(&store, "u1", "admin", None, at(12, 9)).await.unwrap();
        mark_manual(&store, "u1", "admin", None, at(14, 9)).await.unwrap();
        mark_manual(&store, "someone-else", "admin", None, at(13, 9)).await.unwrap();

        let summaries = period_summaries(&store, "u1", at(16, 17), &Calendar::utc())
            .await
            .unwrap();
        assert_eq!(summaries.len(), 3);

        let (period, week) = summaries[0];
        assert_eq!(period, Period::WeekToDate);
        assert_eq!(week.total_working_days, 5);
        assert_eq!(week.days_present, 2);
        assert!((week.attendance_percentage - 40.0).abs() < 1e-9);

        let (_, month) = summaries[1];
        assert_eq!(month.total_working_days, 12);
        assert_eq!(month.days_present, 2);
    }

    #[tokio::test]
    async fn recent_records_are_newest_first() {
        let store = MemoryStore::new();
        mark_manual(&store, "u1", "admin", None, at(12, 9)).await.unwrap();
        mark_manual(&store, "u1", "admin", None, at(14, 9)).await.unwrap();
        mark_manual(&store, "u1", "admin", None, at(1, 9)).await.unwrap();

        mark_manual(&store, "u2", "admin", None, at(13, 9)).await.unwrap();

        let records = recent_records(&store, Some("u1"), 7, at(16, 17), &Calendar::utc())
            .await
            .unwrap();
        let times: Vec<_> = records.iter().map(|e| e.occurred_at).collect();
        assert_eq!(times, vec![at(14, 9), at(12, 9)]);

        let everyone = recent_records(&store, None, 7, at(16, 17), &Calendar::utc())
            .await
            .unwrap();
        let times: Vec<_> = everyone.iter().map(|e| e.occurred_at).collect();
        assert_eq!(times, vec![at(14, 9), at(13, 9), at(12, 9)]);
    }
}
