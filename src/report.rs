use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::geo;
use crate::models::{AttendanceEvent, AttendanceSummary, AuthorizedZone};
use crate::summary::{self, Calendar, Period};

pub fn build_report(
    subject_label: &str,
    zone: &AuthorizedZone,
    now: DateTime<Utc>,
    calendar: &Calendar,
    summaries: &[(Period, AttendanceSummary)],
    events: &[AttendanceEvent],
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Attendance Report");
    let _ = writeln!(
        output,
        "Generated for {} on {} (UTC{})",
        subject_label,
        now.with_timezone(&calendar.offset()).format("%b %d, %Y %H:%M"),
        calendar.offset()
    );
    let _ = writeln!(
        output,
        "Authorized zone: {} ({}, radius {})",
        zone.label,
        zone.center,
        geo::format_distance(zone.radius_meters)
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");

    for (period, summary) in summaries {
        let _ = writeln!(
            output,
            "- {}: {}/{} working days present, {} absent ({:.1}%)",
            period.label(),
            summary.days_present,
            summary.total_working_days,
            summary.days_absent,
            summary.attendance_percentage
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Records");

    if events.is_empty() {
        let _ = writeln!(output, "No attendance recorded for this window.");
        return output;
    }

    let groups = summary::group_by_date(events, calendar);
    for (date, day_events) in groups.iter().rev() {
        let _ = writeln!(output);
        let _ = writeln!(output, "### {date}");
        for event in day_events {
            let record = summary::format_record(event, calendar);
            let _ = writeln!(
                output,
                "- {} {} | location: {} | reason: {}",
                record.time, record.kind, record.location, record.reason
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttendanceKind, Coordinate};
    use chrono::TimeZone;

    #[test]
    fn report_lists_summaries_and_groups_newest_day_first() {
        let calendar = Calendar::utc();
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 17, 0, 0).unwrap();
        let events = vec![
            AttendanceEvent::new(
                "demo_user",
                Utc.with_ymd_and_hms(2026, 10, 14, 9, 0, 0).unwrap(),
                AttendanceKind::Manual,
                None,
                "admin_user",
                Some("Badge reader offline".to_string()),
            ),
            AttendanceEvent::new(
                "demo_user",
                Utc.with_ymd_and_hms(2026, 10, 12, 9, 0, 0).unwrap(),
                AttendanceKind::AutoGeofenced,
                Some(Coordinate::new(12.934, 77.7035).unwrap()),
                "demo_user",
                None,
            ),
        ];
        let summaries: Vec<_> = Period::ALL
            .iter()
            .map(|period| (*period, summary::summarize_period(&events, *period, now, &calendar)))
            .collect();

        let report = build_report(
            "Demo User",
            &AuthorizedZone::office_default(),
            now,
            &calendar,
            &summaries,
            &events,
        );

        assert!(report.contains("Generated for Demo User on Oct 16, 2026 17:00"));
        assert!(report.contains("radius 2.0km"));
        assert!(report.contains("- Week to date: 2/5 working days present, 3 absent (40.0%)"));
        assert!(report.contains("- 09:00 Manual | location: N/A | reason: Badge reader offline"));
        assert!(report.contains("- 09:00 Geotagged | location: 12.934000, 77.703500 | reason: N/A"));

        let newer = report.find("### 2026-10-14").unwrap();
        let older = report.find("### 2026-10-12").unwrap();
        assert!(newer < older);
    }

    #[test]
    fn empty_report_says_so() {
        let report = build_report(
            "Nobody",
            &AuthorizedZone::office_default(),
            Utc::now(),
            &Calendar::utc(),
            &[],
            &[],
        );
        assert!(report.contains("No attendance recorded for this window."));
    }
}
