use std::io::Read;

use anyhow::{bail, Context};
use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{
    AttendanceEvent, AttendanceKind, AuthorizedZone, Coordinate, Role, User, UserUpdate,
};
use crate::store::AttendanceStore;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Postgres-backed [`AttendanceStore`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const EVENT_COLUMNS: &str =
    "id, subject_id, occurred_at, kind, latitude, longitude, recorded_by, reason";
const USER_COLUMNS: &str = "id, full_name, email, role, created_at";

fn event_from_row(row: &PgRow) -> anyhow::Result<AttendanceEvent> {
    let kind: String = row.try_get("kind")?;
    let latitude: Option<f64> = row.try_get("latitude")?;
    let longitude: Option<f64> = row.try_get("longitude")?;

    Ok(AttendanceEvent {
        id: row.try_get("id")?,
        subject_id: row.try_get("subject_id")?,
        occurred_at: row.try_get("occurred_at")?,
        kind: kind.parse()?,
        coordinate: match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinate {
                latitude,
                longitude,
            }),
            _ => None,
        },
        recorded_by: row.try_get("recorded_by")?,
        reason: row.try_get("reason")?,
    })
}

fn user_from_row(row: &PgRow) -> anyhow::Result<User> {
    let role: String = row.try_get("role")?;
    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("full_name")?,
        email: row.try_get("email")?,
        role: role.parse()?,
        created_at: row.try_get("created_at")?,
    })
}

impl AttendanceStore for PgStore {
    async fn record_event(&self, event: &AttendanceEvent) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO geofence_attendance.attendance_events
            (id, subject_id, occurred_at, kind, latitude, longitude, recorded_by, reason)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(event.id)
        .bind(&event.subject_id)
        .bind(event.occurred_at)
        .bind(event.kind.as_str())
        .bind(event.coordinate.map(|c| c.latitude))
        .bind(event.coordinate.map(|c| c.longitude))
        .bind(&event.recorded_by)
        .bind(&event.reason)
        .execute(&self.pool)
        .await?;

        debug!(event_id = %event.id, inserted = result.rows_affected() > 0, "recorded event");
        Ok(result.rows_affected() > 0)
    }

    async fn events_for_subject(
        &self,
        subject_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<AttendanceEvent>> {
        let query = format!(
            "SELECT {EVENT_COLUMNS} FROM geofence_attendance.attendance_events \
             WHERE subject_id = $1 AND occurred_at >= $2 AND occurred_at <= $3 \
             ORDER BY occurred_at DESC"
        );
        let rows = sqlx::query(&query)
            .bind(subject_id)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(event_from_row).collect()
    }

    async fn events_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<AttendanceEvent>> {
        let query = format!(
            "SELECT {EVENT_COLUMNS} FROM geofence_attendance.attendance_events \
             WHERE occurred_at >= $1 AND occurred_at <= $2 \
             ORDER BY occurred_at DESC"
        );
        let rows = sqlx::query(&query)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(event_from_row).collect()
    }

    async fn current_zone(&self) -> anyhow::Result<AuthorizedZone> {
        let row = sqlx::query(
            "SELECT latitude, longitude, radius_meters, label \
             FROM geofence_attendance.authorized_zone WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(AuthorizedZone::office_default());
        };
        let zone = AuthorizedZone {
            center: Coordinate {
                latitude: row.try_get("latitude")?,
                longitude: row.try_get("longitude")?,
            },
            radius_meters: row.try_get("radius_meters")?,
            label: row.try_get("label")?,
        };
        zone.validate().context("stored authorized zone is invalid")?;
        Ok(zone)
    }

    async fn set_zone(&self, zone: &AuthorizedZone) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO geofence_attendance.authorized_zone
            (id, latitude, longitude, radius_meters, label, updated_at)
            VALUES (1, $1, $2, $3, $4, now())
            ON CONFLICT (id) DO UPDATE
            SET latitude = EXCLUDED.latitude,
                longitude = EXCLUDED.longitude,
                radius_meters = EXCLUDED.radius_meters,
                label = EXCLUDED.label,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(zone.center.latitude)
        .bind(zone.center.longitude)
        .bind(zone.radius_meters)
        .bind(&zone.label)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_user(&self, user: &User) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO geofence_attendance.users (id, full_name, email, role, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE
            SET full_name = EXCLUDED.full_name, email = EXCLUDED.email, role = EXCLUDED.role
            "#,
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_user(&self, id: &str) -> anyhow::Result<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM geofence_attendance.users WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn list_users(&self) -> anyhow::Result<Vec<User>> {
        let query =
            format!("SELECT {USER_COLUMNS} FROM geofence_attendance.users ORDER BY full_name");
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter().map(user_from_row).collect()
    }

    async fn update_user(&self, id: &str, update: &UserUpdate) -> anyhow::Result<Option<User>> {
        let query = format!(
            "UPDATE geofence_attendance.users \
             SET full_name = COALESCE($2, full_name), \
                 email = COALESCE($3, email), \
                 role = COALESCE($4, role) \
             WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query(&query)
            .bind(id)
            .bind(update.name.as_deref())
            .bind(update.email.as_deref())
            .bind(update.role.map(|role| role.as_str()))
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn delete_user(&self, id: &str) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM geofence_attendance.users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

pub async fn seed<S: AttendanceStore>(store: &S, now: DateTime<Utc>) -> anyhow::Result<()> {
    let users = [
        ("demo_user", "Demo User", "demo@example.com", Role::Employee),
        ("admin_user", "Admin User", "admin@example.com", Role::Admin),
    ];
    for (id, name, email, role) in users {
        store
            .save_user(&User {
                id: id.to_string(),
                name: name.to_string(),
                email: email.to_string(),
                role,
                created_at: now,
            })
            .await?;
    }

    let office = AuthorizedZone::office_default();
    let events = [
        (
            "6f1c2d0e-5a7b-4c1e-9d3f-1b2a3c4d5e01",
            1,
            AttendanceKind::AutoGeofenced,
            None,
        ),
        (
            "6f1c2d0e-5a7b-4c1e-9d3f-1b2a3c4d5e02",
            2,
            AttendanceKind::Manual,
            Some("Badge reader offline"),
        ),
        (
            "6f1c2d0e-5a7b-4c1e-9d3f-1b2a3c4d5e03",
            4,
            AttendanceKind::AutoGeofenced,
            None,
        ),
    ];
    for (id, days_ago, kind, reason) in events {
        let occurred_at = now - Duration::days(days_ago);
        let (coordinate, recorded_by) = match kind {
            AttendanceKind::AutoGeofenced => (Some(office.center), "demo_user"),
            AttendanceKind::Manual => (None, "admin_user"),
        };
        store
            .record_event(&AttendanceEvent {
                id: Uuid::parse_str(id)?,
                subject_id: "demo_user".to_string(),
                occurred_at,
                kind,
                coordinate,
                recorded_by: recorded_by.to_string(),
                reason: reason.map(str::to_string),
            })
            .await?;
    }

    info!("seed data written");
    Ok(())
}

/// Parses attendance events from CSV with the header
/// `id,subject_id,occurred_at,kind,latitude,longitude,recorded_by,reason`.
/// Only `subject_id`, `occurred_at`, `kind` and `recorded_by` are required.
pub fn parse_events_csv<R: Read>(reader: R) -> anyhow::Result<Vec<AttendanceEvent>> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        id: Option<Uuid>,
        subject_id: String,
        occurred_at: DateTime<Utc>,
        kind: String,
        latitude: Option<f64>,
        longitude: Option<f64>,
        recorded_by: String,
        reason: Option<String>,
    }

    let mut reader = csv::Reader::from_reader(reader);
    let mut events = Vec::new();

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let line = index + 2;
        let row = result.with_context(|| format!("malformed CSV row on line {line}"))?;
        let coordinate = match (row.latitude, row.longitude) {
            (Some(latitude), Some(longitude)) => Some(
                Coordinate::new(latitude, longitude)
                    .with_context(|| format!("line {line}"))?,
            ),
            (None, None) => None,
            _ => bail!("line {line}: latitude and longitude must be given together"),
        };

        events.push(AttendanceEvent {
            id: row.id.unwrap_or_else(Uuid::new_v4),
            subject_id: row.subject_id,
            occurred_at: row.occurred_at,
            kind: row
                .kind
                .parse::<AttendanceKind>()
                .with_context(|| format!("line {line}"))?,
            coordinate,
            recorded_by: row.recorded_by,
            reason: row.reason.filter(|reason| !reason.trim().is_empty()),
        });
    }

    Ok(events)
}

pub async fn import_csv<S: AttendanceStore>(
    store: &S,
    csv_path: &std::path::Path,
) -> anyhow::Result<usize> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let events = parse_events_csv(file)?;
    let mut inserted = 0usize;

    for event in &events {
        if store.record_event(event).await? {
            inserted += 1;
        }
    }

    info!(parsed = events.len(), inserted, "csv import finished");
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    const HEADER: &str = "id,subject_id,occurred_at,kind,latitude,longitude,recorded_by,reason\n";

    #[test]
    fn parses_geotagged_and_manual_rows() {
        let csv = format!(
            "{HEADER}\
             ,demo_user,2026-10-12T09:00:00Z,auto_geotagged,12.934,77.7035,demo_user,\n\
             9b2f4c1a-0d3e-4f5a-8b6c-7d8e9f0a1b2c,demo_user,2026-10-13T10:30:00+05:30,manual,,,admin_user,Forgot phone\n"
        );
        let events = parse_events_csv(csv.as_bytes()).unwrap();
        assert_eq!(events.len(), 2);

        assert_eq!(events[0].kind, AttendanceKind::AutoGeofenced);
        assert_eq!(
            events[0].coordinate,
            Some(Coordinate::new(12.934, 77.7035).unwrap())
        );
        assert_eq!(events[0].reason, None);

        assert_eq!(
            events[1].id,
            Uuid::parse_str("9b2f4c1a-0d3e-4f5a-8b6c-7d8e9f0a1b2c").unwrap()
        );
        assert_eq!(events[1].occurred_at, Utc.with_ymd_and_hms(2026, 10, 13, 5, 0, 0).unwrap());
        assert_eq!(events[1].coordinate, None);
        assert_eq!(events[1].reason.as_deref(), Some("Forgot phone"));
    }

    #[test]
    fn rejects_bad_rows() {
        let half_coordinate =
            format!("{HEADER},u1,2026-10-12T09:00:00Z,manual,12.9,,admin,\n");
        assert!(parse_events_csv(half_coordinate.as_bytes()).is_err());

        let out_of_range =
            format!("{HEADER},u1,2026-10-12T09:00:00Z,auto_geotagged,95.0,10.0,u1,\n");
        assert!(parse_events_csv(out_of_range.as_bytes()).is_err());

        let unknown_kind = format!("{HEADER},u1,2026-10-12T09:00:00Z,remote,,,u1,\n");
        assert!(parse_events_csv(unknown_kind.as_bytes()).is_err());
    }

    #[tokio::test]
    async fn seed_is_idempotent() {
        let store = MemoryStore::new();
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();
        seed(&store, now).await.unwrap();
        seed(&store, now).await.unwrap();

        assert_eq!(store.list_users().await.unwrap().len(), 2);
        let events = store
            .events_between(now - Duration::days(30), now)
            .await
            .unwrap();
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|event| event.subject_id == "demo_user"));
    }
}
