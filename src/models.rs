use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AttendanceError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Builds a coordinate, rejecting latitudes outside [-90, 90] and
    /// longitudes outside [-180, 180] (NaN included).
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, AttendanceError> {
        let coordinate = Self {
            latitude,
            longitude,
        };
        coordinate.validate()?;
        Ok(coordinate)
    }

    pub fn validate(&self) -> Result<(), AttendanceError> {
        if (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude) {
            Ok(())
        } else {
            Err(AttendanceError::InvalidCoordinate {
                latitude: self.latitude,
                longitude: self.longitude,
            })
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}, {:.6}", self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizedZone {
    pub center: Coordinate,
    pub radius_meters: f64,
    pub label: String,
}

impl AuthorizedZone {
    pub fn new(
        center: Coordinate,
        radius_meters: f64,
        label: impl Into<String>,
    ) -> Result<Self, AttendanceError> {
        let zone = Self {
            center,
            radius_meters,
            label: label.into(),
        };
        zone.validate()?;
        Ok(zone)
    }

    /// The fixed office zone used when no administrator has configured one.
    pub fn office_default() -> Self {
        Self {
            center: Coordinate {
                latitude: 12.933382651731844,
                longitude: 77.70289831523786,
            },
            radius_meters: 2000.0,
            label: "Office Location".to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), AttendanceError> {
        self.center.validate()?;
        // `!(x > 0)` also catches NaN.
        if !(self.radius_meters > 0.0) {
            return Err(AttendanceError::InvalidZone {
                radius_meters: self.radius_meters,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttendanceKind {
    #[serde(rename = "auto_geotagged")]
    AutoGeofenced,
    #[serde(rename = "manual")]
    Manual,
}

impl AttendanceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceKind::AutoGeofenced => "auto_geotagged",
            AttendanceKind::Manual => "manual",
        }
    }

    /// Label shown in record listings.
    pub fn label(&self) -> &'static str {
        match self {
            AttendanceKind::AutoGeofenced => "Geotagged",
            AttendanceKind::Manual => "Manual",
        }
    }
}

impl FromStr for AttendanceKind {
    type Err = AttendanceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "auto_geotagged" => Ok(AttendanceKind::AutoGeofenced),
            "manual" => Ok(AttendanceKind::Manual),
            other => Err(AttendanceError::UnknownKind(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceEvent {
    pub id: Uuid,
    pub subject_id: String,
    pub occurred_at: DateTime<Utc>,
    pub kind: AttendanceKind,
    pub coordinate: Option<Coordinate>,
    pub recorded_by: String,
    pub reason: Option<String>,
}

impl AttendanceEvent {
    /// A fresh event with a generated id, stamped at `occurred_at`.
    pub fn new(
        subject_id: impl Into<String>,
        occurred_at: DateTime<Utc>,
        kind: AttendanceKind,
        coordinate: Option<Coordinate>,
        recorded_by: impl Into<String>,
        reason: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            subject_id: subject_id.into(),
            occurred_at,
            kind,
            coordinate,
            recorded_by: recorded_by.into(),
            reason,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AttendanceSummary {
    pub total_working_days: u32,
    pub days_present: u32,
    pub days_absent: u32,
    pub attendance_percentage: f64,
}

impl AttendanceSummary {
    pub fn empty() -> Self {
        Self {
            total_working_days: 0,
            days_present: 0,
            days_absent: 0,
            attendance_percentage: 0.0,
        }
    }
}

/// Display-ready rendering of a single attendance event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormattedRecord {
    pub date: String,
    pub time: String,
    pub kind: String,
    pub location: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneEvaluation {
    pub distance_meters: f64,
    pub is_inside: bool,
}

/// Result of asking "where is the subject relative to the zone".
/// `Unavailable` means the location provider gave us nothing, which is
/// different from being outside the zone.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationStatus {
    Unavailable,
    Located {
        coordinate: Coordinate,
        evaluation: ZoneEvaluation,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Employee,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Employee => "employee",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = AttendanceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "employee" => Ok(Role::Employee),
            "admin" => Ok(Role::Admin),
            other => Err(AttendanceError::UnknownRole(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
}
