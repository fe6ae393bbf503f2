use thiserror::Error;

/// Validation failures raised by the attendance core before any computation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AttendanceError {
    #[error("coordinate ({latitude}, {longitude}) is outside the valid range")]
    InvalidCoordinate { latitude: f64, longitude: f64 },

    #[error("zone radius must be positive, got {radius_meters}")]
    InvalidZone { radius_meters: f64 },

    #[error("invalid UTC offset `{0}`, expected something like +05:30")]
    InvalidUtcOffset(String),

    #[error("unknown attendance kind `{0}`")]
    UnknownKind(String),

    #[error("unknown role `{0}`")]
    UnknownRole(String),

    #[error("user `{0}` not found")]
    UserNotFound(String),

    #[error("{0} must not be blank")]
    BlankField(&'static str),
}
