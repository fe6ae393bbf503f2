use chrono::{DateTime, Utc};

use crate::models::{AttendanceEvent, AuthorizedZone, User, UserUpdate};

/// Persistence collaborator for attendance events, the authorized zone and
/// user profiles.
///
/// Implementations are constructed explicitly and handed to callers by
/// reference. Nothing here is atomic across calls: a read followed by a write
/// may race with another writer, and the last write wins.
#[allow(async_fn_in_trait)]
pub trait AttendanceStore {
    /// Persists a new event. Returns `false` when an event with the same id
    /// already exists and nothing was written.
    async fn record_event(&self, event: &AttendanceEvent) -> anyhow::Result<bool>;

    /// Events for one subject with `start <= occurred_at <= end`, newest first.
    async fn events_for_subject(
        &self,
        subject_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<AttendanceEvent>>;

    /// Events for every subject in the window, newest first.
    async fn events_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<AttendanceEvent>>;

    /// The zone currently in force. Falls back to
    /// [`AuthorizedZone::office_default`] when none has been configured.
    async fn current_zone(&self) -> anyhow::Result<AuthorizedZone>;

    async fn set_zone(&self, zone: &AuthorizedZone) -> anyhow::Result<()>;

    /// Inserts the user, or overwrites the profile stored under the same id.
    async fn save_user(&self, user: &User) -> anyhow::Result<()>;

    async fn get_user(&self, id: &str) -> anyhow::Result<Option<User>>;

    /// All users ordered by name.
    async fn list_users(&self) -> anyhow::Result<Vec<User>>;

    async fn update_user(&self, id: &str, update: &UserUpdate) -> anyhow::Result<Option<User>>;

    /// Returns `false` when no user had that id.
    async fn delete_user(&self, id: &str) -> anyhow::Result<bool>;
}

#[cfg(test)]
pub use memory::MemoryStore;
