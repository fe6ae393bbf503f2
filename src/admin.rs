use anyhow::Context;
use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::error::AttendanceError;
use crate::models::{AuthorizedZone, Role, User, UserUpdate};
use crate::store::AttendanceStore;

fn required(value: &str, field: &'static str) -> Result<String, AttendanceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(AttendanceError::BlankField(field))
    } else {
        Ok(trimmed.to_string())
    }
}

pub async fn create_user<S: AttendanceStore>(
    store: &S,
    name: &str,
    email: &str,
    role: Role,
    now: DateTime<Utc>,
) -> anyhow::Result<User> {
    let user = User {
        id: format!("user_{}", &Uuid::new_v4().simple().to_string()[..9]),
        name: required(name, "name")?,
        email: required(email, "email")?,
        role,
        created_at: now,
    };
    store
        .save_user(&user)
        .await
        .context("failed to save user")?;
    info!(user_id = %user.id, role = user.role.as_str(), "user created");
    Ok(user)
}

pub async fn update_user<S: AttendanceStore>(
    store: &S,
    id: &str,
    update: UserUpdate,
) -> anyhow::Result<User> {
    let update = UserUpdate {
        name: update
            .name
            .map(|name| required(&name, "name"))
            .transpose()?,
        email: update
            .email
            .map(|email| required(&email, "email"))
            .transpose()?,
        role: update.role,
    };
    let user = store
        .update_user(id, &update)
        .await
        .context("failed to update user")?
        .ok_or_else(|| AttendanceError::UserNotFound(id.to_string()))?;
    info!(user_id = id, "user updated");
    Ok(user)
}

pub async fn delete_user<S: AttendanceStore>(store: &S, id: &str) -> anyhow::Result<()> {
    if !store.delete_user(id).await.context("failed to delete user")? {
        return Err(AttendanceError::UserNotFound(id.to_string()).into());
    }
    info!(user_id = id, "user deleted");
    Ok(())
}

/// Case-insensitive substring match on name or email. A blank query keeps
/// everyone.
pub fn filter_users<'a>(users: &'a [User], query: &str) -> Vec<&'a User> {
    let needle = query.trim().to_lowercase();
    users
        .iter()
        .filter(|user| {
            needle.is_empty()
                || user.name.to_lowercase().contains(&needle)
                || user.email.to_lowercase().contains(&needle)
        })
        .collect()
}

/// Validates and stores a new authorized zone.
pub async fn set_zone<S: AttendanceStore>(
    store: &S,
    zone: AuthorizedZone,
) -> anyhow::Result<AuthorizedZone> {
    zone.validate()?;
    store
        .set_zone(&zone)
        .await
        .context("failed to save authorized zone")?;
    info!(
        label = %zone.label,
        latitude = zone.center.latitude,
        longitude = zone.center.longitude,
        radius_m = zone.radius_meters,
        "authorized zone updated"
    );
    Ok(zone)
}
