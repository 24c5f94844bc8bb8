use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use crate::error::AppError;
use crate::geo::GeoPoint;
use crate::models::profile::{Role, UserProfile};
use crate::models::session::Session;
use crate::store::DonationStore;

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterProfileRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub location: Option<GeoPoint>,
}

/// Creates or refreshes the caller's profile under the session's role.
///
/// Counters and ratings survive a refresh. A profile without a phone,
/// address or location is stored but flagged incomplete.
pub async fn register_profile(
    store: &dyn DonationStore,
    session: Option<&Session>,
    request: RegisterProfileRequest,
) -> Result<UserProfile, AppError> {
    let session = Session::require(session)?;

    if request.name.trim().is_empty() {
        return Err(AppError::Validation("name cannot be empty".to_string()));
    }
    if !request.email.contains('@') {
        return Err(AppError::Validation("email is not valid".to_string()));
    }
    if let Some(location) = &request.location {
        if !location.is_finite() {
            return Err(AppError::Validation(
                "location must be finite decimal degrees".to_string(),
            ));
        }
    }

    let existing = store.get_user_profile(&session.user_id, None).await?;
    if let Some(existing) = &existing {
        if existing.role != session.role {
            return Err(AppError::Conflict(format!(
                "user {} is already registered as a {}",
                session.user_id, existing.role
            )));
        }
    }

    let profile_complete = !request.phone.trim().is_empty()
        && !request.address.trim().is_empty()
        && request.location.is_some();

    let profile = match existing {
        Some(existing) => UserProfile {
            name: request.name,
            email: request.email,
            phone: request.phone,
            address: request.address,
            location: request.location.unwrap_or(existing.location),
            profile_complete,
            ..existing
        },
        None => UserProfile {
            uid: session.user_id.clone(),
            name: request.name,
            email: request.email,
            phone: request.phone,
            address: request.address,
            location: request.location.unwrap_or(GeoPoint::UNKNOWN),
            role: session.role,
            ratings: Vec::new(),
            average_rating: 0.0,
            total_donations: 0,
            profile_complete,
            created_at: Utc::now(),
        },
    };

    let profile = store.put_user_profile(profile).await?;
    info!(uid = %profile.uid, role = %profile.role, "profile saved");
    Ok(profile)
}

pub async fn get_profile(
    store: &dyn DonationStore,
    uid: &str,
    role: Option<Role>,
) -> Result<UserProfile, AppError> {
    store
        .get_user_profile(uid, role)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("profile {uid} not found")))
}
