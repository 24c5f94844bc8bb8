use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;

use crate::api::rest::auth::MaybeSession;
use crate::engine::profiles::{self, RegisterProfileRequest};
use crate::error::AppError;
use crate::models::profile::{Role, UserProfile};
use crate::models::session::Session;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/profiles", post(register_profile))
        .route("/profiles/me", get(my_profile))
        .route("/profiles/:uid", get(get_profile))
}

#[derive(Deserialize)]
pub struct ProfileLookup {
    pub role: Option<Role>,
}

async fn register_profile(
    State(state): State<Arc<AppState>>,
    session: MaybeSession,
    Json(payload): Json<RegisterProfileRequest>,
) -> Result<Json<UserProfile>, AppError> {
    let profile = profiles::register_profile(state.store.as_ref(), session.session(), payload).await?;
    Ok(Json(profile))
}

async fn my_profile(
    State(state): State<Arc<AppState>>,
    session: MaybeSession,
) -> Result<Json<UserProfile>, AppError> {
    let session = Session::require(session.session())?;
    let profile =
        profiles::get_profile(state.store.as_ref(), &session.user_id, Some(session.role)).await?;
    Ok(Json(profile))
}

async fn get_profile(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
    Query(lookup): Query<ProfileLookup>,
) -> Result<Json<UserProfile>, AppError> {
    Ok(Json(
        profiles::get_profile(state.store.as_ref(), &uid, lookup.role).await?,
    ))
}
