use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::Deserialize;

use crate::api::rest::auth::MaybeSession;
use crate::engine::matcher::{self, NearbyDonation, NearbyQuery};
use crate::error::AppError;
use crate::geo::GeoPoint;
use crate::models::profile::Role;
use crate::models::session::Session;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/nearby", get(list_nearby))
}

#[derive(Debug, Default, Deserialize)]
pub struct NearbyParams {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    #[serde(alias = "radius")]
    pub radius_km: Option<f64>,
}

/// Builds the query from explicit coordinates, falling back to the calling
/// receiver's profile location.
pub async fn resolve_query(
    state: &AppState,
    session: Option<&Session>,
    params: &NearbyParams,
) -> Result<NearbyQuery, AppError> {
    let radius_km = params.radius_km.unwrap_or(state.settings.default_radius_km);
    if radius_km > state.settings.max_radius_km {
        return Err(AppError::Validation(format!(
            "radius must be <= {} km",
            state.settings.max_radius_km
        )));
    }

    let location = match (params.lat, params.lng) {
        (Some(lat), Some(lng)) => GeoPoint::new(lat, lng),
        (None, None) => {
            let receiver = Session::require_role(session, Role::Receiver)?;
            state
                .store
                .get_user_profile(&receiver.user_id, Some(Role::Receiver))
                .await?
                .map(|profile| profile.location)
                .ok_or_else(|| {
                    AppError::Validation("no location given and no receiver profile".to_string())
                })?
        }
        _ => {
            return Err(AppError::Validation(
                "lat and lng must be given together".to_string(),
            ));
        }
    };

    let query = NearbyQuery::new(location, radius_km);
    query.validate()?;
    Ok(query)
}

async fn list_nearby(
    State(state): State<Arc<AppState>>,
    session: MaybeSession,
    Query(params): Query<NearbyParams>,
) -> Result<Json<Vec<NearbyDonation>>, AppError> {
    let query = resolve_query(&state, session.session(), &params).await?;

    let timer = state.metrics.match_latency_seconds.start_timer();
    let matched = matcher::find_nearby(state.store.as_ref(), &query).await?;
    timer.observe_duration();

    state
        .metrics
        .nearby_queries_total
        .with_label_values(&["query"])
        .inc();

    Ok(Json(matched))
}
