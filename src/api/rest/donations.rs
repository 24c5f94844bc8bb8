use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use uuid::Uuid;

use crate::api::rest::auth::MaybeSession;
use crate::engine::{booking, donations};
use crate::error::AppError;
use crate::models::booking::Booking;
use crate::models::donation::Donation;
use crate::models::profile::Role;
use crate::models::session::Session;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/donations", post(create_donation))
        .route("/donations/mine", get(list_my_donations))
        .route("/donations/booked", get(list_booked_orders))
        .route("/donations/:id", get(get_donation))
        .route("/donations/:id/book", post(book_donation))
        .route("/donations/:id/collect", post(collect_donation))
        .route("/donations/:id/cancel", post(cancel_donation))
}

async fn create_donation(
    State(state): State<Arc<AppState>>,
    session: MaybeSession,
    Json(payload): Json<donations::CreateDonationRequest>,
) -> Result<Json<Donation>, AppError> {
    let donation = donations::create_donation(
        state.store.as_ref(),
        session.session(),
        payload,
        state.settings.donation_ttl,
    )
    .await?;

    state.metrics.donations_created_total.inc();
    Ok(Json(donation))
}

async fn get_donation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<donations::DonationDetails>, AppError> {
    Ok(Json(donations::donation_details(state.store.as_ref(), id).await?))
}

async fn list_my_donations(
    State(state): State<Arc<AppState>>,
    session: MaybeSession,
) -> Result<Json<Vec<Donation>>, AppError> {
    let donor = Session::require_role(session.session(), Role::Donor)?;
    let list = donations::donor_donations(state.store.as_ref(), &donor.user_id).await?;
    Ok(Json(list))
}

async fn list_booked_orders(
    State(state): State<Arc<AppState>>,
    session: MaybeSession,
) -> Result<Json<Vec<donations::BookedOrder>>, AppError> {
    let donor = Session::require_role(session.session(), Role::Donor)?;
    let list = donations::donor_booked_orders(state.store.as_ref(), &donor.user_id).await?;
    Ok(Json(list))
}

async fn book_donation(
    State(state): State<Arc<AppState>>,
    session: MaybeSession,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let result = booking::book_donation(state.store.as_ref(), session.session(), id).await;

    let outcome = match &result {
        Ok(_) => "booked",
        Err(err) => err.code(),
    };
    state
        .metrics
        .bookings_total
        .with_label_values(&[outcome])
        .inc();

    Ok(Json(result?))
}

async fn collect_donation(
    State(state): State<Arc<AppState>>,
    session: MaybeSession,
    Path(id): Path<Uuid>,
) -> Result<Json<Donation>, AppError> {
    let donation = booking::collect_donation(state.store.as_ref(), session.session(), id).await?;
    Ok(Json(donation))
}

async fn cancel_donation(
    State(state): State<Arc<AppState>>,
    session: MaybeSession,
    Path(id): Path<Uuid>,
) -> Result<Json<Donation>, AppError> {
    let donation = booking::cancel_donation(state.store.as_ref(), session.session(), id).await?;
    Ok(Json(donation))
}
