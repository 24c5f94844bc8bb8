use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::Json;
use axum::Router;

use crate::api::rest::auth::MaybeSession;
use crate::engine::donations::{self, BookingDetails};
use crate::error::AppError;
use crate::models::donation::Donation;
use crate::models::profile::Role;
use crate::models::session::Session;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bookings", get(list_bookings))
        .route("/bookings/tracked", get(list_tracked_orders))
}

async fn list_bookings(
    State(state): State<Arc<AppState>>,
    session: MaybeSession,
) -> Result<Json<Vec<BookingDetails>>, AppError> {
    let receiver = Session::require_role(session.session(), Role::Receiver)?;
    let bookings = donations::receiver_bookings(state.store.as_ref(), &receiver.user_id).await?;
    Ok(Json(bookings))
}

async fn list_tracked_orders(
    State(state): State<Arc<AppState>>,
    session: MaybeSession,
) -> Result<Json<Vec<Donation>>, AppError> {
    let receiver = Session::require_role(session.session(), Role::Receiver)?;
    let orders = donations::receiver_tracked_orders(state.store.as_ref(), &receiver.user_id).await?;
    Ok(Json(orders))
}
