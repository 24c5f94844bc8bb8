//! Distance-filtered, distance-sorted views of the Pending donation set.
//!
//! Distances are recomputed from scratch for every evaluation. Scaling past a
//! few thousand pending donations calls for a spatial index in the store
//! rather than a smarter filter here.

use std::sync::Arc;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::engine::feed::{spawn_feed, Refresh, Subscription};
use crate::error::AppError;
use crate::geo::{haversine_km, GeoPoint};
use crate::models::donation::{Donation, DonationStatus};
use crate::store::{DonationStore, PendingSnapshot};

pub const DEFAULT_RADIUS_KM: f64 = 15.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearbyDonation {
    #[serde(flatten)]
    pub donation: Donation,
    pub distance_km: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct NearbyQuery {
    pub location: GeoPoint,
    pub radius_km: f64,
}

impl NearbyQuery {
    pub fn new(location: GeoPoint, radius_km: f64) -> Self {
        Self {
            location,
            radius_km,
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if !self.location.is_finite() {
            return Err(AppError::Validation(
                "receiver location must be finite decimal degrees".to_string(),
            ));
        }
        if !self.radius_km.is_finite() || self.radius_km < 0.0 {
            return Err(AppError::Validation(
                "radius must be a non-negative number of kilometers".to_string(),
            ));
        }
        Ok(())
    }
}

/// Pending donations within `radius_km` of `receiver`, nearest first.
///
/// Records without a usable location are skipped. Equal distances keep their
/// input order.
pub fn match_nearby<I>(receiver: &GeoPoint, radius_km: f64, donations: I) -> Vec<NearbyDonation>
where
    I: IntoIterator<Item = Donation>,
{
    let mut matched: Vec<NearbyDonation> = donations
        .into_iter()
        .filter(|donation| donation.status == DonationStatus::Pending)
        .filter_map(|donation| {
            let Some(location) = donation.location.filter(GeoPoint::is_finite) else {
                debug!(donation_id = %donation.id, "skipping donation without a usable location");
                return None;
            };
            let distance_km = haversine_km(receiver, &location);
            (distance_km <= radius_km).then_some(NearbyDonation {
                donation,
                distance_km,
            })
        })
        .collect();

    // `sort_by` is stable, which keeps ties in insertion order.
    matched.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    matched
}

/// Evaluates `query` once against the store's current Pending set.
pub async fn find_nearby(
    store: &dyn DonationStore,
    query: &NearbyQuery,
) -> Result<Vec<NearbyDonation>, AppError> {
    query.validate()?;
    let pending = store.query_pending().await?;
    Ok(match_nearby(&query.location, query.radius_km, pending))
}

/// Pushes a freshly matched list to `on_change` for the current Pending set
/// and again after every change to it.
///
/// Fails with the store's error when the current set cannot be read. A later
/// failed re-read is delivered as `Err` and no further updates follow.
pub async fn subscribe_nearby<F>(
    store: Arc<dyn DonationStore>,
    query: NearbyQuery,
    on_change: F,
) -> Result<Subscription, AppError>
where
    F: FnMut(Result<Vec<NearbyDonation>, AppError>) + Send + 'static,
{
    query.validate()?;

    // Watch before the initial read so no change falls between the two.
    let changes = store.watch_pending();
    let pending = store.query_pending().await?;

    let NearbyQuery {
        location,
        radius_km,
    } = query;
    let initial = match_nearby(&location, radius_km, pending);

    let subscription = spawn_feed(
        "nearby",
        changes,
        initial,
        move |snapshot: PendingSnapshot| {
            Refresh::Ready(match_nearby(&location, radius_km, snapshot.iter().cloned()))
        },
        move || {
            let store = store.clone();
            async move {
                let pending = store.query_pending().await?;
                Ok::<_, AppError>(match_nearby(&location, radius_km, pending))
            }
            .boxed()
        },
        on_change,
    );

    info!(
        subscription_id = %subscription.id(),
        lat = location.lat,
        lng = location.lng,
        radius_km,
        "nearby subscription started"
    );

    Ok(subscription)
}
