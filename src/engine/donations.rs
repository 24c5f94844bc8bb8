use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::GeoPoint;
use crate::models::booking::Booking;
use crate::models::donation::{Donation, DonationStatus, FoodType, NewDonation};
use crate::models::profile::{ContactCard, Role};
use crate::models::session::Session;
use crate::store::{DonationFilter, DonationStore};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDonationRequest {
    pub food_type: FoodType,
    pub quantity: u32,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub preparation_time: Option<DateTime<Utc>>,
    pub pickup_time: Option<DateTime<Utc>>,
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub address: String,
}

/// A single donation with its donor's contact card.
#[derive(Debug, Clone, Serialize)]
pub struct DonationDetails {
    #[serde(flatten)]
    pub donation: Donation,
    pub donor: Option<ContactCard>,
}

/// A donor's reserved donation with the receiver who holds it.
#[derive(Debug, Clone, Serialize)]
pub struct BookedOrder {
    #[serde(flatten)]
    pub donation: Donation,
    pub receiver: Option<ContactCard>,
}

/// A receiver's booking joined with what it points at.
#[derive(Debug, Clone, Serialize)]
pub struct BookingDetails {
    #[serde(flatten)]
    pub booking: Booking,
    pub donation: Option<Donation>,
    pub donor: Option<ContactCard>,
}

pub async fn create_donation(
    store: &dyn DonationStore,
    session: Option<&Session>,
    request: CreateDonationRequest,
    ttl: Duration,
) -> Result<Donation, AppError> {
    let donor = Session::require_role(session, Role::Donor)?;

    if request.quantity == 0 {
        return Err(AppError::Validation("quantity must be > 0".to_string()));
    }
    let location = request
        .location
        .ok_or_else(|| AppError::Validation("location is required".to_string()))?;
    if !location.is_finite() {
        return Err(AppError::Validation(
            "location must be finite decimal degrees".to_string(),
        ));
    }
    let pickup_time = request
        .pickup_time
        .ok_or_else(|| AppError::Validation("pickup_time is required".to_string()))?;

    let now = Utc::now();
    let donation = store
        .insert_donation(NewDonation {
            donor_id: donor.user_id.clone(),
            food_type: request.food_type,
            quantity: request.quantity,
            description: request.description.unwrap_or_default(),
            preparation_time: request.preparation_time,
            pickup_time,
            location,
            address: request.address,
            created_at: now,
            expires_at: now + ttl,
        })
        .await?;

    info!(
        donation_id = %donation.id,
        donor_id = %donation.donor_id,
        quantity = donation.quantity,
        "donation created"
    );
    Ok(donation)
}

pub async fn donation_details(
    store: &dyn DonationStore,
    id: Uuid,
) -> Result<DonationDetails, AppError> {
    let donation = store
        .get_donation(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("donation {id} not found")))?;
    let donor = contact_card(store, &donation.donor_id, Role::Donor).await?;
    Ok(DonationDetails { donation, donor })
}

/// All of a donor's donations, newest first.
pub async fn donor_donations(
    store: &dyn DonationStore,
    donor_id: &str,
) -> Result<Vec<Donation>, AppError> {
    let mut donations = store
        .query_donations(&DonationFilter {
            donor_id: Some(donor_id.to_string()),
            ..DonationFilter::default()
        })
        .await?;
    // Stable, so equal timestamps stay newest-inserted first after the reverse.
    donations.reverse();
    donations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(donations)
}

pub fn booked_orders_filter(donor_id: &str) -> DonationFilter {
    DonationFilter {
        donor_id: Some(donor_id.to_string()),
        status: Some(DonationStatus::Booked),
        ..DonationFilter::default()
    }
}

pub fn tracked_orders_filter(receiver_id: &str) -> DonationFilter {
    DonationFilter {
        receiver_id: Some(receiver_id.to_string()),
        status: Some(DonationStatus::Booked),
        ..DonationFilter::default()
    }
}

/// A donor's donations that are currently reserved, each with the holding
/// receiver's contact card.
pub async fn donor_booked_orders(
    store: &dyn DonationStore,
    donor_id: &str,
) -> Result<Vec<BookedOrder>, AppError> {
    let donations = store.query_donations(&booked_orders_filter(donor_id)).await?;

    let mut orders = Vec::with_capacity(donations.len());
    for donation in donations {
        let receiver = match donation.receiver_id.as_deref() {
            Some(receiver_id) => contact_card(store, receiver_id, Role::Receiver).await?,
            None => None,
        };
        orders.push(BookedOrder { donation, receiver });
    }
    Ok(orders)
}

/// Donations a receiver has reserved and not yet picked up.
pub async fn receiver_tracked_orders(
    store: &dyn DonationStore,
    receiver_id: &str,
) -> Result<Vec<Donation>, AppError> {
    store
        .query_donations(&tracked_orders_filter(receiver_id))
        .await
}

/// A receiver's bookings, newest first, each with its donation and the
/// donor's contact card when those still resolve.
pub async fn receiver_bookings(
    store: &dyn DonationStore,
    receiver_id: &str,
) -> Result<Vec<BookingDetails>, AppError> {
    let mut bookings = store.bookings_for_receiver(receiver_id).await?;
    bookings.reverse();
    bookings.sort_by(|a, b| b.booked_at.cmp(&a.booked_at));

    let mut details = Vec::with_capacity(bookings.len());
    for booking in bookings {
        let donation = store.get_donation(booking.donation_id).await?;
        let donor = match &donation {
            Some(donation) => contact_card(store, &donation.donor_id, Role::Donor).await?,
            None => None,
        };
        details.push(BookingDetails {
            booking,
            donation,
            donor,
        });
    }
    Ok(details)
}

async fn contact_card(
    store: &dyn DonationStore,
    uid: &str,
    role: Role,
) -> Result<Option<ContactCard>, AppError> {
    Ok(store
        .get_user_profile(uid, Some(role))
        .await?
        .as_ref()
        .map(ContactCard::from))
}
