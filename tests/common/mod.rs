#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use donation_hub::error::AppError;
use donation_hub::geo::GeoPoint;
use donation_hub::models::booking::{Booking, BookingStatus, NewBooking};
use donation_hub::models::donation::{
    Donation, DonationPatch, DonationStatus, FoodType, NewDonation,
};
use donation_hub::models::profile::{Role, UserProfile};
use donation_hub::models::session::Session;
use donation_hub::store::memory::MemoryStore;
use donation_hub::store::{DonationFilter, DonationStore, PendingSnapshot, UpdateOutcome};

pub const RECEIVER_AT: GeoPoint = GeoPoint {
    lat: 12.9352,
    lng: 77.6245,
};

pub fn new_donation(lat: f64, lng: f64) -> NewDonation {
    donation_from("donor-1", lat, lng)
}

pub fn donation_from(donor_id: &str, lat: f64, lng: f64) -> NewDonation {
    let now = Utc::now();
    NewDonation {
        donor_id: donor_id.to_string(),
        food_type: FoodType::Chapati,
        quantity: 10,
        description: String::new(),
        preparation_time: None,
        pickup_time: now + Duration::hours(2),
        location: GeoPoint::new(lat, lng),
        address: "Indiranagar".to_string(),
        created_at: now,
        expires_at: now + Duration::hours(12),
    }
}

pub fn receiver(id: &str) -> Session {
    Session::new(id, Role::Receiver)
}

pub fn donor() -> Session {
    Session::new("donor-1", Role::Donor)
}

pub fn profile(uid: &str, name: &str, role: Role) -> UserProfile {
    UserProfile {
        uid: uid.to_string(),
        name: name.to_string(),
        email: format!("{uid}@example.com"),
        phone: "98450 00000".to_string(),
        address: "Koramangala".to_string(),
        location: RECEIVER_AT,
        role,
        ratings: Vec::new(),
        average_rating: 0.0,
        total_donations: 0,
        profile_complete: true,
        created_at: Utc::now(),
    }
}

pub async fn next_update<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(StdDuration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for a live update")
        .expect("subscription closed early")
}

/// Asserts the feed delivers nothing more and has shut down.
pub async fn expect_closed<T: std::fmt::Debug>(rx: &mut mpsc::UnboundedReceiver<T>) {
    let next = tokio::time::timeout(StdDuration::from_secs(2), rx.recv())
        .await
        .expect("feed neither closed nor delivered");
    assert!(next.is_none(), "unexpected delivery: {next:?}");
}

/// Faults a `FlakyStore` injects; each can be switched mid-test.
#[derive(Default)]
pub struct Faults {
    pub reads: AtomicBool,
    pub booking_insert: AtomicBool,
    pub booking_update: AtomicBool,
}

impl Faults {
    pub fn set(flag: &AtomicBool, on: bool) {
        flag.store(on, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool) -> Result<(), AppError> {
        if flag.load(Ordering::SeqCst) {
            return Err(AppError::UpstreamUnavailable("store timed out".to_string()));
        }
        Ok(())
    }
}

/// Delegates to a `MemoryStore`, failing the operations switched on in
/// `faults`. Writes and watches always go through.
pub struct FlakyStore {
    inner: MemoryStore,
    pub faults: Faults,
}

impl FlakyStore {
    pub fn new(event_buffer_size: usize) -> Self {
        Self {
            inner: MemoryStore::new(event_buffer_size),
            faults: Faults::default(),
        }
    }
}

#[async_trait]
impl DonationStore for FlakyStore {
    async fn insert_donation(&self, donation: NewDonation) -> Result<Donation, AppError> {
        self.inner.insert_donation(donation).await
    }

    async fn get_donation(&self, id: Uuid) -> Result<Option<Donation>, AppError> {
        self.inner.get_donation(id).await
    }

    async fn query_pending(&self) -> Result<Vec<Donation>, AppError> {
        Faults::check(&self.faults.reads)?;
        self.inner.query_pending().await
    }

    async fn query_donations(&self, filter: &DonationFilter) -> Result<Vec<Donation>, AppError> {
        Faults::check(&self.faults.reads)?;
        self.inner.query_donations(filter).await
    }

    fn watch_pending(&self) -> broadcast::Receiver<PendingSnapshot> {
        self.inner.watch_pending()
    }

    fn watch_donations(&self) -> broadcast::Receiver<Donation> {
        self.inner.watch_donations()
    }

    async fn conditional_update_donation(
        &self,
        id: Uuid,
        expected: DonationStatus,
        patch: DonationPatch,
    ) -> Result<UpdateOutcome<Donation>, AppError> {
        self.inner
            .conditional_update_donation(id, expected, patch)
            .await
    }

    async fn insert_booking(&self, booking: NewBooking) -> Result<Booking, AppError> {
        Faults::check(&self.faults.booking_insert)?;
        self.inner.insert_booking(booking).await
    }

    async fn bookings_for_receiver(&self, receiver_id: &str) -> Result<Vec<Booking>, AppError> {
        self.inner.bookings_for_receiver(receiver_id).await
    }

    async fn active_booking_for_donation(
        &self,
        donation_id: Uuid,
    ) -> Result<Option<Booking>, AppError> {
        self.inner.active_booking_for_donation(donation_id).await
    }

    async fn conditional_update_booking(
        &self,
        id: Uuid,
        expected: BookingStatus,
        next: BookingStatus,
    ) -> Result<UpdateOutcome<Booking>, AppError> {
        Faults::check(&self.faults.booking_update)?;
        self.inner.conditional_update_booking(id, expected, next).await
    }

    async fn get_user_profile(
        &self,
        uid: &str,
        role: Option<Role>,
    ) -> Result<Option<UserProfile>, AppError> {
        self.inner.get_user_profile(uid, role).await
    }

    async fn put_user_profile(&self, profile: UserProfile) -> Result<UserProfile, AppError> {
        self.inner.put_user_profile(profile).await
    }
}
