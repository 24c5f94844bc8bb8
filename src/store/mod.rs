//! Contract of the document store the core runs against.
//!
//! The store owns persistence and change notification; the engine only relies
//! on the operations below. `memory::MemoryStore` is the bundled
//! implementation.

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::booking::{Booking, BookingStatus, NewBooking};
use crate::models::donation::{Donation, DonationPatch, DonationStatus, NewDonation};
use crate::models::profile::{Role, UserProfile};

/// The full Pending set, in insertion order, as of one change.
pub type PendingSnapshot = Arc<Vec<Donation>>;

/// Result of a compare-and-swap write.
#[derive(Debug, Clone)]
pub enum UpdateOutcome<T> {
    /// Precondition held; carries the record after the write.
    Updated(T),
    /// Precondition failed; carries the record as it currently is.
    Conflict(T),
    NotFound,
}

/// Selects donations by owner, holder and status. Unset fields match all.
#[derive(Debug, Clone, Default)]
pub struct DonationFilter {
    pub donor_id: Option<String>,
    pub receiver_id: Option<String>,
    pub status: Option<DonationStatus>,
}

impl DonationFilter {
    pub fn matches(&self, donation: &Donation) -> bool {
        self.donor_id
            .as_deref()
            .is_none_or(|donor_id| donation.donor_id == donor_id)
            && self
                .receiver_id
                .as_deref()
                .is_none_or(|receiver_id| donation.receiver_id.as_deref() == Some(receiver_id))
            && self.status.is_none_or(|status| donation.status == status)
    }

    /// Whether a change to `donation` can alter the set this filter selects.
    /// Only the owner is immutable, so only the owner rules a change out.
    pub fn may_concern(&self, donation: &Donation) -> bool {
        self.donor_id
            .as_deref()
            .is_none_or(|donor_id| donation.donor_id == donor_id)
    }
}

#[async_trait]
pub trait DonationStore: Send + Sync {
    async fn insert_donation(&self, donation: NewDonation) -> Result<Donation, AppError>;

    async fn get_donation(&self, id: Uuid) -> Result<Option<Donation>, AppError>;

    /// Point-in-time read of every Pending donation, in insertion order.
    async fn query_pending(&self) -> Result<Vec<Donation>, AppError>;

    async fn query_donations(&self, filter: &DonationFilter) -> Result<Vec<Donation>, AppError>;

    /// Subscribes to the Pending set. A snapshot is published after every
    /// write that adds a donation to, or removes one from, that set. Dropping
    /// the receiver releases the watch.
    fn watch_pending(&self) -> broadcast::Receiver<PendingSnapshot>;

    /// Subscribes to every donation write. Each message is the record after
    /// an insert or a successful conditional update.
    fn watch_donations(&self) -> broadcast::Receiver<Donation>;

    /// Applies `patch` only if the donation is currently in `expected` and the
    /// patch is a legal move from there. Check and write are atomic with
    /// respect to every other caller.
    async fn conditional_update_donation(
        &self,
        id: Uuid,
        expected: DonationStatus,
        patch: DonationPatch,
    ) -> Result<UpdateOutcome<Donation>, AppError>;

    async fn insert_booking(&self, booking: NewBooking) -> Result<Booking, AppError>;

    async fn bookings_for_receiver(&self, receiver_id: &str) -> Result<Vec<Booking>, AppError>;

    async fn active_booking_for_donation(
        &self,
        donation_id: Uuid,
    ) -> Result<Option<Booking>, AppError>;

    async fn conditional_update_booking(
        &self,
        id: Uuid,
        expected: BookingStatus,
        next: BookingStatus,
    ) -> Result<UpdateOutcome<Booking>, AppError>;

    /// Returns `None` when no profile exists or when `role` is given and
    /// differs from the stored one.
    async fn get_user_profile(
        &self,
        uid: &str,
        role: Option<Role>,
    ) -> Result<Option<UserProfile>, AppError>;

    async fn put_user_profile(&self, profile: UserProfile) -> Result<UserProfile, AppError>;
}
