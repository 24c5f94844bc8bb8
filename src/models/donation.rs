use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FoodType {
    Veg,
    #[serde(rename = "Non-Veg")]
    NonVeg,
    Snacks,
    Rice,
    Chapati,
    Mixed,
    Dessert,
    Beverages,
    Others,
}

/// Lifecycle of a donation.
///
/// `Pending -> Booked -> Collected`, or `Pending -> Cancelled`. Nothing else.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DonationStatus {
    Pending,
    Booked,
    Collected,
    Cancelled,
}

impl DonationStatus {
    pub fn can_transition_to(self, next: DonationStatus) -> bool {
        matches!(
            (self, next),
            (DonationStatus::Pending, DonationStatus::Booked)
                | (DonationStatus::Booked, DonationStatus::Collected)
                | (DonationStatus::Pending, DonationStatus::Cancelled)
        )
    }
}

impl fmt::Display for DonationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DonationStatus::Pending => "pending",
            DonationStatus::Booked => "booked",
            DonationStatus::Collected => "collected",
            DonationStatus::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Donation {
    pub id: Uuid,
    pub donor_id: String,
    pub food_type: FoodType,
    pub quantity: u32,
    pub description: String,
    pub preparation_time: Option<DateTime<Utc>>,
    pub pickup_time: DateTime<Utc>,
    pub location: Option<GeoPoint>,
    pub address: String,
    pub status: DonationStatus,
    pub receiver_id: Option<String>,
    pub booked_at: Option<DateTime<Utc>>,
    pub collected_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Donation {
    /// Advisory only; nothing filters or cancels on expiry.
    pub fn apply(&mut self, patch: &DonationPatch) {
        self.status = patch.status;
        match patch.status {
            DonationStatus::Pending => {
                self.receiver_id = None;
                self.booked_at = None;
            }
            DonationStatus::Booked => {
                self.receiver_id = patch.receiver_id.clone();
                self.booked_at = Some(patch.at);
            }
            DonationStatus::Collected => self.collected_at = Some(patch.at),
            DonationStatus::Cancelled => self.cancelled_at = Some(patch.at),
        }
    }
}

/// Fields written by a conditional donation update.
#[derive(Debug, Clone)]
pub struct DonationPatch {
    pub status: DonationStatus,
    pub receiver_id: Option<String>,
    pub at: DateTime<Utc>,
}

impl DonationPatch {
    /// Whether this patch may be written over a donation in `from`. The only
    /// move outside the lifecycle is a release of a Booked donation.
    pub fn is_allowed_from(&self, from: DonationStatus) -> bool {
        from.can_transition_to(self.status)
            || (from == DonationStatus::Booked && self.status == DonationStatus::Pending)
    }

    pub fn booked(receiver_id: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            status: DonationStatus::Booked,
            receiver_id: Some(receiver_id.into()),
            at,
        }
    }

    pub fn collected(at: DateTime<Utc>) -> Self {
        Self {
            status: DonationStatus::Collected,
            receiver_id: None,
            at,
        }
    }

    pub fn cancelled(at: DateTime<Utc>) -> Self {
        Self {
            status: DonationStatus::Cancelled,
            receiver_id: None,
            at,
        }
    }

    /// Rolls back a booking whose companion record could not be written.
    pub fn released(at: DateTime<Utc>) -> Self {
        Self {
            status: DonationStatus::Pending,
            receiver_id: None,
            at,
        }
    }
}

/// A donation as submitted by a donor, before the store assigns an id.
#[derive(Debug, Clone)]
pub struct NewDonation {
    pub donor_id: String,
    pub food_type: FoodType,
    pub quantity: u32,
    pub description: String,
    pub preparation_time: Option<DateTime<Utc>>,
    pub pickup_time: DateTime<Utc>,
    pub location: GeoPoint,
    pub address: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl NewDonation {
    pub fn into_donation(self, id: Uuid) -> Donation {
        Donation {
            id,
            donor_id: self.donor_id,
            food_type: self.food_type,
            quantity: self.quantity,
            description: self.description,
            preparation_time: self.preparation_time,
            pickup_time: self.pickup_time,
            location: Some(self.location),
            address: self.address,
            status: DonationStatus::Pending,
            receiver_id: None,
            booked_at: None,
            collected_at: None,
            cancelled_at: None,
            created_at: self.created_at,
            expires_at: self.expires_at,
        }
    }
}
