use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BookingStatus {
    Active,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub donation_id: Uuid,
    pub receiver_id: String,
    pub status: BookingStatus,
    pub booked_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub donation_id: Uuid,
    pub receiver_id: String,
    pub booked_at: DateTime<Utc>,
}

impl NewBooking {
    pub fn into_booking(self, id: Uuid) -> Booking {
        Booking {
            id,
            donation_id: self.donation_id,
            receiver_id: self.receiver_id,
            status: BookingStatus::Active,
            booked_at: self.booked_at,
        }
    }
}
