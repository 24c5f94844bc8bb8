use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Donor,
    Receiver,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Donor => f.write_str("donor"),
            Role::Receiver => f.write_str("receiver"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "donor" => Ok(Role::Donor),
            "receiver" => Ok(Role::Receiver),
            other => Err(format!("unknown role: {other}, expected donor/receiver")),
        }
    }
}

/// One identity record per user, tagged with the role chosen at sign-up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub uid: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub location: GeoPoint,
    pub role: Role,
    pub ratings: Vec<f64>,
    pub average_rating: f64,
    pub total_donations: u32,
    pub profile_complete: bool,
    pub created_at: DateTime<Utc>,
}

/// Contact details shown next to a donation or booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactCard {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
}

impl From<&UserProfile> for ContactCard {
    fn from(profile: &UserProfile) -> Self {
        Self {
            name: profile.name.clone(),
            email: profile.email.clone(),
            phone: profile.phone.clone(),
            address: profile.address.clone(),
        }
    }
}
