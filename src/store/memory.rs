use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::booking::{Booking, BookingStatus, NewBooking};
use crate::models::donation::{Donation, DonationPatch, DonationStatus, NewDonation};
use crate::models::profile::{Role, UserProfile};
use crate::store::{DonationFilter, DonationStore, PendingSnapshot, UpdateOutcome};

struct Stored<T> {
    seq: u64,
    record: T,
}

/// In-process store. Conditional writes hold the DashMap shard lock across
/// the status check and the write.
pub struct MemoryStore {
    donations: DashMap<Uuid, Stored<Donation>>,
    bookings: DashMap<Uuid, Stored<Booking>>,
    profiles: DashMap<String, UserProfile>,
    next_seq: AtomicU64,
    pending_tx: broadcast::Sender<PendingSnapshot>,
    changes_tx: broadcast::Sender<Donation>,
    // Serializes snapshot-and-send so watchers never receive an older set last.
    publish_lock: Mutex<()>,
}

impl MemoryStore {
    pub fn new(event_buffer_size: usize) -> Self {
        let (pending_tx, _unused_rx) = broadcast::channel(event_buffer_size.max(1));
        let (changes_tx, _unused_rx) = broadcast::channel(event_buffer_size.max(1));

        Self {
            donations: DashMap::new(),
            bookings: DashMap::new(),
            profiles: DashMap::new(),
            next_seq: AtomicU64::new(0),
            pending_tx,
            changes_tx,
            publish_lock: Mutex::new(()),
        }
    }

    pub fn booking_count(&self) -> usize {
        self.bookings.len()
    }

    fn seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }

    fn collect_donations(&self, filter: impl Fn(&Donation) -> bool) -> Vec<Donation> {
        let mut rows: Vec<(u64, Donation)> = self
            .donations
            .iter()
            .filter(|entry| filter(&entry.value().record))
            .map(|entry| (entry.value().seq, entry.value().record.clone()))
            .collect();
        rows.sort_by_key(|(seq, _)| *seq);
        rows.into_iter().map(|(_, donation)| donation).collect()
    }

    fn publish_pending(&self) {
        // No receivers is the common case outside of live feeds.
        if self.pending_tx.receiver_count() == 0 {
            return;
        }
        let _guard = self
            .publish_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let snapshot = self.collect_donations(|d| d.status == DonationStatus::Pending);
        debug!(pending = snapshot.len(), "publishing pending snapshot");
        let _ = self.pending_tx.send(Arc::new(snapshot));
    }

    fn publish_change(&self, donation: &Donation) {
        if self.changes_tx.receiver_count() > 0 {
            let _ = self.changes_tx.send(donation.clone());
        }
    }
}

#[async_trait]
impl DonationStore for MemoryStore {
    async fn insert_donation(&self, donation: NewDonation) -> Result<Donation, AppError> {
        let donation = donation.into_donation(Uuid::new_v4());
        self.donations.insert(
            donation.id,
            Stored {
                seq: self.seq(),
                record: donation.clone(),
            },
        );
        self.publish_pending();
        self.publish_change(&donation);
        Ok(donation)
    }

    async fn get_donation(&self, id: Uuid) -> Result<Option<Donation>, AppError> {
        Ok(self.donations.get(&id).map(|entry| entry.record.clone()))
    }

    async fn query_pending(&self) -> Result<Vec<Donation>, AppError> {
        Ok(self.collect_donations(|d| d.status == DonationStatus::Pending))
    }

    async fn query_donations(&self, filter: &DonationFilter) -> Result<Vec<Donation>, AppError> {
        Ok(self.collect_donations(|d| filter.matches(d)))
    }

    fn watch_pending(&self) -> broadcast::Receiver<PendingSnapshot> {
        self.pending_tx.subscribe()
    }

    fn watch_donations(&self) -> broadcast::Receiver<Donation> {
        self.changes_tx.subscribe()
    }

    async fn conditional_update_donation(
        &self,
        id: Uuid,
        expected: DonationStatus,
        patch: DonationPatch,
    ) -> Result<UpdateOutcome<Donation>, AppError> {
        // The shard guard must be released before publishing, which reads the map.
        let outcome = match self.donations.get_mut(&id) {
            None => UpdateOutcome::NotFound,
            Some(mut entry)
                if entry.record.status == expected && patch.is_allowed_from(expected) =>
            {
                entry.record.apply(&patch);
                UpdateOutcome::Updated(entry.record.clone())
            }
            Some(entry) => UpdateOutcome::Conflict(entry.record.clone()),
        };

        if let UpdateOutcome::Updated(donation) = &outcome {
            if expected == DonationStatus::Pending || patch.status == DonationStatus::Pending {
                self.publish_pending();
            }
            self.publish_change(donation);
        }

        Ok(outcome)
    }

    async fn insert_booking(&self, booking: NewBooking) -> Result<Booking, AppError> {
        let booking = booking.into_booking(Uuid::new_v4());
        self.bookings.insert(
            booking.id,
            Stored {
                seq: self.seq(),
                record: booking.clone(),
            },
        );
        Ok(booking)
    }

    async fn bookings_for_receiver(&self, receiver_id: &str) -> Result<Vec<Booking>, AppError> {
        let mut rows: Vec<(u64, Booking)> = self
            .bookings
            .iter()
            .filter(|entry| entry.value().record.receiver_id == receiver_id)
            .map(|entry| (entry.value().seq, entry.value().record.clone()))
            .collect();
        rows.sort_by_key(|(seq, _)| *seq);
        Ok(rows.into_iter().map(|(_, booking)| booking).collect())
    }

    async fn active_booking_for_donation(
        &self,
        donation_id: Uuid,
    ) -> Result<Option<Booking>, AppError> {
        Ok(self
            .bookings
            .iter()
            .find(|entry| {
                let booking = &entry.value().record;
                booking.donation_id == donation_id && booking.status == BookingStatus::Active
            })
            .map(|entry| entry.value().record.clone()))
    }

    async fn conditional_update_booking(
        &self,
        id: Uuid,
        expected: BookingStatus,
        next: BookingStatus,
    ) -> Result<UpdateOutcome<Booking>, AppError> {
        Ok(match self.bookings.get_mut(&id) {
            None => UpdateOutcome::NotFound,
            Some(mut entry) if entry.record.status == expected => {
                entry.record.status = next;
                UpdateOutcome::Updated(entry.record.clone())
            }
            Some(entry) => UpdateOutcome::Conflict(entry.record.clone()),
        })
    }

    async fn get_user_profile(
        &self,
        uid: &str,
        role: Option<Role>,
    ) -> Result<Option<UserProfile>, AppError> {
        Ok(self
            .profiles
            .get(uid)
            .filter(|entry| role.is_none_or(|role| entry.value().role == role))
            .map(|entry| entry.value().clone()))
    }

    async fn put_user_profile(&self, profile: UserProfile) -> Result<UserProfile, AppError> {
        self.profiles.insert(profile.uid.clone(), profile.clone());
        Ok(profile)
    }
}
