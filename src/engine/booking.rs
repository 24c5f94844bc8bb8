use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::booking::{Booking, BookingStatus, NewBooking};
use crate::models::donation::{Donation, DonationPatch, DonationStatus};
use crate::models::profile::Role;
use crate::models::session::Session;
use crate::store::{DonationStore, UpdateOutcome};

/// Reserves a Pending donation for the calling receiver.
///
/// The status flip is a compare-and-swap on `Pending`, so of any number of
/// concurrent attempts on one donation exactly one succeeds and the rest get
/// `Conflict`. Nothing is retried.
pub async fn book_donation(
    store: &dyn DonationStore,
    session: Option<&Session>,
    donation_id: Uuid,
) -> Result<Booking, AppError> {
    let receiver = Session::require_role(session, Role::Receiver)?;
    let booked_at = Utc::now();

    let outcome = store
        .conditional_update_donation(
            donation_id,
            DonationStatus::Pending,
            DonationPatch::booked(receiver.user_id.clone(), booked_at),
        )
        .await?;

    let donation = match outcome {
        UpdateOutcome::Updated(donation) => donation,
        UpdateOutcome::Conflict(current) => {
            warn!(
                donation_id = %donation_id,
                receiver_id = %receiver.user_id,
                status = %current.status,
                "booking rejected"
            );
            return Err(already_taken(&current));
        }
        UpdateOutcome::NotFound => {
            return Err(AppError::NotFound(format!("donation {donation_id} not found")));
        }
    };

    let booking = NewBooking {
        donation_id: donation.id,
        receiver_id: receiver.user_id.clone(),
        booked_at,
    };

    match store.insert_booking(booking).await {
        Ok(booking) => {
            info!(
                donation_id = %donation.id,
                booking_id = %booking.id,
                receiver_id = %receiver.user_id,
                "donation booked"
            );
            Ok(booking)
        }
        Err(err) => {
            release(store, donation.id, &receiver.user_id).await;
            Err(err)
        }
    }
}

/// Donor confirms pickup: `Booked -> Collected`, and the donation's Active
/// booking becomes Completed.
pub async fn collect_donation(
    store: &dyn DonationStore,
    session: Option<&Session>,
    donation_id: Uuid,
) -> Result<Donation, AppError> {
    let donor = Session::require_role(session, Role::Donor)?;
    ensure_owner(store, donor, donation_id).await?;

    let donation = match store
        .conditional_update_donation(
            donation_id,
            DonationStatus::Booked,
            DonationPatch::collected(Utc::now()),
        )
        .await?
    {
        UpdateOutcome::Updated(donation) => donation,
        UpdateOutcome::Conflict(current) => {
            return Err(AppError::Conflict(format!(
                "donation {donation_id} is {} and cannot be collected",
                current.status
            )));
        }
        UpdateOutcome::NotFound => {
            return Err(AppError::NotFound(format!("donation {donation_id} not found")));
        }
    };

    // The donation is already Collected; a stale booking record must not turn
    // that into a failed request.
    complete_booking(store, donation_id).await;

    info!(donation_id = %donation_id, donor_id = %donor.user_id, "donation collected");
    Ok(donation)
}

/// Donor withdraws an unclaimed donation: `Pending -> Cancelled`.
pub async fn cancel_donation(
    store: &dyn DonationStore,
    session: Option<&Session>,
    donation_id: Uuid,
) -> Result<Donation, AppError> {
    let donor = Session::require_role(session, Role::Donor)?;
    ensure_owner(store, donor, donation_id).await?;

    match store
        .conditional_update_donation(
            donation_id,
            DonationStatus::Pending,
            DonationPatch::cancelled(Utc::now()),
        )
        .await?
    {
        UpdateOutcome::Updated(donation) => {
            info!(donation_id = %donation_id, donor_id = %donor.user_id, "donation cancelled");
            Ok(donation)
        }
        UpdateOutcome::Conflict(current) => Err(AppError::Conflict(format!(
            "donation {donation_id} is {} and cannot be cancelled",
            current.status
        ))),
        UpdateOutcome::NotFound => Err(AppError::NotFound(format!(
            "donation {donation_id} not found"
        ))),
    }
}

async fn ensure_owner(
    store: &dyn DonationStore,
    donor: &Session,
    donation_id: Uuid,
) -> Result<(), AppError> {
    let donation = store
        .get_donation(donation_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("donation {donation_id} not found")))?;

    if donation.donor_id != donor.user_id {
        return Err(AppError::Forbidden(format!(
            "donation {donation_id} belongs to another donor"
        )));
    }
    Ok(())
}

fn already_taken(current: &Donation) -> AppError {
    match current.status {
        DonationStatus::Booked | DonationStatus::Collected => {
            AppError::Conflict(format!("donation {} is already booked", current.id))
        }
        status => AppError::Conflict(format!("donation {} is {status}", current.id)),
    }
}

async fn complete_booking(store: &dyn DonationStore, donation_id: Uuid) {
    let booking = match store.active_booking_for_donation(donation_id).await {
        Ok(Some(booking)) => booking,
        Ok(None) => {
            warn!(donation_id = %donation_id, "collected donation has no active booking");
            return;
        }
        Err(err) => {
            error!(donation_id = %donation_id, error = %err, "failed to look up booking for collected donation");
            return;
        }
    };

    match store
        .conditional_update_booking(booking.id, BookingStatus::Active, BookingStatus::Completed)
        .await
    {
        Ok(UpdateOutcome::Updated(_)) => {}
        Ok(UpdateOutcome::Conflict(current)) => {
            warn!(booking_id = %booking.id, status = ?current.status, "booking changed before completion");
        }
        Ok(UpdateOutcome::NotFound) => {
            warn!(booking_id = %booking.id, "booking vanished before completion");
        }
        Err(err) => {
            error!(
                donation_id = %donation_id,
                booking_id = %booking.id,
                error = %err,
                "failed to complete booking for collected donation"
            );
        }
    }
}

/// Undoes the status flip when the booking record could not be written.
///
/// If the donation left Booked in the meantime (the donor collected it), it
/// stays where it is and has no booking record; that is logged for repair.
async fn release(store: &dyn DonationStore, donation_id: Uuid, receiver_id: &str) {
    match store
        .conditional_update_donation(
            donation_id,
            DonationStatus::Booked,
            DonationPatch::released(Utc::now()),
        )
        .await
    {
        Ok(UpdateOutcome::Updated(_)) => {
            warn!(donation_id = %donation_id, "booking record failed; donation released");
        }
        Ok(UpdateOutcome::Conflict(current)) => {
            error!(
                donation_id = %donation_id,
                receiver_id = %receiver_id,
                status = %current.status,
                "donation moved on before release; it has no booking record"
            );
        }
        Ok(UpdateOutcome::NotFound) => {
            error!(donation_id = %donation_id, receiver_id = %receiver_id, "donation vanished before release");
        }
        Err(err) => {
            error!(
                donation_id = %donation_id,
                receiver_id = %receiver_id,
                error = %err,
                "failed to release donation"
            );
        }
    }
}
