//! Live views of reserved donations: a donor's booked orders and a
//! receiver's tracked orders.
//!
//! Both re-read their filtered set after any donation write that may concern
//! them and only deliver when the set of donations actually changed.

use std::sync::Arc;

use futures::FutureExt;
use tracing::info;
use uuid::Uuid;

use crate::engine::donations::{
    booked_orders_filter, donor_booked_orders, receiver_tracked_orders, tracked_orders_filter,
    BookedOrder,
};
use crate::engine::feed::{spawn_feed, Refresh, Subscription};
use crate::error::AppError;
use crate::models::donation::Donation;
use crate::store::DonationStore;

/// Pushes the donor's booked orders now and whenever a donation enters or
/// leaves that set.
pub async fn subscribe_booked_orders<F>(
    store: Arc<dyn DonationStore>,
    donor_id: String,
    on_change: F,
) -> Result<Subscription, AppError>
where
    F: FnMut(Result<Vec<BookedOrder>, AppError>) + Send + 'static,
{
    let filter = booked_orders_filter(&donor_id);
    let changes = store.watch_donations();
    let initial = donor_booked_orders(store.as_ref(), &donor_id).await?;

    let subscription = spawn_feed(
        "booked_orders",
        changes,
        initial,
        move |changed: Donation| {
            if filter.may_concern(&changed) {
                Refresh::Reread
            } else {
                Refresh::Skip
            }
        },
        {
            let donor_id = donor_id.clone();
            move || {
                let store = store.clone();
                let donor_id = donor_id.clone();
                async move { donor_booked_orders(store.as_ref(), &donor_id).await }.boxed()
            }
        },
        distinct(on_change, |order: &BookedOrder| order.donation.id),
    );

    info!(subscription_id = %subscription.id(), donor_id = %donor_id, "booked orders subscription started");
    Ok(subscription)
}

/// Pushes the receiver's tracked orders now and whenever a donation enters or
/// leaves that set.
pub async fn subscribe_tracked_orders<F>(
    store: Arc<dyn DonationStore>,
    receiver_id: String,
    on_change: F,
) -> Result<Subscription, AppError>
where
    F: FnMut(Result<Vec<Donation>, AppError>) + Send + 'static,
{
    let filter = tracked_orders_filter(&receiver_id);
    let changes = store.watch_donations();
    let initial = receiver_tracked_orders(store.as_ref(), &receiver_id).await?;

    let subscription = spawn_feed(
        "tracked_orders",
        changes,
        initial,
        move |changed: Donation| {
            if filter.may_concern(&changed) {
                Refresh::Reread
            } else {
                Refresh::Skip
            }
        },
        {
            let receiver_id = receiver_id.clone();
            move || {
                let store = store.clone();
                let receiver_id = receiver_id.clone();
                async move { receiver_tracked_orders(store.as_ref(), &receiver_id).await }.boxed()
            }
        },
        distinct(on_change, |donation: &Donation| donation.id),
    );

    info!(subscription_id = %subscription.id(), receiver_id = %receiver_id, "tracked orders subscription started");
    Ok(subscription)
}

/// Drops successful updates whose donation ids equal the last delivered ones.
fn distinct<T, F>(
    mut on_change: F,
    key: fn(&T) -> Uuid,
) -> impl FnMut(Result<Vec<T>, AppError>) + Send + 'static
where
    T: 'static,
    F: FnMut(Result<Vec<T>, AppError>) + Send + 'static,
{
    let mut last: Option<Vec<Uuid>> = None;
    move |update| {
        if let Ok(view) = &update {
            let ids: Vec<Uuid> = view.iter().map(key).collect();
            if last.as_ref() == Some(&ids) {
                return;
            }
            last = Some(ids);
        }
        on_change(update);
    }
}
