use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{info, warn};

use crate::api::rest::auth::MaybeSession;
use crate::api::rest::nearby::{resolve_query, NearbyParams};
use crate::engine::feed::Subscription;
use crate::engine::matcher::{subscribe_nearby, NearbyQuery};
use crate::engine::orders::{subscribe_booked_orders, subscribe_tracked_orders};
use crate::error::AppError;
use crate::models::profile::Role;
use crate::models::session::Session;
use crate::state::AppState;

/// Which live view a socket follows.
#[derive(Debug, Clone)]
pub enum LiveFeed {
    Nearby(NearbyQuery),
    BookedOrders { donor_id: String },
    TrackedOrders { receiver_id: String },
}

impl LiveFeed {
    fn label(&self) -> &'static str {
        match self {
            LiveFeed::Nearby(_) => "nearby",
            LiveFeed::BookedOrders { .. } => "booked_orders",
            LiveFeed::TrackedOrders { .. } => "tracked_orders",
        }
    }
}

type Frame = Result<String, AppError>;

pub async fn nearby_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    session: MaybeSession,
    Query(params): Query<NearbyParams>,
) -> Result<Response, AppError> {
    let query = resolve_query(&state, session.session(), &params).await?;
    Ok(upgrade(ws, state, LiveFeed::Nearby(query)))
}

pub async fn booked_orders_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    session: MaybeSession,
) -> Result<Response, AppError> {
    let donor = Session::require_role(session.session(), Role::Donor)?;
    let feed = LiveFeed::BookedOrders {
        donor_id: donor.user_id.clone(),
    };
    Ok(upgrade(ws, state, feed))
}

pub async fn tracked_orders_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    session: MaybeSession,
) -> Result<Response, AppError> {
    let receiver = Session::require_role(session.session(), Role::Receiver)?;
    let feed = LiveFeed::TrackedOrders {
        receiver_id: receiver.user_id.clone(),
    };
    Ok(upgrade(ws, state, feed))
}

fn upgrade(ws: WebSocketUpgrade, state: Arc<AppState>, feed: LiveFeed) -> Response {
    ws.on_upgrade(move |socket: WebSocket| {
        let (sender, receiver) = socket.split();
        serve_feed(state, feed, sender, receiver)
    })
    .into_response()
}

/// Streams `feed` to a client until either side goes away.
///
/// Every update is a JSON array in a text frame. When the feed fails, the
/// client gets one `{error, code}` text frame followed by a close frame.
pub async fn serve_feed<Tx, Rx>(state: Arc<AppState>, feed: LiveFeed, mut sender: Tx, mut receiver: Rx)
where
    Tx: Sink<Message> + Unpin + Send + 'static,
    Rx: Stream<Item = Result<Message, axum::Error>> + Unpin + Send + 'static,
{
    let kind = feed.label();
    let (tx, rx) = mpsc::unbounded_channel::<Frame>();

    let subscription = match open_feed(&state, feed, tx).await {
        Ok(subscription) => subscription,
        Err(err) => {
            warn!(feed = kind, error = %err, "failed to open live feed");
            let _ = sender.send(error_frame(&err)).await;
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
    };

    state.metrics.active_subscriptions.inc();
    if kind == "nearby" {
        state
            .metrics
            .nearby_queries_total
            .with_label_values(&["subscription"])
            .inc();
    }
    info!(subscription_id = %subscription.id(), feed = kind, "websocket client connected");

    let mut send_task = tokio::spawn(async move {
        let mut updates = UnboundedReceiverStream::new(rx);
        while let Some(frame) = updates.next().await {
            match frame {
                Ok(json) => {
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(err) => {
                    let _ = sender.send(error_frame(&err)).await;
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    let subscription_id = subscription.id();
    subscription.cancel();
    state.metrics.active_subscriptions.dec();
    info!(subscription_id = %subscription_id, feed = kind, "websocket client disconnected");
}

async fn open_feed(
    state: &AppState,
    feed: LiveFeed,
    tx: mpsc::UnboundedSender<Frame>,
) -> Result<Subscription, AppError> {
    let store = state.store.clone();
    match feed {
        LiveFeed::Nearby(query) => {
            subscribe_nearby(store, query, move |update| {
                let _ = tx.send(encode(update));
            })
            .await
        }
        LiveFeed::BookedOrders { donor_id } => {
            subscribe_booked_orders(store, donor_id, move |update| {
                let _ = tx.send(encode(update));
            })
            .await
        }
        LiveFeed::TrackedOrders { receiver_id } => {
            subscribe_tracked_orders(store, receiver_id, move |update| {
                let _ = tx.send(encode(update));
            })
            .await
        }
    }
}

fn encode<T: Serialize>(update: Result<T, AppError>) -> Frame {
    let view = update?;
    serde_json::to_string(&view)
        .map_err(|err| AppError::Internal(format!("failed to serialize live update: {err}")))
}

fn error_frame(err: &AppError) -> Message {
    Message::Text(err.body().to_string())
}
