use std::{convert::Infallible, time::Duration};

use axum::{
    extract::{Extension, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
};
use futures_util::stream::Stream;
use mongodb::bson::oid::ObjectId;
use tokio::sync::broadcast::{error::RecvError, Receiver};

use crate::{auth::unauthorized, events::SyncEvent, models::CurrentUser, AppState};

fn to_sse(event: &SyncEvent) -> Event {
    let data = event
        .payload_json()
        .map(|v| v.to_string())
        .unwrap_or_default();

    Event::default().event(event.name()).data(data)
}

/// The caller's own change signals. A lagged receiver gets a payload-less
/// `alertsChanged` so the client re-queries instead of trusting a gap.
pub fn user_event_stream(
    rx: Receiver<SyncEvent>,
    user_id: ObjectId,
) -> impl Stream<Item = Result<Event, Infallible>> {
    futures_util::stream::unfold(rx, move |mut rx| async move {
        loop {
            let evt = match rx.recv().await {
                Ok(ev) if ev.user_id() == user_id => to_sse(&ev),
                Ok(_) => continue,
                Err(RecvError::Lagged(_)) => to_sse(&SyncEvent::AlertsChanged {
                    user_id,
                    alert: None,
                }),
                Err(RecvError::Closed) => return None,
            };

            return Some((Ok(evt), rx));
        }
    })
}

// GET /events
pub async fn sse_events(
    State(state): State<AppState>,
    user: Option<Extension<CurrentUser>>,
) -> Response {
    let Some(Extension(u)) = user else {
        return unauthorized();
    };

    let stream = user_event_stream(state.events.subscribe(), u.id);

    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(20))
                .text("keep-alive"),
        )
        .into_response()
}
