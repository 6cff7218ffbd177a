use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use serde::Deserialize;
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

use crate::dialog::StreamEvent;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    /// Only slot events for this lot; notices always pass
    pub lot_id: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/events/stream", get(event_stream))
}

/// GET /v1/events/stream
async fn event_stream(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.stream_tx.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(move |result| {
        let event = result.ok()?;
        if !matches_lot(&event, query.lot_id.as_deref()) {
            return None;
        }
        let data = serde_json::to_string(&event).ok()?;
        Some(Ok(Event::default().event(event.name()).data(data)))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn matches_lot(event: &StreamEvent, lot_id: Option<&str>) -> bool {
    match (event, lot_id) {
        (StreamEvent::Slot(slot_event), Some(lot_id)) => slot_event.lot_id() == lot_id,
        _ => true,
    }
}
