use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Extension,
};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::AuthUser;

/// GET /api/events/:room - Server-sent events for a form or team room
pub async fn stream(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(room): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    state.forms().authorize_room(auth.user_id, room).await?;
    tracing::debug!(%room, user_id = %auth.user_id, "event stream opened");

    let events = state.hub.stream(&room.to_string()).map(|event| {
        let data = serde_json::to_string(&event.payload).unwrap_or_else(|_| "{}".to_string());
        Ok(Event::default().event(event.event).data(data))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
