use super::{ApiError, AppState};
use crate::agent::{AgentEvent, ChannelSink};
use crate::database::{DataSource, LOCAL_SOURCE_LABEL, REMOTE_SOURCE_LABEL};
use crate::error::ChatError;
use crate::session::{validate_session_id, ChatTurn, TurnOutcome};
use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub message: String,
    pub source: DataSource,
}

pub(super) async fn list_sources() -> Json<serde_json::Value> {
    Json(json!([
        { "kind": "local", "label": LOCAL_SOURCE_LABEL },
        { "kind": "remote", "label": REMOTE_SOURCE_LABEL },
    ]))
}

pub(super) async fn list_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ChatTurn>>, ApiError> {
    Ok(Json(state.chat.transcript(&id).await?))
}

pub(super) async fn clear_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ChatTurn>>, ApiError> {
    Ok(Json(state.chat.clear(&id).await?))
}

fn step_event(event: &AgentEvent) -> Event {
    Event::default()
        .event("step")
        .data(serde_json::to_string(event).unwrap_or_default())
}

fn final_event(result: Result<Option<TurnOutcome>, ChatError>) -> Event {
    match result {
        Ok(Some(outcome)) => Event::default().event("answer").data(
            json!({ "reply": outcome.reply, "transcript": outcome.transcript }).to_string(),
        ),
        Ok(None) => Event::default()
            .event("error")
            .data(ApiError(ChatError::EmptyMessage).body().to_string()),
        Err(e) => Event::default()
            .event("error")
            .data(ApiError(e).body().to_string()),
    }
}

/// Run a turn, streaming agent steps and then exactly one `answer` or `error` event
///
/// Problems detectable before the agent starts (bad session id, incomplete
/// or unreachable database) are returned as plain JSON errors instead.
pub(super) async fn post_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<MessageRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    validate_session_id(&id)?;
    if request.message.trim().is_empty() {
        return Err(ApiError(ChatError::EmptyMessage));
    }
    state.chat.provider().obtain(&request.source).await?;

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<AgentEvent>();
    let (out_tx, out_rx) = mpsc::unbounded_channel::<Event>();

    tokio::spawn(async move {
        let forward_tx = out_tx.clone();
        let forward = tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                let _ = forward_tx.send(step_event(&event));
            }
        });

        let sink = ChannelSink::new(event_tx);
        let result = state
            .chat
            .submit(&id, &request.source, &request.message, &sink)
            .await;
        drop(sink);

        let _ = forward.await;
        let _ = out_tx.send(final_event(result));
    });

    let stream = UnboundedReceiverStream::new(out_rx).map(Ok::<_, Infallible>);
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
