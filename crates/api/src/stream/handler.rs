use std::convert::Infallible;

use axum::extract::{Query, State};
use axum::http::header;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use futures::Stream;
use testu_core::error::CoreError;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;

use crate::error::AppResult;
use crate::query::JobIdQuery;
use crate::state::AppState;

/// GET /status?jobID=
///
/// Attach the requester to the job's status stream. Each relayed line is
/// one `data:` event; the response ends when the job's stream is closed.
/// Jobs this server neither holds nor streams for are 404.
pub async fn status_handler(
    State(state): State<AppState>,
    Query(query): Query<JobIdQuery>,
) -> AppResult<impl IntoResponse> {
    let job_id = query.require()?;

    let live = state.store.contains(&job_id).await;
    let Some(rx) = state.streams.attach(&job_id, live).await else {
        return Err(CoreError::NotFound {
            entity: "Job",
            id: job_id,
        }
        .into());
    };

    // A job no longer in the store has finished; the stream ends once
    // its buffered events are delivered.
    if !state.store.contains(&job_id).await {
        state.streams.close(&job_id).await;
    }

    Ok((
        [
            (header::CONNECTION, "keep-alive"),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        ],
        Sse::new(events(rx)).keep_alive(KeepAlive::default()),
    ))
}

fn events(
    rx: crate::stream::StreamReceiver,
) -> impl Stream<Item = Result<Event, Infallible>> {
    UnboundedReceiverStream::new(rx).map(|line| Ok(Event::default().data(line)))
}
