use axum::body::{Body, Bytes};
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use log_api::{ReadMode, SubscribeResponse, parse_offset};

use super::AppState;
use crate::error::ApiError;

const OCTET_STREAM: &str = "application/octet-stream";

// ═══════════════════════════════════════════════════════════════
//  PUT /topic/{topic}
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_append(
    State(state): State<AppState>,
    Path(topic): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let offsets = state.log.append(&topic, body.to_vec()).await?;
    let location = format!("/topic/{topic}/{}", offsets.offset);
    tracing::debug!(%topic, offset = offsets.offset, next = offsets.next, "append");

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        axum::Json(offsets),
    )
        .into_response())
}

// ═══════════════════════════════════════════════════════════════
//  GET /topic
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_list_topics(
    State(state): State<AppState>,
) -> impl IntoResponse {
    axum::Json(state.log.topics())
}

// ═══════════════════════════════════════════════════════════════
//  GET /topic/{topic}[/{offset}][?cmd=follow]
// ═══════════════════════════════════════════════════════════════

#[derive(Deserialize)]
pub(crate) struct ReadParams {
    cmd: Option<String>,
}

pub(crate) async fn handle_read_from_start(
    State(state): State<AppState>,
    Path(topic): Path<String>,
    Query(params): Query<ReadParams>,
) -> Result<Response, ApiError> {
    read(state, topic, None, params).await
}

pub(crate) async fn handle_read(
    State(state): State<AppState>,
    Path((topic, offset)): Path<(String, String)>,
    Query(params): Query<ReadParams>,
) -> Result<Response, ApiError> {
    read(state, topic, Some(offset), params).await
}

async fn read(
    state: AppState,
    topic: String,
    offset: Option<String>,
    params: ReadParams,
) -> Result<Response, ApiError> {
    let offset = parse_offset(offset.as_deref())?;

    match ReadMode::from_cmd(params.cmd.as_deref()) {
        ReadMode::Single => {
            let record = state.log.read_at(&topic, offset).await?;
            Ok(([(header::CONTENT_TYPE, OCTET_STREAM)], record).into_response())
        }
        ReadMode::Follow => {
            let session = state.log.follow(&topic, offset).await?;
            let stream = futures::stream::unfold(session, |mut session| async move {
                session.recv().await.map(|chunk| (chunk, session))
            });
            tracing::debug!(%topic, offset, "streaming follow session");
            Ok(([(header::CONTENT_TYPE, OCTET_STREAM)], Body::from_stream(stream)).into_response())
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  POST /topic/{topic}/subscribe
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_subscribe(
    State(state): State<AppState>,
    Path(topic): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let subscriber_id = state.subscribers.subscribe(&topic, body.to_vec()).await?;
    Ok((StatusCode::CREATED, axum::Json(SubscribeResponse { subscriber_id })).into_response())
}
