use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use eon_types::api::{BoardSnapshot, ContentRequest};
use eon_types::models::ItemRef;

use crate::error::ApiError;
use crate::middleware::DeviceId;
use crate::state::AppState;

/// Which table an item route addresses. Attached to each route group as an
/// extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Post,
    Reply,
}

impl ItemKind {
    fn at(self, id: Uuid) -> ItemRef {
        match self {
            ItemKind::Post => ItemRef::Post(id),
            ItemKind::Reply => ItemRef::Reply(id),
        }
    }
}

pub async fn list_posts(
    State(state): State<AppState>,
    Extension(DeviceId(device_id)): Extension<DeviceId>,
) -> Result<Json<BoardSnapshot>, ApiError> {
    let device = state.device(device_id).await;
    let mut session = device.lock().await;
    session.board.fetch_all().await?;
    Ok(Json(session.board.snapshot()))
}

pub async fn create_post(
    State(state): State<AppState>,
    Extension(DeviceId(device_id)): Extension<DeviceId>,
    Json(req): Json<ContentRequest>,
) -> Result<(StatusCode, Json<BoardSnapshot>), ApiError> {
    let device = state.device(device_id).await;
    let mut session = device.lock().await;
    session.board.create_post(&req.content).await?;
    Ok((StatusCode::CREATED, Json(session.board.snapshot())))
}

pub async fn create_reply(
    State(state): State<AppState>,
    Extension(DeviceId(device_id)): Extension<DeviceId>,
    Path(post_id): Path<Uuid>,
    Json(req): Json<ContentRequest>,
) -> Result<(StatusCode, Json<BoardSnapshot>), ApiError> {
    let device = state.device(device_id).await;
    let mut session = device.lock().await;
    session.board.create_reply(post_id, &req.content).await?;
    Ok((StatusCode::CREATED, Json(session.board.snapshot())))
}

pub async fn toggle_replies(
    State(state): State<AppState>,
    Extension(DeviceId(device_id)): Extension<DeviceId>,
    Path(post_id): Path<Uuid>,
) -> Result<Json<BoardSnapshot>, ApiError> {
    let device = state.device(device_id).await;
    let mut session = device.lock().await;
    session.board.toggle_replies(post_id)?;
    Ok(Json(session.board.snapshot()))
}

pub async fn begin_edit(
    State(state): State<AppState>,
    Extension(DeviceId(device_id)): Extension<DeviceId>,
    Extension(kind): Extension<ItemKind>,
    Path(id): Path<Uuid>,
) -> Result<Json<BoardSnapshot>, ApiError> {
    let device = state.device(device_id).await;
    let mut session = device.lock().await;
    session.board.begin_edit(kind.at(id))?;
    Ok(Json(session.board.snapshot()))
}

pub async fn cancel_edit(
    State(state): State<AppState>,
    Extension(DeviceId(device_id)): Extension<DeviceId>,
) -> Json<BoardSnapshot> {
    let device = state.device(device_id).await;
    let mut session = device.lock().await;
    session.board.cancel_edit();
    Json(session.board.snapshot())
}

pub async fn save_edit(
    State(state): State<AppState>,
    Extension(DeviceId(device_id)): Extension<DeviceId>,
    Extension(kind): Extension<ItemKind>,
    Path(id): Path<Uuid>,
    Json(req): Json<ContentRequest>,
) -> Result<Json<BoardSnapshot>, ApiError> {
    let device = state.device(device_id).await;
    let mut session = device.lock().await;
    session.board.save_edit(kind.at(id), &req.content).await?;
    Ok(Json(session.board.snapshot()))
}

pub async fn delete_item(
    State(state): State<AppState>,
    Extension(DeviceId(device_id)): Extension<DeviceId>,
    Extension(kind): Extension<ItemKind>,
    Path(id): Path<Uuid>,
) -> Result<Json<BoardSnapshot>, ApiError> {
    let device = state.device(device_id).await;
    let mut session = device.lock().await;
    session.board.delete(kind.at(id)).await?;
    Ok(Json(session.board.snapshot()))
}

pub async fn toggle_like(
    State(state): State<AppState>,
    Extension(DeviceId(device_id)): Extension<DeviceId>,
    Extension(kind): Extension<ItemKind>,
    Path(id): Path<Uuid>,
) -> Result<Json<BoardSnapshot>, ApiError> {
    let device = state.device(device_id).await;
    let mut session = device.lock().await;
    session.board.toggle_like(kind.at(id)).await?;
    Ok(Json(session.board.snapshot()))
}
