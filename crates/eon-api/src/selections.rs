use axum::{
    Extension, Json,
    extract::{Path, State},
};
use tracing::debug;

use eon_types::api::SparksPage;
use eon_types::models::SparkId;

use crate::error::ApiError;
use crate::middleware::DeviceId;
use crate::pages::spark_cards;
use crate::state::AppState;

pub async fn select(
    State(state): State<AppState>,
    Extension(DeviceId(device_id)): Extension<DeviceId>,
    Path(spark_id): Path<u32>,
) -> Result<Json<SparksPage>, ApiError> {
    let device = state.device(device_id).await;
    let mut session = device.lock().await;

    let toggle = session.selections.select(SparkId(spark_id)).await?;
    debug!(device = %device_id, "Spark {} {:?}", spark_id, toggle);

    let selections = session.selections.snapshot().await;
    Ok(Json(SparksPage {
        sparks: spark_cards(&selections.selected),
        selections,
    }))
}

pub async fn commit(
    State(state): State<AppState>,
    Extension(DeviceId(device_id)): Extension<DeviceId>,
) -> Result<Json<SparksPage>, ApiError> {
    let device = state.device(device_id).await;
    let mut session = device.lock().await;

    session.selections.commit().await?;

    let selections = session.selections.snapshot().await;
    Ok(Json(SparksPage {
        sparks: spark_cards(&selections.selected),
        selections,
    }))
}
