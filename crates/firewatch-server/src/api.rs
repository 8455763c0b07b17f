use crate::error::{ApiError, ApiResult};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use firewatch_types::timestamp::parse_timestamp;
use firewatch_types::topics::is_actuator;
use firewatch_types::{CommandAction, DeviceReading};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub from_date: Option<String>,
    pub to_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ActionRequest {
    #[serde(default)]
    pub action: Option<String>,
}

/// 创建 API 路由
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/devices/data", post(post_device_data))
        .route("/api/devices/:device_name/status", get(get_device_status))
        .route("/api/devices/:device_name/reports", get(get_device_reports))
        .route("/api/devices/:device_name/action", post(post_device_action))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 健康检查
async fn health_check() -> &'static str {
    "OK"
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Resource not found".to_string())
}

fn message(msg: &str) -> Json<Value> {
    Json(json!({ "msg": msg }))
}

/// 接收读数，校验后提交持久化任务
async fn post_device_data(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let reading = DeviceReading::decode(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid payload: {}", e)))?;
    reading
        .validate_strict()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let device_name = reading.device_name.clone();
    state.jobs.submit(reading).await?;

    info!(device_name = %device_name, "Reading accepted over HTTP");
    Ok((StatusCode::CREATED, message("Data saved successfully")))
}

/// 设备最新读数
async fn get_device_status(
    State(state): State<Arc<AppState>>,
    Path(device_name): Path<String>,
) -> ApiResult<Json<DeviceReading>> {
    debug!(device_name = %device_name, "Getting device status");

    let reading = state
        .repository
        .latest(&device_name)
        .await?
        .ok_or_else(|| ApiError::NotFound("No device data found".to_string()))?;

    Ok(Json(reading))
}

/// 时间区间内的读数，闭区间，按时间倒序
async fn get_device_reports(
    State(state): State<Arc<AppState>>,
    Path(device_name): Path<String>,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Json<Vec<DeviceReading>>> {
    let invalid = || ApiError::BadRequest("Invalid date format".to_string());

    let from = query
        .from_date
        .as_deref()
        .ok_or_else(invalid)
        .and_then(|raw| parse_timestamp(raw).map_err(|_| invalid()))?;
    let to = query
        .to_date
        .as_deref()
        .ok_or_else(invalid)
        .and_then(|raw| parse_timestamp(raw).map_err(|_| invalid()))?;

    let readings = state.repository.range(&device_name, from, to).await?;

    debug!(
        device_name = %device_name,
        count = readings.len(),
        "Report generated"
    );
    Ok(Json(readings))
}

/// 向执行器下发动作指令
async fn post_device_action(
    State(state): State<Arc<AppState>>,
    Path(device_name): Path<String>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    if !is_actuator(&device_name) {
        return Err(ApiError::NotFound("Resource not found".to_string()));
    }

    let invalid = || ApiError::BadRequest("Invalid action".to_string());
    let request: ActionRequest = serde_json::from_slice(&body).map_err(|_| invalid())?;
    let action = request.action.ok_or_else(invalid)?;
    action.parse::<CommandAction>().map_err(|_| invalid())?;

    state.dispatcher.dispatch(&device_name, &action).await?;

    Ok(message("Action command sent"))
}
