use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use futures::StreamExt;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::{
    AppState,
    devices::SubscribeRequest,
    errors::AppError,
    notifications::{DispatchReport, NotificationRequest},
};

pub async fn subscribe_handler(
    State(state): State<AppState>,
    Json(req): Json<SubscribeRequest>,
) -> Result<StatusCode, AppError> {
    let record = req.into_record(&state.identity)?;
    info!(
        device = %record.device_name(),
        endpoint = %record.subscription().endpoint(),
        "Received subscription"
    );

    state.dispatcher.store().save(&record).await?;

    // Give the push service a moment before the first message.
    if !state.confirmation_delay.is_zero() {
        tokio::time::sleep(state.confirmation_delay).await;
    }

    let result = state.dispatcher.send_confirmation(&record).await;
    match result.failure() {
        None => Ok(StatusCode::NO_CONTENT),
        Some(failure) => Err(AppError::Confirmation(failure.clone())),
    }
}

pub async fn notify_handler(
    State(state): State<AppState>,
    Json(req): Json<NotificationRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let report = state.dispatcher.broadcast(&req.into_payload()).await?;
    let body = report_json(&report);

    if report.is_success() {
        Ok((StatusCode::OK, Json(body)))
    } else {
        Ok((StatusCode::BAD_GATEWAY, Json(body)))
    }
}

pub async fn public_key_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "publicKey": state.identity.public_key() }))
}

pub async fn devices_handler(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let mut records = state.dispatcher.store().list_all().await?;
    let mut names = Vec::new();
    while let Some(item) = records.next().await {
        match item {
            Ok(record) => names.push(record.device_name().to_string()),
            Err(e) => warn!(device = %e.key(), "Skipping unreadable device record: {e}"),
        }
    }
    names.sort();
    Ok(Json(json!({ "devices": names })))
}

pub async fn device_handler(
    State(state): State<AppState>,
    Path(device_name): Path<String>,
) -> Result<Json<Value>, AppError> {
    let record = state.dispatcher.store().load(&device_name).await?;

    Ok(Json(json!({
        "device_name": record.device_name(),
        "endpoint": record.subscription().endpoint(),
        "subject": record.identity().subject(),
        "publicKey": record.identity().public_key(),
    })))
}

fn report_json(report: &DispatchReport) -> Value {
    let failed: Vec<Value> = report
        .failed()
        .map(|r| {
            json!({
                "device": r.device_name,
                "error": r.failure().map(ToString::to_string),
            })
        })
        .collect();
    json!({
        "total": report.len(),
        "delivered": report.delivered().count(),
        "failed": failed,
    })
}
