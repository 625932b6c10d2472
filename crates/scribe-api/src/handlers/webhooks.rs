use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use scribe_core::{
    defaults, validate_event_names, CreateWebhookRequest, UpdateWebhookRequest, Webhook,
};

use super::{not_found, require_http_url};
use crate::{ApiError, AppState};

/// Largest page the delivery history endpoint returns.
const MAX_DELIVERY_PAGE: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct DeliveriesQuery {
    pub limit: Option<i64>,
}

async fn load(state: &AppState, id: Uuid) -> Result<Webhook, ApiError> {
    state
        .repos
        .webhooks
        .get(id)
        .await?
        .ok_or_else(|| not_found("Webhook", id))
}

pub async fn create_webhook(
    State(state): State<AppState>,
    Json(body): Json<CreateWebhookRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_http_url(&body.url)?;
    validate_event_names(&body.events)?;

    let webhook = Webhook::new(body.url.trim(), body.events, body.secret);
    state.repos.webhooks.insert(&webhook).await?;
    Ok((StatusCode::CREATED, Json(webhook)))
}

pub async fn list_webhooks(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let webhooks = state.repos.webhooks.list().await?;
    Ok(Json(webhooks))
}

pub async fn get_webhook(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(load(&state, id).await?))
}

pub async fn update_webhook(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateWebhookRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut webhook = load(&state, id).await?;

    if let Some(url) = body.url {
        require_http_url(&url)?;
        webhook.url = url.trim().to_string();
    }
    if let Some(events) = body.events {
        validate_event_names(&events)?;
        webhook.events = events;
    }
    if let Some(secret) = body.secret {
        webhook.secret = Some(secret);
    }
    if let Some(active) = body.active {
        webhook.active = active;
    }
    webhook.updated_at = Utc::now();

    state.repos.webhooks.update(&webhook).await?;
    Ok(Json(webhook))
}

pub async fn delete_webhook(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    if state.repos.webhooks.delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found("Webhook", id))
    }
}

/// Delivery audit rows for one webhook, newest first.
pub async fn list_webhook_deliveries(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<DeliveriesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    load(&state, id).await?;
    let limit = params
        .limit
        .unwrap_or(defaults::WEBHOOK_DELIVERY_PAGE_LIMIT)
        .clamp(1, MAX_DELIVERY_PAGE);
    let deliveries = state.repos.webhooks.list_deliveries(id, limit).await?;
    Ok(Json(deliveries))
}

/// Send a `webhook.test` event through the normal retrying delivery path.
pub async fn test_webhook(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let webhook = load(&state, id).await?;
    let delivery_id = state.notifier.deliver_test(webhook);
    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "delivery_id": delivery_id })),
    ))
}
