//! HTTP surface over the checkout service.

mod auth;
mod error;

pub use auth::AdminGuard;

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::{Path, Query, State}, response::{IntoResponse, Redirect}, routing::{get, post, put}, Json, Router};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::domain::aggregates::{Order, OrderError, OrderItem, OrderStatus, Painting, ShippingOption};
use crate::service::{CheckoutRequest, CheckoutService, CheckoutSession, ReconcileReport};
use crate::{GalleryError, Result};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<CheckoutService>,
    pub admin_token: Arc<str>,
    pub cancel_page_url: Arc<str>,
    pub stale_order_after: Duration,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "gallery-checkout"})) }))
        .route("/api/v1/shipping-options", get(list_shipping_options))
        .route("/api/v1/orders/create-session", post(create_session))
        .route("/api/v1/payment/confirm", post(confirm_payment))
        .route("/api/v1/payment/cancel", get(cancel_payment))
        .route("/api/v1/orders", get(list_orders))
        .route("/api/v1/orders/reconcile", post(reconcile_orders))
        .route("/api/v1/orders/:id", get(get_order))
        .route("/api/v1/orders/:id/tracking", put(update_tracking))
        .route("/api/v1/orders/:id/status", put(update_status))
        .route("/api/v1/paintings/:id/availability", put(update_availability))
        .layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()).with_state(state)
}

/// What a customer sees after confirming a payment.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub id: Uuid, pub status: OrderStatus, pub items: Vec<OrderItem>, pub items_total: Decimal,
    pub shipping_cost: Decimal, pub total_amount: Decimal, pub currency: String, pub shipping_method: String,
}

impl From<&Order> for OrderSummary {
    fn from(o: &Order) -> Self {
        Self {
            id: o.id(), status: o.status(), items: o.items().to_vec(), items_total: o.items_total().amount(),
            shipping_cost: o.shipping_cost().amount(), total_amount: o.total_amount().amount(),
            currency: o.currency().to_string(), shipping_method: o.shipping().name.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ConfirmPaymentRequest {
    Wrapped { #[serde(rename = "sessionId")] session_id: String },
    Bare(String),
}

impl ConfirmPaymentRequest {
    fn session_id(&self) -> &str { match self { Self::Wrapped { session_id } | Self::Bare(session_id) => session_id } }
}

#[derive(Debug, Deserialize)] pub struct CancelParams { pub session_id: Option<String> }
#[derive(Debug, Deserialize)] #[serde(rename_all = "camelCase")] pub struct TrackingRequest { pub tracking_number: String }
#[derive(Debug, Deserialize)] pub struct StatusRequest { pub status: String }
#[derive(Debug, Deserialize)] #[serde(rename_all = "camelCase")] pub struct AvailabilityRequest { pub is_for_sale: bool }
#[derive(Debug, Default, Deserialize)] #[serde(rename_all = "camelCase")] pub struct ReconcileRequest { pub older_than_minutes: Option<u64> }

async fn list_shipping_options(State(s): State<AppState>) -> Result<Json<Vec<ShippingOption>>> {
    Ok(Json(s.service.list_shipping_options().await?))
}

async fn create_session(State(s): State<AppState>, Json(r): Json<CheckoutRequest>) -> Result<Json<CheckoutSession>> {
    Ok(Json(s.service.create_order_and_start_payment(r).await?))
}

async fn confirm_payment(State(s): State<AppState>, Json(r): Json<ConfirmPaymentRequest>) -> Result<Json<OrderSummary>> {
    let order = s.service.confirm_order_payment(r.session_id()).await?;
    Ok(Json(OrderSummary::from(&order)))
}

/// Customers land here when they leave the hosted payment page. The order is reconciled
/// if possible; the redirect happens either way.
async fn cancel_payment(State(s): State<AppState>, Query(p): Query<CancelParams>) -> impl IntoResponse {
    if let Some(session_id) = p.session_id.as_deref().filter(|id| !id.trim().is_empty()) {
        match s.service.confirm_order_payment(session_id).await {
            Ok(order) => tracing::info!(order_id = %order.id(), "Cancel page visited for a paid order"),
            Err(e) => tracing::info!(session_id = %session_id, outcome = %e, "Cancel page reconciliation"),
        }
    }
    Redirect::to(&s.cancel_page_url)
}

async fn list_orders(_: AdminGuard, State(s): State<AppState>) -> Result<Json<Vec<Order>>> {
    Ok(Json(s.service.list_orders().await?))
}

async fn get_order(_: AdminGuard, State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Order>> {
    Ok(Json(s.service.get_order(id).await?))
}

async fn update_tracking(_: AdminGuard, State(s): State<AppState>, Path(id): Path<Uuid>, Json(r): Json<TrackingRequest>) -> Result<Json<Order>> {
    Ok(Json(s.service.update_order_tracking(id, &r.tracking_number).await?))
}

async fn update_status(_: AdminGuard, State(s): State<AppState>, Path(id): Path<Uuid>, Json(r): Json<StatusRequest>) -> Result<Json<Order>> {
    let status: OrderStatus = r.status.parse().map_err(|e: OrderError| GalleryError::Validation(e.to_string()))?;
    Ok(Json(s.service.update_order_status(id, status).await?))
}

async fn reconcile_orders(_: AdminGuard, State(s): State<AppState>, body: Option<Json<ReconcileRequest>>) -> Result<Json<ReconcileReport>> {
    let older_than = match body.and_then(|Json(r)| r.older_than_minutes) {
        Some(minutes) => minutes.checked_mul(60).map(Duration::from_secs)
            .ok_or_else(|| GalleryError::Validation(format!("olderThanMinutes {} is out of range", minutes)))?,
        None => s.stale_order_after,
    };
    Ok(Json(s.service.reconcile_stale_orders(older_than).await?))
}

async fn update_availability(_: AdminGuard, State(s): State<AppState>, Path(id): Path<i64>, Json(r): Json<AvailabilityRequest>) -> Result<Json<Painting>> {
    Ok(Json(s.service.set_painting_availability(id, r.is_for_sale).await?))
}
