//! Order creation, hosted payment and payment reconciliation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::domain::aggregates::{CustomerDetails, Order, OrderItem, OrderStatus, Painting, ShippingAddress, ShippingOption};
use crate::domain::events::{DomainEvent, PaintingEvent};
use crate::domain::value_objects::{CountryCode, Money};
use crate::event_sink::EventSink;
use crate::payment::{PaymentGateway, SessionLineItem, SessionRequest, SessionState, SessionStatus};
use crate::repository::{OrderRepository, PaintingRepository, ShippingOptionRepository};
use crate::{GalleryError, Result};

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[validate(length(min = 1, max = 200))]
    pub customer_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(max = 40))]
    pub phone: Option<String>,
    #[validate]
    pub address: CheckoutAddress,
    pub painting_ids: Vec<i64>,
    #[serde(default)]
    pub terms_accepted: bool,
    pub shipping_option_id: i64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutAddress {
    #[validate(length(min = 1, max = 200))]
    pub line1: String,
    pub line2: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(length(min = 1, max = 20))]
    pub postal_code: String,
    #[validate(length(equal = 2))]
    pub country: String,
}

impl CheckoutRequest {
    fn normalized(mut self) -> Self {
        let trim = |s: &mut String| *s = s.trim().to_string();
        let trim_opt = |s: &mut Option<String>| *s = s.take().map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        trim(&mut self.customer_name);
        trim(&mut self.email);
        trim_opt(&mut self.phone);
        trim(&mut self.address.line1);
        trim_opt(&mut self.address.line2);
        trim(&mut self.address.city);
        trim(&mut self.address.postal_code);
        trim(&mut self.address.country);
        self
    }
}

/// Hosted payment session started for a freshly placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession { pub order_id: Uuid, pub session_id: String, pub session_url: String }

#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub currency: String,
    pub home_country: CountryCode,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport { pub paid: usize, pub cancelled: usize, pub still_open: usize, pub failed: usize }

pub struct CheckoutService {
    orders: Arc<dyn OrderRepository>,
    paintings: Arc<dyn PaintingRepository>,
    shipping: Arc<dyn ShippingOptionRepository>,
    gateway: Arc<dyn PaymentGateway>,
    events: Arc<dyn EventSink>,
    settings: CheckoutSettings,
}

impl CheckoutService {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        paintings: Arc<dyn PaintingRepository>,
        shipping: Arc<dyn ShippingOptionRepository>,
        gateway: Arc<dyn PaymentGateway>,
        events: Arc<dyn EventSink>,
        settings: CheckoutSettings,
    ) -> Self {
        Self { orders, paintings, shipping, gateway, events, settings }
    }

    /// Validates the request, places a pending order priced from the catalog and starts a
    /// hosted payment session for it.
    ///
    /// Nothing is written unless validation passes. The order row is stored before the
    /// gateway is called; if the gateway fails the order stays pending without a session id.
    #[instrument(skip(self, request), fields(paintings = request.painting_ids.len(), shipping_option = request.shipping_option_id))]
    pub async fn create_order_and_start_payment(&self, request: CheckoutRequest) -> Result<CheckoutSession> {
        let request = request.normalized();
        if !request.terms_accepted { return Err(GalleryError::Validation("Terms and conditions must be accepted".to_string())); }
        if request.painting_ids.is_empty() { return Err(GalleryError::Validation("Cart is empty".to_string())); }
        request.validate()?;
        let country = CountryCode::new(&request.address.country).map_err(|e| GalleryError::Validation(e.to_string()))?;

        let items = self.priced_items(&request.painting_ids).await?;
        let option = self.shipping.find_by_id(request.shipping_option_id).await?
            .ok_or_else(|| GalleryError::Validation(format!("Unknown shipping option {}", request.shipping_option_id)))?;
        let (items, paintings): (Vec<OrderItem>, Vec<Painting>) = items.into_iter().unzip();
        let items_total = items.iter().try_fold(Money::zero(&self.settings.currency), |acc, i| acc.add(&i.price))
            .map_err(|e| GalleryError::Validation(e.to_string()))?;
        let shipping = option.quote(&items_total, &country, &self.settings.home_country)?;

        let customer = CustomerDetails { name: request.customer_name, email: request.email, phone: request.phone };
        let address = ShippingAddress {
            line1: request.address.line1, line2: request.address.line2, city: request.address.city,
            postal_code: request.address.postal_code, country,
        };
        let mut order = Order::place(customer, address, request.terms_accepted, items, shipping, &self.settings.currency)?;
        self.orders.insert(&order).await?;
        info!(order_id = %order.id(), total = %order.total_amount(), "Order placed");

        let session_request = self.session_request(&order, &paintings);
        let session = match self.gateway.create_session(&session_request).await {
            Ok(session) => session,
            Err(e) => {
                warn!(order_id = %order.id(), provider = self.gateway.provider_name(), error = %e, "Payment session creation failed; order left pending");
                return Err(GalleryError::Gateway(e));
            }
        };

        order.attach_session(&session.id);
        self.orders.update(&mut order).await.map_err(|e| {
            warn!(order_id = %order.id(), session_id = %session.id, error = %e, "Could not attach payment session");
            GalleryError::from(e)
        })?;
        info!(order_id = %order.id(), session_id = %session.id, "Payment session attached");
        self.publish_all(order.take_events()).await;
        Ok(CheckoutSession { order_id: order.id(), session_id: session.id, session_url: session.url })
    }

    /// Reconciles an order with the gateway's view of its payment session.
    ///
    /// Safe to call repeatedly: paid orders return immediately without touching the gateway
    /// or the catalog.
    #[instrument(skip(self))]
    pub async fn confirm_order_payment(&self, session_id: &str) -> Result<Order> {
        let session_id = session_id.trim();
        if session_id.is_empty() { return Err(GalleryError::Validation("Session id is required".to_string())); }
        let order = self.orders.find_by_session_id(session_id).await?
            .ok_or_else(|| GalleryError::NotFound(format!("No order for payment session {}", session_id)))?;

        match order.status() {
            OrderStatus::Paid | OrderStatus::Shipped => {
                info!(order_id = %order.id(), "Payment already confirmed");
                return Ok(order);
            }
            OrderStatus::Cancelled => return Err(GalleryError::PaymentNotCompleted("the order was cancelled".to_string())),
            OrderStatus::Pending => {}
        }

        let status = self.gateway.get_session(session_id).await.map_err(|e| {
            warn!(order_id = %order.id(), error = %e, "Could not fetch payment session status");
            GalleryError::Gateway(e)
        })?;
        self.settle(order, &status).await
    }

    /// Applies a gateway status: paid orders become Paid and their paintings leave the
    /// catalog, anything else cancels the order.
    async fn settle(&self, mut order: Order, status: &SessionStatus) -> Result<Order> {
        if status.is_paid() {
            for item in order.items() {
                match self.paintings.mark_sold(item.painting_id).await {
                    Ok(true) => self.events.publish(&DomainEvent::Painting(PaintingEvent::Sold { painting_id: item.painting_id, order_id: order.id() })).await,
                    Ok(false) => warn!(order_id = %order.id(), painting_id = item.painting_id, "Painting missing or already sold; skipping inventory update"),
                    Err(e) => warn!(order_id = %order.id(), painting_id = item.painting_id, error = %e, "Inventory update failed; skipping"),
                }
            }
            order.mark_paid()?;
            self.orders.update(&mut order).await?;
            info!(order_id = %order.id(), "Order paid");
            self.publish_all(order.take_events()).await;
            Ok(order)
        } else {
            order.cancel()?;
            self.orders.update(&mut order).await?;
            info!(order_id = %order.id(), status = ?status.status, payment_status = ?status.payment_status, "Order cancelled, payment not completed");
            self.publish_all(order.take_events()).await;
            Err(GalleryError::PaymentNotCompleted("the payment was not completed".to_string()))
        }
    }

    #[instrument(skip(self))]
    pub async fn update_order_status(&self, order_id: Uuid, status: OrderStatus) -> Result<Order> {
        let mut order = self.load_order(order_id).await?;
        order.change_status(status)?;
        self.orders.update(&mut order).await?;
        info!(order_id = %order_id, status = %status, "Order status updated");
        self.publish_all(order.take_events()).await;
        Ok(order)
    }

    #[instrument(skip(self))]
    pub async fn update_order_tracking(&self, order_id: Uuid, tracking_number: &str) -> Result<Order> {
        let mut order = self.load_order(order_id).await?;
        order.set_tracking(tracking_number)?;
        self.orders.update(&mut order).await?;
        info!(order_id = %order_id, "Tracking number recorded");
        Ok(order)
    }

    pub async fn list_orders(&self) -> Result<Vec<Order>> { Ok(self.orders.list().await?) }

    pub async fn get_order(&self, order_id: Uuid) -> Result<Order> { self.load_order(order_id).await }

    pub async fn list_shipping_options(&self) -> Result<Vec<ShippingOption>> { Ok(self.shipping.list_active().await?) }

    /// Manual catalog availability change from the back office.
    #[instrument(skip(self))]
    pub async fn set_painting_availability(&self, painting_id: i64, is_for_sale: bool) -> Result<Painting> {
        let mut painting = self.paintings.find_by_id(painting_id).await?
            .ok_or_else(|| GalleryError::NotFound(format!("Painting {} not found", painting_id)))?;
        painting.set_availability(is_for_sale);
        self.paintings.update(&painting).await?;
        Ok(painting)
    }

    /// Sweeps pending orders older than `older_than`.
    ///
    /// Orders with a session are settled from the gateway's state unless the session is still
    /// open. Orders that never got a session are cancelled. An order another request changed
    /// after it was read counts as failed and is picked up by the next sweep.
    #[instrument(skip(self))]
    pub async fn reconcile_stale_orders(&self, older_than: Duration) -> Result<ReconcileReport> {
        let cutoff = chrono::Duration::from_std(older_than).ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
            .ok_or_else(|| GalleryError::Validation(format!("Reconciliation window of {}s is out of range", older_than.as_secs())))?;
        let stale = self.orders.find_stale_pending(cutoff).await?;
        let mut report = ReconcileReport::default();
        for mut order in stale {
            let Some(session_id) = order.payment_session_id().map(str::to_string) else {
                order.cancel()?;
                match self.orders.update(&mut order).await {
                    Ok(()) => {
                        self.publish_all(order.take_events()).await;
                        report.cancelled += 1;
                    }
                    Err(e) => {
                        warn!(order_id = %order.id(), error = %e, "Could not cancel order without a payment session");
                        report.failed += 1;
                    }
                }
                continue;
            };
            let status = match self.gateway.get_session(&session_id).await {
                Ok(status) => status,
                Err(e) => {
                    warn!(order_id = %order.id(), session_id = %session_id, error = %e, "Reconciliation lookup failed");
                    report.failed += 1;
                    continue;
                }
            };
            if !status.is_paid() && matches!(status.status, SessionState::Open | SessionState::Unknown) {
                report.still_open += 1;
                continue;
            }
            match self.settle(order, &status).await {
                Ok(_) => report.paid += 1,
                Err(GalleryError::PaymentNotCompleted(_)) => report.cancelled += 1,
                Err(e) => { warn!(session_id = %session_id, error = %e, "Reconciliation failed"); report.failed += 1; }
            }
        }
        info!(paid = report.paid, cancelled = report.cancelled, still_open = report.still_open, failed = report.failed, "Stale order sweep finished");
        Ok(report)
    }

    /// Snapshot items for `ids`, in request order, priced from the catalog.
    async fn priced_items(&self, ids: &[i64]) -> Result<Vec<(OrderItem, Painting)>> {
        let mut found: HashMap<i64, Painting> = self.paintings.find_by_ids(ids).await?.into_iter().map(|p| (p.id, p)).collect();
        let mut items = Vec::with_capacity(ids.len());
        for id in ids {
            let painting = found.remove(id).ok_or_else(|| {
                if items.iter().any(|(i, _): &(OrderItem, Painting)| i.painting_id == *id) {
                    GalleryError::Validation(format!("Painting {} appears more than once in the cart", id))
                } else {
                    GalleryError::Validation(format!("Painting {} does not exist", id))
                }
            })?;
            let Some(price) = painting.sale_price().cloned() else {
                let reason = if painting.is_for_sale { "has no price" } else { "is no longer for sale" };
                return Err(GalleryError::Validation(format!("Painting '{}' ({}) {}", painting.title, id, reason)));
            };
            items.push((OrderItem { painting_id: painting.id, title: painting.title.clone(), price }, painting));
        }
        Ok(items)
    }

    fn session_request(&self, order: &Order, paintings: &[Painting]) -> SessionRequest {
        let mut line_items: Vec<SessionLineItem> = order.items().iter().zip(paintings).map(|(item, painting)| SessionLineItem {
            name: item.title.clone(),
            amount: item.price.clone(),
            image_url: painting.primary_image().map(|i| i.url.clone()).filter(|u| u.starts_with("https://") || u.starts_with("http://")),
        }).collect();
        if !order.shipping_cost().is_zero() {
            line_items.push(SessionLineItem { name: format!("Shipping: {}", order.shipping().name), amount: order.shipping_cost().clone(), image_url: None });
        }
        SessionRequest {
            order_id: order.id(),
            currency: order.currency().to_string(),
            customer_email: order.customer().email.clone(),
            line_items,
            success_url: self.settings.success_url.clone(),
            cancel_url: self.settings.cancel_url.clone(),
        }
    }

    async fn load_order(&self, order_id: Uuid) -> Result<Order> {
        self.orders.find_by_id(order_id).await?.ok_or_else(|| GalleryError::NotFound(format!("Order {} not found", order_id)))
    }

    async fn publish_all(&self, events: Vec<DomainEvent>) {
        for event in &events { self.events.publish(event).await; }
    }
}
