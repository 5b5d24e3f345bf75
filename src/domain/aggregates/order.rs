//! Order Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use crate::domain::aggregates::shipping::ShippingSnapshot;
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::{CountryCode, Money, MoneyError};

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub(crate) id: Uuid,
    pub(crate) customer: CustomerDetails,
    pub(crate) shipping_address: ShippingAddress,
    pub(crate) terms_accepted: bool,
    pub(crate) status: OrderStatus,
    pub(crate) items: Vec<OrderItem>,
    pub(crate) items_total: Money,
    pub(crate) shipping_cost: Money,
    pub(crate) total_amount: Money,
    pub(crate) payment_session_id: Option<String>,
    pub(crate) tracking_number: Option<String>,
    pub(crate) shipping: ShippingSnapshot,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
    /// Bumped on every stored write; an update only applies to the version it was read at.
    #[serde(skip)]
    pub(crate) version: i64,
    #[serde(skip)]
    pub(crate) events: Vec<DomainEvent>,
}

/// Line item snapshot; title and price are copied from the catalog at order time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem { pub painting_id: i64, pub title: String, pub price: Money }

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDetails { pub name: String, pub email: String, pub phone: Option<String> }

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress { pub line1: String, pub line2: Option<String>, pub city: String, pub postal_code: String, pub country: CountryCode }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus { #[default] Pending, Paid, Shipped, Cancelled }

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Pending => "pending", Self::Paid => "paid", Self::Shipped => "shipped", Self::Cancelled => "cancelled" }
    }

    pub fn is_terminal(&self) -> bool { matches!(self, Self::Shipped | Self::Cancelled) }

    /// Setting the current status again is accepted as a no-op.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        *self == next || matches!((self, next), (Pending, Paid) | (Pending, Cancelled) | (Paid, Shipped) | (Paid, Cancelled))
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for OrderStatus {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending), "paid" => Ok(Self::Paid),
            "shipped" => Ok(Self::Shipped), "cancelled" | "canceled" => Ok(Self::Cancelled),
            other => Err(OrderError::UnknownStatus(other.to_string())),
        }
    }
}

impl Order {
    /// Places a new pending order. The total is fixed here and never recomputed.
    pub fn place(customer: CustomerDetails, shipping_address: ShippingAddress, terms_accepted: bool, items: Vec<OrderItem>, shipping: ShippingSnapshot, currency: &str) -> Result<Self, OrderError> {
        if !terms_accepted { return Err(OrderError::TermsNotAccepted); }
        if items.is_empty() { return Err(OrderError::NoItems); }
        let mut seen = HashSet::new();
        if let Some(dup) = items.iter().find(|i| !seen.insert(i.painting_id)) { return Err(OrderError::DuplicateItem(dup.painting_id)); }

        let items_total = items.iter().try_fold(Money::zero(currency), |acc, i| acc.add(&i.price))?;
        let total_amount = items_total.add(&shipping.cost)?;
        let now = Utc::now();
        let mut order = Self {
            id: Uuid::now_v7(), customer, shipping_address, terms_accepted, status: OrderStatus::Pending, items,
            items_total, shipping_cost: shipping.cost.clone(), total_amount, payment_session_id: None, tracking_number: None,
            shipping, created_at: now, updated_at: now, version: 0, events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Placed { order_id: order.id, total: order.total_amount.amount() }));
        Ok(order)
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn customer(&self) -> &CustomerDetails { &self.customer }
    pub fn shipping_address(&self) -> &ShippingAddress { &self.shipping_address }
    pub fn terms_accepted(&self) -> bool { self.terms_accepted }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn items(&self) -> &[OrderItem] { &self.items }
    pub fn items_total(&self) -> &Money { &self.items_total }
    pub fn shipping_cost(&self) -> &Money { &self.shipping_cost }
    pub fn total_amount(&self) -> &Money { &self.total_amount }
    pub fn currency(&self) -> &str { self.total_amount.currency() }
    pub fn payment_session_id(&self) -> Option<&str> { self.payment_session_id.as_deref() }
    pub fn tracking_number(&self) -> Option<&str> { self.tracking_number.as_deref() }
    pub fn shipping(&self) -> &ShippingSnapshot { &self.shipping }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }
    pub fn version(&self) -> i64 { self.version }

    pub fn attach_session(&mut self, session_id: impl Into<String>) { self.payment_session_id = Some(session_id.into()); self.touch(); }

    pub fn mark_paid(&mut self) -> Result<(), OrderError> {
        self.transition(OrderStatus::Paid)?;
        self.raise_event(DomainEvent::Order(OrderEvent::Paid { order_id: self.id }));
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), OrderError> {
        self.transition(OrderStatus::Cancelled)?;
        self.raise_event(DomainEvent::Order(OrderEvent::Cancelled { order_id: self.id }));
        Ok(())
    }

    /// Administrative status change, limited to the allowed transitions.
    pub fn change_status(&mut self, next: OrderStatus) -> Result<(), OrderError> {
        let previous = self.status;
        self.transition(next)?;
        if previous == next { return Ok(()); }
        match next {
            OrderStatus::Paid => self.raise_event(DomainEvent::Order(OrderEvent::Paid { order_id: self.id })),
            OrderStatus::Cancelled => self.raise_event(DomainEvent::Order(OrderEvent::Cancelled { order_id: self.id })),
            OrderStatus::Shipped => self.raise_event(DomainEvent::Order(OrderEvent::Shipped { order_id: self.id, tracking: self.tracking_number.clone() })),
            OrderStatus::Pending => {}
        }
        Ok(())
    }

    pub fn set_tracking(&mut self, tracking_number: &str) -> Result<(), OrderError> {
        let tracking = tracking_number.trim();
        if tracking.is_empty() { return Err(OrderError::EmptyTracking); }
        self.tracking_number = Some(tracking.to_string());
        self.touch();
        Ok(())
    }

    fn transition(&mut self, next: OrderStatus) -> Result<(), OrderError> {
        if !self.status.can_transition_to(next) { return Err(OrderError::InvalidTransition { from: self.status, to: next }); }
        self.status = next;
        self.touch();
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderError {
    #[error("Terms and conditions must be accepted")]
    TermsNotAccepted,
    #[error("Order has no items")]
    NoItems,
    #[error("Painting {0} appears more than once in the order")]
    DuplicateItem(i64),
    #[error("Order status cannot change from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("Unknown order status '{0}'")]
    UnknownStatus(String),
    #[error("Tracking number must not be empty")]
    EmptyTracking,
    #[error(transparent)]
    Money(#[from] MoneyError),
}
