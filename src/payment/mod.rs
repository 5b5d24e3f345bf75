//! Hosted checkout gateway.
//!
//! The checkout service treats the gateway as an unreliable remote dependency: every call may
//! fail with a [`GatewayError`], which the service turns into its own error kind.

mod stripe;

pub use stripe::{GatewayConfig, StripeGateway};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::Money;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Gateway unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Gateway returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected gateway response: {0}")]
    Decode(String),

    #[error("Invalid session request: {0}")]
    InvalidRequest(String),
}

/// One purchasable line on the hosted payment page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionLineItem { pub name: String, pub amount: Money, pub image_url: Option<String> }

#[derive(Clone, Debug)]
pub struct SessionRequest {
    pub order_id: Uuid,
    pub currency: String,
    pub customer_email: String,
    pub line_items: Vec<SessionLineItem>,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreatedSession { pub id: String, pub url: String }

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Open,
    Complete,
    Expired,
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPaymentState {
    Paid,
    Unpaid,
    NoPaymentRequired,
    #[serde(other)]
    Unknown,
}

/// Authoritative state of a checkout session as reported by the gateway.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionStatus { pub status: SessionState, pub payment_status: SessionPaymentState, pub url: Option<String> }

impl SessionStatus {
    pub fn is_paid(&self) -> bool { self.status == SessionState::Complete && self.payment_status == SessionPaymentState::Paid }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_session(&self, request: &SessionRequest) -> Result<CreatedSession, GatewayError>;
    async fn get_session(&self, session_id: &str) -> Result<SessionStatus, GatewayError>;
    fn provider_name(&self) -> &'static str;
}
