//! Gallery Checkout
//!
//! Order, checkout and payment reconciliation service for an online art gallery.
//!
//! ## Features
//! - Checkout with server-side pricing and shipping resolution
//! - Hosted payment sessions (Stripe Checkout)
//! - Idempotent payment confirmation and inventory update
//! - Order back office: status, tracking, stale order sweep

pub mod api;
pub mod config;
pub mod domain;
pub mod event_sink;
pub mod payment;
pub mod repository;
pub mod service;

use thiserror::Error;

use crate::domain::aggregates::{OrderError, ShippingError};
use crate::payment::GatewayError;
use crate::repository::RepositoryError;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Payment not completed: {0}")]
    PaymentNotCompleted(String),

    #[error("{0}")]
    InvalidTransition(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Payment provider error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Storage error: {0}")]
    Storage(RepositoryError),

    #[error("Unauthorized")]
    Unauthorized,
}

impl GalleryError {
    /// Whether the caller may reasonably retry the same request later.
    pub fn is_retryable(&self) -> bool { matches!(self, Self::Gateway(_) | Self::Storage(_)) }
}

impl From<OrderError> for GalleryError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::InvalidTransition { .. } => Self::InvalidTransition(e.to_string()),
            other => Self::Validation(other.to_string()),
        }
    }
}

impl From<RepositoryError> for GalleryError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::Stale(what) => Self::Conflict(format!("{} was changed by another request", what)),
            other => Self::Storage(other),
        }
    }
}

impl From<ShippingError> for GalleryError {
    fn from(e: ShippingError) -> Self { Self::Validation(e.to_string()) }
}

impl From<validator::ValidationErrors> for GalleryError {
    fn from(e: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = e.errors().keys().map(|k| k.to_string()).collect();
        fields.sort();
        Self::Validation(format!("Invalid checkout details: {}", fields.join(", ")))
    }
}

pub type Result<T> = std::result::Result<T, GalleryError>;
