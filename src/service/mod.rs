//! Application services.
mod checkout;

pub use checkout::{CheckoutAddress, CheckoutRequest, CheckoutService, CheckoutSession, CheckoutSettings, ReconcileReport};
