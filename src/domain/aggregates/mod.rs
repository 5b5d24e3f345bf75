//! Aggregates module
pub mod painting;
pub mod order;
pub mod shipping;

pub use painting::{Painting, PaintingImage};
pub use order::{Order, OrderError, OrderStatus, OrderItem, CustomerDetails, ShippingAddress};
pub use shipping::{ShippingError, ShippingOption, ShippingSnapshot};
