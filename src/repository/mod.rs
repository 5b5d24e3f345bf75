//! Typed persistence contracts, one per aggregate.
//!
//! The checkout service only talks to these traits. `PgStore` backs them with Postgres,
//! `InMemoryStore` with process memory.

mod memory;
mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::aggregates::{Order, Painting, ShippingOption};

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Record {0} not found")]
    Missing(String),

    #[error("Duplicate record: {0}")]
    Conflict(String),

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("{0} was modified concurrently")]
    Stale(String),
}

pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// All orders, newest first, with their items.
    async fn list(&self) -> RepositoryResult<Vec<Order>>;
    async fn find_by_id(&self, id: Uuid) -> RepositoryResult<Option<Order>>;
    async fn find_by_session_id(&self, session_id: &str) -> RepositoryResult<Option<Order>>;
    /// Persists the order and its items atomically.
    async fn insert(&self, order: &Order) -> RepositoryResult<()>;
    /// Full replace of the order row and its items, applied only if the stored version still
    /// matches `order.version()`. Bumps the version on success; `Stale` otherwise.
    async fn update(&self, order: &mut Order) -> RepositoryResult<()>;
    async fn find_stale_pending(&self, created_before: DateTime<Utc>) -> RepositoryResult<Vec<Order>>;
}

#[async_trait]
pub trait PaintingRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Painting>>;
    /// Paintings matching `ids`; ids with no row are simply absent from the result.
    async fn find_by_ids(&self, ids: &[i64]) -> RepositoryResult<Vec<Painting>>;
    /// Flips `is_for_sale` to false only if it is currently true.
    /// Returns false when the painting is missing or was already sold.
    async fn mark_sold(&self, id: i64) -> RepositoryResult<bool>;
    async fn update(&self, painting: &Painting) -> RepositoryResult<()>;
}

#[async_trait]
pub trait ShippingOptionRepository: Send + Sync {
    async fn list_active(&self) -> RepositoryResult<Vec<ShippingOption>>;
    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<ShippingOption>>;
}
