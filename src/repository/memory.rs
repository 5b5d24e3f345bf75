use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{OrderRepository, PaintingRepository, RepositoryError, RepositoryResult, ShippingOptionRepository};
use crate::domain::aggregates::{Order, OrderStatus, Painting, ShippingOption};

#[derive(Default)]
struct Tables {
    orders: HashMap<Uuid, Order>,
    paintings: HashMap<i64, Painting>,
    shipping_options: HashMap<i64, ShippingOption>,
}

/// Process-local store implementing every repository contract.
///
/// Cloning shares the same tables.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self { Self::default() }

    pub async fn insert_painting(&self, painting: Painting) { self.tables.write().await.paintings.insert(painting.id, painting); }

    pub async fn insert_shipping_option(&self, option: ShippingOption) {
        self.tables.write().await.shipping_options.insert(option.id, option);
    }

    pub async fn delete_painting(&self, id: i64) -> bool { self.tables.write().await.paintings.remove(&id).is_some() }

    pub async fn order_count(&self) -> usize { self.tables.read().await.orders.len() }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn list(&self) -> RepositoryResult<Vec<Order>> {
        let mut orders: Vec<Order> = self.tables.read().await.orders.values().cloned().collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn find_by_id(&self, id: Uuid) -> RepositoryResult<Option<Order>> {
        Ok(self.tables.read().await.orders.get(&id).cloned())
    }

    async fn find_by_session_id(&self, session_id: &str) -> RepositoryResult<Option<Order>> {
        let tables = self.tables.read().await;
        Ok(tables.orders.values().find(|o| o.payment_session_id.as_deref() == Some(session_id)).cloned())
    }

    async fn insert(&self, order: &Order) -> RepositoryResult<()> {
        let mut tables = self.tables.write().await;
        if tables.orders.contains_key(&order.id) { return Err(RepositoryError::Conflict(format!("order {}", order.id))); }
        let mut stored = order.clone();
        stored.events.clear();
        tables.orders.insert(order.id, stored);
        Ok(())
    }

    async fn update(&self, order: &mut Order) -> RepositoryResult<()> {
        let mut tables = self.tables.write().await;
        match tables.orders.get(&order.id) {
            None => return Err(RepositoryError::Missing(format!("order {}", order.id))),
            Some(stored) if stored.version != order.version => return Err(RepositoryError::Stale(format!("order {}", order.id))),
            Some(_) => {}
        }
        if let Some(session_id) = order.payment_session_id.as_deref() {
            let taken = tables.orders.values().any(|o| o.id != order.id && o.payment_session_id.as_deref() == Some(session_id));
            if taken { return Err(RepositoryError::Conflict(format!("payment session {}", session_id))); }
        }
        let slot = tables.orders.get_mut(&order.id).ok_or_else(|| RepositoryError::Missing(format!("order {}", order.id)))?;
        order.version += 1;
        *slot = order.clone();
        slot.events.clear();
        Ok(())
    }

    async fn find_stale_pending(&self, created_before: DateTime<Utc>) -> RepositoryResult<Vec<Order>> {
        let tables = self.tables.read().await;
        let mut stale: Vec<Order> = tables.orders.values()
            .filter(|o| o.status == OrderStatus::Pending && o.created_at < created_before)
            .cloned()
            .collect();
        stale.sort_by_key(|o| o.created_at);
        Ok(stale)
    }
}

#[async_trait]
impl PaintingRepository for InMemoryStore {
    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Painting>> {
        Ok(self.tables.read().await.paintings.get(&id).cloned())
    }

    async fn find_by_ids(&self, ids: &[i64]) -> RepositoryResult<Vec<Painting>> {
        let tables = self.tables.read().await;
        Ok(ids.iter().filter_map(|id| tables.paintings.get(id).cloned()).collect())
    }

    async fn mark_sold(&self, id: i64) -> RepositoryResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.paintings.get_mut(&id) {
            Some(p) if p.is_for_sale => { p.mark_sold(); Ok(true) }
            _ => Ok(false),
        }
    }

    async fn update(&self, painting: &Painting) -> RepositoryResult<()> {
        let mut tables = self.tables.write().await;
        let slot = tables.paintings.get_mut(&painting.id).ok_or_else(|| RepositoryError::Missing(format!("painting {}", painting.id)))?;
        *slot = painting.clone();
        Ok(())
    }
}

#[async_trait]
impl ShippingOptionRepository for InMemoryStore {
    async fn list_active(&self) -> RepositoryResult<Vec<ShippingOption>> {
        let mut options: Vec<ShippingOption> = self.tables.read().await.shipping_options.values().filter(|o| o.is_active).cloned().collect();
        options.sort_by_key(|o| o.id);
        Ok(options)
    }

    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<ShippingOption>> {
        Ok(self.tables.read().await.shipping_options.get(&id).cloned())
    }
}
