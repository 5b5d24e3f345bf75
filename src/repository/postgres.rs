use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{OrderRepository, PaintingRepository, RepositoryError, RepositoryResult, ShippingOptionRepository};
use crate::domain::aggregates::{CustomerDetails, Order, OrderItem, Painting, PaintingImage, ShippingAddress, ShippingOption, ShippingSnapshot};
use crate::domain::value_objects::{CountryCode, Money};

const ORDER_COLUMNS: &str = "id, customer_name, customer_email, customer_phone, address_line1, address_line2, city, postal_code, country, \
    terms_accepted, status, items_total, shipping_cost, total_amount, currency, payment_session_id, tracking_number, \
    shipping_name, shipping_is_pickup, shipping_estimated_delivery, created_at, updated_at, version";

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid, customer_name: String, customer_email: String, customer_phone: Option<String>,
    address_line1: String, address_line2: Option<String>, city: String, postal_code: String, country: String,
    terms_accepted: bool, status: String, items_total: Decimal, shipping_cost: Decimal, total_amount: Decimal, currency: String,
    payment_session_id: Option<String>, tracking_number: Option<String>,
    shipping_name: String, shipping_is_pickup: bool, shipping_estimated_delivery: Option<String>,
    created_at: DateTime<Utc>, updated_at: DateTime<Utc>, version: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow { order_id: Uuid, painting_id: i64, title: String, price: Decimal }

#[derive(Debug, sqlx::FromRow)]
struct PaintingRow {
    id: i64, slug: String, title: String, description: Option<String>, year: Option<i32>, medium: Option<String>,
    price: Option<Decimal>, is_for_sale: bool, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct PaintingImageRow { painting_id: i64, url: String, alt_text: Option<String>, is_primary: bool, position: i32 }

#[derive(Debug, sqlx::FromRow)]
struct ShippingOptionRow {
    id: i64, name: String, cost: Decimal, free_shipping_threshold: Option<Decimal>, supports_domestic: bool,
    supports_international: bool, is_pickup: bool, is_active: bool, estimated_delivery: Option<String>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItemRow>) -> RepositoryResult<Order> {
        let currency = self.currency;
        let status = self.status.parse().map_err(|e| RepositoryError::Corrupt(format!("order {}: {}", self.id, e)))?;
        let country = CountryCode::new(self.country).map_err(|e| RepositoryError::Corrupt(format!("order {}: {}", self.id, e)))?;
        let shipping_cost = Money::new(self.shipping_cost, &currency);
        Ok(Order {
            id: self.id,
            customer: CustomerDetails { name: self.customer_name, email: self.customer_email, phone: self.customer_phone },
            shipping_address: ShippingAddress { line1: self.address_line1, line2: self.address_line2, city: self.city, postal_code: self.postal_code, country },
            terms_accepted: self.terms_accepted, status,
            items: items.into_iter().map(|i| OrderItem { painting_id: i.painting_id, title: i.title, price: Money::new(i.price, &currency) }).collect(),
            items_total: Money::new(self.items_total, &currency),
            shipping: ShippingSnapshot { name: self.shipping_name, cost: shipping_cost.clone(), is_pickup: self.shipping_is_pickup, estimated_delivery: self.shipping_estimated_delivery },
            shipping_cost,
            total_amount: Money::new(self.total_amount, &currency),
            payment_session_id: self.payment_session_id, tracking_number: self.tracking_number,
            created_at: self.created_at, updated_at: self.updated_at, version: self.version, events: vec![],
        })
    }
}

/// Postgres-backed store for orders, paintings and shipping options.
#[derive(Clone)]
pub struct PgStore { pool: PgPool, currency: String }

impl PgStore {
    /// `currency` is the store currency catalog prices and shipping rates are kept in.
    pub fn new(pool: PgPool, currency: &str) -> Self { Self { pool, currency: currency.to_uppercase() } }

    pub async fn migrate(&self) -> RepositoryResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn attach_items(&self, rows: Vec<OrderRow>) -> RepositoryResult<Vec<Order>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let item_rows = sqlx::query_as::<_, OrderItemRow>("SELECT order_id, painting_id, title, price FROM order_items WHERE order_id = ANY($1) ORDER BY position")
            .bind(&ids[..]).fetch_all(&self.pool).await?;
        let mut by_order: HashMap<Uuid, Vec<OrderItemRow>> = HashMap::new();
        for item in item_rows { by_order.entry(item.order_id).or_default().push(item); }
        rows.into_iter().map(|r| { let items = by_order.remove(&r.id).unwrap_or_default(); r.into_order(items) }).collect()
    }

    async fn single(&self, row: Option<OrderRow>) -> RepositoryResult<Option<Order>> {
        match row {
            Some(row) => Ok(self.attach_items(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn write_items(tx: &mut Transaction<'_, Postgres>, order: &Order) -> RepositoryResult<()> {
        for (position, item) in order.items.iter().enumerate() {
            sqlx::query("INSERT INTO order_items (order_id, position, painting_id, title, price) VALUES ($1, $2, $3, $4, $5)")
                .bind(order.id).bind(position as i32).bind(item.painting_id).bind(&item.title).bind(item.price.amount())
                .execute(&mut **tx).await.map_err(conflict_on_unique)?;
        }
        Ok(())
    }

    async fn load_images(&self, ids: &[i64]) -> RepositoryResult<HashMap<i64, Vec<PaintingImage>>> {
        let rows = sqlx::query_as::<_, PaintingImageRow>("SELECT painting_id, url, alt_text, is_primary, position FROM painting_images WHERE painting_id = ANY($1) ORDER BY position")
            .bind(ids).fetch_all(&self.pool).await?;
        let mut images: HashMap<i64, Vec<PaintingImage>> = HashMap::new();
        for r in rows {
            images.entry(r.painting_id).or_default().push(PaintingImage { url: r.url, alt_text: r.alt_text, is_primary: r.is_primary, position: r.position });
        }
        Ok(images)
    }

    fn painting_from_row(&self, r: PaintingRow, images: Vec<PaintingImage>) -> Painting {
        Painting {
            id: r.id, slug: r.slug, title: r.title, description: r.description, year: r.year, medium: r.medium,
            price: r.price.map(|p| Money::new(p, &self.currency)), is_for_sale: r.is_for_sale, images,
            created_at: r.created_at, updated_at: r.updated_at,
        }
    }

    fn shipping_from_row(&self, r: ShippingOptionRow) -> ShippingOption {
        ShippingOption {
            id: r.id, name: r.name, cost: Money::new(r.cost, &self.currency), free_shipping_threshold: r.free_shipping_threshold,
            supports_domestic: r.supports_domestic, supports_international: r.supports_international,
            is_pickup: r.is_pickup, is_active: r.is_active, estimated_delivery: r.estimated_delivery,
        }
    }
}

fn conflict_on_unique(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() { return RepositoryError::Conflict(db.message().to_string()); }
    }
    RepositoryError::Database(e)
}

#[async_trait]
impl OrderRepository for PgStore {
    async fn list(&self) -> RepositoryResult<Vec<Order>> {
        let sql = format!("SELECT {} FROM orders ORDER BY created_at DESC", ORDER_COLUMNS);
        let rows = sqlx::query_as::<_, OrderRow>(&sql).fetch_all(&self.pool).await?;
        self.attach_items(rows).await
    }

    async fn find_by_id(&self, id: Uuid) -> RepositoryResult<Option<Order>> {
        let sql = format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS);
        let row = sqlx::query_as::<_, OrderRow>(&sql).bind(id).fetch_optional(&self.pool).await?;
        self.single(row).await
    }

    async fn find_by_session_id(&self, session_id: &str) -> RepositoryResult<Option<Order>> {
        let sql = format!("SELECT {} FROM orders WHERE payment_session_id = $1", ORDER_COLUMNS);
        let row = sqlx::query_as::<_, OrderRow>(&sql).bind(session_id).fetch_optional(&self.pool).await?;
        self.single(row).await
    }

    async fn insert(&self, order: &Order) -> RepositoryResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(&format!("INSERT INTO orders ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23)", ORDER_COLUMNS))
            .bind(order.id).bind(&order.customer.name).bind(&order.customer.email).bind(&order.customer.phone)
            .bind(&order.shipping_address.line1).bind(&order.shipping_address.line2).bind(&order.shipping_address.city)
            .bind(&order.shipping_address.postal_code).bind(order.shipping_address.country.as_str())
            .bind(order.terms_accepted).bind(order.status.as_str())
            .bind(order.items_total.amount()).bind(order.shipping_cost.amount()).bind(order.total_amount.amount()).bind(order.currency())
            .bind(&order.payment_session_id).bind(&order.tracking_number)
            .bind(&order.shipping.name).bind(order.shipping.is_pickup).bind(&order.shipping.estimated_delivery)
            .bind(order.created_at).bind(order.updated_at).bind(order.version)
            .execute(&mut *tx).await.map_err(conflict_on_unique)?;
        Self::write_items(&mut tx, order).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn update(&self, order: &mut Order) -> RepositoryResult<()> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("UPDATE orders SET customer_name = $2, customer_email = $3, customer_phone = $4, address_line1 = $5, address_line2 = $6, \
                city = $7, postal_code = $8, country = $9, terms_accepted = $10, status = $11, items_total = $12, shipping_cost = $13, total_amount = $14, \
                currency = $15, payment_session_id = $16, tracking_number = $17, shipping_name = $18, shipping_is_pickup = $19, \
                shipping_estimated_delivery = $20, updated_at = $21, version = version + 1 WHERE id = $1 AND version = $22")
            .bind(order.id).bind(&order.customer.name).bind(&order.customer.email).bind(&order.customer.phone)
            .bind(&order.shipping_address.line1).bind(&order.shipping_address.line2).bind(&order.shipping_address.city)
            .bind(&order.shipping_address.postal_code).bind(order.shipping_address.country.as_str())
            .bind(order.terms_accepted).bind(order.status.as_str())
            .bind(order.items_total.amount()).bind(order.shipping_cost.amount()).bind(order.total_amount.amount()).bind(order.currency())
            .bind(&order.payment_session_id).bind(&order.tracking_number)
            .bind(&order.shipping.name).bind(order.shipping.is_pickup).bind(&order.shipping.estimated_delivery)
            .bind(order.updated_at).bind(order.version)
            .execute(&mut *tx).await.map_err(conflict_on_unique)?;
        if result.rows_affected() == 0 {
            let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM orders WHERE id = $1)").bind(order.id).fetch_one(&mut *tx).await?;
            let what = format!("order {}", order.id);
            return Err(if exists { RepositoryError::Stale(what) } else { RepositoryError::Missing(what) });
        }
        sqlx::query("DELETE FROM order_items WHERE order_id = $1").bind(order.id).execute(&mut *tx).await?;
        Self::write_items(&mut tx, order).await?;
        tx.commit().await?;
        order.version += 1;
        Ok(())
    }

    async fn find_stale_pending(&self, created_before: DateTime<Utc>) -> RepositoryResult<Vec<Order>> {
        let sql = format!("SELECT {} FROM orders WHERE status = 'pending' AND created_at < $1 ORDER BY created_at", ORDER_COLUMNS);
        let rows = sqlx::query_as::<_, OrderRow>(&sql).bind(created_before).fetch_all(&self.pool).await?;
        self.attach_items(rows).await
    }
}

#[async_trait]
impl PaintingRepository for PgStore {
    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Painting>> {
        Ok(self.find_by_ids(&[id]).await?.pop())
    }

    async fn find_by_ids(&self, ids: &[i64]) -> RepositoryResult<Vec<Painting>> {
        let rows = sqlx::query_as::<_, PaintingRow>("SELECT id, slug, title, description, year, medium, price, is_for_sale, created_at, updated_at FROM paintings WHERE id = ANY($1)")
            .bind(ids).fetch_all(&self.pool).await?;
        let mut images = self.load_images(ids).await?;
        Ok(rows.into_iter().map(|r| { let imgs = images.remove(&r.id).unwrap_or_default(); self.painting_from_row(r, imgs) }).collect())
    }

    async fn mark_sold(&self, id: i64) -> RepositoryResult<bool> {
        let result = sqlx::query("UPDATE paintings SET is_for_sale = FALSE, updated_at = NOW() WHERE id = $1 AND is_for_sale = TRUE")
            .bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() == 1)
    }

    /// Images are managed separately and are left untouched.
    async fn update(&self, painting: &Painting) -> RepositoryResult<()> {
        let result = sqlx::query("UPDATE paintings SET slug = $2, title = $3, description = $4, year = $5, medium = $6, price = $7, is_for_sale = $8, updated_at = $9 WHERE id = $1")
            .bind(painting.id).bind(&painting.slug).bind(&painting.title).bind(&painting.description).bind(painting.year).bind(&painting.medium)
            .bind(painting.price.as_ref().map(|p| p.amount())).bind(painting.is_for_sale).bind(painting.updated_at)
            .execute(&self.pool).await.map_err(conflict_on_unique)?;
        if result.rows_affected() == 0 { return Err(RepositoryError::Missing(format!("painting {}", painting.id))); }
        Ok(())
    }
}

#[async_trait]
impl ShippingOptionRepository for PgStore {
    async fn list_active(&self) -> RepositoryResult<Vec<ShippingOption>> {
        let rows = sqlx::query_as::<_, ShippingOptionRow>("SELECT id, name, cost, free_shipping_threshold, supports_domestic, supports_international, is_pickup, is_active, estimated_delivery FROM shipping_options WHERE is_active ORDER BY cost, id")
            .fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|r| self.shipping_from_row(r)).collect())
    }

    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<ShippingOption>> {
        let row = sqlx::query_as::<_, ShippingOptionRow>("SELECT id, name, cost, free_shipping_threshold, supports_domestic, supports_international, is_pickup, is_active, estimated_delivery FROM shipping_options WHERE id = $1")
            .bind(id).fetch_optional(&self.pool).await?;
        Ok(row.map(|r| self.shipping_from_row(r)))
    }
}
