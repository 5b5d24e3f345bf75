//! Painting Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::domain::value_objects::Money;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Painting {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    pub year: Option<i32>,
    pub medium: Option<String>,
    /// `None` means the painting is not for sale at any price.
    pub price: Option<Money>,
    pub is_for_sale: bool,
    pub images: Vec<PaintingImage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaintingImage { pub url: String, pub alt_text: Option<String>, pub is_primary: bool, pub position: i32 }

impl Painting {
    pub fn new(id: i64, slug: impl Into<String>, title: impl Into<String>, price: Option<Money>) -> Self {
        let now = Utc::now();
        Self {
            id, slug: slug.into(), title: title.into(), description: None, year: None, medium: None,
            is_for_sale: price.is_some(), price, images: vec![], created_at: now, updated_at: now,
        }
    }

    /// Checkout price; `None` unless the painting is listed for sale and carries a price.
    pub fn sale_price(&self) -> Option<&Money> { self.price.as_ref().filter(|_| self.is_for_sale) }

    pub fn primary_image(&self) -> Option<&PaintingImage> {
        self.images.iter().find(|i| i.is_primary).or_else(|| self.images.iter().min_by_key(|i| i.position))
    }

    pub fn add_image(&mut self, image: PaintingImage) {
        if image.is_primary { self.images.iter_mut().for_each(|i| i.is_primary = false); }
        self.images.push(image);
        self.touch();
    }

    pub fn mark_sold(&mut self) { self.set_availability(false); }
    pub fn set_availability(&mut self, is_for_sale: bool) { self.is_for_sale = is_for_sale; self.touch(); }
    pub fn reprice(&mut self, price: Option<Money>) { self.price = price; self.touch(); }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}
