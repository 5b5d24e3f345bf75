//! Domain events
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DomainEvent {
    Order(OrderEvent),
    Painting(PaintingEvent),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order_id: Uuid, total: Decimal },
    Paid { order_id: Uuid },
    Shipped { order_id: Uuid, tracking: Option<String> },
    Cancelled { order_id: Uuid },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PaintingEvent {
    Sold { painting_id: i64, order_id: Uuid },
}

impl DomainEvent {
    /// Message subject, e.g. `gallery.order.paid`.
    pub fn subject(&self) -> String {
        let name = match self {
            Self::Order(OrderEvent::Placed { .. }) => "order.placed",
            Self::Order(OrderEvent::Paid { .. }) => "order.paid",
            Self::Order(OrderEvent::Shipped { .. }) => "order.shipped",
            Self::Order(OrderEvent::Cancelled { .. }) => "order.cancelled",
            Self::Painting(PaintingEvent::Sold { .. }) => "painting.sold",
        };
        format!("gallery.{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_subject_and_payload() {
        let e = DomainEvent::Painting(PaintingEvent::Sold { painting_id: 3, order_id: Uuid::nil() });
        assert_eq!(e.subject(), "gallery.painting.sold");
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["event"], "sold");
        assert_eq!(json["painting_id"], 3);
    }
}
