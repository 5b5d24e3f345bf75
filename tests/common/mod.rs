#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use gallery_checkout::domain::aggregates::{Painting, PaintingImage, ShippingOption};
use gallery_checkout::domain::events::{DomainEvent, OrderEvent, PaintingEvent};
use gallery_checkout::domain::value_objects::{CountryCode, Money};
use gallery_checkout::event_sink::RecordingEventSink;
use gallery_checkout::payment::{CreatedSession, GatewayError, PaymentGateway, SessionPaymentState, SessionRequest, SessionState, SessionStatus};
use gallery_checkout::repository::InMemoryStore;
use gallery_checkout::service::{CheckoutAddress, CheckoutRequest, CheckoutService, CheckoutSettings};
use rust_decimal_macros::dec;
use tokio::sync::Notify;

#[derive(Default)]
struct Script {
    created: usize,
    lookups: usize,
    fail_next_create: bool,
    hold_next_create: bool,
    fail_lookups: bool,
    sessions: HashMap<String, SessionStatus>,
    requests: Vec<SessionRequest>,
}

/// Gateway double whose session states are driven by the test.
#[derive(Default)]
pub struct ScriptedGateway { script: Mutex<Script>, create_entered: Notify, create_released: Notify }

impl ScriptedGateway {
    pub fn fail_next_create(&self) { self.script.lock().unwrap().fail_next_create = true; }
    /// The next `create_session` waits inside the gateway until `release_create`.
    pub fn hold_next_create(&self) { self.script.lock().unwrap().hold_next_create = true; }
    pub async fn wait_for_held_create(&self) { self.create_entered.notified().await; }
    pub fn release_create(&self) { self.create_released.notify_one(); }
    pub fn fail_lookups(&self, fail: bool) { self.script.lock().unwrap().fail_lookups = fail; }
    pub fn pay(&self, session_id: &str) { self.set(session_id, SessionState::Complete, SessionPaymentState::Paid); }
    pub fn expire(&self, session_id: &str) { self.set(session_id, SessionState::Expired, SessionPaymentState::Unpaid); }
    pub fn create_calls(&self) -> usize { self.script.lock().unwrap().created }
    pub fn lookup_calls(&self) -> usize { self.script.lock().unwrap().lookups }
    pub fn last_request(&self) -> Option<SessionRequest> { self.script.lock().unwrap().requests.last().cloned() }

    fn set(&self, session_id: &str, status: SessionState, payment_status: SessionPaymentState) {
        let mut script = self.script.lock().unwrap();
        let session = script.sessions.get_mut(session_id).expect("unknown session");
        session.status = status;
        session.payment_status = payment_status;
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn create_session(&self, request: &SessionRequest) -> Result<CreatedSession, GatewayError> {
        let held = std::mem::take(&mut self.script.lock().unwrap().hold_next_create);
        if held {
            self.create_entered.notify_one();
            self.create_released.notified().await;
        }
        let mut script = self.script.lock().unwrap();
        if std::mem::take(&mut script.fail_next_create) {
            return Err(GatewayError::Api { status: 503, message: "service unavailable".into() });
        }
        script.created += 1;
        let id = format!("cs_test_{}", script.created);
        let url = format!("https://checkout.test/pay/{}", id);
        script.sessions.insert(id.clone(), SessionStatus { status: SessionState::Open, payment_status: SessionPaymentState::Unpaid, url: Some(url.clone()) });
        script.requests.push(request.clone());
        Ok(CreatedSession { id, url })
    }

    async fn get_session(&self, session_id: &str) -> Result<SessionStatus, GatewayError> {
        let mut script = self.script.lock().unwrap();
        script.lookups += 1;
        if script.fail_lookups { return Err(GatewayError::Api { status: 500, message: "boom".into() }); }
        script.sessions.get(session_id).cloned().ok_or_else(|| GatewayError::Api { status: 404, message: "No such checkout.session".into() })
    }

    fn provider_name(&self) -> &'static str { "scripted" }
}

pub struct Harness {
    pub store: InMemoryStore,
    pub gateway: Arc<ScriptedGateway>,
    pub events: RecordingEventSink,
    pub service: Arc<CheckoutService>,
}

impl Harness {
    pub async fn paintings_sold(&self) -> Vec<i64> {
        self.events.events().await.into_iter().filter_map(|e| match e {
            DomainEvent::Painting(PaintingEvent::Sold { painting_id, .. }) => Some(painting_id),
            _ => None,
        }).collect()
    }

    pub async fn paid_events(&self) -> usize {
        self.events.events().await.iter().filter(|e| matches!(e, DomainEvent::Order(OrderEvent::Paid { .. }))).count()
    }
}

pub fn settings() -> CheckoutSettings {
    CheckoutSettings {
        currency: "EUR".into(),
        home_country: CountryCode::new("HR").unwrap(),
        success_url: "https://gallery.test/payment/success?session_id={CHECKOUT_SESSION_ID}".into(),
        cancel_url: "https://gallery.test/api/v1/payment/cancel?session_id={CHECKOUT_SESSION_ID}".into(),
    }
}

fn painting(id: i64, title: &str, price: Option<Money>) -> Painting {
    let mut p = Painting::new(id, title.to_lowercase().replace(' ', "-"), title, price);
    p.add_image(PaintingImage { url: format!("https://cdn.gallery.test/{}.jpg", id), alt_text: None, is_primary: true, position: 0 });
    p
}

fn option(id: i64, name: &str, cost: Money, is_pickup: bool, is_active: bool) -> ShippingOption {
    ShippingOption {
        id, name: name.into(), cost, free_shipping_threshold: None, supports_domestic: true, supports_international: !is_pickup,
        is_pickup, is_active, estimated_delivery: Some("3-5 days".into()),
    }
}

/// Catalog:
/// 1 "Sunset" €1200, 2 "Study" unpriced, 3 "Harbour" €900, 4 "Olive Grove" €500 not for sale.
/// Shipping: 1 Standard €10, 2 Pickup, 3 Courier (inactive).
pub async fn harness() -> Harness {
    let store = InMemoryStore::new();
    store.insert_painting(painting(1, "Sunset", Some(Money::eur(dec!(1200))))).await;
    store.insert_painting(painting(2, "Study", None)).await;
    store.insert_painting(painting(3, "Harbour", Some(Money::eur(dec!(900))))).await;
    let mut olive = painting(4, "Olive Grove", Some(Money::eur(dec!(500))));
    olive.set_availability(false);
    store.insert_painting(olive).await;
    store.insert_shipping_option(option(1, "Standard", Money::eur(dec!(10)), false, true)).await;
    store.insert_shipping_option(option(2, "Pickup", Money::eur(dec!(0)), true, true)).await;
    store.insert_shipping_option(option(3, "Courier", Money::eur(dec!(25)), false, false)).await;

    let gateway = Arc::new(ScriptedGateway::default());
    let events = RecordingEventSink::new();
    let shared = Arc::new(store.clone());
    let service = CheckoutService::new(shared.clone(), shared.clone(), shared, gateway.clone(), Arc::new(events.clone()), settings());
    Harness { store, gateway, events, service: Arc::new(service) }
}

pub fn checkout_request(painting_ids: Vec<i64>) -> CheckoutRequest {
    CheckoutRequest {
        customer_name: "Ana Horvat".into(),
        email: "ana@example.com".into(),
        phone: Some("+385 91 000 0000".into()),
        address: CheckoutAddress {
            line1: "Ilica 1".into(), line2: None, city: "Zagreb".into(), postal_code: "10000".into(), country: "HR".into(),
        },
        painting_ids,
        terms_accepted: true,
        shipping_option_id: 1,
    }
}
