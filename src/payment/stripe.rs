use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use super::{CreatedSession, GatewayError, PaymentGateway, SessionPaymentState, SessionRequest, SessionState, SessionStatus};

/// Stripe credentials and transport settings, injected at construction.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub secret_key: String,
    pub api_base: String,
    pub timeout: Duration,
}

impl GatewayConfig {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self { secret_key: secret_key.into(), api_base: "https://api.stripe.com".to_string(), timeout: Duration::from_secs(15) }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Deserialize)]
struct SessionBody {
    id: String,
    url: Option<String>,
    status: Option<SessionState>,
    payment_status: Option<SessionPaymentState>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody { error: ErrorDetail }

#[derive(Debug, Deserialize)]
struct ErrorDetail { message: Option<String> }

/// Stripe Checkout Sessions client.
pub struct StripeGateway {
    client: Client,
    config: GatewayConfig,
}

impl StripeGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder().use_rustls_tls().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn sessions_url(&self) -> String { format!("{}/v1/checkout/sessions", self.config.api_base) }

    /// Form body for `POST /v1/checkout/sessions`.
    pub(crate) fn session_form(request: &SessionRequest) -> Result<Vec<(String, String)>, GatewayError> {
        if request.line_items.is_empty() { return Err(GatewayError::InvalidRequest("no line items".to_string())); }
        let currency = request.currency.to_lowercase();
        let mut form = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), request.success_url.clone()),
            ("cancel_url".to_string(), request.cancel_url.clone()),
            ("customer_email".to_string(), request.customer_email.clone()),
            ("client_reference_id".to_string(), request.order_id.to_string()),
            ("metadata[order_id]".to_string(), request.order_id.to_string()),
        ];
        for (i, item) in request.line_items.iter().enumerate() {
            let cents = item.amount.minor_units().map_err(|e| GatewayError::InvalidRequest(format!("{}: {}", item.name, e)))?;
            let prefix = format!("line_items[{}]", i);
            form.push((format!("{}[quantity]", prefix), "1".to_string()));
            form.push((format!("{}[price_data][currency]", prefix), currency.clone()));
            form.push((format!("{}[price_data][unit_amount]", prefix), cents.to_string()));
            form.push((format!("{}[price_data][product_data][name]", prefix), item.name.clone()));
            if let Some(url) = &item.image_url {
                form.push((format!("{}[price_data][product_data][images][0]", prefix), url.clone()));
            }
        }
        Ok(form)
    }

    async fn decode(response: reqwest::Response) -> Result<SessionBody, GatewayError> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body).ok().and_then(|e| e.error.message)
                .unwrap_or_else(|| body.chars().take(200).collect());
            warn!(status = %status, message = %message, "Stripe request failed");
            return Err(GatewayError::Api { status: status.as_u16(), message });
        }
        serde_json::from_str(&body).map_err(|e| GatewayError::Decode(e.to_string()))
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    #[instrument(skip(self, request), fields(order_id = %request.order_id, items = request.line_items.len()))]
    async fn create_session(&self, request: &SessionRequest) -> Result<CreatedSession, GatewayError> {
        let form = Self::session_form(request)?;
        let response = self.client.post(self.sessions_url()).bearer_auth(&self.config.secret_key).form(&form).send().await?;
        let body = Self::decode(response).await?;
        let url = body.url.ok_or_else(|| GatewayError::Decode(format!("session {} has no redirect url", body.id)))?;
        debug!(session_id = %body.id, "Stripe checkout session created");
        Ok(CreatedSession { id: body.id, url })
    }

    #[instrument(skip(self))]
    async fn get_session(&self, session_id: &str) -> Result<SessionStatus, GatewayError> {
        let url = format!("{}/{}", self.sessions_url(), session_id);
        let response = self.client.get(url).bearer_auth(&self.config.secret_key).send().await?;
        let body = Self::decode(response).await?;
        Ok(SessionStatus {
            status: body.status.unwrap_or(SessionState::Unknown),
            payment_status: body.payment_status.unwrap_or(SessionPaymentState::Unknown),
            url: body.url,
        })
    }

    fn provider_name(&self) -> &'static str { "stripe" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::Money;
    use crate::payment::SessionLineItem;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn request(items: Vec<SessionLineItem>) -> SessionRequest {
        SessionRequest {
            order_id: Uuid::nil(), currency: "EUR".into(), customer_email: "ana@example.com".into(), line_items: items,
            success_url: "https://gallery.test/payment/success".into(), cancel_url: "https://gallery.test/payment/cancel".into(),
        }
    }

    #[test]
    fn test_session_form_line_items() {
        let form = StripeGateway::session_form(&request(vec![
            SessionLineItem { name: "Sunset".into(), amount: Money::eur(Decimal::new(1200, 0)), image_url: Some("https://gallery.test/sunset.jpg".into()) },
            SessionLineItem { name: "Shipping: Standard".into(), amount: Money::eur(Decimal::new(1050, 2)), image_url: None },
        ])).unwrap();
        let get = |k: &str| form.iter().find(|(key, _)| key == k).map(|(_, v)| v.as_str());
        assert_eq!(get("mode"), Some("payment"));
        assert_eq!(get("line_items[0][price_data][unit_amount]"), Some("120000"));
        assert_eq!(get("line_items[0][price_data][currency]"), Some("eur"));
        assert_eq!(get("line_items[0][price_data][product_data][images][0]"), Some("https://gallery.test/sunset.jpg"));
        assert_eq!(get("line_items[1][price_data][unit_amount]"), Some("1050"));
        assert_eq!(get("line_items[1][price_data][product_data][images][0]"), None);
    }

    #[test]
    fn test_session_form_rejects_empty() {
        assert!(matches!(StripeGateway::session_form(&request(vec![])), Err(GatewayError::InvalidRequest(_))));
    }

    #[test]
    fn test_config_trims_base() {
        let cfg = GatewayConfig::new("sk_test").with_api_base("http://localhost:12111/");
        assert_eq!(cfg.api_base, "http://localhost:12111");
    }
}
