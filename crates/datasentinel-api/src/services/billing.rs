//! Stripe Checkout client

use anyhow::Context;
use datasentinel_core::{AppError, StripeSettings};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const CHECKOUT_SESSION_PLACEHOLDER: &str = "session_id={CHECKOUT_SESSION_ID}";

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerDetails {
    pub email: Option<String>,
}

/// The subset of a Checkout Session the service reads
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub customer: Option<String>,
    pub customer_email: Option<String>,
    pub customer_details: Option<CustomerDetails>,
}

impl CheckoutSession {
    pub fn is_paid(&self) -> bool {
        self.status.as_deref() == Some("complete") && self.payment_status.as_deref() == Some("paid")
    }

    pub fn email(&self) -> Option<&str> {
        self.customer_details
            .as_ref()
            .and_then(|d| d.email.as_deref())
            .or(self.customer_email.as_deref())
    }
}

#[derive(Clone)]
pub struct StripeClient {
    http_client: Client,
    settings: StripeSettings,
}

impl StripeClient {
    pub fn new(settings: StripeSettings) -> anyhow::Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client for Stripe")?;

        Ok(Self {
            http_client,
            settings,
        })
    }

    fn secret_key(&self) -> Result<&str, AppError> {
        self.settings
            .secret_key
            .as_deref()
            .ok_or_else(|| AppError::Config("STRIPE_SECRET_KEY is not set".to_string()))
    }

    fn sessions_url(&self) -> String {
        format!(
            "{}/v1/checkout/sessions",
            self.settings.api_base.trim_end_matches('/')
        )
    }

    fn success_url(&self) -> String {
        let separator = if self.settings.success_url.contains('?') {
            '&'
        } else {
            '?'
        };
        format!(
            "{}{}{}",
            self.settings.success_url, separator, CHECKOUT_SESSION_PLACEHOLDER
        )
    }

    /// Start a subscription checkout for `customer_email`.
    pub async fn create_checkout_session(
        &self,
        customer_email: &str,
    ) -> Result<CheckoutSession, AppError> {
        let secret_key = self.secret_key()?;
        let price_id = self
            .settings
            .price_id
            .as_deref()
            .ok_or_else(|| AppError::Config("STRIPE_PRICE_ID is not set".to_string()))?;

        let params = [
            ("mode", "subscription".to_string()),
            ("payment_method_types[0]", "card".to_string()),
            ("customer_email", customer_email.to_string()),
            ("line_items[0][price]", price_id.to_string()),
            ("line_items[0][quantity]", "1".to_string()),
            ("success_url", self.success_url()),
            ("cancel_url", self.settings.cancel_url.clone()),
        ];

        let response = self
            .http_client
            .post(self.sessions_url())
            .bearer_auth(secret_key)
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::StripeError(format!("Checkout request failed: {}", e)))?;

        let session = Self::parse(response).await?;
        tracing::info!(session_id = %session.id, "Stripe checkout session created");
        Ok(session)
    }

    pub async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSession, AppError> {
        if !is_checkout_session_id(session_id) {
            return Err(AppError::BadRequest(format!(
                "Invalid checkout session id: {}",
                session_id
            )));
        }
        let secret_key = self.secret_key()?;

        let response = self
            .http_client
            .get(format!("{}/{}", self.sessions_url(), session_id))
            .bearer_auth(secret_key)
            .send()
            .await
            .map_err(|e| AppError::StripeError(format!("Session lookup failed: {}", e)))?;

        Self::parse(response).await
    }

    async fn parse(response: reqwest::Response) -> Result<CheckoutSession, AppError> {
        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::StripeError(format!(
                "Stripe returned {}: {}",
                status, error_text
            )));
        }

        response
            .json::<CheckoutSession>()
            .await
            .map_err(|e| AppError::StripeError(format!("Failed to parse Stripe response: {}", e)))
    }
}

/// Checkout session ids look like `cs_test_a1B2`; anything else never reaches the URL.
fn is_checkout_session_id(id: &str) -> bool {
    id.strip_prefix("cs_").is_some_and(|rest| {
        !rest.is_empty() && rest.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn settings(api_base: String) -> StripeSettings {
        StripeSettings {
            secret_key: Some("sk_test_123".to_string()),
            price_id: Some("price_pro".to_string()),
            success_url: "http://localhost:8080/datasentinel/subscription/success".to_string(),
            cancel_url: "http://localhost:8080/datasentinel/subscription/cancel".to_string(),
            api_base,
        }
    }

    #[tokio::test]
    async fn test_create_checkout_session_sends_form() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/checkout/sessions")
            .match_header("authorization", "Bearer sk_test_123")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("mode".into(), "subscription".into()),
                Matcher::UrlEncoded("payment_method_types[0]".into(), "card".into()),
                Matcher::UrlEncoded("customer_email".into(), "ada@example.com".into()),
                Matcher::UrlEncoded("line_items[0][price]".into(), "price_pro".into()),
                Matcher::UrlEncoded("line_items[0][quantity]".into(), "1".into()),
                Matcher::UrlEncoded(
                    "success_url".into(),
                    "http://localhost:8080/datasentinel/subscription/success?session_id={CHECKOUT_SESSION_ID}"
                        .into(),
                ),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"cs_test_1","url":"https://checkout.stripe.com/c/pay/cs_test_1"}"#)
            .create_async()
            .await;

        let client = StripeClient::new(settings(server.url())).unwrap();
        let session = client
            .create_checkout_session("ada@example.com")
            .await
            .unwrap();

        assert_eq!(session.id, "cs_test_1");
        assert_eq!(
            session.url.as_deref(),
            Some("https://checkout.stripe.com/c/pay/cs_test_1")
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_retrieve_paid_session() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/checkout/sessions/cs_test_1")
            .with_status(200)
            .with_body(
                r#"{"id":"cs_test_1","status":"complete","payment_status":"paid",
                    "customer":"cus_9","customer_details":{"email":"ada@example.com"}}"#,
            )
            .create_async()
            .await;

        let client = StripeClient::new(settings(server.url())).unwrap();
        let session = client.retrieve_checkout_session("cs_test_1").await.unwrap();

        assert!(session.is_paid());
        assert_eq!(session.email(), Some("ada@example.com"));
        assert_eq!(session.customer.as_deref(), Some("cus_9"));
    }

    #[tokio::test]
    async fn test_stripe_error_status_is_reported() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/checkout/sessions")
            .with_status(400)
            .with_body(r#"{"error":{"message":"No such price"}}"#)
            .create_async()
            .await;

        let client = StripeClient::new(settings(server.url())).unwrap();
        let err = client
            .create_checkout_session("ada@example.com")
            .await
            .unwrap_err();
        match err {
            AppError::StripeError(msg) => assert!(msg.contains("No such price")),
            other => panic!("Expected StripeError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_keys_are_config_errors() {
        let mut incomplete = settings("http://127.0.0.1:9".to_string());
        incomplete.price_id = None;
        let client = StripeClient::new(incomplete).unwrap();
        assert!(matches!(
            client.create_checkout_session("ada@example.com").await,
            Err(AppError::Config(_))
        ));

        let mut incomplete = settings("http://127.0.0.1:9".to_string());
        incomplete.secret_key = None;
        let client = StripeClient::new(incomplete).unwrap();
        assert!(matches!(
            client.retrieve_checkout_session("cs_1").await,
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_checkout_session_id_shape() {
        assert!(is_checkout_session_id("cs_test_a1B2c3"));
        assert!(is_checkout_session_id("cs_live_9"));
        assert!(!is_checkout_session_id("cs_"));
        assert!(!is_checkout_session_id("sess_1"));
        assert!(!is_checkout_session_id("cs_1/../../customers"));
        assert!(!is_checkout_session_id("cs_1?expand[]=customer"));
        assert!(!is_checkout_session_id("cs_1%2F"));
    }

    #[tokio::test]
    async fn test_malformed_session_id_is_rejected_before_lookup() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let client = StripeClient::new(settings(server.url())).unwrap();
        let err = client
            .retrieve_checkout_session("cs_1/../../v1/customers")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        mock.assert_async().await;
    }
}
