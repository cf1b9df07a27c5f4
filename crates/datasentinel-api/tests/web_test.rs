mod helpers;

use helpers::{path, setup_test_app, setup_test_app_with};
use serde_json::{json, Value};

fn location(response: &axum_test::TestResponse) -> String {
    response
        .headers()
        .get("location")
        .expect("Expected a Location header")
        .to_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_index_without_session() {
    let app = setup_test_app().await;

    let response = app.client().get(&path("/")).await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(
        response.json::<Value>(),
        json!({"service": "DataSentinel", "user": null})
    );
}

#[tokio::test]
async fn test_index_with_session_shows_user() {
    let app = setup_test_app().await;
    let cookie = app.session_cookie("ada@example.com", false);

    let response = app
        .client()
        .get(&path("/"))
        .add_header("cookie", cookie)
        .await;
    assert_eq!(response.status_code(), 200);

    let body = response.json::<Value>();
    assert_eq!(body["user"]["email"], "ada@example.com");
    assert_eq!(body["user"]["is_pro"], false);
}

#[tokio::test]
async fn test_session_routes_require_login() {
    let app = setup_test_app().await;

    for p in [
        "/dashboard",
        "/settings",
        "/reports",
        "/convert",
        "/validation",
        "/normalization",
        "/profiling",
        "/prediction",
        "/view/validation/1",
        "/subscribe/pro",
    ] {
        let response = app.client().get(&path(p)).await;
        assert_eq!(response.status_code(), 401, "path: {}", p);
        assert_eq!(response.json::<Value>()["code"], "UNAUTHORIZED", "path: {}", p);
    }
}

#[tokio::test]
async fn test_tampered_cookie_is_rejected() {
    let app = setup_test_app().await;
    let cookie = format!("{}x", app.session_cookie("ada@example.com", true));

    let response = app
        .client()
        .get(&path("/dashboard"))
        .add_header("cookie", cookie)
        .await;
    assert_eq!(response.status_code(), 401);
}

#[tokio::test]
async fn test_login_rejects_invalid_email() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post(&path("/login"))
        .form(&[("email", "not-an-email")])
        .await;
    assert_eq!(response.status_code(), 400);

    let response = app
        .client()
        .post(&path("/login"))
        .json(&json!({"email": "still not an email"}))
        .await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_logout_clears_cookie() {
    let app = setup_test_app().await;

    let response = app.client().get(&path("/logout")).await;
    assert_eq!(response.status_code(), 302);
    assert_eq!(location(&response), "/datasentinel");

    let set_cookie = response
        .headers()
        .get("set-cookie")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(set_cookie.starts_with("datasentinel_session=;"));
    assert!(set_cookie.contains("Max-Age=0"));
    assert_eq!(response.headers().get("cache-control").unwrap(), "no-store");
}

#[tokio::test]
async fn test_prediction_locked_page() {
    let app = setup_test_app().await;

    let response = app.client().get(&path("/prediction/locked")).await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(
        response.json::<Value>(),
        json!({"locked": true, "upgrade_url": "/datasentinel/subscribe/pro"})
    );
}

#[tokio::test]
async fn test_subscription_cancel_redirects_home() {
    let app = setup_test_app().await;

    let response = app.client().get(&path("/subscription/cancel")).await;
    assert_eq!(response.status_code(), 303);
    assert_eq!(location(&response), "/datasentinel");
}

#[tokio::test]
async fn test_subscribe_redirects_to_checkout() {
    let mut stripe = mockito::Server::new_async().await;
    let mock = stripe
        .mock("POST", "/v1/checkout/sessions")
        .match_header("authorization", "Bearer sk_test_abc")
        .match_body(mockito::Matcher::UrlEncoded(
            "customer_email".into(),
            "ada@example.com".into(),
        ))
        .with_status(200)
        .with_body(r#"{"id":"cs_1","url":"https://checkout.stripe.com/c/pay/cs_1"}"#)
        .create_async()
        .await;

    let app = setup_test_app_with(&[
        ("STRIPE_SECRET_KEY", "sk_test_abc".to_string()),
        ("STRIPE_PRICE_ID", "price_pro".to_string()),
        ("STRIPE_API_BASE", stripe.url()),
    ])
    .await;
    let cookie = app.session_cookie("ada@example.com", false);

    let response = app
        .client()
        .get(&path("/subscribe/pro"))
        .add_header("cookie", cookie)
        .await;
    assert_eq!(response.status_code(), 303);
    assert_eq!(
        location(&response),
        "https://checkout.stripe.com/c/pay/cs_1"
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn test_subscribe_without_stripe_keys_is_config_error() {
    let app = setup_test_app().await;
    let cookie = app.session_cookie("ada@example.com", false);

    let response = app
        .client()
        .get(&path("/subscribe/pro"))
        .add_header("cookie", cookie)
        .await;
    assert_eq!(response.status_code(), 500);
}

#[tokio::test]
async fn test_unpaid_checkout_does_not_grant_pro() {
    let mut stripe = mockito::Server::new_async().await;
    stripe
        .mock("GET", "/v1/checkout/sessions/cs_open")
        .with_status(200)
        .with_body(r#"{"id":"cs_open","status":"open","payment_status":"unpaid"}"#)
        .create_async()
        .await;

    let app = setup_test_app_with(&[
        ("STRIPE_SECRET_KEY", "sk_test_abc".to_string()),
        ("STRIPE_API_BASE", stripe.url()),
    ])
    .await;
    let cookie = app.session_cookie("ada@example.com", false);

    let response = app
        .client()
        .get(&path("/subscription/success"))
        .add_query_param("session_id", "cs_open")
        .add_header("cookie", cookie.clone())
        .await;
    assert_eq!(response.status_code(), 402);

    let response = app
        .client()
        .get(&path("/subscription/success"))
        .add_header("cookie", cookie)
        .await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_malformed_checkout_session_id_is_bad_request() {
    let mut stripe = mockito::Server::new_async().await;
    let lookup = stripe
        .mock("GET", mockito::Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let app = setup_test_app_with(&[
        ("STRIPE_SECRET_KEY", "sk_test_abc".to_string()),
        ("STRIPE_API_BASE", stripe.url()),
    ])
    .await;
    let cookie = app.session_cookie("ada@example.com", false);

    let response = app
        .client()
        .get(&path("/subscription/success"))
        .add_query_param("session_id", "cs_open/../../customers")
        .add_header("cookie", cookie)
        .await;
    assert_eq!(response.status_code(), 400);
    lookup.assert_async().await;
}
