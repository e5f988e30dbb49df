//! End-to-end client tests against a mock gateway.
//!
//! Exercises the full pipeline over the reqwest transport: headers, form
//! bodies, status handling and response normalization.

use mondido_gateway::{
    MondidoClient,
    config::Credentials,
    operations::{CreditCard, PaymentInstrument, StoredCard, TransactionOptions},
    response::ErrorCode,
    transport::HttpConfig,
};
use rust_decimal::Decimal;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_string, body_string_contains, header, method, path},
};

fn client_for(server: &MockServer) -> MondidoClient {
    MondidoClient::with_http_config(
        Credentials::new("123", "token", "secret"),
        &HttpConfig::default(),
    )
    .expect("client should build")
    .with_base_url(format!("{}/v1/", server.uri()))
    .with_test_mode(true)
}

fn card() -> PaymentInstrument {
    PaymentInstrument::Card(CreditCard::new("4111111111111111", 3, 2030).with_cvv("200"))
}

#[tokio::test]
async fn test_approved_purchase() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/transactions"))
        .and(header("authorization", "Basic MTIzOnRva2Vu"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("payment_ref=order-1"))
        .and(body_string_contains("card_number=4111111111111111"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": 9001,
            "status": "approved",
            "test": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = client_for(&server)
        .purchase(Decimal::new(1000, 2), "SEK", &card(), &TransactionOptions::new("order-1"))
        .await
        .expect("purchase should not error");

    assert!(result.success());
    assert_eq!(result.message(), "Transaction approved");
    assert_eq!(result.authorization(), Some("9001"));
    assert!(result.test());
    assert!(result.error_code().is_none());
}

#[tokio::test]
async fn test_user_agent_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("user-agent", mondido_gateway::client::USER_AGENT))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"status":"approved"}"#))
        .expect(1)
        .mount(&server)
        .await;

    let result = client_for(&server)
        .authorize(Decimal::ONE, "EUR", &card(), &TransactionOptions::new("o-2"))
        .await
        .expect("authorize should not error");
    assert!(result.success());
}

#[tokio::test]
async fn test_decline_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/transactions"))
        .respond_with(ResponseTemplate::new(422).set_body_json(serde_json::json!({
            "name": "errors.payment.declined",
            "code": 129,
            "description": "Payment declined"
        })))
        .mount(&server)
        .await;

    let result = client_for(&server)
        .purchase(Decimal::ONE, "SEK", &card(), &TransactionOptions::new("order-2"))
        .await
        .expect("decline is a result, not an error");

    assert!(!result.success());
    assert_eq!(result.message(), "Payment declined");
    assert_eq!(result.error_code(), Some(ErrorCode::CardDeclined));
}

#[tokio::test]
async fn test_html_error_page() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
        .mount(&server)
        .await;

    let result = client_for(&server)
        .purchase(Decimal::ONE, "SEK", &card(), &TransactionOptions::new("order-3"))
        .await
        .expect("bad gateway is a result, not an error");

    assert!(!result.success());
    assert!(result.message().starts_with("Invalid response received from the Mondido API."));
    assert!(result.message().contains("<html>Bad Gateway</html>"));
    assert_eq!(result.raw()["code"], "invalid_response");
}

#[tokio::test]
async fn test_refund_form_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/refunds"))
        .and(body_string("transaction_id=4711&amount=5.00&reason=Cancelled+order"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"id":5,"status":"approved"}"#))
        .expect(1)
        .mount(&server)
        .await;

    let result = client_for(&server)
        .refund("4711", Decimal::new(5, 0), "Cancelled order")
        .await
        .expect("refund should not error");
    assert!(result.success());
}

#[tokio::test]
async fn test_store_and_unstore() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/stored_cards"))
        .and(body_string_contains("customer_id=42"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"id":17,"status":"approved"}"#))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v1/stored_cards/17"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"id":17,"status":"approved"}"#))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let stored = PaymentInstrument::StoredCard(StoredCard::new("abc123hash", 12, 2031));

    let stored_result = client.store(&stored, "42", Some("cust-1")).await.expect("store");
    assert_eq!(stored_result.authorization(), Some("17"));

    let unstored = client.unstore("17").await.expect("unstore");
    assert!(unstored.success());
}

#[tokio::test]
async fn test_connection_refused_is_normalized() {
    let http = HttpConfig { connect_timeout_secs: 2, ..HttpConfig::default() };
    let client = MondidoClient::with_http_config(Credentials::new("123", "token", "secret"), &http)
        .expect("client should build")
        .with_base_url("http://127.0.0.1:1/v1/");

    let result = client.unstore("17").await.expect("network failure is a result");

    assert!(!result.success());
    assert_eq!(result.raw()["name"], "errors.invalid_response");
    assert!(!result.message().contains("MTIzOnRva2Vu"));
}
