//! RemoteProducer against a mock HTTP collaborator


use genius_brain::{Producer, ProducerAdapter, ProducerError, RemoteProducer};
use mock_producers::market;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn remote(server: &MockServer, timeout: Duration) -> RemoteProducer {
    RemoteProducer::new("sentiment", format!("{}/signal", server.uri()), timeout).unwrap()
}

#[tokio::test]
async fn test_remote_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/signal"))
        .and(body_partial_json(json!({ "symbol": "BTC", "current_price": 100.0 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "signal": -0.4,
            "confidence": 0.6,
            "reasons": ["Fear & Greed at 82"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let output = remote(&server, Duration::from_secs(2))
        .evaluate(&market(100, 2))
        .await
        .unwrap();

    assert_eq!(output.signal, -0.4);
    assert_eq!(output.confidence, 0.6);
    assert_eq!(output.reasons, vec!["Fear & Greed at 82".to_string()]);
}

#[tokio::test]
async fn test_remote_reasons_are_optional() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/signal"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "signal": 0.2, "confidence": 0.5 })),
        )
        .mount(&server)
        .await;

    let output = remote(&server, Duration::from_secs(2))
        .evaluate(&market(100, 2))
        .await
        .unwrap();
    assert!(output.reasons.is_empty());
}

#[tokio::test]
async fn test_remote_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/signal"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
        .mount(&server)
        .await;

    let err = remote(&server, Duration::from_secs(2))
        .evaluate(&market(100, 2))
        .await
        .unwrap_err();

    match err {
        ProducerError::Http(message) => {
            assert!(message.contains("500"));
            assert!(message.contains("model not loaded"));
        }
        other => panic!("expected Http error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_remote_malformed_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/signal"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = remote(&server, Duration::from_secs(2))
        .evaluate(&market(100, 2))
        .await
        .unwrap_err();
    assert!(matches!(err, ProducerError::Decode(_)));
}

#[tokio::test]
async fn test_remote_client_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/signal"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "signal": 0.2, "confidence": 0.5 }))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let err = remote(&server, Duration::from_millis(100))
        .evaluate(&market(100, 2))
        .await
        .unwrap_err();
    assert!(matches!(err, ProducerError::Http(_)));
}

#[tokio::test]
async fn test_adapter_timeout_beats_slow_remote() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/signal"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "signal": 0.2, "confidence": 0.5 }))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let adapter = ProducerAdapter::new(
        Arc::new(remote(&server, Duration::from_secs(10))),
        Duration::from_millis(50),
    );
    let contract = adapter.invoke(&market(100, 2)).await;

    assert!(!contract.active);
    assert_eq!(contract.error.as_deref(), Some("Producer timed out after 50ms"));
}

#[tokio::test]
async fn test_adapter_rejects_remote_out_of_range() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/signal"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "signal": 0.2, "confidence": 7.0 })),
        )
        .mount(&server)
        .await;

    let adapter = ProducerAdapter::new(
        Arc::new(remote(&server, Duration::from_secs(2))),
        Duration::from_secs(2),
    );
    let contract = adapter.invoke(&market(100, 2)).await;

    assert!(!contract.active);
    assert_eq!(contract.signal, 0.0);
    assert!(contract.error.unwrap().contains("confidence 7 outside [0, 1]"));
}

#[tokio::test]
async fn test_unreachable_remote() {
    // Nothing listens on the discard port
    let producer =
        RemoteProducer::new("on_chain", "http://127.0.0.1:9/signal", Duration::from_millis(500))
            .unwrap();
    let err = producer.evaluate(&market(100, 2)).await.unwrap_err();
    assert!(matches!(err, ProducerError::Http(_)));
}
