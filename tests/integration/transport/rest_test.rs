//! RestTransport tests against a mock HTTP server

use assert_matches::assert_matches;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use xfchat::transport::rest::RestTransport;
use xfchat::transport::{ChatTransport, TransportError};

#[tokio::test]
async fn send_message_posts_json_and_parses_receipt() {
    let server = MockServer::start().await;
    let conversation_id = Uuid::new_v4();
    let message_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path(format!("/api/conversations/{}/messages", conversation_id)))
        .and(header("Authorization", "Bearer secret"))
        .and(body_json(json!({"content": "hi"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message_id": message_id,
            "created_at": "2026-03-01T12:00:00Z",
        })))
        .mount(&server)
        .await;

    let transport = RestTransport::new(server.uri()).with_token("secret");
    let receipt = transport.send_message(conversation_id, "hi").await.unwrap();
    assert_eq!(receipt.message_id, message_id);
}

#[tokio::test]
async fn edit_message_patches_and_parses_receipt() {
    let server = MockServer::start().await;
    let message_id = Uuid::new_v4();

    Mock::given(method("PATCH"))
        .and(path(format!("/api/messages/{}", message_id)))
        .and(body_json(json!({"content": "bye"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "edited_at": "2026-03-01T12:01:00Z",
        })))
        .mount(&server)
        .await;

    let transport = RestTransport::new(server.uri());
    let receipt = transport.edit_message(message_id, "bye").await.unwrap();
    assert_eq!(receipt.edited_at.to_rfc3339(), "2026-03-01T12:01:00+00:00");
}

#[tokio::test]
async fn delete_error_status_maps_to_http_error() {
    let server = MockServer::start().await;
    let message_id = Uuid::new_v4();

    Mock::given(method("DELETE"))
        .and(path(format!("/api/messages/{}", message_id)))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let transport = RestTransport::new(server.uri());
    let err = transport.delete_message(message_id).await.unwrap_err();
    assert_matches!(err, TransportError::Http { status: 403, ref body } if body.as_str() == "forbidden");
}

#[tokio::test]
async fn fetch_history_sends_pagination_params() {
    let server = MockServer::start().await;
    let conversation_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path(format!("/api/conversations/{}/messages", conversation_id)))
        .and(query_param("page", "2"))
        .and(query_param("page_size", "25"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": [{"anything": "the adapter decides"}],
            "has_more": true,
        })))
        .mount(&server)
        .await;

    let transport = RestTransport::new(server.uri());
    let page = transport.fetch_history(conversation_id, 2, 25).await.unwrap();
    assert_eq!(page.records.len(), 1);
    assert!(page.has_more);
}

#[tokio::test]
async fn malformed_receipt_maps_to_decode_error() {
    let server = MockServer::start().await;
    let conversation_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path(format!("/api/conversations/{}/messages", conversation_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"nope": true})))
        .mount(&server)
        .await;

    let transport = RestTransport::new(server.uri());
    let err = transport.send_message(conversation_id, "hi").await.unwrap_err();
    assert_matches!(err, TransportError::Decode(_));
}

#[tokio::test]
async fn subscribe_deltas_forwards_each_line_then_closes() {
    let server = MockServer::start().await;
    let conversation_id = Uuid::new_v4();
    let body = format!(
        "{}\n{}\nnot json\n{}\n",
        json!({"seq": 1}),
        json!({"seq": 2}),
        json!({"seq": 3}),
    );

    Mock::given(method("GET"))
        .and(path(format!("/api/conversations/{}/deltas", conversation_id)))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(body.into_bytes(), "application/x-ndjson"),
        )
        .mount(&server)
        .await;

    let transport = RestTransport::new(server.uri());
    let mut frames = transport.subscribe_deltas(conversation_id).await.unwrap();

    assert_eq!(frames.recv().await.unwrap()["seq"], 1);
    assert_eq!(frames.recv().await.unwrap()["seq"], 2);
    // The malformed line is dropped, not forwarded.
    assert_eq!(frames.recv().await.unwrap()["seq"], 3);
    assert!(frames.recv().await.is_none());
}

#[tokio::test]
async fn subscribe_deltas_rejects_error_status() {
    let server = MockServer::start().await;
    let conversation_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path(format!("/api/conversations/{}/deltas", conversation_id)))
        .respond_with(ResponseTemplate::new(401).set_body_string("no token"))
        .mount(&server)
        .await;

    let transport = RestTransport::new(server.uri());
    let err = transport.subscribe_deltas(conversation_id).await.unwrap_err();
    assert_matches!(err, TransportError::Http { status: 401, .. });
}
