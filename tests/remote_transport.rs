//! Submission path over HTTP against a mock node gateway.

use std::sync::Arc;
use std::time::Duration;

use ledger_gateway::config::ListenerConfig;
use ledger_gateway::network::RemoteTransport;
use ledger_gateway::{CreateTransPayload, GatewayServer, Shutdown};
use tokio::net::TcpListener;

mod common;

#[tokio::test]
async fn test_submit_through_remote_transport() {
    let (node, ledger) = common::start_mock_node().await;
    let crypto = tempfile::tempdir().unwrap();
    common::write_admin(crypto.path(), "orga.example.com");

    let location = format!("grpc://{}", node);
    let client = common::client_for(
        common::org_a_config(&location, &location, crypto.path()),
        Arc::new(RemoteTransport::new(Duration::from_secs(2)).unwrap()),
    );

    let tx_id = client
        .send_transaction(&CreateTransPayload::new("B1", "H1"))
        .await
        .unwrap();
    assert_eq!(client.send_query(&tx_id).await.unwrap(), tx_id);

    let ledger = ledger.lock().unwrap();
    assert_eq!(ledger.joined, vec!["mychannel".to_string()]);
    assert_eq!(ledger.events.len(), 1);
    assert_eq!(ledger.events[0].tx_id, tx_id);
}

#[tokio::test]
async fn test_gateway_end_to_end() {
    let (node, _ledger) = common::start_mock_node().await;
    let crypto = tempfile::tempdir().unwrap();
    common::write_admin(crypto.path(), "orga.example.com");

    let location = format!("grpc://{}", node);
    let client = common::client_for(
        common::org_a_config(&location, &location, crypto.path()),
        Arc::new(RemoteTransport::new(Duration::from_secs(2)).unwrap()),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let gateway = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = GatewayServer::new(Arc::new(client), &ListenerConfig::default());
    let handle = tokio::spawn(server.run(listener, shutdown.clone()));

    let http = reqwest::Client::new();
    let response = http
        .post(format!("http://{}/v1/transactions", gateway))
        .json(&serde_json::json!({ "businessId": "B1", "hash": "H1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::CREATED);
    let receipt: serde_json::Value = response.json().await.unwrap();
    let tx_id = receipt["transactionId"].as_str().unwrap().to_string();

    let health: serde_json::Value = http
        .get(format!("http://{}/health", gateway))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ready");

    let response = http
        .get(format!("http://{}/v1/transactions/{}", gateway, tx_id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}
