//! Full submission path over the in-memory network.

use std::sync::Arc;
use std::time::Duration;

use ledger_gateway::network::{CommitBehaviour, MemoryNetwork, PeerBehaviour};
use ledger_gateway::{CreateTransPayload, LedgerError, Shutdown};

mod common;

#[tokio::test]
async fn test_submit_and_query() {
    let crypto = tempfile::tempdir().unwrap();
    common::write_admin(crypto.path(), "orga.example.com");
    let network = MemoryNetwork::new();
    let client = common::client_for(
        common::org_a_config("grpc://h1:7051", "grpc://h2:7050", crypto.path()),
        Arc::new(network.clone()),
    );

    let tx_id = client
        .send_transaction(&CreateTransPayload::new("B1", "H1"))
        .await
        .unwrap();
    assert!(!tx_id.is_empty());
    assert_eq!(client.send_query(&tx_id).await.unwrap(), tx_id);

    let org = client.organization().await.unwrap();
    assert_eq!(org.joined_peers(), vec!["peer0"]);
    assert_eq!(org.peer_admin().unwrap().certificate(), common::CERT_PEM);
    assert!(network.is_joined("peer0", "mychannel"));
}

#[tokio::test]
async fn test_topology_reused_across_calls() {
    let crypto = tempfile::tempdir().unwrap();
    common::write_admin(crypto.path(), "orga.example.com");
    let network = MemoryNetwork::new();
    let client = Arc::new(common::client_for(
        common::org_a_config("grpc://h1:7051", "grpc://h2:7050", crypto.path()),
        Arc::new(network.clone()),
    ));

    let mut tasks = Vec::new();
    for i in 0..8 {
        let client = client.clone();
        tasks.push(tokio::spawn(async move {
            client
                .send_transaction(&CreateTransPayload::new(format!("B{}", i), "H"))
                .await
        }));
    }
    let mut ids = Vec::new();
    for task in tasks {
        ids.push(task.await.unwrap().unwrap());
    }

    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 8);
    assert_eq!(network.join_count(), 1);
    assert_eq!(client.cached_topology().unwrap().peers().len(), 1);
}

#[tokio::test]
async fn test_rejected_endorsement_never_ordered() {
    let crypto = tempfile::tempdir().unwrap();
    common::write_admin(crypto.path(), "orga.example.com");
    let network = MemoryNetwork::new();
    network.set_peer("peer0", PeerBehaviour::Reject("hash mismatch".into()));
    let client = common::client_for(
        common::org_a_config("grpc://h1:7051", "grpc://h2:7050", crypto.path()),
        Arc::new(network.clone()),
    );

    let err = client
        .send_transaction(&CreateTransPayload::new("B1", "H1"))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Server { ref message, .. } if message == "hash mismatch"));
    assert_eq!(network.broadcast_count(), 0);
}

#[tokio::test]
async fn test_shutdown_cancels_commit_wait() {
    let crypto = tempfile::tempdir().unwrap();
    common::write_admin(crypto.path(), "orga.example.com");
    let network = MemoryNetwork::new();
    network.set_commit(CommitBehaviour::Never);
    let shutdown = Shutdown::new();
    let client = common::client_for(
        common::org_a_config("grpc://h1:7051", "grpc://h2:7050", crypto.path()),
        Arc::new(network.clone()),
    )
    .with_shutdown(shutdown.clone());

    let trigger = async {
        // Long enough for the broadcast to happen, well short of the 2s commit wait.
        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown.trigger();
    };
    let payload = CreateTransPayload::new("B1", "H1");
    let started = std::time::Instant::now();
    let (result, ()) = tokio::join!(
        client.send_transaction(&payload),
        trigger
    );

    let err = result.unwrap_err();
    assert!(err.to_string().contains("cancelled"));
    assert!(started.elapsed() < Duration::from_millis(1500));
    assert_eq!(network.broadcast_count(), 1);
}
