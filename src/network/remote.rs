//! HTTP/JSON gateway transport.
//!
//! # Responsibilities
//! - Map `grpc://` / `grpcs://` locations onto the node's HTTP gateway
//! - Trust the per-endpoint TLS certificate when one is configured
//! - Verify TLS against the endpoint's hostname override, dialing the
//!   location's own address
//! - Poll a peer for commit events, with that peer's client, and fan them out
//!   to subscribers
//!
//! # Wire Protocol
//! ```text
//! peer     POST /v1/channels/{channel}/join   {mspId, certificate}
//! peer     POST /v1/proposals                 Proposal → EndorsementResponse
//! peer     GET  /v1/channels/{channel}/events?after={block} → [CommitEvent]
//! orderer  POST /v1/broadcast                 TransactionEnvelope → BroadcastStatus
//! orderer  POST /v1/channels                  {channelId, config, signature}
//! both     GET  /v1/health
//! ```

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use url::Url;

use crate::identity::Identity;
use crate::network::traits::{EndorsingPeer, EventHub, OrderingService, Transport};
use crate::network::types::{
    BroadcastStatus, ChannelConfig, CommitEvent, EndpointProperties, TransactionEnvelope,
    TransportError,
};
use crate::proposal::types::{EndorsementResponse, Proposal};

const EVENT_BUFFER: usize = 1024;
const EVENT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Transport talking to node gateways over HTTP.
#[derive(Debug, Clone)]
pub struct RemoteTransport {
    /// Used for endpoints without a dedicated TLS certificate.
    default_client: Client,
    /// Applied to every request; the core adds its own deadlines on top.
    request_timeout: Duration,
    /// Connection built for each handle, keyed by location.
    endpoints: Arc<DashMap<String, Endpoint>>,
}

/// How one location is reached.
#[derive(Debug, Clone)]
struct Endpoint {
    client: Client,
    base: Url,
    /// The client trusts the endpoint's own PEM.
    trusts_pem: bool,
}

impl RemoteTransport {
    pub fn new(request_timeout: Duration) -> Result<Self, TransportError> {
        let default_client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| TransportError::Protocol(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self {
            default_client,
            request_timeout,
            endpoints: Arc::new(DashMap::new()),
        })
    }

    fn connect(&self, location: &str, properties: &EndpointProperties) -> Result<Endpoint, TransportError> {
        let mut base = gateway_url(location)?;
        let certificate = match properties.pem_file.as_ref() {
            Some(pem_file) => {
                let pem = std::fs::read(pem_file).map_err(|e| {
                    TransportError::Protocol(format!("cannot read {}: {}", pem_file.display(), e))
                })?;
                Some(
                    reqwest::Certificate::from_pem(&pem)
                        .map_err(|e| TransportError::Protocol(format!("bad TLS certificate: {}", e)))?,
                )
            }
            None => None,
        };
        let redirect = hostname_redirect(&base, properties)?;

        let endpoint = if certificate.is_none() && redirect.is_none() {
            Endpoint {
                client: self.default_client.clone(),
                base,
                trusts_pem: false,
            }
        } else {
            let trusts_pem = certificate.is_some();
            let mut builder = Client::builder().timeout(self.request_timeout);
            if let Some(certificate) = certificate {
                builder = builder.add_root_certificate(certificate);
            }
            if let Some((host, addrs)) = redirect {
                builder = builder.resolve_to_addrs(&host, &addrs);
                base.set_host(Some(host.as_str()))
                    .map_err(|e| TransportError::Protocol(format!("bad hostname override '{}': {}", host, e)))?;
            }
            let client = builder
                .build()
                .map_err(|e| TransportError::Protocol(format!("cannot build TLS client: {}", e)))?;
            Endpoint {
                client,
                base,
                trusts_pem,
            }
        };
        self.endpoints.insert(location.to_string(), endpoint.clone());
        Ok(endpoint)
    }

    /// The connection a handle at `location` was created with.
    fn endpoint(&self, location: &str) -> Result<Endpoint, TransportError> {
        match self.endpoints.get(location) {
            Some(endpoint) => Ok(endpoint.value().clone()),
            None => Ok(Endpoint {
                client: self.default_client.clone(),
                base: gateway_url(location)?,
                trusts_pem: false,
            }),
        }
    }
}

impl Transport for RemoteTransport {
    fn new_peer(
        &self,
        name: &str,
        location: &str,
        properties: &EndpointProperties,
    ) -> Result<Arc<dyn EndorsingPeer>, TransportError> {
        Ok(Arc::new(RemotePeer {
            node: RemoteNode::new(name, location, self.connect(location, properties)?),
        }))
    }

    fn new_orderer(
        &self,
        name: &str,
        location: &str,
        properties: &EndpointProperties,
    ) -> Result<Arc<dyn OrderingService>, TransportError> {
        Ok(Arc::new(RemoteOrderer {
            node: RemoteNode::new(name, location, self.connect(location, properties)?),
        }))
    }

    fn sign_channel_config(
        &self,
        _config: &ChannelConfig,
        signer: &Identity,
    ) -> Result<Vec<u8>, TransportError> {
        Err(TransportError::rejected(
            signer.name(),
            "channel configuration signing is not available over the HTTP gateway",
        ))
    }

    fn event_hub(
        &self,
        channel_id: &str,
        peers: &[Arc<dyn EndorsingPeer>],
    ) -> Result<Arc<dyn EventHub>, TransportError> {
        let peer = peers
            .first()
            .ok_or_else(|| TransportError::Protocol("no peer to receive events from".to_string()))?;
        let endpoint = self.endpoint(peer.location())?;
        let url = endpoint
            .base
            .join(&format!("v1/channels/{}/events", channel_id))
            .map_err(|e| TransportError::Protocol(e.to_string()))?;
        tracing::debug!(
            peer = %peer.name(),
            url = %url,
            trusts_pem = endpoint.trusts_pem,
            "Starting commit event poll"
        );
        Ok(Arc::new(RemoteEventHub::spawn(
            endpoint.client,
            url,
            peer.name().to_string(),
        )))
    }
}

/// Map a gRPC location onto its HTTP gateway URL.
pub fn gateway_url(location: &str) -> Result<Url, TransportError> {
    let rewritten = if let Some(rest) = location.strip_prefix("grpcs://") {
        format!("https://{}", rest)
    } else if let Some(rest) = location.strip_prefix("grpc://") {
        format!("http://{}", rest)
    } else {
        return Err(TransportError::Protocol(format!(
            "unsupported location '{}'",
            location
        )));
    };
    let mut url = Url::parse(&rewritten).map_err(|e| TransportError::Protocol(e.to_string()))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Under TLS, the certificate is checked against the hostname override while
/// the connection still goes to the location's address.
fn hostname_redirect(
    base: &Url,
    properties: &EndpointProperties,
) -> Result<Option<(String, Vec<SocketAddr>)>, TransportError> {
    let host = properties.hostname_override.as_str();
    if !properties.tls || host.is_empty() || base.host_str() == Some(host) {
        return Ok(None);
    }
    let addrs = base
        .socket_addrs(|| None)
        .map_err(|e| TransportError::Protocol(format!("cannot resolve {}: {}", base, e)))?;
    Ok(Some((host.to_string(), addrs)))
}

fn map_reqwest(node: &str, err: reqwest::Error) -> TransportError {
    if err.is_connect() || err.is_timeout() {
        TransportError::unreachable(node, err.to_string())
    } else {
        TransportError::Protocol(format!("{}: {}", node, err))
    }
}

struct RemoteNode {
    name: String,
    location: String,
    base: Url,
    client: Client,
}

impl RemoteNode {
    fn new(name: &str, location: &str, endpoint: Endpoint) -> Self {
        Self {
            name: name.to_string(),
            location: location.to_string(),
            base: endpoint.base,
            client: endpoint.client,
        }
    }

    fn url(&self, path: &str) -> Result<Url, TransportError> {
        self.base
            .join(path)
            .map_err(|e| TransportError::Protocol(e.to_string()))
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, TransportError> {
        self.client
            .post(self.url(path)?)
            .json(body)
            .send()
            .await
            .map_err(|e| map_reqwest(&self.name, e))
    }

    async fn ping(&self) -> Result<(), TransportError> {
        let response = self
            .client
            .get(self.url("v1/health")?)
            .send()
            .await
            .map_err(|e| map_reqwest(&self.name, e))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(TransportError::unreachable(
                &self.name,
                format!("health check returned {}", response.status()),
            ))
        }
    }

    async fn reject(&self, response: reqwest::Response) -> TransportError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        TransportError::rejected(&self.name, format!("{} {}", status, body.trim()))
    }
}

struct RemotePeer {
    node: RemoteNode,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JoinRequest<'a> {
    msp_id: &'a str,
    certificate: &'a str,
}

#[async_trait]
impl EndorsingPeer for RemotePeer {
    fn name(&self) -> &str {
        &self.node.name
    }

    fn location(&self) -> &str {
        &self.node.location
    }

    async fn join_channel(&self, channel_id: &str, signer: &Identity) -> Result<(), TransportError> {
        let body = JoinRequest {
            msp_id: signer.msp_id(),
            certificate: signer.certificate(),
        };
        let response = self
            .node
            .post(&format!("v1/channels/{}/join", channel_id), &body)
            .await?;
        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::CONFLICT => Ok(()),
            _ => Err(self.node.reject(response).await),
        }
    }

    async fn propose(&self, proposal: &Proposal) -> Result<EndorsementResponse, TransportError> {
        let response = self.node.post("v1/proposals", proposal).await?;
        if !response.status().is_success() {
            return Err(self.node.reject(response).await);
        }
        response
            .json::<EndorsementResponse>()
            .await
            .map_err(|e| TransportError::Protocol(format!("{}: {}", self.node.name, e)))
    }

    async fn ping(&self) -> Result<(), TransportError> {
        self.node.ping().await
    }
}

struct RemoteOrderer {
    node: RemoteNode,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateChannelRequest<'a> {
    channel_id: &'a str,
    config: &'a [u8],
    signature: &'a [u8],
}

#[async_trait]
impl OrderingService for RemoteOrderer {
    fn name(&self) -> &str {
        &self.node.name
    }

    fn location(&self) -> &str {
        &self.node.location
    }

    async fn broadcast(&self, envelope: &TransactionEnvelope) -> Result<BroadcastStatus, TransportError> {
        let response = self.node.post("v1/broadcast", envelope).await?;
        if !response.status().is_success() {
            return Err(self.node.reject(response).await);
        }
        response
            .json::<BroadcastStatus>()
            .await
            .map_err(|e| TransportError::Protocol(format!("{}: {}", self.node.name, e)))
    }

    async fn create_channel(
        &self,
        channel_id: &str,
        config: &ChannelConfig,
        signature: &[u8],
    ) -> Result<(), TransportError> {
        let body = CreateChannelRequest {
            channel_id,
            config: config.as_bytes(),
            signature,
        };
        let response = self.node.post("v1/channels", &body).await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(self.node.reject(response).await)
        }
    }

    async fn ping(&self) -> Result<(), TransportError> {
        self.node.ping().await
    }
}

/// Long-polls one peer for commit events.
struct RemoteEventHub {
    sender: broadcast::Sender<CommitEvent>,
    task: JoinHandle<()>,
}

impl RemoteEventHub {
    fn spawn(client: Client, url: Url, peer: String) -> Self {
        let (sender, _) = broadcast::channel(EVENT_BUFFER);
        let tx = sender.clone();
        let task = tokio::spawn(async move {
            let mut after: Option<u64> = None;
            loop {
                let mut request = client.get(url.clone());
                if let Some(block) = after {
                    request = request.query(&[("after", block)]);
                }
                let events = match request.send().await {
                    Ok(response) if response.status().is_success() => {
                        response.json::<Vec<CommitEvent>>().await.map_err(|e| e.to_string())
                    }
                    Ok(response) => Err(format!("status {}", response.status())),
                    Err(e) => Err(e.to_string()),
                };
                match events {
                    Ok(events) => {
                        for event in events {
                            after = Some(after.map_or(event.block_number, |b| b.max(event.block_number)));
                            let _ = tx.send(event);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(peer = %peer, error = %e, "Commit event poll failed");
                        tokio::time::sleep(EVENT_RETRY_DELAY).await;
                    }
                }
            }
        });
        Self { sender, task }
    }
}

impl EventHub for RemoteEventHub {
    fn subscribe(&self) -> broadcast::Receiver<CommitEvent> {
        self.sender.subscribe()
    }
}

impl Drop for RemoteEventHub {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_url_mapping() {
        assert_eq!(
            gateway_url("grpc://h1:7051").unwrap().as_str(),
            "http://h1:7051/"
        );
        assert_eq!(
            gateway_url("grpcs://h1:7051").unwrap().as_str(),
            "https://h1:7051/"
        );
        assert!(gateway_url("tcp://h1:7051").is_err());
    }

    const SERVER_CRT: &str = "-----BEGIN CERTIFICATE-----
MIIBmjCCAT+gAwIBAgIUKpmAGpkzqRY8RHWbNt9QNdvo7WgwCgYIKoZIzj0EAwIw
ITEfMB0GA1UEAwwWcGVlcjAub3JnYS5leGFtcGxlLmNvbTAgFw0yNjEwMTkwNjE2
MDRaGA8yMTI2MDkyNTA2MTYwNFowITEfMB0GA1UEAwwWcGVlcjAub3JnYS5leGFt
cGxlLmNvbTBZMBMGByqGSM49AgEGCCqGSM49AwEHA0IABK6exvF2/5R4UbDWUdER
74oNxUoftTffbe6UJ1R9hcsISj82OSS1uoEvKCLWD0w1GpJQIPHA++g1lcOtiGs7
1KSjUzBRMB0GA1UdDgQWBBSFxtT4BccfalJNYwdFEbzSTBEEPzAfBgNVHSMEGDAW
gBSFxtT4BccfalJNYwdFEbzSTBEEPzAPBgNVHRMBAf8EBTADAQH/MAoGCCqGSM49
BAMCA0kAMEYCIQCXyPE95POEFhLlbXMTZu7x0XJYnEhPDhOeAo9HYuXAcwIhAOqi
21Imb+5FWLiHI26nbdbdALi5QMPxbd51/lZzfqIW
-----END CERTIFICATE-----
";

    fn tls_properties(dir: &std::path::Path) -> EndpointProperties {
        let pem_file = dir.join("server.crt");
        std::fs::write(&pem_file, SERVER_CRT).unwrap();
        EndpointProperties {
            pem_file: Some(pem_file),
            hostname_override: "peer0.orga.example.com".into(),
            tls: true,
        }
    }

    #[test]
    fn test_node_urls() {
        let transport = RemoteTransport::new(Duration::from_secs(1)).unwrap();
        let endpoint = transport
            .connect("grpc://h1:7051", &EndpointProperties::plaintext("peer0"))
            .unwrap();
        let node = RemoteNode::new("peer0", "grpc://h1:7051", endpoint);
        assert_eq!(
            node.url("v1/channels/mychannel/join").unwrap().as_str(),
            "http://h1:7051/v1/channels/mychannel/join"
        );
    }

    #[tokio::test]
    async fn test_unreachable_peer_maps_to_transport_error() {
        let transport = RemoteTransport::new(Duration::from_millis(500)).unwrap();
        // Port 9 (discard) on localhost is closed in test environments.
        let peer = transport
            .new_peer("peer0", "grpc://127.0.0.1:9", &EndpointProperties::plaintext("peer0"))
            .unwrap();
        let err = peer.ping().await.unwrap_err();
        assert!(matches!(
            err,
            TransportError::Unreachable { .. } | TransportError::Protocol(_)
        ));
    }

    #[test]
    fn test_missing_tls_certificate() {
        let transport = RemoteTransport::new(Duration::from_secs(1)).unwrap();
        let properties = EndpointProperties {
            pem_file: Some("/nonexistent/server.crt".into()),
            hostname_override: "peer0".into(),
            tls: true,
        };
        assert!(transport
            .new_peer("peer0", "grpcs://h1:7051", &properties)
            .is_err());
    }

    #[test]
    fn test_hostname_override_keeps_dial_address() {
        let dir = tempfile::tempdir().unwrap();
        let transport = RemoteTransport::new(Duration::from_secs(1)).unwrap();
        let endpoint = transport
            .connect("grpcs://127.0.0.1:7051", &tls_properties(dir.path()))
            .unwrap();
        assert_eq!(endpoint.base.as_str(), "https://peer0.orga.example.com:7051/");

        let base = gateway_url("grpcs://127.0.0.1:7051").unwrap();
        let (host, addrs) = hostname_redirect(&base, &tls_properties(dir.path()))
            .unwrap()
            .unwrap();
        assert_eq!(host, "peer0.orga.example.com");
        assert_eq!(addrs, vec!["127.0.0.1:7051".parse::<SocketAddr>().unwrap()]);

        let plain = EndpointProperties::plaintext("peer0.orga.example.com");
        assert!(hostname_redirect(&base, &plain).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_event_hub_polls_with_the_peer_client() {
        let dir = tempfile::tempdir().unwrap();
        let transport = RemoteTransport::new(Duration::from_secs(1)).unwrap();
        let peer = transport
            .new_peer("peer0.orga.example.com", "grpcs://127.0.0.1:7051", &tls_properties(dir.path()))
            .unwrap();

        let endpoint = transport.endpoint("grpcs://127.0.0.1:7051").unwrap();
        assert!(endpoint.trusts_pem);
        assert_eq!(endpoint.base.host_str(), Some("peer0.orga.example.com"));
        assert!(transport.event_hub("mychannel", &[peer]).is_ok());

        let unknown = transport.endpoint("grpc://h9:7051").unwrap();
        assert!(!unknown.trusts_pem);
    }
}
