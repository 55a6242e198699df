//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.
//!
//! Organizations live under `[orgs.<name>]`, mirroring the
//! `<prefix>.<orgName>.<field>` property layout of the network profile.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Fallback for `sdk.invoke_wait_time` (seconds).
pub const DEFAULT_INVOKE_WAIT_SECS: u64 = 30;
/// Fallback for `sdk.deploy_wait_time` (seconds).
pub const DEFAULT_DEPLOY_WAIT_SECS: u64 = 120;
/// Fallback for `sdk.proposal_wait_time` (seconds).
pub const DEFAULT_PROPOSAL_WAIT_SECS: u64 = 30;

/// Root configuration for the ledger gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Global SDK settings (TLS flag, wait times).
    pub sdk: SdkConfig,

    /// The organization/channel/chaincode triple the client facade binds to.
    pub client: ClientBinding,

    /// Where enrollment material is read from.
    pub credentials: CredentialsConfig,

    /// HTTP listener for the caller-facing API.
    pub listener: ListenerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Organizations keyed by name.
    pub orgs: BTreeMap<String, OrgConfig>,
}

/// Process-wide SDK settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SdkConfig {
    /// Rewrite `grpc://` endpoints to `grpcs://` and attach TLS properties.
    pub tls: bool,

    /// Seconds to wait for a commit event after ordering.
    pub invoke_wait_time: Option<u64>,

    /// Seconds to wait for deployment-type proposals.
    pub deploy_wait_time: Option<u64>,

    /// Seconds each peer gets to answer a proposal.
    pub proposal_wait_time: Option<u64>,
}

impl SdkConfig {
    pub fn invoke_wait(&self) -> Duration {
        Duration::from_secs(self.invoke_wait_time.unwrap_or(DEFAULT_INVOKE_WAIT_SECS))
    }

    pub fn deploy_wait(&self) -> Duration {
        Duration::from_secs(self.deploy_wait_time.unwrap_or(DEFAULT_DEPLOY_WAIT_SECS))
    }

    pub fn proposal_wait(&self) -> Duration {
        Duration::from_secs(self.proposal_wait_time.unwrap_or(DEFAULT_PROPOSAL_WAIT_SECS))
    }
}

/// Binding of the client facade.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientBinding {
    /// Organization name (key in `orgs`).
    pub org: String,

    /// Channel the facade submits to.
    pub channel: String,

    /// Chaincode name.
    pub chaincode: String,

    /// Chaincode version.
    pub version: String,
}

impl Default for ClientBinding {
    fn default() -> Self {
        Self {
            org: String::new(),
            channel: "mychannel".to_string(),
            chaincode: String::new(),
            version: "1.0".to_string(),
        }
    }
}

/// Credential material locations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Root of the `crypto-config` tree.
    pub crypto_root: PathBuf,

    /// Load the `Admin@<domain>` identity of every organization at startup.
    pub load_peer_admins: bool,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            crypto_root: PathBuf::from("config/channel/crypto-config"),
            load_peer_admins: true,
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Whole-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 120,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Prometheus exporter bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// One organization as written in the config file.
///
/// Every field is optional at the serde level so that validation can report
/// all missing keys at once.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct OrgConfig {
    /// Membership service provider id.
    pub mspid: Option<String>,

    /// Domain name, used to locate credential material.
    pub domname: Option<String>,

    /// Comma separated `name@location` pairs.
    pub peer_locations: Option<String>,

    /// Comma separated `name@location` pairs.
    pub orderer_locations: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert!(!config.sdk.tls);
        assert!(config.orgs.is_empty());
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.sdk.invoke_wait(), Duration::from_secs(DEFAULT_INVOKE_WAIT_SECS));
    }

    #[test]
    fn test_parse_orgs_table() {
        let raw = r#"
            [sdk]
            tls = true
            proposal_wait_time = 5

            [orgs.OrgA]
            mspid = "OrgAMSP"
            domname = "orga.example.com"
            peer_locations = "peer0.orga.example.com@grpc://h1:7051"
            orderer_locations = "orderer.example.com@grpc://h2:7050"
        "#;
        let config: GatewayConfig = toml::from_str(raw).unwrap();
        assert!(config.sdk.tls);
        assert_eq!(config.sdk.proposal_wait(), Duration::from_secs(5));
        assert_eq!(config.sdk.deploy_wait(), Duration::from_secs(DEFAULT_DEPLOY_WAIT_SECS));

        let org = config.orgs.get("OrgA").unwrap();
        assert_eq!(org.mspid.as_deref(), Some("OrgAMSP"));
        assert_eq!(org.domname.as_deref(), Some("orga.example.com"));
    }
}
