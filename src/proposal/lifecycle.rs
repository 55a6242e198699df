//! Chaincode lifecycle proposals.
//!
//! Install goes to peers only and is never ordered. Instantiate and upgrade
//! are ordinary state-changing proposals against the lifecycle system
//! chaincode: endorsed, ordered, then waited on like any transaction.
//!
//! ```text
//! install      lscc.install  [chaincodeId, package]
//! instantiate  lscc.deploy   [channel, deploymentSpec]   transient {method}
//! upgrade      lscc.upgrade  [channel, deploymentSpec]   transient {method}
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{LedgerError, LedgerResult};
use crate::proposal::types::ProposalRequest;

/// Lifecycle system chaincode.
pub const LSCC: &str = "lscc";
pub const INSTALL: &str = "install";
pub const DEPLOY: &str = "deploy";
pub const UPGRADE: &str = "upgrade";
/// Chaincode function run on instantiate and again on every upgrade.
pub const INIT_FUNCTION: &str = "init";
/// Transient key naming the lifecycle request kind.
pub const METHOD_KEY: &str = "method";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChaincodeId {
    pub name: String,
    pub version: String,
}

impl ChaincodeId {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl std::fmt::Display for ChaincodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.name, self.version)
    }
}

/// Chaincode source already packaged for installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChaincodePackage(pub Vec<u8>);

impl ChaincodePackage {
    pub fn from_file(path: &std::path::Path) -> LedgerResult<Self> {
        std::fs::read(path)
            .map(ChaincodePackage)
            .map_err(|e| LedgerError::Config(format!("cannot read chaincode package {}: {}", path.display(), e)))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// What instantiate and upgrade ask the lifecycle chaincode to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSpec {
    pub chaincode: ChaincodeId,
    pub function: String,
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endorsement_policy: Option<String>,
}

impl DeploymentSpec {
    pub fn new(chaincode: ChaincodeId, args: Vec<String>) -> Self {
        Self {
            chaincode,
            function: INIT_FUNCTION.to_string(),
            args,
            endorsement_policy: None,
        }
    }

    pub fn with_endorsement_policy(mut self, policy: impl Into<String>) -> Self {
        self.endorsement_policy = Some(policy.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    Instantiate,
    Upgrade,
}

impl LifecycleAction {
    pub fn function(self) -> &'static str {
        match self {
            LifecycleAction::Instantiate => DEPLOY,
            LifecycleAction::Upgrade => UPGRADE,
        }
    }

    pub fn method(self) -> &'static str {
        match self {
            LifecycleAction::Instantiate => "InstantiateProposalRequest",
            LifecycleAction::Upgrade => "UpgradeProposalRequest",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleAction::Instantiate => "instantiate",
            LifecycleAction::Upgrade => "upgrade",
        }
    }
}

/// Install `package` as `chaincode` on whichever peers receive the request.
pub fn install_request(
    chaincode: &ChaincodeId,
    package: &ChaincodePackage,
    wait_timeout: Duration,
) -> LedgerResult<ProposalRequest> {
    if package.as_bytes().is_empty() {
        return Err(LedgerError::Config(format!(
            "chaincode package for {} is empty",
            chaincode
        )));
    }
    Ok(ProposalRequest::new(LSCC, INSTALL, wait_timeout)
        .arg(encode(chaincode)?)
        .arg(package.as_bytes()))
}

/// Instantiate or upgrade `spec` on `channel_id`.
pub fn deployment_request(
    action: LifecycleAction,
    channel_id: &str,
    spec: &DeploymentSpec,
    wait_timeout: Duration,
) -> LedgerResult<ProposalRequest> {
    Ok(ProposalRequest::new(LSCC, action.function(), wait_timeout)
        .arg(channel_id)
        .arg(encode(spec)?)
        .transient(METHOD_KEY, action.method()))
}

fn encode<T: Serialize>(value: &T) -> LedgerResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| LedgerError::Config(format!("cannot encode lifecycle argument: {}", e)))
}
