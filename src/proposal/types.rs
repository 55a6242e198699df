//! Proposal and endorsement types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::identity::Identity;

/// System chaincode answering ledger queries.
pub const QSCC: &str = "qscc";
/// `qscc` function looking a transaction up by id.
pub const GET_TRANSACTION_BY_ID: &str = "GetTransactionByID";

/// Outcome a peer reports for a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProposalStatus {
    Success,
    Failure,
}

/// What the caller wants executed.
#[derive(Debug, Clone)]
pub struct ProposalRequest {
    pub chaincode_name: String,
    pub function: String,
    pub args: Vec<Vec<u8>>,
    pub transient_data: BTreeMap<String, Vec<u8>>,
    pub wait_timeout: Duration,
}

impl ProposalRequest {
    pub fn new(chaincode_name: impl Into<String>, function: impl Into<String>, wait_timeout: Duration) -> Self {
        Self {
            chaincode_name: chaincode_name.into(),
            function: function.into(),
            args: Vec::new(),
            transient_data: BTreeMap::new(),
            wait_timeout,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<[u8]>) -> Self {
        self.args.push(arg.as_ref().to_vec());
        self
    }

    pub fn transient(mut self, key: impl Into<String>, value: impl AsRef<[u8]>) -> Self {
        self.transient_data.insert(key.into(), value.as_ref().to_vec());
        self
    }
}

/// A proposal as sent to peers, bound to a transaction id and a creator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    pub tx_id: String,
    pub channel_id: String,
    pub chaincode_name: String,
    pub function: String,
    pub args: Vec<Vec<u8>>,
    pub transient_data: BTreeMap<String, Vec<u8>>,
    pub creator_msp_id: String,
    pub creator_certificate: String,
}

impl Proposal {
    /// Bind a request to a fresh transaction id.
    pub fn from_request(request: &ProposalRequest, channel_id: &str, creator: &Identity) -> Self {
        Self {
            tx_id: new_tx_id(),
            channel_id: channel_id.to_string(),
            chaincode_name: request.chaincode_name.clone(),
            function: request.function.clone(),
            args: request.args.clone(),
            transient_data: request.transient_data.clone(),
            creator_msp_id: creator.msp_id().to_string(),
            creator_certificate: creator.certificate().to_string(),
        }
    }
}

/// A peer's answer to a proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndorsementResponse {
    pub peer_id: String,
    pub tx_id: String,
    pub status: ProposalStatus,
    pub message: String,
    #[serde(default)]
    pub payload: Vec<u8>,
}

impl EndorsementResponse {
    pub fn success(peer_id: &str, tx_id: &str, payload: Vec<u8>) -> Self {
        Self {
            peer_id: peer_id.to_string(),
            tx_id: tx_id.to_string(),
            status: ProposalStatus::Success,
            message: String::new(),
            payload,
        }
    }

    pub fn failure(peer_id: &str, tx_id: &str, message: impl Into<String>) -> Self {
        Self {
            peer_id: peer_id.to_string(),
            tx_id: tx_id.to_string(),
            status: ProposalStatus::Failure,
            message: message.into(),
            payload: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ProposalStatus::Success
    }
}

/// Fresh transaction id. Never reused across proposals.
pub fn new_tx_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proposal_binds_creator_and_fresh_id() {
        let request = ProposalRequest::new("notary", "put", Duration::from_secs(1))
            .arg("B1")
            .arg(b"H1")
            .transient("nonce", [1u8, 2]);
        let creator = Identity::new("OrgAAdmin", "OrgAMSP");

        let first = Proposal::from_request(&request, "mychannel", &creator);
        let second = Proposal::from_request(&request, "mychannel", &creator);

        assert_eq!(first.args, vec![b"B1".to_vec(), b"H1".to_vec()]);
        assert_eq!(first.creator_msp_id, "OrgAMSP");
        assert_eq!(first.tx_id.len(), 32);
        assert_ne!(first.tx_id, second.tx_id);
    }

    #[test]
    fn test_status_wire_format() {
        let response = EndorsementResponse::failure("peer0", "tx1", "chaincode error");
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "FAILURE");
        assert_eq!(json["peerId"], "peer0");
        assert!(!response.is_success());
    }
}
