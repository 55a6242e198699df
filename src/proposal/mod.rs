//! Proposal construction and endorsement fan-out.

pub mod dispatcher;
pub mod lifecycle;
pub mod types;

pub use dispatcher::ProposalDispatcher;
pub use lifecycle::{ChaincodeId, ChaincodePackage, DeploymentSpec, LifecycleAction, LSCC};
pub use types::{
    new_tx_id, EndorsementResponse, Proposal, ProposalRequest, ProposalStatus,
    GET_TRANSACTION_BY_ID, QSCC,
};
