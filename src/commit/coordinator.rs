//! Commit coordination for one transaction.
//!
//! # Responsibilities
//! - Refuse to order anything unless every peer endorsed
//! - Hand the endorsed envelope to the ordering service
//! - Wait, bounded and cancellable, for the matching commit event
//!
//! # State Machine
//! ```text
//! Proposed ──▶ EndorsementFailed
//!    │──────▶ Rejected (every orderer refused)
//!    └──────▶ Ordered ──▶ Committed
//!                 │──▶ TimedOut
//!                 └──▶ Rejected
//! ```
//!
//! # Design Decisions
//! - The coordinator is consumed by `submit`; a transaction is coordinated once
//! - The event subscription is taken before broadcasting so a fast commit
//!   cannot be missed
//! - A timed-out wait is an outcome; the broadcast is never retracted
//! - Orderers are tried in topology order until one accepts
//! - One deadline covers broadcast and commit wait; cancellation is watched
//!   through both

use std::fmt;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::time::timeout_at;
use tokio::sync::broadcast::error::RecvError;

use crate::channel::ChannelTopology;
use crate::error::{LedgerError, LedgerResult};
use crate::network::{BroadcastStatus, CommitEvent, TransactionEnvelope};
use crate::observability::metrics;
use crate::proposal::EndorsementResponse;

/// Final state of a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// No commit event arrived before the deadline. The transaction may still commit later.
    TimedOut,
    /// The ordering service or the committing peers refused the transaction.
    Rejected,
}

impl CommitOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            CommitOutcome::Committed => "committed",
            CommitOutcome::TimedOut => "timed_out",
            CommitOutcome::Rejected => "rejected",
        }
    }
}

impl fmt::Display for CommitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to a transaction after ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitResult {
    pub transaction_id: String,
    pub outcome: CommitOutcome,
    /// Block the transaction landed in, when a commit event was seen.
    pub block_number: Option<u64>,
    /// Rejection reason or validation code.
    pub reason: Option<String>,
}

impl CommitResult {
    pub fn is_committed(&self) -> bool {
        self.outcome == CommitOutcome::Committed
    }
}

/// Phases a coordinator moves through. Never re-entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitPhase {
    Proposed,
    EndorsementFailed,
    Ordered,
    Committed,
    TimedOut,
    Rejected,
}

/// Single-use driver taking endorsements to a commit outcome.
pub struct CommitCoordinator<'a> {
    topology: &'a ChannelTopology,
    commit_timeout: Duration,
    cancel: Option<broadcast::Receiver<()>>,
    phase: CommitPhase,
    tx_id: String,
}

enum Wait {
    Event(CommitEvent),
    Deadline,
    Cancelled,
    Closed,
}

impl<'a> CommitCoordinator<'a> {
    pub fn new(topology: &'a ChannelTopology, commit_timeout: Duration) -> Self {
        Self {
            topology,
            commit_timeout,
            cancel: None,
            phase: CommitPhase::Proposed,
            tx_id: String::new(),
        }
    }

    /// Abandon the commit wait when this receiver fires.
    pub fn with_cancellation(mut self, cancel: broadcast::Receiver<()>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn phase(&self) -> CommitPhase {
        self.phase
    }

    fn transition(&mut self, next: CommitPhase) {
        tracing::info!(
            channel = %self.topology.channel_id(),
            tx_id = %self.tx_id,
            from = ?self.phase,
            to = ?next,
            "Commit phase transition"
        );
        self.phase = next;
    }

    /// Validate endorsements, order the transaction and wait for its commit.
    pub async fn submit(mut self, responses: Vec<EndorsementResponse>) -> LedgerResult<CommitResult> {
        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + self.commit_timeout;
        self.tx_id = responses.first().map(|r| r.tx_id.clone()).unwrap_or_default();

        if responses.is_empty() {
            self.transition(CommitPhase::EndorsementFailed);
            return Err(LedgerError::endorsement("no endorsements to submit"));
        }
        let (successes, failures): (Vec<_>, Vec<_>) =
            responses.into_iter().partition(|r| r.is_success());
        if let Some(failure) = failures.first() {
            tracing::warn!(
                tx_id = %self.tx_id,
                failed = failures.len(),
                peer = %failure.peer_id,
                message = %failure.message,
                "Endorsement failed, not ordering"
            );
            self.transition(CommitPhase::EndorsementFailed);
            return Err(LedgerError::endorsement(failure.message.clone()));
        }

        let topology = self.topology;
        if topology.orderers().is_empty() {
            return Err(LedgerError::Network(format!(
                "channel {} has no orderers",
                topology.channel_id()
            )));
        }
        let mut events = topology
            .event_hub()
            .ok_or_else(|| {
                LedgerError::Network(format!(
                    "channel {} has no commit event source",
                    topology.channel_id()
                ))
            })?
            .subscribe();

        let envelope = TransactionEnvelope {
            tx_id: self.tx_id.clone(),
            channel_id: topology.channel_id().to_string(),
            endorsements: successes,
        };

        let cancelled = cancelled(self.cancel.take());
        tokio::pin!(cancelled);

        let mut rejections = Vec::new();
        let mut accepted = false;
        for orderer in topology.orderers() {
            let sent = tokio::select! {
                sent = timeout_at(deadline, orderer.broadcast(&envelope)) => sent,
                _ = &mut cancelled => {
                    tracing::warn!(tx_id = %self.tx_id, orderer = %orderer.name(), "Broadcast cancelled");
                    return Err(LedgerError::Cancelled(self.tx_id));
                }
            };
            match sent {
                Ok(Ok(BroadcastStatus::Accepted)) => {
                    tracing::debug!(tx_id = %self.tx_id, orderer = %orderer.name(), "Broadcast accepted");
                    accepted = true;
                    break;
                }
                Ok(Ok(BroadcastStatus::Rejected { reason })) => {
                    tracing::warn!(tx_id = %self.tx_id, orderer = %orderer.name(), reason = %reason, "Broadcast rejected");
                    rejections.push(format!("{}: {}", orderer.name(), reason));
                }
                Ok(Err(e)) => {
                    tracing::warn!(tx_id = %self.tx_id, orderer = %orderer.name(), error = %e, "Broadcast failed");
                }
                Err(_) => {
                    tracing::warn!(tx_id = %self.tx_id, orderer = %orderer.name(), "Broadcast timed out");
                    break;
                }
            }
        }

        if !accepted {
            if rejections.is_empty() {
                return Err(LedgerError::Network(format!(
                    "no orderer accepted transaction {} within {}ms",
                    self.tx_id,
                    self.commit_timeout.as_millis()
                )));
            }
            self.transition(CommitPhase::Rejected);
            metrics::record_commit(CommitOutcome::Rejected.as_str(), started);
            return Ok(CommitResult {
                transaction_id: self.tx_id,
                outcome: CommitOutcome::Rejected,
                block_number: None,
                reason: Some(rejections.join("; ")),
            });
        }
        self.transition(CommitPhase::Ordered);

        let waited = tokio::select! {
            waited = timeout_at(deadline, wait_for(&mut events, &self.tx_id)) => {
                waited.unwrap_or(Wait::Deadline)
            }
            _ = &mut cancelled => Wait::Cancelled,
        };

        let result = match waited {
            Wait::Event(event) if event.valid => {
                self.transition(CommitPhase::Committed);
                CommitResult {
                    transaction_id: self.tx_id.clone(),
                    outcome: CommitOutcome::Committed,
                    block_number: Some(event.block_number),
                    reason: None,
                }
            }
            Wait::Event(event) => {
                self.transition(CommitPhase::Rejected);
                CommitResult {
                    transaction_id: self.tx_id.clone(),
                    outcome: CommitOutcome::Rejected,
                    block_number: Some(event.block_number),
                    reason: Some(event.validation_code),
                }
            }
            Wait::Deadline => {
                self.transition(CommitPhase::TimedOut);
                CommitResult {
                    transaction_id: self.tx_id.clone(),
                    outcome: CommitOutcome::TimedOut,
                    block_number: None,
                    reason: Some(format!(
                        "no commit event within {}ms",
                        self.commit_timeout.as_millis()
                    )),
                }
            }
            Wait::Cancelled => {
                tracing::warn!(tx_id = %self.tx_id, "Commit wait cancelled");
                return Err(LedgerError::Cancelled(self.tx_id));
            }
            Wait::Closed => {
                return Err(LedgerError::Network(format!(
                    "commit event stream closed while waiting for {}",
                    self.tx_id
                )));
            }
        };

        metrics::record_commit(result.outcome.as_str(), started);
        Ok(result)
    }
}

async fn wait_for(events: &mut broadcast::Receiver<CommitEvent>, tx_id: &str) -> Wait {
    loop {
        match events.recv().await {
            Ok(event) if event.tx_id == tx_id => return Wait::Event(event),
            Ok(_) => continue,
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(tx_id = %tx_id, skipped, "Commit event receiver lagged");
            }
            Err(RecvError::Closed) => return Wait::Closed,
        }
    }
}

/// Resolves when the signal fires; never resolves without a live sender.
async fn cancelled(cancel: Option<broadcast::Receiver<()>>) {
    if let Some(mut rx) = cancel {
        match rx.recv().await {
            Ok(()) | Err(RecvError::Lagged(_)) => return,
            Err(RecvError::Closed) => {}
        }
    }
    std::future::pending::<()>().await
}
