use thiserror::Error;

use crate::types::{Address, ProposalIndex};

/// Canonical error type returned by ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Caller lacks the privilege the operation requires: not the chairperson
    /// when granting rights, or zero weight when voting or delegating.
    #[error("{0}")]
    Unauthorized(&'static str),

    /// Caller (or grant target) already consumed its ballot.
    #[error("{0} already voted")]
    AlreadyVoted(Address),

    /// Grant target already holds a non-zero weight.
    #[error("{0} already has the right to vote")]
    AlreadyHasRights(Address),

    /// Delegation target is, or resolves back to, the caller.
    #[error("self-delegation is disallowed")]
    SelfDelegation,

    /// Delegation chain revisits an identity that is not the caller.
    #[error("found loop in delegation at {0}")]
    DelegationCycle(Address),

    /// Proposal index outside `[0, count)`.
    #[error("proposal {index} out of range ({count} proposals)")]
    InvalidProposal { index: ProposalIndex, count: usize },

    /// A ledger must be created with at least one proposal.
    #[error("ballot needs at least one proposal")]
    NoProposals,

    /// Loaded state names a chairperson whose weight was zeroed.
    #[error("chairperson {0} holds no voting weight")]
    ChairpersonWithoutWeight(Address),

    /// Proposal names are stored in 32 bytes with a zero terminator.
    #[error("proposal name {name:?} is {len} bytes, at most 31 allowed")]
    NameTooLong { name: String, len: usize },

    /// Accumulated weight or tally does not fit in a `u64`.
    #[error("weight overflow")]
    WeightOverflow,

    /// Address text was not 20 bytes of hex.
    #[error("invalid address {0:?}")]
    InvalidAddress(String),
}
