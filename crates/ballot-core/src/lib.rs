//! Core state machine for delegated-vote ballots.
//!
//! The crate exposes the building blocks the CLI drives:
//!
//! * [`types`] — addresses, fixed-width proposal names, proposal and voter
//!   records.
//! * [`store`] — the key-addressed voter store the ledger is written against.
//! * [`ledger`] — [`VotingLedger`], the chairperson / delegation / tally state
//!   machine.
//!
//! Every mutating ledger operation either applies completely or returns a
//! [`LedgerError`] without touching state.

pub mod ledger;
pub mod store;
pub mod types;

mod error;

pub use error::LedgerError;
pub use ledger::{BallotEvent, VotingLedger};
pub use store::VoterStore;
pub use types::{Address, Proposal, ProposalIndex, ProposalName, Voter, Weight};
