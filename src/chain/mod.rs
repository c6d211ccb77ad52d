pub mod store;

use std::collections::BTreeMap;

use ballot_core::{Address, BallotEvent, LedgerError, VotingLedger};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::contracts::{BallotCall, BallotQuery, QueryResponse};
use crate::tx::{SignedTransaction, VerificationError};

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error(transparent)]
    Verification(#[from] VerificationError),
    #[error("bad nonce for {sender}: expected {expected}, got {actual}")]
    BadNonce {
        sender: Address,
        expected: u64,
        actual: u64,
    },
    #[error("no ballot deployed at {0}")]
    UnknownBallot(Address),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ChainMetadata {
    pub height: u64,
    pub timestamp: u64,
    #[serde(default, with = "option_hex")]
    pub previous_receipt: Option<[u8; 32]>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReceiptStatus {
    Success { events: Vec<BallotEvent> },
    Reverted { reason: String },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: String,
    pub height: u64,
    pub sender: Address,
    pub call: String,
    /// Ballot the transaction acted on, or the newly deployed one. Absent
    /// when a deployment reverted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ballot: Option<Address>,
    #[serde(flatten)]
    pub status: ReceiptStatus,
}

impl Receipt {
    pub fn is_success(&self) -> bool {
        matches!(self.status, ReceiptStatus::Success { .. })
    }

    fn digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(b"receipt");
        hasher.update(self.tx_hash.as_bytes());
        hasher.update(self.height.to_le_bytes());
        hasher.update(serde_json::to_vec(&self.status).unwrap_or_default());
        hasher.finalize().into()
    }
}

/// Local stand-in for the network: every deployed ballot, per-sender nonces
/// and the receipt hash chain.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ChainState {
    pub meta: ChainMetadata,
    pub ballots: BTreeMap<Address, VotingLedger>,
    pub nonces: BTreeMap<Address, u64>,
}

impl ChainState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nonce(&self, sender: &Address) -> u64 {
        self.nonces.get(sender).copied().unwrap_or(0)
    }

    pub fn ballot(&self, address: &Address) -> Result<&VotingLedger, ChainError> {
        self.ballots
            .get(address)
            .ok_or(ChainError::UnknownBallot(*address))
    }

    /// Address a deployment from `deployer` at `nonce` will receive.
    pub fn ballot_address(deployer: &Address, nonce: u64) -> Address {
        let mut hasher = Sha256::new();
        hasher.update(b"ballot-deploy");
        hasher.update(deployer.as_bytes());
        hasher.update(nonce.to_le_bytes());
        let digest: [u8; 32] = hasher.finalize().into();
        Address::from_digest(&digest)
    }

    /// Include a signed transaction.
    ///
    /// Signature, nonce and target checks reject the transaction outright.
    /// A call the ballot refuses is still included: its nonce is consumed and
    /// the receipt is `Reverted`, with the ballot left untouched.
    pub fn submit(
        &mut self,
        signed: &SignedTransaction,
        timestamp: u64,
    ) -> Result<Receipt, ChainError> {
        let sender = signed.verify()?;
        let expected = self.nonce(&sender);
        if signed.tx.nonce != expected {
            return Err(ChainError::BadNonce {
                sender,
                expected,
                actual: signed.tx.nonce,
            });
        }
        let call = &signed.tx.call;
        let (ballot, outcome) = self.execute(sender, expected, call)?;
        let status = match outcome {
            Ok(events) => ReceiptStatus::Success { events },
            Err(err) => {
                warn!(%sender, call = call.name(), error = %err, "transaction reverted");
                ReceiptStatus::Reverted {
                    reason: err.to_string(),
                }
            }
        };

        self.nonces.insert(sender, expected + 1);
        self.meta.height += 1;
        self.meta.timestamp = timestamp;
        let receipt = Receipt {
            tx_hash: hex::encode(signed.hash()),
            height: self.meta.height,
            sender,
            call: call.name().to_string(),
            ballot,
            status,
        };
        self.meta.previous_receipt = Some(receipt.digest());
        info!(
            height = receipt.height,
            %sender,
            call = call.name(),
            success = receipt.is_success(),
            "transaction included"
        );
        Ok(receipt)
    }

    fn execute(
        &mut self,
        sender: Address,
        nonce: u64,
        call: &BallotCall,
    ) -> Result<(Option<Address>, Result<Vec<BallotEvent>, LedgerError>), ChainError> {
        let (ballot, result) = match call {
            BallotCall::Deploy { proposals } => {
                let address = Self::ballot_address(&sender, nonce);
                return Ok(match VotingLedger::create(sender, proposals) {
                    Ok(ledger) => {
                        self.ballots.insert(address, ledger);
                        (Some(address), Ok(Vec::new()))
                    }
                    Err(err) => (None, Err(err)),
                });
            }
            BallotCall::GiveRightToVote { ballot, voter } => (
                *ballot,
                self.ledger_mut(ballot)?.give_right_to_vote(sender, *voter),
            ),
            BallotCall::Delegate { ballot, to } => {
                (*ballot, self.ledger_mut(ballot)?.delegate(sender, *to))
            }
            BallotCall::Vote { ballot, proposal } => {
                (*ballot, self.ledger_mut(ballot)?.vote(sender, *proposal))
            }
        };
        Ok((Some(ballot), result.map(|event| vec![event])))
    }

    fn ledger_mut(&mut self, address: &Address) -> Result<&mut VotingLedger, ChainError> {
        self.ballots
            .get_mut(address)
            .ok_or(ChainError::UnknownBallot(*address))
    }

    pub fn query(&self, ballot: &Address, query: &BallotQuery) -> Result<QueryResponse, ChainError> {
        Ok(query.answer(self.ballot(ballot)?))
    }

    /// Commitment over every ballot's chairperson, tallies and voters.
    pub fn state_root(&self) -> [u8; 32] {
        let mut leaves: Vec<[u8; 32]> = Vec::new();
        for (address, ledger) in &self.ballots {
            let mut hasher = Sha256::new();
            hasher.update(b"ballot");
            hasher.update(address.as_bytes());
            hasher.update(ledger.chairperson().as_bytes());
            for proposal in ledger.proposals() {
                hasher.update(proposal.name.as_bytes());
                hasher.update(proposal.vote_count.to_le_bytes());
            }
            leaves.push(hasher.finalize().into());
            for (voter, record) in ledger.voters() {
                let mut hasher = Sha256::new();
                hasher.update(b"voter");
                hasher.update(address.as_bytes());
                hasher.update(voter.as_bytes());
                hasher.update(record.weight.to_le_bytes());
                hasher.update([record.voted as u8]);
                if let Some(delegate) = record.delegate {
                    hasher.update(delegate.as_bytes());
                }
                if let Some(vote) = record.vote {
                    hasher.update(vote.to_le_bytes());
                }
                leaves.push(hasher.finalize().into());
            }
        }
        build_merkle(leaves)
    }
}

fn build_merkle(mut leaves: Vec<[u8; 32]>) -> [u8; 32] {
    if leaves.is_empty() {
        return Sha256::digest(b"ballot-chain-empty").into();
    }
    while leaves.len() > 1 {
        let mut next = Vec::with_capacity((leaves.len() + 1) / 2);
        for chunk in leaves.chunks(2) {
            let mut hasher = Sha256::new();
            hasher.update(b"node");
            hasher.update(chunk[0]);
            hasher.update(chunk.get(1).unwrap_or(&chunk[0]));
            next.push(hasher.finalize().into());
        }
        leaves = next;
    }
    leaves[0]
}

mod option_hex {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<[u8; 32]>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(bytes) => serializer.serialize_some(&hex::encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<[u8; 32]>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let Some(encoded) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        let bytes = hex::decode(&encoded).map_err(D::Error::custom)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| D::Error::custom("expected 32 bytes"))?;
        Ok(Some(arr))
    }
}
