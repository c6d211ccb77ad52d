use std::collections::{BTreeMap, BTreeSet};

use serde::{de::Error as _, Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::error::LedgerError;
use crate::store::VoterStore;
use crate::types::{Address, Proposal, ProposalIndex, ProposalName, Voter, Weight};

/// Effect of a successfully applied ledger operation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BallotEvent {
    RightGranted {
        voter: Address,
    },
    Delegated {
        from: Address,
        to: Address,
        final_delegate: Address,
        weight: Weight,
        /// Set when the final delegate had already voted and the weight went
        /// straight into that proposal's tally.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        counted_for: Option<ProposalIndex>,
    },
    VoteCast {
        voter: Address,
        proposal: ProposalIndex,
        weight: Weight,
    },
}

/// Delegated-vote ballot: one chairperson, a fixed proposal list and a voter
/// store.
///
/// Deserializing re-checks what `create` guarantees, so persisted state with
/// no proposals or a weightless chairperson is refused.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct VotingLedger<S = BTreeMap<Address, Voter>> {
    chairperson: Address,
    proposals: Vec<Proposal>,
    voters: S,
}

impl VotingLedger {
    /// Create a ballot owned by `chairperson` with one proposal per name, in
    /// order. Duplicate names are accepted.
    pub fn create<N: AsRef<str>>(chairperson: Address, names: &[N]) -> Result<Self, LedgerError> {
        Self::create_with_store(chairperson, names, BTreeMap::new())
    }
}

impl<'de, S> Deserialize<'de> for VotingLedger<S>
where
    S: VoterStore + Deserialize<'de>,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Persisted<V> {
            chairperson: Address,
            proposals: Vec<Proposal>,
            voters: V,
        }

        let Persisted {
            chairperson,
            proposals,
            voters,
        } = Persisted::<S>::deserialize(deserializer)?;
        if proposals.is_empty() {
            return Err(D::Error::custom(LedgerError::NoProposals));
        }
        if voters.voter(&chairperson).weight == 0 {
            return Err(D::Error::custom(LedgerError::ChairpersonWithoutWeight(
                chairperson,
            )));
        }
        Ok(Self {
            chairperson,
            proposals,
            voters,
        })
    }
}

impl<S: VoterStore> VotingLedger<S> {
    pub fn create_with_store<N: AsRef<str>>(
        chairperson: Address,
        names: &[N],
        mut voters: S,
    ) -> Result<Self, LedgerError> {
        if names.is_empty() {
            return Err(LedgerError::NoProposals);
        }
        let proposals = names
            .iter()
            .map(|name| ProposalName::new(name.as_ref()).map(Proposal::new))
            .collect::<Result<Vec<_>, _>>()?;

        let mut chair = voters.voter(&chairperson);
        chair.weight = 1;
        voters.put_voter(chairperson, chair);

        debug!(%chairperson, proposals = proposals.len(), "ballot created");
        Ok(Self {
            chairperson,
            proposals,
            voters,
        })
    }

    pub fn chairperson(&self) -> Address {
        self.chairperson
    }

    pub fn proposals(&self) -> &[Proposal] {
        &self.proposals
    }

    pub fn proposal(&self, index: ProposalIndex) -> Result<&Proposal, LedgerError> {
        self.proposals
            .get(index as usize)
            .ok_or(LedgerError::InvalidProposal {
                index,
                count: self.proposals.len(),
            })
    }

    pub fn voter(&self, address: &Address) -> Voter {
        self.voters.voter(address)
    }

    pub fn voters(&self) -> &S {
        &self.voters
    }

    /// Sum of all proposal tallies.
    pub fn total_votes(&self) -> Weight {
        self.proposals.iter().map(|p| p.vote_count).sum()
    }

    pub fn give_right_to_vote(
        &mut self,
        caller: Address,
        target: Address,
    ) -> Result<BallotEvent, LedgerError> {
        if caller != self.chairperson {
            return Err(LedgerError::Unauthorized(
                "Only chairperson can give right to vote.",
            ));
        }
        let mut voter = self.voters.voter(&target);
        if voter.voted {
            return Err(LedgerError::AlreadyVoted(target));
        }
        if voter.weight != 0 {
            return Err(LedgerError::AlreadyHasRights(target));
        }
        voter.weight = 1;
        self.voters.put_voter(target, voter);

        debug!(voter = %target, "right to vote granted");
        Ok(BallotEvent::RightGranted { voter: target })
    }

    pub fn delegate(&mut self, caller: Address, to: Address) -> Result<BallotEvent, LedgerError> {
        let mut sender = self.voters.voter(&caller);
        if sender.weight == 0 {
            return Err(LedgerError::Unauthorized("You have no right to vote"));
        }
        if sender.voted {
            return Err(LedgerError::AlreadyVoted(caller));
        }
        if to == caller {
            return Err(LedgerError::SelfDelegation);
        }
        let final_delegate = self.final_delegate(&caller, to)?;
        let mut delegate = self.voters.voter(&final_delegate);
        let weight = sender.weight;

        // Everything is checked before the first write below.
        let counted_for = match delegate.vote {
            Some(index) if delegate.voted => {
                let count = self
                    .proposal(index)?
                    .vote_count
                    .checked_add(weight)
                    .ok_or(LedgerError::WeightOverflow)?;
                self.proposals[index as usize].vote_count = count;
                Some(index)
            }
            _ => {
                delegate.weight = delegate
                    .weight
                    .checked_add(weight)
                    .ok_or(LedgerError::WeightOverflow)?;
                self.voters.put_voter(final_delegate, delegate);
                None
            }
        };
        sender.voted = true;
        sender.delegate = Some(to);
        self.voters.put_voter(caller, sender);

        debug!(from = %caller, %to, %final_delegate, weight, ?counted_for, "vote delegated");
        Ok(BallotEvent::Delegated {
            from: caller,
            to,
            final_delegate,
            weight,
            counted_for,
        })
    }

    pub fn vote(
        &mut self,
        caller: Address,
        proposal: ProposalIndex,
    ) -> Result<BallotEvent, LedgerError> {
        let mut sender = self.voters.voter(&caller);
        if sender.weight == 0 {
            return Err(LedgerError::Unauthorized("Has no right to vote"));
        }
        if sender.voted {
            return Err(LedgerError::AlreadyVoted(caller));
        }
        let count = self
            .proposal(proposal)?
            .vote_count
            .checked_add(sender.weight)
            .ok_or(LedgerError::WeightOverflow)?;

        self.proposals[proposal as usize].vote_count = count;
        sender.voted = true;
        sender.vote = Some(proposal);
        let weight = sender.weight;
        self.voters.put_voter(caller, sender);

        debug!(voter = %caller, proposal, weight, "vote cast");
        Ok(BallotEvent::VoteCast {
            voter: caller,
            proposal,
            weight,
        })
    }

    /// Index of the proposal with the strictly greatest tally; the lowest
    /// index wins ties, so an untouched ballot reports 0.
    pub fn winning_proposal(&self) -> ProposalIndex {
        let mut winner = 0;
        let mut winning_count = 0;
        for (index, proposal) in self.proposals.iter().enumerate() {
            if proposal.vote_count > winning_count {
                winning_count = proposal.vote_count;
                winner = index;
            }
        }
        winner as ProposalIndex
    }

    pub fn winner_name(&self) -> ProposalName {
        self.proposals[self.winning_proposal() as usize].name
    }

    /// Follow delegate links from `to` to the first identity that has not
    /// delegated further.
    fn final_delegate(&self, caller: &Address, to: Address) -> Result<Address, LedgerError> {
        let mut current = to;
        let mut visited = BTreeSet::from([current]);
        while let Some(next) = self.voters.voter(&current).delegate {
            if next == *caller {
                return Err(LedgerError::SelfDelegation);
            }
            if !visited.insert(next) {
                return Err(LedgerError::DelegationCycle(next));
            }
            current = next;
        }
        Ok(current)
    }
}
