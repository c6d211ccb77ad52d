use ballot_core::{Address, ProposalIndex, Voter, VotingLedger};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PROPOSALS: [&str; 3] = ["p1", "p2", "p3"];

/// State-changing call carried by a transaction.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BallotCall {
    Deploy {
        proposals: Vec<String>,
    },
    GiveRightToVote {
        ballot: Address,
        voter: Address,
    },
    Delegate {
        ballot: Address,
        to: Address,
    },
    Vote {
        ballot: Address,
        proposal: ProposalIndex,
    },
}

impl BallotCall {
    pub fn name(&self) -> &'static str {
        match self {
            BallotCall::Deploy { .. } => "deploy",
            BallotCall::GiveRightToVote { .. } => "give_right_to_vote",
            BallotCall::Delegate { .. } => "delegate",
            BallotCall::Vote { .. } => "vote",
        }
    }
}

/// Read-only request against a deployed ballot.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BallotQuery {
    Chairperson,
    Proposals,
    Voter { address: Address },
    WinningProposal,
    WinnerName,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum QueryResponse {
    Address(Address),
    Proposals(Vec<ProposalView>),
    Voter(Voter),
    Index(ProposalIndex),
    Name(String),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProposalView {
    pub index: ProposalIndex,
    pub name: String,
    pub vote_count: u64,
}

impl BallotQuery {
    pub fn answer(&self, ledger: &VotingLedger) -> QueryResponse {
        match self {
            BallotQuery::Chairperson => QueryResponse::Address(ledger.chairperson()),
            BallotQuery::Proposals => QueryResponse::Proposals(
                ledger
                    .proposals()
                    .iter()
                    .enumerate()
                    .map(|(index, p)| ProposalView {
                        index: index as ProposalIndex,
                        name: p.name.to_string(),
                        vote_count: p.vote_count,
                    })
                    .collect(),
            ),
            BallotQuery::Voter { address } => QueryResponse::Voter(ledger.voter(address)),
            BallotQuery::WinningProposal => QueryResponse::Index(ledger.winning_proposal()),
            BallotQuery::WinnerName => QueryResponse::Name(ledger.winner_name().to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calls_serialize_with_type_tag() {
        let call = BallotCall::Vote {
            ballot: Address::from_bytes([0xab; 20]),
            proposal: 2,
        };
        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(json["type"], "vote");
        assert_eq!(json["proposal"], 2);
        assert_eq!(json["ballot"], format!("0x{}", "ab".repeat(20)));
        let back: BallotCall = serde_json::from_value(json).unwrap();
        assert_eq!(back, call);
    }

    #[test]
    fn queries_answer_from_ledger() {
        let chair = Address::from_bytes([1; 20]);
        let mut ledger = VotingLedger::create(chair, &DEFAULT_PROPOSALS).unwrap();
        ledger.vote(chair, 1).unwrap();

        assert_eq!(
            BallotQuery::WinningProposal.answer(&ledger),
            QueryResponse::Index(1)
        );
        assert_eq!(
            BallotQuery::WinnerName.answer(&ledger),
            QueryResponse::Name("p2".into())
        );
        match BallotQuery::Proposals.answer(&ledger) {
            QueryResponse::Proposals(views) => {
                assert_eq!(views.len(), 3);
                assert_eq!(views[1].vote_count, 1);
            }
            other => panic!("unexpected response {other:?}"),
        }
    }
}
