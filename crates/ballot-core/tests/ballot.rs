use ballot_core::{Address, BallotEvent, LedgerError, VotingLedger};
use proptest::prelude::*;

const PROPOSALS: [&str; 3] = ["aabb", "Proposal 2", "Proposal 3"];

fn account(n: u8) -> Address {
    Address::from_bytes([n; 20])
}

fn deploy() -> VotingLedger {
    VotingLedger::create(account(0), &PROPOSALS).unwrap()
}

#[test]
fn deployment_records_chairperson_proposals_and_zero_votes() {
    let ledger = deploy();
    assert_eq!(ledger.chairperson(), account(0));
    assert_eq!(ledger.voter(&account(0)).weight, 1);
    for (index, name) in PROPOSALS.iter().enumerate() {
        let proposal = ledger.proposal(index as u32).unwrap();
        assert_eq!(proposal.name.to_string(), *name);
        assert_eq!(proposal.vote_count, 0);
    }
}

#[test]
fn non_chairperson_cannot_give_right_to_vote() {
    let mut ledger = deploy();
    let err = ledger.give_right_to_vote(account(1), account(2)).unwrap_err();
    assert_eq!(
        err,
        LedgerError::Unauthorized("Only chairperson can give right to vote.")
    );
    assert_eq!(err.to_string(), "Only chairperson can give right to vote.");
}

#[test]
fn winner_before_and_after_first_vote() {
    let mut ledger = deploy();
    assert_eq!(ledger.winning_proposal(), 0);
    assert_eq!(ledger.winner_name().to_string(), "aabb");
    ledger.vote(account(0), 0).unwrap();
    assert_eq!(ledger.winning_proposal(), 0);
    assert_eq!(ledger.winner_name().to_string(), "aabb");
}

#[test]
fn five_votes_elect_the_first_proposal() {
    let mut ledger = deploy();
    ledger.vote(account(0), 0).unwrap();
    for (n, proposal) in [(1u8, 1u32), (2, 2), (3, 0), (4, 0)] {
        ledger.give_right_to_vote(account(0), account(n)).unwrap();
        ledger.vote(account(n), proposal).unwrap();
    }
    let tallies: Vec<u64> = ledger.proposals().iter().map(|p| p.vote_count).collect();
    assert_eq!(tallies, vec![3, 1, 1]);
    assert_eq!(ledger.winning_proposal(), 0);
    assert_eq!(ledger.winner_name().to_string(), "aabb");
}

#[test]
fn delegated_weight_follows_the_delegate_vote() {
    let mut ledger = deploy();
    let (x, y) = (account(1), account(2));
    ledger.give_right_to_vote(account(0), x).unwrap();
    ledger.give_right_to_vote(account(0), y).unwrap();
    let x_weight = ledger.voter(&x).weight;
    let y_weight = ledger.voter(&y).weight;

    ledger.delegate(x, y).unwrap();
    ledger.vote(y, 0).unwrap();
    assert_eq!(ledger.proposals()[0].vote_count, x_weight + y_weight);
}

#[derive(Clone, Debug)]
enum Op {
    Grant(u8),
    Delegate(u8, u8),
    Vote(u8, u32),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..6).prop_map(Op::Grant),
        (0u8..6, 0u8..6).prop_map(|(a, b)| Op::Delegate(a, b)),
        (0u8..6, 0u32..4).prop_map(|(a, p)| Op::Vote(a, p)),
    ]
}

proptest! {
    #[test]
    fn tallies_match_consumed_weight(ops in prop::collection::vec(op(), 0..40)) {
        let mut ledger = deploy();
        let mut consumed = 0u64;
        for op in ops {
            let before = ledger.clone();
            let voted_before: Vec<bool> = (0..6).map(|n| ledger.voter(&account(n)).voted).collect();
            let result = match op {
                Op::Grant(n) => ledger.give_right_to_vote(account(0), account(n)),
                Op::Delegate(a, b) => ledger.delegate(account(a), account(b)),
                Op::Vote(a, p) => ledger.vote(account(a), p),
            };
            match result {
                Ok(BallotEvent::VoteCast { weight, .. }) => consumed += weight,
                Ok(BallotEvent::Delegated { weight, counted_for: Some(_), .. }) => consumed += weight,
                Ok(_) => {}
                Err(_) => {
                    prop_assert_eq!(&ledger, &before);
                }
            }
            prop_assert_eq!(ledger.total_votes(), consumed);
            prop_assert_eq!(ledger.proposals().len(), PROPOSALS.len());
            prop_assert!(ledger.voter(&account(0)).weight >= 1);
            for n in 0..6u8 {
                if voted_before[n as usize] {
                    prop_assert!(ledger.voter(&account(n)).voted);
                }
            }
        }
    }

    #[test]
    fn self_delegation_always_fails(n in 0u8..=255) {
        let mut ledger = deploy();
        if n != 0 {
            ledger.give_right_to_vote(account(0), account(n)).unwrap();
        }
        prop_assert_eq!(ledger.delegate(account(n), account(n)), Err(LedgerError::SelfDelegation));
    }
}
