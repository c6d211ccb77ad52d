use std::collections::BTreeMap;

use crate::types::{Address, Voter};

/// Key-addressed voter storage the ledger is written against.
///
/// Every address implicitly exists: reading an address that was never
/// written yields `Voter::default()` (weight 0, not voted).
pub trait VoterStore {
    fn voter(&self, address: &Address) -> Voter;
    fn put_voter(&mut self, address: Address, voter: Voter);
}

impl VoterStore for BTreeMap<Address, Voter> {
    fn voter(&self, address: &Address) -> Voter {
        self.get(address).cloned().unwrap_or_default()
    }

    fn put_voter(&mut self, address: Address, voter: Voter) {
        if voter.is_default() {
            self.remove(&address);
        } else {
            self.insert(address, voter);
        }
    }
}
