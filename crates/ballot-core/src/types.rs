use std::{fmt, str::FromStr};

use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::LedgerError;

pub type Weight = u64;
pub type ProposalIndex = u32;

pub const ADDRESS_LEN: usize = 20;
pub const NAME_LEN: usize = 32;

/// 20-byte identity of an account or a deployed ballot.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    pub const ZERO: Address = Address([0u8; ADDRESS_LEN]);

    pub fn from_bytes(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// Take the trailing 20 bytes of a 32-byte digest.
    pub fn from_digest(digest: &[u8; 32]) -> Self {
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes.copy_from_slice(&digest[32 - ADDRESS_LEN..]);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for Address {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        let raw = hex::decode(digits).map_err(|_| LedgerError::InvalidAddress(s.to_string()))?;
        let bytes: [u8; ADDRESS_LEN] = raw
            .try_into()
            .map_err(|_| LedgerError::InvalidAddress(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        encoded.parse().map_err(D::Error::custom)
    }
}

/// Fixed-width proposal label, zero padded to 32 bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProposalName([u8; NAME_LEN]);

impl ProposalName {
    pub fn new(name: &str) -> Result<Self, LedgerError> {
        let raw = name.as_bytes();
        // last byte is kept as terminator
        if raw.len() >= NAME_LEN {
            return Err(LedgerError::NameTooLong {
                name: name.to_string(),
                len: raw.len(),
            });
        }
        let mut bytes = [0u8; NAME_LEN];
        bytes[..raw.len()].copy_from_slice(raw);
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; NAME_LEN] {
        &self.0
    }
}

impl fmt::Display for ProposalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let end = self.0.iter().position(|b| *b == 0).unwrap_or(NAME_LEN);
        f.write_str(&String::from_utf8_lossy(&self.0[..end]))
    }
}

impl fmt::Debug for ProposalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_string())
    }
}

impl FromStr for ProposalName {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for ProposalName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ProposalName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Self::new(&name).map_err(D::Error::custom)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Proposal {
    pub name: ProposalName,
    pub vote_count: Weight,
}

impl Proposal {
    pub fn new(name: ProposalName) -> Self {
        Self {
            name,
            vote_count: 0,
        }
    }
}

/// Per-address voting record. Unknown addresses read as `Voter::default()`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Voter {
    pub weight: Weight,
    pub voted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegate: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vote: Option<ProposalIndex>,
}

impl Voter {
    pub fn is_default(&self) -> bool {
        *self == Voter::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_parses_with_and_without_prefix() {
        let text = "0x275957a9e0040a662775c2a7c873a4147248387d";
        let a: Address = text.parse().unwrap();
        let b: Address = text.trim_start_matches("0x").parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), text);
        assert!("0x1234".parse::<Address>().is_err());
        assert!("zz".repeat(20).parse::<Address>().is_err());
    }

    #[test]
    fn proposal_name_pads_and_trims() {
        let name = ProposalName::new("Proposal 2").unwrap();
        assert_eq!(&name.as_bytes()[..10], b"Proposal 2");
        assert!(name.as_bytes()[10..].iter().all(|b| *b == 0));
        assert_eq!(name.to_string(), "Proposal 2");
    }

    #[test]
    fn proposal_name_rejects_32_bytes() {
        assert!(ProposalName::new(&"a".repeat(31)).is_ok());
        let err = ProposalName::new(&"a".repeat(32)).unwrap_err();
        assert_eq!(
            err,
            LedgerError::NameTooLong {
                name: "a".repeat(32),
                len: 32
            }
        );
    }

    #[test]
    fn voter_json_omits_unset_links() {
        let voter = Voter {
            weight: 1,
            ..Voter::default()
        };
        let json = serde_json::to_string(&voter).unwrap();
        assert_eq!(json, r#"{"weight":1,"voted":false}"#);
        let back: Voter = serde_json::from_str(&json).unwrap();
        assert_eq!(back, voter);
    }
}
