use ballot_core::Address;
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::contracts::BallotCall;

const TX_DOMAIN: &[u8] = b"ballot-tx";

#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("malformed signing key: {0}")]
    MalformedKey(String),
    #[error("malformed public key")]
    MalformedPublicKey,
    #[error("malformed signature")]
    MalformedSignature,
    #[error("invalid signature from {0}")]
    InvalidSignature(Address),
}

/// Account address of an ed25519 public key: trailing 20 bytes of its
/// sha256 digest.
pub fn address_of(key: &VerifyingKey) -> Address {
    let digest: [u8; 32] = Sha256::digest(key.as_bytes()).into();
    Address::from_digest(&digest)
}

/// Signing identity loaded from secret key material.
#[derive(Clone)]
pub struct Identity {
    key: SigningKey,
}

impl Identity {
    pub fn generate() -> Self {
        Self {
            key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Parse a 32-byte ed25519 secret given as 64 hex chars, `0x` optional.
    pub fn from_hex(sk_hex: &str) -> Result<Self, VerificationError> {
        let trimmed = sk_hex.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        let bytes = hex::decode(digits).map_err(|e| VerificationError::MalformedKey(e.to_string()))?;
        let arr: [u8; 32] = bytes.try_into().map_err(|_| {
            VerificationError::MalformedKey("expected 32 bytes (64 hex chars)".into())
        })?;
        Ok(Self {
            key: SigningKey::from_bytes(&arr),
        })
    }

    pub fn secret_hex(&self) -> String {
        hex::encode(self.key.to_bytes())
    }

    pub fn public_hex(&self) -> String {
        hex::encode(self.key.verifying_key().as_bytes())
    }

    pub fn address(&self) -> Address {
        address_of(&self.key.verifying_key())
    }

    pub fn sign(&self, tx: Transaction) -> SignedTransaction {
        let signature = self.key.sign(&tx.digest());
        SignedTransaction {
            tx,
            public_key: self.key.verifying_key().to_bytes().to_vec(),
            signature: signature.to_bytes().to_vec(),
        }
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    pub nonce: u64,
    pub call: BallotCall,
}

impl Transaction {
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(TX_DOMAIN);
        hasher.update(serde_json::to_vec(self).unwrap_or_default());
        hasher.finalize().into()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignedTransaction {
    pub tx: Transaction,
    #[serde(with = "crate::tx::serde_bytes")]
    pub public_key: Vec<u8>,
    #[serde(with = "crate::tx::serde_bytes")]
    pub signature: Vec<u8>,
}

impl SignedTransaction {
    pub fn hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.tx.digest());
        hasher.update(&self.signature);
        hasher.finalize().into()
    }

    /// Check the signature and return the sender's address.
    pub fn verify(&self) -> Result<Address, VerificationError> {
        let key_bytes: [u8; 32] = self
            .public_key
            .as_slice()
            .try_into()
            .map_err(|_| VerificationError::MalformedPublicKey)?;
        let key =
            VerifyingKey::from_bytes(&key_bytes).map_err(|_| VerificationError::MalformedPublicKey)?;
        let sender = address_of(&key);
        let signature =
            Signature::from_slice(&self.signature).map_err(|_| VerificationError::MalformedSignature)?;
        key.verify_strict(&self.tx.digest(), &signature)
            .map_err(|_| VerificationError::InvalidSignature(sender))?;
        Ok(sender)
    }
}

pub(crate) mod serde_bytes {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        hex::decode(&encoded).map_err(D::Error::custom)
    }
}
