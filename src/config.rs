use std::{
    fs,
    path::{Path, PathBuf},
};

use ballot_core::Address;
use serde::Deserialize;

use crate::tx::Identity;

pub const DEFAULT_ENDPOINT: &str = "ballot-chain.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unable to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("missing {0}: pass --{1} or set {2}")]
    Missing(&'static str, &'static str, &'static str),
    #[error("unsupported endpoint {0:?}: only file:// endpoints are served locally")]
    UnsupportedEndpoint(String),
    #[error("invalid signing key: {0}")]
    SigningKey(#[from] crate::tx::VerificationError),
    #[error("invalid ballot address: {0}")]
    Address(#[from] ballot_core::LedgerError),
}

/// Optional TOML file; every key may also come from a flag or the
/// environment, which take precedence.
#[derive(Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub signing_key: Option<String>,
    pub endpoint: Option<String>,
    pub ballot_address: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Values gathered from flags and environment before merging.
#[derive(Clone, Default)]
pub struct Overrides {
    pub signing_key: Option<String>,
    pub endpoint: Option<String>,
    pub ballot_address: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Endpoint {
    File(PathBuf),
}

impl Endpoint {
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        if let Some(path) = text.strip_prefix("file://") {
            return Ok(Endpoint::File(PathBuf::from(path)));
        }
        if text.contains("://") {
            return Err(ConfigError::UnsupportedEndpoint(text.to_string()));
        }
        Ok(Endpoint::File(PathBuf::from(text)))
    }
}

/// Resolved settings for one invocation.
#[derive(Clone)]
pub struct Settings {
    signing_key: Option<String>,
    ballot_address: Option<String>,
    pub endpoint: Endpoint,
}

impl Settings {
    pub fn resolve(overrides: Overrides, file: FileConfig) -> Result<Self, ConfigError> {
        let endpoint = overrides
            .endpoint
            .or(file.endpoint)
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        Ok(Self {
            signing_key: overrides.signing_key.or(file.signing_key),
            ballot_address: overrides.ballot_address.or(file.ballot_address),
            endpoint: Endpoint::parse(&endpoint)?,
        })
    }

    pub fn identity(&self) -> Result<Identity, ConfigError> {
        let key = self.signing_key.as_deref().ok_or(ConfigError::Missing(
            "signing key",
            "signing-key",
            "BALLOT_SIGNING_KEY",
        ))?;
        Ok(Identity::from_hex(key)?)
    }

    pub fn ballot_address(&self) -> Result<Address, ConfigError> {
        let text = self.ballot_address.as_deref().ok_or(ConfigError::Missing(
            "ballot address",
            "ballot",
            "BALLOT_ADDRESS",
        ))?;
        Ok(text.parse()?)
    }
}
