//! Client side of the ballot toolchain.
//!
//! * [`contracts`] — the calls and queries a ballot understands.
//! * [`tx`] — ed25519 signing identities and signed transactions.
//! * [`chain`] — the local chain that includes transactions, tracks nonces and
//!   issues receipts, plus its persistent [`chain::store`].
//! * [`config`] — flag / environment / TOML settings.

pub mod chain;
pub mod config;
pub mod contracts;
pub mod tx;
