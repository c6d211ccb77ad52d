use std::{
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use fs2::FileExt;
use tempfile::NamedTempFile;

use super::ChainState;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt chain state in {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("unable to encode chain state: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Where chain state lives between invocations.
pub trait ChainStore {
    /// Load the persisted state; a store that was never written yields an
    /// empty chain.
    fn load(&self) -> Result<ChainState, StoreError>;
    fn save(&mut self, state: &ChainState) -> Result<(), StoreError>;
}

/// JSON file store. Saves go to a uniquely named sibling temp file that is
/// renamed over the target, so readers see either the old or the new state.
///
/// Writers must hold [`FileStore::lock`] from `load` through `save`;
/// otherwise two writers starting from the same height would each persist
/// their own successor and one transaction would be lost.
#[derive(Clone, Debug)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Block until this process holds the exclusive writer lock on a
    /// `<path>.lock` sibling. The lock is released when the guard drops.
    pub fn lock(&self) -> Result<StoreLock, StoreError> {
        self.ensure_parent()?;
        let mut lock_path = self.path.clone().into_os_string();
        lock_path.push(".lock");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(PathBuf::from(lock_path))
            .map_err(|e| self.io_err(e))?;
        FileExt::lock_exclusive(&file).map_err(|e| self.io_err(e))?;
        Ok(StoreLock { file })
    }

    fn ensure_parent(&self) -> Result<PathBuf, StoreError> {
        match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
                Ok(parent.to_path_buf())
            }
            None => Ok(PathBuf::from(".")),
        }
    }

    fn io_err(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl ChainStore for FileStore {
    fn load(&self) -> Result<ChainState, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ChainState::new())
            }
            Err(err) => return Err(self.io_err(err)),
        };
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Decode {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&mut self, state: &ChainState) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(state)?;
        let dir = self.ensure_parent()?;
        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| self.io_err(e))?;
        tmp.write_all(&json).map_err(|e| self.io_err(e))?;
        tmp.as_file().sync_all().map_err(|e| self.io_err(e))?;
        tmp.persist(&self.path).map_err(|e| self.io_err(e.error))?;
        Ok(())
    }
}

/// Exclusive writer lock on a [`FileStore`].
#[derive(Debug)]
pub struct StoreLock {
    file: File,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    state: Option<ChainState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChainStore for MemoryStore {
    fn load(&self) -> Result<ChainState, StoreError> {
        Ok(self.state.clone().unwrap_or_default())
    }

    fn save(&mut self, state: &ChainState) -> Result<(), StoreError> {
        self.state = Some(state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use super::*;
    use crate::contracts::BallotCall;
    use crate::tx::{Identity, Transaction};

    fn chain_with_ballot() -> ChainState {
        let mut chain = ChainState::new();
        let chair = Identity::generate();
        let signed = chair.sign(Transaction {
            nonce: 0,
            call: BallotCall::Deploy {
                proposals: vec!["p1".into(), "p2".into()],
            },
        });
        chain.submit(&signed, 42).unwrap();
        chain
    }

    #[test]
    fn missing_file_loads_empty_chain() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("chain.json"));
        assert_eq!(store.load().unwrap(), ChainState::new());
    }

    #[test]
    fn file_store_round_trips_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(dir.path().join("nested/chain.json"));
        let chain = chain_with_ballot();
        store.save(&chain).unwrap();
        assert_eq!(store.load().unwrap(), chain);
        let leftovers: Vec<_> = fs::read_dir(dir.path().join("nested"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("chain.json")]);
    }

    #[test]
    fn concurrent_writers_keep_every_transaction() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.json");
        let chair = Identity::generate();
        let voters: Vec<Identity> = (0..8).map(|_| Identity::generate()).collect();

        let mut chain = ChainState::new();
        let deployed = chain
            .submit(
                &chair.sign(Transaction {
                    nonce: 0,
                    call: BallotCall::Deploy {
                        proposals: vec!["p1".into(), "p2".into()],
                    },
                }),
                0,
            )
            .unwrap();
        let ballot = deployed.ballot.unwrap();
        for voter in &voters {
            let tx = Transaction {
                nonce: chain.nonce(&chair.address()),
                call: BallotCall::GiveRightToVote {
                    ballot,
                    voter: voter.address(),
                },
            };
            chain.submit(&chair.sign(tx), 0).unwrap();
        }
        FileStore::new(&path).save(&chain).unwrap();

        let path = Arc::new(path);
        let handles: Vec<_> = voters
            .into_iter()
            .enumerate()
            .map(|(i, voter)| {
                let path = Arc::clone(&path);
                thread::spawn(move || {
                    let mut store = FileStore::new(path.as_path());
                    let _lock = store.lock().unwrap();
                    let mut chain = store.load().unwrap();
                    let tx = Transaction {
                        nonce: chain.nonce(&voter.address()),
                        call: BallotCall::Vote {
                            ballot,
                            proposal: (i % 2) as u32,
                        },
                    };
                    let receipt = chain.submit(&voter.sign(tx), 0).unwrap();
                    assert!(receipt.is_success());
                    store.save(&chain).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let chain = FileStore::new(path.as_path()).load().unwrap();
        assert_eq!(chain.meta.height, 1 + 8 + 8);
        let ledger = chain.ballot(&ballot).unwrap();
        let tallies: Vec<u64> = ledger.proposals().iter().map(|p| p.vote_count).collect();
        assert_eq!(tallies, vec![4, 4]);
    }

    #[test]
    fn lock_is_exclusive_until_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("chain.json"));
        let held = store.lock().unwrap();
        let contender = File::open(dir.path().join("chain.json.lock")).unwrap();
        assert!(FileExt::try_lock_exclusive(&contender).is_err());
        drop(held);
        assert!(FileExt::try_lock_exclusive(&contender).is_ok());
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.json");
        fs::write(&path, b"{not json").unwrap();
        let store = FileStore::new(&path);
        assert!(matches!(store.load(), Err(StoreError::Decode { .. })));
    }

    #[test]
    fn memory_store_keeps_last_save() {
        let mut store = MemoryStore::new();
        assert_eq!(store.load().unwrap().meta.height, 0);
        store.save(&chain_with_ballot()).unwrap();
        assert_eq!(store.load().unwrap().meta.height, 1);
    }
}
