use std::{
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::{bail, Context, Result};
use ballot_cli::{
    chain::{
        store::{ChainStore, FileStore},
        ChainState, Receipt, ReceiptStatus,
    },
    config::{Endpoint, FileConfig, Overrides, Settings},
    contracts::{BallotCall, BallotQuery, QueryResponse, DEFAULT_PROPOSALS},
    tx::{Identity, Transaction},
};
use ballot_core::{Address, ProposalIndex};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ballot")]
#[command(about = "Deploy and drive delegated-vote ballots", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Hex-encoded ed25519 secret used to sign transactions
    #[arg(long, global = true, env = "BALLOT_SIGNING_KEY", hide_env_values = true)]
    signing_key: Option<String>,

    /// Chain state location (`file://<path>` or a bare path)
    #[arg(long, global = true, env = "BALLOT_ENDPOINT")]
    endpoint: Option<String>,

    /// Address of the deployed ballot to act on
    #[arg(long, global = true, env = "BALLOT_ADDRESS")]
    ballot: Option<String>,

    /// Optional TOML config file
    #[arg(short, long, global = true, env = "BALLOT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a signing key
    Keygen {
        /// Write sk.hex and pk.hex here instead of printing the secret
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Show the address of the configured signing key
    Address,
    /// Deploy a ballot; the signer becomes chairperson
    Deploy {
        /// Proposal names, in index order
        proposals: Vec<String>,
    },
    /// Grant a voter the right to vote (chairperson only)
    GiveRightToVote { voter: Address },
    /// Delegate your vote to another address
    Delegate { to: Address },
    /// Cast your vote for a proposal index
    Vote { proposal: ProposalIndex },
    /// Print the winning proposal
    Results,
    /// Print every proposal with its tally
    Proposals,
    /// Print the voting record of an address
    Voter { address: Address },
    /// Print chain height and state root
    Status,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let file = match &cli.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let settings = Settings::resolve(
        Overrides {
            signing_key: cli.signing_key,
            endpoint: cli.endpoint,
            ballot_address: cli.ballot,
        },
        file,
    )?;

    match cli.command {
        Commands::Keygen { out_dir } => keygen(out_dir.as_deref()),
        Commands::Address => {
            println!("{}", settings.identity()?.address());
            Ok(())
        }
        Commands::Deploy { mut proposals } => {
            if proposals.is_empty() {
                proposals = DEFAULT_PROPOSALS.iter().map(|p| p.to_string()).collect();
            }
            let receipt = transact(&settings, BallotCall::Deploy { proposals })?;
            if let Some(ballot) = receipt.ballot {
                println!("Contract Address: {ballot}");
            }
            Ok(())
        }
        Commands::GiveRightToVote { voter } => {
            let ballot = settings.ballot_address()?;
            transact(&settings, BallotCall::GiveRightToVote { ballot, voter })?;
            Ok(())
        }
        Commands::Delegate { to } => {
            let ballot = settings.ballot_address()?;
            info!(%to, "delegating vote");
            transact(&settings, BallotCall::Delegate { ballot, to })?;
            Ok(())
        }
        Commands::Vote { proposal } => {
            let ballot = settings.ballot_address()?;
            info!(proposal, "casting vote");
            transact(&settings, BallotCall::Vote { ballot, proposal })?;
            Ok(())
        }
        Commands::Results => {
            let chain = load_chain(&settings)?;
            let ballot = settings.ballot_address()?;
            if let QueryResponse::Index(index) =
                chain.query(&ballot, &BallotQuery::WinningProposal)?
            {
                println!("Winning proposal: {index}");
            }
            if let QueryResponse::Name(name) = chain.query(&ballot, &BallotQuery::WinnerName)? {
                println!("And the winner is {name}");
            }
            Ok(())
        }
        Commands::Proposals => {
            let chain = load_chain(&settings)?;
            let ballot = settings.ballot_address()?;
            if let QueryResponse::Proposals(views) = chain.query(&ballot, &BallotQuery::Proposals)? {
                for view in views {
                    println!("[{}] {:<31} {}", view.index, view.name, view.vote_count);
                }
            }
            Ok(())
        }
        Commands::Voter { address } => {
            let chain = load_chain(&settings)?;
            let ballot = settings.ballot_address()?;
            let voter = chain.query(&ballot, &BallotQuery::Voter { address })?;
            println!("{}", serde_json::to_string_pretty(&voter)?);
            Ok(())
        }
        Commands::Status => {
            let chain = load_chain(&settings)?;
            println!("height: {}", chain.meta.height);
            println!("ballots: {}", chain.ballots.len());
            println!("state root: {}", hex::encode(chain.state_root()));
            Ok(())
        }
    }
}

fn open_store(settings: &Settings) -> FileStore {
    match &settings.endpoint {
        Endpoint::File(path) => FileStore::new(path),
    }
}

fn load_chain(settings: &Settings) -> Result<ChainState> {
    let store = open_store(settings);
    debug!(path = %store.path().display(), "loading chain state");
    Ok(store.load()?)
}

/// Sign `call` with the configured key, include it, persist the chain and
/// print the receipt. A reverted receipt is still persisted, then reported as
/// an error. The writer lock is held from load to save.
fn transact(settings: &Settings, call: BallotCall) -> Result<Receipt> {
    let identity = settings.identity()?;
    info!(address = %identity.address(), "connected to wallet");

    let mut store = open_store(settings);
    let _lock = store.lock()?;
    let mut chain = store.load()?;
    let tx = Transaction {
        nonce: chain.nonce(&identity.address()),
        call,
    };
    let receipt = chain
        .submit(&identity.sign(tx), unix_now())
        .context("transaction rejected")?;
    store.save(&chain)?;

    println!("{}", serde_json::to_string_pretty(&receipt)?);
    if let ReceiptStatus::Reverted { reason } = &receipt.status {
        bail!("transaction reverted: {reason}");
    }
    Ok(receipt)
}

fn keygen(out_dir: Option<&Path>) -> Result<()> {
    let identity = Identity::generate();
    match out_dir {
        Some(dir) => {
            fs::create_dir_all(dir).with_context(|| format!("mkdir {}", dir.display()))?;
            fs::write(dir.join("sk.hex"), identity.secret_hex())?;
            fs::write(dir.join("pk.hex"), identity.public_hex())?;
            println!("keypair written → {}", dir.display());
        }
        None => println!("BALLOT_SIGNING_KEY={}", identity.secret_hex()),
    }
    println!("address: {}", identity.address());
    Ok(())
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

