//! Kestrel Finality Replay
//!
//! Feeds a recorded scenario (block imports, votes, justifications, timer expiries) through
//! the finality service and prints the resulting state.
//!
//! Usage:
//!   kestrel-replay scenarios/fork.json --config finality.json

mod replay;
mod scenario;

use clap::Parser;
use kestrel_blocktree::VoterId;
use kestrel_finality::FinalityConfig;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Kestrel finality replay
#[derive(Debug, Parser)]
#[command(name = "kestrel-replay")]
#[command(about = "Replay block imports and votes through the finality gadget")]
struct Args {
    /// Scenario file (JSON)
    scenario: PathBuf,

    /// Finality configuration file (JSON)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Vote as this authority
    #[arg(long, env = "KESTREL_LOCAL_VOTER")]
    local_voter: Option<VoterId>,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log: String,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();

    let mut config = match &args.config {
        Some(path) => FinalityConfig::from_json_file(path)?,
        None => FinalityConfig::default(),
    };
    if let Some(voter) = args.local_voter {
        config = config.with_local_voter(voter);
    }

    let scenario = scenario::Scenario::from_json_file(&args.scenario)?;
    info!(
        target: "kestrel::replay",
        scenario = %args.scenario.display(),
        root = %scenario.root,
        events = scenario.events.len(),
        "Replaying scenario"
    );

    let report = replay::replay(scenario, &config).await?;
    info!(
        target: "kestrel::replay",
        root = %report.state.root,
        best = %report.state.best,
        round = report.state.round.round_number,
        accepted = report.accepted,
        rejected = report.rejected,
        finalizations = report.finalizations,
        "Replay finished"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
