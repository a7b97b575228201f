//! # Wager CLI
//!
//! Command-line interface for replaying escrow scenarios and producing oracle attestations.

mod scenario;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use wager_core::{
    attestation::{attestation_message, oracle_pubkey},
    utils::{format_timestamp, sha256_hash},
    BetId, DeskConfig, OracleAttestation, Principal, WagerError,
};

use crate::scenario::{Outcome, Replay, Scenario, Step};

#[derive(Parser)]
#[command(name = "wager")]
#[command(about = "Two-party wagering escrow with oracle settlement")]
#[command(version)]
struct Cli {
    /// Log escrow internals at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the built-in settlement and expiry scenarios
    Demo,
    /// Replay a scenario file against an in-memory ledger
    Run {
        /// Scenario JSON file
        scenario: PathBuf,
        /// Desk configuration JSON file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Sign an oracle answer for a bet
    SignAnswer {
        /// Oracle secret key (hex)
        #[arg(short, long)]
        secret: String,
        /// Bet ID
        #[arg(short, long)]
        bet: String,
        /// Answer to the bet's proposition
        #[arg(short, long, action = ArgAction::Set)]
        answer: bool,
    },
    /// Derive the oracle's x-only public key
    Pubkey {
        /// Oracle secret key (hex)
        #[arg(short, long)]
        secret: String,
    },
    /// Show the message an oracle signs for an answer
    Message {
        /// Bet ID
        #[arg(short, long)]
        bet: String,
        /// Answer to the bet's proposition
        #[arg(short, long, action = ArgAction::Set)]
        answer: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Demo => {
            println!("{}", "Settlement scenario".green().bold());
            replay(&Scenario::happy_path(), DeskConfig::default()).await?;
            println!();
            println!("{}", "Expiry scenario".green().bold());
            replay(&Scenario::expiry(), DeskConfig::default()).await?;
        }

        Commands::Run { scenario, config } => {
            let config = match config {
                Some(path) => DeskConfig::from_json_file(&path)
                    .with_context(|| format!("Failed to load config {}", path.display()))?,
                None => DeskConfig::default(),
            };
            let scenario = Scenario::from_json_file(&scenario)?;
            info!(steps = scenario.steps.len(), "replaying scenario");
            replay(&scenario, config).await?;
        }

        Commands::SignAnswer {
            secret,
            bet,
            answer,
        } => {
            let attestation = OracleAttestation::sign(&secret, BetId::new(bet), answer)?;
            println!("{}", serde_json::to_string_pretty(&attestation)?);
        }

        Commands::Pubkey { secret } => {
            let pubkey = oracle_pubkey(&secret)?;
            println!("{}: {}", "Oracle PubKey".green().bold(), pubkey.cyan());
        }

        Commands::Message { bet, answer } => {
            let message = attestation_message(&BetId::new(bet), answer);
            println!("{}: {}", "Message".yellow().bold(), message);
            println!("{}: {}", "SHA256".yellow().bold(), sha256_hash(&message).cyan());
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "warn,wager_core=debug,wager=debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true),
        )
        .init();
}

async fn replay(scenario: &Scenario, config: DeskConfig) -> Result<()> {
    let mut replay = Replay::new(&scenario.balances, config)?;
    let mut rejected = 0;

    println!("{}", "═".repeat(60).bright_black());
    for (index, step) in scenario.steps.iter().enumerate() {
        let outcome = replay
            .apply(step)
            .await
            .with_context(|| format!("Step {} cannot be applied", index + 1))?;
        if outcome.is_err() {
            rejected += 1;
        }
        print_step(index + 1, step, &outcome);

        for request in replay.drain_oracle_requests() {
            println!(
                "      {} {} asks \"{}\"",
                "oracle".magenta().bold(),
                request.bet_id.to_string().cyan(),
                request.proposition
            );
        }
    }
    println!("{}", "═".repeat(60).bright_black());

    print_balances(&replay, &scenario.balances.keys().cloned().collect::<Vec<_>>());
    for bet in replay.desk().bets() {
        println!(
            "{}: {} [{}] escrow {} window {} .. {}",
            "Open Bet".yellow().bold(),
            bet.id.to_string().cyan(),
            bet.status,
            bet.escrowed,
            format_timestamp(bet.window_start),
            format_timestamp(bet.window_end)
        );
    }
    println!(
        "{}: {} applied, {} rejected",
        "Steps".yellow().bold(),
        scenario.steps.len() - rejected,
        rejected
    );

    if !replay.is_conserved() {
        anyhow::bail!("Ledger balances and escrow no longer add up to the minted supply");
    }
    Ok(())
}

fn print_step(number: usize, step: &Step, outcome: &std::result::Result<Outcome, WagerError>) {
    let at = step
        .at
        .map(|at| format!("t={at}"))
        .unwrap_or_else(|| "t=·".to_string());
    let action = serde_json::to_value(&step.action)
        .ok()
        .and_then(|value| value.get("op").and_then(|op| op.as_str().map(str::to_string)))
        .unwrap_or_default();

    match outcome {
        Ok(Outcome::Created(id)) => println!(
            "{:>3} {:<8} {:<7} {} {}",
            number,
            at.bright_black(),
            action,
            "created".green(),
            id.to_string().cyan()
        ),
        Ok(Outcome::Updated(id)) => println!(
            "{:>3} {:<8} {:<7} {} {}",
            number,
            at.bright_black(),
            action,
            "ok".green(),
            id.to_string().cyan()
        ),
        Ok(Outcome::NotDue(id)) => println!(
            "{:>3} {:<8} {:<7} {} {}",
            number,
            at.bright_black(),
            action,
            "not due".yellow(),
            id.to_string().cyan()
        ),
        Ok(Outcome::Released(release)) => {
            println!(
                "{:>3} {:<8} {:<7} {} {} {}",
                number,
                at.bright_black(),
                action,
                release.status.to_string().green(),
                release.bet_id.to_string().cyan(),
                describe_payouts(&release.payouts)
            );
        }
        Ok(Outcome::Swept(releases)) => {
            println!(
                "{:>3} {:<8} {:<7} {} {} bet(s)",
                number,
                at.bright_black(),
                action,
                "expired".green(),
                releases.len()
            );
            for release in releases {
                println!(
                    "      {} {}",
                    release.bet_id.to_string().cyan(),
                    describe_payouts(&release.payouts)
                );
            }
        }
        Err(e) => {
            let label = if e.is_rejection() { "rejected" } else { "failed" };
            println!(
                "{:>3} {:<8} {:<7} {} {}",
                number,
                at.bright_black(),
                action,
                label.red().bold(),
                e.to_string().red()
            )
        }
    }
}

fn describe_payouts(payouts: &[wager_core::Payout]) -> String {
    payouts
        .iter()
        .map(|payout| format!("{} -> {}", payout.amount, payout.principal))
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_balances(replay: &Replay, principals: &[String]) {
    for name in principals {
        let balance = replay.ledger().balance(&Principal::from(name.as_str()));
        println!("{}: {} = {}", "Balance".yellow().bold(), name, balance.to_string().cyan());
    }
    println!(
        "{}: {}",
        "Escrowed".yellow().bold(),
        replay.desk().total_escrowed().to_string().cyan()
    );
}
