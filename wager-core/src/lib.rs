//! # Wager Core
//!
//! Core Rust library for peer-to-peer wagering escrow with oracle settlement.
//!
//! Two principals stake equal amounts on a binary proposition:
//! - The creator proposes the bet and stakes first
//! - The counterparty accepts before the consent deadline, locking an equal stake
//! - Once the event window ends, either party hands the bet to an oracle
//! - The oracle's answer releases both stakes to the winner
//!
//! Proposals that are never accepted, and agreed bets that are never sent to the
//! oracle, expire and refund every stake to whoever paid it.
//!
//! ## Features
//!
//! - **Per-bet escrow**: stakes are held by the bet they belong to, never pooled
//! - **Conservation**: value only moves between principals and escrow; settlement never mints
//! - **Atomic transitions**: each operation holds an exclusive guard on its bet
//! - **Oracle integration**: fire-and-forget submission with asynchronous answers
//! - **Attested answers**: Schnorr-signed oracle answers verified before payout
//!
//! ## Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use wager_core::{
//!     BetLifecycle, ChannelOracle, DeskConfig, ManualClock, MemoryLedger, NewBet, Principal,
//! };
//!
//! let alice = Principal::from("alice");
//! let bob = Principal::from("bob");
//!
//! let ledger = Arc::new(MemoryLedger::new());
//! ledger.credit(&alice, 1_000)?;
//! ledger.credit(&bob, 1_000)?;
//! let clock = Arc::new(ManualClock::new(500));
//! let (oracle, _requests) = ChannelOracle::new();
//!
//! let desk = BetLifecycle::new(ledger.clone(), oracle, clock.clone(), DeskConfig::default())?;
//! let id = desk.create_bet(
//!     &alice,
//!     NewBet {
//!         counterparty: bob.clone(),
//!         proposition: "It rains in Paris on 2025-01-01".to_string(),
//!         amount: 100,
//!         odds: 1.0,
//!         creator_affirms: true,
//!         window_start: 1_000,
//!         window_end: 2_000,
//!     },
//! )?;
//! desk.agree_to_bet(&bob, &id)?;
//!
//! clock.set(2_500);
//! desk.send_to_oracle(&alice, &id)?;
//! let release = desk.process_oracle_answer(&id, true)?;
//! assert_eq!(release.paid_to(&alice), 200);
//! assert_eq!(ledger.balance(&alice), 1_100);
//! Ok::<(), wager_core::WagerError>(())
//! ```

pub mod attestation;
pub mod bet;
pub mod clock;
pub mod config;
pub mod custody;
pub mod error;
pub mod escrow;
pub mod lifecycle;
pub mod oracle;
pub mod registry;
pub mod types;
pub mod utils;

#[cfg(test)]
pub mod test_utils;

pub use attestation::OracleAttestation;
pub use bet::{Bet, BetView};
pub use clock::{ClockSource, ManualClock, SystemClock};
pub use config::DeskConfig;
pub use custody::{MemoryLedger, StakedValue, ValueCustody};
pub use error::{Result, WagerError};
pub use lifecycle::{BetLifecycle, Payout, Release};
pub use oracle::{ChannelOracle, OracleAnswer, OraclePort, OracleRequest};
pub use registry::BetRegistry;
pub use types::{BetId, BetStatus, NewBet, Principal, Timestamp};
