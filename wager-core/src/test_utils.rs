//! Common test utilities for wager-core tests.
//!
//! This module provides shared functionality for testing across all modules,
//! including desk construction, funded ledgers and a recording oracle.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use crate::{
    clock::ManualClock,
    config::DeskConfig,
    custody::MemoryLedger,
    error::Result,
    oracle::{OraclePort, OracleRequest},
    BetId, BetLifecycle, NewBet, Principal, WagerError,
};
use self::constants::*;

/// Desk wired to in-memory collaborators the test keeps handles on.
pub type TestDesk = BetLifecycle<Arc<MemoryLedger>, Arc<RecordingOracle>, Arc<ManualClock>>;

/// Oracle port that records every request and can be switched to fail.
#[derive(Debug, Default)]
pub struct RecordingOracle {
    requests: Mutex<Vec<OracleRequest>>,
    failing: AtomicBool,
}

impl RecordingOracle {
    pub fn requests(&self) -> Vec<OracleRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl OraclePort for RecordingOracle {
    fn submit(&self, id: &BetId, proposition: &str) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(WagerError::Oracle("oracle unreachable".to_string()));
        }
        self.requests.lock().unwrap().push(OracleRequest {
            bet_id: id.clone(),
            proposition: proposition.to_string(),
        });
        Ok(())
    }
}

/// Ledger where alice and bob each hold [`INITIAL_BALANCE`] and carol holds nothing.
pub fn funded_ledger() -> MemoryLedger {
    let ledger = MemoryLedger::new();
    ledger.credit(&Principal::from(ALICE), INITIAL_BALANCE).unwrap();
    ledger.credit(&Principal::from(BOB), INITIAL_BALANCE).unwrap();
    ledger
}

/// Desk with the default configuration and the clock at zero.
pub fn desk() -> TestDesk {
    desk_with_config(DeskConfig::default())
}

pub fn desk_with_config(config: DeskConfig) -> TestDesk {
    BetLifecycle::new(
        Arc::new(funded_ledger()),
        Arc::new(RecordingOracle::default()),
        Arc::new(ManualClock::new(0)),
        config,
    )
    .unwrap()
}

/// Standard terms: consent before [`TEST_WINDOW_START`], event ends at [`TEST_WINDOW_END`].
pub fn terms(counterparty: &str, amount: u64, creator_affirms: bool) -> NewBet {
    NewBet {
        counterparty: Principal::from(counterparty),
        proposition: TEST_PROPOSITION.to_string(),
        amount,
        odds: 1.0,
        creator_affirms,
        window_start: TEST_WINDOW_START,
        window_end: TEST_WINDOW_END,
    }
}

/// Common test constants
pub mod constants {
    pub const ALICE: &str = "alice";
    pub const BOB: &str = "bob";
    pub const CAROL: &str = "carol";

    /// Starting balance of funded principals
    pub const INITIAL_BALANCE: u64 = 1000;

    pub const TEST_PROPOSITION: &str = "It rains in Paris on 2025-01-01";
    pub const TEST_WINDOW_START: u64 = 1000;
    pub const TEST_WINDOW_END: u64 = 2000;

    /// Oracle secret key used to sign attestations in tests
    pub const TEST_ORACLE_SECRET: &str =
        "0101010101010101010101010101010101010101010101010101010101010101";
}
