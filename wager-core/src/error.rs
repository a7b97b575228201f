//! Error types for wager-core

use thiserror::Error;

use crate::types::{BetId, BetStatus, Principal, Timestamp};

/// Result type alias for wager operations
pub type Result<T> = std::result::Result<T, WagerError>;

/// Error types for escrow operations
#[derive(Error, Debug)]
pub enum WagerError {
    /// Unknown (or already closed) bet
    #[error("Bet not found: {0}")]
    NotFound(BetId),

    /// Caller lacks authority for this transition
    #[error("Principal {caller} may not {action} bet {bet_id}")]
    Forbidden {
        bet_id: BetId,
        caller: Principal,
        action: &'static str,
    },

    /// The bet has already left the `Proposed` state
    #[error("Bet {bet_id} is already {status}")]
    AlreadyAgreed { bet_id: BetId, status: BetStatus },

    /// Operation invalid for the bet's current status
    #[error("Bet {bet_id} is {actual}, expected {expected}")]
    WrongState {
        bet_id: BetId,
        expected: BetStatus,
        actual: BetStatus,
    },

    /// Consent deadline reached
    #[error("Consent window for bet {bet_id} closed at {window_start} (now {now})")]
    WindowClosed {
        bet_id: BetId,
        window_start: Timestamp,
        now: Timestamp,
    },

    /// Event has not ended yet
    #[error("Bet {bet_id} cannot be resolved before {window_end} (now {now})")]
    TooEarly {
        bet_id: BetId,
        window_end: Timestamp,
        now: Timestamp,
    },

    /// Malformed deadlines
    #[error("Invalid window: start {window_start} is after end {window_end}")]
    InvalidWindow {
        window_start: Timestamp,
        window_end: Timestamp,
    },

    /// Custody withdrawal failed
    #[error("Insufficient funds for {principal}: requested {requested}, available {available}")]
    InsufficientFunds {
        principal: Principal,
        requested: u64,
        available: u64,
    },

    /// Registry invariant violation
    #[error("Duplicate bet id: {0}")]
    DuplicateId(BetId),

    /// Minting would overflow the ledger's supply
    #[error("Supply overflow: cannot mint {requested} on top of {supply}")]
    SupplyOverflow { requested: u64, supply: u64 },

    /// Betting errors
    #[error("Invalid bet: {0}")]
    InvalidBet(String),

    /// Oracle errors
    #[error("Oracle error: {0}")]
    Oracle(String),

    /// Signature verification errors
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    /// Configuration errors
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Secp256k1 errors
    #[error("Secp256k1 error: {0}")]
    Secp256k1(#[from] secp256k1::Error),

    /// Hex decoding errors
    #[error("Hex decoding error: {0}")]
    Hex(#[from] hex::FromHexError),

    /// Serde JSON errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WagerError {
    /// Whether the error is a state-machine refusal rather than an infrastructure failure.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::Forbidden { .. }
                | Self::AlreadyAgreed { .. }
                | Self::WrongState { .. }
                | Self::WindowClosed { .. }
                | Self::TooEarly { .. }
                | Self::InvalidWindow { .. }
                | Self::InsufficientFunds { .. }
                | Self::InvalidBet(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_bet() {
        let err = WagerError::WindowClosed {
            bet_id: BetId::from("ABCD"),
            window_start: 1000,
            now: 1000,
        };
        assert_eq!(
            err.to_string(),
            "Consent window for bet ABCD closed at 1000 (now 1000)"
        );
    }

    #[test]
    fn test_rejection_classification() {
        assert!(WagerError::NotFound(BetId::from("X")).is_rejection());
        assert!(!WagerError::Oracle("down".to_string()).is_rejection());
        assert!(!WagerError::DuplicateId(BetId::from("X")).is_rejection());
    }
}
