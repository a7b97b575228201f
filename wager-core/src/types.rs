//! # Identifiers and Status
//!
//! Small value types shared by every component of the escrow.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Seconds since the Unix epoch.
pub type Timestamp = u64;

/// Unique bet identifier, never reused once the bet is removed.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct BetId(String);

impl BetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BetId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// An authenticated party identifier.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Principal {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

/// Lifecycle status of a bet.
///
/// ```text
/// Proposed -> Agreed -> PendingOracle -> Settled
///    |          |            |
///    |          +-> Expired  +-> Expired (oracle timeout, opt-in)
///    +-> Cancelled
///    +-> Expired
/// ```
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BetStatus {
    Proposed,
    Agreed,
    Cancelled,
    Expired,
    PendingOracle,
    Settled,
}

impl BetStatus {
    /// Whether stakes are held in custody while in this status.
    pub fn holds_escrow(self) -> bool {
        matches!(self, Self::Proposed | Self::Agreed | Self::PendingOracle)
    }

    /// Terminal statuses remove the bet from the registry.
    pub fn is_terminal(self) -> bool {
        !self.holds_escrow()
    }

    /// Legal single-step transitions.
    pub fn can_transition_to(self, next: BetStatus) -> bool {
        use BetStatus::*;
        matches!(
            (self, next),
            (Proposed, Agreed)
                | (Proposed, Cancelled)
                | (Proposed, Expired)
                | (Agreed, PendingOracle)
                | (Agreed, Expired)
                | (PendingOracle, Settled)
                | (PendingOracle, Expired)
        )
    }
}

impl fmt::Display for BetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Proposed => "Proposed",
            Self::Agreed => "Agreed",
            Self::Cancelled => "Cancelled",
            Self::Expired => "Expired",
            Self::PendingOracle => "PendingOracle",
            Self::Settled => "Settled",
        };
        f.write_str(name)
    }
}

/// Terms of a new bet, as proposed by its creator.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NewBet {
    /// The only principal allowed to accept
    pub counterparty: Principal,

    /// The wagered claim
    pub proposition: String,

    /// Creator's stake (the counterparty must match it)
    pub amount: u64,

    /// Advisory payout ratio
    #[serde(default = "default_odds")]
    pub odds: f64,

    /// Whether the creator holds the "true" side
    pub creator_affirms: bool,

    /// Consent deadline
    pub window_start: Timestamp,

    /// Event end
    pub window_end: Timestamp,
}

fn default_odds() -> f64 {
    1.0
}
