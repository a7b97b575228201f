//! # Bet Entity
//!
//! A bet is the escrow record for one wager between two principals. The
//! registry owns every [`Bet`]; callers only ever see [`BetView`] snapshots.

use serde::{Deserialize, Serialize};

use crate::{
    custody::StakedValue,
    escrow::{Escrow, EscrowParts},
    BetId, BetStatus, NewBet, Principal, Timestamp,
};

/// A two-party wager together with the stakes it holds.
///
/// Fields are only writable inside the crate; every change of status goes
/// through [`crate::BetLifecycle`].
///
/// ```compile_fail
/// use wager_core::{Bet, BetStatus};
///
/// fn skip_ahead(bet: &mut Bet) {
///     bet.status = BetStatus::PendingOracle;
/// }
/// ```
#[derive(Debug)]
pub struct Bet {
    /// Unique bet identifier (registry key)
    pub(crate) id: BetId,

    /// Principal who proposed the bet and staked first
    pub(crate) creator: Principal,

    /// The only principal allowed to accept
    pub(crate) counterparty: Principal,

    /// The wagered claim
    pub(crate) proposition: String,

    /// Whether the creator holds the "true" side of the proposition
    pub(crate) creator_affirms: bool,

    /// Creator's stake
    pub(crate) stake_amount: u64,

    /// Counterparty's stake, present once agreed
    pub(crate) counterparty_stake: Option<u64>,

    /// Advisory payout ratio, not used by settlement
    pub(crate) odds: f64,

    /// Consent deadline
    pub(crate) window_start: Timestamp,

    /// Event end
    pub(crate) window_end: Timestamp,

    /// Current lifecycle status
    pub(crate) status: BetStatus,

    escrow: Option<Escrow>,
}

/// Serialisable snapshot of a bet.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct BetView {
    pub id: BetId,
    pub creator: Principal,
    pub counterparty: Principal,
    pub proposition: String,
    pub creator_affirms: bool,
    pub stake_amount: u64,
    pub counterparty_stake: Option<u64>,
    pub odds: f64,
    pub window_start: Timestamp,
    pub window_end: Timestamp,
    pub status: BetStatus,
    pub escrowed: u64,
}

impl Bet {
    /// Build a `Proposed` bet around the creator's already-withdrawn stake.
    pub(crate) fn propose(id: BetId, creator: Principal, terms: NewBet, stake: StakedValue) -> Self {
        Self {
            id,
            creator,
            counterparty: terms.counterparty,
            proposition: terms.proposition,
            creator_affirms: terms.creator_affirms,
            stake_amount: stake.amount(),
            counterparty_stake: None,
            odds: terms.odds,
            window_start: terms.window_start,
            window_end: terms.window_end,
            status: BetStatus::Proposed,
            escrow: Some(Escrow::open(stake)),
        }
    }

    /// Lock the counterparty's stake and move to `Agreed`.
    ///
    /// The stake is handed back if the bet already holds one.
    pub(crate) fn lock_counterparty(&mut self, stake: StakedValue) -> Result<(), StakedValue> {
        let Some(escrow) = self.escrow.as_mut() else {
            return Err(stake);
        };
        let amount = stake.amount();
        escrow.lock_counterparty(stake)?;
        self.counterparty_stake = Some(amount);
        self.status = BetStatus::Agreed;
        Ok(())
    }

    /// Record that the bet has been handed to the oracle.
    pub(crate) fn mark_pending_oracle(&mut self) {
        debug_assert!(self.status.can_transition_to(BetStatus::PendingOracle));
        self.status = BetStatus::PendingOracle;
    }

    pub fn id(&self) -> &BetId {
        &self.id
    }

    pub fn creator(&self) -> &Principal {
        &self.creator
    }

    pub fn counterparty(&self) -> &Principal {
        &self.counterparty
    }

    pub fn proposition(&self) -> &str {
        &self.proposition
    }

    pub fn creator_affirms(&self) -> bool {
        self.creator_affirms
    }

    pub fn stake_amount(&self) -> u64 {
        self.stake_amount
    }

    pub fn counterparty_stake(&self) -> Option<u64> {
        self.counterparty_stake
    }

    pub fn odds(&self) -> f64 {
        self.odds
    }

    pub fn window_start(&self) -> Timestamp {
        self.window_start
    }

    pub fn window_end(&self) -> Timestamp {
        self.window_end
    }

    pub fn status(&self) -> BetStatus {
        self.status
    }

    /// Value currently held in escrow for this bet.
    pub fn escrowed(&self) -> u64 {
        self.escrow.as_ref().map_or(0, Escrow::total)
    }

    /// Take every stake out of escrow, leaving the bet in `status`.
    ///
    /// Returns `None` if the escrow was already released.
    pub(crate) fn close(&mut self, status: BetStatus) -> Option<EscrowParts> {
        let parts = self.escrow.take()?.release();
        debug_assert!(status.is_terminal() && self.status.can_transition_to(status));
        self.status = status;
        Some(parts)
    }

    /// Whether `principal` is one of the two parties.
    pub fn is_party(&self, principal: &Principal) -> bool {
        *principal == self.creator || *principal == self.counterparty
    }

    /// The principal paid when the oracle answers `answer`.
    pub fn winner(&self, answer: bool) -> &Principal {
        if self.creator_affirms == answer {
            &self.creator
        } else {
            &self.counterparty
        }
    }

    pub fn view(&self) -> BetView {
        BetView {
            id: self.id.clone(),
            creator: self.creator.clone(),
            counterparty: self.counterparty.clone(),
            proposition: self.proposition.clone(),
            creator_affirms: self.creator_affirms,
            stake_amount: self.stake_amount,
            counterparty_stake: self.counterparty_stake,
            odds: self.odds,
            window_start: self.window_start,
            window_end: self.window_end,
            status: self.status,
            escrowed: self.escrowed(),
        }
    }
}
