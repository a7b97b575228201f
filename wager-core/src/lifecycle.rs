//! # Bet Lifecycle
//!
//! The escrow state machine. Every operation runs against a single bet while
//! holding that bet's registry guard, so a bet is never observable half-way
//! through a transition (for example with the counterparty's stake withdrawn
//! but the status still `Proposed`).
//!
//! Value only ever moves between principals and the escrow of the bet being
//! operated on:
//! - `create_bet` withdraws the creator's stake into a new escrow
//! - `agree_to_bet` withdraws an equal stake from the counterparty
//! - `delete_bet` and `handle_expired_bet` return each stake to whoever paid it
//! - `process_oracle_answer` pays both stakes to the winner
//!
//! Settlement never mints. The oracle round trip is split in two independent
//! calls (`send_to_oracle`, then `process_oracle_answer`), and no lock is held
//! while waiting for the answer.

use dashmap::mapref::entry::OccupiedEntry;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    attestation::OracleAttestation,
    bet::BetView,
    clock::ClockSource,
    config::DeskConfig,
    custody::{StakedValue, ValueCustody},
    error::Result,
    oracle::{OracleAnswer, OraclePort},
    registry::BetRegistry,
    utils::derive_bet_id,
    Bet, BetId, BetStatus, NewBet, Principal, WagerError,
};

/// Value credited to one principal when a bet closes.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Payout {
    pub principal: Principal,
    pub amount: u64,
}

/// Receipt of a terminal transition.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Release {
    pub bet_id: BetId,
    /// `Cancelled`, `Expired` or `Settled`
    pub status: BetStatus,
    pub payouts: Vec<Payout>,
}

impl Release {
    /// Total value released.
    pub fn total(&self) -> u64 {
        self.payouts.iter().map(|p| p.amount).sum()
    }

    /// Value released to `principal`.
    pub fn paid_to(&self, principal: &Principal) -> u64 {
        self.payouts
            .iter()
            .filter(|p| p.principal == *principal)
            .map(|p| p.amount)
            .sum()
    }
}

/// Where the stakes of a closing bet go.
enum Destination {
    /// Each stake back to whoever paid it.
    Refund,
    /// Both stakes to one principal.
    Winner(Principal),
}

/// The escrow desk: owns the bet registry and drives every transition.
///
/// Bets are only reachable through snapshots; the registry itself stays
/// inside the desk.
///
/// ```compile_fail
/// use wager_core::{BetId, BetLifecycle, ChannelOracle, MemoryLedger, SystemClock};
///
/// fn discard(desk: &BetLifecycle<MemoryLedger, ChannelOracle, SystemClock>, id: &BetId) {
///     let entry = desk.registry().entry(id).unwrap();
///     desk.registry().remove(entry);
/// }
/// ```
pub struct BetLifecycle<V, O, C> {
    custody: V,
    oracle: O,
    clock: C,
    config: DeskConfig,
    registry: BetRegistry,
    sequence: AtomicU64,
}

impl<V, O, C> BetLifecycle<V, O, C>
where
    V: ValueCustody,
    O: OraclePort,
    C: ClockSource,
{
    pub fn new(custody: V, oracle: O, clock: C, config: DeskConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            custody,
            oracle,
            clock,
            config,
            registry: BetRegistry::new(),
            sequence: AtomicU64::new(0),
        })
    }

    /// Propose a bet to `terms.counterparty`, staking `terms.amount` from `caller`.
    ///
    /// # Errors
    /// - `InvalidWindow` if `window_start > window_end`
    /// - `InvalidBet` for a stake below `min_stake` or a bet against oneself
    /// - `InsufficientFunds` if the stake cannot be withdrawn
    pub fn create_bet(&self, caller: &Principal, terms: NewBet) -> Result<BetId> {
        if terms.window_start > terms.window_end {
            return Err(WagerError::InvalidWindow {
                window_start: terms.window_start,
                window_end: terms.window_end,
            });
        }
        if terms.amount < self.config.min_stake {
            return Err(WagerError::InvalidBet(format!(
                "stake {} is below the minimum of {}",
                terms.amount, self.config.min_stake
            )));
        }
        if *caller == terms.counterparty {
            return Err(WagerError::InvalidBet(
                "creator and counterparty must differ".to_string(),
            ));
        }

        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let id = derive_bet_id(sequence, caller, &terms.counterparty, &terms.proposition);
        let slot = self.registry.reserve(id)?;

        let stake = self.custody.withdraw(caller, terms.amount)?;
        let bet = Bet::propose(slot.id().clone(), caller.clone(), terms, stake);
        let id = bet.id.clone();
        info!(
            bet_id = %id,
            creator = %bet.creator,
            counterparty = %bet.counterparty,
            amount = bet.stake_amount,
            window_start = bet.window_start,
            window_end = bet.window_end,
            "bet proposed"
        );
        slot.fill(bet)?;
        Ok(id)
    }

    /// Withdraw a still-proposed bet, returning the creator's stake.
    pub fn delete_bet(&self, caller: &Principal, id: &BetId) -> Result<Release> {
        let entry = self.registry.entry(id)?;
        let bet = entry.get();
        if *caller != bet.creator {
            return Err(WagerError::Forbidden {
                bet_id: id.clone(),
                caller: caller.clone(),
                action: "delete",
            });
        }
        if bet.status != BetStatus::Proposed {
            return Err(WagerError::AlreadyAgreed {
                bet_id: id.clone(),
                status: bet.status,
            });
        }

        self.close(entry, BetStatus::Cancelled, Destination::Refund)
    }

    /// Accept a proposed bet, locking an equal stake from the counterparty.
    ///
    /// Consent is only possible strictly before `window_start`.
    pub fn agree_to_bet(&self, caller: &Principal, id: &BetId) -> Result<()> {
        let now = self.clock.now();
        let mut bet = self.registry.lookup_mut(id)?;
        if *caller != bet.counterparty {
            return Err(WagerError::Forbidden {
                bet_id: id.clone(),
                caller: caller.clone(),
                action: "agree to",
            });
        }
        if bet.status != BetStatus::Proposed {
            return Err(WagerError::AlreadyAgreed {
                bet_id: id.clone(),
                status: bet.status,
            });
        }
        if now >= bet.window_start {
            return Err(WagerError::WindowClosed {
                bet_id: id.clone(),
                window_start: bet.window_start,
                now,
            });
        }

        let stake = self.custody.withdraw(caller, bet.stake_amount)?;
        if let Err(stake) = bet.lock_counterparty(stake) {
            self.custody.deposit(caller, stake);
            return Err(WagerError::WrongState {
                bet_id: id.clone(),
                expected: BetStatus::Proposed,
                actual: bet.status,
            });
        }

        info!(bet_id = %id, counterparty = %caller, escrowed = bet.escrowed(), "bet agreed");
        Ok(())
    }

    /// Expire a bet whose deadline has passed. A bet that is not yet due is
    /// left untouched and `Ok(None)` is returned.
    ///
    /// - `Proposed` bets expire at `window_end`
    /// - `Agreed` bets expire `oracle_grace_period` after `window_end`
    /// - `PendingOracle` bets expire `oracle_timeout` after `window_end`, if set
    pub fn handle_expired_bet(&self, id: &BetId) -> Result<Option<Release>> {
        let now = self.clock.now();
        let entry = self.registry.entry(id)?;
        let bet = entry.get();
        let due = match bet.status {
            BetStatus::Proposed => now >= bet.window_end,
            BetStatus::Agreed => now >= self.config.agreed_expiry(bet.window_end),
            BetStatus::PendingOracle => self
                .config
                .pending_expiry(bet.window_end)
                .is_some_and(|expiry| now >= expiry),
            _ => false,
        };
        if !due {
            debug!(bet_id = %id, status = %bet.status, now, "bet not expired");
            return Ok(None);
        }

        self.close(entry, BetStatus::Expired, Destination::Refund)
            .map(Some)
    }

    /// Hand an agreed bet to the oracle once its event window has ended.
    pub fn send_to_oracle(&self, caller: &Principal, id: &BetId) -> Result<()> {
        let now = self.clock.now();
        let mut bet = self.registry.lookup_mut(id)?;
        if !bet.is_party(caller) {
            return Err(WagerError::Forbidden {
                bet_id: id.clone(),
                caller: caller.clone(),
                action: "send to oracle",
            });
        }
        if now <= bet.window_end {
            return Err(WagerError::TooEarly {
                bet_id: id.clone(),
                window_end: bet.window_end,
                now,
            });
        }
        if bet.status != BetStatus::Agreed {
            return Err(WagerError::WrongState {
                bet_id: id.clone(),
                expected: BetStatus::Agreed,
                actual: bet.status,
            });
        }

        self.oracle.submit(&bet.id, &bet.proposition)?;
        bet.mark_pending_oracle();
        info!(bet_id = %id, caller = %caller, "bet sent to oracle");
        Ok(())
    }

    /// Settle a pending bet with the oracle's answer, paying both stakes to the winner.
    pub fn process_oracle_answer(&self, id: &BetId, answer: bool) -> Result<Release> {
        let entry = self.registry.entry(id)?;
        let bet = entry.get();
        if bet.status != BetStatus::PendingOracle {
            return Err(WagerError::WrongState {
                bet_id: id.clone(),
                expected: BetStatus::PendingOracle,
                actual: bet.status,
            });
        }

        let winner = bet.winner(answer).clone();
        debug!(bet_id = %id, answer, winner = %winner, "oracle answered");
        self.close(entry, BetStatus::Settled, Destination::Winner(winner))
    }

    /// Settle with an answer signed by the configured oracle key.
    pub fn process_attested_answer(&self, attestation: &OracleAttestation) -> Result<Release> {
        let pubkey = self
            .config
            .oracle_pubkey
            .as_deref()
            .ok_or_else(|| WagerError::Config("no oracle_pubkey configured".to_string()))?;
        if !attestation.verify(pubkey)? {
            return Err(WagerError::InvalidSignature(format!(
                "answer for bet {} is not signed by the configured oracle",
                attestation.bet_id
            )));
        }
        self.process_oracle_answer(&attestation.bet_id, attestation.answer)
    }

    /// Apply [`BetLifecycle::handle_expired_bet`] to every live bet.
    pub fn expire_due(&self) -> Vec<Release> {
        let mut released = Vec::new();
        for id in self.registry.ids() {
            match self.handle_expired_bet(&id) {
                Ok(Some(release)) => released.push(release),
                Ok(None) => {}
                // Closed concurrently since the id list was taken.
                Err(WagerError::NotFound(_)) => {}
                Err(e) => warn!(bet_id = %id, error = %e, "expiry sweep failed"),
            }
        }
        released
    }

    /// Feed oracle answers to [`BetLifecycle::process_oracle_answer`] until the
    /// channel closes. Returns each answer's outcome in arrival order.
    pub async fn consume_answers(
        &self,
        mut answers: mpsc::Receiver<OracleAnswer>,
    ) -> Vec<Result<Release>> {
        let mut outcomes = Vec::new();
        while let Some(OracleAnswer { bet_id, answer }) = answers.recv().await {
            let outcome = self.process_oracle_answer(&bet_id, answer);
            if let Err(e) = &outcome {
                warn!(bet_id = %bet_id, error = %e, "rejected oracle answer");
            }
            outcomes.push(outcome);
        }
        outcomes
    }

    pub fn lookup(&self, id: &BetId) -> Result<BetView> {
        self.registry.lookup(id).map(|bet| bet.view())
    }

    pub fn bets(&self) -> Vec<BetView> {
        self.registry.views()
    }

    /// Value held in escrow across all live bets.
    pub fn total_escrowed(&self) -> u64 {
        self.registry.total_escrowed()
    }

    pub(crate) fn registry(&self) -> &BetRegistry {
        &self.registry
    }

    pub fn custody(&self) -> &V {
        &self.custody
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn config(&self) -> &DeskConfig {
        &self.config
    }

    /// Empty the bet's escrow into `destination`, then remove the bet.
    fn close(
        &self,
        mut entry: OccupiedEntry<'_, BetId, Bet>,
        status: BetStatus,
        destination: Destination,
    ) -> Result<Release> {
        let bet = entry.get_mut();
        let id = bet.id.clone();
        let (creator, counterparty) = (bet.creator.clone(), bet.counterparty.clone());
        let parts = bet
            .close(status)
            .ok_or_else(|| WagerError::InvalidBet(format!("bet {id} holds no escrow")))?;

        let payouts = match destination {
            Destination::Refund => {
                let mut payouts = vec![self.release_to(&creator, parts.creator)];
                if let Some(stake) = parts.counterparty {
                    payouts.push(self.release_to(&counterparty, stake));
                }
                payouts
            }
            Destination::Winner(winner) => {
                let mut amount = self.release_to(&winner, parts.creator).amount;
                if let Some(stake) = parts.counterparty {
                    amount += self.release_to(&winner, stake).amount;
                }
                vec![Payout {
                    principal: winner,
                    amount,
                }]
            }
        };

        self.registry.remove(entry);
        let release = Release {
            bet_id: id,
            status,
            payouts,
        };
        info!(
            bet_id = %release.bet_id,
            status = %release.status,
            released = release.total(),
            "bet closed"
        );
        Ok(release)
    }

    fn release_to(&self, principal: &Principal, value: StakedValue) -> Payout {
        let amount = self.custody.amount(&value);
        self.custody.deposit(principal, value);
        Payout {
            principal: principal.clone(),
            amount,
        }
    }
}
