//! # Value Custody
//!
//! Movement primitives for staked value. The escrow never sees a ledger
//! directly: it withdraws value from a principal, holds the resulting
//! [`StakedValue`] for exactly as long as the bet needs it, and deposits it
//! back to exactly one principal.
//!
//! [`StakedValue`] is deliberately not `Clone`: the only ways to get rid of one
//! are to deposit it or to consume it inside a custody implementation.

use dashmap::DashMap;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tracing::{debug, error};

use crate::{error::Result, Principal, WagerError};

/// Value withdrawn from a ledger and not yet deposited anywhere.
#[must_use = "staked value must be deposited back to a principal"]
#[derive(Debug, PartialEq, Eq)]
pub struct StakedValue {
    amount: u64,
}

impl StakedValue {
    /// Issue a value token. Only [`ValueCustody`] implementations should call this.
    pub fn issue(amount: u64) -> Self {
        Self { amount }
    }

    /// Amount represented by this token.
    pub fn amount(&self) -> u64 {
        self.amount
    }

    /// Consume the token, returning its amount to the ledger that credits it.
    pub fn into_amount(mut self) -> u64 {
        std::mem::take(&mut self.amount)
    }
}

impl Drop for StakedValue {
    fn drop(&mut self) {
        if self.amount != 0 {
            error!(amount = self.amount, "staked value dropped outside custody");
        }
    }
}

/// Opaque value-transfer capability backing the escrow.
pub trait ValueCustody: Send + Sync {
    /// Take `amount` out of `principal`'s balance.
    fn withdraw(&self, principal: &Principal, amount: u64) -> Result<StakedValue>;

    /// Credit `value` to `principal`.
    fn deposit(&self, principal: &Principal, value: StakedValue);

    /// Create new value. Never used to pay out a bet.
    fn mint(&self, amount: u64) -> Result<StakedValue>;

    /// Amount carried by `value`.
    fn amount(&self, value: &StakedValue) -> u64 {
        value.amount()
    }
}

impl<V: ValueCustody + ?Sized> ValueCustody for Arc<V> {
    fn withdraw(&self, principal: &Principal, amount: u64) -> Result<StakedValue> {
        (**self).withdraw(principal, amount)
    }

    fn deposit(&self, principal: &Principal, value: StakedValue) {
        (**self).deposit(principal, value)
    }

    fn mint(&self, amount: u64) -> Result<StakedValue> {
        (**self).mint(amount)
    }
}

/// In-memory ledger with per-principal balances.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    balances: DashMap<Principal, u64>,
    supply: AtomicU64,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint `amount` and deposit it to `principal`.
    pub fn credit(&self, principal: &Principal, amount: u64) -> Result<()> {
        let value = self.mint(amount)?;
        self.deposit(principal, value);
        Ok(())
    }

    /// Current balance of `principal` (zero if unknown).
    pub fn balance(&self, principal: &Principal) -> u64 {
        self.balances.get(principal).map(|b| *b).unwrap_or(0)
    }

    /// Total value ever minted by this ledger.
    pub fn total_supply(&self) -> u64 {
        self.supply.load(Ordering::SeqCst)
    }

    /// Sum of all balances, excluding value currently withdrawn.
    pub fn total_balances(&self) -> u64 {
        self.balances.iter().map(|entry| *entry.value()).sum()
    }
}

impl ValueCustody for MemoryLedger {
    fn withdraw(&self, principal: &Principal, amount: u64) -> Result<StakedValue> {
        let insufficient = |available| WagerError::InsufficientFunds {
            principal: principal.clone(),
            requested: amount,
            available,
        };

        let mut balance = self.balances.get_mut(principal).ok_or_else(|| insufficient(0))?;
        if *balance < amount {
            return Err(insufficient(*balance));
        }
        *balance -= amount;

        debug!(%principal, amount, "withdrew stake");
        Ok(StakedValue::issue(amount))
    }

    fn deposit(&self, principal: &Principal, value: StakedValue) {
        let amount = value.into_amount();
        *self.balances.entry(principal.clone()).or_insert(0) += amount;
        debug!(%principal, amount, "deposited stake");
    }

    fn mint(&self, amount: u64) -> Result<StakedValue> {
        self.supply
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |supply| {
                supply.checked_add(amount)
            })
            .map_err(|supply| WagerError::SupplyOverflow {
                requested: amount,
                supply,
            })?;
        Ok(StakedValue::issue(amount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_withdraw_and_deposit_conserve_value() {
        let ledger = MemoryLedger::new();
        let alice = Principal::from("alice");
        let bob = Principal::from("bob");
        ledger.credit(&alice, 500).unwrap();

        let stake = ledger.withdraw(&alice, 200).unwrap();
        assert_eq!(ledger.amount(&stake), 200);
        assert_eq!(ledger.balance(&alice), 300);
        assert_eq!(ledger.total_balances(), 300);

        ledger.deposit(&bob, stake);
        assert_eq!(ledger.balance(&bob), 200);
        assert_eq!(ledger.total_balances(), ledger.total_supply());
    }

    #[test]
    fn test_withdraw_insufficient_funds_leaves_balance() {
        let ledger = MemoryLedger::new();
        let alice = Principal::from("alice");
        ledger.credit(&alice, 50).unwrap();

        let err = ledger.withdraw(&alice, 51).unwrap_err();
        assert!(matches!(
            err,
            WagerError::InsufficientFunds {
                requested: 51,
                available: 50,
                ..
            }
        ));
        assert_eq!(ledger.balance(&alice), 50);
    }

    #[test]
    fn test_withdraw_unknown_principal() {
        let ledger = MemoryLedger::new();
        let err = ledger.withdraw(&Principal::from("nobody"), 1).unwrap_err();
        assert!(matches!(err, WagerError::InsufficientFunds { available: 0, .. }));
    }

    #[test]
    fn test_mint_overflow_rejected() {
        let ledger = MemoryLedger::new();
        ledger.credit(&Principal::from("alice"), u64::MAX).unwrap();
        let err = ledger.mint(1).unwrap_err();
        assert!(matches!(err, WagerError::SupplyOverflow { requested: 1, .. }));
        assert_eq!(ledger.total_supply(), u64::MAX);
    }
}
