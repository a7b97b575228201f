//! Per-bet escrow record.
//!
//! Each bet owns its own locked stakes. Nothing is pooled across bets, so one
//! bet's funds can never satisfy another bet's payout.

use crate::custody::StakedValue;

/// Stakes locked on behalf of one bet.
#[derive(Debug)]
pub struct Escrow {
    creator: StakedValue,
    counterparty: Option<StakedValue>,
}

/// Stakes taken out of an escrow when the bet closes.
#[derive(Debug)]
pub struct EscrowParts {
    pub creator: StakedValue,
    pub counterparty: Option<StakedValue>,
}

impl Escrow {
    /// Open an escrow holding the creator's stake.
    pub fn open(creator_stake: StakedValue) -> Self {
        Self {
            creator: creator_stake,
            counterparty: None,
        }
    }

    /// Lock the counterparty's stake. Returns the value back if one is already locked.
    pub fn lock_counterparty(&mut self, stake: StakedValue) -> Result<(), StakedValue> {
        if self.counterparty.is_some() {
            return Err(stake);
        }
        self.counterparty = Some(stake);
        Ok(())
    }

    pub fn creator_amount(&self) -> u64 {
        self.creator.amount()
    }

    pub fn counterparty_amount(&self) -> Option<u64> {
        self.counterparty.as_ref().map(StakedValue::amount)
    }

    /// Total value held for the bet.
    pub fn total(&self) -> u64 {
        self.creator_amount()
            .saturating_add(self.counterparty_amount().unwrap_or(0))
    }

    /// Empty the escrow.
    pub fn release(self) -> EscrowParts {
        EscrowParts {
            creator: self.creator,
            counterparty: self.counterparty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escrow_totals() {
        let mut escrow = Escrow::open(StakedValue::issue(100));
        assert_eq!(escrow.total(), 100);
        assert_eq!(escrow.counterparty_amount(), None);

        escrow.lock_counterparty(StakedValue::issue(100)).unwrap();
        assert_eq!(escrow.total(), 200);

        let rejected = escrow.lock_counterparty(StakedValue::issue(100)).unwrap_err();
        assert_eq!(rejected.into_amount(), 100);
        assert_eq!(escrow.total(), 200);

        let parts = escrow.release();
        assert_eq!(parts.creator.into_amount(), 100);
        assert_eq!(parts.counterparty.map(StakedValue::into_amount), Some(100));
    }
}
