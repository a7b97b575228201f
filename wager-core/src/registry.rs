//! # Bet Registry
//!
//! Id-keyed index owning every live bet. Mutable access to a bet goes through
//! a [`DashMap`] entry guard, so two mutations of the same id never overlap.
//! The guard locks the whole shard the id hashes to and is held for the full
//! transition, custody calls included, so unrelated bets that share a shard
//! are serialised too. Bets in other shards proceed in parallel.
//!
//! Only the crate can insert, mutate or remove bets. Removed ids are
//! remembered and can never be inserted again.

use dashmap::{
    mapref::{
        entry::{Entry, OccupiedEntry, VacantEntry},
        one::{Ref, RefMut},
    },
    DashMap, DashSet,
};
use tracing::debug;

use crate::{bet::BetView, error::Result, Bet, BetId, WagerError};

/// Concurrent map from bet id to bet.
#[derive(Debug, Default)]
pub struct BetRegistry {
    bets: DashMap<BetId, Bet>,
    retired: DashSet<BetId>,
}

/// Exclusive reservation of an unused id.
pub(crate) struct Slot<'a> {
    entry: VacantEntry<'a, BetId, Bet>,
}

impl<'a> Slot<'a> {
    pub(crate) fn id(&self) -> &BetId {
        self.entry.key()
    }

    /// Store `bet` under the reserved id.
    pub(crate) fn fill(self, bet: Bet) -> Result<()> {
        if bet.id != *self.entry.key() {
            return Err(WagerError::InvalidBet(format!(
                "bet {} does not match reserved id {}",
                bet.id,
                self.entry.key()
            )));
        }
        self.entry.insert(bet);
        Ok(())
    }
}

impl BetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `id`, holding it exclusively until the slot is filled or dropped.
    ///
    /// Bets are inserted through the returned [`Slot`], so a duplicate id is
    /// detected before any stake is withdrawn.
    pub(crate) fn reserve(&self, id: BetId) -> Result<Slot<'_>> {
        if self.retired.contains(&id) {
            return Err(WagerError::DuplicateId(id));
        }
        match self.bets.entry(id) {
            Entry::Occupied(entry) => Err(WagerError::DuplicateId(entry.key().clone())),
            Entry::Vacant(entry) => Ok(Slot { entry }),
        }
    }

    pub fn lookup(&self, id: &BetId) -> Result<Ref<'_, BetId, Bet>> {
        self.bets
            .get(id)
            .ok_or_else(|| WagerError::NotFound(id.clone()))
    }

    pub(crate) fn lookup_mut(&self, id: &BetId) -> Result<RefMut<'_, BetId, Bet>> {
        self.bets
            .get_mut(id)
            .ok_or_else(|| WagerError::NotFound(id.clone()))
    }

    /// Exclusive handle on a live bet that can also remove it.
    pub(crate) fn entry(&self, id: &BetId) -> Result<OccupiedEntry<'_, BetId, Bet>> {
        match self.bets.entry(id.clone()) {
            Entry::Occupied(entry) => Ok(entry),
            Entry::Vacant(_) => Err(WagerError::NotFound(id.clone())),
        }
    }

    /// Remove the bet behind an entry obtained from [`BetRegistry::entry`],
    /// retiring its id.
    pub(crate) fn remove(&self, entry: OccupiedEntry<'_, BetId, Bet>) -> Bet {
        let (id, bet) = entry.remove_entry();
        debug!(bet_id = %id, "removed bet");
        self.retired.insert(id);
        bet
    }

    pub fn contains(&self, id: &BetId) -> bool {
        self.bets.contains_key(id)
    }

    /// Whether `id` belonged to a bet that has since been removed.
    pub fn is_retired(&self, id: &BetId) -> bool {
        self.retired.contains(id)
    }

    pub fn len(&self) -> usize {
        self.bets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bets.is_empty()
    }

    pub fn ids(&self) -> Vec<BetId> {
        self.bets.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Snapshots of every live bet, ordered by id.
    pub fn views(&self) -> Vec<BetView> {
        let mut views: Vec<BetView> = self.bets.iter().map(|entry| entry.value().view()).collect();
        views.sort_by(|a, b| a.id.cmp(&b.id));
        views
    }

    /// Value held in escrow across all live bets.
    pub fn total_escrowed(&self) -> u64 {
        self.bets.iter().map(|entry| entry.value().escrowed()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{custody::StakedValue, test_utils::terms, BetStatus, Principal};

    fn bet(id: &str) -> Bet {
        Bet::propose(
            BetId::from(id),
            Principal::from("alice"),
            terms("bob", 100, true),
            StakedValue::issue(100),
        )
    }

    fn insert(registry: &BetRegistry, bet: Bet) {
        registry.reserve(bet.id.clone()).unwrap().fill(bet).unwrap();
    }

    fn remove(registry: &BetRegistry, id: &str) -> Bet {
        let entry = registry.entry(&BetId::from(id)).unwrap();
        registry.remove(entry)
    }

    fn drain(mut bet: Bet) {
        if let Some(parts) = bet.close(BetStatus::Cancelled) {
            parts.creator.into_amount();
            if let Some(stake) = parts.counterparty {
                stake.into_amount();
            }
        }
    }

    #[test]
    fn test_insert_lookup_remove() {
        let registry = BetRegistry::new();
        insert(&registry, bet("B1"));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup(&BetId::from("B1")).unwrap().stake_amount(), 100);

        registry.lookup_mut(&BetId::from("B1")).unwrap().odds = 2.5;
        assert_eq!(registry.lookup(&BetId::from("B1")).unwrap().odds(), 2.5);

        let removed = remove(&registry, "B1");
        assert_eq!(removed.id, BetId::from("B1"));
        assert!(registry.is_empty());
        drain(removed);
    }

    #[test]
    fn test_unknown_id_not_found() {
        let registry = BetRegistry::new();
        let id = BetId::from("missing");
        assert!(matches!(registry.lookup(&id), Err(WagerError::NotFound(_))));
        assert!(matches!(registry.lookup_mut(&id), Err(WagerError::NotFound(_))));
        assert!(matches!(registry.entry(&id), Err(WagerError::NotFound(_))));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let registry = BetRegistry::new();
        insert(&registry, bet("B1"));
        let err = registry.reserve(BetId::from("B1")).err().unwrap();
        assert!(matches!(err, WagerError::DuplicateId(_)));
    }

    #[test]
    fn test_removed_id_never_reused() {
        let registry = BetRegistry::new();
        insert(&registry, bet("B1"));
        drain(remove(&registry, "B1"));

        assert!(registry.is_retired(&BetId::from("B1")));
        let err = registry.reserve(BetId::from("B1")).err().unwrap();
        assert!(matches!(err, WagerError::DuplicateId(_)));
    }

    #[test]
    fn test_slot_rejects_mismatched_bet() {
        let registry = BetRegistry::new();
        let slot = registry.reserve(BetId::from("B1")).unwrap();
        assert_eq!(slot.id(), &BetId::from("B1"));
        let mut other = bet("B2");
        if let Some(parts) = other.close(BetStatus::Cancelled) {
            parts.creator.into_amount();
        }
        assert!(matches!(slot.fill(other), Err(WagerError::InvalidBet(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_views_and_totals() {
        let registry = BetRegistry::new();
        insert(&registry, bet("B2"));
        insert(&registry, bet("B1"));

        let views = registry.views();
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].id, BetId::from("B1"));
        assert_eq!(registry.total_escrowed(), 200);
        assert_eq!(registry.ids().len(), 2);

        drain(remove(&registry, "B2"));
        assert!(!registry.contains(&BetId::from("B2")));
        assert!(registry.is_retired(&BetId::from("B2")));
        drain(remove(&registry, "B1"));
    }
}
