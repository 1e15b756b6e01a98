//! Local stock cache with optimistic deltas.
//!
//! Availability shown to the user is `server inventory + pending deltas`.
//! A server update for a drink replaces its inventory and drops every pending
//! delta for that drink: server state always wins.

use std::collections::HashMap;

use pourline_core::{CorrelationId, DrinkId};
use pourline_events::{Envelope, EnvelopeKind, StockLevel};
use pourline_inventory::Drink;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SyncError {
    #[error("drink {0} is not in the local catalog")]
    UnknownDrink(DrinkId),
    #[error("malformed inventory envelope: {0}")]
    MalformedEnvelope(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingDelta {
    drink_id: DrinkId,
    delta: i64,
}

#[derive(Debug, Default)]
pub struct InventorySyncClient {
    stock: HashMap<DrinkId, StockLevel>,
    pending: HashMap<CorrelationId, PendingDelta>,
}

impl InventorySyncClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole cache with a fresh catalog (initial load, manual
    /// refresh, or after a reconnect). All pending deltas are dropped.
    pub fn load_catalog(&mut self, drinks: &[Drink]) {
        self.stock = drinks.iter().map(|d| (d.id, StockLevel::from(d))).collect();
        self.pending.clear();
    }

    /// Adjust availability before the server confirms it.
    ///
    /// The returned id is what [`rollback`](Self::rollback) takes.
    pub fn add_optimistic(&mut self, drink_id: DrinkId, delta: i64) -> Result<CorrelationId, SyncError> {
        if !self.stock.contains_key(&drink_id) {
            return Err(SyncError::UnknownDrink(drink_id));
        }
        let id = CorrelationId::new();
        self.pending.insert(id, PendingDelta { drink_id, delta });
        Ok(id)
    }

    /// Undo one optimistic delta. Returns false when it was already
    /// superseded by a server update or rolled back before.
    pub fn rollback(&mut self, correlation: CorrelationId) -> bool {
        self.pending.remove(&correlation).is_some()
    }

    /// Overwrite one drink with server truth.
    pub fn apply_server_update(&mut self, level: &StockLevel) {
        let before = self.pending.len();
        self.pending.retain(|_, p| p.drink_id != level.drink_id);
        let discarded = before - self.pending.len();
        if discarded > 0 {
            tracing::debug!(drink_id = %level.drink_id, discarded, "server update superseded optimistic deltas");
        }
        self.stock.insert(level.drink_id, level.clone());
    }

    /// Apply a realtime envelope. Only `INVENTORY_UPDATE` touches the cache;
    /// returns how many drinks were updated.
    pub fn apply_envelope(&mut self, envelope: &Envelope) -> Result<usize, SyncError> {
        if envelope.kind != EnvelopeKind::InventoryUpdate {
            return Ok(0);
        }
        let drinks = envelope
            .data
            .as_ref()
            .and_then(|data| data.get("drinks"))
            .ok_or_else(|| SyncError::MalformedEnvelope("missing data.drinks".into()))?;
        let levels: Vec<StockLevel> =
            serde_json::from_value(drinks.clone()).map_err(|e| SyncError::MalformedEnvelope(e.to_string()))?;
        for level in &levels {
            self.apply_server_update(level);
        }
        Ok(levels.len())
    }

    /// Last inventory the server reported.
    pub fn server_inventory(&self, drink_id: DrinkId) -> Option<i64> {
        self.stock.get(&drink_id).map(|s| s.inventory)
    }

    /// What the user should see: server inventory plus pending deltas.
    pub fn available(&self, drink_id: DrinkId) -> Option<i64> {
        let base = self.server_inventory(drink_id)?;
        let pending: i64 = self.pending.values().filter(|p| p.drink_id == drink_id).map(|p| p.delta).sum();
        Some(base + pending)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn contains(&self, drink_id: DrinkId) -> bool {
        self.stock.contains_key(&drink_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pourline_inventory::ServingKind;
    use proptest::prelude::*;

    fn drink(name: &str, inventory: i64) -> Drink {
        Drink::new(DrinkId::new(), name, "spirits", 900, inventory, ServingKind::Pour).unwrap()
    }

    fn level(d: &Drink, inventory: i64) -> StockLevel {
        StockLevel { drink_id: d.id, name: d.name.clone(), inventory, sales: 0 }
    }

    #[test]
    fn optimistic_delta_shows_immediately_and_rolls_back() {
        let bourbon = drink("Bourbon", 10);
        let mut client = InventorySyncClient::new();
        client.load_catalog(std::slice::from_ref(&bourbon));

        let id = client.add_optimistic(bourbon.id, -3).unwrap();
        assert_eq!(client.available(bourbon.id), Some(7));
        assert_eq!(client.server_inventory(bourbon.id), Some(10));

        assert!(client.rollback(id));
        assert_eq!(client.available(bourbon.id), Some(10));
        assert!(!client.rollback(id));
    }

    #[test]
    fn server_update_overwrites_and_discards_pending_deltas() {
        let bourbon = drink("Bourbon", 10);
        let water = drink("Water", 5);
        let mut client = InventorySyncClient::new();
        client.load_catalog(&[bourbon.clone(), water.clone()]);

        let stale = client.add_optimistic(bourbon.id, -2).unwrap();
        client.add_optimistic(water.id, -1).unwrap();

        client.apply_server_update(&level(&bourbon, 8));

        assert_eq!(client.available(bourbon.id), Some(8));
        assert!(!client.rollback(stale));
        assert_eq!(client.available(water.id), Some(4));
    }

    #[test]
    fn unknown_drinks_cannot_be_adjusted() {
        let mut client = InventorySyncClient::new();
        let id = DrinkId::new();
        assert_eq!(client.add_optimistic(id, -1), Err(SyncError::UnknownDrink(id)));
    }

    #[test]
    fn inventory_envelopes_update_the_cache_and_others_are_ignored() {
        let bourbon = drink("Bourbon", 10);
        let mut client = InventorySyncClient::new();
        client.load_catalog(std::slice::from_ref(&bourbon));

        let update = pourline_events::RealtimeEvent::InventoryUpdate { drinks: vec![level(&bourbon, 6)] }
            .to_envelope(Utc::now())
            .unwrap();
        assert_eq!(client.apply_envelope(&update), Ok(1));
        assert_eq!(client.available(bourbon.id), Some(6));

        let status = Envelope::status("connected", None, Utc::now());
        assert_eq!(client.apply_envelope(&status), Ok(0));
    }

    #[test]
    fn inventory_envelope_without_drinks_is_malformed() {
        let mut client = InventorySyncClient::new();
        let mut env = Envelope::status("connected", None, Utc::now());
        env.kind = EnvelopeKind::InventoryUpdate;
        assert!(matches!(client.apply_envelope(&env), Err(SyncError::MalformedEnvelope(_))));
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 256, .. ProptestConfig::default() })]

        #[test]
        fn rolling_back_everything_restores_server_inventory(
            base in 0i64..1000,
            deltas in proptest::collection::vec(-20i64..20, 0..20),
        ) {
            let bourbon = drink("Bourbon", base);
            let mut client = InventorySyncClient::new();
            client.load_catalog(std::slice::from_ref(&bourbon));

            let ids: Vec<_> = deltas.iter().map(|d| client.add_optimistic(bourbon.id, *d).unwrap()).collect();
            prop_assert_eq!(client.available(bourbon.id), Some(base + deltas.iter().sum::<i64>()));

            for id in ids {
                prop_assert!(client.rollback(id));
            }
            prop_assert_eq!(client.available(bourbon.id), Some(base));
            prop_assert_eq!(client.pending_count(), 0);
        }
    }
}
