//! Manual pour tracking from a specific bottle.

use chrono::Utc;
use rust_decimal::Decimal;
use thiserror::Error;

use pourline_core::ConnectionId;
use pourline_events::{Broadcaster, RealtimeEvent};
use pourline_inventory::{PourInventory, PourTransaction};

use crate::store::{InventoryStore, PourOutcome, PourRefusal, PourRequest, StoreError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PourTrackingError {
    #[error("invalid pour size")]
    InvalidPourSize,

    #[error("unknown bottle")]
    UnknownBottle,

    #[error("bottle is not active")]
    BottleInactive,

    #[error("insufficient remaining volume: requested {requested} oz, remaining {remaining} oz")]
    InsufficientVolume { requested: Decimal, remaining: Decimal },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<PourRefusal> for PourTrackingError {
    fn from(value: PourRefusal) -> Self {
        match value {
            PourRefusal::UnknownPourSize => Self::InvalidPourSize,
            PourRefusal::UnknownBottle => Self::UnknownBottle,
            PourRefusal::BottleInactive => Self::BottleInactive,
            PourRefusal::InsufficientVolume { requested, remaining } => {
                Self::InsufficientVolume { requested, remaining }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedPour {
    pub transaction: PourTransaction,
    pub bottle: PourInventory,
}

pub struct PourTrackingService<S, B> {
    store: S,
    broadcaster: B,
}

impl<S, B> PourTrackingService<S, B>
where
    S: InventoryStore,
    B: Broadcaster,
{
    pub fn new(store: S, broadcaster: B) -> Self {
        Self { store, broadcaster }
    }

    pub async fn track(
        &self,
        request: PourRequest,
        origin: Option<ConnectionId>,
    ) -> Result<TrackedPour, PourTrackingError> {
        let (transaction, bottle) = match self.store.record_pour(request, Utc::now()).await? {
            PourOutcome::Recorded { transaction, bottle } => (transaction, bottle),
            PourOutcome::Refused(refusal) => {
                tracing::info!(bottle = %request.pour_inventory_id, ?refusal, "pour refused");
                return Err(refusal.into());
            }
        };

        tracing::info!(
            bottle = %bottle.id,
            volume_oz = %transaction.volume_oz,
            remaining_oz = %bottle.remaining_volume,
            active = bottle.active,
            "pour recorded"
        );

        let report = self
            .broadcaster
            .broadcast(&RealtimeEvent::PourUpdate { transactions: vec![transaction.clone()] }, origin);
        if report.failed > 0 {
            tracing::warn!(failed = report.failed, "broadcast delivery failure");
        }

        Ok(TrackedPour { transaction, bottle })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use pourline_core::{PourSizeId, StaffId};
    use pourline_events::RecordingBroadcaster;

    use crate::seed::demo_catalog;
    use crate::store::InMemoryInventoryStore;

    fn oz(tenths: i64) -> Decimal {
        Decimal::new(tenths, 1)
    }

    #[tokio::test]
    async fn double_pour_decrements_bottle_and_broadcasts() {
        let seed = demo_catalog().unwrap();
        let store = Arc::new(InMemoryInventoryStore::new());
        seed.load_into(&store).unwrap();
        let broadcaster = Arc::new(RecordingBroadcaster::new());
        let service = PourTrackingService::new(store.clone(), broadcaster.clone());

        let bourbon = seed.drink_named("Bourbon").unwrap();
        let bottle = seed.bottles.iter().find(|b| b.drink_id == bourbon.id).unwrap();
        let double = seed.pour_size_named("double").unwrap();
        let staff = StaffId::new();

        let tracked = service
            .track(
                PourRequest { pour_inventory_id: bottle.id, pour_size_id: double.id, staff_id: Some(staff) },
                None,
            )
            .await
            .unwrap();

        assert_eq!(tracked.bottle.remaining_volume, oz(224));
        assert_eq!(tracked.transaction.staff_id, Some(staff));
        // 900 * (3.0 / 1.5) * 8.25% = 148.5 -> 149
        assert_eq!(tracked.transaction.tax_amount, Decimal::from(149));
        assert_eq!(store.ledger().unwrap().len(), 1);
        assert_eq!(broadcaster.broadcasts().len(), 1);
    }

    #[tokio::test]
    async fn unknown_pour_size_is_refused() {
        let seed = demo_catalog().unwrap();
        let store = Arc::new(InMemoryInventoryStore::new());
        seed.load_into(&store).unwrap();
        let service = PourTrackingService::new(store.clone(), Arc::new(RecordingBroadcaster::new()));

        let err = service
            .track(
                PourRequest { pour_inventory_id: seed.bottles[0].id, pour_size_id: PourSizeId::new(), staff_id: None },
                None,
            )
            .await
            .unwrap_err();
        assert_eq!(err, PourTrackingError::InvalidPourSize);
        assert!(store.ledger().unwrap().is_empty());
    }

    #[tokio::test]
    async fn short_bottle_is_refused_and_left_untouched() {
        let mut seed = demo_catalog().unwrap();
        seed.bottles[0].remaining_volume = oz(10);
        let store = Arc::new(InMemoryInventoryStore::new());
        seed.load_into(&store).unwrap();
        let broadcaster = Arc::new(RecordingBroadcaster::new());
        let service = PourTrackingService::new(store.clone(), broadcaster.clone());
        let single = seed.pour_size_named("single").unwrap();

        let err = service
            .track(
                PourRequest { pour_inventory_id: seed.bottles[0].id, pour_size_id: single.id, staff_id: None },
                None,
            )
            .await
            .unwrap_err();

        assert_eq!(err, PourTrackingError::InsufficientVolume { requested: oz(15), remaining: oz(10) });
        assert_eq!(store.bottles().unwrap()[0].remaining_volume, oz(10));
        assert!(store.ledger().unwrap().is_empty());
        assert!(broadcaster.broadcasts().is_empty());
    }
}
