//! Bottle-level pour inventory.
//!
//! A bottle's remaining volume only ever goes down while it is active, and the
//! bottle retires itself once it is empty.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use pourline_core::{DomainError, DrinkId, PourInventoryId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PourInventory {
    pub id: PourInventoryId,
    pub drink_id: DrinkId,
    /// Physical label on the bottle (barcode, stock number).
    pub bottle_id: String,
    pub initial_volume: Decimal,
    pub remaining_volume: Decimal,
    pub active: bool,
}

impl PourInventory {
    /// Open a new, full bottle.
    pub fn open(
        id: PourInventoryId,
        drink_id: DrinkId,
        bottle_id: impl Into<String>,
        volume: Decimal,
    ) -> Result<Self, DomainError> {
        if volume <= Decimal::ZERO {
            return Err(DomainError::validation("bottle volume must be positive"));
        }
        Ok(Self {
            id,
            drink_id,
            bottle_id: bottle_id.into(),
            initial_volume: volume,
            remaining_volume: volume,
            active: true,
        })
    }

    /// Pour an exact volume. Fails without changing the bottle when it is
    /// retired or holds less than `volume`.
    pub fn pour(&mut self, volume: Decimal) -> Result<(), DomainError> {
        if volume <= Decimal::ZERO {
            return Err(DomainError::validation("pour volume must be positive"));
        }
        if !self.active {
            return Err(DomainError::conflict("bottle is not active"));
        }
        if self.remaining_volume < volume {
            return Err(DomainError::invariant(format!(
                "insufficient remaining volume: requested {volume}, remaining {}",
                self.remaining_volume
            )));
        }
        self.remaining_volume -= volume;
        if self.remaining_volume.is_zero() {
            self.active = false;
        }
        Ok(())
    }

    /// Draw up to `volume` for a sale that has already been committed.
    ///
    /// Returns the volume actually taken from this bottle.
    pub fn draw(&mut self, volume: Decimal) -> Decimal {
        if !self.active || volume <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let taken = volume.min(self.remaining_volume);
        self.remaining_volume -= taken;
        if self.remaining_volume.is_zero() {
            self.active = false;
        }
        taken
    }

    pub fn retire(&mut self) {
        self.active = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn oz(tenths: i64) -> Decimal {
        Decimal::new(tenths, 1)
    }

    fn test_bottle(volume: Decimal) -> PourInventory {
        PourInventory::open(PourInventoryId::new(), DrinkId::new(), "B-001", volume).unwrap()
    }

    #[test]
    fn pour_deactivates_an_emptied_bottle() {
        let mut bottle = test_bottle(oz(30));
        bottle.pour(oz(15)).unwrap();
        assert!(bottle.active);
        bottle.pour(oz(15)).unwrap();
        assert_eq!(bottle.remaining_volume, Decimal::ZERO);
        assert!(!bottle.active);
    }

    #[test]
    fn pour_rejects_more_than_remaining() {
        let mut bottle = test_bottle(oz(10));
        let err = bottle.pour(oz(15)).unwrap_err();
        match err {
            DomainError::InvariantViolation(msg) if msg.contains("insufficient remaining volume") => {}
            _ => panic!("Expected InvariantViolation, got {:?}", err),
        }
        assert_eq!(bottle.remaining_volume, oz(10));
    }

    #[test]
    fn pour_rejects_retired_bottle() {
        let mut bottle = test_bottle(oz(250));
        bottle.retire();
        assert!(matches!(bottle.pour(oz(15)), Err(DomainError::Conflict(_))));
    }

    #[test]
    fn draw_saturates_at_empty() {
        let mut bottle = test_bottle(oz(10));
        assert_eq!(bottle.draw(oz(15)), oz(10));
        assert!(!bottle.active);
        assert_eq!(bottle.draw(oz(15)), Decimal::ZERO);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            .. ProptestConfig::default()
        })]

        #[test]
        fn prop_remaining_volume_never_increases_or_goes_negative(
            draws in proptest::collection::vec(0i64..60, 0..40)
        ) {
            let mut bottle = test_bottle(oz(254));
            let mut previous = bottle.remaining_volume;
            for d in draws {
                let _ = bottle.draw(oz(d));
                prop_assert!(bottle.remaining_volume <= previous);
                prop_assert!(bottle.remaining_volume >= Decimal::ZERO);
                prop_assert_eq!(bottle.active, !bottle.remaining_volume.is_zero());
                previous = bottle.remaining_volume;
            }
        }
    }
}
