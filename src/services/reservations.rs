//! Reserved quantities layered over the stock ledger.
//!
//! `available = on_hand - reserved` and every operation here keeps it
//! non-negative. All three operations lock the stock record first.

use sea_orm::ConnectionTrait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::inventory_balance;
use crate::entities::stock_movement::{MovementReason, ReferenceKind};
use crate::errors::ServiceError;
use crate::services::collaborators::Actor;
use crate::services::stock_ledger::{NewMovement, StockLedger};

/// How a consumed quantity was covered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumeSplit {
    pub from_reserved: i32,
    pub remainder: i32,
}

impl ConsumeSplit {
    pub fn compute(reserved: i32, quantity: i32) -> Self {
        let from_reserved = reserved.max(0).min(quantity);
        Self {
            from_reserved,
            remainder: quantity - from_reserved,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReservationTracker {
    ledger: StockLedger,
}

fn ensure_positive(quantity: i32, operation: &str) -> Result<(), ServiceError> {
    if quantity <= 0 {
        return Err(ServiceError::ValidationError(format!(
            "{} quantity must be positive, got {}",
            operation, quantity
        )));
    }
    Ok(())
}

impl ReservationTracker {
    pub fn new(ledger: StockLedger) -> Self {
        Self { ledger }
    }

    /// Earmarks `quantity` units, failing with `InsufficientStock` when fewer are available.
    pub async fn reserve<C: ConnectionTrait>(
        &self,
        conn: &C,
        product_id: Uuid,
        warehouse_id: Uuid,
        quantity: i32,
    ) -> Result<inventory_balance::Model, ServiceError> {
        ensure_positive(quantity, "reservation")?;
        let balance = self
            .ledger
            .lock_balance(conn, product_id, warehouse_id)
            .await?;

        let available = balance.available();
        if available < quantity {
            return Err(ServiceError::InsufficientStock {
                product_id,
                warehouse_id,
                available,
                requested: quantity,
            });
        }

        let (on_hand, reserved) = (balance.on_hand, balance.reserved + quantity);
        info!(product_id = %product_id, warehouse_id = %warehouse_id, quantity, reserved, "stock reserved");
        self.ledger
            .write_counters(conn, balance, on_hand, reserved)
            .await
    }

    /// Returns up to `quantity` reserved units to available stock.
    /// Never drives `reserved` below zero; returns how many were actually released.
    pub async fn release<C: ConnectionTrait>(
        &self,
        conn: &C,
        product_id: Uuid,
        warehouse_id: Uuid,
        quantity: i32,
    ) -> Result<i32, ServiceError> {
        ensure_positive(quantity, "release")?;
        let balance = self
            .ledger
            .lock_balance(conn, product_id, warehouse_id)
            .await?;

        let released = balance.reserved.max(0).min(quantity);
        if released < quantity {
            warn!(
                product_id = %product_id,
                warehouse_id = %warehouse_id,
                requested = quantity,
                reserved = balance.reserved,
                "release exceeds reserved quantity, clamping"
            );
        }

        let (on_hand, reserved) = (balance.on_hand, balance.reserved - released);
        self.ledger
            .write_counters(conn, balance, on_hand, reserved)
            .await?;
        Ok(released)
    }

    /// Takes `quantity` out of the reservation without touching on-hand.
    ///
    /// Used when the on-hand side of a sale is written elsewhere (serialized
    /// units). The uncovered remainder must fit in currently available stock.
    pub async fn settle<C: ConnectionTrait>(
        &self,
        conn: &C,
        product_id: Uuid,
        warehouse_id: Uuid,
        quantity: i32,
    ) -> Result<ConsumeSplit, ServiceError> {
        ensure_positive(quantity, "consumption")?;
        let balance = self
            .ledger
            .lock_balance(conn, product_id, warehouse_id)
            .await?;

        let split = ConsumeSplit::compute(balance.reserved, quantity);
        let available = balance.available();
        if split.remainder > available {
            return Err(ServiceError::InsufficientStock {
                product_id,
                warehouse_id,
                available,
                requested: split.remainder,
            });
        }
        if split.remainder > 0 {
            warn!(
                product_id = %product_id,
                warehouse_id = %warehouse_id,
                remainder = split.remainder,
                "consuming beyond reserved quantity"
            );
        }

        let (on_hand, reserved) = (balance.on_hand, balance.reserved - split.from_reserved);
        self.ledger
            .write_counters(conn, balance, on_hand, reserved)
            .await?;
        Ok(split)
    }

    /// Ships `quantity` units: the reserved part leaves the reservation and
    /// on-hand, the remainder leaves on-hand directly.
    pub async fn consume<C: ConnectionTrait>(
        &self,
        conn: &C,
        product_id: Uuid,
        warehouse_id: Uuid,
        quantity: i32,
        sale_id: Uuid,
        actor: Actor,
    ) -> Result<ConsumeSplit, ServiceError> {
        let split = self
            .settle(conn, product_id, warehouse_id, quantity)
            .await?;

        if split.from_reserved > 0 {
            self.ledger
                .record(
                    conn,
                    NewMovement::new(
                        product_id,
                        warehouse_id,
                        -split.from_reserved,
                        MovementReason::SaleReserved,
                    )
                    .reference(ReferenceKind::Sale, sale_id)
                    .by(actor),
                )
                .await?;
        }
        if split.remainder > 0 {
            self.ledger
                .record(
                    conn,
                    NewMovement::new(
                        product_id,
                        warehouse_id,
                        -split.remainder,
                        MovementReason::SaleUnreserved,
                    )
                    .reference(ReferenceKind::Sale, sale_id)
                    .by(actor),
                )
                .await?;
        }
        Ok(split)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn split_prefers_reserved_stock() {
        assert_eq!(
            ConsumeSplit::compute(5, 3),
            ConsumeSplit {
                from_reserved: 3,
                remainder: 0
            }
        );
        assert_eq!(
            ConsumeSplit::compute(2, 5),
            ConsumeSplit {
                from_reserved: 2,
                remainder: 3
            }
        );
        assert_eq!(
            ConsumeSplit::compute(0, 4),
            ConsumeSplit {
                from_reserved: 0,
                remainder: 4
            }
        );
    }

    #[test]
    fn split_ignores_drifted_negative_reservation() {
        assert_eq!(ConsumeSplit::compute(-3, 2).from_reserved, 0);
    }

    proptest! {
        #[test]
        fn split_always_covers_the_quantity(reserved in 0i32..1_000, quantity in 1i32..1_000) {
            let split = ConsumeSplit::compute(reserved, quantity);
            prop_assert_eq!(split.from_reserved + split.remainder, quantity);
            prop_assert!(split.from_reserved <= reserved);
            prop_assert!(split.remainder >= 0);
        }
    }
}
