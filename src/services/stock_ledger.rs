//! Per (product, warehouse) on-hand counters and the append-only movement ledger.

use sea_orm::{
    sea_query::OnConflict, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::db::for_update;
use crate::entities::inventory_balance::{self, Entity as InventoryBalance};
use crate::entities::stock_movement::{
    self, Entity as StockMovement, MovementReason, ReferenceKind,
};
use crate::errors::ServiceError;
use crate::services::collaborators::{Actor, Clock};

/// Snapshot of one stock record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub on_hand: i32,
    pub reserved: i32,
    pub available: i32,
}

impl From<&inventory_balance::Model> for StockLevel {
    fn from(b: &inventory_balance::Model) -> Self {
        Self {
            product_id: b.product_id,
            warehouse_id: b.warehouse_id,
            on_hand: b.on_hand,
            reserved: b.reserved,
            available: b.available(),
        }
    }
}

/// A ledger entry to append. Positive quantities add stock.
#[derive(Debug, Clone)]
pub struct NewMovement {
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub quantity: i32,
    pub reason: MovementReason,
    pub reference: Option<(ReferenceKind, Uuid)>,
    pub is_reconciliation: bool,
    pub notes: Option<String>,
    pub actor: Actor,
}

impl NewMovement {
    pub fn new(
        product_id: Uuid,
        warehouse_id: Uuid,
        quantity: i32,
        reason: MovementReason,
    ) -> Self {
        Self {
            product_id,
            warehouse_id,
            quantity,
            reason,
            reference: None,
            is_reconciliation: false,
            notes: None,
            actor: Actor::system(),
        }
    }

    pub fn reference(mut self, kind: ReferenceKind, id: Uuid) -> Self {
        self.reference = Some((kind, id));
        self
    }

    pub fn reconciliation(mut self) -> Self {
        self.is_reconciliation = true;
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn by(mut self, actor: Actor) -> Self {
        self.actor = actor;
        self
    }
}

#[derive(Debug, Clone)]
pub struct StockLedger {
    clock: Arc<dyn Clock>,
}

impl StockLedger {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    async fn select_locked<C: ConnectionTrait>(
        conn: &C,
        product_id: Uuid,
        warehouse_id: Uuid,
    ) -> Result<Option<inventory_balance::Model>, ServiceError> {
        let query = InventoryBalance::find()
            .filter(inventory_balance::Column::ProductId.eq(product_id))
            .filter(inventory_balance::Column::WarehouseId.eq(warehouse_id));
        Ok(for_update(query, conn).one(conn).await?)
    }

    /// Locks the stock record for the rest of the transaction, creating an
    /// empty one first if the pair has never been stocked.
    pub async fn lock_balance<C: ConnectionTrait>(
        &self,
        conn: &C,
        product_id: Uuid,
        warehouse_id: Uuid,
    ) -> Result<inventory_balance::Model, ServiceError> {
        if let Some(balance) = Self::select_locked(conn, product_id, warehouse_id).await? {
            return Ok(balance);
        }

        let empty = inventory_balance::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            warehouse_id: Set(warehouse_id),
            on_hand: Set(0),
            reserved: Set(0),
            version: Set(1),
            updated_at: Set(self.clock.now()),
        };
        InventoryBalance::insert(empty)
            .on_conflict(
                OnConflict::columns([
                    inventory_balance::Column::ProductId,
                    inventory_balance::Column::WarehouseId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(conn)
            .await?;

        Self::select_locked(conn, product_id, warehouse_id)
            .await?
            .ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "stock record for product {} in warehouse {} vanished after insert",
                    product_id, warehouse_id
                ))
            })
    }

    /// Locks every record in ascending (product, warehouse) order.
    pub async fn lock_in_order<C: ConnectionTrait>(
        &self,
        conn: &C,
        keys: &[(Uuid, Uuid)],
    ) -> Result<BTreeMap<(Uuid, Uuid), inventory_balance::Model>, ServiceError> {
        let ordered: BTreeSet<(Uuid, Uuid)> = keys.iter().copied().collect();
        let mut locked = BTreeMap::new();
        for (product_id, warehouse_id) in ordered {
            let balance = self.lock_balance(conn, product_id, warehouse_id).await?;
            locked.insert((product_id, warehouse_id), balance);
        }
        debug!(records = locked.len(), "stock records locked");
        Ok(locked)
    }

    /// Unlocked read; a pair with no record reads as zero.
    pub async fn level<C: ConnectionTrait>(
        &self,
        conn: &C,
        product_id: Uuid,
        warehouse_id: Uuid,
    ) -> Result<StockLevel, ServiceError> {
        let balance = InventoryBalance::find()
            .filter(inventory_balance::Column::ProductId.eq(product_id))
            .filter(inventory_balance::Column::WarehouseId.eq(warehouse_id))
            .one(conn)
            .await?;
        Ok(balance.as_ref().map(StockLevel::from).unwrap_or(StockLevel {
            product_id,
            warehouse_id,
            on_hand: 0,
            reserved: 0,
            available: 0,
        }))
    }

    pub(crate) async fn write_counters<C: ConnectionTrait>(
        &self,
        conn: &C,
        balance: inventory_balance::Model,
        on_hand: i32,
        reserved: i32,
    ) -> Result<inventory_balance::Model, ServiceError> {
        let version = balance.version;
        let mut active: inventory_balance::ActiveModel = balance.into();
        active.on_hand = Set(on_hand);
        active.reserved = Set(reserved);
        active.version = Set(version + 1);
        active.updated_at = Set(self.clock.now());
        Ok(active.update(conn).await?)
    }

    /// Applies a movement to on-hand and appends it to the ledger.
    ///
    /// Outbound movements may only draw on unreserved stock: after the write
    /// `on_hand - reserved` is still non-negative or the call fails with
    /// `InsufficientStock` and nothing is written.
    pub async fn record<C: ConnectionTrait>(
        &self,
        conn: &C,
        movement: NewMovement,
    ) -> Result<stock_movement::Model, ServiceError> {
        if movement.quantity == 0 {
            return Err(ServiceError::ValidationError(
                "stock movement quantity must be non-zero".to_string(),
            ));
        }

        let balance = self
            .lock_balance(conn, movement.product_id, movement.warehouse_id)
            .await?;
        let on_hand = balance.on_hand.checked_add(movement.quantity).ok_or_else(|| {
            ServiceError::ValidationError(format!(
                "stock of product {} would exceed {} units",
                movement.product_id,
                i32::MAX
            ))
        })?;
        if movement.quantity < 0 && on_hand - balance.reserved < 0 {
            return Err(ServiceError::InsufficientStock {
                product_id: movement.product_id,
                warehouse_id: movement.warehouse_id,
                available: balance.available(),
                requested: movement.quantity.saturating_neg(),
            });
        }
        let reserved = balance.reserved;
        self.write_counters(conn, balance, on_hand, reserved).await?;

        let (reference_kind, reference_id) = match movement.reference {
            Some((kind, id)) => (Some(kind), Some(id)),
            None => (None, None),
        };
        let row = stock_movement::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(movement.product_id),
            warehouse_id: Set(movement.warehouse_id),
            quantity: Set(movement.quantity),
            reason: Set(movement.reason),
            reference_kind: Set(reference_kind),
            reference_id: Set(reference_id),
            is_reconciliation: Set(movement.is_reconciliation),
            notes: Set(movement.notes),
            created_by: Set(movement.actor.id()),
            created_at: Set(self.clock.now()),
        };
        Ok(row.insert(conn).await?)
    }

    pub async fn movements<C: ConnectionTrait>(
        &self,
        conn: &C,
        product_id: Uuid,
        warehouse_id: Uuid,
    ) -> Result<Vec<stock_movement::Model>, ServiceError> {
        Ok(StockMovement::find()
            .filter(stock_movement::Column::ProductId.eq(product_id))
            .filter(stock_movement::Column::WarehouseId.eq(warehouse_id))
            .order_by_asc(stock_movement::Column::CreatedAt)
            .all(conn)
            .await?)
    }

    /// Ledger rows written on behalf of one document.
    pub async fn movements_for<C: ConnectionTrait>(
        &self,
        conn: &C,
        kind: ReferenceKind,
        id: Uuid,
    ) -> Result<Vec<stock_movement::Model>, ServiceError> {
        Ok(StockMovement::find()
            .filter(stock_movement::Column::ReferenceKind.eq(kind))
            .filter(stock_movement::Column::ReferenceId.eq(id))
            .order_by_asc(stock_movement::Column::CreatedAt)
            .all(conn)
            .await?)
    }
}
