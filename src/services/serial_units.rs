//! Registry of individually numbered units.
//!
//! Units move `in_stock -> sold` or `in_stock -> written_off` and never come
//! back. Every transition writes its ledger movement explicitly.

use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::db::for_update;
use crate::entities::serialized_unit::{self, Entity as SerializedUnit, UnitState};
use crate::entities::stock_movement::{MovementReason, ReferenceKind};
use crate::errors::ServiceError;
use crate::services::collaborators::{Actor, Clock};
use crate::services::stock_ledger::{NewMovement, StockLedger};

/// Units to bring into stock.
#[derive(Debug, Clone)]
pub struct NewUnits<'a> {
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub serials: &'a [String],
    pub originating_purchase_id: Option<Uuid>,
    pub reason: MovementReason,
    pub reference: (ReferenceKind, Uuid),
    pub actor: Actor,
}

/// Trims serials and rejects blanks.
pub fn normalize_serials(serials: &[String]) -> Result<Vec<String>, ServiceError> {
    serials
        .iter()
        .map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Err(ServiceError::ValidationError(
                    "serial numbers must not be blank".to_string(),
                ))
            } else {
                Ok(trimmed.to_string())
            }
        })
        .collect()
}

pub fn first_duplicate(serials: &[String]) -> Option<&String> {
    let mut seen = HashSet::new();
    serials.iter().find(|s| !seen.insert(s.as_str()))
}

#[derive(Debug, Clone)]
pub struct SerialRegistry {
    ledger: StockLedger,
    clock: Arc<dyn Clock>,
}

impl SerialRegistry {
    pub fn new(ledger: StockLedger, clock: Arc<dyn Clock>) -> Self {
        Self { ledger, clock }
    }

    /// Creates `in_stock` units and the matching inbound movement.
    /// Serial numbers are unique per product across all states and warehouses.
    pub async fn register<C: ConnectionTrait>(
        &self,
        conn: &C,
        new: NewUnits<'_>,
    ) -> Result<Vec<serialized_unit::Model>, ServiceError> {
        let serials = normalize_serials(new.serials)?;
        if serials.is_empty() {
            return Err(ServiceError::ValidationError(
                "at least one serial number is required".to_string(),
            ));
        }
        if let Some(dup) = first_duplicate(&serials) {
            return Err(ServiceError::DuplicateSerial {
                product_id: new.product_id,
                serial: dup.clone(),
            });
        }
        if let Some(existing) = SerializedUnit::find()
            .filter(serialized_unit::Column::ProductId.eq(new.product_id))
            .filter(serialized_unit::Column::SerialNumber.is_in(serials.clone()))
            .one(conn)
            .await?
        {
            return Err(ServiceError::DuplicateSerial {
                product_id: new.product_id,
                serial: existing.serial_number,
            });
        }

        let (kind, reference_id) = new.reference;
        self.ledger
            .record(
                conn,
                NewMovement::new(
                    new.product_id,
                    new.warehouse_id,
                    serials.len() as i32,
                    new.reason,
                )
                .reference(kind, reference_id)
                .by(new.actor),
            )
            .await?;

        let now = self.clock.now();
        let mut units = Vec::with_capacity(serials.len());
        for serial in serials {
            let unit = serialized_unit::ActiveModel {
                id: Set(Uuid::new_v4()),
                product_id: Set(new.product_id),
                warehouse_id: Set(Some(new.warehouse_id)),
                serial_number: Set(serial),
                state: Set(UnitState::InStock),
                originating_purchase_id: Set(new.originating_purchase_id),
                sale_id: Set(None),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(conn)
            .await?;
            units.push(unit);
        }

        info!(product_id = %new.product_id, count = units.len(), "serialized units registered");
        Ok(units)
    }

    /// Locks and validates a batch of serials for consumption.
    ///
    /// All-or-nothing: every serial must exist for the product, be in the
    /// warehouse (or unscoped) and be `in_stock`. Units come back in request order.
    pub async fn lock_available<C: ConnectionTrait>(
        &self,
        conn: &C,
        product_id: Uuid,
        warehouse_id: Uuid,
        serials: &[String],
    ) -> Result<Vec<serialized_unit::Model>, ServiceError> {
        let serials = normalize_serials(serials)?;
        if let Some(dup) = first_duplicate(&serials) {
            return Err(ServiceError::SerialNotAvailable {
                serial: dup.clone(),
                reason: "listed more than once".to_string(),
            });
        }

        let query = SerializedUnit::find()
            .filter(serialized_unit::Column::ProductId.eq(product_id))
            .filter(serialized_unit::Column::SerialNumber.is_in(serials.clone()))
            .order_by_asc(serialized_unit::Column::Id);
        let mut found: HashMap<String, serialized_unit::Model> = for_update(query, conn)
            .all(conn)
            .await?
            .into_iter()
            .map(|u| (u.serial_number.clone(), u))
            .collect();

        let mut units = Vec::with_capacity(serials.len());
        for serial in serials {
            let unit = found
                .remove(&serial)
                .ok_or_else(|| ServiceError::SerialNotAvailable {
                    serial: serial.clone(),
                    reason: format!("not registered for product {}", product_id),
                })?;
            if !unit.in_warehouse_scope(warehouse_id) {
                return Err(ServiceError::SerialNotAvailable {
                    serial,
                    reason: "held in another warehouse".to_string(),
                });
            }
            if unit.state != UnitState::InStock {
                return Err(ServiceError::SerialNotAvailable {
                    serial,
                    reason: format!("unit is {}", unit.state),
                });
            }
            units.push(unit);
        }
        Ok(units)
    }

    /// Guarded `in_stock -> to` update; fails if the unit already left stock.
    async fn transition<C: ConnectionTrait>(
        &self,
        conn: &C,
        unit: &serialized_unit::Model,
        to: UnitState,
        sale_id: Option<Uuid>,
    ) -> Result<serialized_unit::Model, ServiceError> {
        if unit.state.is_terminal() {
            return Err(ServiceError::SerialNotAvailable {
                serial: unit.serial_number.clone(),
                reason: format!("unit is {}", unit.state),
            });
        }

        let now = self.clock.now();
        let mut update = SerializedUnit::update_many()
            .col_expr(serialized_unit::Column::State, Expr::value(to))
            .col_expr(serialized_unit::Column::UpdatedAt, Expr::value(now))
            .filter(serialized_unit::Column::Id.eq(unit.id))
            .filter(serialized_unit::Column::State.eq(UnitState::InStock));
        if let Some(sale_id) = sale_id {
            update = update.col_expr(serialized_unit::Column::SaleId, Expr::value(sale_id));
        }
        let result = update.exec(conn).await?;
        if result.rows_affected != 1 {
            return Err(ServiceError::SerialNotAvailable {
                serial: unit.serial_number.clone(),
                reason: "unit left stock concurrently".to_string(),
            });
        }

        Ok(serialized_unit::Model {
            state: to,
            sale_id: sale_id.or(unit.sale_id),
            updated_at: now,
            ..unit.clone()
        })
    }

    /// `in_stock -> sold`, one outbound movement per unit.
    pub async fn sell<C: ConnectionTrait>(
        &self,
        conn: &C,
        units: &[serialized_unit::Model],
        warehouse_id: Uuid,
        sale_id: Uuid,
        actor: Actor,
    ) -> Result<Vec<serialized_unit::Model>, ServiceError> {
        let mut sold = Vec::with_capacity(units.len());
        for unit in units {
            self.ledger
                .record(
                    conn,
                    NewMovement::new(unit.product_id, warehouse_id, -1, MovementReason::SerialSold)
                        .reference(ReferenceKind::Sale, sale_id)
                        .notes(format!("serial {}", unit.serial_number))
                        .by(actor),
                )
                .await?;
            sold.push(
                self.transition(conn, unit, UnitState::Sold, Some(sale_id))
                    .await?,
            );
        }
        Ok(sold)
    }

    /// `in_stock -> written_off`, one outbound movement per unit.
    pub async fn write_off<C: ConnectionTrait>(
        &self,
        conn: &C,
        units: &[serialized_unit::Model],
        warehouse_id: Uuid,
        reference: (ReferenceKind, Uuid),
        actor: Actor,
    ) -> Result<Vec<serialized_unit::Model>, ServiceError> {
        let mut written_off = Vec::with_capacity(units.len());
        for unit in units {
            self.ledger
                .record(
                    conn,
                    NewMovement::new(
                        unit.product_id,
                        warehouse_id,
                        -1,
                        MovementReason::SerialWrittenOff,
                    )
                    .reference(reference.0, reference.1)
                    .notes(format!("serial {}", unit.serial_number))
                    .by(actor),
                )
                .await?;
            written_off.push(
                self.transition(conn, unit, UnitState::WrittenOff, None)
                    .await?,
            );
        }
        Ok(written_off)
    }

    /// Every unit received by a purchase, locked.
    pub async fn lock_purchase_units<C: ConnectionTrait>(
        &self,
        conn: &C,
        purchase_id: Uuid,
    ) -> Result<Vec<serialized_unit::Model>, ServiceError> {
        let query = SerializedUnit::find()
            .filter(serialized_unit::Column::OriginatingPurchaseId.eq(purchase_id))
            .order_by_asc(serialized_unit::Column::Id);
        Ok(for_update(query, conn).all(conn).await?)
    }

    /// Hard-deletes still-`in_stock` units of a cancelled purchase and writes
    /// one outbound movement for them.
    pub async fn retire<C: ConnectionTrait>(
        &self,
        conn: &C,
        units: &[serialized_unit::Model],
        product_id: Uuid,
        warehouse_id: Uuid,
        purchase_id: Uuid,
        actor: Actor,
    ) -> Result<u64, ServiceError> {
        if units.is_empty() {
            return Ok(0);
        }
        if let Some(unit) = units.iter().find(|u| u.state != UnitState::InStock) {
            return Err(ServiceError::SerialNotAvailable {
                serial: unit.serial_number.clone(),
                reason: format!("unit is {}", unit.state),
            });
        }

        self.ledger
            .record(
                conn,
                NewMovement::new(
                    product_id,
                    warehouse_id,
                    -(units.len() as i32),
                    MovementReason::PurchaseCancelled,
                )
                .reference(ReferenceKind::Purchase, purchase_id)
                .by(actor),
            )
            .await?;

        let ids: Vec<Uuid> = units.iter().map(|u| u.id).collect();
        let result = SerializedUnit::delete_many()
            .filter(serialized_unit::Column::Id.is_in(ids))
            .filter(serialized_unit::Column::State.eq(UnitState::InStock))
            .exec(conn)
            .await?;
        if result.rows_affected != units.len() as u64 {
            return Err(ServiceError::SerialNotAvailable {
                serial: units[0].serial_number.clone(),
                reason: "purchase units left stock concurrently".to_string(),
            });
        }
        Ok(result.rows_affected)
    }

    pub async fn units_for_product<C: ConnectionTrait>(
        &self,
        conn: &C,
        product_id: Uuid,
    ) -> Result<Vec<serialized_unit::Model>, ServiceError> {
        Ok(SerializedUnit::find()
            .filter(serialized_unit::Column::ProductId.eq(product_id))
            .order_by_asc(serialized_unit::Column::SerialNumber)
            .all(conn)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn normalize_trims_and_rejects_blanks() {
        assert_eq!(
            normalize_serials(&strings(&[" SN1 ", "SN2"])).unwrap(),
            strings(&["SN1", "SN2"])
        );
        assert!(normalize_serials(&strings(&["SN1", "  "])).is_err());
    }

    #[test]
    fn finds_first_repeated_serial() {
        let serials = strings(&["A", "B", "A", "B"]);
        assert_eq!(first_duplicate(&serials).map(String::as_str), Some("A"));
        assert!(first_duplicate(&strings(&["A", "B"])).is_none());
    }
}
