//! Manual stock adjustments and stock queries.

use sea_orm::{ConnectionTrait, TransactionTrait};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::entities::product::{self, Entity as Product};
use crate::entities::serialized_unit;
use crate::entities::stock_movement::{self, MovementReason, ReferenceKind};
use crate::errors::ServiceError;
use crate::events::Event;
use crate::metrics::{SERIAL_TRANSITIONS, STOCK_REJECTIONS};
use crate::services::collaborators::Actor;
use crate::services::serial_units::NewUnits;
use crate::services::stock_ledger::{NewMovement, StockLevel};
use crate::services::{find_by_id, ServiceContext};

const MAX_ADJUSTMENT: u32 = 1_000_000;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AdjustInventoryRequest {
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    /// Signed change to on-hand
    pub delta: i32,
    #[validate(length(min = 1, max = 500, message = "reason must be 1-500 characters"))]
    pub reason: String,
    /// Required for serialized products, one per unit of `delta`
    #[serde(default)]
    pub serials: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustmentResult {
    pub adjustment_id: Uuid,
    pub level: StockLevel,
    pub serial_units: Vec<serialized_unit::Model>,
}

#[derive(Debug, Clone)]
pub struct InventoryService {
    ctx: ServiceContext,
}

impl InventoryService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Adds or removes stock outside any document. Serialized products are
    /// adjusted unit by unit: increments register the given serials,
    /// decrements write them off.
    #[instrument(skip(self, request), fields(product_id = %request.product_id, warehouse_id = %request.warehouse_id, delta = request.delta))]
    pub async fn adjust(
        &self,
        request: AdjustInventoryRequest,
        actor: Actor,
    ) -> Result<AdjustmentResult, ServiceError> {
        request.validate()?;
        if request.delta == 0 || request.delta.unsigned_abs() > MAX_ADJUSTMENT {
            return Err(ServiceError::ValidationError(format!(
                "adjustment delta must be non-zero and at most {} units either way",
                MAX_ADJUSTMENT
            )));
        }
        let adjustment_id = Uuid::new_v4();
        let (product_id, warehouse_id) = (request.product_id, request.warehouse_id);

        let txn = self.ctx.db_pool.begin().await?;
        let product = find_by_id::<Product, _>(&txn, product_id, "Product").await?;
        if product.is_kit {
            return Err(ServiceError::ValidationError(format!(
                "kit {} has no stock of its own, adjust its components",
                product.sku
            )));
        }

        let ledger = self.ctx.ledger();
        ledger.lock_balance(&txn, product_id, warehouse_id).await?;

        let serial_units = match self
            .apply(&txn, &product, &request, adjustment_id, actor)
            .await
        {
            Ok(units) => units,
            Err(e) => {
                if matches!(e, ServiceError::InsufficientStock { .. }) {
                    STOCK_REJECTIONS
                        .with_label_values(&["adjust_inventory"])
                        .inc();
                }
                return Err(e);
            }
        };

        let level = ledger.level(&txn, product_id, warehouse_id).await?;
        txn.commit().await?;

        if product.is_serialized && request.delta < 0 {
            SERIAL_TRANSITIONS
                .with_label_values(&["written_off"])
                .inc_by(serial_units.len() as u64);
        }
        info!(
            product_id = %product_id,
            warehouse_id = %warehouse_id,
            delta = request.delta,
            on_hand = level.on_hand,
            available = level.available,
            "inventory adjusted"
        );
        self.ctx
            .event_sender
            .publish(Event::InventoryAdjusted {
                product_id,
                warehouse_id,
                delta: request.delta,
                reason: request.reason,
            })
            .await;

        Ok(AdjustmentResult {
            adjustment_id,
            level,
            serial_units,
        })
    }

    /// Writes the stock effect of an adjustment; returns the serial units touched.
    async fn apply<C: ConnectionTrait>(
        &self,
        conn: &C,
        product: &product::Model,
        request: &AdjustInventoryRequest,
        adjustment_id: Uuid,
        actor: Actor,
    ) -> Result<Vec<serialized_unit::Model>, ServiceError> {
        let (product_id, warehouse_id) = (request.product_id, request.warehouse_id);
        let quantity = request.delta.abs();

        if !product.is_serialized {
            if !request.serials.is_empty() {
                return Err(ServiceError::ValidationError(format!(
                    "product {} is not serialized but serial numbers were supplied",
                    product.sku
                )));
            }
            let reason = if request.delta > 0 {
                MovementReason::AdjustmentIncrease
            } else {
                MovementReason::AdjustmentDecrease
            };
            self.ctx
                .ledger()
                .record(
                    conn,
                    NewMovement::new(product_id, warehouse_id, request.delta, reason)
                        .reference(ReferenceKind::Adjustment, adjustment_id)
                        .notes(request.reason.clone())
                        .by(actor),
                )
                .await?;
            return Ok(Vec::new());
        }

        if request.serials.len() as i32 != quantity {
            return Err(ServiceError::MissingSerials {
                line_id: adjustment_id,
                expected: quantity,
                supplied: request.serials.len() as i32,
            });
        }
        let registry = self.ctx.serials();
        if request.delta > 0 {
            return registry
                .register(
                    conn,
                    NewUnits {
                        product_id,
                        warehouse_id,
                        serials: &request.serials,
                        originating_purchase_id: None,
                        reason: MovementReason::AdjustmentIncrease,
                        reference: (ReferenceKind::Adjustment, adjustment_id),
                        actor,
                    },
                )
                .await;
        }
        let units = registry
            .lock_available(conn, product_id, warehouse_id, &request.serials)
            .await?;
        registry
            .write_off(
                conn,
                &units,
                warehouse_id,
                (ReferenceKind::Adjustment, adjustment_id),
                actor,
            )
            .await
    }

    pub async fn stock_level(
        &self,
        product_id: Uuid,
        warehouse_id: Uuid,
    ) -> Result<StockLevel, ServiceError> {
        self.ctx
            .ledger()
            .level(self.ctx.db_pool.as_ref(), product_id, warehouse_id)
            .await
    }

    pub async fn movements(
        &self,
        product_id: Uuid,
        warehouse_id: Uuid,
    ) -> Result<Vec<stock_movement::Model>, ServiceError> {
        self.ctx
            .ledger()
            .movements(self.ctx.db_pool.as_ref(), product_id, warehouse_id)
            .await
    }

    pub async fn serial_units(
        &self,
        product_id: Uuid,
    ) -> Result<Vec<serialized_unit::Model>, ServiceError> {
        self.ctx
            .serials()
            .units_for_product(self.ctx.db_pool.as_ref(), product_id)
            .await
    }
}
