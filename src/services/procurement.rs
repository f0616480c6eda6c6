//! Purchase orders, including the ones raised automatically from order shortfalls.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::db::{document_number, for_update};
use crate::entities::order;
use crate::entities::purchase_order::{self, Entity as PurchaseOrder, PurchaseOrderStatus};
use crate::entities::purchase_order_item::{self, Entity as PurchaseOrderItem};
use crate::errors::ServiceError;
use crate::services::collaborators::PricedLine;
use crate::services::finance::append_note;
use crate::services::kits::{total_by_product, KitExpander, StockLine};
use crate::services::shortfall::{ProductSupply, SupplierBatch};
use crate::services::state_machine::{PurchaseOrderAction, Transition};
use crate::services::{find_by_id, lock_by_id, ServiceContext};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseOrderDetail {
    pub purchase_order: purchase_order::Model,
    pub items: Vec<purchase_order_item::Model>,
}

#[derive(Debug, Clone)]
pub struct PurchaseOrderService {
    ctx: ServiceContext,
}

impl PurchaseOrderService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Computes the order's shortfall and persists one `pending` purchase
    /// order per supplier. Availability is read without locks; the result
    /// is advisory and never fails the order for lack of stock.
    #[instrument(skip(self, conn, lines), fields(order_id = %order.id))]
    pub(crate) async fn raise_for_shortfall<C: ConnectionTrait>(
        &self,
        conn: &C,
        order: &order::Model,
        lines: &[StockLine],
    ) -> Result<Vec<PurchaseOrderDetail>, ServiceError> {
        let demand = KitExpander::new().resolve_lines(conn, lines).await?;
        let needed = total_by_product(&demand)?;

        let ledger = self.ctx.ledger();
        let mut available = HashMap::new();
        let mut supply = HashMap::new();
        for d in &demand {
            if available.contains_key(&d.product.id) {
                continue;
            }
            let level = ledger.level(conn, d.product.id, order.warehouse_id).await?;
            available.insert(d.product.id, level.available);
            supply.insert(
                d.product.id,
                ProductSupply {
                    default_supplier_id: d.product.default_supplier_id,
                    last_purchase_cost: d.product.last_purchase_cost,
                },
            );
        }

        let batches = self.ctx.shortfall().consolidate(&needed, &available, &supply);
        let mut created = Vec::with_capacity(batches.len());
        for batch in batches {
            created.push(self.insert_batch(conn, order, batch).await?);
        }
        if !created.is_empty() {
            info!(order_id = %order.id, purchase_orders = created.len(), "shortfall purchase orders generated");
        }
        Ok(created)
    }

    async fn insert_batch<C: ConnectionTrait>(
        &self,
        conn: &C,
        order: &order::Model,
        batch: SupplierBatch,
    ) -> Result<PurchaseOrderDetail, ServiceError> {
        let now = self.ctx.clock.now();
        let id = Uuid::new_v4();
        let priced: Vec<PricedLine> = batch
            .lines
            .iter()
            .map(|l| PricedLine {
                quantity: l.quantity,
                unit_price: l.unit_cost,
            })
            .collect();
        let amounts = self.ctx.pricing.totals(&priced);

        let purchase_order = purchase_order::ActiveModel {
            id: Set(id),
            po_number: Set(document_number("PO", id)),
            supplier_id: Set(batch.supplier_id),
            order_id: Set(Some(order.id)),
            warehouse_id: Set(order.warehouse_id),
            status: Set(PurchaseOrderStatus::Pending),
            notes: Set(Some(format!(
                "Generated automatically from stock shortfall on order {}",
                order.order_number
            ))),
            subtotal: Set(amounts.subtotal),
            tax: Set(amounts.tax),
            total: Set(amounts.total),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(conn)
        .await?;

        let mut items = Vec::with_capacity(batch.lines.len());
        for line in batch.lines {
            items.push(
                purchase_order_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    purchase_order_id: Set(id),
                    product_id: Set(line.product_id),
                    quantity: Set(line.quantity),
                    unit_cost: Set(line.unit_cost),
                }
                .insert(conn)
                .await?,
            );
        }
        Ok(PurchaseOrderDetail {
            purchase_order,
            items,
        })
    }

    /// Cancels the order's purchase orders that were not sent yet. Returns their ids.
    pub(crate) async fn cancel_pending_for_order<C: ConnectionTrait>(
        &self,
        conn: &C,
        order: &order::Model,
        note: &str,
    ) -> Result<Vec<Uuid>, ServiceError> {
        let query = PurchaseOrder::find()
            .filter(purchase_order::Column::OrderId.eq(order.id))
            .filter(purchase_order::Column::Status.eq(PurchaseOrderStatus::Pending))
            .order_by_asc(purchase_order::Column::Id);
        let pending = for_update(query, conn).all(conn).await?;

        let mut cancelled = Vec::with_capacity(pending.len());
        for po in pending {
            let id = po.id;
            self.move_to(conn, po, PurchaseOrderAction::Cancel, Some(note))
                .await?;
            cancelled.push(id);
        }
        Ok(cancelled)
    }

    /// Applies a transition and appends an optional note.
    pub(crate) async fn move_to<C: ConnectionTrait>(
        &self,
        conn: &C,
        po: purchase_order::Model,
        action: PurchaseOrderAction,
        note: Option<&str>,
    ) -> Result<purchase_order::Model, ServiceError> {
        let status = action.apply(po.id, po.status)?;
        let notes = match note {
            Some(note) => Some(append_note(po.notes.as_deref(), note)),
            None => po.notes.clone(),
        };
        let mut active: purchase_order::ActiveModel = po.into();
        active.status = Set(status);
        active.notes = Set(notes);
        active.updated_at = Set(self.ctx.clock.now());
        Ok(active.update(conn).await?)
    }

    #[instrument(skip(self))]
    pub async fn mark_sent(&self, id: Uuid) -> Result<purchase_order::Model, ServiceError> {
        self.transition(id, PurchaseOrderAction::MarkSent, None)
            .await
    }

    #[instrument(skip(self))]
    pub async fn cancel(
        &self,
        id: Uuid,
        reason: Option<String>,
    ) -> Result<purchase_order::Model, ServiceError> {
        self.transition(id, PurchaseOrderAction::Cancel, reason.as_deref())
            .await
    }

    async fn transition(
        &self,
        id: Uuid,
        action: PurchaseOrderAction,
        note: Option<&str>,
    ) -> Result<purchase_order::Model, ServiceError> {
        let txn = self.ctx.db_pool.begin().await?;
        let po = lock_by_id::<PurchaseOrder, _>(&txn, id, "Purchase order").await?;
        let old_status = po.status;
        let updated = self.move_to(&txn, po, action, note).await?;
        txn.commit().await?;

        info!(purchase_order_id = %id, from = %old_status, to = %updated.status, "purchase order updated");
        Ok(updated)
    }

    pub async fn get(&self, id: Uuid) -> Result<PurchaseOrderDetail, ServiceError> {
        let db = self.ctx.db_pool.as_ref();
        let purchase_order = find_by_id::<PurchaseOrder, _>(db, id, "Purchase order").await?;
        let items = PurchaseOrderItem::find()
            .filter(purchase_order_item::Column::PurchaseOrderId.eq(id))
            .all(db)
            .await?;
        Ok(PurchaseOrderDetail {
            purchase_order,
            items,
        })
    }

    pub async fn list_for_order<C: ConnectionTrait>(
        &self,
        conn: &C,
        order_id: Uuid,
    ) -> Result<Vec<purchase_order::Model>, ServiceError> {
        Ok(PurchaseOrder::find()
            .filter(purchase_order::Column::OrderId.eq(order_id))
            .order_by_asc(purchase_order::Column::CreatedAt)
            .all(conn)
            .await?)
    }

    /// Puts a purchase order back to `pending` after its receipt was cancelled.
    pub(crate) async fn reopen<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: Uuid,
        note: &str,
    ) -> Result<Option<purchase_order::Model>, ServiceError> {
        let po = lock_by_id::<PurchaseOrder, _>(conn, id, "Purchase order").await?;
        if !PurchaseOrderAction::Reopen.permits(po.status) {
            warn!(purchase_order_id = %id, status = %po.status, "purchase order left unchanged on receipt reversal");
            return Ok(None);
        }
        Ok(Some(
            self.move_to(conn, po, PurchaseOrderAction::Reopen, Some(note))
                .await?,
        ))
    }
}
