//! Goods receipts and their reversal.

use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::db::document_number;
use crate::entities::bank_movement;
use crate::entities::inventory_balance;
use crate::entities::payable::{self, Entity as Payable};
use crate::entities::product::{self, Entity as Product};
use crate::entities::purchase::{self, Entity as Purchase, PurchaseStatus};
use crate::entities::purchase_item::{self, Entity as PurchaseItem};
use crate::entities::purchase_order::{self, Entity as PurchaseOrder};
use crate::entities::serialized_unit::{self, UnitState};
use crate::entities::stock_movement::{MovementReason, ReferenceKind};
use crate::errors::ServiceError;
use crate::events::Event;
use crate::metrics::{PURCHASES_CANCELLED, RECONCILIATION_MOVEMENTS, SERIAL_TRANSITIONS};
use crate::services::collaborators::{Actor, PricedLine};
use crate::services::finance::{append_note, PayableReversal};
use crate::services::kits::add_quantity;
use crate::services::procurement::PurchaseOrderService;
use crate::services::serial_units::NewUnits;
use crate::services::state_machine::{PurchaseAction, PurchaseOrderAction, Transition};
use crate::services::stock_ledger::NewMovement;
use crate::services::{find_by_id, lock_by_id, ServiceContext};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReceiveLine {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 1_000_000, message = "quantity must be 1-1000000"))]
    pub quantity: i32,
    #[validate(custom = "validate_cost")]
    pub unit_cost: Decimal,
    /// One per unit for serialized products
    #[serde(default)]
    pub serials: Vec<String>,
}

fn validate_cost(cost: &Decimal) -> Result<(), ValidationError> {
    if cost.is_sign_negative() {
        return Err(ValidationError::new("negative_unit_cost"));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReceivePurchaseRequest {
    pub supplier_id: Uuid,
    pub warehouse_id: Uuid,
    pub purchase_order_id: Option<Uuid>,
    /// Pay on receipt from this account
    pub bank_account_id: Option<Uuid>,
    #[validate(length(min = 1, message = "a purchase needs at least one line"))]
    pub lines: Vec<ReceiveLine>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseDetail {
    pub purchase: purchase::Model,
    pub items: Vec<purchase_item::Model>,
    pub payable: Option<payable::Model>,
    pub serial_units: Vec<serialized_unit::Model>,
}

/// Stock written off directly because serialized units were no longer found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseCancellation {
    pub purchase: purchase::Model,
    pub units_deleted: u64,
    pub reconciliations: Vec<Reconciliation>,
    pub payable: PayableReversal,
    pub refund: Option<bank_movement::Model>,
    pub purchase_order: Option<purchase_order::Model>,
}

#[derive(Debug, Clone)]
pub struct PurchaseService {
    ctx: ServiceContext,
    procurement: PurchaseOrderService,
}

impl PurchaseService {
    pub fn new(ctx: ServiceContext) -> Self {
        let procurement = PurchaseOrderService::new(ctx.clone());
        Self { ctx, procurement }
    }

    async fn load_products<C: ConnectionTrait>(
        conn: &C,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, product::Model>, ServiceError> {
        let mut products = HashMap::new();
        for &id in ids {
            if !products.contains_key(&id) {
                products.insert(id, find_by_id::<Product, _>(conn, id, "Product").await?);
            }
        }
        Ok(products)
    }

    /// Records received goods: stock in, serial units registered, a payable
    /// opened and, when paid from a bank account, the withdrawal.
    #[instrument(skip(self, request), fields(supplier_id = %request.supplier_id, warehouse_id = %request.warehouse_id))]
    pub async fn receive(
        &self,
        request: ReceivePurchaseRequest,
        actor: Actor,
    ) -> Result<PurchaseDetail, ServiceError> {
        request.validate()?;
        request.lines.iter().try_for_each(|l| l.validate())?;

        let product_ids: Vec<Uuid> = request.lines.iter().map(|l| l.product_id).collect();
        let stock_keys: Vec<(Uuid, Uuid)> = product_ids
            .iter()
            .map(|id| (*id, request.warehouse_id))
            .collect();

        let txn = self.ctx.db_pool.begin().await?;
        let products = Self::load_products(&txn, &product_ids).await?;

        let item_ids: Vec<Uuid> = request.lines.iter().map(|_| Uuid::new_v4()).collect();
        for (line, item_id) in request.lines.iter().zip(&item_ids) {
            let product = &products[&line.product_id];
            if product.is_kit {
                return Err(ServiceError::ValidationError(format!(
                    "kit {} cannot be received, receive its components",
                    product.sku
                )));
            }
            if product.is_serialized && line.serials.len() as i32 != line.quantity {
                return Err(ServiceError::MissingSerials {
                    line_id: *item_id,
                    expected: line.quantity,
                    supplied: line.serials.len() as i32,
                });
            }
            if !product.is_serialized && !line.serials.is_empty() {
                return Err(ServiceError::ValidationError(format!(
                    "product {} is not serialized but serial numbers were supplied",
                    product.sku
                )));
            }
        }

        let purchase_order = match request.purchase_order_id {
            Some(po_id) => {
                let po = lock_by_id::<PurchaseOrder, _>(&txn, po_id, "Purchase order").await?;
                PurchaseOrderAction::Close.apply(po.id, po.status)?;
                Some(po)
            }
            None => None,
        };

        let priced: Vec<PricedLine> = request
            .lines
            .iter()
            .map(|l| PricedLine {
                quantity: l.quantity,
                unit_price: l.unit_cost,
            })
            .collect();
        let amounts = self.ctx.pricing.totals(&priced);
        let now = self.ctx.clock.now();
        let purchase_id = Uuid::new_v4();
        let purchase = purchase::ActiveModel {
            id: Set(purchase_id),
            purchase_number: Set(document_number("PUR", purchase_id)),
            supplier_id: Set(request.supplier_id),
            warehouse_id: Set(request.warehouse_id),
            purchase_order_id: Set(request.purchase_order_id),
            bank_account_id: Set(request.bank_account_id),
            status: Set(PurchaseStatus::Processed),
            subtotal: Set(amounts.subtotal),
            tax: Set(amounts.tax),
            total: Set(amounts.total),
            notes: Set(request.notes.clone()),
            created_by: Set(actor.id()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let ledger = self.ctx.ledger();
        let registry = self.ctx.serials();
        ledger.lock_in_order(&txn, &stock_keys).await?;

        let mut items = Vec::with_capacity(request.lines.len());
        let mut serial_units = Vec::new();
        for (line, item_id) in request.lines.iter().zip(item_ids) {
            let product = &products[&line.product_id];
            items.push(
                purchase_item::ActiveModel {
                    id: Set(item_id),
                    purchase_id: Set(purchase_id),
                    product_id: Set(line.product_id),
                    quantity: Set(line.quantity),
                    unit_cost: Set(line.unit_cost),
                }
                .insert(&txn)
                .await?,
            );

            if product.is_serialized {
                serial_units.extend(
                    registry
                        .register(
                            &txn,
                            NewUnits {
                                product_id: line.product_id,
                                warehouse_id: request.warehouse_id,
                                serials: &line.serials,
                                originating_purchase_id: Some(purchase_id),
                                reason: MovementReason::PurchaseReceipt,
                                reference: (ReferenceKind::Purchase, purchase_id),
                                actor,
                            },
                        )
                        .await?,
                );
            } else {
                ledger
                    .record(
                        &txn,
                        NewMovement::new(
                            line.product_id,
                            request.warehouse_id,
                            line.quantity,
                            MovementReason::PurchaseReceipt,
                        )
                        .reference(ReferenceKind::Purchase, purchase_id)
                        .by(actor),
                    )
                    .await?;
            }

            let mut active: product::ActiveModel = product.clone().into();
            active.last_purchase_cost = Set(line.unit_cost);
            active.updated_at = Set(now);
            active.update(&txn).await?;
        }

        let treasury = self.ctx.treasury();
        let mut payable = treasury
            .open_payable(&txn, purchase_id, amounts.total)
            .await?;
        if let Some(account_id) = request.bank_account_id {
            treasury
                .withdraw(
                    &txn,
                    account_id,
                    amounts.total,
                    Some(purchase_id),
                    format!("Payment for purchase {}", purchase.purchase_number),
                )
                .await?;
            payable = treasury.settle_payable(&txn, payable).await?;
        }

        if let Some(po) = purchase_order {
            let note = format!("Received as purchase {}", purchase.purchase_number);
            self.procurement
                .move_to(&txn, po, PurchaseOrderAction::Close, Some(&note))
                .await?;
        }
        txn.commit().await?;

        info!(
            purchase_id = %purchase_id,
            lines = items.len(),
            serial_units = serial_units.len(),
            total = %purchase.total,
            "purchase received"
        );
        self.ctx
            .event_sender
            .publish(Event::PurchaseReceived(purchase_id))
            .await;

        Ok(PurchaseDetail {
            purchase,
            items,
            payable: Some(payable),
            serial_units,
        })
    }

    /// Reverses a processed purchase.
    ///
    /// Refused when any unit it brought in has been sold or written off.
    /// Serialized units that are no longer on record are written off the
    /// ledger with a reconciliation movement; the rest are deleted.
    #[instrument(skip(self))]
    pub async fn cancel(
        &self,
        purchase_id: Uuid,
        actor: Actor,
    ) -> Result<PurchaseCancellation, ServiceError> {
        let txn = self.ctx.db_pool.begin().await?;
        let purchase = lock_by_id::<Purchase, _>(&txn, purchase_id, "Purchase").await?;
        let status = PurchaseAction::Cancel.apply(purchase.id, purchase.status)?;
        let warehouse_id = purchase.warehouse_id;

        let items = PurchaseItem::find()
            .filter(purchase_item::Column::PurchaseId.eq(purchase_id))
            .all(&txn)
            .await?;
        let mut quantities: BTreeMap<Uuid, i32> = BTreeMap::new();
        for item in &items {
            let total = quantities.entry(item.product_id).or_default();
            *total = add_quantity(*total, item.quantity, item.product_id)?;
        }
        let product_ids: Vec<Uuid> = quantities.keys().copied().collect();
        let stock_keys: Vec<(Uuid, Uuid)> =
            product_ids.iter().map(|id| (*id, warehouse_id)).collect();
        let products = Self::load_products(&txn, &product_ids).await?;

        let ledger = self.ctx.ledger();
        let registry = self.ctx.serials();
        let balances = ledger.lock_in_order(&txn, &stock_keys).await?;
        let units = registry.lock_purchase_units(&txn, purchase_id).await?;

        if let Some(unit) = units.iter().find(|u| u.state.is_terminal()) {
            return Err(ServiceError::DocumentStateConflict {
                document: "purchase",
                id: purchase_id,
                state: format!("holding {} unit {}", unit.state, unit.serial_number),
                action: "cancel",
            });
        }
        for (product_id, quantity) in &quantities {
            let balance = &balances[&(*product_id, warehouse_id)];
            if balance.available() < *quantity {
                return Err(cannot_reverse(balance, *quantity));
            }
        }

        let mut units_deleted = 0;
        let mut reconciliations = Vec::new();
        for (product_id, quantity) in &quantities {
            let product = &products[product_id];
            if !product.is_serialized {
                ledger
                    .record(
                        &txn,
                        NewMovement::new(
                            *product_id,
                            warehouse_id,
                            -quantity,
                            MovementReason::PurchaseCancelled,
                        )
                        .reference(ReferenceKind::Purchase, purchase_id)
                        .by(actor),
                    )
                    .await
                    .map_err(|e| match e {
                        ServiceError::InsufficientStock { .. } => {
                            cannot_reverse(&balances[&(*product_id, warehouse_id)], *quantity)
                        }
                        other => other,
                    })?;
                continue;
            }

            let in_stock: Vec<serialized_unit::Model> = units
                .iter()
                .filter(|u| u.product_id == *product_id && u.state == UnitState::InStock)
                .cloned()
                .collect();
            let missing = quantity - in_stock.len() as i32;
            if missing > 0 {
                warn!(
                    purchase_id = %purchase_id,
                    product_id = %product_id,
                    expected = quantity,
                    found = in_stock.len(),
                    missing,
                    "serialized units missing, writing reconciliation movement"
                );
                ledger
                    .record(
                        &txn,
                        NewMovement::new(
                            *product_id,
                            warehouse_id,
                            -missing,
                            MovementReason::Reconciliation,
                        )
                        .reference(ReferenceKind::Purchase, purchase_id)
                        .reconciliation()
                        .notes(format!(
                            "{} units of purchase {} were no longer in stock",
                            missing, purchase.purchase_number
                        ))
                        .by(actor),
                    )
                    .await?;
                reconciliations.push(Reconciliation {
                    product_id: *product_id,
                    warehouse_id,
                    quantity: missing,
                });
            }
            units_deleted += registry
                .retire(&txn, &in_stock, *product_id, warehouse_id, purchase_id, actor)
                .await?;
        }

        let note = format!(
            "Purchase {} cancelled on {}",
            purchase.purchase_number,
            self.ctx.clock.now().format("%Y-%m-%d %H:%M")
        );
        let treasury = self.ctx.treasury();
        let payable = treasury.reverse_payable(&txn, purchase_id, &note).await?;
        let refund = match purchase.bank_account_id {
            Some(account_id) => Some(
                treasury
                    .deposit(
                        &txn,
                        account_id,
                        purchase.total,
                        Some(purchase_id),
                        format!("Reversal of purchase {}", purchase.purchase_number),
                    )
                    .await?,
            ),
            None => None,
        };
        let purchase_order = match purchase.purchase_order_id {
            Some(po_id) => {
                let note = format!(
                    "Returned to pending: purchase {} cancelled",
                    purchase.purchase_number
                );
                self.procurement.reopen(&txn, po_id, &note).await?
            }
            None => None,
        };

        let notes = append_note(purchase.notes.as_deref(), &note);
        let mut active: purchase::ActiveModel = purchase.into();
        active.status = Set(status);
        active.notes = Set(Some(notes));
        active.updated_at = Set(self.ctx.clock.now());
        let purchase = active.update(&txn).await?;
        txn.commit().await?;

        PURCHASES_CANCELLED.inc();
        RECONCILIATION_MOVEMENTS.inc_by(reconciliations.len() as u64);
        SERIAL_TRANSITIONS
            .with_label_values(&["deleted"])
            .inc_by(units_deleted);
        info!(
            purchase_id = %purchase_id,
            units_deleted,
            reconciliations = reconciliations.len(),
            payable = ?payable,
            "purchase cancelled"
        );
        self.ctx
            .event_sender
            .publish(Event::PurchaseCancelled(purchase_id))
            .await;
        for r in &reconciliations {
            self.ctx
                .event_sender
                .publish(Event::StockReconciled {
                    purchase_id,
                    product_id: r.product_id,
                    warehouse_id: r.warehouse_id,
                    quantity: r.quantity,
                })
                .await;
        }

        Ok(PurchaseCancellation {
            purchase,
            units_deleted,
            reconciliations,
            payable,
            refund,
            purchase_order,
        })
    }

    pub async fn get(&self, purchase_id: Uuid) -> Result<PurchaseDetail, ServiceError> {
        let db = self.ctx.db_pool.as_ref();
        let purchase = find_by_id::<Purchase, _>(db, purchase_id, "Purchase").await?;
        let items = PurchaseItem::find()
            .filter(purchase_item::Column::PurchaseId.eq(purchase_id))
            .all(db)
            .await?;
        let payable = Payable::find()
            .filter(payable::Column::PurchaseId.eq(purchase_id))
            .one(db)
            .await?;
        let serial_units = serialized_unit::Entity::find()
            .filter(serialized_unit::Column::OriginatingPurchaseId.eq(purchase_id))
            .all(db)
            .await?;
        Ok(PurchaseDetail {
            purchase,
            items,
            payable,
            serial_units,
        })
    }
}

fn cannot_reverse(balance: &inventory_balance::Model, requested: i32) -> ServiceError {
    ServiceError::InsufficientStockToReverse {
        product_id: balance.product_id,
        warehouse_id: balance.warehouse_id,
        on_hand: balance.on_hand,
        reserved: balance.reserved,
        requested,
    }
}
