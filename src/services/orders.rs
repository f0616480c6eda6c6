//! Order lifecycle: reservation on confirm, release on cancel, consumption on sale.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::db::document_number;
use crate::entities::order::{self, Entity as Order, OrderStatus};
use crate::entities::order_item::{self, Entity as OrderItem};
use crate::entities::purchase_order;
use crate::entities::quote::{self, Entity as Quote};
use crate::errors::ServiceError;
use crate::events::Event;
use crate::metrics::{
    ORDERS_CANCELLED, ORDERS_CONFIRMED, SALES_CREATED, SERIAL_TRANSITIONS, STOCK_REJECTIONS,
};
use crate::services::collaborators::{Actor, Clock};
use crate::services::kits::{stock_keys, KitExpander};
use crate::services::lines::{stock_lines, validate_lines, DocumentLine, LineInput};
use crate::services::procurement::{PurchaseOrderDetail, PurchaseOrderService};
use crate::services::sales::{
    find_sale_for_order, load_sale, SaleDetail, SaleSource, SerialsByLine, StockMode,
};
use crate::services::state_machine::{OrderAction, QuoteAction, Transition};
use crate::services::{find_by_id, lock_by_id, ServiceContext};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateOrderRequest {
    pub warehouse_id: Uuid,
    #[validate(length(min = 1, message = "an order needs at least one line"))]
    pub lines: Vec<LineInput>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConvertOrderToSaleRequest {
    #[serde(default)]
    pub serials: SerialsByLine,
    /// Return the existing sale instead of failing when the order was already sent
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetail {
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
    pub purchase_orders: Vec<purchase_order::Model>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacedOrder {
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
    pub generated_purchase_orders: Vec<PurchaseOrderDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleConversion {
    #[serde(flatten)]
    pub detail: SaleDetail,
    /// False when an earlier sale was returned by a forced re-send
    pub created: bool,
}

/// Inserts a `pending` order and its lines.
pub(crate) async fn insert_order<C: ConnectionTrait>(
    conn: &C,
    clock: &dyn Clock,
    quote_id: Option<Uuid>,
    warehouse_id: Uuid,
    lines: &[DocumentLine],
    notes: Option<String>,
    actor: Actor,
) -> Result<(order::Model, Vec<order_item::Model>), ServiceError> {
    let now = clock.now();
    let id = Uuid::new_v4();
    let order = order::ActiveModel {
        id: Set(id),
        order_number: Set(document_number("ORD", id)),
        quote_id: Set(quote_id),
        warehouse_id: Set(warehouse_id),
        status: Set(OrderStatus::Pending),
        notes: Set(notes),
        created_by: Set(actor.id()),
        updated_by: Set(actor.id()),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await?;

    let mut items = Vec::with_capacity(lines.len());
    for line in lines {
        items.push(
            order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(id),
                item_kind: Set(line.item.kind()),
                item_id: Set(line.item.id()),
                quantity: Set(line.quantity),
                unit_price: Set(line.unit_price),
                position: Set(line.position),
            }
            .insert(conn)
            .await?,
        );
    }
    Ok((order, items))
}

#[derive(Debug, Clone)]
pub struct OrderService {
    ctx: ServiceContext,
    procurement: PurchaseOrderService,
}

impl OrderService {
    pub fn new(ctx: ServiceContext) -> Self {
        let procurement = PurchaseOrderService::new(ctx.clone());
        Self { ctx, procurement }
    }

    async fn items<C: ConnectionTrait>(
        conn: &C,
        order_id: Uuid,
    ) -> Result<Vec<order_item::Model>, ServiceError> {
        Ok(OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .order_by_asc(order_item::Column::Position)
            .all(conn)
            .await?)
    }

    async fn save_status<C: ConnectionTrait>(
        &self,
        conn: &C,
        order: order::Model,
        status: OrderStatus,
        actor: Actor,
    ) -> Result<order::Model, ServiceError> {
        let mut active: order::ActiveModel = order.into();
        active.status = Set(status);
        active.updated_by = Set(actor.id());
        active.updated_at = Set(self.ctx.clock.now());
        Ok(active.update(conn).await?)
    }

    async fn publish_status(&self, order_id: Uuid, old: OrderStatus, new: OrderStatus) {
        self.ctx
            .event_sender
            .publish(Event::OrderStatusChanged {
                order_id,
                old_status: old.to_string(),
                new_status: new.to_string(),
            })
            .await;
    }

    /// Creates a quote-less order and raises purchase orders for any shortfall.
    #[instrument(skip(self, request), fields(warehouse_id = %request.warehouse_id))]
    pub async fn create(
        &self,
        request: CreateOrderRequest,
        actor: Actor,
    ) -> Result<PlacedOrder, ServiceError> {
        request.validate()?;
        validate_lines(&request.lines)?;

        let lines: Vec<DocumentLine> = request
            .lines
            .iter()
            .enumerate()
            .map(|(position, l)| DocumentLine {
                line_id: Uuid::nil(),
                item: l.item,
                quantity: l.quantity,
                unit_price: l.unit_price,
                position: position as i32,
            })
            .collect();

        let txn = self.ctx.db_pool.begin().await?;
        let (order, items) = insert_order(
            &txn,
            self.ctx.clock.as_ref(),
            None,
            request.warehouse_id,
            &lines,
            request.notes,
            actor,
        )
        .await?;
        let persisted: Vec<DocumentLine> = items.iter().map(DocumentLine::from).collect();
        let generated = self
            .procurement
            .raise_for_shortfall(&txn, &order, &stock_lines(&persisted))
            .await?;
        txn.commit().await?;

        info!(order_id = %order.id, order_number = %order.order_number, "order created");
        self.ctx
            .event_sender
            .publish(Event::OrderCreated(order.id))
            .await;
        publish_generated(&self.ctx, order.id, &generated).await;

        Ok(PlacedOrder {
            order,
            items,
            generated_purchase_orders: generated,
        })
    }

    /// Reserves stock for every line. Any shortfall aborts the whole confirmation.
    #[instrument(skip(self))]
    pub async fn confirm(
        &self,
        order_id: Uuid,
        actor: Actor,
    ) -> Result<order::Model, ServiceError> {
        let txn = self.ctx.db_pool.begin().await?;
        let order = lock_by_id::<Order, _>(&txn, order_id, "Order").await?;
        let old_status = order.status;
        let status = OrderAction::Confirm.apply(order.id, order.status)?;

        let items = Self::items(&txn, order_id).await?;
        let lines: Vec<DocumentLine> = items.iter().map(DocumentLine::from).collect();
        let demand = KitExpander::new()
            .resolve_lines(&txn, &stock_lines(&lines))
            .await?;

        let reservations = self.ctx.reservations();
        self.ctx
            .ledger()
            .lock_in_order(&txn, &stock_keys(&demand, order.warehouse_id))
            .await?;
        for d in &demand {
            if let Err(e) = reservations
                .reserve(&txn, d.product.id, order.warehouse_id, d.quantity)
                .await
            {
                if matches!(e, ServiceError::InsufficientStock { .. }) {
                    STOCK_REJECTIONS.with_label_values(&["confirm_order"]).inc();
                }
                warn!(order_id = %order_id, error = %e, "order confirmation aborted");
                return Err(e);
            }
        }

        let order = self.save_status(&txn, order, status, actor).await?;
        txn.commit().await?;

        ORDERS_CONFIRMED.inc();
        info!(order_id = %order_id, lines = demand.len(), "order confirmed, stock reserved");
        self.ctx
            .event_sender
            .publish(Event::OrderConfirmed(order_id))
            .await;
        self.publish_status(order_id, old_status, order.status).await;
        Ok(order)
    }

    /// Cancels the order, releasing its reservation and unsent purchase orders
    /// and returning its quote to `pending`.
    #[instrument(skip(self))]
    pub async fn cancel(&self, order_id: Uuid, actor: Actor) -> Result<order::Model, ServiceError> {
        let txn = self.ctx.db_pool.begin().await?;
        let order = lock_by_id::<Order, _>(&txn, order_id, "Order").await?;
        let old_status = order.status;
        let status = OrderAction::Cancel.apply(order.id, order.status)?;

        let mut released = 0;
        if old_status.holds_reservation() {
            let items = Self::items(&txn, order_id).await?;
            let lines: Vec<DocumentLine> = items.iter().map(DocumentLine::from).collect();
            let demand = KitExpander::new()
                .resolve_lines(&txn, &stock_lines(&lines))
                .await?;
            let reservations = self.ctx.reservations();
            self.ctx
                .ledger()
                .lock_in_order(&txn, &stock_keys(&demand, order.warehouse_id))
                .await?;
            for d in &demand {
                released += reservations
                    .release(&txn, d.product.id, order.warehouse_id, d.quantity)
                    .await?;
            }
        }

        let note = format!(
            "Cancelled together with order {} on {}",
            order.order_number,
            self.ctx.clock.now().format("%Y-%m-%d %H:%M")
        );
        let cancelled_pos = self
            .procurement
            .cancel_pending_for_order(&txn, &order, &note)
            .await?;

        if let Some(quote_id) = order.quote_id {
            let quote = lock_by_id::<Quote, _>(&txn, quote_id, "Quote").await?;
            if QuoteAction::Reopen.permits(quote.status) {
                let mut active: quote::ActiveModel = quote.into();
                active.status = Set(QuoteAction::Reopen.target());
                active.updated_at = Set(self.ctx.clock.now());
                active.update(&txn).await?;
            } else {
                warn!(quote_id = %quote_id, status = %quote.status, "quote not reopened on order cancellation");
            }
        }

        let order = self.save_status(&txn, order, status, actor).await?;
        txn.commit().await?;

        ORDERS_CANCELLED.inc();
        info!(
            order_id = %order_id,
            released,
            purchase_orders_cancelled = cancelled_pos.len(),
            "order cancelled"
        );
        self.ctx
            .event_sender
            .publish(Event::OrderCancelled(order_id))
            .await;
        self.publish_status(order_id, old_status, order.status).await;
        Ok(order)
    }

    #[instrument(skip(self))]
    pub async fn start_preparation(
        &self,
        order_id: Uuid,
        actor: Actor,
    ) -> Result<order::Model, ServiceError> {
        self.progress(order_id, OrderAction::StartPreparation, actor)
            .await
    }

    #[instrument(skip(self))]
    pub async fn mark_ready(
        &self,
        order_id: Uuid,
        actor: Actor,
    ) -> Result<order::Model, ServiceError> {
        self.progress(order_id, OrderAction::MarkReady, actor).await
    }

    async fn progress(
        &self,
        order_id: Uuid,
        action: OrderAction,
        actor: Actor,
    ) -> Result<order::Model, ServiceError> {
        let txn = self.ctx.db_pool.begin().await?;
        let order = lock_by_id::<Order, _>(&txn, order_id, "Order").await?;
        let old_status = order.status;
        let status = action.apply(order.id, order.status)?;
        let order = self.save_status(&txn, order, status, actor).await?;
        txn.commit().await?;

        self.publish_status(order_id, old_status, order.status).await;
        Ok(order)
    }

    /// Records the sale, consuming the order's reservation.
    ///
    /// With `force`, an order that was already sent returns its existing sale
    /// and nothing is written.
    #[instrument(skip(self, request), fields(force = request.force))]
    pub async fn convert_to_sale(
        &self,
        order_id: Uuid,
        request: &ConvertOrderToSaleRequest,
        actor: Actor,
    ) -> Result<SaleConversion, ServiceError> {
        let txn = self.ctx.db_pool.begin().await?;
        let order = lock_by_id::<Order, _>(&txn, order_id, "Order").await?;

        if order.status == OrderStatus::SentToSale && request.force {
            let sale = find_sale_for_order(&txn, order_id).await?.ok_or_else(|| {
                ServiceError::NotFound(format!("Sale for order {} not found", order_id))
            })?;
            let detail = load_sale(&txn, sale).await?;
            info!(order_id = %order_id, sale_id = %detail.sale.id, "order already sent, returning existing sale");
            return Ok(SaleConversion {
                detail,
                created: false,
            });
        }

        let old_status = order.status;
        let status = OrderAction::ConvertToSale.apply(order.id, order.status)?;
        let items = Self::items(&txn, order_id).await?;
        let source = SaleSource {
            order_id: Some(order.id),
            quote_id: order.quote_id,
            warehouse_id: order.warehouse_id,
            lines: items.iter().map(DocumentLine::from).collect(),
        };

        let detail = match self
            .ctx
            .sale_writer()
            .write(
                &txn,
                &source,
                &request.serials,
                StockMode::ConsumeReservation,
                actor,
            )
            .await
        {
            Ok(detail) => detail,
            Err(e) => {
                if matches!(e, ServiceError::InsufficientStock { .. }) {
                    STOCK_REJECTIONS
                        .with_label_values(&["convert_order_to_sale"])
                        .inc();
                }
                return Err(e);
            }
        };
        self.save_status(&txn, order, status, actor).await?;
        txn.commit().await?;

        SALES_CREATED.with_label_values(&["order"]).inc();
        SERIAL_TRANSITIONS
            .with_label_values(&["sold"])
            .inc_by(detail.serials.len() as u64);
        info!(order_id = %order_id, sale_id = %detail.sale.id, total = %detail.sale.total, "order converted to sale");
        self.ctx
            .event_sender
            .publish(Event::SaleCreated {
                sale_id: detail.sale.id,
                order_id: Some(order_id),
                quote_id: source.quote_id,
                total: detail.sale.total,
            })
            .await;
        self.publish_status(order_id, old_status, status).await;

        Ok(SaleConversion {
            detail,
            created: true,
        })
    }

    pub async fn get(&self, order_id: Uuid) -> Result<OrderDetail, ServiceError> {
        let db = self.ctx.db_pool.as_ref();
        let order = find_by_id::<Order, _>(db, order_id, "Order").await?;
        let items = Self::items(db, order_id).await?;
        let purchase_orders = self.procurement.list_for_order(db, order_id).await?;
        Ok(OrderDetail {
            order,
            items,
            purchase_orders,
        })
    }
}

pub(crate) async fn publish_generated(
    ctx: &ServiceContext,
    order_id: Uuid,
    generated: &[PurchaseOrderDetail],
) {
    if generated.is_empty() {
        return;
    }
    crate::metrics::PURCHASE_ORDERS_GENERATED.inc_by(generated.len() as u64);
    ctx.event_sender
        .publish(Event::PurchaseOrdersGenerated {
            order_id,
            purchase_order_ids: generated.iter().map(|g| g.purchase_order.id).collect(),
        })
        .await;
}
