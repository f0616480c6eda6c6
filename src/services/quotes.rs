//! Quotes and their conversion into orders or straight into sales.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::db::document_number;
use crate::entities::quote::{self, Entity as Quote, QuoteStatus};
use crate::entities::quote_item::{self, Entity as QuoteItem};
use crate::errors::ServiceError;
use crate::events::Event;
use crate::metrics::{SALES_CREATED, SERIAL_TRANSITIONS, STOCK_REJECTIONS};
use crate::services::collaborators::Actor;
use crate::services::kits::KitExpander;
use crate::services::lines::{stock_lines, validate_lines, DocumentLine, LineInput};
use crate::services::orders::{insert_order, publish_generated, PlacedOrder};
use crate::services::procurement::PurchaseOrderService;
use crate::services::sales::{SaleDetail, SaleSource, SerialsByLine, StockMode};
use crate::services::state_machine::{QuoteAction, Transition};
use crate::services::{find_by_id, lock_by_id, ServiceContext};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateQuoteRequest {
    pub warehouse_id: Uuid,
    #[validate(length(min = 1, message = "a quote needs at least one line"))]
    pub lines: Vec<LineInput>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    /// Keep the quote in `draft` instead of `pending`
    #[serde(default)]
    pub draft: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConvertQuoteToSaleRequest {
    #[serde(default)]
    pub serials: SerialsByLine,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteDetail {
    pub quote: quote::Model,
    pub items: Vec<quote_item::Model>,
}

#[derive(Debug, Clone)]
pub struct QuoteService {
    ctx: ServiceContext,
    procurement: PurchaseOrderService,
}

impl QuoteService {
    pub fn new(ctx: ServiceContext) -> Self {
        let procurement = PurchaseOrderService::new(ctx.clone());
        Self { ctx, procurement }
    }

    async fn items<C: ConnectionTrait>(
        conn: &C,
        quote_id: Uuid,
    ) -> Result<Vec<quote_item::Model>, ServiceError> {
        Ok(QuoteItem::find()
            .filter(quote_item::Column::QuoteId.eq(quote_id))
            .order_by_asc(quote_item::Column::Position)
            .all(conn)
            .await?)
    }

    async fn save_status<C: ConnectionTrait>(
        &self,
        conn: &C,
        quote: quote::Model,
        status: QuoteStatus,
    ) -> Result<quote::Model, ServiceError> {
        let mut active: quote::ActiveModel = quote.into();
        active.status = Set(status);
        active.updated_at = Set(self.ctx.clock.now());
        Ok(active.update(conn).await?)
    }

    #[instrument(skip(self, request), fields(warehouse_id = %request.warehouse_id))]
    pub async fn create(
        &self,
        request: CreateQuoteRequest,
        actor: Actor,
    ) -> Result<QuoteDetail, ServiceError> {
        request.validate()?;
        validate_lines(&request.lines)?;

        let now = self.ctx.clock.now();
        let id = Uuid::new_v4();
        let txn = self.ctx.db_pool.begin().await?;

        let draft_lines: Vec<DocumentLine> = request
            .lines
            .iter()
            .map(|l| DocumentLine {
                line_id: Uuid::nil(),
                item: l.item,
                quantity: l.quantity,
                unit_price: l.unit_price,
                position: 0,
            })
            .collect();
        KitExpander::new()
            .resolve_lines(&txn, &stock_lines(&draft_lines))
            .await?;

        let quote = quote::ActiveModel {
            id: Set(id),
            quote_number: Set(document_number("QUO", id)),
            warehouse_id: Set(request.warehouse_id),
            status: Set(if request.draft {
                QuoteStatus::Draft
            } else {
                QuoteStatus::Pending
            }),
            notes: Set(request.notes),
            created_by: Set(actor.id()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let mut items = Vec::with_capacity(request.lines.len());
        for (position, line) in request.lines.iter().enumerate() {
            items.push(
                quote_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    quote_id: Set(id),
                    item_kind: Set(line.item.kind()),
                    item_id: Set(line.item.id()),
                    quantity: Set(line.quantity),
                    unit_price: Set(line.unit_price),
                    position: Set(position as i32),
                }
                .insert(&txn)
                .await?,
            );
        }
        txn.commit().await?;

        info!(quote_id = %id, quote_number = %quote.quote_number, "quote created");
        Ok(QuoteDetail { quote, items })
    }

    #[instrument(skip(self))]
    pub async fn approve(&self, quote_id: Uuid) -> Result<quote::Model, ServiceError> {
        let txn = self.ctx.db_pool.begin().await?;
        let quote = lock_by_id::<Quote, _>(&txn, quote_id, "Quote").await?;
        let status = QuoteAction::Approve.apply(quote.id, quote.status)?;
        let quote = self.save_status(&txn, quote, status).await?;
        txn.commit().await?;
        Ok(quote)
    }

    /// Creates a `pending` order mirroring the quote and raises purchase
    /// orders for whatever the order cannot be filled from.
    #[instrument(skip(self))]
    pub async fn convert_to_order(
        &self,
        quote_id: Uuid,
        actor: Actor,
    ) -> Result<PlacedOrder, ServiceError> {
        let txn = self.ctx.db_pool.begin().await?;
        let quote = lock_by_id::<Quote, _>(&txn, quote_id, "Quote").await?;
        let status = QuoteAction::ConvertToOrder.apply(quote.id, quote.status)?;

        let quote_items = Self::items(&txn, quote_id).await?;
        let lines: Vec<DocumentLine> = quote_items.iter().map(DocumentLine::from).collect();
        let (order, items) = insert_order(
            &txn,
            self.ctx.clock.as_ref(),
            Some(quote.id),
            quote.warehouse_id,
            &lines,
            Some(format!("Created from quote {}", quote.quote_number)),
            actor,
        )
        .await?;
        self.save_status(&txn, quote, status).await?;

        let persisted: Vec<DocumentLine> = items.iter().map(DocumentLine::from).collect();
        let generated = self
            .procurement
            .raise_for_shortfall(&txn, &order, &stock_lines(&persisted))
            .await?;
        txn.commit().await?;

        info!(quote_id = %quote_id, order_id = %order.id, "quote converted to order");
        self.ctx
            .event_sender
            .publish(Event::QuoteConverted {
                quote_id,
                order_id: Some(order.id),
                sale_id: None,
            })
            .await;
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

    /// Sells straight from the quote. Stock comes from what is available;
    /// other orders' reservations are never consumed.
    #[instrument(skip(self, request))]
    pub async fn convert_to_sale(
        &self,
        quote_id: Uuid,
        request: &ConvertQuoteToSaleRequest,
        actor: Actor,
    ) -> Result<SaleDetail, ServiceError> {
        let txn = self.ctx.db_pool.begin().await?;
        let quote = lock_by_id::<Quote, _>(&txn, quote_id, "Quote").await?;
        let status = QuoteAction::ConvertToSale.apply(quote.id, quote.status)?;

        let items = Self::items(&txn, quote_id).await?;
        let source = SaleSource {
            order_id: None,
            quote_id: Some(quote.id),
            warehouse_id: quote.warehouse_id,
            lines: items.iter().map(DocumentLine::from).collect(),
        };
        let detail = match self
            .ctx
            .sale_writer()
            .write(&txn, &source, &request.serials, StockMode::Direct, actor)
            .await
        {
            Ok(detail) => detail,
            Err(e) => {
                if matches!(e, ServiceError::InsufficientStock { .. }) {
                    STOCK_REJECTIONS
                        .with_label_values(&["convert_quote_to_sale"])
                        .inc();
                }
                return Err(e);
            }
        };
        self.save_status(&txn, quote, status).await?;
        txn.commit().await?;

        SALES_CREATED.with_label_values(&["quote"]).inc();
        SERIAL_TRANSITIONS
            .with_label_values(&["sold"])
            .inc_by(detail.serials.len() as u64);
        info!(quote_id = %quote_id, sale_id = %detail.sale.id, "quote converted to sale");
        self.ctx
            .event_sender
            .publish(Event::SaleCreated {
                sale_id: detail.sale.id,
                order_id: None,
                quote_id: Some(quote_id),
                total: detail.sale.total,
            })
            .await;
        self.ctx
            .event_sender
            .publish(Event::QuoteConverted {
                quote_id,
                order_id: None,
                sale_id: Some(detail.sale.id),
            })
            .await;
        Ok(detail)
    }

    pub async fn get(&self, quote_id: Uuid) -> Result<QuoteDetail, ServiceError> {
        let db = self.ctx.db_pool.as_ref();
        let quote = find_by_id::<Quote, _>(db, quote_id, "Quote").await?;
        let items = Self::items(db, quote_id).await?;
        Ok(QuoteDetail { quote, items })
    }
}
