pub mod catalog;
pub mod collaborators;
pub mod finance;
pub mod inventory;
pub mod kits;
pub mod lines;
pub mod orders;
pub mod procurement;
pub mod purchases;
pub mod quotes;
pub mod reservations;
pub mod sales;
pub mod serial_units;
pub mod shortfall;
pub mod state_machine;
pub mod stock_ledger;

use sea_orm::{ConnectionTrait, EntityTrait, PrimaryKeyTrait};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{for_update, DbPool};
use crate::errors::ServiceError;
use crate::events::EventSender;
use collaborators::{Clock, FlatPricing, PricingService, SystemClock};
use finance::Treasury;
use reservations::ReservationTracker;
use sales::SaleWriter;
use serial_units::SerialRegistry;
use shortfall::ShortfallConsolidator;
use stock_ledger::StockLedger;

/// Shared handles every pipeline service is built from.
#[derive(Debug, Clone)]
pub struct ServiceContext {
    pub db_pool: Arc<DbPool>,
    pub event_sender: Arc<EventSender>,
    pub clock: Arc<dyn Clock>,
    pub pricing: Arc<dyn PricingService>,
    /// Supplier for shortfall lines whose product has no default supplier
    pub generic_supplier_id: Uuid,
}

impl ServiceContext {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        generic_supplier_id: Uuid,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            clock: Arc::new(SystemClock),
            pricing: Arc::new(FlatPricing),
            generic_supplier_id,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_pricing(mut self, pricing: Arc<dyn PricingService>) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn ledger(&self) -> StockLedger {
        StockLedger::new(self.clock.clone())
    }

    pub fn reservations(&self) -> ReservationTracker {
        ReservationTracker::new(self.ledger())
    }

    pub fn serials(&self) -> SerialRegistry {
        SerialRegistry::new(self.ledger(), self.clock.clone())
    }

    pub fn sale_writer(&self) -> SaleWriter {
        SaleWriter::new(
            self.ledger(),
            self.reservations(),
            self.serials(),
            self.pricing.clone(),
            self.clock.clone(),
        )
    }

    pub fn shortfall(&self) -> ShortfallConsolidator {
        ShortfallConsolidator::new(self.generic_supplier_id)
    }

    pub fn treasury(&self) -> Treasury {
        Treasury::new(self.clock.clone())
    }
}

/// Every service the HTTP layer exposes.
#[derive(Debug, Clone)]
pub struct AppServices {
    pub catalog: catalog::ProductService,
    pub quotes: quotes::QuoteService,
    pub orders: orders::OrderService,
    pub purchase_orders: procurement::PurchaseOrderService,
    pub purchases: purchases::PurchaseService,
    pub inventory: inventory::InventoryService,
    pub bank_accounts: finance::BankAccountService,
}

impl AppServices {
    pub fn new(ctx: ServiceContext) -> Self {
        Self {
            catalog: catalog::ProductService::new(ctx.clone()),
            quotes: quotes::QuoteService::new(ctx.clone()),
            orders: orders::OrderService::new(ctx.clone()),
            purchase_orders: procurement::PurchaseOrderService::new(ctx.clone()),
            purchases: purchases::PurchaseService::new(ctx.clone()),
            inventory: inventory::InventoryService::new(ctx.clone()),
            bank_accounts: finance::BankAccountService::new(ctx),
        }
    }
}

/// Loads a document row under `FOR UPDATE`.
pub(crate) async fn lock_by_id<E, C>(
    conn: &C,
    id: Uuid,
    document: &str,
) -> Result<E::Model, ServiceError>
where
    E: EntityTrait,
    C: ConnectionTrait,
    Uuid: Into<<E::PrimaryKey as PrimaryKeyTrait>::ValueType>,
{
    for_update(E::find_by_id(id), conn)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("{} {} not found", document, id)))
}

/// Unlocked lookup by primary key.
pub(crate) async fn find_by_id<E, C>(
    conn: &C,
    id: Uuid,
    document: &str,
) -> Result<E::Model, ServiceError>
where
    E: EntityTrait,
    C: ConnectionTrait,
    Uuid: Into<<E::PrimaryKey as PrimaryKeyTrait>::ValueType>,
{
    E::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("{} {} not found", document, id)))
}
