//! Sale recording shared by order and quote conversion.

use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::db::document_number;
use crate::entities::sale::{self, Entity as Sale, SaleStatus};
use crate::entities::stock_movement::{MovementReason, ReferenceKind};
use crate::entities::{sale_item, sale_item_serial, serialized_unit};
use crate::errors::ServiceError;
use crate::services::collaborators::{Actor, Clock, PricedLine, PricingService};
use crate::services::kits::{add_quantity, stock_keys, KitExpander, LineDemand};
use crate::services::lines::{stock_lines, DocumentLine};
use crate::services::reservations::{ConsumeSplit, ReservationTracker};
use crate::services::serial_units::SerialRegistry;
use crate::services::stock_ledger::{NewMovement, StockLedger};

/// Serial numbers supplied per source line id.
pub type SerialsByLine = HashMap<Uuid, Vec<String>>;

/// Where the stock for a sale comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockMode {
    /// Order conversion: draw down the order's reservation first.
    ConsumeReservation,
    /// Quote conversion: unreserved stock only.
    Direct,
}

#[derive(Debug, Clone)]
pub struct SaleSource {
    pub order_id: Option<Uuid>,
    pub quote_id: Option<Uuid>,
    pub warehouse_id: Uuid,
    pub lines: Vec<DocumentLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleDetail {
    pub sale: sale::Model,
    pub items: Vec<sale_item::Model>,
    pub serials: Vec<sale_item_serial::Model>,
}

#[derive(Debug, Clone)]
pub struct SaleWriter {
    ledger: StockLedger,
    reservations: ReservationTracker,
    serials: SerialRegistry,
    kits: KitExpander,
    pricing: Arc<dyn PricingService>,
    clock: Arc<dyn Clock>,
}

/// Serialized demand with its validated serial numbers.
#[derive(Debug)]
struct SerializedDemand<'a> {
    demand: &'a LineDemand,
    serials: &'a [String],
}

impl SaleWriter {
    pub fn new(
        ledger: StockLedger,
        reservations: ReservationTracker,
        serials: SerialRegistry,
        pricing: Arc<dyn PricingService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            ledger,
            reservations,
            serials,
            kits: KitExpander::new(),
            pricing,
            clock,
        }
    }

    /// Checks that serials were supplied for exactly the serialized lines, in the right count.
    fn match_serials<'a>(
        demand: &'a [LineDemand],
        serials: &'a SerialsByLine,
        lines: &[DocumentLine],
    ) -> Result<Vec<SerializedDemand<'a>>, ServiceError> {
        let known: HashSet<Uuid> = lines.iter().map(|l| l.line_id).collect();
        if let Some(unknown) = serials.keys().find(|id| !known.contains(id)) {
            return Err(ServiceError::ValidationError(format!(
                "serials supplied for unknown line {}",
                unknown
            )));
        }

        let mut serialized_lines = HashSet::new();
        let mut matched = Vec::new();
        for d in demand.iter().filter(|d| d.product.is_serialized) {
            if d.kit_id.is_some() {
                return Err(ServiceError::ValidationError(format!(
                    "line {} contains serialized component {} inside a kit",
                    d.line_id, d.product.sku
                )));
            }
            let supplied = serials.get(&d.line_id).map(Vec::as_slice).unwrap_or(&[]);
            if supplied.len() as i32 != d.quantity {
                return Err(ServiceError::MissingSerials {
                    line_id: d.line_id,
                    expected: d.quantity,
                    supplied: supplied.len() as i32,
                });
            }
            serialized_lines.insert(d.line_id);
            matched.push(SerializedDemand {
                demand: d,
                serials: supplied,
            });
        }

        if let Some((line_id, _)) = serials
            .iter()
            .find(|(id, s)| !s.is_empty() && !serialized_lines.contains(*id))
        {
            return Err(ServiceError::ValidationError(format!(
                "line {} is not serialized but serial numbers were supplied",
                line_id
            )));
        }
        Ok(matched)
    }

    /// Writes a sale and its stock effects. Everything is validated against
    /// locked rows before the first write.
    #[instrument(skip(self, conn, source, serials), fields(order_id = ?source.order_id, quote_id = ?source.quote_id))]
    pub async fn write<C: ConnectionTrait>(
        &self,
        conn: &C,
        source: &SaleSource,
        serials: &SerialsByLine,
        mode: StockMode,
        actor: Actor,
    ) -> Result<SaleDetail, ServiceError> {
        let warehouse_id = source.warehouse_id;
        let demand = self
            .kits
            .resolve_lines(conn, &stock_lines(&source.lines))
            .await?;
        let serialized = Self::match_serials(&demand, serials, &source.lines)?;

        let balances = self
            .ledger
            .lock_in_order(conn, &stock_keys(&demand, warehouse_id))
            .await?;

        let mut units_by_line: HashMap<Uuid, Vec<serialized_unit::Model>> = HashMap::new();
        let mut by_product: Vec<&SerializedDemand> = serialized.iter().collect();
        by_product.sort_by_key(|s| s.demand.product.id);
        for s in by_product {
            let units = self
                .serials
                .lock_available(conn, s.demand.product.id, warehouse_id, s.serials)
                .await?;
            units_by_line.insert(s.demand.line_id, units);
        }

        let mut totals: BTreeMap<Uuid, i32> = BTreeMap::new();
        for d in &demand {
            let total = totals.entry(d.product.id).or_default();
            *total = add_quantity(*total, d.quantity, d.product.id)?;
        }
        for (product_id, quantity) in &totals {
            let balance = &balances[&(*product_id, warehouse_id)];
            let needed = match mode {
                StockMode::ConsumeReservation => {
                    ConsumeSplit::compute(balance.reserved, *quantity).remainder
                }
                StockMode::Direct => *quantity,
            };
            if needed > balance.available() {
                return Err(ServiceError::InsufficientStock {
                    product_id: *product_id,
                    warehouse_id,
                    available: balance.available(),
                    requested: needed,
                });
            }
        }

        let now = self.clock.now();
        let sale_id = Uuid::new_v4();
        let priced: Vec<PricedLine> = source
            .lines
            .iter()
            .map(|l| PricedLine {
                quantity: l.quantity,
                unit_price: l.unit_price,
            })
            .collect();
        let amounts = self.pricing.totals(&priced);

        let sale = sale::ActiveModel {
            id: Set(sale_id),
            sale_number: Set(document_number("SAL", sale_id)),
            order_id: Set(source.order_id),
            quote_id: Set(source.quote_id),
            warehouse_id: Set(warehouse_id),
            status: Set(SaleStatus::Completed),
            subtotal: Set(amounts.subtotal),
            tax: Set(amounts.tax),
            total: Set(amounts.total),
            created_by: Set(actor.id()),
            created_at: Set(now),
        }
        .insert(conn)
        .await?;

        let mut items = Vec::with_capacity(source.lines.len());
        let mut item_for_line = HashMap::new();
        for line in &source.lines {
            let item = sale_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                sale_id: Set(sale_id),
                item_kind: Set(line.item.kind()),
                item_id: Set(line.item.id()),
                quantity: Set(line.quantity),
                unit_price: Set(line.unit_price),
                position: Set(line.position),
            }
            .insert(conn)
            .await?;
            item_for_line.insert(line.line_id, item.id);
            items.push(item);
        }

        let mut sold_serials = Vec::new();
        for d in &demand {
            let product_id = d.product.id;
            match (units_by_line.get(&d.line_id), mode) {
                (Some(units), StockMode::ConsumeReservation) => {
                    self.reservations
                        .settle(conn, product_id, warehouse_id, d.quantity)
                        .await?;
                    self.serials
                        .sell(conn, units, warehouse_id, sale_id, actor)
                        .await?;
                }
                (Some(units), StockMode::Direct) => {
                    self.serials
                        .sell(conn, units, warehouse_id, sale_id, actor)
                        .await?;
                }
                (None, StockMode::ConsumeReservation) => {
                    self.reservations
                        .consume(conn, product_id, warehouse_id, d.quantity, sale_id, actor)
                        .await?;
                }
                (None, StockMode::Direct) => {
                    self.ledger
                        .record(
                            conn,
                            NewMovement::new(
                                product_id,
                                warehouse_id,
                                -d.quantity,
                                MovementReason::SaleUnreserved,
                            )
                            .reference(ReferenceKind::Sale, sale_id)
                            .by(actor),
                        )
                        .await?;
                }
            }

            if let Some(units) = units_by_line.get(&d.line_id) {
                let sale_item_id = item_for_line.get(&d.line_id).copied().ok_or_else(|| {
                    ServiceError::InternalError(format!("no sale item for line {}", d.line_id))
                })?;
                for unit in units {
                    let link = sale_item_serial::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        sale_item_id: Set(sale_item_id),
                        serialized_unit_id: Set(unit.id),
                        serial_number: Set(unit.serial_number.clone()),
                    }
                    .insert(conn)
                    .await?;
                    sold_serials.push(link);
                }
            }
        }

        debug!(sale_id = %sale_id, lines = items.len(), serials = sold_serials.len(), "sale written");
        Ok(SaleDetail {
            sale,
            items,
            serials: sold_serials,
        })
    }
}

/// Loads a sale with its lines and consumed serials.
pub async fn load_sale<C: ConnectionTrait>(
    conn: &C,
    sale: sale::Model,
) -> Result<SaleDetail, ServiceError> {
    let items = sale_item::Entity::find()
        .filter(sale_item::Column::SaleId.eq(sale.id))
        .all(conn)
        .await?;
    let item_ids: Vec<Uuid> = items.iter().map(|i| i.id).collect();
    let serials = if item_ids.is_empty() {
        Vec::new()
    } else {
        sale_item_serial::Entity::find()
            .filter(sale_item_serial::Column::SaleItemId.is_in(item_ids))
            .all(conn)
            .await?
    };
    Ok(SaleDetail {
        sale,
        items,
        serials,
    })
}

pub async fn find_sale_for_order<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> Result<Option<sale::Model>, ServiceError> {
    Ok(Sale::find()
        .filter(sale::Column::OrderId.eq(order_id))
        .one(conn)
        .await?)
}
