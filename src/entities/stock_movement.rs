use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

/// Append-only ledger row. Rows are never updated or deleted.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_movements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    /// Positive for stock in, negative for stock out
    pub quantity: i32,
    pub reason: MovementReason,
    pub reference_kind: Option<ReferenceKind>,
    pub reference_id: Option<Uuid>,
    pub is_reconciliation: bool,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MovementReason {
    #[sea_orm(string_value = "purchase_receipt")]
    PurchaseReceipt,
    #[sea_orm(string_value = "purchase_cancelled")]
    PurchaseCancelled,
    /// Portion of a sale that was covered by the order's reservation
    #[sea_orm(string_value = "sale_reserved")]
    SaleReserved,
    /// Portion of a sale drawn from unreserved stock
    #[sea_orm(string_value = "sale_unreserved")]
    SaleUnreserved,
    #[sea_orm(string_value = "serial_sold")]
    SerialSold,
    #[sea_orm(string_value = "adjustment_increase")]
    AdjustmentIncrease,
    #[sea_orm(string_value = "adjustment_decrease")]
    AdjustmentDecrease,
    #[sea_orm(string_value = "serial_written_off")]
    SerialWrittenOff,
    #[sea_orm(string_value = "reconciliation")]
    Reconciliation,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReferenceKind {
    #[sea_orm(string_value = "purchase")]
    Purchase,
    #[sea_orm(string_value = "sale")]
    Sale,
    #[sea_orm(string_value = "adjustment")]
    Adjustment,
    #[sea_orm(string_value = "order")]
    Order,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
