use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "serialized_units")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub product_id: Uuid,
    /// `None` for legacy units recorded before warehouses were tracked
    pub warehouse_id: Option<Uuid>,
    pub serial_number: String,
    pub state: UnitState,
    pub originating_purchase_id: Option<Uuid>,
    pub sale_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    /// A unit is in scope for a warehouse when it matches or has no warehouse recorded.
    pub fn in_warehouse_scope(&self, warehouse_id: Uuid) -> bool {
        self.warehouse_id.map_or(true, |w| w == warehouse_id)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UnitState {
    #[sea_orm(string_value = "in_stock")]
    InStock,
    #[sea_orm(string_value = "sold")]
    Sold,
    #[sea_orm(string_value = "written_off")]
    WrittenOff,
}

impl UnitState {
    pub fn is_terminal(self) -> bool {
        matches!(self, UnitState::Sold | UnitState::WrittenOff)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
