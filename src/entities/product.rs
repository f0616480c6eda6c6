use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub sku: String,
    pub name: String,
    /// Units carry individual serial numbers
    pub is_serialized: bool,
    /// Composite product resolved through `kit_components`
    pub is_kit: bool,
    pub default_supplier_id: Option<Uuid>,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub last_purchase_cost: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::kit_component::Entity")]
    KitComponents,
    #[sea_orm(has_many = "super::inventory_balance::Entity")]
    InventoryBalances,
    #[sea_orm(has_many = "super::serialized_unit::Entity")]
    SerializedUnits,
}

impl Related<super::kit_component::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::KitComponents.def()
    }
}

impl Related<super::inventory_balance::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InventoryBalances.def()
    }
}

impl Related<super::serialized_unit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SerializedUnits.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
