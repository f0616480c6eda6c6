//! Shared shape of quote, order and sale lines.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

/// Discriminator column stored next to `item_id` on every document line.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
    Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LineKind {
    #[sea_orm(string_value = "product")]
    Product,
    #[sea_orm(string_value = "service")]
    Service,
    #[sea_orm(string_value = "kit")]
    Kit,
}

/// What a document line points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum LineItemRef {
    Product(Uuid),
    /// Services carry no stock
    Service(Uuid),
    Kit(Uuid),
}

impl LineItemRef {
    pub fn from_parts(kind: LineKind, id: Uuid) -> Self {
        match kind {
            LineKind::Product => LineItemRef::Product(id),
            LineKind::Service => LineItemRef::Service(id),
            LineKind::Kit => LineItemRef::Kit(id),
        }
    }

    pub fn kind(&self) -> LineKind {
        match self {
            LineItemRef::Product(_) => LineKind::Product,
            LineItemRef::Service(_) => LineKind::Service,
            LineItemRef::Kit(_) => LineKind::Kit,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            LineItemRef::Product(id) | LineItemRef::Service(id) | LineItemRef::Kit(id) => *id,
        }
    }

    /// Product whose stock this line touches, if any.
    pub fn stock_item(&self) -> Option<Uuid> {
        match self {
            LineItemRef::Product(id) | LineItemRef::Kit(id) => Some(*id),
            LineItemRef::Service(_) => None,
        }
    }
}
