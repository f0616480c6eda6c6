//! Line input shared by quotes and orders.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::entities::{order_item, quote_item, LineItemRef};
use crate::services::kits::StockLine;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LineInput {
    pub item: LineItemRef,
    #[validate(range(min = 1, max = 1_000_000, message = "quantity must be 1-1000000"))]
    pub quantity: i32,
    #[validate(custom = "validate_price")]
    pub unit_price: Decimal,
}

fn validate_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() {
        return Err(ValidationError::new("negative_unit_price"));
    }
    Ok(())
}

pub fn validate_lines(lines: &[LineInput]) -> Result<(), validator::ValidationErrors> {
    lines.iter().try_for_each(|line| line.validate())
}

/// A persisted document line, whatever document it belongs to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DocumentLine {
    pub line_id: Uuid,
    pub item: LineItemRef,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub position: i32,
}

impl DocumentLine {
    pub fn stock_line(&self) -> StockLine {
        StockLine {
            line_id: self.line_id,
            item: self.item,
            quantity: self.quantity,
        }
    }
}

impl From<&order_item::Model> for DocumentLine {
    fn from(m: &order_item::Model) -> Self {
        Self {
            line_id: m.id,
            item: m.item(),
            quantity: m.quantity,
            unit_price: m.unit_price,
            position: m.position,
        }
    }
}

impl From<&quote_item::Model> for DocumentLine {
    fn from(m: &quote_item::Model) -> Self {
        Self {
            line_id: m.id,
            item: m.item(),
            quantity: m.quantity,
            unit_price: m.unit_price,
            position: m.position,
        }
    }
}

pub fn stock_lines(lines: &[DocumentLine]) -> Vec<StockLine> {
    lines.iter().map(DocumentLine::stock_line).collect()
}
