pub mod bank_account;
pub mod bank_movement;
pub mod inventory_balance;
pub mod kit_component;
pub mod line_item;
pub mod order;
pub mod order_item;
pub mod payable;
pub mod product;
pub mod purchase;
pub mod purchase_item;
pub mod purchase_order;
pub mod purchase_order_item;
pub mod quote;
pub mod quote_item;
pub mod sale;
pub mod sale_item;
pub mod sale_item_serial;
pub mod serialized_unit;
pub mod stock_movement;

pub use line_item::{LineItemRef, LineKind};
