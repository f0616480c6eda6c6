//! Interfaces to systems outside the fulfillment pipeline.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use uuid::Uuid;

/// Source of "now" for document and ledger timestamps.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// A line as seen by the pricing collaborator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricedLine {
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DocumentTotals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

/// Tax and total computation. Called while stock rows are locked, so
/// implementations must not perform I/O.
pub trait PricingService: Send + Sync + Debug {
    fn totals(&self, lines: &[PricedLine]) -> DocumentTotals;
}

/// Quantity times unit price, no tax.
#[derive(Debug, Default, Clone, Copy)]
pub struct FlatPricing;

impl PricingService for FlatPricing {
    fn totals(&self, lines: &[PricedLine]) -> DocumentTotals {
        let subtotal = lines
            .iter()
            .map(|l| Decimal::from(l.quantity) * l.unit_price)
            .sum::<Decimal>();
        DocumentTotals {
            subtotal,
            tax: Decimal::ZERO,
            total: subtotal,
        }
    }
}

/// User on whose behalf a mutation runs, recorded in audit columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Actor(pub Option<Uuid>);

impl Actor {
    pub fn system() -> Self {
        Actor(None)
    }

    pub fn user(id: Uuid) -> Self {
        Actor(Some(id))
    }

    pub fn id(&self) -> Option<Uuid> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn flat_pricing_sums_lines_without_tax() {
        let totals = FlatPricing.totals(&[
            PricedLine {
                quantity: 3,
                unit_price: dec!(10.50),
            },
            PricedLine {
                quantity: 1,
                unit_price: dec!(4.00),
            },
        ]);
        assert_eq!(totals.subtotal, dec!(35.50));
        assert_eq!(totals.tax, Decimal::ZERO);
        assert_eq!(totals.total, dec!(35.50));
    }

    #[test]
    fn empty_document_totals_zero() {
        assert_eq!(FlatPricing.totals(&[]), DocumentTotals::default());
    }
}
