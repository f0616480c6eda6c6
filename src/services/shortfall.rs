//! Groups stock shortfalls into per-supplier procurement batches.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Procurement facts about one component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProductSupply {
    pub default_supplier_id: Option<Uuid>,
    pub last_purchase_cost: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortfallLine {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_cost: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierBatch {
    pub supplier_id: Uuid,
    pub lines: Vec<ShortfallLine>,
}

/// Pure shortfall calculation. Products without a default supplier fall back
/// to `generic_supplier_id`.
#[derive(Debug, Clone, Copy)]
pub struct ShortfallConsolidator {
    generic_supplier_id: Uuid,
}

impl ShortfallConsolidator {
    pub fn new(generic_supplier_id: Uuid) -> Self {
        Self {
            generic_supplier_id,
        }
    }

    /// `demand` may repeat products; batches and their lines keep the order
    /// in which products first appear. Missing availability counts as zero.
    pub fn consolidate(
        &self,
        demand: &[(Uuid, i32)],
        available: &HashMap<Uuid, i32>,
        supply: &HashMap<Uuid, ProductSupply>,
    ) -> Vec<SupplierBatch> {
        let mut needed: Vec<(Uuid, i32)> = Vec::new();
        for &(product_id, quantity) in demand {
            match needed.iter_mut().find(|(id, _)| *id == product_id) {
                Some((_, total)) => *total = total.saturating_add(quantity),
                None => needed.push((product_id, quantity)),
            }
        }

        let mut batches: Vec<SupplierBatch> = Vec::new();
        for (product_id, quantity) in needed {
            let on_shelf = available.get(&product_id).copied().unwrap_or(0).max(0);
            let shortfall = quantity - on_shelf;
            if shortfall <= 0 {
                continue;
            }

            let facts = supply.get(&product_id);
            let supplier_id = facts
                .and_then(|s| s.default_supplier_id)
                .unwrap_or(self.generic_supplier_id);
            let line = ShortfallLine {
                product_id,
                quantity: shortfall,
                unit_cost: facts.map(|s| s.last_purchase_cost).unwrap_or(Decimal::ZERO),
            };

            match batches.iter_mut().find(|b| b.supplier_id == supplier_id) {
                Some(batch) => batch.lines.push(line),
                None => batches.push(SupplierBatch {
                    supplier_id,
                    lines: vec![line],
                }),
            }
        }
        batches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn supply(supplier: Option<Uuid>, cost: Decimal) -> ProductSupply {
        ProductSupply {
            default_supplier_id: supplier,
            last_purchase_cost: cost,
        }
    }

    #[test]
    fn kit_demand_only_orders_the_short_component() {
        let generic = Uuid::new_v4();
        let supplier = Uuid::new_v4();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        let batches = ShortfallConsolidator::new(generic).consolidate(
            &[(a, 6), (b, 3)],
            &HashMap::from([(a, 4), (b, 10)]),
            &HashMap::from([
                (a, supply(Some(supplier), dec!(2.50))),
                (b, supply(Some(supplier), dec!(1.00))),
            ]),
        );

        assert_eq!(
            batches,
            vec![SupplierBatch {
                supplier_id: supplier,
                lines: vec![ShortfallLine {
                    product_id: a,
                    quantity: 2,
                    unit_cost: dec!(2.50)
                }],
            }]
        );
    }

    #[test]
    fn repeated_products_are_summed_before_comparing() {
        let a = Uuid::new_v4();
        let batches = ShortfallConsolidator::new(Uuid::new_v4()).consolidate(
            &[(a, 3), (a, 4)],
            &HashMap::from([(a, 5)]),
            &HashMap::new(),
        );
        assert_eq!(batches[0].lines[0].quantity, 2);
    }

    #[test]
    fn products_without_supplier_go_to_generic() {
        let generic = Uuid::new_v4();
        let known = Uuid::new_v4();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        let batches = ShortfallConsolidator::new(generic).consolidate(
            &[(a, 1), (b, 1), (c, 1)],
            &HashMap::new(),
            &HashMap::from([
                (a, supply(None, dec!(1))),
                (b, supply(Some(known), dec!(1))),
            ]),
        );

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].supplier_id, generic);
        assert_eq!(
            batches[0].lines.iter().map(|l| l.product_id).collect::<Vec<_>>(),
            vec![a, c]
        );
        assert_eq!(batches[1].supplier_id, known);
    }

    proptest! {
        #[test]
        fn shortfall_never_exceeds_demand(
            needed in 0i32..100,
            on_shelf in -5i32..100,
        ) {
            let a = Uuid::new_v4();
            let batches = ShortfallConsolidator::new(Uuid::nil()).consolidate(
                &[(a, needed)],
                &HashMap::from([(a, on_shelf)]),
                &HashMap::new(),
            );
            let ordered: i32 = batches
                .iter()
                .flat_map(|b| b.lines.iter())
                .map(|l| l.quantity)
                .sum();
            prop_assert_eq!(ordered, (needed - on_shelf.max(0)).max(0));
            prop_assert!(batches.iter().all(|b| !b.lines.is_empty()));
        }
    }
}
