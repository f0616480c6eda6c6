//! Kit expansion into component demand.

use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::entities::kit_component::{self, Entity as KitComponent};
use crate::entities::product::{self, Entity as Product};
use crate::entities::LineItemRef;
use crate::errors::ServiceError;

/// Quantity of one component product required by a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDemand {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// Multiplies each component by `quantity`, in `position` order.
///
/// Components with a non-positive per-unit quantity are skipped. An empty
/// result means the product is not actually a kit.
pub fn expand_components(
    components: &[kit_component::Model],
    quantity: i32,
) -> Result<Vec<ComponentDemand>, ServiceError> {
    let mut ordered: Vec<&kit_component::Model> = components.iter().collect();
    ordered.sort_by_key(|c| c.position);
    ordered
        .into_iter()
        .filter(|c| c.quantity_per_unit > 0)
        .map(|c| {
            let total = c.quantity_per_unit.checked_mul(quantity).ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "{} x {} units of component {} is out of range",
                    quantity, c.quantity_per_unit, c.component_product_id
                ))
            })?;
            Ok(ComponentDemand {
                product_id: c.component_product_id,
                quantity: total,
            })
        })
        .collect()
}

/// Stock demand of one document line after kit expansion.
#[derive(Debug, Clone)]
pub struct LineDemand {
    pub line_id: Uuid,
    pub product: product::Model,
    pub quantity: i32,
    /// Set when the product is a component of a kit line
    pub kit_id: Option<Uuid>,
}

/// A document line as the expander sees it.
#[derive(Debug, Clone, Copy)]
pub struct StockLine {
    pub line_id: Uuid,
    pub item: LineItemRef,
    pub quantity: i32,
}

#[derive(Debug, Clone, Default)]
pub struct KitExpander;

impl KitExpander {
    pub fn new() -> Self {
        Self
    }

    pub async fn components<C: ConnectionTrait>(
        &self,
        conn: &C,
        kit_id: Uuid,
    ) -> Result<Vec<kit_component::Model>, ServiceError> {
        Ok(KitComponent::find()
            .filter(kit_component::Column::KitProductId.eq(kit_id))
            .order_by_asc(kit_component::Column::Position)
            .all(conn)
            .await?)
    }

    pub async fn expand<C: ConnectionTrait>(
        &self,
        conn: &C,
        kit_id: Uuid,
        quantity: i32,
    ) -> Result<Vec<ComponentDemand>, ServiceError> {
        let components = self.components(conn, kit_id).await?;
        expand_components(&components, quantity)
    }

    /// Resolves document lines to the leaf products whose stock they move.
    ///
    /// Services drop out. A kit (by line kind or product flag) becomes its
    /// components; a kit with no components stands for itself.
    pub async fn resolve_lines<C: ConnectionTrait>(
        &self,
        conn: &C,
        lines: &[StockLine],
    ) -> Result<Vec<LineDemand>, ServiceError> {
        let mut products: HashMap<Uuid, product::Model> = HashMap::new();
        let mut demand = Vec::new();

        for line in lines {
            let Some(item_id) = line.item.stock_item() else {
                continue;
            };
            if line.quantity <= 0 {
                return Err(ServiceError::ValidationError(format!(
                    "line {} quantity must be positive",
                    line.line_id
                )));
            }
            let item = load_product(conn, &mut products, item_id).await?;

            let is_kit = item.is_kit || matches!(line.item, LineItemRef::Kit(_));
            let components = if is_kit {
                self.expand(conn, item.id, line.quantity).await?
            } else {
                Vec::new()
            };

            if components.is_empty() {
                demand.push(LineDemand {
                    line_id: line.line_id,
                    product: item,
                    quantity: line.quantity,
                    kit_id: None,
                });
                continue;
            }
            for component in components {
                let product = load_product(conn, &mut products, component.product_id).await?;
                demand.push(LineDemand {
                    line_id: line.line_id,
                    product,
                    quantity: component.quantity,
                    kit_id: Some(item.id),
                });
            }
        }
        Ok(demand)
    }
}

async fn load_product<C: ConnectionTrait>(
    conn: &C,
    cache: &mut HashMap<Uuid, product::Model>,
    id: Uuid,
) -> Result<product::Model, ServiceError> {
    if let Some(product) = cache.get(&id) {
        return Ok(product.clone());
    }
    let product = Product::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))?;
    cache.insert(id, product.clone());
    Ok(product)
}

/// Sums demand per product, keeping first-appearance order.
pub fn total_by_product(demand: &[LineDemand]) -> Result<Vec<(Uuid, i32)>, ServiceError> {
    let mut totals: Vec<(Uuid, i32)> = Vec::new();
    for d in demand {
        match totals.iter_mut().find(|(id, _)| *id == d.product.id) {
            Some((_, qty)) => *qty = add_quantity(*qty, d.quantity, d.product.id)?,
            None => totals.push((d.product.id, d.quantity)),
        }
    }
    Ok(totals)
}

/// Adds two quantities of the same product, rejecting totals past `i32::MAX`.
pub fn add_quantity(total: i32, quantity: i32, product_id: Uuid) -> Result<i32, ServiceError> {
    total.checked_add(quantity).ok_or_else(|| {
        ServiceError::ValidationError(format!(
            "total quantity of product {} is out of range",
            product_id
        ))
    })
}

/// (product, warehouse) keys for `StockLedger::lock_in_order`.
pub fn stock_keys(demand: &[LineDemand], warehouse_id: Uuid) -> Vec<(Uuid, Uuid)> {
    demand.iter().map(|d| (d.product.id, warehouse_id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn component(kit: Uuid, product: Uuid, per_unit: i32, position: i32) -> kit_component::Model {
        kit_component::Model {
            id: Uuid::new_v4(),
            kit_product_id: kit,
            component_product_id: product,
            quantity_per_unit: per_unit,
            position,
        }
    }

    #[test]
    fn multiplies_and_orders_components() {
        let kit = Uuid::new_v4();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let demand =
            expand_components(&[component(kit, b, 1, 2), component(kit, a, 2, 1)], 3).unwrap();
        assert_eq!(
            demand,
            vec![
                ComponentDemand {
                    product_id: a,
                    quantity: 6
                },
                ComponentDemand {
                    product_id: b,
                    quantity: 3
                },
            ]
        );
    }

    #[test]
    fn empty_component_list_is_not_a_kit() {
        assert!(expand_components(&[], 5).unwrap().is_empty());
    }

    #[test]
    fn zero_quantity_components_are_skipped() {
        let kit = Uuid::new_v4();
        let demand = expand_components(&[component(kit, Uuid::new_v4(), 0, 1)], 4).unwrap();
        assert!(demand.is_empty());
    }

    #[test]
    fn oversized_expansion_is_rejected() {
        let kit = Uuid::new_v4();
        let err = expand_components(&[component(kit, Uuid::new_v4(), 10_000, 1)], i32::MAX / 2)
            .unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }

    #[test]
    fn quantity_sum_past_i32_max_is_rejected() {
        let id = Uuid::new_v4();
        assert_eq!(add_quantity(2, 3, id).unwrap(), 5);
        assert!(matches!(
            add_quantity(i32::MAX, 1, id),
            Err(ServiceError::ValidationError(_))
        ));
    }

    proptest! {
        #[test]
        fn expansion_scales_linearly(
            per_unit in proptest::collection::vec(1i32..10, 0..6),
            quantity in 1i32..50,
        ) {
            let kit = Uuid::new_v4();
            let components: Vec<_> = per_unit
                .iter()
                .enumerate()
                .map(|(i, q)| component(kit, Uuid::new_v4(), *q, i as i32))
                .collect();
            let demand = expand_components(&components, quantity).unwrap();
            prop_assert_eq!(demand.len(), components.len());
            for (d, c) in demand.iter().zip(components.iter()) {
                prop_assert_eq!(d.product_id, c.component_product_id);
                prop_assert_eq!(d.quantity, c.quantity_per_unit * quantity);
            }
        }
    }
}
