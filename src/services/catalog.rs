//! Products and kit definitions.

use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::entities::kit_component;
use crate::entities::product::{self, Entity as Product};
use crate::errors::ServiceError;
use crate::services::kits::KitExpander;
use crate::services::{find_by_id, ServiceContext};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct KitComponentInput {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 10_000, message = "quantity_per_unit must be 1-10000"))]
    pub quantity_per_unit: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 64, message = "sku must be 1-64 characters"))]
    pub sku: String,
    #[validate(length(min = 1, max = 255, message = "name must be 1-255 characters"))]
    pub name: String,
    #[serde(default)]
    pub is_serialized: bool,
    #[serde(default)]
    pub is_kit: bool,
    pub default_supplier_id: Option<Uuid>,
    #[serde(default)]
    #[validate(custom = "validate_cost")]
    pub last_purchase_cost: Decimal,
    #[serde(default)]
    pub components: Vec<KitComponentInput>,
}

fn validate_cost(cost: &Decimal) -> Result<(), ValidationError> {
    if cost.is_sign_negative() {
        return Err(ValidationError::new("negative_cost"));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductDetail {
    pub product: product::Model,
    pub components: Vec<kit_component::Model>,
}

#[derive(Debug, Clone)]
pub struct ProductService {
    ctx: ServiceContext,
}

impl ProductService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Creates a product. Kit components must be existing, non-kit products.
    #[instrument(skip(self, request), fields(sku = %request.sku))]
    pub async fn create(
        &self,
        request: CreateProductRequest,
    ) -> Result<ProductDetail, ServiceError> {
        request.validate()?;
        request.components.iter().try_for_each(|c| c.validate())?;
        if request.is_kit && request.is_serialized {
            return Err(ServiceError::ValidationError(
                "a kit cannot be serialized".to_string(),
            ));
        }
        if !request.is_kit && !request.components.is_empty() {
            return Err(ServiceError::ValidationError(
                "only kits have components".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = request.components.iter().find(|c| !seen.insert(c.product_id)) {
            return Err(ServiceError::ValidationError(format!(
                "component {} listed more than once",
                dup.product_id
            )));
        }

        let txn = self.ctx.db_pool.begin().await?;
        if Product::find()
            .filter(product::Column::Sku.eq(request.sku.as_str()))
            .one(&txn)
            .await?
            .is_some()
        {
            return Err(ServiceError::ValidationError(format!(
                "sku {} already exists",
                request.sku
            )));
        }
        for component in &request.components {
            let part = find_by_id::<Product, _>(&txn, component.product_id, "Product").await?;
            if part.is_kit {
                return Err(ServiceError::ValidationError(format!(
                    "component {} is itself a kit",
                    part.sku
                )));
            }
        }

        let now = self.ctx.clock.now();
        let id = Uuid::new_v4();
        let product = product::ActiveModel {
            id: Set(id),
            sku: Set(request.sku),
            name: Set(request.name),
            is_serialized: Set(request.is_serialized),
            is_kit: Set(request.is_kit),
            default_supplier_id: Set(request.default_supplier_id),
            last_purchase_cost: Set(request.last_purchase_cost),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let mut components = Vec::with_capacity(request.components.len());
        for (position, component) in request.components.iter().enumerate() {
            components.push(
                kit_component::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    kit_product_id: Set(id),
                    component_product_id: Set(component.product_id),
                    quantity_per_unit: Set(component.quantity_per_unit),
                    position: Set(position as i32),
                }
                .insert(&txn)
                .await?,
            );
        }
        txn.commit().await?;

        info!(product_id = %id, sku = %product.sku, components = components.len(), "product created");
        Ok(ProductDetail {
            product,
            components,
        })
    }

    pub async fn get(&self, product_id: Uuid) -> Result<ProductDetail, ServiceError> {
        let db = self.ctx.db_pool.as_ref();
        let product = find_by_id::<Product, _>(db, product_id, "Product").await?;
        let components = KitExpander::new().components(db, product_id).await?;
        Ok(ProductDetail {
            product,
            components,
        })
    }
}
