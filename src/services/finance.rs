//! Payables and bank movements behind purchase receipts.

use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::db::for_update;
use crate::entities::bank_account::{self, Entity as BankAccount};
use crate::entities::bank_movement::{self, BankMovementKind, Entity as BankMovement};
use crate::entities::payable::{self, Entity as Payable, PayableStatus};
use crate::errors::ServiceError;
use crate::services::collaborators::Clock;
use crate::services::ServiceContext;

/// What happened to a purchase's payable when the purchase was reversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayableReversal {
    /// Nothing had been paid, the record is gone
    Deleted,
    /// Partly or fully paid, kept for the audit trail
    Cancelled,
    Missing,
}

/// Transaction-scoped money operations.
#[derive(Debug, Clone)]
pub struct Treasury {
    clock: Arc<dyn Clock>,
}

impl Treasury {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub async fn open_payable<C: ConnectionTrait>(
        &self,
        conn: &C,
        purchase_id: Uuid,
        total: Decimal,
    ) -> Result<payable::Model, ServiceError> {
        let now = self.clock.now();
        Ok(payable::ActiveModel {
            id: Set(Uuid::new_v4()),
            purchase_id: Set(purchase_id),
            amount_total: Set(total),
            amount_paid: Set(Decimal::ZERO),
            amount_pending: Set(total),
            status: Set(PayableStatus::Pending),
            notes: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(conn)
        .await?)
    }

    pub async fn settle_payable<C: ConnectionTrait>(
        &self,
        conn: &C,
        payable: payable::Model,
    ) -> Result<payable::Model, ServiceError> {
        let total = payable.amount_total;
        let mut active: payable::ActiveModel = payable.into();
        active.amount_paid = Set(total);
        active.amount_pending = Set(Decimal::ZERO);
        active.status = Set(PayableStatus::Paid);
        active.updated_at = Set(self.clock.now());
        Ok(active.update(conn).await?)
    }

    /// Unpaid payables are deleted; paid ones are kept as `cancelled` with a note.
    pub async fn reverse_payable<C: ConnectionTrait>(
        &self,
        conn: &C,
        purchase_id: Uuid,
        note: &str,
    ) -> Result<PayableReversal, ServiceError> {
        let query = Payable::find().filter(payable::Column::PurchaseId.eq(purchase_id));
        let Some(payable) = for_update(query, conn).one(conn).await? else {
            return Ok(PayableReversal::Missing);
        };

        if payable.amount_paid.is_zero() {
            payable.delete(conn).await?;
            return Ok(PayableReversal::Deleted);
        }

        let notes = append_note(payable.notes.as_deref(), note);
        let mut active: payable::ActiveModel = payable.into();
        active.status = Set(PayableStatus::Cancelled);
        active.amount_pending = Set(Decimal::ZERO);
        active.notes = Set(Some(notes));
        active.updated_at = Set(self.clock.now());
        active.update(conn).await?;
        Ok(PayableReversal::Cancelled)
    }

    async fn post<C: ConnectionTrait>(
        &self,
        conn: &C,
        account_id: Uuid,
        kind: BankMovementKind,
        amount: Decimal,
        purchase_id: Option<Uuid>,
        description: String,
    ) -> Result<bank_movement::Model, ServiceError> {
        let account = for_update(BankAccount::find_by_id(account_id), conn)
            .one(conn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Bank account {} not found", account_id))
            })?;

        let balance = match kind {
            BankMovementKind::Deposit => account.balance + amount,
            BankMovementKind::Withdrawal => account.balance - amount,
        };
        let mut active: bank_account::ActiveModel = account.into();
        active.balance = Set(balance);
        active.updated_at = Set(self.clock.now());
        active.update(conn).await?;

        Ok(bank_movement::ActiveModel {
            id: Set(Uuid::new_v4()),
            bank_account_id: Set(account_id),
            kind: Set(kind),
            amount: Set(amount),
            description: Set(description),
            purchase_id: Set(purchase_id),
            created_at: Set(self.clock.now()),
        }
        .insert(conn)
        .await?)
    }

    pub async fn withdraw<C: ConnectionTrait>(
        &self,
        conn: &C,
        account_id: Uuid,
        amount: Decimal,
        purchase_id: Option<Uuid>,
        description: String,
    ) -> Result<bank_movement::Model, ServiceError> {
        self.post(
            conn,
            account_id,
            BankMovementKind::Withdrawal,
            amount,
            purchase_id,
            description,
        )
        .await
    }

    pub async fn deposit<C: ConnectionTrait>(
        &self,
        conn: &C,
        account_id: Uuid,
        amount: Decimal,
        purchase_id: Option<Uuid>,
        description: String,
    ) -> Result<bank_movement::Model, ServiceError> {
        self.post(
            conn,
            account_id,
            BankMovementKind::Deposit,
            amount,
            purchase_id,
            description,
        )
        .await
    }
}

/// Appends a line to free-text notes.
pub fn append_note(existing: Option<&str>, note: &str) -> String {
    match existing {
        Some(text) if !text.trim().is_empty() => format!("{}\n{}", text, note),
        _ => note.to_string(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateBankAccountRequest {
    #[validate(length(min = 1, max = 120, message = "name must be 1-120 characters"))]
    pub name: String,
    #[serde(default)]
    pub opening_balance: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankAccountDetail {
    pub account: bank_account::Model,
    pub movements: Vec<bank_movement::Model>,
}

#[derive(Debug, Clone)]
pub struct BankAccountService {
    ctx: ServiceContext,
}

impl BankAccountService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create(
        &self,
        request: CreateBankAccountRequest,
    ) -> Result<bank_account::Model, ServiceError> {
        request.validate()?;
        let now = self.ctx.clock.now();
        let txn = self.ctx.db_pool.begin().await?;
        let account = bank_account::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name),
            balance: Set(request.opening_balance),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;
        txn.commit().await?;

        info!(account_id = %account.id, "bank account created");
        Ok(account)
    }

    pub async fn get(&self, id: Uuid) -> Result<BankAccountDetail, ServiceError> {
        let db = self.ctx.db_pool.as_ref();
        let account = BankAccount::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Bank account {} not found", id)))?;
        let movements = BankMovement::find()
            .filter(bank_movement::Column::BankAccountId.eq(id))
            .order_by_asc(bank_movement::Column::CreatedAt)
            .all(db)
            .await?;
        Ok(BankAccountDetail { account, movements })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notes_are_appended_on_new_lines() {
        assert_eq!(append_note(None, "a"), "a");
        assert_eq!(append_note(Some("  "), "a"), "a");
        assert_eq!(append_note(Some("first"), "second"), "first\nsecond");
    }
}
