//! Unit of Work pattern implementation.
//!
//! Centralizes repository access and runs multi-step writes inside a single
//! database transaction.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    AccessMode, ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, IsolationLevel, QueryFilter, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use super::repositories::entities::{employee, experiment_note, password_reset_token};
use super::repositories::{
    EmployeeRepository, EmployeeStore, NoteRepository, NoteStore, PasswordResetRepository,
    PasswordResetStore,
};
use crate::domain::Employee;
use crate::errors::{AppError, AppResult};

/// Unit of Work trait for dependency injection.
///
/// Services reach every repository through this trait, so tests can swap
/// in fakes without a database.
pub trait UnitOfWork: Send + Sync {
    fn employees(&self) -> Arc<dyn EmployeeRepository>;

    fn notes(&self) -> Arc<dyn NoteRepository>;

    fn password_resets(&self) -> Arc<dyn PasswordResetRepository>;
}

/// Repository access bound to one open transaction.
pub(crate) struct TransactionContext<'a> {
    txn: &'a DatabaseTransaction,
}

impl<'a> TransactionContext<'a> {
    fn new(txn: &'a DatabaseTransaction) -> Self {
        Self { txn }
    }

    pub fn employees(&self) -> TxEmployeeRepository<'_> {
        TxEmployeeRepository { txn: self.txn }
    }

    pub fn notes(&self) -> TxNoteRepository<'_> {
        TxNoteRepository { txn: self.txn }
    }

    pub fn password_resets(&self) -> TxPasswordResetRepository<'_> {
        TxPasswordResetRepository { txn: self.txn }
    }
}

/// Execute `f` in a transaction, committing on `Ok` and rolling back on `Err`.
pub(crate) async fn run_in_transaction<F, T>(
    db: &DatabaseConnection,
    isolation: IsolationLevel,
    f: F,
) -> AppResult<T>
where
    F: for<'a> FnOnce(
            TransactionContext<'a>,
        ) -> Pin<Box<dyn Future<Output = AppResult<T>> + Send + 'a>>
        + Send,
    T: Send,
{
    let txn = db
        .begin_with_config(Some(isolation), Some(AccessMode::ReadWrite))
        .await?;

    let ctx = TransactionContext::new(&txn);

    match f(ctx).await {
        Ok(result) => {
            txn.commit().await?;
            Ok(result)
        }
        Err(e) => {
            if let Err(rollback_err) = txn.rollback().await {
                tracing::error!("Transaction rollback failed: {}", rollback_err);
            }
            Err(e)
        }
    }
}

/// Concrete implementation of UnitOfWork
pub struct Persistence {
    employees: Arc<EmployeeStore>,
    notes: Arc<NoteStore>,
    password_resets: Arc<PasswordResetStore>,
}

impl Persistence {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            employees: Arc::new(EmployeeStore::new(db.clone())),
            notes: Arc::new(NoteStore::new(db.clone())),
            password_resets: Arc::new(PasswordResetStore::new(db)),
        }
    }
}

impl UnitOfWork for Persistence {
    fn employees(&self) -> Arc<dyn EmployeeRepository> {
        self.employees.clone()
    }

    fn notes(&self) -> Arc<dyn NoteRepository> {
        self.notes.clone()
    }

    fn password_resets(&self) -> Arc<dyn PasswordResetRepository> {
        self.password_resets.clone()
    }
}

/// Employee operations that must share a transaction.
pub(crate) struct TxEmployeeRepository<'a> {
    txn: &'a DatabaseTransaction,
}

impl<'a> TxEmployeeRepository<'a> {
    /// Inactive employee holding `token`, locked `FOR UPDATE`.
    pub async fn find_pending_for_update(&self, token: &str) -> AppResult<Option<employee::Model>> {
        let model = employee::Entity::find()
            .filter(employee::Column::Token.eq(token))
            .filter(employee::Column::IsActive.eq(false))
            .lock_exclusive()
            .one(self.txn)
            .await?;
        Ok(model)
    }

    /// Flip the account to active and consume its token.
    pub async fn activate(&self, model: employee::Model) -> AppResult<Employee> {
        let mut active: employee::ActiveModel = model.into();
        active.is_active = Set(true);
        active.token = Set(None);
        active.updated_at = Set(chrono::Utc::now());

        let model = active.update(self.txn).await?;
        Ok(Employee::from(model))
    }

    pub async fn set_password(&self, id: Uuid, password_hash: String) -> AppResult<Employee> {
        let mut active = employee::ActiveModel {
            id: Set(id),
            ..Default::default()
        };
        active.password_hash = Set(password_hash);
        active.updated_at = Set(chrono::Utc::now());

        let model = active.update(self.txn).await.map_err(|e| match e {
            sea_orm::DbErr::RecordNotUpdated => AppError::NotFound,
            other => AppError::from(other),
        })?;
        Ok(Employee::from(model))
    }

    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let result = employee::Entity::delete_by_id(id).exec(self.txn).await?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound);
        }

        Ok(())
    }
}

/// Note operations that must share a transaction.
pub(crate) struct TxNoteRepository<'a> {
    txn: &'a DatabaseTransaction,
}

impl<'a> TxNoteRepository<'a> {
    /// Remove every note of `owner_id`, returning how many were deleted.
    pub async fn delete_by_owner(&self, owner_id: Uuid) -> AppResult<u64> {
        let result = experiment_note::Entity::delete_many()
            .filter(experiment_note::Column::OwnerId.eq(owner_id))
            .exec(self.txn)
            .await?;
        Ok(result.rows_affected)
    }
}

/// Reset token operations that must share a transaction.
pub(crate) struct TxPasswordResetRepository<'a> {
    txn: &'a DatabaseTransaction,
}

impl<'a> TxPasswordResetRepository<'a> {
    /// Unused, unexpired token row, locked `FOR UPDATE`.
    pub async fn find_redeemable_for_update(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<password_reset_token::Model>> {
        let model = password_reset_token::Entity::find()
            .filter(password_reset_token::Column::Token.eq(token))
            .filter(password_reset_token::Column::Used.eq(false))
            .filter(password_reset_token::Column::ExpiresAt.gt(now))
            .lock_exclusive()
            .one(self.txn)
            .await?;
        Ok(model)
    }

    /// Mark every outstanding token of `employee_id` as used.
    pub async fn consume_all_for(&self, employee_id: Uuid) -> AppResult<u64> {
        let result = password_reset_token::Entity::update_many()
            .col_expr(password_reset_token::Column::Used, Expr::value(true))
            .filter(password_reset_token::Column::EmployeeId.eq(employee_id))
            .filter(password_reset_token::Column::Used.eq(false))
            .exec(self.txn)
            .await?;
        Ok(result.rows_affected)
    }
}
