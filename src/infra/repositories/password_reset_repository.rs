//! Password reset token repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IsolationLevel, QueryFilter,
    Set,
};
use uuid::Uuid;

use super::entities::password_reset_token::{self, ActiveModel, Entity as ResetTokenEntity};
use crate::domain::Employee;
use crate::errors::AppResult;
use crate::infra::unit_of_work::run_in_transaction;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Single-use tokens behind emailed password reset links.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait PasswordResetRepository: Send + Sync {
    /// Store a fresh token for `employee_id`, redeemable until `expires_at`.
    async fn issue(
        &self,
        employee_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Forget a token whose link never reached its recipient.
    async fn revoke(&self, token: &str) -> AppResult<()>;

    /// Set a new password through `token`, exactly once.
    ///
    /// Unknown, used and expired tokens yield `None`. The token row stays
    /// locked until the password is stored, and every other outstanding
    /// token of the same employee is consumed with it.
    async fn redeem(
        &self,
        token: &str,
        password_hash: String,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Employee>>;
}

/// SeaORM-backed reset token repository
pub struct PasswordResetStore {
    db: DatabaseConnection,
}

impl PasswordResetStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PasswordResetRepository for PasswordResetStore {
    async fn issue(
        &self,
        employee_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()> {
        ActiveModel {
            id: Set(Uuid::new_v4()),
            employee_id: Set(employee_id),
            token: Set(token.to_string()),
            expires_at: Set(expires_at),
            used: Set(false),
            created_at: Set(Utc::now()),
        }
        .insert(&self.db)
        .await?;
        Ok(())
    }

    async fn revoke(&self, token: &str) -> AppResult<()> {
        ResetTokenEntity::delete_many()
            .filter(password_reset_token::Column::Token.eq(token))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn redeem(
        &self,
        token: &str,
        password_hash: String,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Employee>> {
        let token = token.to_string();
        run_in_transaction(&self.db, IsolationLevel::ReadCommitted, move |ctx| {
            Box::pin(async move {
                let resets = ctx.password_resets();
                let Some(found) = resets.find_redeemable_for_update(&token, now).await? else {
                    return Ok(None);
                };

                resets.consume_all_for(found.employee_id).await?;
                let employee = ctx
                    .employees()
                    .set_password(found.employee_id, password_hash)
                    .await?;
                Ok(Some(employee))
            })
        })
        .await
    }
}
