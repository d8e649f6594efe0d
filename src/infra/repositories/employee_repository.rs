//! Employee repository implementation.

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IsolationLevel, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use super::entities::employee::{self, ActiveModel, Entity as EmployeeEntity};
use crate::domain::{Employee, NewEmployee};
use crate::errors::{AppError, AppResult, OptionExt};
use crate::infra::unit_of_work::run_in_transaction;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Employee repository trait for dependency injection.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait EmployeeRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Employee>>;

    /// Exact match on the normalized email
    async fn find_by_email(&self, email: &str) -> AppResult<Option<Employee>>;

    async fn find_by_phone(&self, phone: &str) -> AppResult<Option<Employee>>;

    async fn create(&self, employee: NewEmployee) -> AppResult<Employee>;

    /// Persist profile fields (email, phone, names, avatar)
    async fn update(&self, employee: &Employee) -> AppResult<Employee>;

    async fn set_password(&self, id: Uuid, password_hash: String) -> AppResult<()>;

    /// Activate the inactive employee holding `token`, exactly once.
    ///
    /// The row is locked for the duration of the check-and-activate so two
    /// concurrent redemptions cannot both succeed.
    async fn activate_by_token(&self, token: &str) -> AppResult<Option<Employee>>;

    /// Delete an employee; fails while notes still reference them
    async fn delete(&self, id: Uuid) -> AppResult<()>;

    /// Delete an employee together with every note they own, atomically
    async fn delete_with_notes(&self, id: Uuid) -> AppResult<u64>;

    async fn list(&self) -> AppResult<Vec<Employee>>;
}

/// SeaORM-backed employee repository
pub struct EmployeeStore {
    db: DatabaseConnection,
}

impl EmployeeStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl EmployeeRepository for EmployeeStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Employee>> {
        let result = EmployeeEntity::find_by_id(id).one(&self.db).await?;
        Ok(result.map(Employee::from))
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<Employee>> {
        let result = EmployeeEntity::find()
            .filter(employee::Column::Email.eq(email))
            .one(&self.db)
            .await?;
        Ok(result.map(Employee::from))
    }

    async fn find_by_phone(&self, phone: &str) -> AppResult<Option<Employee>> {
        let result = EmployeeEntity::find()
            .filter(employee::Column::Phone.eq(phone))
            .one(&self.db)
            .await?;
        Ok(result.map(Employee::from))
    }

    async fn create(&self, new: NewEmployee) -> AppResult<Employee> {
        let now = chrono::Utc::now();
        let active_model = ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(new.email),
            phone: Set(new.phone),
            first_name: Set(new.first_name),
            last_name: Set(new.last_name),
            avatar: Set(None),
            password_hash: Set(new.password_hash),
            is_active: Set(new.is_active),
            is_staff: Set(new.is_staff),
            is_superuser: Set(new.is_superuser),
            token: Set(new.token),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let model = active_model.insert(&self.db).await?;
        Ok(Employee::from(model))
    }

    async fn update(&self, employee: &Employee) -> AppResult<Employee> {
        let existing = EmployeeEntity::find_by_id(employee.id)
            .one(&self.db)
            .await?
            .ok_or_not_found()?;

        let mut active: ActiveModel = existing.into();
        active.email = Set(employee.email.clone());
        active.phone = Set(employee.phone.clone());
        active.first_name = Set(employee.first_name.clone());
        active.last_name = Set(employee.last_name.clone());
        active.avatar = Set(employee.avatar.clone());
        active.updated_at = Set(chrono::Utc::now());

        let model = active.update(&self.db).await?;
        Ok(Employee::from(model))
    }

    async fn set_password(&self, id: Uuid, password_hash: String) -> AppResult<()> {
        let existing = EmployeeEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_not_found()?;

        let mut active: ActiveModel = existing.into();
        active.password_hash = Set(password_hash);
        active.updated_at = Set(chrono::Utc::now());
        active.update(&self.db).await?;
        Ok(())
    }

    async fn activate_by_token(&self, token: &str) -> AppResult<Option<Employee>> {
        let token = token.to_string();
        run_in_transaction(&self.db, IsolationLevel::ReadCommitted, move |ctx| {
            Box::pin(async move {
                let employees = ctx.employees();
                match employees.find_pending_for_update(&token).await? {
                    Some(pending) => employees.activate(pending).await.map(Some),
                    None => Ok(None),
                }
            })
        })
        .await
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let result = EmployeeEntity::delete_by_id(id).exec(&self.db).await?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound);
        }

        Ok(())
    }

    async fn delete_with_notes(&self, id: Uuid) -> AppResult<u64> {
        run_in_transaction(&self.db, IsolationLevel::ReadCommitted, move |ctx| {
            Box::pin(async move {
                let removed = ctx.notes().delete_by_owner(id).await?;
                ctx.employees().delete(id).await?;
                Ok(removed)
            })
        })
        .await
    }

    async fn list(&self) -> AppResult<Vec<Employee>> {
        let models = EmployeeEntity::find()
            .order_by_asc(employee::Column::Email)
            .all(&self.db)
            .await?;

        Ok(models.into_iter().map(Employee::from).collect())
    }
}
