//! Account service - registration, email activation, password recovery
//! and profile management.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;
use validator::ValidateEmail;

use crate::config::{
    Config, MEDIA_DIR_AVATARS, SUBJECT_ACTIVATION, SUBJECT_PASSWORD_RECOVERY,
    SUBJECT_PASSWORD_RESET, SUBJECT_WELCOME,
};
use crate::domain::activation::{generate_password, generate_token};
use crate::domain::validation::{check_phone, normalize_email, NON_FIELD_ERRORS};
use crate::domain::{
    Employee, FieldErrors, ImageUpload, NewEmployee, Password, ProfileChanges, Registration,
};
use crate::errors::{AppError, AppResult, OptionExt};
use crate::infra::{Email, EmployeeRepository, Mailer, MediaStorage, UnitOfWork};

#[async_trait]
pub trait AccountService: Send + Sync {
    /// Create an inactive account and mail its activation link.
    async fn register(&self, registration: Registration) -> AppResult<Employee>;

    /// Redeem an activation token exactly once.
    async fn redeem(&self, token: &str) -> AppResult<Employee>;

    /// Replace the password with a generated one and mail it.
    async fn recover_password(&self, email: String) -> AppResult<()>;

    /// Mail a single-use link for choosing a new password.
    ///
    /// Succeeds silently for addresses without an active account.
    async fn request_password_reset(&self, email: String) -> AppResult<()>;

    /// Redeem a reset link once, storing `new_password`.
    async fn confirm_password_reset(&self, token: &str, new_password: String) -> AppResult<()>;

    async fn get_profile(&self, caller: Uuid, id: Uuid) -> AppResult<Employee>;

    async fn update_profile(
        &self,
        caller: Uuid,
        id: Uuid,
        changes: ProfileChanges,
    ) -> AppResult<Employee>;

    async fn attach_avatar(&self, caller: Uuid, id: Uuid, upload: ImageUpload)
        -> AppResult<Employee>;

    /// Remove an account; `force` also removes its notes (superusers only).
    async fn delete_profile(&self, caller: Uuid, id: Uuid, force: bool) -> AppResult<()>;

    /// Every account, for staff.
    async fn list_profiles(&self, caller: Uuid) -> AppResult<Vec<Employee>>;

    /// Active account with all privileges.
    async fn create_superuser(
        &self,
        email: String,
        phone: String,
        password: String,
    ) -> AppResult<Employee>;
}

pub struct AccountManager<U: UnitOfWork> {
    uow: Arc<U>,
    mailer: Arc<dyn Mailer>,
    media: Arc<dyn MediaStorage>,
    config: Config,
}

impl<U: UnitOfWork> AccountManager<U> {
    pub fn new(
        uow: Arc<U>,
        mailer: Arc<dyn Mailer>,
        media: Arc<dyn MediaStorage>,
        config: Config,
    ) -> Self {
        Self {
            uow,
            mailer,
            media,
            config,
        }
    }

    fn mail_to(&self, to: &str, subject: &str, body: String) -> Email {
        Email::new(self.config.mail.smtp_from.as_str(), to, subject, body)
    }

    /// Reject an email or phone already held by someone other than `owner`.
    async fn ensure_unique(
        &self,
        employees: &dyn EmployeeRepository,
        email: &str,
        phone: &str,
        owner: Option<Uuid>,
    ) -> AppResult<()> {
        let other = |found: Option<Employee>| found.is_some_and(|e| Some(e.id) != owner);

        if other(employees.find_by_email(email).await?) {
            return Err(AppError::duplicate("email"));
        }
        if other(employees.find_by_phone(phone).await?) {
            return Err(AppError::duplicate("phone"));
        }
        Ok(())
    }

    async fn own_profile(&self, caller: Uuid, id: Uuid) -> AppResult<Employee> {
        if caller != id {
            return Err(AppError::Forbidden);
        }
        self.uow.employees().find_by_id(id).await?.ok_or_not_found()
    }

    async fn discard_media(&self, path: &str) {
        if let Err(e) = self.media.remove(path).await {
            tracing::warn!(path = %path, error = %e, "Failed to remove media file");
        }
    }
}

fn activation_body(employee: &Employee, link: &str) -> String {
    format!(
        "Hello {},\n\n\
         Please confirm your email address by following the link below:\n\
         {}\n\n\
         If you did not register, ignore this message.",
        greeting_name(employee),
        link
    )
}

fn welcome_body(employee: &Employee) -> String {
    format!(
        "Hello {},\n\nYour account is active. You can now sign in to the lab notebook.",
        greeting_name(employee)
    )
}

fn recovery_body(password: &str) -> String {
    format!(
        "Your password has been reset.\n\n\
         New password: {}\n\n\
         Change it after signing in.",
        password
    )
}

fn reset_body(employee: &Employee, link: &str, ttl_minutes: i64) -> String {
    format!(
        "Hello {},\n\n\
         A password reset was requested for your account. Choose a new password here:\n\
         {}\n\n\
         The link works once and expires in {} minutes. \
         If you did not ask for it, ignore this message.",
        greeting_name(employee),
        link,
        ttl_minutes
    )
}

fn greeting_name(employee: &Employee) -> String {
    let name = employee.full_name();
    if name.is_empty() {
        employee.email.clone()
    } else {
        name
    }
}

#[async_trait]
impl<U: UnitOfWork> AccountService for AccountManager<U> {
    async fn register(&self, registration: Registration) -> AppResult<Employee> {
        registration.check()?;

        let employees = self.uow.employees();
        let email = normalize_email(&registration.email);
        self.ensure_unique(employees.as_ref(), &email, &registration.phone, None)
            .await?;

        let password_hash = Password::new(&registration.password)?.into_string();
        let token = generate_token();
        let employee = employees
            .create(NewEmployee::pending(registration, password_hash, token.clone()))
            .await?;

        let link = self.config.activation_link(&token);
        let mail = self.mail_to(
            &employee.email,
            SUBJECT_ACTIVATION,
            activation_body(&employee, &link),
        );

        if let Err(e) = self.mailer.send(&mail).await {
            if self.config.mail.activation_mail_required {
                tracing::error!(employee = %employee.id, error = %e, "Activation mail failed, rolling back registration");
                if let Err(cleanup) = employees.delete(employee.id).await {
                    tracing::error!(employee = %employee.id, error = %cleanup, "Failed to remove unconfirmed account");
                }
                return Err(e);
            }
            tracing::warn!(employee = %employee.id, error = %e, "Activation mail failed");
        }

        tracing::info!(employee = %employee.id, "Employee registered, activation pending");
        Ok(employee)
    }

    async fn redeem(&self, token: &str) -> AppResult<Employee> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AppError::NotFound);
        }

        let employee = self
            .uow
            .employees()
            .activate_by_token(token)
            .await?
            .ok_or_not_found()?;

        tracing::info!(employee = %employee.id, "Account activated");

        let mail = self.mail_to(&employee.email, SUBJECT_WELCOME, welcome_body(&employee));
        if let Err(e) = self.mailer.send(&mail).await {
            tracing::warn!(employee = %employee.id, error = %e, "Welcome mail failed");
        }

        Ok(employee)
    }

    async fn recover_password(&self, email: String) -> AppResult<()> {
        let employees = self.uow.employees();
        let employee = employees
            .find_by_email(&normalize_email(&email))
            .await?
            .ok_or_else(|| {
                AppError::invalid_field("email", "No account is registered with this email")
            })?;

        let new_password = generate_password();
        let password_hash = Password::new(&new_password)?.into_string();
        employees.set_password(employee.id, password_hash).await?;

        let mail = self.mail_to(
            &employee.email,
            SUBJECT_PASSWORD_RECOVERY,
            recovery_body(&new_password),
        );

        if let Err(e) = self.mailer.send(&mail).await {
            tracing::error!(employee = %employee.id, error = %e, "Recovery mail failed, restoring password");
            if let Err(restore) = employees
                .set_password(employee.id, employee.password_hash.clone())
                .await
            {
                tracing::error!(employee = %employee.id, error = %restore, "Failed to restore previous password");
            }
            return Err(e);
        }

        tracing::info!(employee = %employee.id, "Password reset by recovery");
        Ok(())
    }

    async fn request_password_reset(&self, email: String) -> AppResult<()> {
        let employee = match self
            .uow
            .employees()
            .find_by_email(&normalize_email(&email))
            .await?
        {
            Some(employee) if employee.is_active => employee,
            _ => {
                tracing::debug!("Password reset requested for an unknown or inactive account");
                return Ok(());
            }
        };

        let ttl_minutes = self.config.password_reset_ttl_minutes;
        let token = generate_token();
        let resets = self.uow.password_resets();
        resets
            .issue(employee.id, &token, Utc::now() + Duration::minutes(ttl_minutes))
            .await?;

        let link = self.config.password_reset_link(&token);
        let mail = self.mail_to(
            &employee.email,
            SUBJECT_PASSWORD_RESET,
            reset_body(&employee, &link, ttl_minutes),
        );

        if let Err(e) = self.mailer.send(&mail).await {
            tracing::error!(employee = %employee.id, error = %e, "Password reset mail failed, revoking link");
            if let Err(revoke) = resets.revoke(&token).await {
                tracing::error!(employee = %employee.id, error = %revoke, "Failed to revoke reset token");
            }
            return Err(e);
        }

        tracing::info!(employee = %employee.id, "Password reset link sent");
        Ok(())
    }

    async fn confirm_password_reset(&self, token: &str, new_password: String) -> AppResult<()> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AppError::NotFound);
        }

        // hash first so a rejected password leaves the link usable
        let password_hash = Password::new(&new_password)?.into_string();
        let employee = self
            .uow
            .password_resets()
            .redeem(token, password_hash, Utc::now())
            .await?
            .ok_or_not_found()?;

        tracing::info!(employee = %employee.id, "Password changed through reset link");
        Ok(())
    }

    async fn get_profile(&self, caller: Uuid, id: Uuid) -> AppResult<Employee> {
        self.own_profile(caller, id).await
    }

    async fn update_profile(
        &self,
        caller: Uuid,
        id: Uuid,
        changes: ProfileChanges,
    ) -> AppResult<Employee> {
        changes.check()?;
        let mut employee = self.own_profile(caller, id).await?;
        changes.apply_to(&mut employee);

        let employees = self.uow.employees();
        self.ensure_unique(
            employees.as_ref(),
            &employee.email,
            &employee.phone,
            Some(employee.id),
        )
        .await?;

        let updated = employees.update(&employee).await?;
        tracing::info!(employee = %updated.id, "Profile updated");
        Ok(updated)
    }

    async fn attach_avatar(
        &self,
        caller: Uuid,
        id: Uuid,
        upload: ImageUpload,
    ) -> AppResult<Employee> {
        let extension = upload.extension_for("avatar")?;
        let mut employee = self.own_profile(caller, id).await?;

        let path = self
            .media
            .save(MEDIA_DIR_AVATARS, &extension, upload.bytes)
            .await?;
        let previous = employee.avatar.replace(path.clone());

        let updated = match self.uow.employees().update(&employee).await {
            Ok(updated) => updated,
            Err(e) => {
                self.discard_media(&path).await;
                return Err(e);
            }
        };
        if let Some(previous) = previous {
            self.discard_media(&previous).await;
        }
        Ok(updated)
    }

    async fn delete_profile(&self, caller: Uuid, id: Uuid, force: bool) -> AppResult<()> {
        let employees = self.uow.employees();
        let actor = employees
            .find_by_id(caller)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if (caller != id || force) && !actor.is_superuser {
            return Err(AppError::Forbidden);
        }

        let target = employees.find_by_id(id).await?.ok_or_not_found()?;
        let owned = self.uow.notes().count_by_owner(id).await?;

        if owned > 0 && !force {
            return Err(AppError::Integrity {
                field: NON_FIELD_ERRORS.to_string(),
                message: format!(
                    "Cannot delete employee: {} experiment notes still reference it",
                    owned
                ),
            });
        }

        if owned > 0 {
            let removed = employees.delete_with_notes(id).await?;
            tracing::warn!(employee = %id, by = %caller, notes = removed, "Employee force-deleted with notes");
        } else {
            employees.delete(id).await?;
            tracing::info!(employee = %id, by = %caller, "Employee deleted");
        }

        if let Some(avatar) = target.avatar {
            self.discard_media(&avatar).await;
        }
        Ok(())
    }

    async fn list_profiles(&self, caller: Uuid) -> AppResult<Vec<Employee>> {
        let employees = self.uow.employees();
        let actor = employees
            .find_by_id(caller)
            .await?
            .ok_or(AppError::Unauthorized)?;
        if !actor.is_privileged() {
            return Err(AppError::Forbidden);
        }
        employees.list().await
    }

    async fn create_superuser(
        &self,
        email: String,
        phone: String,
        password: String,
    ) -> AppResult<Employee> {
        let mut errors = FieldErrors::new();
        if !email.validate_email() {
            errors.add("email", "Enter a valid email address");
        }
        errors.check("phone", check_phone(&phone));
        errors.into_result()?;

        let employees = self.uow.employees();
        let email = normalize_email(&email);
        self.ensure_unique(employees.as_ref(), &email, &phone, None)
            .await?;

        let password_hash = Password::new(&password)?.into_string();
        let employee = employees
            .create(NewEmployee::superuser(&email, phone, password_hash))
            .await?;

        tracing::info!(employee = %employee.id, "Superuser created");
        Ok(employee)
    }
}
