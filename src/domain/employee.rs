//! Employee domain entity and related types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::validation::{check_phone, check_text, normalize_email, FieldErrors};
use crate::config::MAX_NAME_LENGTH;
use crate::errors::AppResult;

/// Employee account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    pub id: Uuid,
    pub email: String,
    pub phone: String,
    pub first_name: String,
    pub last_name: String,
    /// Stored media path of the avatar image
    pub avatar: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    /// Outstanding activation token; cleared on redemption
    #[serde(skip_serializing)]
    pub token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Employee {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    /// Staff and superusers may browse other accounts.
    pub fn is_privileged(&self) -> bool {
        self.is_staff || self.is_superuser
    }

    /// Registered but not yet confirmed through the emailed link.
    pub fn is_pending_activation(&self) -> bool {
        !self.is_active && self.token.is_some()
    }
}

/// Data needed to insert an employee row.
#[derive(Debug, Clone)]
pub struct NewEmployee {
    pub email: String,
    pub phone: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub token: Option<String>,
}

impl NewEmployee {
    /// Inactive account waiting for `token` to be redeemed.
    pub fn pending(registration: Registration, password_hash: String, token: String) -> Self {
        Self {
            email: normalize_email(&registration.email),
            phone: registration.phone,
            first_name: registration.first_name,
            last_name: registration.last_name,
            password_hash,
            is_active: false,
            is_staff: false,
            is_superuser: false,
            token: Some(token),
        }
    }

    /// Active account with every privilege, created from the command line.
    pub fn superuser(email: &str, phone: String, password_hash: String) -> Self {
        Self {
            email: normalize_email(email),
            phone,
            first_name: String::new(),
            last_name: String::new(),
            password_hash,
            is_active: true,
            is_staff: true,
            is_superuser: true,
            token: None,
        }
    }
}

/// Self-service registration form
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Registration {
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    pub phone: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl Registration {
    /// Every rule of the form: the derived email and password rules plus
    /// the phone pattern and name lengths the derive cannot express.
    pub fn check(&self) -> AppResult<()> {
        let mut errors = derived_errors(self);
        errors.check("phone", check_phone(&self.phone));
        check_names(&mut errors, Some(&self.first_name), Some(&self.last_name));
        errors.into_result()
    }
}

/// Partial profile update; absent fields stay unchanged
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ProfileChanges {
    #[validate(email(message = "Enter a valid email address"))]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl ProfileChanges {
    pub fn check(&self) -> AppResult<()> {
        let mut errors = derived_errors(self);
        if let Some(phone) = &self.phone {
            errors.check("phone", check_phone(phone));
        }
        check_names(&mut errors, self.first_name.as_deref(), self.last_name.as_deref());
        errors.into_result()
    }

    /// Apply onto an existing employee, normalizing the email.
    pub fn apply_to(self, employee: &mut Employee) {
        if let Some(email) = self.email {
            employee.email = normalize_email(&email);
        }
        if let Some(phone) = self.phone {
            employee.phone = phone;
        }
        if let Some(first_name) = self.first_name {
            employee.first_name = first_name;
        }
        if let Some(last_name) = self.last_name {
            employee.last_name = last_name;
        }
    }
}

/// Violations of the `#[validate]` attributes, keyed by field.
fn derived_errors(form: &impl Validate) -> FieldErrors {
    match form.validate() {
        Ok(()) => FieldErrors::new(),
        Err(e) => FieldErrors::from(&e),
    }
}

/// Names are optional, but a given name must fit the column.
fn check_names(errors: &mut FieldErrors, first: Option<&str>, last: Option<&str>) {
    for (field, value) in [("first_name", first), ("last_name", last)] {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            errors.check(field, check_text(value, MAX_NAME_LENGTH));
        }
    }
}

/// Employee representation safe to return to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployeeResponse {
    pub id: Uuid,
    pub email: String,
    pub phone: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar: Option<String>,
    pub is_active: bool,
    pub is_staff: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Employee> for EmployeeResponse {
    fn from(employee: Employee) -> Self {
        Self {
            id: employee.id,
            email: employee.email,
            phone: employee.phone,
            first_name: employee.first_name,
            last_name: employee.last_name,
            avatar: employee.avatar,
            is_active: employee.is_active,
            is_staff: employee.is_staff,
            created_at: employee.created_at,
            updated_at: employee.updated_at,
        }
    }
}
