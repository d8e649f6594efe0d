//! In-memory fakes shared by the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use labbook::config::Config;
use labbook::domain::{Employee, ExperimentNote, NewEmployee, NoteOrdering, NoteQuery, Password};
use labbook::errors::{AppError, AppResult};
use labbook::infra::{EmployeeRepository, NoteRepository, PasswordResetRepository, UnitOfWork};
use labbook::types::{PageRequest, Paginated};

pub const TEST_SECRET: &str = "test-secret-key-for-testing-only-32chars";
pub const TEST_PASSWORD: &str = "correct-horse";

pub fn test_config() -> Config {
    Config::for_tests(TEST_SECRET)
}

/// A stored password reset token.
#[derive(Debug, Clone)]
pub struct ResetToken {
    pub employee_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
}

#[derive(Default)]
struct Tables {
    employees: Vec<Employee>,
    notes: Vec<ExperimentNote>,
    reset_tokens: Vec<ResetToken>,
}

/// Both tables behind one lock, so multi-table operations are atomic.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn employees(&self) -> Vec<Employee> {
        self.tables.lock().unwrap().employees.clone()
    }

    pub fn notes(&self) -> Vec<ExperimentNote> {
        self.tables.lock().unwrap().notes.clone()
    }

    pub fn reset_tokens(&self) -> Vec<ResetToken> {
        self.tables.lock().unwrap().reset_tokens.clone()
    }

    pub fn employee(&self, id: Uuid) -> Option<Employee> {
        self.employees().into_iter().find(|e| e.id == id)
    }

    pub fn note(&self, id: Uuid) -> Option<ExperimentNote> {
        self.notes().into_iter().find(|n| n.id == id)
    }

    /// Insert an active employee whose password is [`TEST_PASSWORD`].
    pub fn seed_employee(&self, email: &str, phone: &str) -> Employee {
        let now = Utc::now();
        let employee = Employee {
            id: Uuid::new_v4(),
            email: email.to_string(),
            phone: phone.to_string(),
            first_name: "Test".to_string(),
            last_name: "Employee".to_string(),
            avatar: None,
            password_hash: Password::new(TEST_PASSWORD).unwrap().into_string(),
            is_active: true,
            is_staff: false,
            is_superuser: false,
            token: None,
            created_at: now,
            updated_at: now,
        };
        self.put_employee(employee.clone());
        employee
    }

    pub fn put_employee(&self, employee: Employee) {
        let mut tables = self.tables.lock().unwrap();
        tables.employees.retain(|e| e.id != employee.id);
        tables.employees.push(employee);
    }

    pub fn put_note(&self, note: ExperimentNote) {
        let mut tables = self.tables.lock().unwrap();
        tables.notes.retain(|n| n.id != note.id);
        tables.notes.push(note);
    }
}

impl UnitOfWork for InMemoryStore {
    fn employees(&self) -> Arc<dyn EmployeeRepository> {
        Arc::new(FakeEmployees(self.clone()))
    }

    fn notes(&self) -> Arc<dyn NoteRepository> {
        Arc::new(FakeNotes(self.clone()))
    }

    fn password_resets(&self) -> Arc<dyn PasswordResetRepository> {
        Arc::new(FakePasswordResets(self.clone()))
    }
}

pub struct FakeEmployees(InMemoryStore);

#[async_trait]
impl EmployeeRepository for FakeEmployees {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Employee>> {
        Ok(self.0.employee(id))
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<Employee>> {
        Ok(self.0.employees().into_iter().find(|e| e.email == email))
    }

    async fn find_by_phone(&self, phone: &str) -> AppResult<Option<Employee>> {
        Ok(self.0.employees().into_iter().find(|e| e.phone == phone))
    }

    async fn create(&self, new: NewEmployee) -> AppResult<Employee> {
        let now = Utc::now();
        let employee = Employee {
            id: Uuid::new_v4(),
            email: new.email,
            phone: new.phone,
            first_name: new.first_name,
            last_name: new.last_name,
            avatar: None,
            password_hash: new.password_hash,
            is_active: new.is_active,
            is_staff: new.is_staff,
            is_superuser: new.is_superuser,
            token: new.token,
            created_at: now,
            updated_at: now,
        };
        self.0.put_employee(employee.clone());
        Ok(employee)
    }

    async fn update(&self, employee: &Employee) -> AppResult<Employee> {
        let mut stored = self.0.employee(employee.id).ok_or(AppError::NotFound)?;
        stored.email = employee.email.clone();
        stored.phone = employee.phone.clone();
        stored.first_name = employee.first_name.clone();
        stored.last_name = employee.last_name.clone();
        stored.avatar = employee.avatar.clone();
        stored.updated_at = Utc::now();
        self.0.put_employee(stored.clone());
        Ok(stored)
    }

    async fn set_password(&self, id: Uuid, password_hash: String) -> AppResult<()> {
        let mut stored = self.0.employee(id).ok_or(AppError::NotFound)?;
        stored.password_hash = password_hash;
        self.0.put_employee(stored);
        Ok(())
    }

    async fn activate_by_token(&self, token: &str) -> AppResult<Option<Employee>> {
        let mut tables = self.0.tables.lock().unwrap();
        let found = tables
            .employees
            .iter_mut()
            .find(|e| !e.is_active && e.token.as_deref() == Some(token));
        Ok(found.map(|employee| {
            employee.is_active = true;
            employee.token = None;
            employee.updated_at = Utc::now();
            employee.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut tables = self.0.tables.lock().unwrap();
        if tables.notes.iter().any(|n| n.owner_id == id) {
            return Err(AppError::Integrity {
                field: "non_field_errors".to_string(),
                message: "protected by experiment notes".to_string(),
            });
        }
        tables.employees.retain(|e| e.id != id);
        Ok(())
    }

    async fn delete_with_notes(&self, id: Uuid) -> AppResult<u64> {
        let mut tables = self.0.tables.lock().unwrap();
        let before = tables.notes.len();
        tables.notes.retain(|n| n.owner_id != id);
        let removed = (before - tables.notes.len()) as u64;
        tables.employees.retain(|e| e.id != id);
        Ok(removed)
    }

    async fn list(&self) -> AppResult<Vec<Employee>> {
        Ok(self.0.employees())
    }
}

pub struct FakeNotes(InMemoryStore);

#[async_trait]
impl NoteRepository for FakeNotes {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<ExperimentNote>> {
        Ok(self.0.note(id))
    }

    async fn code_taken(&self, code: &str, exclude: Option<Uuid>) -> AppResult<bool> {
        Ok(self
            .0
            .notes()
            .iter()
            .any(|n| n.code_of_project == code && Some(n.id) != exclude))
    }

    async fn reminder_taken(
        &self,
        owner_id: Uuid,
        reminder: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> AppResult<bool> {
        Ok(self.0.notes().iter().any(|n| {
            n.owner_id == owner_id && n.reminder_date == Some(reminder) && Some(n.id) != exclude
        }))
    }

    async fn insert(&self, note: &ExperimentNote) -> AppResult<ExperimentNote> {
        self.0.put_note(note.clone());
        Ok(note.clone())
    }

    async fn update(&self, note: &ExperimentNote) -> AppResult<ExperimentNote> {
        self.0.note(note.id).ok_or(AppError::NotFound)?;
        self.0.put_note(note.clone());
        Ok(note.clone())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.0.tables.lock().unwrap().notes.retain(|n| n.id != id);
        Ok(())
    }

    async fn fetch_page(
        &self,
        query: &NoteQuery,
        page: PageRequest,
    ) -> AppResult<Paginated<ExperimentNote>> {
        let mut notes: Vec<_> = self
            .0
            .notes()
            .into_iter()
            .filter(|n| query.matches(n))
            .collect();
        match query.ordering {
            NoteOrdering::RecentlyUpdated => notes.sort_by(|a, b| {
                b.updated_at
                    .cmp(&a.updated_at)
                    .then_with(|| a.title.cmp(&b.title))
            }),
            NoteOrdering::Default => notes.sort_by(|a, b| {
                a.owner_id
                    .cmp(&b.owner_id)
                    .then_with(|| a.updated_at.cmp(&b.updated_at))
                    .then_with(|| a.title.cmp(&b.title))
            }),
        }
        Ok(Paginated::from_items(notes, page))
    }

    async fn count_updated_between(
        &self,
        owner_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<u64> {
        Ok(self
            .0
            .notes()
            .iter()
            .filter(|n| n.owner_id == owner_id && n.updated_at >= from && n.updated_at < to)
            .count() as u64)
    }

    async fn count_by_owner(&self, owner_id: Uuid) -> AppResult<u64> {
        Ok(self
            .0
            .notes()
            .iter()
            .filter(|n| n.owner_id == owner_id)
            .count() as u64)
    }
}

pub struct FakePasswordResets(InMemoryStore);

#[async_trait]
impl PasswordResetRepository for FakePasswordResets {
    async fn issue(
        &self,
        employee_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()> {
        self.0.tables.lock().unwrap().reset_tokens.push(ResetToken {
            employee_id,
            token: token.to_string(),
            expires_at,
            used: false,
        });
        Ok(())
    }

    async fn revoke(&self, token: &str) -> AppResult<()> {
        self.0
            .tables
            .lock()
            .unwrap()
            .reset_tokens
            .retain(|t| t.token != token);
        Ok(())
    }

    async fn redeem(
        &self,
        token: &str,
        password_hash: String,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Employee>> {
        let mut tables = self.0.tables.lock().unwrap();
        let Some(employee_id) = tables
            .reset_tokens
            .iter()
            .find(|t| t.token == token && !t.used && t.expires_at > now)
            .map(|t| t.employee_id)
        else {
            return Ok(None);
        };

        for t in tables
            .reset_tokens
            .iter_mut()
            .filter(|t| t.employee_id == employee_id)
        {
            t.used = true;
        }
        let employee = tables
            .employees
            .iter_mut()
            .find(|e| e.id == employee_id)
            .ok_or(AppError::NotFound)?;
        employee.password_hash = password_hash;
        employee.updated_at = Utc::now();
        Ok(Some(employee.clone()))
    }
}
