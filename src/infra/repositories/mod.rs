//! Repository layer - Data access abstraction
//!
//! Repositories hide SeaORM behind traits so services can be tested
//! against mocks and in-memory fakes.

pub(crate) mod entities;
mod employee_repository;
mod note_repository;
mod password_reset_repository;

pub use employee_repository::{EmployeeRepository, EmployeeStore};
pub use note_repository::{NoteRepository, NoteStore};
pub use password_reset_repository::{PasswordResetRepository, PasswordResetStore};

// Export mocks for tests (both unit and integration)
#[cfg(any(test, feature = "test-utils"))]
pub use employee_repository::MockEmployeeRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use note_repository::MockNoteRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use password_reset_repository::MockPasswordResetRepository;
