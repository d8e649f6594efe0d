//! Domain layer - Core business entities and logic
//!
//! Employees, experiment notes and the rules that guard them,
//! independent of storage and transport.

pub mod activation;
pub mod employee;
pub mod note;
pub mod password;
pub mod validation;

pub use employee::{Employee, EmployeeResponse, NewEmployee, ProfileChanges, Registration};
pub use note::{
    ExperimentNote, HomeStats, NoteDraft, NoteOrdering, NotePatch, NoteQuery, NoteSearch,
    SearchScope,
};
pub use password::Password;
pub use validation::{FieldErrors, ImageUpload};
