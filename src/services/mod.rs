//! Application services layer - Use cases and business logic.
//!
//! Services orchestrate domain logic and infrastructure through the
//! `UnitOfWork` and collaborator traits, so each one can run against
//! fakes in tests.

mod account_service;
mod auth_service;
pub mod container;
mod note_service;

pub use container::{Collaborators, ServiceContainer, Services};

pub use account_service::{AccountManager, AccountService};
pub use auth_service::{issue_token, AuthService, Authenticator, Claims, TokenResponse};
pub use note_service::{NoteManager, NoteService};

#[cfg(any(test, feature = "test-utils"))]
pub use container::MockServiceContainer;
