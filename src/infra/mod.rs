//! Infrastructure layer - External systems integration
//!
//! Database, repositories, Redis cache, mail transport and media storage.

pub mod cache;
pub mod db;
pub mod mail;
pub mod media;
pub mod repositories;
pub mod unit_of_work;

pub use cache::{Cache, NoCache, NoteCache, RateLimiter};
pub use db::{Database, Migrator};
pub use mail::{build_mailer, Email, LogMailer, Mailer, SmtpMailer};
pub use media::{LocalMediaStore, MediaStorage};
pub use repositories::{
    EmployeeRepository, EmployeeStore, NoteRepository, NoteStore, PasswordResetRepository,
    PasswordResetStore,
};
pub use unit_of_work::{Persistence, UnitOfWork};

#[cfg(any(test, feature = "test-utils"))]
pub use cache::{MemoryNoteCache, MockNoteCache, MockRateLimiter};
#[cfg(any(test, feature = "test-utils"))]
pub use mail::{MemoryMailer, MockMailer};
#[cfg(any(test, feature = "test-utils"))]
pub use media::MockMediaStorage;
#[cfg(any(test, feature = "test-utils"))]
pub use repositories::{
    MockEmployeeRepository, MockNoteRepository, MockPasswordResetRepository,
};
