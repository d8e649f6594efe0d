//! Labbook - laboratory notebook service
//!
//! Employees keep experiment notes, activate their accounts through an
//! emailed link and manage their profiles over a JSON API.
//!
//! # Architecture Layers
//!
//! - **cli**: Command-line interface
//! - **commands**: CLI command implementations
//! - **config**: Application configuration and constants
//! - **domain**: Employees, experiment notes and validation rules
//! - **services**: Application use cases
//! - **infra**: Database, Redis, mail and media storage
//! - **api**: HTTP handlers, middleware, and routes
//! - **types**: Shared types (pagination, responses)
//! - **errors**: Centralized error handling
//!
//! # CLI Usage
//!
//! ```bash
//! labbook migrate up
//! labbook create-superuser --email root@lab.org --phone +79991234567
//! labbook serve
//! ```

pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod domain;
pub mod errors;
pub mod infra;
pub mod services;
pub mod types;

pub use api::AppState;
pub use config::Config;
pub use domain::{Employee, ExperimentNote, Password};
pub use errors::{AppError, AppResult};
pub use infra::Cache;
