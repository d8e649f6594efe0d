//! Commands module - CLI command implementations.

pub mod create_superuser;
pub mod migrate;
pub mod serve;
