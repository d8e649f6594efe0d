//! SeaORM entity definitions
//!
//! These are database-specific entities separate from domain models.

pub mod employee;
pub mod experiment_note;
pub mod password_reset_token;
