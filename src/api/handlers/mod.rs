//! HTTP request handlers.

pub mod auth_handler;
pub mod note_handler;
pub mod profile_handler;

pub use auth_handler::{activation_routes, auth_routes};
pub use note_handler::note_routes;
pub use profile_handler::profile_routes;
