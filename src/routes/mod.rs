//! Route definitions for the Lifeline API

mod auth;

pub use auth::auth_routes;
