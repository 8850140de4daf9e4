//! OAuth2 Types
//!
//! Core type definitions shared by the provider and middleware.

pub mod auth;
pub mod config;
pub mod token;

pub use auth::*;
pub use config::*;
pub use token::*;
