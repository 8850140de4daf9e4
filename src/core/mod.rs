//! Core Components
//!
//! HTTP transport abstraction shared by the provider client and the middleware.

pub mod transport;

pub use transport::*;
