//! The infrastructure module.
//!
//! Contains common modules that help with non-functional requirements.

pub mod config;
pub mod database;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub(crate) mod middleware;
pub mod state;
