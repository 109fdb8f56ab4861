//! A small service that lists the products of a garage sale.
//!
//! The `sales-api` binary serves the product list over HTTP and shuts down
//! gracefully on SIGINT or SIGTERM. The `sales-admin` binary migrates the
//! database and inserts demo data.

pub mod api;
pub mod app;
pub mod core;
pub mod infra;
