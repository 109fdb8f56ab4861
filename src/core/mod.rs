//! Domain types and persistence.

pub mod product;
pub mod schema;
