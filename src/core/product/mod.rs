//! Products, the only thing this service knows about.

pub mod product_repository;

use product_repository::Product;

/// The fixed demo dataset inserted by `sales-admin seed`.
pub fn demo_products() -> Vec<Product> {
    vec![
        Product::new("Comic Books", 75, 50),
        Product::new("McDonald's Toys", 25, 120),
    ]
}
