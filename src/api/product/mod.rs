pub mod product_api;
