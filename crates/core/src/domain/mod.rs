pub mod analysis;
pub mod batch;
pub mod product;
pub mod sales;
pub mod supplier;
