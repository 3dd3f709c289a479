pub mod comparison;
pub mod dataset;
pub mod product;
pub mod view;
