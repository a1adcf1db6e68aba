pub mod index;
pub mod store;
pub mod types;
