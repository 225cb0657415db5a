pub mod error;
pub mod page;
pub mod render;
pub mod store;
