pub mod json_store;
pub mod open_library;
