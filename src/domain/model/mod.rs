pub mod book;
pub mod favorites;
pub mod key;
