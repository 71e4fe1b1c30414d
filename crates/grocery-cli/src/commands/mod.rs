pub mod common;
pub mod config;
pub mod items;
pub mod lists;
pub mod sync;
