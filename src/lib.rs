pub mod caption;
pub mod config;
pub mod error;
pub mod llm;
pub mod media;
pub mod providers;
pub mod server;

pub use error::{Error, Result};
