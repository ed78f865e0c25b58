pub mod ai_client;
pub mod config;
pub mod repository;
pub mod webhook;

pub use ai_client::*;
pub use config::*;
pub use repository::*;
pub use webhook::*;
