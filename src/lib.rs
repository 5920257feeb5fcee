pub mod config;
pub mod models;
pub mod services;
pub mod providers;
pub mod utils;
pub mod handlers;

// Re-export commonly used types
pub use config::{AppConfig, TdxConfig};
pub use models::*;
pub use services::{TdxApi, TdxClient, TicketCreator, TicketResult};
pub use utils::{AppError, Result};
