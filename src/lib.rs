// Storehouse client - library root

pub mod api;
pub mod auth;
pub mod config;
pub mod context;
pub mod error;
pub mod http_client;
pub mod models;
pub mod tree;

pub use context::AppContext;
pub use error::{ApiError, Result};
