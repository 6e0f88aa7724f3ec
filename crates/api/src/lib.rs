//! Live chat API library
//!
//! This crate contains the HTTP and websocket server for the live chat
//! support desk.

pub mod auth;
pub mod chat;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod store;
pub mod websocket;

pub use chat::{Caller, ChatService};
pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use state::AppState;
