//! WebSocket support for real-time chat
//!
//! # Architecture
//!
//! - **Connection**: A handshake-identified WebSocket connection
//! - **Room**: Chat-based pub/sub for broadcasting events
//! - **Sessions**: Registry of open sessions and who is online
//! - **Handler**: Axum WebSocket route handler
//! - **Events**: Type-safe event definitions for client/server communication

pub mod connection;
pub mod events;
pub mod handler;
pub mod room;
pub mod sessions;

pub use handler::ws_handler;
pub use sessions::SessionRegistry;
