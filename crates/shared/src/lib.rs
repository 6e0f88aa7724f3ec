//! Live chat shared types and utilities
//!
//! This crate contains the chat domain model, the error taxonomy, database
//! helpers and the client-side optimistic-send reconciler.

pub mod db;
pub mod error;
pub mod reconcile;
pub mod types;

pub use db::*;
pub use error::*;
pub use reconcile::{ChatView, EntryId, MergeOutcome, PendingSend, ViewEntry, PROVISIONAL_PREFIX};
pub use types::*;
