//! # Memory Core
//!
//! Core types and traits for vector memory storage.
//! Used by storage backends such as `memory-mongodb` and by retrieval code that
//! only needs the store contract.
//!
//! ## Modules
//!
//! - [`types`] - MemoryRecord
//! - [`store`] - MemoryStore trait

pub mod types;
pub mod store;

pub use types::*;
pub use store::*;
