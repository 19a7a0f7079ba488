//! In-memory storage backend for graphdoc.
//!
//! This crate provides a thread-safe, in-memory implementation of the
//! `StoreBackend` trait. It uses async-aware read-write locks for
//! concurrent access and is ideal for development, testing, and fixtures.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Type-erased storage** - Stores documents as BSON for flexibility
//! - **Filter evaluation** - Interprets the operator filters the query compiler emits
//!
//! # Quick Start
//!
//! ```ignore
//! use graphdoc_core::store::GraphStore;
//! use graphdoc_memory::InMemoryStore;
//!
//! let store = GraphStore::new(InMemoryStore::new());
//! ```

#[allow(unused_extern_crates)]
extern crate self as graphdoc_memory;

pub mod matcher;
pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
