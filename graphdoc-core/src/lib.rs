//! A bidirectional mapping layer between reflective typed object graphs and
//! schemaless document stores.
//!
//! This crate is the core of the graphdoc project and provides:
//!
//! - **Addresses** ([`address`]) - Store URIs, the three-segment address
//!   policy, and relative proxy-address translation
//! - **Reserved keys** ([`document`]) - The reserved document keys and
//!   proxy-descriptor helpers
//! - **Meta-model** ([`meta`]) - Classes, features, and the type registry
//!   documents are resolved against
//! - **Object model** ([`object`]) - Arena-owned dynamic objects, resources,
//!   and load/save sessions
//! - **Serialization** ([`serialize`], [`materialize`], [`convert`]) - The
//!   graph-to-document serializer and document-to-graph materializer with
//!   proxy handling
//! - **Queries** ([`query`]) - Expression trees and their compilation into
//!   store-native filters
//! - **Store interface** ([`store`], [`backend`]) - The store front end and
//!   the backend abstraction it delegates to
//! - **Error handling** ([`error`]) - Error and result types
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use graphdoc_core::{
//!     address::StoreUri,
//!     meta::TypeRegistry,
//!     object::{ResourceSet, Value},
//!     store::{GraphStore, SaveOptions},
//! };
//!
//! let registry = Arc::new(TypeRegistry::from_json(MODEL_JSON)?);
//! let mut session = ResourceSet::new(registry.clone());
//!
//! let class = registry.resolve_class("http://model#//Person").unwrap();
//! let person = session.create(&class);
//! session.object_mut(person).set("name", Value::String("Alice".into()));
//!
//! let resource =
//!     session.create_resource(StoreUri::parse("mongo://localhost/data/people/"));
//! session.attach(resource, person);
//!
//! let store = GraphStore::new(backend);
//! let outcome = store.save(&mut session, resource, &SaveOptions::default()).await?;
//! println!("stored at {}", outcome.uri);
//! ```

#[allow(unused_extern_crates)]
extern crate self as graphdoc_core;

pub mod address;
pub mod backend;
pub mod convert;
pub mod document;
pub mod error;
pub mod materialize;
pub mod meta;
pub mod object;
pub mod query;
pub mod serialize;
pub mod store;

#[cfg(test)]
pub(crate) mod fixtures;
