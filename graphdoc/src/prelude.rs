//! Convenient re-exports of commonly used types from graphdoc.
//!
//! Import this prelude module to quickly access the most frequently used
//! types and traits without needing to import from multiple sub-modules:
//!
//! ```ignore
//! use graphdoc::prelude::*;
//! ```
//!
//! This provides access to:
//! - The meta-model and registry types
//! - The object arena and session types
//! - Addresses and address translation
//! - The store front end, backend traits, and options
//! - Query expressions and compilation
//! - Error types

pub use graphdoc_core::{
    address::{BaseRelativeMapper, CollectionRef, StoreAddress, StoreUri, UriMapper},
    backend::{StoreBackend, StoreBackendBuilder},
    error::{GraphStoreError, GraphStoreResult},
    materialize::GraphMaterializer,
    meta::{ClassDef, FeatureDef, FeatureKind, TypeRegistry, ValueType},
    object::{FeatureMapEntry, ObjId, Resource, ResourceId, ResourceSet, SlotValue, TypedObject, Value},
    query::{BinaryOp, Expr, QueryCompiler},
    serialize::GraphSerializer,
    store::{GraphStore, LoadOptions, LoadOutcome, SaveOptions, SaveOutcome},
};
