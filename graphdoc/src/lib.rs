//! Main graphdoc crate providing a unified interface for mapping typed
//! object graphs onto document stores.
//!
//! This crate is the primary entry point for users of the graphdoc
//! framework. It re-exports the core mapping engine and provides convenient
//! access to the bundled storage backend.
//!
//! # Features
//!
//! - **Reflective mapping** - Serialize polymorphic object graphs into flat
//!   documents and materialize them back, containment embedded and
//!   cross-document links stored as resolvable proxy addresses
//! - **Lazy proxies** - Cross-document references come back as address-only
//!   stand-ins, deduplicated per load session, resolved on demand
//! - **Query compilation** - Boolean expressions over object properties
//!   compile into store-native filters
//! - **Pluggable backends** - A slim driver trait with a bundled in-memory
//!   implementation
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use graphdoc::{memory::InMemoryStore, prelude::*};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Arc::new(TypeRegistry::from_json(MODEL_JSON)?);
//!     let store = GraphStore::new(InMemoryStore::new());
//!
//!     // Create an object and a resource to store it under.
//!     let mut session = ResourceSet::new(registry.clone());
//!     let class = registry.resolve_class("http://model#//Person").unwrap();
//!     let person = session.create(&class);
//!     session.object_mut(person).set("name", Value::String("Alice".into()));
//!
//!     let resource =
//!         session.create_resource(StoreUri::parse("mongo://localhost/data/people/"));
//!     session.attach(resource, person);
//!
//!     // First save: the store assigns the identifier and the resource
//!     // address is rewritten to include it.
//!     let outcome = store.save(&mut session, resource, &SaveOptions::default()).await?;
//!     println!("stored at {}", outcome.uri);
//!
//!     // Query by expression.
//!     let mut results = ResourceSet::new(registry);
//!     let loaded = store
//!         .query(
//!             &mut results,
//!             StoreUri::parse("mongo://localhost/data/people/"),
//!             &Expr::property("name").eq(Expr::literal("Alice")),
//!             &LoadOptions::default(),
//!         )
//!         .await?;
//!     println!("{} match(es)", results.resource(loaded.resource).contents().len());
//!
//!     Ok(())
//! }
//! ```

pub mod prelude;

pub use graphdoc_core::{
    address, backend, convert, document, error, materialize, meta, object, query, serialize, store,
};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use graphdoc_memory::{InMemoryStore, InMemoryStoreBuilder};
}

#[cfg(test)]
mod tests {
    use crate::memory::InMemoryStore;
    use crate::prelude::*;
    use std::sync::Arc;

    const MODEL_JSON: &str = r##"[
        {
            "uri": "http://graphdoc/junit#//TargetObject",
            "name": "TargetObject",
            "features": [
                { "name": "singleAttribute", "kind": { "Attribute": { "value_type": "String" } } }
            ]
        },
        {
            "uri": "http://graphdoc/junit#//PrimaryObject",
            "name": "PrimaryObject",
            "features": [
                { "name": "name", "kind": { "Attribute": { "value_type": "String" } } },
                { "name": "labels", "many": true, "kind": { "Attribute": { "value_type": "Custom" } } },
                { "name": "content", "many": true, "kind": "FeatureMap" },
                { "name": "contentType1", "transient": true, "kind": { "Reference": { "containment": true } } },
                { "name": "contentType2", "transient": true, "kind": { "Reference": { "containment": true } } },
                { "name": "containedChildren", "many": true, "kind": { "Reference": { "containment": true } } },
                { "name": "related", "kind": { "Reference": { "containment": false, "resolve_proxies": true } } }
            ]
        }
    ]"##;

    const PRIMARY_CLASS: &str = "http://graphdoc/junit#//PrimaryObject";
    const TARGET_CLASS: &str = "http://graphdoc/junit#//TargetObject";

    fn new_target(set: &mut ResourceSet, attribute: &str) -> ObjId {
        let class = set.registry().resolve_class(TARGET_CLASS).unwrap();
        let target = set.create(&class);
        set.object_mut(target).set("singleAttribute", Value::String(attribute.into()));
        target
    }

    fn target_attribute(set: &ResourceSet, value: &Value) -> String {
        match value {
            Value::Object(id) => match set.object(*id).single("singleAttribute") {
                Some(Value::String(s)) => s.clone(),
                other => panic!("expected string attribute, got {other:?}"),
            },
            other => panic!("expected object value, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn full_graph_round_trips_through_the_store() {
        let registry = Arc::new(TypeRegistry::from_json(MODEL_JSON).unwrap());
        let store = GraphStore::new(InMemoryStore::new());

        let mut session = ResourceSet::new(registry.clone());
        let class = registry.resolve_class(PRIMARY_CLASS).unwrap();
        let primary = session.create(&class);
        session.object_mut(primary).set("name", Value::String("junit".into()));
        session.object_mut(primary).set_many(
            "labels",
            vec![Value::String("x".into()), Value::String("y".into())],
        );

        let one = new_target(&mut session, "one");
        let two = new_target(&mut session, "two");
        session.object_mut(primary).push("containedChildren", Value::Object(one));
        session.object_mut(primary).push("containedChildren", Value::Object(two));
        session.object_mut(primary).set("related", Value::Object(one));

        let map_one = new_target(&mut session, "map-one");
        let map_two = new_target(&mut session, "map-two");
        let type1 = format!("{PRIMARY_CLASS}/contentType1");
        let type2 = format!("{PRIMARY_CLASS}/contentType2");
        // Inserted type2-then-type1 on purpose.
        session.object_mut(primary).push_entry(
            "content",
            FeatureMapEntry { feature: type2.clone(), value: Value::Object(map_two) },
        );
        session.object_mut(primary).push_entry(
            "content",
            FeatureMapEntry { feature: type1.clone(), value: Value::Object(map_one) },
        );

        let resource =
            session.create_resource(StoreUri::parse("mongo://localhost/data/primaries/"));
        session.attach(resource, primary);

        let outcome =
            store.save(&mut session, resource, &SaveOptions::default()).await.unwrap();

        // Load into a fresh session and compare feature by feature.
        let mut other = ResourceSet::new(registry);
        let loaded =
            store.load(&mut other, outcome.uri, &LoadOptions::default()).await.unwrap();
        let contents = other.resource(loaded.resource).contents();
        assert_eq!(contents.len(), 1);
        let copy = contents[0];

        assert_eq!(
            other.object(copy).single("name"),
            Some(&Value::String("junit".into()))
        );
        assert_eq!(
            other.object(copy).many("labels").unwrap(),
            &[Value::String("x".into()), Value::String("y".into())]
        );

        let children: Vec<String> = other
            .object(copy)
            .many("containedChildren")
            .unwrap()
            .iter()
            .map(|v| target_attribute(&other, v))
            .collect();
        assert_eq!(children, vec!["one".to_string(), "two".to_string()]);

        // The non-containment link comes back as an addressable stand-in
        // pointing into the stored document.
        let related = match other.object(copy).single("related") {
            Some(Value::Object(id)) => *id,
            other => panic!("expected reference value, got {other:?}"),
        };
        assert!(other.object(related).is_proxy());
        assert!(
            other
                .object(related)
                .proxy_uri()
                .unwrap()
                .to_string()
                .ends_with("#/0/@containedChildren.0")
        );

        let entries: Vec<(String, String)> = other
            .object(copy)
            .entries("content")
            .unwrap()
            .iter()
            .map(|entry| (entry.feature.clone(), target_attribute(&other, &entry.value)))
            .collect();
        assert_eq!(
            entries,
            vec![(type2, "map-two".to_string()), (type1, "map-one".to_string())]
        );
    }
}
