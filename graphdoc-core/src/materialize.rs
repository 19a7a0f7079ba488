//! Document-to-graph materialization.
//!
//! [`GraphMaterializer`] reconstructs typed objects from stored documents.
//! A document whose class URI cannot be resolved materializes as `None`
//! rather than failing the whole load, so partial graphs are possible and
//! callers must tolerate missing children. Value conversion failures, by
//! contrast, fail the load outright.
//!
//! Proxy descriptors resolve in one of two ways, decided by the *consuming*
//! reference: a reference that does not auto-resolve proxies goes through
//! the session's proxy table, so every occurrence of the same absolute
//! address yields the same stand-in object; a reference that does
//! auto-resolve always constructs a fresh instance of the descriptor's
//! class and tags it with the resolved address, with no data population.

use bson::{Bson, Document};

use crate::address::{StoreUri, UriMapper};
use crate::convert;
use crate::document::{EXTRINSIC_ID_KEY, ID_KEY, class_uri_of, proxy_uri_of};
use crate::error::{GraphStoreError, GraphStoreResult};
use crate::meta::{FeatureDef, FeatureKind, ValueType};
use crate::object::{FeatureMapEntry, ObjId, ResourceSet, Value};

/// Materializes documents into one session, resolving proxy addresses
/// through the given mapper.
pub struct GraphMaterializer<'a> {
    set: &'a mut ResourceSet,
    mapper: &'a dyn UriMapper,
}

impl<'a> GraphMaterializer<'a> {
    pub fn new(set: &'a mut ResourceSet, mapper: &'a dyn UriMapper) -> Self {
        Self { set, mapper }
    }

    /// Materializes a document into a typed object.
    ///
    /// `tag_collection` is set for top-level query results: the object is
    /// tagged with a synthetic proxy address `../{collection}/{_id}#/0` so
    /// results are uniformly addressable, its feature maps are not
    /// replayed, and its references are left unpopulated.
    ///
    /// Returns `None` when the document's class cannot be resolved.
    pub fn materialize(
        &mut self,
        document: &Document,
        tag_collection: Option<&str>,
    ) -> GraphStoreResult<Option<ObjId>> {
        let class = match class_uri_of(document).and_then(|uri| {
            let resolved = self.set.registry().resolve_class(uri);
            if resolved.is_none() {
                tracing::warn!("unresolvable class '{uri}', skipping object");
            }
            resolved
        }) {
            Some(class) => class,
            None => return Ok(None),
        };

        let object = self.set.create(&class);
        let tagged = tag_collection.is_some();

        if let Some(collection) = tag_collection {
            let id = match document.get(ID_KEY) {
                Some(Bson::ObjectId(id)) => id.to_hex(),
                Some(other) => other.to_string(),
                None => String::new(),
            };
            let relative = StoreUri::parse(&format!("../{collection}/{id}")).with_fragment("/0");
            self.set.object_mut(object).set_proxy_uri(self.mapper.resolve(&relative));
        } else if let Ok(id) = document.get_str(EXTRINSIC_ID_KEY) {
            self.set.object_mut(object).set_extrinsic_id(id);
        }

        for index in 0..class.features.len() {
            let feature = class.features[index].clone();
            if feature.transient {
                continue;
            }
            match &feature.kind {
                FeatureKind::Attribute { value_type, derived_id } => {
                    if *derived_id {
                        continue;
                    }
                    self.materialize_attribute(object, &feature, value_type, document)?;
                }
                FeatureKind::FeatureMap => {
                    // Not replayed onto proxy-tagged query results; partial
                    // loads must not resolve dynamic feature keys.
                    if !tagged {
                        self.materialize_feature_map(object, &feature, document)?;
                    }
                }
                FeatureKind::Reference { resolve_proxies, .. } => {
                    if !tagged {
                        self.materialize_reference_slot(
                            object,
                            &feature,
                            *resolve_proxies,
                            document,
                        )?;
                    }
                }
            }
        }

        Ok(Some(object))
    }

    fn materialize_attribute(
        &mut self,
        object: ObjId,
        feature: &FeatureDef,
        value_type: &ValueType,
        document: &Document,
    ) -> GraphStoreResult<()> {
        // Key absence means "leave at default", distinct from explicit null.
        let stored = match document.get(&feature.name) {
            None => return Ok(()),
            Some(stored) => stored,
        };

        if feature.many {
            let elements = match stored {
                Bson::Array(elements) => elements,
                other => {
                    return Err(GraphStoreError::Conversion(format!(
                        "attribute '{}' stored as {other:?}, expected an array",
                        feature.name
                    )));
                }
            };

            let values = if value_type.is_native() {
                elements
                    .iter()
                    .map(|e| convert::from_bson(value_type, e))
                    .collect::<GraphStoreResult<Vec<_>>>()?
            } else {
                elements
                    .iter()
                    .map(|e| match e {
                        Bson::String(literal) => convert::from_literal(value_type, literal),
                        other => Err(GraphStoreError::Conversion(format!(
                            "attribute '{}' element stored as {other:?}, expected a string",
                            feature.name
                        ))),
                    })
                    .collect::<GraphStoreResult<Vec<_>>>()?
            };

            self.set.object_mut(object).set_many(&feature.name, values);
        } else {
            let value = convert::from_bson(value_type, stored)?;
            self.set.object_mut(object).set(&feature.name, value);
        }

        Ok(())
    }

    fn materialize_feature_map(
        &mut self,
        object: ObjId,
        feature: &FeatureDef,
        document: &Document,
    ) -> GraphStoreResult<()> {
        let entries = match document.get(&feature.name) {
            None => return Ok(()),
            Some(Bson::Array(entries)) => entries.clone(),
            Some(other) => {
                return Err(GraphStoreError::Conversion(format!(
                    "feature map '{}' stored as {other:?}, expected an array",
                    feature.name
                )));
            }
        };

        for entry in &entries {
            let entry = match entry.as_document() {
                Some(entry) => entry,
                None => {
                    return Err(GraphStoreError::Conversion(format!(
                        "feature map '{}' holds a non-document entry",
                        feature.name
                    )));
                }
            };

            let key = entry.get_str("key").map_err(|_| {
                GraphStoreError::Conversion(format!(
                    "feature map '{}' entry has no key",
                    feature.name
                ))
            })?;

            let resolved = self.set.registry().resolve_feature(key);
            let (class, index) = match resolved {
                Some(found) => found,
                None => {
                    tracing::warn!("unresolvable feature-map key '{key}', skipping entry");
                    continue;
                }
            };
            let entry_feature = class.features[index].clone();
            let key = key.to_string();
            let stored = entry.get("value").cloned().unwrap_or(Bson::Null);

            match &entry_feature.kind {
                FeatureKind::Attribute { value_type, .. } => {
                    let value = convert::from_bson(value_type, &stored)?;
                    self.set
                        .object_mut(object)
                        .push_entry(&feature.name, FeatureMapEntry { feature: key, value });
                }
                FeatureKind::Reference { resolve_proxies, .. } => {
                    if let Some(target) = self.materialize_reference(&stored, *resolve_proxies)? {
                        self.set.object_mut(object).push_entry(
                            &feature.name,
                            FeatureMapEntry { feature: key, value: Value::Object(target) },
                        );
                    }
                }
                FeatureKind::FeatureMap => {
                    return Err(GraphStoreError::Conversion(format!(
                        "feature-map entry '{key}' names a feature map"
                    )));
                }
            }
        }

        Ok(())
    }

    fn materialize_reference_slot(
        &mut self,
        object: ObjId,
        feature: &FeatureDef,
        resolve_proxies: bool,
        document: &Document,
    ) -> GraphStoreResult<()> {
        let stored = match document.get(&feature.name) {
            None => return Ok(()),
            Some(stored) => stored.clone(),
        };

        if feature.many {
            let elements = match stored {
                Bson::Array(elements) => elements,
                other => {
                    return Err(GraphStoreError::Conversion(format!(
                        "reference '{}' stored as {other:?}, expected an array",
                        feature.name
                    )));
                }
            };

            for element in &elements {
                match self.materialize_reference(element, resolve_proxies)? {
                    Some(target) => {
                        self.set.object_mut(object).push(&feature.name, Value::Object(target));
                    }
                    // A missing child (deleted type, stored null) leaves a
                    // gap; the order of the rest is preserved.
                    None => {}
                }
            }
        } else if stored == Bson::Null {
            if feature.unsettable {
                self.set.object_mut(object).set(&feature.name, Value::Null);
            }
        } else if let Some(target) = self.materialize_reference(&stored, resolve_proxies)? {
            self.set.object_mut(object).set(&feature.name, Value::Object(target));
        }

        Ok(())
    }

    /// Null in, null out; a proxy descriptor builds a proxy, anything else
    /// recurses into full materialization.
    fn materialize_reference(
        &mut self,
        stored: &Bson,
        resolve_proxies: bool,
    ) -> GraphStoreResult<Option<ObjId>> {
        let document = match stored {
            Bson::Null => return Ok(None),
            Bson::Document(document) => document,
            other => {
                return Err(GraphStoreError::Conversion(format!(
                    "reference stored as {other:?}, expected a document"
                )));
            }
        };

        match proxy_uri_of(document) {
            Some(_) => self.materialize_proxy(document, resolve_proxies),
            None => self.materialize(document, None),
        }
    }

    fn materialize_proxy(
        &mut self,
        descriptor: &Document,
        resolve_proxies: bool,
    ) -> GraphStoreResult<Option<ObjId>> {
        let proxy_uri = proxy_uri_of(descriptor).ok_or_else(|| {
            GraphStoreError::Serialization("proxy descriptor without address".to_string())
        })?;
        let absolute = self.mapper.resolve(&StoreUri::parse(proxy_uri));
        let key = absolute.to_string();

        if !resolve_proxies {
            if let Some(existing) = self.set.lookup_proxy(&key) {
                return Ok(Some(existing));
            }
        }

        let class = match class_uri_of(descriptor)
            .and_then(|uri| self.set.registry().resolve_class(uri))
        {
            Some(class) => class,
            None => {
                tracing::warn!("unresolvable proxy class in descriptor, skipping reference");
                return Ok(None);
            }
        };

        let object = self.set.create(&class);
        self.set.object_mut(object).set_proxy_uri(absolute);

        if !resolve_proxies {
            self.set.register_proxy(key, object);
        }

        Ok(Some(object))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::BaseRelativeMapper;
    use crate::document::{ECLASS_KEY, PROXY_KEY};
    use crate::fixtures;
    use crate::object::SlotValue;
    use crate::serialize::GraphSerializer;
    use bson::doc;

    fn mapper_for(base: &str) -> BaseRelativeMapper {
        BaseRelativeMapper::new(StoreUri::parse(base))
    }

    fn round_trip(set: &mut ResourceSet, object: ObjId, base: &str) -> ObjId {
        let mapper = mapper_for(base);
        let document = GraphSerializer::new(set, &mapper).serialize(object).unwrap();
        GraphMaterializer::new(set, &mapper).materialize(&document, None).unwrap().unwrap()
    }

    #[test]
    fn attributes_round_trip() {
        let mut set = ResourceSet::new(fixtures::registry());
        let primary = fixtures::new_primary(&mut set, "junit");
        set.object_mut(primary).set("kind", Value::String("point(1,2)".into()));
        set.object_mut(primary).set_many(
            "labels",
            vec![Value::String("alpha".into()), Value::String("beta".into())],
        );
        set.object_mut(primary).set_many("scores", vec![Value::Int(3), Value::Int(5)]);
        set.object_mut(primary).set_extrinsic_id("p1");

        let copy = round_trip(&mut set, primary, "mongo://localhost/data/primaries/-1");

        let copy = set.object(copy);
        assert_eq!(copy.single("name"), Some(&Value::String("junit".into())));
        assert_eq!(copy.single("kind"), Some(&Value::String("point(1,2)".into())));
        assert_eq!(
            copy.many("labels").unwrap(),
            &[Value::String("alpha".into()), Value::String("beta".into())]
        );
        assert_eq!(copy.many("scores").unwrap(), &[Value::Int(3), Value::Int(5)]);
        assert_eq!(copy.extrinsic_id(), Some("p1"));
        // Never-set features come back unset, not null.
        assert!(!copy.is_set("related"));
        assert!(!copy.is_set("unsettableReference"));
    }

    #[test]
    fn embedded_containment_round_trips() {
        let mut set = ResourceSet::new(fixtures::registry());
        let target = fixtures::new_target(&mut set, "junit");
        let primary = fixtures::new_primary(&mut set, "junit");
        set.object_mut(primary).set("containedNoProxy", Value::Object(target));

        let copy = round_trip(&mut set, primary, "mongo://localhost/data/primaries/-1");

        let child = match set.object(copy).single("containedNoProxy") {
            Some(Value::Object(child)) => *child,
            other => panic!("expected embedded child, got {other:?}"),
        };
        assert!(!set.object(child).is_proxy());
        assert_eq!(
            set.object(child).single("singleAttribute"),
            Some(&Value::String("junit".into()))
        );
    }

    #[test]
    fn unsettable_reference_distinguishes_null_from_unset() {
        let mut set = ResourceSet::new(fixtures::registry());

        let explicit = fixtures::new_primary(&mut set, "explicit");
        set.object_mut(explicit).set("unsettableReference", Value::Null);
        let copy = round_trip(&mut set, explicit, "mongo://localhost/data/primaries/-1");
        assert!(set.object(copy).is_set("unsettableReference"));
        assert_eq!(set.object(copy).single("unsettableReference"), Some(&Value::Null));

        let untouched = fixtures::new_primary(&mut set, "untouched");
        let copy = round_trip(&mut set, untouched, "mongo://localhost/data/primaries/-1");
        assert!(!set.object(copy).is_set("unsettableReference"));
    }

    #[test]
    fn feature_map_round_trips_in_insertion_order() {
        let mut set = ResourceSet::new(fixtures::registry());
        let one = fixtures::new_target(&mut set, "one");
        let two = fixtures::new_target(&mut set, "two");
        let primary = fixtures::new_primary(&mut set, "junit");

        let type1 = format!("{}/contentType1", fixtures::PRIMARY_CLASS);
        let type2 = format!("{}/contentType2", fixtures::PRIMARY_CLASS);
        set.object_mut(primary)
            .push_entry("content", FeatureMapEntry { feature: type2.clone(), value: Value::Object(two) });
        set.object_mut(primary)
            .push_entry("content", FeatureMapEntry { feature: type1.clone(), value: Value::Object(one) });

        let copy = round_trip(&mut set, primary, "mongo://localhost/data/primaries/-1");

        let entries: Vec<(String, String)> = set
            .object(copy)
            .entries("content")
            .unwrap()
            .iter()
            .map(|entry| {
                let attribute = match entry.value {
                    Value::Object(child) => match set.object(child).single("singleAttribute") {
                        Some(Value::String(s)) => s.clone(),
                        other => panic!("expected string attribute, got {other:?}"),
                    },
                    ref other => panic!("expected object entry, got {other:?}"),
                };
                (entry.feature.clone(), attribute)
            })
            .collect();

        assert_eq!(
            entries,
            vec![(type2, "two".to_string()), (type1, "one".to_string())]
        );
    }

    #[test]
    fn unresolvable_class_materializes_as_none() {
        let mut set = ResourceSet::new(fixtures::registry());
        let mapper = mapper_for("mongo://localhost/data/primaries/-1");
        let document = doc! { ECLASS_KEY: "http://graphdoc/junit#//Vanished" };

        let result =
            GraphMaterializer::new(&mut set, &mapper).materialize(&document, None).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn non_resolving_reference_deduplicates_through_the_session_table() {
        let mut set = ResourceSet::new(fixtures::registry());
        let mapper = mapper_for("mongo://localhost/data/primaries/-1");

        let descriptor = doc! {
            PROXY_KEY: "../targets/aaaabbbbccccddddeeeeffff#/0",
            ECLASS_KEY: fixtures::TARGET_CLASS,
        };
        let document = doc! {
            ECLASS_KEY: fixtures::PRIMARY_CLASS,
            "containedNoProxy": descriptor.clone(),
            "containedNoProxyMany": [descriptor],
        };

        let object = GraphMaterializer::new(&mut set, &mapper)
            .materialize(&document, None)
            .unwrap()
            .unwrap();

        let single = match set.object(object).single("containedNoProxy") {
            Some(Value::Object(id)) => *id,
            other => panic!("expected proxy object, got {other:?}"),
        };
        let in_list = match set.object(object).many("containedNoProxyMany") {
            Some([Value::Object(id)]) => *id,
            other => panic!("expected one proxy object, got {other:?}"),
        };

        // Same absolute address, same stand-in.
        assert_eq!(single, in_list);
        assert!(set.object(single).is_proxy());
        assert_eq!(
            set.object(single).proxy_uri().unwrap().to_string(),
            "mongo://localhost/data/targets/aaaabbbbccccddddeeeeffff#/0"
        );
    }

    #[test]
    fn resolving_reference_builds_fresh_tagged_instances() {
        let mut set = ResourceSet::new(fixtures::registry());
        let mapper = mapper_for("mongo://localhost/data/primaries/-1");

        let descriptor = doc! {
            PROXY_KEY: "../targets/aaaabbbbccccddddeeeeffff#/0",
            ECLASS_KEY: fixtures::TARGET_CLASS,
        };
        let document = doc! {
            ECLASS_KEY: fixtures::PRIMARY_CLASS,
            "related": descriptor.clone(),
            "relatedMany": [descriptor],
        };

        let object = GraphMaterializer::new(&mut set, &mapper)
            .materialize(&document, None)
            .unwrap()
            .unwrap();

        let single = match set.object(object).single("related") {
            Some(Value::Object(id)) => *id,
            other => panic!("expected proxy object, got {other:?}"),
        };
        let in_list = match set.object(object).many("relatedMany") {
            Some([Value::Object(id)]) => *id,
            other => panic!("expected one proxy object, got {other:?}"),
        };

        // Auto-resolving references construct per occurrence; both carry
        // the resolved address but no data.
        assert_ne!(single, in_list);
        for id in [single, in_list] {
            assert!(set.object(id).is_proxy());
            assert!(!set.object(id).is_set("singleAttribute"));
        }
    }

    #[test]
    fn query_result_tagging_skips_feature_maps_and_references() {
        let mut set = ResourceSet::new(fixtures::registry());
        let mapper = mapper_for("mongo://localhost/data/primaries/-1");
        let id = bson::oid::ObjectId::new();

        let type1 = format!("{}/contentType1", fixtures::PRIMARY_CLASS);
        let document = doc! {
            ID_KEY: id,
            ECLASS_KEY: fixtures::PRIMARY_CLASS,
            "name": "junit",
            "content": [ { "key": type1, "value": { ECLASS_KEY: fixtures::TARGET_CLASS } } ],
            "related": { PROXY_KEY: "../targets/aaaabbbbccccddddeeeeffff#/0", ECLASS_KEY: fixtures::TARGET_CLASS },
        };

        let object = GraphMaterializer::new(&mut set, &mapper)
            .materialize(&document, Some("primaries"))
            .unwrap()
            .unwrap();

        let object = set.object(object);
        assert_eq!(
            object.proxy_uri().unwrap().to_string(),
            format!("mongo://localhost/data/primaries/{}#/0", id.to_hex())
        );
        // Attributes are populated on tagged results, the rest is not.
        assert_eq!(object.single("name"), Some(&Value::String("junit".into())));
        assert!(!object.is_set("content"));
        assert!(!object.is_set("related"));
    }

    #[test]
    fn many_valued_slot_round_trips_as_many() {
        let mut set = ResourceSet::new(fixtures::registry());
        let one = fixtures::new_target(&mut set, "one");
        let two = fixtures::new_target(&mut set, "two");
        let primary = fixtures::new_primary(&mut set, "junit");
        set.object_mut(primary).push("containedNoProxyMany", Value::Object(one));
        set.object_mut(primary).push("containedNoProxyMany", Value::Object(two));

        let copy = round_trip(&mut set, primary, "mongo://localhost/data/primaries/-1");

        let attributes: Vec<Value> = set
            .object(copy)
            .many("containedNoProxyMany")
            .unwrap()
            .iter()
            .map(|v| match v {
                Value::Object(child) => {
                    set.object(*child).single("singleAttribute").unwrap().clone()
                }
                other => panic!("expected object, got {other:?}"),
            })
            .collect();

        assert_eq!(
            attributes,
            vec![Value::String("one".into()), Value::String("two".into())]
        );
    }

    #[test]
    fn slot_value_shapes_survive() {
        let mut set = ResourceSet::new(fixtures::registry());
        let primary = fixtures::new_primary(&mut set, "junit");
        let copy = round_trip(&mut set, primary, "mongo://localhost/data/primaries/-1");
        assert!(matches!(set.object(copy).get("name"), Some(SlotValue::Single(_))));
    }
}
