//! Shared test model: a primary class exercising the full feature matrix
//! (attributes, custom and many-valued attributes, a feature map, and every
//! containment/proxy flavor of reference) plus a small target class.

use std::sync::Arc;

use crate::meta::{ClassDef, FeatureDef, FeatureKind, TypeRegistry, ValueType};
use crate::object::{ObjId, ResourceSet, Value};

pub(crate) const TARGET_CLASS: &str = "http://graphdoc/junit#//TargetObject";
pub(crate) const PRIMARY_CLASS: &str = "http://graphdoc/junit#//PrimaryObject";

fn attribute(name: &str, value_type: ValueType) -> FeatureDef {
    FeatureDef {
        name: name.into(),
        many: false,
        transient: false,
        unsettable: false,
        kind: FeatureKind::Attribute { value_type, derived_id: false },
    }
}

fn reference(name: &str, containment: bool, resolve_proxies: bool) -> FeatureDef {
    FeatureDef {
        name: name.into(),
        many: false,
        transient: false,
        unsettable: false,
        kind: FeatureKind::Reference { containment, resolve_proxies },
    }
}

fn many(mut feature: FeatureDef) -> FeatureDef {
    feature.many = true;
    feature
}

fn transient(mut feature: FeatureDef) -> FeatureDef {
    feature.transient = true;
    feature
}

pub(crate) fn registry() -> Arc<TypeRegistry> {
    let mut registry = TypeRegistry::new();

    registry.register(ClassDef {
        uri: TARGET_CLASS.into(),
        name: "TargetObject".into(),
        features: vec![attribute("singleAttribute", ValueType::String)],
    });

    registry.register(ClassDef {
        uri: PRIMARY_CLASS.into(),
        name: "PrimaryObject".into(),
        features: vec![
            attribute("name", ValueType::String),
            attribute("kind", ValueType::Custom),
            many(attribute("labels", ValueType::Custom)),
            many(attribute("scores", ValueType::Int)),
            FeatureDef {
                name: "key".into(),
                many: false,
                transient: false,
                unsettable: false,
                kind: FeatureKind::Attribute { value_type: ValueType::Custom, derived_id: true },
            },
            transient(attribute("hidden", ValueType::String)),
            FeatureDef {
                name: "content".into(),
                many: true,
                transient: false,
                unsettable: false,
                kind: FeatureKind::FeatureMap,
            },
            // Feature-map member features: reachable only through `content`.
            transient(reference("contentType1", true, false)),
            transient(reference("contentType2", true, false)),
            reference("containedNoProxy", true, false),
            many(reference("containedNoProxyMany", true, false)),
            reference("containedWithProxy", true, true),
            many(reference("containedWithProxyMany", true, true)),
            reference("related", false, true),
            many(reference("relatedMany", false, true)),
            FeatureDef {
                name: "unsettableReference".into(),
                many: false,
                transient: false,
                unsettable: true,
                kind: FeatureKind::Reference { containment: false, resolve_proxies: true },
            },
        ],
    });

    Arc::new(registry)
}

pub(crate) fn new_target(set: &mut ResourceSet, attribute: &str) -> ObjId {
    let class = set.registry().resolve_class(TARGET_CLASS).unwrap();
    let target = set.create(&class);
    set.object_mut(target).set("singleAttribute", Value::String(attribute.into()));
    target
}

pub(crate) fn new_primary(set: &mut ResourceSet, name: &str) -> ObjId {
    let class = set.registry().resolve_class(PRIMARY_CLASS).unwrap();
    let primary = set.create(&class);
    set.object_mut(primary).set("name", Value::String(name.into()));
    primary
}
