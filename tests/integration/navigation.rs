//! Navigation-path resolution against a store-backed gateway.

use sentra::model::EntityType;
use sentra::query::ast::PathSegment;
use sentra::query::{PathResolver, ResolvedTarget, SpecRegistry};
use sentra::store::{EntityRow, InMemoryStore, Page, Repository};
use sentra::types::EntityId;

/// Station 1 carries datastreams 10 and 11; station 2 carries datastream 12.
/// Observation 100 sits on datastream 10 about feature 40; historical
/// location 50 ties station 1 to location 30.
fn fixture() -> InMemoryStore {
    let mut store = InMemoryStore::new();

    store.insert(EntityType::Thing, EntityRow::new(1).set("name", "station-a"));
    store.insert(EntityType::Thing, EntityRow::new(2).set("name", "station-b"));
    store.insert(
        EntityType::Location,
        EntityRow::new(30).set("name", "roof"),
    );
    store.insert(
        EntityType::HistoricalLocation,
        EntityRow::new(50),
    );
    store.insert(EntityType::Sensor, EntityRow::new(20).set("name", "dht22"));
    store.insert(
        EntityType::ObservedProperty,
        EntityRow::new(25).set("name", "temperature"),
    );
    store.insert(
        EntityType::Datastream,
        EntityRow::new(10).set("name", "air-temp"),
    );
    store.insert(
        EntityType::Datastream,
        EntityRow::new(11).set("name", "humidity"),
    );
    store.insert(
        EntityType::Datastream,
        EntityRow::new(12).set("name", "remote"),
    );
    store.insert(
        EntityType::FeatureOfInterest,
        EntityRow::new(40).set("name", "park"),
    );
    store.insert(
        EntityType::Observation,
        EntityRow::new(100).set("result", 18.5),
    );

    store
        .link(EntityType::Thing, EntityId(1), "Locations", EntityId(30))
        .unwrap();
    store
        .link(
            EntityType::Thing,
            EntityId(1),
            "HistoricalLocations",
            EntityId(50),
        )
        .unwrap();
    store
        .link(
            EntityType::HistoricalLocation,
            EntityId(50),
            "Locations",
            EntityId(30),
        )
        .unwrap();
    for (ds, thing) in [(10, 1), (11, 1), (12, 2)] {
        store
            .link(EntityType::Datastream, EntityId(ds), "Thing", EntityId(thing))
            .unwrap();
    }
    store
        .link(EntityType::Datastream, EntityId(10), "Sensor", EntityId(20))
        .unwrap();
    store
        .link(
            EntityType::Datastream,
            EntityId(10),
            "ObservedProperty",
            EntityId(25),
        )
        .unwrap();
    store
        .link(
            EntityType::Observation,
            EntityId(100),
            "Datastream",
            EntityId(10),
        )
        .unwrap();
    store
        .link(
            EntityType::Observation,
            EntityId(100),
            "FeatureOfInterest",
            EntityId(40),
        )
        .unwrap();

    store
}

fn segments(path: &[(&str, Option<u64>)]) -> Vec<PathSegment> {
    path.iter()
        .map(|(name, key)| match key {
            Some(id) => PathSegment::keyed(*name, *id),
            None => PathSegment::unkeyed(*name),
        })
        .collect()
}

#[test]
fn root_entity_resolves() {
    let store = fixture();
    let registry = SpecRegistry::new();
    let resolver = PathResolver::new(&registry, &store);

    let resolved = resolver.resolve(&segments(&[("Things", Some(1))])).unwrap();
    assert_eq!(
        resolved.target,
        ResolvedTarget::Entity {
            entity: EntityType::Thing,
            id: EntityId(1),
        }
    );
}

#[test]
fn missing_root_is_not_found() {
    let store = fixture();
    let registry = SpecRegistry::new();
    let resolver = PathResolver::new(&registry, &store);

    let err = resolver
        .resolve(&segments(&[("Things", Some(99))]))
        .unwrap_err();
    assert_eq!(err.code(), "NavigationNotFound");
}

#[test]
fn unknown_entity_set_is_unsupported() {
    let store = fixture();
    let registry = SpecRegistry::new();
    let resolver = PathResolver::new(&registry, &store);

    let err = resolver
        .resolve(&segments(&[("Widgets", Some(1))]))
        .unwrap_err();
    assert_eq!(err.code(), "UnsupportedOperator");
}

#[test]
fn root_collection_requires_a_key() {
    let store = fixture();
    let registry = SpecRegistry::new();
    let resolver = PathResolver::new(&registry, &store);

    let err = resolver.resolve(&segments(&[("Things", None)])).unwrap_err();
    assert_eq!(err.code(), "UnsupportedPathShape");

    let err = resolver.resolve(&[]).unwrap_err();
    assert_eq!(err.code(), "UnsupportedPathShape");
}

#[test]
fn related_collection_terminal_builds_a_filter() {
    let store = fixture();
    let registry = SpecRegistry::new();
    let resolver = PathResolver::new(&registry, &store);

    let resolved = resolver
        .resolve(&segments(&[("Things", Some(1)), ("Datastreams", None)]))
        .unwrap();
    assert_eq!(resolved.source, EntityType::Thing);
    assert_eq!(resolved.source_id, EntityId(1));
    let ResolvedTarget::Collection { entity, filter } = resolved.target else {
        panic!("expected a collection target");
    };
    assert_eq!(entity, EntityType::Datastream);
    let ids: Vec<u64> = store
        .find_all(entity, &filter, Page::ALL)
        .unwrap()
        .into_iter()
        .map(u64::from)
        .collect();
    assert_eq!(ids, vec![10, 11]);
}

#[test]
fn keyed_hop_verifies_relatedness() {
    let store = fixture();
    let registry = SpecRegistry::new();
    let resolver = PathResolver::new(&registry, &store);

    let resolved = resolver
        .resolve(&segments(&[("Things", Some(1)), ("Datastreams", Some(10))]))
        .unwrap();
    assert_eq!(
        resolved.target,
        ResolvedTarget::Entity {
            entity: EntityType::Datastream,
            id: EntityId(10),
        }
    );

    // Datastream 12 exists but belongs to station 2.
    let err = resolver
        .resolve(&segments(&[("Things", Some(1)), ("Datastreams", Some(12))]))
        .unwrap_err();
    assert_eq!(err.code(), "NavigationNotFound");
}

#[test]
fn to_one_hop_resolves_without_a_key() {
    let store = fixture();
    let registry = SpecRegistry::new();
    let resolver = PathResolver::new(&registry, &store);

    let resolved = resolver
        .resolve(&segments(&[("Observations", Some(100)), ("Datastream", None)]))
        .unwrap();
    assert_eq!(
        resolved.target,
        ResolvedTarget::Entity {
            entity: EntityType::Datastream,
            id: EntityId(10),
        }
    );

    let resolved = resolver
        .resolve(&segments(&[
            ("HistoricalLocations", Some(50)),
            ("Thing", None),
        ]))
        .unwrap();
    assert_eq!(
        resolved.target,
        ResolvedTarget::Entity {
            entity: EntityType::Thing,
            id: EntityId(1),
        }
    );
}

#[test]
fn multi_hop_path_walks_through_keyed_segments() {
    let store = fixture();
    let registry = SpecRegistry::new();
    let resolver = PathResolver::new(&registry, &store);

    let resolved = resolver
        .resolve(&segments(&[
            ("Things", Some(1)),
            ("Datastreams", Some(10)),
            ("Observations", None),
        ]))
        .unwrap();
    assert_eq!(resolved.source, EntityType::Datastream);
    assert_eq!(resolved.source_id, EntityId(10));
    let ResolvedTarget::Collection { entity, filter } = resolved.target else {
        panic!("expected a collection target");
    };
    assert_eq!(entity, EntityType::Observation);
    let ids = store.find_all(entity, &filter, Page::ALL).unwrap();
    assert_eq!(ids, vec![EntityId(100)]);
}

#[test]
fn unkeyed_collection_cannot_be_an_intermediate_hop() {
    let store = fixture();
    let registry = SpecRegistry::new();
    let resolver = PathResolver::new(&registry, &store);

    let err = resolver
        .resolve(&segments(&[
            ("Things", Some(1)),
            ("Datastreams", None),
            ("Observations", None),
        ]))
        .unwrap_err();
    assert_eq!(err.code(), "UnsupportedPathShape");
}

#[test]
fn unknown_navigation_property_names_the_entity() {
    let store = fixture();
    let registry = SpecRegistry::new();
    let resolver = PathResolver::new(&registry, &store);

    let err = resolver
        .resolve(&segments(&[("Things", Some(1)), ("Observations", None)]))
        .unwrap_err();
    assert_eq!(err.code(), "UnknownProperty");
}

#[test]
fn broken_to_one_hop_is_not_found() {
    let mut store = fixture();
    // Observation 101 has no datastream link at all.
    store.insert(
        EntityType::Observation,
        EntityRow::new(101).set("result", 1.0),
    );
    let registry = SpecRegistry::new();
    let resolver = PathResolver::new(&registry, &store);

    let err = resolver
        .resolve(&segments(&[("Observations", Some(101)), ("Datastream", None)]))
        .unwrap_err();
    assert_eq!(err.code(), "NavigationNotFound");
}
