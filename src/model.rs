//! Static entity model for the sensor-observation domain.
//!
//! The model is fixed at compile time: eight entity types, each with a known
//! set of primitive properties and relationship properties. Query
//! specifications, the filter compiler, and the navigation resolver all
//! consult these tables; nothing here is request-scoped.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the fixed entity kinds in the sensor-observation graph.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub enum EntityType {
    /// A physical or virtual object carrying datastreams.
    Thing,
    /// A series of observations of one property by one sensor.
    Datastream,
    /// The instrument or procedure producing observations.
    Sensor,
    /// The phenomenon a datastream observes.
    ObservedProperty,
    /// A geographic position a thing can be located at.
    Location,
    /// A past association between a thing and its locations.
    HistoricalLocation,
    /// The real-world feature an observation is about.
    FeatureOfInterest,
    /// A single measured value.
    Observation,
}

/// All entity types, in declaration order.
pub const ENTITY_TYPES: [EntityType; 8] = [
    EntityType::Thing,
    EntityType::Datastream,
    EntityType::Sensor,
    EntityType::ObservedProperty,
    EntityType::Location,
    EntityType::HistoricalLocation,
    EntityType::FeatureOfInterest,
    EntityType::Observation,
];

impl EntityType {
    /// Singular type name as it appears in navigation segments.
    pub fn name(self) -> &'static str {
        match self {
            EntityType::Thing => "Thing",
            EntityType::Datastream => "Datastream",
            EntityType::Sensor => "Sensor",
            EntityType::ObservedProperty => "ObservedProperty",
            EntityType::Location => "Location",
            EntityType::HistoricalLocation => "HistoricalLocation",
            EntityType::FeatureOfInterest => "FeatureOfInterest",
            EntityType::Observation => "Observation",
        }
    }

    /// Name of the entity set collecting rows of this type.
    pub fn set_name(self) -> &'static str {
        match self {
            EntityType::Thing => "Things",
            EntityType::Datastream => "Datastreams",
            EntityType::Sensor => "Sensors",
            EntityType::ObservedProperty => "ObservedProperties",
            EntityType::Location => "Locations",
            EntityType::HistoricalLocation => "HistoricalLocations",
            EntityType::FeatureOfInterest => "FeaturesOfInterest",
            EntityType::Observation => "Observations",
        }
    }

    /// Resolves an entity-set name (e.g. `"Things"`) back to its type.
    pub fn from_set_name(name: &str) -> Option<Self> {
        ENTITY_TYPES.iter().copied().find(|t| t.set_name() == name)
    }

    /// Primitive properties defined on this type, excluding `id`.
    pub fn properties(self) -> &'static [PropertyDef] {
        match self {
            EntityType::Thing => THING_PROPS,
            EntityType::Datastream => DATASTREAM_PROPS,
            EntityType::Sensor => SENSOR_PROPS,
            EntityType::ObservedProperty => OBSERVED_PROPERTY_PROPS,
            EntityType::Location => LOCATION_PROPS,
            EntityType::HistoricalLocation => HISTORICAL_LOCATION_PROPS,
            EntityType::FeatureOfInterest => FEATURE_OF_INTEREST_PROPS,
            EntityType::Observation => OBSERVATION_PROPS,
        }
    }

    /// Looks up a primitive property by name.
    pub fn property(self, name: &str) -> Option<&'static PropertyDef> {
        self.properties().iter().find(|p| p.name == name)
    }

    /// Relationship properties defined on this type.
    ///
    /// Relationship names double as navigation-segment names: collection
    /// relationships carry the target's set name, singular relationships the
    /// target's type name.
    pub fn relations(self) -> &'static [RelationDef] {
        match self {
            EntityType::Thing => THING_RELS,
            EntityType::Datastream => DATASTREAM_RELS,
            EntityType::Sensor => SENSOR_RELS,
            EntityType::ObservedProperty => OBSERVED_PROPERTY_RELS,
            EntityType::Location => LOCATION_RELS,
            EntityType::HistoricalLocation => HISTORICAL_LOCATION_RELS,
            EntityType::FeatureOfInterest => FEATURE_OF_INTEREST_RELS,
            EntityType::Observation => OBSERVATION_RELS,
        }
    }

    /// Looks up a relationship by its navigation-segment name.
    pub fn relation(self, name: &str) -> Option<&'static RelationDef> {
        self.relations().iter().find(|r| r.name == name)
    }

    /// Finds the relationship on this type that points at `source`.
    ///
    /// Used when the only known quantity is the neighbouring type, e.g. when
    /// a navigation hop asks for "the Thing related to HistoricalLocation 7".
    pub fn relation_to(self, source: EntityType) -> Option<&'static RelationDef> {
        self.relations().iter().find(|r| r.target == source)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value category a primitive property stores.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub enum PropertyKind {
    /// 64-bit floating point number.
    Number,
    /// UTF-8 string.
    Text,
    /// Single instant in time.
    Time,
    /// Closed interval between two instants.
    TimeRange,
    /// WKT geometry with an SRID.
    Geometry,
}

/// Definition of one primitive property.
#[derive(Copy, Clone, Debug)]
pub struct PropertyDef {
    /// Property name as addressed in filter expressions.
    pub name: &'static str,
    /// Stored value category.
    pub kind: PropertyKind,
}

impl PropertyDef {
    const fn new(name: &'static str, kind: PropertyKind) -> Self {
        PropertyDef { name, kind }
    }
}

/// Whether a relationship yields at most one or many related entities.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub enum Cardinality {
    /// At most one related entity.
    One,
    /// Zero or more related entities.
    Many,
}

/// Definition of one relationship property.
#[derive(Copy, Clone, Debug)]
pub struct RelationDef {
    /// Navigation-segment name of the relationship.
    pub name: &'static str,
    /// Entity type the relationship points at.
    pub target: EntityType,
    /// How many related entities the relationship can yield.
    pub cardinality: Cardinality,
    /// Name of the matching relationship on the target type.
    pub inverse: &'static str,
}

impl RelationDef {
    const fn one(name: &'static str, target: EntityType, inverse: &'static str) -> Self {
        RelationDef {
            name,
            target,
            cardinality: Cardinality::One,
            inverse,
        }
    }

    const fn many(name: &'static str, target: EntityType, inverse: &'static str) -> Self {
        RelationDef {
            name,
            target,
            cardinality: Cardinality::Many,
            inverse,
        }
    }
}

// Per-type tables, one const item each so the slices live for 'static.

const THING_PROPS: &[PropertyDef] = &[
    PropertyDef::new("name", PropertyKind::Text),
    PropertyDef::new("description", PropertyKind::Text),
    PropertyDef::new("properties", PropertyKind::Text),
];

const DATASTREAM_PROPS: &[PropertyDef] = &[
    PropertyDef::new("name", PropertyKind::Text),
    PropertyDef::new("description", PropertyKind::Text),
    PropertyDef::new("observationType", PropertyKind::Text),
    PropertyDef::new("unitName", PropertyKind::Text),
    PropertyDef::new("phenomenonTime", PropertyKind::TimeRange),
    PropertyDef::new("resultTime", PropertyKind::TimeRange),
];

const SENSOR_PROPS: &[PropertyDef] = &[
    PropertyDef::new("name", PropertyKind::Text),
    PropertyDef::new("description", PropertyKind::Text),
    PropertyDef::new("encodingType", PropertyKind::Text),
    PropertyDef::new("metadata", PropertyKind::Text),
];

const OBSERVED_PROPERTY_PROPS: &[PropertyDef] = &[
    PropertyDef::new("name", PropertyKind::Text),
    PropertyDef::new("definition", PropertyKind::Text),
    PropertyDef::new("description", PropertyKind::Text),
];

const LOCATION_PROPS: &[PropertyDef] = &[
    PropertyDef::new("name", PropertyKind::Text),
    PropertyDef::new("description", PropertyKind::Text),
    PropertyDef::new("encodingType", PropertyKind::Text),
    PropertyDef::new("location", PropertyKind::Geometry),
];

const HISTORICAL_LOCATION_PROPS: &[PropertyDef] =
    &[PropertyDef::new("time", PropertyKind::Time)];

const FEATURE_OF_INTEREST_PROPS: &[PropertyDef] = &[
    PropertyDef::new("name", PropertyKind::Text),
    PropertyDef::new("description", PropertyKind::Text),
    PropertyDef::new("encodingType", PropertyKind::Text),
    PropertyDef::new("feature", PropertyKind::Geometry),
];

const OBSERVATION_PROPS: &[PropertyDef] = &[
    PropertyDef::new("result", PropertyKind::Number),
    PropertyDef::new("phenomenonTime", PropertyKind::Time),
    PropertyDef::new("resultTime", PropertyKind::Time),
    PropertyDef::new("validTime", PropertyKind::TimeRange),
    PropertyDef::new("parameters", PropertyKind::Text),
];

const THING_RELS: &[RelationDef] = &[
    RelationDef::many("Datastreams", EntityType::Datastream, "Thing"),
    RelationDef::many("Locations", EntityType::Location, "Things"),
    RelationDef::many(
        "HistoricalLocations",
        EntityType::HistoricalLocation,
        "Thing",
    ),
];

const DATASTREAM_RELS: &[RelationDef] = &[
    RelationDef::one("Thing", EntityType::Thing, "Datastreams"),
    RelationDef::one("Sensor", EntityType::Sensor, "Datastreams"),
    RelationDef::one(
        "ObservedProperty",
        EntityType::ObservedProperty,
        "Datastreams",
    ),
    RelationDef::many("Observations", EntityType::Observation, "Datastream"),
];

const SENSOR_RELS: &[RelationDef] = &[RelationDef::many(
    "Datastreams",
    EntityType::Datastream,
    "Sensor",
)];

const OBSERVED_PROPERTY_RELS: &[RelationDef] = &[RelationDef::many(
    "Datastreams",
    EntityType::Datastream,
    "ObservedProperty",
)];

const LOCATION_RELS: &[RelationDef] = &[
    RelationDef::many("Things", EntityType::Thing, "Locations"),
    RelationDef::many(
        "HistoricalLocations",
        EntityType::HistoricalLocation,
        "Locations",
    ),
];

const HISTORICAL_LOCATION_RELS: &[RelationDef] = &[
    RelationDef::one("Thing", EntityType::Thing, "HistoricalLocations"),
    RelationDef::many("Locations", EntityType::Location, "HistoricalLocations"),
];

const FEATURE_OF_INTEREST_RELS: &[RelationDef] = &[RelationDef::many(
    "Observations",
    EntityType::Observation,
    "FeatureOfInterest",
)];

const OBSERVATION_RELS: &[RelationDef] = &[
    RelationDef::one("Datastream", EntityType::Datastream, "Observations"),
    RelationDef::one(
        "FeatureOfInterest",
        EntityType::FeatureOfInterest,
        "Observations",
    ),
];
