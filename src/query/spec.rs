//! Per-entity query specifications and the process-lifetime registry.
//!
//! A specification resolves named properties of one entity type into typed
//! predicates, wraps predicates into id subqueries, and states the type's
//! validity rule. Specifications are independent implementations of one
//! capability trait, selected from the registry by entity type; the registry
//! is built once at startup and never mutated afterwards, so it can be shared
//! freely across concurrent requests.

use rustc_hash::FxHashMap;

use crate::model::{EntityType, PropertyKind};
use crate::predicate::{
    CmpOp, GeoExpr, NumberExpr, Predicate, RangeExpr, RelationTarget, SpatialOp, StringExpr,
    Subquery, TimeExpr,
};
use crate::query::errors::{QueryError, QueryResult, StageFailure};
use crate::types::EntityId;
use crate::value::Value;

/// Operand handed to [`QuerySpec::filter_for_property`].
#[derive(Clone, Debug, PartialEq)]
pub enum FilterValue {
    /// A decoded literal.
    Value(Value),
    /// An id set produced while folding a foreign filter path.
    Subquery(Subquery),
}

impl FilterValue {
    /// Short description used in error messages.
    pub fn describe(&self) -> String {
        match self {
            FilterValue::Value(v) => format!("{} literal {v}", v.kind_name()),
            FilterValue::Subquery(sub) => format!("{} id subquery", sub.entity),
        }
    }
}

/// Typed accessor for a single-segment property reference.
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyAccessor {
    /// Numeric property.
    Number(NumberExpr),
    /// Text property.
    Text(StringExpr),
    /// Instant property.
    Time(TimeExpr),
    /// Interval property.
    Range(RangeExpr),
    /// Geometry property.
    Geometry(GeoExpr),
}

/// Capability interface implemented once per entity type.
pub trait QuerySpec: Send + Sync {
    /// Entity type this specification describes.
    fn entity(&self) -> EntityType;

    /// Resolves a stored property or relationship name into a predicate.
    ///
    /// `switched` indicates the operands arrived in swapped order (value on
    /// the left of the comparison); ordering operators are mirrored
    /// accordingly.
    fn filter_for_property(
        &self,
        property: &str,
        value: FilterValue,
        op: CmpOp,
        switched: bool,
    ) -> QueryResult<Predicate>;

    /// Wraps a predicate into an id-producing subquery for this type.
    fn id_subquery_with_filter(&self, filter: Predicate) -> Subquery {
        Subquery::new(self.entity(), filter)
    }

    /// Visibility rule for rows of this type; `Always(true)` by default.
    fn is_valid_entity(&self) -> Predicate {
        Predicate::Always(true)
    }

    /// Predicate selecting rows of this type related to one `source` entity.
    fn related_to(&self, source: EntityType, source_id: EntityId) -> QueryResult<Predicate> {
        let rel = self.entity().relation_to(source).ok_or_else(|| {
            QueryError::UnsupportedPathShape(format!(
                "{} has no relationship to {source}",
                self.entity()
            ))
        })?;
        Ok(Predicate::Related {
            relation: rel.name.to_owned(),
            target: RelationTarget::Id(source_id),
        })
    }

    /// Resolves a single-segment property reference to a typed accessor.
    fn property_accessor(&self, name: &str) -> QueryResult<PropertyAccessor> {
        accessor_for(self.entity(), name)
    }
}

fn accessor_for(entity: EntityType, name: &str) -> QueryResult<PropertyAccessor> {
    if name == "id" {
        return Ok(PropertyAccessor::Number(NumberExpr::Id));
    }
    let prop = entity
        .property(name)
        .ok_or_else(|| QueryError::unknown_property(entity, name))?;
    let name = name.to_owned();
    Ok(match prop.kind {
        PropertyKind::Number => PropertyAccessor::Number(NumberExpr::Property(name)),
        PropertyKind::Text => PropertyAccessor::Text(StringExpr::Property(name)),
        PropertyKind::Time => PropertyAccessor::Time(TimeExpr::Property(name)),
        PropertyKind::TimeRange => PropertyAccessor::Range(RangeExpr::Property(name)),
        PropertyKind::Geometry => PropertyAccessor::Geometry(GeoExpr::Property(name)),
    })
}

fn mismatch(property: &str, expected: &'static str, value: &FilterValue) -> QueryError {
    QueryError::TypeCoercionFailure {
        left: format!("property '{property}'"),
        right: value.describe(),
        stages: vec![StageFailure {
            stage: "property",
            reason: format!("'{property}' holds {expected} values"),
        }],
    }
}

/// Filter on the entity id column.
fn id_filter(value: FilterValue, op: CmpOp, switched: bool) -> QueryResult<Predicate> {
    let op = if switched { op.swapped() } else { op };
    match value {
        FilterValue::Value(Value::Number(n)) => Ok(Predicate::NumberCmp {
            op,
            lhs: NumberExpr::Id,
            rhs: NumberExpr::Literal(n),
        }),
        other => Err(mismatch("id", "numeric id", &other)),
    }
}

/// Filter on a stored primitive property, dispatched by its kind.
fn direct_filter(
    entity: EntityType,
    property: &str,
    value: FilterValue,
    op: CmpOp,
    switched: bool,
) -> QueryResult<Predicate> {
    let prop = entity
        .property(property)
        .ok_or_else(|| QueryError::unknown_property(entity, property))?;
    let op = if switched { op.swapped() } else { op };
    match prop.kind {
        PropertyKind::Number => match value {
            FilterValue::Value(Value::Number(n)) => Ok(Predicate::NumberCmp {
                op,
                lhs: NumberExpr::Property(property.to_owned()),
                rhs: NumberExpr::Literal(n),
            }),
            other => Err(mismatch(property, "numeric", &other)),
        },
        PropertyKind::Text => {
            let text = match value {
                FilterValue::Value(Value::Text(s)) => s,
                // Boolean-valued JSON fields are stored as text.
                FilterValue::Value(Value::Bool(b)) => b.to_string(),
                other => return Err(mismatch(property, "text", &other)),
            };
            Ok(Predicate::StringCmp {
                op,
                lhs: StringExpr::Property(property.to_owned()),
                rhs: StringExpr::Literal(text),
            })
        }
        PropertyKind::Time => match value {
            FilterValue::Value(Value::Instant(t)) => Ok(Predicate::TimeCmp {
                op,
                lhs: TimeExpr::Property(property.to_owned()),
                rhs: TimeExpr::Literal(t),
            }),
            other => Err(mismatch(property, "instant", &other)),
        },
        PropertyKind::TimeRange => match value {
            FilterValue::Value(Value::Range { start, end }) => {
                if !op.is_equality() {
                    return Err(QueryError::unsupported(format!(
                        "'{}' on time ranges",
                        op.name()
                    )));
                }
                Ok(Predicate::RangeCmp {
                    negated: op == CmpOp::Ne,
                    lhs: RangeExpr::Property(property.to_owned()),
                    rhs: RangeExpr::Literal { start, end },
                })
            }
            other => Err(mismatch(property, "time range", &other)),
        },
        PropertyKind::Geometry => match value {
            FilterValue::Value(Value::Geometry(g)) => {
                if !op.is_equality() {
                    return Err(QueryError::unsupported(format!(
                        "'{}' on geometries",
                        op.name()
                    )));
                }
                let equals = Predicate::Spatial {
                    op: SpatialOp::Equals,
                    lhs: GeoExpr::Property(property.to_owned()),
                    rhs: GeoExpr::Literal(g),
                };
                Ok(if op == CmpOp::Ne { equals.not() } else { equals })
            }
            other => Err(mismatch(property, "geometry", &other)),
        },
    }
}

/// Filter through a relationship: the related id must be in the given id set.
fn relation_filter(entity: EntityType, name: &str, value: FilterValue) -> QueryResult<Predicate> {
    let rel = entity
        .relation(name)
        .ok_or_else(|| QueryError::unknown_property(entity, name))?;
    match value {
        FilterValue::Subquery(sub) if sub.entity == rel.target => Ok(Predicate::Related {
            relation: rel.name.to_owned(),
            target: RelationTarget::In(sub),
        }),
        FilterValue::Subquery(sub) => Err(QueryError::UnsupportedPathShape(format!(
            "relationship '{name}' of {entity} targets {}, not {}",
            rel.target, sub.entity
        ))),
        FilterValue::Value(v) => Err(QueryError::UnsupportedPathShape(format!(
            "relationship '{name}' of {entity} cannot be compared to a {} literal",
            v.kind_name()
        ))),
    }
}

/// Existential "has at least one related row" predicate.
fn has_related(entity: EntityType, relation: &'static str) -> Predicate {
    let target = entity
        .relation(relation)
        .map(|rel| rel.target)
        .unwrap_or(entity);
    Predicate::Related {
        relation: relation.to_owned(),
        target: RelationTarget::In(Subquery::new(target, Predicate::Always(true))),
    }
}

macro_rules! spec_struct {
    ($(#[$doc:meta])* $name:ident, $entity:expr, relations: [$($rel:literal),*]) => {
        $(#[$doc])*
        #[derive(Debug, Default)]
        pub struct $name;

        impl QuerySpec for $name {
            fn entity(&self) -> EntityType {
                $entity
            }

            fn filter_for_property(
                &self,
                property: &str,
                value: FilterValue,
                op: CmpOp,
                switched: bool,
            ) -> QueryResult<Predicate> {
                match property {
                    $($rel => relation_filter($entity, property, value),)*
                    "id" => id_filter(value, op, switched),
                    _ => direct_filter($entity, property, value, op, switched),
                }
            }
        }
    };
}

spec_struct!(
    /// Specification for `Thing` rows.
    ThingSpec,
    EntityType::Thing,
    relations: ["Datastreams", "Locations", "HistoricalLocations"]
);

spec_struct!(
    /// Specification for `Datastream` rows.
    DatastreamSpec,
    EntityType::Datastream,
    relations: ["Thing", "Sensor", "ObservedProperty", "Observations"]
);

spec_struct!(
    /// Specification for `Location` rows.
    LocationSpec,
    EntityType::Location,
    relations: ["Things", "HistoricalLocations"]
);

spec_struct!(
    /// Specification for `HistoricalLocation` rows.
    HistoricalLocationSpec,
    EntityType::HistoricalLocation,
    relations: ["Thing", "Locations"]
);

spec_struct!(
    /// Specification for `Observation` rows.
    ObservationSpec,
    EntityType::Observation,
    relations: ["Datastream", "FeatureOfInterest"]
);

/// Specification for `Sensor` rows.
///
/// A sensor is only meaningful while at least one datastream references it;
/// orphaned sensors are invisible to listings and lookups.
#[derive(Debug, Default)]
pub struct SensorSpec;

impl QuerySpec for SensorSpec {
    fn entity(&self) -> EntityType {
        EntityType::Sensor
    }

    fn filter_for_property(
        &self,
        property: &str,
        value: FilterValue,
        op: CmpOp,
        switched: bool,
    ) -> QueryResult<Predicate> {
        match property {
            "Datastreams" => relation_filter(EntityType::Sensor, property, value),
            "id" => id_filter(value, op, switched),
            _ => direct_filter(EntityType::Sensor, property, value, op, switched),
        }
    }

    fn is_valid_entity(&self) -> Predicate {
        has_related(EntityType::Sensor, "Datastreams")
    }
}

/// Specification for `ObservedProperty` rows.
///
/// Valid only while referenced by at least one datastream.
#[derive(Debug, Default)]
pub struct ObservedPropertySpec;

impl QuerySpec for ObservedPropertySpec {
    fn entity(&self) -> EntityType {
        EntityType::ObservedProperty
    }

    fn filter_for_property(
        &self,
        property: &str,
        value: FilterValue,
        op: CmpOp,
        switched: bool,
    ) -> QueryResult<Predicate> {
        match property {
            "Datastreams" => relation_filter(EntityType::ObservedProperty, property, value),
            "id" => id_filter(value, op, switched),
            _ => direct_filter(EntityType::ObservedProperty, property, value, op, switched),
        }
    }

    fn is_valid_entity(&self) -> Predicate {
        has_related(EntityType::ObservedProperty, "Datastreams")
    }
}

/// Specification for `FeatureOfInterest` rows.
///
/// Valid only while at least one observation is about it.
#[derive(Debug, Default)]
pub struct FeatureOfInterestSpec;

impl QuerySpec for FeatureOfInterestSpec {
    fn entity(&self) -> EntityType {
        EntityType::FeatureOfInterest
    }

    fn filter_for_property(
        &self,
        property: &str,
        value: FilterValue,
        op: CmpOp,
        switched: bool,
    ) -> QueryResult<Predicate> {
        match property {
            "Observations" => relation_filter(EntityType::FeatureOfInterest, property, value),
            "id" => id_filter(value, op, switched),
            _ => direct_filter(EntityType::FeatureOfInterest, property, value, op, switched),
        }
    }

    fn is_valid_entity(&self) -> Predicate {
        has_related(EntityType::FeatureOfInterest, "Observations")
    }
}

/// Immutable mapping from entity type to its query specification.
///
/// Built once at process start; thereafter read-only, safe for
/// unsynchronized concurrent reads.
pub struct SpecRegistry {
    specs: FxHashMap<EntityType, Box<dyn QuerySpec>>,
}

impl SpecRegistry {
    /// Builds the registry with one specification per entity type.
    pub fn new() -> Self {
        let mut specs: FxHashMap<EntityType, Box<dyn QuerySpec>> = FxHashMap::default();
        specs.insert(EntityType::Thing, Box::new(ThingSpec));
        specs.insert(EntityType::Datastream, Box::new(DatastreamSpec));
        specs.insert(EntityType::Sensor, Box::new(SensorSpec));
        specs.insert(EntityType::ObservedProperty, Box::new(ObservedPropertySpec));
        specs.insert(EntityType::Location, Box::new(LocationSpec));
        specs.insert(
            EntityType::HistoricalLocation,
            Box::new(HistoricalLocationSpec),
        );
        specs.insert(
            EntityType::FeatureOfInterest,
            Box::new(FeatureOfInterestSpec),
        );
        specs.insert(EntityType::Observation, Box::new(ObservationSpec));
        SpecRegistry { specs }
    }

    /// Returns the specification for `entity`.
    pub fn spec(&self, entity: EntityType) -> &dyn QuerySpec {
        self.specs
            .get(&entity)
            .map(Box::as_ref)
            .unwrap_or_else(|| unreachable!("registry covers every entity type"))
    }
}

impl Default for SpecRegistry {
    fn default() -> Self {
        SpecRegistry::new()
    }
}
