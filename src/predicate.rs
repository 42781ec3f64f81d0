//! Typed expression and predicate model.
//!
//! The filter compiler lowers protocol expression trees into these types;
//! store backends execute them. Every leaf is fully typed: property accessors
//! carry the property name of the entity type the enclosing predicate is
//! scoped to, and cross-entity references only ever appear behind a
//! [`Subquery`]. All values are immutable; combinators build new trees.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::model::EntityType;
use crate::types::EntityId;
use crate::value::Geometry;

/// Comparison operator of a filter expression.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub enum CmpOp {
    /// Equal.
    Eq,
    /// Not equal.
    Ne,
    /// Greater or equal.
    Ge,
    /// Strictly greater.
    Gt,
    /// Less or equal.
    Le,
    /// Strictly less.
    Lt,
}

impl CmpOp {
    /// Protocol-level operator name.
    pub fn name(self) -> &'static str {
        match self {
            CmpOp::Eq => "eq",
            CmpOp::Ne => "ne",
            CmpOp::Ge => "ge",
            CmpOp::Gt => "gt",
            CmpOp::Le => "le",
            CmpOp::Lt => "lt",
        }
    }

    /// Operator with swapped operand order (`a op b` ⇔ `b op.swapped() a`).
    pub fn swapped(self) -> Self {
        match self {
            CmpOp::Eq => CmpOp::Eq,
            CmpOp::Ne => CmpOp::Ne,
            CmpOp::Ge => CmpOp::Le,
            CmpOp::Gt => CmpOp::Lt,
            CmpOp::Le => CmpOp::Ge,
            CmpOp::Lt => CmpOp::Gt,
        }
    }

    /// Whether this is `eq` or `ne`.
    pub fn is_equality(self) -> bool {
        matches!(self, CmpOp::Eq | CmpOp::Ne)
    }

    /// Applies the operator to two ordered values.
    pub fn evaluate<T: PartialOrd + ?Sized>(self, lhs: &T, rhs: &T) -> bool {
        match self {
            CmpOp::Eq => lhs == rhs,
            CmpOp::Ne => lhs != rhs,
            CmpOp::Ge => lhs >= rhs,
            CmpOp::Gt => lhs > rhs,
            CmpOp::Le => lhs <= rhs,
            CmpOp::Lt => lhs < rhs,
        }
    }
}

/// Numeric scalar expression.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum NumberExpr {
    /// Constant.
    Literal(f64),
    /// Numeric property of the scoped entity.
    Property(String),
    /// The scoped entity's id, widened to a number.
    Id,
    /// Sum.
    Add(Box<NumberExpr>, Box<NumberExpr>),
    /// Difference.
    Sub(Box<NumberExpr>, Box<NumberExpr>),
    /// Product.
    Mul(Box<NumberExpr>, Box<NumberExpr>),
    /// Quotient.
    Div(Box<NumberExpr>, Box<NumberExpr>),
    /// Remainder.
    Mod(Box<NumberExpr>, Box<NumberExpr>),
    /// Arithmetic negation.
    Neg(Box<NumberExpr>),
    /// Round half away from zero.
    Round(Box<NumberExpr>),
    /// Largest integer not above the operand.
    Floor(Box<NumberExpr>),
    /// Smallest integer not below the operand.
    Ceiling(Box<NumberExpr>),
    /// Character count of a string expression.
    Length(Box<StringExpr>),
    /// Zero-based position of `needle` in `haystack`, -1 when absent.
    IndexOf {
        /// String searched in.
        haystack: Box<StringExpr>,
        /// String searched for.
        needle: Box<StringExpr>,
    },
    /// Calendar/clock component of an instant.
    DatePart {
        /// Component to extract.
        part: DatePart,
        /// Instant the component is taken from.
        of: Box<TimeExpr>,
    },
    /// Distance between two geometries, in SRID units.
    Distance(Box<GeoExpr>, Box<GeoExpr>),
}

/// Calendar or clock component extracted from an instant.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub enum DatePart {
    /// Calendar year.
    Year,
    /// Calendar month, 1-12.
    Month,
    /// Day of month, 1-31.
    Day,
    /// Hour of day, 0-23.
    Hour,
    /// Minute of hour, 0-59.
    Minute,
    /// Second of minute, 0-59.
    Second,
    /// Fractional seconds as a value in `[0, 1)`.
    FractionalSeconds,
}

/// String scalar expression.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum StringExpr {
    /// Constant.
    Literal(String),
    /// Text property of the scoped entity.
    Property(String),
    /// Lower-cased operand.
    ToLower(Box<StringExpr>),
    /// Upper-cased operand.
    ToUpper(Box<StringExpr>),
    /// Operand with surrounding whitespace removed.
    Trim(Box<StringExpr>),
    /// Concatenation.
    Concat(Box<StringExpr>, Box<StringExpr>),
    /// Substring starting at a zero-based offset.
    Substring {
        /// String sliced.
        source: Box<StringExpr>,
        /// Zero-based start offset.
        start: Box<NumberExpr>,
        /// Optional slice length; to the end when absent.
        length: Option<Box<NumberExpr>>,
    },
}

/// Instant-valued expression.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TimeExpr {
    /// Constant instant.
    Literal(#[serde(with = "time::serde::rfc3339")] OffsetDateTime),
    /// Time property of the scoped entity.
    Property(String),
}

/// Interval-valued expression.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RangeExpr {
    /// Constant interval.
    Literal {
        /// Interval start.
        #[serde(with = "time::serde::rfc3339")]
        start: OffsetDateTime,
        /// Interval end.
        #[serde(with = "time::serde::rfc3339")]
        end: OffsetDateTime,
    },
    /// Time-range property of the scoped entity.
    Property(String),
}

/// Geometry-valued expression.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GeoExpr {
    /// Constant geometry.
    Literal(Geometry),
    /// Geometry property of the scoped entity.
    Property(String),
}

/// Substring matching mode for string predicates.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub enum StringMatch {
    /// Pattern occurs anywhere in the source.
    Contains,
    /// Source begins with the pattern.
    StartsWith,
    /// Source ends with the pattern.
    EndsWith,
}

/// Binary spatial relation between two geometries.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub enum SpatialOp {
    /// Geometries share at least one point.
    Intersects,
    /// Left geometry contains the right.
    Contains,
    /// Geometries cross.
    Crosses,
    /// Geometries share no point.
    Disjoint,
    /// Geometries are spatially equal.
    Equals,
    /// Geometries overlap.
    Overlaps,
    /// Geometries touch at their boundaries only.
    Touches,
    /// Left geometry lies within the right.
    Within,
}

/// The set of ids of one entity type satisfying a predicate.
///
/// The id column is implicit: a subquery always produces entity ids of
/// `entity`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Subquery {
    /// Entity type the ids belong to.
    pub entity: EntityType,
    /// Predicate scoped to `entity` selecting the ids.
    pub filter: Box<Predicate>,
}

impl Subquery {
    /// Builds a subquery over `entity` rows matching `filter`.
    pub fn new(entity: EntityType, filter: Predicate) -> Self {
        Subquery {
            entity,
            filter: Box::new(filter),
        }
    }
}

/// Target of a relationship predicate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RelationTarget {
    /// A single concrete related id.
    Id(EntityId),
    /// Any id produced by a subquery.
    In(Subquery),
}

/// Boolean predicate evaluable against one row of the scoped entity type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    /// Constant truth value.
    Always(bool),
    /// Numeric comparison.
    NumberCmp {
        /// Operator.
        op: CmpOp,
        /// Left operand.
        lhs: NumberExpr,
        /// Right operand.
        rhs: NumberExpr,
    },
    /// Lexicographic string comparison.
    StringCmp {
        /// Operator.
        op: CmpOp,
        /// Left operand.
        lhs: StringExpr,
        /// Right operand.
        rhs: StringExpr,
    },
    /// Instant comparison.
    TimeCmp {
        /// Operator.
        op: CmpOp,
        /// Left operand.
        lhs: TimeExpr,
        /// Right operand.
        rhs: TimeExpr,
    },
    /// Interval equality; only `eq`/`ne` exist for ranges.
    RangeCmp {
        /// True for `ne`.
        negated: bool,
        /// Left operand.
        lhs: RangeExpr,
        /// Right operand.
        rhs: RangeExpr,
    },
    /// Substring test.
    StringMatch {
        /// Matching mode.
        kind: StringMatch,
        /// String tested.
        source: StringExpr,
        /// Pattern looked for.
        pattern: StringExpr,
    },
    /// Spatial relation test.
    Spatial {
        /// Relation kind.
        op: SpatialOp,
        /// Left geometry.
        lhs: GeoExpr,
        /// Right geometry.
        rhs: GeoExpr,
    },
    /// DE-9IM relate test with an explicit intersection pattern.
    Relate {
        /// Left geometry.
        lhs: GeoExpr,
        /// Right geometry.
        rhs: GeoExpr,
        /// Nine-character DE-9IM pattern.
        pattern: String,
    },
    /// The scoped entity has the given id.
    IdEq(EntityId),
    /// The scoped entity's id is a member of the subquery's id set.
    IdIn(Subquery),
    /// A related entity reached over `relation` matches the target.
    ///
    /// For collection relationships this is an existential test; for singular
    /// relationships it tests the single link.
    Related {
        /// Relationship name on the scoped entity type.
        relation: String,
        /// What the related id must match.
        target: RelationTarget,
    },
    /// Both operands hold.
    And(Box<Predicate>, Box<Predicate>),
    /// At least one operand holds.
    Or(Box<Predicate>, Box<Predicate>),
    /// Operand does not hold.
    Not(Box<Predicate>),
}

impl Predicate {
    /// Conjunction of `self` and `other`.
    pub fn and(self, other: Predicate) -> Predicate {
        Predicate::And(Box::new(self), Box::new(other))
    }

    /// Disjunction of `self` and `other`.
    pub fn or(self, other: Predicate) -> Predicate {
        Predicate::Or(Box::new(self), Box::new(other))
    }

    /// Negation of `self`.
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Predicate {
        Predicate::Not(Box::new(self))
    }
}
