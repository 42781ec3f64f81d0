#![allow(missing_docs)]

use std::fmt;

use thiserror::Error;

use crate::model::EntityType;
use crate::types::StoreError;
use crate::value::ValueParseError;

/// Outcome of one stage of the comparison fallback chain.
///
/// Retained and aggregated into [`QueryError::TypeCoercionFailure`] so a
/// failed comparison reports why every stage rejected it, not just the last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageFailure {
    /// Name of the coercion stage ("numeric", "string", ...).
    pub stage: &'static str,
    /// Why the stage rejected the operands.
    pub reason: String,
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.stage, self.reason)
    }
}

/// Structured errors emitted by the filter compiler, the query
/// specifications, and the navigation resolver.
///
/// These bubble up to the protocol layer untranslated; mapping onto protocol
/// status codes is the caller's concern.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum QueryError {
    /// Operator or query function exists in the protocol but is not wired.
    #[error("'{name}' is not implemented")]
    UnsupportedOperator { name: String },
    /// No coercion stage accepted a comparison's operands.
    #[error("cannot compare {left} with {right}: {}", format_stages(.stages))]
    TypeCoercionFailure {
        /// Description of the left operand.
        left: String,
        /// Description of the right operand.
        right: String,
        /// Per-stage rejection reasons, in attempt order.
        stages: Vec<StageFailure>,
    },
    /// Property name does not exist on the entity type.
    #[error("no property '{property}' on entity type {entity}")]
    UnknownProperty {
        entity: EntityType,
        property: String,
    },
    /// Operand kind does not fit the operator or function.
    #[error("'{operator}' cannot be applied to {operand}")]
    InvalidOperand { operator: String, operand: String },
    /// Foreign filter path the folding algorithm cannot express.
    #[error("unsupported filter path: {0}")]
    UnsupportedPathShape(String),
    /// Missing entity or broken relatedness along a navigation path.
    #[error("navigation target not found: {0}")]
    NavigationNotFound(String),
    /// Literal text decodes to no supported value type.
    #[error("invalid literal: {0}")]
    InvalidLiteral(#[from] ValueParseError),
    /// Storage collaborator failure, propagated without retry.
    #[error("store: {0}")]
    Store(#[from] StoreError),
}

fn format_stages(stages: &[StageFailure]) -> String {
    if stages.is_empty() {
        return "no coercion stage applies".to_owned();
    }
    stages
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl QueryError {
    /// Builds an [`QueryError::UnsupportedOperator`] for a named construct.
    pub fn unsupported(name: impl Into<String>) -> Self {
        QueryError::UnsupportedOperator { name: name.into() }
    }

    /// Builds an [`QueryError::UnknownProperty`] naming entity and property.
    pub fn unknown_property(entity: EntityType, property: impl Into<String>) -> Self {
        QueryError::UnknownProperty {
            entity,
            property: property.into(),
        }
    }

    /// Builds an [`QueryError::NavigationNotFound`] with a description.
    pub fn not_found(detail: impl Into<String>) -> Self {
        QueryError::NavigationNotFound(detail.into())
    }

    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::UnsupportedOperator { .. } => "UnsupportedOperator",
            QueryError::TypeCoercionFailure { .. } => "TypeCoercionFailure",
            QueryError::UnknownProperty { .. } => "UnknownProperty",
            QueryError::InvalidOperand { .. } => "InvalidOperand",
            QueryError::UnsupportedPathShape(_) => "UnsupportedPathShape",
            QueryError::NavigationNotFound(_) => "NavigationNotFound",
            QueryError::InvalidLiteral(_) => "InvalidLiteral",
            QueryError::Store(_) => "Store",
        }
    }
}

/// Convenience alias for query-layer results.
pub type QueryResult<T> = std::result::Result<T, QueryError>;
