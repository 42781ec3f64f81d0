//! Protocol-facing inputs of the query core.
//!
//! The structures defined here are produced by the excluded protocol parser:
//! a filter expression tree and a navigation path. They are intentionally
//! ergonomic to build by hand, which the integration suites rely on; the
//! compiler and resolver lower them into typed predicates and resolved
//! targets.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::types::EntityId;

/// Member reference path; short in practice, rarely more than three hops.
pub type MemberPath = SmallVec<[String; 4]>;

/// One node of a parsed filter expression.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Binary operator application.
    Binary {
        /// Operator kind.
        op: BinaryOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// Unary operator application.
    Unary {
        /// Operator kind.
        op: UnaryOp,
        /// Operand.
        operand: Box<Expr>,
    },
    /// Raw literal text, decoded by the compiler.
    Literal(String),
    /// Property reference, possibly crossing navigation properties.
    Member(MemberPath),
    /// Query-function invocation.
    Call {
        /// Lower-case function name as written in the request.
        function: String,
        /// Argument expressions, in order.
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Builds a literal node from raw text.
    pub fn literal(text: impl Into<String>) -> Expr {
        Expr::Literal(text.into())
    }

    /// Builds a member reference from path segments.
    pub fn member<I, S>(segments: I) -> Expr
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Expr::Member(segments.into_iter().map(Into::into).collect())
    }

    /// Builds a binary node.
    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Builds a `not` node.
    pub fn not(operand: Expr) -> Expr {
        Expr::Unary {
            op: UnaryOp::Not,
            operand: Box::new(operand),
        }
    }

    /// Builds an arithmetic negation node.
    pub fn neg(operand: Expr) -> Expr {
        Expr::Unary {
            op: UnaryOp::Minus,
            operand: Box::new(operand),
        }
    }

    /// Builds a function-call node.
    pub fn call<I>(function: impl Into<String>, args: I) -> Expr
    where
        I: IntoIterator<Item = Expr>,
    {
        Expr::Call {
            function: function.into(),
            args: args.into_iter().collect(),
        }
    }
}

/// Binary operator kinds of the filter grammar.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub enum BinaryOp {
    /// Addition.
    Add,
    /// Subtraction.
    Sub,
    /// Multiplication.
    Mul,
    /// Division.
    Div,
    /// Remainder.
    Mod,
    /// Equality.
    Eq,
    /// Inequality.
    Ne,
    /// Greater or equal.
    Ge,
    /// Strictly greater.
    Gt,
    /// Less or equal.
    Le,
    /// Strictly less.
    Lt,
    /// Conjunction.
    And,
    /// Disjunction.
    Or,
}

impl BinaryOp {
    /// Protocol-level operator name.
    pub fn name(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::Mod => "mod",
            BinaryOp::Eq => "eq",
            BinaryOp::Ne => "ne",
            BinaryOp::Ge => "ge",
            BinaryOp::Gt => "gt",
            BinaryOp::Le => "le",
            BinaryOp::Lt => "lt",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }
}

/// Unary operator kinds of the filter grammar.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub enum UnaryOp {
    /// Boolean negation.
    Not,
    /// Arithmetic negation.
    Minus,
}

/// One segment of a navigation path.
///
/// The first segment of a path references an entity set (`Things(1)`);
/// later segments reference navigation properties with an optional key
/// (`Datastreams(2)`, `Location`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSegment {
    /// Entity-set or navigation-property name.
    pub name: String,
    /// Key predicate, when the segment addresses a single entity.
    pub key: Option<EntityId>,
}

impl PathSegment {
    /// Segment addressing one entity by key.
    pub fn keyed(name: impl Into<String>, id: u64) -> Self {
        PathSegment {
            name: name.into(),
            key: Some(EntityId(id)),
        }
    }

    /// Segment without a key predicate.
    pub fn unkeyed(name: impl Into<String>) -> Self {
        PathSegment {
            name: name.into(),
            key: None,
        }
    }
}
