//! Filter-expression compiler.
//!
//! Lowers a protocol expression tree into one typed [`Predicate`] scoped to a
//! root entity type. Every node kind is handled by an exhaustive match;
//! comparisons run through an ordered type-coercion fallback chain, and
//! member references crossing navigation properties are folded into
//! foreign-entity subqueries from the innermost hop outward.

use time::OffsetDateTime;
use tracing::{debug, trace};

use crate::model::EntityType;
use crate::predicate::{
    CmpOp, GeoExpr, NumberExpr, Predicate, RangeExpr, StringExpr, Subquery, TimeExpr,
};
use crate::query::ast::{BinaryOp, Expr, MemberPath, UnaryOp};
use crate::query::errors::{QueryError, QueryResult, StageFailure};
use crate::query::functions;
use crate::query::spec::{FilterValue, PropertyAccessor, SpecRegistry};
use crate::value::{decode_literal, Value};

/// Intermediate operand produced while walking the expression tree.
///
/// Member references crossing navigation properties stay unresolved
/// (`Path`) until a comparison folds them; everything else is fully typed
/// the moment it is produced.
#[derive(Clone, Debug)]
pub(crate) enum Operand {
    /// Decoded literal value.
    Value(Value),
    /// Numeric sub-expression.
    Number(NumberExpr),
    /// String sub-expression.
    Str(StringExpr),
    /// Instant sub-expression.
    Time(TimeExpr),
    /// Interval sub-expression.
    Range(RangeExpr),
    /// Geometry sub-expression.
    Geo(GeoExpr),
    /// Boolean predicate.
    Predicate(Predicate),
    /// Unresolved multi-hop member reference.
    Path(MemberPath),
}

impl Operand {
    /// Short description used in error messages.
    pub(crate) fn describe(&self) -> String {
        match self {
            Operand::Value(v) => format!("{} literal {v}", v.kind_name()),
            Operand::Number(_) => "numeric expression".to_owned(),
            Operand::Str(_) => "string expression".to_owned(),
            Operand::Time(_) => "instant expression".to_owned(),
            Operand::Range(_) => "range expression".to_owned(),
            Operand::Geo(_) => "geometry expression".to_owned(),
            Operand::Predicate(_) => "boolean predicate".to_owned(),
            Operand::Path(path) => format!("navigation path '{}'", path.join("/")),
        }
    }

    /// Attempts coercion to a numeric expression.
    pub(crate) fn to_number(&self) -> Result<NumberExpr, String> {
        match self {
            Operand::Value(Value::Number(n)) => Ok(NumberExpr::Literal(*n)),
            Operand::Number(expr) => Ok(expr.clone()),
            other => Err(format!("{} is not numeric", other.describe())),
        }
    }

    /// Attempts coercion to a string expression. Booleans compare through
    /// their literal text, matching how boolean-valued fields are stored.
    pub(crate) fn to_string_expr(&self) -> Result<StringExpr, String> {
        match self {
            Operand::Value(Value::Text(s)) => Ok(StringExpr::Literal(s.clone())),
            Operand::Value(Value::Bool(b)) => Ok(StringExpr::Literal(b.to_string())),
            Operand::Str(expr) => Ok(expr.clone()),
            other => Err(format!("{} is not a string", other.describe())),
        }
    }

    /// Attempts coercion to an instant expression.
    pub(crate) fn to_time(&self) -> Result<TimeExpr, String> {
        match self {
            Operand::Value(Value::Instant(t)) => Ok(TimeExpr::Literal(*t)),
            Operand::Time(expr) => Ok(expr.clone()),
            other => Err(format!("{} is not an instant", other.describe())),
        }
    }

    /// Attempts coercion to an interval expression.
    pub(crate) fn to_range(&self) -> Result<RangeExpr, String> {
        match self {
            Operand::Value(Value::Range { start, end }) => Ok(RangeExpr::Literal {
                start: *start,
                end: *end,
            }),
            Operand::Range(expr) => Ok(expr.clone()),
            other => Err(format!("{} is not a time range", other.describe())),
        }
    }

    /// Attempts coercion to a geometry expression.
    pub(crate) fn to_geo(&self) -> Result<GeoExpr, String> {
        match self {
            Operand::Value(Value::Geometry(g)) => Ok(GeoExpr::Literal(g.clone())),
            Operand::Geo(expr) => Ok(expr.clone()),
            other => Err(format!("{} is not a geometry", other.describe())),
        }
    }

    /// Requires the operand to already be a predicate.
    pub(crate) fn into_predicate(self) -> Result<Predicate, String> {
        match self {
            Operand::Predicate(p) => Ok(p),
            other => Err(format!("{} is not a boolean predicate", other.describe())),
        }
    }
}

/// Compiles filter expression trees against one root entity type.
///
/// Request-scoped and stateless beyond its configuration; the registry it
/// borrows is the process-lifetime specification table.
pub struct FilterCompiler<'a> {
    registry: &'a SpecRegistry,
    root: EntityType,
}

impl<'a> FilterCompiler<'a> {
    /// Creates a compiler for filters rooted at `root`.
    pub fn new(registry: &'a SpecRegistry, root: EntityType) -> Self {
        FilterCompiler { registry, root }
    }

    /// Entity type the produced predicates are scoped to.
    pub fn root(&self) -> EntityType {
        self.root
    }

    /// Compiles a full filter expression into a predicate.
    ///
    /// Fails if the expression evaluates to anything but a boolean
    /// predicate, or on any unsupported construct inside it. The current
    /// instant is captured once here, so every `now()` in the expression
    /// resolves to the same timestamp.
    pub fn compile(&self, expr: &Expr) -> QueryResult<Predicate> {
        debug!(root = %self.root, "compiling filter expression");
        let now = OffsetDateTime::now_utc();
        let operand = self.visit(expr, now)?;
        operand.into_predicate().map_err(|operand| {
            QueryError::InvalidOperand {
                operator: "$filter".to_owned(),
                operand,
            }
        })
    }

    fn visit(&self, expr: &Expr, now: OffsetDateTime) -> QueryResult<Operand> {
        match expr {
            Expr::Literal(text) => Ok(Operand::Value(decode_literal(text)?)),
            Expr::Member(path) => self.visit_member(path),
            Expr::Unary { op, operand } => {
                let operand = self.visit(operand, now)?;
                self.apply_unary(*op, operand)
            }
            Expr::Binary { op, left, right } => {
                let left = self.visit(left, now)?;
                let right = self.visit(right, now)?;
                self.apply_binary(*op, left, right)
            }
            Expr::Call { function, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.visit(arg, now))
                    .collect::<QueryResult<Vec<_>>>()?;
                functions::dispatch(function, args, now)
            }
        }
    }

    /// Resolves a member reference.
    ///
    /// A single segment resolves to a typed accessor through the root
    /// specification; anything longer passes through unresolved for the
    /// comparison stage to fold.
    fn visit_member(&self, path: &MemberPath) -> QueryResult<Operand> {
        match path.as_slice() {
            [] => Err(QueryError::UnsupportedPathShape(
                "empty member reference".to_owned(),
            )),
            [name] => {
                let accessor = self.registry.spec(self.root).property_accessor(name)?;
                Ok(match accessor {
                    PropertyAccessor::Number(e) => Operand::Number(e),
                    PropertyAccessor::Text(e) => Operand::Str(e),
                    PropertyAccessor::Time(e) => Operand::Time(e),
                    PropertyAccessor::Range(e) => Operand::Range(e),
                    PropertyAccessor::Geometry(e) => Operand::Geo(e),
                })
            }
            _ => Ok(Operand::Path(path.clone())),
        }
    }

    fn apply_unary(&self, op: UnaryOp, operand: Operand) -> QueryResult<Operand> {
        match op {
            UnaryOp::Not => operand
                .into_predicate()
                .map(|p| Operand::Predicate(p.not()))
                .map_err(|operand| QueryError::InvalidOperand {
                    operator: "not".to_owned(),
                    operand,
                }),
            UnaryOp::Minus => match operand {
                Operand::Value(Value::Number(n)) => Ok(Operand::Value(Value::Number(-n))),
                Operand::Number(expr) => Ok(Operand::Number(NumberExpr::Neg(Box::new(expr)))),
                other => Err(QueryError::InvalidOperand {
                    operator: "-".to_owned(),
                    operand: other.describe(),
                }),
            },
        }
    }

    fn apply_binary(&self, op: BinaryOp, left: Operand, right: Operand) -> QueryResult<Operand> {
        match op {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                self.arithmetic(op, left, right)
            }
            BinaryOp::Eq => self.compare(CmpOp::Eq, left, right),
            BinaryOp::Ne => self.compare(CmpOp::Ne, left, right),
            BinaryOp::Ge => self.compare(CmpOp::Ge, left, right),
            BinaryOp::Gt => self.compare(CmpOp::Gt, left, right),
            BinaryOp::Le => self.compare(CmpOp::Le, left, right),
            BinaryOp::Lt => self.compare(CmpOp::Lt, left, right),
            BinaryOp::And | BinaryOp::Or => self.boolean(op, left, right),
        }
    }

    fn arithmetic(&self, op: BinaryOp, left: Operand, right: Operand) -> QueryResult<Operand> {
        let invalid = |operand: String| QueryError::InvalidOperand {
            operator: op.name().to_owned(),
            operand,
        };
        let lhs = Box::new(left.to_number().map_err(invalid)?);
        let rhs = Box::new(right.to_number().map_err(invalid)?);
        Ok(Operand::Number(match op {
            BinaryOp::Add => NumberExpr::Add(lhs, rhs),
            BinaryOp::Sub => NumberExpr::Sub(lhs, rhs),
            BinaryOp::Mul => NumberExpr::Mul(lhs, rhs),
            BinaryOp::Div => NumberExpr::Div(lhs, rhs),
            BinaryOp::Mod => NumberExpr::Mod(lhs, rhs),
            _ => unreachable!("dispatched as arithmetic"),
        }))
    }

    fn boolean(&self, op: BinaryOp, left: Operand, right: Operand) -> QueryResult<Operand> {
        let invalid = |operand: String| QueryError::InvalidOperand {
            operator: op.name().to_owned(),
            operand,
        };
        let lhs = left.into_predicate().map_err(invalid)?;
        let rhs = right.into_predicate().map_err(invalid)?;
        Ok(Operand::Predicate(match op {
            BinaryOp::And => lhs.and(rhs),
            BinaryOp::Or => lhs.or(rhs),
            _ => unreachable!("dispatched as boolean"),
        }))
    }

    /// Ordered comparison fallback chain.
    ///
    /// Stages: numeric, string, foreign navigation path, instant, interval.
    /// A stage that rejects the operands records why and hands over to the
    /// next; once every stage has rejected, the collected reasons become one
    /// [`QueryError::TypeCoercionFailure`]. Errors raised *inside* an
    /// accepted stage (e.g. a bad property name while folding a path) abort
    /// immediately.
    fn compare(&self, op: CmpOp, left: Operand, right: Operand) -> QueryResult<Operand> {
        let mut stages = Vec::new();

        match (left.to_number(), right.to_number()) {
            (Ok(lhs), Ok(rhs)) => {
                return Ok(Operand::Predicate(Predicate::NumberCmp { op, lhs, rhs }))
            }
            (l, r) => record(&mut stages, "numeric", l.err().or(r.err())),
        }

        match (left.to_string_expr(), right.to_string_expr()) {
            (Ok(lhs), Ok(rhs)) => {
                return Ok(Operand::Predicate(Predicate::StringCmp { op, lhs, rhs }))
            }
            (l, r) => record(&mut stages, "string", l.err().or(r.err())),
        }

        match (&left, &right) {
            (Operand::Path(_), Operand::Path(_)) => {
                return Err(QueryError::UnsupportedPathShape(
                    "both comparison operands are navigation paths".to_owned(),
                ));
            }
            (Operand::Path(path), other) => {
                let value = literal_for_fold(other, path)?;
                return self
                    .fold_foreign(path, value, op, false)
                    .map(Operand::Predicate);
            }
            (other, Operand::Path(path)) => {
                let value = literal_for_fold(other, path)?;
                return self
                    .fold_foreign(path, value, op, true)
                    .map(Operand::Predicate);
            }
            _ => record(
                &mut stages,
                "navigation",
                Some("neither operand is a navigation path".to_owned()),
            ),
        }

        match (left.to_time(), right.to_time()) {
            (Ok(lhs), Ok(rhs)) => {
                return Ok(Operand::Predicate(Predicate::TimeCmp { op, lhs, rhs }))
            }
            (l, r) => record(&mut stages, "instant", l.err().or(r.err())),
        }

        match (left.to_range(), right.to_range()) {
            (Ok(lhs), Ok(rhs)) => {
                // Ranges only support equality; reaching this stage with an
                // ordering operator is a hard error, not a further fallback.
                if !op.is_equality() {
                    return Err(QueryError::unsupported(format!(
                        "'{}' on time ranges",
                        op.name()
                    )));
                }
                return Ok(Operand::Predicate(Predicate::RangeCmp {
                    negated: op == CmpOp::Ne,
                    lhs,
                    rhs,
                }));
            }
            (l, r) => record(&mut stages, "range", l.err().or(r.err())),
        }

        trace!(op = op.name(), stages = stages.len(), "comparison exhausted all stages");
        Err(QueryError::TypeCoercionFailure {
            left: left.describe(),
            right: right.describe(),
            stages,
        })
    }

    /// Folds a multi-hop member reference into nested id subqueries.
    ///
    /// The chain of navigation segments is validated against the entity
    /// model first; folding then proceeds from the deepest entity outward
    /// with the subquery as the explicit accumulator, so path depth never
    /// turns into recursion depth.
    fn fold_foreign(
        &self,
        path: &MemberPath,
        value: Value,
        op: CmpOp,
        switched: bool,
    ) -> QueryResult<Predicate> {
        let (terminal, hops) = match path.split_last() {
            Some((terminal, hops)) if !hops.is_empty() => (terminal, hops),
            _ => {
                return Err(QueryError::UnsupportedPathShape(format!(
                    "navigation path '{}' is too short to fold",
                    path.join("/")
                )))
            }
        };

        let mut chain = Vec::with_capacity(hops.len());
        let mut current = self.root;
        for segment in hops {
            let rel = current.relation(segment).ok_or_else(|| {
                if current.property(segment).is_some() {
                    QueryError::UnsupportedPathShape(format!(
                        "'{segment}' is a primitive property of {current}, not a relationship"
                    ))
                } else {
                    QueryError::unknown_property(current, segment)
                }
            })?;
            chain.push((current, rel));
            current = rel.target;
        }
        debug!(
            root = %self.root,
            deepest = %current,
            hops = chain.len(),
            "folding foreign filter path"
        );

        let deepest = self.registry.spec(current);
        let terminal_pred =
            deepest.filter_for_property(terminal, FilterValue::Value(value), op, switched)?;
        let mut acc: Subquery = deepest.id_subquery_with_filter(terminal_pred);

        for (idx, (level, rel)) in chain.iter().enumerate().rev() {
            let spec = self.registry.spec(*level);
            let pred =
                spec.filter_for_property(rel.name, FilterValue::Subquery(acc), op, switched)?;
            if idx == 0 {
                return Ok(pred);
            }
            acc = spec.id_subquery_with_filter(pred);
        }
        unreachable!("chain has at least one hop")
    }
}

/// The non-path side of a folded comparison must be a plain literal.
fn literal_for_fold(operand: &Operand, path: &MemberPath) -> QueryResult<Value> {
    match operand {
        Operand::Value(value) => Ok(value.clone()),
        other => Err(QueryError::UnsupportedPathShape(format!(
            "navigation path '{}' can only be compared to a literal, not {}",
            path.join("/"),
            other.describe()
        ))),
    }
}

fn record(stages: &mut Vec<StageFailure>, stage: &'static str, reason: Option<String>) {
    stages.push(StageFailure {
        stage,
        reason: reason.unwrap_or_else(|| "operands have mismatched types".to_owned()),
    });
}
