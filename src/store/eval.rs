//! Predicate and scalar-expression evaluation over in-memory rows.
//!
//! Scalar evaluators return `Option`: a missing property yields `None`, and
//! any comparison over `None` is false, so rows without a property simply
//! fall out of the result. A property stored with the wrong value type is a
//! [`StoreError::MalformedRow`]. Spatial relations other than exact equality
//! need real geometry math and report [`StoreError::Unsupported`] instead of
//! approximating it.

use time::OffsetDateTime;

use crate::model::EntityType;
use crate::predicate::{
    DatePart, GeoExpr, NumberExpr, Predicate, RangeExpr, RelationTarget, SpatialOp, StringExpr,
    StringMatch, Subquery, TimeExpr,
};
use crate::types::{EntityId, StoreError, StoreResult};
use crate::value::{Geometry, Value};

use super::{EntityRow, InMemoryStore};

/// Evaluates a predicate against one row of `entity`.
pub fn eval_predicate(
    store: &InMemoryStore,
    entity: EntityType,
    row: &EntityRow,
    pred: &Predicate,
) -> StoreResult<bool> {
    match pred {
        Predicate::Always(b) => Ok(*b),
        Predicate::NumberCmp { op, lhs, rhs } => {
            Ok(match (number(row, lhs)?, number(row, rhs)?) {
                (Some(l), Some(r)) => op.evaluate(&l, &r),
                _ => false,
            })
        }
        Predicate::StringCmp { op, lhs, rhs } => {
            Ok(match (string(row, lhs)?, string(row, rhs)?) {
                (Some(l), Some(r)) => op.evaluate(l.as_str(), r.as_str()),
                _ => false,
            })
        }
        Predicate::TimeCmp { op, lhs, rhs } => {
            Ok(match (instant(row, lhs)?, instant(row, rhs)?) {
                (Some(l), Some(r)) => op.evaluate(&l, &r),
                _ => false,
            })
        }
        Predicate::RangeCmp { negated, lhs, rhs } => {
            Ok(match (range(row, lhs)?, range(row, rhs)?) {
                (Some(l), Some(r)) => (l == r) != *negated,
                _ => false,
            })
        }
        Predicate::StringMatch {
            kind,
            source,
            pattern,
        } => Ok(
            match (string(row, source)?, string(row, pattern)?) {
                (Some(s), Some(p)) => match kind {
                    StringMatch::Contains => s.contains(&p),
                    StringMatch::StartsWith => s.starts_with(&p),
                    StringMatch::EndsWith => s.ends_with(&p),
                },
                _ => false,
            },
        ),
        Predicate::Spatial { op, lhs, rhs } => {
            if *op != SpatialOp::Equals {
                return Err(StoreError::Unsupported(
                    "spatial relations other than equality",
                ));
            }
            Ok(match (geometry(row, lhs)?, geometry(row, rhs)?) {
                (Some(l), Some(r)) => l == r,
                _ => false,
            })
        }
        Predicate::Relate { .. } => Err(StoreError::Unsupported("DE-9IM relate evaluation")),
        Predicate::IdEq(id) => Ok(row.id == *id),
        Predicate::IdIn(sub) => {
            let ids = subquery_ids(store, sub)?;
            Ok(ids.contains(&row.id))
        }
        Predicate::Related { relation, target } => {
            let links = row.links(relation);
            match target {
                RelationTarget::Id(id) => Ok(links.contains(id)),
                RelationTarget::In(sub) => {
                    let ids = subquery_ids(store, sub)?;
                    Ok(links.iter().any(|link| ids.contains(link)))
                }
            }
        }
        Predicate::And(a, b) => Ok(eval_predicate(store, entity, row, a)?
            && eval_predicate(store, entity, row, b)?),
        Predicate::Or(a, b) => Ok(eval_predicate(store, entity, row, a)?
            || eval_predicate(store, entity, row, b)?),
        Predicate::Not(inner) => Ok(!eval_predicate(store, entity, row, inner)?),
    }
}

/// Materializes a subquery's id set by scanning its entity table.
fn subquery_ids(store: &InMemoryStore, sub: &Subquery) -> StoreResult<Vec<EntityId>> {
    let mut ids = Vec::new();
    for row in store.rows(sub.entity) {
        if eval_predicate(store, sub.entity, row, &sub.filter)? {
            ids.push(row.id);
        }
    }
    Ok(ids)
}

fn number(row: &EntityRow, expr: &NumberExpr) -> StoreResult<Option<f64>> {
    Ok(Some(match expr {
        NumberExpr::Literal(n) => *n,
        NumberExpr::Id => row.id.0 as f64,
        NumberExpr::Property(name) => match row.value(name) {
            Some(Value::Number(n)) => *n,
            Some(_) => {
                return Err(StoreError::MalformedRow {
                    id: row.id,
                    reason: "property is not numeric",
                })
            }
            None => return Ok(None),
        },
        NumberExpr::Add(a, b) => return binary(row, a, b, |a, b| a + b),
        NumberExpr::Sub(a, b) => return binary(row, a, b, |a, b| a - b),
        NumberExpr::Mul(a, b) => return binary(row, a, b, |a, b| a * b),
        NumberExpr::Div(a, b) => return binary(row, a, b, |a, b| a / b),
        NumberExpr::Mod(a, b) => return binary(row, a, b, |a, b| a % b),
        NumberExpr::Neg(a) => return Ok(number(row, a)?.map(|n| -n)),
        NumberExpr::Round(a) => return Ok(number(row, a)?.map(f64::round)),
        NumberExpr::Floor(a) => return Ok(number(row, a)?.map(f64::floor)),
        NumberExpr::Ceiling(a) => return Ok(number(row, a)?.map(f64::ceil)),
        NumberExpr::Length(s) => {
            return Ok(string(row, s)?.map(|s| s.chars().count() as f64))
        }
        NumberExpr::IndexOf { haystack, needle } => {
            return Ok(
                match (string(row, haystack)?, string(row, needle)?) {
                    (Some(h), Some(n)) => Some(match h.find(&n) {
                        Some(byte) => h[..byte].chars().count() as f64,
                        None => -1.0,
                    }),
                    _ => None,
                },
            )
        }
        NumberExpr::DatePart { part, of } => {
            return Ok(instant(row, of)?.map(|t| date_part(*part, t)))
        }
        NumberExpr::Distance(_, _) => {
            return Err(StoreError::Unsupported("geometry distance evaluation"))
        }
    }))
}

fn binary(
    row: &EntityRow,
    a: &NumberExpr,
    b: &NumberExpr,
    apply: fn(f64, f64) -> f64,
) -> StoreResult<Option<f64>> {
    Ok(match (number(row, a)?, number(row, b)?) {
        (Some(a), Some(b)) => Some(apply(a, b)),
        _ => None,
    })
}

fn date_part(part: DatePart, t: OffsetDateTime) -> f64 {
    match part {
        DatePart::Year => t.year() as f64,
        DatePart::Month => u8::from(t.month()) as f64,
        DatePart::Day => t.day() as f64,
        DatePart::Hour => t.hour() as f64,
        DatePart::Minute => t.minute() as f64,
        DatePart::Second => t.second() as f64,
        DatePart::FractionalSeconds => t.nanosecond() as f64 / 1e9,
    }
}

fn string(row: &EntityRow, expr: &StringExpr) -> StoreResult<Option<String>> {
    Ok(Some(match expr {
        StringExpr::Literal(s) => s.clone(),
        StringExpr::Property(name) => match row.value(name) {
            Some(Value::Text(s)) => s.clone(),
            Some(Value::Bool(b)) => b.to_string(),
            Some(_) => {
                return Err(StoreError::MalformedRow {
                    id: row.id,
                    reason: "property is not text",
                })
            }
            None => return Ok(None),
        },
        StringExpr::ToLower(s) => return Ok(string(row, s)?.map(|s| s.to_lowercase())),
        StringExpr::ToUpper(s) => return Ok(string(row, s)?.map(|s| s.to_uppercase())),
        StringExpr::Trim(s) => return Ok(string(row, s)?.map(|s| s.trim().to_owned())),
        StringExpr::Concat(a, b) => {
            return Ok(match (string(row, a)?, string(row, b)?) {
                (Some(mut a), Some(b)) => {
                    a.push_str(&b);
                    Some(a)
                }
                _ => None,
            })
        }
        StringExpr::Substring {
            source,
            start,
            length,
        } => {
            let Some(source) = string(row, source)? else {
                return Ok(None);
            };
            let Some(start) = number(row, start)? else {
                return Ok(None);
            };
            let skip = start.max(0.0) as usize;
            let taken: String = match length {
                Some(len) => {
                    let Some(len) = number(row, len)? else {
                        return Ok(None);
                    };
                    source.chars().skip(skip).take(len.max(0.0) as usize).collect()
                }
                None => source.chars().skip(skip).collect(),
            };
            taken
        }
    }))
}

fn instant(row: &EntityRow, expr: &TimeExpr) -> StoreResult<Option<OffsetDateTime>> {
    Ok(match expr {
        TimeExpr::Literal(t) => Some(*t),
        TimeExpr::Property(name) => match row.value(name) {
            Some(Value::Instant(t)) => Some(*t),
            Some(_) => {
                return Err(StoreError::MalformedRow {
                    id: row.id,
                    reason: "property is not an instant",
                })
            }
            None => None,
        },
    })
}

fn range(row: &EntityRow, expr: &RangeExpr) -> StoreResult<Option<(OffsetDateTime, OffsetDateTime)>> {
    Ok(match expr {
        RangeExpr::Literal { start, end } => Some((*start, *end)),
        RangeExpr::Property(name) => match row.value(name) {
            Some(Value::Range { start, end }) => Some((*start, *end)),
            Some(_) => {
                return Err(StoreError::MalformedRow {
                    id: row.id,
                    reason: "property is not a time range",
                })
            }
            None => None,
        },
    })
}

fn geometry(row: &EntityRow, expr: &GeoExpr) -> StoreResult<Option<Geometry>> {
    Ok(match expr {
        GeoExpr::Literal(g) => Some(g.clone()),
        GeoExpr::Property(name) => match row.value(name) {
            Some(Value::Geometry(g)) => Some(g.clone()),
            Some(_) => {
                return Err(StoreError::MalformedRow {
                    id: row.id,
                    reason: "property is not a geometry",
                })
            }
            None => None,
        },
    })
}
