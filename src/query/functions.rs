//! Query-function dispatch.
//!
//! One entry per supported protocol function, each mapping onto the matching
//! operation of the already-converted operand expressions. Functions the
//! protocol defines but this core does not wire (`date`, `time`,
//! `totaloffsetminutes`, `geolength`) report NotImplemented instead of being
//! simulated; unknown names are rejected outright.

use time::{OffsetDateTime, PrimitiveDateTime};

use crate::predicate::{DatePart, NumberExpr, Predicate, SpatialOp, StringExpr, StringMatch, TimeExpr};
use crate::query::compiler::Operand;
use crate::query::errors::{QueryError, QueryResult};
use crate::value::Value;

/// Applies a query function to its evaluated arguments.
///
/// `now` is the instant captured at the start of the compilation; every
/// `now()` in one filter resolves to it.
pub(crate) fn dispatch(
    function: &str,
    args: Vec<Operand>,
    now: OffsetDateTime,
) -> QueryResult<Operand> {
    match function {
        // String predicates.
        "contains" => string_match(function, StringMatch::Contains, args),
        "startswith" => string_match(function, StringMatch::StartsWith, args),
        "endswith" => string_match(function, StringMatch::EndsWith, args),

        // String transforms.
        "tolower" => {
            let [s] = take::<1>(function, args)?;
            let s = string(function, &s)?;
            Ok(Operand::Str(StringExpr::ToLower(Box::new(s))))
        }
        "toupper" => {
            let [s] = take::<1>(function, args)?;
            let s = string(function, &s)?;
            Ok(Operand::Str(StringExpr::ToUpper(Box::new(s))))
        }
        "trim" => {
            let [s] = take::<1>(function, args)?;
            let s = string(function, &s)?;
            Ok(Operand::Str(StringExpr::Trim(Box::new(s))))
        }
        "concat" => {
            let [a, b] = take::<2>(function, args)?;
            let a = string(function, &a)?;
            let b = string(function, &b)?;
            Ok(Operand::Str(StringExpr::Concat(Box::new(a), Box::new(b))))
        }
        "substring" => substring(function, args),
        "length" => {
            let [s] = take::<1>(function, args)?;
            let s = string(function, &s)?;
            Ok(Operand::Number(NumberExpr::Length(Box::new(s))))
        }
        "indexof" => {
            let [haystack, needle] = take::<2>(function, args)?;
            let haystack = Box::new(string(function, &haystack)?);
            let needle = Box::new(string(function, &needle)?);
            Ok(Operand::Number(NumberExpr::IndexOf { haystack, needle }))
        }

        // Arithmetic.
        "round" => rounding(function, args, NumberExpr::Round),
        "floor" => rounding(function, args, NumberExpr::Floor),
        "ceiling" => rounding(function, args, NumberExpr::Ceiling),

        // Date-part extraction and instant constants.
        "year" => date_part(function, args, DatePart::Year),
        "month" => date_part(function, args, DatePart::Month),
        "day" => date_part(function, args, DatePart::Day),
        "hour" => date_part(function, args, DatePart::Hour),
        "minute" => date_part(function, args, DatePart::Minute),
        "second" => date_part(function, args, DatePart::Second),
        "fractionalseconds" => date_part(function, args, DatePart::FractionalSeconds),
        "now" => {
            take::<0>(function, args)?;
            Ok(Operand::Time(TimeExpr::Literal(now)))
        }
        "mindatetime" => {
            take::<0>(function, args)?;
            Ok(Operand::Time(TimeExpr::Literal(
                PrimitiveDateTime::MIN.assume_utc(),
            )))
        }
        "maxdatetime" => {
            take::<0>(function, args)?;
            Ok(Operand::Time(TimeExpr::Literal(
                PrimitiveDateTime::MAX.assume_utc(),
            )))
        }

        // Geometry.
        "geo.distance" | "st_distance" => {
            let [a, b] = take::<2>(function, args)?;
            let a = Box::new(geometry(function, &a)?);
            let b = Box::new(geometry(function, &b)?);
            Ok(Operand::Number(NumberExpr::Distance(a, b)))
        }
        "geo.intersects" | "st_intersects" => spatial(function, SpatialOp::Intersects, args),
        "st_contains" => spatial(function, SpatialOp::Contains, args),
        "st_crosses" => spatial(function, SpatialOp::Crosses, args),
        "st_disjoint" => spatial(function, SpatialOp::Disjoint, args),
        "st_equals" => spatial(function, SpatialOp::Equals, args),
        "st_overlaps" => spatial(function, SpatialOp::Overlaps, args),
        "st_touches" => spatial(function, SpatialOp::Touches, args),
        "st_within" => spatial(function, SpatialOp::Within, args),
        "st_relate" => relate(function, args),

        // Defined by the protocol, not wired here.
        "date" | "time" | "totaloffsetminutes" | "geolength" | "geo.length" => {
            Err(QueryError::unsupported(format!("query function '{function}'")))
        }

        other => Err(QueryError::unsupported(format!(
            "unknown query function '{other}'"
        ))),
    }
}

fn take<const N: usize>(function: &str, args: Vec<Operand>) -> QueryResult<[Operand; N]> {
    let got = args.len();
    args.try_into().map_err(|_| QueryError::InvalidOperand {
        operator: function.to_owned(),
        operand: format!("{got} arguments (expected {N})"),
    })
}

fn string(function: &str, operand: &Operand) -> QueryResult<StringExpr> {
    operand
        .to_string_expr()
        .map_err(|operand| QueryError::InvalidOperand {
            operator: function.to_owned(),
            operand,
        })
}

fn number(function: &str, operand: &Operand) -> QueryResult<NumberExpr> {
    operand
        .to_number()
        .map_err(|operand| QueryError::InvalidOperand {
            operator: function.to_owned(),
            operand,
        })
}

fn geometry(function: &str, operand: &Operand) -> QueryResult<crate::predicate::GeoExpr> {
    operand
        .to_geo()
        .map_err(|operand| QueryError::InvalidOperand {
            operator: function.to_owned(),
            operand,
        })
}

fn string_match(function: &str, kind: StringMatch, args: Vec<Operand>) -> QueryResult<Operand> {
    let [source, pattern] = take::<2>(function, args)?;
    let source = string(function, &source)?;
    let pattern = string(function, &pattern)?;
    Ok(Operand::Predicate(Predicate::StringMatch {
        kind,
        source,
        pattern,
    }))
}

fn rounding(
    function: &str,
    args: Vec<Operand>,
    build: fn(Box<NumberExpr>) -> NumberExpr,
) -> QueryResult<Operand> {
    let [n] = take::<1>(function, args)?;
    let n = number(function, &n)?;
    Ok(Operand::Number(build(Box::new(n))))
}

fn date_part(function: &str, args: Vec<Operand>, part: DatePart) -> QueryResult<Operand> {
    let [t] = take::<1>(function, args)?;
    let of = t.to_time().map_err(|operand| QueryError::InvalidOperand {
        operator: function.to_owned(),
        operand,
    })?;
    Ok(Operand::Number(NumberExpr::DatePart {
        part,
        of: Box::new(of),
    }))
}

fn spatial(function: &str, op: SpatialOp, args: Vec<Operand>) -> QueryResult<Operand> {
    let [a, b] = take::<2>(function, args)?;
    let lhs = geometry(function, &a)?;
    let rhs = geometry(function, &b)?;
    Ok(Operand::Predicate(Predicate::Spatial { op, lhs, rhs }))
}

/// `st_relate` is ternary; the third argument must be a literal DE-9IM
/// pattern string.
fn relate(function: &str, args: Vec<Operand>) -> QueryResult<Operand> {
    let [a, b, pattern] = take::<3>(function, args)?;
    let lhs = geometry(function, &a)?;
    let rhs = geometry(function, &b)?;
    let pattern = match pattern {
        Operand::Value(Value::Text(s)) => s,
        other => {
            return Err(QueryError::InvalidOperand {
                operator: function.to_owned(),
                operand: format!("{} as relate pattern", other.describe()),
            })
        }
    };
    Ok(Operand::Predicate(Predicate::Relate { lhs, rhs, pattern }))
}

fn substring(function: &str, args: Vec<Operand>) -> QueryResult<Operand> {
    if args.len() == 3 {
        let [s, start, len] = take::<3>(function, args)?;
        let source = Box::new(string(function, &s)?);
        let start = Box::new(number(function, &start)?);
        let length = Some(Box::new(number(function, &len)?));
        return Ok(Operand::Str(StringExpr::Substring {
            source,
            start,
            length,
        }));
    }
    let [s, start] = take::<2>(function, args)?;
    let source = Box::new(string(function, &s)?);
    let start = Box::new(number(function, &start)?);
    Ok(Operand::Str(StringExpr::Substring {
        source,
        start,
        length: None,
    }))
}
