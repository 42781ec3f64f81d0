//! Query core for a sensor-observation service.
//!
//! Three cooperating pieces sit behind the protocol layer of the service:
//!
//! - [`query::FilterCompiler`] lowers parsed filter expressions into the
//!   typed predicates of [`predicate`], coercing operands through an ordered
//!   fallback chain and folding cross-entity property paths into nested id
//!   subqueries.
//! - [`query::SpecRegistry`] holds one immutable query specification per
//!   entity type: property resolution, relationship filters, and the type's
//!   validity rule.
//! - [`query::PathResolver`] walks parsed navigation paths hop by hop
//!   against a store gateway, verifying existence and relatedness.
//!
//! [`store::InMemoryStore`] is a complete evaluating backend for tests or
//! prototyping; production deployments implement the store traits over their
//! own storage.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod model;
pub mod predicate;
pub mod query;
pub mod store;
pub mod types;
pub mod value;
