//! Query subsystem: filter compilation, per-entity specifications, and
//! navigation-path resolution.
//!
//! Protocol parsing happens upstream; this module takes the parsed inputs
//! defined in [`ast`] and lowers them into the typed predicate model a store
//! backend can execute.

/// Parsed filter expressions and navigation paths.
pub mod ast;

/// Filter-expression compiler.
pub mod compiler;

/// Query-layer error types.
pub mod errors;

mod functions;

/// Navigation-path resolver and the store gateway it walks with.
pub mod navigate;

/// Per-entity query specifications and the registry.
pub mod spec;

pub use compiler::FilterCompiler;
pub use errors::{QueryError, QueryResult, StageFailure};
pub use navigate::{EntityGateway, PathResolver, ResolvedPath, ResolvedTarget};
pub use spec::{FilterValue, PropertyAccessor, QuerySpec, SpecRegistry};
