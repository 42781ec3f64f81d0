//! Navigation-path resolution.
//!
//! A parsed resource path (`Things(1)/Datastreams(2)/Observations`) walks the
//! entity graph one hop at a time. Every addressed entity is verified to
//! exist and every hop is verified to actually relate the two entities before
//! resolution continues; a broken hop surfaces as [`QueryError::NavigationNotFound`]
//! rather than an empty result.

use tracing::debug;

use crate::model::{Cardinality, EntityType};
use crate::predicate::Predicate;
use crate::query::ast::PathSegment;
use crate::query::errors::{QueryError, QueryResult};
use crate::query::spec::SpecRegistry;
use crate::types::EntityId;

/// Store-backed relatedness oracle the resolver walks the graph with.
///
/// The resolver only ever asks yes/no questions; it never loads rows.
pub trait EntityGateway {
    /// Whether a row of `entity` with id `id` exists.
    fn exists(&self, entity: EntityType, id: EntityId) -> QueryResult<bool>;

    /// Id of the `target` row related to `source_id` of `source`.
    ///
    /// With `target_id` set, answers whether that specific row is related
    /// (returning it back, or `None`). Without it, resolves the single
    /// related row of a to-one hop; `None` means no related row exists.
    fn related_id(
        &self,
        target: EntityType,
        source: EntityType,
        source_id: EntityId,
        target_id: Option<EntityId>,
    ) -> QueryResult<Option<EntityId>>;
}

/// What the final path segment addresses.
#[derive(Clone, Debug, PartialEq)]
pub enum ResolvedTarget {
    /// A single entity, verified to exist and be reachable.
    Entity {
        /// Type of the addressed entity.
        entity: EntityType,
        /// Its id.
        id: EntityId,
    },
    /// A related collection, expressed as a predicate over the target type.
    Collection {
        /// Type of the collection's rows.
        entity: EntityType,
        /// Selects rows related to the path's last single entity, conjoined
        /// with the target type's validity rule.
        filter: Predicate,
    },
}

/// Outcome of resolving a full navigation path.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedPath {
    /// Type of the last single entity on the path.
    pub source: EntityType,
    /// Id of that entity.
    pub source_id: EntityId,
    /// What the final segment addresses.
    pub target: ResolvedTarget,
}

/// Walks navigation paths against the entity model and a store gateway.
pub struct PathResolver<'a, G> {
    registry: &'a SpecRegistry,
    gateway: &'a G,
}

impl<'a, G: EntityGateway> PathResolver<'a, G> {
    /// Creates a resolver over the given registry and gateway.
    pub fn new(registry: &'a SpecRegistry, gateway: &'a G) -> Self {
        PathResolver { registry, gateway }
    }

    /// Resolves a full navigation path.
    pub fn resolve(&self, segments: &[PathSegment]) -> QueryResult<ResolvedPath> {
        let (root, rest) = segments.split_first().ok_or_else(|| {
            QueryError::UnsupportedPathShape("empty navigation path".to_owned())
        })?;

        let entity = EntityType::from_set_name(&root.name)
            .ok_or_else(|| QueryError::unsupported(format!("entity set '{}'", root.name)))?;
        let id = root.key.ok_or_else(|| {
            QueryError::UnsupportedPathShape(format!(
                "root collection '{}' must be addressed by key",
                root.name
            ))
        })?;
        if !self.gateway.exists(entity, id)? {
            return Err(QueryError::not_found(format!("{entity}({id})")));
        }
        debug!(%entity, %id, hops = rest.len(), "resolving navigation path");

        let mut current = entity;
        let mut current_id = id;
        for (idx, segment) in rest.iter().enumerate() {
            let terminal = idx + 1 == rest.len();
            let rel = current
                .relation(&segment.name)
                .ok_or_else(|| QueryError::unknown_property(current, &segment.name))?;

            match (segment.key, rel.cardinality) {
                (Some(target_id), _) => {
                    let related = self
                        .gateway
                        .related_id(rel.target, current, current_id, Some(target_id))?;
                    let Some(found) = related else {
                        return Err(QueryError::not_found(format!(
                            "{}({target_id}) related to {current}({current_id})",
                            rel.target
                        )));
                    };
                    current = rel.target;
                    current_id = found;
                }
                (None, Cardinality::One) => {
                    let related = self
                        .gateway
                        .related_id(rel.target, current, current_id, None)?;
                    let Some(found) = related else {
                        return Err(QueryError::not_found(format!(
                            "{} of {current}({current_id})",
                            segment.name
                        )));
                    };
                    current = rel.target;
                    current_id = found;
                }
                (None, Cardinality::Many) => {
                    if !terminal {
                        return Err(QueryError::UnsupportedPathShape(format!(
                            "collection '{}' must be addressed by key to navigate onwards",
                            segment.name
                        )));
                    }
                    let filter = self.collection_filter(rel.target, current, current_id)?;
                    return Ok(ResolvedPath {
                        source: current,
                        source_id: current_id,
                        target: ResolvedTarget::Collection {
                            entity: rel.target,
                            filter,
                        },
                    });
                }
            }
        }

        Ok(ResolvedPath {
            source: current,
            source_id: current_id,
            target: ResolvedTarget::Entity {
                entity: current,
                id: current_id,
            },
        })
    }

    /// Predicate selecting the related collection, with the target type's
    /// validity rule applied on top.
    fn collection_filter(
        &self,
        target: EntityType,
        source: EntityType,
        source_id: EntityId,
    ) -> QueryResult<Predicate> {
        let spec = self.registry.spec(target);
        let related = spec.related_to(source, source_id)?;
        Ok(match spec.is_valid_entity() {
            Predicate::Always(true) => related,
            validity => related.and(validity),
        })
    }
}
