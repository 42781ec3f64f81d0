//! In-memory entity store.
//!
//! A complete, ordered, bidirectionally-linked backend for tests or
//! prototyping; production deployments wire the query core to external
//! storage instead. Rows live in per-type id-ordered tables, relationship
//! links are kept on both ends via the model's inverse names, and compiled
//! predicates are evaluated row by row through [`eval`].

pub mod eval;

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use crate::model::EntityType;
use crate::predicate::Predicate;
use crate::query::errors::QueryResult;
use crate::query::navigate::EntityGateway;
use crate::types::{EntityId, StoreError, StoreResult};
use crate::value::Value;

/// One stored entity: its id, primitive values, and relationship links.
#[derive(Clone, Debug, Default)]
pub struct EntityRow {
    /// Row id.
    pub id: EntityId,
    /// Primitive property values by property name.
    pub values: FxHashMap<String, Value>,
    /// Related ids by relationship name.
    pub links: FxHashMap<String, Vec<EntityId>>,
}

impl EntityRow {
    /// Creates an empty row with the given id.
    pub fn new(id: u64) -> Self {
        EntityRow {
            id: EntityId(id),
            ..EntityRow::default()
        }
    }

    /// Sets a primitive property value, consuming and returning the row.
    pub fn set(mut self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(property.into(), value.into());
        self
    }

    /// Value of a primitive property, if set.
    pub fn value(&self, property: &str) -> Option<&Value> {
        self.values.get(property)
    }

    /// Ids linked over a relationship; empty when none are.
    pub fn links(&self, relation: &str) -> &[EntityId] {
        self.links.get(relation).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Offset/limit window over an id-ordered result.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Page {
    /// Rows skipped from the start.
    pub offset: usize,
    /// Maximum rows returned.
    pub limit: usize,
}

impl Page {
    /// Window covering every row.
    pub const ALL: Page = Page {
        offset: 0,
        limit: usize::MAX,
    };

    /// Window of `limit` rows starting at `offset`.
    pub fn new(offset: usize, limit: usize) -> Self {
        Page { offset, limit }
    }
}

/// Read capabilities a store backend offers over compiled predicates.
pub trait Repository {
    /// Whether a row of `entity` with id `id` exists.
    fn exists(&self, entity: EntityType, id: EntityId) -> StoreResult<bool>;

    /// The single row id matching `filter`, `None` unless exactly one does.
    fn find_one(&self, entity: EntityType, filter: &Predicate) -> StoreResult<Option<EntityId>>;

    /// Ids of rows matching `filter`, in ascending id order, windowed by
    /// `page`.
    fn find_all(
        &self,
        entity: EntityType,
        filter: &Predicate,
        page: Page,
    ) -> StoreResult<Vec<EntityId>>;

    /// Number of rows matching `filter`.
    fn count(&self, entity: EntityType, filter: &Predicate) -> StoreResult<usize>;
}

/// In-memory store: one id-ordered table per entity type.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: FxHashMap<EntityType, BTreeMap<u64, EntityRow>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        InMemoryStore::default()
    }

    /// Inserts a row, replacing any previous row with the same id.
    pub fn insert(&mut self, entity: EntityType, row: EntityRow) {
        self.tables.entry(entity).or_default().insert(row.id.0, row);
    }

    /// Links two existing rows over a relationship, maintaining the inverse
    /// link on the target row.
    pub fn link(
        &mut self,
        entity: EntityType,
        id: EntityId,
        relation: &str,
        target_id: EntityId,
    ) -> StoreResult<()> {
        let rel = entity
            .relation(relation)
            .ok_or(StoreError::Unsupported("unknown relationship"))?;
        let inverse = rel.inverse;
        let target = rel.target;

        self.row_mut(entity, id)?
            .links
            .entry(relation.to_owned())
            .or_default()
            .push(target_id);
        self.row_mut(target, target_id)?
            .links
            .entry(inverse.to_owned())
            .or_default()
            .push(id);
        Ok(())
    }

    /// Looks up a row.
    pub fn row(&self, entity: EntityType, id: EntityId) -> Option<&EntityRow> {
        self.tables.get(&entity)?.get(&id.0)
    }

    fn row_mut(&mut self, entity: EntityType, id: EntityId) -> StoreResult<&mut EntityRow> {
        self.tables
            .get_mut(&entity)
            .and_then(|table| table.get_mut(&id.0))
            .ok_or(StoreError::NotFound)
    }

    fn rows(&self, entity: EntityType) -> impl Iterator<Item = &EntityRow> {
        self.tables.get(&entity).into_iter().flat_map(BTreeMap::values)
    }

    fn matching(
        &self,
        entity: EntityType,
        filter: &Predicate,
    ) -> StoreResult<impl Iterator<Item = EntityId> + '_> {
        let mut ids = Vec::new();
        for row in self.rows(entity) {
            if eval::eval_predicate(self, entity, row, filter)? {
                ids.push(row.id);
            }
        }
        Ok(ids.into_iter())
    }
}

impl Repository for InMemoryStore {
    fn exists(&self, entity: EntityType, id: EntityId) -> StoreResult<bool> {
        Ok(self.row(entity, id).is_some())
    }

    fn find_one(&self, entity: EntityType, filter: &Predicate) -> StoreResult<Option<EntityId>> {
        let mut matching = self.matching(entity, filter)?;
        match (matching.next(), matching.next()) {
            (Some(id), None) => Ok(Some(id)),
            _ => Ok(None),
        }
    }

    fn find_all(
        &self,
        entity: EntityType,
        filter: &Predicate,
        page: Page,
    ) -> StoreResult<Vec<EntityId>> {
        Ok(self
            .matching(entity, filter)?
            .skip(page.offset)
            .take(page.limit)
            .collect())
    }

    fn count(&self, entity: EntityType, filter: &Predicate) -> StoreResult<usize> {
        Ok(self.matching(entity, filter)?.count())
    }
}

impl EntityGateway for InMemoryStore {
    fn exists(&self, entity: EntityType, id: EntityId) -> QueryResult<bool> {
        Ok(Repository::exists(self, entity, id)?)
    }

    fn related_id(
        &self,
        target: EntityType,
        source: EntityType,
        source_id: EntityId,
        target_id: Option<EntityId>,
    ) -> QueryResult<Option<EntityId>> {
        let rel = target
            .relation_to(source)
            .ok_or(StoreError::Unsupported("unrelated entity types"))?;
        let related = Predicate::Related {
            relation: rel.name.to_owned(),
            target: crate::predicate::RelationTarget::Id(source_id),
        };
        match target_id {
            Some(id) => {
                let filter = Predicate::IdEq(id).and(related);
                Ok(self.find_one(target, &filter)?)
            }
            None => Ok(self.find_one(target, &related)?),
        }
    }
}
