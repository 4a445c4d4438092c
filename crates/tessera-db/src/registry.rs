//! The closed set of entity types that take part in persistence.
//!
//! Registration is explicit: the application lists its entity types once at
//! startup, and every mapping is validated before the connection manager
//! creates any table. A bad mapping fails the whole build instead of being
//! skipped, since a missing table only shows up later as an opaque query error.

use std::{
    any::{type_name, TypeId},
    collections::{HashMap, HashSet},
    sync::LazyLock,
};

use regex::Regex;
use tracing::{debug, warn};

use crate::{
    error::{DbError, Result},
    traits::{Entity, ID_COLUMN},
    value::{ColumnKind, SqlType},
};

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("unable to compile identifier regex")
});

/// A non-identity column of an entity table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub nullable: bool,
}

impl ColumnDef {
    /// Describes a column holding a field of type `T`.
    pub const fn of<T: SqlType>(name: &'static str) -> Self {
        Self {
            name,
            kind: T::KIND,
            nullable: T::NULLABLE,
        }
    }
}

/// Storage mapping of one registered entity type.
#[derive(Debug, Clone)]
pub struct EntityMapping {
    type_id: TypeId,
    type_name: &'static str,
    table: &'static str,
    columns: &'static [ColumnDef],
}

impl EntityMapping {
    fn of<E: Entity>() -> Self {
        Self {
            type_id: TypeId::of::<E>(),
            type_name: type_name::<E>(),
            table: E::TABLE,
            columns: E::COLUMNS,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    /// Non-identity columns.
    pub fn columns(&self) -> &'static [ColumnDef] {
        self.columns
    }

    /// Identity column followed by every other column.
    pub fn column_names(&self) -> impl Iterator<Item = &'static str> {
        std::iter::once(ID_COLUMN).chain(self.columns.iter().map(|c| c.name))
    }

    /// Resolves a field name to its column, identity included.
    pub fn column(&self, field: &str) -> Option<&'static str> {
        self.column_names().find(|name| *name == field)
    }

    fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if !IDENTIFIER.is_match(self.table) {
            problems.push(format!(
                "{}: table name '{}' is not a valid identifier",
                self.type_name, self.table
            ));
        }

        let mut seen = HashSet::new();
        for column in self.columns {
            if !IDENTIFIER.is_match(column.name) {
                problems.push(format!(
                    "{}: column name '{}' is not a valid identifier",
                    self.type_name, column.name
                ));
            }
            if column.name.eq_ignore_ascii_case(ID_COLUMN) {
                problems.push(format!(
                    "{}: column '{}' collides with the identity column",
                    self.type_name, column.name
                ));
            }
            if !seen.insert(column.name.to_ascii_lowercase()) {
                problems.push(format!(
                    "{}: column '{}' is declared more than once",
                    self.type_name, column.name
                ));
            }
        }

        problems
    }
}

/// Validated set of entity mappings, fixed for the process lifetime.
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    mappings: Vec<EntityMapping>,
    index: HashMap<TypeId, usize>,
}

impl EntityRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Looks up the mapping of `E`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Validation`] if `E` was never registered.
    pub fn mapping<E: Entity>(&self) -> Result<&EntityMapping> {
        self.index
            .get(&TypeId::of::<E>())
            .map(|&i| &self.mappings[i])
            .ok_or_else(|| {
                DbError::Validation(format!(
                    "Entity type {} is not registered",
                    type_name::<E>()
                ))
            })
    }

    pub fn contains<E: Entity>(&self) -> bool {
        self.index.contains_key(&TypeId::of::<E>())
    }

    pub fn mappings(&self) -> &[EntityMapping] {
        &self.mappings
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

/// Collects entity types; [`RegistryBuilder::build`] validates them all.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    mappings: Vec<EntityMapping>,
}

impl RegistryBuilder {
    pub fn register<E: Entity>(mut self) -> Self {
        self.mappings.push(EntityMapping::of::<E>());
        self
    }

    /// Validates every registered mapping.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Configuration`] listing every problem found: invalid
    /// identifiers, a field named like the identity column, duplicate columns,
    /// a type registered twice, or two types sharing a table.
    pub fn build(self) -> Result<EntityRegistry> {
        let mut problems = Vec::new();
        let mut index = HashMap::new();
        let mut tables: HashMap<String, &'static str> = HashMap::new();

        for (i, mapping) in self.mappings.iter().enumerate() {
            problems.extend(mapping.problems());

            if index.insert(mapping.type_id, i).is_some() {
                problems.push(format!("{} is registered more than once", mapping.type_name));
                continue;
            }

            if let Some(other) = tables.insert(mapping.table.to_ascii_lowercase(), mapping.type_name)
            {
                problems.push(format!(
                    "{} and {} both map to table '{}'",
                    other, mapping.type_name, mapping.table
                ));
            }
        }

        if !problems.is_empty() {
            return Err(DbError::Configuration(format!(
                "Invalid entity registration: {}",
                problems.join("; ")
            )));
        }

        if self.mappings.is_empty() {
            warn!("No entity types registered; every repository call will be rejected");
        }
        for mapping in &self.mappings {
            debug!("Registered entity {} -> table '{}'", mapping.type_name, mapping.table);
        }

        Ok(EntityRegistry {
            mappings: self.mappings,
            index,
        })
    }
}
