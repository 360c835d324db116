// Copyright (c) The tiespath contributors.
// Licensed under the Apache License, Version 2.0.

//! Schema model and registry snapshot.
//!
//! The registry is populated once at service start-up and read-only for the
//! lifetime of a request. A reload publishes a fresh snapshot (a new
//! `Arc<SchemaRegistry>`) rather than mutating the live one, so in-flight
//! requests never observe a partially updated schema.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::errors::{Result, TiesPathError};

/// Schema namespace all backing tables live in.
pub const DATA_SCHEMA: &str = "ties_data";

/// Primary key column shared by all backing tables.
pub const ID_COLUMN: &str = "id";

const CONSUMER_DATA_PREFIX: &str = "CD_";

fn table(name: &str) -> String {
    format!("{DATA_SCHEMA}.\"{name}\"")
}

/// Storage class of a declared attribute column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataType {
    Primitive,
    Decimal,
    Bigint,
    Container,
    Geographic,
}

impl DataType {
    pub fn from_db_type(db_type: &str) -> Result<DataType> {
        match db_type.to_ascii_uppercase().as_str() {
            "TEXT" | "VARCHAR" => Ok(DataType::Primitive),
            "NUMERIC" | "DECIMAL" => Ok(DataType::Decimal),
            "BIGINT" | "INT8" => Ok(DataType::Bigint),
            "JSONB" => Ok(DataType::Container),
            "GEOGRAPHY" => Ok(DataType::Geographic),
            other => Err(TiesPathError::Schema(format!(
                "Unexpected database type: {other}"
            ))),
        }
    }
}

/// A named role by which a relationship type connects its two sides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Association {
    pub name: String,
    #[serde(default)]
    pub min_cardinality: u64,
    #[serde(default = "max_cardinality_default")]
    pub max_cardinality: u64,
}

fn max_cardinality_default() -> u64 {
    u64::MAX
}

impl Association {
    pub fn new(name: impl Into<String>, min_cardinality: u64, max_cardinality: u64) -> Association {
        Association {
            name: name.into(),
            min_cardinality,
            max_cardinality,
        }
    }
}

/// Which table stores a relationship's rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipDataLocation {
    /// The relationship has its own table.
    Relation,
    /// Stored as extra columns on the A-side entity's table.
    ASide,
    /// Stored as extra columns on the B-side entity's table.
    BSide,
}

/// A schema module: the unit that declares types and assigns them a domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    pub namespace: String,
    pub domain: String,
    #[serde(default)]
    pub included_modules: Vec<String>,
}

/// An entity type: declared attributes and derived storage names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityType {
    pub name: String,
    pub module: String,
    pub attributes: BTreeMap<String, DataType>,
}

impl EntityType {
    pub fn table_name(&self) -> String {
        table(&self.name)
    }

    pub fn id_column(&self) -> &'static str {
        ID_COLUMN
    }

    pub fn attribute_names(&self) -> Vec<&str> {
        self.attributes.keys().map(String::as_str).collect()
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn attribute_type(&self, name: &str) -> Option<DataType> {
        self.attributes.get(name).copied()
    }

    pub fn source_ids_column(&self) -> String {
        format!("{CONSUMER_DATA_PREFIX}sourceIds")
    }

    pub fn decorators_column(&self) -> String {
        format!("{CONSUMER_DATA_PREFIX}decorators")
    }

    pub fn classifiers_column(&self) -> String {
        format!("{CONSUMER_DATA_PREFIX}classifiers")
    }
}

/// A relationship type: two entity sides, their association names, declared
/// attributes and the storage location of the relationship's rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationType {
    pub name: String,
    pub module: String,
    pub a_side: String,
    pub a_side_association: Association,
    pub b_side: String,
    pub b_side_association: Association,
    #[serde(default)]
    pub attributes: BTreeMap<String, DataType>,
    #[serde(default)]
    pub connects_same_entity: bool,
    pub storage_location: RelationshipDataLocation,
}

impl RelationType {
    pub fn table_name(&self) -> String {
        match self.storage_location {
            RelationshipDataLocation::Relation => table(&self.name),
            RelationshipDataLocation::ASide => table(&self.a_side),
            RelationshipDataLocation::BSide => table(&self.b_side),
        }
    }

    pub fn id_column(&self) -> String {
        match self.storage_location {
            RelationshipDataLocation::Relation => ID_COLUMN.to_string(),
            _ => format!("REL_ID_{}", self.name),
        }
    }

    pub fn source_ids_column(&self) -> String {
        match self.storage_location {
            RelationshipDataLocation::Relation => format!("{CONSUMER_DATA_PREFIX}sourceIds"),
            _ => format!("REL_CD_sourceIds_{}", self.name),
        }
    }

    pub fn decorators_column(&self) -> String {
        match self.storage_location {
            RelationshipDataLocation::Relation => format!("{CONSUMER_DATA_PREFIX}decorators"),
            _ => format!("REL_CD_decorators_{}", self.name),
        }
    }

    pub fn classifiers_column(&self) -> String {
        match self.storage_location {
            RelationshipDataLocation::Relation => format!("{CONSUMER_DATA_PREFIX}classifiers"),
            _ => format!("REL_CD_classifiers_{}", self.name),
        }
    }

    pub fn a_side_column(&self) -> String {
        match self.storage_location {
            RelationshipDataLocation::Relation => format!("aSide_{}", self.a_side),
            RelationshipDataLocation::ASide => ID_COLUMN.to_string(),
            RelationshipDataLocation::BSide => {
                format!("REL_FK_{}", self.b_side_association.name)
            }
        }
    }

    pub fn b_side_column(&self) -> String {
        match self.storage_location {
            RelationshipDataLocation::Relation => format!("bSide_{}", self.b_side),
            RelationshipDataLocation::ASide => format!("REL_FK_{}", self.a_side_association.name),
            RelationshipDataLocation::BSide => ID_COLUMN.to_string(),
        }
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn attribute_type(&self, name: &str) -> Option<DataType> {
        self.attributes.get(name).copied()
    }

    /// Whether either side of this relationship carries the association name.
    pub fn has_association(&self, association: &str) -> bool {
        self.a_side_association.name == association || self.b_side_association.name == association
    }

    /// The entity connected to `object` through `association`, when this
    /// relationship links them: A-side objects reach the B-side through the
    /// B-side association and vice versa.
    pub fn opposite_side_of(&self, object: &str, association: &str) -> Option<&str> {
        if self.a_side == object && self.b_side_association.name == association {
            Some(&self.b_side)
        } else if self.b_side == object && self.a_side_association.name == association {
            Some(&self.a_side)
        } else {
            None
        }
    }

    /// The entity the given association name points at.
    pub fn side_of_association(&self, association: &str) -> Option<&str> {
        if self.a_side_association.name == association {
            Some(&self.a_side)
        } else if self.b_side_association.name == association {
            Some(&self.b_side)
        } else {
            None
        }
    }

    /// Column of this relationship's table holding the key of `entity`.
    pub fn side_column_of(&self, entity: &str) -> Option<String> {
        if self.a_side == entity {
            Some(self.a_side_column())
        } else if self.b_side == entity {
            Some(self.b_side_column())
        } else {
            None
        }
    }
}

/// Read-only schema snapshot: modules, entity types and relationship types,
/// with by-domain lookups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaRegistry {
    modules: BTreeMap<String, Module>,
    entities: BTreeMap<String, EntityType>,
    relations: BTreeMap<String, RelationType>,
}

impl SchemaRegistry {
    pub fn builder() -> SchemaRegistryBuilder {
        SchemaRegistryBuilder::default()
    }

    /// Loads and validates a registry from its JSON representation.
    pub fn from_json_str(json: &str) -> Result<SchemaRegistry> {
        let registry: SchemaRegistry = serde_json::from_str(json)
            .map_err(|e| TiesPathError::Schema(format!("Schema registry parse error: {e}")))?;
        registry.validate()?;
        Ok(registry)
    }

    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> Result<SchemaRegistry> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            TiesPathError::Schema(format!(
                "Cannot read schema registry {}: {e}",
                path.as_ref().display()
            ))
        })?;
        SchemaRegistry::from_json_str(&contents)
    }

    fn validate(&self) -> Result<()> {
        for entity in self.entities.values() {
            if !self.modules.contains_key(&entity.module) {
                return Err(TiesPathError::Schema(format!(
                    "Entity {} references undeclared module {}",
                    entity.name, entity.module
                )));
            }
        }
        for relation in self.relations.values() {
            if !self.modules.contains_key(&relation.module) {
                return Err(TiesPathError::Schema(format!(
                    "Relation {} references undeclared module {}",
                    relation.name, relation.module
                )));
            }
            for side in [&relation.a_side, &relation.b_side] {
                if !self.entities.contains_key(side) {
                    return Err(TiesPathError::Schema(format!(
                        "Relation {} references undeclared entity {side}",
                        relation.name
                    )));
                }
            }
        }
        for module in self.modules.values() {
            for included in &module.included_modules {
                if !self.modules.contains_key(included) {
                    return Err(TiesPathError::Schema(format!(
                        "Module {} includes undeclared module {included}",
                        module.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// All domains declared by the registered modules.
    pub fn domains(&self) -> BTreeSet<String> {
        self.modules.values().map(|m| m.domain.clone()).collect()
    }

    fn module_by_domain(&self, domain: &str) -> Result<&Module> {
        self.modules
            .values()
            .find(|m| m.domain == domain)
            .ok_or_else(|| TiesPathError::UnknownDomain {
                domain: domain.to_string(),
                available: self.domains().into_iter().collect(),
            })
    }

    /// The domain names visible from `domain`: itself plus the domains of its
    /// included modules.
    fn visible_domains(&self, domain: &str) -> Result<BTreeSet<&str>> {
        let module = self.module_by_domain(domain)?;
        let mut visible: BTreeSet<&str> = BTreeSet::new();
        visible.insert(module.domain.as_str());
        for included in &module.included_modules {
            if let Some(m) = self.modules.get(included) {
                visible.insert(m.domain.as_str());
            }
        }
        Ok(visible)
    }

    pub fn entity_names_by_domain(&self, domain: &str) -> Result<Vec<String>> {
        let visible = self.visible_domains(domain)?;
        Ok(self
            .entities
            .values()
            .filter(|e| {
                self.modules
                    .get(&e.module)
                    .is_some_and(|m| visible.contains(m.domain.as_str()))
            })
            .map(|e| e.name.clone())
            .collect())
    }

    pub fn relation_names_by_domain(&self, domain: &str) -> Result<Vec<String>> {
        let visible = self.visible_domains(domain)?;
        Ok(self
            .relations
            .values()
            .filter(|r| {
                self.modules
                    .get(&r.module)
                    .is_some_and(|m| visible.contains(m.domain.as_str()))
            })
            .map(|r| r.name.clone())
            .collect())
    }

    pub fn entity_type_by_name(&self, name: &str) -> Option<&EntityType> {
        self.entities.get(name)
    }

    pub fn relation_type_by_name(&self, name: &str) -> Option<&RelationType> {
        self.relations.get(name)
    }

    pub fn relation_types(&self) -> impl Iterator<Item = &RelationType> {
        self.relations.values()
    }

    pub fn entity_names(&self) -> BTreeSet<&str> {
        self.entities.keys().map(String::as_str).collect()
    }

    pub fn relation_names(&self) -> BTreeSet<&str> {
        self.relations.keys().map(String::as_str).collect()
    }
}

/// Validating builder for registry snapshots.
#[derive(Debug, Default)]
pub struct SchemaRegistryBuilder {
    registry: SchemaRegistry,
}

impl SchemaRegistryBuilder {
    pub fn add_module(mut self, module: Module) -> SchemaRegistryBuilder {
        self.registry.modules.insert(module.name.clone(), module);
        self
    }

    pub fn add_entity(mut self, entity: EntityType) -> SchemaRegistryBuilder {
        self.registry.entities.insert(entity.name.clone(), entity);
        self
    }

    pub fn add_relation(mut self, relation: RelationType) -> SchemaRegistryBuilder {
        self.registry
            .relations
            .insert(relation.name.clone(), relation);
        self
    }

    pub fn build(self) -> Result<SchemaRegistry> {
        self.registry.validate()?;
        Ok(self.registry)
    }
}
