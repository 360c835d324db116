// Copyright (c) The tiespath contributors.
// Licensed under the Apache License, Version 2.0.

// Use README.md as crate documentation.
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/README.md"))]

mod ast;
mod engine;
mod errors;
mod lexer;
mod parser;
mod plan;
mod refiner;
mod resolver;
mod schema;

pub use ast::{
    BooleanOperator, ContainerType, FilterCriteria, Literal, LogicalBlock, QueryFunction,
    ScopeObject, TargetObject, TopologyObjectType, ITEMS, WILDCARD,
};
pub use engine::Engine;
pub use errors::{Result, StatusClass, TiesPathError};
pub use plan::{compile, Condition, Join, Projection, QueryPlan};
pub use refiner::{reduce, refine};
pub use resolver::{PathResolver, ScopeResolver, TargetResolver};
pub use schema::{
    Association, DataType, EntityType, Module, RelationType, RelationshipDataLocation,
    SchemaRegistry, SchemaRegistryBuilder, DATA_SCHEMA, ID_COLUMN,
};

/// Items in `unstable` are likely to change.
pub mod unstable {
    pub use crate::lexer::*;
    pub use crate::parser::*;
}

#[cfg(test)]
mod tests;
