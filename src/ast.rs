// Copyright (c) The tiespath contributors.
// Licensed under the Apache License, Version 2.0.

//! The inner query language shared by the resolvers, the refinement pipeline
//! and the plan compiler.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::schema::DataType;

/// Root-object sentinel used when the caller supplied no root object.
pub const WILDCARD: &str = "*";

/// Reserved projection parameter for `sourceIds` containers.
pub const ITEMS: &str = "items";

/// Whether a topology object name denotes an entity type or a relationship
/// type. `Undefined` only exists before type resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum TopologyObjectType {
    Entity,
    Relation,
    #[default]
    Undefined,
}

/// The addressable sub-resource of a topology object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ContainerType {
    Id,
    Attributes,
    Decorators,
    Classifiers,
    SourceIds,
    Association,
}

impl ContainerType {
    pub fn from_keyword(value: &str) -> Option<ContainerType> {
        match value {
            "id" => Some(ContainerType::Id),
            "attributes" => Some(ContainerType::Attributes),
            "decorators" => Some(ContainerType::Decorators),
            "classifiers" => Some(ContainerType::Classifiers),
            "sourceIds" => Some(ContainerType::SourceIds),
            "association" => Some(ContainerType::Association),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            ContainerType::Id => "id",
            ContainerType::Attributes => "attributes",
            ContainerType::Decorators => "decorators",
            ContainerType::Classifiers => "classifiers",
            ContainerType::SourceIds => "sourceIds",
            ContainerType::Association => "association",
        }
    }
}

/// Comparison function of an atomic scope predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QueryFunction {
    Eq,
    Contains,
}

/// A literal value appearing in a path condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Literal {
    Text(String),
    Int(i64),
}

impl Literal {
    /// The literal as plain text, without quoting.
    pub fn to_text(&self) -> String {
        match self {
            Literal::Text(s) => s.clone(),
            Literal::Int(n) => n.to_string(),
        }
    }

    /// The declared data type a literal of this shape addresses by default.
    pub fn default_data_type(&self) -> DataType {
        match self {
            Literal::Text(_) => DataType::Primitive,
            Literal::Int(_) => DataType::Bigint,
        }
    }
}

/// One projection of the target filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetObject {
    pub topology_object: String,
    pub topology_object_type: TopologyObjectType,
    pub container: Option<ContainerType>,
    pub params: Vec<String>,
}

impl TargetObject {
    pub fn new(topology_object: impl Into<String>) -> TargetObject {
        TargetObject {
            topology_object: topology_object.into(),
            topology_object_type: TopologyObjectType::Undefined,
            container: None,
            params: Vec::new(),
        }
    }

    pub fn with_container(mut self, container: ContainerType) -> TargetObject {
        self.container = Some(container);
        self
    }

    pub fn with_params(mut self, params: Vec<String>) -> TargetObject {
        self.params = params;
        self
    }

    pub fn with_type(mut self, topology_object_type: TopologyObjectType) -> TargetObject {
        self.topology_object_type = topology_object_type;
        self
    }
}

/// One atomic predicate of the scope filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScopeObject {
    pub topology_object: String,
    pub topology_object_type: TopologyObjectType,
    pub container: Option<ContainerType>,
    /// Second-level container names; for `Association` containers the first
    /// element is the association name and must be present.
    pub inner_container: Vec<String>,
    pub leaf: Option<String>,
    pub query_function: QueryFunction,
    /// The literal parameter as written in the path, unquoted.
    pub parameter: String,
    pub data_type: DataType,
}

impl ScopeObject {
    pub fn new(
        topology_object: impl Into<String>,
        container: ContainerType,
        leaf: Option<&str>,
        query_function: QueryFunction,
        parameter: impl Into<String>,
        data_type: DataType,
    ) -> ScopeObject {
        ScopeObject {
            topology_object: topology_object.into(),
            topology_object_type: TopologyObjectType::Undefined,
            container: Some(container),
            inner_container: Vec::new(),
            leaf: leaf.map(str::to_string),
            query_function,
            parameter: parameter.into(),
            data_type,
        }
    }

    pub fn with_inner_container(mut self, inner: Vec<String>) -> ScopeObject {
        self.inner_container = inner;
        self
    }

    pub fn with_type(mut self, topology_object_type: TopologyObjectType) -> ScopeObject {
        self.topology_object_type = topology_object_type;
        self
    }
}

/// Boolean connective of an [`LogicalBlock::AndOr`] node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BooleanOperator {
    And,
    Or,
}

/// The scope predicate tree.
///
/// A tagged union instead of the usual subclass hierarchy: every traversal in
/// the pipeline matches exhaustively, so adding a variant is a compile-time
/// obligation across all passes. Passes return new trees rather than mutating
/// shared nodes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LogicalBlock {
    Empty,
    Scope(ScopeObject),
    AndOr {
        op: BooleanOperator,
        children: Vec<LogicalBlock>,
    },
}

impl LogicalBlock {
    /// An AND node; a single child collapses to itself.
    pub fn and(children: Vec<LogicalBlock>) -> LogicalBlock {
        LogicalBlock::junction(BooleanOperator::And, children)
    }

    /// An OR node; a single child collapses to itself.
    pub fn or(children: Vec<LogicalBlock>) -> LogicalBlock {
        LogicalBlock::junction(BooleanOperator::Or, children)
    }

    fn junction(op: BooleanOperator, mut children: Vec<LogicalBlock>) -> LogicalBlock {
        match children.len() {
            0 => LogicalBlock::Empty,
            1 => children.remove(0),
            _ => LogicalBlock::AndOr { op, children },
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, LogicalBlock::Empty)
    }

    pub fn for_each_scope(&self, f: &mut dyn FnMut(&ScopeObject)) {
        match self {
            LogicalBlock::Empty => {}
            LogicalBlock::Scope(scope) => f(scope),
            LogicalBlock::AndOr { children, .. } => {
                for child in children {
                    child.for_each_scope(f);
                }
            }
        }
    }

    pub fn for_each_scope_mut(&mut self, f: &mut dyn FnMut(&mut ScopeObject)) {
        match self {
            LogicalBlock::Empty => {}
            LogicalBlock::Scope(scope) => f(scope),
            LogicalBlock::AndOr { children, .. } => {
                for child in children {
                    child.for_each_scope_mut(f);
                }
            }
        }
    }

    pub fn try_for_each_scope_mut(
        &mut self,
        f: &mut dyn FnMut(&mut ScopeObject) -> crate::errors::Result<()>,
    ) -> crate::errors::Result<()> {
        match self {
            LogicalBlock::Empty => Ok(()),
            LogicalBlock::Scope(scope) => f(scope),
            LogicalBlock::AndOr { children, .. } => {
                for child in children {
                    child.try_for_each_scope_mut(f)?;
                }
                Ok(())
            }
        }
    }

    pub fn try_for_each_scope(
        &self,
        f: &mut dyn FnMut(&ScopeObject) -> crate::errors::Result<()>,
    ) -> crate::errors::Result<()> {
        match self {
            LogicalBlock::Empty => Ok(()),
            LogicalBlock::Scope(scope) => f(scope),
            LogicalBlock::AndOr { children, .. } => {
                for child in children {
                    child.try_for_each_scope(f)?;
                }
                Ok(())
            }
        }
    }

    /// Distinct topology object names referenced in this tree.
    pub fn topology_objects(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.for_each_scope(&mut |scope| {
            names.insert(scope.topology_object.clone());
        });
        names
    }
}

/// One request's worth of query state: built once by the resolvers, refined
/// in ordered passes, then compiled. Never reused across requests.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterCriteria {
    pub domain: String,
    /// AND-combined projections, in encounter order.
    pub targets: Vec<TargetObject>,
    pub scope: LogicalBlock,
}

impl FilterCriteria {
    pub fn new(domain: impl Into<String>) -> FilterCriteria {
        FilterCriteria {
            domain: domain.into(),
            targets: Vec::new(),
            scope: LogicalBlock::Empty,
        }
    }
}
