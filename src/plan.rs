// Copyright (c) The tiespath contributors.
// Licensed under the Apache License, Version 2.0.

//! Plan compiler.
//!
//! Lowers refined [`FilterCriteria`] into a backend-neutral [`QueryPlan`]:
//! a predicate tree, the set of backing tables, join links for association
//! paths, and a projection list. The plan renders as SQL-flavored text but
//! commits to no SQL dialect or executor.

use std::collections::BTreeSet;
use std::fmt;

use log::debug;
use serde::Serialize;

use crate::ast::{
    BooleanOperator, ContainerType, FilterCriteria, Literal, LogicalBlock, QueryFunction,
    ScopeObject, TargetObject, TopologyObjectType,
};
use crate::errors::{Result, TiesPathError};
use crate::schema::{DataType, RelationType, SchemaRegistry, ID_COLUMN};

/// A compiled predicate over the backing tables.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Condition {
    /// Always true; an empty scope lowers to this.
    True,
    Comparison {
        table: String,
        column: String,
        function: QueryFunction,
        literal: Literal,
    },
    And(Vec<Condition>),
    Or(Vec<Condition>),
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::True => write!(f, "TRUE"),
            Condition::Comparison {
                table,
                column,
                function,
                literal,
            } => match function {
                QueryFunction::Eq => {
                    write!(f, "{table}.\"{column}\" = {}", render_literal(literal))
                }
                QueryFunction::Contains => {
                    write!(
                        f,
                        "{table}.\"{column}\" LIKE {}",
                        quote_text(&format!("%{}%", literal.to_text()))
                    )
                }
            },
            Condition::And(children) => write_junction(f, children, " AND "),
            Condition::Or(children) => write_junction(f, children, " OR "),
        }
    }
}

fn write_junction(f: &mut fmt::Formatter<'_>, children: &[Condition], sep: &str) -> fmt::Result {
    write!(f, "(")?;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            write!(f, "{sep}")?;
        }
        write!(f, "{child}")?;
    }
    write!(f, ")")
}

fn render_literal(literal: &Literal) -> String {
    match literal {
        Literal::Text(text) => quote_text(text),
        Literal::Int(n) => n.to_string(),
    }
}

/// Single quotes inside text literals are doubled, the same convention the
/// normalized path uses, so a literal survives the path/plan round trip.
fn quote_text(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// One join link: `relation_table.relation_column = entity_table.entity_column`.
/// Entity tables always join on their primary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Join {
    pub relation_table: String,
    pub relation_column: String,
    pub entity_table: String,
    pub entity_column: String,
}

/// One projected column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Projection {
    pub table: String,
    pub column: String,
}

/// The compiled request: what to select, from where, under which predicate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryPlan {
    pub condition: Condition,
    pub tables: BTreeSet<String>,
    pub joins: Vec<Join>,
    pub selects: Vec<Projection>,
}

/// Compiles refined criteria against the registry snapshot. Criteria must
/// have passed refinement; unresolved names surface as server faults here.
pub fn compile(criteria: &FilterCriteria, registry: &SchemaRegistry) -> Result<QueryPlan> {
    let mut plan = QueryPlan {
        condition: Condition::True,
        tables: BTreeSet::new(),
        joins: Vec::new(),
        selects: Vec::new(),
    };
    for target in &criteria.targets {
        plan.tables.insert(object_table(
            &target.topology_object,
            target.topology_object_type,
            registry,
        )?);
        project_target(&mut plan, target, registry)?;
    }
    criteria.scope.try_for_each_scope(&mut |scope| {
        plan.tables.insert(object_table(
            &scope.topology_object,
            scope.topology_object_type,
            registry,
        )?);
        Ok(())
    })?;
    let condition = lower(&criteria.scope, registry, &mut plan.tables, &mut plan.joins)?;
    plan.condition = condition;
    debug!("compiled plan: {}", plan.condition);
    Ok(plan)
}

fn object_table(
    name: &str,
    object_type: TopologyObjectType,
    registry: &SchemaRegistry,
) -> Result<String> {
    match object_type {
        TopologyObjectType::Entity => registry
            .entity_type_by_name(name)
            .map(|entity| entity.table_name())
            .ok_or_else(|| TiesPathError::internal(format!("Unknown entity type {name}"))),
        TopologyObjectType::Relation => registry
            .relation_type_by_name(name)
            .map(|relation| relation.table_name())
            .ok_or_else(|| TiesPathError::internal(format!("Unknown relationship type {name}"))),
        TopologyObjectType::Undefined => Err(TiesPathError::UndefinedTopologyObjectType(
            name.to_string(),
        )),
    }
}

fn push_select(selects: &mut Vec<Projection>, table: &str, column: impl Into<String>) {
    let projection = Projection {
        table: table.to_string(),
        column: column.into(),
    };
    if !selects.contains(&projection) {
        selects.push(projection);
    }
}

fn push_join(joins: &mut Vec<Join>, join: Join) {
    // Side-stored relationships can produce a table joined to itself on its
    // own key; there is nothing to join then.
    if join.relation_table == join.entity_table && join.relation_column == join.entity_column {
        return;
    }
    if !joins.contains(&join) {
        joins.push(join);
    }
}

fn project_target(
    plan: &mut QueryPlan,
    target: &TargetObject,
    registry: &SchemaRegistry,
) -> Result<()> {
    let object = &target.topology_object;
    let selects = &mut plan.selects;
    match target.topology_object_type {
        TopologyObjectType::Entity => {
            let entity = registry
                .entity_type_by_name(object)
                .ok_or_else(|| TiesPathError::internal(format!("Unknown entity type {object}")))?;
            let table = entity.table_name();
            match target.container {
                None => {
                    push_select(selects, &table, entity.id_column());
                    for attribute in entity.attribute_names() {
                        push_select(selects, &table, attribute);
                    }
                }
                Some(ContainerType::Id) => push_select(selects, &table, entity.id_column()),
                Some(ContainerType::Attributes) => {
                    if target.params.is_empty() {
                        for attribute in entity.attribute_names() {
                            push_select(selects, &table, attribute);
                        }
                    } else {
                        for param in &target.params {
                            push_select(selects, &table, param.clone());
                        }
                    }
                }
                Some(ContainerType::Decorators) => {
                    push_select(selects, &table, entity.decorators_column())
                }
                Some(ContainerType::Classifiers) => {
                    push_select(selects, &table, entity.classifiers_column())
                }
                Some(ContainerType::SourceIds) => {
                    push_select(selects, &table, entity.source_ids_column())
                }
                Some(ContainerType::Association) => {
                    project_entity_association(plan, target, registry)?
                }
            }
        }
        TopologyObjectType::Relation => {
            let relation = registry.relation_type_by_name(object).ok_or_else(|| {
                TiesPathError::internal(format!("Unknown relationship type {object}"))
            })?;
            let table = relation.table_name();
            match target.container {
                None => {
                    push_select(selects, &table, relation.id_column());
                    push_select(selects, &table, relation.a_side_column());
                    push_select(selects, &table, relation.b_side_column());
                    for attribute in relation.attributes.keys() {
                        push_select(selects, &table, attribute.clone());
                    }
                }
                Some(ContainerType::Id) => push_select(selects, &table, relation.id_column()),
                Some(ContainerType::Attributes) => {
                    if target.params.is_empty() {
                        for attribute in relation.attributes.keys() {
                            push_select(selects, &table, attribute.clone());
                        }
                    } else {
                        for param in &target.params {
                            push_select(selects, &table, param.clone());
                        }
                    }
                }
                Some(ContainerType::Decorators) => {
                    push_select(selects, &table, relation.decorators_column())
                }
                Some(ContainerType::Classifiers) => {
                    push_select(selects, &table, relation.classifiers_column())
                }
                Some(ContainerType::SourceIds) => {
                    push_select(selects, &table, relation.source_ids_column())
                }
                Some(ContainerType::Association) => {
                    let relation = relation.clone();
                    project_relation_association(plan, target, &relation, registry)?
                }
            }
        }
        TopologyObjectType::Undefined => {
            return Err(TiesPathError::UndefinedTopologyObjectType(object.clone()));
        }
    }
    Ok(())
}

/// Association targets carry the association name as their first parameter;
/// any further parameters name attributes of the reached entity.
fn project_entity_association(
    plan: &mut QueryPlan,
    target: &TargetObject,
    registry: &SchemaRegistry,
) -> Result<()> {
    let object = &target.topology_object;
    let Some((association, params)) = target.params.split_first() else {
        return Err(TiesPathError::grammar("Missing association name"));
    };
    let relation = registry
        .relation_types()
        .find(|relation| relation.opposite_side_of(object, association).is_some())
        .ok_or_else(|| TiesPathError::InvalidAssociation {
            object: object.clone(),
            association: association.clone(),
        })?;
    let opposite = relation
        .opposite_side_of(object, association)
        .unwrap_or_default()
        .to_string();
    let opposite_table = register_association_joins(
        &mut plan.tables,
        &mut plan.joins,
        object,
        &opposite,
        relation,
        registry,
    )?;
    push_select(&mut plan.selects, &opposite_table, ID_COLUMN);
    for param in params {
        push_select(&mut plan.selects, &opposite_table, param.clone());
    }
    Ok(())
}

fn project_relation_association(
    plan: &mut QueryPlan,
    target: &TargetObject,
    relation: &RelationType,
    registry: &SchemaRegistry,
) -> Result<()> {
    let Some((association, params)) = target.params.split_first() else {
        return Err(TiesPathError::grammar("Missing association name"));
    };
    let side = relation
        .side_of_association(association)
        .ok_or_else(|| TiesPathError::InvalidAssociation {
            object: target.topology_object.clone(),
            association: association.clone(),
        })?
        .to_string();
    let side_table =
        register_side_join(&mut plan.tables, &mut plan.joins, &side, relation, registry)?;
    push_select(&mut plan.selects, &side_table, ID_COLUMN);
    for param in params {
        push_select(&mut plan.selects, &side_table, param.clone());
    }
    Ok(())
}

/// Joins an entity object and the entity its association reaches through the
/// relationship's storing table. Returns the reached entity's table.
fn register_association_joins(
    tables: &mut BTreeSet<String>,
    joins: &mut Vec<Join>,
    object: &str,
    opposite: &str,
    relation: &RelationType,
    registry: &SchemaRegistry,
) -> Result<String> {
    let relation_table = relation.table_name();
    tables.insert(relation_table.clone());
    for entity_name in [object, opposite] {
        let entity = registry
            .entity_type_by_name(entity_name)
            .ok_or_else(|| TiesPathError::internal(format!("Unknown entity type {entity_name}")))?;
        let relation_column = relation.side_column_of(entity_name).ok_or_else(|| {
            TiesPathError::internal(format!("{entity_name} is not a side of {}", relation.name))
        })?;
        tables.insert(entity.table_name());
        push_join(
            joins,
            Join {
                relation_table: relation_table.clone(),
                relation_column,
                entity_table: entity.table_name(),
                entity_column: entity.id_column().to_string(),
            },
        );
    }
    registry
        .entity_type_by_name(opposite)
        .map(|entity| entity.table_name())
        .ok_or_else(|| TiesPathError::internal(format!("Unknown entity type {opposite}")))
}

/// Joins one side entity onto a relationship object's own table. Returns the
/// side entity's table.
fn register_side_join(
    tables: &mut BTreeSet<String>,
    joins: &mut Vec<Join>,
    side: &str,
    relation: &RelationType,
    registry: &SchemaRegistry,
) -> Result<String> {
    let entity = registry
        .entity_type_by_name(side)
        .ok_or_else(|| TiesPathError::internal(format!("Unknown entity type {side}")))?;
    let relation_column = relation.side_column_of(side).ok_or_else(|| {
        TiesPathError::internal(format!("{side} is not a side of {}", relation.name))
    })?;
    tables.insert(relation.table_name());
    tables.insert(entity.table_name());
    push_join(
        joins,
        Join {
            relation_table: relation.table_name(),
            relation_column,
            entity_table: entity.table_name(),
            entity_column: entity.id_column().to_string(),
        },
    );
    Ok(entity.table_name())
}

fn lower(
    block: &LogicalBlock,
    registry: &SchemaRegistry,
    tables: &mut BTreeSet<String>,
    joins: &mut Vec<Join>,
) -> Result<Condition> {
    match block {
        LogicalBlock::Empty => Ok(Condition::True),
        LogicalBlock::Scope(scope) => lower_scope(scope, registry, tables, joins),
        LogicalBlock::AndOr { op, children } => {
            let children = children
                .iter()
                .map(|child| lower(child, registry, tables, joins))
                .collect::<Result<Vec<_>>>()?;
            Ok(match op {
                BooleanOperator::And => Condition::And(children),
                BooleanOperator::Or => Condition::Or(children),
            })
        }
    }
}

fn lower_scope(
    scope: &ScopeObject,
    registry: &SchemaRegistry,
    tables: &mut BTreeSet<String>,
    joins: &mut Vec<Join>,
) -> Result<Condition> {
    let object = &scope.topology_object;
    if scope.container == Some(ContainerType::Association) {
        return lower_association_scope(scope, registry, tables, joins);
    }
    let (table, column) = match scope.topology_object_type {
        TopologyObjectType::Entity => {
            let entity = registry
                .entity_type_by_name(object)
                .ok_or_else(|| TiesPathError::internal(format!("Unknown entity type {object}")))?;
            let column = match scope.container {
                Some(ContainerType::Id) => entity.id_column().to_string(),
                Some(ContainerType::SourceIds) => entity.source_ids_column(),
                Some(ContainerType::Decorators) => entity.decorators_column(),
                Some(ContainerType::Classifiers) => entity.classifiers_column(),
                _ => leaf_column(scope)?,
            };
            (entity.table_name(), column)
        }
        TopologyObjectType::Relation => {
            let relation = registry.relation_type_by_name(object).ok_or_else(|| {
                TiesPathError::internal(format!("Unknown relationship type {object}"))
            })?;
            let column = match scope.container {
                Some(ContainerType::Id) => relation.id_column(),
                Some(ContainerType::SourceIds) => relation.source_ids_column(),
                Some(ContainerType::Decorators) => relation.decorators_column(),
                Some(ContainerType::Classifiers) => relation.classifiers_column(),
                _ => leaf_column(scope)?,
            };
            (relation.table_name(), column)
        }
        TopologyObjectType::Undefined => {
            return Err(TiesPathError::UndefinedTopologyObjectType(object.clone()));
        }
    };
    Ok(Condition::Comparison {
        table,
        column,
        function: scope.query_function,
        literal: scope_literal(scope),
    })
}

/// A condition through an association compares an attribute of the entity the
/// association reaches, joined through the relationship's storing table.
fn lower_association_scope(
    scope: &ScopeObject,
    registry: &SchemaRegistry,
    tables: &mut BTreeSet<String>,
    joins: &mut Vec<Join>,
) -> Result<Condition> {
    let object = &scope.topology_object;
    let association = scope
        .inner_container
        .first()
        .ok_or_else(|| TiesPathError::grammar("Missing association name"))?;
    let table = match scope.topology_object_type {
        TopologyObjectType::Entity => {
            let relation = registry
                .relation_types()
                .find(|relation| relation.opposite_side_of(object, association).is_some())
                .ok_or_else(|| TiesPathError::InvalidAssociation {
                    object: object.clone(),
                    association: association.clone(),
                })?;
            let opposite = relation
                .opposite_side_of(object, association)
                .unwrap_or_default()
                .to_string();
            register_association_joins(tables, joins, object, &opposite, relation, registry)?
        }
        TopologyObjectType::Relation => {
            let relation = registry.relation_type_by_name(object).ok_or_else(|| {
                TiesPathError::internal(format!("Unknown relationship type {object}"))
            })?;
            let side = relation
                .side_of_association(association)
                .ok_or_else(|| TiesPathError::InvalidAssociation {
                    object: object.clone(),
                    association: association.clone(),
                })?
                .to_string();
            register_side_join(tables, joins, &side, relation, registry)?
        }
        TopologyObjectType::Undefined => {
            return Err(TiesPathError::UndefinedTopologyObjectType(object.clone()));
        }
    };
    Ok(Condition::Comparison {
        table,
        column: leaf_column(scope)?,
        function: scope.query_function,
        literal: scope_literal(scope),
    })
}

fn leaf_column(scope: &ScopeObject) -> Result<String> {
    scope
        .leaf
        .clone()
        .ok_or_else(|| TiesPathError::internal("Scope condition without a leaf"))
}

fn scope_literal(scope: &ScopeObject) -> Literal {
    match scope.data_type {
        DataType::Bigint | DataType::Decimal => scope
            .parameter
            .parse::<i64>()
            .map_or_else(|_| Literal::Text(scope.parameter.clone()), Literal::Int),
        _ => Literal::Text(scope.parameter.clone()),
    }
}
