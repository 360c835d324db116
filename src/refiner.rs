// Copyright (c) The tiespath contributors.
// Licensed under the Apache License, Version 2.0.

//! Refinement pipeline.
//!
//! Takes the resolvers' raw [`FilterCriteria`] and produces a fully typed,
//! schema-checked one. Passes run in a fixed order and fail fast; each is a
//! pure function of the criteria and the registry snapshot.

use std::collections::BTreeSet;

use log::trace;

use crate::ast::{
    BooleanOperator, ContainerType, FilterCriteria, LogicalBlock, ScopeObject, TargetObject,
    TopologyObjectType, ITEMS, WILDCARD,
};
use crate::errors::{Result, TiesPathError};
use crate::schema::{DataType, RelationType, SchemaRegistry};

/// Runs all refinement passes over the criteria:
/// wildcard resolution, topology-object-type resolution, container and
/// parameter validation, target/scope consistency, and reduction of the
/// scope tree to its satisfiable part.
pub fn refine(criteria: FilterCriteria, registry: &SchemaRegistry) -> Result<FilterCriteria> {
    let mut criteria = resolve_wildcard_objects(criteria, registry)?;
    resolve_topology_object_types(&mut criteria, registry)?;
    validate_containers(&criteria, registry)?;
    check_target_matches_scope(&criteria)?;
    if !criteria.scope.is_empty() {
        let scope = core::mem::replace(&mut criteria.scope, LogicalBlock::Empty);
        criteria.scope = reduce(scope, &|scope_object| {
            literal_matches_declared_type(scope_object, registry)
        })
        .ok_or(TiesPathError::UnmatchableScope)?;
    }
    trace!("refined criteria: {criteria:?}");
    Ok(criteria)
}

/// Substitutes every `*` topology object with the concrete type(s) it can
/// stand for. Candidates start from the names the rest of the request already
/// mentions; when the request mentions none, the whole domain vocabulary is in
/// play. Candidates must declare whatever the wildcard object demands of them
/// (projection parameters, condition leaf, association name). One match
/// substitutes in place, several fan out (extra targets, `Or` node of scope
/// clones), none is an error.
fn resolve_wildcard_objects(
    mut criteria: FilterCriteria,
    registry: &SchemaRegistry,
) -> Result<FilterCriteria> {
    let vocabulary: BTreeSet<String> = registry
        .entity_names_by_domain(&criteria.domain)?
        .into_iter()
        .chain(registry.relation_names_by_domain(&criteria.domain)?)
        .collect();

    let mut mentioned: BTreeSet<String> = criteria
        .targets
        .iter()
        .map(|t| t.topology_object.clone())
        .chain(criteria.scope.topology_objects())
        .filter(|name| name != WILDCARD)
        .collect();
    mentioned.retain(|name| vocabulary.contains(name));
    let candidates: Vec<String> = if mentioned.is_empty() {
        vocabulary.into_iter().collect()
    } else {
        mentioned.into_iter().collect()
    };

    let mut targets = Vec::new();
    for target in criteria.targets {
        if target.topology_object != WILDCARD {
            targets.push(target);
            continue;
        }
        let matching: Vec<&String> = candidates
            .iter()
            .filter(|candidate| target_candidate_matches(&target, candidate, registry))
            .collect();
        if matching.is_empty() {
            return Err(TiesPathError::InvalidTopologyObject(WILDCARD.to_string()));
        }
        for candidate in matching {
            let mut resolved = target.clone();
            resolved.topology_object = candidate.clone();
            targets.push(resolved);
        }
    }
    criteria.targets = targets;
    criteria.scope = resolve_wildcards_in_scope(criteria.scope, &candidates, registry)?;
    Ok(criteria)
}

fn resolve_wildcards_in_scope(
    block: LogicalBlock,
    candidates: &[String],
    registry: &SchemaRegistry,
) -> Result<LogicalBlock> {
    match block {
        LogicalBlock::Empty => Ok(LogicalBlock::Empty),
        LogicalBlock::Scope(scope) if scope.topology_object == WILDCARD => {
            let matching: Vec<&String> = candidates
                .iter()
                .filter(|candidate| scope_candidate_matches(&scope, candidate, registry))
                .collect();
            if matching.is_empty() {
                return Err(TiesPathError::InvalidTopologyObject(WILDCARD.to_string()));
            }
            Ok(LogicalBlock::or(
                matching
                    .into_iter()
                    .map(|candidate| {
                        let mut resolved = scope.clone();
                        resolved.topology_object = candidate.clone();
                        LogicalBlock::Scope(resolved)
                    })
                    .collect(),
            ))
        }
        LogicalBlock::Scope(scope) => Ok(LogicalBlock::Scope(scope)),
        LogicalBlock::AndOr { op, children } => {
            let children = children
                .into_iter()
                .map(|child| resolve_wildcards_in_scope(child, candidates, registry))
                .collect::<Result<Vec<_>>>()?;
            Ok(LogicalBlock::AndOr { op, children })
        }
    }
}

fn target_candidate_matches(
    target: &TargetObject,
    candidate: &str,
    registry: &SchemaRegistry,
) -> bool {
    match target.container {
        Some(ContainerType::Attributes) => {
            declares_attributes(registry, candidate, &target.params)
        }
        Some(ContainerType::Association) => match target.params.first() {
            Some(association) => has_association_path(registry, candidate, association),
            None => true,
        },
        _ => true,
    }
}

fn scope_candidate_matches(
    scope: &ScopeObject,
    candidate: &str,
    registry: &SchemaRegistry,
) -> bool {
    match scope.container {
        Some(ContainerType::Attributes) => match &scope.leaf {
            Some(leaf) => declares_attributes(registry, candidate, core::slice::from_ref(leaf)),
            None => true,
        },
        Some(ContainerType::Association) => match scope.inner_container.first() {
            Some(association) => has_association_path(registry, candidate, association),
            None => true,
        },
        _ => true,
    }
}

fn declares_attributes(registry: &SchemaRegistry, name: &str, params: &[String]) -> bool {
    if let Some(entity) = registry.entity_type_by_name(name) {
        params.iter().all(|param| entity.has_attribute(param))
    } else if let Some(relation) = registry.relation_type_by_name(name) {
        params.iter().all(|param| relation.has_attribute(param))
    } else {
        false
    }
}

/// Whether `name` can be followed by `association`: a relationship type
/// carrying the association on either side, or an entity reached by it.
fn has_association_path(registry: &SchemaRegistry, name: &str, association: &str) -> bool {
    if let Some(relation) = registry.relation_type_by_name(name) {
        relation.has_association(association)
    } else {
        registry
            .relation_types()
            .any(|relation| relation.opposite_side_of(name, association).is_some())
    }
}

/// Assigns `Entity` or `Relation` to every object still typed `Undefined`.
/// A name matching both vocabularies is ambiguous, a name matching neither is
/// invalid; already-resolved objects are left untouched.
fn resolve_topology_object_types(
    criteria: &mut FilterCriteria,
    registry: &SchemaRegistry,
) -> Result<()> {
    let entities = registry.entity_names_by_domain(&criteria.domain)?;
    let relations = registry.relation_names_by_domain(&criteria.domain)?;
    let resolve = |name: &str| -> Result<TopologyObjectType> {
        match (
            entities.iter().any(|e| e == name),
            relations.iter().any(|r| r == name),
        ) {
            (true, true) => Err(TiesPathError::AmbiguousTopologyObject(name.to_string())),
            (true, false) => Ok(TopologyObjectType::Entity),
            (false, true) => Ok(TopologyObjectType::Relation),
            (false, false) => Err(TiesPathError::InvalidTopologyObject(name.to_string())),
        }
    };
    for target in &mut criteria.targets {
        if target.topology_object_type == TopologyObjectType::Undefined {
            target.topology_object_type = resolve(&target.topology_object)?;
        }
    }
    criteria.scope.try_for_each_scope_mut(&mut |scope| {
        if scope.topology_object_type == TopologyObjectType::Undefined {
            scope.topology_object_type = resolve(&scope.topology_object)?;
        }
        Ok(())
    })
}

/// Checks every container against the schema: projection parameters must be
/// declared attributes, `sourceIds` only accepts the reserved `items`
/// parameter, association names must exist on the addressed object.
fn validate_containers(criteria: &FilterCriteria, registry: &SchemaRegistry) -> Result<()> {
    for target in &criteria.targets {
        // For association targets the first parameter is the association name.
        let (inner, params) = match target.container {
            Some(ContainerType::Association) if !target.params.is_empty() => {
                target.params.split_at(1)
            }
            _ => (&[][..], &target.params[..]),
        };
        validate_container(
            target.container,
            params,
            &target.topology_object,
            target.topology_object_type,
            inner,
            registry,
        )?;
    }
    criteria.scope.try_for_each_scope(&mut |scope| {
        let leaf: Vec<String> = scope.leaf.iter().cloned().collect();
        validate_container(
            scope.container,
            &leaf,
            &scope.topology_object,
            scope.topology_object_type,
            &scope.inner_container,
            registry,
        )
    })
}

fn validate_container(
    container: Option<ContainerType>,
    params: &[String],
    topology_object: &str,
    topology_object_type: TopologyObjectType,
    inner_container: &[String],
    registry: &SchemaRegistry,
) -> Result<()> {
    match container {
        Some(ContainerType::Id) => {
            if !params.is_empty() {
                return Err(TiesPathError::grammar(
                    "Adding parameters for id container is not supported",
                ));
            }
            Ok(())
        }
        Some(ContainerType::Attributes) => {
            check_attributes(params, topology_object, topology_object_type, registry)
        }
        Some(ContainerType::SourceIds) => {
            if params.iter().any(|param| param != ITEMS) {
                return Err(TiesPathError::InvalidSourceIdParameter(
                    topology_object.to_string(),
                ));
            }
            Ok(())
        }
        Some(ContainerType::Association) => check_association(
            params,
            topology_object,
            topology_object_type,
            inner_container,
            registry,
        ),
        _ => Ok(()),
    }
}

fn check_attributes(
    params: &[String],
    topology_object: &str,
    topology_object_type: TopologyObjectType,
    registry: &SchemaRegistry,
) -> Result<()> {
    let not_matching: Vec<String> = match topology_object_type {
        TopologyObjectType::Entity => {
            let entity = registry
                .entity_type_by_name(topology_object)
                .ok_or_else(|| TiesPathError::internal(format!("Unknown entity type {topology_object}")))?;
            params
                .iter()
                .filter(|param| !entity.has_attribute(param))
                .cloned()
                .collect()
        }
        TopologyObjectType::Relation => {
            let relation = registry
                .relation_type_by_name(topology_object)
                .ok_or_else(|| TiesPathError::internal(format!("Unknown relationship type {topology_object}")))?;
            params
                .iter()
                .filter(|param| !relation.has_attribute(param))
                .cloned()
                .collect()
        }
        TopologyObjectType::Undefined => Vec::new(),
    };
    if not_matching.is_empty() {
        Ok(())
    } else {
        Err(TiesPathError::InvalidAttributes {
            object: topology_object.to_string(),
            params: not_matching,
        })
    }
}

fn check_association(
    params: &[String],
    topology_object: &str,
    topology_object_type: TopologyObjectType,
    inner_container: &[String],
    registry: &SchemaRegistry,
) -> Result<()> {
    let Some(association) = inner_container.first() else {
        return Err(TiesPathError::grammar("Missing association name"));
    };
    let relation = match topology_object_type {
        TopologyObjectType::Entity => {
            let mut matching = registry.relation_types().filter(|relation| {
                relation
                    .opposite_side_of(topology_object, association)
                    .is_some()
            });
            // Exactly one relationship type may declare this association for
            // the entity; zero or several make the name unusable.
            match (matching.next(), matching.next()) {
                (Some(relation), None) => relation,
                _ => {
                    return Err(TiesPathError::InvalidAssociation {
                        object: topology_object.to_string(),
                        association: association.clone(),
                    })
                }
            }
        }
        TopologyObjectType::Relation => {
            let relation = registry
                .relation_type_by_name(topology_object)
                .ok_or_else(|| TiesPathError::internal(format!("Unknown relationship type {topology_object}")))?;
            if !relation.has_association(association) {
                return Err(TiesPathError::InvalidAssociation {
                    object: topology_object.to_string(),
                    association: association.clone(),
                });
            }
            relation
        }
        TopologyObjectType::Undefined => {
            return Err(TiesPathError::UndefinedTopologyObjectType(
                topology_object.to_string(),
            ));
        }
    };
    if !params.is_empty() {
        check_params_for_association(relation, association, params, registry)?;
    }
    Ok(())
}

/// Parameters of an association address attributes of the entity the
/// association points at.
fn check_params_for_association(
    relation: &RelationType,
    association: &str,
    params: &[String],
    registry: &SchemaRegistry,
) -> Result<()> {
    let valid = relation
        .side_of_association(association)
        .and_then(|side| registry.entity_type_by_name(side))
        .is_some_and(|entity| params.iter().all(|param| entity.has_attribute(param)));
    if valid {
        Ok(())
    } else {
        Err(TiesPathError::InvalidParamsForAssociation(
            association.to_string(),
        ))
    }
}

/// The topology objects named by the scope must be exactly the ones named by
/// the targets. Skipped when either side names none.
fn check_target_matches_scope(criteria: &FilterCriteria) -> Result<()> {
    if criteria.scope.is_empty() || criteria.targets.is_empty() {
        return Ok(());
    }
    let target_objects: BTreeSet<String> = criteria
        .targets
        .iter()
        .map(|t| t.topology_object.clone())
        .collect();
    if target_objects == criteria.scope.topology_objects() {
        Ok(())
    } else {
        Err(TiesPathError::NotMatchingScopeAndTargetFilter)
    }
}

/// Screens a scope leaf against the declared type of the column it addresses.
/// A literal that cannot be read as that type can never match any row, so the
/// leaf is unsatisfiable rather than erroneous.
fn literal_matches_declared_type(scope: &ScopeObject, registry: &SchemaRegistry) -> bool {
    if scope.container != Some(ContainerType::Attributes) {
        return true;
    }
    let Some(leaf) = &scope.leaf else {
        return true;
    };
    let declared = match scope.topology_object_type {
        TopologyObjectType::Entity => registry
            .entity_type_by_name(&scope.topology_object)
            .and_then(|entity| entity.attribute_type(leaf)),
        TopologyObjectType::Relation => registry
            .relation_type_by_name(&scope.topology_object)
            .and_then(|relation| relation.attribute_type(leaf)),
        TopologyObjectType::Undefined => None,
    };
    match declared {
        Some(DataType::Bigint) => scope.parameter.parse::<i64>().is_ok(),
        Some(DataType::Decimal) => scope.parameter.parse::<f64>().is_ok(),
        _ => true,
    }
}

/// Rewrites the tree to its satisfiable part. An `And` with an unsatisfiable
/// child is itself unsatisfiable; an `Or` keeps its surviving children and a
/// single survivor replaces the node. `None` means nothing survived.
pub fn reduce(
    block: LogicalBlock,
    is_valid: &dyn Fn(&ScopeObject) -> bool,
) -> Option<LogicalBlock> {
    match block {
        LogicalBlock::Empty => Some(LogicalBlock::Empty),
        LogicalBlock::Scope(scope) => is_valid(&scope).then(|| LogicalBlock::Scope(scope)),
        LogicalBlock::AndOr {
            op: BooleanOperator::And,
            children,
        } => children
            .into_iter()
            .map(|child| reduce(child, is_valid))
            .collect::<Option<Vec<_>>>()
            .map(LogicalBlock::and),
        LogicalBlock::AndOr {
            op: BooleanOperator::Or,
            children,
        } => {
            let survivors: Vec<LogicalBlock> = children
                .into_iter()
                .filter_map(|child| reduce(child, is_valid))
                .collect();
            if survivors.is_empty() {
                None
            } else {
                Some(LogicalBlock::or(survivors))
            }
        }
    }
}
