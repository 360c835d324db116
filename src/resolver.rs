// Copyright (c) The tiespath contributors.
// Licensed under the Apache License, Version 2.0.

//! Resolvers turning raw filter strings into the inner language.
//!
//! The target filter becomes an ordered list of [`TargetObject`] projections;
//! the scope filter becomes a [`LogicalBlock`] predicate tree. Both share the
//! root-object and container rules of the path grammar.

use log::error;

use crate::ast::{
    ContainerType, LogicalBlock, QueryFunction, ScopeObject, TargetObject, WILDCARD,
};
use crate::errors::{Result, TiesPathError};
use crate::parser::{parse_fragment, TiesPathQuery};
use crate::schema::DataType;

/// A resolver for one side of the request: target or scope.
pub trait PathResolver {
    type Output;

    /// Resolves a filter string against the root-object hint. Never silently
    /// defaults: malformed input fails with a grammar error.
    fn resolve(&self, root_object: &str, filter: &str) -> Result<Self::Output>;
}

fn is_root_empty(root_object: &str) -> bool {
    root_object.is_empty()
}

/// The topology object a fragment addresses, given its container names.
/// At most two container levels are allowed in any fragment.
fn topology_object(root_object: &str, container_names: &[String]) -> Result<String> {
    match container_names.len() {
        n if n > 2 => Err(TiesPathError::grammar(
            "More than two level deep path is not allowed",
        )),
        2 => {
            let first = &container_names[0];
            if is_root_empty(root_object) || first == root_object {
                Ok(first.clone())
            } else {
                Err(TiesPathError::grammar(
                    "Target filter can only contain Root Object types mentioned in the path parameter",
                ))
            }
        }
        _ => Ok(if is_root_empty(root_object) {
            WILDCARD.to_string()
        } else {
            root_object.to_string()
        }),
    }
}

fn container_type(container_names: &[String]) -> Option<ContainerType> {
    container_names
        .last()
        .and_then(|name| ContainerType::from_keyword(name))
}

/// Splits on `sep` at the top level, leaving quoted literals intact.
fn split_top_level(filter: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    for ch in filter.chars() {
        match quote {
            Some(q) => {
                if ch == q {
                    quote = None;
                }
                current.push(ch);
            }
            None if ch == '\'' || ch == '"' => {
                quote = Some(ch);
                current.push(ch);
            }
            None if ch == sep => {
                parts.push(core::mem::take(&mut current));
            }
            None => current.push(ch),
        }
    }
    parts.push(current);
    parts
}

fn tokenize(fragment: &str) -> Result<TiesPathQuery> {
    let query = parse_fragment(fragment).inspect_err(|e| {
        error!("parsing error on fragment {fragment}: {e}");
    })?;
    if query.container_names.is_empty() {
        // Unreachable with a correct tokenizer; reported as a server fault.
        return Err(TiesPathError::internal(
            "Requested query could not be processed",
        ));
    }
    Ok(query)
}

/// Resolves a target filter into an ordered projection list.
#[derive(Debug, Default)]
pub struct TargetResolver;

impl PathResolver for TargetResolver {
    type Output = Vec<TargetObject>;

    fn resolve(&self, root_object: &str, filter: &str) -> Result<Vec<TargetObject>> {
        if filter.contains('|') {
            return Err(TiesPathError::grammar(
                "OR (|) is not supported for target filter",
            ));
        }
        if filter.is_empty() {
            let object = if is_root_empty(root_object) {
                WILDCARD
            } else {
                root_object
            };
            return Ok(vec![TargetObject::new(object)]);
        }
        let mut targets = Vec::new();
        for token in filter.split(';') {
            let query = tokenize(token)?;
            if query.has_leaf_conditions() || query.has_contains_condition() {
                return Err(TiesPathError::grammar(
                    "Condition of parameter(s) is not supported for target filter",
                ));
            }
            match container_type(&query.container_names) {
                Some(container) => {
                    targets.push(
                        TargetObject::new(topology_object(root_object, &query.container_names)?)
                            .with_container(container)
                            .with_params(query.attribute_names),
                    );
                }
                None => targets.push(whole_object_target(root_object, &query)?),
            }
        }
        Ok(targets)
    }
}

/// A fragment whose last segment is no container keyword projects the whole
/// object; it must be a single segment naming the root object.
fn whole_object_target(root_object: &str, query: &TiesPathQuery) -> Result<TargetObject> {
    let names = &query.container_names;
    if names.len() == 1 && (is_root_empty(root_object) || names[0] == root_object) {
        if !query.attribute_names.is_empty() {
            return Err(TiesPathError::grammar(
                "Attributes cannot be associated at this level",
            ));
        }
        return Ok(TargetObject::new(names[0].clone()));
    }
    Err(TiesPathError::grammar(
        "Invalid Container name or Root Object name does not match to the path parameter",
    ))
}

/// Resolves a scope filter into a predicate tree: `|` separates OR
/// alternatives, `;` AND terms, conditions within one fragment are AND-only.
#[derive(Debug, Default)]
pub struct ScopeResolver;

impl PathResolver for ScopeResolver {
    type Output = LogicalBlock;

    fn resolve(&self, root_object: &str, filter: &str) -> Result<LogicalBlock> {
        if filter.is_empty() {
            return Ok(LogicalBlock::Empty);
        }
        let mut alternatives = Vec::new();
        for alternative in split_top_level(filter, '|') {
            let mut terms = Vec::new();
            for token in split_top_level(&alternative, ';') {
                let token = token.trim();
                if token.is_empty() {
                    return Err(TiesPathError::grammar("Empty scope filter token"));
                }
                terms.push(scope_block(root_object, token)?);
            }
            alternatives.push(LogicalBlock::and(terms));
        }
        Ok(LogicalBlock::or(alternatives))
    }
}

fn scope_block(root_object: &str, token: &str) -> Result<LogicalBlock> {
    let query = tokenize(token)?;
    let (object, container, inner) = scope_container(root_object, &query.container_names)?;

    let mut leaves = Vec::new();
    for data_leaf in &query.leaves_data {
        leaves.push(LogicalBlock::Scope(
            ScopeObject::new(
                object.clone(),
                container,
                Some(&data_leaf.name),
                QueryFunction::Eq,
                data_leaf.value.to_text(),
                data_leaf.value.default_data_type(),
            )
            .with_inner_container(inner.clone()),
        ));
    }
    if let Some((leaf, value)) = &query.contains_condition {
        leaves.push(LogicalBlock::Scope(
            ScopeObject::new(
                object,
                container,
                Some(leaf),
                QueryFunction::Contains,
                value.clone(),
                DataType::Primitive,
            )
            .with_inner_container(inner),
        ));
    }
    if leaves.is_empty() {
        return Err(TiesPathError::grammar(
            "Scope filter token must contain a condition",
        ));
    }
    Ok(LogicalBlock::and(leaves))
}

/// Resolves the container of a scope fragment. A second-level segment that is
/// no container keyword names an association role, e.g.
/// `/GNBDUFunction/provided-nrCellDu[@nCI=1]`.
fn scope_container(
    root_object: &str,
    container_names: &[String],
) -> Result<(String, ContainerType, Vec<String>)> {
    if let Some(container) = container_type(container_names) {
        let object = topology_object(root_object, container_names)?;
        return Ok((object, container, Vec::new()));
    }
    match container_names.len() {
        2 => {
            let first = &container_names[0];
            if is_root_empty(root_object) || first == root_object {
                Ok((
                    first.clone(),
                    ContainerType::Association,
                    vec![container_names[1].clone()],
                ))
            } else {
                Err(TiesPathError::grammar(
                    "Target filter can only contain Root Object types mentioned in the path parameter",
                ))
            }
        }
        1 => {
            // Conditions on a bare object address its attributes.
            let object = if is_root_empty(root_object) || container_names[0] == root_object {
                container_names[0].clone()
            } else {
                return Err(TiesPathError::grammar(
                    "Invalid Container name or Root Object name does not match to the path parameter",
                ));
            };
            Ok((object, ContainerType::Attributes, Vec::new()))
        }
        _ => Err(TiesPathError::grammar(
            "More than two level deep path is not allowed",
        )),
    }
}
