// Copyright (c) The tiespath contributors.
// Licensed under the Apache License, Version 2.0.

//! The engine façade: one entry point running resolve, refine and compile.

use std::sync::Arc;

use log::debug;

use crate::ast::FilterCriteria;
use crate::errors::Result;
use crate::plan::{self, QueryPlan};
use crate::refiner;
use crate::resolver::{PathResolver, ScopeResolver, TargetResolver};
use crate::schema::SchemaRegistry;

/// A query engine over one schema registry snapshot.
///
/// The engine holds the snapshot behind an `Arc`; a schema reload swaps in a
/// fresh snapshot via [`Engine::set_registry`] without disturbing requests
/// already running against the old one. Each request is processed on the
/// calling thread with no shared mutable state.
#[derive(Debug, Clone)]
pub struct Engine {
    registry: Arc<SchemaRegistry>,
}

impl Engine {
    pub fn new(registry: Arc<SchemaRegistry>) -> Engine {
        Engine { registry }
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    /// Publishes a new registry snapshot for subsequent requests.
    pub fn set_registry(&mut self, registry: Arc<SchemaRegistry>) {
        self.registry = registry;
    }

    /// Resolves and refines the two filter strings into checked criteria.
    pub fn criteria(
        &self,
        domain: &str,
        root_object: &str,
        target_filter: &str,
        scope_filter: &str,
    ) -> Result<FilterCriteria> {
        debug!(
            "resolving domain={domain} root={root_object} target={target_filter} scope={scope_filter}"
        );
        let mut criteria = FilterCriteria::new(domain);
        criteria.targets = TargetResolver.resolve(root_object, target_filter)?;
        criteria.scope = ScopeResolver.resolve(root_object, scope_filter)?;
        refiner::refine(criteria, &self.registry)
    }

    /// Compiles the two filter strings into a query plan.
    pub fn plan(
        &self,
        domain: &str,
        root_object: &str,
        target_filter: &str,
        scope_filter: &str,
    ) -> Result<QueryPlan> {
        let criteria = self.criteria(domain, root_object, target_filter, scope_filter)?;
        plan::compile(&criteria, &self.registry)
    }
}
