// Copyright (c) The tiespath contributors.
// Licensed under the Apache License, Version 2.0.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use tiespath::*;

fn registry() -> Result<SchemaRegistry> {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut gnbdu_attributes = BTreeMap::new();
    gnbdu_attributes.insert("fdn".to_string(), DataType::Primitive);
    gnbdu_attributes.insert("gNBId".to_string(), DataType::Bigint);
    gnbdu_attributes.insert("gNBIdLength".to_string(), DataType::Bigint);

    let mut cell_attributes = BTreeMap::new();
    cell_attributes.insert("fdn".to_string(), DataType::Primitive);
    cell_attributes.insert("nCI".to_string(), DataType::Bigint);

    let registry = SchemaRegistry::builder()
        .add_module(Module {
            name: "ran-logical".to_string(),
            namespace: "urn:topology:ran-logical".to_string(),
            domain: "RAN_LOGICAL".to_string(),
            included_modules: Vec::new(),
        })
        .add_entity(EntityType {
            name: "GNBDUFunction".to_string(),
            module: "ran-logical".to_string(),
            attributes: gnbdu_attributes,
        })
        .add_entity(EntityType {
            name: "NRCellDU".to_string(),
            module: "ran-logical".to_string(),
            attributes: cell_attributes,
        })
        .add_relation(RelationType {
            name: "GNBDUFUNCTION_PROVIDES_NRCELLDU".to_string(),
            module: "ran-logical".to_string(),
            a_side: "GNBDUFunction".to_string(),
            a_side_association: Association::new("provided-nrCellDu", 1, 1),
            b_side: "NRCellDU".to_string(),
            b_side_association: Association::new("provided-by-gnbduFunction", 0, u64::MAX),
            attributes: BTreeMap::new(),
            connects_same_entity: false,
            storage_location: RelationshipDataLocation::BSide,
        })
        .build()?;
    Ok(registry)
}

fn engine() -> Result<Engine> {
    Ok(Engine::new(Arc::new(registry()?)))
}

#[test]
fn plan_projects_and_filters() -> Result<()> {
    let engine = engine()?;
    let plan = engine.plan(
        "RAN_LOGICAL",
        "GNBDUFunction",
        "/attributes(fdn, gNBId)",
        "/attributes[@gNBId=4000000]",
    )?;
    assert_eq!(
        plan.condition.to_string(),
        "ties_data.\"GNBDUFunction\".\"gNBId\" = 4000000"
    );
    let columns: Vec<&str> = plan.selects.iter().map(|s| s.column.as_str()).collect();
    assert_eq!(columns, vec!["fdn", "gNBId"]);
    assert!(plan.tables.contains("ties_data.\"GNBDUFunction\""));
    assert!(plan.joins.is_empty());
    Ok(())
}

#[test]
fn whole_object_query_needs_no_filters() -> Result<()> {
    let engine = engine()?;
    let plan = engine.plan("RAN_LOGICAL", "NRCellDU", "", "")?;
    assert_eq!(plan.condition, Condition::True);
    let columns: Vec<&str> = plan.selects.iter().map(|s| s.column.as_str()).collect();
    assert_eq!(columns, vec!["id", "fdn", "nCI"]);
    Ok(())
}

#[test]
fn association_scope_joins_to_the_reached_entity() -> Result<()> {
    let engine = engine()?;
    let plan = engine.plan(
        "RAN_LOGICAL",
        "",
        "/NRCellDU",
        "/NRCellDU/provided-nrCellDu[@gNBId=1]",
    )?;
    assert_eq!(
        plan.condition.to_string(),
        "ties_data.\"GNBDUFunction\".\"gNBId\" = 1"
    );
    assert_eq!(plan.joins.len(), 1);
    assert_eq!(plan.joins[0].relation_table, "ties_data.\"NRCellDU\"");
    assert_eq!(plan.joins[0].entity_table, "ties_data.\"GNBDUFunction\"");
    Ok(())
}

#[test]
fn invalid_attribute_is_a_client_error() -> Result<()> {
    let engine = engine()?;
    let err = engine
        .plan("RAN_LOGICAL", "GNBDUFunction", "/attributes(enbId)", "")
        .unwrap_err();
    assert_eq!(err.to_string(), "enbId is not a valid attribute of GNBDUFunction");
    assert_eq!(err.status(), StatusClass::BadRequest);
    Ok(())
}

#[test]
fn grammar_errors_carry_the_position() -> Result<()> {
    let engine = engine()?;
    let err = engine
        .plan("RAN_LOGICAL", "GNBDUFunction", "attributes", "")
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "no viable alternative at input 'attributes' at line 1:0"
    );
    assert_eq!(err.message(), "Grammar error");
    Ok(())
}

#[test]
fn unsatisfiable_or_branches_are_pruned() -> Result<()> {
    let engine = engine()?;
    let plan = engine.plan(
        "RAN_LOGICAL",
        "GNBDUFunction",
        "/GNBDUFunction",
        "/attributes[@gNBId='abc']|/attributes[@gNBIdLength=2]",
    )?;
    assert_eq!(
        plan.condition.to_string(),
        "ties_data.\"GNBDUFunction\".\"gNBIdLength\" = 2"
    );
    Ok(())
}

#[test]
fn fully_unsatisfiable_scope_is_rejected() -> Result<()> {
    let engine = engine()?;
    let err = engine
        .plan(
            "RAN_LOGICAL",
            "GNBDUFunction",
            "/GNBDUFunction",
            "/attributes[@gNBId='abc']",
        )
        .unwrap_err();
    assert_eq!(err, TiesPathError::UnmatchableScope);
    Ok(())
}

#[test]
fn unknown_domain_is_rejected_up_front() -> Result<()> {
    let engine = engine()?;
    let err = engine.plan("CLOUD", "GNBDUFunction", "", "").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Unknown domain CLOUD, available domains: RAN_LOGICAL"
    );
    Ok(())
}

#[test]
fn target_and_scope_objects_must_match() -> Result<()> {
    let engine = engine()?;
    let err = engine
        .plan("RAN_LOGICAL", "", "/GNBDUFunction", "/NRCellDU[@nCI=1]")
        .unwrap_err();
    assert_eq!(err, TiesPathError::NotMatchingScopeAndTargetFilter);
    Ok(())
}

#[test]
fn registry_swap_does_not_disturb_existing_clones() -> Result<()> {
    let mut engine = engine()?;
    let before = engine.clone();

    let reduced = SchemaRegistry::builder()
        .add_module(Module {
            name: "ran-logical".to_string(),
            namespace: "urn:topology:ran-logical".to_string(),
            domain: "RAN_LOGICAL".to_string(),
            included_modules: Vec::new(),
        })
        .build()?;
    engine.set_registry(Arc::new(reduced));

    assert!(before.plan("RAN_LOGICAL", "NRCellDU", "", "").is_ok());
    assert!(engine.plan("RAN_LOGICAL", "NRCellDU", "", "").is_err());
    Ok(())
}
