// Copyright (c) The tiespath contributors.
// Licensed under the Apache License, Version 2.0.

use anyhow::Result;

use super::common;
use crate::plan::Join;
use crate::{
    compile, Condition, FilterCriteria, PathResolver, Projection, QueryPlan, ScopeResolver,
    SchemaRegistry, TargetResolver, TiesPathError,
};

fn planned(
    registry: &SchemaRegistry,
    domain: &str,
    root: &str,
    target: &str,
    scope: &str,
) -> Result<QueryPlan, TiesPathError> {
    let mut criteria = FilterCriteria::new(domain);
    criteria.targets = TargetResolver.resolve(root, target)?;
    criteria.scope = ScopeResolver.resolve(root, scope)?;
    let criteria = crate::refine(criteria, registry)?;
    compile(&criteria, registry)
}

fn select(table: &str, column: &str) -> Projection {
    Projection {
        table: table.to_string(),
        column: column.to_string(),
    }
}

#[test]
fn attribute_condition_compiles_to_a_comparison() -> Result<()> {
    let registry = common::ran_registry();
    let plan = planned(
        &registry,
        "RAN_LOGICAL",
        "GNBDUFunction",
        "/attributes(gNBId)",
        "/attributes[@gNBId=4000000]",
    )?;
    assert_eq!(
        plan.condition.to_string(),
        "ties_data.\"GNBDUFunction\".\"gNBId\" = 4000000"
    );
    assert!(plan.tables.contains("ties_data.\"GNBDUFunction\""));
    assert_eq!(
        plan.selects,
        vec![select("ties_data.\"GNBDUFunction\"", "gNBId")]
    );
    Ok(())
}

#[test]
fn empty_scope_compiles_to_true() -> Result<()> {
    let registry = common::ran_registry();
    let plan = planned(&registry, "RAN_LOGICAL", "GNBDUFunction", "/id", "")?;
    assert_eq!(plan.condition, Condition::True);
    assert_eq!(plan.condition.to_string(), "TRUE");
    assert_eq!(plan.selects, vec![select("ties_data.\"GNBDUFunction\"", "id")]);
    Ok(())
}

#[test]
fn whole_object_projects_id_and_all_attributes() -> Result<()> {
    let registry = common::ran_registry();
    let plan = planned(&registry, "RAN_LOGICAL", "NRSectorCarrier", "", "")?;
    let table = "ties_data.\"NRSectorCarrier\"";
    assert_eq!(
        plan.selects,
        vec![
            select(table, "id"),
            select(table, "arfcnDL"),
            select(table, "arfcnUL"),
            select(table, "fdn"),
            select(table, "frequencyDL"),
            select(table, "frequencyUL"),
        ]
    );
    Ok(())
}

#[test]
fn and_or_structure_renders_with_parentheses() -> Result<()> {
    let registry = common::ran_registry();
    let plan = planned(
        &registry,
        "RAN_LOGICAL",
        "GNBDUFunction",
        "/GNBDUFunction",
        "/attributes[@gNBId=1];/attributes[@gNBIdLength=2]|/attributes[@gNBId=3]",
    )?;
    assert_eq!(
        plan.condition.to_string(),
        "((ties_data.\"GNBDUFunction\".\"gNBId\" = 1 AND \
         ties_data.\"GNBDUFunction\".\"gNBIdLength\" = 2) OR \
         ties_data.\"GNBDUFunction\".\"gNBId\" = 3)"
    );
    Ok(())
}

#[test]
fn text_literals_round_trip_their_quotes() -> Result<()> {
    let registry = common::ran_registry();
    let plan = planned(
        &registry,
        "RAN_LOGICAL",
        "GNBDUFunction",
        "/GNBDUFunction",
        "/attributes[@fdn='it''s']",
    )?;
    assert_eq!(
        plan.condition.to_string(),
        "ties_data.\"GNBDUFunction\".\"fdn\" = 'it''s'"
    );
    Ok(())
}

#[test]
fn contains_compiles_to_a_substring_comparison() -> Result<()> {
    let registry = common::ran_registry();
    let plan = planned(
        &registry,
        "RAN_LOGICAL",
        "GNBDUFunction",
        "/GNBDUFunction",
        "/attributes[contains(@fdn,\"Stockholm\")]",
    )?;
    assert_eq!(
        plan.condition.to_string(),
        "ties_data.\"GNBDUFunction\".\"fdn\" LIKE '%Stockholm%'"
    );
    Ok(())
}

#[test]
fn source_ids_target_projects_the_consumer_data_column() -> Result<()> {
    let registry = common::ran_registry();
    let plan = planned(&registry, "RAN_LOGICAL", "GNBDUFunction", "/sourceIds", "")?;
    assert_eq!(
        plan.selects,
        vec![select("ties_data.\"GNBDUFunction\"", "CD_sourceIds")]
    );
    Ok(())
}

#[test]
fn association_condition_joins_through_the_storing_table() -> Result<()> {
    let registry = common::ran_registry();
    // The relationship rows live on the NRCellDU table (B-side storage); the
    // condition lands on the joined GNBDUFunction table.
    let plan = planned(
        &registry,
        "RAN_LOGICAL",
        "",
        "/NRCellDU",
        "/NRCellDU/provided-nrCellDu[@gNBId=1]",
    )?;
    assert_eq!(
        plan.condition.to_string(),
        "ties_data.\"GNBDUFunction\".\"gNBId\" = 1"
    );
    assert_eq!(
        plan.joins,
        vec![Join {
            relation_table: "ties_data.\"NRCellDU\"".to_string(),
            relation_column: "REL_FK_provided-by-gnbduFunction".to_string(),
            entity_table: "ties_data.\"GNBDUFunction\"".to_string(),
            entity_column: "id".to_string(),
        }]
    );
    assert!(plan.tables.contains("ties_data.\"GNBDUFunction\""));
    assert!(plan.tables.contains("ties_data.\"NRCellDU\""));
    Ok(())
}

#[test]
fn relation_target_on_its_own_table() -> Result<()> {
    let registry = common::ran_registry();
    let plan = planned(
        &registry,
        "EQUIPMENT",
        "SECTOR_GROUPS_ANTENNAMODULE",
        "/attributes(priority)",
        "",
    )?;
    assert_eq!(
        plan.selects,
        vec![select("ties_data.\"SECTOR_GROUPS_ANTENNAMODULE\"", "priority")]
    );
    Ok(())
}

#[test]
fn side_stored_relation_derives_its_columns() -> Result<()> {
    let registry = common::ran_registry();
    let plan = planned(
        &registry,
        "RAN_LOGICAL",
        "GNBDUFUNCTION_PROVIDES_NRCELLDU",
        "",
        "",
    )?;
    let table = "ties_data.\"NRCellDU\"";
    assert_eq!(
        plan.selects,
        vec![
            select(table, "REL_ID_GNBDUFUNCTION_PROVIDES_NRCELLDU"),
            select(table, "REL_FK_provided-by-gnbduFunction"),
            select(table, "id"),
        ]
    );
    Ok(())
}
