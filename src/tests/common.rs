// Copyright (c) The tiespath contributors.
// Licensed under the Apache License, Version 2.0.

//! Shared schema fixture: a small RAN topology with two domains.

use std::collections::BTreeMap;

use crate::*;

/// Installs the test logger once; run with `RUST_LOG=trace` to see the
/// pipeline's log output.
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn attributes(pairs: &[(&str, DataType)]) -> BTreeMap<String, DataType> {
    pairs
        .iter()
        .map(|(name, data_type)| ((*name).to_string(), *data_type))
        .collect()
}

pub fn module(name: &str, domain: &str, included_modules: &[&str]) -> Module {
    Module {
        name: name.to_string(),
        namespace: format!("urn:topology:{name}"),
        domain: domain.to_string(),
        included_modules: included_modules.iter().map(|m| m.to_string()).collect(),
    }
}

pub fn entity(name: &str, module: &str, attrs: &[(&str, DataType)]) -> EntityType {
    EntityType {
        name: name.to_string(),
        module: module.to_string(),
        attributes: attributes(attrs),
    }
}

/// RAN_LOGICAL and EQUIPMENT domains, plus a TEIV umbrella domain seeing both.
pub fn ran_registry() -> SchemaRegistry {
    init_logger();
    SchemaRegistry::builder()
        .add_module(module("ran-logical", "RAN_LOGICAL", &[]))
        .add_module(module("equipment", "EQUIPMENT", &[]))
        .add_module(module("teiv", "TEIV", &["ran-logical", "equipment"]))
        .add_entity(entity(
            "GNBDUFunction",
            "ran-logical",
            &[
                ("fdn", DataType::Primitive),
                ("gNBId", DataType::Bigint),
                ("gNBIdLength", DataType::Bigint),
                ("dUpLMNId", DataType::Container),
                ("cmId", DataType::Container),
            ],
        ))
        .add_entity(entity(
            "NRCellDU",
            "ran-logical",
            &[
                ("fdn", DataType::Primitive),
                ("nCI", DataType::Bigint),
                ("cellLocalId", DataType::Bigint),
                ("nRPCI", DataType::Bigint),
                ("nRTAC", DataType::Bigint),
                ("cmId", DataType::Container),
            ],
        ))
        .add_entity(entity(
            "NRSectorCarrier",
            "ran-logical",
            &[
                ("fdn", DataType::Primitive),
                ("arfcnUL", DataType::Bigint),
                ("arfcnDL", DataType::Bigint),
                ("frequencyUL", DataType::Bigint),
                ("frequencyDL", DataType::Bigint),
            ],
        ))
        .add_entity(entity(
            "Sector",
            "equipment",
            &[
                ("sectorId", DataType::Bigint),
                ("azimuth", DataType::Decimal),
                ("geoLocation", DataType::Geographic),
            ],
        ))
        .add_entity(entity(
            "AntennaModule",
            "equipment",
            &[
                ("fdn", DataType::Primitive),
                ("positionWithinSector", DataType::Primitive),
            ],
        ))
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
        .add_relation(RelationType {
            name: "NRCELLDU_USES_NRSECTORCARRIER".to_string(),
            module: "ran-logical".to_string(),
            a_side: "NRCellDU".to_string(),
            a_side_association: Association::new("used-nrSectorCarrier", 0, u64::MAX),
            b_side: "NRSectorCarrier".to_string(),
            b_side_association: Association::new("used-by-nrCellDu", 0, 1),
            attributes: BTreeMap::new(),
            connects_same_entity: false,
            storage_location: RelationshipDataLocation::BSide,
        })
        .add_relation(RelationType {
            name: "SECTOR_GROUPS_ANTENNAMODULE".to_string(),
            module: "equipment".to_string(),
            a_side: "Sector".to_string(),
            a_side_association: Association::new("grouped-antennaModule", 0, u64::MAX),
            b_side: "AntennaModule".to_string(),
            b_side_association: Association::new("grouped-by-sector", 0, 1),
            attributes: attributes(&[("priority", DataType::Bigint)]),
            connects_same_entity: false,
            storage_location: RelationshipDataLocation::Relation,
        })
        .build()
        .expect("fixture schema is valid")
}
