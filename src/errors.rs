// Copyright (c) The tiespath contributors.
// Licensed under the Apache License, Version 2.0.

//! Error type shared across the query pipeline.
//!
//! Every variant maps to a status class so a transport layer can answer
//! client mistakes with a 400-style response and keep server faults separate.

use thiserror::Error;

pub type Result<T, E = TiesPathError> = core::result::Result<T, E>;

/// Coarse status class of an error, for the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    BadRequest,
    InternalServerError,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TiesPathError {
    /// Syntactically invalid path, or a construct the grammar forbids.
    #[error("{0}")]
    Grammar(String),

    /// The named object exists in no vocabulary of the queried domain.
    #[error("{0} did not match any topology objects in the given domain")]
    InvalidTopologyObject(String),

    /// The name denotes both an entity type and a relationship type.
    #[error("{0} is ambiguous, {0} matches multiple topology object types")]
    AmbiguousTopologyObject(String),

    /// One or more projection parameters are not declared attributes.
    #[error("{}", format_invalid_attributes(object, params))]
    InvalidAttributes {
        object: String,
        params: Vec<String>,
    },

    #[error("Invalid source id parameter provided for {0}")]
    InvalidSourceIdParameter(String),

    #[error("{association} is not a valid association name for topology object {object}")]
    InvalidAssociation {
        object: String,
        association: String,
    },

    #[error("Invalid parameters provided for association {0}")]
    InvalidParamsForAssociation(String),

    /// A container was validated before type resolution assigned a type.
    #[error("Container validation is not possible for undefined {0}")]
    UndefinedTopologyObjectType(String),

    #[error("TopologyObjects given in scopeFilter and targetFilter are not matching")]
    NotMatchingScopeAndTargetFilter,

    /// Every branch of the scope tree was screened out, so the predicate can
    /// never hold.
    #[error("Scope filter cannot be satisfied by any data")]
    UnmatchableScope,

    #[error("Unknown domain {domain}, available domains: {}", available.join(", "))]
    UnknownDomain {
        domain: String,
        available: Vec<String>,
    },

    #[error("{0}")]
    Schema(String),

    #[error("{0}")]
    Internal(String),
}

fn format_invalid_attributes(object: &str, params: &[String]) -> String {
    match params {
        [param] => format!("{param} is not a valid attribute of {object}"),
        params => format!("{} are not valid attributes of {object}", params.join(", ")),
    }
}

impl TiesPathError {
    pub(crate) fn grammar(details: impl Into<String>) -> TiesPathError {
        TiesPathError::Grammar(details.into())
    }

    pub(crate) fn internal(details: impl Into<String>) -> TiesPathError {
        TiesPathError::Internal(details.into())
    }

    /// Short title of the error condition; the `Display` text carries the
    /// details.
    pub fn message(&self) -> &'static str {
        match self {
            TiesPathError::Grammar(_) => "Grammar error",
            TiesPathError::InvalidTopologyObject(_) | TiesPathError::AmbiguousTopologyObject(_) => {
                "Invalid topology object"
            }
            TiesPathError::InvalidAttributes { params, .. } if params.len() == 1 => "Grammar error",
            TiesPathError::InvalidAttributes { .. } | TiesPathError::InvalidSourceIdParameter(_) => {
                "Invalid parameter error"
            }
            TiesPathError::InvalidAssociation { .. } => "Invalid association name",
            TiesPathError::InvalidParamsForAssociation(_) => "Invalid parameters for association",
            TiesPathError::UndefinedTopologyObjectType(_) => "Container validation error",
            TiesPathError::NotMatchingScopeAndTargetFilter | TiesPathError::UnmatchableScope => {
                "Filter error"
            }
            TiesPathError::UnknownDomain { .. } => "Unknown domain",
            TiesPathError::Schema(_) => "Schema error",
            TiesPathError::Internal(_) => "Server unknown exception",
        }
    }

    pub fn status(&self) -> StatusClass {
        match self {
            TiesPathError::Schema(_) | TiesPathError::Internal(_) => {
                StatusClass::InternalServerError
            }
            _ => StatusClass::BadRequest,
        }
    }
}
