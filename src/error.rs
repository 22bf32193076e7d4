//! Error types for schema and association resolution.
//!
//! Every variant here describes a configuration or expression mistake: a
//! relation or association that was never declared, a key that cannot be
//! resolved, or a transformation that is invalid for the attribute it is
//! applied to. None of them are transient, so nothing in this crate retries
//! or suppresses them.

use std::fmt;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Error type for schema algebra and association resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Association name is not registered on the owning relation
    NoAssociation { name: String, relation: String },
    /// Attempt to qualify an attribute backed by a non-column expression
    Qualify { attribute: String, expression: String },
    /// Key-based operation on a schema with no primary key
    MissingPrimaryKey { relation: String },
    /// Join keys for a declared association cannot be resolved
    MissingJoinKeys {
        association: String,
        relation: String,
        reason: String,
    },
    /// Relation name is not present in the registry
    RelationNotFound(String),
    /// Attribute name is not part of the schema
    UnknownAttribute { relation: String, name: String },
    /// View name is not registered on the relation
    UnknownView { relation: String, name: String },
    /// Two attributes with the same name in one schema
    DuplicateAttribute { relation: String, name: String },
    /// Number of key values does not match the primary key
    PrimaryKeyArity {
        relation: String,
        expected: usize,
        actual: usize,
    },
    /// Value cannot be cast to the attribute type
    Cast { expected: String, value: String },
    /// Operation is not available for this association kind
    UnsupportedOperation { association: String, operation: String },
    /// Error reported by a query executor
    Execution(String),
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaError::NoAssociation { name, relation } => {
                write!(f, "Association {name} is not defined on relation {relation}")
            }
            SchemaError::Qualify {
                attribute,
                expression,
            } => write!(
                f,
                "Attribute {attribute} cannot be qualified: {expression} is not a column reference"
            ),
            SchemaError::MissingPrimaryKey { relation } => {
                write!(f, "Relation {relation} has no primary key")
            }
            SchemaError::MissingJoinKeys {
                association,
                relation,
                reason,
            } => write!(
                f,
                "Cannot resolve join keys for association {association} on relation {relation}: {reason}"
            ),
            SchemaError::RelationNotFound(name) => {
                write!(f, "Relation not found in registry: {name}")
            }
            SchemaError::UnknownAttribute { relation, name } => {
                write!(f, "Attribute {name} is not defined in schema {relation}")
            }
            SchemaError::UnknownView { relation, name } => {
                write!(f, "View {name} is not defined on relation {relation}")
            }
            SchemaError::DuplicateAttribute { relation, name } => {
                write!(f, "Attribute {name} is defined more than once in schema {relation}")
            }
            SchemaError::PrimaryKeyArity {
                relation,
                expected,
                actual,
            } => write!(
                f,
                "Primary key of {relation} has {expected} attribute(s), got {actual} value(s)"
            ),
            SchemaError::Cast { expected, value } => {
                write!(f, "Cannot cast {value} to {expected}")
            }
            SchemaError::UnsupportedOperation {
                association,
                operation,
            } => write!(
                f,
                "Operation {operation} is not supported by association {association}"
            ),
            SchemaError::Execution(msg) => write!(f, "Execution error: {msg}"),
        }
    }
}

impl std::error::Error for SchemaError {}
