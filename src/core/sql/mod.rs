//! Builders that render Flink SQL clauses and statements from typed inputs.
//!
//! Every builder is an owned accumulator: `with_*` calls may come in any order,
//! and `build()` consumes the builder and returns the final text.

pub mod data_type;
mod ddl;
mod dml;
mod query;

pub use ddl::{ConnectorBuilder, SchemaBuilder, TableBuilder, ViewBuilder};
pub use dml::{InsertBuilder, SetConfigBuilder, StatementSetBuilder};
pub use query::{SelectBuilder, TumbleCountBuilder};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SqlError {
    #[error("table `{0}` has no schema")]
    MissingSchema(String),

    #[error("schema has no columns")]
    EmptySchema,

    #[error("connector clause needs at least one option")]
    NoConnectorOptions,

    #[error("{0} field group is empty")]
    EmptyFieldGroup(&'static str),

    #[error("schema already has a watermark on `{existing}`, cannot add another on `{requested}`")]
    DuplicateWatermark { existing: String, requested: String },

    #[error("statement set has no insert statements")]
    EmptyStatementSet,

    #[error("tumbling window must span at least one minute, got {0}")]
    InvalidWindow(i64),

    #[error("missing {0}")]
    Missing(&'static str),
}

/// Renders `value` as a single-quoted SQL string literal.
pub(crate) fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub(crate) fn require<'a>(value: &'a str, what: &'static str) -> Result<&'a str, SqlError> {
    if value.trim().is_empty() {
        return Err(SqlError::Missing(what));
    }
    Ok(value)
}
