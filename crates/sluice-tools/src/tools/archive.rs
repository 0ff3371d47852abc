use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ToolSpec;
use crate::error::ToolExecutionError;

pub const ARCHIVE_QUERY_TOOL_NAME: &str = "query_personnel_archive";

pub struct ArchiveQueryToolSpec;

impl ToolSpec for ArchiveQueryToolSpec {
    type Params = ArchiveQueryParams;
    type Result = ArchiveRecords;
    type Error = ArchiveQueryError;

    const NAME: &'static str = ARCHIVE_QUERY_TOOL_NAME;
    const DISPLAY_NAME: &'static str = "Personnel Archive";

    fn execution_error(error: Self::Error) -> ToolExecutionError {
        ToolExecutionError::ArchiveQuery(error)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Error, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArchiveQueryError {
    #[error("only read-only queries supported")]
    NotReadOnly,

    #[error("only a single statement is supported")]
    MultipleStatements,

    #[error("query is empty")]
    Empty,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ArchiveQueryParams {
    /// A single read-only SQL SELECT statement against the personnel archive
    pub sql: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct PersonnelRecord {
    pub name: String,
    pub age: u32,
    pub gender: String,
    pub political_status: String,
    pub marital_status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArchiveRecords {
    pub sql: String,
    pub records: Vec<PersonnelRecord>,
}
