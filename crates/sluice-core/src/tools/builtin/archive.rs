use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument};

use sluice_tools::Presentation;
use sluice_tools::tools::archive::{
    ArchiveQueryError, ArchiveQueryParams, ArchiveQueryToolSpec, ArchiveRecords, PersonnelRecord,
};

use crate::tools::cache::{CacheStats, QueryCache};
use crate::tools::tool::{Tool, ToolContext};

/// Accept exactly one `SELECT` statement. A single trailing `;` is allowed.
pub fn ensure_read_only(sql: &str) -> Result<&str, ArchiveQueryError> {
    let statement = sql.trim();
    let statement = statement.strip_suffix(';').unwrap_or(statement).trim_end();
    if statement.is_empty() {
        return Err(ArchiveQueryError::Empty);
    }
    if statement.contains(';') {
        return Err(ArchiveQueryError::MultipleStatements);
    }
    let keyword = statement
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    if keyword != "select" {
        return Err(ArchiveQueryError::NotReadOnly);
    }
    Ok(statement)
}

/// Source of personnel records.
#[async_trait]
pub trait ArchiveStore: Send + Sync + 'static {
    async fn query(&self, sql: &str) -> Result<Vec<PersonnelRecord>, ArchiveQueryError>;
}

/// Fixed two-record archive.
#[derive(Debug, Clone, Copy, Default)]
pub struct SampleArchive;

#[async_trait]
impl ArchiveStore for SampleArchive {
    async fn query(&self, _sql: &str) -> Result<Vec<PersonnelRecord>, ArchiveQueryError> {
        Ok(vec![
            PersonnelRecord {
                name: "张三".to_string(),
                age: 28,
                gender: "男".to_string(),
                political_status: "党员".to_string(),
                marital_status: "已婚".to_string(),
            },
            PersonnelRecord {
                name: "李四".to_string(),
                age: 32,
                gender: "女".to_string(),
                political_status: "群众".to_string(),
                marital_status: "未婚".to_string(),
            },
        ])
    }
}

/// `query_personnel_archive`. Results go back to the model for summarizing.
#[derive(Clone)]
pub struct ArchiveQueryTool {
    store: Arc<dyn ArchiveStore>,
    cache: Arc<QueryCache<Vec<PersonnelRecord>>>,
}

impl ArchiveQueryTool {
    pub fn new(store: impl ArchiveStore, cache_capacity: usize, cache_ttl: Duration) -> Self {
        Self {
            store: Arc::new(store),
            cache: Arc::new(QueryCache::new(cache_capacity, cache_ttl)),
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

#[async_trait]
impl Tool for ArchiveQueryTool {
    type Spec = ArchiveQueryToolSpec;

    const DESCRIPTION: &'static str = "Query the personnel archive with a single read-only SQL SELECT statement. Only call this when the user asks for personnel records.";

    fn presentation(&self) -> Presentation {
        Presentation::ReenterModel
    }

    #[instrument(skip(self, ctx), fields(tool.id = %ctx.tool_call_id))]
    async fn execute(
        &self,
        params: ArchiveQueryParams,
        ctx: &ToolContext,
    ) -> Result<ArchiveRecords, ArchiveQueryError> {
        let statement = ensure_read_only(&params.sql)?;

        let records = if let Some(records) = self.cache.get(statement) {
            debug!(target: "sluice::tools::archive", "Cache hit");
            records
        } else {
            let records = self.store.query(statement).await?;
            self.cache.set(statement, records.clone());
            records
        };

        let stats = self.cache_stats();
        debug!(
            target: "sluice::tools::archive",
            hits = stats.hits,
            misses = stats.misses,
            entries = stats.entries,
            "Query cache"
        );

        Ok(ArchiveRecords {
            sql: statement.to_string(),
            records,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::tool::ToolErased;
    use rstest::rstest;
    use serde_json::json;
    use sluice_tools::ToolError;
    use tokio_util::sync::CancellationToken;

    #[rstest]
    #[case("SELECT * FROM archive", Ok("SELECT * FROM archive"))]
    #[case("  select name from archive;  ", Ok("select name from archive"))]
    #[case("DELETE FROM archive", Err(ArchiveQueryError::NotReadOnly))]
    #[case("update archive set age = 1", Err(ArchiveQueryError::NotReadOnly))]
    #[case("select 1; drop table archive", Err(ArchiveQueryError::MultipleStatements))]
    #[case(" ; ", Err(ArchiveQueryError::Empty))]
    fn guards_read_only(#[case] sql: &str, #[case] expected: Result<&str, ArchiveQueryError>) {
        assert_eq!(ensure_read_only(sql), expected);
    }

    fn tool() -> ArchiveQueryTool {
        ArchiveQueryTool::new(SampleArchive, 8, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn returns_records_and_caches_them() {
        let tool = tool();
        let ctx = ToolContext::new("call_1", CancellationToken::new());

        let first = tool
            .execute_erased(json!({"sql": "SELECT * FROM archive"}), &ctx)
            .await
            .unwrap();
        assert_eq!(first["records"][0]["name"], "张三");
        assert_eq!(first["records"][1]["political_status"], "群众");

        tool.execute_erased(json!({"sql": "select *   from archive;"}), &ctx)
            .await
            .unwrap();
        let stats = tool.cache_stats();
        assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 1));
    }

    #[tokio::test]
    async fn write_statements_fail_with_domain_error() {
        let ctx = ToolContext::new("call_1", CancellationToken::new());
        let err = tool()
            .execute_erased(json!({"sql": "DROP TABLE archive"}), &ctx)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "only read-only queries supported");
        assert!(matches!(err, ToolError::Execution(_)));
    }
}
