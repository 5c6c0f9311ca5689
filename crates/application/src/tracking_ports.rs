use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use trackfield_core::AppResult;
use trackfield_domain::{EntityRecord, QueryFilter, SortDirection, SummaryType};

/// One sort instruction for record listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordOrder {
    /// Field to order by.
    pub field_name: String,
    /// Sort direction.
    pub direction: SortDirection,
}

/// Bundled query inputs for record listings.
///
/// The top-level filter list is combined by the service as an implicit
/// all-must-match set; nested groups carry their own operators.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordQuery {
    /// Wire filter expressions.
    pub filters: Vec<QueryFilter>,
    /// Field names to return on each record.
    pub fields: Vec<String>,
    /// Sort instructions applied in order.
    pub order: Vec<RecordOrder>,
    /// Maximum rows returned; `None` means the service default.
    pub limit: Option<usize>,
}

/// One requested summary column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryFieldSpec {
    /// Field to aggregate.
    pub field: String,
    /// Aggregation applied to the field.
    #[serde(rename = "type")]
    pub summary_type: SummaryType,
    /// Comparison value, used by percentage summaries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// Aggregation response keyed by summarized field name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryReport {
    summaries: BTreeMap<String, Value>,
}

impl SummaryReport {
    /// Creates a report from the per-field summary results.
    #[must_use]
    pub fn new(summaries: BTreeMap<String, Value>) -> Self {
        Self { summaries }
    }

    /// Returns the summary result for one field.
    #[must_use]
    pub fn summary(&self, field: &str) -> Option<&Value> {
        self.summaries.get(field)
    }
}

/// Remote tracking-service gateway used by query-field resolution.
///
/// Transport, authentication and session management live behind this port;
/// the resolution engine only shapes queries and interprets responses.
#[async_trait]
pub trait TrackingClient: Send + Sync {
    /// Returns records matching the query.
    async fn find(&self, entity_type: &str, query: RecordQuery) -> AppResult<Vec<EntityRecord>>;

    /// Returns the first record matching the query.
    async fn find_one(
        &self,
        entity_type: &str,
        query: RecordQuery,
    ) -> AppResult<Option<EntityRecord>>;

    /// Returns the field schemas declared for an entity type, keyed by field
    /// name.
    async fn schema_field_read(&self, entity_type: &str) -> AppResult<BTreeMap<String, Value>>;

    /// Computes server-side aggregations over the filtered record set.
    async fn summarize(
        &self,
        entity_type: &str,
        filters: Vec<QueryFilter>,
        summary_fields: Vec<SummaryFieldSpec>,
    ) -> AppResult<SummaryReport>;
}
