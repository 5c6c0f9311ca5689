//! Domain model for query-field resolution: field schemas, filter trees,
//! the wire filter grammar, and remote records.

#![forbid(unsafe_code)]

mod filter;
mod record;
mod schema;
mod summary;

pub use filter::{
    ConditionDefinition, ContextTokens, FilterCondition, FilterDefinition, FilterGroup,
    FilterValue, GroupDefinition, GroupOperator, LogicalOperator, QueryFilter,
};
pub use record::EntityRecord;
pub use schema::{QueryFieldSchema, ResultOrdering, SortDirection, SummaryMode, SummaryValue};
pub use summary::SummaryType;
