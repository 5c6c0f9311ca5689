use std::sync::Arc;

use serde_json::Value;

use trackfield_core::{AppError, AppResult, EntityRef};
use trackfield_domain::{
    ContextTokens, QueryFieldSchema, QueryFilter, SummaryMode, SummaryType, SummaryValue,
};

use crate::tracking_ports::{RecordOrder, RecordQuery, SummaryFieldSpec, SummaryReport, TrackingClient};

/// Resolver for one computed query field on one record.
///
/// Construction parses the field schema; value resolution builds the wire
/// filters from the schema's filter definition, issues exactly one remote
/// call for the declared aggregation mode, and renders the display text.
/// Instances are built fresh per (record, field) pair: the parent-entity
/// token differs per record, so nothing here is reusable state.
pub struct QueryFieldResolver {
    client: Arc<dyn TrackingClient>,
    schema: QueryFieldSchema,
    tokens: ContextTokens,
}

impl QueryFieldResolver {
    /// Creates a resolver for one field on one record.
    ///
    /// Fails when the schema lacks the keys needed to interpret the field at
    /// all; summary-section problems surface later, during resolution.
    pub fn new(
        client: Arc<dyn TrackingClient>,
        field_name: impl Into<String>,
        field_schema: &Value,
        parent_entity: Option<EntityRef>,
        logged_in_user: Option<EntityRef>,
    ) -> AppResult<Self> {
        let schema = QueryFieldSchema::parse(field_name, field_schema)?;

        Ok(Self {
            client,
            schema,
            tokens: ContextTokens::new(parent_entity, logged_in_user),
        })
    }

    /// Resolves the field to display text. Never fails: a field that cannot
    /// be computed degrades to empty text so one broken field does not abort
    /// reading the rest of the record.
    pub async fn resolve_value(&self) -> String {
        match self.try_resolve_value().await {
            Ok(value) => value,
            Err(error) => {
                tracing::debug!(
                    field = self.schema.field_name(),
                    %error,
                    "query field degraded to empty text"
                );
                String::new()
            }
        }
    }

    /// Fallible resolution path, for callers that need to observe failures.
    pub async fn try_resolve_value(&self) -> AppResult<String> {
        match self.schema.summary_mode()? {
            SummaryMode::SingleRecord => self.resolve_records().await,
            SummaryMode::Percentage => self.resolve_percentage().await,
            SummaryMode::RecordCount => self.resolve_record_count().await,
            SummaryMode::Count => self.resolve_aggregate(SummaryType::Count).await,
            SummaryMode::Sum => self.resolve_aggregate(SummaryType::Sum).await,
            SummaryMode::Average => self.resolve_aggregate(SummaryType::Average).await,
            SummaryMode::Minimum => self.resolve_aggregate(SummaryType::Minimum).await,
            SummaryMode::Maximum => self.resolve_aggregate(SummaryType::Maximum).await,
        }
    }

    async fn resolve_records(&self) -> AppResult<String> {
        let filters = self.wire_filters()?;
        let field = self.schema.summary_field()?;
        let (order, limit) = match self.schema.summary_value()? {
            SummaryValue::Ordering(ordering) => {
                let order = ordering
                    .column()
                    .zip(ordering.direction())
                    .map(|(column, direction)| {
                        vec![RecordOrder {
                            field_name: column.to_owned(),
                            direction,
                        }]
                    })
                    .unwrap_or_default();
                (order, ordering.limit().unwrap_or(1))
            }
            SummaryValue::Scalar(_) => (Vec::new(), 1),
        };

        let records = self
            .client
            .find(
                self.schema.entity_type(),
                RecordQuery {
                    filters,
                    fields: vec![field.clone()],
                    order,
                    limit: Some(limit),
                },
            )
            .await?;
        if records.is_empty() {
            return Ok(String::new());
        }

        let joined = records
            .iter()
            .map(|record| display_text(record.field(field.as_str())))
            .collect::<Vec<_>>()
            .join(", ");

        Ok(joined)
    }

    async fn resolve_percentage(&self) -> AppResult<String> {
        let filters = self.wire_filters()?;
        let field = self.schema.summary_field()?;
        let SummaryValue::Scalar(comparison) = self.schema.summary_value()? else {
            return Err(AppError::Validation(format!(
                "query field '{}' percentage summary requires a scalar summary value",
                self.schema.field_name()
            )));
        };

        let report = self
            .client
            .summarize(
                self.schema.entity_type(),
                filters,
                vec![SummaryFieldSpec {
                    field: field.clone(),
                    summary_type: SummaryType::Percentage,
                    value: Some(comparison.clone()),
                }],
            )
            .await?;
        let result = self.summary_result(&report, field.as_str())?;

        Ok(format!("{}% {}", scalar_text(&result), comparison))
    }

    async fn resolve_aggregate(&self, summary_type: SummaryType) -> AppResult<String> {
        let filters = self.wire_filters()?;
        let field = self.schema.summary_field()?;

        let report = self
            .client
            .summarize(
                self.schema.entity_type(),
                filters,
                vec![SummaryFieldSpec {
                    field: field.clone(),
                    summary_type,
                    value: None,
                }],
            )
            .await?;
        let result = self.summary_result(&report, field.as_str())?;

        Ok(scalar_text(&result))
    }

    async fn resolve_record_count(&self) -> AppResult<String> {
        let filters = self.wire_filters()?;

        let report = self
            .client
            .summarize(
                self.schema.entity_type(),
                filters,
                vec![SummaryFieldSpec {
                    field: "id".to_owned(),
                    summary_type: SummaryType::Count,
                    value: None,
                }],
            )
            .await?;
        let result = self.summary_result(&report, "id")?;

        Ok(scalar_text(&result))
    }

    fn wire_filters(&self) -> AppResult<Vec<QueryFilter>> {
        self.schema.wire_filters(&self.tokens)
    }

    fn summary_result(&self, report: &SummaryReport, field: &str) -> AppResult<Value> {
        report.summary(field).cloned().ok_or_else(|| {
            AppError::Remote(format!(
                "summary response for query field '{}' is missing field '{field}'",
                self.schema.field_name()
            ))
        })
    }
}

// Display text for a listed record's field: reference values show their
// `name`, scalars their value, anything unreadable becomes empty text.
fn display_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::Object(reference)) => reference
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned(),
        Some(value) => scalar_text(value),
        None => String::new(),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
