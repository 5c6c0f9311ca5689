use std::cmp::Ordering;
use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use trackfield_application::{
    RecordQuery, SummaryFieldSpec, SummaryReport, TrackingClient,
};
use trackfield_core::{AppError, AppResult};
use trackfield_domain::{
    EntityRecord, FilterCondition, FilterGroup, GroupOperator, QueryFilter, SortDirection,
    SummaryType,
};

/// In-process tracking service storing records per entity type.
///
/// Evaluates the wire filter grammar and summaries locally over stored
/// records. Intended for tests and local development; a production deployment
/// puts a real transport behind the port instead.
pub struct InMemoryTrackingService {
    records: RwLock<BTreeMap<String, Vec<EntityRecord>>>,
    field_schemas: RwLock<BTreeMap<String, BTreeMap<String, Value>>>,
}

impl InMemoryTrackingService {
    /// Creates an empty in-memory service.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            field_schemas: RwLock::new(BTreeMap::new()),
        }
    }

    /// Stores one record under an entity type, preserving insertion order.
    pub async fn insert_record(&self, entity_type: impl Into<String>, record: EntityRecord) {
        self.records
            .write()
            .await
            .entry(entity_type.into())
            .or_default()
            .push(record);
    }

    /// Declares one field schema for an entity type.
    pub async fn set_field_schema(
        &self,
        entity_type: impl Into<String>,
        field_name: impl Into<String>,
        field_schema: Value,
    ) {
        self.field_schemas
            .write()
            .await
            .entry(entity_type.into())
            .or_default()
            .insert(field_name.into(), field_schema);
    }
}

impl Default for InMemoryTrackingService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TrackingClient for InMemoryTrackingService {
    async fn find(&self, entity_type: &str, query: RecordQuery) -> AppResult<Vec<EntityRecord>> {
        let records = self.records.read().await;
        let mut listed = Vec::new();
        for record in records.get(entity_type).map(Vec::as_slice).unwrap_or_default() {
            if record_matches_filters(record, &query.filters)? {
                listed.push(record.clone());
            }
        }
        drop(records);

        if !query.order.is_empty() {
            listed.sort_by(|left, right| {
                for order in &query.order {
                    let mut ordering = compare_for_sort(
                        left.field(order.field_name.as_str()),
                        right.field(order.field_name.as_str()),
                    );
                    if order.direction == SortDirection::Desc {
                        ordering = ordering.reverse();
                    }
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }

                Ordering::Equal
            });
        }

        if let Some(limit) = query.limit {
            listed.truncate(limit);
        }

        let mut projected = Vec::with_capacity(listed.len());
        for record in &listed {
            projected.push(project_record(record, &query.fields)?);
        }

        Ok(projected)
    }

    async fn find_one(
        &self,
        entity_type: &str,
        query: RecordQuery,
    ) -> AppResult<Option<EntityRecord>> {
        Ok(self.find(entity_type, query).await?.into_iter().next())
    }

    async fn schema_field_read(&self, entity_type: &str) -> AppResult<BTreeMap<String, Value>> {
        Ok(self
            .field_schemas
            .read()
            .await
            .get(entity_type)
            .cloned()
            .unwrap_or_default())
    }

    async fn summarize(
        &self,
        entity_type: &str,
        filters: Vec<QueryFilter>,
        summary_fields: Vec<SummaryFieldSpec>,
    ) -> AppResult<SummaryReport> {
        let records = self.records.read().await;
        let mut matching = Vec::new();
        for record in records.get(entity_type).map(Vec::as_slice).unwrap_or_default() {
            if record_matches_filters(record, &filters)? {
                matching.push(record.clone());
            }
        }
        drop(records);

        let mut summaries = BTreeMap::new();
        for spec in &summary_fields {
            summaries.insert(spec.field.clone(), summarize_field(&matching, spec)?);
        }

        Ok(SummaryReport::new(summaries))
    }
}

fn record_matches_filters(record: &EntityRecord, filters: &[QueryFilter]) -> AppResult<bool> {
    // The top-level filter list is an implicit all-must-match set.
    for filter in filters {
        if !filter_matches(record, filter)? {
            return Ok(false);
        }
    }

    Ok(true)
}

fn filter_matches(record: &EntityRecord, filter: &QueryFilter) -> AppResult<bool> {
    match filter {
        QueryFilter::Condition(condition) => condition_matches(record, condition),
        QueryFilter::Group(group) => group_matches(record, group),
    }
}

fn group_matches(record: &EntityRecord, group: &FilterGroup) -> AppResult<bool> {
    match group.operator() {
        GroupOperator::All => {
            for filter in group.filters() {
                if !filter_matches(record, filter)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        GroupOperator::Any => {
            for filter in group.filters() {
                if filter_matches(record, filter)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
    }
}

fn condition_matches(record: &EntityRecord, condition: &FilterCondition) -> AppResult<bool> {
    let stored = record.field(condition.path());

    match condition.relation() {
        "is" => Ok(operand_matches(stored, condition.operand())),
        "is_not" => Ok(!operand_matches(stored, condition.operand())),
        "in" => Ok(operand_matches(stored, condition.operand())),
        "contains" => Ok(stored
            .and_then(Value::as_str)
            .zip(comparison_operand(condition.operand()).and_then(Value::as_str))
            .map(|(stored, expected)| stored.contains(expected))
            .unwrap_or(false)),
        "less_than" => Ok(ordered_comparison(stored, condition.operand()) == Some(Ordering::Less)),
        "greater_than" => {
            Ok(ordered_comparison(stored, condition.operand()) == Some(Ordering::Greater))
        }
        other => Err(AppError::Validation(format!(
            "unsupported filter relation '{other}'"
        ))),
    }
}

// An unresolved context token arrives as a null operand; it matches nothing
// here, mirroring how the remote service treats it.
fn operand_matches(stored: Option<&Value>, operand: &Value) -> bool {
    let Some(stored) = stored else {
        return false;
    };

    match operand {
        Value::Null => false,
        Value::Array(candidates) => candidates
            .iter()
            .any(|candidate| value_matches(stored, candidate)),
        other => value_matches(stored, other),
    }
}

fn value_matches(stored: &Value, candidate: &Value) -> bool {
    match (stored.as_object(), candidate.as_object()) {
        // Entity references compare by identity; stored values may carry
        // extra keys such as `name`.
        (Some(stored), Some(candidate)) => {
            stored.get("type") == candidate.get("type") && stored.get("id") == candidate.get("id")
        }
        _ => stored == candidate,
    }
}

fn comparison_operand(operand: &Value) -> Option<&Value> {
    match operand {
        Value::Array(values) => values.first(),
        other => Some(other),
    }
}

fn ordered_comparison(stored: Option<&Value>, operand: &Value) -> Option<Ordering> {
    let stored = stored?;
    let expected = comparison_operand(operand)?;

    if let (Some(left), Some(right)) = (stored.as_f64(), expected.as_f64()) {
        left.partial_cmp(&right)
    } else if let (Some(left), Some(right)) = (stored.as_str(), expected.as_str()) {
        Some(left.cmp(right))
    } else {
        None
    }
}

fn compare_for_sort(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    match (left, right) {
        (Some(left), Some(right)) => {
            if let (Some(left), Some(right)) = (left.as_f64(), right.as_f64()) {
                left.partial_cmp(&right).unwrap_or(Ordering::Equal)
            } else if let (Some(left), Some(right)) = (left.as_str(), right.as_str()) {
                left.cmp(right)
            } else if let (Some(left), Some(right)) = (left.as_bool(), right.as_bool()) {
                left.cmp(&right)
            } else {
                Ordering::Equal
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

// Projection keeps the record identity alongside the requested fields; an
// empty field list returns the record unchanged.
fn project_record(record: &EntityRecord, fields: &[String]) -> AppResult<EntityRecord> {
    if fields.is_empty() {
        return Ok(record.clone());
    }

    let mut projected = serde_json::Map::new();
    for key in ["type", "id"] {
        if let Some(value) = record.field(key) {
            projected.insert(key.to_owned(), value.clone());
        }
    }
    for field in fields {
        if let Some(value) = record.field(field.as_str()) {
            projected.insert(field.clone(), value.clone());
        }
    }

    EntityRecord::new(Value::Object(projected))
}

fn summarize_field(records: &[EntityRecord], spec: &SummaryFieldSpec) -> AppResult<Value> {
    match spec.summary_type {
        SummaryType::Count => Ok(Value::from(
            records
                .iter()
                .filter(|record| {
                    record
                        .field(spec.field.as_str())
                        .map(|value| !value.is_null())
                        .unwrap_or(false)
                })
                .count(),
        )),
        SummaryType::Sum => {
            let values = numeric_values(records, spec.field.as_str());
            Ok(number_value(values.iter().sum()))
        }
        SummaryType::Average => {
            let values = numeric_values(records, spec.field.as_str());
            if values.is_empty() {
                return Ok(Value::Null);
            }

            Ok(number_value(
                values.iter().sum::<f64>() / values.len() as f64,
            ))
        }
        SummaryType::Minimum => Ok(numeric_values(records, spec.field.as_str())
            .into_iter()
            .reduce(f64::min)
            .map(number_value)
            .unwrap_or(Value::Null)),
        SummaryType::Maximum => Ok(numeric_values(records, spec.field.as_str())
            .into_iter()
            .reduce(f64::max)
            .map(number_value)
            .unwrap_or(Value::Null)),
        SummaryType::Percentage => {
            let Some(comparison) = spec.value.as_deref() else {
                return Err(AppError::Validation(
                    "percentage summary requires a comparison value".to_owned(),
                ));
            };

            if records.is_empty() {
                return Ok(Value::from(0));
            }

            let matching = records
                .iter()
                .filter(|record| {
                    record.field(spec.field.as_str()).and_then(Value::as_str) == Some(comparison)
                })
                .count();

            Ok(Value::from(
                (matching as f64 * 100.0 / records.len() as f64).round() as i64,
            ))
        }
    }
}

fn numeric_values(records: &[EntityRecord], field: &str) -> Vec<f64> {
    records
        .iter()
        .filter_map(|record| record.field(field))
        .filter_map(Value::as_f64)
        .collect()
}

fn number_value(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Value::from(value as i64)
    } else {
        Value::from(value)
    }
}
