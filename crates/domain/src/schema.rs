use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use trackfield_core::{AppError, AppResult, NonEmptyString};

use crate::filter::{ContextTokens, FilterDefinition, QueryFilter};

/// Sort direction for record-listing results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    /// Ascending order.
    Asc,
    /// Descending order.
    Desc,
}

impl SortDirection {
    /// Returns stable wire value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl FromStr for SortDirection {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(AppError::Validation(format!(
                "unknown sort direction '{value}'"
            ))),
        }
    }
}

/// Aggregation mode declared by a query field's `summary_default` section.
///
/// The name `single_record` is misleading: the mode lists all records within
/// the configured limit, not just one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryMode {
    /// List matching records and join the summary field's display text.
    SingleRecord,
    /// Share of records matching the configured comparison value.
    Percentage,
    /// Number of matching records.
    RecordCount,
    /// Count of records carrying a value in the summary field.
    Count,
    /// Numeric sum over the summary field.
    Sum,
    /// Numeric average over the summary field.
    Average,
    /// Smallest summary field value.
    Minimum,
    /// Largest summary field value.
    Maximum,
}

impl SummaryMode {
    /// Returns the stable schema value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SingleRecord => "single_record",
            Self::Percentage => "percentage",
            Self::RecordCount => "record_count",
            Self::Count => "count",
            Self::Sum => "sum",
            Self::Average => "average",
            Self::Minimum => "minimum",
            Self::Maximum => "maximum",
        }
    }
}

impl FromStr for SummaryMode {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "single_record" => Ok(Self::SingleRecord),
            "percentage" => Ok(Self::Percentage),
            "record_count" => Ok(Self::RecordCount),
            "count" => Ok(Self::Count),
            "sum" => Ok(Self::Sum),
            "average" => Ok(Self::Average),
            "minimum" => Ok(Self::Minimum),
            "maximum" => Ok(Self::Maximum),
            _ => Err(AppError::UnsupportedValueType(value.to_owned())),
        }
    }
}

/// Result ordering and row-limit settings carried by a `summary_value`
/// section of record-listing shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultOrdering {
    column: Option<String>,
    direction: Option<SortDirection>,
    limit: Option<usize>,
}

impl ResultOrdering {
    fn parse(section: &Map<String, Value>) -> AppResult<Self> {
        let column = section
            .get("column")
            .and_then(Value::as_str)
            .map(str::to_owned);
        let direction = section
            .get("direction")
            .and_then(Value::as_str)
            .map(SortDirection::from_str)
            .transpose()?;
        let limit = section
            .get("limit")
            .and_then(Value::as_u64)
            .map(|limit| limit as usize);

        Ok(Self {
            column,
            direction,
            limit,
        })
    }

    /// Returns the ordering column when one is declared.
    #[must_use]
    pub fn column(&self) -> Option<&str> {
        self.column.as_deref()
    }

    /// Returns the ordering direction when one is declared.
    #[must_use]
    pub fn direction(&self) -> Option<SortDirection> {
        self.direction
    }

    /// Returns the declared row limit.
    #[must_use]
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }
}

/// Parsed `summary_value` section, shape-decided once at access time.
#[derive(Debug, Clone, PartialEq)]
pub enum SummaryValue {
    /// Comparison value for percentage summaries.
    Scalar(String),
    /// Ordering and limit settings for record listings.
    Ordering(ResultOrdering),
}

impl SummaryValue {
    fn parse(value: &Value) -> AppResult<Self> {
        match value {
            Value::String(scalar) => Ok(Self::Scalar(scalar.clone())),
            Value::Object(section) => ResultOrdering::parse(section).map(Self::Ordering),
            Value::Number(number) => Ok(Self::Scalar(number.to_string())),
            Value::Bool(flag) => Ok(Self::Scalar(flag.to_string())),
            _ => Err(AppError::Validation(
                "summary value must be a scalar or an ordering object".to_owned(),
            )),
        }
    }
}

/// Parsed schema of one computed query field.
///
/// Construction validates exactly the keys a field needs to be interpreted at
/// all: `properties`, `properties.query.value`, its `filters`, and its
/// `entity_type`. The summary sections stay raw and are validated by the
/// accessors, so their failures surface during value resolution rather than
/// while the owning entity is being read.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryFieldSchema {
    field_name: String,
    entity_type: NonEmptyString,
    properties: Map<String, Value>,
}

impl QueryFieldSchema {
    /// Parses the opaque field-schema document for one query field.
    pub fn parse(field_name: impl Into<String>, field_schema: &Value) -> AppResult<Self> {
        let field_name = field_name.into();
        let properties = field_schema
            .get("properties")
            .and_then(Value::as_object)
            .ok_or_else(|| AppError::MissingSchemaKey("properties".to_owned()))?;

        let query_value = properties
            .get("query")
            .filter(|value| !value.is_null())
            .ok_or_else(|| AppError::MissingSchemaKey("properties.query".to_owned()))?
            .get("value")
            .filter(|value| !value.is_null())
            .ok_or_else(|| AppError::MissingSchemaKey("properties.query.value".to_owned()))?;

        query_value
            .get("filters")
            .filter(|value| !value.is_null())
            .ok_or_else(|| {
                AppError::MissingSchemaKey("properties.query.value.filters".to_owned())
            })?;

        let entity_type = query_value
            .get("entity_type")
            .and_then(Value::as_str)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| {
                AppError::MissingSchemaKey("properties.query.value.entity_type".to_owned())
            })?;

        Ok(Self {
            field_name,
            entity_type: NonEmptyString::new(entity_type)?,
            properties: properties.clone(),
        })
    }

    /// Returns the name of the computed field.
    #[must_use]
    pub fn field_name(&self) -> &str {
        self.field_name.as_str()
    }

    /// Returns the entity type the declared query runs against.
    #[must_use]
    pub fn entity_type(&self) -> &str {
        self.entity_type.as_str()
    }

    /// Returns the aggregation mode from `properties.summary_default.value`.
    pub fn summary_mode(&self) -> AppResult<SummaryMode> {
        let value = self.section_value("summary_default")?;
        let Some(mode) = value.as_str() else {
            return Err(AppError::UnsupportedValueType(value.to_string()));
        };

        SummaryMode::from_str(mode)
    }

    /// Returns the summarized field name from `properties.summary_field.value`.
    pub fn summary_field(&self) -> AppResult<String> {
        let value = self.section_value("summary_field")?;
        value
            .as_str()
            .filter(|field| !field.trim().is_empty())
            .map(str::to_owned)
            .ok_or_else(|| AppError::MissingSchemaKey("properties.summary_field.value".to_owned()))
    }

    /// Returns the parsed `properties.summary_value.value` section.
    pub fn summary_value(&self) -> AppResult<SummaryValue> {
        SummaryValue::parse(self.section_value("summary_value")?)
    }

    /// Parses the declared filter conditions, pruning inactive nodes.
    ///
    /// The root filter group's own logical operator is not interpreted; its
    /// `conditions` become the flat top-level filter list.
    pub fn filter_definitions(&self) -> AppResult<Vec<FilterDefinition>> {
        let conditions = self
            .properties
            .get("query")
            .and_then(|query| query.get("value"))
            .and_then(|value| value.get("filters"))
            .and_then(|filters| filters.get("conditions"))
            .and_then(Value::as_array)
            .ok_or_else(|| {
                AppError::MissingSchemaKey("properties.query.value.filters.conditions".to_owned())
            })?;

        let mut definitions = Vec::with_capacity(conditions.len());
        for condition in conditions {
            if let Some(parsed) = FilterDefinition::parse(condition)? {
                definitions.push(parsed);
            }
        }

        Ok(definitions)
    }

    /// Builds the wire filter list for one resolution's token context.
    pub fn wire_filters(&self, tokens: &ContextTokens) -> AppResult<Vec<QueryFilter>> {
        Ok(self
            .filter_definitions()?
            .iter()
            .filter_map(|definition| definition.to_query_filter(tokens))
            .collect())
    }

    fn section_value(&self, section: &str) -> AppResult<&Value> {
        self.properties
            .get(section)
            .filter(|value| !value.is_null())
            .ok_or_else(|| AppError::MissingSchemaKey(format!("properties.{section}")))?
            .get("value")
            .filter(|value| !value.is_null())
            .ok_or_else(|| AppError::MissingSchemaKey(format!("properties.{section}.value")))
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use proptest::prelude::*;
    use serde_json::json;

    use trackfield_core::AppError;

    use crate::filter::{ContextTokens, LogicalOperator};

    use super::{QueryFieldSchema, SortDirection, SummaryMode, SummaryValue};

    fn schema_document(properties: serde_json::Value) -> serde_json::Value {
        json!({"data_type": {"value": "text"}, "properties": properties})
    }

    fn minimal_properties() -> serde_json::Value {
        json!({
            "query": {
                "value": {
                    "entity_type": "Shot",
                    "filters": {
                        "logical_operator": "and",
                        "conditions": [
                            {"path": "sg_status_list", "relation": "is", "values": ["ip"]},
                        ],
                    },
                },
            },
            "summary_default": {"value": "record_count"},
        })
    }

    #[test]
    fn parse_requires_properties() {
        let result = QueryFieldSchema::parse("sg_field", &json!({"data_type": "text"}));
        assert!(
            matches!(result, Err(AppError::MissingSchemaKey(key)) if key == "properties")
        );
    }

    #[test]
    fn parse_requires_query_value() {
        let result =
            QueryFieldSchema::parse("sg_field", &schema_document(json!({"query": {}})));
        assert!(
            matches!(result, Err(AppError::MissingSchemaKey(key)) if key == "properties.query.value")
        );
    }

    #[test]
    fn parse_requires_filters() {
        let result = QueryFieldSchema::parse(
            "sg_field",
            &schema_document(json!({"query": {"value": {"entity_type": "Shot"}}})),
        );
        assert!(
            matches!(result, Err(AppError::MissingSchemaKey(key)) if key == "properties.query.value.filters")
        );
    }

    #[test]
    fn parse_requires_entity_type() {
        let result = QueryFieldSchema::parse(
            "sg_field",
            &schema_document(json!({"query": {"value": {"filters": {"conditions": []}}}})),
        );
        assert!(
            matches!(result, Err(AppError::MissingSchemaKey(key)) if key == "properties.query.value.entity_type")
        );
    }

    #[test]
    fn summary_mode_errors_surface_lazily() {
        let schema = QueryFieldSchema::parse(
            "sg_field",
            &schema_document(json!({
                "query": {
                    "value": {
                        "entity_type": "Shot",
                        "filters": {"conditions": []},
                    },
                },
            })),
        )
        .unwrap_or_else(|_| unreachable!());

        assert!(matches!(
            schema.summary_mode(),
            Err(AppError::MissingSchemaKey(key)) if key == "properties.summary_default"
        ));
    }

    #[test]
    fn summary_mode_parses_dispatch_table() {
        for (raw, mode) in [
            ("single_record", SummaryMode::SingleRecord),
            ("percentage", SummaryMode::Percentage),
            ("record_count", SummaryMode::RecordCount),
            ("count", SummaryMode::Count),
            ("sum", SummaryMode::Sum),
            ("average", SummaryMode::Average),
            ("minimum", SummaryMode::Minimum),
            ("maximum", SummaryMode::Maximum),
        ] {
            assert_eq!(SummaryMode::from_str(raw).ok(), Some(mode));
        }
    }

    #[test]
    fn unknown_summary_mode_is_rejected() {
        let result = SummaryMode::from_str("median");
        assert!(
            matches!(result, Err(AppError::UnsupportedValueType(value)) if value == "median")
        );
    }

    #[test]
    fn summary_value_parses_scalar_shape() {
        let schema = QueryFieldSchema::parse(
            "sg_field",
            &schema_document(json!({
                "query": {"value": {"entity_type": "Shot", "filters": {"conditions": []}}},
                "summary_value": {"value": "Complete"},
            })),
        )
        .unwrap_or_else(|_| unreachable!());

        assert_eq!(
            schema.summary_value().ok(),
            Some(SummaryValue::Scalar("Complete".to_owned()))
        );
    }

    #[test]
    fn summary_value_parses_ordering_shape() {
        let schema = QueryFieldSchema::parse(
            "sg_field",
            &schema_document(json!({
                "query": {"value": {"entity_type": "Shot", "filters": {"conditions": []}}},
                "summary_value": {"value": {"column": "created_at", "direction": "desc", "limit": 3}},
            })),
        )
        .unwrap_or_else(|_| unreachable!());

        let SummaryValue::Ordering(ordering) =
            schema.summary_value().unwrap_or_else(|_| unreachable!())
        else {
            unreachable!();
        };
        assert_eq!(ordering.column(), Some("created_at"));
        assert_eq!(ordering.direction(), Some(SortDirection::Desc));
        assert_eq!(ordering.limit(), Some(3));
    }

    #[test]
    fn summary_value_ordering_tolerates_missing_order_keys() {
        let schema = QueryFieldSchema::parse(
            "sg_field",
            &schema_document(json!({
                "query": {"value": {"entity_type": "Shot", "filters": {"conditions": []}}},
                "summary_value": {"value": {"limit": 5}},
            })),
        )
        .unwrap_or_else(|_| unreachable!());

        let SummaryValue::Ordering(ordering) =
            schema.summary_value().unwrap_or_else(|_| unreachable!())
        else {
            unreachable!();
        };
        assert_eq!(ordering.column(), None);
        assert_eq!(ordering.direction(), None);
        assert_eq!(ordering.limit(), Some(5));
    }

    #[test]
    fn wire_filters_translate_root_conditions() {
        let schema = QueryFieldSchema::parse("sg_field", &schema_document(minimal_properties()))
            .unwrap_or_else(|_| unreachable!());

        let filters = schema
            .wire_filters(&ContextTokens::default())
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(filters.len(), 1);
        assert_eq!(
            filters[0].to_value(),
            json!(["sg_status_list", "is", ["ip"]])
        );
    }

    #[test]
    fn wire_filters_require_conditions_list() {
        let schema = QueryFieldSchema::parse(
            "sg_field",
            &schema_document(json!({
                "query": {"value": {"entity_type": "Shot", "filters": {"logical_operator": "and"}}},
            })),
        )
        .unwrap_or_else(|_| unreachable!());

        assert!(matches!(
            schema.wire_filters(&ContextTokens::default()),
            Err(AppError::MissingSchemaKey(key))
                if key == "properties.query.value.filters.conditions"
        ));
    }

    proptest! {
        #[test]
        fn logical_operator_parse_is_total_over_the_two_known_values(value in "[a-z]{1,8}") {
            let parsed = LogicalOperator::parse_transport(value.as_str());
            match value.as_str() {
                "and" => prop_assert_eq!(parsed.ok(), Some(LogicalOperator::And)),
                "or" => prop_assert_eq!(parsed.ok(), Some(LogicalOperator::Or)),
                _ => prop_assert!(matches!(
                    parsed,
                    Err(AppError::UnsupportedOperator(raw)) if raw == value
                )),
            }
        }
    }
}
