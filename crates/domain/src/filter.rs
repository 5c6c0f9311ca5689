use serde_json::{Map, Value, json};

use trackfield_core::{AppError, AppResult, EntityRef};

/// Logical composition operator in the wire filter grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupOperator {
    /// Every nested filter must match.
    All,
    /// Any nested filter may match.
    Any,
}

impl GroupOperator {
    /// Returns the stable wire value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Any => "any",
        }
    }
}

/// Logical operator declared on a filter-definition group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    /// Every condition must match.
    And,
    /// Any condition may match.
    Or,
}

impl LogicalOperator {
    /// Parses the schema value into a logical operator.
    pub fn parse_transport(value: &str) -> AppResult<Self> {
        match value {
            "and" => Ok(Self::And),
            "or" => Ok(Self::Or),
            _ => Err(AppError::UnsupportedOperator(value.to_owned())),
        }
    }

    /// Returns the stable schema value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }

    /// Maps the schema operator onto the wire grammar.
    #[must_use]
    pub fn group_operator(&self) -> GroupOperator {
        match self {
            Self::And => GroupOperator::All,
            Self::Or => GroupOperator::Any,
        }
    }
}

/// Contextual identities shared by every node of one resolution's filter tree.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContextTokens {
    parent_entity: Option<EntityRef>,
    logged_in_user: Option<EntityRef>,
}

impl ContextTokens {
    /// Creates the token context for one resolution.
    #[must_use]
    pub fn new(parent_entity: Option<EntityRef>, logged_in_user: Option<EntityRef>) -> Self {
        Self {
            parent_entity,
            logged_in_user,
        }
    }

    /// Returns the record whose field is being computed, when known.
    #[must_use]
    pub fn parent_entity(&self) -> Option<&EntityRef> {
        self.parent_entity.as_ref()
    }

    /// Returns the acting user, when known.
    #[must_use]
    pub fn logged_in_user(&self) -> Option<&EntityRef> {
        self.logged_in_user.as_ref()
    }
}

/// Comparison operand of a filter-definition condition, decided once at parse
/// time from the shape of the first `values` element.
///
/// Filter authors may write conditions against contextual shortcuts ("Me",
/// "Current Shot") that carry no concrete id at definition time; those arrive
/// as tagged descriptors and are substituted from [`ContextTokens`] during
/// translation. Only the first element of `values` decides the handling of
/// the whole condition.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// Literal values passed through unchanged, as the full ordered list.
    Scalars(Vec<Value>),
    /// A concrete entity reference, reduced to `{type, id}`.
    Reference(EntityRef),
    /// Placeholder for the record owning the field.
    ParentEntityToken,
    /// Placeholder for the acting user.
    LoggedInUserToken,
    /// A virtual zero-id reference with no resolvable identity; the condition
    /// is dropped from the translated filters.
    Placeholder,
}

/// One parsed condition of a filter-definition tree.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionDefinition {
    path: String,
    relation: String,
    value: FilterValue,
}

impl ConditionDefinition {
    /// Returns the field path on the queried entity type.
    #[must_use]
    pub fn path(&self) -> &str {
        self.path.as_str()
    }

    /// Returns the comparison operator, passed through unchanged.
    #[must_use]
    pub fn relation(&self) -> &str {
        self.relation.as_str()
    }

    /// Returns the parsed comparison operand.
    #[must_use]
    pub fn value(&self) -> &FilterValue {
        &self.value
    }
}

/// One parsed logical group of a filter-definition tree.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupDefinition {
    operator: LogicalOperator,
    multivalued_subgroup: bool,
    conditions: Vec<FilterDefinition>,
}

impl GroupDefinition {
    /// Returns the declared logical operator.
    #[must_use]
    pub fn operator(&self) -> LogicalOperator {
        self.operator
    }

    /// Returns the multivalued-condition-subgroup flag, carried through from
    /// the schema without interpretation.
    #[must_use]
    pub fn multivalued_subgroup(&self) -> bool {
        self.multivalued_subgroup
    }

    /// Returns the active child nodes in schema order.
    #[must_use]
    pub fn conditions(&self) -> &[FilterDefinition] {
        &self.conditions
    }
}

/// One node of a query field's filter definition: either a comparison
/// condition or a logical group of child nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterDefinition {
    /// Leaf comparison condition.
    Condition(ConditionDefinition),
    /// Logical group of child nodes.
    Group(GroupDefinition),
}

impl FilterDefinition {
    /// Parses one raw filter-definition node.
    ///
    /// Returns `Ok(None)` for inactive nodes: the `active` flag is the string
    /// `"false"` (some schemas omit the key entirely, which means active),
    /// and an inactive node prunes its whole subtree before any further
    /// validation. A node is a group when it carries a non-empty `conditions`
    /// list, a leaf condition otherwise.
    pub fn parse(raw: &Value) -> AppResult<Option<Self>> {
        let Some(node) = raw.as_object() else {
            return Err(AppError::Validation(
                "filter definition node must be a JSON object".to_owned(),
            ));
        };

        let active = match node.get("active") {
            None => true,
            Some(value) => value.as_str().map(|flag| flag == "true").unwrap_or(false),
        };
        if !active {
            return Ok(None);
        }

        match node.get("conditions") {
            Some(Value::Array(children)) if !children.is_empty() => {
                Self::parse_group(node, children).map(Some)
            }
            Some(value) if !value.is_array() && !value.is_null() => Err(AppError::Validation(
                "filter definition conditions must be a JSON array".to_owned(),
            )),
            _ => Self::parse_condition(node).map(Some),
        }
    }

    fn parse_group(node: &Map<String, Value>, children: &[Value]) -> AppResult<Self> {
        let operator = match node.get("logical_operator").and_then(Value::as_str) {
            Some(value) => LogicalOperator::parse_transport(value)?,
            None => return Err(AppError::MissingSchemaKey("logical_operator".to_owned())),
        };

        let multivalued_subgroup = node
            .get("qb_multivalued_condition_subgroup")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let mut conditions = Vec::with_capacity(children.len());
        for child in children {
            if let Some(parsed) = Self::parse(child)? {
                conditions.push(parsed);
            }
        }

        Ok(Self::Group(GroupDefinition {
            operator,
            multivalued_subgroup,
            conditions,
        }))
    }

    fn parse_condition(node: &Map<String, Value>) -> AppResult<Self> {
        let path = node
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::Validation("filter condition is missing 'path'".to_owned()))?;
        let relation = node.get("relation").and_then(Value::as_str).ok_or_else(|| {
            AppError::Validation("filter condition is missing 'relation'".to_owned())
        })?;

        let values: &[Value] = match node.get("values") {
            Some(Value::Array(values)) => values.as_slice(),
            Some(Value::Null) | None => &[],
            Some(_) => {
                return Err(AppError::Validation(
                    "filter condition values must be a JSON array".to_owned(),
                ));
            }
        };
        let Some(first) = values.first() else {
            return Err(AppError::Validation(
                "filter condition carries no values".to_owned(),
            ));
        };

        let value = match first.as_object() {
            Some(descriptor) => Self::parse_descriptor(descriptor)?,
            None => FilterValue::Scalars(values.to_vec()),
        };

        Ok(Self::Condition(ConditionDefinition {
            path: path.to_owned(),
            relation: relation.to_owned(),
            value,
        }))
    }

    // Token tags win over the zero-id check: contextual descriptors are stored
    // with id 0 *and* a `valid` tag naming the token kind.
    fn parse_descriptor(descriptor: &Map<String, Value>) -> AppResult<FilterValue> {
        match descriptor.get("valid").and_then(Value::as_str) {
            Some("parent_entity_token") => return Ok(FilterValue::ParentEntityToken),
            Some("logged_in_user_token") => return Ok(FilterValue::LoggedInUserToken),
            _ => {}
        }

        if descriptor.get("id").and_then(Value::as_i64) == Some(0) {
            return Ok(FilterValue::Placeholder);
        }

        let entity_type = descriptor
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AppError::Validation("entity reference value is missing 'type'".to_owned())
            })?;
        let id = descriptor.get("id").and_then(Value::as_i64).ok_or_else(|| {
            AppError::Validation("entity reference value is missing 'id'".to_owned())
        })?;

        Ok(FilterValue::Reference(EntityRef::new(entity_type, id)?))
    }

    /// Translates the node into the wire filter grammar, substituting context
    /// tokens from the shared token context.
    ///
    /// Returns `None` when the node cannot be expressed as a concrete filter
    /// (a virtual zero-id placeholder). An unknown context token does not
    /// drop the condition: the operand becomes JSON `null` and the remote
    /// service applies its own semantics.
    #[must_use]
    pub fn to_query_filter(&self, tokens: &ContextTokens) -> Option<QueryFilter> {
        match self {
            Self::Condition(condition) => {
                let operand = match condition.value() {
                    FilterValue::Scalars(values) => Value::Array(values.clone()),
                    FilterValue::Reference(reference) => entity_ref_operand(reference),
                    FilterValue::ParentEntityToken => tokens
                        .parent_entity()
                        .map(entity_ref_operand)
                        .unwrap_or(Value::Null),
                    FilterValue::LoggedInUserToken => tokens
                        .logged_in_user()
                        .map(entity_ref_operand)
                        .unwrap_or(Value::Null),
                    FilterValue::Placeholder => return None,
                };

                Some(QueryFilter::Condition(FilterCondition::new(
                    condition.path(),
                    condition.relation(),
                    operand,
                )))
            }
            Self::Group(group) => {
                let filters = group
                    .conditions()
                    .iter()
                    .filter_map(|child| child.to_query_filter(tokens))
                    .collect();

                Some(QueryFilter::Group(FilterGroup::new(
                    group.operator().group_operator(),
                    filters,
                )))
            }
        }
    }
}

/// `[path, relation, operand]` comparison triple in the wire grammar.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition {
    path: String,
    relation: String,
    operand: Value,
}

impl FilterCondition {
    /// Creates a wire comparison triple.
    #[must_use]
    pub fn new(path: impl Into<String>, relation: impl Into<String>, operand: Value) -> Self {
        Self {
            path: path.into(),
            relation: relation.into(),
            operand,
        }
    }

    /// Returns the field path.
    #[must_use]
    pub fn path(&self) -> &str {
        self.path.as_str()
    }

    /// Returns the comparison operator.
    #[must_use]
    pub fn relation(&self) -> &str {
        self.relation.as_str()
    }

    /// Returns the comparison operand.
    #[must_use]
    pub fn operand(&self) -> &Value {
        &self.operand
    }
}

/// Nested logical group in the wire grammar.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterGroup {
    operator: GroupOperator,
    filters: Vec<QueryFilter>,
}

impl FilterGroup {
    /// Creates a wire filter group.
    #[must_use]
    pub fn new(operator: GroupOperator, filters: Vec<QueryFilter>) -> Self {
        Self { operator, filters }
    }

    /// Returns the group composition operator.
    #[must_use]
    pub fn operator(&self) -> GroupOperator {
        self.operator
    }

    /// Returns the nested filters in order.
    #[must_use]
    pub fn filters(&self) -> &[QueryFilter] {
        &self.filters
    }
}

/// One filter expression accepted by the tracking service.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryFilter {
    /// `[path, relation, operand]` comparison.
    Condition(FilterCondition),
    /// `{"filter_operator": ..., "filters": [...]}` group.
    Group(FilterGroup),
}

impl QueryFilter {
    /// Renders the exact wire JSON for this expression.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Condition(condition) => json!([
                condition.path(),
                condition.relation(),
                condition.operand(),
            ]),
            Self::Group(group) => json!({
                "filter_operator": group.operator().as_str(),
                "filters": group
                    .filters()
                    .iter()
                    .map(QueryFilter::to_value)
                    .collect::<Vec<_>>(),
            }),
        }
    }
}

fn entity_ref_operand(reference: &EntityRef) -> Value {
    json!({"type": reference.entity_type(), "id": reference.id()})
}
