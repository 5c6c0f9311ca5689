use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use trackfield_core::{AppError, AppResult, EntityRef};

/// One record returned by the tracking service.
///
/// Records are JSON objects whose guaranteed keys are `type` and `id`; the
/// requested fields appear alongside them. Reference-typed field values are
/// `{type, id, name}` objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityRecord {
    fields: Map<String, Value>,
}

impl EntityRecord {
    /// Creates a record from a JSON object payload.
    pub fn new(payload: Value) -> AppResult<Self> {
        let Value::Object(fields) = payload else {
            return Err(AppError::Validation(
                "entity record payload must be a JSON object".to_owned(),
            ));
        };

        Ok(Self { fields })
    }

    /// Returns one field value when present.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Sets one field value, replacing any existing value.
    pub fn set_field(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    /// Returns the record's `{type, id}` identity when both keys are present.
    #[must_use]
    pub fn entity_ref(&self) -> Option<EntityRef> {
        let entity_type = self.fields.get("type")?.as_str()?;
        let id = self.fields.get("id")?.as_i64()?;
        EntityRef::new(entity_type, id).ok()
    }

    /// Returns the raw field map.
    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::EntityRecord;

    #[test]
    fn record_requires_object_payload() {
        let result = EntityRecord::new(json!("not-object"));
        assert!(result.is_err());
    }

    #[test]
    fn entity_ref_reads_type_and_id() {
        let record = EntityRecord::new(json!({"type": "Shot", "id": 5024, "code": "sh010"}))
            .unwrap_or_else(|_| unreachable!());
        let reference = record.entity_ref();
        assert!(reference.is_some());

        let reference = reference.unwrap_or_else(|| unreachable!());
        assert_eq!(reference.entity_type(), "Shot");
        assert_eq!(reference.id(), 5024);
    }

    #[test]
    fn entity_ref_is_absent_without_id() {
        let record =
            EntityRecord::new(json!({"type": "Shot", "code": "sh010"})).unwrap_or_else(|_| unreachable!());
        assert!(record.entity_ref().is_none());
    }

    #[test]
    fn set_field_replaces_existing_value() {
        let mut record = EntityRecord::new(json!({"type": "Shot", "id": 1, "status": "ip"}))
            .unwrap_or_else(|_| unreachable!());
        record.set_field("status", json!("fin"));
        assert_eq!(record.field("status"), Some(&json!("fin")));
    }
}
