use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use trackfield_core::{AppResult, EntityRef};
use trackfield_domain::EntityRecord;

use crate::tracking_ports::{RecordQuery, TrackingClient};

mod resolver;

pub use resolver::QueryFieldResolver;

/// Application service that decorates find results with resolved query-field
/// values.
///
/// The remote service reports query fields in the entity schema but does not
/// compute them for API callers; this service discovers them, resolves each
/// one against the live record, and writes the display text back into the
/// record's field slot.
#[derive(Clone)]
pub struct QueryFieldService {
    client: Arc<dyn TrackingClient>,
}

impl QueryFieldService {
    /// Creates a new service from a tracking-service client.
    #[must_use]
    pub fn new(client: Arc<dyn TrackingClient>) -> Self {
        Self { client }
    }

    /// Returns the schemas of fields whose definition declares a query
    /// section, keyed by field name.
    pub async fn query_field_schemas(
        &self,
        entity_type: &str,
    ) -> AppResult<BTreeMap<String, Value>> {
        let schema = self.client.schema_field_read(entity_type).await?;

        Ok(schema
            .into_iter()
            .filter(|(_, definition)| {
                definition
                    .get("properties")
                    .and_then(|properties| properties.get("query"))
                    .is_some()
            })
            .collect())
    }

    /// Finds records and resolves every requested query field on each one.
    ///
    /// Records keep their input order; fields that are not query fields pass
    /// through untouched. A query field that cannot be computed resolves to
    /// empty text, but a schema that cannot even be interpreted fails the
    /// whole call.
    pub async fn find_with_query_fields(
        &self,
        entity_type: &str,
        query: RecordQuery,
        logged_in_user: Option<EntityRef>,
    ) -> AppResult<Vec<EntityRecord>> {
        let records = self.client.find(entity_type, query.clone()).await?;
        if records.is_empty() {
            return Ok(records);
        }

        let query_fields = self.requested_query_fields(entity_type, &query.fields).await?;
        if query_fields.is_empty() {
            return Ok(records);
        }

        let mut decorated = Vec::with_capacity(records.len());
        for record in records {
            decorated.push(
                self.attach_query_fields(record, &query_fields, logged_in_user.as_ref())
                    .await?,
            );
        }

        Ok(decorated)
    }

    /// Finds one record and resolves every requested query field on it.
    pub async fn find_one_with_query_fields(
        &self,
        entity_type: &str,
        query: RecordQuery,
        logged_in_user: Option<EntityRef>,
    ) -> AppResult<Option<EntityRecord>> {
        let Some(record) = self.client.find_one(entity_type, query.clone()).await? else {
            return Ok(None);
        };

        let query_fields = self.requested_query_fields(entity_type, &query.fields).await?;
        if query_fields.is_empty() {
            return Ok(Some(record));
        }

        self.attach_query_fields(record, &query_fields, logged_in_user.as_ref())
            .await
            .map(Some)
    }

    async fn requested_query_fields(
        &self,
        entity_type: &str,
        requested_fields: &[String],
    ) -> AppResult<BTreeMap<String, Value>> {
        let mut query_fields = self.query_field_schemas(entity_type).await?;
        query_fields.retain(|field_name, _| requested_fields.contains(field_name));
        Ok(query_fields)
    }

    async fn attach_query_fields(
        &self,
        mut record: EntityRecord,
        query_fields: &BTreeMap<String, Value>,
        logged_in_user: Option<&EntityRef>,
    ) -> AppResult<EntityRecord> {
        let parent_entity = record.entity_ref();

        for (field_name, field_schema) in query_fields {
            let resolver = QueryFieldResolver::new(
                Arc::clone(&self.client),
                field_name.as_str(),
                field_schema,
                parent_entity.clone(),
                logged_in_user.cloned(),
            )?;
            let value = resolver.resolve_value().await;
            record.set_field(field_name.as_str(), Value::String(value));
        }

        Ok(record)
    }
}
