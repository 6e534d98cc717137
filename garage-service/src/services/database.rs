//! MongoDB-backed `DocumentStore`.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{self, doc, Bson, Document},
    error::{ErrorKind, WriteFailure},
    options::{FindOptions, IndexOptions, ReplaceOptions},
    Client as MongoClient, Collection, Database, IndexModel,
};
use serde_json::Value;
use service_core::error::AppError;
use tracing::{debug, info, instrument, warn};

use crate::models::{CatalogKind, JobCardStatus, INVOICES, JOBCARDS, VEHICLES};
use crate::services::metrics::STORE_OP_DURATION;
use crate::services::store::{DocumentStore, FilterOp, Mutation, Query, Snapshot, SortOrder, WriteBatch, WriteOp};

/// Version field bumped on every write that `modify` must not overwrite blindly.
const REV_FIELD: &str = "_rev";
const MODIFY_ATTEMPTS: u32 = 5;
const DUPLICATE_KEY: i32 = 11000;

#[derive(Clone)]
pub struct MongoDb {
    client: MongoClient,
    db: Database,
}

impl MongoDb {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        info!("Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            AppError::from(e)
        })?;
        let db = client.database(database);
        info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        info!("Creating MongoDB indexes for garage-service");

        self.create_index(VEHICLES, "customerId", "customer_lookup").await?;
        for kind in [CatalogKind::Stock, CatalogKind::Service] {
            self.create_index(kind.items_collection(), "category", "category_lookup")
                .await?;
        }
        self.create_index(JOBCARDS, "dateCreated", "date_created_order")
            .await?;
        for status in JobCardStatus::ALL {
            self.create_index(status.collection(), "dateCreated", "date_created_order")
                .await?;
        }
        self.create_index(INVOICES, "date", "date_order").await?;

        Ok(())
    }

    async fn create_index(&self, collection: &str, field: &str, name: &str) -> Result<(), AppError> {
        let index = IndexModel::builder()
            .keys(doc! { field: 1 })
            .options(IndexOptions::builder().name(name.to_string()).build())
            .build();

        self.collection(collection)
            .create_index(index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create {} index on {}: {}", name, collection, e);
                AppError::from(e)
            })?;
        info!("Created index on {}.{}", collection, field);
        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), AppError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                AppError::from(e)
            })?;
        Ok(())
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.db.collection(name)
    }

    async fn apply_in_session(
        &self,
        op: WriteOp,
        session: &mut mongodb::ClientSession,
    ) -> Result<(), AppError> {
        match op {
            WriteOp::Set {
                collection,
                id,
                data,
            } => {
                let mut options = ReplaceOptions::default();
                options.upsert = Some(true);
                self.collection(&collection)
                    .replace_one_with_session(
                        doc! { "_id": &id },
                        to_bson_document(&id, &data, None)?,
                        options,
                        session,
                    )
                    .await?;
            }
            WriteOp::Update {
                collection,
                id,
                fields,
            } => {
                let mut update = doc! { "$inc": { REV_FIELD: 1_i64 } };
                if !fields.is_empty() {
                    update.insert("$set", bson::to_document(&fields)?);
                }
                let result = self
                    .collection(&collection)
                    .update_one_with_session(doc! { "_id": &id }, update, None, session)
                    .await?;
                if result.matched_count == 0 {
                    return Err(AppError::NotFound(anyhow::anyhow!(
                        "Document {}/{} does not exist",
                        collection,
                        id
                    )));
                }
            }
            WriteOp::Delete { collection, id } => {
                self.collection(&collection)
                    .delete_one_with_session(doc! { "_id": &id }, None, session)
                    .await?;
            }
        }
        Ok(())
    }
}

fn to_bson_document(id: &str, data: &Value, rev: Option<i64>) -> Result<Document, AppError> {
    let mut document = bson::to_document(data)?;
    document.insert("_id", id);
    if let Some(rev) = rev {
        document.insert(REV_FIELD, rev);
    }
    Ok(document)
}

fn into_snapshot(mut document: Document) -> Result<Snapshot, AppError> {
    let id = match document.remove("_id") {
        Some(Bson::String(id)) => id,
        Some(other) => other.to_string(),
        None => {
            return Err(AppError::DatabaseError(anyhow::anyhow!(
                "Document without _id"
            )))
        }
    };
    document.remove(REV_FIELD);
    Ok(Snapshot {
        id,
        data: Bson::Document(document).into_relaxed_extjson(),
    })
}

fn add_condition(filter: &mut Document, field: &str, operator: &str, value: Bson) {
    match filter.get_mut(field) {
        Some(Bson::Document(conditions)) => {
            conditions.insert(operator, value);
        }
        _ => {
            let mut conditions = Document::new();
            conditions.insert(operator, value);
            filter.insert(field, conditions);
        }
    }
}

fn filter_document(query: &Query) -> Result<Document, AppError> {
    let mut filter = Document::new();
    for condition in &query.filters {
        let operator = match condition.op {
            FilterOp::Eq => "$eq",
            FilterOp::Lt => "$lt",
            FilterOp::Lte => "$lte",
            FilterOp::Gt => "$gt",
            FilterOp::Gte => "$gte",
        };
        add_condition(&mut filter, &condition.field, operator, bson::to_bson(&condition.value)?);
    }

    if let (Some((field, order)), Some(cursor)) = (&query.order_by, &query.start_after) {
        let operator = match order {
            SortOrder::Ascending => "$gt",
            SortOrder::Descending => "$lt",
        };
        add_condition(&mut filter, field, operator, bson::to_bson(cursor)?);
    }
    Ok(filter)
}

fn is_duplicate_key(error: &mongodb::error::Error) -> bool {
    matches!(
        error.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY
    )
}

#[async_trait]
impl DocumentStore for MongoDb {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Snapshot>, AppError> {
        let timer = STORE_OP_DURATION.with_label_values(&["get"]).start_timer();
        let document = self
            .collection(collection)
            .find_one(doc! { "_id": id }, None)
            .await?;
        timer.observe_duration();
        document.map(into_snapshot).transpose()
    }

    async fn list(&self, collection: &str) -> Result<Vec<Snapshot>, AppError> {
        self.query(collection, &Query::new()).await
    }

    #[instrument(skip(self, query), fields(collection = %collection))]
    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Snapshot>, AppError> {
        let timer = STORE_OP_DURATION.with_label_values(&["query"]).start_timer();

        let mut options = FindOptions::default();
        if let Some((field, order)) = &query.order_by {
            let direction = match order {
                SortOrder::Ascending => 1,
                SortOrder::Descending => -1,
            };
            let mut sort = Document::new();
            sort.insert(field.as_str(), direction);
            options.sort = Some(sort);
        }
        options.limit = query.limit.map(|limit| limit as i64);

        let cursor = self
            .collection(collection)
            .find(filter_document(query)?, options)
            .await?;
        let documents: Vec<Document> = cursor.try_collect().await?;
        timer.observe_duration();

        debug!(count = documents.len(), "Query returned documents");
        documents.into_iter().map(into_snapshot).collect()
    }

    #[instrument(skip(self, batch), fields(ops = batch.len()))]
    async fn commit(&self, batch: WriteBatch) -> Result<(), AppError> {
        let timer = STORE_OP_DURATION.with_label_values(&["commit"]).start_timer();

        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        for op in batch.into_ops() {
            if let Err(e) = self.apply_in_session(op, &mut session).await {
                if let Err(abort) = session.abort_transaction().await {
                    warn!(error = %abort, "Failed to abort transaction");
                }
                return Err(e);
            }
        }

        session.commit_transaction().await?;
        timer.observe_duration();
        Ok(())
    }

    #[instrument(skip(self, mutation), fields(collection = %collection, id = %id))]
    async fn modify(
        &self,
        collection: &str,
        id: &str,
        mutation: Mutation<'_>,
    ) -> Result<Value, AppError> {
        let timer = STORE_OP_DURATION.with_label_values(&["modify"]).start_timer();
        let documents = self.collection(collection);

        for attempt in 1..=MODIFY_ATTEMPTS {
            let existing = documents.find_one(doc! { "_id": id }, None).await?;
            let rev = existing.as_ref().and_then(|d| d.get_i64(REV_FIELD).ok());
            let current = existing
                .map(into_snapshot)
                .transpose()?
                .map(|snapshot| snapshot.data);

            let next = mutation(current.as_ref())?;
            let replacement = to_bson_document(id, &next, Some(rev.unwrap_or(0) + 1))?;

            let written = match (current.is_some(), rev) {
                (false, _) => match documents.insert_one(replacement, None).await {
                    Ok(_) => true,
                    Err(e) if is_duplicate_key(&e) => false,
                    Err(e) => return Err(e.into()),
                },
                (true, Some(rev)) => {
                    documents
                        .replace_one(doc! { "_id": id, REV_FIELD: rev }, replacement, None)
                        .await?
                        .matched_count
                        == 1
                }
                (true, None) => {
                    documents
                        .replace_one(
                            doc! { "_id": id, REV_FIELD: { "$exists": false } },
                            replacement,
                            None,
                        )
                        .await?
                        .matched_count
                        == 1
                }
            };

            if written {
                timer.observe_duration();
                return Ok(next);
            }
            debug!(attempt, "Concurrent modification detected, retrying");
        }

        Err(AppError::Conflict(anyhow::anyhow!(
            "Document {}/{} kept changing during update",
            collection,
            id
        )))
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn range_and_cursor_conditions_share_a_field() {
        let query = Query::new()
            .eq("status", "Open")
            .filter("dateCreated", FilterOp::Gte, 100)
            .order_by("dateCreated", SortOrder::Descending)
            .start_after(500);
        let filter = filter_document(&query).unwrap();
        assert_eq!(
            filter,
            doc! {
                "status": { "$eq": "Open" },
                "dateCreated": { "$gte": 100_i64, "$lt": 500_i64 },
            }
        );
    }

    #[test]
    fn snapshots_hide_storage_fields() {
        let document = to_bson_document("c1", &json!({ "name": "Ravi", "count": 3 }), Some(4)).unwrap();
        let snapshot = into_snapshot(document).unwrap();
        assert_eq!(snapshot.id, "c1");
        assert_eq!(snapshot.data, json!({ "name": "Ravi", "count": 3 }));
    }
}
