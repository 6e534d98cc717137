//! Document store capability consumed by every garage service.
//!
//! Documents are JSON objects addressed by `(collection, id)`. Besides
//! single-document reads the store offers equality/range queries, atomic
//! multi-document batches and an atomic read-modify-write primitive.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use service_core::error::AppError;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A document read from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub id: String,
    pub data: Value,
}

impl Snapshot {
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, AppError> {
        serde_json::from_value(self.data.clone()).map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Malformed document {}: {}", self.id, e))
        })
    }
}

/// Serialize a model into a storable JSON object.
pub fn to_document<T: Serialize>(value: &T) -> Result<Value, AppError> {
    let value = serde_json::to_value(value)?;
    if !value.is_object() {
        return Err(AppError::InternalError(anyhow::anyhow!(
            "Documents must serialize to JSON objects"
        )));
    }
    Ok(value)
}

/// Serialize a model into the field map used by `WriteOp::Update`.
pub fn to_fields<T: Serialize>(value: &T) -> Result<Map<String, Value>, AppError> {
    match to_document(value)? {
        Value::Object(fields) => Ok(fields),
        _ => unreachable!("to_document only returns objects"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Lt,
    Lte,
    Gt,
    Gte,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    fn accepts(&self, data: &Value) -> bool {
        let Some(actual) = data.get(&self.field) else {
            return false;
        };
        if self.op == FilterOp::Eq {
            return actual == &self.value;
        }
        match compare_values(actual, &self.value) {
            Some(ordering) => match self.op {
                FilterOp::Lt => ordering == Ordering::Less,
                FilterOp::Lte => ordering != Ordering::Greater,
                FilterOp::Gt => ordering == Ordering::Greater,
                FilterOp::Gte => ordering != Ordering::Less,
                FilterOp::Eq => ordering == Ordering::Equal,
            },
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Equality and range filters with optional ordering, limit and cursor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order_by: Option<(String, SortOrder)>,
    pub limit: Option<usize>,
    /// Value of the `order_by` field of the last document already seen.
    pub start_after: Option<Value>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, field: &str, op: FilterOp, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.to_string(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(field, FilterOp::Eq, value)
    }

    pub fn order_by(mut self, field: &str, order: SortOrder) -> Self {
        self.order_by = Some((field.to_string(), order));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn start_after(mut self, cursor: impl Into<Value>) -> Self {
        self.start_after = Some(cursor.into());
        self
    }

    pub fn matches(&self, data: &Value) -> bool {
        self.filters.iter().all(|f| f.accepts(data))
    }

    /// Evaluate the query over a full collection held in memory.
    pub fn apply(&self, mut docs: Vec<Snapshot>) -> Vec<Snapshot> {
        docs.retain(|doc| self.matches(&doc.data));

        if let Some((field, order)) = &self.order_by {
            docs.sort_by(|a, b| {
                let ordering = match (a.data.get(field), b.data.get(field)) {
                    (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
                    (Some(_), None) => Ordering::Greater,
                    (None, Some(_)) => Ordering::Less,
                    (None, None) => Ordering::Equal,
                };
                match order {
                    SortOrder::Ascending => ordering,
                    SortOrder::Descending => ordering.reverse(),
                }
            });

            if let Some(cursor) = &self.start_after {
                docs.retain(|doc| {
                    let Some(value) = doc.data.get(field) else {
                        return false;
                    };
                    match (compare_values(value, cursor), order) {
                        (Some(Ordering::Greater), SortOrder::Ascending) => true,
                        (Some(Ordering::Less), SortOrder::Descending) => true,
                        _ => false,
                    }
                });
            }
        }

        if let Some(limit) = self.limit {
            docs.truncate(limit);
        }
        docs
    }
}

fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// One write inside an atomic batch.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Create or overwrite the whole document.
    Set {
        collection: String,
        id: String,
        data: Value,
    },
    /// Merge fields into an existing document; fails when it is absent.
    Update {
        collection: String,
        id: String,
        fields: Map<String, Value>,
    },
    /// Remove the document; absent documents are ignored.
    Delete { collection: String, id: String },
}

impl WriteOp {
    pub fn collection(&self) -> &str {
        match self {
            WriteOp::Set { collection, .. }
            | WriteOp::Update { collection, .. }
            | WriteOp::Delete { collection, .. } => collection,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            WriteOp::Set { id, .. } | WriteOp::Update { id, .. } | WriteOp::Delete { id, .. } => id,
        }
    }
}

/// Writes applied all-or-nothing by `DocumentStore::commit`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, collection: &str, id: &str, data: Value) -> &mut Self {
        self.ops.push(WriteOp::Set {
            collection: collection.to_string(),
            id: id.to_string(),
            data,
        });
        self
    }

    pub fn update(&mut self, collection: &str, id: &str, fields: Map<String, Value>) -> &mut Self {
        self.ops.push(WriteOp::Update {
            collection: collection.to_string(),
            id: id.to_string(),
            fields,
        });
        self
    }

    pub fn delete(&mut self, collection: &str, id: &str) -> &mut Self {
        self.ops.push(WriteOp::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

/// Read-modify-write callback: receives the current document (if any) and
/// returns the replacement.
pub type Mutation<'a> = &'a (dyn Fn(Option<&Value>) -> Result<Value, AppError> + Send + Sync);

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Snapshot>, AppError>;

    async fn list(&self, collection: &str) -> Result<Vec<Snapshot>, AppError>;

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Snapshot>, AppError>;

    /// Apply every write in the batch or none of them.
    async fn commit(&self, batch: WriteBatch) -> Result<(), AppError>;

    /// Atomically replace one document with the mutation's result.
    async fn modify(
        &self,
        collection: &str,
        id: &str,
        mutation: Mutation<'_>,
    ) -> Result<Value, AppError>;

    /// Cheap reachability probe used by readiness checks.
    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

pub async fn get_as<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: &str,
    id: &str,
) -> Result<Option<T>, AppError> {
    store
        .get(collection, id)
        .await?
        .map(|snapshot| snapshot.decode())
        .transpose()
}

pub async fn list_as<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: &str,
) -> Result<Vec<T>, AppError> {
    store
        .list(collection)
        .await?
        .iter()
        .map(Snapshot::decode)
        .collect()
}

pub async fn query_as<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: &str,
    query: &Query,
) -> Result<Vec<T>, AppError> {
    store
        .query(collection, query)
        .await?
        .iter()
        .map(Snapshot::decode)
        .collect()
}

#[derive(Default)]
struct MemoryState {
    collections: BTreeMap<String, BTreeMap<String, Value>>,
    fail_next_commit_at: Option<usize>,
    collection_reads: u64,
}

/// Process-local store used by tests and single-process embedding.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `commit` fail when it reaches operation `op_index`.
    pub async fn fail_next_commit_at(&self, op_index: usize) {
        self.state.write().await.fail_next_commit_at = Some(op_index);
    }

    /// Number of `list`/`query` calls served so far.
    pub async fn collection_reads(&self) -> u64 {
        self.state.read().await.collection_reads
    }

    pub async fn collection_len(&self, collection: &str) -> usize {
        self.state
            .read()
            .await
            .collections
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    fn snapshots(docs: Option<&BTreeMap<String, Value>>) -> Vec<Snapshot> {
        docs.map(|docs| {
            docs.iter()
                .map(|(id, data)| Snapshot {
                    id: id.clone(),
                    data: data.clone(),
                })
                .collect()
        })
        .unwrap_or_default()
    }
}

fn apply_op(
    collections: &mut BTreeMap<String, BTreeMap<String, Value>>,
    op: WriteOp,
) -> Result<(), AppError> {
    match op {
        WriteOp::Set {
            collection,
            id,
            data,
        } => {
            collections.entry(collection).or_default().insert(id, data);
        }
        WriteOp::Update {
            collection,
            id,
            fields,
        } => {
            let doc = collections
                .get_mut(&collection)
                .and_then(|docs| docs.get_mut(&id))
                .and_then(Value::as_object_mut)
                .ok_or_else(|| {
                    AppError::NotFound(anyhow::anyhow!(
                        "Document {}/{} does not exist",
                        collection,
                        id
                    ))
                })?;
            doc.extend(fields);
        }
        WriteOp::Delete { collection, id } => {
            if let Some(docs) = collections.get_mut(&collection) {
                docs.remove(&id);
            }
        }
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Snapshot>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|data| Snapshot {
                id: id.to_string(),
                data: data.clone(),
            }))
    }

    async fn list(&self, collection: &str) -> Result<Vec<Snapshot>, AppError> {
        let mut state = self.state.write().await;
        state.collection_reads += 1;
        Ok(Self::snapshots(state.collections.get(collection)))
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Snapshot>, AppError> {
        let mut state = self.state.write().await;
        state.collection_reads += 1;
        Ok(query.apply(Self::snapshots(state.collections.get(collection))))
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        let fail_at = state.fail_next_commit_at.take();

        let mut staged = state.collections.clone();
        for (index, op) in batch.into_ops().into_iter().enumerate() {
            if fail_at == Some(index) {
                return Err(AppError::DatabaseError(anyhow::anyhow!(
                    "Write rejected at operation {} ({}/{})",
                    index,
                    op.collection(),
                    op.id()
                )));
            }
            apply_op(&mut staged, op)?;
        }

        state.collections = staged;
        Ok(())
    }

    async fn modify(
        &self,
        collection: &str,
        id: &str,
        mutation: Mutation<'_>,
    ) -> Result<Value, AppError> {
        let mut state = self.state.write().await;
        let next = mutation(state.collections.get(collection).and_then(|docs| docs.get(id)))?;
        if !next.is_object() {
            return Err(AppError::InternalError(anyhow::anyhow!(
                "Documents must be JSON objects"
            )));
        }
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), next.clone());
        Ok(next)
    }
}
