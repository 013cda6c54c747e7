//! SQLite-backed document store.
//!
//! # Responsibility
//! - Persist JSON documents per collection in the shared `documents` table.
//! - Enforce the collection's unique and required fields at write time.
//! - Translate equality filters into `json_extract` predicates.
//!
//! # Invariants
//! - Unique fields are backed by one unique expression index each, so
//!   concurrent inserts race inside SQLite and exactly one wins.
//! - Blocking SQLite calls run on tokio's blocking pool, never on the caller's task.

use super::{
    CollectionSpec, Document, DocumentStore, Filter, StoreError, StoreResult, ID_FIELD,
};
use crate::config::CoreConfig;
use crate::db::{open_db, open_db_in_memory};
use crate::schema::persistence_view;
use async_trait::async_trait;
use log::{debug, info};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Document collection stored in SQLite.
///
/// Cheap to clone; clones share the same connection.
#[derive(Clone)]
pub struct SqliteDocumentStore {
    conn: Arc<Mutex<Connection>>,
    spec: Arc<CollectionSpec>,
}

impl SqliteDocumentStore {
    /// Wraps a migrated connection and creates the collection's unique indexes.
    pub fn open(conn: Connection, spec: CollectionSpec) -> StoreResult<Self> {
        ensure_unique_indexes(&conn, &spec)?;
        info!(
            "event=store_open module=store status=ok collection={} unique_fields={}",
            spec.name,
            spec.unique.len()
        );
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            spec: Arc::new(spec),
        })
    }

    pub fn spec(&self) -> &CollectionSpec {
        &self.spec
    }

    async fn run<T, F>(&self, op: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection, &CollectionSpec) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let spec = Arc::clone(&self.spec);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| StoreError::Unavailable("sqlite connection lock poisoned".to_string()))?;
            op(&*guard, &*spec)
        })
        .await
        .map_err(|err| StoreError::Unavailable(format!("sqlite task failed: {err}")))?
    }
}

/// Opens the branch collection configured by `config`.
///
/// Uses the database file at `config.db_path`, or an in-memory database when unset.
pub fn open_branch_store(config: &CoreConfig) -> StoreResult<SqliteDocumentStore> {
    let conn = match &config.db_path {
        Some(path) => open_db(path)?,
        None => open_db_in_memory()?,
    };
    SqliteDocumentStore::open(conn, persistence_view())
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn insert(&self, document: Document) -> StoreResult<Document> {
        self.run(move |conn, spec| insert_document(conn, spec, document))
            .await
    }

    async fn find_many(&self, filter: &Filter, limit: Option<u32>) -> StoreResult<Vec<Document>> {
        let filter = filter.clone();
        self.run(move |conn, spec| select_documents(conn, spec, &filter, limit))
            .await
    }

    async fn find_one(&self, filter: &Filter) -> StoreResult<Option<Document>> {
        let filter = filter.clone();
        self.run(move |conn, spec| {
            Ok(select_documents(conn, spec, &filter, Some(1))?
                .into_iter()
                .next())
        })
        .await
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Document>> {
        let id = parse_id(id)?;
        self.run(move |conn, spec| {
            let mut stmt = conn.prepare(
                "SELECT id, body FROM documents WHERE collection = ?1 AND id = ?2;",
            )?;
            let mut rows = stmt.query(params![spec.name, id.to_string()])?;
            match rows.next()? {
                Some(row) => Ok(Some(decode_row(row.get(0)?, row.get(1)?)?)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn delete_all(&self) -> StoreResult<u64> {
        self.run(|conn, spec| {
            let removed = conn.execute(
                "DELETE FROM documents WHERE collection = ?1;",
                params![spec.name],
            )?;
            debug!(
                "event=store_delete_all module=store status=ok collection={} removed={removed}",
                spec.name
            );
            Ok(removed as u64)
        })
        .await
    }
}

fn ensure_unique_indexes(conn: &Connection, spec: &CollectionSpec) -> StoreResult<()> {
    for field in &spec.unique {
        let path = json_path(field)?;
        conn.execute_batch(&format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS \"uq_{collection}_{field}\"
                ON documents (collection, json_extract(body, '{path}'))
                WHERE collection = '{collection}';",
            collection = spec.name,
        ))?;
    }
    Ok(())
}

fn insert_document(
    conn: &Connection,
    spec: &CollectionSpec,
    mut document: Document,
) -> StoreResult<Document> {
    // Identity is always assigned here.
    document.remove(ID_FIELD);

    for (field, default) in &spec.defaults {
        if document.get(*field).map_or(true, Value::is_null) {
            document.insert((*field).to_string(), default.clone());
        }
    }

    for field in &spec.required {
        if document.get(*field).map_or(true, Value::is_null) {
            return Err(StoreError::ConstraintViolation {
                constraint: format!("{}.{field}.required", spec.name),
                message: format!("field `{field}` is required"),
            });
        }
    }

    let id = Uuid::new_v4();
    let body = serde_json::to_string(&document)?;
    conn.execute(
        "INSERT INTO documents (id, collection, body) VALUES (?1, ?2, ?3);",
        params![id.to_string(), spec.name, body],
    )?;

    document.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
    Ok(document)
}

fn select_documents(
    conn: &Connection,
    spec: &CollectionSpec,
    filter: &Filter,
    limit: Option<u32>,
) -> StoreResult<Vec<Document>> {
    let mut sql = String::from("SELECT id, body FROM documents WHERE collection = ?");
    let mut bind_values = vec![SqlValue::Text(spec.name.to_string())];

    for (key, value) in filter {
        push_predicate(&mut sql, &mut bind_values, key, value)?;
    }

    sql.push_str(" ORDER BY seq ASC");
    if let Some(limit) = limit {
        sql.push_str(" LIMIT ?");
        bind_values.push(SqlValue::Integer(i64::from(limit)));
    }

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(bind_values))?;
    let mut documents = Vec::new();
    while let Some(row) = rows.next()? {
        documents.push(decode_row(row.get(0)?, row.get(1)?)?);
    }
    Ok(documents)
}

fn push_predicate(
    sql: &mut String,
    bind_values: &mut Vec<SqlValue>,
    key: &str,
    value: &Value,
) -> StoreResult<()> {
    if key == ID_FIELD {
        match value {
            Value::String(id) => {
                let id = parse_id(id)?;
                sql.push_str(" AND id = ?");
                bind_values.push(SqlValue::Text(id.to_string()));
            }
            Value::Null => sql.push_str(" AND id IS NULL"),
            other => {
                return Err(StoreError::UnsupportedFilter(format!(
                    "`{ID_FIELD}` must be compared with a string, got {other}"
                )))
            }
        }
        return Ok(());
    }

    let path = SqlValue::Text(json_path(key)?);
    match value {
        Value::Null => {
            sql.push_str(" AND json_extract(body, ?) IS NULL");
            bind_values.push(path);
        }
        Value::Bool(flag) => {
            sql.push_str(" AND json_type(body, ?) = ?");
            bind_values.push(path);
            bind_values.push(SqlValue::Text(flag.to_string()));
        }
        Value::Number(number) => {
            sql.push_str(" AND json_extract(body, ?) = ?");
            bind_values.push(path);
            match number.as_i64() {
                Some(integer) => bind_values.push(SqlValue::Integer(integer)),
                None => bind_values.push(SqlValue::Real(number.as_f64().unwrap_or(f64::NAN))),
            }
        }
        Value::String(text) => {
            sql.push_str(" AND json_extract(body, ?) = ?");
            bind_values.push(path);
            bind_values.push(SqlValue::Text(text.clone()));
        }
        Value::Array(_) | Value::Object(_) => {
            sql.push_str(" AND json_extract(body, ?) = json(?)");
            bind_values.push(path);
            bind_values.push(SqlValue::Text(value.to_string()));
        }
    }
    Ok(())
}

fn parse_id(id: &str) -> StoreResult<Uuid> {
    Uuid::parse_str(id.trim()).map_err(|_| StoreError::MalformedIdentifier(id.to_string()))
}

/// Builds a quoted JSON path (`$."contact"."city"`) from a dotted key.
fn json_path(key: &str) -> StoreResult<String> {
    if key.is_empty() || key.starts_with('$') || key.contains(['"', '\'']) {
        return Err(StoreError::UnsupportedFilter(format!(
            "field path `{key}` is not supported"
        )));
    }

    let mut path = String::from("$");
    for segment in key.split('.') {
        if segment.is_empty() {
            return Err(StoreError::UnsupportedFilter(format!(
                "field path `{key}` has an empty segment"
            )));
        }
        path.push_str(".\"");
        path.push_str(segment);
        path.push('"');
    }
    Ok(path)
}

fn decode_row(id: String, body: String) -> StoreResult<Document> {
    let mut document: Document = serde_json::from_str(&body)?;
    document.insert(ID_FIELD.to_string(), Value::String(id));
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::{json_path, SqliteDocumentStore};
    use crate::db::open_db_in_memory;
    use crate::store::{CollectionSpec, DocumentStore, Filter, StoreError, ID_FIELD};
    use serde_json::{json, Value};

    fn widget_spec() -> CollectionSpec {
        let mut spec = CollectionSpec::new("widgets");
        spec.required.push("code");
        spec.unique.push("code");
        spec.defaults.push(("active", Value::Bool(true)));
        spec
    }

    fn widget_store() -> SqliteDocumentStore {
        let conn = open_db_in_memory().unwrap();
        SqliteDocumentStore::open(conn, widget_spec()).unwrap()
    }

    fn doc(value: Value) -> serde_json::Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn json_path_quotes_each_segment() {
        assert_eq!(json_path("code").unwrap(), "$.\"code\"");
        assert_eq!(json_path("contact.city").unwrap(), "$.\"contact\".\"city\"");
    }

    #[test]
    fn json_path_rejects_operators_and_quotes() {
        assert!(matches!(json_path("$where"), Err(StoreError::UnsupportedFilter(_))));
        assert!(matches!(json_path("a\"b"), Err(StoreError::UnsupportedFilter(_))));
        assert!(matches!(json_path("a..b"), Err(StoreError::UnsupportedFilter(_))));
        assert!(matches!(json_path(""), Err(StoreError::UnsupportedFilter(_))));
    }

    #[tokio::test]
    async fn insert_assigns_id_and_applies_defaults() {
        let store = widget_store();
        let stored = store.insert(doc(json!({ "code": "w1" }))).await.unwrap();

        assert!(stored.get(ID_FIELD).and_then(Value::as_str).is_some());
        assert_eq!(stored.get("active"), Some(&Value::Bool(true)));
    }

    #[tokio::test]
    async fn insert_ignores_caller_supplied_id() {
        let store = widget_store();
        let stored = store
            .insert(doc(json!({ "_id": "not-a-uuid", "code": "w1" })))
            .await
            .unwrap();
        assert_ne!(stored.get(ID_FIELD), Some(&json!("not-a-uuid")));
    }

    #[tokio::test]
    async fn unique_index_rejects_duplicate_values() {
        let store = widget_store();
        store.insert(doc(json!({ "code": "w1" }))).await.unwrap();
        let err = store.insert(doc(json!({ "code": "w1" }))).await.unwrap_err();
        assert!(matches!(err, StoreError::ConstraintViolation { .. }));
    }

    #[tokio::test]
    async fn missing_required_field_is_a_constraint_violation() {
        let store = widget_store();
        let err = store.insert(doc(json!({ "name": "w" }))).await.unwrap_err();
        match err {
            StoreError::ConstraintViolation { constraint, .. } => {
                assert_eq!(constraint, "widgets.code.required");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn filters_match_numbers_booleans_and_nested_paths() {
        let store = widget_store();
        store
            .insert(doc(json!({ "code": "w1", "size": 1, "meta": { "city": "Pune" } })))
            .await
            .unwrap();
        store
            .insert(doc(json!({ "code": "w2", "size": 2, "active": false })))
            .await
            .unwrap();

        let by_size = store.find_many(&doc(json!({ "size": 2 })), None).await.unwrap();
        assert_eq!(by_size.len(), 1);
        assert_eq!(by_size[0].get("code"), Some(&json!("w2")));

        let inactive = store
            .find_many(&doc(json!({ "active": false })), None)
            .await
            .unwrap();
        assert_eq!(inactive.len(), 1);

        let nested = store
            .find_one(&doc(json!({ "meta.city": "Pune" })))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(nested.get("code"), Some(&json!("w1")));

        let absent = store
            .find_many(&doc(json!({ "meta": null })), None)
            .await
            .unwrap();
        assert_eq!(absent.len(), 1);
    }

    #[tokio::test]
    async fn find_many_honours_limit_and_insertion_order() {
        let store = widget_store();
        for code in ["w1", "w2", "w3"] {
            store.insert(doc(json!({ "code": code }))).await.unwrap();
        }
        let docs = store.find_many(&Filter::new(), Some(2)).await.unwrap();
        let codes: Vec<_> = docs.iter().map(|d| d.get("code").cloned().unwrap()).collect();
        assert_eq!(codes, vec![json!("w1"), json!("w2")]);
    }

    #[tokio::test]
    async fn find_by_id_rejects_malformed_ids() {
        let store = widget_store();
        let err = store.find_by_id("12345").await.unwrap_err();
        assert!(matches!(err, StoreError::MalformedIdentifier(id) if id == "12345"));
    }

    #[tokio::test]
    async fn filter_by_id_field_uses_identifier_column() {
        let store = widget_store();
        let stored = store.insert(doc(json!({ "code": "w1" }))).await.unwrap();
        let id = stored.get(ID_FIELD).cloned().unwrap();

        let found = store
            .find_many(&doc(json!({ ID_FIELD: id })), None)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn filter_by_id_field_rejects_malformed_ids_and_folds_case() {
        let store = widget_store();
        let stored = store.insert(doc(json!({ "code": "w1" }))).await.unwrap();
        let upper = stored[ID_FIELD].as_str().unwrap().to_ascii_uppercase();

        let found = store
            .find_one(&doc(json!({ ID_FIELD: upper })))
            .await
            .unwrap();
        assert!(found.is_some());

        let err = store
            .find_many(&doc(json!({ ID_FIELD: "12345" })), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MalformedIdentifier(id) if id == "12345"));
    }

    #[tokio::test]
    async fn delete_all_only_touches_own_collection() {
        let conn = open_db_in_memory().unwrap();
        let store = SqliteDocumentStore::open(conn, widget_spec()).unwrap();
        store.insert(doc(json!({ "code": "w1" }))).await.unwrap();
        store.insert(doc(json!({ "code": "w2" }))).await.unwrap();

        assert_eq!(store.delete_all().await.unwrap(), 2);
        assert!(store.find_many(&Filter::new(), None).await.unwrap().is_empty());
    }
}
