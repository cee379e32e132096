//! Document operations: insert, read, partial update, delete and batched writes.

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};

use super::{Database, DbError, DbResult};

/// A document as stored, with its JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub collection: String,
    pub doc_id: String,
    pub body: Value,
    pub created_at: String,
    pub updated_at: String,
}

/// One write in a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentWrite {
    /// Insert or fully replace a document.
    Set {
        collection: String,
        doc_id: String,
        body: Value,
    },
    /// Overwrite top-level fields of an existing document, leaving the others untouched.
    Merge {
        collection: String,
        doc_id: String,
        fields: Map<String, Value>,
    },
    /// Remove a document if present.
    Delete { collection: String, doc_id: String },
}

impl Database {
    /// Insert a document under a newly generated id.
    pub fn insert_document(&self, collection: &str, body: &Value) -> DbResult<String> {
        let doc_id = uuid::Uuid::new_v4().to_string();
        self.insert_document_with_id(collection, &doc_id, body)?;
        Ok(doc_id)
    }

    /// Insert a document under a caller-chosen id. Fails if the id is taken.
    pub fn insert_document_with_id(
        &self,
        collection: &str,
        doc_id: &str,
        body: &Value,
    ) -> DbResult<()> {
        ensure_object(body)?;
        self.conn.execute(
            "INSERT INTO documents (collection, doc_id, body) VALUES (?1, ?2, ?3)",
            params![collection, doc_id, serde_json::to_string(body)?],
        )?;
        Ok(())
    }

    /// Get a document by collection and id.
    pub fn get_document(&self, collection: &str, doc_id: &str) -> DbResult<Option<StoredDocument>> {
        get_in(&self.conn, collection, doc_id)
    }

    /// Overwrite the given top-level fields of a document.
    ///
    /// Returns `false` if the document does not exist.
    pub fn merge_document(
        &self,
        collection: &str,
        doc_id: &str,
        fields: &Map<String, Value>,
    ) -> DbResult<bool> {
        let tx = self.conn.unchecked_transaction()?;
        let merged = merge_in(&tx, collection, doc_id, fields)?;
        tx.commit()?;
        Ok(merged)
    }

    /// Delete a document.
    pub fn delete_document(&self, collection: &str, doc_id: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "DELETE FROM documents WHERE collection = ?1 AND doc_id = ?2",
            [collection, doc_id],
        )?;
        Ok(rows_affected > 0)
    }

    /// List all documents of a collection, newest first.
    pub fn list_documents(&self, collection: &str) -> DbResult<Vec<StoredDocument>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT collection, doc_id, body, created_at, updated_at
            FROM documents
            WHERE collection = ?
            ORDER BY created_at DESC, doc_id
            "#,
        )?;

        let rows = stmt.query_map([collection], DocumentRow::from_row)?;

        let mut documents = Vec::new();
        for row in rows {
            documents.push(row?.try_into()?);
        }
        Ok(documents)
    }

    /// Delete every document of a collection. Returns the number removed.
    pub fn delete_collection(&self, collection: &str) -> DbResult<usize> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM documents WHERE collection = ?", [collection])?;
        Ok(rows_affected)
    }

    /// Apply several writes atomically. Either all of them land or none do.
    ///
    /// A `Merge` against a missing document aborts the whole batch with `MissingDocument`.
    pub fn apply_batch(&self, writes: &[DocumentWrite]) -> DbResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        for write in writes {
            match write {
                DocumentWrite::Set {
                    collection,
                    doc_id,
                    body,
                } => {
                    ensure_object(body)?;
                    tx.execute(
                        r#"
                        INSERT INTO documents (collection, doc_id, body) VALUES (?1, ?2, ?3)
                        ON CONFLICT (collection, doc_id) DO UPDATE SET body = excluded.body
                        "#,
                        params![collection, doc_id, serde_json::to_string(body)?],
                    )?;
                }
                DocumentWrite::Merge {
                    collection,
                    doc_id,
                    fields,
                } => {
                    if !merge_in(&tx, collection, doc_id, fields)? {
                        return Err(DbError::missing(collection, doc_id));
                    }
                }
                DocumentWrite::Delete { collection, doc_id } => {
                    tx.execute(
                        "DELETE FROM documents WHERE collection = ?1 AND doc_id = ?2",
                        [collection, doc_id],
                    )?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }
}

fn ensure_object(body: &Value) -> DbResult<()> {
    if body.is_object() {
        Ok(())
    } else {
        Err(DbError::NotAnObject(body.to_string()))
    }
}

fn get_in(conn: &Connection, collection: &str, doc_id: &str) -> DbResult<Option<StoredDocument>> {
    conn.query_row(
        r#"
        SELECT collection, doc_id, body, created_at, updated_at
        FROM documents
        WHERE collection = ?1 AND doc_id = ?2
        "#,
        [collection, doc_id],
        DocumentRow::from_row,
    )
    .optional()?
    .map(|row| row.try_into())
    .transpose()
}

fn merge_in(
    conn: &Connection,
    collection: &str,
    doc_id: &str,
    fields: &Map<String, Value>,
) -> DbResult<bool> {
    let Some(existing) = get_in(conn, collection, doc_id)? else {
        return Ok(false);
    };

    let mut body = match existing.body {
        Value::Object(map) => map,
        _ => return Err(DbError::NotAnObject(format!("{}/{}", collection, doc_id))),
    };
    for (key, value) in fields {
        body.insert(key.clone(), value.clone());
    }

    conn.execute(
        "UPDATE documents SET body = ?3 WHERE collection = ?1 AND doc_id = ?2",
        params![collection, doc_id, serde_json::to_string(&Value::Object(body))?],
    )?;
    Ok(true)
}

/// Intermediate row struct for database mapping.
struct DocumentRow {
    collection: String,
    doc_id: String,
    body: String,
    created_at: String,
    updated_at: String,
}

impl DocumentRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            collection: row.get(0)?,
            doc_id: row.get(1)?,
            body: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
        })
    }
}

impl TryFrom<DocumentRow> for StoredDocument {
    type Error = DbError;

    fn try_from(row: DocumentRow) -> Result<Self, Self::Error> {
        Ok(StoredDocument {
            collection: row.collection,
            doc_id: row.doc_id,
            body: serde_json::from_str(&row.body)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
