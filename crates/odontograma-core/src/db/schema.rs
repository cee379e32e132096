//! SQLite schema definition.

/// Complete database schema for the document store.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Documents
-- ============================================================================

-- JSON documents grouped into collections. A collection is a slash-separated
-- path such as 'pacientes/<patient_id>/odontograma'.
CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    doc_id TEXT NOT NULL,
    body TEXT NOT NULL DEFAULT '{}' CHECK (json_valid(body) AND json_type(body) = 'object'),
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    PRIMARY KEY (collection, doc_id)
);

CREATE INDEX IF NOT EXISTS idx_documents_created ON documents(collection, created_at);

-- Keep updated_at current on every rewrite
CREATE TRIGGER IF NOT EXISTS documents_touch AFTER UPDATE OF body ON documents BEGIN
    UPDATE documents SET updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
    WHERE collection = new.collection AND doc_id = new.doc_id;
END;
"#;
