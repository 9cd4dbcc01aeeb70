//! Database schema definitions

/// SQL to create the documents table.
///
/// `body` holds the document JSON without its `_id`, which lives in `id`.
/// `legacy_id` mirrors the canonical form of the body's `legacyId`.
pub const CREATE_DOCUMENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    collection TEXT NOT NULL,
    legacy_id TEXT,
    body TEXT NOT NULL
)
"#;

/// SQL to create the legacy identity mapping table
/// Records which database document each imported file id became
pub const CREATE_LEGACY_IDENTITIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS legacy_identities (
    collection TEXT NOT NULL,
    legacy_id TEXT NOT NULL,
    document_id TEXT NOT NULL,
    recorded_at INTEGER NOT NULL,
    PRIMARY KEY (collection, legacy_id)
)
"#;

/// SQL to create indexes
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection, seq)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_documents_legacy ON documents(collection, legacy_id)",
    "CREATE INDEX IF NOT EXISTS idx_legacy_identities_document ON legacy_identities(document_id)",
];

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![CREATE_DOCUMENTS_TABLE, CREATE_LEGACY_IDENTITIES_TABLE];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}
