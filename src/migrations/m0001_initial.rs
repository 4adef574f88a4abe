use cetane::prelude::*;

pub fn migration() -> Migration {
    Migration::new("0001_initial_schema")
        .operation(RunSql::portable().for_backend(
            "sqlite",
            r#"CREATE TABLE annotation_sessions (
    id TEXT PRIMARY KEY NOT NULL,
    owner_id TEXT NOT NULL,
    source_name TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'in_progress',
    total_items BIGINT NOT NULL,
    processed_count BIGINT NOT NULL DEFAULT 0,
    source_digest TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)"#,
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "CREATE INDEX idx_sessions_owner_created ON annotation_sessions(owner_id, created_at)",
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            r#"CREATE TABLE session_items (
    session_id TEXT NOT NULL REFERENCES annotation_sessions(id),
    identifier TEXT NOT NULL,
    processed_at TEXT NOT NULL,
    PRIMARY KEY (session_id, identifier)
)"#,
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            r#"CREATE TABLE annotation_results (
    session_id TEXT NOT NULL REFERENCES annotation_sessions(id),
    identifier TEXT NOT NULL,
    consequence TEXT,
    gene TEXT,
    transcript_id TEXT,
    payload TEXT NOT NULL DEFAULT 'null',
    updated_at TEXT NOT NULL,
    PRIMARY KEY (session_id, identifier)
)"#,
        ))
}
