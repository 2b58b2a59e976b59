//! Database schema definitions for the libSQL store

/// SQL to create the answer (L1) records table
pub const CREATE_ANSWER_RECORDS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS answer_records (
    id TEXT PRIMARY KEY NOT NULL,
    query_text TEXT NOT NULL,
    scope_tag TEXT NOT NULL,
    embedding BLOB NOT NULL,
    answer_text TEXT NOT NULL,
    producing_agent TEXT NOT NULL,
    token_count INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    last_accessed_at INTEGER NOT NULL,
    access_count INTEGER NOT NULL DEFAULT 1,
    ttl_seconds INTEGER NOT NULL DEFAULT 0,
    source_version TEXT NOT NULL
)
"#;

/// SQL to create the compressed-context (L2) records table
pub const CREATE_COMPRESSED_RECORDS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS compressed_records (
    id TEXT PRIMARY KEY NOT NULL,
    query_text TEXT NOT NULL,
    scope_tag TEXT NOT NULL,
    embedding BLOB NOT NULL,
    compressed_context TEXT NOT NULL,
    referenced_chunk_ids TEXT NOT NULL DEFAULT '[]',
    producing_agent TEXT NOT NULL,
    token_count INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    last_accessed_at INTEGER NOT NULL,
    access_count INTEGER NOT NULL DEFAULT 1,
    ttl_seconds INTEGER NOT NULL DEFAULT 0,
    source_version TEXT NOT NULL
)
"#;

/// SQL to create the chunk (L3) records table
pub const CREATE_CHUNK_RECORDS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS chunk_records (
    id TEXT PRIMARY KEY NOT NULL,
    query_text TEXT NOT NULL,
    scope_tag TEXT NOT NULL,
    embedding BLOB NOT NULL,
    chunk_ids TEXT NOT NULL DEFAULT '[]',
    chunk_scores TEXT NOT NULL DEFAULT '[]',
    producing_agent TEXT NOT NULL,
    token_count INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    last_accessed_at INTEGER NOT NULL,
    access_count INTEGER NOT NULL DEFAULT 1,
    ttl_seconds INTEGER NOT NULL DEFAULT 0,
    source_version TEXT NOT NULL
)
"#;

/// SQL to create the daily stats table
pub const CREATE_DAILY_STATS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS daily_stats (
    date TEXT PRIMARY KEY NOT NULL,
    total_queries INTEGER NOT NULL DEFAULT 0,
    l1_hits INTEGER NOT NULL DEFAULT 0,
    l2_hits INTEGER NOT NULL DEFAULT 0,
    l3_hits INTEGER NOT NULL DEFAULT 0,
    misses INTEGER NOT NULL DEFAULT 0,
    tokens_saved INTEGER NOT NULL DEFAULT 0,
    estimated_cost_saved REAL NOT NULL DEFAULT 0.0
)
"#;

/// SQL to create the cache metadata table (embedding dimension, schema tag)
pub const CREATE_CACHE_METADATA_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS cache_metadata (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
)
"#;

/// Metadata key holding the embedding dimension
pub const METADATA_DIMENSION: &str = "embedding_dimension";

/// Index on answer records for scope + creation time queries
pub const CREATE_ANSWER_SCOPE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_answer_records_scope_created
ON answer_records(scope_tag, created_at)
"#;

/// Index on answer records for access-ordered iteration
pub const CREATE_ANSWER_ACCESS_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_answer_records_last_accessed
ON answer_records(last_accessed_at)
"#;

/// Index on compressed records for scope + creation time queries
pub const CREATE_COMPRESSED_SCOPE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_compressed_records_scope_created
ON compressed_records(scope_tag, created_at)
"#;

/// Index on compressed records for access-ordered iteration
pub const CREATE_COMPRESSED_ACCESS_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_compressed_records_last_accessed
ON compressed_records(last_accessed_at)
"#;

/// Index on chunk records for scope + creation time queries
pub const CREATE_CHUNK_SCOPE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_chunk_records_scope_created
ON chunk_records(scope_tag, created_at)
"#;

/// Index on chunk records for access-ordered iteration
pub const CREATE_CHUNK_ACCESS_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_chunk_records_last_accessed
ON chunk_records(last_accessed_at)
"#;

/// All statements run by schema initialization, in order
pub const ALL_STATEMENTS: [&str; 11] = [
    CREATE_ANSWER_RECORDS_TABLE,
    CREATE_COMPRESSED_RECORDS_TABLE,
    CREATE_CHUNK_RECORDS_TABLE,
    CREATE_DAILY_STATS_TABLE,
    CREATE_CACHE_METADATA_TABLE,
    CREATE_ANSWER_SCOPE_INDEX,
    CREATE_ANSWER_ACCESS_INDEX,
    CREATE_COMPRESSED_SCOPE_INDEX,
    CREATE_COMPRESSED_ACCESS_INDEX,
    CREATE_CHUNK_SCOPE_INDEX,
    CREATE_CHUNK_ACCESS_INDEX,
];
