//! Row conversion between libSQL rows and cache entries.
//!
//! Embeddings are stored as fixed-width little-endian f32 blobs of length
//! 4·D bytes; chunk-id and score lists serialize as JSON text columns.

use chrono::{DateTime, Utc};
use ragcache_core::error::{Error, Result};
use ragcache_core::types::{
    AnswerRecord, CacheEntry, CacheLayer, ChunkRecord, CompressedRecord, EntryHeader, ScopeTag,
};
use uuid::Uuid;

/// Encode an embedding as a little-endian f32 blob.
#[must_use]
pub fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(embedding.len() * 4);
    for value in embedding {
        blob.extend_from_slice(&value.to_le_bytes());
    }
    blob
}

/// Decode a little-endian f32 blob back into an embedding.
///
/// # Errors
///
/// Returns `Error::Storage` when the blob length is not a multiple of 4.
pub fn blob_to_embedding(blob: &[u8]) -> Result<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return Err(Error::Storage(format!(
            "embedding blob length {} is not a multiple of 4",
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|bytes| f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        .collect())
}

/// Column list shared by the header of every record table.
///
/// Payload columns are selected between `embedding` and `producing_agent`,
/// matching [`row_to_entry`]'s indices.
pub fn select_columns(layer: CacheLayer) -> &'static str {
    match layer {
        CacheLayer::Answer => {
            "id, query_text, scope_tag, embedding, producing_agent, token_count, \
             created_at, last_accessed_at, access_count, ttl_seconds, source_version, \
             answer_text"
        }
        CacheLayer::Compressed => {
            "id, query_text, scope_tag, embedding, producing_agent, token_count, \
             created_at, last_accessed_at, access_count, ttl_seconds, source_version, \
             compressed_context, referenced_chunk_ids"
        }
        CacheLayer::Chunks => {
            "id, query_text, scope_tag, embedding, producing_agent, token_count, \
             created_at, last_accessed_at, access_count, ttl_seconds, source_version, \
             chunk_ids, chunk_scores"
        }
    }
}

fn timestamp(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

/// Convert a row selected with [`select_columns`] into a [`CacheEntry`].
///
/// # Errors
///
/// Returns `Error::Storage` on malformed ids, scopes, blobs, or JSON lists.
pub fn row_to_entry(layer: CacheLayer, row: &libsql::Row) -> Result<CacheEntry> {
    let id: String = row.get(0).map_err(|e| Error::Storage(e.to_string()))?;
    let query_text: String = row.get(1).map_err(|e| Error::Storage(e.to_string()))?;
    let scope_raw: String = row.get(2).map_err(|e| Error::Storage(e.to_string()))?;
    let embedding_blob: Vec<u8> = row.get(3).map_err(|e| Error::Storage(e.to_string()))?;
    let producing_agent: String = row.get(4).map_err(|e| Error::Storage(e.to_string()))?;
    let token_count: i64 = row.get(5).map_err(|e| Error::Storage(e.to_string()))?;
    let created_at: i64 = row.get(6).map_err(|e| Error::Storage(e.to_string()))?;
    let last_accessed_at: i64 = row.get(7).map_err(|e| Error::Storage(e.to_string()))?;
    let access_count: i64 = row.get(8).map_err(|e| Error::Storage(e.to_string()))?;
    let ttl_seconds: i64 = row.get(9).map_err(|e| Error::Storage(e.to_string()))?;
    let source_version: String = row.get(10).map_err(|e| Error::Storage(e.to_string()))?;

    let header = EntryHeader {
        id: Uuid::parse_str(&id).map_err(|e| Error::Storage(format!("invalid entry id: {e}")))?,
        query_text,
        scope: ScopeTag::decode(&scope_raw)
            .map_err(|raw| Error::Storage(format!("invalid scope tag: {raw}")))?,
        embedding: blob_to_embedding(&embedding_blob)?,
        producing_agent,
        token_count: token_count.max(0) as u64,
        created_at: timestamp(created_at),
        last_accessed_at: timestamp(last_accessed_at),
        access_count: access_count.max(0) as u64,
        ttl_seconds,
        source_version,
    };

    match layer {
        CacheLayer::Answer => {
            let answer_text: String = row.get(11).map_err(|e| Error::Storage(e.to_string()))?;
            Ok(CacheEntry::Answer(AnswerRecord {
                header,
                answer_text,
            }))
        }
        CacheLayer::Compressed => {
            let compressed_context: String =
                row.get(11).map_err(|e| Error::Storage(e.to_string()))?;
            let chunk_ids_json: String = row.get(12).map_err(|e| Error::Storage(e.to_string()))?;
            let referenced_chunk_ids: Vec<String> = serde_json::from_str(&chunk_ids_json)
                .map_err(|e| Error::Storage(format!("failed to parse referenced chunk ids: {e}")))?;
            Ok(CacheEntry::Compressed(CompressedRecord {
                header,
                compressed_context,
                referenced_chunk_ids,
            }))
        }
        CacheLayer::Chunks => {
            let chunk_ids_json: String = row.get(11).map_err(|e| Error::Storage(e.to_string()))?;
            let chunk_scores_json: String =
                row.get(12).map_err(|e| Error::Storage(e.to_string()))?;
            let chunk_ids: Vec<String> = serde_json::from_str(&chunk_ids_json)
                .map_err(|e| Error::Storage(format!("failed to parse chunk ids: {e}")))?;
            let chunk_scores: Vec<f32> = serde_json::from_str(&chunk_scores_json)
                .map_err(|e| Error::Storage(format!("failed to parse chunk scores: {e}")))?;
            Ok(CacheEntry::Chunks(ChunkRecord {
                header,
                chunk_ids,
                chunk_scores,
            }))
        }
    }
}

/// Escape LIKE wildcards so `needle` matches literally under `ESCAPE '\'`.
#[must_use]
pub fn escape_like(needle: &str) -> String {
    needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
