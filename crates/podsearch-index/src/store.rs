//! SQLite-backed transcript collection with brute-force vector search
//!
//! One database file (`index.sqlite`) per index directory. A collection
//! fixes its embedding dimension and distance metric when it is created.
//! Entries are keyed by `(collection, id)`; re-using an id updates the row
//! in place, so its insertion position (rowid) is kept.

use crate::distance::distance;
use crate::error::{IndexError, Result};
use parking_lot::Mutex;
use podsearch_types::{
    DistanceMetric, IndexEntry, IndexStats, QueryResult, SearchHit, SegmentMetadata, Speaker,
};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

/// Database file inside the index directory
pub const INDEX_FILE_NAME: &str = "index.sqlite";

/// How to treat a missing database or collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Fail with `NotFound` unless the collection already exists
    Existing,
    /// Create the directory, schema and collection as needed
    CreateIfMissing,
}

/// Collection identity and vector layout
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionConfig {
    pub name: String,
    pub dimension: usize,
    pub metric: DistanceMetric,
}

/// Persistent vector index over transcript segments
pub struct TranscriptIndex {
    conn: Mutex<Connection>,
    path: PathBuf,
    collection: CollectionConfig,
}

impl TranscriptIndex {
    /// Open the collection stored in `dir`
    pub fn open(dir: impl AsRef<Path>, config: CollectionConfig, mode: OpenMode) -> Result<Self> {
        let dir = dir.as_ref();
        let path = dir.join(INDEX_FILE_NAME);

        if config.dimension == 0 {
            return Err(IndexError::InvalidValue(
                "collection dimension must be at least 1".to_string(),
            ));
        }

        let not_found = || IndexError::NotFound {
            collection: config.name.clone(),
            path: path.display().to_string(),
        };

        match mode {
            OpenMode::Existing if !path.exists() => return Err(not_found()),
            OpenMode::Existing => {}
            OpenMode::CreateIfMissing => std::fs::create_dir_all(dir)?,
        }

        let conn = Connection::open(&path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        conn.execute_batch(SCHEMA_SQL)?;

        match load_collection(&conn, &config.name)? {
            Some((dimension, metric)) => {
                if dimension != config.dimension || metric != config.metric {
                    return Err(IndexError::ConfigMismatch {
                        collection: config.name.clone(),
                        stored_dimension: dimension,
                        stored_metric: metric,
                        dimension: config.dimension,
                        metric: config.metric,
                    });
                }
                tracing::info!(
                    "Opened collection {} ({}d, {}) at {:?}",
                    config.name,
                    dimension,
                    metric,
                    path
                );
            }
            None if mode == OpenMode::Existing => return Err(not_found()),
            None => {
                conn.execute(
                    "INSERT INTO collections (name, dimension, metric, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        config.name,
                        to_i64(config.dimension)?,
                        config.metric.as_str(),
                        now_rfc3339()
                    ],
                )?;
                tracing::info!(
                    "Created collection {} ({}d, {}) at {:?}",
                    config.name,
                    config.dimension,
                    config.metric,
                    path
                );
            }
        }

        Ok(Self {
            conn: Mutex::new(conn),
            path,
            collection: config,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection.name
    }

    pub fn dimension(&self) -> usize {
        self.collection.dimension
    }

    pub fn metric(&self) -> DistanceMetric {
        self.collection.metric
    }

    /// Path of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert or replace one entry
    pub fn upsert(&self, entry: &IndexEntry) -> Result<()> {
        self.upsert_batch(std::slice::from_ref(entry)).map(|_| ())
    }

    /// Insert or replace all entries in one transaction
    pub fn upsert_batch(&self, entries: &[IndexEntry]) -> Result<usize> {
        for entry in entries {
            self.check_vector(&entry.embedding)?;
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        write_entries(&tx, &self.collection.name, entries)?;
        tx.commit()?;

        tracing::debug!(
            "Upserted {} entries into {}",
            entries.len(),
            self.collection.name
        );
        Ok(entries.len())
    }

    /// Delete every entry of `episode`, then write `entries`, in one transaction.
    ///
    /// Returns the number of entries removed.
    pub fn replace_episode(&self, episode: &str, entries: &[IndexEntry]) -> Result<usize> {
        for entry in entries {
            self.check_vector(&entry.embedding)?;
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let removed = tx.execute(
            "DELETE FROM entries WHERE collection = ?1 AND episode = ?2",
            params![self.collection.name, episode],
        )?;
        write_entries(&tx, &self.collection.name, entries)?;
        tx.commit()?;

        tracing::debug!(
            "Replaced episode {}: removed {}, wrote {}",
            episode,
            removed,
            entries.len()
        );
        Ok(removed)
    }

    /// Nearest entries to `embedding`, closest first, at most `top_k`.
    ///
    /// Equal distances keep insertion order.
    pub fn query(&self, embedding: &[f32], top_k: usize) -> Result<QueryResult> {
        if top_k == 0 {
            return Err(IndexError::InvalidTopK);
        }
        self.check_vector(embedding)?;

        let rows = {
            let conn = self.conn.lock();
            let mut stmt = conn.prepare_cached(
                "SELECT document, episode, start_sec, end_sec, speaker, embedding
                 FROM entries WHERE collection = ?1 ORDER BY rowid",
            )?;
            let rows = stmt
                .query_map(params![self.collection.name], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        SegmentMetadata {
                            episode: row.get(1)?,
                            start: row.get(2)?,
                            end: row.get(3)?,
                            speaker: Speaker::from(row.get::<_, String>(4)?),
                        },
                        row.get::<_, Vec<u8>>(5)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };

        let mut hits = Vec::with_capacity(rows.len());
        for (document, metadata, blob) in rows {
            let stored = decode_embedding(&blob, self.collection.dimension)?;
            hits.push(SearchHit {
                document,
                metadata,
                distance: distance(self.collection.metric, embedding, &stored),
            });
        }

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(top_k);
        Ok(hits)
    }

    /// Delete every entry of `episode`, returning how many were removed
    pub fn delete_episode(&self, episode: &str) -> Result<usize> {
        let conn = self.conn.lock();
        let removed = conn.execute(
            "DELETE FROM entries WHERE collection = ?1 AND episode = ?2",
            params![self.collection.name, episode],
        )?;
        tracing::debug!("Deleted {} entries of episode {}", removed, episode);
        Ok(removed)
    }

    /// Number of entries in the collection
    pub fn count(&self) -> Result<u64> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM entries WHERE collection = ?1",
            params![self.collection.name],
            |row| row.get(0),
        )?;
        to_u64(count)
    }

    /// Number of entries belonging to `episode`
    pub fn count_episode(&self, episode: &str) -> Result<u64> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM entries WHERE collection = ?1 AND episode = ?2",
            params![self.collection.name, episode],
            |row| row.get(0),
        )?;
        to_u64(count)
    }

    /// Look up one entry by id
    pub fn get(&self, id: &str) -> Result<Option<IndexEntry>> {
        let row = {
            let conn = self.conn.lock();
            let row = conn.query_row(
                "SELECT document, episode, start_sec, end_sec, speaker, embedding
                 FROM entries WHERE collection = ?1 AND id = ?2",
                params![self.collection.name, id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        SegmentMetadata {
                            episode: row.get(1)?,
                            start: row.get(2)?,
                            end: row.get(3)?,
                            speaker: Speaker::from(row.get::<_, String>(4)?),
                        },
                        row.get::<_, Vec<u8>>(5)?,
                    ))
                },
            )
            .optional()?;
            row
        };

        match row {
            Some((document, metadata, blob)) => Ok(Some(IndexEntry {
                id: id.to_string(),
                embedding: decode_embedding(&blob, self.collection.dimension)?,
                document,
                metadata,
            })),
            None => Ok(None),
        }
    }

    pub fn stats(&self) -> Result<IndexStats> {
        Ok(IndexStats {
            collection: self.collection.name.clone(),
            entries: self.count()?,
            dimension: u32::try_from(self.collection.dimension)
                .map_err(|_| IndexError::InvalidValue("dimension overflows u32".to_string()))?,
            metric: self.collection.metric,
        })
    }

    fn check_vector(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.collection.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.collection.dimension,
                actual: embedding.len(),
            });
        }
        if embedding.iter().any(|v| !v.is_finite()) {
            return Err(IndexError::InvalidValue(
                "embedding contains non-finite values".to_string(),
            ));
        }
        Ok(())
    }
}

const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS collections (
    name TEXT PRIMARY KEY,
    dimension INTEGER NOT NULL,
    metric TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS entries (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    episode TEXT NOT NULL,
    document TEXT NOT NULL,
    start_sec REAL NOT NULL,
    end_sec REAL NOT NULL,
    speaker TEXT NOT NULL,
    embedding BLOB NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY(collection, id)
);

CREATE INDEX IF NOT EXISTS idx_entries_episode ON entries(collection, episode);
";

fn load_collection(conn: &Connection, name: &str) -> Result<Option<(usize, DistanceMetric)>> {
    let row = conn
        .query_row(
            "SELECT dimension, metric FROM collections WHERE name = ?1",
            params![name],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
        )
        .optional()?;

    match row {
        Some((dimension, metric)) => {
            let dimension = usize::try_from(dimension).map_err(|_| {
                IndexError::InvalidValue(format!("invalid stored dimension: {}", dimension))
            })?;
            let metric = DistanceMetric::parse(&metric).ok_or_else(|| {
                IndexError::InvalidValue(format!("unknown distance metric: {}", metric))
            })?;
            Ok(Some((dimension, metric)))
        }
        None => Ok(None),
    }
}

fn write_entries(conn: &Connection, collection: &str, entries: &[IndexEntry]) -> Result<()> {
    let now = now_rfc3339();
    let mut stmt = conn.prepare_cached(
        "INSERT INTO entries (
            collection, id, episode, document, start_sec, end_sec, speaker, embedding, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(collection, id) DO UPDATE SET
            episode = excluded.episode,
            document = excluded.document,
            start_sec = excluded.start_sec,
            end_sec = excluded.end_sec,
            speaker = excluded.speaker,
            embedding = excluded.embedding,
            updated_at = excluded.updated_at",
    )?;

    for entry in entries {
        stmt.execute(params![
            collection,
            entry.id,
            entry.metadata.episode,
            entry.document,
            entry.metadata.start,
            entry.metadata.end,
            entry.metadata.speaker.label(),
            encode_embedding(&entry.embedding),
            now
        ])?;
    }
    Ok(())
}

fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(std::mem::size_of_val(vector));
    for &value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

fn decode_embedding(blob: &[u8], dimension: usize) -> Result<Vec<f32>> {
    if blob.len() != dimension * std::mem::size_of::<f32>() {
        return Err(IndexError::InvalidValue(format!(
            "invalid embedding byte length: expected {}, got {}",
            dimension * std::mem::size_of::<f32>(),
            blob.len()
        )));
    }

    Ok(blob
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn to_i64(value: usize) -> Result<i64> {
    i64::try_from(value).map_err(|_| IndexError::InvalidValue(format!("{} overflows i64", value)))
}

fn to_u64(value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| IndexError::InvalidValue(format!("negative count: {}", value)))
}
