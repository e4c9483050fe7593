//! SQLite vector store backed by the sqlite-vec extension.
//!
//! Chunk text lives in a plain `chunks` table; embeddings live beside it in
//! `chunk_vectors` as `vec_f32` blobs. Similarity search joins the two and
//! ranks by `vec_distance_cosine`, with `rowid` as the secondary sort so
//! equal distances resolve in insertion order.

use std::mem::transmute;
use std::os::raw::c_char;
use std::path::Path;
use std::sync::Once;

use async_trait::async_trait;
use tokio_rusqlite::{Connection, ffi};

use super::{StoredRecord, VectorBackend};
use crate::types::ArchiveError;

#[derive(Clone)]
pub struct SqliteVectorStore {
    conn: Connection,
}

impl SqliteVectorStore {
    /// Opens (or creates) the store at `path`, registering the sqlite-vec
    /// extension once per process and verifying it actually loaded.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, ArchiveError> {
        register_sqlite_vec()?;
        let conn = Connection::open(path).await.map_err(storage)?;
        conn.call(|conn| {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS chunks (
                     id TEXT PRIMARY KEY,
                     source_id TEXT NOT NULL,
                     chunk_index INTEGER NOT NULL,
                     content TEXT NOT NULL
                 );
                 CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks(source_id);
                 CREATE TABLE IF NOT EXISTS chunk_vectors (
                     id TEXT PRIMARY KEY,
                     embedding BLOB NOT NULL
                 );",
            )
            .map_err(tokio_rusqlite::Error::Rusqlite)?;
            conn.query_row("SELECT vec_version()", [], |row| row.get::<_, String>(0))
                .map_err(tokio_rusqlite::Error::Rusqlite)?;
            Ok(())
        })
        .await
        .map_err(storage)?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl VectorBackend for SqliteVectorStore {
    async fn insert_records(&self, records: Vec<StoredRecord>) -> Result<(), ArchiveError> {
        if records.is_empty() {
            return Ok(());
        }
        self.conn
            .call(move |conn| {
                let tx = conn.transaction().map_err(tokio_rusqlite::Error::Rusqlite)?;
                for record in &records {
                    let embedding_json = serde_json::to_string(&record.embedding)
                        .map_err(|err| tokio_rusqlite::Error::Other(Box::new(err)))?;
                    tx.execute(
                        "INSERT INTO chunks (id, source_id, chunk_index, content) VALUES (?, ?, ?, ?)",
                        (
                            &record.id,
                            &record.source_id,
                            record.chunk_index as i64,
                            &record.content,
                        ),
                    )
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                    tx.execute(
                        "INSERT INTO chunk_vectors (id, embedding) VALUES (?, vec_f32(?))",
                        (&record.id, &embedding_json),
                    )
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                }
                tx.commit().map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(())
            })
            .await
            .map_err(storage)
    }

    async fn search_similar(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<(StoredRecord, f32)>, ArchiveError> {
        let embedding_json = serde_json::to_string(query_embedding).map_err(storage)?;
        self.conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT c.id, c.source_id, c.chunk_index, c.content, \
                         vec_distance_cosine(v.embedding, vec_f32(?1)) AS distance \
                         FROM chunks c \
                         JOIN chunk_vectors v ON c.id = v.id \
                         ORDER BY distance ASC, c.rowid ASC \
                         LIMIT ?2",
                    )
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;

                let rows = stmt
                    .query_map((&embedding_json, top_k as i64), |row| {
                        let record = StoredRecord {
                            id: row.get(0)?,
                            source_id: row.get(1)?,
                            chunk_index: row.get::<_, i64>(2)? as usize,
                            content: row.get(3)?,
                            embedding: Vec::new(),
                        };
                        let distance: f32 = row.get(4)?;
                        // Cosine distance -> similarity.
                        Ok((record, 1.0 - distance))
                    })
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;

                let mut results = Vec::new();
                for row in rows {
                    results.push(row.map_err(tokio_rusqlite::Error::Rusqlite)?);
                }
                Ok(results)
            })
            .await
            .map_err(storage)
    }

    async fn count(&self) -> Result<usize, ArchiveError> {
        self.conn
            .call(|conn| {
                let count: i64 = conn
                    .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(count as usize)
            })
            .await
            .map_err(storage)
    }
}

fn storage(err: impl std::fmt::Display) -> ArchiveError {
    ArchiveError::Storage(err.to_string())
}

fn register_sqlite_vec() -> Result<(), ArchiveError> {
    use std::sync::Mutex;

    static INIT: Once = Once::new();
    static RESULT: Mutex<Option<Result<(), String>>> = Mutex::new(None);

    INIT.call_once(|| {
        let outcome = unsafe {
            type ExtensionInit = unsafe extern "C" fn(
                *mut ffi::sqlite3,
                *mut *mut c_char,
                *const ffi::sqlite3_api_routines,
            ) -> i32;

            let init: unsafe extern "C" fn() = sqlite_vec::sqlite3_vec_init;
            let init_fn = transmute::<unsafe extern "C" fn(), ExtensionInit>(init);
            let rc = ffi::sqlite3_auto_extension(Some(init_fn));
            if rc != 0 {
                Err(format!(
                    "failed to register sqlite-vec extension (code {rc})"
                ))
            } else {
                Ok(())
            }
        };
        *RESULT.lock().expect("sqlite-vec init mutex poisoned") = Some(outcome);
    });

    RESULT
        .lock()
        .expect("sqlite-vec init mutex poisoned")
        .clone()
        .unwrap_or(Err("sqlite-vec initialization result missing".to_string()))
        .map_err(ArchiveError::Storage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::split::Chunk;
    use tempfile::tempdir;

    fn record(content: &str, chunk_index: usize, embedding: Vec<f32>) -> StoredRecord {
        StoredRecord::new(
            Chunk {
                text: content.to_string(),
                source_id: "doc.txt".to_string(),
                chunk_index,
            },
            embedding,
        )
    }

    #[tokio::test]
    async fn insert_and_count() {
        let dir = tempdir().unwrap();
        let store = SqliteVectorStore::open(dir.path().join("vec.sqlite"))
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 0);
        store
            .insert_records(vec![
                record("alpha", 0, vec![1.0, 0.0]),
                record("beta", 1, vec![0.0, 1.0]),
            ])
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn search_orders_by_similarity() {
        let dir = tempdir().unwrap();
        let store = SqliteVectorStore::open(dir.path().join("vec.sqlite"))
            .await
            .unwrap();

        store
            .insert_records(vec![
                record("orthogonal", 0, vec![0.0, 1.0]),
                record("exact", 1, vec![1.0, 0.0]),
                record("close", 2, vec![0.9, 0.1]),
            ])
            .await
            .unwrap();

        let hits = store.search_similar(&[1.0, 0.0], 3).await.unwrap();
        let contents: Vec<&str> = hits.iter().map(|(r, _)| r.content.as_str()).collect();
        assert_eq!(contents, vec!["exact", "close", "orthogonal"]);
        assert!(hits[0].1 > hits[1].1 && hits[1].1 > hits[2].1);
    }

    #[tokio::test]
    async fn equal_distances_resolve_in_insertion_order() {
        let dir = tempdir().unwrap();
        let store = SqliteVectorStore::open(dir.path().join("vec.sqlite"))
            .await
            .unwrap();

        store
            .insert_records(vec![record("first", 0, vec![1.0, 0.0])])
            .await
            .unwrap();
        store
            .insert_records(vec![record("second", 1, vec![1.0, 0.0])])
            .await
            .unwrap();

        let hits = store.search_similar(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits[0].0.content, "first");
        assert_eq!(hits[1].0.content, "second");
    }

    #[tokio::test]
    async fn top_k_limits_results() {
        let dir = tempdir().unwrap();
        let store = SqliteVectorStore::open(dir.path().join("vec.sqlite"))
            .await
            .unwrap();

        let records = (0..10)
            .map(|i| record(&format!("chunk {i}"), i, vec![i as f32 + 1.0, 1.0]))
            .collect();
        store.insert_records(records).await.unwrap();

        let hits = store.search_similar(&[1.0, 1.0], 4).await.unwrap();
        assert_eq!(hits.len(), 4);
    }
}
