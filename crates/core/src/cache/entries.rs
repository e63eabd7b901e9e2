//! Cache entry storage.
//!
//! An entry is a request identifier (method + URL) mapped to a response
//! snapshot. Writes are single-row upserts: two handlers racing on the same
//! request both store idempotent snapshots of the same resource and the
//! last write wins.

use super::connection::CacheDb;
use super::key::entry_key;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A stored response snapshot.
///
/// The body is kept byte-for-byte as received (after transport decoding), so
/// an offline replay serves exactly what the network produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredResponse {
    pub key_hash: String,
    pub generation: String,
    pub method: String,
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub headers_json: String,
    pub body: Vec<u8>,
    pub stored_at: String,
}

impl StoredResponse {
    /// Build a snapshot for storage, deriving its key and timestamp.
    pub fn new(
        generation: &str, method: &str, url: &str, status: u16, content_type: Option<String>,
        headers: &[(String, String)], body: Vec<u8>,
    ) -> Self {
        Self {
            key_hash: entry_key(generation, method, url),
            generation: generation.to_string(),
            method: method.to_string(),
            url: url.to_string(),
            status,
            content_type,
            headers_json: serde_json::to_string(headers).unwrap_or_else(|_| "[]".to_string()),
            body,
            stored_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// The stored response headers, as name/value pairs.
    pub fn headers(&self) -> Vec<(String, String)> {
        serde_json::from_str(&self.headers_json).unwrap_or_default()
    }
}

impl CacheDb {
    /// Insert or update a stored response.
    ///
    /// Upsert on the entry key: the identifying columns are fixed by the key
    /// derivation, the payload is replaced wholesale.
    pub async fn put_entry(&self, entry: &StoredResponse) -> Result<(), Error> {
        let entry = entry.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO entries (
                        key_hash, generation, method, url, status,
                        content_type, headers_json, body, stored_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                    ON CONFLICT(key_hash) DO UPDATE SET
                        status = excluded.status,
                        content_type = excluded.content_type,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![
                        &entry.key_hash,
                        &entry.generation,
                        &entry.method,
                        &entry.url,
                        entry.status as i64,
                        &entry.content_type,
                        &entry.headers_json,
                        &entry.body,
                        &entry.stored_at,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up a stored response by request method and URL.
    ///
    /// Returns None on a cache miss.
    pub async fn match_entry(&self, generation: &str, method: &str, url: &str) -> Result<Option<StoredResponse>, Error> {
        let key = entry_key(generation, method, url);
        self.conn
            .call(move |conn| -> Result<Option<StoredResponse>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT key_hash, generation, method, url, status,
                            content_type, headers_json, body, stored_at
                     FROM entries WHERE key_hash = ?1",
                )?;

                let result = stmt.query_row(params![key], |row| {
                    Ok(StoredResponse {
                        key_hash: row.get(0)?,
                        generation: row.get(1)?,
                        method: row.get(2)?,
                        url: row.get(3)?,
                        status: row.get::<_, i64>(4)? as u16,
                        content_type: row.get(5)?,
                        headers_json: row.get(6)?,
                        body: row.get(7)?,
                        stored_at: row.get(8)?,
                    })
                });

                match result {
                    Ok(entry) => Ok(Some(entry)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }
}
