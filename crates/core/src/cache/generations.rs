//! Cache generation lifecycle.
//!
//! A generation is created at install time, populated while its worker
//! version runs, and destroyed when a different version activates. The
//! generation name string is the sole versioning mechanism.

use super::connection::CacheDb;
use crate::Error;
use tokio_rusqlite::params;

impl CacheDb {
    /// Open a generation, creating it if absent.
    ///
    /// Reopening an existing name is a no-op; its entries are kept.
    pub async fn open_generation(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO generations (name, created_at) VALUES (?1, ?2)",
                    params![name, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Enumerate all generation names present in storage.
    pub async fn list_generations(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM generations ORDER BY created_at, name")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every generation whose name differs from `keep`.
    ///
    /// This is the activate-time sweep and the only storage reclaim the
    /// cache performs. Entries go with their generation (FK cascade).
    /// Returns the number of generations deleted.
    pub async fn delete_other_generations(&self, keep: &str) -> Result<u64, Error> {
        let keep = keep.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let deleted = conn.execute("DELETE FROM generations WHERE name != ?1", params![keep])?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Count the entries stored under a generation.
    pub async fn count_entries(&self, generation: &str) -> Result<u64, Error> {
        let generation = generation.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM entries WHERE generation = ?1",
                    params![generation],
                    |row| row.get(0),
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::entries::StoredResponse;

    fn make_entry(generation: &str, url: &str) -> StoredResponse {
        StoredResponse::new(generation, "GET", url, 200, Some("text/html".into()), &[], b"<html></html>".to_vec())
    }

    #[tokio::test]
    async fn test_open_generation_idempotent() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_generation("kiri").await.unwrap();
        db.open_generation("kiri").await.unwrap();

        assert_eq!(db.list_generations().await.unwrap(), vec!["kiri".to_string()]);
    }

    #[tokio::test]
    async fn test_reopen_keeps_entries() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_generation("kiri").await.unwrap();
        db.put_entry(&make_entry("kiri", "https://example.com/")).await.unwrap();

        db.open_generation("kiri").await.unwrap();
        assert_eq!(db.count_entries("kiri").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_other_generations() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_generation("kiri-v1").await.unwrap();
        db.open_generation("kiri-v2").await.unwrap();

        let deleted = db.delete_other_generations("kiri-v2").await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(db.list_generations().await.unwrap(), vec!["kiri-v2".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_cascades_entries() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_generation("kiri-v1").await.unwrap();
        db.open_generation("kiri-v2").await.unwrap();
        db.put_entry(&make_entry("kiri-v1", "https://example.com/")).await.unwrap();
        db.put_entry(&make_entry("kiri-v2", "https://example.com/")).await.unwrap();

        db.delete_other_generations("kiri-v2").await.unwrap();

        assert_eq!(db.count_entries("kiri-v1").await.unwrap(), 0);
        assert_eq!(db.count_entries("kiri-v2").await.unwrap(), 1);
        let gone = db.match_entry("kiri-v1", "GET", "https://example.com/").await.unwrap();
        assert!(gone.is_none());
    }
}
