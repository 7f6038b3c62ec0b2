//! SQLite song store.
//!
//! Owns the `songs` schema, the connection pool, and all row access.
//! Request handlers check out one [`StoreConn`] per request and run every
//! query for that request through it.

use std::path::Path;

use anyhow::{Context, Result};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension};

/// A search hit; the filesystem path is intentionally not exposed here.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, utoipa::ToSchema)]
pub struct SongSummary {
    pub artist: String,
    pub album: String,
    pub title: String,
}

/// A full song row, including its filesystem location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongRecord {
    pub artist: String,
    pub album: String,
    pub title: String,
    pub path: String,
}

/// Counters reported by a bulk load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkInsertReport {
    pub inserted: usize,
    pub duplicates: usize,
}

#[derive(Clone)]
pub struct SongStore {
    pool: Pool<SqliteConnectionManager>,
}

/// One pooled connection bound to a single request (or to the indexing run).
///
/// Dropping it returns the connection to the pool on every exit path,
/// including panics and cancelled requests.
pub struct StoreConn {
    conn: PooledConnection<SqliteConnectionManager>,
}

impl SongStore {
    /// Open (or create) the store at `path` and ensure the schema exists.
    ///
    /// Safe to call against an already-initialized database; the second run
    /// leaves the schema untouched.
    pub fn open(path: &Path) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder()
            .max_size(4)
            .build(manager)
            .context("create song db pool")?;

        {
            let conn = pool.get().context("open song db")?;
            init_schema(&conn)?;
        }

        Ok(Self { pool })
    }

    /// Check out one connection for the lifetime of a request.
    pub fn checkout(&self) -> Result<StoreConn> {
        let conn = self.pool.get().context("check out song db connection")?;
        Ok(StoreConn { conn })
    }

    /// Load `rows` inside a single transaction.
    ///
    /// A row whose (artist, album, title) triple is already present is
    /// skipped and counted; the first writer wins. Any storage error rolls
    /// the whole batch back.
    pub fn bulk_insert(&self, rows: &[SongRecord]) -> Result<BulkInsertReport> {
        let mut conn = self.pool.get().context("open song db")?;
        let tx = conn.transaction().context("begin bulk insert")?;
        let mut report = BulkInsertReport::default();
        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR IGNORE INTO songs (artist, album, title, path) \
                     VALUES (?1, ?2, ?3, ?4)",
                )
                .context("prepare song insert")?;
            for row in rows {
                let inserted = stmt
                    .execute(params![row.artist, row.album, row.title, row.path])
                    .with_context(|| format!("insert song {:?}", row.path))?;
                if inserted == 0 {
                    tracing::warn!(
                        artist = %row.artist,
                        album = %row.album,
                        title = %row.title,
                        path = %row.path,
                        "duplicate song key, keeping first occurrence"
                    );
                    report.duplicates += 1;
                } else {
                    report.inserted += 1;
                }
            }
        }
        tx.commit().context("commit bulk insert")?;
        Ok(report)
    }
}

impl StoreConn {
    /// Substring search; an empty input matches everything.
    ///
    /// Results are ordered by (artist, album); SQLite's default LIKE gives
    /// ASCII case-insensitive matching.
    pub fn search(&self, artist: &str, album: &str, title: &str) -> Result<Vec<SongSummary>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT artist, album, title FROM songs \
                 WHERE artist LIKE ?1 AND album LIKE ?2 AND title LIKE ?3 \
                 ORDER BY artist, album",
            )
            .context("prepare song search")?;
        let rows = stmt
            .query_map(
                params![wildcard(artist), wildcard(album), wildcard(title)],
                |row| {
                    Ok(SongSummary {
                        artist: row.get(0)?,
                        album: row.get(1)?,
                        title: row.get(2)?,
                    })
                },
            )
            .context("run song search")?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row.context("read song search row")?);
        }
        Ok(results)
    }

    /// Exact lookup by the primary key triple.
    pub fn lookup(&self, artist: &str, album: &str, title: &str) -> Result<Option<SongRecord>> {
        self.conn
            .query_row(
                "SELECT artist, album, title, path FROM songs \
                 WHERE artist = ?1 AND album = ?2 AND title = ?3",
                params![artist, album, title],
                |row| {
                    Ok(SongRecord {
                        artist: row.get(0)?,
                        album: row.get(1)?,
                        title: row.get(2)?,
                        path: row.get(3)?,
                    })
                },
            )
            .optional()
            .context("lookup song")
    }
}

fn wildcard(term: &str) -> String {
    format!("%{}%", term)
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS songs (
            artist VARCHAR(32) NOT NULL,
            album VARCHAR(32) NOT NULL,
            title VARCHAR(64) NOT NULL,
            path VARCHAR(64) NOT NULL,
            PRIMARY KEY (artist, album, title)
        );
        "#,
    )
    .context("create songs schema")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_db(tag: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!(
            "tunedex-db-{tag}-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&root).expect("create temp dir");
        root.join("songs.db")
    }

    fn song(artist: &str, album: &str, title: &str, path: &str) -> SongRecord {
        SongRecord {
            artist: artist.to_string(),
            album: album.to_string(),
            title: title.to_string(),
            path: path.to_string(),
        }
    }

    #[test]
    fn open_twice_is_idempotent() {
        let path = temp_db("idempotent");
        let store = SongStore::open(&path).expect("first open");
        store
            .bulk_insert(&[song("Moby", "Play", "Porcelain", "songs/a.mp3")])
            .expect("insert");
        drop(store);

        let store = SongStore::open(&path).expect("second open");
        let conn = store.checkout().expect("checkout");
        let results = conn.search("", "", "").expect("search");
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn bulk_insert_skips_duplicate_triples() {
        let store = SongStore::open(&temp_db("dups")).expect("open");
        let report = store
            .bulk_insert(&[
                song("Moby", "Play", "Porcelain", "songs/first.mp3"),
                song("Moby", "Play", "Porcelain", "songs/second.mp3"),
            ])
            .expect("insert");
        assert_eq!(report.inserted, 1);
        assert_eq!(report.duplicates, 1);

        let conn = store.checkout().expect("checkout");
        let record = conn
            .lookup("Moby", "Play", "Porcelain")
            .expect("lookup")
            .expect("record");
        assert_eq!(record.path, "songs/first.mp3");
    }

    #[test]
    fn search_matches_substrings_case_insensitively() {
        let store = SongStore::open(&temp_db("search")).expect("open");
        store
            .bulk_insert(&[
                song("Moby", "Play", "Porcelain", "songs/a.mp3"),
                song("Mogwai", "Young Team", "Tracy", "songs/b.mp3"),
                song("Autechre", "Amber", "Montreal", "songs/c.mp3"),
            ])
            .expect("insert");

        let conn = store.checkout().expect("checkout");
        let results = conn.search("mo", "", "").expect("search");
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|s| s.artist.starts_with("Mo")));
    }

    #[test]
    fn search_orders_by_artist_then_album() {
        let store = SongStore::open(&temp_db("order")).expect("open");
        store
            .bulk_insert(&[
                song("B Artist", "Z Album", "One", "songs/1.mp3"),
                song("A Artist", "B Album", "Two", "songs/2.mp3"),
                song("A Artist", "A Album", "Three", "songs/3.mp3"),
            ])
            .expect("insert");

        let conn = store.checkout().expect("checkout");
        let results = conn.search("", "", "").expect("search");
        let keys: Vec<(String, String)> = results
            .into_iter()
            .map(|s| (s.artist, s.album))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("A Artist".to_string(), "A Album".to_string()),
                ("A Artist".to_string(), "B Album".to_string()),
                ("B Artist".to_string(), "Z Album".to_string()),
            ]
        );
    }

    #[test]
    fn search_with_no_matches_returns_empty() {
        let store = SongStore::open(&temp_db("empty")).expect("open");
        let conn = store.checkout().expect("checkout");
        let results = conn.search("nothing", "", "").expect("search");
        assert!(results.is_empty());
    }

    #[test]
    fn lookup_miss_is_none_not_error() {
        let store = SongStore::open(&temp_db("miss")).expect("open");
        let conn = store.checkout().expect("checkout");
        let record = conn.lookup("Moby", "Play", "Porcelain").expect("lookup");
        assert!(record.is_none());
    }
}
