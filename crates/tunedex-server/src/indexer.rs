//! One-shot library indexing.
//!
//! Walks the music root, reads embedded tags per file, and bulk-loads the
//! song table in a single transaction. Runs to completion before the server
//! starts accepting connections.

use std::ffi::OsStr;
use std::fs::{self, File};
use std::path::Path;

use anyhow::{Context, Result};

use crate::db::{SongRecord, SongStore};
use crate::metadata::{read_tags, SongTags};

/// Counters reported after an indexing run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexSummary {
    pub indexed: usize,
    pub untagged: usize,
    pub duplicates: usize,
}

/// Index every tagged file under `root` into `store`.
///
/// The whole load happens in one transaction, so a failed run leaves the
/// store unchanged.
pub fn index_library(store: &SongStore, root: &Path) -> Result<IndexSummary> {
    index_library_with(store, root, |path| {
        let file = File::open(path).with_context(|| format!("open {:?}", path))?;
        let ext = path
            .extension()
            .and_then(OsStr::to_str)
            .map(str::to_ascii_lowercase);
        Ok(read_tags(file, ext.as_deref()))
    })
}

/// Indexing core with an injectable tag probe.
///
/// The probe returns `Ok(None)` for untagged files (skipped) and `Err` for
/// I/O failures (aborts the whole run).
pub fn index_library_with<F>(store: &SongStore, root: &Path, mut probe: F) -> Result<IndexSummary>
where
    F: FnMut(&Path) -> Result<Option<SongTags>>,
{
    // A symlinked library root is walked at its real location.
    let root = root
        .canonicalize()
        .with_context(|| format!("canonicalize music root {:?}", root))?;
    if !root.is_dir() {
        return Err(anyhow::anyhow!("music root is not a directory: {:?}", root));
    }

    tracing::info!(root = %root.display(), "indexing library");

    let mut rows = Vec::new();
    let mut summary = IndexSummary::default();
    collect_songs(&root, &mut probe, &mut rows, &mut summary)?;

    let report = store.bulk_insert(&rows)?;
    summary.indexed = report.inserted;
    summary.duplicates = report.duplicates;

    tracing::info!(
        indexed = summary.indexed,
        untagged = summary.untagged,
        duplicates = summary.duplicates,
        "library index complete"
    );
    Ok(summary)
}

fn collect_songs<F>(
    dir: &Path,
    probe: &mut F,
    rows: &mut Vec<SongRecord>,
    summary: &mut IndexSummary,
) -> Result<()>
where
    F: FnMut(&Path) -> Result<Option<SongTags>>,
{
    for entry in fs::read_dir(dir).with_context(|| format!("read_dir {:?}", dir))? {
        let entry = entry.context("read_dir entry")?;
        let path = entry.path();
        let file_type = entry
            .file_type()
            .with_context(|| format!("stat {:?}", path))?;
        if file_type.is_dir() {
            collect_songs(&path, probe, rows, summary)?;
            continue;
        }
        if !file_type.is_file() {
            continue;
        }

        let Some(tags) = probe(&path)? else {
            summary.untagged += 1;
            continue;
        };
        rows.push(SongRecord {
            artist: tags.artist,
            album: tags.album,
            title: tags.title,
            path: normalize_path(&path),
        });
    }
    Ok(())
}

/// Stored paths always use forward slashes, regardless of host convention.
fn normalize_path(path: &Path) -> String {
    let raw = path.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        raw.into_owned()
    } else {
        raw.replace(std::path::MAIN_SEPARATOR, "/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_root(tag: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!(
            "tunedex-indexer-{tag}-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&root).expect("create temp dir");
        root
    }

    fn temp_store(root: &Path) -> SongStore {
        SongStore::open(&root.join("songs.db")).expect("open store")
    }

    fn tags(artist: &str, album: &str, title: &str) -> SongTags {
        SongTags {
            artist: artist.to_string(),
            album: album.to_string(),
            title: title.to_string(),
            cover: None,
        }
    }

    #[test]
    fn index_skips_untagged_files() {
        let root = temp_root("untagged");
        let music = root.join("music");
        std::fs::create_dir_all(&music).expect("create music dir");
        std::fs::write(music.join("a.mp3"), b"tagged").expect("write a");
        std::fs::write(music.join("b.mp3"), b"untagged").expect("write b");
        let store = temp_store(&root);

        let summary = index_library_with(&store, &music, |path| {
            if path.file_name() == Some(OsStr::new("a.mp3")) {
                Ok(Some(tags("Moby", "Play", "Porcelain")))
            } else {
                Ok(None)
            }
        })
        .expect("index");

        assert_eq!(summary.indexed, 1);
        assert_eq!(summary.untagged, 1);
        assert_eq!(summary.duplicates, 0);

        let conn = store.checkout().expect("checkout");
        let results = conn.search("", "", "").expect("search");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].artist, "Moby");
    }

    #[test]
    fn index_recurses_into_subdirectories() {
        let root = temp_root("nested");
        let music = root.join("music");
        let nested = music.join("albums").join("play");
        std::fs::create_dir_all(&nested).expect("create nested dir");
        std::fs::write(nested.join("porcelain.mp3"), b"song").expect("write song");
        let store = temp_store(&root);

        let summary = index_library_with(&store, &music, |_path| {
            Ok(Some(tags("Moby", "Play", "Porcelain")))
        })
        .expect("index");
        assert_eq!(summary.indexed, 1);

        let conn = store.checkout().expect("checkout");
        let record = conn
            .lookup("Moby", "Play", "Porcelain")
            .expect("lookup")
            .expect("record");
        assert!(record.path.ends_with("albums/play/porcelain.mp3"));
        assert!(!record.path.contains('\\'));
    }

    #[test]
    fn index_counts_duplicate_triples() {
        let root = temp_root("dups");
        let music = root.join("music");
        std::fs::create_dir_all(&music).expect("create music dir");
        std::fs::write(music.join("a.mp3"), b"one").expect("write a");
        std::fs::write(music.join("b.mp3"), b"two").expect("write b");
        let store = temp_store(&root);

        let summary = index_library_with(&store, &music, |_path| {
            Ok(Some(tags("Moby", "Play", "Porcelain")))
        })
        .expect("index");

        assert_eq!(summary.indexed, 1);
        assert_eq!(summary.duplicates, 1);
    }

    #[test]
    fn probe_error_aborts_run_and_store_stays_empty() {
        let root = temp_root("abort");
        let music = root.join("music");
        std::fs::create_dir_all(&music).expect("create music dir");
        std::fs::write(music.join("a.mp3"), b"song").expect("write a");
        let store = temp_store(&root);

        let result = index_library_with(&store, &music, |path| {
            Err(anyhow::anyhow!("open {:?}: permission denied", path))
        });
        assert!(result.is_err());

        let conn = store.checkout().expect("checkout");
        assert!(conn.search("", "", "").expect("search").is_empty());
    }

    #[test]
    fn missing_root_is_an_error() {
        let root = temp_root("missing");
        let store = temp_store(&root);
        let result = index_library_with(&store, &root.join("nowhere"), |_path| Ok(None));
        assert!(result.is_err());
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_root_is_resolved() {
        let root = temp_root("symlink");
        let music = root.join("music");
        std::fs::create_dir_all(&music).expect("create music dir");
        std::fs::write(music.join("a.mp3"), b"song").expect("write a");
        let link = root.join("library");
        std::os::unix::fs::symlink(&music, &link).expect("create symlink");
        let store = temp_store(&root);

        let summary = index_library_with(&store, &link, |_path| {
            Ok(Some(tags("Moby", "Play", "Porcelain")))
        })
        .expect("index");
        assert_eq!(summary.indexed, 1);
    }
}
