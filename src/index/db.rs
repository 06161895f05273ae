use std::collections::HashMap;
use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS notes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL UNIQUE,
    basename_key TEXT NOT NULL DEFAULT '',
    title TEXT NOT NULL DEFAULT '',
    slug TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL DEFAULT '',
    mod_time INTEGER NOT NULL,
    size INTEGER NOT NULL DEFAULT 0,
    hash TEXT NOT NULL DEFAULT ''
);

CREATE VIRTUAL TABLE IF NOT EXISTS notes_fts USING fts5(
    title, content, tags, headings,
    tokenize='porter unicode61 remove_diacritics 2'
);

CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS note_tags (
    note_id INTEGER REFERENCES notes(id) ON DELETE CASCADE,
    tag_id INTEGER REFERENCES tags(id) ON DELETE CASCADE,
    PRIMARY KEY (note_id, tag_id)
);

CREATE TABLE IF NOT EXISTS links (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id INTEGER NOT NULL REFERENCES notes(id) ON DELETE CASCADE,
    target_path TEXT NOT NULL,
    target_id INTEGER REFERENCES notes(id) ON DELETE SET NULL,
    section TEXT DEFAULT '',
    alias TEXT DEFAULT '',
    line INTEGER NOT NULL,
    col INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS headings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    note_id INTEGER NOT NULL REFERENCES notes(id) ON DELETE CASCADE,
    level INTEGER NOT NULL,
    text TEXT NOT NULL,
    line INTEGER NOT NULL
);
";

/// Error type for the index store
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("basename conflict: {0:?} and {1:?} share a canonical basename")]
    BasenameConflict(String, String),
}

/// Basename uniqueness is case-insensitive: the canonical key of a note is
/// the lowercased filename.
pub fn canonical_basename_key(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
        .to_lowercase()
}

/// The SQLite-backed note index.
#[derive(Debug)]
pub struct Index {
    pub(crate) conn: Connection,
}

impl Index {
    /// Open or create the database at the given path.
    pub fn open(path: &Path) -> Result<Index, IndexError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "wal")?;
        conn.pragma_update(None, "foreign_keys", "on")?;
        conn.execute_batch(SCHEMA)?;

        let db = Index { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Index, IndexError> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "on")?;
        conn.execute_batch(SCHEMA)?;

        // Runs migrations too, for consistent behavior with on-disk stores.
        let db = Index { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Insert or update a note row, returning its id.
    #[allow(clippy::too_many_arguments)]
    pub fn upsert_note(
        &self,
        path: &str,
        title: &str,
        slug: &str,
        status: &str,
        hash: &str,
        mod_time: i64,
        size: i64,
    ) -> Result<i64, IndexError> {
        let basename_key = canonical_basename_key(path);
        self.conn.execute(
            "INSERT INTO notes (path, basename_key, title, slug, status, mod_time, size, hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(path) DO UPDATE SET
                 basename_key = excluded.basename_key,
                 title = excluded.title,
                 slug = excluded.slug,
                 status = excluded.status,
                 mod_time = excluded.mod_time,
                 size = excluded.size,
                 hash = excluded.hash",
            params![path, basename_key, title, slug, status, mod_time, size, hash],
        )?;

        let id = self
            .conn
            .query_row("SELECT id FROM notes WHERE path = ?1", [path], |row| {
                row.get(0)
            })?;
        Ok(id)
    }

    /// Rebuild the full-text row for a note.
    pub fn update_fts(
        &self,
        note_id: i64,
        title: &str,
        content: &str,
        tags: &str,
        headings: &str,
    ) -> Result<(), IndexError> {
        self.conn
            .execute("DELETE FROM notes_fts WHERE rowid = ?1", [note_id])?;
        self.conn.execute(
            "INSERT INTO notes_fts (rowid, title, content, tags, headings)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![note_id, title, content, tags, headings],
        )?;
        Ok(())
    }

    /// Ensure a tag exists and return its id.
    pub fn upsert_tag(&self, name: &str) -> Result<i64, IndexError> {
        self.conn
            .execute("INSERT OR IGNORE INTO tags (name) VALUES (?1)", [name])?;
        let id = self
            .conn
            .query_row("SELECT id FROM tags WHERE name = ?1", [name], |row| {
                row.get(0)
            })?;
        Ok(id)
    }

    pub fn link_note_tag(&self, note_id: i64, tag_id: i64) -> Result<(), IndexError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO note_tags (note_id, tag_id) VALUES (?1, ?2)",
            params![note_id, tag_id],
        )?;
        Ok(())
    }

    pub fn clear_note_tags(&self, note_id: i64) -> Result<(), IndexError> {
        self.conn
            .execute("DELETE FROM note_tags WHERE note_id = ?1", [note_id])?;
        Ok(())
    }

    /// Add a wiki link record. `target_path` is stored as the canonical
    /// lowercased basename.
    pub fn insert_link(
        &self,
        source_id: i64,
        target_path: &str,
        section: &str,
        alias: &str,
        line: i64,
        col: i64,
    ) -> Result<(), IndexError> {
        self.conn.execute(
            "INSERT INTO links (source_id, target_path, section, alias, line, col)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![source_id, target_path.to_lowercase(), section, alias, line, col],
        )?;
        Ok(())
    }

    pub fn clear_note_links(&self, note_id: i64) -> Result<(), IndexError> {
        self.conn
            .execute("DELETE FROM links WHERE source_id = ?1", [note_id])?;
        Ok(())
    }

    pub fn insert_heading(
        &self,
        note_id: i64,
        level: i64,
        text: &str,
        line: i64,
    ) -> Result<(), IndexError> {
        self.conn.execute(
            "INSERT INTO headings (note_id, level, text, line) VALUES (?1, ?2, ?3, ?4)",
            params![note_id, level, text, line],
        )?;
        Ok(())
    }

    pub fn clear_note_headings(&self, note_id: i64) -> Result<(), IndexError> {
        self.conn
            .execute("DELETE FROM headings WHERE note_id = ?1", [note_id])?;
        Ok(())
    }

    /// The stored content hash for a note path, or empty if unknown.
    pub fn get_note_hash(&self, path: &str) -> Result<String, IndexError> {
        let hash = self
            .conn
            .query_row("SELECT hash FROM notes WHERE path = ?1", [path], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(hash.unwrap_or_default())
    }

    /// Remove a note and all related rows.
    pub fn delete_note(&self, path: &str) -> Result<(), IndexError> {
        let id: Option<i64> = self
            .conn
            .query_row("SELECT id FROM notes WHERE path = ?1", [path], |row| {
                row.get(0)
            })
            .optional()?;
        let Some(id) = id else {
            return Ok(());
        };
        self.conn
            .execute("DELETE FROM notes_fts WHERE rowid = ?1", [id])?;
        // tags/links/headings cascade
        self.conn.execute("DELETE FROM notes WHERE id = ?1", [id])?;
        Ok(())
    }

    // The basename_key column and its unique index postdate the first
    // on-disk schema, so they are created here rather than in SCHEMA:
    // legacy stores need the column added and backfilled first.
    fn migrate(&self) -> Result<(), IndexError> {
        if !self.has_column("notes", "basename_key")? {
            self.conn.execute(
                "ALTER TABLE notes ADD COLUMN basename_key TEXT NOT NULL DEFAULT ''",
                [],
            )?;
        }

        // Backfill basename_key for all existing rows; a collision means the
        // store cannot uphold the uniqueness invariant and must not open.
        let mut stmt = self.conn.prepare("SELECT path FROM notes")?;
        let paths: Vec<String> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<_, _>>()?;
        drop(stmt);

        let mut seen: HashMap<String, String> = HashMap::new();
        for path in &paths {
            let key = canonical_basename_key(path);
            if let Some(other) = seen.get(&key)
                && other != path
            {
                return Err(IndexError::BasenameConflict(other.clone(), path.clone()));
            }
            seen.insert(key.clone(), path.clone());
            self.conn.execute(
                "UPDATE notes SET basename_key = ?1 WHERE path = ?2",
                params![key, path],
            )?;
        }

        self.conn.execute(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_notes_basename_key ON notes(basename_key)",
            [],
        )?;

        // Normalize stored wiki-link targets to the canonical key.
        self.conn
            .execute("UPDATE links SET target_path = lower(target_path)", [])?;

        Ok(())
    }

    fn has_column(&self, table: &str, col: &str) -> Result<bool, IndexError> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({table})"))?;
        let names: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<_, _>>()?;
        Ok(names.iter().any(|n| n == col))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_basename_key() {
        assert_eq!(canonical_basename_key("notes/Foo.md"), "foo.md");
        assert_eq!(canonical_basename_key("BAR.md"), "bar.md");
    }

    #[test]
    fn test_upsert_note_is_stable() {
        let db = Index::open_in_memory().unwrap();
        let id1 = db.upsert_note("a.md", "A", "a", "", "h1", 1, 10).unwrap();
        let id2 = db.upsert_note("a.md", "A2", "a2", "", "h2", 2, 20).unwrap();
        assert_eq!(id1, id2);
        assert_eq!(db.get_note_hash("a.md").unwrap(), "h2");
    }

    #[test]
    fn test_basename_uniqueness_enforced() {
        let db = Index::open_in_memory().unwrap();
        db.upsert_note("a/Note.md", "n", "n", "", "h", 1, 1).unwrap();
        // A different path with the same canonical basename must be rejected.
        assert!(db.upsert_note("b/note.md", "n", "n", "", "h", 1, 1).is_err());
    }

    #[test]
    fn test_delete_note_cascades() {
        let db = Index::open_in_memory().unwrap();
        let id = db.upsert_note("a.md", "A", "a", "", "h", 1, 1).unwrap();
        db.insert_heading(id, 1, "H", 1).unwrap();
        db.insert_link(id, "b.md", "", "", 1, 0).unwrap();
        let tag = db.upsert_tag("t").unwrap();
        db.link_note_tag(id, tag).unwrap();

        db.delete_note("a.md").unwrap();
        let count: i64 = db
            .conn
            .query_row("SELECT count(*) FROM headings", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
        let count: i64 = db
            .conn
            .query_row("SELECT count(*) FROM links", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
        let count: i64 = db
            .conn
            .query_row("SELECT count(*) FROM note_tags", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_get_note_hash_missing_is_empty() {
        let db = Index::open_in_memory().unwrap();
        assert_eq!(db.get_note_hash("nope.md").unwrap(), "");
    }

    #[test]
    fn test_links_store_lowercased_targets() {
        let db = Index::open_in_memory().unwrap();
        let id = db.upsert_note("a.md", "A", "a", "", "h", 1, 1).unwrap();
        db.insert_link(id, "Beta.md", "", "", 1, 0).unwrap();
        let target: String = db
            .conn
            .query_row("SELECT target_path FROM links", [], |r| r.get(0))
            .unwrap();
        assert_eq!(target, "beta.md");
    }
}
