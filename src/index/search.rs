use rusqlite::{OptionalExtension, params};

use super::db::{Index, IndexError, canonical_basename_key};

/// A single note search result.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub id: i64,
    pub path: String,
    pub title: String,
    pub rank: f64,
}

/// A backlink to a note.
#[derive(Debug, Clone)]
pub struct BacklinkResult {
    pub source_path: String,
    pub source_title: String,
    pub line: i64,
    pub col: i64,
}

/// A heading somewhere in the vault.
#[derive(Debug, Clone)]
pub struct HeadingResult {
    pub note_id: i64,
    pub note_path: String,
    pub level: i64,
    pub text: String,
    pub line: i64,
}

impl Index {
    /// Full-text search across titles, content, tags and headings,
    /// ranked by FTS score.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>, IndexError> {
        let limit = if limit == 0 { 50 } else { limit };
        let mut stmt = self.conn.prepare(
            "SELECT n.id, n.path, n.title, rank
             FROM notes_fts
             JOIN notes n ON n.id = notes_fts.rowid
             WHERE notes_fts MATCH ?1
             ORDER BY rank
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![query, limit as i64], |row| {
            Ok(SearchResult {
                id: row.get(0)?,
                path: row.get(1)?,
                title: row.get(2)?,
                rank: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Substring search over note paths and titles (for the file finder).
    pub fn search_files(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>, IndexError> {
        let limit = if limit == 0 { 50 } else { limit };
        let pattern = format!("%{query}%");
        let mut stmt = self.conn.prepare(
            "SELECT id, path, title, 0 AS rank
             FROM notes
             WHERE path LIKE ?1 OR title LIKE ?1
             ORDER BY path
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![pattern, limit as i64], |row| {
            Ok(SearchResult {
                id: row.get(0)?,
                path: row.get(1)?,
                title: row.get(2)?,
                rank: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// All notes, sorted by path.
    pub fn list_all_notes(&self, limit: usize) -> Result<Vec<SearchResult>, IndexError> {
        let limit = if limit == 0 { 200 } else { limit };
        let mut stmt = self.conn.prepare(
            "SELECT id, path, title, 0 AS rank FROM notes ORDER BY path LIMIT ?1",
        )?;
        let rows = stmt.query_map([limit as i64], |row| {
            Ok(SearchResult {
                id: row.get(0)?,
                path: row.get(1)?,
                title: row.get(2)?,
                rank: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// All notes whose outgoing wiki links resolve to the given path,
    /// matched by canonical basename.
    pub fn get_backlinks(&self, target_path: &str) -> Result<Vec<BacklinkResult>, IndexError> {
        let basename = canonical_basename_key(target_path);
        let mut stmt = self.conn.prepare(
            "SELECT n.path, n.title, l.line, l.col
             FROM links l
             JOIN notes n ON n.id = l.source_id
             WHERE l.target_path = ?1
             ORDER BY n.path",
        )?;
        let rows = stmt.query_map([basename], |row| {
            Ok(BacklinkResult {
                source_path: row.get(0)?,
                source_title: row.get(1)?,
                line: row.get(2)?,
                col: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// The relative path of the note with the given basename, if any.
    pub fn find_note_by_basename(&self, basename: &str) -> Result<Option<String>, IndexError> {
        let key = basename.to_lowercase();
        let path = self
            .conn
            .query_row(
                "SELECT path FROM notes WHERE basename_key = ?1 LIMIT 1",
                [key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(path)
    }

    pub fn get_note_id_by_path(&self, path: &str) -> Result<Option<i64>, IndexError> {
        let id = self
            .conn
            .query_row("SELECT id FROM notes WHERE path = ?1", [path], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(id)
    }

    /// Substring search over headings across all notes.
    pub fn search_headings(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<HeadingResult>, IndexError> {
        let limit = if limit == 0 { 50 } else { limit };
        let pattern = format!("%{query}%");
        let mut stmt = self.conn.prepare(
            "SELECT h.note_id, n.path, h.level, h.text, h.line
             FROM headings h
             JOIN notes n ON n.id = h.note_id
             WHERE h.text LIKE ?1
             ORDER BY n.path, h.line
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![pattern, limit as i64], |row| {
            Ok(HeadingResult {
                note_id: row.get(0)?,
                note_path: row.get(1)?,
                level: row.get(2)?,
                text: row.get(3)?,
                line: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Headings of one note, in document order (for the outline pane).
    pub fn note_headings(&self, path: &str) -> Result<Vec<HeadingResult>, IndexError> {
        let mut stmt = self.conn.prepare(
            "SELECT h.note_id, n.path, h.level, h.text, h.line
             FROM headings h
             JOIN notes n ON n.id = h.note_id
             WHERE n.path = ?1
             ORDER BY h.line",
        )?;
        let rows = stmt.query_map([path], |row| {
            Ok(HeadingResult {
                note_id: row.get(0)?,
                note_path: row.get(1)?,
                level: row.get(2)?,
                text: row.get(3)?,
                line: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> Index {
        let db = Index::open_in_memory().unwrap();
        let a = db.upsert_note("a.md", "Alpha", "alpha", "", "h1", 1, 1).unwrap();
        let b = db
            .upsert_note("sub/b.md", "Beta", "beta", "", "h2", 2, 2)
            .unwrap();
        db.update_fts(a, "Alpha", "links to beta", "", "").unwrap();
        db.update_fts(b, "Beta", "plain text body", "", "Intro").unwrap();
        db.insert_link(a, "b.md", "", "", 1, 9).unwrap();
        db.insert_heading(b, 2, "Intro", 3).unwrap();
        db
    }

    #[test]
    fn test_fts_search_ranks_matches() {
        let db = seeded();
        let results = db.search("beta", 10).unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_search_files_substring() {
        let db = seeded();
        let results = db.search_files("sub", 10).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].path, "sub/b.md");
    }

    #[test]
    fn test_list_all_sorted_by_path() {
        let db = seeded();
        let all = db.list_all_notes(10).unwrap();
        let paths: Vec<&str> = all.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["a.md", "sub/b.md"]);
    }

    #[test]
    fn test_backlinks_by_basename() {
        let db = seeded();
        let backlinks = db.get_backlinks("sub/b.md").unwrap();
        assert_eq!(backlinks.len(), 1);
        assert_eq!(backlinks[0].source_path, "a.md");
        assert_eq!(backlinks[0].line, 1);
        assert_eq!(backlinks[0].col, 9);

        assert!(db.get_backlinks("a.md").unwrap().is_empty());
    }

    #[test]
    fn test_find_note_by_basename_case_insensitive() {
        let db = seeded();
        assert_eq!(
            db.find_note_by_basename("B.md").unwrap().as_deref(),
            Some("sub/b.md")
        );
        assert_eq!(db.find_note_by_basename("zzz.md").unwrap(), None);
    }

    #[test]
    fn test_search_headings() {
        let db = seeded();
        let hits = db.search_headings("intro", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "Intro");
        assert_eq!(hits[0].note_path, "sub/b.md");
    }

    #[test]
    fn test_fts_syntax_error_is_err_not_panic() {
        let db = seeded();
        assert!(db.search("\"unbalanced", 10).is_err());
    }
}
