use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use sha2::{Digest, Sha256};

use crate::markdown;
use crate::vault::slugify;

use super::db::{Index, IndexError, canonical_basename_key};

/// The note indexing pipeline: parse markdown files and keep the store in
/// sync with the vault.
pub struct Indexer {
    db: Index,
    vault_root: PathBuf,
}

impl Indexer {
    pub fn new(db: Index, vault_root: impl Into<PathBuf>) -> Indexer {
        Indexer {
            db,
            vault_root: vault_root.into(),
        }
    }

    pub fn db(&self) -> &Index {
        &self.db
    }

    /// Fully re-index every markdown file in the vault. Links are derived
    /// data rebuilt from source, so they are cleared up front; resetting the
    /// stored hashes defeats the hash gate for this one pass.
    pub fn index_all(&self) -> Result<(), IndexError> {
        self.db.conn.execute("DELETE FROM links", [])?;
        self.db.conn.execute("UPDATE notes SET hash = ''", [])?;

        let mut files = Vec::new();
        collect_markdown_files(&self.vault_root, &mut files);
        for path in files {
            self.index_file(&path)?;
        }
        Ok(())
    }

    /// Index a single markdown file. Unchanged content (by SHA-256) is a
    /// no-op. Returns whether the file was (re)indexed.
    pub fn index_file(&self, abs_path: &Path) -> Result<bool, IndexError> {
        let bytes = fs::read(abs_path)?;
        let meta = fs::metadata(abs_path)?;

        let rel_path = self.rel_path(abs_path);

        let hash = format!("{:x}", Sha256::digest(&bytes));
        if self.db.get_note_hash(&rel_path)? == hash {
            return Ok(false); // unchanged
        }

        let content = String::from_utf8_lossy(&bytes);
        let parsed = markdown::parse(&content);

        let mut title = title_from_path(&rel_path);
        let mut status = String::new();
        let mut tags: Vec<String> = Vec::new();
        if let Some(fm) = &parsed.frontmatter {
            if !fm.title.is_empty() {
                title = fm.title.clone();
            }
            status = fm.status.clone();
            tags = fm.tags.clone();
        }
        let slug = slugify(&title);

        let mod_time = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        let note_id = self.db.upsert_note(
            &rel_path,
            &title,
            &slug,
            &status,
            &hash,
            mod_time,
            meta.len() as i64,
        )?;

        let heading_text: Vec<&str> = parsed.headings.iter().map(|h| h.text.as_str()).collect();
        self.db.update_fts(
            note_id,
            &title,
            parsed.plain_content(),
            &tags.join(" "),
            &heading_text.join(" "),
        )?;

        self.db.clear_note_tags(note_id)?;
        for tag in &tags {
            let tag_id = self.db.upsert_tag(tag)?;
            self.db.link_note_tag(note_id, tag_id)?;
        }

        self.db.clear_note_headings(note_id)?;
        for h in &parsed.headings {
            self.db
                .insert_heading(note_id, h.level as i64, &h.text, h.line as i64)?;
        }

        self.db.clear_note_links(note_id)?;
        for link in &parsed.wiki_links {
            let target = markdown::resolve_wiki_link_target(&link.target);
            let target = canonical_basename_key(&target);
            self.db.insert_link(
                note_id,
                &target,
                &link.section,
                &link.alias,
                link.line as i64,
                link.col as i64,
            )?;
        }

        self.resolve_links(note_id)?;
        Ok(true)
    }

    /// Remove a file from the index. Related rows cascade away.
    pub fn remove_file(&self, abs_path: &Path) -> Result<(), IndexError> {
        let rel_path = self.rel_path(abs_path);
        self.db.delete_note(&rel_path)
    }

    pub fn rel_path(&self, abs_path: &Path) -> String {
        abs_path
            .strip_prefix(&self.vault_root)
            .unwrap_or(abs_path)
            .to_string_lossy()
            .into_owned()
    }

    /// Resolve target ids: outgoing links of this note against known notes,
    /// and dangling links elsewhere that point at this note's basename.
    fn resolve_links(&self, note_id: i64) -> Result<(), IndexError> {
        self.db.conn.execute(
            "UPDATE links SET target_id = (
                 SELECT id FROM notes WHERE basename_key = links.target_path
             ) WHERE source_id = ?1 AND target_id IS NULL",
            [note_id],
        )?;
        self.db.conn.execute(
            "UPDATE links SET target_id = ?1
             WHERE target_id IS NULL
               AND target_path = (SELECT basename_key FROM notes WHERE id = ?1)",
            [note_id],
        )?;
        Ok(())
    }
}

fn collect_markdown_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(read) = fs::read_dir(dir) else {
        return;
    };
    let mut children: Vec<_> = read.filter_map(|e| e.ok()).collect();
    children.sort_by_key(|e| e.file_name());

    for entry in children {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name.starts_with('.') {
            continue;
        }
        let path = entry.path();
        let Ok(ft) = entry.file_type() else { continue };
        if ft.is_dir() {
            collect_markdown_files(&path, out);
        } else if name.ends_with(".md") {
            out.push(path);
        }
    }
}

fn title_from_path(path: &str) -> String {
    let base = Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(path);
    base.replace(['-', '_'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, Indexer) {
        let dir = tempfile::tempdir().unwrap();
        let db = Index::open_in_memory().unwrap();
        let idx = Indexer::new(db, dir.path());
        (dir, idx)
    }

    fn write(dir: &tempfile::TempDir, rel: &str, content: &str) -> PathBuf {
        let path = dir.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_index_file_extracts_metadata() {
        let (dir, idx) = setup();
        let path = write(
            &dir,
            "note.md",
            "---\ntitle: My Note\ntags: [x, y]\n---\n\n# Section\n\nSee [[other]].\n",
        );
        assert!(idx.index_file(&path).unwrap());

        let db = idx.db();
        let results = db.list_all_notes(10).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "My Note");

        let headings = db.note_headings("note.md").unwrap();
        assert_eq!(headings.len(), 1);
        assert_eq!(headings[0].text, "Section");

        let backlinks = db.get_backlinks("other.md").unwrap();
        assert_eq!(backlinks.len(), 1);
        assert_eq!(backlinks[0].source_path, "note.md");
    }

    #[test]
    fn test_hash_gate_skips_unchanged() {
        let (dir, idx) = setup();
        let path = write(&dir, "a.md", "content\n");
        assert!(idx.index_file(&path).unwrap());
        assert!(!idx.index_file(&path).unwrap()); // unchanged

        write(&dir, "a.md", "different\n");
        assert!(idx.index_file(&path).unwrap());
    }

    #[test]
    fn test_title_falls_back_to_filename() {
        let (dir, idx) = setup();
        let path = write(&dir, "my_project-notes.md", "no frontmatter\n");
        idx.index_file(&path).unwrap();

        let results = idx.db().list_all_notes(10).unwrap();
        assert_eq!(results[0].title, "my project notes");
    }

    #[test]
    fn test_index_all_walks_and_skips_hidden() {
        let (dir, idx) = setup();
        write(&dir, "a.md", "a\n");
        write(&dir, "sub/b.md", "b\n");
        write(&dir, ".kopr/ignored.md", "x\n");
        write(&dir, "not-markdown.txt", "x\n");

        idx.index_all().unwrap();
        let paths: Vec<String> = idx
            .db()
            .list_all_notes(10)
            .unwrap()
            .into_iter()
            .map(|r| r.path)
            .collect();
        assert_eq!(paths, vec!["a.md", "sub/b.md"]);
    }

    #[test]
    fn test_link_resolution_both_directions() {
        let (dir, idx) = setup();
        // a links to b before b exists
        let a = write(&dir, "a.md", "See [[b]].\n");
        idx.index_file(&a).unwrap();

        let unresolved: i64 = idx
            .db()
            .conn
            .query_row(
                "SELECT count(*) FROM links WHERE target_id IS NULL",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(unresolved, 1);

        // indexing b resolves the dangling link
        let b = write(&dir, "sub/b.md", "body\n");
        idx.index_file(&b).unwrap();
        let unresolved: i64 = idx
            .db()
            .conn
            .query_row(
                "SELECT count(*) FROM links WHERE target_id IS NULL",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(unresolved, 0);
    }

    #[test]
    fn test_remove_file_clears_rows() {
        let (dir, idx) = setup();
        let path = write(&dir, "a.md", "# H\n[[b]]\n");
        idx.index_file(&path).unwrap();
        idx.remove_file(&path).unwrap();
        assert!(idx.db().list_all_notes(10).unwrap().is_empty());
        let links: i64 = idx
            .db()
            .conn
            .query_row("SELECT count(*) FROM links", [], |r| r.get(0))
            .unwrap();
        assert_eq!(links, 0);
    }

    #[test]
    fn test_reindex_reflects_current_content_exactly() {
        let (dir, idx) = setup();
        let path = write(&dir, "a.md", "---\ntags: [one]\n---\n# First\n[[x]]\n");
        idx.index_file(&path).unwrap();

        write(&dir, "a.md", "---\ntags: [two]\n---\n# Second\n[[y]] [[z]]\n");
        idx.index_file(&path).unwrap();

        let db = idx.db();
        let headings = db.note_headings("a.md").unwrap();
        assert_eq!(headings.len(), 1);
        assert_eq!(headings[0].text, "Second");

        assert!(db.get_backlinks("x.md").unwrap().is_empty());
        assert_eq!(db.get_backlinks("y.md").unwrap().len(), 1);
        assert_eq!(db.get_backlinks("z.md").unwrap().len(), 1);

        let tags: Vec<String> = {
            let mut stmt = db
                .conn
                .prepare(
                    "SELECT t.name FROM tags t JOIN note_tags nt ON nt.tag_id = t.id",
                )
                .unwrap();
            let rows = stmt.query_map([], |r| r.get(0)).unwrap();
            rows.collect::<Result<_, _>>().unwrap()
        };
        assert_eq!(tags, vec!["two"]);
    }
}
