pub mod rewrite;
pub mod slug;
pub mod template;

pub use rewrite::rewrite_links_in_note;
pub use slug::slugify;
pub use template::{Template, expand_template};

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;

/// Error type for vault file operations
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("\"{}\" already exists", .0.display())]
    AlreadyExists(PathBuf),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A file or directory inside the vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    /// Vault-relative path
    pub path: PathBuf,
    pub is_dir: bool,
    pub depth: usize,
}

/// A knowledge vault: a root directory of Markdown notes.
pub struct Vault {
    pub root: PathBuf,
}

impl Vault {
    pub fn new(root: impl Into<PathBuf>) -> Vault {
        Vault { root: root.into() }
    }

    pub fn abs_path(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.root.join(rel)
    }

    /// A flat list of all files and directories, in hierarchical order:
    /// a directory precedes its contents; among siblings, directories come
    /// before files, both case-insensitive alphabetical. Hidden entries
    /// (names starting with '.') are skipped.
    pub fn list_entries(&self) -> Vec<Entry> {
        let mut entries = Vec::new();
        self.walk(Path::new(""), 0, &mut entries);
        entries
    }

    fn walk(&self, rel: &Path, depth: usize, out: &mut Vec<Entry>) {
        let Ok(read) = fs::read_dir(self.root.join(rel)) else {
            return; // unreadable directories are skipped, not fatal
        };

        let mut children: Vec<(String, bool)> = read
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let name = e.file_name().to_str()?.to_string();
                if name.starts_with('.') {
                    return None;
                }
                let is_dir = e.file_type().ok()?.is_dir();
                Some((name, is_dir))
            })
            .collect();

        children.sort_by(|a, b| {
            b.1.cmp(&a.1)
                .then_with(|| a.0.to_lowercase().cmp(&b.0.to_lowercase()))
        });

        for (name, is_dir) in children {
            let child_rel = rel.join(&name);
            out.push(Entry {
                name,
                path: child_rel.clone(),
                is_dir,
                depth,
            });
            if is_dir {
                self.walk(&child_rel, depth + 1, out);
            }
        }
    }

    /// Markdown files only, in the same hierarchical order.
    pub fn list_notes(&self) -> Vec<Entry> {
        self.list_entries()
            .into_iter()
            .filter(|e| !e.is_dir && e.name.ends_with(".md"))
            .collect()
    }

    /// Create a new note file. Parent directories are created; an existing
    /// file is never overwritten. The write goes through a temp file and a
    /// rename. Returns the absolute path.
    pub fn create_note(&self, rel: impl AsRef<Path>, content: &str) -> Result<PathBuf, VaultError> {
        let abs = self.root.join(rel.as_ref());
        if let Some(dir) = abs.parent() {
            fs::create_dir_all(dir)?;
        }
        if abs.exists() {
            return Err(VaultError::AlreadyExists(rel.as_ref().to_path_buf()));
        }

        let tmp = abs.with_extension("md.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &abs)?;
        Ok(abs)
    }

    /// Create today's daily note under daily/, or return the existing path.
    pub fn create_daily_note(&self) -> Result<PathBuf, VaultError> {
        let date = Local::now().format("%Y-%m-%d").to_string();
        let rel = PathBuf::from("daily").join(format!("{date}.md"));
        if self.root.join(&rel).exists() {
            return Ok(self.root.join(rel));
        }

        let content = format!("---\ntitle: {date}\ndate: {date}\ntags: [daily]\n---\n\n# {date}\n\n");
        self.create_note(rel, &content)
    }

    /// Create a timestamped capture note under inbox/.
    pub fn create_inbox_note(&self) -> Result<PathBuf, VaultError> {
        let now = Local::now();
        let stamp = now.format("%Y-%m-%d-%H%M%S").to_string();
        let date = now.format("%Y-%m-%d").to_string();
        let rel = PathBuf::from("inbox").join(format!("{stamp}.md"));

        let content =
            format!("---\ntitle: Inbox {stamp}\ndate: {date}\ntags: [inbox]\nstatus: inbox\n---\n\n");
        self.create_note(rel, &content)
    }

    /// Rename a note to a new vault-relative path. Refuses to clobber an
    /// existing destination; parent directories are created.
    pub fn rename_note(
        &self,
        old_rel: impl AsRef<Path>,
        new_rel: impl AsRef<Path>,
    ) -> Result<(), VaultError> {
        let old_abs = self.root.join(old_rel.as_ref());
        let new_abs = self.root.join(new_rel.as_ref());
        if new_abs.exists() {
            return Err(VaultError::AlreadyExists(new_rel.as_ref().to_path_buf()));
        }
        if let Some(dir) = new_abs.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::rename(&old_abs, &new_abs)?;
        Ok(())
    }

    /// Move a note into another directory, keeping its basename.
    pub fn move_note(&self, rel: impl AsRef<Path>, new_dir: &str) -> Result<PathBuf, VaultError> {
        let rel = rel.as_ref();
        let name = rel
            .file_name()
            .ok_or_else(|| VaultError::Io(std::io::Error::other("path has no file name")))?;
        let new_rel = if new_dir.is_empty() || new_dir == "." {
            PathBuf::from(name)
        } else {
            PathBuf::from(new_dir).join(name)
        };
        self.rename_note(rel, &new_rel)?;
        Ok(new_rel)
    }

    pub fn delete_note(&self, rel: impl AsRef<Path>) -> Result<(), VaultError> {
        fs::remove_file(self.root.join(rel.as_ref()))?;
        Ok(())
    }

    pub fn create_dir(&self, rel: impl AsRef<Path>) -> Result<(), VaultError> {
        fs::create_dir_all(self.root.join(rel.as_ref()))?;
        Ok(())
    }

    /// Load all templates from the vault's templates/ directory.
    pub fn load_templates(&self) -> Vec<Template> {
        let dir = self.root.join("templates");
        let Ok(read) = fs::read_dir(&dir) else {
            return Vec::new();
        };

        let mut templates: Vec<Template> = read
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let name = e.file_name().to_str()?.to_string();
                let name = name.strip_suffix(".md")?.to_string();
                let path = e.path();
                let content = fs::read_to_string(&path).ok()?;
                Some(Template {
                    name,
                    path,
                    content,
                })
            })
            .collect();
        templates.sort_by(|a, b| a.name.cmp(&b.name));
        templates
    }

    /// Create a new note from a template, expanding its variables.
    /// The note is written at the vault root as <slug>.md.
    pub fn create_from_template(
        &self,
        template: &Template,
        title: &str,
    ) -> Result<PathBuf, VaultError> {
        let rel = format!("{}.md", slugify(title));
        let content = expand_template(&template.content, title);
        self.create_note(rel, &content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vault() -> (tempfile::TempDir, Vault) {
        let dir = tempfile::tempdir().unwrap();
        let v = Vault::new(dir.path());
        (dir, v)
    }

    #[test]
    fn test_create_note_and_refuse_overwrite() {
        let (_dir, v) = vault();
        let abs = v.create_note("notes/a.md", "hello").unwrap();
        assert_eq!(fs::read_to_string(&abs).unwrap(), "hello");

        let err = v.create_note("notes/a.md", "again").unwrap_err();
        assert!(matches!(err, VaultError::AlreadyExists(_)));
    }

    #[test]
    fn test_hierarchical_entry_order() {
        let (_dir, v) = vault();
        v.create_note("b.md", "").unwrap();
        v.create_note("Alpha/inner.md", "").unwrap();
        v.create_note("Alpha/sub/deep.md", "").unwrap();
        v.create_note("zeta/z.md", "").unwrap();
        v.create_note("a.md", "").unwrap();

        let paths: Vec<String> = v
            .list_entries()
            .iter()
            .map(|e| e.path.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            paths,
            vec![
                "Alpha",
                "Alpha/sub",
                "Alpha/sub/deep.md",
                "Alpha/inner.md",
                "zeta",
                "zeta/z.md",
                "a.md",
                "b.md",
            ]
        );
    }

    #[test]
    fn test_hidden_entries_skipped() {
        let (_dir, v) = vault();
        v.create_note("visible.md", "").unwrap();
        fs::create_dir_all(v.root.join(".kopr")).unwrap();
        fs::write(v.root.join(".kopr/index.db"), "").unwrap();
        fs::write(v.root.join(".hidden.md"), "").unwrap();

        let entries = v.list_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "visible.md");
    }

    #[test]
    fn test_rename_refuses_existing_destination() {
        let (_dir, v) = vault();
        v.create_note("a.md", "").unwrap();
        v.create_note("b.md", "").unwrap();
        assert!(matches!(
            v.rename_note("a.md", "b.md"),
            Err(VaultError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_move_note_keeps_basename() {
        let (_dir, v) = vault();
        v.create_note("a.md", "body").unwrap();
        v.create_dir("archive").unwrap();
        let new_rel = v.move_note("a.md", "archive").unwrap();
        assert_eq!(new_rel, PathBuf::from("archive/a.md"));
        assert!(v.root.join("archive/a.md").exists());
        assert!(!v.root.join("a.md").exists());
    }

    #[test]
    fn test_daily_note_idempotent() {
        let (_dir, v) = vault();
        let first = v.create_daily_note().unwrap();
        let content = fs::read_to_string(&first).unwrap();
        assert!(content.contains("tags: [daily]"));

        // A second call on the same day returns the existing file untouched.
        let second = v.create_daily_note().unwrap();
        assert_eq!(first, second);
        assert_eq!(fs::read_to_string(&second).unwrap(), content);
    }

    #[test]
    fn test_inbox_note_frontmatter() {
        let (_dir, v) = vault();
        let path = v.create_inbox_note().unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("tags: [inbox]"));
        assert!(content.contains("status: inbox"));
    }

    #[test]
    fn test_load_templates() {
        let (_dir, v) = vault();
        v.create_note("templates/meeting.md", "# {{title}}\n").unwrap();
        v.create_note("templates/journal.md", "{{date}}\n").unwrap();

        let templates = v.load_templates();
        let names: Vec<&str> = templates.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["journal", "meeting"]);
    }

    #[test]
    fn test_create_from_template_expands_and_slugs() {
        let (_dir, v) = vault();
        v.create_note("templates/note.md", "# {{title}}\nslug: {{slug}}\n")
            .unwrap();
        let templates = v.load_templates();
        let abs = v
            .create_from_template(&templates[0], "My Great Idea")
            .unwrap();
        assert!(abs.ends_with("my-great-idea.md"));
        let content = fs::read_to_string(abs).unwrap();
        assert!(content.contains("# My Great Idea"));
        assert!(content.contains("slug: my-great-idea"));
    }
}
