use std::fs;
use std::path::Path;

use regex::Regex;

use super::VaultError;

/// Replace wiki link targets matching `old_name` with `new_name`, preserving
/// any `.md`, `#section` and `|alias` suffixes. Handles [[old]], [[old.md]],
/// [[old#section]], [[old|alias]] and their combinations.
pub fn replace_wiki_link_targets(content: &str, old_name: &str, new_name: &str) -> String {
    let escaped = regex::escape(old_name);
    let pattern = format!(r"\[\[{escaped}(\.md)?([#|][^\]]*)?\]\]");
    let re = Regex::new(&pattern).expect("valid rewrite pattern");

    re.replace_all(content, |caps: &regex::Captures| {
        let md = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let suffix = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        format!("[[{new_name}{md}{suffix}]]")
    })
    .into_owned()
}

/// Read a note, rewrite wiki link targets from `old_name` to `new_name`,
/// and write it back only if something changed. Returns whether the file
/// was modified.
pub fn rewrite_links_in_note(
    abs_path: &Path,
    old_name: &str,
    new_name: &str,
) -> Result<bool, VaultError> {
    let original = fs::read_to_string(abs_path)?;
    let updated = replace_wiki_link_targets(&original, old_name, new_name);

    if updated == original {
        return Ok(false);
    }

    fs::write(abs_path, updated)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_variants() {
        let cases = [
            ("See [[my-note]].", "See [[renamed]]."),
            ("See [[my-note.md]].", "See [[renamed.md]]."),
            ("See [[my-note#intro]].", "See [[renamed#intro]]."),
            ("See [[my-note|My Note]].", "See [[renamed|My Note]]."),
            (
                "See [[my-note#intro|Introduction]].",
                "See [[renamed#intro|Introduction]].",
            ),
            ("See [[my-note.md#intro]].", "See [[renamed.md#intro]]."),
            ("See [[my-note.md|My Note]].", "See [[renamed.md|My Note]]."),
            (
                "See [[my-note.md#intro|Introduction]].",
                "See [[renamed.md#intro|Introduction]].",
            ),
        ];
        for (input, want) in cases {
            assert_eq!(replace_wiki_link_targets(input, "my-note", "renamed"), want);
        }
    }

    #[test]
    fn test_multiple_links_one_line() {
        assert_eq!(
            replace_wiki_link_targets("[[my-note]] and [[my-note#s]]", "my-note", "renamed"),
            "[[renamed]] and [[renamed#s]]"
        );
    }

    #[test]
    fn test_no_match_untouched() {
        assert_eq!(
            replace_wiki_link_targets("See [[other-note]].", "my-note", "renamed"),
            "See [[other-note]]."
        );
    }

    #[test]
    fn test_partial_name_untouched() {
        assert_eq!(
            replace_wiki_link_targets("See [[my-note-extra]].", "my-note", "renamed"),
            "See [[my-note-extra]]."
        );
    }

    #[test]
    fn test_rewrite_round_trip() {
        let content = "Link to [[b]] and [[b#intro|hi]] and [[b.md]].";
        let forward = replace_wiki_link_targets(content, "b", "c");
        assert_eq!(forward, "Link to [[c]] and [[c#intro|hi]] and [[c.md]].");
        let back = replace_wiki_link_targets(&forward, "c", "b");
        assert_eq!(back, content);
    }

    #[test]
    fn test_rewrite_file_only_when_changed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("source.md");
        fs::write(&path, "# Source\n\nLinks to [[old-name]].\n").unwrap();

        let changed = rewrite_links_in_note(&path, "old-name", "new-name").unwrap();
        assert!(changed);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "# Source\n\nLinks to [[new-name]].\n"
        );

        let changed = rewrite_links_in_note(&path, "old-name", "new-name").unwrap();
        assert!(!changed);
    }
}
