use std::collections::HashMap;

/// YAML-like frontmatter delimited by `---` lines.
#[derive(Debug, Clone, Default)]
pub struct Frontmatter {
    pub title: String,
    pub tags: Vec<String>,
    pub status: String,
    /// All keys as raw strings, including ones kopr does not interpret.
    pub raw: HashMap<String, String>,
    /// 1-based line number of the closing delimiter.
    pub end_line: usize,
}

/// Parse frontmatter from markdown content. The block must open with `---`
/// on the first line; an unclosed block yields None.
pub fn extract_frontmatter(content: &str) -> Option<Frontmatter> {
    let mut lines = content.lines();
    if lines.next()?.trim() != "---" {
        return None;
    }

    let mut fm = Frontmatter::default();
    let mut line_num = 1;

    for line in lines {
        line_num += 1;
        if line.trim() == "---" {
            fm.end_line = line_num;
            break;
        }

        let Some((key, val)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let val = val.trim();
        fm.raw.insert(key.to_string(), val.to_string());

        match key {
            "title" => fm.title = val.to_string(),
            "status" => fm.status = val.to_string(),
            "tags" => {
                // Accepts [tag1, tag2] or tag1, tag2
                let val = val.trim_start_matches('[').trim_end_matches(']');
                for tag in val.split(',') {
                    let tag = tag.trim();
                    if !tag.is_empty() {
                        fm.tags.push(tag.to_string());
                    }
                }
            }
            _ => {}
        }
    }

    if fm.end_line == 0 {
        return None; // unclosed frontmatter
    }
    Some(fm)
}
