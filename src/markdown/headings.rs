/// A markdown ATX heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    /// 1..=6
    pub level: u8,
    pub text: String,
    /// 1-based line number
    pub line: usize,
}

/// Extract all ATX headings from markdown content. Frontmatter is skipped.
pub fn extract_headings(content: &str) -> Vec<Heading> {
    let mut headings = Vec::new();
    let mut in_frontmatter = false;

    for (i, line) in content.lines().enumerate() {
        let line_num = i + 1;

        if line_num == 1 && line.trim() == "---" {
            in_frontmatter = true;
            continue;
        }
        if in_frontmatter {
            if line.trim() == "---" {
                in_frontmatter = false;
            }
            continue;
        }

        let trimmed = line.trim_start_matches(' ');
        if !trimmed.starts_with('#') {
            continue;
        }

        let level = trimmed.chars().take_while(|&c| c == '#').count();
        if level == 0 || level > 6 {
            continue;
        }

        let text = trimmed[level..]
            .trim()
            .trim_end_matches(['#', ' '])
            .trim()
            .to_string();
        if !text.is_empty() {
            headings.push(Heading {
                level: level as u8,
                text,
                line: line_num,
            });
        }
    }

    headings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_levels() {
        let got = extract_headings("# One\n## Two\n###### Six\n");
        assert_eq!(
            got,
            vec![
                Heading {
                    level: 1,
                    text: "One".into(),
                    line: 1
                },
                Heading {
                    level: 2,
                    text: "Two".into(),
                    line: 2
                },
                Heading {
                    level: 6,
                    text: "Six".into(),
                    line: 3
                },
            ]
        );
    }

    #[test]
    fn test_seven_hashes_ignored() {
        assert!(extract_headings("####### too deep\n").is_empty());
    }

    #[test]
    fn test_trailing_hash_markers_stripped() {
        let got = extract_headings("## Closed ##\n");
        assert_eq!(got[0].text, "Closed");
    }

    #[test]
    fn test_leading_spaces_allowed() {
        let got = extract_headings("   # Indented\n");
        assert_eq!(got[0].text, "Indented");
        assert_eq!(got[0].level, 1);
    }

    #[test]
    fn test_frontmatter_skipped() {
        let got = extract_headings("---\ntitle: x\n---\n# Real\n");
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].line, 4);
    }

    #[test]
    fn test_empty_heading_skipped() {
        assert!(extract_headings("##\n# \n").is_empty());
    }
}
