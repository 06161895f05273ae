/// Apply deterministic CommonMark-compatible formatting to markdown.
/// Rules:
///   - Preserve frontmatter byte-for-byte
///   - Trim trailing whitespace on every other line
///   - Normalize ATX headings (one space after the `#`s, no trailing markers)
///   - Ensure one blank line before a heading that is not at the start of
///     the document and not immediately after frontmatter
///   - Collapse runs of 3+ blank lines to 2
///   - Exactly one trailing newline
///
/// The output is a fixed point: format(format(x)) == format(x).
pub fn format(content: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut in_frontmatter = false;

    for (i, line) in content.lines().enumerate() {
        if i == 0 && line.trim() == "---" {
            in_frontmatter = true;
            lines.push(line.to_string());
            continue;
        }
        if in_frontmatter {
            lines.push(line.to_string());
            if line.trim() == "---" {
                in_frontmatter = false;
            }
            continue;
        }

        let mut line = line.trim_end_matches([' ', '\t']).to_string();
        if is_heading(&line) {
            line = normalize_heading(&line);
        }
        lines.push(line);
    }

    let lines = normalize_blank_lines(lines);

    let mut result = lines.join("\n");
    while result.ends_with('\n') {
        result.pop();
    }
    result.push('\n');
    result
}

fn is_heading(line: &str) -> bool {
    line.trim_start_matches(' ').starts_with('#')
}

fn normalize_heading(line: &str) -> String {
    let trimmed = line.trim_start_matches(' ');
    let level = trimmed.chars().take_while(|&c| c == '#').count();
    if level == 0 || level > 6 {
        return line.to_string();
    }

    let text = trimmed[level..].trim().trim_end_matches(['#', ' ']).trim();
    if text.is_empty() {
        return "#".repeat(level);
    }
    format!("{} {}", "#".repeat(level), text)
}

fn normalize_blank_lines(lines: Vec<String>) -> Vec<String> {
    let mut result: Vec<String> = Vec::new();
    let mut consecutive_blanks = 0;
    let mut in_frontmatter = false;

    for (i, line) in lines.into_iter().enumerate() {
        if i == 0 && line.trim() == "---" {
            in_frontmatter = true;
            result.push(line);
            consecutive_blanks = 0;
            continue;
        }
        if in_frontmatter {
            if line.trim() == "---" {
                in_frontmatter = false;
            }
            result.push(line);
            consecutive_blanks = 0;
            continue;
        }

        if line.trim().is_empty() {
            consecutive_blanks += 1;
            if consecutive_blanks <= 2 {
                result.push(line);
            }
        } else {
            // Blank line before headings, unless at start or right after frontmatter
            if is_heading(&line)
                && let Some(last) = result.last()
                && !last.trim().is_empty()
                && !last.trim().starts_with("---")
            {
                result.push(String::new());
            }
            consecutive_blanks = 0;
            result.push(line);
        }
    }

    result
}
