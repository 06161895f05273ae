pub mod formatter;
pub mod frontmatter;
pub mod headings;
pub mod wikilink;

pub use formatter::format;
pub use frontmatter::{Frontmatter, extract_frontmatter};
pub use headings::{Heading, extract_headings};
pub use wikilink::{
    WikiLink, extract_wiki_links, note_name_from_path, resolve_wiki_link_target, wiki_link_at,
};

/// Extracted metadata from a markdown note.
#[derive(Debug, Clone)]
pub struct ParsedNote {
    pub content: String,
    pub frontmatter: Option<Frontmatter>,
    pub headings: Vec<Heading>,
    pub wiki_links: Vec<WikiLink>,
}

/// Parse markdown content. The parser is permissive: it never fails,
/// malformed input just produces fewer extracted items.
pub fn parse(content: &str) -> ParsedNote {
    ParsedNote {
        content: content.to_string(),
        frontmatter: extract_frontmatter(content),
        headings: extract_headings(content),
        wiki_links: extract_wiki_links(content),
    }
}

impl ParsedNote {
    /// The note content without the frontmatter block.
    pub fn plain_content(&self) -> &str {
        let Some(fm) = &self.frontmatter else {
            return &self.content;
        };
        // Skip everything through the closing delimiter line.
        let mut remaining = fm.end_line;
        let mut offset = 0;
        for (i, b) in self.content.bytes().enumerate() {
            if b == b'\n' {
                remaining -= 1;
                if remaining == 0 {
                    offset = i + 1;
                    break;
                }
            }
        }
        if remaining > 0 {
            return "";
        }
        &self.content[offset..]
    }
}
