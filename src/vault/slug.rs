/// Convert a title to a URL-friendly slug: lowercase, spaces to hyphens,
/// keep only a-z0-9-, collapse hyphen runs, trim leading/trailing hyphens.
pub fn slugify(title: &str) -> String {
    let lowered = title.to_lowercase().replace(' ', "-");

    let mut slug = String::with_capacity(lowered.len());
    for c in lowered.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' {
            slug.push(c);
        }
    }

    while slug.contains("--") {
        slug = slug.replace("--", "-");
    }
    slug.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic() {
        assert_eq!(slugify("My Great Idea"), "my-great-idea");
    }

    #[test]
    fn test_punctuation_dropped() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
    }

    #[test]
    fn test_hyphen_runs_collapsed() {
        assert_eq!(slugify("a - b -- c"), "a-b-c");
    }

    #[test]
    fn test_edge_hyphens_trimmed() {
        assert_eq!(slugify("-edge case-"), "edge-case");
        assert_eq!(slugify("  spaced  "), "spaced");
    }

    #[test]
    fn test_digits_kept() {
        assert_eq!(slugify("2024 Review"), "2024-review");
    }

    #[test]
    fn test_only_symbols_yields_empty() {
        assert_eq!(slugify("!!!"), "");
    }
}
