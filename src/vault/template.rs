use std::path::PathBuf;

use chrono::Local;

use super::slug::slugify;

/// A note template from <vault>/templates/.
#[derive(Debug, Clone)]
pub struct Template {
    pub name: String,
    pub path: PathBuf,
    pub content: String,
}

/// Expand template variables:
///   {{title}}     note title
///   {{date}}      current date (YYYY-MM-DD)
///   {{datetime}}  current datetime (YYYY-MM-DD HH:MM:SS)
///   {{time}}      current time (HH:MM:SS)
///   {{slug}}      slugified title
pub fn expand_template(content: &str, title: &str) -> String {
    let now = Local::now();
    content
        .replace("{{title}}", title)
        .replace("{{date}}", &now.format("%Y-%m-%d").to_string())
        .replace("{{datetime}}", &now.format("%Y-%m-%d %H:%M:%S").to_string())
        .replace("{{time}}", &now.format("%H:%M:%S").to_string())
        .replace("{{slug}}", &slugify(title))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_and_slug() {
        let out = expand_template("# {{title}} ({{slug}})", "Weekly Sync");
        assert_eq!(out, "# Weekly Sync (weekly-sync)");
    }

    #[test]
    fn test_date_shape() {
        let out = expand_template("{{date}}", "x");
        // YYYY-MM-DD
        assert_eq!(out.len(), 10);
        assert_eq!(out.as_bytes()[4], b'-');
        assert_eq!(out.as_bytes()[7], b'-');
    }

    #[test]
    fn test_unknown_placeholders_left_alone() {
        let out = expand_template("{{unknown}}", "x");
        assert_eq!(out, "{{unknown}}");
    }
}
