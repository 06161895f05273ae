use std::time::Instant;

use super::app::App;

/// A leaf action runs against the app; a group waits for the next key.
pub type LeaderAction = fn(&mut App);

/// One node in the leader binding tree.
pub struct Binding {
    pub key: &'static str,
    pub label: &'static str,
    pub action: Option<LeaderAction>,
    pub children: Vec<Binding>,
}

impl Binding {
    fn leaf(key: &'static str, label: &'static str, action: LeaderAction) -> Binding {
        Binding {
            key,
            label,
            action: Some(action),
            children: Vec::new(),
        }
    }

    fn group(key: &'static str, label: &'static str, children: Vec<Binding>) -> Binding {
        Binding {
            key,
            label,
            action: None,
            children,
        }
    }
}

/// Tracks an in-flight leader key sequence.
#[derive(Default)]
pub struct LeaderState {
    pub active: bool,
    pub keys: Vec<String>,
    pub show_help: bool,
    pub deadline: Option<Instant>,
}

impl LeaderState {
    pub fn cancel(&mut self) {
        self.active = false;
        self.keys.clear();
        self.show_help = false;
        self.deadline = None;
    }
}

/// Walk the binding tree along the pressed keys, returning the reachable
/// children (the options the which-key popup lists).
pub fn children_at<'a>(bindings: &'a [Binding], keys: &[String]) -> Option<&'a [Binding]> {
    let mut node = bindings;
    for key in keys {
        let next = node.iter().find(|b| b.key == key.as_str())?;
        node = &next.children;
    }
    Some(node)
}

pub fn default_bindings() -> Vec<Binding> {
    vec![
        Binding::leaf(" ", "Fuzzy finder", App::toggle_finder),
        Binding::group(
            "f",
            "+find",
            vec![Binding::leaf("n", "Find/create note", App::toggle_finder)],
        ),
        Binding::group(
            "n",
            "+note",
            vec![
                Binding::leaf("n", "New note", App::create_blank_note),
                Binding::leaf("d", "Daily note", App::create_daily_note),
                Binding::leaf("i", "Inbox capture", App::create_inbox_note),
                Binding::leaf("r", "Rename note", App::rename_current_note),
            ],
        ),
        Binding::group(
            "t",
            "+template",
            vec![Binding::leaf("i", "Insert template", App::insert_template)],
        ),
        Binding::group(
            "v",
            "+view",
            vec![
                Binding::leaf("t", "Toggle tree", App::toggle_tree),
                Binding::leaf("b", "Toggle backlinks", App::toggle_info),
                Binding::leaf("s", "Toggle status", App::toggle_status),
            ],
        ),
        Binding::group(
            "z",
            "+zen",
            vec![Binding::leaf("z", "Zen mode", App::toggle_zen)],
        ),
        Binding::group(
            "q",
            "+quit",
            vec![Binding::leaf("q", "Quit Kopr", App::request_quit)],
        ),
        Binding::group(
            "m",
            "+markdown",
            vec![Binding::leaf("f", "Format document", App::format_document)],
        ),
        Binding::group(
            "c",
            "+config",
            vec![Binding::leaf("r", "Reload config", App::reload_config)],
        ),
    ]
}

/// Display form of a binding key ("Space" for the space character).
pub fn display_key(key: &str) -> String {
    if key == " " {
        "Space".to_string()
    } else {
        key.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_children_at_walks_groups() {
        let bindings = default_bindings();
        let root = children_at(&bindings, &[]).unwrap();
        assert!(root.iter().any(|b| b.key == "n"));

        let note = children_at(&bindings, &["n".to_string()]).unwrap();
        let keys: Vec<&str> = note.iter().map(|b| b.key).collect();
        assert!(keys.contains(&"n"));
        assert!(keys.contains(&"d"));
        assert!(keys.contains(&"i"));
        assert!(keys.contains(&"r"));
    }

    #[test]
    fn test_children_at_unknown_key_is_none() {
        let bindings = default_bindings();
        assert!(children_at(&bindings, &["!".to_string()]).is_none());
    }

    #[test]
    fn test_leaves_have_actions() {
        let bindings = default_bindings();
        let quit = children_at(&bindings, &["q".to_string()]).unwrap();
        assert!(quit[0].action.is_some());
        assert!(quit[0].children.is_empty());
    }

    #[test]
    fn test_display_key() {
        assert_eq!(display_key(" "), "Space");
        assert_eq!(display_key("n"), "n");
    }
}
