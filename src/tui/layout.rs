/// UX-driven minimum supported terminal size. Below this the app stops
/// rendering the full UI and shows a placeholder message.
pub const MIN_WIDTH: u16 = 60;
pub const MIN_HEIGHT: u16 = 24;

/// Computed panel dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub tree_width: u16,
    pub editor_width: u16,
    pub info_width: u16,
    /// Content height (status row excluded)
    pub height: u16,
    pub status_height: u16,
}

/// Calculate panel dimensions from the total size and panel visibility.
/// Each visible side panel gets min(configured, remaining/3) columns, minus
/// one column of border overlap; the editor takes the rest (at least 1).
pub fn compute_layout(
    total_width: u16,
    total_height: u16,
    show_tree: bool,
    show_info: bool,
    show_status: bool,
    tree_width: u16,
    info_width: u16,
) -> Layout {
    // Some terminals report transient zero sizes during live resizes.
    let total_width = total_width.max(1);
    let total_height = total_height.max(2);

    let status_height: u16 = if show_status { 1 } else { 0 };
    let mut layout = Layout {
        tree_width: 0,
        editor_width: 0,
        info_width: 0,
        height: total_height - status_height,
        status_height,
    };

    let mut remaining = total_width as i32;

    if show_tree {
        layout.tree_width = tree_width.min((remaining / 3) as u16);
        remaining -= layout.tree_width as i32 - 1; // border overlap
    }
    if show_info {
        layout.info_width = info_width.min((remaining / 3) as u16);
        remaining -= layout.info_width as i32 - 1; // border overlap
    }

    layout.editor_width = remaining.max(1) as u16;
    layout
}
