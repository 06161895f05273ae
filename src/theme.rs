use std::collections::HashMap;

use ratatui::style::Color;

/// Color palette shared by all TUI panels. The app mutates it in place when
/// colors are extracted from the editor; panels read it on the next render.
#[derive(Debug, Clone, PartialEq)]
pub struct Theme {
    pub bg: Color,
    pub accent: Color,
    pub subtle: Color,
    pub text: Color,
    pub dim: Color,
    pub border: Color,
    pub status_bg: Color,
    pub status_fg: Color,
    pub error: Color,
    pub normal_mode: Color,
    pub insert_mode: Color,
    pub visual_mode: Color,
    pub cmd_mode: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Theme {
            bg: Color::Rgb(0x1e, 0x1e, 0x2e),
            accent: Color::Rgb(0xcb, 0xa6, 0xf7),
            subtle: Color::Rgb(0x6c, 0x70, 0x86),
            text: Color::Rgb(0xcd, 0xd6, 0xf4),
            dim: Color::Rgb(0x58, 0x5b, 0x70),
            border: Color::Rgb(0x45, 0x47, 0x5a),
            status_bg: Color::Rgb(0x31, 0x32, 0x44),
            status_fg: Color::Rgb(0xcd, 0xd6, 0xf4),
            error: Color::Rgb(0xf3, 0x8b, 0xa8),
            normal_mode: Color::Rgb(0x89, 0xb4, 0xfa),
            insert_mode: Color::Rgb(0xa6, 0xe3, 0xa1),
            visual_mode: Color::Rgb(0xf9, 0xe2, 0xaf),
            cmd_mode: Color::Rgb(0xf3, 0x8b, 0xa8),
        }
    }
}

/// Parse a hex color string like "#cba6f7" into an RGB Color
pub fn parse_hex_color(hex: &str) -> Option<Color> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some(Color::Rgb(r, g, b))
}

/// Extracted highlight-group colors: group name → (fg, bg) hex strings.
/// Empty string means the group did not define that attribute.
pub type ExtractedColors = HashMap<String, (String, String)>;

/// True when the color string represents an explicitly set color.
/// Neovim reports 0 for groups inheriting the default, which serializes to
/// "#000000"; both empty and pure black count as unset.
fn is_set(c: &str) -> bool {
    !c.is_empty() && c != "#000000"
}

fn fg<'a>(colors: &'a ExtractedColors, group: &str) -> &'a str {
    colors.get(group).map(|p| p.0.as_str()).unwrap_or("")
}

fn bg<'a>(colors: &'a ExtractedColors, group: &str) -> &'a str {
    colors.get(group).map(|p| p.1.as_str()).unwrap_or("")
}

impl Theme {
    /// Map raw Neovim highlight group colors onto a Theme. Any field without
    /// a corresponding extracted color keeps the base value.
    pub fn from_extracted(colors: &ExtractedColors, base: Theme) -> Theme {
        let mut t = base;

        if let Some(c) = parse_set(bg(colors, "Normal")) {
            t.bg = c;
        }
        if let Some(c) = parse_set(fg(colors, "Normal")) {
            t.text = c;
        }

        // Accent: prefer Function, fall back to Keyword
        if let Some(c) = parse_set(fg(colors, "Function")) {
            t.accent = c;
        } else if let Some(c) = parse_set(fg(colors, "Keyword")) {
            t.accent = c;
        }

        if let Some(c) = parse_set(fg(colors, "Comment")) {
            t.subtle = c;
        }

        // Dim: prefer NonText, fall back to LineNr
        if let Some(c) = parse_set(fg(colors, "NonText")) {
            t.dim = c;
        } else if let Some(c) = parse_set(fg(colors, "LineNr")) {
            t.dim = c;
        }

        if let Some(c) = parse_set(fg(colors, "WinSeparator")) {
            t.border = c;
        }

        if let Some(c) = parse_set(bg(colors, "StatusLine")) {
            t.status_bg = c;
        }
        if let Some(c) = parse_set(fg(colors, "StatusLine")) {
            t.status_fg = c;
        }

        if let Some(c) = parse_set(fg(colors, "DiagnosticError")) {
            t.error = c;
        }

        // Mode colors derived from the palette
        t.normal_mode = t.accent;

        if let Some(c) = parse_set(fg(colors, "String")) {
            t.insert_mode = c;
        }

        // Visual: prefer Visual bg, fall back to WarningMsg fg
        if let Some(c) = parse_set(bg(colors, "Visual")) {
            t.visual_mode = c;
        } else if let Some(c) = parse_set(fg(colors, "WarningMsg")) {
            t.visual_mode = c;
        }

        t.cmd_mode = t.error;

        t
    }
}

fn parse_set(c: &str) -> Option<Color> {
    if is_set(c) { parse_hex_color(c) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn colors(entries: &[(&str, &str, &str)]) -> ExtractedColors {
        entries
            .iter()
            .map(|(g, f, b)| (g.to_string(), (f.to_string(), b.to_string())))
            .collect()
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(
            parse_hex_color("#cba6f7"),
            Some(Color::Rgb(0xcb, 0xa6, 0xf7))
        );
        assert_eq!(parse_hex_color("cba6f7"), None); // missing #
        assert_eq!(parse_hex_color("#cba6"), None); // too short
        assert_eq!(parse_hex_color("#zzzzzz"), None); // invalid hex
    }

    #[test]
    fn test_from_extracted_basic_mapping() {
        let c = colors(&[
            ("Normal", "#cdd6f4", "#1e1e2e"),
            ("Function", "#89b4fa", ""),
            ("Comment", "#6c7086", ""),
        ]);
        let t = Theme::from_extracted(&c, Theme::default());
        assert_eq!(t.text, Color::Rgb(0xcd, 0xd6, 0xf4));
        assert_eq!(t.bg, Color::Rgb(0x1e, 0x1e, 0x2e));
        assert_eq!(t.accent, Color::Rgb(0x89, 0xb4, 0xfa));
        assert_eq!(t.subtle, Color::Rgb(0x6c, 0x70, 0x86));
        // Normal-mode badge follows the accent
        assert_eq!(t.normal_mode, t.accent);
    }

    #[test]
    fn test_keyword_fallback_when_function_unset() {
        let c = colors(&[("Keyword", "#f38ba8", "")]);
        let t = Theme::from_extracted(&c, Theme::default());
        assert_eq!(t.accent, Color::Rgb(0xf3, 0x8b, 0xa8));
    }

    #[test]
    fn test_linenr_fallback_when_nontext_unset() {
        let c = colors(&[("LineNr", "#45475a", "")]);
        let t = Theme::from_extracted(&c, Theme::default());
        assert_eq!(t.dim, Color::Rgb(0x45, 0x47, 0x5a));
    }

    #[test]
    fn test_warningmsg_fallback_when_visual_bg_unset() {
        let c = colors(&[("WarningMsg", "#f9e2af", "")]);
        let t = Theme::from_extracted(&c, Theme::default());
        assert_eq!(t.visual_mode, Color::Rgb(0xf9, 0xe2, 0xaf));
    }

    #[test]
    fn test_black_counts_as_unset() {
        let base = Theme::default();
        let c = colors(&[("Normal", "#000000", "#000000")]);
        let t = Theme::from_extracted(&c, base.clone());
        assert_eq!(t.text, base.text);
        assert_eq!(t.bg, base.bg);
    }
}
