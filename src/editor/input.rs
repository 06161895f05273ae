use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Convert a key event back into the raw escape sequence the editor's
/// terminal expects.
pub fn key_event_to_bytes(key: &KeyEvent) -> Option<Vec<u8>> {
    // Alt-modified keys get an ESC prefix
    if key.modifiers.contains(KeyModifiers::ALT) {
        let mut inner = KeyEvent::new(key.code, key.modifiers - KeyModifiers::ALT);
        inner.kind = key.kind;
        let bytes = key_event_to_bytes(&inner)?;
        let mut out = vec![0x1b];
        out.extend(bytes);
        return Some(out);
    }

    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let shift = key.modifiers.contains(KeyModifiers::SHIFT);

    match key.code {
        KeyCode::Char(c) => {
            if ctrl {
                // C0 control codes for ctrl+a..z and a few punctuation keys
                let lower = c.to_ascii_lowercase();
                if lower.is_ascii_lowercase() {
                    return Some(vec![(lower as u8) & 0x1f]);
                }
                return match lower {
                    ' ' | '@' => Some(vec![0x00]),
                    '[' => Some(vec![0x1b]),
                    '\\' => Some(vec![0x1c]),
                    ']' => Some(vec![0x1d]),
                    '^' => Some(vec![0x1e]),
                    '_' => Some(vec![0x1f]),
                    _ => None,
                };
            }
            let mut buf = [0u8; 4];
            Some(c.encode_utf8(&mut buf).as_bytes().to_vec())
        }
        KeyCode::Enter => Some(vec![b'\r']),
        KeyCode::Backspace => Some(vec![0x7f]),
        KeyCode::Tab => Some(vec![b'\t']),
        KeyCode::BackTab => Some(b"\x1b[Z".to_vec()),
        KeyCode::Esc => Some(vec![0x1b]),

        KeyCode::Up => Some(arrow(b'A', ctrl, shift)),
        KeyCode::Down => Some(arrow(b'B', ctrl, shift)),
        KeyCode::Right => Some(arrow(b'C', ctrl, shift)),
        KeyCode::Left => Some(arrow(b'D', ctrl, shift)),

        KeyCode::Home => Some(b"\x1b[H".to_vec()),
        KeyCode::End => Some(b"\x1b[F".to_vec()),
        KeyCode::PageUp => Some(b"\x1b[5~".to_vec()),
        KeyCode::PageDown => Some(b"\x1b[6~".to_vec()),
        KeyCode::Delete => Some(b"\x1b[3~".to_vec()),
        KeyCode::Insert => Some(b"\x1b[2~".to_vec()),

        KeyCode::F(n) => function_key(n),

        _ => None,
    }
}

fn arrow(letter: u8, ctrl: bool, shift: bool) -> Vec<u8> {
    if ctrl {
        vec![0x1b, b'[', b'1', b';', b'5', letter]
    } else if shift {
        vec![0x1b, b'[', b'1', b';', b'2', letter]
    } else {
        vec![0x1b, b'[', letter]
    }
}

fn function_key(n: u8) -> Option<Vec<u8>> {
    match n {
        1 => Some(b"\x1bOP".to_vec()),
        2 => Some(b"\x1bOQ".to_vec()),
        3 => Some(b"\x1bOR".to_vec()),
        4 => Some(b"\x1bOS".to_vec()),
        5 => Some(b"\x1b[15~".to_vec()),
        6 => Some(b"\x1b[17~".to_vec()),
        7 => Some(b"\x1b[18~".to_vec()),
        8 => Some(b"\x1b[19~".to_vec()),
        9 => Some(b"\x1b[20~".to_vec()),
        10 => Some(b"\x1b[21~".to_vec()),
        11 => Some(b"\x1b[23~".to_vec()),
        12 => Some(b"\x1b[24~".to_vec()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn key_mod(code: KeyCode, mods: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, mods)
    }

    #[test]
    fn test_plain_chars() {
        assert_eq!(key_event_to_bytes(&key(KeyCode::Char('a'))), Some(b"a".to_vec()));
        assert_eq!(
            key_event_to_bytes(&key(KeyCode::Char('é'))),
            Some("é".as_bytes().to_vec())
        );
    }

    #[test]
    fn test_special_keys() {
        assert_eq!(key_event_to_bytes(&key(KeyCode::Enter)), Some(b"\r".to_vec()));
        assert_eq!(
            key_event_to_bytes(&key(KeyCode::Backspace)),
            Some(vec![0x7f])
        );
        assert_eq!(key_event_to_bytes(&key(KeyCode::Esc)), Some(vec![0x1b]));
    }

    #[test]
    fn test_arrows_with_modifiers() {
        assert_eq!(
            key_event_to_bytes(&key(KeyCode::Up)),
            Some(b"\x1b[A".to_vec())
        );
        assert_eq!(
            key_event_to_bytes(&key_mod(KeyCode::Up, KeyModifiers::CONTROL)),
            Some(b"\x1b[1;5A".to_vec())
        );
        assert_eq!(
            key_event_to_bytes(&key_mod(KeyCode::Down, KeyModifiers::SHIFT)),
            Some(b"\x1b[1;2B".to_vec())
        );
    }

    #[test]
    fn test_ctrl_letters() {
        assert_eq!(
            key_event_to_bytes(&key_mod(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(vec![0x03])
        );
        assert_eq!(
            key_event_to_bytes(&key_mod(KeyCode::Char('w'), KeyModifiers::CONTROL)),
            Some(vec![0x17])
        );
    }

    #[test]
    fn test_alt_prefix() {
        assert_eq!(
            key_event_to_bytes(&key_mod(KeyCode::Char('x'), KeyModifiers::ALT)),
            Some(vec![0x1b, b'x'])
        );
    }

    #[test]
    fn test_function_keys() {
        assert_eq!(
            key_event_to_bytes(&key(KeyCode::F(1))),
            Some(b"\x1bOP".to_vec())
        );
        assert_eq!(
            key_event_to_bytes(&key(KeyCode::F(12))),
            Some(b"\x1b[24~".to_vec())
        );
        assert_eq!(key_event_to_bytes(&key(KeyCode::F(13))), None);
    }
}
