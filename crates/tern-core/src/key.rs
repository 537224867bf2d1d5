use std::fmt;

/// A decoded key press.
///
/// Produced by [`decode`] from one raw input unit and delivered to the
/// handler of a [`key_press`](crate::subscriptions::key_press) subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// A printable ASCII character (codes 32–126).
    Character(char),
    /// Anything the decoder does not recognise, e.g. `"Unknown-200"`.
    Special(String),
    /// A control character, reported as its caret letter (`3` -> `'C'`).
    Control(char),
    /// Carriage return or line feed.
    Enter,
    /// A bare escape byte.
    Escape,
    /// Delete or backspace.
    Backspace,
    /// Horizontal tab.
    Tab,
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Character(c) => write!(f, "{c}"),
            Key::Special(name) => f.write_str(name),
            Key::Control(c) => write!(f, "Ctrl+{c}"),
            Key::Enter => f.write_str("Enter"),
            Key::Escape => f.write_str("Esc"),
            Key::Backspace => f.write_str("Backspace"),
            Key::Tab => f.write_str("Tab"),
        }
    }
}

/// Decode one raw input unit into a [`Key`].
///
/// Total over `i32`: codes outside the table fall back to
/// `Key::Special("Unknown-<code>")`.
///
/// Multi-byte escape sequences (arrows, function keys) are not assembled. A
/// lone `27` always decodes to [`Key::Escape`], even when it is the lead byte
/// of a longer sequence.
///
/// # Example
///
/// ```
/// use tern_core::key::{decode, Key};
///
/// assert_eq!(decode(13), Key::Enter);
/// assert_eq!(decode(3), Key::Control('C'));
/// assert_eq!(decode(65), Key::Character('A'));
/// ```
pub fn decode(code: i32) -> Key {
    match code {
        13 | 10 => Key::Enter,
        27 => Key::Escape,
        127 | 8 => Key::Backspace,
        9 => Key::Tab,
        0..=31 => Key::Control(ascii(code + 64)),
        32..=126 => Key::Character(ascii(code)),
        _ => Key::Special(format!("Unknown-{code}")),
    }
}

// Callers only pass codes in 32..=126 or 64..=95.
fn ascii(code: i32) -> char {
    char::from(code as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_endings_decode_to_enter() {
        assert_eq!(decode(13), Key::Enter);
        assert_eq!(decode(10), Key::Enter);
    }

    #[test]
    fn named_control_codes() {
        assert_eq!(decode(27), Key::Escape);
        assert_eq!(decode(127), Key::Backspace);
        assert_eq!(decode(8), Key::Backspace);
        assert_eq!(decode(9), Key::Tab);
    }

    #[test]
    fn other_control_codes_use_caret_letter() {
        assert_eq!(decode(3), Key::Control('C'));
        assert_eq!(decode(0), Key::Control('@'));
        assert_eq!(decode(1), Key::Control('A'));
        assert_eq!(decode(31), Key::Control('_'));
    }

    #[test]
    fn printable_range() {
        assert_eq!(decode(32), Key::Character(' '));
        assert_eq!(decode(65), Key::Character('A'));
        assert_eq!(decode(43), Key::Character('+'));
        assert_eq!(decode(126), Key::Character('~'));
    }

    #[test]
    fn out_of_table_codes_are_special() {
        assert_eq!(decode(128), Key::Special("Unknown-128".into()));
        assert_eq!(decode(-1), Key::Special("Unknown--1".into()));
        assert_eq!(decode(1000), Key::Special("Unknown-1000".into()));
    }

    #[test]
    fn decode_is_total_and_deterministic() {
        for code in -1000..=1000 {
            assert_eq!(decode(code), decode(code));
            if !(0..=127).contains(&code) {
                assert_eq!(decode(code), Key::Special(format!("Unknown-{code}")));
            }
        }
    }

    #[test]
    fn display_is_readable() {
        assert_eq!(Key::Control('C').to_string(), "Ctrl+C");
        assert_eq!(Key::Character('q').to_string(), "q");
        assert_eq!(Key::Escape.to_string(), "Esc");
    }
}
