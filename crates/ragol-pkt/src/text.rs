//! Fixed-capacity wire text. Half-width fields carry the vendor code page
//! (ASCII-compatible; non-ASCII bytes are round-tripped untouched), wide
//! fields carry UTF-16LE. Both are NUL-terminated within their capacity.

use crate::{error::Error, PacketReader, PacketResult, PacketWriter, WireField};

/// Leading marker on name/text fields selecting the client language.
pub const MARKER_JP: &str = "\tJ";
pub const MARKER_EN: &str = "\tE";

/// Half-width text field with a fixed capacity of `N` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedText<const N: usize> {
    bytes: [u8; N],
}

impl<const N: usize> Default for FixedText<N> {
    fn default() -> Self {
        Self { bytes: [0; N] }
    }
}

impl<const N: usize> FixedText<N> {
    pub fn from_str(s: &str) -> PacketResult<Self> {
        if s.len() > N {
            return Err(Error::TextCapacity(N));
        }
        let mut bytes = [0u8; N];
        bytes[..s.len()].copy_from_slice(s.as_bytes());
        Ok(Self { bytes })
    }

    pub fn from_bytes(bytes: [u8; N]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; N] {
        &self.bytes
    }

    fn terminated(&self) -> &[u8] {
        let end = self.bytes.iter().position(|&b| b == 0).unwrap_or(N);
        &self.bytes[..end]
    }

    pub fn is_empty(&self) -> bool {
        self.bytes[0] == 0
    }

    /// Lossy conversion for display and logging.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(self.terminated()).into_owned()
    }

    /// Zeroes everything after the terminator. Some clients send
    /// uninitialized memory in the slack, which must not be forwarded.
    pub fn clear_slack(&mut self) {
        let end = self.bytes.iter().position(|&b| b == 0).unwrap_or(N);
        for b in &mut self.bytes[end..] {
            *b = 0;
        }
    }
}

impl<const N: usize> WireField for FixedText<N> {
    const WIRE_SIZE: usize = N;

    fn read(pr: &mut PacketReader<'_>) -> PacketResult<Self> {
        Ok(Self::from_bytes(pr.read_array()?))
    }

    fn write(&self, pw: &mut PacketWriter) -> PacketResult<()> {
        pw.write_slice(&self.bytes);
        Ok(())
    }
}

/// Wide (UTF-16LE) text field with a fixed capacity of `N` units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedWText<const N: usize> {
    units: [u16; N],
}

impl<const N: usize> Default for FixedWText<N> {
    fn default() -> Self {
        Self { units: [0; N] }
    }
}

impl<const N: usize> FixedWText<N> {
    pub fn from_str(s: &str) -> PacketResult<Self> {
        let mut units = [0u16; N];
        let mut len = 0;
        for unit in s.encode_utf16() {
            if len >= N {
                return Err(Error::TextCapacity(N));
            }
            units[len] = unit;
            len += 1;
        }
        Ok(Self { units })
    }

    fn terminated(&self) -> &[u16] {
        let end = self.units.iter().position(|&u| u == 0).unwrap_or(N);
        &self.units[..end]
    }

    pub fn is_empty(&self) -> bool {
        self.units[0] == 0
    }

    pub fn to_string_lossy(&self) -> String {
        char::decode_utf16(self.terminated().iter().copied())
            .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect()
    }
}

impl<const N: usize> WireField for FixedWText<N> {
    const WIRE_SIZE: usize = N * 2;

    fn read(pr: &mut PacketReader<'_>) -> PacketResult<Self> {
        let mut units = [0u16; N];
        for u in units.iter_mut() {
            *u = pr.read_u16()?;
        }
        Ok(Self { units })
    }

    fn write(&self, pw: &mut PacketWriter) -> PacketResult<()> {
        for u in &self.units {
            pw.write_u16(*u);
        }
        Ok(())
    }
}

/// Strips a leading language marker, returning the bare text.
pub fn remove_language_marker(s: &str) -> &str {
    s.strip_prefix(MARKER_JP)
        .or_else(|| s.strip_prefix(MARKER_EN))
        .unwrap_or(s)
}

/// Returns the language marker prefix of `s`, if any.
pub fn language_marker(s: &str) -> Option<&str> {
    if s.starts_with(MARKER_JP) {
        Some(MARKER_JP)
    } else if s.starts_with(MARKER_EN) {
        Some(MARKER_EN)
    } else {
        None
    }
}

/// Replaces the text after the marker, keeping the marker itself. Identity
/// rewriting must not change the client's language selection.
pub fn replace_keeping_marker(original: &str, replacement: &str) -> String {
    match language_marker(original) {
        Some(marker) => format!("{marker}{replacement}"),
        None => replacement.to_string(),
    }
}

/// True if the text begins with an in-band color code (`\tC<digit>`).
pub fn has_color_code(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next() == Some('\t')
        && chars.next() == Some('C')
        && chars.next().is_some_and(|c| c.is_ascii_digit())
}

/// Prefixes a default color code when chat filtering wants one and the
/// sender did not pick a color.
pub fn add_color_code(s: &str) -> String {
    if has_color_code(s) {
        s.to_string()
    } else {
        format!("\tC7{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_text_terminates() {
        let t = FixedText::<8>::from_str("abc").unwrap();
        assert_eq!(t.to_string_lossy(), "abc");
        assert_eq!(t.as_bytes(), &[b'a', b'b', b'c', 0, 0, 0, 0, 0]);
        assert!(FixedText::<2>::from_str("abc").is_err());
    }

    #[test]
    fn wide_text_round_trip() {
        let t = FixedWText::<16>::from_str("\tJリコ").unwrap();
        assert_eq!(t.to_string_lossy(), "\tJリコ");
        assert_eq!(remove_language_marker(&t.to_string_lossy()), "リコ");
    }

    #[test]
    fn marker_preserved_on_replace() {
        assert_eq!(replace_keeping_marker("\tEAlice", "Bob"), "\tEBob");
        assert_eq!(replace_keeping_marker("Alice", "Bob"), "Bob");
    }

    #[test]
    fn color_codes() {
        assert!(has_color_code("\tC6hello"));
        assert!(!has_color_code("hello"));
        assert_eq!(add_color_code("hi"), "\tC7hi");
        assert_eq!(add_color_code("\tC2hi"), "\tC2hi");
    }
}
