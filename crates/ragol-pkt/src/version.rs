use crate::error::Error;

/// The six client flavors sharing this protocol lineage. The tag drives
/// framing layout, cipher selection, text width, and record layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Version {
    /// Early console release.
    Dc,
    /// Personal-computer port.
    Pc,
    /// The content patcher that ships with the PC-family releases.
    Patch,
    /// Later console release.
    Gc,
    /// Later console release, Xbox family.
    Xb,
    /// Standalone re-release ("Blue Burst" family).
    Bb,
}

impl Version {
    pub const ALL: [Version; 6] = [
        Version::Dc,
        Version::Pc,
        Version::Patch,
        Version::Gc,
        Version::Xb,
        Version::Bb,
    ];

    /// Frame header length in bytes.
    pub const fn header_len(self) -> usize {
        match self {
            Version::Bb => 8,
            _ => 4,
        }
    }

    /// Frames are zero-padded to a multiple of this, which is also the
    /// cipher block size for the variant.
    pub const fn frame_align(self) -> usize {
        match self {
            Version::Bb => 8,
            _ => 4,
        }
    }

    /// Whether text payloads use wide (UTF-16LE) encoding.
    pub const fn uses_wide_text(self) -> bool {
        matches!(self, Version::Pc | Version::Patch | Version::Bb)
    }

    /// Whether the variant uses the later-console cipher rather than the
    /// pc-family one. The Bb variant has its own multi-key cipher.
    pub const fn uses_v3_cipher(self) -> bool {
        matches!(self, Version::Gc | Version::Xb)
    }
}

impl TryFrom<u8> for Version {
    type Error = Error;

    fn try_from(v: u8) -> Result<Self, Error> {
        Version::ALL
            .get(v as usize)
            .copied()
            .ok_or(Error::UnknownVersion(v))
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Version::Dc => "dc",
            Version::Pc => "pc",
            Version::Patch => "patch",
            Version::Gc => "gc",
            Version::Xb => "xb",
            Version::Bb => "bb",
        };
        f.write_str(name)
    }
}
