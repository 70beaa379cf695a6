//! Server-init frames. These are the only frames sent unencrypted: they
//! carry the key material both sides use to install their ciphers.

use crate::{packet_struct, FixedText};

pub const ANTI_COPYRIGHT: &str = "This server is in no way affiliated, sponsored, or supported by SEGA Enterprises or SONICTEAM. The preceding message exists only in order to remain compatible with programs that expect it.";
pub const DC_PORT_MAP_COPYRIGHT: &str =
    "DreamCast Port Map. Copyright SEGA Enterprises. 1999";
pub const DC_LOBBY_SERVER_COPYRIGHT: &str =
    "DreamCast Lobby Server. Copyright SEGA Enterprises. 1999";
pub const BB_GAME_SERVER_COPYRIGHT: &str =
    "Phantasy Star Online Blue Burst Game Server. Copyright 1999-2004 SONICTEAM.";
pub const PATCH_SERVER_COPYRIGHT: &str = "Patch Server. Copyright SonicTeam, LTD. 2001";

packet_struct! {
    /// 02/17 (also 91/9B on old servers): server init for everything except
    /// the latter-game variant. Third-party servers truncate `after_message`,
    /// so decoding is lax past the two keys.
    pub struct ServerInitV2 {
        pub copyright: FixedText<0x40>,
        pub server_key: u32,
        pub client_key: u32,
        pub after_message: FixedText<0xC0>,
    }
}

/// Minimum acceptable 02/17 payload: copyright plus both keys.
pub const SERVER_INIT_V2_MIN: usize = 0x48;

packet_struct! {
    /// 03 (also 9B): latter-game server init with 48-byte key seeds.
    pub struct ServerInitBb {
        pub copyright: FixedText<0x60>,
        pub server_key: [u8; 48],
        pub client_key: [u8; 48],
        pub after_message: FixedText<0xC0>,
    }
}

/// Minimum acceptable 03 payload: copyright plus both key seeds.
pub const SERVER_INIT_BB_MIN: usize = 0xC0;

packet_struct! {
    /// 02 on the patcher: no after-message field at all.
    pub struct ServerInitPatch {
        pub copyright: FixedText<0x40>,
        pub server_key: u32,
        pub client_key: u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DecodeRecord, EncodeRecord};

    #[test]
    fn v2_layout() {
        assert_eq!(ServerInitV2::SIZE, 0x108);
        let cmd = ServerInitV2 {
            copyright: FixedText::from_str(DC_PORT_MAP_COPYRIGHT).unwrap(),
            server_key: 0xCAFE_BABE,
            client_key: 0xDEAD_BEEF,
            after_message: FixedText::from_str(ANTI_COPYRIGHT).unwrap(),
        };
        let bytes = cmd.to_bytes();
        assert_eq!(bytes.len(), ServerInitV2::SIZE);
        assert_eq!(&bytes[0x40..0x44], &0xCAFE_BABEu32.to_le_bytes());

        // A truncated frame (keys only) still decodes with an empty tail.
        let short = crate::decode_lax::<ServerInitV2>(&bytes[..SERVER_INIT_V2_MIN]).unwrap();
        assert_eq!(short.server_key, 0xCAFE_BABE);
        assert!(short.after_message.is_empty());

        let full = ServerInitV2::from_slice(&bytes).unwrap();
        assert_eq!(full, cmd);
    }

    #[test]
    fn bb_layout() {
        assert_eq!(ServerInitBb::SIZE, 0x180);
    }
}
