//! Login commands and the client-config cookie the server round-trips
//! through the client to survive its own reconnect redirects.

use crate::{packet_struct, wire_record, FixedText};

packet_struct! {
    /// Client-side config cookie (0x20 bytes on everything except the
    /// latter-game variant). `magic` identifies the issuing server; a
    /// cookie with a foreign magic must not be trusted.
    pub struct ClientConfig {
        pub magic: u64,
        pub game_state: u8,
        pub player_index: u8,
        pub flags: u16,
        pub unused: [u32; 5],
    }
}
wire_record!(ClientConfig);

packet_struct! {
    /// Latter-game form of the cookie (0x28 bytes).
    pub struct ClientConfigBb {
        pub base: ClientConfig,
        pub unused_bb: [u32; 2],
    }
}
wire_record!(ClientConfigBb);

packet_struct! {
    /// 04: server updates the client's guild-card number and config cookie.
    pub struct UpdateClientConfig04 {
        pub player_tag: u32,
        pub guild_card_number: u32,
        pub cfg: ClientConfig,
    }
}

/// Minimum acceptable 04 payload: some servers send fewer than the 0x20
/// cookie bytes and rely on the client's copy-0x20-regardless behavior.
pub const UPDATE_CLIENT_CONFIG_MIN: usize = 8;

packet_struct! {
    /// 93: login sent by first-generation early-console clients.
    pub struct LoginV1Dc93 {
        pub player_tag: u32,
        pub guild_card_number: u32,
        pub unknown_a1: u32,
        pub unknown_a2: u32,
        pub sub_version: u8,
        pub is_extended: u8,
        pub language: u8,
        pub unused: u8,
        pub serial_number: FixedText<0x10>,
        pub access_key: FixedText<0x10>,
        pub hardware_id: FixedText<0x10>,
        pub name: FixedText<0x10>,
    }
}

packet_struct! {
    /// 9D: login for early-console and pc-family clients.
    pub struct Login9D {
        pub player_tag: u32,
        pub guild_card_number: u32,
        pub unused: u64,
        pub sub_version: u8,
        pub is_extended: u8,
        pub language: u8,
        pub unused2: u8,
        pub serial_number: FixedText<0x10>,
        pub access_key: FixedText<0x10>,
        pub serial_number2: FixedText<0x10>,
        pub access_key2: FixedText<0x10>,
        pub name: FixedText<0x10>,
    }
}

packet_struct! {
    /// 9E: later-console login; ends with the echoed config cookie. The
    /// extended form appends an extra block the first time a client logs in
    /// without a guild-card number.
    pub struct LoginGc9E {
        pub player_tag: u32,
        pub guild_card_number: u32,
        pub unused: u64,
        pub sub_version: u8,
        pub is_extended: u8,
        pub language: u8,
        pub unused2: u8,
        pub serial_number: FixedText<0x10>,
        pub access_key: FixedText<0x10>,
        pub serial_number2: FixedText<0x10>,
        pub access_key2: FixedText<0x10>,
        pub name: FixedText<0x10>,
        pub cfg: ClientConfig,
    }
}

packet_struct! {
    pub struct LoginGc9EExtended {
        pub base: LoginGc9E,
        pub extension: [u32; 0x20],
    }
}
wire_record!(LoginGc9E);

packet_struct! {
    /// DB: license verification sent by later-console clients before 9E.
    pub struct VerifyLicenseDb {
        pub serial_number: FixedText<0x10>,
        pub access_key: FixedText<0x10>,
        pub sub_version: u32,
        pub serial_number2: FixedText<0x10>,
        pub access_key2: FixedText<0x10>,
        pub password: FixedText<0x10>,
    }
}

packet_struct! {
    /// 93 on the latter-game variant. The total frame (8-byte header plus
    /// this payload) is 0xB4 bytes, which is the known plaintext the
    /// multi-key detector probes against.
    pub struct LoginBb93 {
        pub player_tag: u32,
        pub guild_card_number: u32,
        pub sub_version: u32,
        pub language: u32,
        pub serial_number: FixedText<0x30>,
        pub access_key: FixedText<0x30>,
        pub hardware_info: [u8; 0x14],
        pub cfg: ClientConfigBb,
    }
}

/// Offset within a saved latter-game login payload patched by the remote-IP
/// countermeasure.
pub const BB_LOGIN_CRC_OFFSET: usize = 0x94;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EncodeRecord;

    #[test]
    fn config_sizes() {
        assert_eq!(ClientConfig::SIZE, 0x20);
        assert_eq!(ClientConfigBb::SIZE, 0x28);
        assert_eq!(UpdateClientConfig04::SIZE, 0x28);
    }

    #[test]
    fn bb_login_matches_detector_prefix() {
        // Payload 0xAC + 8-byte header = 0xB4 total, the detector's known
        // first-frame size.
        assert_eq!(LoginBb93::SIZE, 0xAC);
        assert!(BB_LOGIN_CRC_OFFSET < LoginBb93::SIZE - 4);
    }

    #[test]
    fn nine_e_extends_cleanly() {
        assert_eq!(LoginGc9EExtended::SIZE, LoginGc9E::SIZE + 0x80);
    }
}
