//! Lobby and game membership commands: the join family (64/65/67/68), the
//! leave pair (66/69), and arrow updates (88). The join family is where the
//! six variants diverge hardest: per-slot records differ in name width and
//! in the extra data blocks one variant appends.

use crate::{packet_struct, wire_record, FixedText, FixedWText, Version};

packet_struct! {
    /// Per-slot identity record, half-width variants (early/later console).
    pub struct LobbyDataDc {
        pub player_tag: u32,
        pub guild_card: u32,
        pub ip_address: u32,
        pub client_id: u32,
        pub name: FixedText<0x10>,
    }
}
wire_record!(LobbyDataDc);

packet_struct! {
    /// Per-slot identity record, pc-family.
    pub struct LobbyDataPc {
        pub player_tag: u32,
        pub guild_card: u32,
        pub ip_address: u32,
        pub client_id: u32,
        pub name: FixedWText<0x10>,
    }
}
wire_record!(LobbyDataPc);

packet_struct! {
    /// Per-slot identity record, Xbox family: console record plus the
    /// platform's network location blob.
    pub struct LobbyDataXb {
        pub base: LobbyDataDc,
        pub netloc: [u8; 0x18],
    }
}
wire_record!(LobbyDataXb);

packet_struct! {
    /// Per-slot identity record, latter-game variant.
    pub struct LobbyDataBb {
        pub player_tag: u32,
        pub guild_card: u32,
        pub team_id: u32,
        pub ip_address: u32,
        pub client_id: u32,
        pub name: FixedWText<0x10>,
        pub unused: u32,
    }
}
wire_record!(LobbyDataBb);

/// Wire size of one lobby-data record for the variant.
pub const fn lobby_data_len(version: Version) -> usize {
    use crate::EncodeRecord;
    match version {
        Version::Dc | Version::Gc => LobbyDataDc::SIZE,
        Version::Pc | Version::Patch => LobbyDataPc::SIZE,
        Version::Xb => LobbyDataXb::SIZE,
        Version::Bb => LobbyDataBb::SIZE,
    }
}

/// Offset of the guild-card field inside every lobby-data layout. Identity
/// rewriting relies on this being variant-independent.
pub const LOBBY_DATA_GUILD_CARD_OFFSET: usize = 4;

/// Offset of the client-id word inside a lobby-data record.
pub const fn lobby_data_client_id_offset(version: Version) -> usize {
    match version {
        Version::Bb => 16,
        _ => 12,
    }
}

/// Offset of the name field inside a lobby-data record.
pub const fn lobby_data_name_offset(version: Version) -> usize {
    match version {
        Version::Bb => 20,
        _ => 16,
    }
}

/// Wire size of a display-data block for the variant.
pub const fn player_disp_len(version: Version) -> usize {
    use crate::EncodeRecord;
    if version.uses_wide_text() {
        PlayerDispPc::SIZE
    } else {
        PlayerDispDc::SIZE
    }
}

/// Wire size of one 65/67/68 roster entry: lobby data, inventory, display.
pub const fn join_lobby_entry_len(version: Version) -> usize {
    use crate::EncodeRecord;
    lobby_data_len(version) + PlayerInventoryData::SIZE + player_disp_len(version)
}

packet_struct! {
    /// Combat stats block inside a player's display data.
    pub struct PlayerStats {
        pub atp: u16,
        pub mst: u16,
        pub evp: u16,
        pub hp: u16,
        pub dfp: u16,
        pub ata: u16,
        pub lck: u16,
    }
}
wire_record!(PlayerStats);

packet_struct! {
    /// Display data, half-width variants.
    pub struct PlayerDispDc {
        pub stats: PlayerStats,
        pub unused: u16,
        pub level: u32,
        pub experience: u32,
        pub meseta: u32,
        pub name: FixedText<0x10>,
        pub appearance: [u8; 0x30],
        pub section_id: u8,
        pub char_class: u8,
        pub unused2: u16,
    }
}
wire_record!(PlayerDispDc);

packet_struct! {
    /// Display data, wide variants.
    pub struct PlayerDispPc {
        pub stats: PlayerStats,
        pub unused: u16,
        pub level: u32,
        pub experience: u32,
        pub meseta: u32,
        pub name: FixedWText<0x10>,
        pub appearance: [u8; 0x30],
        pub section_id: u8,
        pub char_class: u8,
        pub unused2: u16,
    }
}
wire_record!(PlayerDispPc);

packet_struct! {
    /// Opaque inventory block carried in join entries. The server never
    /// interprets it beyond relaying.
    pub struct PlayerInventoryData {
        pub num_items: u8,
        pub hp_materials: u8,
        pub tp_materials: u8,
        pub language: u8,
        pub items: [u8; 0x348],
    }
}
wire_record!(PlayerInventoryData);

impl Default for PlayerInventoryData {
    fn default() -> Self {
        Self {
            num_items: 0,
            hp_materials: 0,
            tp_materials: 0,
            language: 0,
            items: [0; 0x348],
        }
    }
}

packet_struct! {
    /// Fixed head of 65/67/68 (lobby joins). The flag of the frame carries
    /// the number of per-slot entries that follow.
    pub struct JoinLobbyHead {
        pub client_id: u8,
        pub leader_id: u8,
        pub disable_udp: u8,
        pub lobby_number: u8,
        pub block_number: u16,
        pub event: u16,
        pub unused: u32,
    }
}

/// Offsets of the fields the proxy tracks in a join-lobby head.
pub const JOIN_LOBBY_EVENT_OFFSET: usize = 6;
pub const JOIN_LOBBY_NUMBER_OFFSET: usize = 3;

packet_struct! {
    /// Fixed tail of 64 (game join) common to all variants; the per-slot
    /// records sit between the variations block and this.
    pub struct JoinGameTail {
        pub client_id: u8,
        pub leader_id: u8,
        pub disable_udp: u8,
        pub difficulty: u8,
        pub battle_mode: u8,
        pub event: u8,
        pub section_id: u8,
        pub challenge_mode: u8,
        pub rare_seed: u32,
        pub episode: u8,
        pub unused2: u8,
        pub solo_mode: u8,
        pub unused3: u8,
    }
}

/// Length of the map-layout variations block that opens a 64 command.
pub const GAME_VARIATIONS_WORDS: usize = 0x20;

packet_struct! {
    /// 66/69 (and the card-battle E9): a player left; carries the new
    /// leader so peers converge on the same leadership view.
    pub struct LeaveLobby6669 {
        pub client_id: u8,
        pub leader_id: u8,
        pub unused: u16,
    }
}

packet_struct! {
    /// One slot of the card-battle lobby command (E4).
    pub struct CardLobbyEntryE4 {
        pub guild_card_number: u32,
        pub name: FixedText<0x10>,
        pub unused: [u8; 0x0C],
    }
}
wire_record!(CardLobbyEntryE4);

packet_struct! {
    /// E4: card-battle lobby/game roster, always four slots.
    pub struct CardLobbyGameE4 {
        pub client_id: u8,
        pub leader_id: u8,
        pub unused: u16,
        pub entry0: CardLobbyEntryE4,
        pub entry1: CardLobbyEntryE4,
        pub entry2: CardLobbyEntryE4,
        pub entry3: CardLobbyEntryE4,
    }
}

impl CardLobbyGameE4 {
    pub fn entries_mut(&mut self) -> [&mut CardLobbyEntryE4; 4] {
        [
            &mut self.entry0,
            &mut self.entry1,
            &mut self.entry2,
            &mut self.entry3,
        ]
    }
}

packet_struct! {
    /// One entry of an 88 arrow update; flag = entry count.
    pub struct ArrowUpdateEntry88 {
        pub player_tag: u32,
        pub guild_card_number: u32,
        pub arrow_color: u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EncodeRecord;

    #[test]
    fn lobby_data_sizes() {
        assert_eq!(LobbyDataDc::SIZE, 0x20);
        assert_eq!(LobbyDataPc::SIZE, 0x30);
        assert_eq!(LobbyDataXb::SIZE, 0x38);
        assert_eq!(LobbyDataBb::SIZE, 0x38);
        for v in Version::ALL {
            assert!(lobby_data_len(v) >= LobbyDataDc::SIZE);
        }
    }

    #[test]
    fn join_heads() {
        assert_eq!(JoinLobbyHead::SIZE, 12);
        assert_eq!(JoinGameTail::SIZE, 16);
        assert_eq!(LeaveLobby6669::SIZE, 4);
        assert_eq!(ArrowUpdateEntry88::SIZE, 12);
    }

    #[test]
    fn disp_widths() {
        assert_eq!(PlayerDispPc::SIZE, PlayerDispDc::SIZE + 0x10);
        assert_eq!(PlayerInventoryData::SIZE, 0x34C);
    }
}
