//! Sub-commands: second-level commands carried inside a 60/62/6C/6D/C9/CB
//! envelope, identified by their first byte. 60/C9 broadcast to the lobby,
//! 62/6D target the client in the envelope's flag.

use crate::{packet_struct, wire_record, FixedText, FixedWText, PacketWriter};

/// Envelope command codes.
pub const ENVELOPE_BROADCAST: u16 = 0x60;
pub const ENVELOPE_TARGETED: u16 = 0x62;
pub const ENVELOPE_BROADCAST_LARGE: u16 = 0x6C;
pub const ENVELOPE_TARGETED_LARGE: u16 = 0x6D;
pub const ENVELOPE_CARD_BROADCAST: u16 = 0xC9;
pub const ENVELOPE_CARD_TARGETED: u16 = 0xCB;

pub fn is_envelope(command: u16) -> bool {
    matches!(command, 0x60 | 0x62 | 0x6C | 0x6D | 0xC9 | 0xCB)
}

/// Sub-command identifiers referenced outside of plain relaying.
pub const SUB_SWITCH_STATE: u8 = 0x05;
pub const SUB_GUILD_CARD: u8 = 0x06;
pub const SUB_ENEMY_HIT: u8 = 0x2F;
pub const SUB_PLAYER_HIT: u8 = 0x4C;
pub const SUB_USE_TECHNIQUE: u8 = 0x48;
pub const SUB_DROP_ITEM: u8 = 0x5F;
pub const SUB_ENEMY_DROP_REQUEST: u8 = 0x60;
pub const SUB_BOX_DROP_REQUEST: u8 = 0xA2;
pub const SUB_STATS_CHANGE: u8 = 0x9A;
pub const SUB_RESUME_GAME: u8 = 0x72;

/// The resume-game word broadcast once every joiner has loaded.
pub const RESUME_GAME_WORD: u32 = 0x081C_0372;

packet_struct! {
    /// Common 4-byte head: id, size in words, and a parameter (usually a
    /// client id or zero).
    pub struct SubcommandHeader {
        pub subcommand: u8,
        pub size_words: u8,
        pub params: u16,
    }
}
wire_record!(SubcommandHeader);

packet_struct! {
    /// 6x06 guild-card exchange, half-width variants. Identity rewriting on
    /// proxies touches `guild_card_number`.
    pub struct GuildCardV36x06 {
        pub header: SubcommandHeader,
        pub player_tag: u32,
        pub guild_card_number: u32,
        pub name: FixedText<0x18>,
        pub description: FixedText<0x48>,
        pub reserved1: u8,
        pub reserved2: u8,
        pub section_id: u8,
        pub char_class: u8,
    }
}

packet_struct! {
    /// 6x06 guild-card exchange, latter-game variant.
    pub struct GuildCardBb6x06 {
        pub header: SubcommandHeader,
        pub guild_card_number: u32,
        pub name: FixedWText<0x18>,
        pub team_name: FixedWText<0x10>,
        pub description: FixedWText<0x58>,
        pub reserved1: u8,
        pub reserved2: u8,
        pub section_id: u8,
        pub char_class: u8,
    }
}

packet_struct! {
    /// 6x05 switch state change. Replayed by switch-assist to complete
    /// two-player switch pairs solo.
    pub struct SwitchStateChanged6x05 {
        pub header: SubcommandHeader,
        pub unused: [u8; 4],
        pub switch_id: u16,
        pub area: u8,
        pub enabled: u8,
    }
}

packet_struct! {
    /// Item record as it appears inside drop commands and inventories.
    pub struct ItemData {
        pub data1: [u8; 12],
        pub item_id: u32,
        pub data2: [u8; 4],
    }
}
wire_record!(ItemData);

packet_struct! {
    /// 6x60: a client asks what an enemy dropped. Some variants append one
    /// extra word, so acceptance is lax between the two sizes.
    pub struct EnemyDropRequest6x60 {
        pub header: SubcommandHeader,
        pub area: u8,
        pub enemy_id: u8,
        pub request_id: u16,
        pub x: f32,
        pub z: f32,
        pub unused: u32,
    }
}

pub const ENEMY_DROP_REQUEST_MAX: usize = 24;

packet_struct! {
    /// 6xA2: a client asks what a box dropped.
    pub struct BoxDropRequest6xA2 {
        pub header: SubcommandHeader,
        pub area: u8,
        pub unused: u8,
        pub request_id: u16,
        pub x: f32,
        pub z: f32,
        pub unused2: u32,
        pub unused3: u32,
    }
}

packet_struct! {
    /// 6x5F: an item appeared on the ground.
    pub struct DropItem6x5F {
        pub header: SubcommandHeader,
        pub area: u8,
        pub from_enemy: u8,
        pub request_id: u16,
        pub x: f32,
        pub z: f32,
        pub unused: u32,
        pub item: ItemData,
    }
}

/// Stat selector for a 6x9A stats-change entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StatsChange {
    SubtractHp = 0,
    SubtractTp = 1,
    SubtractMeseta = 2,
    AddHp = 3,
    AddTp = 4,
}

/// Builds a 6x9A chain changing `stat` by `amount` (entries cap at 255 per
/// pair, so larger amounts become several pairs). Total is capped at 2550.
pub fn build_stats_change(client_id: u8, stat: StatsChange, mut amount: u32) -> Vec<u8> {
    assert!(amount <= 2550, "stats change amount out of range");
    let mut pw = PacketWriter::new();
    while amount > 0 {
        let step = amount.min(0xFF) as u8;
        pw.write_u8(SUB_STATS_CHANGE);
        pw.write_u8(0x02);
        pw.write_u8(client_id);
        pw.write_u8(0x00);
        pw.write_u8(0x00);
        pw.write_u8(0x00);
        pw.write_u8(stat as u8);
        pw.write_u8(step);
        amount -= u32::from(step);
    }
    pw.into_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DecodeRecord, EncodeRecord};

    #[test]
    fn layouts() {
        assert_eq!(SubcommandHeader::SIZE, 4);
        assert_eq!(GuildCardV36x06::SIZE, 0x70);
        assert_eq!(GuildCardBb6x06::SIZE, 0x10C);
        assert_eq!(SwitchStateChanged6x05::SIZE, 12);
        assert_eq!(ItemData::SIZE, 0x14);
        assert_eq!(EnemyDropRequest6x60::SIZE, 20);
        assert_eq!(BoxDropRequest6xA2::SIZE, 24);
        assert_eq!(DropItem6x5F::SIZE, 40);
    }

    #[test]
    fn stats_change_batches() {
        let chain = build_stats_change(2, StatsChange::AddHp, 1020);
        // 1020 = 255 * 4, so four 8-byte pairs.
        assert_eq!(chain.len(), 4 * 8);
        assert_eq!(chain[0], SUB_STATS_CHANGE);
        assert_eq!(chain[2], 2);
        assert_eq!(chain[6], StatsChange::AddHp as u8);
        assert_eq!(chain[7], 0xFF);

        let small = build_stats_change(0, StatsChange::AddTp, 0xFF);
        assert_eq!(small.len(), 8);
    }

    #[test]
    fn drop_request_round_trip() {
        let req = EnemyDropRequest6x60 {
            header: SubcommandHeader {
                subcommand: SUB_ENEMY_DROP_REQUEST,
                size_words: 5,
                params: 0,
            },
            area: 3,
            enemy_id: 7,
            request_id: 0x0102,
            x: 10.0,
            z: -4.5,
            unused: 0,
        };
        let decoded = EnemyDropRequest6x60::from_slice(&req.to_bytes()).unwrap();
        assert_eq!(decoded, req);
    }
}
