//! Menu commands: generic menus (07/1F), the game list (08), quest menus
//! (A2/A4), and the fixed lobby list (83).

use crate::{packet_struct, FixedText, FixedWText};

packet_struct! {
    /// 07/1F entry, half-width variants.
    pub struct MenuEntryDc {
        pub menu_id: u32,
        pub item_id: u32,
        pub flags: u16,
        pub text: FixedText<0x12>,
    }
}

packet_struct! {
    /// 07/1F entry, wide variants.
    pub struct MenuEntryPc {
        pub menu_id: u32,
        pub item_id: u32,
        pub flags: u16,
        pub text: FixedWText<0x11>,
    }
}

packet_struct! {
    /// 08 entry, half-width variants.
    pub struct GameMenuEntryDc {
        pub menu_id: u32,
        pub game_id: u32,
        pub difficulty_tag: u8,
        pub num_players: u8,
        pub name: FixedText<0x10>,
        pub episode: u8,
        pub flags: u8,
    }
}

packet_struct! {
    /// 08 entry, wide variants.
    pub struct GameMenuEntryPc {
        pub menu_id: u32,
        pub game_id: u32,
        pub difficulty_tag: u8,
        pub num_players: u8,
        pub name: FixedWText<0x10>,
        pub episode: u8,
        pub flags: u8,
    }
}

packet_struct! {
    /// A2/A4 entry, half-width variants.
    pub struct QuestMenuEntryGc {
        pub menu_id: u32,
        pub item_id: u32,
        pub name: FixedText<0x20>,
        pub short_desc: FixedText<0x70>,
    }
}

packet_struct! {
    /// A2/A4 entry, wide variants.
    pub struct QuestMenuEntryPc {
        pub menu_id: u32,
        pub item_id: u32,
        pub name: FixedWText<0x20>,
        pub short_desc: FixedWText<0x70>,
    }
}

packet_struct! {
    /// 83 entry: one joinable default lobby.
    pub struct LobbyListEntry83 {
        pub menu_id: u32,
        pub item_id: u32,
        pub unused: u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EncodeRecord;

    #[test]
    fn entry_sizes() {
        assert_eq!(MenuEntryDc::SIZE, 0x1C);
        assert_eq!(MenuEntryPc::SIZE, 0x2C);
        assert_eq!(GameMenuEntryDc::SIZE, 0x1C);
        assert_eq!(GameMenuEntryPc::SIZE, 0x2C);
        assert_eq!(QuestMenuEntryGc::SIZE, 0x98);
        assert_eq!(QuestMenuEntryPc::SIZE, 0x128);
        assert_eq!(LobbyListEntry83::SIZE, 0x0C);
    }
}
