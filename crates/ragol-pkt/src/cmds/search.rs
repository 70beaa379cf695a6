//! Guild-card search (40/41) and choice search (C4).

use crate::{packet_struct, FixedText, FixedWText};

packet_struct! {
    /// 40: client asks where another player is.
    pub struct GuildCardSearch40 {
        pub player_tag: u32,
        pub searcher_guild_card_number: u32,
        pub target_guild_card_number: u32,
    }
}

packet_struct! {
    /// Fixed prefix shared by every 41 layout; the proxy only needs these
    /// fields to rewrite identity, whatever the variant.
    pub struct SearchResult41Head {
        pub player_tag: u32,
        pub searcher_guild_card_number: u32,
        pub result_guild_card_number: u32,
    }
}

packet_struct! {
    /// C4 result entry, half-width variants.
    pub struct ChoiceSearchEntryV3C4 {
        pub guild_card_number: u32,
        pub name: FixedText<0x10>,
        pub info: FixedText<0x20>,
        pub location: FixedText<0x44>,
        pub menu_id: u32,
        pub lobby_id: u32,
    }
}

packet_struct! {
    /// C4 result entry, wide variants.
    pub struct ChoiceSearchEntryPcC4 {
        pub guild_card_number: u32,
        pub name: FixedWText<0x10>,
        pub info: FixedWText<0x20>,
        pub location: FixedWText<0x44>,
        pub menu_id: u32,
        pub lobby_id: u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EncodeRecord;

    #[test]
    fn entry_sizes_differ_by_text_width() {
        assert_eq!(ChoiceSearchEntryV3C4::SIZE, 0x80);
        assert_eq!(
            ChoiceSearchEntryPcC4::SIZE,
            ChoiceSearchEntryV3C4::SIZE + 0x74
        );
    }
}
