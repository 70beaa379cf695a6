//! Simple mail (81), sent between players across ships.

use crate::{packet_struct, FixedText, FixedWText};

packet_struct! {
    /// 81, half-width variants.
    pub struct SimpleMail81Dc {
        pub player_tag: u32,
        pub from_guild_card_number: u32,
        pub from_name: FixedText<0x10>,
        pub to_guild_card_number: u32,
        pub text: FixedText<0x200>,
    }
}

packet_struct! {
    /// 81, wide variants.
    pub struct SimpleMail81Pc {
        pub player_tag: u32,
        pub from_guild_card_number: u32,
        pub from_name: FixedWText<0x10>,
        pub to_guild_card_number: u32,
        pub text: FixedWText<0x200>,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EncodeRecord;

    #[test]
    fn layouts() {
        assert_eq!(SimpleMail81Dc::SIZE, 4 + 4 + 0x10 + 4 + 0x200);
        assert_eq!(SimpleMail81Pc::SIZE, 4 + 4 + 0x20 + 4 + 0x400);
    }
}
