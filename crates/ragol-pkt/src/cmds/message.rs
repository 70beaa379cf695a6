//! Text-bearing commands. The text itself is variable-length and
//! variant-width, so only the fixed header is a catalog record; emitters
//! append the encoded text behind it.

use crate::packet_struct;

packet_struct! {
    /// Header of 01/06/11/B0 (and EE): an unused word plus the guild-card
    /// number of the sender (zero for server messages).
    pub struct TextHeader {
        pub unused: u32,
        pub guild_card_number: u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EncodeRecord;

    #[test]
    fn layout() {
        assert_eq!(TextHeader::SIZE, 8);
    }
}
