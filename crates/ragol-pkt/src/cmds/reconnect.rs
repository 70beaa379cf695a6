//! Reconnect commands (19 in-game, 14 on the patcher): the server tells the
//! client to drop this connection and open a new one elsewhere.

use crate::packet_struct;

packet_struct! {
    /// 19/14: plain redirect. The address is a raw network-order IPv4.
    pub struct Reconnect19 {
        pub address: [u8; 4],
        pub port: u16,
        pub unused: u16,
    }
}

packet_struct! {
    /// The split form of 19 sent when pc-family and later-console clients
    /// share a listen port: the pc fields are read by one family, and the
    /// embedded second command (with its own header bytes) by the other.
    pub struct ReconnectSplit19 {
        pub pc_address: [u8; 4],
        pub pc_port: u16,
        pub unused1: u16,
        pub gc_command: u8,
        pub gc_flag: u8,
        pub gc_size: u16,
        pub gc_address: [u8; 4],
        pub gc_port: u16,
        pub unused2: u16,
    }
}

/// Largest payload a 19 may carry (the split form plus slack some servers
/// append); anything longer is malformed.
pub const RECONNECT_MAX: usize = 0xB0;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DecodeRecord, EncodeRecord};

    #[test]
    fn layouts() {
        assert_eq!(Reconnect19::SIZE, 8);
        assert_eq!(ReconnectSplit19::SIZE, 20);
    }

    #[test]
    fn round_trip() {
        let cmd = Reconnect19 {
            address: [192, 168, 0, 9],
            port: 5100,
            unused: 0,
        };
        let decoded = Reconnect19::from_slice(&cmd.to_bytes()).unwrap();
        assert_eq!(decoded, cmd);
    }
}
