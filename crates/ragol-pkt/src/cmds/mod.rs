//! The wire-format catalog: fixed-layout, little-endian record definitions
//! for the command set, parameterized by [`crate::Version`] where the six
//! variants disagree on layout.

pub mod files;
pub mod init;
pub mod lobby;
pub mod login;
pub mod mail;
pub mod menu;
pub mod message;
pub mod reconnect;
pub mod search;
pub mod subcmd;

/// Player tag marking an entry as belonging to a registered account.
pub const PLAYER_TAG: u32 = 0x0001_0000;
/// Player tag sent before an account is known.
pub const PLAYER_TAG_UNREGISTERED: u32 = 0xFFFF_0000;
/// Guild-card placeholder sent before an account is known.
pub const GUILD_CARD_NONE: u32 = 0xFFFF_FFFF;

/// Maximum quest-file chunk carried by a write-file command.
pub const FILE_CHUNK_LEN: usize = 0x400;
/// Chunk size of the system stream-file transfer.
pub const STREAM_CHUNK_LEN: usize = 0x6800;
