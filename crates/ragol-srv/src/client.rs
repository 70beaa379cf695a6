//! Per-connection session state.

use std::sync::Arc;
use std::time::Instant;

use bitflags::bitflags;
use ragol_net::Channel;
use ragol_pkt::cmds::lobby::PlayerInventoryData;
use ragol_pkt::cmds::login::{ClientConfig, ClientConfigBb};
use ragol_pkt::Version;

use crate::collab::License;
use crate::config::ServerBehavior;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

bitflags! {
    /// Client behavior flags. These round-trip through the config cookie,
    /// so the wire width (u16) is part of the format.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ClientFlags: u16 {
        /// First-generation early-console client.
        const DCV1 = 1 << 0;
        /// Client has a save slot on this server.
        const SAVE_ENABLED = 1 << 1;
        /// Client never confirms message-box close with D6.
        const NO_CLOSE_CONFIRMATION = 1 << 2;
        /// Client stops confirming after its first lobby join.
        const NO_CLOSE_CONFIRMATION_AFTER_LOBBY_JOIN = 1 << 3;
        /// Card-battle client.
        const CARD_BATTLE = 1 << 4;
    }
}

/// Connection lifecycle. Handlers check the phase they require and treat a
/// mismatch as a state error (disconnect).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// Accepted, server-init not yet sent.
    Init,
    /// Ciphers installed, awaiting login.
    Keyed,
    /// License verified.
    Authenticated,
    InLobby,
    InGame,
    Terminated,
}

/// The player record a session carries while connected. Persistence of the
/// full save belongs to collaborators; this is what the protocol needs.
#[derive(Debug, Clone, Default)]
pub struct Player {
    pub name: String,
    pub guild_card_desc: String,
    pub info_board: String,
    pub section_id: u8,
    pub char_class: u8,
    pub level: u32,
    pub inventory: PlayerInventoryData,
}

pub struct Client {
    pub id: SessionId,
    pub version: Version,
    pub behavior: ServerBehavior,
    pub channel: Channel,
    pub license: Option<Arc<License>>,
    pub phase: ConnectionPhase,
    pub flags: ClientFlags,
    pub game_state: u8,
    pub player_index: u8,
    pub lobby_id: Option<u32>,
    pub lobby_client_id: u8,
    pub lobby_arrow_color: u8,
    pub player: Player,
    pub last_recv: Instant,
    pub last_send: Instant,
    /// Username whose save is pending a flush, latter-game only.
    pub pending_save: Option<String>,
}

impl Client {
    pub fn new(id: SessionId, version: Version, behavior: ServerBehavior) -> Self {
        let now = Instant::now();
        Self {
            id,
            version,
            behavior,
            channel: Channel::new(version),
            license: None,
            phase: ConnectionPhase::Init,
            flags: ClientFlags::default(),
            game_state: 0,
            player_index: 0,
            lobby_id: None,
            lobby_client_id: 0,
            lobby_arrow_color: 0,
            player: Player::default(),
            last_recv: now,
            last_send: now,
            pending_save: None,
        }
    }

    pub fn serial_number(&self) -> u32 {
        self.license.as_ref().map_or(0, |l| l.serial_number)
    }

    pub fn touch_recv(&mut self) {
        self.last_recv = Instant::now();
    }

    pub fn touch_send(&mut self) {
        self.last_send = Instant::now();
    }

    /// Serializes session state into the cookie round-tripped through the
    /// client. `magic` identifies this server instance.
    pub fn export_config(&self, magic: u64) -> ClientConfig {
        ClientConfig {
            magic,
            game_state: self.game_state,
            player_index: self.player_index,
            flags: self.flags.bits(),
            unused: [0; 5],
        }
    }

    pub fn export_config_bb(&self, magic: u64) -> ClientConfigBb {
        ClientConfigBb {
            base: self.export_config(magic),
            unused_bb: [0; 2],
        }
    }

    /// Restores state from a returned cookie. A cookie from another server
    /// (magic mismatch) must not be trusted: flags reset and the caller
    /// treats the session as fresh. Returns whether the cookie was ours.
    pub fn import_config(&mut self, magic: u64, cfg: &ClientConfig) -> bool {
        if cfg.magic != magic {
            self.flags = ClientFlags::default();
            return false;
        }
        self.game_state = cfg.game_state;
        self.player_index = cfg.player_index;
        self.flags = ClientFlags::from_bits_truncate(cfg.flags);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAGIC: u64 = 0x4652_4545_5241_474F;

    fn client() -> Client {
        Client::new(SessionId(1), Version::Gc, ServerBehavior::Login)
    }

    #[test]
    fn config_round_trip() {
        let mut c = client();
        c.flags = ClientFlags::SAVE_ENABLED | ClientFlags::NO_CLOSE_CONFIRMATION;
        c.game_state = 2;
        let cfg = c.export_config(MAGIC);

        let mut other = client();
        assert!(other.import_config(MAGIC, &cfg));
        assert_eq!(other.flags, c.flags);
        assert_eq!(other.game_state, 2);
    }

    #[test]
    fn foreign_magic_resets_flags() {
        let mut c = client();
        c.flags = ClientFlags::SAVE_ENABLED;
        let mut cfg = c.export_config(MAGIC);
        cfg.magic ^= 1;

        assert!(!c.import_config(MAGIC, &cfg));
        assert!(c.flags.is_empty());
    }
}
