//! Server-wide state: the session table, the lobby table, and the
//! collaborator handles. Everything here is touched from the reactor's
//! single thread only.

use std::collections::HashMap;
use std::sync::Arc;

use ragol_crypto::BbKeyTable;
use ragol_pkt::Version;

use crate::client::{Client, SessionId};
use crate::collab::{ChatCommandHandler, FileContentsCache, LicenseStore, QuestRepository};
use crate::config::Config;
use crate::lobby::{Lobby, LobbyFlags};

pub const LOBBY_MENU_ID: u32 = 0xFFFF_FFF1;
pub const GAME_MENU_ID: u32 = 0xFFFF_FFF2;
pub const QUEST_MENU_ID: u32 = 0xFFFF_FFF3;

pub struct ServerState {
    pub config: Config,
    /// Identity sentinel baked into every config cookie this server issues.
    pub magic: u64,
    pub licenses: Arc<dyn LicenseStore>,
    pub quests: Arc<dyn QuestRepository>,
    pub chat: Arc<dyn ChatCommandHandler>,
    pub file_cache: Arc<FileContentsCache>,
    /// Key table the latter-game cipher derives per-connection keys from.
    pub bb_key_table: Arc<BbKeyTable>,
    clients: HashMap<SessionId, Client>,
    lobbies: HashMap<u32, Lobby>,
    next_session_id: u64,
    next_lobby_id: u32,
}

impl ServerState {
    pub fn new(
        config: Config,
        magic: u64,
        licenses: Arc<dyn LicenseStore>,
        quests: Arc<dyn QuestRepository>,
        chat: Arc<dyn ChatCommandHandler>,
        file_cache: Arc<FileContentsCache>,
        bb_key_table: Arc<BbKeyTable>,
    ) -> Self {
        let mut state = Self {
            config,
            magic,
            licenses,
            quests,
            chat,
            file_cache,
            bb_key_table,
            clients: HashMap::new(),
            lobbies: HashMap::new(),
            next_session_id: 1,
            next_lobby_id: 1,
        };
        // The persistent default lobbies every variant shares.
        for n in 0..15u32 {
            let mut lobby = Lobby::new_lobby(state.alloc_lobby_id(), format!("Lobby {}", n + 1));
            lobby.flags |= LobbyFlags::DEFAULT;
            lobby.lobby_type = n as u8;
            state.lobbies.insert(lobby.id, lobby);
        }
        state
    }

    fn alloc_lobby_id(&mut self) -> u32 {
        let id = self.next_lobby_id;
        self.next_lobby_id += 1;
        id
    }

    pub fn alloc_session_id(&mut self) -> SessionId {
        let id = SessionId(self.next_session_id);
        self.next_session_id += 1;
        id
    }

    pub fn insert_client(&mut self, client: Client) {
        self.clients.insert(client.id, client);
    }

    pub fn client(&self, id: SessionId) -> Option<&Client> {
        self.clients.get(&id)
    }

    pub fn client_mut(&mut self, id: SessionId) -> Option<&mut Client> {
        self.clients.get_mut(&id)
    }

    pub fn remove_client(&mut self, id: SessionId) -> Option<Client> {
        self.clients.remove(&id)
    }

    pub fn lobby(&self, id: u32) -> Option<&Lobby> {
        self.lobbies.get(&id)
    }

    pub fn lobby_mut(&mut self, id: u32) -> Option<&mut Lobby> {
        self.lobbies.get_mut(&id)
    }

    pub fn lobbies(&self) -> impl Iterator<Item = &Lobby> {
        self.lobbies.values()
    }

    pub fn default_lobbies(&self) -> impl Iterator<Item = &Lobby> {
        self.lobbies
            .values()
            .filter(|l| l.flags.contains(LobbyFlags::DEFAULT))
    }

    /// The default lobby a freshly authenticated client lands in.
    pub fn first_default_lobby_id(&self) -> Option<u32> {
        self.default_lobbies().map(|l| l.id).min()
    }

    pub fn create_game(&mut self, name: impl Into<String>, version: Version) -> u32 {
        let mut game = Lobby::new_game(self.alloc_lobby_id(), name);
        game.version = Some(version);
        let id = game.id;
        self.lobbies.insert(id, game);
        id
    }

    /// Drops a lobby if it is empty and not persistent.
    pub fn reap_lobby(&mut self, id: u32) {
        if let Some(l) = self.lobbies.get(&id) {
            if l.is_empty() && !l.flags.contains(LobbyFlags::DEFAULT) {
                self.lobbies.remove(&id);
            }
        }
    }

    pub fn games_for(&self, version: Version) -> impl Iterator<Item = &Lobby> + '_ {
        self.lobbies
            .values()
            .filter(move |l| l.is_game() && l.version == Some(version))
    }
}
