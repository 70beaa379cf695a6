pub mod client;
pub mod collab;
pub mod config;
pub mod handlers;
pub mod lobby;
pub mod proxy;
pub mod reactor;
pub mod send;
pub mod state;

pub use client::{Client, ClientFlags, ConnectionPhase, SessionId};
pub use collab::{ChatCommandHandler, FileContentsCache, License, LicenseStore, QuestRepository};
pub use config::Config;
pub use lobby::{Lobby, LobbyKind};
pub use state::ServerState;
