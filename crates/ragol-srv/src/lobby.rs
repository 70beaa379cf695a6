//! Lobby and game state: slot membership, leadership, and the game
//! parameters echoed in join frames. Lobbies hold sessions by id only; the
//! session table is the single owner of the sessions themselves.

use bitflags::bitflags;
use ragol_pkt::Version;

use crate::client::SessionId;

pub const LOBBY_MAX_CLIENTS: usize = 12;
pub const GAME_MAX_CLIENTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LobbyKind {
    Lobby,
    Game,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameMode {
    Normal,
    Battle,
    Challenge,
    Solo,
}

impl GameMode {
    pub fn battle_flag(self) -> u8 {
        u8::from(self == GameMode::Battle)
    }

    pub fn challenge_flag(self) -> u8 {
        u8::from(self == GameMode::Challenge)
    }

    pub fn solo_flag(self) -> u8 {
        u8::from(self == GameMode::Solo)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct LobbyFlags: u32 {
        /// Survives its last member leaving.
        const DEFAULT = 1 << 0;
        /// Card-battle rules and layouts.
        const CARD_BATTLE = 1 << 1;
    }
}

pub struct Lobby {
    pub id: u32,
    pub kind: LobbyKind,
    /// Games are per-variant; default lobbies accept every variant.
    pub version: Option<Version>,
    pub flags: LobbyFlags,
    pub name: String,
    pub block: u8,
    pub lobby_type: u8,
    pub episode: u8,
    pub mode: GameMode,
    pub difficulty: u8,
    pub section_id: u8,
    pub event: u8,
    pub password: String,
    pub rare_seed: u32,
    pub variations: [u32; 0x20],
    leader_id: Option<u8>,
    slots: [Option<SessionId>; LOBBY_MAX_CLIENTS],
    /// Opaque handle into the card-battle bracket subsystem.
    pub tournament: Option<u32>,
}

/// What changed when a member left; callers broadcast accordingly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Departure {
    pub client_id: u8,
    pub new_leader: Option<u8>,
    pub leader_changed: bool,
    pub now_empty: bool,
}

impl Lobby {
    pub fn new_lobby(id: u32, name: impl Into<String>) -> Self {
        Self::new(id, LobbyKind::Lobby, name.into())
    }

    pub fn new_game(id: u32, name: impl Into<String>) -> Self {
        Self::new(id, LobbyKind::Game, name.into())
    }

    fn new(id: u32, kind: LobbyKind, name: String) -> Self {
        Self {
            id,
            kind,
            version: None,
            flags: LobbyFlags::default(),
            name,
            block: 1,
            lobby_type: 0,
            episode: 1,
            mode: GameMode::Normal,
            difficulty: 0,
            section_id: 0,
            event: 0,
            password: String::new(),
            rare_seed: 0,
            variations: [0; 0x20],
            leader_id: None,
            slots: [None; LOBBY_MAX_CLIENTS],
            tournament: None,
        }
    }

    pub fn is_game(&self) -> bool {
        self.kind == LobbyKind::Game
    }

    pub fn max_clients(&self) -> usize {
        match self.kind {
            LobbyKind::Lobby => LOBBY_MAX_CLIENTS,
            LobbyKind::Game => GAME_MAX_CLIENTS,
        }
    }

    pub fn leader_id(&self) -> Option<u8> {
        self.leader_id
    }

    pub fn client_at(&self, slot: u8) -> Option<SessionId> {
        self.slots.get(slot as usize).copied().flatten()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    pub fn count_clients(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Occupied slots in slot order.
    pub fn members(&self) -> impl Iterator<Item = (u8, SessionId)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.map(|id| (i as u8, id)))
    }

    /// Members other than `exclude`, in slot order.
    pub fn members_excluding(
        &self,
        exclude: SessionId,
    ) -> impl Iterator<Item = (u8, SessionId)> + '_ {
        self.members().filter(move |&(_, id)| id != exclude)
    }

    /// Seats a session in the lowest free slot. The first member becomes
    /// leader. Returns the assigned slot, or None when full.
    pub fn add_client(&mut self, id: SessionId) -> Option<u8> {
        let max = self.max_clients();
        let slot = self.slots[..max].iter().position(Option::is_none)?;
        self.slots[slot] = Some(id);
        if self.leader_id.is_none() {
            self.leader_id = Some(slot as u8);
        }
        Some(slot as u8)
    }

    /// Removes a session. Leadership moves to the lowest occupied slot when
    /// the leader leaves; an emptied lobby has no leader at all.
    pub fn remove_client(&mut self, id: SessionId) -> Option<Departure> {
        let slot = self.slots.iter().position(|s| *s == Some(id))?;
        self.slots[slot] = None;

        let was_leader = self.leader_id == Some(slot as u8);
        if was_leader {
            let new_leader = self.members().next().map(|(s, _)| s);
            self.leader_id = new_leader;
        }
        Some(Departure {
            client_id: slot as u8,
            new_leader: self.leader_id,
            leader_changed: was_leader,
            now_empty: self.is_empty(),
        })
    }

    /// Leader invariant: a non-empty lobby has a leader and the leader's
    /// slot is occupied.
    #[cfg(test)]
    fn check_leader_invariant(&self) {
        match self.leader_id {
            None => assert!(self.is_empty()),
            Some(slot) => assert!(self.client_at(slot).is_some()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_member_leads() {
        let mut l = Lobby::new_lobby(1, "lobby-1");
        assert_eq!(l.add_client(SessionId(10)), Some(0));
        assert_eq!(l.leader_id(), Some(0));
        l.check_leader_invariant();
    }

    #[test]
    fn leader_handoff_to_lowest_occupied() {
        let mut l = Lobby::new_lobby(1, "lobby-1");
        // Fill slots 0..3, then free slot 0 so members sit at 1, 2, 3.
        for n in 0..4 {
            l.add_client(SessionId(n));
        }
        l.remove_client(SessionId(0));
        let dep = l.remove_client(SessionId(1)).unwrap();
        // Slot 1 led (promoted when slot 0 left); now slot 2 must lead.
        assert!(dep.leader_changed);
        assert_eq!(dep.new_leader, Some(2));
        l.check_leader_invariant();
    }

    #[test]
    fn non_leader_departure_keeps_leader() {
        let mut l = Lobby::new_lobby(1, "lobby-1");
        for n in 0..3 {
            l.add_client(SessionId(n));
        }
        let dep = l.remove_client(SessionId(2)).unwrap();
        assert!(!dep.leader_changed);
        assert_eq!(dep.new_leader, Some(0));
        l.check_leader_invariant();
    }

    #[test]
    fn game_caps_at_four() {
        let mut g = Lobby::new_game(2, "game");
        for n in 0..4 {
            assert!(g.add_client(SessionId(n)).is_some());
        }
        assert!(g.add_client(SessionId(99)).is_none());
    }

    #[test]
    fn empty_lobby_has_no_leader() {
        let mut l = Lobby::new_lobby(1, "lobby-1");
        l.add_client(SessionId(5));
        let dep = l.remove_client(SessionId(5)).unwrap();
        assert!(dep.now_empty);
        assert_eq!(dep.new_leader, None);
        l.check_leader_invariant();
    }
}
