//! Command emitters. These are written so callers never think about the
//! client's variant: each function picks the right layout, builds the
//! payload, and hands it to the channel. Functions that address a whole
//! lobby go through the server state to reach every member's channel.

use anyhow::{bail, Context, Result};
use rand::Rng;
use ragol_crypto::{BbCipher, BbSeed, V2Cipher, V3Cipher};
use ragol_pkt::cmds::files::{OpenFile44A6, StreamFileChunk02EB, StreamFileIndexEntry01EB, WriteFile13A7};
use ragol_pkt::cmds::init::{
    ServerInitBb, ServerInitPatch, ServerInitV2, ANTI_COPYRIGHT, BB_GAME_SERVER_COPYRIGHT,
    DC_LOBBY_SERVER_COPYRIGHT, DC_PORT_MAP_COPYRIGHT, PATCH_SERVER_COPYRIGHT,
};
use ragol_pkt::cmds::lobby::{
    ArrowUpdateEntry88, JoinGameTail, JoinLobbyHead, LeaveLobby6669, LobbyDataBb, LobbyDataDc,
    LobbyDataPc, LobbyDataXb, PlayerDispDc, PlayerDispPc, PlayerStats,
};
use ragol_pkt::cmds::login::UpdateClientConfig04;
use ragol_pkt::cmds::menu::{
    GameMenuEntryDc, GameMenuEntryPc, LobbyListEntry83, MenuEntryDc, MenuEntryPc,
    QuestMenuEntryGc, QuestMenuEntryPc,
};
use ragol_pkt::cmds::message::TextHeader;
use ragol_pkt::cmds::reconnect::{Reconnect19, ReconnectSplit19};
use ragol_pkt::cmds::subcmd::{
    build_stats_change, StatsChange, SubcommandHeader, RESUME_GAME_WORD, SUB_GUILD_CARD,
};
use ragol_pkt::cmds::{FILE_CHUNK_LEN, PLAYER_TAG, STREAM_CHUNK_LEN};
use ragol_pkt::text::{add_color_code, remove_language_marker};
use ragol_pkt::{
    DecodeRecord, EncodeRecord, FixedText, FixedWText, PacketWriter, Version,
};

use crate::client::{Client, SessionId};
use crate::collab::QuestInfo;
use crate::lobby::LobbyFlags;
use crate::state::{ServerState, GAME_MENU_ID, LOBBY_MENU_ID};

/// Sends one command on a client's channel, stamping its activity clock.
pub fn send_command(c: &mut Client, command: u16, flag: u32, payload: &[u8]) -> Result<()> {
    c.channel
        .send(command, flag, payload)
        .with_context(|| format!("send {command:02X} to session {}", c.id))?;
    c.touch_send();
    Ok(())
}

/// Fan-out to every lobby member except `exclude`.
pub fn send_to_lobby(
    state: &mut ServerState,
    lobby_id: u32,
    exclude: Option<SessionId>,
    command: u16,
    flag: u32,
    payload: &[u8],
) -> Result<()> {
    let members: Vec<SessionId> = match state.lobby(lobby_id) {
        Some(l) => l.members().map(|(_, id)| id).collect(),
        None => return Ok(()),
    };
    for id in members {
        if Some(id) == exclude {
            continue;
        }
        if let Some(client) = state.client_mut(id) {
            send_command(client, command, flag, payload)?;
        }
    }
    Ok(())
}

/// Encodes text in the client's width, NUL-terminated, padded to words.
pub fn encode_text(version: Version, text: &str) -> Vec<u8> {
    let mut pw = PacketWriter::new();
    if version.uses_wide_text() {
        for unit in text.encode_utf16() {
            pw.write_u16(unit);
        }
        pw.write_u16(0);
    } else {
        pw.write_slice(text.as_bytes());
        pw.write_u8(0);
    }
    pw.pad_to(4);
    pw.into_bytes().to_vec()
}

// ---------------------------------------------------------------------------
// server init

/// Sends the unencrypted server-init frame and installs the ciphers it
/// announced. After this returns, everything on the channel is encrypted.
pub fn send_server_init(
    bb_key_table: &std::sync::Arc<ragol_crypto::BbKeyTable>,
    c: &mut Client,
    initial_connection: bool,
) -> Result<()> {
    match c.version {
        Version::Dc | Version::Pc | Version::Gc | Version::Xb => {
            let mut rng = rand::thread_rng();
            let server_key: u32 = rng.gen();
            let client_key: u32 = rng.gen();

            // The pc-family uses 17 for every init; consoles use it only for
            // the first connection and 02 afterwards.
            let command = if initial_connection || c.version == Version::Pc {
                0x17
            } else {
                0x02
            };
            let cmd = ServerInitV2 {
                copyright: FixedText::from_str(if initial_connection {
                    DC_PORT_MAP_COPYRIGHT
                } else {
                    DC_LOBBY_SERVER_COPYRIGHT
                })?,
                server_key,
                client_key,
                after_message: FixedText::from_str(ANTI_COPYRIGHT)?,
            };
            send_command(c, command, 0x00, &cmd.to_bytes())?;

            if c.version.uses_v3_cipher() {
                c.channel.reset_ciphers(
                    Some(Box::new(V3Cipher::new(client_key))),
                    Some(Box::new(V3Cipher::new(server_key))),
                );
            } else {
                c.channel.reset_ciphers(
                    Some(Box::new(V2Cipher::new(client_key))),
                    Some(Box::new(V2Cipher::new(server_key))),
                );
            }
        }
        Version::Patch => {
            let mut rng = rand::thread_rng();
            let server_key: u32 = rng.gen();
            let client_key: u32 = rng.gen();
            let cmd = ServerInitPatch {
                copyright: FixedText::from_str(PATCH_SERVER_COPYRIGHT)?,
                server_key,
                client_key,
            };
            send_command(c, 0x02, 0x00, &cmd.to_bytes())?;
            c.channel.reset_ciphers(
                Some(Box::new(V2Cipher::new(client_key))),
                Some(Box::new(V2Cipher::new(server_key))),
            );
        }
        Version::Bb => {
            let mut rng = rand::thread_rng();
            let mut server_key: BbSeed = [0; 48];
            let mut client_key: BbSeed = [0; 48];
            rng.fill(&mut server_key[..]);
            rng.fill(&mut client_key[..]);

            let cmd = ServerInitBb {
                copyright: FixedText::from_str(BB_GAME_SERVER_COPYRIGHT)?,
                server_key,
                client_key,
                after_message: FixedText::from_str(ANTI_COPYRIGHT)?,
            };
            send_command(c, 0x03, 0x00, &cmd.to_bytes())?;

            let table = bb_key_table.clone();
            c.channel.reset_ciphers(
                Some(Box::new(BbCipher::new(table.clone(), &client_key))),
                Some(Box::new(BbCipher::new(table, &server_key))),
            );
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// config & redirects

pub fn send_update_client_config(magic: u64, c: &mut Client) -> Result<()> {
    let cmd = UpdateClientConfig04 {
        player_tag: PLAYER_TAG,
        guild_card_number: c.serial_number(),
        cfg: c.export_config(magic),
    };
    send_command(c, 0x04, 0x00, &cmd.to_bytes())
}

pub fn send_reconnect(c: &mut Client, address: [u8; 4], port: u16) -> Result<()> {
    let cmd = Reconnect19 {
        address,
        port,
        unused: 0,
    };
    let command = if c.version == Version::Patch { 0x14 } else { 0x19 };
    send_command(c, command, 0x00, &cmd.to_bytes())
}

/// The split reconnect that separates pc-family and console clients arriving
/// on a shared port: each family parses a different region of the payload.
pub fn send_pc_console_split_reconnect(
    c: &mut Client,
    address: [u8; 4],
    pc_port: u16,
    console_port: u16,
) -> Result<()> {
    let cmd = ReconnectSplit19 {
        pc_address: address,
        pc_port,
        unused1: 0,
        gc_command: 0x19,
        gc_flag: 0x00,
        gc_size: 0x97,
        gc_address: address,
        gc_port: console_port,
        unused2: 0,
    };
    send_command(c, 0x19, 0x00, &cmd.to_bytes())
}

// ---------------------------------------------------------------------------
// text

fn send_header_text(c: &mut Client, command: u16, guild_card_number: u32, text: &str) -> Result<()> {
    let mut pw = PacketWriter::new();
    TextHeader {
        unused: 0,
        guild_card_number,
    }
    .encode(&mut pw)?;
    pw.write_slice(&encode_text(c.version, text));
    send_command(c, command, 0x00, pw.as_slice())
}

pub fn send_message_box(c: &mut Client, text: &str) -> Result<()> {
    let command = if c.version == Version::Patch { 0x13 } else { 0x1A };
    let body = encode_text(c.version, text);
    send_command(c, command, 0x00, &body)
}

pub fn send_lobby_message_box(c: &mut Client, text: &str) -> Result<()> {
    send_header_text(c, 0x01, 0, text)
}

pub fn send_ship_info(c: &mut Client, text: &str) -> Result<()> {
    send_header_text(c, 0x11, 0, text)
}

pub fn send_text_message(c: &mut Client, text: &str) -> Result<()> {
    send_header_text(c, 0xB0, 0, text)
}

/// Chat line relayed into a lobby; the header carries the sender.
pub fn send_chat_message(
    c: &mut Client,
    from_serial_number: u32,
    from_name: &str,
    text: &str,
) -> Result<()> {
    let mut line = String::new();
    line.push_str(remove_language_marker(from_name));
    line.push_str("\t\tJ");
    line.push_str(text);
    send_header_text(c, 0x06, from_serial_number, &line)
}

pub fn send_text_message_to_lobby(
    state: &mut ServerState,
    lobby_id: u32,
    text: &str,
) -> Result<()> {
    let members: Vec<SessionId> = match state.lobby(lobby_id) {
        Some(l) => l.members().map(|(_, id)| id).collect(),
        None => return Ok(()),
    };
    for id in members {
        if let Some(c) = state.client_mut(id) {
            send_text_message(c, text)?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// menus

pub struct MenuItem {
    pub item_id: u32,
    pub text: String,
}

pub fn send_menu(
    c: &mut Client,
    menu_id: u32,
    name: &str,
    items: &[MenuItem],
    is_info_menu: bool,
) -> Result<()> {
    let mut pw = PacketWriter::new();
    let wide = c.version.uses_wide_text();
    let mut write_entry = |pw: &mut PacketWriter, item_id: u32, flags: u16, text: &str| -> Result<()> {
        if wide {
            MenuEntryPc {
                menu_id,
                item_id,
                flags,
                text: FixedWText::from_str(text)?,
            }
            .encode(pw)?;
        } else {
            MenuEntryDc {
                menu_id,
                item_id,
                flags,
                text: FixedText::from_str(text)?,
            }
            .encode(pw)?;
        }
        Ok(())
    };

    write_entry(&mut pw, 0xFFFF_FFFF, 0x0004, name)?;
    for item in items {
        write_entry(&mut pw, item.item_id, 0x0F04, &item.text)?;
    }
    let command = if is_info_menu { 0x1F } else { 0x07 };
    send_command(c, command, items.len() as u32, pw.as_slice())
}

pub fn send_game_menu(state: &mut ServerState, id: SessionId) -> Result<()> {
    let (version, name) = match state.client(id) {
        Some(c) => (c.version, state.config.server_name.clone()),
        None => return Ok(()),
    };

    struct Entry {
        game_id: u32,
        difficulty_tag: u8,
        num_players: u8,
        episode: u8,
        flags: u8,
        name: String,
    }
    let mut entries = vec![Entry {
        game_id: 0,
        difficulty_tag: 0,
        num_players: 0,
        episode: 0,
        flags: 0x04,
        name,
    }];
    for l in state.games_for(version) {
        entries.push(Entry {
            game_id: l.id,
            difficulty_tag: l.difficulty + 0x22,
            num_players: l.count_clients() as u8,
            episode: l.episode,
            flags: (l.episode << 6)
                | ((l.mode.battle_flag() | (l.mode.challenge_flag() << 1)) << 4)
                | u8::from(!l.password.is_empty()) * 2
                | (l.mode.solo_flag() << 2),
            name: l.name.clone(),
        });
    }

    let mut pw = PacketWriter::new();
    let flag = entries.len() as u32 - 1;
    for e in &entries {
        if version.uses_wide_text() {
            GameMenuEntryPc {
                menu_id: GAME_MENU_ID,
                game_id: e.game_id,
                difficulty_tag: e.difficulty_tag,
                num_players: e.num_players,
                name: FixedWText::from_str(&e.name)?,
                episode: e.episode,
                flags: e.flags,
            }
            .encode(&mut pw)?;
        } else {
            GameMenuEntryDc {
                menu_id: GAME_MENU_ID,
                game_id: e.game_id,
                difficulty_tag: e.difficulty_tag,
                num_players: e.num_players,
                name: FixedText::from_str(&e.name)?,
                episode: e.episode,
                flags: e.flags,
            }
            .encode(&mut pw)?;
        }
    }
    let payload = pw.into_bytes();
    let client = state.client_mut(id).context("client vanished")?;
    send_command(client, 0x08, flag, &payload)
}

pub fn send_quest_menu(
    c: &mut Client,
    menu_id: u32,
    quests: &[QuestInfo],
    is_download: bool,
) -> Result<()> {
    let mut pw = PacketWriter::new();
    for q in quests {
        let desc = add_color_code(&q.short_description);
        if c.version.uses_wide_text() {
            QuestMenuEntryPc {
                menu_id,
                item_id: q.quest_id,
                name: FixedWText::from_str(&q.name)?,
                short_desc: FixedWText::from_str(&desc)?,
            }
            .encode(&mut pw)?;
        } else {
            QuestMenuEntryGc {
                menu_id,
                item_id: q.quest_id,
                name: FixedText::from_str(&q.name)?,
                short_desc: FixedText::from_str(&desc)?,
            }
            .encode(&mut pw)?;
        }
    }
    let command = if is_download { 0xA4 } else { 0xA2 };
    send_command(c, command, quests.len() as u32, pw.as_slice())
}

pub fn send_lobby_list(state: &mut ServerState, id: SessionId) -> Result<()> {
    let mut pw = PacketWriter::new();
    let mut count = 0u32;
    for l in state.default_lobbies() {
        LobbyListEntry83 {
            menu_id: LOBBY_MENU_ID,
            item_id: l.id,
            unused: 0,
        }
        .encode(&mut pw)?;
        count += 1;
    }
    let payload = pw.into_bytes();
    let client = state.client_mut(id).context("client vanished")?;
    send_command(client, 0x83, count, &payload)
}

// ---------------------------------------------------------------------------
// lobby / game joining

/// Everything a join frame needs to know about one occupant.
#[derive(Clone)]
pub struct MemberSnapshot {
    pub client_id: u8,
    pub serial_number: u32,
    pub name: String,
    pub section_id: u8,
    pub char_class: u8,
    pub level: u32,
    pub inventory: ragol_pkt::cmds::lobby::PlayerInventoryData,
}

fn snapshot(state: &ServerState, slot: u8, id: SessionId) -> Option<MemberSnapshot> {
    let c = state.client(id)?;
    Some(MemberSnapshot {
        client_id: slot,
        serial_number: c.serial_number(),
        name: c.player.name.clone(),
        section_id: c.player.section_id,
        char_class: c.player.char_class,
        level: c.player.level,
        inventory: c.player.inventory.clone(),
    })
}

/// A loopback address is deliberately placed in every entry: one variant's
/// client disables its lobby start button when a member's address is zero.
const ENTRY_FAKE_ADDRESS: u32 = 0x7F00_0001;

fn write_lobby_data(pw: &mut PacketWriter, version: Version, m: &MemberSnapshot) -> Result<()> {
    match version {
        Version::Dc | Version::Gc => LobbyDataDc {
            player_tag: PLAYER_TAG,
            guild_card: m.serial_number,
            ip_address: ENTRY_FAKE_ADDRESS,
            client_id: u32::from(m.client_id),
            name: FixedText::from_str(&m.name)?,
        }
        .encode(pw)?,
        Version::Pc | Version::Patch => LobbyDataPc {
            player_tag: PLAYER_TAG,
            guild_card: m.serial_number,
            ip_address: ENTRY_FAKE_ADDRESS,
            client_id: u32::from(m.client_id),
            name: FixedWText::from_str(&m.name)?,
        }
        .encode(pw)?,
        Version::Xb => LobbyDataXb {
            base: LobbyDataDc {
                player_tag: PLAYER_TAG,
                guild_card: m.serial_number,
                ip_address: ENTRY_FAKE_ADDRESS,
                client_id: u32::from(m.client_id),
                name: FixedText::from_str(&m.name)?,
            },
            netloc: [0; 0x18],
        }
        .encode(pw)?,
        Version::Bb => LobbyDataBb {
            player_tag: PLAYER_TAG,
            guild_card: m.serial_number,
            team_id: 0,
            ip_address: ENTRY_FAKE_ADDRESS,
            client_id: u32::from(m.client_id),
            name: FixedWText::from_str(&m.name)?,
            unused: 0,
        }
        .encode(pw)?,
    }
    Ok(())
}

fn write_disp(pw: &mut PacketWriter, version: Version, m: &MemberSnapshot) -> Result<()> {
    let stats = PlayerStats {
        atp: 0,
        mst: 0,
        evp: 0,
        hp: 0,
        dfp: 0,
        ata: 0,
        lck: 0,
    };
    if version.uses_wide_text() {
        PlayerDispPc {
            stats,
            unused: 0,
            level: m.level,
            experience: 0,
            meseta: 0,
            name: FixedWText::from_str(&m.name)?,
            appearance: [0; 0x30],
            section_id: m.section_id,
            char_class: m.char_class,
            unused2: 0,
        }
        .encode(pw)?;
    } else {
        PlayerDispDc {
            stats,
            unused: 0,
            level: m.level,
            experience: 0,
            meseta: 0,
            name: FixedText::from_str(&m.name)?,
            appearance: [0; 0x30],
            section_id: m.section_id,
            char_class: m.char_class,
            unused2: 0,
        }
        .encode(pw)?;
    }
    Ok(())
}

/// Primary game join (64): all occupied slots, game parameters, and, for
/// card-battle games only, the inventory and display blocks.
pub fn send_join_game(state: &mut ServerState, id: SessionId, lobby_id: u32) -> Result<()> {
    let lobby = state.lobby(lobby_id).context("no such game")?;
    if !lobby.is_game() {
        bail!("lobby {lobby_id} is not a game");
    }
    let leader_id = lobby.leader_id().unwrap_or(0);
    let variations = lobby.variations;
    let (difficulty, mode, event, section_id, rare_seed, episode) = (
        lobby.difficulty,
        lobby.mode,
        lobby.event,
        lobby.section_id,
        lobby.rare_seed,
        lobby.episode,
    );
    let card_battle = lobby.flags.contains(LobbyFlags::CARD_BATTLE);
    let members: Vec<MemberSnapshot> = lobby
        .members()
        .collect::<Vec<_>>()
        .into_iter()
        .filter_map(|(slot, sid)| snapshot(state, slot, sid))
        .collect();

    let recipient = state.client(id).context("client vanished")?;
    let version = recipient.version;
    let recipient_slot = recipient.lobby_client_id;

    let mut pw = PacketWriter::new();
    for word in variations {
        pw.write_u32(word);
    }
    // Always four slots; absent ones are zeroed.
    for slot in 0..4u8 {
        match members.iter().find(|m| m.client_id == slot) {
            Some(m) => write_lobby_data(&mut pw, version, m)?,
            None => {
                let len = ragol_pkt::cmds::lobby::lobby_data_len(version);
                pw.write_slice(&vec![0u8; len]);
            }
        }
    }
    JoinGameTail {
        client_id: recipient_slot,
        leader_id,
        disable_udp: 0x01,
        difficulty,
        battle_mode: mode.battle_flag(),
        event,
        section_id,
        challenge_mode: mode.challenge_flag(),
        rare_seed,
        episode,
        unused2: 0x01,
        solo_mode: mode.solo_flag(),
        unused3: 0,
    }
    .encode(&mut pw)?;

    if card_battle {
        for slot in 0..4u8 {
            if let Some(m) = members.iter().find(|m| m.client_id == slot) {
                m.inventory.encode(&mut pw)?;
                write_disp(&mut pw, version, m)?;
            }
        }
    }

    let flag = members.len() as u32;
    let payload = pw.into_bytes();
    let client = state.client_mut(id).context("client vanished")?;
    send_command(client, 0x64, flag, &payload)
}

/// Lobby join frames: 67 carries the full roster to the joiner, 68 tells
/// everyone else about one new arrival, 65 is the game-side equivalent of
/// 68. The flag carries the entry count.
pub fn send_join_lobby(state: &mut ServerState, id: SessionId, lobby_id: u32) -> Result<()> {
    send_join_lobby_inner(state, id, lobby_id, None)
}

pub fn send_player_join_notification(
    state: &mut ServerState,
    recipient: SessionId,
    lobby_id: u32,
    joiner: SessionId,
) -> Result<()> {
    send_join_lobby_inner(state, recipient, lobby_id, Some(joiner))
}

fn send_join_lobby_inner(
    state: &mut ServerState,
    id: SessionId,
    lobby_id: u32,
    only: Option<SessionId>,
) -> Result<()> {
    let lobby = state.lobby(lobby_id).context("no such lobby")?;
    let command: u16 = if lobby.is_game() {
        if only.is_none() {
            bail!("primary game join must use the game join frame");
        }
        0x65
    } else if only.is_some() {
        0x68
    } else {
        0x67
    };

    let leader_id = lobby.leader_id().unwrap_or(0);
    let lobby_number = lobby.lobby_type;
    let block = lobby.block;
    let event = lobby.event;
    let member_ids: Vec<(u8, SessionId)> = match only {
        Some(j) => lobby.members().filter(|&(_, sid)| sid == j).collect(),
        None => lobby.members().collect(),
    };
    let members: Vec<MemberSnapshot> = member_ids
        .into_iter()
        .filter_map(|(slot, sid)| snapshot(state, slot, sid))
        .collect();

    let recipient = state.client(id).context("client vanished")?;
    let version = recipient.version;
    let recipient_slot = recipient.lobby_client_id;

    let mut pw = PacketWriter::new();
    JoinLobbyHead {
        client_id: recipient_slot,
        leader_id,
        disable_udp: 0x01,
        lobby_number,
        block_number: u16::from(block),
        event: u16::from(event),
        unused: 0,
    }
    .encode(&mut pw)?;
    for m in &members {
        write_lobby_data(&mut pw, version, m)?;
        m.inventory.encode(&mut pw)?;
        write_disp(&mut pw, version, m)?;
    }

    let flag = members.len() as u32;
    let payload = pw.into_bytes();
    let client = state.client_mut(id).context("client vanished")?;
    send_command(client, command, flag, &payload)
}

pub fn send_player_leave_notification(
    state: &mut ServerState,
    lobby_id: u32,
    leaving_client_id: u8,
) -> Result<()> {
    let (is_game, leader_id) = match state.lobby(lobby_id) {
        Some(l) => (l.is_game(), l.leader_id().unwrap_or(0)),
        None => return Ok(()),
    };
    let cmd = LeaveLobby6669 {
        client_id: leaving_client_id,
        leader_id,
        unused: 0,
    };
    let command = if is_game { 0x66 } else { 0x69 };
    send_to_lobby(
        state,
        lobby_id,
        None,
        command,
        u32::from(leaving_client_id),
        &cmd.to_bytes(),
    )
}

pub fn send_arrow_update(state: &mut ServerState, lobby_id: u32) -> Result<()> {
    let members: Vec<(u8, SessionId)> = match state.lobby(lobby_id) {
        Some(l) => l.members().collect(),
        None => return Ok(()),
    };
    let mut pw = PacketWriter::new();
    let mut count = 0u32;
    for (_, sid) in &members {
        if let Some(c) = state.client(*sid) {
            ArrowUpdateEntry88 {
                player_tag: PLAYER_TAG,
                guild_card_number: c.serial_number(),
                arrow_color: u32::from(c.lobby_arrow_color),
            }
            .encode(&mut pw)?;
            count += 1;
        }
    }
    let payload = pw.into_bytes();
    send_to_lobby(state, lobby_id, None, 0x88, count, &payload)
}

// ---------------------------------------------------------------------------
// guild cards & sub-commands

/// Emits the sender's guild card to `c` inside a targeted envelope.
pub fn send_guild_card(c: &mut Client, source: &MemberSnapshot, description: &str) -> Result<()> {
    use ragol_pkt::cmds::subcmd::{GuildCardBb6x06, GuildCardV36x06};

    let payload = if c.version == Version::Bb {
        let cmd = GuildCardBb6x06 {
            header: SubcommandHeader {
                subcommand: SUB_GUILD_CARD,
                size_words: (GuildCardBb6x06::SIZE / 4) as u8,
                params: 0,
            },
            guild_card_number: source.serial_number,
            name: FixedWText::from_str(remove_language_marker(&source.name))?,
            team_name: FixedWText::default(),
            description: FixedWText::from_str(description)?,
            reserved1: 1,
            reserved2: 1,
            section_id: source.section_id,
            char_class: source.char_class,
        };
        cmd.to_bytes()
    } else {
        let cmd = GuildCardV36x06 {
            header: SubcommandHeader {
                subcommand: SUB_GUILD_CARD,
                size_words: (GuildCardV36x06::SIZE / 4) as u8,
                params: 0,
            },
            player_tag: PLAYER_TAG,
            guild_card_number: source.serial_number,
            name: FixedText::from_str(remove_language_marker(&source.name))?,
            description: FixedText::from_str(description)?,
            reserved1: 1,
            reserved2: 1,
            section_id: source.section_id,
            char_class: source.char_class,
        };
        cmd.to_bytes()
    };
    send_command(c, 0x62, u32::from(c.lobby_client_id), &payload)
}

/// Tells everyone except the ready client that loading is over.
pub fn send_resume_game(state: &mut ServerState, lobby_id: u32, ready: SessionId) -> Result<()> {
    let mut pw = PacketWriter::new();
    pw.write_u32(RESUME_GAME_WORD);
    let payload = pw.into_bytes();
    send_to_lobby(state, lobby_id, Some(ready), 0x60, 0x00, &payload)
}

pub fn send_player_stats_change(
    state: &mut ServerState,
    lobby_id: u32,
    target_client_id: u8,
    stat: StatsChange,
    amount: u32,
) -> Result<()> {
    if amount > 2550 {
        bail!("stats change amount {amount} out of range");
    }
    let chain = build_stats_change(target_client_id, stat, amount);
    send_to_lobby(state, lobby_id, None, 0x60, 0x00, &chain)
}

/// Warps one player to an area, via a targeted envelope at their own slot.
pub fn send_warp(c: &mut Client, area: u32) -> Result<()> {
    let mut pw = PacketWriter::new();
    pw.write_u8(0x94);
    pw.write_u8(0x02);
    pw.write_u8(c.lobby_client_id);
    pw.write_u8(0x00);
    pw.write_u32(area);
    let flag = u32::from(c.lobby_client_id);
    let payload = pw.into_bytes();
    send_command(c, 0x62, flag, &payload)
}

pub fn send_set_player_visibility(
    state: &mut ServerState,
    lobby_id: u32,
    target_client_id: u8,
    visible: bool,
) -> Result<()> {
    let sub = [
        if visible { 0x23 } else { 0x22 },
        0x01,
        target_client_id,
        0x00,
    ];
    send_to_lobby(state, lobby_id, None, 0x60, 0x00, &sub)
}

pub fn send_revive_player(
    state: &mut ServerState,
    lobby_id: u32,
    target_client_id: u8,
) -> Result<()> {
    let sub = [0x31, 0x01, target_client_id, 0x00];
    send_to_lobby(state, lobby_id, None, 0x60, 0x00, &sub)
}

// ---------------------------------------------------------------------------
// file delivery

/// Declares and streams one quest file in 1 KiB chunks. Per-chunk client
/// acks are ignored; delivery is best-effort within the session.
pub fn send_quest_file(
    c: &mut Client,
    basename: &str,
    contents: &[u8],
    is_download: bool,
) -> Result<()> {
    let open = OpenFile44A6 {
        name: FixedText::from_str(basename)?,
        unused: 0,
        flags: 2,
        file_size: contents.len() as u32,
        filename: FixedText::from_str(basename)?,
    };
    let open_command = if is_download { 0xA6 } else { 0x44 };
    send_command(c, open_command, 0x00, &open.to_bytes())?;

    let chunk_command = if is_download { 0xA7 } else { 0x13 };
    for (index, chunk) in contents.chunks(FILE_CHUNK_LEN).enumerate() {
        let mut data = [0u8; FILE_CHUNK_LEN];
        data[..chunk.len()].copy_from_slice(chunk);
        let cmd = WriteFile13A7 {
            filename: FixedText::from_str(basename)?,
            data,
            data_size: chunk.len() as u32,
        };
        send_command(c, chunk_command, index as u32, &cmd.to_bytes())?;
    }
    Ok(())
}

/// Latter-game system stream-file: sends the precomputed index (flag =
/// entry count), then the concatenated file bodies in 0x6800-byte chunks
/// with a monotonically increasing chunk index.
pub fn send_stream_file(cache: &crate::collab::FileContentsCache, c: &mut Client) -> Result<()> {
    let index_data = cache
        .get("system/bb/streamfile.ind")
        .context("stream file index missing")?;
    if index_data.len() % StreamFileIndexEntry01EB::SIZE != 0 {
        bail!("stream file index is not a whole number of entries");
    }
    let entry_count = index_data.len() / StreamFileIndexEntry01EB::SIZE;
    send_command(c, 0x01EB, entry_count as u32, &index_data)?;

    let mut chunk = StreamFileChunk02EB {
        chunk_index: 0,
        data: [0; STREAM_CHUNK_LEN],
    };
    let mut offset = 0usize;
    for n in 0..entry_count {
        let entry = StreamFileIndexEntry01EB::from_slice(
            &index_data[n * StreamFileIndexEntry01EB::SIZE..],
        )?;
        let path = format!("system/bb/{}", entry.filename.to_string_lossy());
        let body = cache.get(&path).with_context(|| path.clone())?;
        if body.len() != entry.size as usize {
            bail!("{path} does not match its stream index size");
        }

        let mut remaining = &body[..];
        while !remaining.is_empty() {
            let take = remaining.len().min(STREAM_CHUNK_LEN - offset);
            chunk.data[offset..offset + take].copy_from_slice(&remaining[..take]);
            offset += take;
            remaining = &remaining[take..];

            if offset == STREAM_CHUNK_LEN {
                send_command(c, 0x02EB, 0x00, &chunk.to_bytes())?;
                chunk.chunk_index += 1;
                offset = 0;
            }
        }
    }
    if offset > 0 {
        // Trailing short chunk: index word plus the used bytes, padded to
        // word alignment by the framing layer.
        let mut pw = PacketWriter::new();
        pw.write_u32(chunk.chunk_index);
        pw.write_slice(&chunk.data[..offset]);
        pw.pad_to(4);
        send_command(c, 0x02EB, 0x00, pw.as_slice())?;
    }
    Ok(())
}

pub fn send_server_time(c: &mut Client) -> Result<()> {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    // The client only cares about the shape of this string.
    let days = now.as_secs() / 86_400;
    let secs = now.as_secs() % 86_400;
    let time_str = format!(
        "{}: {:02}:{:02}:{:02}.000",
        1970 + days / 365,
        secs / 3600,
        (secs / 60) % 60,
        secs % 60
    );
    send_command(c, 0xB1, 0x00, time_str.as_bytes())
}

pub fn send_change_event(state: &mut ServerState, lobby_id: u32, event: u8) -> Result<()> {
    send_to_lobby(state, lobby_id, None, 0xDA, u32::from(event), &[])
}
