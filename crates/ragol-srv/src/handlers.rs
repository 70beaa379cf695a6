//! Server command handlers: the `(variant, command)` dispatch that mutates
//! session/lobby state and emits replies. A handler error is a protocol or
//! state error; the reactor responds by tearing the session down.

use anyhow::{bail, Context, Result};
use ragol_net::Frame;
use ragol_pkt::cmds::login::{Login9D, LoginBb93, LoginGc9E, LoginV1Dc93, VerifyLicenseDb};
use ragol_pkt::cmds::message::TextHeader;
use ragol_pkt::cmds::subcmd::is_envelope;
use ragol_pkt::cmds::PLAYER_TAG;
use ragol_pkt::text::remove_language_marker;
use ragol_pkt::{check_size, decode_lax, DecodeRecord, EncodeRecord, PacketWriter, Version};

use crate::client::{ClientFlags, ConnectionPhase, SessionId};
use crate::collab::ChatContext;
use crate::config::ServerBehavior;
use crate::send;
use crate::state::{ServerState, GAME_MENU_ID, LOBBY_MENU_ID, QUEST_MENU_ID};

/// Called when a connection is accepted: sends the server-init frame and
/// installs ciphers, moving the session to the keyed phase.
pub fn on_connect(state: &mut ServerState, id: SessionId) -> Result<()> {
    let initial = {
        let c = state.client(id).context("client vanished")?;
        c.behavior == ServerBehavior::Login || c.behavior == ServerBehavior::Patch
    };
    let bb_key_table = state.bb_key_table.clone();
    let client = state.client_mut(id).context("client vanished")?;
    send::send_server_init(&bb_key_table, client, initial)?;
    client.phase = ConnectionPhase::Keyed;
    Ok(())
}

/// Idempotent teardown: lobby membership is cleaned up, a replacement
/// leader is chosen, and peers hear about the departure.
pub fn on_disconnect(state: &mut ServerState, id: SessionId) -> Result<()> {
    let lobby_id = match state.client_mut(id) {
        Some(c) => {
            if c.phase == ConnectionPhase::Terminated {
                return Ok(());
            }
            c.phase = ConnectionPhase::Terminated;
            c.channel.disconnect();
            c.lobby_id.take()
        }
        None => return Ok(()),
    };
    if let Some(lobby_id) = lobby_id {
        remove_from_lobby(state, id, lobby_id)?;
    }
    Ok(())
}

fn remove_from_lobby(state: &mut ServerState, id: SessionId, lobby_id: u32) -> Result<()> {
    let departure = state
        .lobby_mut(lobby_id)
        .and_then(|l| l.remove_client(id));
    if let Some(dep) = departure {
        send::send_player_leave_notification(state, lobby_id, dep.client_id)?;
        state.reap_lobby(lobby_id);
    }
    Ok(())
}

/// Top-level dispatch.
pub fn handle_frame(state: &mut ServerState, id: SessionId, frame: &Frame) -> Result<()> {
    let version = state.client(id).context("client vanished")?.version;
    state
        .client_mut(id)
        .context("client vanished")?
        .touch_recv();

    match (version, frame.command) {
        (Version::Patch, 0x02) => on_patch_init_ack(state, id),
        (Version::Patch, 0x04) => on_patch_login(state, id),

        (Version::Dc, 0x93) => on_login_dc_93(state, id, frame),
        (Version::Dc | Version::Pc, 0x9D) => on_login_9d(state, id, frame),
        (Version::Gc | Version::Xb, 0x9D) => on_login_9d(state, id, frame),
        (Version::Gc | Version::Xb, 0x9E) => on_login_9e(state, id, frame),
        (Version::Gc | Version::Xb, 0xDB) => on_verify_license_db(state, id, frame),
        (Version::Bb, 0x93) => on_login_bb_93(state, id, frame),

        (_, 0x06) => on_chat(state, id, frame),
        (_, c) if is_envelope(c) => on_envelope(state, id, frame),
        (_, 0x10) => on_menu_selection(state, id, frame),
        (_, 0x89) => on_arrow_change(state, id, frame),
        (_, 0x96) => {
            let c = state.client_mut(id).context("client vanished")?;
            send::send_command(c, 0x97, 0x01, &[])
        }
        (_, 0xA2) => on_quest_list_request(state, id, false),
        (_, 0xA4) => on_quest_list_request(state, id, true),
        (Version::Bb, 0x00EB) => on_stream_file_request(state, id),
        (Version::Bb, 0x03EB) => Ok(()), // chunk ack, best-effort
        (_, 0x13) | (_, 0xA7) => Ok(()), // quest chunk acks, best-effort
        (_, 0xD6) => Ok(()),             // message box closed
        (_, 0xB1) => {
            let c = state.client_mut(id).context("client vanished")?;
            send::send_server_time(c)
        }
        (v, cmd) => {
            tracing::debug!(version = %v, command = format_args!("{cmd:04X}"), "unhandled command");
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// patch flow

fn on_patch_init_ack(state: &mut ServerState, id: SessionId) -> Result<()> {
    let c = state.client_mut(id).context("client vanished")?;
    require_phase(c.phase, ConnectionPhase::Keyed)?;
    send::send_command(c, 0x04, 0x00, &[])
}

fn on_patch_login(state: &mut ServerState, id: SessionId) -> Result<()> {
    let name = state.config.server_name.clone();
    let c = state.client_mut(id).context("client vanished")?;
    require_phase(c.phase, ConnectionPhase::Keyed)?;
    c.phase = ConnectionPhase::Authenticated;
    send::send_message_box(c, &format!("Welcome to {name}"))?;
    // No files to update in the core; declare the update finished.
    send::send_command(c, 0x12, 0x00, &[])
}

// ---------------------------------------------------------------------------
// logins

fn require_phase(actual: ConnectionPhase, wanted: ConnectionPhase) -> Result<()> {
    if actual != wanted {
        bail!("command not valid in phase {actual:?} (wanted {wanted:?})");
    }
    Ok(())
}

fn parse_serial(text: &str) -> Result<u32> {
    u32::from_str_radix(text.trim_start_matches('0'), 16)
        .or_else(|_| text.parse())
        .context("unparseable serial number")
}

fn on_login_dc_93(state: &mut ServerState, id: SessionId, frame: &Frame) -> Result<()> {
    check_size(frame.payload.len(), LoginV1Dc93::SIZE, 0xFFFF)?;
    let cmd = decode_lax::<LoginV1Dc93>(&frame.payload)?;
    {
        let c = state.client_mut(id).context("client vanished")?;
        require_phase(c.phase, ConnectionPhase::Keyed)?;
        c.flags |= ClientFlags::DCV1;
        c.player.name = cmd.name.to_string_lossy();
    }
    complete_login(state, id, parse_serial(&cmd.serial_number.to_string_lossy())?, None)
}

fn on_login_9d(state: &mut ServerState, id: SessionId, frame: &Frame) -> Result<()> {
    check_size(frame.payload.len(), Login9D::SIZE, 0xFFFF)?;
    let cmd = decode_lax::<Login9D>(&frame.payload)?;
    {
        let c = state.client_mut(id).context("client vanished")?;
        require_phase(c.phase, ConnectionPhase::Keyed)?;
        c.player.name = cmd.name.to_string_lossy();
    }
    complete_login(state, id, parse_serial(&cmd.serial_number.to_string_lossy())?, None)
}

fn on_login_9e(state: &mut ServerState, id: SessionId, frame: &Frame) -> Result<()> {
    check_size(frame.payload.len(), LoginGc9E::SIZE, 0xFFFF)?;
    let cmd = decode_lax::<LoginGc9E>(&frame.payload)?;
    let magic = state.magic;
    {
        let c = state.client_mut(id).context("client vanished")?;
        require_phase(c.phase, ConnectionPhase::Keyed)?;
        c.player.name = cmd.name.to_string_lossy();
        c.import_config(magic, &cmd.cfg);
    }
    complete_login(state, id, parse_serial(&cmd.serial_number.to_string_lossy())?, None)
}

fn on_verify_license_db(state: &mut ServerState, id: SessionId, frame: &Frame) -> Result<()> {
    check_size(frame.payload.len(), VerifyLicenseDb::SIZE, 0xFFFF)?;
    let cmd = decode_lax::<VerifyLicenseDb>(&frame.payload)?;
    let serial = parse_serial(&cmd.serial_number.to_string_lossy())?;
    let known = state.licenses.lookup(serial).is_some();
    let c = state.client_mut(id).context("client vanished")?;
    require_phase(c.phase, ConnectionPhase::Keyed)?;
    if known {
        send::send_command(c, 0x9A, 0x02, &[])
    } else {
        send::send_message_box(c, "You are not registered on this server.")?;
        bail!("license {serial} unknown");
    }
}

fn on_login_bb_93(state: &mut ServerState, id: SessionId, frame: &Frame) -> Result<()> {
    check_size(frame.payload.len(), LoginBb93::SIZE, 0xFFFF)?;
    let cmd = decode_lax::<LoginBb93>(&frame.payload)?;
    let magic = state.magic;
    {
        let c = state.client_mut(id).context("client vanished")?;
        require_phase(c.phase, ConnectionPhase::Keyed)?;
        c.import_config(magic, &cmd.cfg.base);
    }
    complete_login(state, id, parse_serial(&cmd.serial_number.to_string_lossy())?, Some(()))
}

/// Common tail of every login: license lookup, config issuance, and either
/// a redirect to the lobby sub-server or a lobby join, depending on the
/// role of the port the client connected to.
fn complete_login(
    state: &mut ServerState,
    id: SessionId,
    serial: u32,
    bb: Option<()>,
) -> Result<()> {
    let license = match state.licenses.lookup(serial) {
        Some(l) => l,
        None => {
            let c = state.client_mut(id).context("client vanished")?;
            send::send_message_box(c, "You are not registered on this server.")?;
            bail!("license {serial} unknown");
        }
    };

    let magic = state.magic;
    let behavior = {
        let c = state.client_mut(id).context("client vanished")?;
        c.license = Some(license);
        c.phase = ConnectionPhase::Authenticated;
        c.behavior
    };

    if bb.is_some() {
        send_bb_client_init(state, id)?;
    } else {
        let c = state.client_mut(id).context("client vanished")?;
        send::send_update_client_config(magic, c)?;
    }

    match behavior {
        ServerBehavior::Login | ServerBehavior::SplitReconnect => {
            // Redirect the client back at this process, on the port whose
            // role fits the next stage of its connection.
            let address = state.config.local_address;
            let lobby_port = state.config.lobby_port;
            let pc_port = state.config.pc_login_port;
            let c = state.client_mut(id).context("client vanished")?;
            if behavior == ServerBehavior::SplitReconnect {
                send::send_pc_console_split_reconnect(c, address, pc_port, lobby_port)
            } else {
                send::send_reconnect(c, address, lobby_port)
            }
        }
        ServerBehavior::Lobby | ServerBehavior::DataBb => {
            let lobby_id = state
                .first_default_lobby_id()
                .context("no default lobbies")?;
            add_to_lobby(state, id, lobby_id)
        }
        ServerBehavior::Patch => bail!("game login on a patch port"),
    }
}

fn send_bb_client_init(state: &mut ServerState, id: SessionId) -> Result<()> {
    let magic = state.magic;
    let c = state.client_mut(id).context("client vanished")?;
    let mut pw = PacketWriter::new();
    pw.write_u32(0); // error code
    pw.write_u32(PLAYER_TAG);
    pw.write_u32(c.serial_number());
    pw.write_u32(0x0000_0001); // team id
    c.export_config_bb(magic).encode(&mut pw)?;
    pw.write_u32(0x0000_0102); // caps
    send::send_command(c, 0x00E6, 0x00, pw.as_slice())
}

// ---------------------------------------------------------------------------
// lobby / game movement

pub fn add_to_lobby(state: &mut ServerState, id: SessionId, lobby_id: u32) -> Result<()> {
    let slot = state
        .lobby_mut(lobby_id)
        .context("no such lobby")?
        .add_client(id)
        .context("lobby is full")?;
    let is_game = state.lobby(lobby_id).is_some_and(|l| l.is_game());
    {
        let c = state.client_mut(id).context("client vanished")?;
        c.lobby_id = Some(lobby_id);
        c.lobby_client_id = slot;
        c.lobby_arrow_color = 0;
        c.phase = if is_game {
            ConnectionPhase::InGame
        } else {
            ConnectionPhase::InLobby
        };
    }

    if is_game {
        send::send_join_game(state, id, lobby_id)?;
    } else {
        send::send_join_lobby(state, id, lobby_id)?;
    }
    // Everyone already present sees a one-entry additional join.
    let others: Vec<SessionId> = state
        .lobby(lobby_id)
        .map(|l| l.members_excluding(id).map(|(_, sid)| sid).collect())
        .unwrap_or_default();
    for other in others {
        send::send_player_join_notification(state, other, lobby_id, id)?;
    }
    if !is_game {
        send::send_arrow_update(state, lobby_id)?;
    }
    Ok(())
}

pub fn move_to_lobby(state: &mut ServerState, id: SessionId, target: u32) -> Result<()> {
    let old = state.client(id).and_then(|c| c.lobby_id);
    if let Some(old_id) = old {
        if old_id == target {
            return Ok(());
        }
        remove_from_lobby(state, id, old_id)?;
    }
    add_to_lobby(state, id, target)
}

fn on_menu_selection(state: &mut ServerState, id: SessionId, frame: &Frame) -> Result<()> {
    check_size(frame.payload.len(), 8, 0xFFFF)?;
    let mut pr = ragol_pkt::PacketReader::new(&frame.payload);
    let menu_id = pr.read_u32()?;
    let item_id = pr.read_u32()?;

    match menu_id {
        LOBBY_MENU_ID => move_to_lobby(state, id, item_id),
        GAME_MENU_ID => {
            if item_id == 0 {
                return send::send_game_menu(state, id);
            }
            move_to_lobby(state, id, item_id)
        }
        QUEST_MENU_ID => {
            let (info, data) = state
                .quests
                .get(item_id)
                .context("quest not found")?;
            let c = state.client_mut(id).context("client vanished")?;
            send::send_quest_file(c, &info.name, &data, false)
        }
        _ => {
            tracing::debug!(menu_id, item_id, "selection on unknown menu");
            Ok(())
        }
    }
}

fn on_arrow_change(state: &mut ServerState, id: SessionId, frame: &Frame) -> Result<()> {
    let lobby_id = {
        let c = state.client_mut(id).context("client vanished")?;
        c.lobby_arrow_color = frame.flag as u8;
        c.lobby_id.context("arrow change outside a lobby")?
    };
    send::send_arrow_update(state, lobby_id)
}

fn on_quest_list_request(state: &mut ServerState, id: SessionId, download: bool) -> Result<()> {
    let quests = state.quests.list();
    let c = state.client_mut(id).context("client vanished")?;
    send::send_quest_menu(c, QUEST_MENU_ID, &quests, download)
}

fn on_stream_file_request(state: &mut ServerState, id: SessionId) -> Result<()> {
    let cache = state.file_cache.clone();
    let client = state.client_mut(id).context("client vanished")?;
    send::send_stream_file(&cache, client)
}

// ---------------------------------------------------------------------------
// chat & sub-command relay

/// A chat line is a command when it begins with `$`, possibly behind a
/// language marker.
fn is_chat_command(text: &str) -> bool {
    remove_language_marker(text).starts_with('$')
}

struct ClientChatContext<'a> {
    client: &'a mut crate::client::Client,
}

impl ChatContext for ClientChatContext<'_> {
    fn reply(&mut self, text: &str) {
        let _ = send::send_text_message(self.client, text);
    }
}

fn decode_chat_text(version: Version, payload: &[u8]) -> Result<String> {
    check_size(payload.len(), TextHeader::SIZE, 0xFFFF)?;
    let body = &payload[TextHeader::SIZE..];
    let text = if version.uses_wide_text() {
        let units: Vec<u16> = body
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .take_while(|&u| u != 0)
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        let end = body.iter().position(|&b| b == 0).unwrap_or(body.len());
        String::from_utf8_lossy(&body[..end]).into_owned()
    };
    Ok(text)
}

fn on_chat(state: &mut ServerState, id: SessionId, frame: &Frame) -> Result<()> {
    let version = state.client(id).context("client vanished")?.version;
    let text = decode_chat_text(version, &frame.payload)?;
    if text.is_empty() {
        return Ok(());
    }

    if is_chat_command(&text) {
        let chat = state.chat.clone();
        let client = state.client_mut(id).context("client vanished")?;
        let bare = remove_language_marker(&text);
        let mut ctx = ClientChatContext { client };
        chat.handle(&mut ctx, bare.trim_start_matches('$'));
        return Ok(());
    }

    let (lobby_id, serial, name, can_chat) = {
        let c = state.client(id).context("client vanished")?;
        (
            c.lobby_id.context("chat outside a lobby")?,
            c.serial_number(),
            c.player.name.clone(),
            c.phase == ConnectionPhase::InLobby || c.phase == ConnectionPhase::InGame,
        )
    };
    if !can_chat {
        bail!("chat before joining a lobby");
    }

    let members: Vec<SessionId> = state
        .lobby(lobby_id)
        .map(|l| l.members().map(|(_, sid)| sid).collect())
        .unwrap_or_default();
    for member in members {
        if let Some(c) = state.client_mut(member) {
            send::send_chat_message(c, serial, &name, &text)?;
        }
    }
    Ok(())
}

/// Sub-command fan-out. Broadcast envelopes go to every lobby peer except
/// the sender; targeted envelopes go to the slot named in the flag.
fn on_envelope(state: &mut ServerState, id: SessionId, frame: &Frame) -> Result<()> {
    let (lobby_id, phase) = {
        let c = state.client(id).context("client vanished")?;
        (c.lobby_id, c.phase)
    };
    if !matches!(phase, ConnectionPhase::InLobby | ConnectionPhase::InGame) {
        bail!("sub-command envelope outside a lobby");
    }
    let lobby_id = lobby_id.context("envelope with no lobby")?;

    match frame.command {
        0x60 | 0x6C | 0xC9 => send::send_to_lobby(
            state,
            lobby_id,
            Some(id),
            frame.command,
            frame.flag,
            &frame.payload,
        ),
        0x62 | 0x6D | 0xCB => {
            let target_slot = (frame.flag & 0xFF) as u8;
            let target = state
                .lobby(lobby_id)
                .and_then(|l| l.client_at(target_slot));
            if let Some(target) = target {
                if let Some(c) = state.client_mut(target) {
                    send::send_command(c, frame.command, frame.flag, &frame.payload)?;
                }
            }
            Ok(())
        }
        other => bail!("not an envelope command: {other:02X}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{
        FileContentsCache, License, MemoryLicenseStore, NullChatHandler, QuestInfo,
        QuestRepository,
    };
    use crate::client::Client;
    use crate::config::Config;
    use ragol_crypto::{BbKeyTable, PsoCipher, V3Cipher};
    use ragol_pkt::cmds::init::ServerInitV2;
    use ragol_pkt::cmds::login::{Login9D, UpdateClientConfig04};
    use ragol_pkt::FixedText;
    use std::sync::Arc;

    struct NoQuests;
    impl QuestRepository for NoQuests {
        fn list(&self) -> Vec<QuestInfo> {
            Vec::new()
        }
        fn get(&self, _: u32) -> Option<(QuestInfo, Arc<Vec<u8>>)> {
            None
        }
    }

    const MAGIC: u64 = 0x52_41_47_4F_4C_u64;

    fn test_state() -> ServerState {
        ServerState::new(
            Config::default(),
            MAGIC,
            Arc::new(MemoryLicenseStore::with([License {
                serial_number: 1001,
                access_key: "hbhbhbhb".into(),
                gc_password: None,
            }])),
            Arc::new(NoQuests),
            Arc::new(NullChatHandler),
            Arc::new(FileContentsCache::fixed([])),
            Arc::new(BbKeyTable::from_bytes(&[0x5A; 1024]).unwrap()),
        )
    }

    fn accept(state: &mut ServerState, version: Version, behavior: ServerBehavior) -> SessionId {
        let id = state.alloc_session_id();
        state.insert_client(Client::new(id, version, behavior));
        on_connect(state, id).unwrap();
        id
    }

    /// Full latter-console handshake: unencrypted init, encrypted login,
    /// license accepted, config issued under the server cipher.
    #[test]
    fn gc_handshake_and_login() {
        let mut state = test_state();
        let id = accept(&mut state, Version::Gc, ServerBehavior::Login);

        // Client side: read the init frame off the wire, unencrypted.
        let wire = state.client_mut(id).unwrap().channel.take_outbound();
        let init_frame = &wire[0];
        assert_eq!(init_frame[0], 0x17);
        let init = ServerInitV2::from_slice(&init_frame[4..]).unwrap();

        let mut client_out = V3Cipher::new(init.client_key);
        let mut client_in = V3Cipher::new(init.server_key);

        // Send an encrypted 9D login carrying the registered serial.
        let login = Login9D {
            player_tag: 0xFFFF_0000,
            guild_card_number: 0xFFFF_FFFF,
            unused: 0,
            sub_version: 0x30,
            is_extended: 0,
            language: 1,
            unused2: 0,
            serial_number: FixedText::from_str("000003E9").unwrap(),
            access_key: FixedText::from_str("hbhbhbhb").unwrap(),
            serial_number2: FixedText::from_str("000003E9").unwrap(),
            access_key2: FixedText::from_str("hbhbhbhb").unwrap(),
            name: FixedText::from_str("\tEGuild").unwrap(),
        };
        // Only the 9D fields, not the 9E config tail.
        let payload = &Login9D::to_bytes(&login);
        let mut wire_frame =
            ragol_net::frame::encode_frame(Version::Gc, 0x9D, 0, payload)
                .unwrap()
                .to_vec();
        client_out.encrypt(&mut wire_frame).unwrap();

        let frames = state
            .client_mut(id)
            .unwrap()
            .channel
            .drain_incoming(&wire_frame)
            .unwrap();
        assert_eq!(frames.len(), 1);
        handle_frame(&mut state, id, &frames[0]).unwrap();

        // Server must have validated license 1001 and replied with 04.
        assert_eq!(state.client(id).unwrap().serial_number(), 1001);
        let out = state.client_mut(id).unwrap().channel.take_outbound();
        let mut first = out[0].to_vec();
        client_in.decrypt(&mut first).unwrap();
        assert_eq!(first[0], 0x04);
        let cfg = UpdateClientConfig04::from_slice(&first[4..]).unwrap();
        assert_eq!(cfg.guild_card_number, 1001);
        assert_eq!(cfg.cfg.magic, MAGIC);
    }

    #[test]
    fn unknown_license_is_rejected_with_message() {
        let mut state = test_state();
        let id = accept(&mut state, Version::Gc, ServerBehavior::Lobby);
        state.client_mut(id).unwrap().channel.take_outbound();

        let login = Login9D {
            player_tag: 0,
            guild_card_number: 0,
            unused: 0,
            sub_version: 0,
            is_extended: 0,
            language: 0,
            unused2: 0,
            serial_number: FixedText::from_str("00000063").unwrap(),
            access_key: FixedText::default(),
            serial_number2: FixedText::default(),
            access_key2: FixedText::default(),
            name: FixedText::default(),
        };
        let frame = Frame {
            command: 0x9D,
            flag: 0,
            payload: Login9D::to_bytes(&login),
        };
        // Bypass the cipher: call the handler directly in Keyed phase.
        assert!(handle_frame(&mut state, id, &frame).is_err());
    }

    #[test]
    fn lobby_join_emits_roster_and_arrows() {
        let mut state = test_state();
        let lobby_id = state.first_default_lobby_id().unwrap();

        let a = accept(&mut state, Version::Gc, ServerBehavior::Lobby);
        let b = accept(&mut state, Version::Gc, ServerBehavior::Lobby);
        for id in [a, b] {
            let c = state.client_mut(id).unwrap();
            c.phase = ConnectionPhase::Authenticated;
            c.channel.reset_ciphers(None, None);
            c.channel.take_outbound();
        }

        add_to_lobby(&mut state, a, lobby_id).unwrap();
        add_to_lobby(&mut state, b, lobby_id).unwrap();

        // a got: join(67)+arrows on entry, then 68 about b, then arrows.
        let a_frames: Vec<u8> = state
            .client_mut(a)
            .unwrap()
            .channel
            .take_outbound()
            .iter()
            .map(|f| f[0])
            .collect();
        assert!(a_frames.contains(&0x67));
        assert!(a_frames.contains(&0x68));
        assert!(a_frames.contains(&0x88));

        let b_frames: Vec<u8> = state
            .client_mut(b)
            .unwrap()
            .channel
            .take_outbound()
            .iter()
            .map(|f| f[0])
            .collect();
        assert_eq!(b_frames[0], 0x67);
    }

    /// Leader handoff: slots {0,1,2}, leader 0 disconnects, slot 1 takes
    /// over and peers hear a 69 with the new leader id.
    #[test]
    fn leader_handoff_broadcast() {
        let mut state = test_state();
        let lobby_id = state.first_default_lobby_id().unwrap();
        let ids: Vec<SessionId> = (0..3)
            .map(|_| accept(&mut state, Version::Gc, ServerBehavior::Lobby))
            .collect();
        for &id in &ids {
            let c = state.client_mut(id).unwrap();
            c.phase = ConnectionPhase::Authenticated;
            c.channel.reset_ciphers(None, None);
            add_to_lobby(&mut state, id, lobby_id).unwrap();
        }
        for &id in &ids {
            state.client_mut(id).unwrap().channel.take_outbound();
        }

        on_disconnect(&mut state, ids[0]).unwrap();

        let lobby = state.lobby(lobby_id).unwrap();
        assert_eq!(lobby.leader_id(), Some(1));

        let frames = state.client_mut(ids[1]).unwrap().channel.take_outbound();
        let leave = frames.iter().find(|f| f[0] == 0x69).expect("69 frame");
        // payload: leaving_id, leader_id
        assert_eq!(leave[4], 0);
        assert_eq!(leave[5], 1);
    }

    #[test]
    fn broadcast_envelope_excludes_sender() {
        let mut state = test_state();
        let lobby_id = state.first_default_lobby_id().unwrap();
        let ids: Vec<SessionId> = (0..3)
            .map(|_| accept(&mut state, Version::Gc, ServerBehavior::Lobby))
            .collect();
        for &id in &ids {
            let c = state.client_mut(id).unwrap();
            c.phase = ConnectionPhase::Authenticated;
            c.channel.reset_ciphers(None, None);
            add_to_lobby(&mut state, id, lobby_id).unwrap();
        }
        for &id in &ids {
            state.client_mut(id).unwrap().channel.take_outbound();
        }

        let frame = Frame {
            command: 0x60,
            flag: 0,
            payload: bytes::Bytes::from_static(&[0x05, 0x01, 0x00, 0x00]),
        };
        handle_frame(&mut state, ids[0], &frame).unwrap();

        assert!(state.client_mut(ids[0]).unwrap().channel.take_outbound().is_empty());
        assert_eq!(state.client_mut(ids[1]).unwrap().channel.take_outbound().len(), 1);
        assert_eq!(state.client_mut(ids[2]).unwrap().channel.take_outbound().len(), 1);
    }
}
