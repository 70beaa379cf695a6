//! The interception proxy: a bidirectional command pipeline between an
//! authenticated client and a remote upstream server. Every frame from
//! either side runs through a handler that forwards, suppresses, or
//! rewrites it; unhandled `(variant, command)` pairs forward untouched.
//!
//! A session is "linked" when the client authenticated against the home
//! server first and carries a license. Linked sessions hide the upstream
//! identity: the guild-card number the remote server assigns is replaced by
//! the home serial in everything the client sees, and the reverse on the
//! way out.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use rand::Rng;
use ragol_crypto::hash::{crc32, fnv1a64};
use ragol_crypto::{
    BbSeed, MultiKeyDetector, MultiKeyImitator, SharedDetectorState, V2Cipher, V3Cipher,
};
use ragol_net::Channel;
use ragol_pkt::cmds::init::{ServerInitBb, ServerInitV2, SERVER_INIT_BB_MIN, SERVER_INIT_V2_MIN};
use ragol_pkt::cmds::lobby::{
    join_lobby_entry_len, lobby_data_client_id_offset, lobby_data_len, lobby_data_name_offset,
    CardLobbyEntryE4, JoinGameTail, GAME_VARIATIONS_WORDS,
};
use ragol_pkt::cmds::login::{
    ClientConfig, Login9D, LoginGc9E, LoginV1Dc93, VerifyLicenseDb, BB_LOGIN_CRC_OFFSET,
    UPDATE_CLIENT_CONFIG_MIN,
};
use ragol_pkt::cmds::message::TextHeader;
use ragol_pkt::cmds::reconnect::{Reconnect19, RECONNECT_MAX};
use ragol_pkt::cmds::search::ChoiceSearchEntryV3C4;
use ragol_pkt::cmds::subcmd::{
    build_stats_change, is_envelope, BoxDropRequest6xA2, DropItem6x5F, EnemyDropRequest6x60,
    ItemData, StatsChange, SubcommandHeader, SwitchStateChanged6x05, ENEMY_DROP_REQUEST_MAX,
    SUB_BOX_DROP_REQUEST, SUB_DROP_ITEM, SUB_ENEMY_DROP_REQUEST, SUB_ENEMY_HIT, SUB_GUILD_CARD,
    SUB_PLAYER_HIT, SUB_SWITCH_STATE, SUB_USE_TECHNIQUE,
};
use ragol_pkt::cmds::{GUILD_CARD_NONE, PLAYER_TAG, PLAYER_TAG_UNREGISTERED};
use ragol_pkt::{
    check_size, decode_lax, DecodeRecord, EncodeRecord, FixedText, PacketWriter, Version,
};

use crate::client::ClientFlags;
use crate::collab::License;
use crate::config::Config;
use crate::send::encode_text;

/// Plaintext the multi-key detector expects the latter-game client's first
/// encrypted frame to begin with (its login header).
pub const BB_FIRST_FRAME: [u8; 8] = [0xB4, 0x00, 0x93, 0x00, 0x00, 0x00, 0x00, 0x00];

/// Constants observed in the remote-IP CRC countermeasure; the derivation
/// is undocumented upstream, so they stay literal.
const REMOTE_IP_CRC_XOR: u32 = 1_309_539_928u32.wrapping_add(1_248_334_810);
/// Fingerprint of the 0x2C-byte frame that announces the countermeasure.
const FINGERPRINT_22_HASH: u64 = 0x8AF8_3143_16A2_7994;
const FINGERPRINT_22_LEN: usize = 0x2C;

/// What a handler decided about a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerResult {
    /// Relay unchanged.
    Forward,
    /// Drop; the other side never sees it.
    Suppress,
    /// Relay the (in-place mutated) payload, optionally renumbering it.
    Modified {
        command: Option<u16>,
        flag: Option<u32>,
    },
}

impl HandlerResult {
    const MODIFIED: Self = HandlerResult::Modified {
        command: None,
        flag: None,
    };

    fn modified_if(changed: bool) -> Self {
        if changed {
            Self::MODIFIED
        } else {
            Self::Forward
        }
    }
}

/// Shared environment the proxy handlers consult: home-server identity and
/// the candidate key pool for latter-game detection.
pub struct ProxyEnv {
    pub config: Config,
    pub bb_key_tables: Vec<Arc<ragol_crypto::BbKeyTable>>,
}

#[derive(Debug, Clone, Default)]
pub struct LobbyPlayerMirror {
    pub guild_card_number: u32,
    pub name: String,
}

/// An upstream file transfer being captured.
pub struct SavingFile {
    pub filename: String,
    pub total_size: u32,
    pub remaining: u32,
    pub data: Vec<u8>,
}

pub struct ProxySession {
    pub version: Version,
    pub client_channel: Channel,
    pub server_channel: Channel,
    /// Present iff the session is linked.
    pub license: Option<Arc<License>>,
    pub sub_version: u8,
    pub language: u8,
    pub character_name: String,
    pub hardware_id: u32,

    /// Guild-card number assigned by the upstream server; hidden from the
    /// client on linked sessions.
    pub remote_guild_card_number: u32,
    /// Mirror of the config blob the upstream server believes the client
    /// holds, including the short-04 copy artifact.
    pub remote_client_config: [u8; 0x20],
    /// The home server's flags for this client, restored on return.
    pub home_flags: ClientFlags,
    pub home_config: ClientConfig,

    /// Latter-game only: login captured from the client, replayed when the
    /// upstream redirects us and re-keys.
    pub login_command_bb: Option<Vec<u8>>,
    pub detector: Option<Arc<SharedDetectorState>>,

    pub lobby_players: Vec<LobbyPlayerMirror>,
    pub lobby_client_id: u8,
    pub leader_client_id: u8,

    pub is_virtual_connection: bool,
    pub local_address: [u8; 4],
    pub local_port: u16,
    /// Where the upstream told the client to go; the reactor dials this on
    /// the next outbound connection.
    pub next_destination: Option<([u8; 4], u16)>,
    /// Set when a patcher redirect must be followed silently.
    pub pending_silent_reconnect: bool,

    /// Tail bytes of the previous upstream frame, used to reproduce the
    /// client's buffer-splice behavior on deliberately short reconnects.
    pub prev_server_frame: [u8; 8],
    pub enable_remote_ip_crc_patch: bool,
    pub remote_ip_crc: u32,

    pub override_section_id: Option<u8>,
    pub override_event: Option<u8>,
    pub override_lobby_number: Option<u8>,
    pub override_random_seed: Option<u32>,

    pub infinite_hp: bool,
    pub infinite_tp: bool,
    pub switch_assist: bool,
    pub enable_chat_filter: bool,
    pub save_files: bool,

    pub last_switch_enabled: Option<SwitchStateChanged6x05>,
    pub next_drop_item: Option<ItemData>,
    pub next_item_id: u32,
    pub saving_files: HashMap<String, SavingFile>,
}

impl ProxySession {
    pub fn new(
        version: Version,
        license: Option<Arc<License>>,
        local_address: [u8; 4],
        local_port: u16,
    ) -> Self {
        Self {
            version,
            client_channel: Channel::new(version),
            server_channel: Channel::new(version),
            license,
            sub_version: 0,
            language: 0,
            character_name: String::new(),
            hardware_id: 0,
            remote_guild_card_number: 0,
            remote_client_config: [0; 0x20],
            home_flags: ClientFlags::default(),
            home_config: ClientConfig {
                magic: 0,
                game_state: 0,
                player_index: 0,
                flags: 0,
                unused: [0; 5],
            },
            login_command_bb: None,
            detector: None,
            lobby_players: vec![LobbyPlayerMirror::default(); 12],
            lobby_client_id: 0,
            leader_client_id: 0,
            is_virtual_connection: false,
            local_address,
            local_port,
            next_destination: None,
            pending_silent_reconnect: false,
            prev_server_frame: [0; 8],
            enable_remote_ip_crc_patch: false,
            remote_ip_crc: 0,
            override_section_id: None,
            override_event: None,
            override_lobby_number: None,
            override_random_seed: None,
            infinite_hp: false,
            infinite_tp: false,
            switch_assist: false,
            enable_chat_filter: false,
            save_files: false,
            last_switch_enabled: None,
            next_drop_item: None,
            next_item_id: 0x0F00_0000,
            saving_files: HashMap::new(),
        }
    }

    pub fn is_linked(&self) -> bool {
        self.license.is_some()
    }

    fn local_serial(&self) -> u32 {
        self.license.as_ref().map_or(0, |l| l.serial_number)
    }

    /// Fatal upstream errors take both channels down together.
    pub fn disconnect(&mut self) {
        self.client_channel.disconnect();
        self.server_channel.disconnect();
    }

    fn send_text_to_client(&mut self, command: u16, text: &str) -> Result<()> {
        let mut pw = PacketWriter::new();
        TextHeader {
            unused: 0,
            guild_card_number: 0,
        }
        .encode(&mut pw)?;
        pw.write_slice(&encode_text(self.version, text));
        self.client_channel.send(command, 0x00, pw.as_slice())?;
        Ok(())
    }

    fn update_leader(&mut self, leader_id: u8) -> Result<()> {
        if self.leader_client_id != leader_id {
            self.leader_client_id = leader_id;
            tracing::info!(leader_id, "room leader changed");
            if leader_id == self.lobby_client_id {
                self.send_text_to_client(0xB0, "\tC6You are now the leader")?;
            }
        }
        Ok(())
    }
}

fn read_u32_at(data: &[u8], offset: usize) -> Option<u32> {
    data.get(offset..offset + 4)
        .map(|b| u32::from_le_bytes(b.try_into().unwrap()))
}

fn write_u32_at(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Replaces `from` with `to` in the u32 at `offset`; true if it matched.
fn swap_guild_card(data: &mut [u8], offset: usize, from: u32, to: u32) -> bool {
    match read_u32_at(data, offset) {
        Some(v) if v == from && from != 0 => {
            write_u32_at(data, offset, to);
            true
        }
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// pipeline entry

/// Runs one frame through the interception pipeline and emits it (or not)
/// on the opposite channel. Handler failure is fatal for the session.
pub fn process_frame(
    env: &ProxyEnv,
    s: &mut ProxySession,
    from_server: bool,
    command: u16,
    flag: u32,
    mut data: Vec<u8>,
) -> Result<()> {
    let result = if from_server {
        handle_server_frame(env, s, command, flag, &mut data)
    } else {
        handle_client_frame(env, s, command, flag, &mut data)
    };

    let result = match result {
        Ok(r) => r,
        Err(e) => {
            s.disconnect();
            return Err(e);
        }
    };

    match result {
        HandlerResult::Forward => forward(s, !from_server, command, flag, &data),
        HandlerResult::Modified {
            command: new_command,
            flag: new_flag,
        } => {
            tracing::info!(
                command = format_args!("{command:02X}"),
                from_server,
                "frame modified in transit"
            );
            forward(
                s,
                !from_server,
                new_command.unwrap_or(command),
                new_flag.unwrap_or(flag),
                &data,
            )
        }
        HandlerResult::Suppress => {
            tracing::debug!(
                command = format_args!("{command:02X}"),
                from_server,
                "frame suppressed"
            );
            Ok(())
        }
    }?;

    if from_server {
        // Remember how the frame ended for the short-reconnect splice.
        let n = data.len().min(s.prev_server_frame.len());
        let keep = s.prev_server_frame.len() - n;
        s.prev_server_frame.copy_within(n.., 0);
        s.prev_server_frame[keep..].copy_from_slice(&data[data.len() - n..]);
    }
    Ok(())
}

fn forward(
    s: &mut ProxySession,
    to_server: bool,
    command: u16,
    flag: u32,
    data: &[u8],
) -> Result<()> {
    let ch = if to_server {
        &mut s.server_channel
    } else {
        &mut s.client_channel
    };
    if !ch.is_connected() {
        tracing::warn!("no endpoint present; dropping command");
        return Ok(());
    }
    ch.send(command, flag, data)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// server-side dispatch

fn handle_server_frame(
    env: &ProxyEnv,
    s: &mut ProxySession,
    command: u16,
    flag: u32,
    data: &mut Vec<u8>,
) -> Result<HandlerResult> {
    use Version::*;
    match (s.version, command) {
        (Patch, 0x02) | (Dc | Pc | Gc | Xb, 0x02 | 0x17) => {
            on_server_init_v2(env, s, command, flag, data)
        }
        (Bb, 0x03) => on_server_init_bb(env, s, data),
        (Dc | Pc | Gc | Xb, 0x04) => on_server_04(s, data),
        (Dc | Pc | Gc | Xb | Bb, 0x06) => on_server_06(s, data),
        (Dc | Pc | Gc | Xb | Bb, 0x41) => on_server_41(s, data),
        (Dc | Gc | Xb, 0x81) => Ok(rewrite_mail(s, data, true, 0x18)),
        (Pc | Bb, 0x81) => Ok(rewrite_mail(s, data, true, 0x28)),
        (Dc | Pc | Gc | Xb | Bb, 0x88) => on_server_88(s, flag, data),
        (Gc | Xb, 0xC4) => on_server_c4(s, flag, data),
        (Gc, 0xE4) => on_server_e4(s, data),
        (Bb, 0x22) => on_server_22(s, data),
        (Patch, 0x14) => on_server_reconnect(s, command, data),
        (Dc | Pc | Gc | Xb | Bb, 0x19) => on_server_reconnect(s, command, data),
        (Gc | Xb, 0x1A | 0xD5) => on_server_message_box(s),
        (Dc | Pc | Gc | Xb, 0x97) => on_server_97(s, flag),
        (Gc, 0x9A) => on_server_gc_9a(s),
        (Dc | Pc | Gc | Xb | Bb, 0x64) => on_server_64(s, flag, data),
        (Dc | Pc | Gc | Xb | Bb, 0x65 | 0x67 | 0x68) => on_server_65_67_68(s, command, flag, data),
        (Dc | Pc | Gc | Xb | Bb, 0x66 | 0x69) => on_server_66_69(s, data),
        (Dc | Pc | Gc | Xb | Bb, 0x44 | 0xA6) => on_server_open_file(s, data),
        (Dc | Pc | Gc | Xb | Bb, 0x13 | 0xA7) => on_server_write_file(s, data),
        (v, c) if is_envelope(c) && v != Patch => on_server_envelope(s, data),
        _ => Ok(HandlerResult::Forward),
    }
}

/// Server init for everything except the latter-game variant. The frame is
/// plaintext; whatever happens next on either channel is encrypted.
fn on_server_init_v2(
    _env: &ProxyEnv,
    s: &mut ProxySession,
    command: u16,
    flag: u32,
    data: &mut Vec<u8>,
) -> Result<HandlerResult> {
    if s.version == Version::Patch && command == 0x17 {
        bail!("patch server sent a 17 server init");
    }
    check_size(data.len(), SERVER_INIT_V2_MIN, 0xFFFF)?;
    let cmd = decode_lax::<ServerInitV2>(data)?;

    let v3 = s.version.uses_v3_cipher();
    let make = |key: u32| -> Box<dyn ragol_crypto::PsoCipher> {
        if v3 {
            Box::new(V3Cipher::new(key))
        } else {
            Box::new(V2Cipher::new(key))
        }
    };

    if !s.is_linked() {
        tracing::info!("unlinked session: passing server init through");
        // Forward before keying so the client reads it as plaintext, then
        // watch both directions.
        forward(s, false, command, flag, data)?;
        s.server_channel
            .reset_ciphers(Some(make(cmd.server_key)), Some(make(cmd.client_key)));
        s.client_channel
            .reset_ciphers(Some(make(cmd.client_key)), Some(make(cmd.server_key)));
        return Ok(HandlerResult::Suppress);
    }

    tracing::info!("linked session: answering server init ourselves");
    // Not forwarded, so the client's ciphers stay as they are.
    s.server_channel
        .reset_ciphers(Some(make(cmd.server_key)), Some(make(cmd.client_key)));

    // The client believes it already logged in (it did, against the home
    // server), so we must answer in its stead.
    match s.version {
        Version::Patch => {
            s.server_channel.send(0x02, 0x00, &[])?;
            Ok(HandlerResult::Suppress)
        }
        Version::Dc | Version::Pc => {
            if s.home_flags.contains(ClientFlags::DCV1) {
                let cmd = synth_login_v1(s);
                s.server_channel.send(0x93, 0x00, &cmd.to_bytes())?;
            } else {
                let cmd = synth_login_9d(s);
                s.server_channel.send(0x9D, 0x00, &cmd.to_bytes())?;
            }
            Ok(HandlerResult::Suppress)
        }
        Version::Gc => {
            if command == 0x17 {
                let license = s.license.as_ref().expect("linked session");
                let serial = format!("{:08X}", license.serial_number);
                let cmd = VerifyLicenseDb {
                    serial_number: FixedText::from_str(&serial)?,
                    access_key: FixedText::from_str(&license.access_key)?,
                    sub_version: u32::from(s.sub_version),
                    serial_number2: FixedText::from_str(&serial)?,
                    access_key2: FixedText::from_str(&license.access_key)?,
                    password: FixedText::from_str(
                        license.gc_password.as_deref().unwrap_or_default(),
                    )?,
                };
                s.server_channel.send(0xDB, 0x00, &cmd.to_bytes())?;
                Ok(HandlerResult::Suppress)
            } else {
                on_server_gc_9a(s)
            }
        }
        Version::Xb => bail!("xb licenses are not implemented"),
        Version::Bb => bail!("latter-game init must use the 03 handler"),
    }
}

fn identity_words(s: &ProxySession) -> (u32, u32) {
    if s.remote_guild_card_number == 0 {
        (PLAYER_TAG_UNREGISTERED, GUILD_CARD_NONE)
    } else {
        (PLAYER_TAG, s.remote_guild_card_number)
    }
}

fn synth_login_v1(s: &ProxySession) -> LoginV1Dc93 {
    let license = s.license.as_ref().expect("linked session");
    let (player_tag, guild_card_number) = identity_words(s);
    LoginV1Dc93 {
        player_tag,
        guild_card_number,
        unknown_a1: 0,
        unknown_a2: 0,
        sub_version: s.sub_version,
        is_extended: 0,
        language: s.language,
        unused: 0,
        serial_number: FixedText::from_str(&format!("{:08X}", license.serial_number))
            .unwrap_or_default(),
        access_key: FixedText::from_str(&license.access_key).unwrap_or_default(),
        hardware_id: FixedText::from_str(&format!("{:08X}", s.hardware_id)).unwrap_or_default(),
        name: FixedText::from_str(&s.character_name).unwrap_or_default(),
    }
}

fn synth_login_9d(s: &ProxySession) -> Login9D {
    let license = s.license.as_ref().expect("linked session");
    let (player_tag, guild_card_number) = identity_words(s);
    let serial = FixedText::from_str(&format!("{:08X}", license.serial_number)).unwrap_or_default();
    let access = FixedText::from_str(&license.access_key).unwrap_or_default();
    Login9D {
        player_tag,
        guild_card_number,
        unused: 0xFFFF_FFFF_FFFF_0000,
        sub_version: s.sub_version,
        is_extended: 0,
        language: s.language,
        unused2: 0,
        serial_number: serial,
        access_key: access,
        serial_number2: serial,
        access_key2: access,
        name: FixedText::from_str(&s.character_name).unwrap_or_default(),
    }
}

/// The later-console login request: answered with a synthesized 9E carrying
/// the home identity and the mirrored remote config blob.
fn on_server_gc_9a(s: &mut ProxySession) -> Result<HandlerResult> {
    if !s.is_linked() {
        return Ok(HandlerResult::Forward);
    }
    let license = s.license.as_ref().expect("linked session");
    let (player_tag, guild_card_number) = identity_words(s);
    let serial = FixedText::from_str(&format!("{:08X}", license.serial_number)).unwrap_or_default();
    let access = FixedText::from_str(&license.access_key).unwrap_or_default();
    let is_extended = s.remote_guild_card_number == 0;

    let cmd = LoginGc9E {
        player_tag,
        guild_card_number,
        unused: 0,
        sub_version: s.sub_version,
        is_extended: u8::from(is_extended),
        language: s.language,
        unused2: 0,
        serial_number: serial,
        access_key: access,
        serial_number2: serial,
        access_key2: access,
        name: FixedText::from_str(&s.character_name).unwrap_or_default(),
        cfg: ClientConfig::from_slice(&s.remote_client_config)?,
    };
    let mut payload = cmd.to_bytes().to_vec();
    if is_extended {
        // The extended tail is opaque to the proxy; zeros are accepted.
        payload.extend_from_slice(&[0u8; 0x80]);
    }
    s.server_channel.send(0x9E, 0x01, &payload)?;
    Ok(HandlerResult::Suppress)
}

/// Latter-game server init: splice in the detector/imitator ciphers, or on
/// a resumed session re-key the upstream side and replay the saved login.
fn on_server_init_bb(
    env: &ProxyEnv,
    s: &mut ProxySession,
    data: &mut Vec<u8>,
) -> Result<HandlerResult> {
    check_size(data.len(), SERVER_INIT_BB_MIN, 0xFFFF)?;
    let cmd = decode_lax::<ServerInitBb>(data)?;
    let server_seed: BbSeed = cmd.server_key;
    let client_seed: BbSeed = cmd.client_key;

    if let Some(shared) = s.detector.clone() {
        // Resumed session: the client already keyed against our earlier
        // init, so only the upstream side re-keys, and we log in for the
        // client with the frame we captured from it.
        let mut login = s
            .login_command_bb
            .clone()
            .context("linked latter-game session has no saved login")?;
        s.server_channel.reset_ciphers(
            Some(Box::new(MultiKeyImitator::new(shared.clone(), server_seed))),
            Some(Box::new(MultiKeyImitator::new(shared, client_seed))),
        );
        if s.enable_remote_ip_crc_patch && login.len() >= 0x98 {
            write_u32_at(
                &mut login,
                BB_LOGIN_CRC_OFFSET,
                s.remote_ip_crc ^ REMOTE_IP_CRC_XOR,
            );
        }
        s.server_channel.send(0x93, 0x00, &login)?;
        return Ok(HandlerResult::Suppress);
    }

    // Fresh link: the client gets this init verbatim (still plaintext) and
    // will key itself; the detector learns which key variant it picked from
    // its first frame, and imitators on the other three directions follow.
    s.client_channel.send(0x03, 0x00, data)?;

    let shared = SharedDetectorState::new(env.bb_key_tables.clone());
    let detector = MultiKeyDetector::new(shared.clone(), BB_FIRST_FRAME.to_vec(), client_seed);
    s.client_channel.set_crypt_in(Some(Box::new(detector)));
    s.client_channel.set_crypt_out(Some(Box::new(MultiKeyImitator::new(
        shared.clone(),
        server_seed,
    ))));
    s.server_channel.reset_ciphers(
        Some(Box::new(MultiKeyImitator::new(shared.clone(), server_seed))),
        Some(Box::new(MultiKeyImitator::new(shared.clone(), client_seed))),
    );
    s.detector = Some(shared);
    Ok(HandlerResult::Suppress)
}

/// Upstream updated the client's guild-card number and config cookie.
fn on_server_04(s: &mut ProxySession, data: &mut Vec<u8>) -> Result<HandlerResult> {
    check_size(data.len(), UPDATE_CLIENT_CONFIG_MIN, 0xFFFF)?;

    let assigned = read_u32_at(data, 4).context("missing guild card number")?;
    let had_guild_card_number = s.remote_guild_card_number != 0;
    if s.remote_guild_card_number != assigned {
        s.remote_guild_card_number = assigned;
        tracing::info!(assigned, "remote guild card number set");
        s.send_text_to_client(
            0x11,
            &format!(
                "The remote server\nhas assigned your\nGuild Card number as\n\tC6{assigned}"
            ),
        )?;
    }
    let mut modified = false;
    if s.is_linked() {
        write_u32_at(data, 4, s.local_serial());
        modified = true;
    }

    // The client always copies 0x20 bytes into its config area no matter
    // how short the 04 was, so the slack picks up whatever preceded it in
    // the receive buffer; reproduce that so replayed logins match.
    let tail: &[u8; 0x20] = if had_guild_card_number {
        b"t Lobby Server. Copyright SEGA E"
    } else {
        b"t Port Map. Copyright SEGA Enter"
    };
    s.remote_client_config.copy_from_slice(tail);
    let sent = data.len().saturating_sub(8).min(0x20);
    s.remote_client_config[..sent].copy_from_slice(&data[8..8 + sent]);

    // A client that never had a guild-card number answers its first 04
    // with a checksum; the real client won't (it sent one long ago), so
    // fabricate one.
    if !had_guild_card_number {
        let checksum: u64 = rand::thread_rng().gen::<u64>() & 0x0000_FFFF_FFFF_FFFF;
        s.server_channel
            .send(0x96, 0x00, &checksum.to_le_bytes())?;
    }

    Ok(HandlerResult::modified_if(modified))
}

fn on_server_06(s: &mut ProxySession, data: &mut Vec<u8>) -> Result<HandlerResult> {
    if !s.is_linked() {
        return Ok(HandlerResult::Forward);
    }
    check_size(data.len(), TextHeader::SIZE, 0xFFFF)?;
    let changed = swap_guild_card(data, 4, s.remote_guild_card_number, s.local_serial());
    Ok(HandlerResult::modified_if(changed))
}

fn on_server_41(s: &mut ProxySession, data: &mut Vec<u8>) -> Result<HandlerResult> {
    if !s.is_linked() {
        return Ok(HandlerResult::Forward);
    }
    check_size(data.len(), 12, 0xFFFF)?;
    let remote = s.remote_guild_card_number;
    let local = s.local_serial();
    let mut changed = swap_guild_card(data, 4, remote, local);
    changed |= swap_guild_card(data, 8, remote, local);
    Ok(HandlerResult::modified_if(changed))
}

/// Mail rewriting, shared by both directions. `to_offset` is where the
/// recipient's number sits (after the variant-width sender name).
fn rewrite_mail(
    s: &mut ProxySession,
    data: &mut Vec<u8>,
    from_server: bool,
    to_offset: usize,
) -> HandlerResult {
    if !s.is_linked() {
        return HandlerResult::Forward;
    }
    let (from, to) = if from_server {
        (s.remote_guild_card_number, s.local_serial())
    } else {
        (s.local_serial(), s.remote_guild_card_number)
    };
    let mut changed = swap_guild_card(data, 4, from, to);
    changed |= swap_guild_card(data, to_offset, from, to);
    HandlerResult::modified_if(changed)
}

fn on_server_88(s: &mut ProxySession, flag: u32, data: &mut Vec<u8>) -> Result<HandlerResult> {
    if !s.is_linked() {
        return Ok(HandlerResult::Forward);
    }
    let entry_len = 12;
    check_size(data.len(), flag as usize * entry_len, flag as usize * entry_len)?;
    let mut changed = false;
    for n in 0..flag as usize {
        changed |= swap_guild_card(
            data,
            n * entry_len + 4,
            s.remote_guild_card_number,
            s.local_serial(),
        );
    }
    Ok(HandlerResult::modified_if(changed))
}

fn on_server_c4(s: &mut ProxySession, flag: u32, data: &mut Vec<u8>) -> Result<HandlerResult> {
    if !s.is_linked() {
        return Ok(HandlerResult::Forward);
    }
    let entry_len = ChoiceSearchEntryV3C4::SIZE;
    // Some servers append trailing garbage here; the client ignores it.
    check_size(data.len(), flag as usize * entry_len, 0xFFFF)?;
    let mut changed = false;
    for n in 0..flag as usize {
        changed |= swap_guild_card(
            data,
            n * entry_len,
            s.remote_guild_card_number,
            s.local_serial(),
        );
    }
    Ok(HandlerResult::modified_if(changed))
}

fn on_server_e4(s: &mut ProxySession, data: &mut Vec<u8>) -> Result<HandlerResult> {
    if !s.is_linked() {
        return Ok(HandlerResult::Forward);
    }
    let entry_len = CardLobbyEntryE4::SIZE;
    check_size(data.len(), 4 + 4 * entry_len, 0xFFFF)?;
    let mut changed = false;
    for n in 0..4 {
        changed |= swap_guild_card(
            data,
            4 + n * entry_len,
            s.remote_guild_card_number,
            s.local_serial(),
        );
    }
    Ok(HandlerResult::modified_if(changed))
}

/// A particular upstream ships a fingerprinting frame before its init; its
/// presence means reconnects and replayed logins need the CRC patch.
fn on_server_22(s: &mut ProxySession, data: &[u8]) -> Result<HandlerResult> {
    if data.len() == FINGERPRINT_22_LEN && fnv1a64(data) == FINGERPRINT_22_HASH {
        tracing::info!("enabling remote IP CRC patch");
        s.enable_remote_ip_crc_patch = true;
    }
    Ok(HandlerResult::Forward)
}

fn on_server_reconnect(
    s: &mut ProxySession,
    command: u16,
    data: &mut Vec<u8>,
) -> Result<HandlerResult> {
    // Some servers deliberately undersize this frame so the client splices
    // in bytes it already had buffered; reproduce that from the remembered
    // previous frame before parsing.
    if data.len() < s.prev_server_frame.len() {
        let start = data.len();
        let fill: Vec<u8> = s.prev_server_frame[start..].to_vec();
        data.extend_from_slice(&fill);
    }
    if data.len() < Reconnect19::SIZE {
        data.resize(Reconnect19::SIZE, 0);
    }

    if s.enable_remote_ip_crc_patch {
        s.remote_ip_crc = crc32(&data[..4]);
    }

    // The odd maximum covers the version-split form some servers send.
    check_size(data.len(), Reconnect19::SIZE, RECONNECT_MAX)?;
    let cmd = Reconnect19::from_slice(data)?;
    s.next_destination = Some((cmd.address, cmd.port));

    if !s.client_channel.is_connected() {
        tracing::warn!("reconnect with no client present");
        return Ok(HandlerResult::Suppress);
    }

    if command == 0x14 {
        // Patcher redirects are followed silently: the next upstream will
        // send a fresh init, and the client never learns it moved.
        s.server_channel.reset_ciphers(None, None);
        s.pending_silent_reconnect = true;
        return Ok(HandlerResult::Suppress);
    }

    if s.is_virtual_connection {
        // Leave the address alone so same-network checks keep passing;
        // the port alone selects the next session's variant.
        data[4..6].copy_from_slice(&s.local_port.to_le_bytes());
    } else {
        data[..4].copy_from_slice(&s.local_address);
        data[4..6].copy_from_slice(&s.local_port.to_le_bytes());
    }
    Ok(HandlerResult::MODIFIED)
}

/// Large message boxes: clients flagged as never confirming the close need
/// the confirmation faked toward upstream.
fn on_server_message_box(s: &mut ProxySession) -> Result<HandlerResult> {
    if matches!(s.version, Version::Gc | Version::Xb)
        && s.home_flags.contains(ClientFlags::NO_CLOSE_CONFIRMATION)
    {
        s.server_channel.send(0xD6, 0x00, &[])?;
    }
    Ok(HandlerResult::Forward)
}

/// Checksum request: flag 0 would trip cheat protection, so it is always
/// upgraded; seeing one at all means the client has a save here.
fn on_server_97(s: &mut ProxySession, flag: u32) -> Result<HandlerResult> {
    s.home_flags |= ClientFlags::SAVE_ENABLED;
    if flag == 0 {
        return Ok(HandlerResult::Modified {
            command: Some(0x97),
            flag: Some(0x01),
        });
    }
    Ok(HandlerResult::Forward)
}

fn on_server_64(s: &mut ProxySession, flag: u32, data: &mut Vec<u8>) -> Result<HandlerResult> {
    for p in &mut s.lobby_players {
        *p = LobbyPlayerMirror::default();
    }
    tracing::info!("cleared lobby player mirror");

    let entry_len = lobby_data_len(s.version);
    let tail_off = GAME_VARIATIONS_WORDS * 4 + 4 * entry_len;
    check_size(data.len(), tail_off + JoinGameTail::SIZE, 0xFFFF)?;

    s.lobby_client_id = data[tail_off];
    let leader = data[tail_off + 1];

    let mut changed = false;
    for x in 0..(flag as usize).min(4) {
        let base = GAME_VARIATIONS_WORDS * 4 + x * entry_len;
        if s.is_linked() {
            changed |= swap_guild_card(
                data,
                base + 4,
                s.remote_guild_card_number,
                s.local_serial(),
            );
        }
        if let Some(gc) = read_u32_at(data, base + 4) {
            s.lobby_players[x].guild_card_number = gc;
            s.lobby_players[x].name.clear();
            tracing::info!(slot = x, guild_card = gc, "added lobby player");
        }
    }
    s.update_leader(leader)?;

    if let Some(section_id) = s.override_section_id {
        data[tail_off + 6] = section_id;
        changed = true;
    }
    if let Some(event) = s.override_event {
        data[tail_off + 5] = event;
        changed = true;
    }
    if let Some(seed) = s.override_random_seed {
        write_u32_at(data, tail_off + 8, seed);
        changed = true;
    }
    Ok(HandlerResult::modified_if(changed))
}

fn lobby_name_at(version: Version, entry: &[u8]) -> String {
    let off = lobby_data_name_offset(version);
    let raw = &entry[off..off + 0x10 * if version.uses_wide_text() { 2 } else { 1 }];
    if version.uses_wide_text() {
        let units: Vec<u16> = raw
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .take_while(|&u| u != 0)
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        String::from_utf8_lossy(&raw[..end]).into_owned()
    }
}

fn on_server_65_67_68(
    s: &mut ProxySession,
    command: u16,
    flag: u32,
    data: &mut Vec<u8>,
) -> Result<HandlerResult> {
    if command == 0x67 {
        for p in &mut s.lobby_players {
            *p = LobbyPlayerMirror::default();
        }
        tracing::info!("cleared lobby player mirror");

        // Joining a lobby can permanently stop this client from sending
        // close confirmations; keep the restorable home config in step.
        if s
            .home_flags
            .contains(ClientFlags::NO_CLOSE_CONFIRMATION_AFTER_LOBBY_JOIN)
        {
            s.home_flags |= ClientFlags::NO_CLOSE_CONFIRMATION;
        }
    }

    let entry_len = join_lobby_entry_len(s.version);
    let expected = 12 + flag as usize * entry_len;
    check_size(data.len(), expected, expected)?;

    s.lobby_client_id = data[0];
    let leader = data[1];
    s.update_leader(leader)?;

    let id_off = lobby_data_client_id_offset(s.version);
    let mut changed = false;
    for x in 0..flag as usize {
        let base = 12 + x * entry_len;
        let index = read_u32_at(data, base + id_off).unwrap_or(u32::MAX) as usize;
        if index >= s.lobby_players.len() {
            tracing::warn!(index, position = x, "ignoring invalid player index");
            continue;
        }
        if s.is_linked() {
            changed |= swap_guild_card(
                data,
                base + 4,
                s.remote_guild_card_number,
                s.local_serial(),
            );
        }
        let gc = read_u32_at(data, base + 4).unwrap_or(0);
        let name = lobby_name_at(s.version, &data[base..base + entry_len]);
        s.lobby_players[index].guild_card_number = gc;
        s.lobby_players[index].name = name.clone();
        tracing::info!(slot = index, guild_card = gc, name = %name, "added lobby player");
    }

    if let Some(event) = s.override_event {
        data[6] = event;
        data[7] = 0;
        changed = true;
    }
    if let Some(number) = s.override_lobby_number {
        data[3] = number;
        changed = true;
    }
    Ok(HandlerResult::modified_if(changed))
}

fn on_server_66_69(s: &mut ProxySession, data: &mut Vec<u8>) -> Result<HandlerResult> {
    check_size(data.len(), 4, 0xFFFF)?;
    let index = data[0] as usize;
    let leader = data[1];
    match s.lobby_players.get_mut(index) {
        Some(p) => {
            *p = LobbyPlayerMirror::default();
            tracing::info!(slot = index, "removed lobby player");
        }
        None => tracing::warn!(slot = index, "leave references missing position"),
    }
    s.update_leader(leader)?;
    Ok(HandlerResult::Forward)
}

fn on_server_open_file(s: &mut ProxySession, data: &[u8]) -> Result<HandlerResult> {
    if s.save_files {
        use ragol_pkt::cmds::files::OpenFile44A6;
        check_size(data.len(), OpenFile44A6::SIZE, 0xFFFF)?;
        let cmd = decode_lax::<OpenFile44A6>(data)?;
        let filename = cmd.filename.to_string_lossy();
        s.saving_files.insert(
            filename.clone(),
            SavingFile {
                filename: filename.clone(),
                total_size: cmd.file_size,
                remaining: cmd.file_size,
                data: Vec::with_capacity(cmd.file_size as usize),
            },
        );
        tracing::info!(filename = %filename, size = cmd.file_size, "capturing file");
    }
    Ok(HandlerResult::Forward)
}

fn on_server_write_file(s: &mut ProxySession, data: &[u8]) -> Result<HandlerResult> {
    if s.save_files {
        use ragol_pkt::cmds::files::WriteFile13A7;
        check_size(data.len(), WriteFile13A7::SIZE, 0xFFFF)?;
        let cmd = decode_lax::<WriteFile13A7>(data)?;
        let filename = cmd.filename.to_string_lossy();
        let Some(sf) = s.saving_files.get_mut(&filename) else {
            tracing::warn!(filename = %filename, "chunk for a file that is not open");
            return Ok(HandlerResult::Forward);
        };
        let mut len = cmd.data_size as usize;
        if len > cmd.data.len() {
            tracing::warn!(len, "chunk size invalid; truncating");
            len = cmd.data.len();
        }
        sf.data.extend_from_slice(&cmd.data[..len]);
        sf.remaining = sf.remaining.saturating_sub(len as u32);
        if sf.remaining == 0 {
            tracing::info!(filename = %filename, "file complete");
        }
    }
    Ok(HandlerResult::Forward)
}

/// Upstream sub-commands: the only interception is armed drop requests,
/// which are answered locally on both sides instead of being relayed.
fn on_server_envelope(s: &mut ProxySession, data: &mut Vec<u8>) -> Result<HandlerResult> {
    if data.is_empty() || s.version == Version::Bb {
        return Ok(HandlerResult::Forward);
    }
    let Some(item) = s.next_drop_item.clone() else {
        return Ok(HandlerResult::Forward);
    };

    match data[0] {
        SUB_ENEMY_DROP_REQUEST => {
            check_size(data.len(), EnemyDropRequest6x60::SIZE, ENEMY_DROP_REQUEST_MAX)?;
            let req = decode_lax::<EnemyDropRequest6x60>(data)?;
            inject_drop(s, item, true, req.area, req.x, req.z, req.request_id)?;
            Ok(HandlerResult::Suppress)
        }
        SUB_BOX_DROP_REQUEST => {
            check_size(data.len(), BoxDropRequest6xA2::SIZE, 0xFFFF)?;
            let req = decode_lax::<BoxDropRequest6xA2>(data)?;
            inject_drop(s, item, false, req.area, req.x, req.z, req.request_id)?;
            Ok(HandlerResult::Suppress)
        }
        _ => Ok(HandlerResult::Forward),
    }
}

fn inject_drop(
    s: &mut ProxySession,
    mut item: ItemData,
    from_enemy: bool,
    area: u8,
    x: f32,
    z: f32,
    request_id: u16,
) -> Result<()> {
    item.item_id = s.next_item_id;
    s.next_item_id += 1;
    s.next_drop_item = None;

    let cmd = DropItem6x5F {
        header: SubcommandHeader {
            subcommand: SUB_DROP_ITEM,
            size_words: (DropItem6x5F::SIZE / 4) as u8,
            params: 0,
        },
        area,
        from_enemy: u8::from(from_enemy),
        request_id,
        x,
        z,
        unused: 0,
        item,
    };
    let payload = cmd.to_bytes();
    s.server_channel.send(0x60, 0x00, &payload)?;
    s.client_channel.send(0x60, 0x00, &payload)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// client-side dispatch

fn handle_client_frame(
    env: &ProxyEnv,
    s: &mut ProxySession,
    command: u16,
    _flag: u32,
    data: &mut Vec<u8>,
) -> Result<HandlerResult> {
    use Version::*;
    match (s.version, command) {
        (Patch, _) => Ok(HandlerResult::Forward),
        (Bb, 0x93) => {
            // Keep the login around; it gets replayed whenever the upstream
            // redirects us and opens a fresh handshake.
            s.login_command_bb = Some(data.clone());
            Ok(HandlerResult::Forward)
        }
        (Dc | Pc | Gc | Xb, 0x93 | 0x9D | 0x9E) => on_client_login(s, command, data),
        (_, 0x06) => on_client_06(s, data),
        (_, 0x40) => on_client_40(s, data),
        (Dc | Gc | Xb, 0x81) => Ok(rewrite_mail(s, data, false, 0x18)),
        (Pc | Bb, 0x81) => Ok(rewrite_mail(s, data, false, 0x28)),
        (Dc | Pc | Gc | Xb, 0xA0 | 0xA1) => on_client_a0_a1(env, s),
        (v, c) if is_envelope(c) && v != Patch => on_client_envelope(s, data),
        _ => Ok(HandlerResult::Forward),
    }
}

/// Unlinked clients log in to the upstream themselves; remember how they
/// identified so a later linked reconnect can be answered in their stead.
fn on_client_login(
    s: &mut ProxySession,
    command: u16,
    data: &mut Vec<u8>,
) -> Result<HandlerResult> {
    match command {
        0x93 => {
            if let Ok(cmd) = decode_lax::<LoginV1Dc93>(data) {
                s.sub_version = cmd.sub_version;
                s.language = cmd.language;
                s.character_name = cmd.name.to_string_lossy();
            }
        }
        _ => {
            if let Ok(cmd) = decode_lax::<Login9D>(data) {
                s.sub_version = cmd.sub_version;
                s.language = cmd.language;
                s.character_name = cmd.name.to_string_lossy();
            }
        }
    }
    Ok(HandlerResult::Forward)
}

fn decode_client_chat(version: Version, data: &[u8]) -> Option<String> {
    if data.len() < 12 {
        return None;
    }
    let body = &data[TextHeader::SIZE..];
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
    Some(text)
}

fn on_client_06(s: &mut ProxySession, data: &mut Vec<u8>) -> Result<HandlerResult> {
    let Some(text) = decode_client_chat(s.version, data) else {
        return Ok(HandlerResult::Forward);
    };
    let bare = ragol_pkt::text::remove_language_marker(&text);
    if bare.is_empty() {
        return Ok(HandlerResult::Suppress);
    }

    if bare.starts_with('$') {
        if let Some(literal) = bare.strip_prefix("$$") {
            // Escaped: send the literal line onward as ordinary chat.
            let mut pw = PacketWriter::new();
            TextHeader {
                unused: 0,
                guild_card_number: 0,
            }
            .encode(&mut pw)?;
            pw.write_slice(&encode_text(s.version, &format!("${literal}")));
            s.server_channel.send(0x06, 0x00, pw.as_slice())?;
            return Ok(HandlerResult::Suppress);
        }
        handle_proxy_chat_command(s, bare.trim_start_matches('$').to_string())?;
        return Ok(HandlerResult::Suppress);
    }

    if s.enable_chat_filter {
        // Scrub control bytes in place; the escape prefix (tab) survives.
        let mut changed = false;
        for b in data[TextHeader::SIZE..].iter_mut() {
            if *b < 0x20 && *b != 0 && *b != b'\t' {
                *b = b' ';
                changed = true;
            }
        }
        return Ok(HandlerResult::modified_if(changed));
    }
    Ok(HandlerResult::Forward)
}

/// Proxy-side chat commands toggle session behavior without upstream ever
/// seeing the line. Unknown commands get a local error message.
fn handle_proxy_chat_command(s: &mut ProxySession, line: String) -> Result<()> {
    let (name, _arg) = match line.split_once(' ') {
        Some((n, a)) => (n, Some(a)),
        None => (line.as_str(), None),
    };
    match name {
        "infhp" => {
            s.infinite_hp = !s.infinite_hp;
            let state = if s.infinite_hp { "on" } else { "off" };
            s.send_text_to_client(0xB0, &format!("$infhp {state}"))?;
        }
        "inftp" => {
            s.infinite_tp = !s.infinite_tp;
            let state = if s.infinite_tp { "on" } else { "off" };
            s.send_text_to_client(0xB0, &format!("$inftp {state}"))?;
        }
        "swa" => {
            s.switch_assist = !s.switch_assist;
            let state = if s.switch_assist { "on" } else { "off" };
            s.send_text_to_client(0xB0, &format!("$swa {state}"))?;
        }
        _ => s.send_text_to_client(0xB0, "\tC4Unknown command")?,
    }
    Ok(())
}

fn on_client_40(s: &mut ProxySession, data: &mut Vec<u8>) -> Result<HandlerResult> {
    if !s.is_linked() {
        return Ok(HandlerResult::Forward);
    }
    check_size(data.len(), 12, 0xFFFF)?;
    let local = s.local_serial();
    let remote = s.remote_guild_card_number;
    let mut changed = swap_guild_card(data, 4, local, remote);
    changed |= swap_guild_card(data, 8, local, remote);
    Ok(HandlerResult::modified_if(changed))
}

fn on_client_envelope(s: &mut ProxySession, data: &mut Vec<u8>) -> Result<HandlerResult> {
    let mut changed = false;
    if s.is_linked() && !data.is_empty() && data[0] == SUB_GUILD_CARD {
        // Guild-card exchange carries the sender's number inside the
        // sub-command; the upstream must see its own assignment.
        let offset = if s.version == Version::Bb { 4 } else { 8 };
        changed = swap_guild_card(data, offset, s.local_serial(), s.remote_guild_card_number);
    }

    if !data.is_empty() {
        match data[0] {
            SUB_ENEMY_HIT | SUB_PLAYER_HIT if s.infinite_hp => {
                let chain = build_stats_change(s.lobby_client_id, StatsChange::AddHp, 1020);
                s.client_channel.send(0x60, 0x00, &chain)?;
            }
            SUB_USE_TECHNIQUE if s.infinite_tp => {
                let chain = build_stats_change(s.lobby_client_id, StatsChange::AddTp, 0xFF);
                s.client_channel.send(0x60, 0x00, &chain)?;
            }
            SUB_SWITCH_STATE if s.switch_assist => {
                if data.len() >= SwitchStateChanged6x05::SIZE {
                    let cmd = decode_lax::<SwitchStateChanged6x05>(data)?;
                    if cmd.enabled != 0 && cmd.switch_id != 0xFFFF {
                        if let Some(last) = s.last_switch_enabled.clone() {
                            if last.header.subcommand == SUB_SWITCH_STATE {
                                tracing::info!("switch assist: replaying previous enable");
                                let bytes = last.to_bytes();
                                s.server_channel.send(0x60, 0x00, &bytes)?;
                                s.client_channel.send(0x60, 0x00, &bytes)?;
                            }
                        }
                        s.last_switch_enabled = Some(cmd);
                    }
                }
            }
            _ => {}
        }
    }
    Ok(HandlerResult::modified_if(changed))
}

/// Ship/block select while linked: instead of letting the client wander the
/// remote menus, dissolve the mirrored lobby, restore the home config, and
/// send the client back to the home server. Upstream never hears about it.
fn on_client_a0_a1(env: &ProxyEnv, s: &mut ProxySession) -> Result<HandlerResult> {
    if !s.is_linked() {
        return Ok(HandlerResult::Forward);
    }

    // Every mirrored peer leaves, from the client's point of view; the
    // client itself stays (and becomes the leader of its empty lobby).
    for x in 0..s.lobby_players.len() {
        if s.lobby_players[x].guild_card_number == 0 || x as u8 == s.lobby_client_id {
            continue;
        }
        let cmd = [x as u8, s.lobby_client_id, 0, 0];
        s.client_channel.send(0x69, x as u32, &cmd)?;
    }

    let name = env.config.server_name.clone();
    s.send_text_to_client(0x11, &format!("You've returned to\n\tC6{name}"))?;

    // Restore the home config so the login server sees the client's flags.
    let mut pw = PacketWriter::new();
    pw.write_u32(PLAYER_TAG);
    pw.write_u32(s.local_serial());
    let mut cfg = s.home_config.clone();
    cfg.flags = s.home_flags.bits();
    cfg.encode(&mut pw)?;
    s.client_channel.send(0x04, 0x00, pw.as_slice())?;

    let address = if s.is_virtual_connection {
        s.next_destination
            .map(|(a, _)| a)
            .context("virtual connection with no destination")?
    } else {
        s.local_address
    };
    let cmd = Reconnect19 {
        address,
        port: env.config.login_port(s.version),
        unused: 0,
    };
    s.client_channel.send(0x19, 0x00, &cmd.to_bytes())?;
    Ok(HandlerResult::Suppress)
}
