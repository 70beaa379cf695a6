//! End-to-end proxy pipeline tests over in-memory channels. Channels carry
//! no ciphers unless a test installs them, so frames on the wire are
//! plaintext and can be decoded directly.

use std::sync::Arc;

use ragol_crypto::{BbCipher, BbKeyTable, MultiKeyDetector, PsoCipher, SharedDetectorState};
use ragol_net::frame::{encode_frame, FrameHeader};
use ragol_pkt::cmds::login::{ClientConfig, UpdateClientConfig04};
use ragol_pkt::cmds::reconnect::Reconnect19;
use ragol_pkt::cmds::search::GuildCardSearch40;
use ragol_pkt::cmds::PLAYER_TAG;
use ragol_pkt::{DecodeRecord, EncodeRecord, Version};
use ragol_srv::config::Config;
use ragol_srv::proxy::{process_frame, LobbyPlayerMirror, ProxyEnv, ProxySession, BB_FIRST_FRAME};
use ragol_srv::License;

const LOCAL_SERIAL: u32 = 2000;
const REMOTE_SERIAL: u32 = 55555;

fn env() -> ProxyEnv {
    ProxyEnv {
        config: Config::default(),
        bb_key_tables: Vec::new(),
    }
}

fn linked_session(version: Version) -> ProxySession {
    ProxySession::new(
        version,
        Some(Arc::new(License {
            serial_number: LOCAL_SERIAL,
            access_key: "aaaaaaaa".into(),
            gc_password: None,
        })),
        [10, 0, 0, 1],
        5100,
    )
}

/// Decodes every queued outbound frame of a plaintext channel.
fn decode_outbound(version: Version, chunks: Vec<bytes::Bytes>) -> Vec<(u16, u32, Vec<u8>)> {
    chunks
        .iter()
        .map(|chunk| {
            let hdr = FrameHeader::decode(version, chunk).unwrap();
            (
                hdr.command,
                hdr.flag,
                chunk[version.header_len()..hdr.size].to_vec(),
            )
        })
        .collect()
}

/// Tells the session its remote guild-card number via an upstream 04.
fn assign_remote_number(env: &ProxyEnv, s: &mut ProxySession) {
    let cmd = UpdateClientConfig04 {
        player_tag: PLAYER_TAG,
        guild_card_number: REMOTE_SERIAL,
        cfg: ClientConfig {
            magic: 0,
            game_state: 0,
            player_index: 0,
            flags: 0,
            unused: [0; 5],
        },
    };
    process_frame(env, s, true, 0x04, 0, cmd.to_bytes().to_vec()).unwrap();
}

#[test]
fn identity_hidden_in_both_directions() {
    let env = env();
    let mut s = linked_session(Version::Gc);
    assign_remote_number(&env, &mut s);

    // The client must see its own serial in the 04, not the remote one,
    // plus a notification message about the assignment.
    let to_client = decode_outbound(Version::Gc, s.client_channel.take_outbound());
    let cfg_frame = to_client.iter().find(|f| f.0 == 0x04).expect("04 frame");
    let cfg = UpdateClientConfig04::from_slice(&cfg_frame.2).unwrap();
    assert_eq!(cfg.guild_card_number, LOCAL_SERIAL);
    assert!(to_client.iter().any(|f| f.0 == 0x11));

    // The proxy fabricates the first-04 checksum reply upstream.
    let to_server = decode_outbound(Version::Gc, s.server_channel.take_outbound());
    assert!(to_server.iter().any(|f| f.0 == 0x96));

    // Server personal-info (06) carrying the remote number: rewritten.
    let mut payload = Vec::new();
    payload.extend_from_slice(&0u32.to_le_bytes());
    payload.extend_from_slice(&REMOTE_SERIAL.to_le_bytes());
    payload.extend_from_slice(b"info\0\0\0\0");
    process_frame(&env, &mut s, true, 0x06, 0, payload).unwrap();

    let to_client = decode_outbound(Version::Gc, s.client_channel.take_outbound());
    let info = to_client.iter().find(|f| f.0 == 0x06).expect("06 frame");
    assert_eq!(
        u32::from_le_bytes(info.2[4..8].try_into().unwrap()),
        LOCAL_SERIAL
    );

    // Client search (40) carrying the local serial twice: both rewritten.
    let search = GuildCardSearch40 {
        player_tag: PLAYER_TAG,
        searcher_guild_card_number: LOCAL_SERIAL,
        target_guild_card_number: LOCAL_SERIAL,
    };
    process_frame(&env, &mut s, false, 0x40, 0, search.to_bytes().to_vec()).unwrap();

    let to_server = decode_outbound(Version::Gc, s.server_channel.take_outbound());
    let fwd = to_server.iter().find(|f| f.0 == 0x40).expect("40 frame");
    let fwd = GuildCardSearch40::from_slice(&fwd.2).unwrap();
    assert_eq!(fwd.searcher_guild_card_number, REMOTE_SERIAL);
    assert_eq!(fwd.target_guild_card_number, REMOTE_SERIAL);
}

#[test]
fn short_reconnect_spliced_from_previous_frame() {
    let env = env();
    let mut s = linked_session(Version::Gc);

    // A 36-byte server frame whose payload ends in 01 02 03 04.
    let mut b1 = vec![0xEEu8; 36];
    b1[32..].copy_from_slice(&[0x01, 0x02, 0x03, 0x04]);
    process_frame(&env, &mut s, true, 0xB1, 0, b1).unwrap();
    s.client_channel.take_outbound();

    // The upstream sends a deliberately undersized 19: only the address.
    let short = vec![192, 168, 9, 9];
    process_frame(&env, &mut s, true, 0x19, 0, short).unwrap();

    // Port and slack were filled from the remembered frame tail.
    assert_eq!(
        s.next_destination,
        Some(([192, 168, 9, 9], u16::from_le_bytes([0x01, 0x02])))
    );

    // What the client sees points at the proxy instead.
    let to_client = decode_outbound(Version::Gc, s.client_channel.take_outbound());
    let reconnect = to_client.iter().find(|f| f.0 == 0x19).expect("19 frame");
    let cmd = Reconnect19::from_slice(&reconnect.2).unwrap();
    assert_eq!(cmd.address, [10, 0, 0, 1]);
    assert_eq!(cmd.port, 5100);
}

#[test]
fn return_to_home_dissolves_lobby_and_redirects() {
    let env = env();
    let mut s = linked_session(Version::Gc);
    assign_remote_number(&env, &mut s);
    s.client_channel.take_outbound();
    s.server_channel.take_outbound();

    // Three-player lobby mirror; this client sits in slot 1.
    s.lobby_client_id = 1;
    s.lobby_players[0] = LobbyPlayerMirror {
        guild_card_number: 777,
        name: "a".into(),
    };
    s.lobby_players[1] = LobbyPlayerMirror {
        guild_card_number: LOCAL_SERIAL,
        name: "me".into(),
    };
    s.lobby_players[2] = LobbyPlayerMirror {
        guild_card_number: 888,
        name: "b".into(),
    };

    process_frame(&env, &mut s, false, 0xA0, 0, Vec::new()).unwrap();

    // Upstream hears nothing.
    assert!(s.server_channel.take_outbound().is_empty());

    let to_client = decode_outbound(Version::Gc, s.client_channel.take_outbound());
    let leaves: Vec<_> = to_client.iter().filter(|f| f.0 == 0x69).collect();
    assert_eq!(leaves.len(), 2);
    assert_eq!(leaves[0].2[0], 0); // slot 0 departs
    assert_eq!(leaves[1].2[0], 2); // slot 2 departs
    assert_eq!(leaves[0].2[1], 1); // this client leads what remains

    assert!(to_client.iter().any(|f| f.0 == 0x11));

    let cfg = to_client.iter().find(|f| f.0 == 0x04).expect("04 frame");
    assert_eq!(
        u32::from_le_bytes(cfg.2[4..8].try_into().unwrap()),
        LOCAL_SERIAL
    );

    let reconnect = to_client.iter().find(|f| f.0 == 0x19).expect("19 frame");
    let cmd = Reconnect19::from_slice(&reconnect.2).unwrap();
    assert_eq!(cmd.address, [10, 0, 0, 1]);
    assert_eq!(cmd.port, env.config.console_login_port);
}

fn test_table(fill: u8) -> Arc<BbKeyTable> {
    let mut bytes = [0u8; 1024];
    for (i, b) in bytes.iter_mut().enumerate() {
        *b = fill.wrapping_mul(31).wrapping_add(i as u8);
    }
    Arc::new(BbKeyTable::from_bytes(&bytes).unwrap())
}

/// Latter-game splicing: the init passes through in plaintext, the client's
/// first encrypted frame locks the detector, and the upstream copy of that
/// frame is encrypted with the locked key family.
#[test]
fn bb_init_splice_and_key_detection() {
    let tables = vec![test_table(1), test_table(2), test_table(3)];
    let env = ProxyEnv {
        config: Config::default(),
        bb_key_tables: tables.clone(),
    };
    let mut s = ProxySession::new(Version::Bb, None, [10, 0, 0, 1], 5103);

    let init = ragol_pkt::cmds::init::ServerInitBb {
        copyright: ragol_pkt::FixedText::from_str("init").unwrap(),
        server_key: [7; 48],
        client_key: [9; 48],
        after_message: ragol_pkt::FixedText::default(),
    };
    process_frame(&env, &mut s, true, 0x03, 0, init.to_bytes().to_vec()).unwrap();

    // The client received the init verbatim and unencrypted.
    let to_client = s.client_channel.take_outbound();
    let hdr = FrameHeader::decode(Version::Bb, &to_client[0]).unwrap();
    assert_eq!(hdr.command, 0x03);

    // The client picks the second candidate key and logs in.
    let mut client_cipher = BbCipher::new(tables[1].clone(), &[9; 48]);
    let login_payload = vec![0u8; 0xAC];
    let mut wire = encode_frame(Version::Bb, 0x93, 0, &login_payload)
        .unwrap()
        .to_vec();
    assert_eq!(&wire[..8], &BB_FIRST_FRAME);
    client_cipher.encrypt(&mut wire).unwrap();

    let frames = s.client_channel.drain_incoming(&wire).unwrap();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].command, 0x93);
    process_frame(
        &env,
        &mut s,
        false,
        frames[0].command,
        frames[0].flag,
        frames[0].payload.to_vec(),
    )
    .unwrap();

    // The login was captured for later replays and forwarded upstream,
    // encrypted so the upstream's client-key cipher can read it.
    assert!(s.login_command_bb.is_some());
    let mut upstream = s.server_channel.take_outbound()[0].to_vec();
    let mut upstream_cipher = BbCipher::new(tables[1].clone(), &[9; 48]);
    upstream_cipher.decrypt(&mut upstream).unwrap();
    assert_eq!(&upstream[..8], &BB_FIRST_FRAME);
}

/// Resumed latter-game session: the saved login is replayed with the
/// remote-IP CRC patched in at its fixed offset.
#[test]
fn bb_resumed_session_replays_patched_login() {
    let tables = vec![test_table(4)];
    let env = ProxyEnv {
        config: Config::default(),
        bb_key_tables: tables.clone(),
    };
    let mut s = ProxySession::new(Version::Bb, None, [10, 0, 0, 1], 5103);

    // Lock a detector the way an earlier connection would have.
    let shared = SharedDetectorState::new(tables.clone());
    let mut detector = MultiKeyDetector::new(shared.clone(), BB_FIRST_FRAME.to_vec(), [1; 48]);
    let mut first = BB_FIRST_FRAME;
    let mut c = BbCipher::new(tables[0].clone(), &[1; 48]);
    c.encrypt(&mut first).unwrap();
    detector.decrypt(&mut first).unwrap();

    s.detector = Some(shared);
    s.login_command_bb = Some(vec![0u8; 0xAC]);
    s.enable_remote_ip_crc_patch = true;
    s.remote_ip_crc = 0x1234_5678;

    let init = ragol_pkt::cmds::init::ServerInitBb {
        copyright: ragol_pkt::FixedText::from_str("init").unwrap(),
        server_key: [2; 48],
        client_key: [3; 48],
        after_message: ragol_pkt::FixedText::default(),
    };
    process_frame(&env, &mut s, true, 0x03, 0, init.to_bytes().to_vec()).unwrap();

    // Nothing goes to the client; the replayed login goes upstream under
    // the client-key imitator.
    assert!(s.client_channel.take_outbound().is_empty());
    let mut upstream = s.server_channel.take_outbound()[0].to_vec();
    let mut upstream_cipher = BbCipher::new(tables[0].clone(), &[3; 48]);
    upstream_cipher.decrypt(&mut upstream).unwrap();

    let hdr = FrameHeader::decode(Version::Bb, &upstream).unwrap();
    assert_eq!(hdr.command, 0x93);
    let payload = &upstream[8..hdr.size];
    let patched = u32::from_le_bytes(payload[0x94..0x98].try_into().unwrap());
    assert_eq!(patched, 0x1234_5678 ^ (1_309_539_928u32.wrapping_add(1_248_334_810)));
}

/// The countermeasure fingerprint frame flips the session flag; ordinary
/// frames of the same size do not.
#[test]
fn fingerprint_frame_detected_by_hash() {
    let env = env();
    let mut s = ProxySession::new(Version::Bb, None, [10, 0, 0, 1], 5103);

    process_frame(&env, &mut s, true, 0x22, 0, vec![0u8; 0x2C]).unwrap();
    assert!(!s.enable_remote_ip_crc_patch);
}
