//! The Channel: one framed, encrypted, bidirectional byte stream bound to a
//! single endpoint. It owns the two cipher halves and the receive buffer;
//! it never interprets payloads. Framing and encryption are one step: the
//! whole padded frame is what the cipher sees.

use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};
use ragol_crypto::PsoCipher;
use ragol_pkt::Version;

use crate::frame::{encode_frame, padded_len, Frame, FrameHeader};
use crate::{NetError, NetResult};

pub type CipherBox = Box<dyn PsoCipher>;

#[derive(Debug, Clone, Copy)]
struct Pending {
    header: FrameHeader,
    /// Padded on-wire length of the frame being awaited.
    total: usize,
}

pub struct Channel {
    version: Version,
    crypt_in: Option<CipherBox>,
    crypt_out: Option<CipherBox>,
    recv_buffer: BytesMut,
    /// Set once a header block has been decrypted but its body has not yet
    /// fully arrived; the header bytes in `recv_buffer` are already
    /// plaintext at that point and must not be decrypted twice.
    pending: Option<Pending>,
    outbound: VecDeque<Bytes>,
    connected: bool,
}

impl Channel {
    pub fn new(version: Version) -> Self {
        Self {
            version,
            crypt_in: None,
            crypt_out: None,
            recv_buffer: BytesMut::new(),
            pending: None,
            outbound: VecDeque::new(),
            connected: true,
        }
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Marks the channel dead. Pending sends are dropped.
    pub fn disconnect(&mut self) {
        self.connected = false;
        self.outbound.clear();
    }

    pub fn set_crypt_in(&mut self, cipher: Option<CipherBox>) {
        self.crypt_in = cipher;
    }

    pub fn set_crypt_out(&mut self, cipher: Option<CipherBox>) {
        self.crypt_out = cipher;
    }

    /// Replaces both cipher halves at once. Callers must only do this on a
    /// frame boundary, which in practice means from within the handler of
    /// the frame that carried the key material.
    pub fn reset_ciphers(&mut self, crypt_in: Option<CipherBox>, crypt_out: Option<CipherBox>) {
        self.crypt_in = crypt_in;
        self.crypt_out = crypt_out;
    }

    /// Clears buffered and half-decoded input. Used when the peer socket is
    /// replaced under the channel (silent patcher redirects).
    pub fn reset_stream(&mut self) {
        self.recv_buffer.clear();
        self.pending = None;
        self.connected = true;
    }

    /// Frames, pads, encrypts and enqueues one command.
    pub fn send(&mut self, command: u16, flag: u32, payload: &[u8]) -> NetResult<()> {
        if !self.connected {
            return Err(NetError::Disconnected);
        }
        let frame = encode_frame(self.version, command, flag, payload)?;
        let frame = match self.crypt_out.as_mut() {
            Some(cipher) => {
                let mut buf = BytesMut::from(&frame[..]);
                cipher.encrypt(&mut buf)?;
                buf.freeze()
            }
            None => frame,
        };
        self.outbound.push_back(frame);
        Ok(())
    }

    /// Takes everything queued for the socket.
    pub fn take_outbound(&mut self) -> Vec<Bytes> {
        self.outbound.drain(..).collect()
    }

    pub fn has_outbound(&self) -> bool {
        !self.outbound.is_empty()
    }

    /// Appends received bytes and yields every frame that is now complete.
    /// Short reads yield nothing and consume nothing beyond buffering; a
    /// malformed size field or a cipher failure is fatal for the channel.
    pub fn drain_incoming(&mut self, data: &[u8]) -> NetResult<Vec<Frame>> {
        self.recv_buffer.extend_from_slice(data);
        let mut frames = Vec::new();
        loop {
            let pending = match self.pending {
                Some(p) => p,
                None => {
                    let header_len = self.version.header_len();
                    if self.recv_buffer.len() < header_len {
                        break;
                    }
                    // The header is exactly one cipher block on every
                    // variant, so it can be decrypted ahead of the body.
                    if let Some(cipher) = self.crypt_in.as_mut() {
                        cipher.decrypt(&mut self.recv_buffer[..header_len])?;
                    }
                    let header = FrameHeader::decode(self.version, &self.recv_buffer)?;
                    let pending = Pending {
                        header,
                        total: padded_len(self.version, header.size),
                    };
                    self.pending = Some(pending);
                    pending
                }
            };

            if self.recv_buffer.len() < pending.total {
                break;
            }
            let header_len = self.version.header_len();
            if let Some(cipher) = self.crypt_in.as_mut() {
                cipher.decrypt(&mut self.recv_buffer[header_len..pending.total])?;
            }
            let frame_bytes = self.recv_buffer.split_to(pending.total).freeze();
            self.pending = None;
            frames.push(Frame {
                command: pending.header.command,
                flag: pending.header.flag,
                payload: frame_bytes.slice(header_len..pending.header.size),
            });
        }
        Ok(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragol_crypto::{V2Cipher, V3Cipher};

    fn paired(version: Version, key_a: u32, key_b: u32) -> (Channel, Channel) {
        let mut server = Channel::new(version);
        let mut client = Channel::new(version);
        if version.uses_v3_cipher() {
            server.reset_ciphers(
                Some(Box::new(V3Cipher::new(key_a))),
                Some(Box::new(V3Cipher::new(key_b))),
            );
            client.reset_ciphers(
                Some(Box::new(V3Cipher::new(key_b))),
                Some(Box::new(V3Cipher::new(key_a))),
            );
        } else {
            server.reset_ciphers(
                Some(Box::new(V2Cipher::new(key_a))),
                Some(Box::new(V2Cipher::new(key_b))),
            );
            client.reset_ciphers(
                Some(Box::new(V2Cipher::new(key_b))),
                Some(Box::new(V2Cipher::new(key_a))),
            );
        }
        (server, client)
    }

    #[test]
    fn encrypted_round_trip() {
        let (mut server, mut client) = paired(Version::Gc, 1, 2);

        server.send(0x11, 0x00, b"hello!!").unwrap();
        server.send(0x60, 0x03, &[9, 9, 9, 9]).unwrap();
        let wire: Vec<u8> = server
            .take_outbound()
            .iter()
            .flat_map(|b| b.to_vec())
            .collect();

        let frames = client.drain_incoming(&wire).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].command, 0x11);
        assert_eq!(&frames[0].payload[..], b"hello!!");
        assert_eq!(frames[1].command, 0x60);
        assert_eq!(frames[1].flag, 0x03);
    }

    #[test]
    fn byte_at_a_time_delivery() {
        let (mut server, mut client) = paired(Version::Pc, 7, 8);
        server.send(0x06, 0x00, b"chat message\0\0").unwrap();
        let wire: Vec<u8> = server
            .take_outbound()
            .iter()
            .flat_map(|b| b.to_vec())
            .collect();

        let mut frames = Vec::new();
        for byte in wire {
            frames.extend(client.drain_incoming(&[byte]).unwrap());
        }
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].command, 0x06);
    }

    #[test]
    fn plaintext_until_ciphers_installed() {
        let mut server = Channel::new(Version::Dc);
        let mut client = Channel::new(Version::Dc);

        // Server-init goes out before any cipher exists.
        server.send(0x17, 0x00, &[0u8; 8]).unwrap();
        let wire = server.take_outbound();
        let frames = client.drain_incoming(&wire[0]).unwrap();
        assert_eq!(frames[0].command, 0x17);

        // Splice ciphers in and keep talking.
        server.set_crypt_out(Some(Box::new(V2Cipher::new(0x55))));
        client.set_crypt_in(Some(Box::new(V2Cipher::new(0x55))));
        server.send(0x04, 0x00, &[1, 2, 3, 4]).unwrap();
        let wire = server.take_outbound();
        let frames = client.drain_incoming(&wire[0]).unwrap();
        assert_eq!(frames[0].command, 0x04);
        assert_eq!(&frames[0].payload[..], &[1, 2, 3, 4]);
    }

    #[test]
    fn bb_framing_uses_wide_header() {
        let mut ch = Channel::new(Version::Bb);
        ch.send(0x01EB, 0x0000_0002, &[0u8; 4]).unwrap();
        let wire = ch.take_outbound();
        // 8 header + 4 payload, padded to 16.
        assert_eq!(wire[0].len(), 16);

        let mut peer = Channel::new(Version::Bb);
        let frames = peer.drain_incoming(&wire[0]).unwrap();
        assert_eq!(frames[0].command, 0x01EB);
        assert_eq!(frames[0].flag, 2);
    }

    #[test]
    fn disconnect_drops_sends() {
        let mut ch = Channel::new(Version::Dc);
        ch.send(0x11, 0, &[]).unwrap();
        ch.disconnect();
        assert!(matches!(ch.send(0x11, 0, &[]), Err(NetError::Disconnected)));
        assert!(ch.take_outbound().is_empty());
    }

    #[test]
    fn bad_size_is_fatal() {
        let mut ch = Channel::new(Version::Dc);
        // size field (2) smaller than the header.
        let err = ch.drain_incoming(&[0x60, 0x00, 0x02, 0x00]).unwrap_err();
        assert!(matches!(err, NetError::FrameSize(2)));
    }
}
