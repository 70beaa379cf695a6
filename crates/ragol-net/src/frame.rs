//! Command framing. Every frame is a header (whose layout depends on the
//! variant), a payload, and zero padding up to the variant's alignment. The
//! size field counts header plus payload, excluding the padding, and the
//! whole padded frame is what gets encrypted.

use bytes::{BufMut, Bytes, BytesMut};
use ragol_pkt::Version;

use crate::{NetError, NetResult};

/// Upper bound on the size field of any frame.
pub const MAX_FRAME_LEN: usize = 0xFFFF;

/// A decoded command frame. `flag` is a u8 on everything except the
/// latter-game variant, which widens it to a u32.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: u16,
    pub flag: u32,
    pub payload: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub command: u16,
    pub flag: u32,
    /// Header + payload length, pre-padding.
    pub size: usize,
}

impl FrameHeader {
    pub fn decode(version: Version, data: &[u8]) -> NetResult<Self> {
        debug_assert!(data.len() >= version.header_len());
        let hdr = match version {
            Version::Dc | Version::Gc | Version::Xb => Self {
                command: u16::from(data[0]),
                flag: u32::from(data[1]),
                size: usize::from(u16::from_le_bytes([data[2], data[3]])),
            },
            Version::Pc | Version::Patch => Self {
                command: u16::from(data[2]),
                flag: u32::from(data[3]),
                size: usize::from(u16::from_le_bytes([data[0], data[1]])),
            },
            Version::Bb => Self {
                command: u16::from_le_bytes([data[2], data[3]]),
                flag: u32::from_le_bytes([data[4], data[5], data[6], data[7]]),
                size: usize::from(u16::from_le_bytes([data[0], data[1]])),
            },
        };
        if hdr.size < version.header_len() || hdr.size > MAX_FRAME_LEN {
            return Err(NetError::FrameSize(hdr.size));
        }
        Ok(hdr)
    }

    pub fn encode(&self, version: Version, out: &mut BytesMut) {
        let size = self.size as u16;
        match version {
            Version::Dc | Version::Gc | Version::Xb => {
                out.put_u8(self.command as u8);
                out.put_u8(self.flag as u8);
                out.put_u16_le(size);
            }
            Version::Pc | Version::Patch => {
                out.put_u16_le(size);
                out.put_u8(self.command as u8);
                out.put_u8(self.flag as u8);
            }
            Version::Bb => {
                out.put_u16_le(size);
                out.put_u16_le(self.command);
                out.put_u32_le(self.flag);
            }
        }
    }
}

/// Padded length of a frame whose size field is `size`.
pub fn padded_len(version: Version, size: usize) -> usize {
    let align = version.frame_align();
    (size + align - 1) & !(align - 1)
}

/// Builds one unencrypted frame: header, payload, padding.
pub fn encode_frame(version: Version, command: u16, flag: u32, payload: &[u8]) -> NetResult<Bytes> {
    let size = version.header_len() + payload.len();
    if size > MAX_FRAME_LEN {
        return Err(NetError::FrameSize(size));
    }
    let total = padded_len(version, size);
    let mut out = BytesMut::with_capacity(total);
    FrameHeader {
        command,
        flag,
        size,
    }
    .encode(version, &mut out);
    out.put_slice(payload);
    out.resize(total, 0);
    Ok(out.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn header_layouts() {
        let hdr = FrameHeader {
            command: 0x19,
            flag: 0x05,
            size: 12,
        };

        let mut dc = BytesMut::new();
        hdr.encode(Version::Dc, &mut dc);
        assert_eq!(&dc[..], &[0x19, 0x05, 0x0C, 0x00]);

        let mut pc = BytesMut::new();
        hdr.encode(Version::Pc, &mut pc);
        assert_eq!(&pc[..], &[0x0C, 0x00, 0x19, 0x05]);

        let mut bb = BytesMut::new();
        hdr.encode(Version::Bb, &mut bb);
        assert_eq!(&bb[..], &[0x0C, 0x00, 0x19, 0x00, 0x05, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn size_field_excludes_padding() {
        let frame = encode_frame(Version::Gc, 0x60, 0, &[1, 2, 3, 4, 5]).unwrap();
        // 4 header + 5 payload = 9, padded to 12.
        assert_eq!(frame.len(), 12);
        let hdr = FrameHeader::decode(Version::Gc, &frame).unwrap();
        assert_eq!(hdr.size, 9);
    }

    #[test]
    fn bb_pads_to_eight() {
        let frame = encode_frame(Version::Bb, 0x93, 0, &[0u8; 0xAC]).unwrap();
        assert_eq!(frame.len(), 0xB4);
        let hdr = FrameHeader::decode(Version::Bb, &frame).unwrap();
        assert_eq!(hdr.size, 0xB4);

        let odd = encode_frame(Version::Bb, 0x10, 0, &[0u8; 3]).unwrap();
        assert_eq!(odd.len(), 16);
    }

    #[test]
    fn undersized_size_field_is_fatal() {
        let data = [0x02u8, 0x00, 0x02, 0x00];
        assert!(matches!(
            FrameHeader::decode(Version::Dc, &data),
            Err(NetError::FrameSize(2))
        ));
    }

    proptest! {
        #[test]
        fn header_round_trip(
            version_idx in 0usize..6,
            command in 0u16..=0xFF,
            flag in 0u32..=0xFF,
            payload_len in 0usize..64,
        ) {
            let version = Version::ALL[version_idx];
            let payload = vec![0xABu8; payload_len];
            let frame = encode_frame(version, command, flag, &payload).unwrap();
            prop_assert_eq!(frame.len() % version.frame_align(), 0);

            let hdr = FrameHeader::decode(version, &frame).unwrap();
            prop_assert_eq!(hdr.command, command);
            prop_assert_eq!(hdr.flag, flag);
            prop_assert_eq!(hdr.size, version.header_len() + payload_len);
            prop_assert_eq!(&frame[version.header_len()..hdr.size], &payload[..]);
        }
    }
}
