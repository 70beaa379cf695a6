//! File transfer commands: quest delivery (44/13 online, A6/A7 download)
//! and the latter-game system stream-file (01EB/02EB).

use crate::{packet_struct, FixedText};

use super::{FILE_CHUNK_LEN, STREAM_CHUNK_LEN};

packet_struct! {
    /// 44/A6: declares an upcoming file by name and size.
    pub struct OpenFile44A6 {
        pub name: FixedText<0x20>,
        pub unused: u16,
        pub flags: u16,
        pub file_size: u32,
        pub filename: FixedText<0x10>,
    }
}

packet_struct! {
    /// Latter-game 44/A6 with its wider trailer.
    pub struct OpenFileBb44A6 {
        pub unused: [u8; 0x16],
        pub flags: u16,
        pub file_size: u32,
        pub name: FixedText<0x20>,
        pub filename: FixedText<0x10>,
    }
}

packet_struct! {
    /// 13/A7: one chunk of an open file; chunk index rides in the frame
    /// flag. The data block is always full-size on the wire; `data_size`
    /// says how much of it is meaningful.
    pub struct WriteFile13A7 {
        pub filename: FixedText<0x10>,
        pub data: [u8; FILE_CHUNK_LEN],
        pub data_size: u32,
    }
}

packet_struct! {
    /// One entry of the 01EB stream-file index; flag = entry count.
    pub struct StreamFileIndexEntry01EB {
        pub size: u32,
        pub checksum: u32,
        pub offset: u32,
        pub filename: FixedText<0x40>,
    }
}

packet_struct! {
    /// 02EB: one stream-file chunk. Bodies of all indexed files are
    /// concatenated and cut into these; the final short chunk is sent
    /// truncated (padded only to frame alignment).
    pub struct StreamFileChunk02EB {
        pub chunk_index: u32,
        pub data: [u8; STREAM_CHUNK_LEN],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EncodeRecord;

    #[test]
    fn layouts() {
        assert_eq!(OpenFile44A6::SIZE, 0x38);
        assert_eq!(OpenFileBb44A6::SIZE, 0x4C);
        assert_eq!(WriteFile13A7::SIZE, 0x10 + 0x400 + 4);
        assert_eq!(StreamFileIndexEntry01EB::SIZE, 0x4C);
        assert_eq!(StreamFileChunk02EB::SIZE, 4 + 0x6800);
    }
}
