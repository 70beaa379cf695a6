use bytes::{BufMut, Bytes, BytesMut};

/// Little-endian writer over an owned buffer.
#[derive(Debug, Default)]
pub struct PacketWriter {
    buf: BytesMut,
}

macro_rules! write_prim {
    ($name:ident, $ty:ty, $put:ident) => {
        pub fn $name(&mut self, v: $ty) {
            self.buf.$put(v);
        }
    };
}

impl PacketWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(cap),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    write_prim!(write_u8, u8, put_u8);
    write_prim!(write_i8, i8, put_i8);
    write_prim!(write_u16, u16, put_u16_le);
    write_prim!(write_i16, i16, put_i16_le);
    write_prim!(write_u32, u32, put_u32_le);
    write_prim!(write_i32, i32, put_i32_le);
    write_prim!(write_u64, u64, put_u64_le);
    write_prim!(write_f32, f32, put_f32_le);

    pub fn write_slice(&mut self, data: &[u8]) {
        self.buf.put_slice(data);
    }

    /// Zero-pads until the buffer length is a multiple of `align`.
    pub fn pad_to(&mut self, align: usize) {
        while self.buf.len() % align != 0 {
            self.buf.put_u8(0);
        }
    }

    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }
}
