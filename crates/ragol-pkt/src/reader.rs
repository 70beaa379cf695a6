use std::io::Cursor;

use bytes::Buf;

use crate::{error::Error, PacketResult};

/// Little-endian reader over a borrowed payload.
#[derive(Debug)]
pub struct PacketReader<'a> {
    inner: Cursor<&'a [u8]>,
}

macro_rules! read_prim {
    ($name:ident, $ty:ty, $get:ident) => {
        pub fn $name(&mut self) -> PacketResult<$ty> {
            self.check_size::<$ty>(std::mem::size_of::<$ty>())?;
            Ok(self.inner.$get())
        }
    };
}

impl<'a> PacketReader<'a> {
    pub fn new(inner: &'a [u8]) -> Self {
        Self {
            inner: Cursor::new(inner),
        }
    }

    fn check_size<T>(&self, n: usize) -> PacketResult<()> {
        if self.inner.remaining() >= n {
            Ok(())
        } else {
            Err(Error::eof::<T>(n, self.inner.remaining()))
        }
    }

    pub fn remaining(&self) -> usize {
        self.inner.remaining()
    }

    pub fn remaining_slice(&self) -> &'a [u8] {
        let pos = (self.inner.position() as usize).min(self.inner.get_ref().len());
        &self.inner.get_ref()[pos..]
    }

    pub fn advance(&mut self, n: usize) -> PacketResult<()> {
        self.check_size::<()>(n)?;
        self.inner.advance(n);
        Ok(())
    }

    read_prim!(read_u8, u8, get_u8);
    read_prim!(read_i8, i8, get_i8);
    read_prim!(read_u16, u16, get_u16_le);
    read_prim!(read_i16, i16, get_i16_le);
    read_prim!(read_u32, u32, get_u32_le);
    read_prim!(read_i32, i32, get_i32_le);
    read_prim!(read_u64, u64, get_u64_le);
    read_prim!(read_f32, f32, get_f32_le);

    pub fn read_bytes(&mut self, n: usize) -> PacketResult<&'a [u8]> {
        self.check_size::<&[u8]>(n)?;
        let pos = self.inner.position() as usize;
        let out = &self.inner.get_ref()[pos..pos + n];
        self.inner.advance(n);
        Ok(out)
    }

    pub fn read_array<const N: usize>(&mut self) -> PacketResult<[u8; N]> {
        Ok(self.read_bytes(N)?.try_into().expect("sized read"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_little_endian() {
        let data = [0x01, 0x00, 0x02, 0x00, 0x00, 0x00, 0xFF];
        let mut pr = PacketReader::new(&data);
        assert_eq!(pr.read_u16().unwrap(), 1);
        assert_eq!(pr.read_u32().unwrap(), 2);
        assert_eq!(pr.read_u8().unwrap(), 0xFF);
        assert_eq!(pr.remaining(), 0);
    }

    #[test]
    fn eof_carries_context() {
        let mut pr = PacketReader::new(&[0x01]);
        let err = pr.read_u32().unwrap_err();
        assert!(matches!(err, Error::Eof { needed: 4, .. }));
    }
}
