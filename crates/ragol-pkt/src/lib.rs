pub mod cmds;
pub mod error;
pub mod reader;
pub mod text;
pub mod version;
pub mod writer;

pub use error::Error;
pub use reader::PacketReader;
pub use text::{FixedText, FixedWText};
pub use version::Version;
pub use writer::PacketWriter;

pub type PacketResult<T> = Result<T, Error>;

/// Decodes a fixed-layout wire record from a reader.
pub trait DecodeRecord: Sized {
    fn decode(pr: &mut PacketReader<'_>) -> PacketResult<Self>;

    fn decode_n(pr: &mut PacketReader<'_>, n: usize) -> PacketResult<Vec<Self>> {
        (0..n).map(|_| Self::decode(pr)).collect()
    }

    /// Decodes from a byte slice, ignoring any trailing bytes.
    fn from_slice(data: &[u8]) -> PacketResult<Self> {
        Self::decode(&mut PacketReader::new(data))
    }
}

/// Encodes a fixed-layout wire record onto a writer.
pub trait EncodeRecord: Sized {
    /// Exact encoded size in bytes.
    const SIZE: usize;

    fn encode(&self, pw: &mut PacketWriter) -> PacketResult<()>;

    fn to_bytes(&self) -> bytes::Bytes {
        let mut pw = PacketWriter::with_capacity(Self::SIZE);
        self.encode(&mut pw).expect("fixed record encode");
        pw.into_bytes()
    }
}

/// Validates a payload length against a record's canonical size. `strict`
/// accepts exactly the canonical size; the lax form accepts anything from
/// `min` up to the 64 KiB frame cap, which third-party servers need because
/// they commonly truncate trailing copyright text.
pub fn check_size(len: usize, min: usize, max: usize) -> PacketResult<()> {
    if len < min || len > max {
        return Err(Error::SizeCheck { len, min, max });
    }
    Ok(())
}

pub fn check_size_exact(len: usize, expected: usize) -> PacketResult<()> {
    check_size(len, expected, expected)
}

/// Defines a fixed-layout little-endian wire record: a plain struct plus
/// `EncodeRecord`/`DecodeRecord` impls with a compile-time size.
#[macro_export]
macro_rules! packet_struct {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $( $(#[$fmeta:meta])* pub $field:ident : $ty:ty ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        pub struct $name {
            $( $(#[$fmeta])* pub $field: $ty, )*
        }

        impl $crate::EncodeRecord for $name {
            const SIZE: usize = 0 $( + <$ty as $crate::WireField>::WIRE_SIZE )*;

            fn encode(&self, pw: &mut $crate::PacketWriter) -> $crate::PacketResult<()> {
                $( $crate::WireField::write(&self.$field, pw)?; )*
                Ok(())
            }
        }

        impl $crate::DecodeRecord for $name {
            fn decode(pr: &mut $crate::PacketReader<'_>) -> $crate::PacketResult<Self> {
                Ok(Self {
                    $( $field: $crate::WireField::read(pr)?, )*
                })
            }
        }
    };
}

/// Decodes a record from a payload that may be shorter than the canonical
/// layout (lax acceptance): missing trailing bytes read as zero, extra bytes
/// are ignored. Callers still gate with `check_size` first.
pub fn decode_lax<T: EncodeRecord + DecodeRecord>(data: &[u8]) -> PacketResult<T> {
    if data.len() >= T::SIZE {
        return T::from_slice(data);
    }
    let mut padded = vec![0u8; T::SIZE];
    padded[..data.len()].copy_from_slice(data);
    T::from_slice(&padded)
}

/// Makes a record usable as a field of another `packet_struct!`.
#[macro_export]
macro_rules! wire_record {
    ($ty:ty) => {
        impl $crate::WireField for $ty {
            const WIRE_SIZE: usize = <$ty as $crate::EncodeRecord>::SIZE;

            fn read(pr: &mut $crate::PacketReader<'_>) -> $crate::PacketResult<Self> {
                <$ty as $crate::DecodeRecord>::decode(pr)
            }

            fn write(&self, pw: &mut $crate::PacketWriter) -> $crate::PacketResult<()> {
                <$ty as $crate::EncodeRecord>::encode(self, pw)
            }
        }
    };
}

/// Field primitive used by `packet_struct!`. Implemented for the fixed-width
/// integers, byte arrays, and the fixed text types.
pub trait WireField: Sized {
    const WIRE_SIZE: usize;

    fn read(pr: &mut PacketReader<'_>) -> PacketResult<Self>;
    fn write(&self, pw: &mut PacketWriter) -> PacketResult<()>;
}

macro_rules! wire_int {
    ($ty:ty, $read:ident, $write:ident) => {
        impl WireField for $ty {
            const WIRE_SIZE: usize = std::mem::size_of::<$ty>();

            fn read(pr: &mut PacketReader<'_>) -> PacketResult<Self> {
                pr.$read()
            }

            fn write(&self, pw: &mut PacketWriter) -> PacketResult<()> {
                pw.$write(*self);
                Ok(())
            }
        }
    };
}

wire_int!(u8, read_u8, write_u8);
wire_int!(i8, read_i8, write_i8);
wire_int!(u16, read_u16, write_u16);
wire_int!(i16, read_i16, write_i16);
wire_int!(u32, read_u32, write_u32);
wire_int!(i32, read_i32, write_i32);
wire_int!(u64, read_u64, write_u64);
wire_int!(f32, read_f32, write_f32);

impl<const N: usize> WireField for [u8; N] {
    const WIRE_SIZE: usize = N;

    fn read(pr: &mut PacketReader<'_>) -> PacketResult<Self> {
        pr.read_array()
    }

    fn write(&self, pw: &mut PacketWriter) -> PacketResult<()> {
        pw.write_slice(self);
        Ok(())
    }
}

impl<const N: usize> WireField for [u32; N] {
    const WIRE_SIZE: usize = N * 4;

    fn read(pr: &mut PacketReader<'_>) -> PacketResult<Self> {
        let mut out = [0u32; N];
        for v in out.iter_mut() {
            *v = pr.read_u32()?;
        }
        Ok(out)
    }

    fn write(&self, pw: &mut PacketWriter) -> PacketResult<()> {
        for v in self {
            pw.write_u32(*v);
        }
        Ok(())
    }
}
