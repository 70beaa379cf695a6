pub mod bb;
pub mod hash;
pub mod multi_key;
pub mod v2;
pub mod v3;

pub use bb::{BbCipher, BbKeyTable, BbSeed, BB_SEED_LEN};
pub use multi_key::{MultiKeyDetector, MultiKeyImitator, SharedDetectorState};
pub use v2::V2Cipher;
pub use v3::V3Cipher;

use thiserror::Error;

/// Word size of the v2/v3 word-stream ciphers.
pub const WORD_LEN: usize = 4;
/// Block size of the latter-game cipher.
pub const BB_BLOCK_LEN: usize = 8;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("buffer length {0} is not a multiple of the cipher block size {1}")]
    UnalignedBuffer(usize, usize),
    #[error("no candidate key reproduces the expected first frame")]
    NoMatchingKey,
    #[error("imitator used before its detector locked a key")]
    DetectorNotLocked,
    #[error("key table must be exactly {0} bytes")]
    BadKeyTable(usize),
}

pub type CryptoResult<T> = Result<T, CryptoError>;

/// A connection-direction stream cipher. One instance per direction; the
/// cipher state advances with every call, so a buffer must be processed
/// exactly once and in arrival order.
pub trait PsoCipher: Send {
    /// En/decryption unit in bytes. Buffers must be a multiple of this.
    fn block_size(&self) -> usize;

    fn encrypt(&mut self, data: &mut [u8]) -> CryptoResult<()>;
    fn decrypt(&mut self, data: &mut [u8]) -> CryptoResult<()>;
}

pub(crate) fn check_aligned(len: usize, block: usize) -> CryptoResult<()> {
    if len % block != 0 {
        return Err(CryptoError::UnalignedBuffer(len, block));
    }
    Ok(())
}
