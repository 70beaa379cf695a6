use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetError {
    #[error("io")]
    Io(#[from] io::Error),
    #[error("packet")]
    Packet(#[from] ragol_pkt::Error),
    #[error("crypto")]
    Crypto(#[from] ragol_crypto::CryptoError),
    #[error("frame of length {0} is out of bounds")]
    FrameSize(usize),
    #[error("channel is disconnected")]
    Disconnected,
}

pub type NetResult<T> = Result<T, NetError>;
