use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("eof reading {type_name}: needed {needed} bytes, {remaining} remaining")]
    Eof {
        type_name: &'static str,
        needed: usize,
        remaining: usize,
    },
    #[error("payload length {len} outside accepted range {min}..={max}")]
    SizeCheck {
        len: usize,
        min: usize,
        max: usize,
    },
    #[error("text does not fit in a {0}-unit field")]
    TextCapacity(usize),
    #[error("text field contains invalid data")]
    BadText,
    #[error("unknown variant tag {0}")]
    UnknownVersion(u8),
}

impl Error {
    pub fn eof<T>(needed: usize, remaining: usize) -> Self {
        Self::Eof {
            type_name: std::any::type_name::<T>(),
            needed,
            remaining,
        }
    }
}
