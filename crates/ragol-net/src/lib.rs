pub mod channel;
pub mod error;
pub mod frame;

pub use channel::Channel;
pub use error::{NetError, NetResult};
pub use frame::{Frame, FrameHeader, MAX_FRAME_LEN};
