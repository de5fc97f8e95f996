//! Stream module - chunk pumping and SSE frame parsing

mod frame;
mod pump;

pub use frame::{DONE_SENTINEL, FrameParser, normalize_content};
pub use pump::StreamPump;
