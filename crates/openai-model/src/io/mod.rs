//! Byte stream and server-sent event readers.

mod chunks;
mod sse;

pub use chunks::{Chunks, Error as ChunksError};
pub use sse::{Error as SseError, Sse};
