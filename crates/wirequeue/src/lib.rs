//! Message framing and request correlation for inter-process byte streams.
//!
//! wirequeue turns arbitrarily fragmented bytes from a pipe or socket into
//! whole messages, and keeps the table of requests still waiting for a reply.
//!
//! # Crate Structure
//!
//! - [`frame`]: Header codec, the [`frame::Queue`] reassembler, value
//!   decoders, and blocking (or, behind `async`, `tokio_util`) adapters

/// Re-export frame types.
pub mod frame {
    pub use wirequeue_frame::*;
}

pub use wirequeue_frame::{FrameError, JsonDecoder, Message, Queue, QueueConfig, Record};
