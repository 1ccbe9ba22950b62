//! Incremental message reassembly for IPC byte streams.
//!
//! Bytes arrive from the transport in chunks of any size. A [`Queue`] keeps
//! whatever does not yet form a whole message and yields decoded messages as
//! they complete. Every message on the wire carries:
//! - A 6-byte big-endian message id
//! - A 1-byte receptive flag (the sender expects a reply)
//! - A 4-byte little-endian total length, header included
//!
//! Bodies are decoded by a pluggable [`ValueDecoder`]; [`JsonDecoder`] is
//! provided. The queue also owns the table of [`PendingCall`]s the layer
//! above uses to match responses to requests.

#[cfg(feature = "async")]
pub mod codec;
pub mod error;
pub mod header;
pub mod pending;
pub mod queue;
pub mod reader;
pub mod value;
pub mod writer;

#[cfg(feature = "async")]
pub use codec::QueueCodec;
pub use error::{FrameError, Result};
pub use header::{read_header, write_header, Header, HEADER_SIZE, MAX_ID};
pub use pending::PendingCall;
pub use queue::{Message, Process, Queue, QueueConfig, Record, DEFAULT_MAX_MESSAGE};
pub use reader::MessageReader;
pub use value::{encode_message, Decoded, JsonDecoder, ValueDecoder};
pub use writer::MessageWriter;
