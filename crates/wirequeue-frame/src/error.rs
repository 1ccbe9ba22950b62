/// Errors that can occur while framing, decoding or writing messages.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The message body could not be decoded by the value decoder.
    #[error("payload decode failed: {0}")]
    PayloadDecode(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The header declares a length that cannot hold a message.
    #[error("invalid message length ({length} bytes)")]
    InvalidLength { length: u64 },

    /// The header declares a length above the configured maximum.
    #[error("message too large ({size} bytes, max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// The value decoder reported a next offset that does not advance or
    /// points past the end of the buffer.
    #[error("decoder returned offset {offset} outside the buffer (len {len})")]
    InvalidOffset { offset: usize, len: usize },

    /// The message id does not fit in the 48-bit header field.
    #[error("message id {0} exceeds the 48-bit header field")]
    IdOutOfRange(u64),

    /// JSON serialization failed while encoding a message.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// An I/O error occurred while reading or writing messages.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete message was received.
    #[error("connection closed (incomplete message)")]
    ConnectionClosed,
}

impl FrameError {
    /// Wrap a value-decoder failure.
    pub fn payload<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        FrameError::PayloadDecode(Box::new(err))
    }

    /// Returns true for errors surfaced by [`Queue::process`](crate::Queue::process)
    /// as framing records rather than transport failures.
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            FrameError::PayloadDecode(_)
                | FrameError::InvalidLength { .. }
                | FrameError::MessageTooLarge { .. }
                | FrameError::InvalidOffset { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
