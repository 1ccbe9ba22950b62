use std::collections::VecDeque;
use std::io::{ErrorKind, Read};

use tracing::trace;

use crate::error::{FrameError, Result};
use crate::queue::{Queue, QueueConfig, Record};
use crate::value::ValueDecoder;

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads messages from any `Read` stream through a [`Queue`].
///
/// Handles partial reads internally. Framing errors come back as records so
/// the caller can report them and keep reading.
pub struct MessageReader<T, D: ValueDecoder> {
    inner: T,
    queue: Queue<D>,
    ready: VecDeque<Record<D::Value>>,
}

impl<T: Read, D: ValueDecoder> MessageReader<T, D> {
    /// Create a new message reader with default configuration.
    pub fn new(inner: T, decoder: D) -> Self {
        Self::with_config(inner, decoder, QueueConfig::default())
    }

    /// Create a new message reader with explicit configuration.
    pub fn with_config(inner: T, decoder: D, config: QueueConfig) -> Self {
        Self {
            inner,
            queue: Queue::with_config(decoder, config),
            ready: VecDeque::new(),
        }
    }

    /// Read the next record (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_message(&mut self) -> Result<Record<D::Value>> {
        loop {
            if let Some(record) = self.ready.pop_front() {
                return Ok(record);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                if self.queue.has_partial() {
                    trace!(
                        carried = self.queue.buffered_len(),
                        "stream ended mid-message"
                    );
                }
                return Err(FrameError::ConnectionClosed);
            }

            self.ready.extend(self.queue.process(Some(&chunk[..read])));
        }
    }

    /// The reassembler, including its pending-call table.
    pub fn queue(&self) -> &Queue<D> {
        &self.queue
    }

    /// Mutable access to the reassembler.
    pub fn queue_mut(&mut self) -> &mut Queue<D> {
        &mut self.queue
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Read, D: ValueDecoder> Iterator for MessageReader<T, D> {
    type Item = Record<D::Value>;

    /// Yields records until the stream closes. I/O errors are yielded as
    /// `Err` items.
    fn next(&mut self) -> Option<Self::Item> {
        match self.read_message() {
            Ok(record) => Some(record),
            Err(FrameError::ConnectionClosed) => None,
            Err(err) => Some(Err(err)),
        }
    }
}
