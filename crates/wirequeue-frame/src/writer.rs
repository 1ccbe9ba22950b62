use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use serde::Serialize;

use crate::error::{FrameError, Result};
use crate::queue::{Message, QueueConfig};
use crate::value::encode_message;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete messages to any `Write` stream.
pub struct MessageWriter<T> {
    inner: T,
    buf: BytesMut,
    config: QueueConfig,
}

impl<T: Write> MessageWriter<T> {
    /// Create a new message writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, QueueConfig::default())
    }

    /// Create a new message writer with explicit configuration.
    pub fn with_config(inner: T, config: QueueConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Encode `value` as JSON and send it under `id` (blocking).
    pub fn send<V>(&mut self, id: u64, receptive: bool, value: &V) -> Result<()>
    where
        V: Serialize + ?Sized,
    {
        self.buf.clear();
        encode_message(id, receptive, value, &mut self.buf)?;

        if self.buf.len() > self.config.max_message_size {
            return Err(FrameError::MessageTooLarge {
                size: self.buf.len(),
                max: self.config.max_message_size,
            });
        }

        let wire = self.buf.split().freeze();
        self.write_raw(&wire)
    }

    /// Send a decoded message back out, e.g. when relaying.
    pub fn send_message<V: Serialize>(&mut self, message: &Message<V>) -> Result<()> {
        self.send(message.id, message.receptive, &message.data)
    }

    /// Write pre-encoded message bytes and flush.
    pub fn write_raw(&mut self, wire: &[u8]) -> Result<()> {
        let mut offset = 0usize;
        while offset < wire.len() {
            match self.inner.write(&wire[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current writer configuration.
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }
}
