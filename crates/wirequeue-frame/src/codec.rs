//! `tokio_util` codec adapter over [`Queue`].

use std::collections::VecDeque;

use bytes::BytesMut;
use serde::Serialize;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{FrameError, Result};
use crate::queue::{Message, Queue, QueueConfig, Record};
use crate::value::{encode_message, ValueDecoder};

/// Async framing for `FramedRead`/`FramedWrite`.
///
/// Decoded items are [`Record`]s, so framing errors reach the stream
/// consumer without terminating it. Only I/O failures end the stream.
pub struct QueueCodec<D: ValueDecoder> {
    queue: Queue<D>,
    ready: VecDeque<Record<D::Value>>,
}

impl<D: ValueDecoder> QueueCodec<D> {
    /// Create a codec with default configuration.
    pub fn new(decoder: D) -> Self {
        Self::with_config(decoder, QueueConfig::default())
    }

    /// Create a codec with explicit configuration.
    pub fn with_config(decoder: D, config: QueueConfig) -> Self {
        Self {
            queue: Queue::with_config(decoder, config),
            ready: VecDeque::new(),
        }
    }

    /// The underlying reassembler.
    pub fn queue(&self) -> &Queue<D> {
        &self.queue
    }

    /// Mutable access to the reassembler, e.g. to register pending calls.
    pub fn queue_mut(&mut self) -> &mut Queue<D> {
        &mut self.queue
    }
}

impl<D: ValueDecoder> Decoder for QueueCodec<D> {
    type Item = Record<D::Value>;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if self.ready.is_empty() && !src.is_empty() {
            let chunk = src.split();
            self.ready.extend(self.queue.process(Some(&chunk)));
        }
        Ok(self.ready.pop_front())
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        match self.decode(src)? {
            Some(record) => Ok(Some(record)),
            None if self.queue.has_partial() => {
                self.queue.reset();
                Err(FrameError::ConnectionClosed)
            }
            None => Ok(None),
        }
    }
}

impl<D: ValueDecoder, V: Serialize> Encoder<Message<V>> for QueueCodec<D> {
    type Error = FrameError;

    fn encode(&mut self, item: Message<V>, dst: &mut BytesMut) -> Result<()> {
        let start = dst.len();
        encode_message(item.id, item.receptive, &item.data, dst)?;

        let size = dst.len() - start;
        let max = self.queue.config().max_message_size;
        if size > max {
            dst.truncate(start);
            return Err(FrameError::MessageTooLarge { size, max });
        }
        Ok(())
    }
}
