use std::collections::HashMap;
use std::iter::FusedIterator;

use bytes::{Buf, BytesMut};
use tracing::{debug, trace, warn};

use crate::error::FrameError;
use crate::header::{read_header, HEADER_SIZE};
use crate::pending::PendingCall;
use crate::value::{Decoded, ValueDecoder};

/// Default maximum encoded message size: 16 MiB.
pub const DEFAULT_MAX_MESSAGE: usize = 16 * 1024 * 1024;

/// Configuration for a [`Queue`].
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Largest `byte_length` a header may declare. Default: 16 MiB.
    pub max_message_size: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE,
        }
    }
}

/// A fully decoded message.
#[derive(Debug, Clone, PartialEq)]
pub struct Message<V> {
    pub id: u64,
    /// The sender expects a reply carrying the same id.
    pub receptive: bool,
    pub data: V,
}

/// One unit produced by [`Queue::process`]: a message, or the framing error
/// that abandoned the rest of the working buffer.
pub type Record<V> = Result<Message<V>, FrameError>;

/// Per-connection stream reassembler.
///
/// Accepts byte chunks of any size, keeps whatever does not yet form a whole
/// message, and yields decoded messages as they complete. Also owns the
/// table of calls awaiting a response, which it stores but never reads.
pub struct Queue<D: ValueDecoder> {
    decoder: D,
    offset: usize,
    carry: Option<BytesMut>,
    pending: HashMap<u64, PendingCall<D::Value>>,
    config: QueueConfig,
}

impl<D: ValueDecoder> Queue<D> {
    /// Create a queue with default configuration.
    pub fn new(decoder: D) -> Self {
        Self::with_config(decoder, QueueConfig::default())
    }

    /// Create a queue with explicit configuration.
    pub fn with_config(decoder: D, config: QueueConfig) -> Self {
        Self {
            decoder,
            offset: 0,
            carry: None,
            pending: HashMap::new(),
            config,
        }
    }

    /// Feed the next chunk (or `None` to flush carried bytes) and iterate
    /// the records it completes.
    ///
    /// Records are produced lazily. Dropping the iterator early keeps the
    /// unscanned bytes for the next call.
    pub fn process(&mut self, chunk: Option<&[u8]>) -> Process<'_, D> {
        // A carry always starts at the next header; without one, so does the chunk.
        if self.carry.is_none() {
            self.offset = 0;
        }
        let buf = match (self.carry.take(), chunk) {
            (Some(mut carry), Some(chunk)) => {
                carry.extend_from_slice(chunk);
                Some(carry)
            }
            (Some(carry), None) => Some(carry),
            (None, Some(chunk)) => Some(BytesMut::from(chunk)),
            (None, None) => None,
        };

        Process { queue: self, buf }
    }

    /// Position of the next header within the working buffer.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Number of bytes carried over to the next [`process`](Self::process) call.
    pub fn buffered_len(&self) -> usize {
        self.carry.as_ref().map_or(0, BytesMut::len)
    }

    /// Whether a partial message is waiting for more bytes.
    pub fn has_partial(&self) -> bool {
        self.buffered_len() > 0
    }

    /// Drop carried bytes and rewind. Pending calls are kept.
    pub fn reset(&mut self) {
        if let Some(carry) = self.carry.take() {
            debug!(dropped = carry.len(), "discarding carried bytes");
        }
        self.offset = 0;
    }

    /// The body decoder.
    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    /// Current queue configuration.
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Calls awaiting a response, keyed by message id.
    pub fn pending(&self) -> &HashMap<u64, PendingCall<D::Value>> {
        &self.pending
    }

    /// Mutable access to the pending-call table.
    pub fn pending_mut(&mut self) -> &mut HashMap<u64, PendingCall<D::Value>> {
        &mut self.pending
    }
}

/// Iterator returned by [`Queue::process`].
pub struct Process<'a, D: ValueDecoder> {
    queue: &'a mut Queue<D>,
    buf: Option<BytesMut>,
}

impl<D: ValueDecoder> Process<'_, D> {
    /// Keep the unscanned part of `buf` for the next call.
    fn stash(&mut self, mut buf: BytesMut) {
        buf.advance(self.queue.offset);
        self.queue.offset = 0;
        trace!(carried = buf.len(), "waiting for more bytes");
        self.queue.carry = Some(buf);
    }

    /// Give up on the rest of `buf` after a framing error.
    fn abandon(&mut self, buf: BytesMut, err: FrameError) -> FrameError {
        let dropped = buf.len() - self.queue.offset;
        warn!(error = %err, dropped, "framing failed, discarding buffered bytes");
        self.queue.offset = 0;
        err
    }
}

impl<D: ValueDecoder> Iterator for Process<'_, D> {
    type Item = Record<D::Value>;

    fn next(&mut self) -> Option<Self::Item> {
        let buf = self.buf.take()?;
        let offset = self.queue.offset;
        let remaining = match buf.len().checked_sub(offset) {
            Some(0) | None => {
                self.queue.offset = 0;
                return None;
            }
            Some(n) => n,
        };

        if remaining < HEADER_SIZE {
            self.stash(buf);
            return None;
        }

        let header = read_header(&buf[offset..offset + HEADER_SIZE]);
        if header.byte_length < HEADER_SIZE as u64 {
            let err = FrameError::InvalidLength {
                length: header.byte_length,
            };
            return Some(Err(self.abandon(buf, err)));
        }

        let length = usize::try_from(header.byte_length).unwrap_or(usize::MAX);
        let max = self.queue.config.max_message_size;
        if length > max {
            let err = FrameError::MessageTooLarge { size: length, max };
            return Some(Err(self.abandon(buf, err)));
        }

        let end = offset.saturating_add(length);
        if end > buf.len() {
            self.stash(buf);
            return None;
        }

        let decoded = self.queue.decoder.decode(&buf, offset + HEADER_SIZE, end);
        let data = match decoded {
            Ok(Decoded::Exhausted(value)) => {
                if end < buf.len() {
                    debug!(ignored = buf.len() - end, "decoder exhausted buffer early");
                }
                self.queue.offset = 0;
                value
            }
            Ok(Decoded::Next {
                value,
                offset: next,
            }) if next > offset && next <= buf.len() => {
                self.queue.offset = next;
                self.buf = Some(buf);
                value
            }
            Ok(Decoded::Next { offset: next, .. }) => {
                let err = FrameError::InvalidOffset {
                    offset: next,
                    len: buf.len(),
                };
                return Some(Err(self.abandon(buf, err)));
            }
            Err(err) => return Some(Err(self.abandon(buf, FrameError::payload(err)))),
        };

        debug!(
            id = header.id,
            receptive = header.receptive,
            length,
            "decoded message"
        );
        Some(Ok(Message {
            id: header.id,
            receptive: header.receptive,
            data,
        }))
    }
}

impl<D: ValueDecoder> FusedIterator for Process<'_, D> {}

impl<D: ValueDecoder> Drop for Process<'_, D> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.stash(buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::sync::mpsc;

    use bytes::BytesMut;
    use serde_json::{json, Value};

    use super::*;
    use crate::header::{write_header, Header};
    use crate::value::{encode_message, JsonDecoder};

    fn json_queue() -> Queue<JsonDecoder> {
        Queue::new(JsonDecoder::new())
    }

    fn encode(id: u64, receptive: bool, value: Value) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_message(id, receptive, &value, &mut buf).unwrap();
        buf.to_vec()
    }

    fn collect(queue: &mut Queue<JsonDecoder>, chunk: &[u8]) -> Vec<Record<Value>> {
        queue.process(Some(chunk)).collect()
    }

    fn message(record: Record<Value>) -> Message<Value> {
        record.expect("expected a decoded message")
    }

    /// id=7, receptive, 9-byte body: 20 bytes on the wire.
    fn scenario_bytes() -> Vec<u8> {
        let wire = encode(7, true, json!("abcdefg"));
        assert_eq!(wire.len(), 20);
        wire
    }

    #[test]
    fn whole_message_in_one_chunk() {
        let mut queue = json_queue();
        let records = collect(&mut queue, &scenario_bytes());

        assert_eq!(records.len(), 1);
        let msg = message(records.into_iter().next().unwrap());
        assert_eq!(msg.id, 7);
        assert!(msg.receptive);
        assert_eq!(msg.data, json!("abcdefg"));
        assert_eq!(queue.offset(), 0);
        assert!(!queue.has_partial());
    }

    #[test]
    fn message_split_fifteen_then_five() {
        let wire = scenario_bytes();
        let mut queue = json_queue();

        assert!(collect(&mut queue, &wire[..15]).is_empty());
        assert_eq!(queue.buffered_len(), 15);

        let records = collect(&mut queue, &wire[15..]);
        assert_eq!(records.len(), 1);
        let msg = message(records.into_iter().next().unwrap());
        assert_eq!((msg.id, msg.receptive), (7, true));
        assert!(!queue.has_partial());
    }

    #[test]
    fn message_split_byte_by_byte() {
        let wire = scenario_bytes();
        let mut queue = json_queue();
        let mut records = Vec::new();

        for (i, byte) in wire.iter().enumerate() {
            let produced = collect(&mut queue, std::slice::from_ref(byte));
            if i + 1 < wire.len() {
                assert!(produced.is_empty(), "record yielded early at byte {i}");
            }
            records.extend(produced);
        }

        assert_eq!(records.len(), 1);
        assert_eq!(message(records.remove(0)).data, json!("abcdefg"));
    }

    #[test]
    fn short_input_is_buffered() {
        let mut queue = json_queue();
        assert!(collect(&mut queue, &[0, 0, 0, 0, 0]).is_empty());
        assert_eq!(queue.buffered_len(), 5);
    }

    #[test]
    fn no_chunk_and_no_carry_is_empty() {
        let mut queue = json_queue();
        assert_eq!(queue.process(None).count(), 0);
        assert!(!queue.has_partial());
    }

    #[test]
    fn empty_chunk_is_empty() {
        let mut queue = json_queue();
        assert_eq!(collect(&mut queue, &[]).len(), 0);
        assert_eq!(queue.offset(), 0);
        assert!(!queue.has_partial());
    }

    #[test]
    fn flushing_incomplete_carry_yields_nothing() {
        let wire = scenario_bytes();
        let mut queue = json_queue();
        assert!(collect(&mut queue, &wire[..12]).is_empty());

        assert_eq!(queue.process(None).count(), 0);
        assert_eq!(queue.buffered_len(), 12);
    }

    #[test]
    fn several_messages_in_one_chunk() {
        let mut wire = encode(1, true, json!({"op": "a"}));
        wire.extend(encode(2, false, json!([1, 2])));
        wire.extend(encode(3, true, json!(null)));

        let mut queue = json_queue();
        let ids: Vec<_> = collect(&mut queue, &wire)
            .into_iter()
            .map(|r| message(r).id)
            .collect();

        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(queue.offset(), 0);
    }

    #[test]
    fn message_straddling_chunks() {
        let first = encode(1, false, json!("one"));
        let second = encode(2, true, json!({"two": 2}));
        let mut wire = first.clone();
        wire.extend(&second);

        let cut = first.len() + 4;
        let mut queue = json_queue();

        let records = collect(&mut queue, &wire[..cut]);
        assert_eq!(records.len(), 1);
        assert_eq!(message(records.into_iter().next().unwrap()).id, 1);
        assert_eq!(queue.buffered_len(), 4);

        let records = collect(&mut queue, &wire[cut..]);
        assert_eq!(records.len(), 1);
        let msg = message(records.into_iter().next().unwrap());
        assert_eq!(msg.id, 2);
        assert_eq!(msg.data, json!({"two": 2}));
    }

    #[test]
    fn header_complete_body_partial_after_earlier_message() {
        let first = encode(1, false, json!(1));
        let second = encode(2, false, json!("a longer second body"));
        let mut wire = first.clone();
        wire.extend(&second);

        let cut = first.len() + HEADER_SIZE + 3;
        let mut queue = json_queue();

        assert_eq!(collect(&mut queue, &wire[..cut]).len(), 1);
        assert_eq!(queue.buffered_len(), HEADER_SIZE + 3);

        let records = collect(&mut queue, &wire[cut..]);
        assert_eq!(message(records.into_iter().next().unwrap()).id, 2);
    }

    #[test]
    fn decode_failure_yields_one_error_and_drops_rest() {
        let mut wire = BytesMut::new();
        write_header(&Header::for_body(4, true, 5), &mut wire).unwrap();
        wire.extend_from_slice(b"{oops");
        wire.extend_from_slice(&encode(5, false, json!("lost")));

        let mut queue = json_queue();
        let records = collect(&mut queue, &wire);

        assert_eq!(records.len(), 1);
        assert!(matches!(records[0], Err(FrameError::PayloadDecode(_))));
        assert_eq!(queue.offset(), 0);
        assert!(!queue.has_partial());

        let records = collect(&mut queue, &encode(6, true, json!("next")));
        assert_eq!(records.len(), 1);
        assert_eq!(message(records.into_iter().next().unwrap()).id, 6);
    }

    #[test]
    fn header_shorter_than_itself_is_rejected() {
        let raw = [0, 0, 0, 0, 0, 1, 0, 5, 0, 0, 0, 0xAA];
        let mut queue = json_queue();
        let records = collect(&mut queue, &raw);

        assert_eq!(records.len(), 1);
        assert!(matches!(
            records[0],
            Err(FrameError::InvalidLength { length: 5 })
        ));
        assert!(!queue.has_partial());
    }

    #[test]
    fn oversized_header_is_rejected_before_buffering() {
        let mut raw = BytesMut::new();
        write_header(&Header::for_body(1, false, 1024), &mut raw).unwrap();

        let mut queue = Queue::with_config(
            JsonDecoder::<Value>::new(),
            QueueConfig {
                max_message_size: 64,
            },
        );
        let records: Vec<_> = queue.process(Some(&raw)).collect();

        assert_eq!(records.len(), 1);
        assert!(matches!(
            records[0],
            Err(FrameError::MessageTooLarge { size, max: 64 }) if size == HEADER_SIZE + 1024
        ));
        assert!(!queue.has_partial());
    }

    #[test]
    fn dropping_iterator_early_keeps_remaining_messages() {
        let mut wire = encode(1, false, json!("a"));
        wire.extend(encode(2, false, json!("b")));
        wire.extend(encode(3, false, json!("c")));

        let mut queue = json_queue();
        {
            let mut records = queue.process(Some(&wire));
            assert_eq!(message(records.next().unwrap()).id, 1);
        }
        assert!(queue.has_partial());

        let ids: Vec<_> = queue.process(None).map(|r| message(r).id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert!(!queue.has_partial());
    }

    #[test]
    fn leaked_iterator_does_not_poison_next_chunk() {
        let mut wire = encode(1, false, json!("first"));
        wire.extend(encode(2, false, json!("second")));

        let mut queue = json_queue();
        let mut records = queue.process(Some(&wire));
        assert_eq!(message(records.next().unwrap()).id, 1);
        std::mem::forget(records);
        assert!(queue.offset() > 0);

        assert!(collect(&mut queue, &[1, 2, 3]).is_empty());
        assert_eq!(queue.buffered_len(), 3);

        let records = collect(&mut queue, &[]);
        assert!(records.is_empty());
        assert_eq!(queue.buffered_len(), 3);
    }

    #[test]
    fn iterator_is_fused() {
        let mut queue = json_queue();
        let wire = scenario_bytes();
        let mut records = queue.process(Some(&wire));
        assert!(records.next().is_some());
        assert!(records.next().is_none());
        assert!(records.next().is_none());
    }

    #[test]
    fn process_never_touches_pending() {
        let (tx, rx) = mpsc::channel::<Value>();
        let mut queue = json_queue();
        queue.pending_mut().insert(
            7,
            PendingCall::new(move |value| tx.send(value).unwrap(), |_| {}),
        );

        let records = collect(&mut queue, &scenario_bytes());
        assert_eq!(records.len(), 1);
        assert_eq!(queue.pending().len(), 1);
        assert!(rx.try_recv().is_err());

        let msg = message(records.into_iter().next().unwrap());
        let call = queue.pending_mut().remove(&msg.id).unwrap();
        call.resolve(msg.data);
        assert_eq!(rx.recv().unwrap(), json!("abcdefg"));
    }

    #[test]
    fn reset_drops_carry_but_keeps_pending() {
        let mut queue = json_queue();
        queue
            .pending_mut()
            .insert(1, PendingCall::new(|_: Value| {}, |_| {}));
        let _ = collect(&mut queue, &scenario_bytes()[..14]);
        assert!(queue.has_partial());

        queue.reset();
        assert!(!queue.has_partial());
        assert_eq!(queue.offset(), 0);
        assert_eq!(queue.pending().len(), 1);
    }

    /// Decodes the first body byte and reports a fixed next offset.
    struct FixedOffset(Option<usize>);

    impl ValueDecoder for FixedOffset {
        type Value = u8;
        type Error = Infallible;

        fn decode(
            &self,
            buf: &[u8],
            offset: usize,
            _end: usize,
        ) -> Result<Decoded<u8>, Infallible> {
            Ok(match self.0 {
                Some(next) => Decoded::Next {
                    value: buf[offset],
                    offset: next,
                },
                None => Decoded::Exhausted(buf[offset]),
            })
        }
    }

    fn raw_message(id: u64, body: &[u8]) -> BytesMut {
        let mut buf = BytesMut::new();
        write_header(&Header::for_body(id, false, body.len()), &mut buf).unwrap();
        buf.extend_from_slice(body);
        buf
    }

    #[test]
    fn non_advancing_decoder_is_a_framing_error() {
        let mut queue = Queue::new(FixedOffset(Some(0)));
        let wire = raw_message(1, b"x");
        let records: Vec<_> = queue.process(Some(&wire)).collect();

        assert_eq!(records.len(), 1);
        assert!(matches!(
            records[0],
            Err(FrameError::InvalidOffset { offset: 0, len: 12 })
        ));
    }

    #[test]
    fn early_exhausted_stops_scanning_buffer() {
        let mut wire = raw_message(1, b"a");
        wire.extend_from_slice(&raw_message(2, b"b"));

        let mut queue = Queue::new(FixedOffset(None));
        let records: Vec<_> = queue.process(Some(&wire)).collect();

        assert_eq!(records.len(), 1);
        let msg = records.into_iter().next().unwrap().unwrap();
        assert_eq!((msg.id, msg.data), (1, b'a'));
        assert_eq!(queue.offset(), 0);
        assert!(!queue.has_partial());
    }

    #[test]
    fn decoder_offset_at_buffer_end_releases_buffer() {
        let wire = raw_message(1, b"z");
        let mut queue = Queue::new(FixedOffset(Some(wire.len())));
        let records: Vec<_> = queue.process(Some(&wire)).collect();

        assert_eq!(records.len(), 1);
        assert_eq!(queue.offset(), 0);
        assert!(!queue.has_partial());
    }
}
