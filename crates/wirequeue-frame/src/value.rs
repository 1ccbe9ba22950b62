//! Value decoding seam and the bundled JSON codec.
//!
//! The queue does not own the value encoding. It hands each body to a
//! [`ValueDecoder`], which reports either the next offset to scan from or
//! that the buffer holds nothing past this message.

use std::marker::PhantomData;

use bytes::BytesMut;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;
use crate::header::{write_header, Header};

/// Outcome of decoding one value from a working buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded<V> {
    /// A value was decoded and scanning continues at `offset`.
    Next { value: V, offset: usize },
    /// A value was decoded and no more data remains in this buffer.
    Exhausted(V),
}

impl<V> Decoded<V> {
    /// The decoded value, whichever way scanning proceeds.
    pub fn into_value(self) -> V {
        match self {
            Decoded::Next { value, .. } | Decoded::Exhausted(value) => value,
        }
    }
}

/// Decodes one message body out of a working buffer.
pub trait ValueDecoder {
    type Value;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Decode the value starting at `offset` in `buf`.
    ///
    /// `end` is the message end declared by the header; it never exceeds
    /// `buf.len()`. Self-delimiting formats may ignore it and report the
    /// offset they actually stopped at.
    fn decode(
        &self,
        buf: &[u8],
        offset: usize,
        end: usize,
    ) -> std::result::Result<Decoded<Self::Value>, Self::Error>;
}

impl<D: ValueDecoder + ?Sized> ValueDecoder for &D {
    type Value = D::Value;
    type Error = D::Error;

    fn decode(
        &self,
        buf: &[u8],
        offset: usize,
        end: usize,
    ) -> std::result::Result<Decoded<Self::Value>, Self::Error> {
        (**self).decode(buf, offset, end)
    }
}

/// Decodes message bodies as a single JSON document each.
pub struct JsonDecoder<T = serde_json::Value> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonDecoder<T> {
    /// Create a decoder producing `T`.
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonDecoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonDecoder<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for JsonDecoder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonDecoder").finish()
    }
}

impl<T: DeserializeOwned> ValueDecoder for JsonDecoder<T> {
    type Value = T;
    type Error = serde_json::Error;

    fn decode(
        &self,
        buf: &[u8],
        offset: usize,
        end: usize,
    ) -> std::result::Result<Decoded<T>, serde_json::Error> {
        let value = serde_json::from_slice(&buf[offset..end])?;
        if end >= buf.len() {
            Ok(Decoded::Exhausted(value))
        } else {
            Ok(Decoded::Next { value, offset: end })
        }
    }
}

/// Encode a complete message (header + JSON body) into `dst`.
pub fn encode_message<T>(id: u64, receptive: bool, value: &T, dst: &mut BytesMut) -> Result<()>
where
    T: Serialize + ?Sized,
{
    let body = serde_json::to_vec(value)?;
    write_header(&Header::for_body(id, receptive, body.len()), dst)?;
    dst.extend_from_slice(&body);
    Ok(())
}
