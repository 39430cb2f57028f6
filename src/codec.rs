// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Payload Codecs
//!
//! Two interchangeable strategies for turning application values into message
//! payloads: structured text (JSON) and a compact binary encoding (bincode).
//! The caller picks the codec; it is never inferred from the payload.

use crate::errors::PubSubError;
use serde::{de::DeserializeOwned, Serialize};

/// Content type of JSON payloads
pub const JSON_CONTENT_TYPE: &str = "application/json";
/// Content type of bincode payloads
pub const BINCODE_CONTENT_TYPE: &str = "application/bincode";

/// A payload format, identified by the content type it tags messages with.
pub trait Codec: Send + Sync + 'static {
    /// Content type tagged on every published payload.
    fn content_type(&self) -> &'static str;
}

/// Outbound half of a codec: turns a value of type `T` into a payload.
///
/// Only serialization is required, so borrowed, publish-only types such as a
/// struct of `&str` fields can be published.
pub trait Encoder<T: ?Sized>: Codec {
    /// Encodes `value` into a payload.
    ///
    /// # Returns
    /// * `Ok(Vec<u8>)` - The encoded payload
    /// * `Err(PubSubError::EncodeError)` - The value cannot be represented in this format
    fn encode(&self, value: &T) -> Result<Vec<u8>, PubSubError>;
}

/// Inbound half of a codec: rebuilds a value of type `T` from a payload.
pub trait Decoder<T>: Codec {
    /// Decodes `payload` into an owned value.
    ///
    /// # Returns
    /// * `Ok(T)` - The decoded value
    /// * `Err(PubSubError::DecodeError)` - The payload is malformed or does not match `T`
    fn decode(&self, payload: &[u8]) -> Result<T, PubSubError>;
}

/// Self-describing JSON codec.
///
/// Unknown fields are ignored on decode; missing fields only fail when the
/// target type requires them.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn content_type(&self) -> &'static str {
        JSON_CONTENT_TYPE
    }
}

impl<T: Serialize + ?Sized> Encoder<T> for JsonCodec {
    fn encode(&self, value: &T) -> Result<Vec<u8>, PubSubError> {
        serde_json::to_vec(value).map_err(|err| PubSubError::EncodeError(err.to_string()))
    }
}

impl<T: DeserializeOwned> Decoder<T> for JsonCodec {
    fn decode(&self, payload: &[u8]) -> Result<T, PubSubError> {
        serde_json::from_slice(payload).map_err(|err| PubSubError::DecodeError(err.to_string()))
    }
}

/// Binary codec. Producer and consumer must agree on the type definition.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl Codec for BincodeCodec {
    fn content_type(&self) -> &'static str {
        BINCODE_CONTENT_TYPE
    }
}

impl<T: Serialize + ?Sized> Encoder<T> for BincodeCodec {
    fn encode(&self, value: &T) -> Result<Vec<u8>, PubSubError> {
        bincode::serialize(value).map_err(|err| PubSubError::EncodeError(err.to_string()))
    }
}

impl<T: DeserializeOwned> Decoder<T> for BincodeCodec {
    fn decode(&self, payload: &[u8]) -> Result<T, PubSubError> {
        bincode::deserialize(payload).map_err(|err| PubSubError::DecodeError(err.to_string()))
    }
}
