// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # RabbitMQ Message Publisher
//!
//! Values are encoded with the caller's codec and published best-effort: neither
//! `mandatory` nor `immediate` is set, so a message with no matching binding is
//! dropped by the broker without an error. Encoding failures never reach the broker.

use crate::{
    channel::open_channel,
    codec::{BincodeCodec, Encoder, JsonCodec},
    errors::PubSubError,
    otel,
};
use lapin::{
    options::BasicPublishOptions,
    types::{FieldTable, ShortString},
    BasicProperties, Channel, Connection,
};
use opentelemetry::Context;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error};
use uuid::Uuid;

/// Publishes `value` to `exchange` under `key`, encoded with `codec`.
///
/// Waits for the broker's publisher confirm when the channel has confirms enabled.
///
/// # Parameters
/// * `channel` - Channel to publish on; confirms are awaited when it is in confirm mode
/// * `exchange` - Target exchange; it must already exist
/// * `key` - Routing key the exchange matches bindings against
/// * `codec` - Payload format; also sets the message's content type
/// * `value` - Value to encode and publish
///
/// # Returns
/// * `Ok(())` - The broker accepted the message
/// * `Err(PubSubError::EncodeError)` - The value could not be encoded; nothing was sent
/// * `Err(PubSubError::PublishingError)` - The broker or channel refused the message
pub async fn publish<T, C>(
    channel: &Channel,
    exchange: &str,
    key: &str,
    codec: &C,
    value: &T,
) -> Result<(), PubSubError>
where
    T: ?Sized,
    C: Encoder<T> + ?Sized,
{
    let (payload, properties) = prepare(codec, value)?;

    let confirm = match channel
        .basic_publish(
            exchange,
            key,
            BasicPublishOptions {
                immediate: false,
                mandatory: false,
            },
            &payload,
            properties,
        )
        .await
    {
        Err(err) => {
            error!(error = err.to_string(), "error publishing message");
            Err(PubSubError::PublishingError(err.to_string()))
        }
        Ok(confirm) => Ok(confirm),
    }?;

    match confirm.await {
        Err(err) => {
            error!(error = err.to_string(), "error publishing message");
            Err(PubSubError::PublishingError(err.to_string()))
        }
        Ok(confirmation) if confirmation.is_nack() => {
            error!(exchange, key, "broker rejected message");
            Err(PubSubError::PublishingError("publisher confirm NACK".to_owned()))
        }
        Ok(_) => {
            debug!(exchange, key, bytes = payload.len(), "message published");
            Ok(())
        }
    }
}

/// Publishes `value` as JSON. See [`publish`].
pub async fn publish_json<T>(
    channel: &Channel,
    exchange: &str,
    key: &str,
    value: &T,
) -> Result<(), PubSubError>
where
    T: Serialize + ?Sized,
{
    publish(channel, exchange, key, &JsonCodec, value).await
}

/// Publishes `value` with the binary codec. See [`publish`].
pub async fn publish_bincode<T>(
    channel: &Channel,
    exchange: &str,
    key: &str,
    value: &T,
) -> Result<(), PubSubError>
where
    T: Serialize + ?Sized,
{
    publish(channel, exchange, key, &BincodeCodec, value).await
}

/// Encodes `value` and builds the message properties.
fn prepare<T, C>(codec: &C, value: &T) -> Result<(Vec<u8>, BasicProperties), PubSubError>
where
    T: ?Sized,
    C: Encoder<T> + ?Sized,
{
    let payload = codec.encode(value).map_err(|err| {
        error!(error = err.to_string(), "error encoding message");
        err
    })?;

    let headers = otel::inject(&Context::current());

    let properties = BasicProperties::default()
        .with_content_type(ShortString::from(codec.content_type()))
        .with_message_id(ShortString::from(Uuid::new_v4().to_string()))
        .with_headers(FieldTable::from(headers));

    Ok((payload, properties))
}

/// Publisher owning one channel.
///
/// Calls are serialized on the channel, so a `Publisher` can be shared between tasks.
pub struct Publisher {
    channel: Mutex<Channel>,
}

impl Publisher {
    /// Opens a dedicated publishing channel on `conn`.
    pub async fn new(conn: &Connection) -> Result<Publisher, PubSubError> {
        Ok(Publisher::from_channel(open_channel(conn).await?))
    }

    /// Wraps an already open channel, for instance one switched to confirm mode.
    pub fn from_channel(channel: Channel) -> Publisher {
        Publisher {
            channel: Mutex::new(channel),
        }
    }

    /// Publishes `value` on the owned channel, waiting for any concurrent
    /// publish on it to finish first. See [`publish`].
    pub async fn publish<T, C>(
        &self,
        exchange: &str,
        key: &str,
        codec: &C,
        value: &T,
    ) -> Result<(), PubSubError>
    where
        T: ?Sized,
        C: Encoder<T> + ?Sized,
    {
        let channel = self.channel.lock().await;
        publish(&channel, exchange, key, codec, value).await
    }

    /// Publishes `value` as JSON on the owned channel.
    pub async fn publish_json<T>(&self, exchange: &str, key: &str, value: &T) -> Result<(), PubSubError>
    where
        T: Serialize + ?Sized,
    {
        self.publish(exchange, key, &JsonCodec, value).await
    }

    /// Publishes `value` with the binary codec on the owned channel.
    pub async fn publish_bincode<T>(
        &self,
        exchange: &str,
        key: &str,
        value: &T,
    ) -> Result<(), PubSubError>
    where
        T: Serialize + ?Sized,
    {
        self.publish(exchange, key, &BincodeCodec, value).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        codec::{BINCODE_CONTENT_TYPE, JSON_CONTENT_TYPE},
        routing::PlayingState,
    };
    use std::collections::BTreeMap;

    #[test]
    fn tags_payload_with_codec_content_type() {
        let state = PlayingState { is_paused: true };

        let (payload, props) = prepare(&JsonCodec, &state).unwrap();
        assert_eq!(payload, br#"{"IsPaused":true}"#.to_vec());
        assert_eq!(
            props.content_type().as_ref().map(|ct| ct.as_str()),
            Some(JSON_CONTENT_TYPE)
        );

        let (_, props) = prepare(&BincodeCodec, &state).unwrap();
        assert_eq!(
            props.content_type().as_ref().map(|ct| ct.as_str()),
            Some(BINCODE_CONTENT_TYPE)
        );
    }

    #[test]
    fn every_message_gets_its_own_id() {
        let state = PlayingState { is_paused: false };

        let (_, first) = prepare(&JsonCodec, &state).unwrap();
        let (_, second) = prepare(&JsonCodec, &state).unwrap();

        assert!(first.message_id().is_some());
        assert_ne!(first.message_id(), second.message_id());
    }

    #[test]
    fn encode_failure_stops_before_publishing() {
        let mut unrepresentable = BTreeMap::new();
        unrepresentable.insert(vec![1u8], 1u8);

        assert!(matches!(
            prepare(&JsonCodec, &unrepresentable),
            Err(PubSubError::EncodeError(_))
        ));
    }

    #[test]
    fn publish_only_types_need_no_deserialize() {
        #[derive(Serialize)]
        struct WarOutcome<'a> {
            attacker: &'a str,
            defender: &'a str,
        }

        let outcome = WarOutcome {
            attacker: "alice",
            defender: "bob",
        };

        let (payload, _) = prepare(&JsonCodec, &outcome).unwrap();
        assert_eq!(payload, br#"{"attacker":"alice","defender":"bob"}"#.to_vec());

        let (_, props) = prepare(&BincodeCodec, &outcome).unwrap();
        assert_eq!(
            props.content_type().as_ref().map(|ct| ct.as_str()),
            Some(BINCODE_CONTENT_TYPE)
        );
    }
}
