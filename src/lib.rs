// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! Typed publish/subscribe over RabbitMQ.
//!
//! Producers publish values through a [`codec::Encoder`]; subscribers run a
//! per-queue consumption loop that decodes each delivery, calls the application
//! handler and applies its [`ack::AckType`] to the broker.

mod otel;

pub mod ack;
pub mod channel;
pub mod codec;
pub mod configs;
pub mod consumer;
pub mod errors;
pub mod exchange;
pub mod publisher;
pub mod queue;
pub mod routing;
pub mod subscriber;
pub mod topology;

pub use ack::AckType;
pub use codec::{BincodeCodec, Codec, Decoder, Encoder, JsonCodec};
pub use errors::PubSubError;
pub use publisher::{publish, publish_bincode, publish_json, Publisher};
pub use queue::SimpleQueueType;
pub use subscriber::{subscribe, subscribe_bincode, subscribe_json, SubscribeDefinition, Subscription};
pub use topology::declare_and_bind;
