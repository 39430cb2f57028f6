// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Error Types for the Pub/Sub Layer
//!
//! This module provides the error taxonomy for every synchronous pub/sub operation:
//! connection and channel setup, topology declaration, encoding and publishing.
//! Failures that happen inside a running consumption loop have no caller to be
//! returned to; they are logged and resolved by the loop itself.

use thiserror::Error;

/// Represents errors that can occur during pub/sub operations.
///
/// Variants carry the broker or codec message so callers can log them without
/// holding on to the underlying `lapin` error.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PubSubError {
    /// Invalid connection settings
    #[error("invalid settings `{0}`")]
    ConfigError(String),

    /// Error establishing a connection to the RabbitMQ server
    #[error("failure to connect `{0}`")]
    ConnectionError(String),

    /// Error creating a channel from an established connection
    #[error("failure to create a channel `{0}`")]
    ChannelError(String),

    /// Error declaring an exchange with the given name
    #[error("failure to declare an exchange `{0}`")]
    DeclareExchangeError(String),

    /// Error declaring a queue with the given name
    #[error("failure to declare a queue `{0}`: {1}")]
    DeclareQueueError(String, String),

    /// The queue already exists with different flags or arguments
    #[error("queue `{0}` already exists with conflicting flags: {1}")]
    QueueConflictError(String, String),

    /// Error binding a queue to an exchange
    #[error("failure to bind queue `{1}` to exchange `{0}`")]
    BindingExchangeToQueueError(String, String),

    /// Error registering a consumer on a queue
    #[error("failure to declare consumer on queue `{0}`")]
    ConsumerDeclarationError(String),

    /// Error serializing a value before publishing
    #[error("failure to encode payload: {0}")]
    EncodeError(String),

    /// Error deserializing a received payload
    #[error("failure to decode payload: {0}")]
    DecodeError(String),

    /// Error publishing a message
    #[error("failure to publish: {0}")]
    PublishingError(String),

    /// Error acknowledging a message
    #[error("failure to ack message")]
    AckMessageError,

    /// Error negative-acknowledging a message
    #[error("failure to nack message")]
    NackMessageError,

    /// Error reading from a consumer stream
    #[error("failure to consume message `{0}`")]
    ConsumerError(String),
}

impl PubSubError {
    /// Whether the error came from declaring or binding a queue.
    pub fn is_topology_error(&self) -> bool {
        matches!(
            self,
            PubSubError::DeclareQueueError(..)
                | PubSubError::QueueConflictError(..)
                | PubSubError::BindingExchangeToQueueError(..)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_topology_errors() {
        assert!(PubSubError::QueueConflictError("q".into(), "x".into()).is_topology_error());
        assert!(PubSubError::DeclareQueueError("q".into(), "x".into()).is_topology_error());
        assert!(
            PubSubError::BindingExchangeToQueueError("ex".into(), "q".into()).is_topology_error()
        );
        assert!(!PubSubError::EncodeError("x".into()).is_topology_error());
        assert!(!PubSubError::ConnectionError("x".into()).is_topology_error());
        assert!(!PubSubError::ConfigError("x".into()).is_topology_error());
    }

    #[test]
    fn binding_error_names_both_sides() {
        let err = PubSubError::BindingExchangeToQueueError("peril_topic".into(), "war".into());
        assert_eq!(
            err.to_string(),
            "failure to bind queue `war` to exchange `peril_topic`"
        );
    }
}
