// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Acknowledgment Decisions
//!
//! Every handler answers a delivered message with an `AckType`. The consumption
//! loop turns that answer into exactly one broker call.

use crate::errors::PubSubError;
use async_trait::async_trait;
use lapin::{
    acker::Acker,
    options::{BasicAckOptions, BasicNackOptions},
};
use tracing::error;

#[cfg(test)]
use mockall::automock;

/// Outcome of handling one delivered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AckType {
    /// Accept and remove from the queue.
    Ack,
    /// Reject and let the broker redeliver it later.
    NackRequeue,
    /// Reject without redelivery; routed to the dead-letter exchange.
    NackDiscard,
}

/// Broker-side acknowledgment of a single delivery.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Acknowledge: Send + Sync {
    async fn ack(&self) -> Result<(), PubSubError>;

    async fn nack(&self, requeue: bool) -> Result<(), PubSubError>;
}

#[async_trait]
impl Acknowledge for Acker {
    async fn ack(&self) -> Result<(), PubSubError> {
        Acker::ack(self, BasicAckOptions { multiple: false })
            .await
            .map(|_| ())
            .map_err(|err| {
                error!(error = err.to_string(), "error whiling ack msg");
                PubSubError::AckMessageError
            })
    }

    async fn nack(&self, requeue: bool) -> Result<(), PubSubError> {
        Acker::nack(
            self,
            BasicNackOptions {
                multiple: false,
                requeue,
            },
        )
        .await
        .map(|_| ())
        .map_err(|err| {
            error!(error = err.to_string(), requeue, "error whiling nack msg");
            PubSubError::NackMessageError
        })
    }
}

impl AckType {
    /// Issues the broker call matching this decision.
    pub async fn apply(self, acker: &dyn Acknowledge) -> Result<(), PubSubError> {
        match self {
            AckType::Ack => acker.ack().await,
            AckType::NackRequeue => acker.nack(true).await,
            AckType::NackDiscard => acker.nack(false).await,
        }
    }
}
