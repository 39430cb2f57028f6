// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Queue Management for RabbitMQ
//!
//! This module provides the queue definitions used by the topology declarator.
//! Queues come in two lifetimes: durable shared queues and transient private
//! queues tied to a single consumer. Every queue is wired to a dead-letter exchange
//! so rejected or expired messages are redirected rather than lost.

use crate::routing::EXCHANGE_PERIL_DLX;
use lapin::{
    options::QueueDeclareOptions,
    types::{AMQPValue, FieldTable, LongString, ShortString},
};
use std::{collections::BTreeMap, fmt};

/// Queue argument naming the dead-letter exchange
pub const AMQP_HEADERS_DEAD_LETTER_EXCHANGE: &str = "x-dead-letter-exchange";

/// Lifetime mode of a queue, fixed at declaration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimpleQueueType {
    /// `durable=true, auto_delete=false, exclusive=false`
    Durable,
    /// `durable=false, auto_delete=true, exclusive=true`
    Transient,
}

impl SimpleQueueType {
    /// Builds the queue definition carrying this mode's flags and the
    /// well-known dead-letter exchange.
    pub fn definition(self, name: &str) -> QueueDefinition {
        let def = QueueDefinition::new(name).dead_letter_exchange(EXCHANGE_PERIL_DLX);
        match self {
            SimpleQueueType::Durable => def.durable(),
            SimpleQueueType::Transient => def.delete().exclusive(),
        }
    }
}

impl fmt::Display for SimpleQueueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimpleQueueType::Durable => f.write_str("durable"),
            SimpleQueueType::Transient => f.write_str("transient"),
        }
    }
}

/// Definition of a RabbitMQ queue with its configuration parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueDefinition {
    pub(crate) name: String,
    pub(crate) durable: bool,
    pub(crate) delete: bool,
    pub(crate) exclusive: bool,
    pub(crate) dead_letter_exchange: Option<String>,
}

impl QueueDefinition {
    /// Creates a non-durable, non-exclusive queue definition with no dead-lettering.
    pub fn new(name: &str) -> QueueDefinition {
        QueueDefinition {
            name: name.to_owned(),
            durable: false,
            delete: false,
            exclusive: false,
            dead_letter_exchange: None,
        }
    }

    /// Makes the queue durable, persisting across broker restarts.
    pub fn durable(mut self) -> Self {
        self.durable = true;
        self
    }

    /// Sets the queue to auto-delete when its last consumer disconnects.
    pub fn delete(mut self) -> Self {
        self.delete = true;
        self
    }

    /// Makes the queue exclusive to the declaring connection.
    pub fn exclusive(mut self) -> Self {
        self.exclusive = true;
        self
    }

    /// Redirects rejected and expired messages to `exchange`.
    pub fn dead_letter_exchange(mut self, exchange: &str) -> Self {
        self.dead_letter_exchange = Some(exchange.to_owned());
        self
    }

    pub(crate) fn options(&self) -> QueueDeclareOptions {
        QueueDeclareOptions {
            passive: false,
            durable: self.durable,
            exclusive: self.exclusive,
            auto_delete: self.delete,
            nowait: false,
        }
    }

    pub(crate) fn arguments(&self) -> FieldTable {
        let mut args = BTreeMap::new();

        if let Some(dlx) = &self.dead_letter_exchange {
            args.insert(
                ShortString::from(AMQP_HEADERS_DEAD_LETTER_EXCHANGE),
                AMQPValue::LongString(LongString::from(dlx.clone())),
            );
        }

        FieldTable::from(args)
    }
}

/// Configuration for binding a queue to an exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueBinding<'qeb> {
    pub(crate) queue_name: &'qeb str,
    pub(crate) exchange_name: &'qeb str,
    pub(crate) routing_key: &'qeb str,
}

impl<'qeb> QueueBinding<'qeb> {
    /// Creates a new binding for `queue`; exchange and key default to empty.
    pub fn new(queue: &'qeb str) -> QueueBinding<'qeb> {
        QueueBinding {
            queue_name: queue,
            exchange_name: "",
            routing_key: "",
        }
    }

    /// Sets the exchange to bind the queue to.
    pub fn exchange(mut self, exchange: &'qeb str) -> Self {
        self.exchange_name = exchange;
        self
    }

    /// Sets the routing key for the binding.
    pub fn routing_key(mut self, key: &'qeb str) -> Self {
        self.routing_key = key;
        self
    }
}

/// Handle to a queue after a successful declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredQueue {
    pub name: String,
    pub durable: bool,
    pub auto_delete: bool,
    pub exclusive: bool,
    pub message_count: u32,
    pub consumer_count: u32,
}

impl DeclaredQueue {
    pub(crate) fn new(def: &QueueDefinition, message_count: u32, consumer_count: u32) -> Self {
        DeclaredQueue {
            name: def.name.clone(),
            durable: def.durable,
            auto_delete: def.delete,
            exclusive: def.exclusive,
            message_count,
            consumer_count,
        }
    }
}
