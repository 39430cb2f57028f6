// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Exchange Management for RabbitMQ
//!
//! Exchanges are not created by the pub/sub core; they are expected to exist.
//! This module describes them and offers a declaration helper for the setup
//! code that owns them.

use crate::errors::PubSubError;
use lapin::{options::ExchangeDeclareOptions, types::FieldTable, Channel};
use tracing::{debug, error};

/// Routing discipline of an exchange.
///
/// - Direct: exact match of routing keys
/// - Topic: dot-delimited keys with `*` and `#` wildcards
/// - Fanout: every bound queue, routing key ignored
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExchangeKind {
    #[default]
    Direct,
    Topic,
    Fanout,
}

impl From<ExchangeKind> for lapin::ExchangeKind {
    fn from(kind: ExchangeKind) -> Self {
        match kind {
            ExchangeKind::Direct => lapin::ExchangeKind::Direct,
            ExchangeKind::Topic => lapin::ExchangeKind::Topic,
            ExchangeKind::Fanout => lapin::ExchangeKind::Fanout,
        }
    }
}

/// Definition of a RabbitMQ exchange with its configuration parameters.
#[derive(Debug, Clone)]
pub struct ExchangeDefinition<'ex> {
    pub(crate) name: &'ex str,
    pub(crate) kind: ExchangeKind,
    pub(crate) durable: bool,
}

impl<'ex> ExchangeDefinition<'ex> {
    /// Creates a new non-durable direct exchange definition.
    pub fn new(name: &'ex str) -> ExchangeDefinition<'ex> {
        ExchangeDefinition {
            name,
            kind: ExchangeKind::Direct,
            durable: false,
        }
    }

    /// Sets the exchange type to Topic.
    pub fn topic(mut self) -> Self {
        self.kind = ExchangeKind::Topic;
        self
    }

    /// Sets the exchange type to Fanout.
    pub fn fanout(mut self) -> Self {
        self.kind = ExchangeKind::Fanout;
        self
    }

    /// Makes the exchange durable, persisting across broker restarts.
    pub fn durable(mut self) -> Self {
        self.durable = true;
        self
    }

    pub(crate) fn options(&self) -> ExchangeDeclareOptions {
        ExchangeDeclareOptions {
            passive: false,
            durable: self.durable,
            auto_delete: false,
            internal: false,
            nowait: false,
        }
    }
}

/// Declares the exchange described by `def` on `channel`.
///
/// Redeclaring an identical exchange is a no-op on the broker.
///
/// # Returns
/// * `Ok(())` - The exchange exists with the requested kind and flags
/// * `Err(PubSubError::DeclareExchangeError)` - The broker refused the declaration
pub async fn declare_exchange(
    channel: &Channel,
    def: &ExchangeDefinition<'_>,
) -> Result<(), PubSubError> {
    debug!("creating exchange: {}", def.name);

    match channel
        .exchange_declare(
            def.name,
            def.kind.into(),
            def.options(),
            FieldTable::default(),
        )
        .await
    {
        Err(err) => {
            error!(
                error = err.to_string(),
                name = def.name,
                "error to declare the exchange"
            );
            Err(PubSubError::DeclareExchangeError(def.name.to_owned()))
        }
        _ => {
            debug!("exchange: {} was created", def.name);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_kinds_to_lapin() {
        assert!(matches!(
            lapin::ExchangeKind::from(ExchangeKind::Topic),
            lapin::ExchangeKind::Topic
        ));
        assert!(matches!(
            lapin::ExchangeKind::from(ExchangeKind::default()),
            lapin::ExchangeKind::Direct
        ));
    }

    #[test]
    fn builder_sets_flags() {
        let def = ExchangeDefinition::new("peril_dlx").fanout().durable();
        let opts = def.options();

        assert_eq!(def.kind, ExchangeKind::Fanout);
        assert!(opts.durable);
        assert!(!opts.auto_delete);
        assert!(!opts.passive);
    }
}
