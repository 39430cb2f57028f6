// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Broker Connection Settings
//!
//! Connection parameters for the shared RabbitMQ connection, deserializable
//! from a TOML document with sensible local defaults.

use crate::errors::PubSubError;
use lapin::uri::{AMQPAuthority, AMQPScheme, AMQPUri, AMQPUserInfo};
use serde::Deserialize;

/// RabbitMQ connection parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RabbitMQConfigs {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub vhost: String,
    /// Name reported to the broker for this connection
    pub connection_name: String,
}

impl Default for RabbitMQConfigs {
    fn default() -> Self {
        RabbitMQConfigs {
            host: "localhost".to_owned(),
            port: 5672,
            user: "guest".to_owned(),
            password: "guest".to_owned(),
            vhost: "/".to_owned(),
            connection_name: "pubsub".to_owned(),
        }
    }
}

impl RabbitMQConfigs {
    /// Parses the settings from a TOML document.
    ///
    /// Missing keys fall back to their defaults.
    ///
    /// # Returns
    /// * `Ok(RabbitMQConfigs)` - The parsed settings
    /// * `Err(PubSubError::ConfigError)` - The document is not valid TOML or a value has the wrong type
    pub fn from_toml(doc: &str) -> Result<Self, PubSubError> {
        toml::from_str(doc).map_err(|err| PubSubError::ConfigError(err.to_string()))
    }

    /// Builds the AMQP URI for these settings.
    ///
    /// Credentials and vhost are used as configured, so reserved characters
    /// and a leading `/` in the vhost name are kept.
    pub fn amqp_uri(&self) -> AMQPUri {
        AMQPUri {
            scheme: AMQPScheme::AMQP,
            authority: AMQPAuthority {
                userinfo: AMQPUserInfo {
                    username: self.user.clone(),
                    password: self.password.clone(),
                },
                host: self.host.clone(),
                port: self.port,
            },
            vhost: self.vhost.clone(),
            ..AMQPUri::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_uri_targets_local_broker() {
        let uri = RabbitMQConfigs::default().amqp_uri();

        assert_eq!(uri.authority.host, "localhost");
        assert_eq!(uri.authority.port, 5672);
        assert_eq!(uri.authority.userinfo.username, "guest");
        assert_eq!(uri.vhost, "/");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = RabbitMQConfigs::from_toml(
            r#"
            host = "rabbit.internal"
            vhost = "peril"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.host, "rabbit.internal");
        assert_eq!(cfg.port, 5672);

        let uri = cfg.amqp_uri();
        assert_eq!(uri.authority.host, "rabbit.internal");
        assert_eq!(uri.vhost, "peril");
    }

    #[test]
    fn leading_slash_in_vhost_is_kept() {
        let cfg = RabbitMQConfigs {
            vhost: "/peril".to_owned(),
            ..RabbitMQConfigs::default()
        };

        assert_eq!(cfg.amqp_uri().vhost, "/peril");
    }

    #[test]
    fn reserved_characters_in_credentials_are_kept() {
        let cfg = RabbitMQConfigs::from_toml(
            r#"
            user = "ops@peril"
            password = "s3/cr#t:x"
            "#,
        )
        .unwrap();

        let userinfo = cfg.amqp_uri().authority.userinfo;
        assert_eq!(userinfo.username, "ops@peril");
        assert_eq!(userinfo.password, "s3/cr#t:x");
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let err = RabbitMQConfigs::from_toml("port = \"not a number\"").unwrap_err();

        assert!(matches!(err, PubSubError::ConfigError(_)));
        assert!(!matches!(err, PubSubError::ConnectionError(_)));
    }
}
