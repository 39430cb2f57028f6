// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Routing Conventions
//!
//! Exchange names, routing keys and message shapes shared by the game server and
//! its clients. Keys follow a `<prefix>.<discriminator>` layout: private queues
//! append a per-user suffix, shared queues bind a `<prefix>.*` wildcard.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Direct exchange for exact-match keys such as `pause`
pub const EXCHANGE_PERIL_DIRECT: &str = "peril_direct";
/// Topic exchange for wildcard-capable keys
pub const EXCHANGE_PERIL_TOPIC: &str = "peril_topic";
/// Dead-letter exchange every declared queue points at
pub const EXCHANGE_PERIL_DLX: &str = "peril_dlx";
/// Queue collecting dead-lettered messages
pub const QUEUE_PERIL_DLQ: &str = "peril_dlq";

pub const PAUSE_KEY: &str = "pause";
pub const ARMY_MOVES_PREFIX: &str = "army_moves";
pub const WAR_RECOGNITIONS_PREFIX: &str = "war";
pub const GAME_LOG_SLUG: &str = "game_logs";

/// Builds a `<prefix>.<discriminator>` key or queue name.
pub fn keyed(prefix: &str, discriminator: &str) -> String {
    format!("{prefix}.{discriminator}")
}

/// Builds a topic pattern matching every single-segment discriminator of `prefix`.
pub fn wildcard(prefix: &str) -> String {
    keyed(prefix, "*")
}

/// Pause/resume broadcast.
///
/// Message shapes in this module use PascalCase field names on the wire, the
/// names the game's other clients already exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlayingState {
    pub is_paused: bool,
}

/// Log line emitted after a war resolves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GameLog {
    pub current_time: SystemTime,
    pub message: String,
    pub username: String,
}
