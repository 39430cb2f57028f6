// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! Scenarios against a live broker. Run with a local RabbitMQ on the default
//! port: `cargo test -- --ignored`.

use lapin::{
    options::{BasicGetOptions, BasicPublishOptions, QueueDeleteOptions, QueuePurgeOptions},
    BasicProperties, Connection,
};
use pubsub::{
    channel::{new_amqp_connection, open_channel},
    configs::RabbitMQConfigs,
    exchange::{declare_exchange, ExchangeDefinition},
    publish_bincode, publish_json,
    routing::{
        keyed, wildcard, PlayingState, ARMY_MOVES_PREFIX, EXCHANGE_PERIL_DIRECT,
        EXCHANGE_PERIL_TOPIC, PAUSE_KEY, QUEUE_PERIL_DLQ,
    },
    subscribe_bincode, subscribe_json,
    topology::declare_dead_letter,
    declare_and_bind, AckType, PubSubError, SimpleQueueType,
};
use std::{sync::Arc, time::Duration};
use tokio::{sync::mpsc, time::timeout};

async fn setup() -> Arc<Connection> {
    let conn = new_amqp_connection(&RabbitMQConfigs::default())
        .await
        .expect("broker reachable");

    let channel = open_channel(&conn).await.unwrap();
    declare_exchange(&channel, &ExchangeDefinition::new(EXCHANGE_PERIL_DIRECT).durable())
        .await
        .unwrap();
    declare_exchange(
        &channel,
        &ExchangeDefinition::new(EXCHANGE_PERIL_TOPIC).topic().durable(),
    )
    .await
    .unwrap();
    declare_dead_letter(&channel).await.unwrap();

    conn
}

async fn delete_queue(conn: &Connection, name: &str) {
    let channel = open_channel(conn).await.unwrap();
    let _ = channel
        .queue_delete(name, QueueDeleteOptions::default())
        .await;
}

#[tokio::test]
#[ignore = "requires a running RabbitMQ broker"]
async fn redeclaring_with_same_mode_is_idempotent() {
    let conn = setup().await;
    let queue = "pubsub.it.idempotent";

    let (_, first) = declare_and_bind(&conn, EXCHANGE_PERIL_TOPIC, queue, "it.*", SimpleQueueType::Durable)
        .await
        .unwrap();
    let (_, second) =
        declare_and_bind(&conn, EXCHANGE_PERIL_TOPIC, queue, "it.*", SimpleQueueType::Durable)
            .await
            .unwrap();

    assert_eq!(first.name, second.name);
    assert!(second.durable && !second.auto_delete && !second.exclusive);

    delete_queue(&conn, queue).await;
}

#[tokio::test]
#[ignore = "requires a running RabbitMQ broker"]
async fn redeclaring_with_other_mode_is_a_topology_error() {
    let conn = setup().await;
    let queue = "pubsub.it.conflict";

    declare_and_bind(&conn, EXCHANGE_PERIL_TOPIC, queue, "it.*", SimpleQueueType::Durable)
        .await
        .unwrap();
    let err = declare_and_bind(&conn, EXCHANGE_PERIL_TOPIC, queue, "it.*", SimpleQueueType::Transient)
        .await
        .unwrap_err();

    assert!(matches!(err, PubSubError::QueueConflictError(..)));
    assert!(err.is_topology_error());

    delete_queue(&conn, queue).await;
}

#[tokio::test]
#[ignore = "requires a running RabbitMQ broker"]
async fn transient_and_durable_queues_differ() {
    let conn = setup().await;

    let (_, durable) = declare_and_bind(
        &conn,
        EXCHANGE_PERIL_TOPIC,
        "pubsub.it.durable",
        "it.durable",
        SimpleQueueType::Durable,
    )
    .await
    .unwrap();
    let (_transient_channel, transient) = declare_and_bind(
        &conn,
        EXCHANGE_PERIL_TOPIC,
        "pubsub.it.transient",
        "it.transient",
        SimpleQueueType::Transient,
    )
    .await
    .unwrap();

    assert!(durable.durable && !durable.auto_delete && !durable.exclusive);
    assert!(!transient.durable && transient.auto_delete && transient.exclusive);

    delete_queue(&conn, "pubsub.it.durable").await;
}

#[tokio::test]
#[ignore = "requires a running RabbitMQ broker"]
async fn pause_is_delivered_and_acked_once() {
    let conn = setup().await;
    let queue = keyed(PAUSE_KEY, "alice");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let subscription = subscribe_json(
        &conn,
        EXCHANGE_PERIL_DIRECT,
        &queue,
        PAUSE_KEY,
        SimpleQueueType::Transient,
        move |state: PlayingState| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(state);
                AckType::Ack
            }
        },
    )
    .await
    .unwrap();

    let channel = open_channel(&conn).await.unwrap();
    publish_json(
        &channel,
        EXCHANGE_PERIL_DIRECT,
        PAUSE_KEY,
        &PlayingState { is_paused: true },
    )
    .await
    .unwrap();

    let received = timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
    assert_eq!(received, Some(PlayingState { is_paused: true }));

    // an acked message is never redelivered
    assert!(timeout(Duration::from_millis(500), rx.recv()).await.is_err());

    subscription.cancel();
    subscription.join().await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running RabbitMQ broker"]
async fn undecodable_payload_is_dead_lettered_once() {
    let conn = setup().await;
    let queue = "pubsub.it.undecodable";
    let key = "it.undecodable";

    let dlq = open_channel(&conn).await.unwrap();
    dlq.queue_purge(QUEUE_PERIL_DLQ, QueuePurgeOptions::default())
        .await
        .unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let subscription = subscribe_json(
        &conn,
        EXCHANGE_PERIL_TOPIC,
        queue,
        key,
        SimpleQueueType::Transient,
        move |state: PlayingState| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(state);
                AckType::Ack
            }
        },
    )
    .await
    .unwrap();

    let channel = open_channel(&conn).await.unwrap();
    channel
        .basic_publish(
            EXCHANGE_PERIL_TOPIC,
            key,
            BasicPublishOptions::default(),
            b"\x00not-json",
            BasicProperties::default(),
        )
        .await
        .unwrap()
        .await
        .unwrap();

    assert!(timeout(Duration::from_millis(500), rx.recv()).await.is_err());

    let dead = timeout(Duration::from_secs(5), async {
        loop {
            if let Some(msg) = dlq
                .basic_get(QUEUE_PERIL_DLQ, BasicGetOptions { no_ack: true })
                .await
                .unwrap()
            {
                return msg;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(dead.delivery.data, b"\x00not-json".to_vec());

    subscription.cancel();
    subscription.join().await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running RabbitMQ broker"]
async fn handler_sees_messages_in_publish_order() {
    let conn = setup().await;
    let queue = keyed(ARMY_MOVES_PREFIX, "it");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let subscription = subscribe_bincode(
        &conn,
        EXCHANGE_PERIL_TOPIC,
        &queue,
        &wildcard(ARMY_MOVES_PREFIX),
        SimpleQueueType::Transient,
        move |n: u32| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(n);
                AckType::Ack
            }
        },
    )
    .await
    .unwrap();

    let channel = open_channel(&conn).await.unwrap();
    for n in 0..20u32 {
        publish_bincode(&channel, EXCHANGE_PERIL_TOPIC, &keyed(ARMY_MOVES_PREFIX, "alice"), &n)
            .await
            .unwrap();
    }

    let mut seen = vec![];
    while seen.len() < 20 {
        let n = timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
        seen.push(n);
    }

    assert_eq!(seen, (0..20).collect::<Vec<_>>());

    subscription.cancel();
    subscription.join().await.unwrap();
}
