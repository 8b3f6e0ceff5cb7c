//! Integration tests against a real Redis server.
//!
//! `#[ignore]`d and opted into through an environment variable, so
//! `cargo test` stays green on a machine without a server:
//!
//! ```text
//! FASTAPP_REDIS_URL=redis://localhost:6379 \
//!   cargo test -p fastapp-bus -- --ignored
//! ```

use fastapp_bus::EventBus;
use futures::StreamExt;
use std::time::Duration;

fn env_url() -> String {
    std::env::var("FASTAPP_REDIS_URL").expect("FASTAPP_REDIS_URL must be set for this test")
}

#[tokio::test]
#[ignore = "requires a Redis server (FASTAPP_REDIS_URL)"]
async fn publish_subscribe_round_trip() {
    let bus = EventBus::connect(&env_url()).await.unwrap();

    let mut stream = bus.subscribe("bus_it.orders").await.unwrap();
    let receivers = bus.publish("bus_it.orders", "created").await.unwrap();
    assert!(receivers >= 1, "subscription not counted as a receiver");

    let msg = tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("no message within timeout")
        .expect("subscription stream ended");
    assert_eq!(msg.channel, "bus_it.orders");
    assert_eq!(msg.payload, "created");
}

#[tokio::test]
#[ignore = "requires a Redis server (FASTAPP_REDIS_URL)"]
async fn subscriber_only_sees_its_channel() {
    let bus = EventBus::connect(&env_url()).await.unwrap();

    let mut stream = bus.subscribe("bus_it.media").await.unwrap();
    bus.publish("bus_it.other", "noise").await.unwrap();
    bus.publish("bus_it.media", "signal").await.unwrap();

    let msg = tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("no message within timeout")
        .expect("subscription stream ended");
    assert_eq!(msg.channel, "bus_it.media");
    assert_eq!(msg.payload, "signal");
}
