//! # Bus RPC Client
//!
//! Turns the one-way broker into a synchronous-looking request/reply
//! primitive. Each call publishes to the target queue with a fresh
//! correlation id and the client's private reply queue in `replyTo`, then
//! parks on an in-memory slot until the dedicated reply consumer hands the
//! matching body back.
//!
//! ## Rust Concepts Used
//!
//! - `oneshot` channels are the pending slots: the consumer completes a call
//!   by moving the reply body into the waiter's half
//! - `DashMap` shards the correlation map so concurrent calls never contend
//!   on one lock
//! - `CancellationToken` propagates HTTP-connection cancellation into a
//!   pending call; a dropped call future cleans its slot up via a guard, so
//!   the map cannot leak entries
//! - `async_trait` puts the client behind a trait object, which is what lets
//!   the test suite run the whole HTTP pipeline against an in-memory broker

use crate::core::config::RabbitMqSettings;
use crate::core::error::{GatewayError, GatewayResult};
use async_trait::async_trait;
use dashmap::DashMap;
use futures::StreamExt;
use lapin::options::{BasicConsumeOptions, BasicPublishOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// Request/reply client over the message bus
///
/// `call` is safe to invoke concurrently from any number of tasks; each call
/// is independent and correlation is the only binding between a request and
/// its reply. The client imposes no timeout of its own; callers attach
/// deadlines through the cancellation token.
#[async_trait]
pub trait RpcClient: Send + Sync {
    /// Publish `payload` to `queue` and await the correlated reply body
    async fn call(
        &self,
        queue: &str,
        payload: Vec<u8>,
        cancel: CancellationToken,
    ) -> GatewayResult<Vec<u8>>;
}

/// Correlation map of in-flight calls
///
/// Shared between call sites (which register slots) and the reply consumer
/// (which completes them). Lookup and removal are O(1).
#[derive(Default)]
pub struct CorrelationMap {
    pending: DashMap<String, oneshot::Sender<Vec<u8>>>,
}

impl CorrelationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending slot for `correlation_id` and return the waiter half
    ///
    /// Registration happens **before** the publish so a reply can never race
    /// past its waiter.
    pub fn register(&self, correlation_id: &str) -> oneshot::Receiver<Vec<u8>> {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(correlation_id.to_string(), tx);
        rx
    }

    /// Hand a reply body to the waiter registered under `correlation_id`
    ///
    /// Returns `false` when no slot exists (late reply after cancellation, or
    /// a correlation id this client never issued); such replies are dropped.
    pub fn complete(&self, correlation_id: &str, body: Vec<u8>) -> bool {
        match self.pending.remove(correlation_id) {
            Some((_, tx)) => tx.send(body).is_ok(),
            None => false,
        }
    }

    /// Remove a slot without completing it (cancellation path)
    pub fn remove(&self, correlation_id: &str) -> bool {
        self.pending.remove(correlation_id).is_some()
    }

    /// Number of in-flight calls
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Removes the correlation slot when a call unwinds without a reply
///
/// Covers both explicit cancellation and the handler future being dropped
/// mid-flight (client disconnect); a completed call disarms the guard.
struct SlotGuard<'a> {
    map: &'a CorrelationMap,
    correlation_id: &'a str,
    armed: bool,
}

impl<'a> SlotGuard<'a> {
    fn new(map: &'a CorrelationMap, correlation_id: &'a str) -> Self {
        Self {
            map,
            correlation_id,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.map.remove(self.correlation_id);
        }
    }
}

/// AMQP implementation of [`RpcClient`] on top of `lapin`
///
/// Owns one long-lived connection, a single publisher channel shared by all
/// callers (lapin serializes publishes internally), and a consumer on an
/// exclusive server-named reply queue. Connection recovery is delegated to
/// the broker library; a connection lost beyond recovery surfaces as
/// `BrokerUnavailable` on in-flight and subsequent calls.
pub struct AmqpRpcClient {
    publish_channel: Channel,
    reply_queue: String,
    correlations: Arc<CorrelationMap>,
}

impl AmqpRpcClient {
    /// Connect to the broker and set up the reply path
    pub async fn connect(settings: &RabbitMqSettings) -> GatewayResult<Self> {
        let uri = settings.amqp_uri();
        info!(hostname = %settings.hostname, "Connecting to message broker");

        let connection = tokio::time::timeout(
            Duration::from_secs(settings.timeout),
            Connection::connect(&uri, ConnectionProperties::default()),
        )
        .await
        .map_err(|_| GatewayError::BrokerUnavailable {
            reason: format!("connect timed out after {}s", settings.timeout),
        })??;

        let publish_channel = connection.create_channel().await?;
        let consume_channel = connection.create_channel().await?;

        // Exclusive server-named queue; the broker deletes it with the connection.
        let reply_queue = consume_channel
            .queue_declare(
                "",
                QueueDeclareOptions {
                    exclusive: true,
                    auto_delete: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await?
            .name()
            .as_str()
            .to_string();

        let consumer = consume_channel
            .basic_consume(
                &reply_queue,
                "gateway-reply-consumer",
                BasicConsumeOptions {
                    no_ack: true,
                    ..BasicConsumeOptions::default()
                },
                FieldTable::default(),
            )
            .await?;

        let correlations = Arc::new(CorrelationMap::new());
        Self::spawn_reply_pump(consumer, Arc::clone(&correlations));

        info!(reply_queue = %reply_queue, "Message broker connected");

        Ok(Self {
            publish_channel,
            reply_queue,
            correlations,
        })
    }

    /// Dedicated consumer task: demultiplex replies onto their waiters
    fn spawn_reply_pump(mut consumer: lapin::Consumer, correlations: Arc<CorrelationMap>) {
        tokio::spawn(async move {
            while let Some(delivery) = consumer.next().await {
                match delivery {
                    Ok(delivery) => {
                        let Some(correlation_id) = delivery.properties.correlation_id() else {
                            warn!("Reply without correlation id dropped");
                            continue;
                        };
                        if !correlations.complete(correlation_id.as_str(), delivery.data) {
                            // Late reply after cancellation; dropping it is the contract.
                            trace!(correlation_id = %correlation_id.as_str(), "Dropped uncorrelated reply");
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Reply consumer failed; stopping demultiplexer");
                        break;
                    }
                }
            }
        });
    }

    /// In-flight call count, exposed for diagnostics and tests
    pub fn pending_calls(&self) -> usize {
        self.correlations.len()
    }
}

#[async_trait]
impl RpcClient for AmqpRpcClient {
    async fn call(
        &self,
        queue: &str,
        payload: Vec<u8>,
        cancel: CancellationToken,
    ) -> GatewayResult<Vec<u8>> {
        let correlation_id = Uuid::new_v4().to_string();

        // Register before publishing so the reply cannot beat the slot.
        let mut reply_rx = self.correlations.register(&correlation_id);
        let mut guard = SlotGuard::new(&self.correlations, &correlation_id);

        let properties = BasicProperties::default()
            .with_correlation_id(correlation_id.clone().into())
            .with_reply_to(self.reply_queue.clone().into());

        debug!(queue = %queue, correlation_id = %correlation_id, "Publishing RPC request");

        // Publisher confirms are not enabled; the returned confirmation
        // resolves immediately and is not awaited.
        let _confirm = self
            .publish_channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                &payload,
                properties,
            )
            .await
            .map_err(|e| GatewayError::PublishFailed {
                queue: queue.to_string(),
                reason: e.to_string(),
            })?;

        tokio::select! {
            reply = &mut reply_rx => {
                match reply {
                    Ok(body) => {
                        guard.disarm();
                        Ok(body)
                    }
                    // The consumer task dropped the sender: the connection is gone.
                    Err(_) => Err(GatewayError::BrokerUnavailable {
                        reason: "reply channel closed".to_string(),
                    }),
                }
            }
            _ = cancel.cancelled() => {
                // Guard drop removes the slot; the publish is not retracted.
                debug!(correlation_id = %correlation_id, "RPC cancelled by caller");
                Err(GatewayError::Cancelled)
            }
        }
    }
}
