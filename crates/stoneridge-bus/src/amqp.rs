//! AMQP 0.9.1 backend via `amiquip`, stoneridge's concrete message bus.

use std::time::Duration;

use amiquip::{
    AmqpProperties, Connection, ConsumerMessage, ConsumerOptions, Exchange, Publish,
    QueueDeclareOptions,
};
use stoneridge_types::{Result, StoneRidgeError};

use crate::traits::{QueueListener, QueueWriter, Rpc};

/// A single blocking AMQP connection, reused for publish and consume.
/// Stoneridge's daemons each own one `AmqpBus` for their whole lifetime.
pub struct AmqpBus {
    connection: std::sync::Mutex<Connection>,
}

impl AmqpBus {
    pub fn connect(url: &str) -> Result<Self> {
        let connection = Connection::insecure_open(url)
            .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to connect to bus at {url}: {e}")))?;
        Ok(Self { connection: std::sync::Mutex::new(connection) })
    }

    pub fn close(self) -> Result<()> {
        let connection = self.connection.into_inner().map_err(|_| {
            StoneRidgeError::Other(anyhow::anyhow!("bus connection mutex poisoned"))
        })?;
        connection
            .close()
            .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to close bus connection: {e}")))
    }
}

impl QueueWriter for AmqpBus {
    fn publish(&self, queue: &str, body: &[u8]) -> Result<()> {
        let mut connection = self
            .connection
            .lock()
            .map_err(|_| StoneRidgeError::Other(anyhow::anyhow!("bus connection mutex poisoned")))?;
        let channel = connection
            .open_channel(None)
            .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to open bus channel: {e}")))?;
        channel
            .queue_declare(queue, QueueDeclareOptions { durable: true, ..Default::default() })
            .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to declare queue '{queue}': {e}")))?;

        let properties = AmqpProperties::default().with_delivery_mode(2);
        Exchange::direct(&channel)
            .publish(Publish {
                body,
                routing_key: queue.to_string(),
                mandatory: false,
                immediate: false,
                properties,
            })
            .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to publish to '{queue}': {e}")))?;
        Ok(())
    }
}

impl QueueListener for AmqpBus {
    fn run(
        &self,
        queue: &str,
        should_stop: &mut dyn FnMut() -> bool,
        handler: &mut dyn FnMut(&[u8]) -> Result<()>,
    ) -> Result<()> {
        let mut connection = self
            .connection
            .lock()
            .map_err(|_| StoneRidgeError::Other(anyhow::anyhow!("bus connection mutex poisoned")))?;
        let channel = connection
            .open_channel(None)
            .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to open bus channel: {e}")))?;
        channel
            .queue_declare(queue, QueueDeclareOptions { durable: true, ..Default::default() })
            .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to declare queue '{queue}': {e}")))?;
        channel
            .qos(0, 1, false)
            .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to set prefetch on '{queue}': {e}")))?;

        let consumer = channel
            .queue_declare(queue, QueueDeclareOptions { durable: true, ..Default::default() })
            .and_then(|q| q.consume(ConsumerOptions::default()))
            .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to consume '{queue}': {e}")))?;

        for message in consumer.receiver() {
            if should_stop() {
                break;
            }
            match message {
                ConsumerMessage::Delivery(delivery) => {
                    let outcome = handler(&delivery.body);
                    match outcome {
                        Ok(()) => {
                            consumer.ack(delivery).map_err(|e| {
                                StoneRidgeError::Other(anyhow::anyhow!("failed to ack message on '{queue}': {e}"))
                            })?;
                        }
                        Err(e) => {
                            tracing::warn!(queue, error = %e, "handler failed, leaving message unacked for redelivery");
                            consumer.nack(delivery, true).map_err(|e2| {
                                StoneRidgeError::Other(anyhow::anyhow!("failed to nack message on '{queue}': {e2}"))
                            })?;
                        }
                    }
                }
                ConsumerMessage::ServerClosedChannel(_)
                | ConsumerMessage::ServerClosedConnection(_)
                | ConsumerMessage::ClientCancelled => break,
                _ => {}
            }
        }
        Ok(())
    }
}

impl Rpc for AmqpBus {
    fn call(&self, queue: &str, body: &[u8], timeout: Duration) -> Result<Vec<u8>> {
        let mut connection = self
            .connection
            .lock()
            .map_err(|_| StoneRidgeError::Other(anyhow::anyhow!("bus connection mutex poisoned")))?;
        let channel = connection
            .open_channel(None)
            .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to open bus channel: {e}")))?;

        let reply_queue = channel
            .queue_declare("", QueueDeclareOptions { exclusive: true, auto_delete: true, ..Default::default() })
            .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to declare reply queue: {e}")))?;

        let properties = AmqpProperties::default()
            .with_delivery_mode(2)
            .with_reply_to(reply_queue.name().to_string());
        Exchange::direct(&channel)
            .publish(Publish {
                body,
                routing_key: queue.to_string(),
                mandatory: false,
                immediate: false,
                properties,
            })
            .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to publish rpc to '{queue}': {e}")))?;

        let consumer = reply_queue
            .consume(ConsumerOptions::default())
            .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to consume reply queue: {e}")))?;

        let deadline = std::time::Instant::now() + timeout;
        for message in consumer.receiver() {
            if std::time::Instant::now() >= deadline {
                break;
            }
            if let ConsumerMessage::Delivery(delivery) = message {
                let body = delivery.body.clone();
                consumer.ack(delivery).ok();
                return Ok(body);
            }
        }
        Err(StoneRidgeError::Other(anyhow::anyhow!("rpc call to '{queue}' timed out after {timeout:?}")))
    }
}
