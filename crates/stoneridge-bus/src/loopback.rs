//! In-memory bus double for tests: a lightweight concrete stand-in paired
//! with the bus trait so crates that depend on it can be tested without a
//! running broker.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use stoneridge_types::{Result, StoneRidgeError};

use crate::traits::{QueueListener, QueueWriter, Rpc};

#[derive(Default)]
struct Queues {
    messages: HashMap<String, VecDeque<Vec<u8>>>,
}

/// An in-process queue broker. Cloning shares the same underlying state
/// (it's an `Arc` handle), so a test can hold one `LoopbackBus`, pass clones
/// to a writer and a listener, and assert on delivery.
#[derive(Clone)]
pub struct LoopbackBus {
    queues: Arc<Mutex<Queues>>,
    notify: Arc<Condvar>,
    responders: Arc<Mutex<HashMap<String, Box<dyn Fn(&[u8]) -> Vec<u8> + Send + Sync>>>>,
}

impl Default for LoopbackBus {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackBus {
    pub fn new() -> Self {
        Self {
            queues: Arc::new(Mutex::new(Queues::default())),
            notify: Arc::new(Condvar::new()),
            responders: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Depth of `queue`, for test assertions.
    pub fn len(&self, queue: &str) -> usize {
        self.queues
            .lock()
            .unwrap()
            .messages
            .get(queue)
            .map(VecDeque::len)
            .unwrap_or(0)
    }

    pub fn is_empty(&self, queue: &str) -> bool {
        self.len(queue) == 0
    }

    /// Pop the oldest queued message's body, for test assertions that need
    /// to inspect the published payload rather than just its presence.
    pub fn pop(&self, queue: &str) -> Option<Vec<u8>> {
        self.queues.lock().unwrap().messages.get_mut(queue).and_then(VecDeque::pop_front)
    }

    /// Register a handler that answers `Rpc::call`s made against `queue`
    /// in-process, without any actual round trip.
    pub fn register_responder(&self, queue: &str, handler: impl Fn(&[u8]) -> Vec<u8> + Send + Sync + 'static) {
        self.responders.lock().unwrap().insert(queue.to_string(), Box::new(handler));
    }
}

impl QueueWriter for LoopbackBus {
    fn publish(&self, queue: &str, body: &[u8]) -> Result<()> {
        let mut queues = self
            .queues
            .lock()
            .map_err(|_| StoneRidgeError::Other(anyhow::anyhow!("loopback bus mutex poisoned")))?;
        queues.messages.entry(queue.to_string()).or_default().push_back(body.to_vec());
        self.notify.notify_all();
        Ok(())
    }
}

impl QueueListener for LoopbackBus {
    fn run(
        &self,
        queue: &str,
        should_stop: &mut dyn FnMut() -> bool,
        handler: &mut dyn FnMut(&[u8]) -> Result<()>,
    ) -> Result<()> {
        loop {
            if should_stop() {
                return Ok(());
            }
            let message = {
                let mut queues = self
                    .queues
                    .lock()
                    .map_err(|_| StoneRidgeError::Other(anyhow::anyhow!("loopback bus mutex poisoned")))?;
                let popped = queues.messages.entry(queue.to_string()).or_default().pop_front();
                if popped.is_none() {
                    let (guard, timeout_result) = self
                        .notify
                        .wait_timeout(queues, Duration::from_millis(50))
                        .map_err(|_| StoneRidgeError::Other(anyhow::anyhow!("loopback bus condvar poisoned")))?;
                    drop(guard);
                    let _ = timeout_result;
                    continue;
                }
                popped
            };
            if let Some(body) = message {
                // At-least-once semantics: a handler error re-enqueues the
                // message at the back rather than dropping it, matching the
                // broker backend's nack-and-requeue behavior.
                if let Err(e) = handler(&body) {
                    tracing::warn!(queue, error = %e, "handler failed, requeuing message");
                    let mut queues = self
                        .queues
                        .lock()
                        .map_err(|_| StoneRidgeError::Other(anyhow::anyhow!("loopback bus mutex poisoned")))?;
                    queues.messages.entry(queue.to_string()).or_default().push_back(body);
                }
            }
        }
    }
}

impl Rpc for LoopbackBus {
    fn call(&self, queue: &str, body: &[u8], timeout: Duration) -> Result<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(responder) = self.responders.lock().unwrap().get(queue) {
                return Ok(responder(body));
            }
            if Instant::now() >= deadline {
                return Err(StoneRidgeError::Other(anyhow::anyhow!(
                    "no responder registered for rpc queue '{queue}'"
                )));
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_then_run_delivers_and_acks() {
        let bus = LoopbackBus::new();
        bus.publish("q", b"hello").unwrap();
        assert_eq!(bus.len("q"), 1);

        let mut delivered = Vec::new();
        let mut calls = 0;
        bus.run(
            "q",
            &mut || {
                calls += 1;
                calls > 1
            },
            &mut |body| {
                delivered.push(body.to_vec());
                Ok(())
            },
        )
        .unwrap();

        assert_eq!(delivered, vec![b"hello".to_vec()]);
        assert!(bus.is_empty("q"));
    }

    #[test]
    fn failed_handler_requeues_message() {
        let bus = LoopbackBus::new();
        bus.publish("q", b"retry-me").unwrap();

        let mut attempts = 0;
        let mut stop_calls = 0;
        bus.run(
            "q",
            &mut || {
                stop_calls += 1;
                stop_calls > 2
            },
            &mut |_body| {
                attempts += 1;
                if attempts == 1 {
                    Err(StoneRidgeError::Other(anyhow::anyhow!("boom")))
                } else {
                    Ok(())
                }
            },
        )
        .unwrap();

        assert_eq!(attempts, 2);
    }

    #[test]
    fn rpc_call_invokes_registered_responder() {
        let bus = LoopbackBus::new();
        bus.register_responder("echo", |body| body.to_vec());
        let reply = bus.call("echo", b"ping", Duration::from_millis(200)).unwrap();
        assert_eq!(reply, b"ping");
    }

    #[test]
    fn rpc_call_times_out_without_responder() {
        let bus = LoopbackBus::new();
        let err = bus.call("nobody-home", b"ping", Duration::from_millis(20)).unwrap_err();
        assert!(matches!(err, StoneRidgeError::Other(_)));
    }
}
