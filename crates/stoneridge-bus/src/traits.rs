//! Queue contracts every bus backend implements.

use std::time::Duration;

use stoneridge_types::Result;

/// Publish a message onto a named, durable queue. Implementations must set
/// the message's delivery mode to persistent so a broker restart does not
/// drop in-flight work (spec §4.2).
pub trait QueueWriter: Send + Sync {
    fn publish(&self, queue: &str, body: &[u8]) -> Result<()>;
}

/// Consume a named queue with prefetch 1, invoking `handler` for each
/// message and acking only after `handler` returns `Ok(())` (spec §4.2,
/// §5's at-least-once delivery invariant). `run` blocks until the handler
/// returns an error, the connection drops, or `should_stop` returns true
/// between messages.
pub trait QueueListener: Send + Sync {
    fn run(
        &self,
        queue: &str,
        should_stop: &mut dyn FnMut() -> bool,
        handler: &mut dyn FnMut(&[u8]) -> Result<()>,
    ) -> Result<()>;
}

/// Correlation-id request/reply over the bus. Modeled as
/// a documented alternative to fire-and-forget fan-out; stoneridge's
/// master → scheduler → worker path uses `QueueWriter`/`QueueListener`
/// exclusively (see the Open Question decision in DESIGN.md), but the
/// contract is kept and tested for components that may need a synchronous
/// round trip later.
pub trait Rpc: Send + Sync {
    fn call(&self, queue: &str, body: &[u8], timeout: Duration) -> Result<Vec<u8>>;
}
