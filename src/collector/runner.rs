use std::fmt;
use std::time::Duration;

use log::{debug, info};

use crate::error::CollectError;
use crate::listener::PayloadSource;
use crate::schema::Payload;

use super::batches::BatchTracker;

/// When a collection stops listening.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Policy {
    /// Exactly this many payloads.
    Count(usize),

    /// At least this many distinct batches, each fully drained.
    Batches(usize),

    /// Keep going until no payload arrives for this long.
    UntilIdle(Duration),
}

impl Default for Policy {
    /// One batch, as pushed by a single click in the extension.
    fn default() -> Self {
        Policy::Batches(1)
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Policy::Count(n) => write!(f, "{n} problems"),
            Policy::Batches(k) => write!(f, "{k} batches"),
            Policy::UntilIdle(t) => write!(f, "until idle for {t:?}"),
        }
    }
}

/// Drives a [`PayloadSource`] until a [`Policy`] is satisfied.
///
/// GUARANTEES:
/// - Payloads are returned in the order they were received
/// - Exactly one `receive` is outstanding at any time
/// - On error nothing is returned; payloads collected so far are dropped
///
/// NOT RESPONSIBLE FOR:
/// - Naming or writing problems (done after collection returns)
pub struct Collector<S> {
    source: S,
}

impl<S: PayloadSource> Collector<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> S {
        self.source
    }

    pub async fn collect(&mut self, policy: Policy) -> Result<Vec<Payload>, CollectError> {
        info!("Collecting {}", policy);
        match policy {
            Policy::Count(n) => self.receive_count(n).await,
            Policy::Batches(k) => self.receive_batches(k).await,
            Policy::UntilIdle(t) => self.receive_until_idle(t).await,
        }
    }

    /// Waits for exactly `n` payloads. No batch logic applies.
    pub async fn receive_count(&mut self, n: usize) -> Result<Vec<Payload>, CollectError> {
        let mut res = Vec::with_capacity(n);
        for i in 0..n {
            debug!("Waiting for problem {}/{}", i + 1, n);
            res.push(self.next_payload().await?);
        }
        Ok(res)
    }

    /// Waits until at least `num_batches` distinct batches were seen
    /// and none of them is still missing payloads.
    pub async fn receive_batches(&mut self, num_batches: usize) -> Result<Vec<Payload>, CollectError> {
        let mut res = Vec::new();
        let mut batches = BatchTracker::new();

        while !batches.is_complete(num_batches) {
            info!("Waiting for {} batches: {}", num_batches, batches);
            let cur = self.next_payload().await?;

            let info = cur.batch()?.ok_or(CollectError::MissingBatch)?;
            batches.observe(&info)?;
            res.push(cur);
        }

        Ok(res)
    }

    /// Waits for one payload unconditionally, then keeps receiving
    /// until a wait of `timeout` passes with nothing pushed.
    pub async fn receive_until_idle(&mut self, timeout: Duration) -> Result<Vec<Payload>, CollectError> {
        let mut res = vec![self.next_payload().await?];
        while let Some(cur) = self.source.receive(Some(timeout)).await? {
            res.push(cur);
        }
        debug!("Idle for {:?} after {} problems", timeout, res.len());
        Ok(res)
    }

    async fn next_payload(&mut self) -> Result<Payload, CollectError> {
        self.source
            .receive(None)
            .await?
            .ok_or(CollectError::SourceClosed)
    }
}
