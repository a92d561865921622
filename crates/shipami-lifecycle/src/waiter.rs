//! Resource waiter
//!
//! Polls images and snapshots until they reach a terminal state, backing off
//! according to the configured [`WaitPolicy`] and giving up once its timeout
//! is exceeded.

use shipami_core::{Error, ImageState, Result, SnapshotState, WaitPolicy};
use tokio::time::{sleep, Instant};
use tracing::{debug, Instrument, Span};

use crate::resource::{ImageRef, SnapshotRef};

struct Backoff<'a> {
    policy: &'a WaitPolicy,
    started: Instant,
    attempt: u32,
}

impl<'a> Backoff<'a> {
    fn new(policy: &'a WaitPolicy) -> Self {
        Self {
            policy,
            started: Instant::now(),
            attempt: 0,
        }
    }

    /// Sleep before the next poll, or fail once the bound is exceeded
    async fn pause(&mut self, resource_id: &str, target: &str) -> Result<()> {
        let waited = self.started.elapsed();
        if let Some(timeout) = self.policy.timeout() {
            if waited >= timeout {
                return Err(Error::wait_timeout(resource_id, target, waited));
            }
        }

        self.attempt += 1;
        let delay = self.policy.delay_for_attempt(self.attempt);
        debug!(
            "{} not yet {}, polling again in {:?}",
            resource_id, target, delay
        );
        sleep(delay).await;
        Ok(())
    }
}

/// Blocks until images or snapshots settle
#[derive(Debug, Clone)]
pub struct ResourceWaiter {
    policy: WaitPolicy,
    span: Span,
}

impl ResourceWaiter {
    pub fn new(policy: WaitPolicy, span: Span) -> Self {
        Self { policy, span }
    }

    /// Wait until the image reports `target`, leaving a fresh view cached
    ///
    /// An image that fails while waiting for another state is an error.
    pub async fn wait_for_image(&self, image: &mut ImageRef, target: ImageState) -> Result<()> {
        self.poll_image(image, target)
            .instrument(self.span.clone())
            .await
    }

    /// Wait until the image is `available` or `failed`, returning which
    pub async fn wait_until_settled(&self, image: &mut ImageRef) -> Result<ImageState> {
        self.poll_settled(image).instrument(self.span.clone()).await
    }

    /// Wait until the snapshot is `completed` or `error`
    ///
    /// Both are terminal; the caller decides what `error` means.
    pub async fn wait_for_snapshot(&self, snapshot: &mut SnapshotRef) -> Result<SnapshotState> {
        self.poll_snapshot(snapshot)
            .instrument(self.span.clone())
            .await
    }

    async fn poll_image(&self, image: &mut ImageRef, target: ImageState) -> Result<()> {
        let mut backoff = Backoff::new(&self.policy);
        loop {
            let state = image.refresh().await?.state;
            if state == target {
                debug!("{} is {}", image.id(), state);
                return Ok(());
            }
            if state == ImageState::Failed {
                return Err(Error::remote(format!(
                    "Image {} entered state failed",
                    image.id()
                )));
            }
            backoff.pause(image.id(), target.as_str()).await?;
        }
    }

    async fn poll_settled(&self, image: &mut ImageRef) -> Result<ImageState> {
        let mut backoff = Backoff::new(&self.policy);
        loop {
            let state = image.refresh().await?.state;
            if matches!(state, ImageState::Available | ImageState::Failed) {
                debug!("{} settled as {}", image.id(), state);
                return Ok(state);
            }
            backoff.pause(image.id(), "available or failed").await?;
        }
    }

    async fn poll_snapshot(&self, snapshot: &mut SnapshotRef) -> Result<SnapshotState> {
        let mut backoff = Backoff::new(&self.policy);
        loop {
            let state = snapshot.refresh().await?.state;
            if state.is_terminal() {
                debug!("{} is {}", snapshot.id(), state);
                return Ok(state);
            }
            backoff.pause(snapshot.id(), "completed").await?;
        }
    }
}
