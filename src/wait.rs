use crate::driver::{NodeHandle, PageDriver};
use crate::{HarvestError, Result};
use rand::Rng;
use std::cell::RefCell;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Configuration for condition waits
#[derive(Debug, Clone)]
pub struct WaitConfig {
    /// How long a condition may take to hold before the wait fails
    pub timeout: Duration,
    /// Delay between two evaluations of the condition
    pub poll_interval: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(3),
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Inclusive range for the randomized pause between detail-page loads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelayRange {
    pub min: Duration,
    pub max: Duration,
}

impl DelayRange {
    pub fn new(min: Duration, max: Duration) -> Self {
        if max < min {
            Self { min: max, max: min }
        } else {
            Self { min, max }
        }
    }

    /// Pick a delay uniformly from the range
    pub fn sample(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        rand::thread_rng().gen_range(self.min..=self.max)
    }

    /// Sleep for a sampled delay
    pub async fn pause(&self) {
        let delay = self.sample();
        log::debug!("Pausing {}ms before next page load", delay.as_millis());
        tokio::time::sleep(delay).await;
    }
}

/// Poll `predicate` until it returns `true` or the timeout elapses.
///
/// The predicate is evaluated at least once, even with a zero timeout. Errors
/// from the predicate abort the wait immediately.
///
/// # Arguments
/// * `config` - Timeout and polling interval
/// * `condition` - Description of the condition, used in logs and in the timeout error
/// * `predicate` - Async function reporting whether the condition holds
pub async fn wait_until<F, Fut>(config: &WaitConfig, condition: &str, mut predicate: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let started = Instant::now();
    let mut polls = 0u32;

    loop {
        polls += 1;
        if predicate().await? {
            log::debug!(
                "Condition '{condition}' held after {polls} poll(s), {}ms",
                started.elapsed().as_millis()
            );
            return Ok(());
        }

        if started.elapsed() >= config.timeout {
            log::debug!("Gave up on '{condition}' after {polls} poll(s)");
            return Err(HarvestError::WaitTimeout {
                condition: condition.to_string(),
                timeout_ms: config.timeout.as_millis() as u64,
            });
        }

        tokio::time::sleep(config.poll_interval).await;
    }
}

/// Wait until `node` is detached from the document, which is the only
/// reliable signal that a click replaced the page.
pub async fn staleness_of<D>(driver: &D, node: &NodeHandle, config: &WaitConfig) -> Result<()>
where
    D: PageDriver + ?Sized,
{
    wait_until(config, &format!("staleness of {node}"), || driver.is_stale(node)).await
}

/// Wait until at least one element matches `selector` and return the first.
pub async fn presence_of<D>(driver: &D, selector: &str, config: &WaitConfig) -> Result<NodeHandle>
where
    D: PageDriver + ?Sized,
{
    let found = RefCell::new(None);
    wait_until(config, &format!("presence of '{selector}'"), || {
        let query = driver.query_one(selector);
        let found = &found;
        async move {
            let hit = query.await?;
            let present = hit.is_some();
            *found.borrow_mut() = hit;
            Ok(present)
        }
    })
    .await?;

    found
        .into_inner()
        .ok_or_else(|| HarvestError::Structure(format!("'{selector}' vanished after wait")))
}
