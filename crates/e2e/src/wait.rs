//! Fixed-interval polling with a bounded number of attempts

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

use crate::error::{E2eError, E2eResult};
use crate::page::Page;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Poll {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Poll {
    /// Text waits: 50 × 200 ms, about 10 s.
    pub const TEXT: Poll = Poll::new(Duration::from_millis(200), 50);

    /// Post-submit progress: 30 × 200 ms, about 6 s.
    pub const PROGRESS: Poll = Poll::new(Duration::from_millis(200), 30);

    pub const fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Upper bound on how long a full poll can take.
    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempts
    }

    /// Probe until it returns true. Running out of attempts is `Ok(false)`;
    /// errors from the probe itself still propagate.
    pub async fn until<F, Fut>(&self, mut probe: F) -> E2eResult<bool>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = E2eResult<bool>>,
    {
        for attempt in 1..=self.max_attempts {
            if probe().await? {
                debug!("Poll satisfied on attempt {}", attempt);
                return Ok(true);
            }
            sleep(self.interval).await;
        }
        Ok(false)
    }

    /// Like [`Poll::until`], but running out of attempts is a `Timeout`.
    pub async fn expect<F, Fut>(&self, what: &str, probe: F) -> E2eResult<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = E2eResult<bool>>,
    {
        if self.until(probe).await? {
            Ok(())
        } else {
            Err(E2eError::Timeout(what.to_string()))
        }
    }
}

/// Wait for the trimmed text of `selector` to equal `expected`.
pub async fn wait_for_text<P: Page + ?Sized>(
    page: &P,
    selector: &str,
    expected: &str,
    poll: Poll,
) -> E2eResult<bool> {
    poll.until(|| async move { Ok::<_, E2eError>(page.text(selector).await? == expected) })
        .await
}
