use rand::random_range;
use std::future::Future;
use tokio::time::{Duration, Instant, sleep};

use common::error::ApiError;

const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(500);
const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(10);
const DEFAULT_JITTER_FRAC: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    Retryable,    // transport errors, 5xx
    NonRetryable, // the node answered and said no
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Zero means a single attempt.
    pub total_budget: Duration,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    pub jitter_frac: f32,
}

impl RetryConfig {
    pub fn with_budget(total_budget: Duration) -> Self {
        Self {
            total_budget,
            backoff_base: DEFAULT_BACKOFF_BASE,
            backoff_max: DEFAULT_BACKOFF_MAX,
            jitter_frac: DEFAULT_JITTER_FRAC,
        }
    }
}

fn jitter(d: Duration, frac: f32) -> Duration {
    let ms = d.as_millis() as i64;
    let delta = (ms as f32 * frac) as i64;
    let j = random_range(-delta..=delta);
    Duration::from_millis((ms + j).max(0) as u64)
}

/// Run `op` until it succeeds, fails non-retryably, or the budget is spent.
/// Returns the last error together with the number of attempts made.
pub async fn retry_timeboxed<E, F, Fut, C, T>(
    cfg: &RetryConfig,
    mut op: F,
    classify: C,
) -> Result<T, (E, u32)>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> RetryClass,
{
    let deadline = Instant::now() + cfg.total_budget;
    let mut backoff = cfg.backoff_base;
    let mut attempts = 0;

    loop {
        attempts += 1;
        match op().await {
            Ok(res) => return Ok(res),
            Err(e) => {
                if classify(&e) == RetryClass::NonRetryable {
                    return Err((e, attempts));
                }
                let now = Instant::now();
                if now >= deadline {
                    return Err((e, attempts));
                }
                let sleep_dur = jitter(backoff.min(cfg.backoff_max), cfg.jitter_frac);
                if sleep_dur > deadline.saturating_duration_since(now) {
                    return Err((e, attempts));
                }
                sleep(sleep_dur).await;
                backoff = (backoff * 2).min(cfg.backoff_max);
            }
        }
    }
}

pub fn classify_api_error(err: &ApiError) -> RetryClass {
    match err {
        ApiError::Unreachable(_) => RetryClass::Retryable,
        ApiError::UpstreamStatus(st) if st.is_server_error() => RetryClass::Retryable,
        _ => RetryClass::NonRetryable,
    }
}
