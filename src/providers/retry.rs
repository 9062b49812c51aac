use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

pub(crate) const DEFAULT_MAX_RETRIES: usize = 5;
pub(crate) const RETRY_BASE_DELAY: Duration = Duration::from_secs(2);
pub(crate) const RETRY_MAX_DELAY: Duration = Duration::from_secs(60);

pub(crate) fn is_rate_limited(status: StatusCode, body: &str) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return true;
    }
    let code = status.as_u16();
    if code == 529 || code == 503 {
        return true;
    }
    let lower = body.to_lowercase();
    lower.contains("rate limit") || lower.contains("too many requests")
}

/// Rate limiting and transient server errors; quota exhaustion (456) is final.
pub(crate) fn is_retryable(status: StatusCode, body: &str) -> bool {
    is_rate_limited(status, body) || status.is_server_error()
}

pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get("retry-after")?.to_str().ok()?.trim();
    if value.is_empty() {
        return None;
    }
    value.parse::<u64>().ok().map(Duration::from_secs)
}

pub(crate) async fn wait_with_backoff(
    service: &str,
    reason: &str,
    attempt: usize,
    max_retries: usize,
    delay: Duration,
    retry_after: Option<Duration>,
) -> Duration {
    let mut wait = delay;
    if let Some(retry_after) = retry_after
        && retry_after > wait
    {
        wait = retry_after.min(RETRY_MAX_DELAY);
    }
    warn!(
        "{} {}; retrying in {:.1}s (attempt {}/{})",
        service,
        reason,
        wait.as_secs_f32(),
        attempt,
        max_retries
    );
    sleep(wait).await;
    next_delay(delay)
}

pub(crate) fn next_delay(current: Duration) -> Duration {
    let next = current.saturating_mul(2).max(RETRY_BASE_DELAY);
    next.min(RETRY_MAX_DELAY)
}
