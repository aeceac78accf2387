use std::time::Duration;

/// Why an image request failed, as far as retrying is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connect or transfer timed out.
    Timeout,
    /// Image host is rate limiting (429, 503).
    Throttled,
    /// Connection refused or reset, DNS failure, proxy unreachable.
    Connection,
    /// Other 5xx from the image host.
    Http5xx(u16),
    /// 4xx, empty body, bad URL: the page will not appear on a second try.
    Other,
}

impl ErrorKind {
    /// Transport-class kinds; a chapter failing only with these may succeed later.
    pub fn is_transient(self) -> bool {
        !matches!(self, ErrorKind::Other)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    NoRetry,
    RetryAfter(Duration),
}

/// Backoff for a single image request.
///
/// Chapters are never retried as a whole; a chapter whose image gives up is
/// reported failed and picked up by the next run. Delays double from
/// `base_delay` per attempt and stop at `max_delay`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts per image, counting the first request.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    /// Three tries per image, 500 ms then 1 s apart, never more than 8 s.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// One request per image.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// What to do after attempt number `attempt` (1-based) failed with `kind`.
    pub fn decide(&self, attempt: u32, kind: ErrorKind) -> RetryDecision {
        if attempt >= self.max_attempts || !kind.is_transient() {
            return RetryDecision::NoRetry;
        }
        let doublings = attempt.saturating_sub(1).min(16);
        let delay = self
            .base_delay
            .checked_mul(1u32 << doublings)
            .unwrap_or(self.max_delay)
            .min(self.max_delay);
        RetryDecision::RetryAfter(delay)
    }
}
