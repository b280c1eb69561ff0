//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`,
/// capped at `max`, plus up to 10% jitter.
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let factor = 2u32.saturating_pow(attempt - 1);
    let capped = base.saturating_mul(factor).min(max);

    let jitter_ms = (capped.as_millis() / 10) as u64;
    let jitter = if jitter_ms > 0 {
        Duration::from_millis(rand::thread_rng().gen_range(0..jitter_ms))
    } else {
        Duration::ZERO
    };

    capped + jitter
}
