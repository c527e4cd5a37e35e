//! Exponential-jitter retry. A three-line algorithm like this stays
//! hand-rolled rather than pulled in as a dependency.

use std::future::Future;
use std::time::{Duration, SystemTime};

/// Retries `attempt` with exponential-jitter backoff (initial `min`, growth
/// ×1.5±0.75 random, plus per-attempt sleep jitter) until it succeeds or the
/// cumulative wait reaches `timeout`, at which point the last error wins.
pub async fn backoff<F, Fut, T, E>(min: Duration, timeout: Duration, mut attempt: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut wait = min + min.mul_f64(jitter_unit());
    let mut elapsed = Duration::ZERO;

    loop {
        match attempt().await {
            Ok(v) => return Ok(v),
            Err(err) => {
                if elapsed >= timeout {
                    return Err(err);
                }
                tokio::time::sleep(wait).await;
                elapsed += wait;
                wait = wait.mul_f64(1.5 + 0.75 * jitter_unit());
            }
        }
    }
}

/// A value in `[0, 1)`, seeded from the current time via a linear
/// congruential generator. Not cryptographic; only needed to spread retries.
fn jitter_unit() -> f64 {
    let seed = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;

    const A: u64 = 6364136223846793005;
    const C: u64 = 1442695040888963407;
    let random = seed.wrapping_mul(A).wrapping_add(C);
    (random >> 11) as f64 / (1u64 << 53) as f64
}
