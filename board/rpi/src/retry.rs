use std::time::Duration;

use hal::{Retryable, Sensor};
use log::{debug, warn};

/// How often a flaky sensor is asked again.
///
/// DHT sensors refuse to answer more often than about every 2 seconds,
/// 15 attempts give up after roughly 30 seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub pause: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 15,
            pause: Duration::from_secs(2),
        }
    }
}

/// Read `sensor` until it succeeds, a non-transient error occurs or the
/// attempts run out. Returns the reading and the number of failed attempts.
pub fn read_with_retry<S: Sensor>(
    sensor: &mut S,
    policy: &RetryPolicy,
    mut sleep: impl FnMut(Duration),
) -> Result<(S::Reading, u32), S::Error>
where
    S::Error: std::fmt::Display,
{
    let mut failures = 0;
    loop {
        match sensor.read() {
            Ok(reading) => {
                if failures > 0 {
                    debug!("{} read succeeded after {} retries", sensor.name(), failures);
                }
                return Ok((reading, failures));
            }
            Err(err) => {
                failures += 1;
                if !err.is_transient() || failures >= policy.max_attempts {
                    return Err(err);
                }
                warn!(
                    "{} read failed ({}), attempt {}/{}",
                    sensor.name(),
                    err,
                    failures,
                    policy.max_attempts
                );
                sleep(policy.pause);
            }
        }
    }
}
