use embassy_time::Duration;
use embedded_hal::delay::DelayNs;

/// How often, and how patiently, an exchange is repeated.
///
/// The first attempt runs immediately. After the `n`th failure the policy
/// waits `delay * multiplier^n`, capped at `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RetryPolicy {
    attempts: u8,
    delay: Duration,
    multiplier: u32,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(
            crate::config::COMMAND_NUM_RETRIES,
            crate::config::COMMAND_RETRY_SLEEP,
        )
    }
}

impl RetryPolicy {
    /// Same delay between every attempt.
    pub const fn fixed(attempts: u8, delay: Duration) -> Self {
        Self {
            attempts,
            delay,
            multiplier: 1,
            max_delay: delay,
        }
    }

    /// A single attempt.
    pub const fn once() -> Self {
        Self::fixed(1, Duration::from_ticks(0))
    }

    #[must_use]
    pub const fn with_backoff(self, multiplier: u32, max_delay: Duration) -> Self {
        Self {
            multiplier,
            max_delay,
            ..self
        }
    }

    #[must_use]
    pub const fn with_attempts(self, attempts: u8) -> Self {
        Self { attempts, ..self }
    }

    /// Total attempts, never less than one.
    pub fn attempts(&self) -> u8 {
        self.attempts.max(1)
    }

    /// Wait after the `failures`th consecutive failure (0-based).
    pub fn delay_after(&self, failures: u8) -> Duration {
        let cap = self.max_delay.as_ticks().max(self.delay.as_ticks());
        let mut ticks = self.delay.as_ticks();
        for _ in 0..failures {
            if ticks >= cap {
                break;
            }
            ticks = ticks.saturating_mul(u64::from(self.multiplier));
        }
        Duration::from_ticks(ticks.min(cap))
    }

    /// The waits between attempts, in order.
    pub fn backoff(&self) -> Backoff {
        Backoff {
            policy: *self,
            failures: 0,
        }
    }

    /// Run `op` until it succeeds or the attempts are used up, returning the
    /// last error in that case.
    pub fn run<T, E>(
        &self,
        delay: &mut impl DelayNs,
        mut op: impl FnMut(u8) -> Result<T, E>,
    ) -> Result<T, E> {
        let mut backoff = self.backoff();
        let mut attempt = 0;
        loop {
            match op(attempt) {
                Ok(v) => return Ok(v),
                Err(e) => match backoff.next() {
                    Some(wait) => {
                        delay.delay_ms(as_delay_ms(wait));
                        attempt += 1;
                    }
                    None => return Err(e),
                },
            }
        }
    }
}

/// Iterator over the waits of a [`RetryPolicy`], one fewer than its attempts.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: RetryPolicy,
    failures: u8,
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.failures + 1 >= self.policy.attempts() {
            return None;
        }
        let wait = self.policy.delay_after(self.failures);
        self.failures += 1;
        Some(wait)
    }
}

pub(crate) fn as_delay_ms(d: Duration) -> u32 {
    u32::try_from(d.as_millis()).unwrap_or(u32::MAX)
}
