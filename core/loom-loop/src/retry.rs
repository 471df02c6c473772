use rand::Rng;
use std::time::Duration;
use std::time::Instant;

/// What a retry consultation tells the caller to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for the given duration, then retry the step.
    Retry(Duration),
    /// Give up; the error is terminal for this run.
    Stop,
}

/// Exponential backoff with jitter, scoped to one run of the processing
/// loop. Parameters fixed by the specification: 1s initial delay, 30s cap
/// per attempt, multiplier 2.0, randomization factor 0.5, at most 3
/// retries and 2 minutes of total elapsed backoff.
#[derive(Debug)]
pub struct RetryPolicy {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    randomization: f64,
    max_retries: u32,
    max_elapsed: Duration,
    attempt: u32,
    started_at: Option<Instant>,
    elapsed: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(30),
            multiplier: 2.0,
            randomization: 0.5,
            max_retries: 3,
            max_elapsed: Duration::from_secs(120),
            attempt: 0,
            started_at: None,
            elapsed: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        RetryPolicy::default()
    }

    /// Resets attempt/elapsed bookkeeping. Called after any step that
    /// reaches a successfully-decoded stream, per the design note that
    /// retry state resets on streamed success.
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.started_at = None;
        self.elapsed = Duration::ZERO;
    }

    /// Consults the policy after a provider failure (pre-stream open or
    /// mid-stream). Advances the attempt counter; returns `Stop` once
    /// either the retry count or the total elapsed backoff budget is
    /// exhausted, otherwise `Retry(delay)` for a jittered exponential
    /// delay.
    pub fn next_decision(&mut self, rng: &mut impl Rng) -> RetryDecision {
        if self.attempt >= self.max_retries {
            return RetryDecision::Stop;
        }
        let started_at = *self.started_at.get_or_insert_with(Instant::now);
        if started_at.elapsed() >= self.max_elapsed {
            return RetryDecision::Stop;
        }

        let base_millis = self.initial.as_millis() as f64 * self.multiplier.powi(self.attempt as i32);
        let capped_millis = base_millis.min(self.max.as_millis() as f64);
        let jitter_span = capped_millis * self.randomization;
        let jittered_millis = capped_millis + rng.random_range(-jitter_span..=jitter_span);
        let delay = Duration::from_millis(jittered_millis.max(0.0) as u64);

        self.attempt += 1;
        self.elapsed += delay;
        RetryDecision::Retry(delay)
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stops_after_three_retries() {
        let mut policy = RetryPolicy::new();
        let mut rng = rand::rng();
        for _ in 0..3 {
            assert!(matches!(policy.next_decision(&mut rng), RetryDecision::Retry(_)));
        }
        assert_eq!(policy.next_decision(&mut rng), RetryDecision::Stop);
    }

    #[test]
    fn reset_clears_attempt_counter() {
        let mut policy = RetryPolicy::new();
        let mut rng = rand::rng();
        policy.next_decision(&mut rng);
        policy.next_decision(&mut rng);
        policy.reset();
        assert_eq!(policy.attempt(), 0);
    }

    #[test]
    fn delay_never_exceeds_the_cap_plus_jitter() {
        let mut policy = RetryPolicy::new();
        let mut rng = rand::rng();
        while let RetryDecision::Retry(delay) = policy.next_decision(&mut rng) {
            assert!(delay <= Duration::from_millis(45_000));
        }
    }
}
