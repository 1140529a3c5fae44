//! Token-bucket rate limiting.
//!
//! A bucket holds up to `burst` tokens and refills at `rate` tokens per
//! second; each admitted request consumes one token. A zero rate yields a
//! non-refilling bucket (the burst is all you get), an infinite rate always
//! admits.

use std::{
    sync::Mutex,
    time::Instant,
};

#[derive(Debug)]
pub struct TokenBucket {
    rate: f64,
    burst: f64,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last: Instant,
}

impl TokenBucket {
    pub fn new(rate: f64, burst: f64) -> Self {
        Self {
            rate,
            burst,
            state: Mutex::new(BucketState {
                tokens: burst,
                last: Instant::now(),
            }),
        }
    }

    /// A limiter that admits everything.
    pub fn unlimited() -> Self {
        Self::new(f64::INFINITY, f64::INFINITY)
    }

    pub fn allow(&self) -> bool {
        self.allow_at(Instant::now())
    }

    fn allow_at(&self, now: Instant) -> bool {
        if self.rate.is_infinite() {
            return true;
        }

        let mut state = self.state.lock().expect("token bucket lock poisoned");

        let elapsed = now.duration_since(state.last).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.rate).min(self.burst);
        state.last = now;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}
