use std::sync::Mutex;

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};

use crate::{errors::Error, Result};

/// Primary vs. fallback model choice within one provider family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelTier {
    Primary,
    Fallback,
}

/// One credential handed out by the pool.
#[derive(Clone, Debug)]
pub struct Credential {
    pub index: usize,
    pub key: String,
}

#[derive(Debug)]
struct State {
    cursor: usize,
    fail_counts: Vec<u32>,
    using_fallback: bool,
    exceeded_count: usize,
    last_exceeded: Option<DateTime<Utc>>,
}

/// Process-lifetime credential rotation + quota tier state for one
/// provider family.
///
/// Constructed once at startup and shared by handle with the adapter that
/// owns the provider. The tier transition back to Primary is lazy: it is
/// checked on each `active_tier()` call against the next daily boundary
/// strictly after the moment the fallback was entered.
///
/// Invariant: `using_fallback == true` implies `last_exceeded.is_some()`.
pub struct QuotaTracker {
    keys: Vec<String>,
    reset_utc_hour: u32,
    state: Mutex<State>,
}

impl QuotaTracker {
    pub fn new(keys: Vec<String>, reset_utc_hour: u32) -> Result<Self> {
        if keys.is_empty() {
            return Err(Error::Config(
                "credential pool must not be empty".to_string(),
            ));
        }
        let fail_counts = vec![0; keys.len()];
        Ok(Self {
            keys,
            reset_utc_hour: reset_utc_hour.min(23),
            state: Mutex::new(State {
                cursor: 0,
                fail_counts,
                using_fallback: false,
                exceeded_count: 0,
                last_exceeded: None,
            }),
        })
    }

    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    /// Next credential in rotation order.
    pub fn next_credential(&self) -> Credential {
        let mut state = self.state.lock().unwrap();
        let index = state.cursor;
        state.cursor = (state.cursor + 1) % self.keys.len();
        Credential {
            index,
            key: self.keys[index].clone(),
        }
    }

    /// A successful call clears the credential's failure count and ends any
    /// pool-wide quota-failure streak.
    pub fn record_success(&self, cred: &Credential) {
        let mut state = self.state.lock().unwrap();
        state.fail_counts[cred.index] = 0;
        state.exceeded_count = 0;
    }

    /// A non-quota failure for one credential.
    pub fn record_failure(&self, cred: &Credential) {
        let mut state = self.state.lock().unwrap();
        state.fail_counts[cred.index] += 1;
        tracing::warn!(
            key = cred.index + 1,
            fails = state.fail_counts[cred.index],
            "credential failed"
        );
    }

    /// A quota-classified failure. Returns `true` when this failure entered
    /// the fallback tier: first failure on a single-key pool, or failures
    /// across the whole pool without a success in between.
    pub fn record_quota_failure(&self, cred: &Credential) -> bool {
        self.record_quota_failure_at(cred, Utc::now())
    }

    pub fn record_quota_failure_at(&self, cred: &Credential, now: DateTime<Utc>) -> bool {
        let mut state = self.state.lock().unwrap();
        state.fail_counts[cred.index] += 1;
        state.exceeded_count += 1;

        if !state.using_fallback && state.exceeded_count >= self.keys.len() {
            state.using_fallback = true;
            state.last_exceeded = Some(now);
            tracing::warn!("quota exhausted across pool, switching to fallback tier");
            return true;
        }
        false
    }

    /// Current tier, after the lazy daily-reset check.
    pub fn active_tier(&self) -> ModelTier {
        self.active_tier_at(Utc::now())
    }

    pub fn active_tier_at(&self, now: DateTime<Utc>) -> ModelTier {
        let mut state = self.state.lock().unwrap();

        if state.using_fallback {
            if let Some(exceeded_at) = state.last_exceeded {
                if now >= self.next_boundary_after(exceeded_at) {
                    tracing::info!("daily quota boundary crossed, back to primary tier");
                    state.using_fallback = false;
                    state.exceeded_count = 0;
                    state.last_exceeded = None;
                    state.fail_counts.iter_mut().for_each(|c| *c = 0);
                }
            }
        }

        if state.using_fallback {
            ModelTier::Fallback
        } else {
            ModelTier::Primary
        }
    }

    /// Next occurrence of the configured daily boundary strictly after `t`.
    fn next_boundary_after(&self, t: DateTime<Utc>) -> DateTime<Utc> {
        let same_day = t
            .date_naive()
            .and_hms_opt(self.reset_utc_hour, 0, 0)
            .expect("reset hour is clamped to 0..=23");
        let same_day = Utc.from_utc_datetime(&same_day);
        if same_day > t {
            same_day
        } else {
            same_day + ChronoDuration::days(1)
        }
    }
}

/// Quota/rate-limit error classification, matched against the provider's
/// error text.
pub fn is_quota_error(message: &str) -> bool {
    let msg = message.to_lowercase();
    msg.contains("quota")
        || msg.contains("429")
        || msg.contains("too many requests")
        || msg.contains("rate limit")
}

/// Capacity/overload classification (escalating these would only make the
/// pile-on worse, so callers answer with a fixed apology instead).
pub fn is_overload_error(message: &str) -> bool {
    let msg = message.to_lowercase();
    msg.contains("overloaded") || msg.contains("503")
}
