// Daily deploy quota + cooldown per fingerprint, reset on local day change

use chrono::{DateTime, Local, NaiveDate, TimeDelta};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::config::QuotaConfig;
use crate::store::{MemoryQuotaStore, QuotaStore};

// Quota entry - tracks allowance and cooldown per fingerprint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientQuotaRecord {
    pub remaining: u32,
    pub last_reset: NaiveDate,
    pub last_deployment_at: Option<DateTime<Local>>,
    pub cooldown_until: Option<DateTime<Local>>,
}

impl ClientQuotaRecord {
    pub fn fresh(cap: u32, today: NaiveDate) -> Self {
        Self {
            remaining: cap,
            last_reset: today,
            last_deployment_at: None,
            cooldown_until: None,
        }
    }

    /// Whole seconds left on the cooldown, rounded up. `None` once expired.
    pub fn cooldown_remaining(&self, now: DateTime<Local>) -> Option<u64> {
        let until = self.cooldown_until?;
        let millis = (until - now).num_milliseconds();
        (millis > 0).then(|| (millis as u64).div_ceil(1000))
    }
}

/// Snapshot reported to clients by the quota probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaStatus {
    pub remaining: u32,
    pub cooldown_remaining_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QuotaDenied {
    #[error("cooldown active for {remaining_secs}s")]
    Cooldown {
        remaining_secs: u64,
        remaining_quota: u32,
    },
    #[error("daily quota exhausted")]
    Exhausted,
}

pub struct QuotaLedger {
    store: Arc<dyn QuotaStore>,
    clock: Arc<dyn Clock>,
    locks: DashMap<String, Arc<Mutex<()>>>,
    daily_cap: u32,
    cooldown: TimeDelta,
    retention: TimeDelta,
}

fn to_delta(d: Duration) -> TimeDelta {
    TimeDelta::from_std(d).unwrap_or(TimeDelta::weeks(52))
}

impl QuotaLedger {
    pub fn new(config: &QuotaConfig) -> Self {
        Self::with_store(config, Arc::new(MemoryQuotaStore::new()), Arc::new(SystemClock))
    }

    pub fn with_store(
        config: &QuotaConfig,
        store: Arc<dyn QuotaStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            clock,
            locks: DashMap::new(),
            daily_cap: config.daily_cap,
            cooldown: to_delta(config.cooldown),
            retention: to_delta(config.retention),
        }
    }

    /// Serializes deploy attempts for one fingerprint. Hold the guard from
    /// [`admit`](Self::admit) until [`consume`](Self::consume) or until the
    /// attempt is abandoned.
    pub async fn lock(&self, fingerprint: &str) -> OwnedMutexGuard<()> {
        let slot = self
            .locks
            .entry(fingerprint.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        slot.lock_owned().await
    }

    /// Fetch the record for `fingerprint`, creating it with a full quota if
    /// unseen and resetting it when the calendar day has changed.
    pub fn lookup_or_init(&self, fingerprint: &str) -> ClientQuotaRecord {
        let now = self.clock.now();
        self.sweep_at(now);

        let today = now.date_naive();
        let cap = self.daily_cap;
        self.store.update(fingerprint, &mut |prev| {
            let mut record = prev.unwrap_or_else(|| ClientQuotaRecord::fresh(cap, today));
            if record.last_reset != today {
                record.remaining = cap;
                record.last_reset = today;
                record.cooldown_until = None;
            }
            record
        })
    }

    pub fn commit(&self, fingerprint: &str, record: ClientQuotaRecord) {
        self.store.put(fingerprint, record);
    }

    pub fn status(&self, fingerprint: &str) -> QuotaStatus {
        let record = self.lookup_or_init(fingerprint);
        QuotaStatus {
            remaining: record.remaining,
            cooldown_remaining_secs: record.cooldown_remaining(self.clock.now()),
        }
    }

    /// Decide whether a deploy may proceed. Never consumes quota.
    pub fn admit(&self, fingerprint: &str) -> Result<QuotaStatus, QuotaDenied> {
        let record = self.lookup_or_init(fingerprint);

        if let Some(remaining_secs) = record.cooldown_remaining(self.clock.now()) {
            return Err(QuotaDenied::Cooldown {
                remaining_secs,
                remaining_quota: record.remaining,
            });
        }
        if record.remaining == 0 {
            return Err(QuotaDenied::Exhausted);
        }

        Ok(QuotaStatus {
            remaining: record.remaining,
            cooldown_remaining_secs: None,
        })
    }

    /// Charge one deploy attempt and start the cooldown. Returns the quota
    /// left afterwards.
    pub fn consume(&self, fingerprint: &str) -> u32 {
        let now = self.clock.now();
        let today = now.date_naive();
        let cap = self.daily_cap;
        let cooldown = self.cooldown;

        let record = self.store.update(fingerprint, &mut |prev| {
            let mut record = prev.unwrap_or_else(|| ClientQuotaRecord::fresh(cap, today));
            record.remaining = record.remaining.saturating_sub(1);
            record.last_deployment_at = Some(now);
            record.cooldown_until = Some(now + cooldown);
            record
        });
        record.remaining
    }

    pub fn sweep(&self) -> usize {
        self.sweep_at(self.clock.now())
    }

    fn sweep_at(&self, now: DateTime<Local>) -> usize {
        let removed = self.store.sweep(now - self.retention);
        if removed > 0 {
            debug!(removed, "Evicted idle quota records");
        }
        // drop lock slots nobody holds and whose record is gone
        self.locks
            .retain(|fp, slot| Arc::strong_count(slot) > 1 || self.store.get(fp).is_some());
        removed
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
