use chrono::{DateTime, Local};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::quota::ClientQuotaRecord;

/// Key-value backing for the quota ledger.
///
/// `update` must apply the closure atomically with respect to other calls
/// for the same fingerprint; the ledger relies on it for read-modify-write.
pub trait QuotaStore: Send + Sync {
    fn get(&self, fingerprint: &str) -> Option<ClientQuotaRecord>;

    fn put(&self, fingerprint: &str, record: ClientQuotaRecord);

    fn update(
        &self,
        fingerprint: &str,
        apply: &mut dyn FnMut(Option<ClientQuotaRecord>) -> ClientQuotaRecord,
    ) -> ClientQuotaRecord;

    /// Remove records whose last deployment is older than `cutoff`.
    /// Records that never deployed are kept. Returns how many were removed.
    fn sweep(&self, cutoff: DateTime<Local>) -> usize;

    fn len(&self) -> usize;
}

// Process-local store, lost on restart
#[derive(Default)]
pub struct MemoryQuotaStore {
    records: DashMap<String, ClientQuotaRecord>,
}

impl MemoryQuotaStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl QuotaStore for MemoryQuotaStore {
    fn get(&self, fingerprint: &str) -> Option<ClientQuotaRecord> {
        self.records.get(fingerprint).map(|r| r.clone())
    }

    fn put(&self, fingerprint: &str, record: ClientQuotaRecord) {
        self.records.insert(fingerprint.to_string(), record);
    }

    fn update(
        &self,
        fingerprint: &str,
        apply: &mut dyn FnMut(Option<ClientQuotaRecord>) -> ClientQuotaRecord,
    ) -> ClientQuotaRecord {
        // the entry guard holds the shard lock for the whole closure
        match self.records.entry(fingerprint.to_string()) {
            Entry::Occupied(mut entry) => {
                let next = apply(Some(entry.get().clone()));
                entry.insert(next.clone());
                next
            }
            Entry::Vacant(entry) => {
                let next = apply(None);
                entry.insert(next.clone());
                next
            }
        }
    }

    fn sweep(&self, cutoff: DateTime<Local>) -> usize {
        let before = self.records.len();
        self.records.retain(|_, record| match record.last_deployment_at {
            Some(at) => at >= cutoff,
            None => true,
        });
        before.saturating_sub(self.records.len())
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};

    fn noon() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn update_creates_then_mutates() {
        let store = MemoryQuotaStore::new();
        let today = noon().date_naive();

        let created = store.update("fp", &mut |prev| {
            assert!(prev.is_none());
            ClientQuotaRecord::fresh(5, today)
        });
        assert_eq!(created.remaining, 5);

        let next = store.update("fp", &mut |prev| {
            let mut r = prev.expect("record exists");
            r.remaining -= 1;
            r
        });
        assert_eq!(next.remaining, 4);
        assert_eq!(store.get("fp").map(|r| r.remaining), Some(4));
    }

    #[test]
    fn sweep_keeps_fresh_and_never_deployed_records() {
        let store = MemoryQuotaStore::new();
        let now = noon();
        let today = now.date_naive();

        let mut stale = ClientQuotaRecord::fresh(50, today);
        stale.last_deployment_at = Some(now - TimeDelta::hours(25));
        let mut recent = ClientQuotaRecord::fresh(50, today);
        recent.last_deployment_at = Some(now - TimeDelta::hours(2));
        let idle = ClientQuotaRecord::fresh(50, today - TimeDelta::days(3));

        store.put("stale", stale);
        store.put("recent", recent);
        store.put("idle", idle);

        let removed = store.sweep(now - TimeDelta::hours(24));
        assert_eq!(removed, 1);
        assert!(store.get("stale").is_none());
        assert!(store.get("recent").is_some());
        assert!(store.get("idle").is_some());
    }
}
